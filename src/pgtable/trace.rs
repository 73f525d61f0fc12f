//! Optional observation hook for walker/modifier events.
//!
//! Stands in for the logging/tracing collaborator spec §1 places out of
//! scope for the engine itself: a hypervisor wires this to its own
//! logger. Shaped like the portable traits in `arch/traits.rs` - a
//! no-op default so most callers never implement it.

pub trait PgtTrace {
    fn map_leaf(&mut self, _va: u64, _pa: u64, _size: u64) {}
    fn split_block(&mut self, _va: u64, _old_size: u64, _new_size: u64) {}
    fn merge_block(&mut self, _va: u64, _size: u64) {}
    fn free_table(&mut self, _table_phys: u64) {}
    fn tlb_invalidate(&mut self, _va: u64, _size: u64) {}
}

/// Default no-op tracer.
pub struct NullTrace;

impl PgtTrace for NullTrace {}
