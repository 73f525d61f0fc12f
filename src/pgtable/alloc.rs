//! Table allocator facade ("Partition" in spec §6).
//!
//! Generalizes `BumpAllocator`/`mm::heap` (`src/mm/allocator.rs`,
//! `src/mm/heap.rs`), which hand out 4KB pages that are already
//! identity-mapped (virtual address == physical address) in the
//! hypervisor's own address space, into the narrower interface the
//! walker actually needs: a granule-sized, zeroed table plus its
//! physical address for storing in a parent descriptor.

use crate::pgtable::error::PgtError;

/// A table allocation: its physical address (stored in the parent
/// descriptor) and a pointer usable to read/write its contents directly,
/// since the allocator's backing memory is identity-mapped.
#[derive(Debug, Clone, Copy)]
pub struct TableHandle {
    pub phys: u64,
    pub virt: *mut u64,
}

/// Table allocator the walker/modifiers allocate and free sub-tables
/// through. One implementation per hypervisor; `mm::allocator` adapts
/// its bump/free-list allocator to this trait.
pub trait PageAllocator {
    /// Allocates a zeroed, granule-sized, granule-aligned table.
    fn alloc_table(&mut self, size: usize) -> Result<TableHandle, PgtError>;

    /// Frees a table previously returned by `alloc_table`.
    ///
    /// # Safety
    /// The table must not be reachable from any live root any more -
    /// the caller has already cleared the parent entry and invalidated
    /// the TLB.
    unsafe fn free_table(&mut self, handle: TableHandle, size: usize);

    /// Recovers a usable pointer to a table's contents given only the
    /// physical address stored in a parent descriptor.
    fn phys_to_virt(&self, phys: u64) -> *mut u64;
}
