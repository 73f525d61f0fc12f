//! Generic walker plumbing shared by all four modifiers.
//!
//! The original walker (`pgtable.c`) is one depth-first function
//! dispatching on a closed event tag (`PGTABLE_MAP_MODIFIER`, `..UNMAP..`,
//! `..LOOKUP..`, `..PREALLOC..`, `..DUMP..`, plus an `EXTERNAL` escape
//! hatch) against a fixed per-level stack of frames. Here the event tag
//! is kept for exhaustiveness and tracing (`WalkEvent`), while each
//! modifier owns its own bounded-depth recursive descent
//! (`modifiers::{map,unmap,lookup,prealloc}`) built from the shared
//! table/refcount helpers below - the four modifiers differ enough in
//! what happens at a partially-covered slot (split, error, skip, create)
//! that a single monomorphic per-slot callback would obscure more than
//! it shares. Recursion depth is bounded by `level::MAX_LEVELS`, the same
//! bound the original enforces with its fixed-size frame array.

use crate::pgtable::alloc::{PageAllocator, TableHandle};
use crate::pgtable::entry::{Entry, EntryKind};
use crate::pgtable::error::PgtError;
use crate::pgtable::level::{Granule, LevelGeometry, MAX_LEVELS};
use crate::pgtable::table::TableView;
use crate::pgtable::tlb::TlbOps;

/// Translation regime a controller manages (spec §4.6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// EL2 hypervisor stage-1.
    Hyp,
    /// Guest stage-2 (IPA -> PA).
    Vm,
}

/// Issues the stage-appropriate TLB invalidation for `[addr, addr+size)`.
pub fn invalidate_for_stage(tlb: &dyn TlbOps, stage: Stage, addr: u64, size: u64, page_size: u64) {
    let num_pages = (size / page_size).max(1);
    match stage {
        Stage::Hyp => tlb.tlbi_va_range_e2(addr, num_pages),
        Stage::Vm => tlb.tlbi_ipas2e1_range(addr, num_pages),
    }
}

/// Whether a leaf (block or page) descriptor is architecturally legal
/// at this level.
pub fn leaf_allowed(geom: &LevelGeometry) -> bool {
    if geom.is_page_level {
        geom.page_allowed()
    } else {
        geom.block_allowed()
    }
}

/// Closed event tag for the walk currently in progress. `External` is
/// reserved for platform code observing a walk (e.g. an SMMU shadow
/// table) without installing a core modifier; this engine does not
/// dispatch it itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalkEvent {
    Map,
    Unmap,
    UnmapMatch,
    Lookup,
    Prealloc,
    Dump,
    External,
}

/// Opens a live view over the sub-table an already-valid `Table` entry
/// points at.
///
/// # Safety
/// `entry` must be a valid table descriptor and `alloc` must recognize
/// its output address as a table this allocator owns.
pub unsafe fn open_child(
    alloc: &impl PageAllocator,
    entry: Entry,
    granule: Granule,
    child_geom: &LevelGeometry,
) -> TableView {
    let phys = entry.output_address(granule);
    let handle = TableHandle { phys, virt: alloc.phys_to_virt(phys) };
    TableView::new(handle, child_geom)
}

/// Allocates a fresh, zeroed sub-table.
pub fn alloc_child(
    alloc: &mut impl PageAllocator,
    child_geom: &LevelGeometry,
) -> Result<(TableHandle, TableView), PgtError> {
    let size = child_geom.entries_per_table() * core::mem::size_of::<u64>();
    let handle = alloc.alloc_table(size)?;
    let view = unsafe { TableView::new(handle, child_geom) };
    Ok((handle, view))
}

/// Frees a sub-table that has just been emptied or collapsed into a
/// block. Caller must have already cleared/replaced the parent entry
/// and completed the break-before-make TLB invalidation sequence.
pub fn free_child(alloc: &mut impl PageAllocator, handle: TableHandle, child_geom: &LevelGeometry) {
    let size = child_geom.entries_per_table() * core::mem::size_of::<u64>();
    unsafe { alloc.free_table(handle, size) };
}

/// Recomputes and stores the live-entry refcount of `child` into the
/// parent's table descriptor at `parent_index`, preserving its output
/// address. Mirrors the original's `set_table_refcount`.
pub fn sync_refcount(
    parent: &mut TableView,
    parent_index: usize,
    child: &TableView,
    granule: Granule,
) -> u32 {
    let count = (0..child.len()).filter(|&i| child.get(i).is_valid()).count() as u32;
    let old = parent.get(parent_index);
    parent.set(parent_index, old.with_refcount(granule, count));
    count
}

/// Depth bound check, matching the original's fixed stack array size.
pub fn assert_level_in_range(level: u8) {
    debug_assert!((level as usize) < MAX_LEVELS);
}

/// True when `[addr, addr+size)` is fully aligned to and exactly spans
/// one entry at `geom`.
pub fn exactly_covers(geom: &LevelGeometry, addr: u64, size: u64) -> bool {
    addr & geom.block_mask() == 0 && size == geom.block_size()
}

/// Decodes a parent entry's kind, needed before deciding whether to
/// descend, split, or install directly.
pub fn kind_at(entry: Entry, geom: &LevelGeometry, granule: Granule) -> EntryKind {
    entry.kind(geom.is_page_level, granule)
}
