//! Unmap modifier (spec §4.3).
//!
//! Grounded on `pgtable.c`'s unmap modifier and its `check_refcount`
//! ascend-and-free pattern: clearing the last live entry in a sub-table
//! frees that table and clears the parent's entry in turn, propagating
//! upward for as many levels as become empty.

use crate::pgtable::alloc::PageAllocator;
use crate::pgtable::bbm;
use crate::pgtable::controller::Engine;
use crate::pgtable::entry::{Entry, EntryKind};
use crate::pgtable::error::PgtError;
use crate::pgtable::modifiers::map;
use crate::pgtable::table::TableView;
use crate::pgtable::tlb::TlbOps;
use crate::pgtable::trace::PgtTrace;
use crate::pgtable::walker::{self, invalidate_for_stage};

#[allow(clippy::too_many_arguments)]
pub fn unmap_level<A: PageAllocator, T: TlbOps, R: PgtTrace>(
    eng: &mut Engine<A, T, R>,
    view: &mut TableView,
    level: u8,
    table_base_va: u64,
    va_start: u64,
    va_end: u64,
    phys_filter: Option<(u64, u64)>,
    preserved_threshold: u64,
) -> Result<(), PgtError> {
    walker::assert_level_in_range(level);
    let geom = *eng.geom(level);
    let mut va = va_start;

    while va < va_end {
        let index = geom.index_of(va);
        let entry_start = table_base_va | ((index as u64) << geom.shift);
        let entry_end = entry_start + geom.block_size();
        let seg_end = core::cmp::min(va_end, entry_end);
        let full_cover = entry_start >= va_start && entry_end <= va_end;
        let existing = view.get(index);

        match existing.kind(geom.is_page_level, eng.granule) {
            EntryKind::Invalid => {}
            EntryKind::Leaf { addr } => {
                // UNMAP_MATCH (spec §4.3.1): a leaf whose output address
                // falls outside the requested physical range is left alone.
                if let Some((phys, size)) = phys_filter {
                    if addr < phys || addr >= phys + size {
                        va = seg_end;
                        continue;
                    }
                }
                if full_cover {
                    clear_leaf(eng, view, index, entry_start, geom.block_size());
                } else {
                    map::split_block(eng, view, index, &geom, addr)?;
                    continue;
                }
            }
            EntryKind::Table { .. } => {
                let child_geom = *eng.geom(level + 1);
                let mut child_view =
                    unsafe { walker::open_child(eng.alloc, existing, eng.granule, &child_geom) };
                unmap_level(
                    eng,
                    &mut child_view,
                    level + 1,
                    entry_start,
                    core::cmp::max(va_start, entry_start),
                    seg_end,
                    phys_filter,
                    preserved_threshold,
                )?;
                let remaining = walker::sync_refcount(view, index, &child_view, eng.granule);
                // Invariant: a sub-table covering less than the caller's
                // preserved size must not be freed even when drained.
                if remaining == 0 && geom.block_size() >= preserved_threshold {
                    let child_phys = view.get(index).output_address(eng.granule);
                    clear_table(eng, view, index, entry_start, geom.block_size());
                    let child_virt = eng.alloc.phys_to_virt(child_phys);
                    walker::free_child(
                        eng.alloc,
                        crate::pgtable::alloc::TableHandle { phys: child_phys, virt: child_virt },
                        &child_geom,
                    );
                }
            }
        }

        va = seg_end;
    }
    Ok(())
}

fn clear_leaf<A: PageAllocator, T: TlbOps, R: PgtTrace>(
    eng: &mut Engine<A, T, R>,
    view: &mut TableView,
    index: usize,
    entry_start: u64,
    size: u64,
) {
    let stage = eng.stage;
    let page_size = eng.granule.page_size();
    bbm::replace_descriptor(
        eng.bbm,
        eng.tlb,
        eng.outer_shareable,
        |tlb| invalidate_for_stage(tlb, stage, entry_start, size, page_size),
        |_use_nt| view.set(index, Entry::invalid()),
    );
    eng.trace.tlb_invalidate(entry_start, size);
}

fn clear_table<A: PageAllocator, T: TlbOps, R: PgtTrace>(
    eng: &mut Engine<A, T, R>,
    view: &mut TableView,
    index: usize,
    entry_start: u64,
    size: u64,
) {
    clear_leaf(eng, view, index, entry_start, size);
    eng.trace.free_table(entry_start);
}
