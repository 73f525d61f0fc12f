//! Prealloc modifier (spec §4.5).
//!
//! Ensures every intermediate table down to `target_level` exists for a
//! VA/IPA range, without installing any leaf - lets a later `map` run
//! without allocating while a lock that forbids sleeping is held.

use crate::pgtable::alloc::PageAllocator;
use crate::pgtable::controller::Engine;
use crate::pgtable::entry::{Entry, EntryKind};
use crate::pgtable::error::PgtError;
use crate::pgtable::table::TableView;
use crate::pgtable::tlb::TlbOps;
use crate::pgtable::trace::PgtTrace;
use crate::pgtable::walker;

pub fn prealloc_level<A: PageAllocator, T: TlbOps, R: PgtTrace>(
    eng: &mut Engine<A, T, R>,
    view: &mut TableView,
    level: u8,
    table_base_va: u64,
    va_start: u64,
    va_end: u64,
    target_level: u8,
) -> Result<(), PgtError> {
    walker::assert_level_in_range(level);
    if level >= target_level {
        return Ok(());
    }
    let geom = *eng.geom(level);
    let mut va = va_start;

    while va < va_end {
        let index = geom.index_of(va);
        let entry_start = table_base_va | ((index as u64) << geom.shift);
        let entry_end = entry_start + geom.block_size();
        let seg_end = core::cmp::min(va_end, entry_end);
        let existing = view.get(index);

        match existing.kind(geom.is_page_level, eng.granule) {
            EntryKind::Invalid => {
                let child_geom = *eng.geom(level + 1);
                let (handle, mut child_view) = walker::alloc_child(eng.alloc, &child_geom)?;
                view.set(index, Entry::new_table(handle.phys, 0, eng.granule));
                eng.tlb.dsb(eng.outer_shareable);
                prealloc_level(
                    eng,
                    &mut child_view,
                    level + 1,
                    entry_start,
                    core::cmp::max(va_start, entry_start),
                    seg_end,
                    target_level,
                )?;
            }
            EntryKind::Table { .. } => {
                let child_geom = *eng.geom(level + 1);
                let mut child_view =
                    unsafe { walker::open_child(eng.alloc, existing, eng.granule, &child_geom) };
                prealloc_level(
                    eng,
                    &mut child_view,
                    level + 1,
                    entry_start,
                    core::cmp::max(va_start, entry_start),
                    seg_end,
                    target_level,
                )?;
            }
            EntryKind::Leaf { .. } => {
                // Already mapped at a coarser granularity than requested;
                // nothing to preallocate underneath an existing leaf.
            }
        }

        va = seg_end;
    }
    Ok(())
}
