//! Dump modifier.
//!
//! spec.md §4.1 lists `DUMP` among the walker's closed event tags but
//! never describes it in the per-modifier sections; the original carries
//! a debug dump modifier that walks a range read-only and logs every
//! leaf (see SPEC_FULL.md §4). Reported here through a sink closure
//! instead of a direct log call, so a caller can route it through
//! `PgtTrace` or its own logger.

use crate::pgtable::alloc::PageAllocator;
use crate::pgtable::controller::Engine;
use crate::pgtable::entry::EntryKind;
use crate::pgtable::error::PgtError;
use crate::pgtable::table::TableView;
use crate::pgtable::tlb::TlbOps;
use crate::pgtable::trace::PgtTrace;
use crate::pgtable::walker;

/// One leaf observed by a dump walk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DumpEntry {
    pub va: u64,
    pub output_addr: u64,
    pub size: u64,
    pub level: u8,
}

#[allow(clippy::too_many_arguments)]
pub fn dump_level<A: PageAllocator, T: TlbOps, R: PgtTrace>(
    eng: &mut Engine<A, T, R>,
    view: &TableView,
    level: u8,
    table_base_va: u64,
    va_start: u64,
    va_end: u64,
    sink: &mut dyn FnMut(DumpEntry),
) -> Result<(), PgtError> {
    walker::assert_level_in_range(level);
    let geom = *eng.geom(level);
    let mut va = va_start;

    while va < va_end {
        let index = geom.index_of(va);
        let entry_start = table_base_va | ((index as u64) << geom.shift);
        let entry_end = entry_start + geom.block_size();
        let seg_end = core::cmp::min(va_end, entry_end);
        let existing = view.get(index);

        match existing.kind(geom.is_page_level, eng.granule) {
            EntryKind::Invalid => {}
            EntryKind::Leaf { addr } => {
                sink(DumpEntry { va: entry_start, output_addr: addr, size: geom.block_size(), level: geom.level });
            }
            EntryKind::Table { .. } => {
                let child_geom = *eng.geom(level + 1);
                let child_view =
                    unsafe { walker::open_child(eng.alloc, existing, eng.granule, &child_geom) };
                dump_level(
                    eng,
                    &child_view,
                    level + 1,
                    entry_start,
                    core::cmp::max(va_start, entry_start),
                    seg_end,
                    sink,
                )?;
            }
        }
        va = seg_end;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pgtable::attrs::{AccessPermissions, AttributeFields, MemoryKind};
    use crate::pgtable::bbm::BbmClass;
    use crate::pgtable::controller::Controller;
    use crate::pgtable::walker::Stage;
    use crate::testutil::{MockAllocator, MockTlb, RecordingTrace};

    #[test]
    fn dump_reports_mapped_leaf() {
        let mut alloc = MockAllocator::new();
        let mut ctrl = Controller::new(&mut alloc, crate::pgtable::level::Granule::G4K, 32, Stage::Vm, BbmClass::Level1, Some(1)).unwrap();
        let tlb = MockTlb::new();
        let mut trace = RecordingTrace::default();
        let attrs = AttributeFields { kind: MemoryKind::Normal, perms: AccessPermissions::RW, shareable: true };
        ctrl.map(&mut alloc, &tlb, &mut trace, 0x6000, 0xE000, 0x1000, attrs, false).unwrap();

        let mut seen = 0;
        ctrl.dump(&mut alloc, &tlb, &mut trace, 0x6000, 0x1000, &mut |e| {
            assert_eq!(e.output_addr, 0xE000);
            seen += 1;
        })
        .unwrap();
        assert_eq!(seen, 1);
    }
}
