//! Lookup modifier (spec §4.4). Pure read-only descent, no mutation.

use crate::pgtable::alloc::PageAllocator;
use crate::pgtable::attrs::AccessPermissions;
use crate::pgtable::controller::Engine;
use crate::pgtable::entry::EntryKind;
use crate::pgtable::error::PgtError;
use crate::pgtable::table::TableView;
use crate::pgtable::tlb::TlbOps;
use crate::pgtable::trace::PgtTrace;
use crate::pgtable::walker;

/// Result of a successful lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LookupResult {
    pub output_addr: u64,
    pub size: u64,
    pub level: u8,
    pub perms: AccessPermissions,
}

pub fn lookup_level<A: PageAllocator, T: TlbOps, R: PgtTrace>(
    eng: &mut Engine<A, T, R>,
    view: &TableView,
    level: u8,
    table_base_va: u64,
    addr: u64,
) -> Result<LookupResult, PgtError> {
    walker::assert_level_in_range(level);
    let geom = *eng.geom(level);
    let index = geom.index_of(addr);
    let entry_start = table_base_va | ((index as u64) << geom.shift);
    let existing = view.get(index);

    match existing.kind(geom.is_page_level, eng.granule) {
        EntryKind::Invalid => Err(PgtError::AddrInvalid),
        EntryKind::Leaf { addr: out } => {
            let offset = addr - entry_start;
            Ok(LookupResult {
                output_addr: out + offset,
                size: geom.block_size(),
                level: geom.level,
                perms: AccessPermissions {
                    writable: (existing.raw() >> 6) & 0b11 == 0b00,
                    executable: existing.raw() & (1u64 << 54) == 0,
                },
            })
        }
        EntryKind::Table { .. } => {
            let child_geom = *eng.geom(level + 1);
            let child_view = unsafe { walker::open_child(eng.alloc, existing, eng.granule, &child_geom) };
            lookup_level(eng, &child_view, level + 1, entry_start, addr)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_result_reports_offset_within_block() {
        // Exercised end-to-end through Controller in controller.rs tests;
        // this just checks the struct carries the fields callers need.
        let r = LookupResult { output_addr: 0x1000, size: 0x1000, level: 3, perms: AccessPermissions::RW };
        assert_eq!(r.output_addr, 0x1000);
        assert!(r.perms.writable);
    }
}
