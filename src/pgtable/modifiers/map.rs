//! Map modifier (spec §4.2).
//!
//! Grounded on `pgtable.c`'s map modifier: install a leaf where the
//! requested range exactly covers an entry, otherwise descend (creating
//! or splitting a sub-table as needed) and, on the way back up, attempt
//! to merge a fully-uniform sub-table into a single larger leaf
//! (§4.2.1). The contiguous bit is never set here - see DESIGN.md's
//! Open Question decision.

use crate::pgtable::alloc::PageAllocator;
use crate::pgtable::attrs::AttributeFields;
use crate::pgtable::bbm;
use crate::pgtable::controller::Engine;
use crate::pgtable::entry::{Entry, EntryKind};
use crate::pgtable::error::PgtError;
use crate::pgtable::level::LevelGeometry;
use crate::pgtable::table::TableView;
use crate::pgtable::tlb::TlbOps;
use crate::pgtable::trace::PgtTrace;
use crate::pgtable::walker::{self, invalidate_for_stage};

#[allow(clippy::too_many_arguments)]
pub fn map_level<A: PageAllocator, T: TlbOps, R: PgtTrace>(
    eng: &mut Engine<A, T, R>,
    view: &mut TableView,
    level: u8,
    table_base_va: u64,
    va_start: u64,
    va_end: u64,
    pa_start: u64,
    attrs: AttributeFields,
    try_map: bool,
) -> Result<(), PgtError> {
    walker::assert_level_in_range(level);
    let geom = *eng.geom(level);
    let mut va = va_start;
    let mut pa = pa_start;

    while va < va_end {
        let index = geom.index_of(va);
        let entry_start = table_base_va | ((index as u64) << geom.shift);
        let entry_end = entry_start + geom.block_size();
        let seg_end = core::cmp::min(va_end, entry_end);
        let full_cover = entry_start >= va_start && entry_end <= va_end;
        let existing = view.get(index);
        let existing_kind = existing.kind(geom.is_page_level, eng.granule);

        if full_cover
            && walker::leaf_allowed(&geom)
            && (pa & geom.block_mask()) == 0
            && !matches!(existing_kind, EntryKind::Table { .. })
        {
            let bits = attrs.to_descriptor_bits(eng.stage);
            let new_leaf = Entry::new_leaf(pa, geom.is_page_level, bits, false, false);
            match existing_kind {
                EntryKind::Invalid => {
                    view.set(index, new_leaf);
                    eng.tlb.dsb(eng.outer_shareable);
                    eng.trace.map_leaf(entry_start, pa, geom.block_size());
                }
                EntryKind::Leaf { addr } if addr == pa && existing.attrs_bits() == new_leaf.attrs_bits() => {
                    // Already mapped exactly this way - idempotent.
                }
                EntryKind::Leaf { .. } if try_map => return Err(PgtError::ExistingMapping),
                EntryKind::Leaf { .. }
                    if !existing.contiguous()
                        && existing.non_access_attrs_bits() == new_leaf.non_access_attrs_bits() =>
                {
                    // §4.2.2: differs only in access permissions/XN - rewrite
                    // those fields in place instead of break-before-make.
                    view.set(index, existing.with_access_bits(new_leaf.access_bits()));
                    walker::invalidate_for_stage(
                        eng.tlb,
                        eng.stage,
                        entry_start,
                        geom.block_size(),
                        eng.granule.page_size(),
                    );
                    eng.tlb.dsb(eng.outer_shareable);
                    eng.trace.tlb_invalidate(entry_start, geom.block_size());
                }
                EntryKind::Leaf { .. } => {
                    // Non-trivial modify, fully covered: replace via BBM.
                    let stage = eng.stage;
                    let page_size = eng.granule.page_size();
                    let block_size = geom.block_size();
                    bbm::replace_descriptor(
                        eng.bbm,
                        eng.tlb,
                        eng.outer_shareable,
                        |tlb| invalidate_for_stage(tlb, stage, entry_start, block_size, page_size),
                        |use_nt| {
                            let e = if use_nt { new_leaf.with_nt(true) } else { new_leaf };
                            view.set(index, e);
                        },
                    );
                    eng.trace.map_leaf(entry_start, pa, geom.block_size());
                }
                EntryKind::Table { .. } => unreachable!("excluded above"),
            }
        } else {
            match existing_kind {
                EntryKind::Invalid => {
                    let child_geom = *eng.geom(level + 1);
                    let (handle, mut child_view) = walker::alloc_child(eng.alloc, &child_geom)?;
                    view.set(index, Entry::new_table(handle.phys, 0, eng.granule));
                    eng.tlb.dsb(eng.outer_shareable);
                    map_level(
                        eng,
                        &mut child_view,
                        level + 1,
                        entry_start,
                        core::cmp::max(va_start, entry_start),
                        seg_end,
                        pa,
                        attrs,
                        try_map,
                    )?;
                    walker::sync_refcount(view, index, &child_view, eng.granule);
                    try_merge(eng, view, index, &geom, &child_view, &child_geom, entry_start)?;
                }
                EntryKind::Table { .. } => {
                    let child_geom = *eng.geom(level + 1);
                    let mut child_view =
                        unsafe { walker::open_child(eng.alloc, existing, eng.granule, &child_geom) };
                    map_level(
                        eng,
                        &mut child_view,
                        level + 1,
                        entry_start,
                        core::cmp::max(va_start, entry_start),
                        seg_end,
                        pa,
                        attrs,
                        try_map,
                    )?;
                    walker::sync_refcount(view, index, &child_view, eng.granule);
                    try_merge(eng, view, index, &geom, &child_view, &child_geom, entry_start)?;
                }
                EntryKind::Leaf { addr } => {
                    split_block(eng, view, index, &geom, addr)?;
                    // Retry this slot now that it's a table.
                    continue;
                }
            }
        }

        pa += seg_end - va;
        va = seg_end;
    }
    Ok(())
}

/// Splits an existing block/page leaf into a freshly allocated child
/// table whose entries reproduce the original mapping, then installs
/// the child table in place of the leaf via a break-before-make
/// sequence. Grounded on `pgtable.c`'s block-split sub-algorithm.
pub(crate) fn split_block<A: PageAllocator, T: TlbOps, R: PgtTrace>(
    eng: &mut Engine<A, T, R>,
    view: &mut TableView,
    index: usize,
    geom: &LevelGeometry,
    block_addr: u64,
) -> Result<(), PgtError> {
    let level = geom.level;
    let child_geom = *eng.geom(level + 1);
    let old_entry = view.get(index);
    let attrs_bits_raw = old_entry.attrs_bits();
    let (handle, mut child_view) = walker::alloc_child(eng.alloc, &child_geom)?;

    for i in 0..child_view.len() {
        let child_addr = block_addr + (i as u64) * child_geom.block_size();
        let mut raw = attrs_bits_raw | (child_addr & 0x0000_FFFF_FFFF_F000) | 1;
        if child_geom.is_page_level {
            raw |= 0b10;
        }
        child_view.set(i, Entry::from_raw(raw));
    }

    let new_table = Entry::new_table(handle.phys, child_view.len() as u32, eng.granule);
    let entry_start = block_addr;
    let block_size = geom.block_size();
    let stage = eng.stage;
    let page_size = eng.granule.page_size();

    bbm::replace_descriptor(
        eng.bbm,
        eng.tlb,
        eng.outer_shareable,
        |tlb| invalidate_for_stage(tlb, stage, entry_start, block_size, page_size),
        |use_nt| {
            let e = if use_nt { new_table.with_nt(true) } else { new_table };
            view.set(index, e);
        },
    );
    eng.trace.split_block(entry_start, block_size, child_geom.block_size());
    Ok(())
}

/// Collapses `child` into a single larger leaf in `parent` when every
/// entry is a valid, identically-attributed, address-contiguous leaf.
fn try_merge<A: PageAllocator, T: TlbOps, R: PgtTrace>(
    eng: &mut Engine<A, T, R>,
    parent: &mut TableView,
    parent_index: usize,
    parent_geom: &LevelGeometry,
    child: &TableView,
    child_geom: &LevelGeometry,
    entry_start: u64,
) -> Result<(), PgtError> {
    if !walker::leaf_allowed(parent_geom) {
        return Ok(());
    }
    if child.len() == 0 {
        return Ok(());
    }
    let first = child.get(0);
    if !first.is_valid() || first.is_table(child_geom.is_page_level) {
        return Ok(());
    }
    let base_addr = first.output_address(eng.granule);
    if base_addr & parent_geom.block_mask() != 0 {
        return Ok(());
    }
    for i in 0..child.len() {
        let e = child.get(i);
        if !e.is_valid() || e.is_table(child_geom.is_page_level) {
            return Ok(());
        }
        if e.attrs_bits() != first.attrs_bits() {
            return Ok(());
        }
        let expected = base_addr + (i as u64) * child_geom.block_size();
        if e.output_address(eng.granule) != expected {
            return Ok(());
        }
    }

    let child_phys = parent.get(parent_index).output_address(eng.granule);

    // Attribute bits are positionally identical between block and page
    // descriptors, so the uniform child leaf's bits can be reused
    // directly for the merged parent leaf.
    let mut raw = first.attrs_bits() | (base_addr & 0x0000_FFFF_FFFF_F000) | 1;
    if parent_geom.is_page_level {
        raw |= 0b10;
    } else {
        raw &= !0b10u64;
    }

    let stage = eng.stage;
    let page_size = eng.granule.page_size();
    let block_size = parent_geom.block_size();
    bbm::replace_descriptor(
        eng.bbm,
        eng.tlb,
        eng.outer_shareable,
        |tlb| invalidate_for_stage(tlb, stage, entry_start, block_size, page_size),
        |_use_nt| {
            parent.set(parent_index, Entry::from_raw(raw));
        },
    );
    let child_virt = eng.alloc.phys_to_virt(child_phys);
    walker::free_child(
        eng.alloc,
        crate::pgtable::alloc::TableHandle { phys: child_phys, virt: child_virt },
        child_geom,
    );
    eng.trace.merge_block(entry_start, block_size);
    Ok(())
}
