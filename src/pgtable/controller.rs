//! Address-space controllers (spec §4.6).
//!
//! Generalizes `Stage2Config`/`Vm` pairing (`arch/aarch64/mm/mmu.rs`,
//! `vm.rs`) into one `Controller` type shared by both the EL2
//! hypervisor's own stage-1 mapping and a guest's stage-2 mapping,
//! distinguished only by `Stage`. Callers serialize access with
//! `sync::SpinLock`, matching spec §5's "one controller mutex, no
//! concurrent mutation of the same range" model.

use crate::pgtable::alloc::{PageAllocator, TableHandle};
use crate::pgtable::attrs::AttributeFields;
use crate::pgtable::bbm::BbmClass;
use crate::pgtable::dump::{self, DumpEntry};
use crate::pgtable::error::PgtError;
use crate::pgtable::level::{self, Granule, LevelGeometry, MAX_LEVELS};
use crate::pgtable::modifiers::{lookup, map, prealloc, unmap};
use crate::pgtable::sysregs::{self, Vtcr, Vttbr};
use crate::pgtable::table::TableView;
use crate::pgtable::tlb::TlbOps;
use crate::pgtable::trace::PgtTrace;
use crate::pgtable::txn::TransactionGuard;
use crate::pgtable::walker::Stage;

/// How much of a drained sub-table the caller wants to keep around
/// rather than have `unmap` free it (spec §3 invariant 2, §4.3 point 4).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Preserved {
    /// Free any sub-table that drains to zero live entries.
    None,
    /// Never free a drained sub-table - used to keep a `prealloc`
    /// skeleton intact across an overlapping unmap.
    All,
    /// Free a drained sub-table only if it covers at least this many
    /// bytes of address space.
    Size(u64),
}

impl Preserved {
    fn threshold(self) -> u64 {
        match self {
            Preserved::None => 0,
            Preserved::All => u64::MAX,
            Preserved::Size(bytes) => bytes,
        }
    }
}

/// Borrowed collaborators plus derived geometry, passed down through a
/// whole modifier call. Not stored anywhere - built fresh on each
/// `Controller` method call from borrows that don't outlive it.
pub struct Engine<'a, A: PageAllocator, T: TlbOps, R: PgtTrace> {
    pub alloc: &'a mut A,
    pub tlb: &'a T,
    pub trace: &'a mut R,
    pub granule: Granule,
    pub geoms: [LevelGeometry; MAX_LEVELS],
    pub bbm: BbmClass,
    pub outer_shareable: bool,
    pub stage: Stage,
}

impl<'a, A: PageAllocator, T: TlbOps, R: PgtTrace> Engine<'a, A, T, R> {
    pub fn geom(&self, level: u8) -> &LevelGeometry {
        &self.geoms[level as usize]
    }

    /// Issues the stage-appropriate TLB invalidation for a VA/IPA range.
    pub fn invalidate_range(&self, addr: u64, size: u64) {
        let page = self.granule.page_size();
        let num_pages = (size / page).max(1);
        match self.stage {
            Stage::Hyp => self.tlb.tlbi_va_range_e2(addr, num_pages),
            Stage::Vm => self.tlb.tlbi_ipas2e1_range(addr, num_pages),
        }
    }
}

/// One translation-table root and the configuration needed to walk it.
pub struct Controller {
    pub root: TableHandle,
    pub granule: Granule,
    pub start_level: u8,
    pub stage: Stage,
    pub bbm: BbmClass,
    /// Number of significant address bits (T0SZ-derived range).
    pub address_bits: u32,
    /// Stage-2 only: the VMID this controller's mappings are tagged with.
    pub vmid: Option<u16>,
    /// Stage-2 only: VTCR_EL2 image cached at init time (spec §4.6, §6).
    pub vtcr: Option<Vtcr>,
    /// Stage-2 only: VTTBR_EL2 image cached at init time (spec §4.6, §6).
    pub vttbr: Option<Vttbr>,
}

impl Controller {
    pub fn new(
        alloc: &mut impl PageAllocator,
        granule: Granule,
        address_bits: u32,
        stage: Stage,
        bbm: BbmClass,
        vmid: Option<u16>,
    ) -> Result<Self, PgtError> {
        if address_bits == 0 || address_bits > 52 {
            return Err(PgtError::ArgumentInvalid);
        }
        match (stage, vmid) {
            (Stage::Vm, None) | (Stage::Hyp, Some(_)) => return Err(PgtError::ArgumentInvalid),
            _ => {}
        }
        let start_level = level::start_level_for_bits(granule, address_bits);
        let geoms = granule.geometry();
        let geom0 = &geoms[start_level as usize];
        let size = geom0.entries_per_table() * core::mem::size_of::<u64>();
        let root = alloc.alloc_table(size)?;
        let (vtcr, vttbr) = match stage {
            Stage::Vm => (
                Some(sysregs::build_vtcr(granule, address_bits, start_level)),
                Some(sysregs::build_vttbr(root.phys, vmid.unwrap())),
            ),
            Stage::Hyp => (None, None),
        };
        Ok(Self { root, granule, start_level, stage, bbm, address_bits, vmid, vtcr, vttbr })
    }

    fn root_view(&self) -> TableView {
        let geom = &self.granule.geometry()[self.start_level as usize];
        unsafe { TableView::new(self.root, geom) }
    }

    fn check_range(&self, addr: u64, size: u64, align: u64) -> Result<(), PgtError> {
        if size == 0 {
            return Err(PgtError::ArgumentInvalid);
        }
        if addr & (align - 1) != 0 || size & (align - 1) != 0 {
            return Err(PgtError::ArgumentAlignment);
        }
        let end = addr.checked_add(size).ok_or(PgtError::AddrOverflow)?;
        let limit = if self.address_bits >= 64 { u64::MAX } else { 1u64 << self.address_bits };
        if end > limit {
            return Err(PgtError::AddrInvalid);
        }
        Ok(())
    }

    fn engine<'a, A: PageAllocator, T: TlbOps, R: PgtTrace>(
        &self,
        alloc: &'a mut A,
        tlb: &'a T,
        trace: &'a mut R,
        outer_shareable: bool,
    ) -> Engine<'a, A, T, R> {
        Engine {
            alloc,
            tlb,
            trace,
            granule: self.granule,
            geoms: self.granule.geometry(),
            bbm: self.bbm,
            outer_shareable,
            stage: self.stage,
        }
    }

    /// Begins one controller transaction (spec §4.6 `start`). The real
    /// mutex/preemption discipline lives with the caller (see module
    /// docs); this only guards against a reentrant call on the same CPU.
    fn start(&self) -> TransactionGuard {
        TransactionGuard::begin()
    }

    /// Ends one controller transaction (spec §4.6 `commit`, §5). Stage-1
    /// only needs the barrier that orders prior descriptor writes before
    /// they become visible; stage-2 additionally flushes the combined
    /// stage-1+stage-2 translation cache for this VMID, since per-entry
    /// invalidation during the walk only covers IPA-tagged entries.
    fn commit<T: TlbOps>(&self, tlb: &T, outer_shareable: bool) {
        match self.stage {
            Stage::Hyp => tlb.dsb(outer_shareable),
            Stage::Vm => {
                tlb.dsb(outer_shareable);
                tlb.tlbi_vmalle1();
                tlb.dsb(outer_shareable);
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn map_with(
        &mut self,
        alloc: &mut impl PageAllocator,
        tlb: &impl TlbOps,
        trace: &mut impl PgtTrace,
        addr: u64,
        output_addr: u64,
        size: u64,
        attrs: AttributeFields,
        outer_shareable: bool,
        try_map: bool,
    ) -> Result<(), PgtError> {
        self.check_range(addr, size, self.granule.page_size())?;
        if output_addr & (self.granule.page_size() - 1) != 0 {
            return Err(PgtError::ArgumentAlignment);
        }
        let _txn = self.start();
        let mut eng = self.engine(alloc, tlb, trace, outer_shareable);
        let mut root = self.root_view();
        let result = map::map_level(
            &mut eng,
            &mut root,
            self.start_level,
            0,
            addr,
            addr + size,
            output_addr,
            attrs,
            try_map,
        );
        self.commit(tlb, outer_shareable);
        result
    }

    /// Installs a new mapping, failing with `ExistingMapping` if the
    /// range already carries a different one (spec §4.6 `map`).
    #[allow(clippy::too_many_arguments)]
    pub fn map<A: PageAllocator, T: TlbOps, R: PgtTrace>(
        &mut self,
        alloc: &mut A,
        tlb: &T,
        trace: &mut R,
        addr: u64,
        output_addr: u64,
        size: u64,
        attrs: AttributeFields,
        outer_shareable: bool,
    ) -> Result<(), PgtError> {
        self.map_with(alloc, tlb, trace, addr, output_addr, size, attrs, outer_shareable, true)
    }

    /// Installs a mapping, replacing whatever is already there via the
    /// applicable break-before-make or in-place update path instead of
    /// erroring (spec §4.6 `remap`, §4.2 step 2, testable property #8).
    #[allow(clippy::too_many_arguments)]
    pub fn remap<A: PageAllocator, T: TlbOps, R: PgtTrace>(
        &mut self,
        alloc: &mut A,
        tlb: &T,
        trace: &mut R,
        addr: u64,
        output_addr: u64,
        size: u64,
        attrs: AttributeFields,
        outer_shareable: bool,
    ) -> Result<(), PgtError> {
        self.map_with(alloc, tlb, trace, addr, output_addr, size, attrs, outer_shareable, false)
    }

    /// Stage-1 convenience entry point: behaves exactly like `map` (this
    /// engine always attempts the opportunistic sub-table merge from
    /// spec.md §4.2.1), documenting intent for hypervisor self-mapping
    /// call sites. Grounded on `pgtable_hyp_map_merge` in `pgtable.c`.
    #[allow(clippy::too_many_arguments)]
    pub fn map_merge<A: PageAllocator, T: TlbOps, R: PgtTrace>(
        &mut self,
        alloc: &mut A,
        tlb: &T,
        trace: &mut R,
        addr: u64,
        output_addr: u64,
        size: u64,
        attrs: AttributeFields,
        outer_shareable: bool,
    ) -> Result<(), PgtError> {
        debug_assert!(self.stage == Stage::Hyp, "map_merge is a stage-1 entry point");
        self.map(alloc, tlb, trace, addr, output_addr, size, attrs, outer_shareable)
    }

    #[allow(clippy::too_many_arguments)]
    fn unmap_with(
        &mut self,
        alloc: &mut impl PageAllocator,
        tlb: &impl TlbOps,
        trace: &mut impl PgtTrace,
        addr: u64,
        size: u64,
        phys_filter: Option<(u64, u64)>,
        preserved: Preserved,
        outer_shareable: bool,
    ) -> Result<(), PgtError> {
        self.check_range(addr, size, self.granule.page_size())?;
        let _txn = self.start();
        let mut eng = self.engine(alloc, tlb, trace, outer_shareable);
        let mut root = self.root_view();
        let result = unmap::unmap_level(
            &mut eng,
            &mut root,
            self.start_level,
            0,
            addr,
            addr + size,
            phys_filter,
            preserved.threshold(),
        );
        self.commit(tlb, outer_shareable);
        result
    }

    /// Tears down mappings in `[addr, addr+size)` (spec §4.6 `unmap`,
    /// §4.3). `preserved` controls whether a sub-table that drains to
    /// zero live entries is freed or kept intact (§3 invariant 2).
    pub fn unmap<A: PageAllocator, T: TlbOps, R: PgtTrace>(
        &mut self,
        alloc: &mut A,
        tlb: &T,
        trace: &mut R,
        addr: u64,
        size: u64,
        preserved: Preserved,
        outer_shareable: bool,
    ) -> Result<(), PgtError> {
        self.unmap_with(alloc, tlb, trace, addr, size, None, preserved, outer_shareable)
    }

    /// Tears down only the leaves in `[addr, addr+size)` whose output
    /// address falls inside `[phys, phys+phys_size)` (spec §4.6
    /// `unmap_matching`, §4.3.1's `UNMAP_MATCH` event).
    #[allow(clippy::too_many_arguments)]
    pub fn unmap_matching<A: PageAllocator, T: TlbOps, R: PgtTrace>(
        &mut self,
        alloc: &mut A,
        tlb: &T,
        trace: &mut R,
        addr: u64,
        phys: u64,
        size: u64,
        preserved: Preserved,
        outer_shareable: bool,
    ) -> Result<(), PgtError> {
        self.unmap_with(alloc, tlb, trace, addr, size, Some((phys, size)), preserved, outer_shareable)
    }

    pub fn lookup<A: PageAllocator, T: TlbOps, R: PgtTrace>(
        &self,
        alloc: &mut A,
        tlb: &T,
        trace: &mut R,
        addr: u64,
    ) -> Result<lookup::LookupResult, PgtError> {
        self.check_range(addr, self.granule.page_size(), self.granule.page_size())?;
        let mut eng = self.engine(alloc, tlb, trace, false);
        let root = self.root_view();
        lookup::lookup_level(&mut eng, &root, self.start_level, 0, addr)
    }

    pub fn prealloc<A: PageAllocator, T: TlbOps, R: PgtTrace>(
        &mut self,
        alloc: &mut A,
        tlb: &T,
        trace: &mut R,
        addr: u64,
        size: u64,
        target_level: u8,
        outer_shareable: bool,
    ) -> Result<(), PgtError> {
        self.check_range(addr, size, self.granule.page_size())?;
        if target_level as usize >= MAX_LEVELS || target_level <= self.start_level {
            return Err(PgtError::ArgumentInvalid);
        }
        let _txn = self.start();
        let mut eng = self.engine(alloc, tlb, trace, outer_shareable);
        let mut root = self.root_view();
        let result = prealloc::prealloc_level(
            &mut eng,
            &mut root,
            self.start_level,
            0,
            addr,
            addr + size,
            target_level,
        );
        self.commit(tlb, outer_shareable);
        result
    }

    /// Walks `[addr, addr+size)` read-only, reporting each mapped leaf.
    /// See `dump` module docs for why this exists (spec.md's `DUMP`
    /// event tag, undocumented in spec.md's per-modifier sections).
    pub fn dump<A: PageAllocator, T: TlbOps, R: PgtTrace>(
        &self,
        alloc: &mut A,
        tlb: &T,
        trace: &mut R,
        addr: u64,
        size: u64,
        sink: &mut dyn FnMut(DumpEntry),
    ) -> Result<(), PgtError> {
        self.check_range(addr, size, self.granule.page_size())?;
        let mut eng = self.engine(alloc, tlb, trace, false);
        let root = self.root_view();
        dump::dump_level(&mut eng, &root, self.start_level, 0, addr, addr + size, sink)
    }

    /// Unmaps the controller's entire address space and frees the root
    /// table (spec §4.6 `destroy`). Must be called from outside a
    /// transaction and is the last operation performed on `self`.
    pub fn destroy<A: PageAllocator, T: TlbOps, R: PgtTrace>(
        mut self,
        alloc: &mut A,
        tlb: &T,
        trace: &mut R,
    ) -> Result<(), PgtError> {
        let limit = if self.address_bits >= 64 { u64::MAX } else { 1u64 << self.address_bits };
        self.unmap(alloc, tlb, trace, 0, limit, Preserved::None, false)?;
        let geom = self.granule.geometry()[self.start_level as usize];
        let size = geom.entries_per_table() * core::mem::size_of::<u64>();
        unsafe { alloc.free_table(self.root, size) };
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pgtable::attrs::{AccessPermissions, MemoryKind};
    use crate::testutil::{MockAllocator, MockTlb, RecordingTrace};

    fn small_controller(alloc: &mut MockAllocator) -> Controller {
        Controller::new(alloc, Granule::G4K, 32, Stage::Vm, BbmClass::Level1, Some(1)).unwrap()
    }

    fn hyp_controller(alloc: &mut MockAllocator) -> Controller {
        Controller::new(alloc, Granule::G4K, 32, Stage::Hyp, BbmClass::Level1, None).unwrap()
    }

    #[test]
    fn map_then_lookup_single_page() {
        let mut alloc = MockAllocator::new();
        let mut ctrl = small_controller(&mut alloc);
        let tlb = MockTlb::new();
        let mut trace = RecordingTrace::default();
        let attrs = AttributeFields { kind: MemoryKind::Normal, perms: AccessPermissions::RW, shareable: true };

        ctrl.map(&mut alloc, &tlb, &mut trace, 0x1000, 0x9000, 0x1000, attrs, false).unwrap();
        let result = ctrl.lookup(&mut alloc, &tlb, &mut trace, 0x1000).unwrap();
        assert_eq!(result.output_addr, 0x9000);
        assert_eq!(result.size, 0x1000);
    }

    #[test]
    fn mapping_same_range_twice_identically_is_idempotent() {
        let mut alloc = MockAllocator::new();
        let mut ctrl = small_controller(&mut alloc);
        let tlb = MockTlb::new();
        let mut trace = RecordingTrace::default();
        let attrs = AttributeFields { kind: MemoryKind::Normal, perms: AccessPermissions::RW, shareable: true };

        ctrl.map(&mut alloc, &tlb, &mut trace, 0x2000, 0xA000, 0x1000, attrs, false).unwrap();
        ctrl.map(&mut alloc, &tlb, &mut trace, 0x2000, 0xA000, 0x1000, attrs, false).unwrap();
    }

    #[test]
    fn remapping_conflicting_range_fails() {
        let mut alloc = MockAllocator::new();
        let mut ctrl = small_controller(&mut alloc);
        let tlb = MockTlb::new();
        let mut trace = RecordingTrace::default();
        let attrs = AttributeFields { kind: MemoryKind::Normal, perms: AccessPermissions::RW, shareable: true };

        ctrl.map(&mut alloc, &tlb, &mut trace, 0x3000, 0xB000, 0x1000, attrs, false).unwrap();
        let err = ctrl
            .map(&mut alloc, &tlb, &mut trace, 0x3000, 0xC000, 0x1000, attrs, false)
            .unwrap_err();
        assert_eq!(err, PgtError::ExistingMapping);
    }

    #[test]
    fn map_then_unmap_then_lookup_fails() {
        let mut alloc = MockAllocator::new();
        let mut ctrl = small_controller(&mut alloc);
        let tlb = MockTlb::new();
        let mut trace = RecordingTrace::default();
        let attrs = AttributeFields { kind: MemoryKind::Normal, perms: AccessPermissions::RW, shareable: true };

        ctrl.map(&mut alloc, &tlb, &mut trace, 0x4000, 0xD000, 0x1000, attrs, false).unwrap();
        ctrl.unmap(&mut alloc, &tlb, &mut trace, 0x4000, 0x1000, Preserved::None, false).unwrap();
        let err = ctrl.lookup(&mut alloc, &tlb, &mut trace, 0x4000).unwrap_err();
        assert_eq!(err, PgtError::AddrInvalid);
    }

    #[test]
    fn misaligned_map_is_rejected() {
        let mut alloc = MockAllocator::new();
        let mut ctrl = small_controller(&mut alloc);
        let tlb = MockTlb::new();
        let mut trace = RecordingTrace::default();
        let attrs = AttributeFields { kind: MemoryKind::Normal, perms: AccessPermissions::RW, shareable: true };

        let err = ctrl
            .map(&mut alloc, &tlb, &mut trace, 0x10, 0x9000, 0x1000, attrs, false)
            .unwrap_err();
        assert_eq!(err, PgtError::ArgumentAlignment);
    }

    #[test]
    fn prealloc_creates_intermediate_tables_without_leaves() {
        let mut alloc = MockAllocator::new();
        let mut ctrl = small_controller(&mut alloc);
        let tlb = MockTlb::new();
        let mut trace = RecordingTrace::default();

        ctrl.prealloc(&mut alloc, &tlb, &mut trace, 0x5000, 0x1000, 3, false).unwrap();
        let err = ctrl.lookup(&mut alloc, &tlb, &mut trace, 0x5000).unwrap_err();
        assert_eq!(err, PgtError::AddrInvalid);
    }

    #[test]
    fn remap_over_conflicting_mapping_replaces_it() {
        let mut alloc = MockAllocator::new();
        let mut ctrl = small_controller(&mut alloc);
        let tlb = MockTlb::new();
        let mut trace = RecordingTrace::default();
        let attrs = AttributeFields { kind: MemoryKind::Normal, perms: AccessPermissions::RW, shareable: true };
        let other = AttributeFields { kind: MemoryKind::Device, perms: AccessPermissions::RW, shareable: false };

        ctrl.map(&mut alloc, &tlb, &mut trace, 0x6000, 0xF000, 0x1000, attrs, false).unwrap();
        ctrl.remap(&mut alloc, &tlb, &mut trace, 0x6000, 0x10000, 0x1000, other, false).unwrap();
        let result = ctrl.lookup(&mut alloc, &tlb, &mut trace, 0x6000).unwrap();
        assert_eq!(result.output_addr, 0x10000);
    }

    #[test]
    fn remap_with_only_access_change_updates_in_place() {
        let mut alloc = MockAllocator::new();
        let mut ctrl = small_controller(&mut alloc);
        let tlb = MockTlb::new();
        let mut trace = RecordingTrace::default();
        let rw = AttributeFields { kind: MemoryKind::Normal, perms: AccessPermissions::RW, shareable: true };
        let ro = AttributeFields { kind: MemoryKind::Normal, perms: AccessPermissions::RO, shareable: true };

        ctrl.map(&mut alloc, &tlb, &mut trace, 0x7000, 0x11000, 0x1000, rw, false).unwrap();
        ctrl.remap(&mut alloc, &tlb, &mut trace, 0x7000, 0x11000, 0x1000, ro, false).unwrap();
        let result = ctrl.lookup(&mut alloc, &tlb, &mut trace, 0x7000).unwrap();
        assert_eq!(result.output_addr, 0x11000);
        // access-only change: no block split or merge trace, unlike BBM replace.
        assert_eq!(trace.split_calls, 0);
    }

    #[test]
    fn unmap_matching_skips_leaves_outside_phys_range() {
        let mut alloc = MockAllocator::new();
        let mut ctrl = small_controller(&mut alloc);
        let tlb = MockTlb::new();
        let mut trace = RecordingTrace::default();
        let attrs = AttributeFields { kind: MemoryKind::Normal, perms: AccessPermissions::RW, shareable: true };

        ctrl.map(&mut alloc, &tlb, &mut trace, 0x8000, 0x12000, 0x1000, attrs, false).unwrap();
        ctrl.unmap_matching(&mut alloc, &tlb, &mut trace, 0x8000, 0x99000, 0x1000, Preserved::None, false)
            .unwrap();
        // phys filter didn't match, mapping is untouched.
        let result = ctrl.lookup(&mut alloc, &tlb, &mut trace, 0x8000).unwrap();
        assert_eq!(result.output_addr, 0x12000);

        ctrl.unmap_matching(&mut alloc, &tlb, &mut trace, 0x8000, 0x12000, 0x1000, Preserved::None, false)
            .unwrap();
        let err = ctrl.lookup(&mut alloc, &tlb, &mut trace, 0x8000).unwrap_err();
        assert_eq!(err, PgtError::AddrInvalid);
    }

    #[test]
    fn preserved_all_keeps_drained_subtable_alive() {
        let mut alloc = MockAllocator::new();
        let mut ctrl = small_controller(&mut alloc);
        let tlb = MockTlb::new();
        let mut trace = RecordingTrace::default();

        ctrl.prealloc(&mut alloc, &tlb, &mut trace, 0x9000, 0x1000, 3, false).unwrap();
        ctrl.unmap(&mut alloc, &tlb, &mut trace, 0x9000, 0x1000, Preserved::All, false).unwrap();
        assert_eq!(trace.free_calls, 0);
    }

    #[test]
    fn preserved_none_frees_drained_subtable() {
        let mut alloc = MockAllocator::new();
        let mut ctrl = small_controller(&mut alloc);
        let tlb = MockTlb::new();
        let mut trace = RecordingTrace::default();

        ctrl.prealloc(&mut alloc, &tlb, &mut trace, 0xA000, 0x1000, 3, false).unwrap();
        ctrl.unmap(&mut alloc, &tlb, &mut trace, 0xA000, 0x1000, Preserved::None, false).unwrap();
        assert!(trace.free_calls > 0);
    }

    #[test]
    fn stage2_commit_issues_vmalle1_tlbi() {
        let mut alloc = MockAllocator::new();
        let mut ctrl = small_controller(&mut alloc);
        let tlb = MockTlb::new();
        let mut trace = RecordingTrace::default();
        let attrs = AttributeFields { kind: MemoryKind::Normal, perms: AccessPermissions::RW, shareable: true };

        ctrl.map(&mut alloc, &tlb, &mut trace, 0xB000, 0x13000, 0x1000, attrs, false).unwrap();
        assert_eq!(tlb.tlbi_vmalle1.get(), 1);
    }

    #[test]
    fn stage1_commit_does_not_issue_vmalle1_tlbi() {
        let mut alloc = MockAllocator::new();
        let mut ctrl = hyp_controller(&mut alloc);
        let tlb = MockTlb::new();
        let mut trace = RecordingTrace::default();
        let attrs = AttributeFields { kind: MemoryKind::Normal, perms: AccessPermissions::RW, shareable: true };

        ctrl.map(&mut alloc, &tlb, &mut trace, 0xC000, 0x14000, 0x1000, attrs, false).unwrap();
        assert_eq!(tlb.tlbi_vmalle1.get(), 0);
    }

    #[test]
    fn stage2_init_caches_vtcr_and_vttbr() {
        let mut alloc = MockAllocator::new();
        let ctrl = small_controller(&mut alloc);
        assert_eq!(ctrl.vmid, Some(1));
        assert!(ctrl.vtcr.is_some());
        assert!(ctrl.vttbr.is_some());
    }

    #[test]
    fn hyp_controller_has_no_vmid_or_stage2_sysregs() {
        let mut alloc = MockAllocator::new();
        let ctrl = hyp_controller(&mut alloc);
        assert_eq!(ctrl.vmid, None);
        assert!(ctrl.vtcr.is_none());
        assert!(ctrl.vttbr.is_none());
    }

    #[test]
    fn destroy_unmaps_everything_and_frees_root() {
        let mut alloc = MockAllocator::new();
        let mut ctrl = Controller::new(&mut alloc, Granule::G4K, 16, Stage::Vm, BbmClass::Level1, Some(2)).unwrap();
        let tlb = MockTlb::new();
        let mut trace = RecordingTrace::default();
        let attrs = AttributeFields { kind: MemoryKind::Normal, perms: AccessPermissions::RW, shareable: true };

        ctrl.map(&mut alloc, &tlb, &mut trace, 0x1000, 0x2000, 0x1000, attrs, false).unwrap();
        ctrl.destroy(&mut alloc, &tlb, &mut trace).unwrap();
    }
}
