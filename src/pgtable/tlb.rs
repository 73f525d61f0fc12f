//! TLB maintenance and barrier facade.
//!
//! Portable trait version of the raw `asm!` sequences in
//! `ffa/stage2_walker.rs` (`tlbi_all`/`tlbi_ipa`) and
//! `arch/aarch64/mm/mmu.rs::init_stage2` (`tlbi vmalls12e1is` / `dsb sy`
//! / `isb`), generalized to the full operation set spec §6 requires.

/// TLB invalidation and barrier operations a controller needs. One
/// implementation per architecture; the aarch64 implementation
/// (`arch::aarch64::Aarch64Tlb`) issues the real instructions, the
/// `#[cfg(test)]` mock in `testutil` records calls for assertion.
pub trait TlbOps {
    /// Invalidate one stage-1 EL2 VA translation.
    fn tlbi_va_e2(&self, va: u64);
    /// Invalidate a range of stage-1 EL2 VA translations.
    fn tlbi_va_range_e2(&self, va: u64, num_pages: u64);
    /// Invalidate one stage-2 IPA translation for the current VMID.
    fn tlbi_ipas2e1(&self, ipa: u64);
    /// Invalidate a range of stage-2 IPA translations for the current VMID.
    fn tlbi_ipas2e1_range(&self, ipa: u64, num_pages: u64);
    /// Invalidate all stage-1 EL1/EL0 translations for the current VMID.
    fn tlbi_vmalle1(&self);
    /// Invalidate all EL2 translations, inner shareable.
    fn tlbi_alle2is(&self);
    /// Data synchronization barrier. `outer_shareable` selects `dsb osh`
    /// over the (default) `dsb ish`.
    fn dsb(&self, outer_shareable: bool);
    /// Instruction synchronization barrier.
    fn isb(&self);
}
