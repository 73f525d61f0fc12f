//! Break-before-make policy.
//!
//! The original walker (`pgtable.c`) picks its BBM sequence via
//! preprocessor guards on `CPU_PGTABLE_BBM_LEVEL`/
//! `PLATFORM_PGTABLE_AVOID_BBM`:
//!
//! ```c
//! #if (CPU_PGTABLE_BBM_LEVEL < 2U) && !defined(PLATFORM_PGTABLE_AVOID_BBM)
//!     dsb(margs->outer_shareable);   // wait for TLB flush before install
//! #endif
//!     set_pgtables(...);
//! #if (CPU_PGTABLE_BBM_LEVEL >= 2U) || defined(PLATFORM_PGTABLE_AVOID_BBM)
//!     dsb(...); tlbi(...);            // flush old entry after install
//! #endif
//! ```
//!
//! Here the same three capability classes are a runtime enum (see
//! SPEC_FULL.md §2 on why this is a runtime rather than compile-time
//! choice) and the sequence is one function instead of scattered `cfg`
//! guards.

use crate::pgtable::tlb::TlbOps;

/// Hardware break-before-make capability class (spec §5).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BbmClass {
    /// No BBM hazard for changes that only add permissions/mappings;
    /// the CPU tolerates the transient invalid descriptor without a
    /// flush beforehand.
    Level0,
    /// Requires flushing the old translation before the new descriptor
    /// is visible, but not the nT bit.
    Level1,
    /// Requires the nT bit during the transition and flushes only after
    /// the new descriptor is installed. Also used for platforms that
    /// avoid BBM hazards entirely via a different erratum workaround.
    Level2OrAvoidBbm,
}

impl BbmClass {
    fn pre_invalidate(self) -> bool {
        matches!(self, BbmClass::Level0 | BbmClass::Level1)
    }

    fn use_nt(self) -> bool {
        matches!(self, BbmClass::Level2OrAvoidBbm)
    }

    fn post_invalidate(self) -> bool {
        matches!(self, BbmClass::Level2OrAvoidBbm)
    }
}

/// Runs a break-before-make replacement of one descriptor slot.
///
/// `invalidate` issues the TLB maintenance for the old mapping
/// (`va`/`size`) and `install` writes the new descriptor. `install`
/// receives `use_nt` so it can set the nT bit on a class-2 sequence,
/// suppressing TLB caching of the intermediate state.
pub fn replace_descriptor(
    class: BbmClass,
    tlb: &dyn TlbOps,
    outer_shareable: bool,
    invalidate: impl FnOnce(&dyn TlbOps),
    install: impl FnOnce(bool),
) {
    if class.pre_invalidate() {
        invalidate(tlb);
        tlb.dsb(outer_shareable);
        install(class.use_nt());
    } else if class.post_invalidate() {
        install(class.use_nt());
        tlb.dsb(outer_shareable);
        invalidate(tlb);
        tlb.dsb(outer_shareable);
    } else {
        install(class.use_nt());
    }

    tlb.isb();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn level0_never_flushes() {
        assert!(!BbmClass::Level0.pre_invalidate());
        assert!(!BbmClass::Level0.post_invalidate());
        assert!(!BbmClass::Level0.use_nt());
    }

    #[test]
    fn level2_or_avoid_bbm_uses_nt_and_post_flush() {
        assert!(BbmClass::Level2OrAvoidBbm.use_nt());
        assert!(BbmClass::Level2OrAvoidBbm.post_invalidate());
        assert!(!BbmClass::Level2OrAvoidBbm.pre_invalidate());
    }

    #[test]
    fn level1_pre_flushes_without_nt() {
        assert!(BbmClass::Level1.pre_invalidate());
        assert!(!BbmClass::Level1.use_nt());
        assert!(!BbmClass::Level1.post_invalidate());
    }
}
