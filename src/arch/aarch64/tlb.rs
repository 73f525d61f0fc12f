//! aarch64 implementation of the TLB/barrier facade.
//!
//! Raw instruction sequences follow `ffa/stage2_walker.rs::tlbi_all`/
//! `tlbi_ipa` and `arch/aarch64/mm/mmu.rs::init_stage2`.

use crate::pgtable::tlb::TlbOps;

pub struct Aarch64Tlb;

impl TlbOps for Aarch64Tlb {
    fn tlbi_va_e2(&self, va: u64) {
        let arg = va >> 12;
        unsafe {
            core::arch::asm!("tlbi vae2is, {0}", in(reg) arg, options(nostack));
        }
    }

    fn tlbi_va_range_e2(&self, va: u64, num_pages: u64) {
        // TLBI RVAE2IS operand: base page number in low bits, NUM/SCALE/TTL
        // left at 0 (one page per call) for simplicity - callers loop per
        // page-group boundary rather than relying on range encoding.
        for i in 0..num_pages {
            self.tlbi_va_e2(va + i * 4096);
        }
    }

    fn tlbi_ipas2e1(&self, ipa: u64) {
        let arg = ipa >> 12;
        unsafe {
            core::arch::asm!("tlbi ipas2e1is, {0}", in(reg) arg, options(nostack));
        }
    }

    fn tlbi_ipas2e1_range(&self, ipa: u64, num_pages: u64) {
        for i in 0..num_pages {
            self.tlbi_ipas2e1(ipa + i * 4096);
        }
    }

    fn tlbi_vmalle1(&self) {
        unsafe {
            core::arch::asm!("tlbi vmalle1is", options(nostack));
        }
    }

    fn tlbi_alle2is(&self) {
        unsafe {
            core::arch::asm!("tlbi alle2is", options(nostack));
        }
    }

    fn dsb(&self, outer_shareable: bool) {
        unsafe {
            if outer_shareable {
                core::arch::asm!("dsb osh", options(nostack));
            } else {
                core::arch::asm!("dsb ish", options(nostack));
            }
        }
    }

    fn isb(&self) {
        unsafe {
            core::arch::asm!("isb", options(nostack));
        }
    }
}
