//! System register image builder (spec §6).
//!
//! Generalizes `Stage2Config::new()`/`install()` (`arch/aarch64/mm/
//! mmu.rs`), which hardcoded a single 48-bit/4K VTCR_EL2 value, into a
//! builder driven by the controller's actual granule and address width,
//! plus the `SL0` field derived from `start_level`.

use crate::arch::aarch64::defs::*;
use crate::pgtable::level::Granule;

/// VTCR_EL2 (stage-2 translation control) image, not yet written to the
/// register - `install()` is the only place that touches hardware.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Vtcr(pub u64);

/// VTTBR_EL2 (stage-2 translation table base + VMID) image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Vttbr(pub u64);

pub fn granule_tg0(granule: Granule) -> u64 {
    match granule {
        Granule::G4K => TG0_4KB,
        Granule::G16K => TG0_16KB,
        Granule::G64K => TG0_64KB,
    }
}

pub fn ps_field_for_bits(address_bits: u32) -> u64 {
    match address_bits {
        0..=32 => PS_32BIT,
        33..=36 => PS_36BIT,
        37..=40 => PS_40BIT,
        41..=42 => PS_42BIT,
        43..=44 => PS_44BIT,
        45..=48 => PS_48BIT,
        _ => PS_52BIT,
    }
}

/// Builds a VTCR_EL2 image for a stage-2 controller.
///
/// `sl0` is the architecture's encoding of `start_level` (SL0 values
/// run in the opposite direction from level numbers: SL0=2 selects
/// level 0 for the 4K granule's 4-level layout).
pub fn build_vtcr(granule: Granule, address_bits: u32, start_level: u8) -> Vtcr {
    let t0sz = 64 - address_bits as u64;
    let sl0 = match granule {
        Granule::G4K => 2u64.saturating_sub(start_level as u64),
        Granule::G16K | Granule::G64K => 3u64.saturating_sub(start_level as u64),
    };
    let mut v = t0sz << VTCR_T0SZ_SHIFT;
    v |= sl0 << VTCR_SL0_SHIFT;
    v |= IRGN0_WB_WA << VTCR_IRGN0_SHIFT;
    v |= ORGN0_WB_WA << VTCR_ORGN0_SHIFT;
    v |= SH0_INNER << VTCR_SH0_SHIFT;
    v |= granule_tg0(granule) << VTCR_TG0_SHIFT;
    v |= ps_field_for_bits(address_bits) << VTCR_PS_SHIFT;
    Vtcr(v)
}

/// Builds a VTTBR_EL2 image: root table physical address (bits 47:1,
/// CnP at bit 0 left clear) plus VMID in bits 63:48.
pub fn build_vttbr(root_table_phys: u64, vmid: u16) -> Vttbr {
    Vttbr(((vmid as u64) << 48) | (root_table_phys & 0x0000_FFFF_FFFF_F000))
}

/// Writes VTCR_EL2/VTTBR_EL2 and enables stage-2 translation via
/// HCR_EL2.VM, matching `Stage2Config::install()` plus `init_stage2()`.
///
/// # Safety
/// Must only be called at EL2 with the calling vCPU/pCPU quiescent
/// with respect to the VM being configured.
#[cfg(target_arch = "aarch64")]
pub unsafe fn install(vtcr: Vtcr, vttbr: Vttbr) {
    core::arch::asm!(
        "msr vtcr_el2, {vtcr}",
        "msr vttbr_el2, {vttbr}",
        "isb",
        vtcr = in(reg) vtcr.0,
        vttbr = in(reg) vttbr.0,
        options(nostack),
    );
    let mut hcr: u64;
    core::arch::asm!("mrs {0}, hcr_el2", out(reg) hcr, options(nostack, nomem));
    hcr |= HCR_VM;
    core::arch::asm!("msr hcr_el2, {0}", "isb", in(reg) hcr, options(nostack));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vtcr_t0sz_matches_address_width() {
        let vtcr = build_vtcr(Granule::G4K, 40, 1);
        let t0sz = vtcr.0 & 0x3F;
        assert_eq!(t0sz, 24);
    }

    #[test]
    fn vttbr_preserves_table_address_and_vmid() {
        let vttbr = build_vttbr(0x8000_1000, 7);
        assert_eq!(vttbr.0 & 0x0000_FFFF_FFFF_F000, 0x8000_1000);
        assert_eq!(vttbr.0 >> 48, 7);
    }
}
