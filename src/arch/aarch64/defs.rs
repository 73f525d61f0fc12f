//! ARM64 VMSA Architecture Constants
//!
//! Named constants for system register fields used to program Stage-1
//! (EL2) and Stage-2 translation. Eliminates magic numbers in
//! `pgtable::sysregs`.

// ── VTCR_EL2 / TCR_EL2 shared field positions ───────────────────────
pub const VTCR_T0SZ_SHIFT: u64 = 0;
pub const VTCR_SL0_SHIFT: u64 = 6;
pub const VTCR_IRGN0_SHIFT: u64 = 8;
pub const VTCR_ORGN0_SHIFT: u64 = 10;
pub const VTCR_SH0_SHIFT: u64 = 12;
pub const VTCR_TG0_SHIFT: u64 = 14;
pub const VTCR_PS_SHIFT: u64 = 16;
pub const VTCR_VS_SHIFT: u64 = 19;

pub const IRGN0_WB_WA: u64 = 0b01;
pub const ORGN0_WB_WA: u64 = 0b01;
pub const SH0_INNER: u64 = 0b11;

pub const TG0_4KB: u64 = 0b00;
pub const TG0_64KB: u64 = 0b01;
pub const TG0_16KB: u64 = 0b10;

pub const PS_32BIT: u64 = 0b000;
pub const PS_36BIT: u64 = 0b001;
pub const PS_40BIT: u64 = 0b010;
pub const PS_42BIT: u64 = 0b011;
pub const PS_44BIT: u64 = 0b100;
pub const PS_48BIT: u64 = 0b101;
pub const PS_52BIT: u64 = 0b110;

// ── HCR_EL2 bits relevant to enabling Stage-2 translation ───────────
pub const HCR_VM: u64 = 1 << 0;

// ── Descriptor bit positions (shared by all granules) ───────────────
pub const DESC_VALID: u64 = 1 << 0;
pub const DESC_TABLE_OR_PAGE: u64 = 1 << 1;
pub const DESC_AF: u64 = 1 << 10;
pub const DESC_NT: u64 = 1 << 16;
pub const DESC_CONTIGUOUS: u64 = 1 << 52;

pub const AARCH64_INSN_SIZE: u64 = 4;
