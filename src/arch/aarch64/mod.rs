//! ARM64/AArch64 architecture support
//!
//! Hardware-touching pieces of the translation-table engine: system
//! register field definitions and the TLB/barrier facade implementation.
//! Everything else in `pgtable` is architecture-portable and builds on
//! any host target.

pub mod defs;

#[cfg(target_arch = "aarch64")]
pub mod tlb;

#[cfg(target_arch = "aarch64")]
pub use tlb::Aarch64Tlb;
