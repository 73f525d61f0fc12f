//! Architecture-specific code
//!
//! Contains the aarch64 TLB/barrier facade implementation behind the
//! portable `pgtable::tlb::TlbOps` trait.

pub mod aarch64;

#[cfg(target_arch = "aarch64")]
pub use aarch64::*;
