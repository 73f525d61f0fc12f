//! Generic ARMv8 VMSA translation-table engine for a type-1 hypervisor's
//! EL2 stage-1 and guest stage-2 address spaces.
//!
//! `no_std` except under `cargo test`, where the crate builds against
//! `std` so the host test harness and `#[cfg(test)]` mocks in
//! `testutil` are available; real targets never pull in `std`.
#![cfg_attr(not(test), no_std)]

pub mod arch;
pub mod mm;
pub mod pgtable;
pub mod sync;

#[cfg(test)]
mod testutil;
