//! Generic VMSA translation-table engine.
//!
//! A from-scratch ARMv8 stage-1/stage-2 translation-table walker with
//! pluggable map/unmap/lookup/prealloc modifiers, built the way
//! `arch/aarch64/mm/mmu.rs` and `ffa/stage2_walker.rs` build their
//! stage-2 MMU code but generalized to arbitrary level count, granule,
//! and translation regime instead of one fixed 4-level 4K stage-2
//! layout. See `/SPEC_FULL.md` for the module map and `/DESIGN.md` for
//! the grounding ledger.

pub mod alloc;
pub mod attrs;
pub mod bbm;
pub mod controller;
pub mod dump;
pub mod entry;
pub mod error;
pub mod level;
pub mod modifiers;
pub mod sysregs;
pub mod table;
pub mod tlb;
pub mod trace;
pub mod txn;
pub mod walker;

pub use controller::{Controller, Engine, Preserved};
pub use error::PgtError;
pub use level::Granule;
pub use walker::Stage;
