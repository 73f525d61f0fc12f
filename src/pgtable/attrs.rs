//! Memory attribute mapper.
//!
//! Generalizes `MemoryAttributes`/`MemoryAttribute` (`arch/aarch64/mm/
//! mmu.rs`), which hardcoded a single stage-2 MAIR scheme, to both
//! stage-1 and stage-2 attribute encodings.

use tock_registers::fields::FieldValue;

use crate::pgtable::entry::DESC;
use crate::pgtable::walker::Stage;

/// Cacheability/device classification, independent of stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemoryKind {
    Normal,
    NormalNonCacheable,
    Device,
}

/// Access permissions requested for a leaf mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccessPermissions {
    pub writable: bool,
    pub executable: bool,
}

impl AccessPermissions {
    pub const RW: Self = Self { writable: true, executable: false };
    pub const RO: Self = Self { writable: false, executable: false };
    pub const RX: Self = Self { writable: false, executable: true };
}

/// Full set of attributes for one leaf mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttributeFields {
    pub kind: MemoryKind,
    pub perms: AccessPermissions,
    pub shareable: bool,
}

impl AttributeFields {
    pub fn to_descriptor_bits(self, stage: Stage) -> FieldValue<u64, DESC::Register> {
        let attr_index = match self.kind {
            MemoryKind::Normal => 0b000,
            MemoryKind::NormalNonCacheable => 0b001,
            MemoryKind::Device => 0b010,
        };
        let mut bits = DESC::ATTR_INDEX.val(attr_index) + DESC::AF::SET;
        bits += if self.perms.writable {
            DESC::AP::ReadWrite
        } else {
            DESC::AP::ReadOnly
        };
        bits += if self.shareable {
            DESC::SH::InnerShareable
        } else {
            DESC::SH::NonShareable
        };
        // XN/PXN handling differs between stage-1 (separate PXN/UXN) and
        // stage-2 (single XN); this engine only models EL2 stage-1 (no
        // unprivileged exception level) and VM stage-2, both single XN.
        if !self.perms.executable {
            bits += DESC::XN::SET;
        }
        let _ = stage;
        bits
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_only_sets_ap_bit() {
        let attrs = AttributeFields {
            kind: MemoryKind::Normal,
            perms: AccessPermissions::RO,
            shareable: true,
        };
        let bits = attrs.to_descriptor_bits(Stage::Vm);
        let reg: tock_registers::registers::InMemoryRegister<u64, DESC::Register> =
            tock_registers::registers::InMemoryRegister::new(0);
        use tock_registers::interfaces::{ReadWriteable, Readable};
        reg.modify(bits);
        assert_eq!(reg.read(DESC::AP), 0b10);
    }
}
