//! Translation-table descriptor codec.
//!
//! Bitfield layout follows the VMSA 64-bit descriptor (spec §6); encoded
//! with `tock-registers` the way `translation_table.rs` in the reference
//! Cortex-A MMU crates encodes `STAGE1_TABLE_DESCRIPTOR`/
//! `STAGE1_PAGE_DESCRIPTOR`. Only the fields whose position is the same
//! for every granule are modeled as a `register_bitfields!` block; the
//! granule-dependent output-address width and refcount window are
//! handled with plain shifts driven by `level::Granule`.

use tock_registers::fields::FieldValue;
use tock_registers::interfaces::{ReadWriteable, Readable};
use tock_registers::registers::InMemoryRegister;
use tock_registers::register_bitfields;

use crate::pgtable::level::Granule;

register_bitfields! [u64,
    pub DESC [
        VALID OFFSET(0) NUMBITS(1) [],
        TYPE OFFSET(1) NUMBITS(1) [
            BlockOrInvalid = 0,
            TableOrPage = 1,
        ],
        ATTR_INDEX OFFSET(2) NUMBITS(3) [],
        NS OFFSET(5) NUMBITS(1) [],
        AP OFFSET(6) NUMBITS(2) [
            ReadWrite = 0b00,
            ReadOnly = 0b10,
        ],
        SH OFFSET(8) NUMBITS(2) [
            NonShareable = 0b00,
            OuterShareable = 0b10,
            InnerShareable = 0b11,
        ],
        AF OFFSET(10) NUMBITS(1) [],
        NT OFFSET(16) NUMBITS(1) [],
        CONTIGUOUS OFFSET(52) NUMBITS(1) [],
        XN OFFSET(54) NUMBITS(1) [],
    ]
];

/// A single translation-table entry, raw 64-bit descriptor plus the
/// granule needed to interpret its output-address and refcount fields.
#[derive(Clone, Copy)]
pub struct Entry {
    reg: u64,
}

/// Kind an entry decodes to, given its table level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    Invalid,
    /// Points at the next-level table, `addr` is its physical address.
    Table { addr: u64 },
    /// A block or page leaf mapping, `addr` is the output address.
    Leaf { addr: u64 },
}

impl Entry {
    pub const fn invalid() -> Self {
        Self { reg: 0 }
    }

    pub const fn raw(&self) -> u64 {
        self.reg
    }

    pub const fn from_raw(reg: u64) -> Self {
        Self { reg }
    }

    pub fn is_valid(&self) -> bool {
        self.reg & 1 != 0
    }

    pub fn is_table(&self, is_page_level: bool) -> bool {
        self.is_valid() && !is_page_level && (self.reg & 0b10) != 0
    }

    pub fn is_leaf(&self, is_page_level: bool) -> bool {
        self.is_valid() && (is_page_level || (self.reg & 0b10) == 0)
    }

    pub fn kind(&self, is_page_level: bool, granule: Granule) -> EntryKind {
        if !self.is_valid() {
            EntryKind::Invalid
        } else if self.is_table(is_page_level) {
            EntryKind::Table { addr: self.output_address(granule) }
        } else {
            EntryKind::Leaf { addr: self.output_address(granule) }
        }
    }

    /// Output address field: bits `[47:12]`, masked to the granule's
    /// addressable physical range.
    pub fn output_address(&self, _granule: Granule) -> u64 {
        self.reg & 0x0000_FFFF_FFFF_F000
    }

    pub fn nt(&self) -> bool {
        self.reg & (1 << 16) != 0
    }

    pub fn contiguous(&self) -> bool {
        self.reg & (1u64 << 52) != 0
    }

    pub fn af(&self) -> bool {
        self.reg & (1 << 10) != 0
    }

    /// Software refcount stored in the low bits of a table descriptor,
    /// `[granule.refcount_bits()-1+2 : 2]`. Only meaningful when this
    /// entry is a table descriptor - those bits overlap the
    /// architectural leaf attribute fields, which is fine because a
    /// table descriptor never carries leaf attributes.
    pub fn refcount(&self, granule: Granule) -> u32 {
        let mask = (1u64 << granule.refcount_bits()) - 1;
        ((self.reg >> 2) & mask) as u32
    }

    pub fn with_refcount(mut self, granule: Granule, count: u32) -> Self {
        let mask = (1u64 << granule.refcount_bits()) - 1;
        debug_assert!((count as u64) <= mask);
        self.reg &= !(mask << 2);
        self.reg |= ((count as u64) & mask) << 2;
        self
    }

    /// Builds a table (next-level) descriptor pointing at `table_addr`.
    pub fn new_table(table_addr: u64, refcount: u32, granule: Granule) -> Self {
        let reg: InMemoryRegister<u64, DESC::Register> = InMemoryRegister::new(0);
        reg.modify(DESC::VALID::SET + DESC::TYPE::TableOrPage);
        let mut e = Self { reg: reg.get() | (table_addr & 0x0000_FFFF_FFFF_F000) };
        e = e.with_refcount(granule, refcount);
        e
    }

    /// Builds a block or page leaf descriptor, `is_page_level` selects
    /// whether bit 1 is forced to 1 (page) or left as block (0).
    pub fn new_leaf(
        addr: u64,
        is_page_level: bool,
        attrs: FieldValue<u64, DESC::Register>,
        contiguous: bool,
        nt: bool,
    ) -> Self {
        let reg: InMemoryRegister<u64, DESC::Register> = InMemoryRegister::new(0);
        reg.modify(DESC::VALID::SET + attrs);
        if is_page_level {
            reg.modify(DESC::TYPE::TableOrPage);
        } else {
            reg.modify(DESC::TYPE::BlockOrInvalid);
        }
        if contiguous {
            reg.modify(DESC::CONTIGUOUS::SET);
        }
        if nt {
            reg.modify(DESC::NT::SET);
        }
        Self { reg: reg.get() | (addr & 0x0000_FFFF_FFFF_F000) }
    }

    pub fn with_nt(mut self, nt: bool) -> Self {
        if nt {
            self.reg |= 1 << 16;
        } else {
            self.reg &= !(1u64 << 16);
        }
        self
    }

    /// Attribute bits used to compare two leaf entries for equivalence
    /// when deciding idempotence or mergeability: everything except the
    /// output address and the contiguous hint.
    pub fn attrs_bits(&self) -> u64 {
        self.reg & !(0x0000_FFFF_FFFF_F000 | (1u64 << 52))
    }

    /// Fields an in-place access update (spec §4.2.2) is allowed to
    /// rewrite without a break-before-make sequence: AP/S2AP and XN.
    const ACCESS_BITS_MASK: u64 = (0b11 << 6) | (1u64 << 54);

    pub fn access_bits(&self) -> u64 {
        self.reg & Self::ACCESS_BITS_MASK
    }

    /// `attrs_bits()` with the access-control fields masked out, so two
    /// leaves that differ only in permissions compare equal here.
    pub fn non_access_attrs_bits(&self) -> u64 {
        self.attrs_bits() & !Self::ACCESS_BITS_MASK
    }

    pub fn with_access_bits(mut self, access: u64) -> Self {
        self.reg = (self.reg & !Self::ACCESS_BITS_MASK) | (access & Self::ACCESS_BITS_MASK);
        self
    }

    pub fn with_contiguous(mut self, contiguous: bool) -> Self {
        if contiguous {
            self.reg |= 1u64 << 52;
        } else {
            self.reg &= !(1u64 << 52);
        }
        self
    }
}

impl core::fmt::Debug for Entry {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "Entry({:#018x})", self.reg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_entry_roundtrip() {
        let e = Entry::new_table(0x8000_1000, 3, Granule::G4K);
        assert!(e.is_valid());
        assert!(e.is_table(false));
        assert_eq!(e.output_address(Granule::G4K), 0x8000_1000);
        assert_eq!(e.refcount(Granule::G4K), 3);
    }

    #[test]
    fn refcount_update_preserves_address() {
        let e = Entry::new_table(0x4000_2000, 0, Granule::G4K);
        let e2 = e.with_refcount(Granule::G4K, 511);
        assert_eq!(e2.output_address(Granule::G4K), 0x4000_2000);
        assert_eq!(e2.refcount(Granule::G4K), 511);
    }

    #[test]
    fn invalid_entry_decodes_as_invalid() {
        let e = Entry::invalid();
        assert!(!e.is_valid());
        assert_eq!(e.kind(false, Granule::G4K), EntryKind::Invalid);
    }
}
