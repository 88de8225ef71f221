//! # AArch64 Translation Descriptors (VMSAv8-64, 4 KiB granule)
//!
//! Descriptor type is encoded in bits `[1:0]`:
//!
//! | Level | `0b01` | `0b11` |
//! |-------|--------|--------|
//! | 0     | invalid (no blocks without LPA2) | table |
//! | 1     | 1 GiB block | table |
//! | 2     | 2 MiB block | table |
//! | 3     | reserved | 4 KiB page |
//!
//! Block and page descriptors share the [`AArch64BlockDescriptor`] layout.
//! Table descriptors ([`AArch64TableDescriptor`]) carry the hierarchical
//! restriction bits `PXNTable`, `UXNTable`/`XNTable` and `APTable`, which
//! narrow the permissions of every leaf below them when hierarchical
//! permissions are enabled (`ID_AA64MMFR1_EL1.HPDS != 0` and the regime's
//! `TCR_ELx.HPD` bit clear).
//!
//! ## Readability convention
//!
//! A leaf is reported readable only when its Access Flag is set. A valid
//! mapping that has never been accessed (and whose AF was not pre-set by
//! software) therefore reads as "not readable". This mirrors established
//! firmware behaviour; downstream security checks depend on it, so it is
//! kept deliberately instead of being derived from `AP`.

use crate::arch::{Architecture, DescriptorFormat, EntryKind, TableFormat, TableShape};
use bitfield_struct::bitfield;
use paging_addresses::{PhysicalAddress, VirtualAddress};

/// Descriptor type field, bits `[1:0]`.
const TYPE_MASK: u64 = 0b11;
const TYPE_BLOCK: u64 = 0b01;
const TYPE_TABLE_OR_PAGE: u64 = 0b11;

/// Output address bits 12..47.
const ADDRESS_MASK: u64 = 0x0000_FFFF_FFFF_F000;

/// `PXNTable` (59), `UXNTable`/`XNTable` (60), `APTable` (61..62).
pub const HERITABLE_MASK: u64 = (0b11 << 61) | (1 << 60) | (1 << 59);

/// `AP[2:1]` encodings, as seen in [`AArch64BlockDescriptor::access_permissions`].
const AP_EL0_ACCESS: u8 = 0b01;
const AP_READ_ONLY: u8 = 0b10;

/// `APTable` encodings.
const AP_TABLE_NO_EL0: u8 = 0b01;
const AP_TABLE_NO_WRITE: u8 = 0b10;
const AP_TABLE_NO_EL0_NO_WRITE: u8 = 0b11;

/// Block (levels 1–2) or page (level 3) descriptor.
#[bitfield(u64)]
#[derive(Eq, PartialEq)]
pub struct AArch64BlockDescriptor {
    /// Bit 0: valid.
    pub valid: bool,
    /// Bit 1: `0` for a block, `1` for a level-3 page.
    pub page: bool,
    /// Bits 2–4: `AttrIndx`, index into `MAIR_ELx`.
    #[bits(3)]
    pub attr_index: u8,
    /// Bit 5: `NS`.
    pub non_secure: bool,
    /// Bits 6–7: `AP[2:1]`. Bit 6 grants EL0 access, bit 7 makes the mapping read-only.
    #[bits(2)]
    pub access_permissions: u8,
    /// Bits 8–9: shareability.
    #[bits(2)]
    pub shareability: u8,
    /// Bit 10: `AF`, access flag.
    pub access_flag: bool,
    /// Bit 11: `nG`, not global.
    pub non_global: bool,
    /// Bits 12–47: output address >> 12.
    #[bits(36)]
    output_address_47_12: u64,
    /// Bits 48–49: reserved with a 4 KiB granule and 48-bit output addresses.
    #[bits(2)]
    __res48: u8,
    /// Bit 50: `GP`, guarded page.
    pub guarded: bool,
    /// Bit 51: `DBM`, dirty bit modifier.
    pub dirty_state: bool,
    /// Bit 52: contiguous hint.
    pub contiguous: bool,
    /// Bit 53: `PXN`, privileged execute-never.
    pub pxn: bool,
    /// Bit 54: `UXN` (EL1&0) / `XN` (EL2, EL3).
    pub uxn: bool,
    /// Bits 55–58: software use.
    #[bits(4)]
    pub software: u8,
    /// Bits 59–62: page-based hardware attributes.
    #[bits(4)]
    pub pbha: u8,
    /// Bit 63: ignored.
    #[bits(1)]
    __ignored63: u8,
}

impl AArch64BlockDescriptor {
    /// Output (physical) address of the block or page.
    #[inline]
    #[must_use]
    pub const fn output_address(self) -> PhysicalAddress {
        PhysicalAddress::new(self.output_address_47_12() << 12)
    }

    /// Set the output address; must be aligned to the block size.
    #[inline]
    #[must_use]
    pub const fn with_output_address(self, pa: PhysicalAddress) -> Self {
        debug_assert!(pa.is_aligned_to(0x1000));
        self.with_output_address_47_12(pa.as_u64() >> 12)
    }
}

/// Table descriptor (levels 0–2, type `0b11`).
#[bitfield(u64)]
#[derive(Eq, PartialEq)]
pub struct AArch64TableDescriptor {
    /// Bit 0: valid.
    pub valid: bool,
    /// Bit 1: must be `1` for a table descriptor.
    pub table: bool,
    /// Bits 2–11: ignored.
    #[bits(10)]
    __ignored2: u16,
    /// Bits 12–47: next-level table address >> 12.
    #[bits(36)]
    next_table_47_12: u64,
    /// Bits 48–50: reserved.
    #[bits(3)]
    __res48: u8,
    /// Bits 51–58: ignored.
    #[bits(8)]
    __ignored51: u8,
    /// Bit 59: `PXNTable`.
    pub pxn_table: bool,
    /// Bit 60: `UXNTable` (EL1&0) / `XNTable` (EL2, EL3).
    pub xn_table: bool,
    /// Bits 61–62: `APTable`.
    #[bits(2)]
    pub ap_table: u8,
    /// Bit 63: `NSTable`.
    pub ns_table: bool,
}

impl AArch64TableDescriptor {
    /// Physical base of the next-level table.
    #[inline]
    #[must_use]
    pub const fn next_table(self) -> PhysicalAddress {
        PhysicalAddress::new(self.next_table_47_12() << 12)
    }

    /// Set the next-level table base; must be 4 KiB-aligned.
    #[inline]
    #[must_use]
    pub const fn with_next_table(self, pa: PhysicalAddress) -> Self {
        debug_assert!(pa.is_aligned_to(0x1000));
        self.with_next_table_47_12(pa.as_u64() >> 12)
    }
}

/// How table-level restrictions reach the leaves for one walk.
///
/// Read once per call from `ID_AA64MMFR1_EL1`, `CurrentEL` and `TCR_ELx`.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum HierarchicalControl {
    /// Hierarchical permissions are not in effect; leaves are emitted as-is.
    #[default]
    Disabled,
    /// EL1&0 regime: `UXNTable` → `UXN`, `PXNTable` → `PXN`, `APTable` applies.
    El1,
    /// EL2 regime: `XNTable` → `XN`, `APTable` applies.
    El2,
}

/// The AArch64 VMSAv8-64 descriptor format.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct AArch64;

impl DescriptorFormat for AArch64 {
    const ARCHITECTURE: Architecture = Architecture::AArch64;

    /// Bits 2–11 (including AF) and 52–63. The dirty-state bit 51 is excluded.
    const EQUALITY_MASK: u64 = (0xFFF << 52) | (0x3FF << 2);

    /// `AP[2]` clear: read-write at EL1 (`0b00`) or at all levels (`0b01`).
    #[inline]
    fn is_writable(descriptor: u64) -> bool {
        let ap = AArch64BlockDescriptor::from_bits(descriptor).access_permissions();
        ap == AP_EL0_ACCESS || ap == 0
    }

    /// Executable from *some* level: `UXN` or `PXN` is clear.
    ///
    /// Callers that care about one specific exception level must check the
    /// matching bit themselves.
    #[inline]
    fn is_executable(descriptor: u64) -> bool {
        let d = AArch64BlockDescriptor::from_bits(descriptor);
        !d.uxn() || !d.pxn()
    }

    /// Readable iff the Access Flag is set; see the module documentation.
    #[inline]
    fn is_readable(descriptor: u64) -> bool {
        AArch64BlockDescriptor::from_bits(descriptor).access_flag()
    }

    #[inline]
    fn physical_target(descriptor: u64) -> PhysicalAddress {
        PhysicalAddress::new(descriptor & ADDRESS_MASK)
    }
}

impl TableFormat for AArch64 {
    type Inheritance = HierarchicalControl;

    fn classify(raw: u64, level: u8, shape: &TableShape) -> EntryKind {
        if raw & 1 == 0 {
            return EntryKind::Invalid;
        }

        let kind = raw & TYPE_MASK;
        if level == shape.leaf_level() {
            if kind == TYPE_TABLE_OR_PAGE {
                return EntryKind::Leaf(raw);
            }
            log::warn!("aarch64: reserved level-3 descriptor {raw:#018x}; entry skipped");
            return EntryKind::Invalid;
        }

        if kind == TYPE_TABLE_OR_PAGE {
            return EntryKind::Table(AArch64TableDescriptor::from_bits(raw).next_table());
        }

        debug_assert_eq!(kind, TYPE_BLOCK);
        if level == 0 {
            log::warn!("aarch64: block descriptor at level 0 {raw:#018x}; entry skipped");
            return EntryKind::Invalid;
        }

        EntryKind::Leaf(raw)
    }

    #[inline]
    fn heritable_bits(raw: u64) -> u64 {
        raw & HERITABLE_MASK
    }

    fn apply_inherited(leaf: u64, inherited: u64, inheritance: HierarchicalControl) -> u64 {
        if inheritance == HierarchicalControl::Disabled || inherited == 0 {
            return leaf;
        }

        let table = AArch64TableDescriptor::from_bits(inherited);
        let mut block = AArch64BlockDescriptor::from_bits(leaf);

        match inheritance {
            HierarchicalControl::El2 => {
                if table.xn_table() {
                    block.set_uxn(true);
                }
            }
            HierarchicalControl::El1 => {
                if table.xn_table() {
                    block.set_uxn(true);
                }
                if table.pxn_table() {
                    block.set_pxn(true);
                }
            }
            HierarchicalControl::Disabled => {}
        }

        let ap = block.access_permissions();
        let ap = match table.ap_table() {
            AP_TABLE_NO_EL0 => ap & !AP_EL0_ACCESS,
            AP_TABLE_NO_WRITE => ap | AP_READ_ONLY,
            AP_TABLE_NO_EL0_NO_WRITE => (ap | AP_READ_ONLY) & !AP_EL0_ACCESS,
            _ => ap,
        };
        block.set_access_permissions(ap);

        block.into_bits()
    }

    /// `TTBR0` covers the lower range starting at zero; no sign extension.
    #[inline]
    fn canonical(address: VirtualAddress, _shape: &TableShape) -> VirtualAddress {
        address
    }
}
