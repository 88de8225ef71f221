//! # x86-64 Paging Entries
//!
//! All four (or five) levels share the same basic layout:
//!
//! | Bits  | Name | Meaning |
//! |-------|------|---------|
//! | 0     | `P`  | Present |
//! | 1     | `RW` | Writable |
//! | 2     | `US` | User-mode accessible |
//! | 3     | `PWT`| Write-through |
//! | 4     | `PCD`| Cache disable |
//! | 5     | `A`  | Accessed |
//! | 6     | `D`  | Dirty (leaf only) |
//! | 7     | `PS` / `PAT` | Large page in PDPTE/PDE, PAT in a 4 KiB PTE |
//! | 8     | `G`  | Global (leaf only) |
//! | 12–51 | addr | Physical base (bit 12 is PAT in large leaves) |
//! | 59–62 | `PK` | Protection key |
//! | 63    | `NX` | Execute disable |
//!
//! Large leaves are normalized to the 4 KiB layout before they are emitted:
//! PAT moves from bit 12 to bit 7 and `PS` is dropped, so every region's raw
//! descriptor reads like an [`X64Descriptor`].
//!
//! x86-64 has no table-level permission inheritance in this library's model;
//! table entries contribute no heritable bits.

use crate::arch::{Architecture, DescriptorFormat, EntryKind, TableFormat, TableShape};
use bitfield_struct::bitfield;
use paging_addresses::{PhysicalAddress, VirtualAddress};

/// Present bit (bit 0).
const PRESENT_BIT: u64 = 1 << 0;

/// Page-size bit in PDPTE/PDE (bit 7).
const PS_BIT: u64 = 1 << 7;

/// PAT bit of a 2 MiB / 1 GiB leaf (bit 12).
const PAT_LARGE_BIT: u64 = 1 << 12;

/// PAT bit of a 4 KiB leaf (bit 7).
const PAT_BIT: u64 = 1 << 7;

/// Physical address bits 12..51.
const ADDRESS_MASK: u64 = 0x000F_FFFF_FFFF_F000;

/// A leaf descriptor in the normalized 4 KiB layout.
#[doc(alias = "PTE")]
#[bitfield(u64)]
#[derive(Eq, PartialEq)]
pub struct X64Descriptor {
    /// Bit 0: present.
    pub present: bool,
    /// Bit 1: writable.
    pub writable: bool,
    /// Bit 2: user-mode accessible.
    pub user: bool,
    /// Bit 3: page-level write-through.
    pub write_through: bool,
    /// Bit 4: page-level cache disable.
    pub cache_disable: bool,
    /// Bit 5: accessed, set by the CPU.
    pub accessed: bool,
    /// Bit 6: dirty, set by the CPU on the first write.
    pub dirty: bool,
    /// Bit 7: PAT selector bit 2.
    pub pat: bool,
    /// Bit 8: global.
    pub global: bool,
    /// Bits 9–11: available to software.
    #[bits(3)]
    pub os_available_low: u8,
    /// Bits 12–51: physical page base >> 12.
    #[bits(40)]
    phys_addr_51_12: u64,
    /// Bits 52–58: available to software.
    #[bits(7)]
    pub os_available_high: u8,
    /// Bits 59–62: protection key.
    #[bits(4)]
    pub protection_key: u8,
    /// Bit 63: execute disable.
    pub no_execute: bool,
}

impl X64Descriptor {
    /// Physical base of the mapped page.
    #[inline]
    #[must_use]
    pub const fn physical_address(self) -> PhysicalAddress {
        PhysicalAddress::new(self.phys_addr_51_12() << 12)
    }

    /// Set the physical base; must be 4 KiB-aligned.
    #[inline]
    #[must_use]
    pub const fn with_physical_address(self, pa: PhysicalAddress) -> Self {
        debug_assert!(pa.is_aligned_to(0x1000));
        self.with_phys_addr_51_12(pa.as_u64() >> 12)
    }
}

/// The x86-64 (IA-32e) descriptor format.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct X64;

impl X64 {
    /// Rewrite a 2 MiB / 1 GiB leaf into the 4 KiB layout.
    #[inline]
    #[must_use]
    pub const fn normalize_large_leaf(raw: u64) -> u64 {
        let pat = if raw & PAT_LARGE_BIT != 0 { PAT_BIT } else { 0 };
        (raw & !(PS_BIT | PAT_LARGE_BIT)) | pat
    }
}

impl DescriptorFormat for X64 {
    const ARCHITECTURE: Architecture = Architecture::X64;

    /// Everything outside the address field except Accessed (5) and Dirty (6).
    const EQUALITY_MASK: u64 = (0xFFF << 52) | 0xF9F;

    #[inline]
    fn is_writable(descriptor: u64) -> bool {
        X64Descriptor::from_bits(descriptor).writable()
    }

    #[inline]
    fn is_executable(descriptor: u64) -> bool {
        !X64Descriptor::from_bits(descriptor).no_execute()
    }

    /// Any present mapping is readable; there is no read-deny bit.
    #[inline]
    fn is_readable(descriptor: u64) -> bool {
        X64Descriptor::from_bits(descriptor).present()
    }

    #[inline]
    fn physical_target(descriptor: u64) -> PhysicalAddress {
        PhysicalAddress::new(descriptor & ADDRESS_MASK)
    }
}

impl TableFormat for X64 {
    type Inheritance = ();

    fn classify(raw: u64, level: u8, shape: &TableShape) -> EntryKind {
        if raw & PRESENT_BIT == 0 {
            return EntryKind::Invalid;
        }

        let height = shape.height(level);
        if height == 0 {
            return EntryKind::Leaf(raw);
        }

        if raw & PS_BIT == 0 {
            return EntryKind::Table(PhysicalAddress::new(raw & ADDRESS_MASK));
        }

        // PS is only defined in PDEs (2 MiB) and PDPTEs (1 GiB).
        if height <= 2 {
            EntryKind::Leaf(Self::normalize_large_leaf(raw))
        } else {
            log::warn!("x64: PS set in level {level} entry {raw:#018x}; entry skipped");
            EntryKind::Invalid
        }
    }

    #[inline]
    fn heritable_bits(_raw: u64) -> u64 {
        0
    }

    #[inline]
    fn apply_inherited(leaf: u64, _inherited: u64, (): ()) -> u64 {
        leaf
    }

    #[inline]
    fn canonical(address: VirtualAddress, shape: &TableShape) -> VirtualAddress {
        address.canonical(shape.address_bits())
    }
}
