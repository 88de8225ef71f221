//! # Descriptor Formats
//!
//! Two hardware descriptor formats are supported:
//!
//! | Format | Levels | Hierarchical permissions |
//! |--------|--------|--------------------------|
//! | [`X64`] | 4 or 5 (`CR4.LA57`), 512 entries each | no |
//! | [`AArch64`] | up to 4, root sized by `TCR.T0SZ`, 4 KiB granule | yes, when `HPDS` is implemented and `HPD` is clear |
//!
//! [`DescriptorFormat`] answers questions about a single leaf descriptor and
//! carries the equality mask used when merging regions. [`TableFormat`] adds
//! what the walker needs on top: classifying raw entries per level and
//! carrying table-level restrictions down to the leaves.
//!
//! [`Architecture`] is the runtime tag stored in a [`PageMap`](crate::PageMap);
//! it dispatches to the matching format.

pub mod aarch64;
pub mod x64;

pub use crate::arch::aarch64::AArch64;
pub use crate::arch::x64::X64;
use crate::region::Region;
use paging_addresses::{GRANULE_SHIFT, GRANULE_SIZE, PhysicalAddress, VirtualAddress};

/// Entries in every non-root table (and in a full-size root table).
pub const ENTRIES_PER_TABLE: usize = 512;

/// Index bits resolved per level with a 4 KiB granule.
const BITS_PER_LEVEL: u32 = 9;

/// Build a little-endian four-character signature.
const fn signature(tag: [u8; 4]) -> u32 {
    u32::from_le_bytes(tag)
}

/// Which hardware descriptor format a map was built from.
///
/// The discriminant is the four-character signature stamped into maps by
/// firmware (`"X64 "` and `"AA64"`), so a raw map can be identified without
/// further context.
#[repr(u32)]
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum Architecture {
    X64 = signature(*b"X64 "),
    AArch64 = signature(*b"AA64"),
}

impl Architecture {
    /// The four-character signature of this architecture.
    #[inline]
    #[must_use]
    pub const fn signature(self) -> u32 {
        self as u32
    }

    /// Look up an architecture by signature.
    #[must_use]
    pub const fn from_signature(signature: u32) -> Option<Self> {
        if signature == Self::X64.signature() {
            Some(Self::X64)
        } else if signature == Self::AArch64.signature() {
            Some(Self::AArch64)
        } else {
            None
        }
    }

    /// Bits compared when deciding whether two regions carry the same attributes.
    #[inline]
    #[must_use]
    pub const fn equality_mask(self) -> u64 {
        match self {
            Self::X64 => X64::EQUALITY_MASK,
            Self::AArch64 => AArch64::EQUALITY_MASK,
        }
    }

    #[must_use]
    pub fn is_writable(self, descriptor: u64) -> bool {
        match self {
            Self::X64 => X64::is_writable(descriptor),
            Self::AArch64 => AArch64::is_writable(descriptor),
        }
    }

    #[must_use]
    pub fn is_executable(self, descriptor: u64) -> bool {
        match self {
            Self::X64 => X64::is_executable(descriptor),
            Self::AArch64 => AArch64::is_executable(descriptor),
        }
    }

    #[must_use]
    pub fn is_readable(self, descriptor: u64) -> bool {
        match self {
            Self::X64 => X64::is_readable(descriptor),
            Self::AArch64 => AArch64::is_readable(descriptor),
        }
    }

    #[must_use]
    pub fn physical_target(self, descriptor: u64) -> PhysicalAddress {
        match self {
            Self::X64 => X64::physical_target(descriptor),
            Self::AArch64 => AArch64::physical_target(descriptor),
        }
    }

    /// Whether `next` would have been folded into `previous` by the merge engine.
    ///
    /// A correctly flattened map never has two neighbours for which this holds.
    #[must_use]
    pub fn regions_mergeable(self, previous: &Region, next: &Region) -> bool {
        match self {
            Self::X64 => mergeable::<X64>(previous, next),
            Self::AArch64 => mergeable::<AArch64>(previous, next),
        }
    }
}

/// Pure decoding of one raw leaf descriptor.
pub trait DescriptorFormat {
    /// Runtime tag of this format.
    const ARCHITECTURE: Architecture;

    /// Bits that must match for two neighbouring regions to merge.
    ///
    /// Output-address bits are never part of the mask; physical contiguity
    /// is checked separately through [`physical_target`](Self::physical_target).
    const EQUALITY_MASK: u64;

    /// Writable through this descriptor.
    fn is_writable(descriptor: u64) -> bool;

    /// Executable from at least one privilege level.
    fn is_executable(descriptor: u64) -> bool;

    /// Readable, by this format's convention.
    fn is_readable(descriptor: u64) -> bool;

    /// The output address bits only.
    fn physical_target(descriptor: u64) -> PhysicalAddress;
}

/// Classification of one raw table entry at a given level.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum EntryKind {
    /// Not present, or an encoding the walker must not follow.
    Invalid,
    /// Points at the next-level table.
    Table(PhysicalAddress),
    /// Maps a block/page; the payload is the (normalized) leaf descriptor.
    Leaf(u64),
}

/// What the walker needs beyond leaf decoding.
pub trait TableFormat: DescriptorFormat {
    /// Per-call policy for folding table-level restrictions into leaves.
    type Inheritance: Copy + core::fmt::Debug;

    /// Classify a raw entry found at `level`.
    fn classify(raw: u64, level: u8, shape: &TableShape) -> EntryKind;

    /// The restriction bits of a table descriptor that apply to everything below it.
    fn heritable_bits(raw: u64) -> u64;

    /// Fold the accumulated restrictions of all ancestor tables into `leaf`.
    fn apply_inherited(leaf: u64, inherited: u64, inheritance: Self::Inheritance) -> u64;

    /// Turn a linear region start into the address reported to callers.
    fn canonical(address: VirtualAddress, shape: &TableShape) -> VirtualAddress;
}

/// The merge condition: address-contiguous, physically contiguous, same attributes.
///
/// Every addition is checked; running off the top of either address space
/// means the two regions are not contiguous.
pub(crate) fn mergeable<F: DescriptorFormat>(previous: &Region, next: &Region) -> bool {
    let Some(linear_end) = previous.base_address.checked_add(previous.length) else {
        return false;
    };
    if linear_end != next.base_address {
        return false;
    }

    let Some(physical_end) = F::physical_target(previous.raw_descriptor).checked_add(previous.length)
    else {
        return false;
    };
    if physical_end != F::physical_target(next.raw_descriptor) {
        return false;
    }

    previous.raw_descriptor & F::EQUALITY_MASK == next.raw_descriptor & F::EQUALITY_MASK
}

/// Runtime shape of one translation tree.
///
/// Levels are numbered from the top; `leaf_level` is the level whose entries
/// map single 4 KiB pages. The root may start below level 0 and may hold
/// fewer than [`ENTRIES_PER_TABLE`] entries when the configured address space
/// is smaller than the architectural maximum.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct TableShape {
    root_level: u8,
    leaf_level: u8,
    root_entries: usize,
    address_bits: u32,
}

impl TableShape {
    /// x86-64 with 4 or 5 levels, all tables full-size.
    #[must_use]
    pub const fn x64(levels: u8) -> Self {
        debug_assert!(levels == 4 || levels == 5);
        Self {
            root_level: 0,
            leaf_level: levels - 1,
            root_entries: ENTRIES_PER_TABLE,
            address_bits: GRANULE_SHIFT + BITS_PER_LEVEL * levels as u32,
        }
    }

    /// AArch64 `TTBR0` walk with a 4 KiB granule and the given `T0SZ`.
    ///
    /// `T0SZ` is clamped to `16..=39`. For `16..=24` the walk starts at
    /// level 0 with `512 >> (T0SZ - 16)` root entries; larger values start at
    /// level 1 or 2.
    #[must_use]
    pub const fn aarch64(t0sz: u8) -> Self {
        let t0sz = if t0sz < 16 {
            16
        } else if t0sz > 39 {
            39
        } else {
            t0sz
        };

        let address_bits = 64 - t0sz as u32;
        let translated = address_bits - GRANULE_SHIFT;
        let levels = translated.div_ceil(BITS_PER_LEVEL);
        let root_index_bits = translated - BITS_PER_LEVEL * (levels - 1);

        #[allow(clippy::cast_possible_truncation)]
        Self {
            root_level: (4 - levels) as u8,
            leaf_level: 3,
            root_entries: 1 << root_index_bits,
            address_bits,
        }
    }

    #[inline]
    #[must_use]
    pub const fn root_level(&self) -> u8 {
        self.root_level
    }

    #[inline]
    #[must_use]
    pub const fn leaf_level(&self) -> u8 {
        self.leaf_level
    }

    #[inline]
    #[must_use]
    pub const fn root_entries(&self) -> usize {
        self.root_entries
    }

    /// Implemented linear-address width.
    #[inline]
    #[must_use]
    pub const fn address_bits(&self) -> u32 {
        self.address_bits
    }

    /// Entries to scan in a table at `level`.
    #[inline]
    #[must_use]
    pub const fn entries_at(&self, level: u8) -> usize {
        if level == self.root_level {
            self.root_entries
        } else {
            ENTRIES_PER_TABLE
        }
    }

    /// Bytes covered by one entry at `level`.
    #[inline]
    #[must_use]
    pub const fn block_size(&self, level: u8) -> u64 {
        debug_assert!(level <= self.leaf_level);
        GRANULE_SIZE << (BITS_PER_LEVEL * (self.leaf_level - level) as u32)
    }

    /// How many levels `level` sits above the leaf level.
    #[inline]
    #[must_use]
    pub const fn height(&self, level: u8) -> u8 {
        self.leaf_level - level
    }
}
