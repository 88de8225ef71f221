//! # Region Query
//!
//! Looks up the attributes of an arbitrary range in a populated map.
//!
//! A request succeeds only when **one** region contains it entirely. A range
//! that straddles two regions fails with [`FlatMapError::NotFound`], even if
//! both happen to grant the same access; no combined answer is synthesized.

use crate::arch::Architecture;
use crate::error::FlatMapError;
use crate::map::PageMap;
use bitflags::bitflags;
use paging_addresses::VirtualAddress;

bitflags! {
    /// Access restrictions of a region, in the UEFI memory-attribute encoding.
    ///
    /// A flag is set when the capability is **absent**, so an empty set means
    /// readable, writable and executable.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct RegionAttributes: u64 {
        /// `EFI_MEMORY_RP`: not readable.
        const READ_PROTECT = 0x0000_2000;
        /// `EFI_MEMORY_XP`: not executable.
        const EXECUTE_PROTECT = 0x0000_4000;
        /// `EFI_MEMORY_RO`: not writable.
        const READ_ONLY = 0x0002_0000;
    }
}

impl RegionAttributes {
    /// Decode a raw leaf descriptor of the given architecture.
    #[must_use]
    pub fn from_descriptor(architecture: Architecture, descriptor: u64) -> Self {
        let mut attributes = Self::empty();
        attributes.set(Self::READ_PROTECT, !architecture.is_readable(descriptor));
        attributes.set(Self::READ_ONLY, !architecture.is_writable(descriptor));
        attributes.set(Self::EXECUTE_PROTECT, !architecture.is_executable(descriptor));
        attributes
    }

    #[inline]
    #[must_use]
    pub const fn readable(self) -> bool {
        !self.contains(Self::READ_PROTECT)
    }

    #[inline]
    #[must_use]
    pub const fn writable(self) -> bool {
        !self.contains(Self::READ_ONLY)
    }

    #[inline]
    #[must_use]
    pub const fn executable(self) -> bool {
        !self.contains(Self::EXECUTE_PROTECT)
    }
}

/// Attributes of the single region containing `[address, address + length)`.
///
/// # Errors
/// - [`FlatMapError::InvalidParameter`] if `map` is not populated, `length`
///   is zero, or the range runs past the top of the address space.
/// - [`FlatMapError::NotFound`] if no single region contains the range.
pub fn get_region_attributes(
    map: &PageMap<'_>,
    address: VirtualAddress,
    length: u64,
) -> Result<RegionAttributes, FlatMapError> {
    if !map.is_populated() || length == 0 {
        return Err(FlatMapError::InvalidParameter);
    }
    if address.as_u64().checked_add(length - 1).is_none() {
        return Err(FlatMapError::InvalidParameter);
    }

    let regions = map.regions();
    let after = regions.partition_point(|r| r.base_address <= address);
    let region = after
        .checked_sub(1)
        .and_then(|index| regions.get(index))
        .filter(|r| r.contains_range(address, length))
        .ok_or(FlatMapError::NotFound)?;

    Ok(RegionAttributes::from_descriptor(
        map.architecture(),
        region.raw_descriptor,
    ))
}
