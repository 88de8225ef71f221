//! # Map Builder
//!
//! [`create_flat_map`] runs one walk and either fills the caller's storage
//! or reports how much is needed. The usual pattern is two calls:
//!
//! ```ignore
//! let mut probe = PageMap::size_query(Architecture::X64);
//! let required = match create_flat_map(&mut probe, &control, &reader) {
//!     Err(FlatMapError::BufferTooSmall { required }) => required,
//!     other => return other,
//! };
//!
//! let mut storage = vec![Region::default(); required];
//! let mut map = PageMap::new(Architecture::X64, &mut storage);
//! create_flat_map(&mut map, &control, &reader)?;
//! ```
//!
//! The walk is deterministic and never writes to the tables, so the second
//! call produces exactly `required` regions as long as the tables did not
//! change in between.

use crate::arch::{AArch64, Architecture, X64};
use crate::control::ControlState;
use crate::error::FlatMapError;
use crate::reader::TableReader;
use crate::region::Region;
use crate::walker::flatten;

/// Caller-owned storage for a flattened map.
#[derive(Debug)]
pub struct PageMap<'a> {
    architecture: Architecture,
    entries: &'a mut [Region],
    count: usize,
    populated: bool,
}

impl<'a> PageMap<'a> {
    /// A map writing into `entries`; its length is the capacity.
    #[inline]
    #[must_use]
    pub const fn new(architecture: Architecture, entries: &'a mut [Region]) -> Self {
        Self {
            architecture,
            entries,
            count: 0,
            populated: false,
        }
    }

    /// A map without storage, used to learn the required capacity.
    #[inline]
    #[must_use]
    pub fn size_query(architecture: Architecture) -> Self {
        Self::new(architecture, &mut [])
    }

    /// Build a map over a raw pointer/capacity pair.
    ///
    /// A null `entries` with `capacity == 0` is a size query.
    ///
    /// # Errors
    /// [`FlatMapError::InvalidParameter`] if `entries` is null but `capacity` is not zero.
    ///
    /// # Safety
    /// A non-null `entries` must be valid for reads and writes of `capacity`
    /// regions for `'a` and must not be aliased during that time.
    pub unsafe fn from_raw_parts(
        architecture: Architecture,
        entries: *mut Region,
        capacity: usize,
    ) -> Result<Self, FlatMapError> {
        if entries.is_null() {
            if capacity != 0 {
                return Err(FlatMapError::InvalidParameter);
            }
            return Ok(Self::new(architecture, &mut []));
        }

        // SAFETY: upheld by the caller.
        let entries = unsafe { core::slice::from_raw_parts_mut(entries, capacity) };
        Ok(Self::new(architecture, entries))
    }

    #[inline]
    #[must_use]
    pub const fn architecture(&self) -> Architecture {
        self.architecture
    }

    #[inline]
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.entries.len()
    }

    /// Regions produced by the last call, including those that did not fit.
    #[inline]
    #[must_use]
    pub const fn count(&self) -> usize {
        self.count
    }

    /// Whether the last [`create_flat_map`] call succeeded.
    #[inline]
    #[must_use]
    pub const fn is_populated(&self) -> bool {
        self.populated
    }

    /// The flattened regions, sorted by base address.
    ///
    /// Empty unless the map is populated; after `BufferTooSmall` the storage
    /// holds a truncated walk and is not exposed.
    #[must_use]
    pub fn regions(&self) -> &[Region] {
        if self.populated {
            &self.entries[..self.count]
        } else {
            &[]
        }
    }
}

/// Flatten the tables described by `control` into `map`.
///
/// # Errors
/// - [`FlatMapError::InvalidParameter`] if `map` and `control` disagree on the architecture.
/// - [`FlatMapError::NotFound`] if no root table is installed.
/// - [`FlatMapError::BufferTooSmall`] if `map` cannot hold every region;
///   [`PageMap::count`] then holds the required capacity.
pub fn create_flat_map<R: TableReader + ?Sized>(
    map: &mut PageMap<'_>,
    control: &ControlState,
    reader: &R,
) -> Result<(), FlatMapError> {
    map.populated = false;
    map.count = 0;

    if map.architecture != control.architecture() {
        log::warn!(
            "map built for {:?} but control state is {:?}",
            map.architecture,
            control.architecture()
        );
        return Err(FlatMapError::InvalidParameter);
    }

    let root = control.root_table();
    if root.is_zero() {
        log::debug!("{:?}: no root table installed", map.architecture);
        return Err(FlatMapError::NotFound);
    }

    let shape = control.shape();
    let count = match control {
        ControlState::X64(_) => flatten::<X64, R>(reader, root, shape, (), &mut *map.entries),
        ControlState::AArch64(c) => {
            flatten::<AArch64, R>(reader, root, shape, c.hierarchical_control(), &mut *map.entries)
        }
    };

    map.count = count;
    if count > map.entries.len() {
        return Err(FlatMapError::BufferTooSmall { required: count });
    }

    map.populated = true;
    Ok(())
}
