//! # Table Readers
//!
//! The walker never dereferences physical addresses itself. It asks a
//! [`TableReader`] for one 64-bit entry at a time, which lets the same walk
//! run over live identity-mapped tables or over a captured memory image.

use crate::arch::ENTRIES_PER_TABLE;
use paging_addresses::PhysicalAddress;

const ENTRY_SIZE: u64 = size_of::<u64>() as u64;

/// Read-only access to translation tables by physical address.
pub trait TableReader {
    /// Read entry `index` of the table whose frame starts at `table`.
    ///
    /// `index` is always below the entry count of the level being read. An
    /// AArch64 root with a large `T0SZ` holds fewer than 512 entries and is
    /// only aligned to its own size, so `table` need not be page-aligned.
    ///
    /// Returns `None` when the table cannot be accessed; the walker then
    /// treats the referencing slot as unmapped.
    fn read_entry(&self, table: PhysicalAddress, index: usize) -> Option<u64>;
}

impl<T: TableReader + ?Sized> TableReader for &T {
    #[inline]
    fn read_entry(&self, table: PhysicalAddress, index: usize) -> Option<u64> {
        (**self).read_entry(table, index)
    }
}

/// Reads live tables through an identity mapping (VA == PA).
///
/// This is the usual situation in firmware, where every table frame is
/// reachable at its physical address.
#[derive(Debug)]
pub struct IdentityMapped {
    _private: (),
}

impl IdentityMapped {
    /// # Safety
    /// Every table reachable from the root being walked must be mapped
    /// readable at its physical address, and must not be modified for as
    /// long as a walk using this reader is in progress.
    #[inline]
    #[must_use]
    pub const unsafe fn new() -> Self {
        Self { _private: () }
    }
}

impl TableReader for IdentityMapped {
    #[allow(clippy::cast_possible_truncation)]
    fn read_entry(&self, table: PhysicalAddress, index: usize) -> Option<u64> {
        if table.is_zero() || !table.is_aligned_to(ENTRY_SIZE) || index >= ENTRIES_PER_TABLE {
            return None;
        }

        let entry = (table.as_u64() as usize as *const u64).wrapping_add(index);

        // SAFETY: upheld by the caller of `IdentityMapped::new`; the table is
        // entry-aligned and the walker keeps `index` within it.
        Some(unsafe { core::ptr::read_volatile(entry) })
    }
}
