use paging_addresses::VirtualAddress;

/// One maximal, attribute-homogeneous run of mapped address space.
///
/// `raw_descriptor` holds the leaf bits that apply to every page of the run,
/// normalized to the 4 KiB leaf layout and, on AArch64, with table-level
/// restrictions already folded in. Its output-address bits describe the
/// first page of the run.
#[repr(C)]
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Hash)]
pub struct Region {
    pub base_address: VirtualAddress,
    /// Size in bytes; a positive multiple of 4 KiB.
    pub length: u64,
    pub raw_descriptor: u64,
}

impl Region {
    #[inline]
    #[must_use]
    pub const fn new(base_address: VirtualAddress, length: u64, raw_descriptor: u64) -> Self {
        Self {
            base_address,
            length,
            raw_descriptor,
        }
    }

    /// One past the last byte, or `None` if the region reaches the top of the address space.
    #[inline]
    #[must_use]
    pub const fn end(&self) -> Option<VirtualAddress> {
        self.base_address.checked_add(self.length)
    }

    /// Whether `[address, address + length)` lies entirely inside this region.
    #[must_use]
    pub const fn contains_range(&self, address: VirtualAddress, length: u64) -> bool {
        let start = self.base_address.as_u64();
        let query = address.as_u64();
        if query < start {
            return false;
        }

        // Offsets relative to the region start cannot overflow for a well-formed region.
        let offset = query - start;
        offset < self.length && length <= self.length - offset
    }
}
