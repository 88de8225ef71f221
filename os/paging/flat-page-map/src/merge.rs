//! # Region Merge Engine
//!
//! Folds each candidate into the most recently emitted region when the two
//! are contiguous in linear and physical address and carry equal attributes;
//! otherwise emits a new region.
//!
//! Emission writes into the caller's slots while free ones remain. Past that
//! point the count keeps growing and a single scratch region takes the role
//! of "most recent", so runs beyond the caller's capacity still merge and the
//! final count is exact.

use crate::arch::{DescriptorFormat, mergeable};
use crate::region::Region;

/// Where the most recently emitted region lives.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
enum Last {
    Entry(usize),
    Scratch,
}

/// Collects regions from one walk into caller-owned storage.
pub(crate) struct RegionSink<'e> {
    entries: &'e mut [Region],
    count: usize,
    scratch: Region,
    last: Option<Last>,
}

impl<'e> RegionSink<'e> {
    pub(crate) const fn new(entries: &'e mut [Region]) -> Self {
        Self {
            entries,
            count: 0,
            scratch: Region::new(paging_addresses::VirtualAddress::zero(), 0, 0),
            last: None,
        }
    }

    /// Regions emitted so far, including those that did not fit.
    #[inline]
    pub(crate) const fn count(&self) -> usize {
        self.count
    }

    fn last_mut(&mut self) -> Option<&mut Region> {
        match self.last? {
            Last::Entry(index) => self.entries.get_mut(index),
            Last::Scratch => Some(&mut self.scratch),
        }
    }

    /// Merge `candidate` into the previous region or emit it as a new one.
    pub(crate) fn push<F: DescriptorFormat>(&mut self, candidate: Region) {
        if let Some(previous) = self.last_mut()
            && mergeable::<F>(previous, &candidate)
            && let Some(length) = previous.length.checked_add(candidate.length)
        {
            previous.length = length;
            log::trace!(
                "extend region at {} to {length:#x} bytes",
                previous.base_address
            );
            return;
        }

        if let Some(slot) = self.entries.get_mut(self.count) {
            *slot = candidate;
            self.last = Some(Last::Entry(self.count));
        } else {
            self.scratch = candidate;
            self.last = Some(Last::Scratch);
        }
        self.count += 1;

        log::trace!(
            "region #{}: {} +{:#x} descriptor {:#018x}",
            self.count,
            candidate.base_address,
            candidate.length,
            candidate.raw_descriptor
        );
    }
}
