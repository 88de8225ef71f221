//! # Recursive Table Walker
//!
//! Visits every slot of every reachable table, top-down and in ascending
//! address order, and hands each present leaf to the [`RegionSink`].
//!
//! The region start advances by the level's block size after *every* slot,
//! including holes, so addresses stay correct across unmapped ranges.
//! Heritable table bits accumulate by OR on the way down and are folded into
//! each leaf by the format.

use crate::arch::{EntryKind, TableFormat, TableShape};
use crate::merge::RegionSink;
use crate::reader::TableReader;
use crate::region::Region;
use paging_addresses::{PhysicalAddress, VirtualAddress};

struct Walker<'r, 'e, F: TableFormat, R: TableReader + ?Sized> {
    reader: &'r R,
    shape: TableShape,
    inheritance: F::Inheritance,
    sink: RegionSink<'e>,
}

impl<F: TableFormat, R: TableReader + ?Sized> Walker<'_, '_, F, R> {
    fn walk(&mut self, table: PhysicalAddress, level: u8, mut region_start: u64, inherited: u64) {
        let block_size = self.shape.block_size(level);

        for index in 0..self.shape.entries_at(level) {
            let Some(raw) = self.reader.read_entry(table, index) else {
                log::warn!("level-{level} table at {table} is not readable; skipped");
                return;
            };

            match F::classify(raw, level, &self.shape) {
                EntryKind::Invalid => {}
                EntryKind::Leaf(leaf) => {
                    let descriptor = F::apply_inherited(leaf, inherited, self.inheritance);
                    let base = F::canonical(VirtualAddress::new(region_start), &self.shape);
                    self.sink
                        .push::<F>(Region::new(base, block_size, descriptor));
                }
                EntryKind::Table(next) => {
                    let inherited = inherited | F::heritable_bits(raw);
                    self.walk(next, level + 1, region_start, inherited);
                }
            }

            region_start = region_start.wrapping_add(block_size);
        }
    }
}

/// Walk the tree rooted at `root` and collect merged regions into `entries`.
///
/// Returns the total number of regions, which exceeds `entries.len()` when
/// the storage was too small.
pub(crate) fn flatten<F: TableFormat, R: TableReader + ?Sized>(
    reader: &R,
    root: PhysicalAddress,
    shape: TableShape,
    inheritance: F::Inheritance,
    entries: &mut [Region],
) -> usize {
    let capacity = entries.len();
    let mut walker = Walker::<F, R> {
        reader,
        shape,
        inheritance,
        sink: RegionSink::new(entries),
    };
    walker.walk(root, shape.root_level(), 0, 0);

    let count = walker.sink.count();
    log::debug!(
        "{:?}: root {root}, level {} with {} entries, {inheritance:?}: {count} regions (capacity {capacity})",
        F::ARCHITECTURE,
        shape.root_level(),
        shape.root_entries(),
    );
    count
}
