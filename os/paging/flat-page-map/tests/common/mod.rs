#![allow(dead_code)]

use flat_page_map::arch::TableShape;
use flat_page_map::registers::{Cr3, Cr4, IdAa64Mmfr1El1, TcrEl1, TcrEl2, Ttbr0};
use flat_page_map::{
    AArch64Control, Architecture, ControlState, FlatMapError, PageMap, PhysicalAddress, Region,
    TableReader, X64Control, create_flat_map,
};
use std::collections::BTreeMap;

pub const ENTRIES: usize = 512;
const ADDRESS_MASK: u64 = 0x000F_FFFF_FFFF_F000;

/// Synthetic physical memory holding 4 KiB table frames.
pub struct TableMemory {
    frames: BTreeMap<u64, [u64; ENTRIES]>,
    next_frame: u64,
}

impl TableMemory {
    pub fn new() -> Self {
        Self {
            frames: BTreeMap::new(),
            next_frame: 0x10_0000,
        }
    }

    pub fn alloc_table(&mut self) -> PhysicalAddress {
        let pa = self.next_frame;
        self.next_frame += 0x1000;
        self.frames.insert(pa, [0; ENTRIES]);
        PhysicalAddress::new(pa)
    }

    pub fn set(&mut self, table: PhysicalAddress, index: usize, raw: u64) {
        self.frames
            .get_mut(&table.as_u64())
            .expect("table frame allocated")[index] = raw;
    }

    pub fn get(&self, table: PhysicalAddress, index: usize) -> u64 {
        self.frames[&table.as_u64()][index]
    }

    /// Index of `va` in a table at `level`.
    pub fn index(shape: &TableShape, va: u64, level: u8) -> usize {
        let shift = 12 + 9 * u32::from(shape.leaf_level() - level);
        ((va >> shift) as usize) % shape.entries_at(level)
    }

    /// The table at `level` covering `va`, creating missing tables on the way.
    ///
    /// New table descriptors are `next | table_bits`.
    pub fn table_for(
        &mut self,
        root: PhysicalAddress,
        shape: &TableShape,
        va: u64,
        level: u8,
        table_bits: u64,
    ) -> PhysicalAddress {
        let mut table = root;
        for l in shape.root_level()..level {
            let index = Self::index(shape, va, l);
            let entry = self.get(table, index);
            table = if entry == 0 {
                let next = self.alloc_table();
                self.set(table, index, next.as_u64() | table_bits);
                next
            } else {
                PhysicalAddress::new(entry & ADDRESS_MASK)
            };
        }
        table
    }

    /// Install `leaf` for `va` at `level`.
    pub fn map(
        &mut self,
        root: PhysicalAddress,
        shape: &TableShape,
        table_bits: u64,
        va: u64,
        level: u8,
        leaf: u64,
    ) {
        let table = self.table_for(root, shape, va, level, table_bits);
        self.set(table, Self::index(shape, va, level), leaf);
    }

    /// A contiguous image of all frames, starting at the lowest one.
    pub fn image(&self) -> (PhysicalAddress, Vec<u8>) {
        let base = *self.frames.keys().next().expect("at least one frame");
        let mut image = vec![0u8; (self.next_frame - base) as usize];
        for (pa, frame) in &self.frames {
            let off = (pa - base) as usize;
            for (i, entry) in frame.iter().enumerate() {
                image[off + i * 8..off + i * 8 + 8].copy_from_slice(&entry.to_le_bytes());
            }
        }
        (PhysicalAddress::new(base), image)
    }
}

impl TableReader for TableMemory {
    fn read_entry(&self, table: PhysicalAddress, index: usize) -> Option<u64> {
        self.frames.get(&table.as_u64())?.get(index).copied()
    }
}

pub fn x64_control(root: PhysicalAddress, five_level: bool) -> ControlState {
    ControlState::X64(X64Control::new(
        Cr3::new().with_root_table(root),
        Cr4::new().with_pae(true).with_la57(five_level),
    ))
}

pub fn aarch64_el1(root: PhysicalAddress, t0sz: u8, hpds: u8, hpd0: bool) -> ControlState {
    ControlState::AArch64(AArch64Control::el1(
        Ttbr0::from_bits(root.as_u64()),
        TcrEl1::new().with_t0sz(t0sz).with_hpd0(hpd0),
        IdAa64Mmfr1El1::new().with_hpds(hpds),
    ))
}

pub fn aarch64_el2(root: PhysicalAddress, t0sz: u8, hpds: u8) -> ControlState {
    ControlState::AArch64(AArch64Control::el2(
        Ttbr0::from_bits(root.as_u64()),
        TcrEl2::new().with_t0sz(t0sz),
        IdAa64Mmfr1El1::new().with_hpds(hpds),
    ))
}

/// Run the two-call protocol and return the regions.
pub fn flatten<R: TableReader>(control: &ControlState, reader: &R) -> Vec<Region> {
    let architecture = control.architecture();
    let mut probe = PageMap::size_query(architecture);
    let required = match create_flat_map(&mut probe, control, reader) {
        Ok(()) => return Vec::new(),
        Err(FlatMapError::BufferTooSmall { required }) => required,
        Err(e) => panic!("size query failed: {e}"),
    };
    assert_eq!(probe.count(), required);

    let mut storage = vec![Region::default(); required];
    let mut map = PageMap::new(architecture, &mut storage);
    create_flat_map(&mut map, control, reader).expect("second call succeeds");
    assert_eq!(map.count(), required);
    map.regions().to_vec()
}

/// Sorted, non-overlapping, and no neighbour could have been merged.
pub fn assert_well_formed(architecture: Architecture, regions: &[Region]) {
    for r in regions {
        assert!(r.length > 0 && r.length % 0x1000 == 0, "bad length in {r:?}");
    }
    for pair in regions.windows(2) {
        let (a, b) = (&pair[0], &pair[1]);
        let end = a.base_address.as_u64().checked_add(a.length).expect("no wrap");
        assert!(end <= b.base_address.as_u64(), "overlap: {a:?} {b:?}");
        assert!(
            !architecture.regions_mergeable(a, b),
            "under-merged: {a:?} {b:?}"
        );
    }
}

/// Expand regions into (page VA → (page PA, masked attributes)).
pub fn pages_of(architecture: Architecture, regions: &[Region]) -> BTreeMap<u64, (u64, u64)> {
    let mask = architecture.equality_mask();
    let mut pages = BTreeMap::new();
    for r in regions {
        let pa = architecture.physical_target(r.raw_descriptor).as_u64();
        for offset in (0..r.length).step_by(0x1000) {
            let previous = pages.insert(
                r.base_address.as_u64() + offset,
                (pa + offset, r.raw_descriptor & mask),
            );
            assert!(previous.is_none(), "page covered twice");
        }
    }
    pages
}

/// Small deterministic generator for fixture layouts.
pub struct Lcg(u64);

impl Lcg {
    pub const fn new(seed: u64) -> Self {
        Self(seed)
    }

    pub fn next(&mut self) -> u64 {
        self.0 = self
            .0
            .wrapping_mul(6_364_136_223_846_793_005)
            .wrapping_add(1_442_695_040_888_963_407);
        self.0 >> 33
    }

    pub fn below(&mut self, n: u64) -> u64 {
        self.next() % n
    }
}
