mod common;

use common::{Lcg, TableMemory, aarch64_el1, assert_well_formed, flatten, pages_of, x64_control};
use flat_page_map::arch::TableShape;
use flat_page_map::{
    Architecture, DescriptorFormat, FlatMapError, PageMap, PhysicalAddress, Region,
    RegionAttributes, VirtualAddress, X64, create_flat_map, get_region_attributes,
};
use std::collections::BTreeMap;

const P: u64 = 1 << 0;
const RW: u64 = 1 << 1;
const US: u64 = 1 << 2;
const ACCESSED: u64 = 1 << 5;
const DIRTY: u64 = 1 << 6;
const PS: u64 = 1 << 7;
const NX: u64 = 1 << 63;
const TABLE: u64 = P | RW | US;

const KIB4: u64 = 0x1000;
const MIB2: u64 = 0x20_0000;
const GIB1: u64 = 0x4000_0000;

fn four_level() -> (TableMemory, PhysicalAddress, TableShape) {
    let mut mem = TableMemory::new();
    let root = mem.alloc_table();
    (mem, root, TableShape::x64(4))
}

#[test]
fn empty_root_yields_no_regions() {
    let (mem, root, _) = four_level();
    let control = x64_control(root, false);

    let mut map = PageMap::size_query(Architecture::X64);
    assert_eq!(create_flat_map(&mut map, &control, &mem), Ok(()));
    assert_eq!(map.count(), 0);
    assert!(map.is_populated());
    assert_eq!(
        get_region_attributes(&map, VirtualAddress::new(0x1000), 0x1000),
        Err(FlatMapError::NotFound)
    );
}

#[test]
fn repeated_descriptor_becomes_one_region() {
    let (mut mem, root, shape) = four_level();
    let flags = P | RW | NX;
    for i in 0..16 {
        mem.map(root, &shape, TABLE, 0x40_0000 + i * KIB4, 3, (0x80_0000 + i * KIB4) | flags);
    }

    let regions = flatten(&x64_control(root, false), &mem);
    assert_eq!(
        regions,
        [Region::new(VirtualAddress::new(0x40_0000), 16 * KIB4, 0x80_0000 | flags)]
    );

    let raw = regions[0].raw_descriptor;
    assert!(X64::is_readable(raw));
    assert!(X64::is_writable(raw));
    assert!(!X64::is_executable(raw));
}

#[test]
fn write_permission_change_splits_at_the_boundary() {
    let (mut mem, root, shape) = four_level();
    mem.map(root, &shape, TABLE, 0x1000, 3, 0x5000 | P | RW);
    mem.map(root, &shape, TABLE, 0x2000, 3, 0x6000 | P);

    let regions = flatten(&x64_control(root, false), &mem);
    assert_eq!(regions.len(), 2);
    assert_eq!(regions[0].base_address, VirtualAddress::new(0x1000));
    assert_eq!(regions[1].base_address, VirtualAddress::new(0x2000));
    assert!(X64::is_writable(regions[0].raw_descriptor));
    assert!(!X64::is_writable(regions[1].raw_descriptor));
}

#[test]
fn accessed_and_dirty_bits_do_not_split() {
    let (mut mem, root, shape) = four_level();
    mem.map(root, &shape, TABLE, 0x1000, 3, 0x5000 | P | RW | ACCESSED);
    mem.map(root, &shape, TABLE, 0x2000, 3, 0x6000 | P | RW | DIRTY);
    mem.map(root, &shape, TABLE, 0x3000, 3, 0x7000 | P | RW);

    let regions = flatten(&x64_control(root, false), &mem);
    assert_eq!(regions.len(), 1);
    assert_eq!(regions[0].length, 3 * KIB4);
}

#[test]
fn holes_keep_addresses_and_split_regions() {
    let (mut mem, root, shape) = four_level();
    mem.map(root, &shape, TABLE, 0x1000, 3, 0x5000 | P | RW);
    mem.map(root, &shape, TABLE, 0x3000, 3, 0x7000 | P | RW);

    let regions = flatten(&x64_control(root, false), &mem);
    assert_eq!(
        regions,
        [
            Region::new(VirtualAddress::new(0x1000), KIB4, 0x5000 | P | RW),
            Region::new(VirtualAddress::new(0x3000), KIB4, 0x7000 | P | RW),
        ]
    );
}

#[test]
fn physical_gap_splits_linear_run() {
    let (mut mem, root, shape) = four_level();
    mem.map(root, &shape, TABLE, 0x1000, 3, 0x5000 | P | RW);
    mem.map(root, &shape, TABLE, 0x2000, 3, 0x9000 | P | RW);

    let regions = flatten(&x64_control(root, false), &mem);
    assert_eq!(regions.len(), 2);
    assert_well_formed(Architecture::X64, &regions);
}

#[test]
fn large_pages_merge_with_small_pages() {
    let (mut mem, root, shape) = four_level();
    // 2 MiB page at 2 MiB, followed by 4 KiB pages continuing the same run.
    mem.map(root, &shape, TABLE, MIB2, 2, MIB2 | P | RW | PS);
    mem.map(root, &shape, TABLE, 2 * MIB2, 3, 2 * MIB2 | P | RW);
    mem.map(root, &shape, TABLE, 2 * MIB2 + KIB4, 3, (2 * MIB2 + KIB4) | P | RW);

    let regions = flatten(&x64_control(root, false), &mem);
    assert_eq!(
        regions,
        [Region::new(VirtualAddress::new(MIB2), MIB2 + 2 * KIB4, MIB2 | P | RW)]
    );
}

#[test]
fn large_page_pat_is_reported_in_small_page_position() {
    let (mut mem, root, shape) = four_level();
    let pat_large = 1 << 12;
    mem.map(root, &shape, TABLE, GIB1, 1, (3 * GIB1) | pat_large | P | PS);

    let regions = flatten(&x64_control(root, false), &mem);
    assert_eq!(regions.len(), 1);
    assert_eq!(regions[0].length, GIB1);
    assert_eq!(regions[0].raw_descriptor, (3 * GIB1) | (1 << 7) | P);
    assert_eq!(
        X64::physical_target(regions[0].raw_descriptor),
        PhysicalAddress::new(3 * GIB1)
    );
}

#[test]
fn upper_half_addresses_are_canonical() {
    let (mut mem, root, shape) = four_level();
    let va = 0xFFFF_FF80_0000_0000;
    mem.map(root, &shape, TABLE, va, 3, 0x5000 | P);

    let regions = flatten(&x64_control(root, false), &mem);
    assert_eq!(regions.len(), 1);
    assert_eq!(regions[0].base_address, VirtualAddress::new(va));
}

#[test]
fn five_level_paging_walks_pml5() {
    let mut mem = TableMemory::new();
    let root = mem.alloc_table();
    let shape = TableShape::x64(5);
    let va = 0x0001_0000_0000_0000; // PML5 index 1
    mem.map(root, &shape, TABLE, va, 4, 0x5000 | P | RW);
    mem.map(root, &shape, TABLE, va + KIB4, 4, 0x6000 | P | RW);

    let regions = flatten(&x64_control(root, true), &mem);
    assert_eq!(
        regions,
        [Region::new(VirtualAddress::new(va), 2 * KIB4, 0x5000 | P | RW)]
    );

    // The same tables read as 4-level see the entry at PML4 index 2 instead.
    let four = flatten(&x64_control(root, false), &mem);
    assert_ne!(four, regions);
}

#[test]
fn two_call_protocol() {
    let (mut mem, root, shape) = four_level();
    for i in 0..6 {
        // Alternate RW and RO so every page becomes its own region.
        let flags = if i % 2 == 0 { P | RW } else { P };
        mem.map(root, &shape, TABLE, i * KIB4, 3, (0x10_0000 + i * KIB4) | flags);
    }
    let control = x64_control(root, false);

    let mut probe = PageMap::size_query(Architecture::X64);
    assert_eq!(
        create_flat_map(&mut probe, &control, &mem),
        Err(FlatMapError::BufferTooSmall { required: 6 })
    );
    assert_eq!(probe.count(), 6);
    assert!(probe.regions().is_empty());

    let mut short = [Region::default(); 2];
    let mut map = PageMap::new(Architecture::X64, &mut short);
    assert_eq!(
        create_flat_map(&mut map, &control, &mem),
        Err(FlatMapError::BufferTooSmall { required: 6 })
    );
    assert!(!map.is_populated());
    assert!(map.regions().is_empty());

    let mut first = vec![Region::default(); 6];
    let mut second = vec![Region::default(); 6];
    let mut a = PageMap::new(Architecture::X64, &mut first);
    let mut b = PageMap::new(Architecture::X64, &mut second);
    assert_eq!(create_flat_map(&mut a, &control, &mem), Ok(()));
    assert_eq!(create_flat_map(&mut b, &control, &mem), Ok(()));
    assert_eq!(a.regions(), b.regions());
    assert_eq!(a.count(), 6);
}

#[test]
fn larger_buffer_reports_true_count() {
    let (mut mem, root, shape) = four_level();
    mem.map(root, &shape, TABLE, 0x1000, 3, 0x5000 | P);
    let mut storage = [Region::default(); 8];
    let mut map = PageMap::new(Architecture::X64, &mut storage);
    assert_eq!(create_flat_map(&mut map, &x64_control(root, false), &mem), Ok(()));
    assert_eq!(map.count(), 1);
    assert_eq!(map.capacity(), 8);
    assert_eq!(map.regions().len(), 1);
}

#[test]
fn random_fixture_tiles_exactly() {
    let (mut mem, root, shape) = four_level();
    let mut rng = Lcg::new(0x5EED);
    let attribute_choices = [P | RW, P, P | RW | NX, P | US | RW];
    let mut expected = BTreeMap::new();

    // 4 KiB pages over the first 16 MiB: holes, contiguous runs and jumps.
    let mut next_pa = 0x1_0000_0000;
    let mut flags = attribute_choices[0];
    for slot in 0..4096 {
        let va = slot * KIB4;
        if rng.below(4) == 0 {
            continue;
        }
        if rng.below(8) == 0 {
            next_pa += rng.below(16) * KIB4 + KIB4;
        }
        if rng.below(6) == 0 {
            flags = attribute_choices[rng.below(4) as usize];
        }
        let noise = if rng.below(2) == 0 { ACCESSED } else { DIRTY };
        mem.map(root, &shape, TABLE, va, 3, next_pa | flags | noise);
        expected.insert(va, (next_pa, flags & X64::EQUALITY_MASK));
        next_pa += KIB4;
    }

    // 2 MiB pages between 16 MiB and 32 MiB.
    for slot in 8..16 {
        if rng.below(3) == 0 {
            continue;
        }
        let va = slot * MIB2;
        let pa = slot * MIB2 + 0x2_0000_0000;
        mem.map(root, &shape, TABLE, va, 2, pa | P | RW | PS);
        for offset in (0..MIB2).step_by(KIB4 as usize) {
            expected.insert(va + offset, (pa + offset, (P | RW) & X64::EQUALITY_MASK));
        }
    }

    let regions = flatten(&x64_control(root, false), &mem);
    assert_well_formed(Architecture::X64, &regions);
    assert_eq!(pages_of(Architecture::X64, &regions), expected);
}

#[test]
fn query_requires_single_containing_region() {
    let (mut mem, root, shape) = four_level();
    for i in 0..4 {
        mem.map(root, &shape, TABLE, 0x10_0000 + i * KIB4, 3, (0x50_0000 + i * KIB4) | P | RW | NX);
    }
    mem.map(root, &shape, TABLE, 0x10_4000, 3, 0x50_4000 | P);

    let mut storage = vec![Region::default(); 2];
    let mut map = PageMap::new(Architecture::X64, &mut storage);
    create_flat_map(&mut map, &x64_control(root, false), &mem).unwrap();

    let inside = get_region_attributes(&map, VirtualAddress::new(0x10_1800), 0x1000).unwrap();
    assert_eq!(inside, RegionAttributes::EXECUTE_PROTECT);

    let whole = get_region_attributes(&map, VirtualAddress::new(0x10_0000), 4 * KIB4).unwrap();
    assert_eq!(whole, inside);

    let code = get_region_attributes(&map, VirtualAddress::new(0x10_4000), KIB4).unwrap();
    assert_eq!(code, RegionAttributes::READ_ONLY);

    assert_eq!(
        get_region_attributes(&map, VirtualAddress::new(0x10_3000), 2 * KIB4),
        Err(FlatMapError::NotFound)
    );
    assert_eq!(
        get_region_attributes(&map, VirtualAddress::new(0x10_5000), KIB4),
        Err(FlatMapError::NotFound)
    );
    assert_eq!(
        get_region_attributes(&map, VirtualAddress::new(0x0F_F000), 2 * KIB4),
        Err(FlatMapError::NotFound)
    );
    assert_eq!(
        get_region_attributes(&map, VirtualAddress::new(0x10_0000), 0),
        Err(FlatMapError::InvalidParameter)
    );
    assert_eq!(
        get_region_attributes(&map, VirtualAddress::new(u64::MAX), 2),
        Err(FlatMapError::InvalidParameter)
    );
}

#[test]
fn parameter_validation() {
    let (mem, root, _) = four_level();

    let mut map = PageMap::size_query(Architecture::AArch64);
    assert_eq!(
        create_flat_map(&mut map, &x64_control(root, false), &mem),
        Err(FlatMapError::InvalidParameter)
    );

    let mut map = PageMap::size_query(Architecture::X64);
    assert_eq!(
        create_flat_map(&mut map, &x64_control(PhysicalAddress::zero(), false), &mem),
        Err(FlatMapError::NotFound)
    );

    let null = unsafe { PageMap::from_raw_parts(Architecture::X64, std::ptr::null_mut(), 4) };
    assert_eq!(null.unwrap_err(), FlatMapError::InvalidParameter);

    let query = unsafe { PageMap::from_raw_parts(Architecture::X64, std::ptr::null_mut(), 0) };
    assert_eq!(query.unwrap().capacity(), 0);
}

#[test]
fn rejected_call_clears_a_populated_map() {
    let (mut mem, root, shape) = four_level();
    mem.map(root, &shape, TABLE, 0x1000, 3, 0x5000 | P | RW);

    let mut storage = [Region::default(); 2];
    let mut map = PageMap::new(Architecture::X64, &mut storage);
    create_flat_map(&mut map, &x64_control(root, false), &mem).unwrap();
    assert!(map.is_populated());
    assert_eq!(map.count(), 1);

    assert_eq!(
        create_flat_map(&mut map, &aarch64_el1(root, 16, 0, false), &mem),
        Err(FlatMapError::InvalidParameter)
    );
    assert!(!map.is_populated());
    assert_eq!(map.count(), 0);
    assert!(map.regions().is_empty());
}

#[test]
fn raw_parts_storage_is_filled() {
    let (mut mem, root, shape) = four_level();
    mem.map(root, &shape, TABLE, 0x1000, 3, 0x5000 | P | RW);

    let mut storage = [Region::default(); 1];
    let mut map =
        unsafe { PageMap::from_raw_parts(Architecture::X64, storage.as_mut_ptr(), 1) }.unwrap();
    create_flat_map(&mut map, &x64_control(root, false), &mem).unwrap();
    drop(map);
    assert_eq!(storage[0].base_address, VirtualAddress::new(0x1000));
}

#[test]
fn unreadable_table_is_a_hole() {
    let (mut mem, root, shape) = four_level();
    mem.map(root, &shape, TABLE, 0x1000, 3, 0x5000 | P);
    // PML4 slot 1 points at a frame the reader does not know.
    mem.set(root, 1, 0xDEAD_0000 | TABLE);

    let regions = flatten(&x64_control(root, false), &mem);
    assert_eq!(regions.len(), 1);
}
