//! Flatten a captured page-table snapshot and print one line per region.
//!
//! ```text
//! page-map-dump <snapshot-file> [capacity]
//! ```
//!
//! Without `capacity` the tool asks the library for the required size first.
//! Set `PAGE_MAP_LOG=debug` (or `trace`) to see the walk.

mod logger;

use crate::logger::StderrLogger;
use flat_page_map::{
    Architecture, FlatMapError, PageMap, Region, RegionAttributes, Snapshot, TableReader,
    create_flat_map,
};
use std::error::Error;
use std::io::Write;
use std::{env, fs, io};

fn main() -> Result<(), Box<dyn Error>> {
    StderrLogger::from_env().init()?;

    let mut args = env::args().skip(1);
    let Some(path) = args.next() else {
        eprintln!("usage: page-map-dump <snapshot-file> [capacity]");
        return Err("missing snapshot file".into());
    };
    let capacity = args.next().map(|c| c.parse::<usize>()).transpose()?;

    let blob = fs::read(&path)?;
    let snapshot = Snapshot::parse(&blob)?;
    let control = snapshot.control();
    let reader = snapshot.reader();
    let architecture = snapshot.architecture();
    log::info!(
        "{path}: {architecture:?} snapshot, root table {}, memory from {}",
        control.root_table(),
        snapshot.header().physical_base
    );

    let capacity = match capacity {
        Some(capacity) => capacity,
        None => required_capacity(architecture, &control, &reader)?,
    };

    let mut storage = vec![Region::default(); capacity];
    let mut map = PageMap::new(architecture, &mut storage);
    match create_flat_map(&mut map, &control, &reader) {
        Ok(()) => {}
        Err(FlatMapError::BufferTooSmall { required }) => {
            log::error!("capacity {capacity} is too small, {required} regions required");
            return Err(FlatMapError::BufferTooSmall { required }.into());
        }
        Err(e) => return Err(e.into()),
    }

    let mut out = io::stdout().lock();
    for region in map.regions() {
        print_region(&mut out, architecture, region)?;
    }
    log::info!("{} regions", map.count());
    Ok(())
}

/// First half of the two-call protocol.
fn required_capacity(
    architecture: Architecture,
    control: &flat_page_map::ControlState,
    reader: &impl TableReader,
) -> Result<usize, FlatMapError> {
    let mut probe = PageMap::size_query(architecture);
    match create_flat_map(&mut probe, control, reader) {
        Ok(()) => Ok(0),
        Err(FlatMapError::BufferTooSmall { required }) => Ok(required),
        Err(e) => Err(e),
    }
}

fn print_region(out: &mut impl Write, architecture: Architecture, region: &Region) -> io::Result<()> {
    let attributes = RegionAttributes::from_descriptor(architecture, region.raw_descriptor);
    let flag = |on: bool, c: char| if on { c } else { '-' };
    let end = region.base_address.as_u64().wrapping_add(region.length);
    writeln!(
        out,
        "{:#018x}-{:#018x} {:>12} {}{}{} {} {:#018x}",
        region.base_address.as_u64(),
        end,
        region.length,
        flag(attributes.readable(), 'r'),
        flag(attributes.writable(), 'w'),
        flag(attributes.executable(), 'x'),
        architecture.physical_target(region.raw_descriptor),
        region.raw_descriptor,
    )
}
