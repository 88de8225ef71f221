//! # Flat Page Maps
//!
//! Flattens the live (or captured) translation tables of an x86-64 or AArch64
//! CPU into a short, sorted list of [`Region`]s. Each region is a maximal run
//! of address space that is mapped contiguously with identical attributes,
//! tagged with the leaf descriptor bits that apply to all of it.
//!
//! ## What you get
//! - [`create_flat_map`] to walk the tables and fill a caller-owned [`PageMap`].
//! - [`get_region_attributes`] to ask whether a range is readable, writable
//!   or executable, answered as [`RegionAttributes`].
//! - Per-architecture descriptor decoding in [`arch`] ([`X64`], [`AArch64`]).
//! - [`TableReader`] to decouple the walk from how table memory is reached:
//!   [`IdentityMapped`] for live tables, [`SnapshotReader`] for captures.
//!
//! ## Walk → Merge → Map
//!
//! ```text
//!  ControlState ──► root table, shape, hierarchical control
//!        │
//!        ▼
//!  Walker (recursive, level by level)
//!        │  one candidate per present leaf
//!        ▼
//!  RegionSink ──► extend previous region, or emit a new one
//!        │
//!        ▼
//!  PageMap.entries[..capacity]  (+ one scratch slot once full)
//! ```
//!
//! Two neighbours merge when they are contiguous in linear address, contiguous
//! in output address, and equal under the architecture's equality mask.
//! Unmapped ranges never produce regions.
//!
//! ## Capacity negotiation
//!
//! The caller owns the storage. If it is too small, [`create_flat_map`]
//! returns [`FlatMapError::BufferTooSmall`] with the exact number of regions
//! needed; a second call with that capacity succeeds and yields identical
//! regions, provided the tables did not change in between.
//!
//! ## Concurrency
//!
//! Nothing is cached and there is no global state. The tables are read
//! without locking; keep them stable for the duration of a call.

#![cfg_attr(not(test), no_std)]
#![allow(unsafe_code)]

pub mod arch;
mod control;
mod error;
mod map;
mod merge;
mod query;
mod reader;
mod region;
pub mod snapshot;
mod walker;

pub use crate::arch::aarch64::HierarchicalControl;
pub use crate::arch::{AArch64, Architecture, DescriptorFormat, X64};
pub use crate::control::{AArch64Control, ControlState, TranslationRegime, X64Control};
pub use crate::error::FlatMapError;
pub use crate::map::{PageMap, create_flat_map};
pub use crate::query::{RegionAttributes, get_region_attributes};
pub use crate::reader::{IdentityMapped, TableReader};
pub use crate::region::Region;
pub use crate::snapshot::{Snapshot, SnapshotError, SnapshotHeader, SnapshotReader};

pub use paging_addresses::{PhysicalAddress, VirtualAddress};
pub use paging_registers as registers;
