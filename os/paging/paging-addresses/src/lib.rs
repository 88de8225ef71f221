//! # Physical and Virtual Addresses
//!
//! Zero-cost `u64` newtypes that keep the two address kinds apart while
//! walking translation tables:
//!
//! | Type | Meaning |
//! |------|---------|
//! | [`PhysicalAddress`] | Output address of a descriptor, or the base of a table frame. |
//! | [`VirtualAddress`] | Input (linear) address covered by a descriptor. |
//!
//! Translation tables store physical addresses; the flattened map reports
//! virtual ranges. Mixing them up is the classic bug when comparing
//! "address-contiguous" with "physically contiguous", hence the types.
//!
//! ## Canonical addresses
//!
//! On x86-64 only the low 48 (or 57, with 5-level paging) bits of a linear
//! address are translated; the remaining high bits must replicate the top
//! implemented bit. [`VirtualAddress::canonical`] performs that sign extension.

#![cfg_attr(not(any(test, doctest)), no_std)]

mod physical_address;
mod virtual_address;

pub use crate::physical_address::PhysicalAddress;
pub use crate::virtual_address::VirtualAddress;

/// Size of the smallest translation granule (4 KiB) on both supported architectures.
pub const GRANULE_SIZE: u64 = 4096;

/// log2 of [`GRANULE_SIZE`].
pub const GRANULE_SHIFT: u32 = 12;
