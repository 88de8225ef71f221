//! # Captured Snapshots
//!
//! A snapshot freezes everything a walk needs: the control registers and the
//! physical memory holding the tables. It lets a map be flattened offline,
//! on a different machine, or in a test.
//!
//! ## Layout (little-endian)
//!
//! | Offset | Size | Field |
//! |--------|------|-------|
//! | 0  | 8  | magic, [`SNAPSHOT_MAGIC`] (`"PGMAPSNP"`) |
//! | 8  | 4  | format version, [`SNAPSHOT_VERSION`] |
//! | 12 | 4  | architecture signature (`"X64 "` / `"AA64"`) |
//! | 16 | 8  | physical address of the first captured byte, 4 KiB-aligned |
//! | 24 | 32 | four raw registers, see [`ControlState::from_raw`] |
//! | 56 | 8  | absolute offset of the memory image, 8-byte aligned |
//!
//! The memory image runs from its offset to the end of the file.

use crate::arch::{Architecture, ENTRIES_PER_TABLE};
use crate::control::ControlState;
use crate::reader::TableReader;
use paging_addresses::{GRANULE_SIZE, PhysicalAddress};

/// `"PGMAPSNP"` read as a little-endian `u64`.
pub const SNAPSHOT_MAGIC: u64 = u64::from_le_bytes(*b"PGMAPSNP");

pub const SNAPSHOT_VERSION: u32 = 1;

/// Size of the encoded [`SnapshotHeader`].
pub const SNAPSHOT_HEADER_LEN: usize = 64;

#[derive(Debug, Copy, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SnapshotError {
    #[error("snapshot is truncated")]
    Truncated,
    #[error("not a page map snapshot")]
    BadMagic,
    #[error("unsupported snapshot version {0}")]
    UnsupportedVersion(u32),
    #[error("unknown architecture signature {0:#010x}")]
    UnknownArchitecture(u32),
    #[error("misaligned physical base or memory offset")]
    Misaligned,
    #[error("registers describe an unsupported translation regime")]
    UnsupportedRegime,
}

/// Decoded snapshot header.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct SnapshotHeader {
    pub architecture: Architecture,
    pub physical_base: PhysicalAddress,
    pub registers: [u64; 4],
}

impl SnapshotHeader {
    #[must_use]
    pub const fn new(control: &ControlState, physical_base: PhysicalAddress) -> Self {
        Self {
            architecture: control.architecture(),
            physical_base,
            registers: control.to_raw(),
        }
    }

    /// The control state encoded in the raw registers, if its regime is supported.
    #[must_use]
    pub const fn control(&self) -> Option<ControlState> {
        ControlState::from_raw(self.architecture, self.registers)
    }

    /// Encode the header; the memory image follows directly.
    #[must_use]
    pub fn to_bytes(&self) -> [u8; SNAPSHOT_HEADER_LEN] {
        let mut out = [0u8; SNAPSHOT_HEADER_LEN];
        out[0..8].copy_from_slice(&SNAPSHOT_MAGIC.to_le_bytes());
        out[8..12].copy_from_slice(&SNAPSHOT_VERSION.to_le_bytes());
        out[12..16].copy_from_slice(&self.architecture.signature().to_le_bytes());
        out[16..24].copy_from_slice(&self.physical_base.as_u64().to_le_bytes());
        for (i, register) in self.registers.iter().enumerate() {
            let off = 24 + i * 8;
            out[off..off + 8].copy_from_slice(&register.to_le_bytes());
        }
        out[56..64].copy_from_slice(&(SNAPSHOT_HEADER_LEN as u64).to_le_bytes());
        out
    }
}

#[inline]
fn read_u32_le(buf: &[u8], off: usize) -> Result<u32, SnapshotError> {
    let bytes = buf.get(off..off + 4).ok_or(SnapshotError::Truncated)?;
    let mut raw = [0u8; 4];
    raw.copy_from_slice(bytes);
    Ok(u32::from_le_bytes(raw))
}

#[inline]
fn read_u64_le(buf: &[u8], off: usize) -> Option<u64> {
    let end = off.checked_add(8)?;
    let bytes = buf.get(off..end)?;
    let mut raw = [0u8; 8];
    raw.copy_from_slice(bytes);
    Some(u64::from_le_bytes(raw))
}

/// A parsed snapshot borrowing its bytes.
#[derive(Debug, Copy, Clone)]
pub struct Snapshot<'a> {
    header: SnapshotHeader,
    control: ControlState,
    memory: &'a [u8],
}

impl<'a> Snapshot<'a> {
    /// Parse and validate a snapshot blob.
    ///
    /// # Errors
    /// Any [`SnapshotError`] describing why the blob is not a usable snapshot.
    pub fn parse(blob: &'a [u8]) -> Result<Self, SnapshotError> {
        if blob.len() < SNAPSHOT_HEADER_LEN {
            return Err(SnapshotError::Truncated);
        }

        let field = |off| read_u64_le(blob, off).ok_or(SnapshotError::Truncated);

        if field(0)? != SNAPSHOT_MAGIC {
            return Err(SnapshotError::BadMagic);
        }

        let version = read_u32_le(blob, 8)?;
        if version != SNAPSHOT_VERSION {
            return Err(SnapshotError::UnsupportedVersion(version));
        }

        let signature = read_u32_le(blob, 12)?;
        let architecture = Architecture::from_signature(signature)
            .ok_or(SnapshotError::UnknownArchitecture(signature))?;

        let physical_base = PhysicalAddress::new(field(16)?);
        let registers = [field(24)?, field(32)?, field(40)?, field(48)?];
        let control = ControlState::from_raw(architecture, registers)
            .ok_or(SnapshotError::UnsupportedRegime)?;

        let memory_off = usize::try_from(field(56)?).map_err(|_| SnapshotError::Truncated)?;
        if !physical_base.is_aligned_to(GRANULE_SIZE) || memory_off % 8 != 0 {
            return Err(SnapshotError::Misaligned);
        }
        if memory_off < SNAPSHOT_HEADER_LEN {
            return Err(SnapshotError::Truncated);
        }
        let memory = blob.get(memory_off..).ok_or(SnapshotError::Truncated)?;

        Ok(Self {
            header: SnapshotHeader {
                architecture,
                physical_base,
                registers,
            },
            control,
            memory,
        })
    }

    #[inline]
    #[must_use]
    pub const fn header(&self) -> &SnapshotHeader {
        &self.header
    }

    #[inline]
    #[must_use]
    pub const fn architecture(&self) -> Architecture {
        self.header.architecture
    }

    #[inline]
    #[must_use]
    pub const fn control(&self) -> ControlState {
        self.control
    }

    /// A [`TableReader`] over the captured memory.
    #[inline]
    #[must_use]
    pub const fn reader(&self) -> SnapshotReader<'a> {
        SnapshotReader::new(self.header.physical_base, self.memory)
    }
}

/// Reads tables out of a captured physical memory image.
///
/// Tables outside the image are reported as unreadable.
#[derive(Debug, Copy, Clone)]
pub struct SnapshotReader<'a> {
    base: PhysicalAddress,
    memory: &'a [u8],
}

impl<'a> SnapshotReader<'a> {
    /// `memory[0]` is the byte at physical address `base`.
    #[inline]
    #[must_use]
    pub const fn new(base: PhysicalAddress, memory: &'a [u8]) -> Self {
        Self { base, memory }
    }
}

impl TableReader for SnapshotReader<'_> {
    fn read_entry(&self, table: PhysicalAddress, index: usize) -> Option<u64> {
        if index >= ENTRIES_PER_TABLE {
            return None;
        }
        let offset = table.as_u64().checked_sub(self.base.as_u64())?;
        let offset = usize::try_from(offset).ok()?;
        read_u64_le(self.memory, offset.checked_add(index * 8)?)
    }
}
