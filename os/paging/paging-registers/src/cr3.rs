#[cfg(all(feature = "asm", target_arch = "x86_64"))]
use crate::LoadRegisterUnsafe;
use bitfield_struct::bitfield;
use paging_addresses::PhysicalAddress;

/// CR3: root table base register (IA-32e, PCID disabled).
///
/// Holds the physical base of the PML4 (or PML5 with `CR4.LA57`) and the
/// cache-control flags used for root-table accesses.
#[bitfield(u64)]
#[derive(Eq, PartialEq)]
pub struct Cr3 {
    /// Bits 0–2: reserved.
    #[bits(3)]
    pub reserved0: u8,

    /// Bit 3: PWT, page-level write-through for the root table.
    pub pwt: bool,

    /// Bit 4: PCD, page-level cache disable for the root table.
    pub pcd: bool,

    /// Bits 5–11: reserved.
    #[bits(7)]
    pub reserved1: u8,

    /// Bits 12–51: root table physical base >> 12.
    #[bits(40)]
    root_base_4k: u64,

    /// Bits 52–63: reserved (LAM / PCID-adjacent controls on newer parts).
    #[bits(12)]
    pub reserved2: u16,
}

impl Cr3 {
    /// Physical address of the root table (4 KiB-aligned).
    #[inline]
    #[must_use]
    pub const fn root_table(&self) -> PhysicalAddress {
        PhysicalAddress::new(self.root_base_4k() << 12)
    }

    /// Build a value pointing at `root`, which must be 4 KiB-aligned.
    #[inline]
    #[must_use]
    pub const fn with_root_table(self, root: PhysicalAddress) -> Self {
        debug_assert!(root.is_aligned_to(0x1000));
        self.with_root_base_4k(root.as_u64() >> 12)
    }
}

#[cfg(all(feature = "asm", target_arch = "x86_64"))]
impl LoadRegisterUnsafe for Cr3 {
    unsafe fn load_unsafe() -> Self {
        let cr3: u64;
        unsafe {
            core::arch::asm!("mov {}, cr3", out(reg) cr3, options(nomem, nostack, preserves_flags));
        }
        Self::from_bits(cr3)
    }
}
