#[cfg(all(feature = "asm", target_arch = "x86_64"))]
use crate::LoadRegisterUnsafe;
use bitfield_struct::bitfield;

/// CR4: the paging-related subset of control register 4.
///
/// Only the bits that change how translation tables are shaped or
/// interpreted are named; the remaining bits are carried opaquely.
#[bitfield(u64, order = Lsb)]
#[derive(Eq, PartialEq)]
pub struct Cr4 {
    /// Bits 0–4: VME, PVI, TSD, DE, PSE.
    #[bits(5)]
    pub low: u8,

    /// Bit 5: PAE, physical address extension (always set in long mode).
    pub pae: bool,

    /// Bit 6: MCE.
    #[bits(1)]
    pub mce: u8,

    /// Bit 7: PGE, global pages enabled.
    pub pge: bool,

    /// Bits 8–11: PCE, OSFXSR, OSXMMEXCPT, UMIP.
    #[bits(4)]
    pub mid: u8,

    /// Bit 12: LA57, 57-bit linear addresses (5-level paging).
    pub la57: bool,

    /// Bits 13–16: VMXE, SMXE, reserved, FSGSBASE.
    #[bits(4)]
    pub virt: u8,

    /// Bit 17: PCIDE, process-context identifiers.
    pub pcide: bool,

    /// Bits 18–19: OSXSAVE, reserved.
    #[bits(2)]
    pub xsave: u8,

    /// Bit 20: SMEP, supervisor-mode execution prevention.
    pub smep: bool,

    /// Bit 21: SMAP, supervisor-mode access prevention.
    pub smap: bool,

    /// Bit 22: PKE, protection keys for user pages.
    pub pke: bool,

    /// Bits 23–63.
    #[bits(41)]
    pub high: u64,
}

impl Cr4 {
    /// Number of translation levels implied by `LA57`.
    #[inline]
    #[must_use]
    pub const fn paging_levels(&self) -> u8 {
        if self.la57() { 5 } else { 4 }
    }
}

#[cfg(all(feature = "asm", target_arch = "x86_64"))]
impl LoadRegisterUnsafe for Cr4 {
    unsafe fn load_unsafe() -> Self {
        let cr4: u64;
        unsafe {
            core::arch::asm!("mov {}, cr4", out(reg) cr4, options(nomem, nostack, preserves_flags));
        }
        Self::from_bits(cr4)
    }
}
