use bitfield_struct::bitfield;
use paging_addresses::PhysicalAddress;

/// `TTBR0_EL1` / `TTBR0_EL2`: translation table base for the lower VA range.
///
/// Both registers share this layout when the 16-bit ASID is in use.
/// UEFI runs identity-mapped out of the lower range, so only `TTBR0` matters
/// for firmware-owned tables.
#[bitfield(u64)]
#[derive(Eq, PartialEq)]
pub struct Ttbr0 {
    /// Bit 0: CnP, common-not-private.
    pub cnp: bool,

    /// Bits 1–47: BADDR, root table base address bits `[47:1]`.
    #[bits(47)]
    baddr: u64,

    /// Bits 48–63: ASID.
    #[bits(16)]
    pub asid: u16,
}

impl Ttbr0 {
    /// Physical address of the root translation table.
    #[inline]
    #[must_use]
    pub const fn root_table(&self) -> PhysicalAddress {
        PhysicalAddress::new(self.baddr() << 1)
    }

    /// Read `TTBR0_EL1`.
    ///
    /// # Safety
    /// Must run at EL1 or higher.
    #[cfg(all(feature = "asm", target_arch = "aarch64"))]
    #[must_use]
    pub unsafe fn load_el1() -> Self {
        let v: u64;
        unsafe {
            core::arch::asm!("mrs {}, ttbr0_el1", out(reg) v, options(nomem, nostack, preserves_flags));
        }
        Self::from_bits(v)
    }

    /// Read `TTBR0_EL2`.
    ///
    /// # Safety
    /// Must run at EL2 or higher.
    #[cfg(all(feature = "asm", target_arch = "aarch64"))]
    #[must_use]
    pub unsafe fn load_el2() -> Self {
        let v: u64;
        unsafe {
            core::arch::asm!("mrs {}, ttbr0_el2", out(reg) v, options(nomem, nostack, preserves_flags));
        }
        Self::from_bits(v)
    }
}
