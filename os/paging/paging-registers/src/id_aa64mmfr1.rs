#[cfg(all(feature = "asm", target_arch = "aarch64"))]
use crate::LoadRegisterUnsafe;
use bitfield_struct::bitfield;

/// `ID_AA64MMFR1_EL1`: AArch64 memory model feature register 1.
#[bitfield(u64, order = Lsb)]
#[derive(Eq, PartialEq)]
pub struct IdAa64Mmfr1El1 {
    /// Bits 0–3: HAFDBS, hardware access flag / dirty state support.
    #[bits(4)]
    pub hafdbs: u8,

    /// Bits 4–7: VMIDBits.
    #[bits(4)]
    pub vmid_bits: u8,

    /// Bits 8–11: VH, virtualization host extensions.
    #[bits(4)]
    pub vh: u8,

    /// Bits 12–15: HPDS, hierarchical permission disables.
    ///
    /// Non-zero means `TCR_ELx.HPD*` exist, i.e. the table-level `APTable`,
    /// `XNTable` and `PXNTable` bits can be turned off. When the field is
    /// zero those bits cannot be disabled.
    #[bits(4)]
    pub hpds: u8,

    /// Bits 16–63.
    #[bits(48)]
    pub high: u64,
}

#[cfg(all(feature = "asm", target_arch = "aarch64"))]
impl LoadRegisterUnsafe for IdAa64Mmfr1El1 {
    unsafe fn load_unsafe() -> Self {
        let v: u64;
        unsafe {
            core::arch::asm!("mrs {}, id_aa64mmfr1_el1", out(reg) v, options(nomem, nostack, preserves_flags));
        }
        Self::from_bits(v)
    }
}
