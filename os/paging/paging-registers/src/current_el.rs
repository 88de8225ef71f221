#[cfg(all(feature = "asm", target_arch = "aarch64"))]
use crate::LoadRegisterUnsafe;
use bitfield_struct::bitfield;

/// `CurrentEL`: the exception level the processor is executing at.
#[bitfield(u64, order = Lsb)]
#[derive(Eq, PartialEq)]
pub struct CurrentEl {
    /// Bits 0–1: reserved.
    #[bits(2)]
    __res0: u8,

    /// Bits 2–3: EL, `0..=3`.
    #[bits(2)]
    pub el: u8,

    /// Bits 4–63: reserved.
    #[bits(60)]
    __res4: u64,
}

#[cfg(all(feature = "asm", target_arch = "aarch64"))]
impl LoadRegisterUnsafe for CurrentEl {
    unsafe fn load_unsafe() -> Self {
        let v: u64;
        unsafe {
            core::arch::asm!("mrs {}, CurrentEL", out(reg) v, options(nomem, nostack, preserves_flags));
        }
        Self::from_bits(v)
    }
}
