//! # Typed Translation-Control Registers
//!
//! Bitfield views of the registers that describe where the active translation
//! tables live and how they are shaped:
//!
//! | Architecture | Register | Used for |
//! |--------------|----------|----------|
//! | x86-64 | [`Cr3`] | root table (PML4/PML5) base |
//! | x86-64 | [`Cr4`] | `LA57`: 4- vs 5-level paging |
//! | AArch64 | [`Ttbr0`] | root table base for the lower VA range |
//! | AArch64 | [`TcrEl1`] / [`TcrEl2`] | `T0SZ` (root sizing) and the `HPD` disable bits |
//! | AArch64 | [`IdAa64Mmfr1El1`] | `HPDS`: hierarchical permission disables implemented |
//! | AArch64 | [`CurrentEl`] | the running exception level |
//!
//! The types are plain values and can be built from captured raw bits with
//! `from_bits`. Reading the live register requires the `asm` feature and the
//! matching target architecture.

#![cfg_attr(not(any(test, doctest)), no_std)]
#![allow(unsafe_code)]

#[cfg(feature = "x86_64")]
mod cr3;
#[cfg(feature = "x86_64")]
mod cr4;

#[cfg(feature = "aarch64")]
mod current_el;
#[cfg(feature = "aarch64")]
mod id_aa64mmfr1;
#[cfg(feature = "aarch64")]
mod tcr;
#[cfg(feature = "aarch64")]
mod ttbr0;

#[cfg(feature = "x86_64")]
pub use crate::cr3::Cr3;
#[cfg(feature = "x86_64")]
pub use crate::cr4::Cr4;

#[cfg(feature = "aarch64")]
pub use crate::current_el::CurrentEl;
#[cfg(feature = "aarch64")]
pub use crate::id_aa64mmfr1::IdAa64Mmfr1El1;
#[cfg(feature = "aarch64")]
pub use crate::tcr::{TcrEl1, TcrEl2};
#[cfg(feature = "aarch64")]
pub use crate::ttbr0::Ttbr0;

pub trait LoadRegisterUnsafe {
    /// # Safety
    /// The caller must uphold the implementation-specific safety requirements.
    /// For example, the register access might be privileged and require
    /// supervisor mode (ring 0 / EL1 or above).
    unsafe fn load_unsafe() -> Self;
}
