#[cfg(all(feature = "asm", target_arch = "aarch64"))]
use crate::LoadRegisterUnsafe;
use bitfield_struct::bitfield;

/// `TCR_EL1`: translation control for the EL1&0 regime.
///
/// Only the `TTBR0` half and the hierarchical-permission disables are named.
#[bitfield(u64, order = Lsb)]
#[derive(Eq, PartialEq)]
pub struct TcrEl1 {
    /// Bits 0–5: T0SZ. Input address size for `TTBR0` is `64 - T0SZ` bits.
    #[bits(6)]
    pub t0sz: u8,

    /// Bit 6: reserved.
    #[bits(1)]
    __res6: u8,

    /// Bit 7: EPD0, disable table walks through `TTBR0`.
    pub epd0: bool,

    /// Bits 8–13: IRGN0, ORGN0, SH0.
    #[bits(6)]
    pub walk_attributes0: u8,

    /// Bits 14–15: TG0, granule size for `TTBR0` (`0b00` = 4 KiB).
    #[bits(2)]
    pub tg0: u8,

    /// Bits 16–21: T1SZ.
    #[bits(6)]
    pub t1sz: u8,

    /// Bits 22–31: A1, EPD1, IRGN1, ORGN1, SH1, TG1.
    #[bits(10)]
    pub ttbr1_controls: u16,

    /// Bits 32–34: IPS, intermediate physical address size.
    #[bits(3)]
    pub ips: u8,

    /// Bits 35–38: reserved, AS, TBI0, TBI1.
    #[bits(4)]
    pub misc: u8,

    /// Bit 39: HA, hardware access flag update.
    pub ha: bool,

    /// Bit 40: HD, hardware dirty state update.
    pub hd: bool,

    /// Bit 41: HPD0, hierarchical permission disable for `TTBR0` walks.
    pub hpd0: bool,

    /// Bit 42: HPD1, hierarchical permission disable for `TTBR1` walks.
    pub hpd1: bool,

    /// Bits 43–63.
    #[bits(21)]
    pub high: u32,
}

/// `TCR_EL2`: translation control for the EL2 regime (`HCR_EL2.E2H == 0`).
#[bitfield(u64, order = Lsb)]
#[derive(Eq, PartialEq)]
pub struct TcrEl2 {
    /// Bits 0–5: T0SZ.
    #[bits(6)]
    pub t0sz: u8,

    /// Bits 6–13: reserved, IRGN0, ORGN0, SH0.
    #[bits(8)]
    pub walk_attributes0: u8,

    /// Bits 14–15: TG0.
    #[bits(2)]
    pub tg0: u8,

    /// Bits 16–18: PS, physical address size.
    #[bits(3)]
    pub ps: u8,

    /// Bit 19: reserved.
    #[bits(1)]
    __res19: u8,

    /// Bit 20: TBI.
    pub tbi: bool,

    /// Bit 21: HA.
    pub ha: bool,

    /// Bit 22: HD.
    pub hd: bool,

    /// Bit 23: reserved (RES1).
    #[bits(1)]
    __res23: u8,

    /// Bit 24: HPD, hierarchical permission disable.
    pub hpd: bool,

    /// Bits 25–63.
    #[bits(39)]
    pub high: u64,
}

#[cfg(all(feature = "asm", target_arch = "aarch64"))]
impl LoadRegisterUnsafe for TcrEl1 {
    unsafe fn load_unsafe() -> Self {
        let v: u64;
        unsafe {
            core::arch::asm!("mrs {}, tcr_el1", out(reg) v, options(nomem, nostack, preserves_flags));
        }
        Self::from_bits(v)
    }
}

#[cfg(all(feature = "asm", target_arch = "aarch64"))]
impl LoadRegisterUnsafe for TcrEl2 {
    unsafe fn load_unsafe() -> Self {
        let v: u64;
        unsafe {
            core::arch::asm!("mrs {}, tcr_el2", out(reg) v, options(nomem, nostack, preserves_flags));
        }
        Self::from_bits(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn el1_fields() {
        let tcr = TcrEl1::from_bits((1 << 41) | (0b10 << 14) | 16);
        assert_eq!(tcr.t0sz(), 16);
        assert_eq!(tcr.tg0(), 0b10);
        assert!(tcr.hpd0());
        assert!(!tcr.hpd1());
    }

    #[test]
    fn el2_fields() {
        let tcr = TcrEl2::from_bits((1 << 24) | (1 << 23) | 25);
        assert_eq!(tcr.t0sz(), 25);
        assert!(tcr.hpd());
        assert!(!TcrEl2::from_bits(1 << 23).hpd());
    }
}
