//! # Control State
//!
//! The register values a walk depends on, captured once per call and threaded
//! through the walk as plain values. Nothing here is cached between calls.
//!
//! - x86-64: `CR3` (root table) and `CR4.LA57` (4 or 5 levels).
//! - AArch64: `TTBR0_ELx` (root table), `TCR_ELx.T0SZ` (root sizing),
//!   `TCR_ELx.HPD*` and `ID_AA64MMFR1_EL1.HPDS` (hierarchical permissions).

use crate::arch::aarch64::HierarchicalControl;
use crate::arch::{Architecture, TableShape};
use paging_addresses::PhysicalAddress;
use paging_registers::{CurrentEl, IdAa64Mmfr1El1, TcrEl1, TcrEl2, Ttbr0};
use paging_registers::{Cr3, Cr4};

/// x86-64 paging state.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct X64Control {
    cr3: Cr3,
    cr4: Cr4,
}

impl X64Control {
    #[inline]
    #[must_use]
    pub const fn new(cr3: Cr3, cr4: Cr4) -> Self {
        Self { cr3, cr4 }
    }

    #[inline]
    #[must_use]
    pub const fn root_table(&self) -> PhysicalAddress {
        self.cr3.root_table()
    }

    /// 4-level or 5-level tree, depending on `CR4.LA57`.
    #[inline]
    #[must_use]
    pub const fn shape(&self) -> TableShape {
        TableShape::x64(self.cr4.paging_levels())
    }
}

/// The translation regime `TTBR0` belongs to.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum TranslationRegime {
    /// EL1&0, controlled by `TCR_EL1`.
    El1(TcrEl1),
    /// EL2 (non-VHE), controlled by `TCR_EL2`.
    El2(TcrEl2),
}

/// AArch64 translation state for the lower VA range.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct AArch64Control {
    ttbr0: Ttbr0,
    regime: TranslationRegime,
    mmfr1: IdAa64Mmfr1El1,
}

impl AArch64Control {
    #[inline]
    #[must_use]
    pub const fn el1(ttbr0: Ttbr0, tcr: TcrEl1, mmfr1: IdAa64Mmfr1El1) -> Self {
        Self {
            ttbr0,
            regime: TranslationRegime::El1(tcr),
            mmfr1,
        }
    }

    #[inline]
    #[must_use]
    pub const fn el2(ttbr0: Ttbr0, tcr: TcrEl2, mmfr1: IdAa64Mmfr1El1) -> Self {
        Self {
            ttbr0,
            regime: TranslationRegime::El2(tcr),
            mmfr1,
        }
    }

    /// Rebuild from raw register values. `current_el` selects how `tcr` is decoded.
    ///
    /// EL0 and EL1 share the EL1 regime. Returns `None` for EL3, whose
    /// `TTBR0_EL3`/`TCR_EL3` pair is not supported.
    #[must_use]
    pub const fn from_raw(ttbr0: u64, tcr: u64, mmfr1: u64, current_el: u64) -> Option<Self> {
        let ttbr0 = Ttbr0::from_bits(ttbr0);
        let mmfr1 = IdAa64Mmfr1El1::from_bits(mmfr1);
        match CurrentEl::from_bits(current_el).el() {
            0 | 1 => Some(Self::el1(ttbr0, TcrEl1::from_bits(tcr), mmfr1)),
            2 => Some(Self::el2(ttbr0, TcrEl2::from_bits(tcr), mmfr1)),
            _ => None,
        }
    }

    #[inline]
    #[must_use]
    pub const fn regime(&self) -> TranslationRegime {
        self.regime
    }

    #[inline]
    #[must_use]
    pub const fn root_table(&self) -> PhysicalAddress {
        self.ttbr0.root_table()
    }

    #[must_use]
    pub const fn t0sz(&self) -> u8 {
        match self.regime {
            TranslationRegime::El1(tcr) => tcr.t0sz(),
            TranslationRegime::El2(tcr) => tcr.t0sz(),
        }
    }

    #[inline]
    #[must_use]
    pub const fn shape(&self) -> TableShape {
        TableShape::aarch64(self.t0sz())
    }

    /// Whether table-level restrictions apply to leaves, and how.
    ///
    /// Requires the feature to be implemented (`HPDS != 0`) and not disabled
    /// by the regime's `HPD` bit.
    #[must_use]
    pub const fn hierarchical_control(&self) -> HierarchicalControl {
        if self.mmfr1.hpds() == 0 {
            return HierarchicalControl::Disabled;
        }

        match self.regime {
            TranslationRegime::El1(tcr) if !tcr.hpd0() => HierarchicalControl::El1,
            TranslationRegime::El2(tcr) if !tcr.hpd() => HierarchicalControl::El2,
            _ => HierarchicalControl::Disabled,
        }
    }
}

/// Per-call snapshot of the registers describing the active tables.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ControlState {
    X64(X64Control),
    AArch64(AArch64Control),
}

impl ControlState {
    #[inline]
    #[must_use]
    pub const fn architecture(&self) -> Architecture {
        match self {
            Self::X64(_) => Architecture::X64,
            Self::AArch64(_) => Architecture::AArch64,
        }
    }

    #[must_use]
    pub const fn root_table(&self) -> PhysicalAddress {
        match self {
            Self::X64(c) => c.root_table(),
            Self::AArch64(c) => c.root_table(),
        }
    }

    #[must_use]
    pub const fn shape(&self) -> TableShape {
        match self {
            Self::X64(c) => c.shape(),
            Self::AArch64(c) => c.shape(),
        }
    }

    /// Rebuild from four raw register values as stored in a snapshot.
    ///
    /// x86-64: `[CR3, CR4, 0, 0]`. AArch64: `[TTBR0_ELx, TCR_ELx, ID_AA64MMFR1_EL1, CurrentEL]`.
    /// Returns `None` for an AArch64 capture taken at EL3.
    #[must_use]
    pub const fn from_raw(architecture: Architecture, registers: [u64; 4]) -> Option<Self> {
        match architecture {
            Architecture::X64 => Some(Self::X64(X64Control::new(
                Cr3::from_bits(registers[0]),
                Cr4::from_bits(registers[1]),
            ))),
            Architecture::AArch64 => {
                match AArch64Control::from_raw(registers[0], registers[1], registers[2], registers[3]) {
                    Some(control) => Some(Self::AArch64(control)),
                    None => None,
                }
            }
        }
    }

    /// The inverse of [`from_raw`](Self::from_raw).
    #[must_use]
    pub const fn to_raw(&self) -> [u64; 4] {
        match self {
            Self::X64(c) => [c.cr3.into_bits(), c.cr4.into_bits(), 0, 0],
            Self::AArch64(c) => {
                let (tcr, el) = match c.regime {
                    TranslationRegime::El1(tcr) => (tcr.into_bits(), 1),
                    TranslationRegime::El2(tcr) => (tcr.into_bits(), 2),
                };
                [
                    c.ttbr0.into_bits(),
                    tcr,
                    c.mmfr1.into_bits(),
                    CurrentEl::new().with_el(el).into_bits(),
                ]
            }
        }
    }

    /// Read the live registers of the executing CPU.
    ///
    /// # Safety
    /// Must run at CPL0 with paging enabled.
    #[cfg(all(feature = "asm", target_arch = "x86_64"))]
    #[must_use]
    pub unsafe fn current() -> Self {
        use paging_registers::LoadRegisterUnsafe;
        let (cr3, cr4) = unsafe { (Cr3::load_unsafe(), Cr4::load_unsafe()) };
        Self::X64(X64Control::new(cr3, cr4))
    }

    /// Read the live registers of the executing CPU.
    ///
    /// Returns `None` at EL3, which has its own unsupported regime.
    ///
    /// # Safety
    /// Must run at EL1, EL2 or EL3 with the MMU enabled.
    #[cfg(all(feature = "asm", target_arch = "aarch64"))]
    #[must_use]
    pub unsafe fn current() -> Option<Self> {
        use paging_registers::LoadRegisterUnsafe;
        unsafe {
            let mmfr1 = IdAa64Mmfr1El1::load_unsafe();
            match CurrentEl::load_unsafe().el() {
                1 => Some(Self::AArch64(AArch64Control::el1(
                    Ttbr0::load_el1(),
                    TcrEl1::load_unsafe(),
                    mmfr1,
                ))),
                2 => Some(Self::AArch64(AArch64Control::el2(
                    Ttbr0::load_el2(),
                    TcrEl2::load_unsafe(),
                    mmfr1,
                ))),
                _ => None,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn x64_levels_follow_la57() {
        let cr3 = Cr3::new().with_root_table(PhysicalAddress::new(0x1_0000));
        let four = X64Control::new(cr3, Cr4::new().with_pae(true));
        let five = X64Control::new(cr3, Cr4::new().with_pae(true).with_la57(true));
        assert_eq!(four.shape().leaf_level(), 3);
        assert_eq!(five.shape().leaf_level(), 4);
        assert_eq!(four.root_table(), PhysicalAddress::new(0x1_0000));
    }

    #[test]
    fn hierarchical_control_requires_hpds() {
        let ttbr = Ttbr0::from_bits(0x8_0000);
        let tcr = TcrEl1::new().with_t0sz(16);
        let absent = AArch64Control::el1(ttbr, tcr, IdAa64Mmfr1El1::new());
        assert_eq!(absent.hierarchical_control(), HierarchicalControl::Disabled);

        let mmfr1 = IdAa64Mmfr1El1::new().with_hpds(1);
        let el1 = AArch64Control::el1(ttbr, tcr, mmfr1);
        assert_eq!(el1.hierarchical_control(), HierarchicalControl::El1);

        let el1_off = AArch64Control::el1(ttbr, tcr.with_hpd0(true), mmfr1);
        assert_eq!(el1_off.hierarchical_control(), HierarchicalControl::Disabled);

        let el2 = AArch64Control::el2(ttbr, TcrEl2::new().with_t0sz(16), mmfr1);
        assert_eq!(el2.hierarchical_control(), HierarchicalControl::El2);

        let el2_off = AArch64Control::el2(ttbr, TcrEl2::new().with_hpd(true), mmfr1);
        assert_eq!(el2_off.hierarchical_control(), HierarchicalControl::Disabled);
    }

    #[test]
    fn raw_registers_round_trip() {
        let state = ControlState::AArch64(AArch64Control::el2(
            Ttbr0::from_bits(0x4_0000),
            TcrEl2::new().with_t0sz(25),
            IdAa64Mmfr1El1::new().with_hpds(2),
        ));
        let raw = state.to_raw();
        assert_eq!(raw[3], 0b1000);
        assert_eq!(ControlState::from_raw(Architecture::AArch64, raw), Some(state));
        assert_eq!(state.shape().root_level(), 1);
    }

    #[test]
    fn exception_level_selects_the_regime() {
        let tcr = TcrEl1::new().with_t0sz(16).into_bits();
        let at = |el| AArch64Control::from_raw(0x4_0000, tcr, 0, CurrentEl::new().with_el(el).into_bits());

        assert!(matches!(at(0).map(|c| c.regime()), Some(TranslationRegime::El1(_))));
        assert!(matches!(at(1).map(|c| c.regime()), Some(TranslationRegime::El1(_))));
        assert!(matches!(at(2).map(|c| c.regime()), Some(TranslationRegime::El2(_))));
        assert_eq!(at(3), None);

        let raw = [0x4_0000, tcr, 0, CurrentEl::new().with_el(3).into_bits()];
        assert_eq!(ControlState::from_raw(Architecture::AArch64, raw), None);
    }
}
