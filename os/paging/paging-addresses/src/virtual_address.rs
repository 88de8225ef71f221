use core::fmt;

/// Virtual (linear) memory address.
///
/// The input side of a translation: the start of a range covered by a
/// descriptor. Carries no alignment guarantee by itself.
#[repr(transparent)]
#[derive(Copy, Clone, Default, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct VirtualAddress(u64);

impl VirtualAddress {
    #[inline]
    #[must_use]
    pub const fn zero() -> Self {
        Self(0)
    }

    #[inline]
    #[must_use]
    pub const fn new(v: u64) -> Self {
        Self(v)
    }

    #[inline]
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }

    /// Sign-extend from bit `implemented_bits - 1`.
    ///
    /// With 48 implemented bits, `0x0000_8000_0000_0000` becomes
    /// `0xFFFF_8000_0000_0000` while lower-half addresses are unchanged.
    /// `implemented_bits` of 64 (or more) returns the address untouched.
    ///
    /// ```rust
    /// # use paging_addresses::VirtualAddress;
    /// let va = VirtualAddress::new(0x0000_8000_0000_1000).canonical(48);
    /// assert_eq!(va.as_u64(), 0xFFFF_8000_0000_1000);
    /// assert_eq!(VirtualAddress::new(0x7FFF_F000).canonical(48).as_u64(), 0x7FFF_F000);
    /// ```
    #[inline]
    #[must_use]
    #[allow(clippy::cast_possible_wrap, clippy::cast_sign_loss)]
    pub const fn canonical(self, implemented_bits: u32) -> Self {
        if implemented_bits >= 64 {
            return self;
        }
        let shift = 64 - implemented_bits;
        Self((((self.0 << shift) as i64) >> shift) as u64)
    }

    /// Adds `rhs`, returning `None` when the sum leaves the 64-bit space.
    #[inline]
    #[must_use]
    pub const fn checked_add(self, rhs: u64) -> Option<Self> {
        match self.0.checked_add(rhs) {
            Some(v) => Some(Self(v)),
            None => None,
        }
    }
}

impl fmt::Debug for VirtualAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "VA(0x{:016X})", self.0)
    }
}

impl fmt::Display for VirtualAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:016X}", self.0)
    }
}

impl From<u64> for VirtualAddress {
    #[inline]
    fn from(v: u64) -> Self {
        Self::new(v)
    }
}

impl From<VirtualAddress> for u64 {
    #[inline]
    fn from(v: VirtualAddress) -> Self {
        v.as_u64()
    }
}
