use std::fmt;

/// An address inside the target process's address space.
///
/// Always carried as 64 bits; for 32-bit targets the resolver and scanner
/// only ever produce values below 2^32 (see [`PointerWidth::mask`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Addr(pub u64);

impl Addr {
    /// Raw numeric value.
    pub fn get(self) -> u64 {
        self.0
    }

    /// True for address zero, which every accessor operation rejects.
    pub fn is_null(self) -> bool {
        self.0 == 0
    }

    /// Apply a signed offset, as used by pointer-chain traversal.
    /// Wraps on overflow the same way the target's own pointer
    /// arithmetic would.
    pub fn offset(self, off: i64) -> Addr {
        Addr(self.0.wrapping_add_signed(off))
    }
}

impl fmt::Display for Addr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:x}", self.0)
    }
}

impl fmt::LowerHex for Addr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::LowerHex::fmt(&self.0, f)
    }
}

impl std::ops::Add<u64> for Addr {
    type Output = Addr;
    fn add(self, rhs: u64) -> Addr {
        Addr(self.0 + rhs)
    }
}

impl std::ops::Sub<u64> for Addr {
    type Output = Addr;
    fn sub(self, rhs: u64) -> Addr {
        Addr(self.0 - rhs)
    }
}

impl From<u64> for Addr {
    fn from(v: u64) -> Addr {
        Addr(v)
    }
}

/// Pointer width of the target process.
///
/// A 64-bit controller can inspect a 32-bit target; pointers read from such
/// a target are 4 bytes wide and zero-extended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerWidth {
    Four,
    Eight,
}

impl PointerWidth {
    /// Size of a pointer in the target, in bytes.
    pub fn bytes(self) -> usize {
        match self {
            PointerWidth::Four => 4,
            PointerWidth::Eight => 8,
        }
    }

    /// Largest address representable in the target's address space.
    pub fn mask(self) -> u64 {
        match self {
            PointerWidth::Four => u32::MAX as u64,
            PointerWidth::Eight => u64::MAX,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn addr_display() {
        assert_eq!(format!("{}", Addr(0xdead_beef)), "0xdeadbeef");
    }

    #[test]
    fn addr_arithmetic() {
        let a = Addr(0x1000);
        assert_eq!((a + 0x20).get(), 0x1020);
        assert_eq!((a - 0x20).get(), 0x0fe0);
    }

    #[test]
    fn addr_signed_offset() {
        let a = Addr(0x1000);
        assert_eq!(a.offset(0x10), Addr(0x1010));
        assert_eq!(a.offset(-0x10), Addr(0x0ff0));
    }

    #[test]
    fn addr_null() {
        assert!(Addr(0).is_null());
        assert!(!Addr(1).is_null());
    }

    #[test]
    fn pointer_width_sizes() {
        assert_eq!(PointerWidth::Four.bytes(), 4);
        assert_eq!(PointerWidth::Eight.bytes(), 8);
        assert_eq!(PointerWidth::Four.mask(), 0xffff_ffff);
    }
}
