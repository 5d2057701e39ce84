use core::fmt::{self, Display};

/// Largest value a 48-bit identifier authority can hold.
pub const MAX_AUTHORITY: u64 = 0xFFFF_FFFF_FFFF;

/// The 6-byte identifier-authority component of a SID.
///
/// Stored big-endian, exactly as it appears on the wire at bytes `2..8` of a
/// binary SID.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct IdentifierAuthority {
    /// Big-endian authority bytes.
    pub value: [u8; 6],
}

impl IdentifierAuthority {
    /// `S-1-0`
    pub const NULL_AUTHORITY: Self = Self::from_u64_truncating(0);
    /// `S-1-1`
    pub const WORLD_AUTHORITY: Self = Self::from_u64_truncating(1);
    /// `S-1-2`
    pub const LOCAL_AUTHORITY: Self = Self::from_u64_truncating(2);
    /// `S-1-3`
    pub const CREATOR_AUTHORITY: Self = Self::from_u64_truncating(3);
    /// `S-1-5`, the authority of every Active Directory domain SID.
    pub const NT_AUTHORITY: Self = Self::from_u64_truncating(5);

    /// Builds an authority from the low 48 bits of `value`.
    ///
    /// Higher bits are discarded.
    #[must_use]
    #[inline]
    pub const fn from_u64_truncating(value: u64) -> Self {
        let be = value.to_be_bytes();
        Self {
            value: [be[2], be[3], be[4], be[5], be[6], be[7]],
        }
    }

    /// Builds an authority from `value`, or `None` if it does not fit in 48 bits.
    #[must_use]
    #[inline]
    pub const fn from_u64(value: u64) -> Option<Self> {
        if value > MAX_AUTHORITY {
            None
        } else {
            Some(Self::from_u64_truncating(value))
        }
    }

    /// The authority as an integer.
    #[must_use]
    #[inline]
    pub const fn to_u64(self) -> u64 {
        let [a, b, c, d, e, f] = self.value;
        u64::from_be_bytes([0, 0, a, b, c, d, e, f])
    }
}

impl From<[u8; 6]> for IdentifierAuthority {
    #[inline]
    fn from(value: [u8; 6]) -> Self {
        Self { value }
    }
}

impl From<IdentifierAuthority> for [u8; 6] {
    #[inline]
    fn from(value: IdentifierAuthority) -> Self {
        value.value
    }
}

impl Display for IdentifierAuthority {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_u64())
    }
}
