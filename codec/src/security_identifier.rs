use alloc::vec::Vec;
use core::fmt::{self, Display};
use core::str::FromStr;

use arrayvec::ArrayVec;

use crate::MalformedSid;
use crate::authority::IdentifierAuthority;
use crate::escaped::decode_escaped_hex;

/// Length of the fixed SID header: revision, count and 6 authority bytes.
pub const HEADER_LEN: usize = 8;

/// Maximum number of sub-authorities a Windows SID can carry.
pub const MAX_SUB_AUTHORITY_COUNT: usize = 15;

/// Number of bytes a binary SID with `count` sub-authorities occupies.
#[must_use]
#[inline]
pub const fn binary_len(count: usize) -> usize {
    HEADER_LEN + count * size_of::<u32>()
}

/// Owned Windows **Security Identifier** (SID).
///
/// The binary layout is:
/// - byte 0: revision,
/// - byte 1: sub-authority count,
/// - bytes 2..8: identifier authority, big-endian,
/// - then `count` sub-authorities, 32-bit little-endian each.
///
/// # Examples
/// ```rust
/// # use sid_codec::{SecurityIdentifier, IdentifierAuthority};
/// let sid = SecurityIdentifier::try_new(
///     1,
///     IdentifierAuthority::NT_AUTHORITY,
///     &[32, 544],
/// ).unwrap();
/// assert_eq!(sid.to_string(), "S-1-5-32-544");
/// assert_eq!(
///     sid.to_binary(),
///     [1, 2, 0, 0, 0, 0, 0, 5, 32, 0, 0, 0, 32, 2, 0, 0]
/// );
/// ```
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SecurityIdentifier {
    /// The SID revision value, generally 1.
    pub revision: u8,
    /// The SID identifier authority value.
    pub identifier_authority: IdentifierAuthority,
    sub_authorities: ArrayVec<u32, MAX_SUB_AUTHORITY_COUNT>,
}

impl SecurityIdentifier {
    /// The only revision Windows currently issues.
    pub const REVISION: u8 = 1;

    /// Creates a SID from parts.
    ///
    /// Returns `None` if more than [`MAX_SUB_AUTHORITY_COUNT`] sub-authorities are given.
    #[must_use]
    #[inline]
    pub fn try_new(
        revision: u8,
        identifier_authority: IdentifierAuthority,
        sub_authorities: &[u32],
    ) -> Option<Self> {
        let sub_authorities = ArrayVec::try_from(sub_authorities).ok()?;
        Some(Self {
            revision,
            identifier_authority,
            sub_authorities,
        })
    }

    /// The sub-authorities, in wire order.
    #[must_use]
    #[inline]
    pub fn sub_authorities(&self) -> &[u32] {
        &self.sub_authorities
    }

    /// The last sub-authority, which is the relative identifier (RID) of
    /// domain principals.
    #[must_use]
    #[inline]
    pub fn rid(&self) -> Option<u32> {
        self.sub_authorities.last().copied()
    }

    /// Parses a binary SID.
    ///
    /// # Errors
    /// - [`MalformedSid::TooShort`] if `bytes` is shorter than the 8-byte header.
    /// - [`MalformedSid::LengthMismatch`] if `bytes.len() != 8 + 4 * bytes[1]`.
    /// - [`MalformedSid::TooManySubAuthorities`] if the count exceeds 15.
    ///
    /// # Examples
    /// ```rust
    /// # use sid_codec::SecurityIdentifier;
    /// let bytes = [1, 1, 0, 0, 0, 0, 0, 5, 0x15, 0, 0, 0];
    /// let sid = SecurityIdentifier::from_binary(&bytes).unwrap();
    /// assert_eq!(sid.to_string(), "S-1-5-21");
    /// ```
    #[inline]
    pub fn from_binary(bytes: &[u8]) -> Result<Self, MalformedSid> {
        let (header, tail) = bytes
            .split_first_chunk::<HEADER_LEN>()
            .ok_or(MalformedSid::TooShort { len: bytes.len() })?;
        let [revision, count, a0, a1, a2, a3, a4, a5] = *header;

        let expected = binary_len(usize::from(count));
        if bytes.len() != expected {
            return Err(MalformedSid::LengthMismatch {
                count,
                expected,
                actual: bytes.len(),
            });
        }
        if usize::from(count) > MAX_SUB_AUTHORITY_COUNT {
            return Err(MalformedSid::TooManySubAuthorities {
                count: usize::from(count),
            });
        }

        let sub_authorities = tail
            .chunks_exact(size_of::<u32>())
            .filter_map(|chunk| chunk.try_into().ok())
            .map(u32::from_le_bytes)
            .collect();

        Ok(Self {
            revision,
            identifier_authority: IdentifierAuthority::from([a0, a1, a2, a3, a4, a5]),
            sub_authorities,
        })
    }

    /// Parses a SID written as backslash-escaped hex bytes (`\01\05\00...`).
    ///
    /// # Errors
    /// Any escaped-hex error from [`decode_escaped_hex`], then any binary
    /// layout error from [`SecurityIdentifier::from_binary`].
    #[inline]
    pub fn from_escaped_hex(escaped: &str) -> Result<Self, MalformedSid> {
        Self::from_binary(&decode_escaped_hex(escaped)?)
    }

    /// Number of bytes [`SecurityIdentifier::to_binary`] produces.
    #[must_use]
    #[inline]
    pub fn binary_len(&self) -> usize {
        binary_len(self.sub_authorities.len())
    }

    /// Encodes the SID into its binary form.
    #[must_use]
    #[inline]
    pub fn to_binary(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.binary_len());
        out.push(self.revision);
        #[expect(
            clippy::cast_possible_truncation,
            reason = "sub-authority count is bounded by MAX_SUB_AUTHORITY_COUNT"
        )]
        out.push(self.sub_authorities.len() as u8);
        out.extend_from_slice(&self.identifier_authority.value);
        for sub_authority in &self.sub_authorities {
            out.extend_from_slice(&sub_authority.to_le_bytes());
        }
        out
    }
}

impl Display for SecurityIdentifier {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "S-{}-{}", self.revision, self.identifier_authority)?;
        for sub_authority in &self.sub_authorities {
            write!(f, "-{sub_authority}")?;
        }
        Ok(())
    }
}

/// Only plain ASCII digits are accepted so that parsing is the exact inverse of `Display`.
fn parse_component<T: FromStr>(component: &str) -> Result<T, MalformedSid> {
    if component.is_empty() || !component.bytes().all(|b| b.is_ascii_digit()) {
        return Err(MalformedSid::InvalidFormat);
    }
    component.parse().map_err(|_| MalformedSid::InvalidFormat)
}

impl FromStr for SecurityIdentifier {
    type Err = MalformedSid;

    /// Strict parser for the canonical `S-R-A-S1-...-Sn` form.
    ///
    /// Unlike [`crate::encode_string_sid`], any deviation is rejected.
    #[inline]
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut components = s.split('-');
        if !components
            .next()
            .is_some_and(|head| head.eq_ignore_ascii_case("s"))
        {
            return Err(MalformedSid::InvalidFormat);
        }
        let revision = parse_component::<u8>(components.next().ok_or(MalformedSid::InvalidFormat)?)?;
        let identifier_authority = components
            .next()
            .ok_or(MalformedSid::InvalidFormat)
            .and_then(parse_component::<u64>)
            .and_then(|value| IdentifierAuthority::from_u64(value).ok_or(MalformedSid::InvalidFormat))?;

        let mut sub_authorities = ArrayVec::new();
        let mut count = 0_usize;
        for component in components {
            count += 1;
            sub_authorities
                .try_push(parse_component::<u32>(component)?)
                .map_err(|_| MalformedSid::TooManySubAuthorities { count })?;
        }

        Ok(Self {
            revision,
            identifier_authority,
            sub_authorities,
        })
    }
}

impl TryFrom<&[u8]> for SecurityIdentifier {
    type Error = MalformedSid;

    #[inline]
    fn try_from(value: &[u8]) -> Result<Self, Self::Error> {
        Self::from_binary(value)
    }
}
