//! String-level conversions used by the PAC aggregation path and by callers
//! that store SIDs as text.

use alloc::string::{String, ToString};
use alloc::vec::Vec;

use arrayvec::ArrayVec;

use crate::authority::IdentifierAuthority;
use crate::escaped::decode_escaped_hex;
use crate::security_identifier::{MAX_SUB_AUTHORITY_COUNT, SecurityIdentifier};
use crate::MalformedSid;

/// Decodes a binary SID into its canonical string form.
///
/// # Errors
/// See [`SecurityIdentifier::from_binary`].
///
/// # Examples
/// ```rust
/// # use sid_codec::decode_binary_sid;
/// let bytes = [
///     0x01, 0x05, 0x00, 0x00, 0x00, 0x00, 0x00, 0x05, 0x15, 0x00, 0x00, 0x00, 0xdc, 0x2f,
///     0x15, 0x0b, 0xe5, 0x76, 0xd3, 0x8c, 0xbe, 0x0b, 0x4e, 0xbe, 0x73, 0x04, 0x00, 0x00,
/// ];
/// assert_eq!(
///     decode_binary_sid(&bytes).unwrap(),
///     "S-1-5-21-185937884-2362668773-3192785854-1139"
/// );
/// ```
#[inline]
pub fn decode_binary_sid(bytes: &[u8]) -> Result<String, MalformedSid> {
    SecurityIdentifier::from_binary(bytes).map(|sid| sid.to_string())
}

/// Decodes a backslash-escaped hex SID (`\01\05\00...`) into its canonical
/// string form.
///
/// # Errors
/// See [`decode_escaped_hex`] and [`SecurityIdentifier::from_binary`].
#[inline]
pub fn decode_escaped_hex_sid(escaped: &str) -> Result<String, MalformedSid> {
    decode_binary_sid(&decode_escaped_hex(escaped)?)
}

/// Token position holding the revision; position 0 is the literal `S`.
const REVISION_POSITION: usize = 1;
/// Token position holding the identifier authority.
const AUTHORITY_POSITION: usize = 2;

/// Encodes a SID string into its binary form, permissively.
///
/// This is the compatibility encoder. It tokenizes on `-` (empty tokens are
/// dropped) and assigns meaning by token *position*:
///
/// | position | meaning |
/// |---|---|
/// | 0 | the literal `S`, always discarded |
/// | 1 | revision, low 8 bits |
/// | 2 | identifier authority, low 48 bits |
/// | 3.. | sub-authorities, low 32 bits each |
///
/// A token that does not parse as a signed 64-bit integer is skipped, but its
/// position is still consumed. So `S-1-5-x-21` yields one sub-authority (21)
/// and `S-x-1-5` has no revision. For strict parsing use
/// [`SecurityIdentifier`]'s `FromStr`.
///
/// # Errors
/// - [`MalformedSid::MissingComponent`] if position 1 or 2 holds no numeric token.
/// - [`MalformedSid::TooManySubAuthorities`] beyond 15 sub-authorities.
///
/// # Examples
/// ```rust
/// # use sid_codec::encode_string_sid;
/// assert_eq!(
///     encode_string_sid("S-1-5-32-544").unwrap(),
///     [1, 2, 0, 0, 0, 0, 0, 5, 32, 0, 0, 0, 32, 2, 0, 0]
/// );
/// ```
#[inline]
pub fn encode_string_sid(sid: &str) -> Result<Vec<u8>, MalformedSid> {
    let mut revision = None;
    let mut authority = None;
    let mut sub_authorities = ArrayVec::<u32, MAX_SUB_AUTHORITY_COUNT>::new();
    let mut sub_authority_count = 0_usize;

    for (position, token) in sid.split('-').filter(|token| !token.is_empty()).enumerate() {
        let Ok(value) = token.parse::<i64>() else {
            continue;
        };
        #[expect(
            clippy::cast_possible_truncation,
            clippy::cast_sign_loss,
            reason = "the compatibility encoder keeps only the low bits of each field"
        )]
        match position {
            0 => {}
            REVISION_POSITION => revision = Some(value as u8),
            AUTHORITY_POSITION => {
                authority = Some(IdentifierAuthority::from_u64_truncating(value as u64));
            }
            _ => {
                sub_authority_count += 1;
                sub_authorities
                    .try_push(value as u32)
                    .map_err(|_| MalformedSid::TooManySubAuthorities {
                        count: sub_authority_count,
                    })?;
            }
        }
    }

    let revision = revision.ok_or(MalformedSid::MissingComponent("revision"))?;
    let authority = authority.ok_or(MalformedSid::MissingComponent("identifier authority"))?;

    let sid = SecurityIdentifier::try_new(revision, authority, &sub_authorities).ok_or(
        MalformedSid::TooManySubAuthorities {
            count: sub_authority_count,
        },
    )?;
    Ok(sid.to_binary())
}
