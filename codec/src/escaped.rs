//! Backslash-escaped hex byte strings, as produced by LDAP filters and PAC
//! dumps: `\01\05\00\00...`.

use alloc::string::String;
use alloc::vec::Vec;
use core::fmt::Write as _;

use crate::MalformedSid;

/// Decodes a sequence of `\XX` literals into raw bytes.
///
/// Every character must belong to a literal: a backslash followed by exactly
/// two hex digits (either case).
///
/// # Errors
/// - [`MalformedSid::DanglingEscape`] if a backslash has fewer than two following characters.
/// - [`MalformedSid::InvalidHexDigit`] if a literal contains a non-hex character.
/// - [`MalformedSid::UnescapedCharacter`] for a character outside a literal,
///   which is how an odd number of hex digits shows up (`\015`).
///
/// # Examples
/// ```rust
/// # use sid_codec::decode_escaped_hex;
/// assert_eq!(decode_escaped_hex(r"\01\ff").unwrap(), [0x01, 0xff]);
/// assert!(decode_escaped_hex(r"\01\f").is_err());
/// ```
#[inline]
pub fn decode_escaped_hex(escaped: &str) -> Result<Vec<u8>, MalformedSid> {
    let mut bytes = Vec::with_capacity(escaped.len() / 3);
    let mut chars = escaped.char_indices();

    while let Some((offset, c)) = chars.next() {
        if c != '\\' {
            return Err(MalformedSid::UnescapedCharacter { offset, found: c });
        }
        let (Some(high), Some(low)) = (chars.next(), chars.next()) else {
            return Err(MalformedSid::DanglingEscape { offset });
        };
        bytes.push((hex_digit(high)? << 4) | hex_digit(low)?);
    }

    Ok(bytes)
}

fn hex_digit((offset, found): (usize, char)) -> Result<u8, MalformedSid> {
    found
        .to_digit(16)
        .and_then(|digit| u8::try_from(digit).ok())
        .ok_or(MalformedSid::InvalidHexDigit { offset, found })
}

/// Encodes raw bytes as `\XX` literals, lowercase.
///
/// # Examples
/// ```rust
/// # use sid_codec::escape_hex;
/// assert_eq!(escape_hex(&[0x01, 0x05, 0xdc]), r"\01\05\dc");
/// ```
#[must_use]
#[inline]
pub fn escape_hex(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 3);
    for byte in bytes {
        // Writing into a String cannot fail.
        let _ = write!(out, "\\{byte:02x}");
    }
    out
}
