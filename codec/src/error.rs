use thiserror::Error;

/// Error returned when a SID does not match the expected binary, string or
/// escaped-hex layout.
///
/// Each variant corresponds to a specific layout violation so the caller can
/// log the precise cause.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum MalformedSid {
    /// The binary buffer is shorter than the fixed 8-byte header.
    #[error("binary SID is {len} bytes, shorter than the 8-byte header")]
    TooShort {
        /// Length of the buffer that was received.
        len: usize,
    },

    /// The binary buffer length disagrees with its sub-authority count byte.
    #[error("binary SID declares {count} sub-authorities ({expected} bytes) but is {actual} bytes")]
    LengthMismatch {
        /// Sub-authority count read from byte 1.
        count: u8,
        /// Length implied by `count`.
        expected: usize,
        /// Length of the buffer that was received.
        actual: usize,
    },

    /// More sub-authorities than a Windows SID can hold.
    #[error("SID has {count} sub-authorities, at most 15 are allowed")]
    TooManySubAuthorities {
        /// Number of sub-authorities found.
        count: usize,
    },

    /// A backslash is not followed by two characters.
    #[error("dangling escape at offset {offset}")]
    DanglingEscape {
        /// Character offset of the backslash.
        offset: usize,
    },

    /// A character inside a `\XX` literal is not a hex digit.
    #[error("invalid hex digit {found:?} at offset {offset}")]
    InvalidHexDigit {
        /// Character offset of the offending digit.
        offset: usize,
        /// The offending character.
        found: char,
    },

    /// A character appears outside of a `\XX` literal, which leaves an odd
    /// number of hex digits in the group.
    #[error("unescaped character {found:?} at offset {offset}")]
    UnescapedCharacter {
        /// Character offset of the offending character.
        offset: usize,
        /// The offending character.
        found: char,
    },

    /// The revision or identifier-authority component is missing.
    #[error("SID string has no numeric {0} component")]
    MissingComponent(&'static str),

    /// The SID string is not in canonical `S-R-A-S1-...` form.
    #[error("invalid format for SID string")]
    InvalidFormat,
}
