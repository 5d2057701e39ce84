use der::asn1::ObjectIdentifier;
use sid_codec::MalformedSid;
use thiserror::Error;

use crate::aggregate::SidListKind;
use crate::extractor::PipelineState;

/// Boxed cause carried by [`ExtractError::TicketProcessing`].
pub type BoxError = Box<dyn core::error::Error + Send + Sync + 'static>;

/// Definite-length BER framing error. Offsets count from the start of the
/// token.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum BerError {
    /// The element starting at `offset` runs past the end of its container.
    #[error("element at byte {offset} is truncated")]
    Truncated {
        /// Offset of the element's tag.
        offset: usize,
    },

    /// Indefinite lengths are not supported.
    #[error("element at byte {offset} has an indefinite length")]
    IndefiniteLength {
        /// Offset of the element's tag.
        offset: usize,
    },

    /// The length does not fit in `usize`.
    #[error("element at byte {offset} has an oversized length")]
    LengthOverflow {
        /// Offset of the element's tag.
        offset: usize,
    },

    /// Multi-byte tag numbers are not used by SPNEGO.
    #[error("element at byte {offset} has a multi-byte tag")]
    HighTagNumber {
        /// Offset of the element's tag.
        offset: usize,
    },

    /// A different element was expected.
    #[error("expected tag {expected:#04x} at byte {offset}, found {actual:#04x}")]
    UnexpectedTag {
        /// Offset of the element's tag.
        offset: usize,
        /// Expected identifier octet.
        expected: u8,
        /// Identifier octet found.
        actual: u8,
    },

    /// Bytes follow the last element of a container.
    #[error("unexpected data at byte {offset}")]
    TrailingData {
        /// Offset of the first extra byte.
        offset: usize,
    },
}

/// The negotiation token is not a well-formed SPNEGO `NegTokenInit`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum MalformedToken {
    /// The token exceeds [`Limits::max_token_len`](crate::Limits::max_token_len).
    #[error("negotiation token is {len} bytes, the limit is {limit}")]
    TooLarge {
        /// Length of the received token.
        len: usize,
        /// Configured limit.
        limit: usize,
    },

    /// Invalid or truncated BER framing.
    #[error("invalid BER in negotiation token")]
    Ber(#[from] BerError),

    /// An object identifier with invalid contents.
    #[error("invalid object identifier in negotiation token")]
    Der(#[from] der::Error),

    /// The token does not start with the GSS-API `[APPLICATION 0]` header.
    #[error("expected a GSS-API initial context token, found tag {0:#04x}")]
    NotInitialContextToken(u8),

    /// The GSS-API header names a mechanism other than SPNEGO.
    #[error("negotiation token is for mechanism {0}, not SPNEGO")]
    NotSpnego(ObjectIdentifier),

    /// The SPNEGO body is not a `NegTokenInit` (for example a `NegTokenResp`).
    #[error("SPNEGO body is not a NegTokenInit")]
    NotNegTokenInit,

    /// `mechTypes` is empty so no mechanism was negotiated.
    #[error("NegTokenInit offers no mechanism")]
    EmptyMechanismList,

    /// A Kerberos mechanism was negotiated without a mechanism token.
    #[error("Kerberos NegTokenInit carries no mechanism token")]
    MissingMechanismToken,
}

/// A DER `AuthorizationData` sequence could not be decoded.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AuthorizationDataError {
    /// Invalid or truncated DER.
    #[error("invalid DER in authorization data: {0}")]
    Der(#[from] der::Error),

    /// `AD-IF-RELEVANT` containers are nested deeper than allowed.
    #[error("AD-IF-RELEVANT nesting exceeds {limit} levels")]
    NestingTooDeep {
        /// Configured limit.
        limit: usize,
    },
}

/// Structural error in a PAC or in its NDR-encoded logon-info buffer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum PacFormatError {
    /// Fewer bytes remain than the field being read needs.
    #[error("truncated data: {needed} bytes needed at offset {offset}, {available} available")]
    Truncated {
        /// Read position.
        offset: usize,
        /// Bytes the read needed.
        needed: usize,
        /// Bytes left after `offset`.
        available: usize,
    },

    /// PACTYPE version is not 0.
    #[error("unsupported PAC version {0}")]
    UnsupportedVersion(u32),

    /// A PAC_INFO_BUFFER points outside of the PAC.
    #[error("PAC buffer of type {ul_type} ({size} bytes at offset {offset}) exceeds the {pac_len}-byte PAC")]
    BufferOutOfBounds {
        /// Raw `ulType` of the buffer.
        ul_type: u32,
        /// Declared offset.
        offset: u64,
        /// Declared size.
        size: u32,
        /// Size of the whole PAC.
        pac_len: usize,
    },

    /// The NDR type-serialization header is not version 1, little-endian.
    #[error("unsupported NDR header: version {version}, data representation {drep:#04x}")]
    UnsupportedNdrHeader {
        /// Header version byte.
        version: u8,
        /// Data representation byte.
        drep: u8,
    },

    /// A conformant array count disagrees with the count declared in the
    /// fixed part of the structure.
    #[error("{field} has {actual} entries but {declared} were declared")]
    CountMismatch {
        /// Structure field holding the array.
        field: &'static str,
        /// Count declared in the fixed part.
        declared: u32,
        /// Count found in the deferred data.
        actual: u32,
    },

    /// A declared count exceeds
    /// [`Limits::max_sids_per_list`](crate::Limits::max_sids_per_list).
    #[error("{field} declares {count} entries, the limit is {limit}")]
    TooManySids {
        /// Structure field holding the array.
        field: &'static str,
        /// Declared count.
        count: u32,
        /// Configured limit.
        limit: u32,
    },

    /// An RPC_SID declares more sub-authorities than its count byte can hold.
    #[error("RPC_SID declares {0} sub-authorities")]
    OversizedSid(u32),

    /// Relative group ids are present but their domain SID is not.
    #[error("{field} is present without a domain SID")]
    MissingDomainSid {
        /// Structure field holding the relative ids.
        field: &'static str,
    },

    /// An `ExtraSids` entry has a null SID pointer.
    #[error("extra SID #{index} is a null pointer")]
    NullExtraSid {
        /// Index in `ExtraSids`.
        index: usize,
    },

    /// The domain SID has no room for the relative id.
    #[error("domain SID cannot take another sub-authority")]
    SubAuthorityOverflow,
}

/// Failure while locating and decoding the PAC of a decrypted ticket.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum PacExtractionError {
    /// The authorization data could not be decoded.
    #[error("invalid authorization data")]
    AuthorizationData(#[from] AuthorizationDataError),

    /// The selected PAC is malformed.
    #[error("invalid PAC")]
    Pac(#[from] PacFormatError),
}

/// A SID in the PAC logon info could not be decoded.
///
/// No partial list is returned: a skipped SID would understate the
/// principal's group memberships.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("malformed SID at {list} SID #{index}")]
pub struct PacDecodingError {
    /// Sub-list holding the SID.
    pub list: SidListKind,
    /// Position in that sub-list.
    pub index: usize,
    /// Codec failure.
    #[source]
    pub source: MalformedSid,
}

/// Error returned by [`GroupSidExtractor::extract`](crate::GroupSidExtractor::extract).
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ExtractError {
    /// The negotiation token is malformed.
    #[error("malformed negotiation token")]
    MalformedToken(#[from] MalformedToken),

    /// A SID in the PAC could not be decoded.
    #[error("failed to decode PAC group SIDs")]
    PacDecoding(#[from] PacDecodingError),

    /// Decryption, authorization data or PAC structure failed.
    ///
    /// `state` is the last state the pipeline reached.
    #[error("ticket processing failed after {state}")]
    TicketProcessing {
        /// Last state reached before the failure.
        state: PipelineState,
        /// Root cause.
        #[source]
        source: BoxError,
    },
}

impl ExtractError {
    /// Last pipeline state reached before the failure.
    ///
    /// A token that cannot be parsed fails at [`PipelineState::Start`], and a
    /// Kerberos token without a mechanism token after
    /// [`PipelineState::TokenParsed`]. SID decoding fails after
    /// [`PipelineState::PacExtracted`].
    #[must_use]
    #[inline]
    pub const fn state(&self) -> PipelineState {
        match self {
            Self::TicketProcessing { state, .. } => *state,
            Self::MalformedToken(MalformedToken::MissingMechanismToken) => PipelineState::TokenParsed,
            Self::MalformedToken(_) => PipelineState::Start,
            Self::PacDecoding(_) => PipelineState::PacExtracted,
        }
    }
}
