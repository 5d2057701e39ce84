//! Kerberos authorization data and PAC selection.

use der::Decode;
use der::asn1::OctetStringRef;
use tracing::trace;

use crate::Limits;
use crate::error::{AuthorizationDataError, PacExtractionError};
use crate::pac::Pac;
use crate::ticket::DecryptedTicket;

/// `AD-IF-RELEVANT`: the data is itself an `AuthorizationData` sequence.
pub const AD_IF_RELEVANT: i32 = 1;
/// `AD-WIN2K-PAC`: the data is a PAC.
pub const AD_WIN2K_PAC: i32 = 128;

/// ```text
/// AuthorizationData ::= SEQUENCE OF SEQUENCE {
///     ad-type  [0] Int32,
///     ad-data  [1] OCTET STRING
/// }
/// ```
#[derive(Clone, Debug, Eq, PartialEq, der::Sequence)]
#[asn1(tag_mode = "EXPLICIT")]
struct AuthorizationDataField<'a> {
    #[asn1(context_specific = "0")]
    ad_type: i32,
    #[asn1(context_specific = "1")]
    ad_data: OctetStringRef<'a>,
}

/// Parses a DER `AuthorizationData` sequence into `(ad-type, ad-data)` pairs.
pub(crate) fn parse_authorization_data(der: &[u8]) -> Result<Vec<(i32, &[u8])>, der::Error> {
    Ok(Vec::<AuthorizationDataField<'_>>::from_der(der)?
        .into_iter()
        .map(|field| (field.ad_type, field.ad_data.as_bytes()))
        .collect())
}

/// One decoded authorization-data entry.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AuthorizationDataEntry<'a> {
    /// `AD-IF-RELEVANT` and its decoded contents.
    IfRelevant(Vec<AuthorizationDataEntry<'a>>),
    /// `AD-WIN2K-PAC` and the raw PAC.
    Win2kPac(&'a [u8]),
    /// Any other type, left undecoded.
    Unrecognized {
        /// `ad-type`.
        ad_type: i32,
        /// `ad-data`.
        data: &'a [u8],
    },
}

impl<'a> AuthorizationDataEntry<'a> {
    /// Decodes one entry, unwrapping `AD-IF-RELEVANT` containers down to
    /// [`Limits::max_nesting_depth`] levels.
    ///
    /// # Errors
    /// [`AuthorizationDataError`] for invalid nested DER or nesting that is
    /// too deep.
    #[inline]
    pub fn decode(ad_type: i32, data: &'a [u8], limits: &Limits) -> Result<Self, AuthorizationDataError> {
        Self::decode_nested(ad_type, data, limits.max_nesting_depth, limits)
    }

    fn decode_nested(
        ad_type: i32,
        data: &'a [u8],
        depth_left: usize,
        limits: &Limits,
    ) -> Result<Self, AuthorizationDataError> {
        match ad_type {
            AD_IF_RELEVANT => {
                let depth_left = depth_left
                    .checked_sub(1)
                    .ok_or(AuthorizationDataError::NestingTooDeep {
                        limit: limits.max_nesting_depth,
                    })?;
                parse_authorization_data(data)?
                    .into_iter()
                    .map(|(ad_type, data)| Self::decode_nested(ad_type, data, depth_left, limits))
                    .collect::<Result<_, _>>()
                    .map(Self::IfRelevant)
            }
            AD_WIN2K_PAC => Ok(Self::Win2kPac(data)),
            _ => Ok(Self::Unrecognized { ad_type, data }),
        }
    }

    /// The first PAC in depth-first order, looking inside `AD-IF-RELEVANT`.
    #[must_use]
    #[inline]
    pub fn first_pac(entries: &[Self]) -> Option<&'a [u8]> {
        entries.iter().find_map(|entry| match entry {
            Self::IfRelevant(nested) => Self::first_pac(nested),
            Self::Win2kPac(pac) => Some(*pac),
            Self::Unrecognized { ad_type, data } => {
                trace!(ad_type, len = data.len(), "skipping authorization data");
                None
            }
        })
    }
}

/// Finds the first PAC of a decrypted ticket and decodes it.
///
/// Entries that are not PACs are skipped. A ticket without a PAC yields
/// `None`.
///
/// # Errors
/// [`PacExtractionError`] if the authorization data or the selected PAC is
/// malformed.
#[inline]
pub fn extract_pac(ticket: &DecryptedTicket, limits: &Limits) -> Result<Option<Pac>, PacExtractionError> {
    let entries = ticket
        .authorization_data
        .iter()
        .map(|element| AuthorizationDataEntry::decode(element.ad_type, &element.ad_data, limits))
        .collect::<Result<Vec<_>, _>>()?;

    let Some(pac) = AuthorizationDataEntry::first_pac(&entries) else {
        return Ok(None);
    };
    trace!(len = pac.len(), "found PAC");
    Ok(Some(Pac::decode(pac, limits)?))
}
