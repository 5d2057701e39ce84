//! SPNEGO `NegTokenInit` parsing (RFC 4178).
//!
//! ```text
//! InitialContextToken ::= [APPLICATION 0] IMPLICIT SEQUENCE {
//!     thisMech     MechType,            -- 1.3.6.1.5.5.2
//!     innerToken   [0] NegTokenInit
//! }
//!
//! NegTokenInit ::= SEQUENCE {
//!     mechTypes    [0] MechTypeList,
//!     reqFlags     [1] ContextFlags  OPTIONAL,
//!     mechToken    [2] OCTET STRING  OPTIONAL,
//!     mechListMIC  [3] OCTET STRING  OPTIONAL
//! }
//! ```
//!
//! Clients are not required to send DER, so the framing is read as BER with
//! definite lengths.

mod ber;

use core::fmt;

use der::Tag;
use der::asn1::{AnyRef, ObjectIdentifier};

use self::ber::BerReader;
use crate::Limits;
use crate::error::{BerError, MalformedToken};

/// SPNEGO, `1.3.6.1.5.5.2`.
pub const SPNEGO_OID: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.3.6.1.5.5.2");
/// Kerberos V5, `1.2.840.113554.1.2.2`.
pub const KERBEROS_V5_OID: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113554.1.2.2");
/// The OID early Windows clients used for Kerberos V5, `1.2.840.48018.1.2.2`.
pub const LEGACY_KERBEROS_V5_OID: ObjectIdentifier =
    ObjectIdentifier::new_unwrap("1.2.840.48018.1.2.2");

/// The negotiated mechanism.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Mechanism {
    /// Kerberos V5.
    Kerberos,
    /// Kerberos V5 under its legacy Microsoft OID.
    LegacyKerberos,
    /// Anything else, NTLMSSP for instance.
    Other(ObjectIdentifier),
}

impl Mechanism {
    /// Classifies a mechanism OID.
    #[must_use]
    #[inline]
    pub fn from_oid(oid: ObjectIdentifier) -> Self {
        if oid == KERBEROS_V5_OID {
            Self::Kerberos
        } else if oid == LEGACY_KERBEROS_V5_OID {
            Self::LegacyKerberos
        } else {
            Self::Other(oid)
        }
    }

    /// The mechanism OID.
    #[must_use]
    #[inline]
    pub const fn oid(&self) -> ObjectIdentifier {
        match self {
            Self::Kerberos => KERBEROS_V5_OID,
            Self::LegacyKerberos => LEGACY_KERBEROS_V5_OID,
            Self::Other(oid) => *oid,
        }
    }

    /// Whether the mechanism token is a Kerberos AP-REQ.
    #[must_use]
    #[inline]
    pub const fn is_kerberos(&self) -> bool {
        matches!(self, Self::Kerberos | Self::LegacyKerberos)
    }
}

impl fmt::Display for Mechanism {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Kerberos => f.write_str("Kerberos V5"),
            Self::LegacyKerberos => f.write_str("Kerberos V5 (legacy OID)"),
            Self::Other(oid) => write!(f, "{oid}"),
        }
    }
}

/// A parsed `NegTokenInit`, borrowing from the token bytes.
#[derive(Clone, Debug, PartialEq, Eq)]
#[non_exhaustive]
pub struct SpnegoToken<'a> {
    /// The first offered mechanism, which is the one the token is for.
    pub mechanism: Mechanism,
    /// Every offered mechanism, in preference order.
    pub mechanism_types: Vec<ObjectIdentifier>,
    /// `reqFlags`, as raw bit-string bytes.
    pub request_flags: Option<&'a [u8]>,
    /// `mechToken`: the initial token of [`SpnegoToken::mechanism`].
    pub mechanism_token: Option<&'a [u8]>,
    /// `mechListMIC`.
    pub mechanism_list_mic: Option<&'a [u8]>,
}

impl<'a> SpnegoToken<'a> {
    /// Parses a DER-encoded SPNEGO initial context token.
    ///
    /// A mechanism other than Kerberos is not an error; callers check
    /// [`Mechanism::is_kerberos`].
    ///
    /// # Errors
    /// [`MalformedToken`] if the token is too large, is not valid BER with
    /// definite lengths, or is not a SPNEGO `NegTokenInit` offering at least
    /// one mechanism.
    ///
    /// # Examples
    /// ```rust
    /// use ad_group_sids::{Limits, spnego::SpnegoToken};
    ///
    /// // A truncated GSS-API header.
    /// assert!(SpnegoToken::parse(&[0x60, 0x10, 0x06], &Limits::DEFAULT).is_err());
    /// ```
    #[inline]
    pub fn parse(token: &'a [u8], limits: &Limits) -> Result<Self, MalformedToken> {
        if token.len() > limits.max_token_len {
            return Err(MalformedToken::TooLarge {
                len: token.len(),
                limit: limits.max_token_len,
            });
        }

        let mut reader = BerReader::new(token);
        let framed = reader.read_tlv()?;
        if framed.tag != ber::APPLICATION_0 {
            return Err(MalformedToken::NotInitialContextToken(framed.tag));
        }
        reader.finish()?;

        let mut body = BerReader::nested(framed);
        let this_mech = read_oid(&mut body)?;
        if this_mech != SPNEGO_OID {
            return Err(MalformedToken::NotSpnego(this_mech));
        }
        if body.peek_tag() != Some(ber::context_tag(0)) {
            return Err(MalformedToken::NotNegTokenInit);
        }
        let init = body.read_explicit(0, ber::SEQUENCE)?;
        body.finish()?;

        let mut fields = BerReader::nested(init);
        let mech_types = fields.read_explicit(0, ber::SEQUENCE)?;
        let request_flags = fields
            .read_optional_explicit(1, ber::BIT_STRING)?
            // The first octet counts the unused bits.
            .map(|flags| {
                flags
                    .contents
                    .get(1..)
                    .ok_or(BerError::Truncated { offset: flags.offset })
            })
            .transpose()?;
        let mechanism_token = fields.read_optional_explicit(2, ber::OCTET_STRING)?;
        let mechanism_list_mic = fields.read_optional_explicit(3, ber::OCTET_STRING)?;
        fields.finish()?;

        let mut mech_types = BerReader::nested(mech_types);
        let mut mechanism_types = Vec::new();
        while !mech_types.is_empty() {
            mechanism_types.push(read_oid(&mut mech_types)?);
        }
        let mechanism = mechanism_types
            .first()
            .copied()
            .map(Mechanism::from_oid)
            .ok_or(MalformedToken::EmptyMechanismList)?;

        Ok(Self {
            mechanism,
            mechanism_types,
            request_flags,
            mechanism_token: mechanism_token.map(|octets| octets.contents),
            mechanism_list_mic: mechanism_list_mic.map(|mic| mic.contents),
        })
    }
}

fn read_oid(reader: &mut BerReader<'_>) -> Result<ObjectIdentifier, MalformedToken> {
    let oid = reader.read_expected(ber::OBJECT_IDENTIFIER)?;
    Ok(ObjectIdentifier::try_from(AnyRef::new(
        Tag::ObjectIdentifier,
        oid.contents,
    )?)?)
}
