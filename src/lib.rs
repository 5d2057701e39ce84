//! # Active Directory group SIDs from SPNEGO/Kerberos tickets
//!
//! Turns a SPNEGO negotiation token into the ordered list of group SIDs
//! that the domain controller put in the ticket's Privilege Attribute
//! Certificate (PAC).
//!
//! The pipeline is:
//! 1. [`spnego::SpnegoToken::parse`]: the GSS-API/SPNEGO `NegTokenInit`,
//!    its negotiated mechanism and the Kerberos AP-REQ it carries.
//! 2. A [`TicketDecryptor`] supplied by the caller: decrypts the AP-REQ with
//!    the service's [`ServiceKeySet`]. Cryptography stays on that side of the
//!    boundary.
//! 3. [`authorization_data::extract_pac`]: the first `AD-WIN2K-PAC` entry of
//!    the ticket, looking inside `AD-IF-RELEVANT`, decoded into a [`Pac`].
//! 4. [`aggregate_group_sids`]: the primary group, `GroupIds`, `ExtraSids`
//!    and `ResourceGroupIds` of the logon info, in that order, as canonical
//!    `S-1-...` strings.
//!
//! [`GroupSidExtractor`] runs the whole pipeline.
//!
//! SID encoding and decoding lives in the [`sid_codec`] crate and is
//! re-exported here.
//!
//! ## Examples
//! ```rust
//! use ad_group_sids::{
//!     DecryptedTicket, GroupSidExtractor, ServiceKeySet, TicketDecryptor,
//! };
//!
//! /// A decryptor backed by a real Kerberos library would go here.
//! struct Keytab;
//!
//! impl TicketDecryptor for Keytab {
//!     type Error = std::io::Error;
//!
//!     fn decrypt(&self, _ap_req: &[u8], _keys: &ServiceKeySet) -> Result<DecryptedTicket, Self::Error> {
//!         Err(std::io::Error::other("no key for this ticket"))
//!     }
//! }
//!
//! let extractor = GroupSidExtractor::new(Keytab, ServiceKeySet::default().shared());
//! assert!(extractor.extract(&[0x60, 0x00]).is_err());
//! ```
//!
//! ## Features
//! - `serde`: `Serialize`/`Deserialize` for [`GroupSidList`], [`Limits`] and
//!   the codec's `SecurityIdentifier`.
//! - `testutil`: the `testutil` module of fixture builders for tokens and
//!   PACs, for integration tests.

#![cfg_attr(docsrs, feature(doc_auto_cfg, doc_cfg))]
#![warn(missing_docs)]

mod aggregate;
pub mod authorization_data;
mod error;
mod extractor;
mod limits;
pub mod pac;
pub mod spnego;
#[cfg(any(test, feature = "testutil"))]
pub mod testutil;
mod ticket;

pub use aggregate::{GroupSidList, SidListKind, aggregate_group_sids};
pub use error::{
    AuthorizationDataError, BerError, BoxError, ExtractError, MalformedToken,
    PacDecodingError, PacExtractionError, PacFormatError,
};
pub use extractor::{GroupSidExtractor, PipelineState};
pub use limits::Limits;
pub use pac::{Pac, PacLogonInfo};
pub use sid_codec::{
    self, MalformedSid, SecurityIdentifier, decode_binary_sid, decode_escaped_hex_sid,
    encode_string_sid,
};
pub use ticket::{
    AuthorizationDataElement, DecryptedTicket, ServiceKey, ServiceKeySet, TicketDecryptor,
};
