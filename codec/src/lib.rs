//! # Windows Security Identifier (SID) codec
//!
//! Byte-exact conversions between the three forms a SID takes in Active
//! Directory and Kerberos PAC data:
//! - the binary form: revision, sub-authority count, a 48-bit big-endian
//!   identifier authority, then 32-bit little-endian sub-authorities
//!   (8 + 4 × count bytes),
//! - the canonical string form `S-<rev>-<authority>-<sub1>-...-<subN>`,
//! - the backslash-escaped hex form `\01\05\00...` used by LDAP filters.
//!
//! [`SecurityIdentifier`] is the typed value. The free functions
//! [`decode_binary_sid`], [`decode_escaped_hex_sid`] and [`encode_string_sid`]
//! work directly on strings and bytes.
//!
//! ## Examples
//! ```rust
//! use sid_codec::{SecurityIdentifier, decode_binary_sid, encode_string_sid};
//!
//! let bytes = encode_string_sid("S-1-5-32-544").unwrap();
//! assert_eq!(decode_binary_sid(&bytes).unwrap(), "S-1-5-32-544");
//!
//! let sid: SecurityIdentifier = "S-1-5-32-544".parse().unwrap();
//! assert_eq!(sid.to_binary(), bytes);
//! ```
//!
//! ## No-std
//! Supported with `default-features = false`; `alloc` is required.

#![cfg_attr(not(feature = "std"), no_std)]
#![cfg_attr(docsrs, feature(doc_auto_cfg, doc_cfg))]
#![warn(missing_docs)]

extern crate alloc;

mod authority;
mod convert;
mod error;
mod escaped;
mod security_identifier;
#[cfg(feature = "serde")]
mod serde_impl;

pub use authority::{IdentifierAuthority, MAX_AUTHORITY};
pub use convert::{decode_binary_sid, decode_escaped_hex_sid, encode_string_sid};
pub use error::MalformedSid;
pub use escaped::{decode_escaped_hex, escape_hex};
pub use security_identifier::{
    HEADER_LEN, MAX_SUB_AUTHORITY_COUNT, SecurityIdentifier, binary_len,
};
