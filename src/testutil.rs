//! Fixture builders for negotiation tokens, authorization data and PACs.
//!
//! Compiled for unit tests and behind the `testutil` feature for
//! integration tests:
//!
//! ```toml
//! [dev-dependencies]
//! ad-group-sids = { path = ".", features = ["testutil"] }
//! ```
//!
//! The builders write the wire formats by hand, independently of the
//! decoders they are used to test.

#![allow(missing_docs)]
#![allow(
    clippy::expect_used,
    clippy::cast_possible_truncation,
    clippy::integer_division,
    reason = "fixture builders panic on nonsensical input and encode small test values"
)]

use der::asn1::ObjectIdentifier;
use sid_codec::SecurityIdentifier;
use thiserror::Error;

use crate::pac::FileTime;
use crate::spnego::SPNEGO_OID;
use crate::ticket::{DecryptedTicket, ServiceKeySet, TicketDecryptor};

/// Encodes a DER tag-length-value with a single-byte tag.
#[must_use]
pub fn der_tlv(tag: u8, content: &[u8]) -> Vec<u8> {
    let mut out = vec![tag];
    let len = content.len();
    if len < 0x80 {
        out.push(len as u8);
    } else {
        let bytes = len.to_be_bytes();
        let skip = bytes.iter().take_while(|byte| **byte == 0).count();
        out.push(0x80 | (bytes.len() - skip) as u8);
        out.extend_from_slice(&bytes[skip..]);
    }
    out.extend_from_slice(content);
    out
}

/// Encodes a DER INTEGER with the minimal number of bytes.
#[must_use]
pub fn der_integer(value: i32) -> Vec<u8> {
    let bytes = value.to_be_bytes();
    let mut start = 0;
    while start < bytes.len() - 1 {
        let next_high_bit = bytes[start + 1] & 0x80 != 0;
        let redundant = (bytes[start] == 0x00 && !next_high_bit)
            || (bytes[start] == 0xff && next_high_bit);
        if !redundant {
            break;
        }
        start += 1;
    }
    der_tlv(0x02, &bytes[start..])
}

/// Builds a SPNEGO initial context token offering `mechanisms`, in order.
#[must_use]
pub fn spnego_init_token(mechanisms: &[ObjectIdentifier], mechanism_token: Option<&[u8]>) -> Vec<u8> {
    let mech_types = mechanisms
        .iter()
        .flat_map(|oid| der_tlv(0x06, oid.as_bytes()))
        .collect::<Vec<_>>();
    let mut fields = der_tlv(0xa0, &der_tlv(0x30, &mech_types));
    if let Some(token) = mechanism_token {
        fields.extend(der_tlv(0xa2, &der_tlv(0x04, token)));
    }
    let neg_token_init = der_tlv(0xa0, &der_tlv(0x30, &fields));
    let this_mech = der_tlv(0x06, SPNEGO_OID.as_bytes());
    der_tlv(0x60, &[this_mech, neg_token_init].concat())
}

/// Builds a DER `AuthorizationData` sequence.
#[must_use]
pub fn authorization_data_der(entries: &[(i32, Vec<u8>)]) -> Vec<u8> {
    let elements = entries
        .iter()
        .flat_map(|(ad_type, data)| {
            let fields = [
                der_tlv(0xa0, &der_integer(*ad_type)),
                der_tlv(0xa1, &der_tlv(0x04, data)),
            ]
            .concat();
            der_tlv(0x30, &fields)
        })
        .collect::<Vec<_>>();
    der_tlv(0x30, &elements)
}

/// Builds a PACTYPE holding `(ulType, data)` buffers, each 8-byte aligned.
#[must_use]
pub fn pac_bytes(buffers: &[(u32, Vec<u8>)]) -> Vec<u8> {
    let header_len = 8 + 16 * buffers.len();
    let mut out = Vec::new();
    out.extend_from_slice(&(buffers.len() as u32).to_le_bytes());
    out.extend_from_slice(&0_u32.to_le_bytes());

    let mut offset = header_len.next_multiple_of(8);
    for (ul_type, data) in buffers {
        out.extend_from_slice(&ul_type.to_le_bytes());
        out.extend_from_slice(&(data.len() as u32).to_le_bytes());
        out.extend_from_slice(&(offset as u64).to_le_bytes());
        offset = (offset + data.len()).next_multiple_of(8);
    }
    for (_, data) in buffers {
        out.resize(out.len().next_multiple_of(8), 0);
        out.extend_from_slice(data);
    }
    out
}

/// Binary form of a canonical SID string.
///
/// # Panics
/// If `text` is not a canonical SID.
#[must_use]
pub fn sid_bytes(text: &str) -> Vec<u8> {
    text.parse::<SecurityIdentifier>()
        .expect("fixture SID must be canonical")
        .to_binary()
}

struct NdrWriter {
    buf: Vec<u8>,
    next_referent: u32,
}

impl NdrWriter {
    fn align(&mut self, alignment: usize) {
        self.buf.resize(self.buf.len().next_multiple_of(alignment), 0);
    }

    fn u16(&mut self, value: u16) {
        self.align(2);
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    fn u32(&mut self, value: u32) {
        self.align(4);
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    fn filetime(&mut self, time: FileTime) {
        self.u32(time.0 as u32);
        self.u32((time.0 >> 32) as u32);
    }

    fn pointer(&mut self, present: bool) {
        if present {
            let referent = self.next_referent;
            self.next_referent += 4;
            self.u32(referent);
        } else {
            self.u32(0);
        }
    }

    fn string_header(&mut self, text: &str) {
        let len = (text.encode_utf16().count() * 2) as u16;
        self.u16(len);
        self.u16(len);
        self.pointer(!text.is_empty());
    }

    fn string_body(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }
        let units = text.encode_utf16().collect::<Vec<_>>();
        self.u32(units.len() as u32);
        self.u32(0);
        self.u32(units.len() as u32);
        for unit in units {
            self.u16(unit);
        }
    }

    fn sid(&mut self, bytes: &[u8]) {
        self.u32((bytes.len().saturating_sub(8) / 4) as u32);
        self.buf.extend_from_slice(bytes);
    }
}

/// Inputs of a `KERB_VALIDATION_INFO` logon-info buffer.
#[derive(Clone, Debug)]
pub struct LogonInfoFixture {
    pub effective_name: String,
    pub full_name: String,
    pub logon_server: String,
    pub logon_domain_name: String,
    pub logon_count: u16,
    pub user_account_control: u32,
    pub user_rid: u32,
    pub primary_group_rid: u32,
    /// `(rid, attributes)`.
    pub group_rids: Vec<(u32, u32)>,
    pub domain_sid: Option<Vec<u8>>,
    /// `(sid, attributes)`.
    pub extra_sids: Vec<(Vec<u8>, u32)>,
    pub resource_domain_sid: Option<Vec<u8>>,
    /// `(rid, attributes)`.
    pub resource_group_rids: Vec<(u32, u32)>,
    /// Writes a conformant count one higher than declared for this field.
    pub conformance_skew: Option<&'static str>,
    /// Writes a null pointer for this `ExtraSids` entry.
    pub null_extra_sid: Option<usize>,
}

impl LogonInfoFixture {
    /// `EXAMPLE\jdoe` in `S-1-5-21-1-2-3`, with two groups, one extra SID and
    /// one resource group from `S-1-5-21-9-9-9`.
    #[must_use]
    pub fn domain_user() -> Self {
        Self {
            effective_name: "jdoe".into(),
            full_name: "John Doe".into(),
            logon_server: "DC01".into(),
            logon_domain_name: "EXAMPLE".into(),
            logon_count: 7,
            user_account_control: 0x10,
            user_rid: 1139,
            primary_group_rid: 513,
            group_rids: vec![(512, 7), (1105, 7)],
            domain_sid: Some(sid_bytes("S-1-5-21-1-2-3")),
            extra_sids: vec![(sid_bytes("S-1-18-1"), 7)],
            resource_domain_sid: Some(sid_bytes("S-1-5-21-9-9-9")),
            resource_group_rids: vec![(4001, 0x2000_0007)],
            conformance_skew: None,
            null_extra_sid: None,
        }
    }

    fn conformant_count(&self, field: &str, len: usize) -> u32 {
        len as u32 + u32::from(self.conformance_skew == Some(field))
    }

    /// NDR type-serialized logon info, as found in a `LOGON_INFO` buffer.
    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        let mut ndr = NdrWriter {
            buf: vec![0x01, 0x10, 0x08, 0x00],
            next_referent: 0x0002_0000,
        };
        ndr.u32(0xcccc_cccc);
        // Object buffer length, patched below.
        ndr.u32(0);
        ndr.u32(0);
        ndr.pointer(true);

        ndr.filetime(FileTime(0x01d9_0000_0000_0000));
        ndr.filetime(FileTime::NEVER);
        ndr.filetime(FileTime::NEVER);
        ndr.filetime(FileTime(0x01d8_0000_0000_0000));
        ndr.filetime(FileTime(0x01d8_0000_0000_0000));
        ndr.filetime(FileTime::NEVER);
        ndr.string_header(&self.effective_name);
        ndr.string_header(&self.full_name);
        for _ in 0..4 {
            ndr.string_header("");
        }
        ndr.u16(self.logon_count);
        ndr.u16(0);
        ndr.u32(self.user_rid);
        ndr.u32(self.primary_group_rid);
        ndr.u32(self.group_rids.len() as u32);
        ndr.pointer(!self.group_rids.is_empty());
        ndr.u32(0x20);
        ndr.buf.extend_from_slice(&[0; 16]);
        ndr.string_header(&self.logon_server);
        ndr.string_header(&self.logon_domain_name);
        ndr.pointer(self.domain_sid.is_some());
        ndr.buf.extend_from_slice(&[0; 8]);
        ndr.u32(self.user_account_control);
        ndr.buf.extend_from_slice(&[0; 28]);
        ndr.u32(self.extra_sids.len() as u32);
        ndr.pointer(!self.extra_sids.is_empty());
        ndr.pointer(self.resource_domain_sid.is_some());
        ndr.u32(self.resource_group_rids.len() as u32);
        ndr.pointer(!self.resource_group_rids.is_empty());

        ndr.string_body(&self.effective_name);
        ndr.string_body(&self.full_name);
        if !self.group_rids.is_empty() {
            ndr.u32(self.conformant_count("GroupIds", self.group_rids.len()));
            for (rid, attributes) in &self.group_rids {
                ndr.u32(*rid);
                ndr.u32(*attributes);
            }
        }
        ndr.string_body(&self.logon_server);
        ndr.string_body(&self.logon_domain_name);
        if let Some(sid) = &self.domain_sid {
            ndr.sid(sid);
        }
        if !self.extra_sids.is_empty() {
            ndr.u32(self.conformant_count("ExtraSids", self.extra_sids.len()));
            for (index, (_, attributes)) in self.extra_sids.iter().enumerate() {
                ndr.pointer(self.null_extra_sid != Some(index));
                ndr.u32(*attributes);
            }
            for (index, (sid, _)) in self.extra_sids.iter().enumerate() {
                if self.null_extra_sid != Some(index) {
                    ndr.sid(sid);
                }
            }
        }
        if let Some(sid) = &self.resource_domain_sid {
            ndr.sid(sid);
        }
        if !self.resource_group_rids.is_empty() {
            ndr.u32(self.conformant_count("ResourceGroupIds", self.resource_group_rids.len()));
            for (rid, attributes) in &self.resource_group_rids {
                ndr.u32(*rid);
                ndr.u32(*attributes);
            }
        }

        ndr.align(8);
        let object_len = (ndr.buf.len() - 16) as u32;
        ndr.buf[8..12].copy_from_slice(&object_len.to_le_bytes());
        ndr.buf
    }
}

/// Returned by the fixture decryptors.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
#[error("ticket could not be decrypted")]
pub struct DecryptionFailed;

/// Decrypts [`StaticDecryptor::AP_REQ`] into a fixed ticket and rejects
/// anything else.
#[derive(Clone, Debug)]
pub struct StaticDecryptor {
    ticket: DecryptedTicket,
}

impl StaticDecryptor {
    /// The only mechanism token this decryptor accepts.
    pub const AP_REQ: &'static [u8] = b"\x6e\x03\x02\x01\x05";

    /// Creates a decryptor returning `ticket`.
    #[must_use]
    pub const fn new(ticket: DecryptedTicket) -> Self {
        Self { ticket }
    }
}

impl TicketDecryptor for StaticDecryptor {
    type Error = DecryptionFailed;

    fn decrypt(
        &self,
        mechanism_token: &[u8],
        _keys: &ServiceKeySet,
    ) -> Result<DecryptedTicket, Self::Error> {
        if mechanism_token == Self::AP_REQ {
            Ok(self.ticket.clone())
        } else {
            Err(DecryptionFailed)
        }
    }
}

/// Rejects every ticket.
#[derive(Clone, Copy, Debug, Default)]
pub struct FailingDecryptor;

impl TicketDecryptor for FailingDecryptor {
    type Error = DecryptionFailed;

    fn decrypt(&self, _: &[u8], _: &ServiceKeySet) -> Result<DecryptedTicket, Self::Error> {
        Err(DecryptionFailed)
    }
}
