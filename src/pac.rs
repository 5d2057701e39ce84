//! Privilege Attribute Certificate (PAC) decoding.
//!
//! A PAC is a `PACTYPE` header followed by typed buffers. Only the buffers
//! needed for authorization are decoded: the logon info and the two
//! signatures. Signatures are exposed raw; verifying them needs the service
//! and KDC keys and belongs to the ticket decryptor.

mod logon_info;
mod ndr;

pub use logon_info::{FileTime, PacLogonInfo, PacSid, SidAndAttributes};
use num_enum::FromPrimitive;
use tracing::trace;

use self::ndr::NdrCursor;
use crate::Limits;
use crate::error::PacFormatError;

/// Size of one `PAC_INFO_BUFFER` entry.
const INFO_BUFFER_LEN: usize = 16;

/// `ulType` of a `PAC_INFO_BUFFER`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, FromPrimitive)]
#[repr(u32)]
#[non_exhaustive]
pub enum PacBufferType {
    /// `KERB_VALIDATION_INFO`.
    LogonInfo = 1,
    /// Encrypted credentials for PKINIT.
    CredentialsInfo = 2,
    /// Server signature.
    ServerChecksum = 6,
    /// KDC signature.
    PrivsvrChecksum = 7,
    /// Client name and ticket authentication time.
    ClientInfo = 10,
    /// S4U2proxy delegation info.
    ConstrainedDelegation = 11,
    /// UPN and DNS domain name.
    UpnDnsInfo = 12,
    /// Client claims.
    ClientClaims = 13,
    /// Device info.
    DeviceInfo = 14,
    /// Device claims.
    DeviceClaims = 15,
    /// Ticket signature.
    TicketChecksum = 16,
    /// PAC attributes.
    Attributes = 17,
    /// Requestor SID.
    Requestor = 18,
    /// Full PAC signature.
    FullChecksum = 19,
    /// Any other type.
    #[num_enum(catch_all)]
    Unknown(u32),
}

/// One `PAC_INFO_BUFFER` entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PacInfoBuffer {
    /// Buffer type.
    pub buffer_type: PacBufferType,
    /// Size in bytes.
    pub size: u32,
    /// Offset from the start of the PAC.
    pub offset: u64,
}

/// A `PAC_SIGNATURE_DATA` buffer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PacSignature {
    /// Checksum algorithm.
    pub signature_type: u32,
    /// Checksum bytes, including any trailing `RODCIdentifier`.
    pub signature: Vec<u8>,
}

impl PacSignature {
    fn decode(buffer: &[u8]) -> Result<Self, PacFormatError> {
        let mut cursor = NdrCursor::new(buffer);
        let signature_type = cursor.read_u32()?;
        let signature = buffer.get(cursor.pos()..).unwrap_or_default().to_vec();
        Ok(Self {
            signature_type,
            signature,
        })
    }
}

/// A decoded PAC.
#[derive(Clone, Debug, PartialEq, Eq)]
#[non_exhaustive]
pub struct Pac {
    /// Every buffer entry, in header order.
    pub buffers: Vec<PacInfoBuffer>,
    /// The first `LOGON_INFO` buffer.
    pub logon_info: Option<PacLogonInfo>,
    /// The first `SERVER_CHECKSUM` buffer.
    pub server_signature: Option<PacSignature>,
    /// The first `PRIVSVR_CHECKSUM` buffer.
    pub kdc_signature: Option<PacSignature>,
}

impl Pac {
    /// The only `PACTYPE` version defined.
    pub const VERSION: u32 = 0;

    /// Decodes a PAC.
    ///
    /// # Errors
    /// [`PacFormatError`] for a truncated header, an unsupported version, a
    /// buffer outside the PAC, or a malformed logon-info or signature buffer.
    #[inline]
    pub fn decode(bytes: &[u8], limits: &Limits) -> Result<Self, PacFormatError> {
        let mut cursor = NdrCursor::new(bytes);
        let count = cursor.read_u32()?;
        let version = cursor.read_u32()?;
        if version != Self::VERSION {
            return Err(PacFormatError::UnsupportedVersion(version));
        }

        let entries = cursor.read_elements(count, INFO_BUFFER_LEN)?;
        let mut entries = NdrCursor::new(entries);
        let mut pac = Self {
            buffers: Vec::new(),
            logon_info: None,
            server_signature: None,
            kdc_signature: None,
        };

        for _ in 0..count {
            let ul_type = entries.read_u32()?;
            let size = entries.read_u32()?;
            let offset = entries.read_u64()?;
            let data = usize::try_from(offset)
                .ok()
                .and_then(|start| bytes.get(start..)?.get(..usize::try_from(size).ok()?))
                .ok_or(PacFormatError::BufferOutOfBounds {
                    ul_type,
                    offset,
                    size,
                    pac_len: bytes.len(),
                })?;
            let buffer_type = PacBufferType::from_primitive(ul_type);
            trace!(?buffer_type, size, offset, "PAC buffer");

            match buffer_type {
                PacBufferType::LogonInfo if pac.logon_info.is_none() => {
                    pac.logon_info = Some(PacLogonInfo::decode(data, limits)?);
                }
                PacBufferType::ServerChecksum if pac.server_signature.is_none() => {
                    pac.server_signature = Some(PacSignature::decode(data)?);
                }
                PacBufferType::PrivsvrChecksum if pac.kdc_signature.is_none() => {
                    pac.kdc_signature = Some(PacSignature::decode(data)?);
                }
                _ => {}
            }
            pac.buffers.push(PacInfoBuffer {
                buffer_type,
                size,
                offset,
            });
        }

        Ok(pac)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, reason = "Unwrap is not an issue in test")]
mod test {
    use super::*;
    use crate::testutil::{LogonInfoFixture, pac_bytes};

    #[test]
    fn decodes_logon_info_and_signatures() {
        let server = [0x10, 0, 0, 0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12];
        let kdc = [0x76, 0xff, 0xff, 0xff, 9, 8, 7, 6];
        let bytes = pac_bytes(&[
            (1, LogonInfoFixture::domain_user().encode()),
            (10, vec![0; 18]),
            (6, server.to_vec()),
            (7, kdc.to_vec()),
        ]);
        let pac = Pac::decode(&bytes, &Limits::DEFAULT).unwrap();

        let types: Vec<_> = pac.buffers.iter().map(|buffer| buffer.buffer_type).collect();
        assert_eq!(
            types,
            [
                PacBufferType::LogonInfo,
                PacBufferType::ClientInfo,
                PacBufferType::ServerChecksum,
                PacBufferType::PrivsvrChecksum
            ]
        );
        assert_eq!(pac.logon_info.unwrap().effective_name, "jdoe");
        assert_eq!(
            pac.server_signature,
            Some(PacSignature {
                signature_type: 0x10,
                signature: server[4..].to_vec()
            })
        );
        assert_eq!(pac.kdc_signature.unwrap().signature_type, 0xffff_ff76);
    }

    #[test]
    fn unknown_buffer_types_are_kept() {
        let pac = Pac::decode(&pac_bytes(&[(0x99, vec![1, 2, 3])]), &Limits::DEFAULT).unwrap();
        assert_eq!(pac.buffers[0].buffer_type, PacBufferType::Unknown(0x99));
        assert_eq!(pac.logon_info, None);
    }

    #[test]
    fn rejects_unknown_version() {
        let mut bytes = pac_bytes(&[]);
        bytes[4] = 1;
        assert_eq!(
            Pac::decode(&bytes, &Limits::DEFAULT),
            Err(PacFormatError::UnsupportedVersion(1))
        );
    }

    #[test]
    fn rejects_buffer_outside_the_pac() {
        let mut bytes = pac_bytes(&[(1, vec![0; 8])]);
        // cbBufferSize of the first entry
        bytes[12] = 0x40;
        let pac_len = bytes.len();
        assert_eq!(
            Pac::decode(&bytes, &Limits::DEFAULT),
            Err(PacFormatError::BufferOutOfBounds {
                ul_type: 1,
                offset: 24,
                size: 0x40,
                pac_len
            })
        );
    }

    #[test]
    fn rejects_truncated_header() {
        let bytes = pac_bytes(&[(6, vec![0; 8]), (7, vec![0; 8])]);
        assert!(matches!(
            Pac::decode(&bytes[..20], &Limits::DEFAULT),
            Err(PacFormatError::Truncated { .. })
        ));
    }
}
