use core::fmt;

use sid_codec::{SecurityIdentifier, escape_hex};
use tracing::trace;

use super::ndr::{NdrCursor, UnicodeStringHeader, read_rpc_sid};
use crate::Limits;
use crate::error::PacFormatError;

/// `SubAuthStatus`, `LastSuccessfulILogon`, `LastFailedILogon`,
/// `FailedILogonCount` and `Reserved3`.
const SUB_AUTH_FIELDS_LEN: usize = 4 + 8 + 8 + 4 + 4;

/// A binary SID as found in the PAC, not yet validated.
///
/// Keeping the raw bytes lets a malformed SID reach the SID decoder, which
/// reports exactly what is wrong with it.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct PacSid(Vec<u8>);

impl PacSid {
    /// Wraps raw SID bytes.
    #[must_use]
    #[inline]
    pub const fn from_bytes(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    /// The raw bytes.
    #[must_use]
    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Decodes the bytes into a typed SID.
    ///
    /// # Errors
    /// See [`SecurityIdentifier::from_binary`].
    #[inline]
    pub fn decode(&self) -> Result<SecurityIdentifier, sid_codec::MalformedSid> {
        SecurityIdentifier::from_binary(&self.0)
    }

    /// Appends a relative id, producing the SID of a group in this domain.
    ///
    /// The bytes are composed directly, so a malformed domain SID yields a
    /// malformed group SID rather than an error here.
    ///
    /// # Errors
    /// [`PacFormatError::SubAuthorityOverflow`] if the count byte is already 255.
    #[inline]
    pub fn with_rid(&self, rid: u32) -> Result<Self, PacFormatError> {
        let mut bytes = self.0.clone();
        let count = bytes.get_mut(1).ok_or(PacFormatError::SubAuthorityOverflow)?;
        *count = count
            .checked_add(1)
            .ok_or(PacFormatError::SubAuthorityOverflow)?;
        bytes.extend_from_slice(&rid.to_le_bytes());
        Ok(Self(bytes))
    }
}

impl fmt::Debug for PacSid {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.decode() {
            Ok(sid) => f.debug_tuple("PacSid").field(&format_args!("{sid}")).finish(),
            Err(_) => f.debug_tuple("PacSid").field(&escape_hex(&self.0)).finish(),
        }
    }
}

/// A group SID with its `SE_GROUP_*` attribute flags.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct SidAndAttributes {
    /// The group SID.
    pub sid: PacSid,
    /// `SE_GROUP_*` flags.
    pub attributes: u32,
}

/// A `FILETIME`: 100-nanosecond intervals since 1601-01-01 UTC.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FileTime(pub u64);

impl FileTime {
    /// The "never" marker used for expiry fields.
    pub const NEVER: Self = Self(0x7FFF_FFFF_FFFF_FFFF);

    /// Whether this is the "never" marker.
    #[must_use]
    #[inline]
    pub const fn is_never(self) -> bool {
        self.0 == Self::NEVER.0
    }
}

/// The decoded `KERB_VALIDATION_INFO` of a PAC `LOGON_INFO` buffer.
///
/// Group, extra and resource-group SIDs are kept in wire order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[non_exhaustive]
pub struct PacLogonInfo {
    /// `LogonTime`.
    pub logon_time: FileTime,
    /// `LogoffTime`.
    pub logoff_time: FileTime,
    /// `KickOffTime`.
    pub kick_off_time: FileTime,
    /// `PasswordLastSet`.
    pub password_last_set: FileTime,
    /// `PasswordCanChange`.
    pub password_can_change: FileTime,
    /// `PasswordMustChange`.
    pub password_must_change: FileTime,
    /// Account name.
    pub effective_name: String,
    /// Display name.
    pub full_name: String,
    /// `LogonScript`.
    pub logon_script: String,
    /// `ProfilePath`.
    pub profile_path: String,
    /// `HomeDirectory`.
    pub home_directory: String,
    /// `HomeDirectoryDrive`.
    pub home_directory_drive: String,
    /// `LogonCount`.
    pub logon_count: u16,
    /// `BadPasswordCount`.
    pub bad_password_count: u16,
    /// `LOGON_*` user flags.
    pub user_flags: u32,
    /// `USER_*` account control flags.
    pub user_account_control: u32,
    /// NetBIOS name of the authenticating domain controller.
    pub logon_server: String,
    /// NetBIOS name of the account domain.
    pub logon_domain_name: String,
    /// `LogonDomainId`.
    pub logon_domain_sid: Option<PacSid>,
    /// `LogonDomainId` + `UserId`.
    pub user_sid: Option<PacSid>,
    /// `LogonDomainId` + `PrimaryGroupId`.
    pub primary_group_sid: Option<PacSid>,
    /// `LogonDomainId` + each `GroupIds` entry.
    pub group_sids: Vec<SidAndAttributes>,
    /// `ExtraSids`.
    pub extra_sids: Vec<SidAndAttributes>,
    /// `ResourceGroupDomainSid`.
    pub resource_group_domain_sid: Option<PacSid>,
    /// `ResourceGroupDomainSid` + each `ResourceGroupIds` entry.
    pub resource_group_sids: Vec<SidAndAttributes>,
}

/// A `GROUP_MEMBERSHIP` before its domain SID is applied.
struct GroupMembership {
    relative_id: u32,
    attributes: u32,
}

/// Declared count and pointer of an array in the fixed part.
#[derive(Clone, Copy)]
struct ArrayRef {
    field: &'static str,
    count: u32,
    pointer: u32,
}

impl ArrayRef {
    fn read(
        ndr: &mut NdrCursor<'_>,
        field: &'static str,
        limits: &Limits,
    ) -> Result<Self, PacFormatError> {
        let count = ndr.read_u32()?;
        let pointer = ndr.read_u32()?;
        if count > limits.max_sids_per_list {
            return Err(PacFormatError::TooManySids {
                field,
                count,
                limit: limits.max_sids_per_list,
            });
        }
        if pointer == 0 && count != 0 {
            return Err(PacFormatError::CountMismatch {
                field,
                declared: count,
                actual: 0,
            });
        }
        Ok(Self {
            field,
            count,
            pointer,
        })
    }

    /// Reads the conformant count of the deferred array, which must match
    /// the declared one. Returns `false` for a null array.
    fn read_conformance(self, ndr: &mut NdrCursor<'_>) -> Result<bool, PacFormatError> {
        if self.pointer == 0 {
            return Ok(false);
        }
        let actual = ndr.read_u32()?;
        if actual != self.count {
            return Err(PacFormatError::CountMismatch {
                field: self.field,
                declared: self.count,
                actual,
            });
        }
        Ok(true)
    }

    fn read_group_memberships(
        self,
        ndr: &mut NdrCursor<'_>,
    ) -> Result<Vec<GroupMembership>, PacFormatError> {
        if !self.read_conformance(ndr)? {
            return Ok(Vec::new());
        }
        let bytes = ndr.read_elements(self.count, 2 * size_of::<u32>())?;
        Ok(bytes
            .chunks_exact(2 * size_of::<u32>())
            .filter_map(|entry| entry.split_first_chunk::<4>())
            .filter_map(|(rid, rest)| Some((rid, rest.first_chunk::<4>()?)))
            .map(|(rid, attributes)| GroupMembership {
                relative_id: u32::from_le_bytes(*rid),
                attributes: u32::from_le_bytes(*attributes),
            })
            .collect())
    }
}

fn read_optional_sid(
    ndr: &mut NdrCursor<'_>,
    pointer: u32,
) -> Result<Option<PacSid>, PacFormatError> {
    if pointer == 0 {
        return Ok(None);
    }
    read_rpc_sid(ndr).map(|bytes| Some(PacSid::from_bytes(bytes.to_vec())))
}

fn apply_domain(
    domain: Option<&PacSid>,
    field: &'static str,
    groups: Vec<GroupMembership>,
) -> Result<Vec<SidAndAttributes>, PacFormatError> {
    if groups.is_empty() {
        return Ok(Vec::new());
    }
    let domain = domain.ok_or(PacFormatError::MissingDomainSid { field })?;
    groups
        .into_iter()
        .map(|group| {
            Ok(SidAndAttributes {
                sid: domain.with_rid(group.relative_id)?,
                attributes: group.attributes,
            })
        })
        .collect()
}

impl PacLogonInfo {
    /// Decodes an NDR type-serialized `KERB_VALIDATION_INFO`.
    ///
    /// # Errors
    /// Any [`PacFormatError`] describing where the structure is broken.
    #[inline]
    pub fn decode(buffer: &[u8], limits: &Limits) -> Result<Self, PacFormatError> {
        let mut ndr = NdrCursor::new(buffer);
        ndr.read_serialization_header()?;

        let logon_time = FileTime(ndr.read_filetime()?);
        let logoff_time = FileTime(ndr.read_filetime()?);
        let kick_off_time = FileTime(ndr.read_filetime()?);
        let password_last_set = FileTime(ndr.read_filetime()?);
        let password_can_change = FileTime(ndr.read_filetime()?);
        let password_must_change = FileTime(ndr.read_filetime()?);

        let effective_name = UnicodeStringHeader::read(&mut ndr)?;
        let full_name = UnicodeStringHeader::read(&mut ndr)?;
        let logon_script = UnicodeStringHeader::read(&mut ndr)?;
        let profile_path = UnicodeStringHeader::read(&mut ndr)?;
        let home_directory = UnicodeStringHeader::read(&mut ndr)?;
        let home_directory_drive = UnicodeStringHeader::read(&mut ndr)?;

        let logon_count = ndr.read_u16()?;
        let bad_password_count = ndr.read_u16()?;
        let user_id = ndr.read_u32()?;
        let primary_group_id = ndr.read_u32()?;
        let group_ids = ArrayRef::read(&mut ndr, "GroupIds", limits)?;
        let user_flags = ndr.read_u32()?;
        // UserSessionKey
        ndr.skip(16)?;
        let logon_server = UnicodeStringHeader::read(&mut ndr)?;
        let logon_domain_name = UnicodeStringHeader::read(&mut ndr)?;
        let logon_domain_id = ndr.read_u32()?;
        // Reserved1
        ndr.skip(8)?;
        let user_account_control = ndr.read_u32()?;
        ndr.skip(SUB_AUTH_FIELDS_LEN)?;
        let extra_sids = ArrayRef::read(&mut ndr, "ExtraSids", limits)?;
        let resource_group_domain_sid = ndr.read_u32()?;
        let resource_group_ids = ArrayRef::read(&mut ndr, "ResourceGroupIds", limits)?;
        trace!(
            fixed_part_end = ndr.pos(),
            group_count = group_ids.count,
            extra_sid_count = extra_sids.count,
            resource_group_count = resource_group_ids.count,
            "read KERB_VALIDATION_INFO fixed part"
        );

        let effective_name = effective_name.read_deferred(&mut ndr)?;
        let full_name = full_name.read_deferred(&mut ndr)?;
        let logon_script = logon_script.read_deferred(&mut ndr)?;
        let profile_path = profile_path.read_deferred(&mut ndr)?;
        let home_directory = home_directory.read_deferred(&mut ndr)?;
        let home_directory_drive = home_directory_drive.read_deferred(&mut ndr)?;
        let groups = group_ids.read_group_memberships(&mut ndr)?;
        let logon_server = logon_server.read_deferred(&mut ndr)?;
        let logon_domain_name = logon_domain_name.read_deferred(&mut ndr)?;
        let logon_domain_sid = read_optional_sid(&mut ndr, logon_domain_id)?;
        let extra_sids = read_extra_sids(&mut ndr, extra_sids)?;
        let resource_group_domain_sid = read_optional_sid(&mut ndr, resource_group_domain_sid)?;
        let resource_groups = resource_group_ids.read_group_memberships(&mut ndr)?;

        let user_sid = logon_domain_sid
            .as_ref()
            .map(|domain| domain.with_rid(user_id))
            .transpose()?;
        let primary_group_sid = logon_domain_sid
            .as_ref()
            .map(|domain| domain.with_rid(primary_group_id))
            .transpose()?;
        let group_sids = apply_domain(logon_domain_sid.as_ref(), "GroupIds", groups)?;
        let resource_group_sids = apply_domain(
            resource_group_domain_sid.as_ref(),
            "ResourceGroupIds",
            resource_groups,
        )?;

        Ok(Self {
            logon_time,
            logoff_time,
            kick_off_time,
            password_last_set,
            password_can_change,
            password_must_change,
            effective_name,
            full_name,
            logon_script,
            profile_path,
            home_directory,
            home_directory_drive,
            logon_count,
            bad_password_count,
            user_flags,
            user_account_control,
            logon_server,
            logon_domain_name,
            logon_domain_sid,
            user_sid,
            primary_group_sid,
            group_sids,
            extra_sids,
            resource_group_domain_sid,
            resource_group_sids,
        })
    }
}

/// `ExtraSids` is an array of `{ pointer, attributes }` followed by the SID
/// of every entry, in order.
fn read_extra_sids(
    ndr: &mut NdrCursor<'_>,
    array: ArrayRef,
) -> Result<Vec<SidAndAttributes>, PacFormatError> {
    if !array.read_conformance(ndr)? {
        return Ok(Vec::new());
    }
    let entries = ndr.read_elements(array.count, 2 * size_of::<u32>())?;
    let headers = entries
        .chunks_exact(2 * size_of::<u32>())
        .filter_map(|entry| entry.split_first_chunk::<4>())
        .filter_map(|(pointer, rest)| Some((pointer, rest.first_chunk::<4>()?)))
        .map(|(pointer, attributes)| (u32::from_le_bytes(*pointer), u32::from_le_bytes(*attributes)))
        .collect::<Vec<_>>();

    headers
        .into_iter()
        .enumerate()
        .map(|(index, (pointer, attributes))| {
            if pointer == 0 {
                return Err(PacFormatError::NullExtraSid { index });
            }
            Ok(SidAndAttributes {
                sid: PacSid::from_bytes(read_rpc_sid(ndr)?.to_vec()),
                attributes,
            })
        })
        .collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used, reason = "Unwrap is not an issue in test")]
mod test {
    use super::*;
    use crate::testutil::{LogonInfoFixture, sid_bytes};
    use rstest::rstest;

    fn decode(fixture: &LogonInfoFixture) -> Result<PacLogonInfo, PacFormatError> {
        PacLogonInfo::decode(&fixture.encode(), &Limits::DEFAULT)
    }

    #[test]
    fn decodes_names_and_sids() {
        let fixture = LogonInfoFixture::domain_user();
        let info = decode(&fixture).unwrap();

        assert_eq!(info.effective_name, "jdoe");
        assert_eq!(info.full_name, "John Doe");
        assert_eq!(info.logon_domain_name, "EXAMPLE");
        assert_eq!(info.logon_server, "DC01");
        assert_eq!(info.logon_count, 7);
        assert_eq!(info.user_account_control, 0x10);
        assert!(info.password_must_change.is_never());

        let decoded = |sid: &PacSid| sid.decode().unwrap().to_string();
        assert_eq!(decoded(info.user_sid.as_ref().unwrap()), "S-1-5-21-1-2-3-1139");
        assert_eq!(decoded(info.primary_group_sid.as_ref().unwrap()), "S-1-5-21-1-2-3-513");
        let groups: Vec<_> = info.group_sids.iter().map(|group| decoded(&group.sid)).collect();
        assert_eq!(groups, ["S-1-5-21-1-2-3-512", "S-1-5-21-1-2-3-1105"]);
        assert_eq!(info.group_sids[0].attributes, 7);
        let extra: Vec<_> = info.extra_sids.iter().map(|extra| decoded(&extra.sid)).collect();
        assert_eq!(extra, ["S-1-18-1"]);
        let resource: Vec<_> = info
            .resource_group_sids
            .iter()
            .map(|group| decoded(&group.sid))
            .collect();
        assert_eq!(resource, ["S-1-5-21-9-9-9-4001"]);
    }

    #[test]
    fn empty_lists_and_null_strings() {
        let fixture = LogonInfoFixture {
            group_rids: Vec::new(),
            extra_sids: Vec::new(),
            resource_domain_sid: None,
            resource_group_rids: Vec::new(),
            full_name: String::new(),
            ..LogonInfoFixture::domain_user()
        };
        let info = decode(&fixture).unwrap();
        assert_eq!(info.full_name, "");
        assert!(info.group_sids.is_empty());
        assert!(info.extra_sids.is_empty());
        assert!(info.resource_group_sids.is_empty());
        assert!(info.primary_group_sid.is_some());
    }

    #[rstest]
    #[case::groups("GroupIds")]
    #[case::extra("ExtraSids")]
    #[case::resource("ResourceGroupIds")]
    fn conformant_count_must_match(#[case] field: &'static str) {
        let fixture = LogonInfoFixture {
            conformance_skew: Some(field),
            ..LogonInfoFixture::domain_user()
        };
        assert!(matches!(
            decode(&fixture),
            Err(PacFormatError::CountMismatch { field: found, .. }) if found == field
        ));
    }

    #[test]
    fn declared_count_is_bounded() {
        let fixture = LogonInfoFixture::domain_user();
        let limits = Limits::DEFAULT.with_max_sids_per_list(1);
        assert_eq!(
            PacLogonInfo::decode(&fixture.encode(), &limits),
            Err(PacFormatError::TooManySids {
                field: "GroupIds",
                count: 2,
                limit: 1
            })
        );
    }

    #[test]
    fn groups_need_a_domain_sid() {
        let fixture = LogonInfoFixture {
            resource_domain_sid: None,
            ..LogonInfoFixture::domain_user()
        };
        assert_eq!(
            decode(&fixture),
            Err(PacFormatError::MissingDomainSid {
                field: "ResourceGroupIds"
            })
        );
    }

    #[test]
    fn null_extra_sid_pointer_is_rejected() {
        let fixture = LogonInfoFixture {
            null_extra_sid: Some(0),
            ..LogonInfoFixture::domain_user()
        };
        assert_eq!(decode(&fixture), Err(PacFormatError::NullExtraSid { index: 0 }));
    }

    #[test]
    fn truncated_buffer_is_rejected() {
        let bytes = LogonInfoFixture::domain_user().encode();
        for len in [0, 19, 100, bytes.len() - 1] {
            assert!(
                matches!(
                    PacLogonInfo::decode(&bytes[..len], &Limits::DEFAULT),
                    Err(PacFormatError::Truncated { .. })
                ),
                "{len}-byte prefix should be truncated"
            );
        }
    }

    #[test]
    fn malformed_domain_sid_is_kept_raw() {
        let mut domain = sid_bytes("S-1-5-21-1-2-3");
        domain[1] = 2;
        let fixture = LogonInfoFixture {
            domain_sid: Some(domain),
            ..LogonInfoFixture::domain_user()
        };
        let info = decode(&fixture).unwrap();
        assert!(info.primary_group_sid.unwrap().decode().is_err());
    }

    #[test]
    fn rid_composition_overflow() {
        let mut bytes = sid_bytes("S-1-5");
        bytes[1] = u8::MAX;
        assert_eq!(
            PacSid::from_bytes(bytes).with_rid(1),
            Err(PacFormatError::SubAuthorityOverflow)
        );
    }
}
