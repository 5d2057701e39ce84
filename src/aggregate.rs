use core::fmt;

use delegate::delegate;
use sid_codec::decode_binary_sid;

use crate::error::PacDecodingError;
use crate::pac::{PacLogonInfo, PacSid};

/// The SID-bearing fields of the logon info, in output order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SidListKind {
    /// `LogonDomainId` + `PrimaryGroupId`.
    PrimaryGroup,
    /// `GroupIds`.
    Group,
    /// `ExtraSids`.
    Extra,
    /// `ResourceGroupIds`.
    ResourceGroup,
}

impl fmt::Display for SidListKind {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::PrimaryGroup => "primary group",
            Self::Group => "group",
            Self::Extra => "extra",
            Self::ResourceGroup => "resource group",
        })
    }
}

/// Group SIDs of a principal, as canonical strings.
///
/// Order: primary group, then `GroupIds`, then `ExtraSids`, then
/// `ResourceGroupIds`, each in PAC order. Duplicates are kept.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(transparent)
)]
pub struct GroupSidList(Vec<String>);

impl GroupSidList {
    /// An empty list.
    #[must_use]
    #[inline]
    pub const fn new() -> Self {
        Self(Vec::new())
    }

    /// The SIDs as a slice.
    #[must_use]
    #[inline]
    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    /// Whether `sid` is in the list.
    #[must_use]
    #[inline]
    pub fn contains(&self, sid: &str) -> bool {
        self.0.iter().any(|member| member == sid)
    }

    delegate! {
        to self.0 {
            /// Number of SIDs.
            #[must_use]
            pub fn len(&self) -> usize;
            /// Whether the list is empty.
            #[must_use]
            pub fn is_empty(&self) -> bool;
            /// Iterates in order.
            pub fn iter(&self) -> core::slice::Iter<'_, String>;
        }
    }
}

impl From<GroupSidList> for Vec<String> {
    #[inline]
    fn from(list: GroupSidList) -> Self {
        list.0
    }
}

impl AsRef<[String]> for GroupSidList {
    #[inline]
    fn as_ref(&self) -> &[String] {
        &self.0
    }
}

impl IntoIterator for GroupSidList {
    type Item = String;
    type IntoIter = std::vec::IntoIter<String>;

    #[inline]
    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a GroupSidList {
    type Item = &'a String;
    type IntoIter = core::slice::Iter<'a, String>;

    #[inline]
    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

fn push_decoded<'a>(
    out: &mut Vec<String>,
    list: SidListKind,
    sids: impl IntoIterator<Item = &'a PacSid>,
) -> Result<(), PacDecodingError> {
    for (index, sid) in sids.into_iter().enumerate() {
        let decoded = decode_binary_sid(sid.as_bytes())
            .map_err(|source| PacDecodingError { list, index, source })?;
        out.push(decoded);
    }
    Ok(())
}

/// Collects the group SIDs of a logon info. `None` yields an empty list.
///
/// # Errors
/// [`PacDecodingError`] for the first SID that does not decode; nothing is
/// returned for the others.
#[inline]
pub fn aggregate_group_sids(
    logon_info: Option<&PacLogonInfo>,
) -> Result<GroupSidList, PacDecodingError> {
    let Some(info) = logon_info else {
        return Ok(GroupSidList::new());
    };

    let mut sids = Vec::with_capacity(
        usize::from(info.primary_group_sid.is_some())
            + info.group_sids.len()
            + info.extra_sids.len()
            + info.resource_group_sids.len(),
    );
    push_decoded(&mut sids, SidListKind::PrimaryGroup, &info.primary_group_sid)?;
    push_decoded(
        &mut sids,
        SidListKind::Group,
        info.group_sids.iter().map(|group| &group.sid),
    )?;
    push_decoded(
        &mut sids,
        SidListKind::Extra,
        info.extra_sids.iter().map(|extra| &extra.sid),
    )?;
    push_decoded(
        &mut sids,
        SidListKind::ResourceGroup,
        info.resource_group_sids.iter().map(|group| &group.sid),
    )?;
    Ok(GroupSidList(sids))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, reason = "Unwrap is not an issue in test")]
mod test {
    use super::*;
    use crate::pac::SidAndAttributes;
    use crate::testutil::sid_bytes;
    use rstest::rstest;
    use sid_codec::MalformedSid;

    fn sid(text: &str) -> PacSid {
        PacSid::from_bytes(sid_bytes(text))
    }

    fn members(texts: &[&str]) -> Vec<SidAndAttributes> {
        texts
            .iter()
            .map(|text| SidAndAttributes {
                sid: sid(text),
                attributes: 7,
            })
            .collect()
    }

    fn logon_info() -> PacLogonInfo {
        PacLogonInfo {
            primary_group_sid: Some(sid("S-1-5-21-1-2-3-513")),
            group_sids: members(&["S-1-5-21-1-2-3-512", "S-1-5-21-1-2-3-513"]),
            extra_sids: members(&["S-1-18-1"]),
            resource_group_sids: members(&["S-1-5-21-9-9-9-4001"]),
            ..PacLogonInfo::default()
        }
    }

    #[test]
    fn absent_logon_info_is_empty() {
        assert!(aggregate_group_sids(None).unwrap().is_empty());
    }

    #[test]
    fn ordered_with_duplicates() {
        let sids = aggregate_group_sids(Some(&logon_info())).unwrap();
        assert_eq!(
            sids.as_slice(),
            [
                "S-1-5-21-1-2-3-513",
                "S-1-5-21-1-2-3-512",
                "S-1-5-21-1-2-3-513",
                "S-1-18-1",
                "S-1-5-21-9-9-9-4001",
            ]
        );
        assert!(sids.contains("S-1-18-1"));
    }

    #[rstest]
    #[case::empty_extra_between_lists(
        Some("S-1-5-21-1-2-3-513"),
        &["S-1-5-21-1-2-3-512", "S-1-5-21-1-2-3-1105"],
        &[],
        &["S-1-5-21-9-9-9-4001"]
    )]
    #[case::empty_groups(Some("S-1-5-21-1-2-3-513"), &[], &["S-1-18-1"], &["S-1-5-21-9-9-9-4001"])]
    #[case::extra_only(None, &[], &["S-1-18-1", "S-1-5-32-544"], &[])]
    #[case::all_empty(None, &[], &[], &[])]
    fn sub_lists_keep_their_order(
        #[case] primary: Option<&str>,
        #[case] groups: &[&str],
        #[case] extra: &[&str],
        #[case] resource: &[&str],
    ) {
        let info = PacLogonInfo {
            primary_group_sid: primary.map(sid),
            group_sids: members(groups),
            extra_sids: members(extra),
            resource_group_sids: members(resource),
            ..PacLogonInfo::default()
        };
        let expected: Vec<&str> = primary
            .into_iter()
            .chain(groups.iter().copied())
            .chain(extra.iter().copied())
            .chain(resource.iter().copied())
            .collect();
        assert_eq!(Vec::from(aggregate_group_sids(Some(&info)).unwrap()), expected);
    }

    #[test]
    fn empty_extra_list_is_skipped() {
        let info = PacLogonInfo {
            extra_sids: Vec::new(),
            group_sids: members(&["S-1-5-21-1-2-3-512", "S-1-5-21-1-2-3-1105"]),
            ..logon_info()
        };
        assert_eq!(
            aggregate_group_sids(Some(&info)).unwrap().as_slice(),
            [
                "S-1-5-21-1-2-3-513",
                "S-1-5-21-1-2-3-512",
                "S-1-5-21-1-2-3-1105",
                "S-1-5-21-9-9-9-4001",
            ]
        );
    }

    #[test]
    fn without_primary_group() {
        let info = PacLogonInfo {
            primary_group_sid: None,
            ..logon_info()
        };
        let sids: Vec<String> = aggregate_group_sids(Some(&info)).unwrap().into();
        assert_eq!(sids.first().map(String::as_str), Some("S-1-5-21-1-2-3-512"));
        assert_eq!(sids.len(), 4);
    }

    #[test]
    fn one_bad_sid_fails_the_whole_list() {
        let mut info = logon_info();
        let mut truncated = sid_bytes("S-1-18-1");
        truncated.pop();
        info.extra_sids.push(SidAndAttributes {
            sid: PacSid::from_bytes(truncated),
            attributes: 7,
        });
        assert_eq!(
            aggregate_group_sids(Some(&info)),
            Err(PacDecodingError {
                list: SidListKind::Extra,
                index: 1,
                source: MalformedSid::LengthMismatch {
                    count: 1,
                    expected: 12,
                    actual: 11
                }
            })
        );
    }

    proptest::proptest! {
        #[test]
        fn group_rids_follow_the_domain(
            domain in proptest::collection::vec(proptest::num::u32::ANY, 1..=4),
            rids in proptest::collection::vec(proptest::num::u32::ANY, 0..16),
        ) {
            let domain = format!(
                "S-1-5-{}",
                domain.iter().map(ToString::to_string).collect::<Vec<_>>().join("-")
            );
            let domain_sid = sid(&domain);
            let info = PacLogonInfo {
                group_sids: rids
                    .iter()
                    .map(|&rid| SidAndAttributes {
                        sid: domain_sid.with_rid(rid).unwrap(),
                        attributes: 7,
                    })
                    .collect(),
                ..PacLogonInfo::default()
            };
            let expected: Vec<String> = rids.iter().map(|rid| format!("{domain}-{rid}")).collect();
            proptest::prop_assert_eq!(Vec::from(aggregate_group_sids(Some(&info)).unwrap()), expected);
        }
    }

    #[cfg(feature = "serde")]
    #[test]
    fn serde_tokens() {
        use serde_test::{Token, assert_tokens};

        let sids = GroupSidList(vec!["S-1-5-32-544".to_owned(), "S-1-18-1".to_owned()]);
        assert_tokens(
            &sids,
            &[
                Token::Seq { len: Some(2) },
                Token::Str("S-1-5-32-544"),
                Token::Str("S-1-18-1"),
                Token::SeqEnd,
            ],
        );
    }

    #[cfg(feature = "serde")]
    #[test]
    fn serializes_as_a_sequence() {
        let sids = aggregate_group_sids(Some(&logon_info())).unwrap();
        let json = serde_json::to_string(&sids).unwrap();
        assert!(json.starts_with(r#"["S-1-5-21-1-2-3-513","#), "{json}");
        assert_eq!(serde_json::from_str::<GroupSidList>(&json).unwrap(), sids);
    }
}
