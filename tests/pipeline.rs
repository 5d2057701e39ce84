#![allow(clippy::unwrap_used, reason = "Unwrap is not an issue in test")]

use std::sync::Arc;

use ad_group_sids::authorization_data::{AD_IF_RELEVANT, AD_WIN2K_PAC};
use ad_group_sids::spnego::{KERBEROS_V5_OID, LEGACY_KERBEROS_V5_OID};
use ad_group_sids::testutil::{
    LogonInfoFixture, StaticDecryptor, authorization_data_der, pac_bytes, sid_bytes,
    spnego_init_token,
};
use ad_group_sids::{
    AuthorizationDataElement, DecryptedTicket, ExtractError, GroupSidExtractor, MalformedSid,
    PipelineState, ServiceKey, ServiceKeySet, SidListKind,
};
use der::asn1::ObjectIdentifier;
use rstest::rstest;

const LOGON_INFO: u32 = 1;
const SERVER_CHECKSUM: u32 = 6;
const CLIENT_INFO: u32 = 10;

fn keys() -> Arc<ServiceKeySet> {
    ServiceKeySet::new(vec![ServiceKey::new(
        "HTTP/web.example.com@EXAMPLE.COM",
        18,
        Some(2),
        vec![0x5a; 32],
    )])
    .shared()
}

fn ticket(authorization_data: Vec<(i32, Vec<u8>)>) -> DecryptedTicket {
    DecryptedTicket::new(
        authorization_data
            .into_iter()
            .map(|(ad_type, data)| AuthorizationDataElement::new(ad_type, data))
            .collect(),
    )
    .with_client("jdoe", "EXAMPLE.COM")
}

/// A ticket shaped like the ones Active Directory issues: the PAC sits in an
/// `AD-IF-RELEVANT` container after other PAC buffers.
fn windows_ticket(logon_info: &LogonInfoFixture) -> DecryptedTicket {
    let pac = pac_bytes(&[
        (CLIENT_INFO, vec![0; 18]),
        (LOGON_INFO, logon_info.encode()),
        (SERVER_CHECKSUM, vec![0x10, 0, 0, 0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12]),
    ]);
    ticket(vec![(
        AD_IF_RELEVANT,
        authorization_data_der(&[(AD_WIN2K_PAC, pac)]),
    )])
}

fn kerberos_token(oid: ObjectIdentifier) -> Vec<u8> {
    spnego_init_token(&[oid, KERBEROS_V5_OID], Some(StaticDecryptor::AP_REQ))
}

fn extractor(ticket: DecryptedTicket) -> GroupSidExtractor<StaticDecryptor> {
    GroupSidExtractor::new(StaticDecryptor::new(ticket), keys())
}

#[rstest]
#[case::kerberos(KERBEROS_V5_OID)]
#[case::legacy_kerberos(LEGACY_KERBEROS_V5_OID)]
fn group_sids_in_pac_order(#[case] oid: ObjectIdentifier) {
    let extractor = extractor(windows_ticket(&LogonInfoFixture::domain_user()));
    let sids = extractor.extract(&kerberos_token(oid)).unwrap();
    assert_eq!(
        sids.as_slice(),
        [
            "S-1-5-21-1-2-3-513",
            "S-1-5-21-1-2-3-512",
            "S-1-5-21-1-2-3-1105",
            "S-1-18-1",
            "S-1-5-21-9-9-9-4001",
        ]
    );
}

#[test]
fn one_sid_per_list() {
    let fixture = LogonInfoFixture {
        primary_group_rid: 513,
        group_rids: vec![(1105, 7)],
        extra_sids: vec![(sid_bytes("S-1-5-21-7-7-7-1234"), 0x2000_0007)],
        resource_group_rids: vec![(4001, 7)],
        ..LogonInfoFixture::domain_user()
    };
    let sids = extractor(windows_ticket(&fixture))
        .extract(&kerberos_token(KERBEROS_V5_OID))
        .unwrap();
    assert_eq!(
        Vec::from(sids),
        [
            "S-1-5-21-1-2-3-513",
            "S-1-5-21-1-2-3-1105",
            "S-1-5-21-7-7-7-1234",
            "S-1-5-21-9-9-9-4001",
        ]
    );
}

#[test]
fn ntlm_yields_no_sids() {
    let ntlm = ObjectIdentifier::new_unwrap("1.3.6.1.4.1.311.2.2.10");
    let extractor = extractor(windows_ticket(&LogonInfoFixture::domain_user()));
    let token = spnego_init_token(&[ntlm, KERBEROS_V5_OID], Some(b"NTLMSSP\0"));
    assert!(extractor.extract(&token).unwrap().is_empty());
}

#[test]
fn ticket_without_pac_yields_no_sids() {
    let extractor = extractor(ticket(vec![(141, vec![1, 2, 3])]));
    assert!(extractor.extract(&kerberos_token(KERBEROS_V5_OID)).unwrap().is_empty());
}

#[test]
fn pac_without_logon_info_yields_no_sids() {
    let pac = pac_bytes(&[(CLIENT_INFO, vec![0; 18])]);
    let extractor = extractor(ticket(vec![(AD_WIN2K_PAC, pac)]));
    assert!(extractor.extract(&kerberos_token(KERBEROS_V5_OID)).unwrap().is_empty());
}

#[test]
fn repeated_extraction_is_identical() {
    let extractor = extractor(windows_ticket(&LogonInfoFixture::domain_user()));
    let token = kerberos_token(KERBEROS_V5_OID);
    let first = extractor.extract(&token).unwrap();
    for _ in 0..3 {
        assert_eq!(extractor.extract(&token).unwrap(), first);
    }
}

#[test]
fn concurrent_extraction() {
    let extractor = extractor(windows_ticket(&LogonInfoFixture::domain_user()));
    let token = kerberos_token(KERBEROS_V5_OID);
    let expected = extractor.extract(&token).unwrap();

    std::thread::scope(|scope| {
        let handles: Vec<_> = (0..8)
            .map(|_| scope.spawn(|| extractor.extract(&token).unwrap()))
            .collect();
        for handle in handles {
            assert_eq!(handle.join().unwrap(), expected);
        }
    });
}

#[test]
fn malformed_extra_sid_fails_the_whole_call() {
    let mut bad = sid_bytes("S-1-5-21-7-7-7-1234");
    // Count byte claims 6 sub-authorities, 5 are present.
    bad[1] = 6;
    let fixture = LogonInfoFixture {
        extra_sids: vec![(sid_bytes("S-1-18-1"), 7), (bad, 7)],
        ..LogonInfoFixture::domain_user()
    };
    let err = extractor(windows_ticket(&fixture))
        .extract(&kerberos_token(KERBEROS_V5_OID))
        .unwrap_err();
    assert!(
        matches!(
            &err,
            ExtractError::PacDecoding(decoding)
                if decoding.list == SidListKind::Extra
                    && decoding.index == 1
                    && decoding.source
                        == MalformedSid::LengthMismatch {
                            count: 6,
                            expected: 32,
                            actual: 28
                        }
        ),
        "{err:?}"
    );
    assert_eq!(err.state(), PipelineState::PacExtracted);
}

#[test]
fn ndr_count_mismatch_is_ticket_processing() {
    let fixture = LogonInfoFixture {
        conformance_skew: Some("GroupIds"),
        ..LogonInfoFixture::domain_user()
    };
    let err = extractor(windows_ticket(&fixture))
        .extract(&kerberos_token(KERBEROS_V5_OID))
        .unwrap_err();
    assert_eq!(err.state(), PipelineState::TicketDecrypted);
    let chain = std::iter::successors(Some(&err as &dyn std::error::Error), |err| err.source())
        .map(ToString::to_string)
        .collect::<Vec<_>>();
    assert_eq!(
        chain,
        [
            "ticket processing failed after ticket decrypted",
            "invalid PAC",
            "GroupIds has 3 entries but 2 were declared",
        ]
    );
}

#[test]
fn wrong_service_ticket_is_ticket_processing() {
    let extractor = extractor(windows_ticket(&LogonInfoFixture::domain_user()));
    let token = spnego_init_token(&[KERBEROS_V5_OID], Some(b"\x6e\x00"));
    assert!(matches!(
        extractor.extract(&token),
        Err(ExtractError::TicketProcessing {
            state: PipelineState::TokenParsed,
            ..
        })
    ));
}

#[test]
fn garbage_token_is_malformed() {
    let extractor = extractor(DecryptedTicket::default());
    let garbage = hex::decode("a1073005a0030a0100").unwrap();
    let err = extractor.extract(&garbage).unwrap_err();
    assert!(matches!(err, ExtractError::MalformedToken(_)));
    assert_eq!(err.state(), PipelineState::Start);
}

#[test]
fn ber_framed_token() {
    let extractor = extractor(windows_ticket(&LogonInfoFixture::domain_user()));
    let token = kerberos_token(KERBEROS_V5_OID);
    // Same token with the outer length in non-minimal long form.
    let ber = [&[0x60, 0x81][..], &token[1..]].concat();
    assert_eq!(
        extractor.extract(&ber).unwrap(),
        extractor.extract(&token).unwrap()
    );
}
