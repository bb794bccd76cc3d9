//! Commissioning scenarios through `SecurityContext`

use zbsec::dlk::{DlkOutcome, DlkState, KeyNegotiationMethod};
use zbsec::frame::{FrameLayer, IncomingFrame, KeySelector};
use zbsec::store::{KeyAttribute, KeyFilter, KeyUpdateMethod};
use zbsec::tlv::SupportedKeyNegotiationMethods;
use zbsec::SecurityConfig;
use zbsec_api::{AuthError, Error, IeeeAddr, NegotiationError, WireError};
use zbsec_tests::fixtures::{device, negotiate};

const COORDINATOR: IeeeAddr = IeeeAddr::from_u64(0x0022_A300_0000_0001);
const JOINER: IeeeAddr = IeeeAddr::from_u64(0x0022_A300_0000_00F0);
const APS_HEADER: [u8; 4] = [0x21, 0x0A, 0x04, 0x01];

fn aps_from(source: IeeeAddr) -> IncomingFrame {
    IncomingFrame {
        layer: FrameLayer::Aps,
        header_len: APS_HEADER.len(),
        source: Some(source),
    }
}

#[test]
fn curve25519_sha256_then_aps_frame() {
    let mut config = SecurityConfig::default();
    config.negotiation.methods = vec!["curve25519-sha256".into()];
    let (mut tc, _) = device(COORDINATOR, 1, config.clone());
    let (mut joiner, _) = device(JOINER, 2, config);

    let transcript = negotiate(&mut tc, &mut joiner, 100).unwrap();
    assert_eq!(transcript.frames.len(), 4);
    assert_eq!(
        tc.negotiations().context(JOINER).unwrap().method(),
        KeyNegotiationMethod::Curve25519Sha256
    );
    assert_eq!(tc.negotiation_state(JOINER), DlkState::Complete);
    assert_eq!(joiner.negotiation_state(COORDINATOR), DlkState::Complete);

    let tc_entry = tc.store().lookup(JOINER, KeyFilter::Any).unwrap();
    let joiner_entry = joiner.store().lookup(COORDINATOR, KeyFilter::Any).unwrap();
    assert_eq!(tc_entry.link_key(), joiner_entry.link_key());
    assert_eq!(tc_entry.key_attribute, KeyAttribute::Provisional);
    assert_eq!(tc_entry.key_source, KeyUpdateMethod::UnauthenticatedKeyNegotiation);

    // no secret material survives a completed negotiation
    assert!(!tc.negotiations().context(JOINER).unwrap().holds_secrets());
    assert!(!joiner.negotiations().context(COORDINATOR).unwrap().holds_secrets());

    let payload: [u8; 20] = core::array::from_fn(|i| i as u8);
    let frame = joiner
        .secure_frame(FrameLayer::Aps, &APS_HEADER, &payload, KeySelector::Link(COORDINATOR))
        .unwrap();
    let opened = tc.unsecure_frame(&frame, aps_from(JOINER)).unwrap();
    assert_eq!(opened.payload(), payload);
    assert_eq!(opened.source, JOINER);

    let mut forged = frame.clone();
    // unseen counter, so the MIC is what rejects it
    forged[APS_HEADER.len() + 1] ^= 0x80;
    assert_eq!(
        tc.unsecure_frame(&forged, aps_from(JOINER)).unwrap_err(),
        Error::Auth(AuthError::AuthenticationFailed)
    );
}

#[test]
fn legacy_only_peer_gets_no_key() {
    let (mut tc, _) = device(COORDINATOR, 3, SecurityConfig::default());
    let legacy = SupportedKeyNegotiationMethods {
        methods: 1 << KeyNegotiationMethod::Sect283k1.index(),
        secrets: 0xFF,
        source: None,
    };
    assert_eq!(
        tc.start_negotiation(JOINER, &legacy, 0).unwrap_err(),
        Error::Negotiation(NegotiationError::NoCommonMethod)
    );
    assert!(tc.store().is_empty());

    // a responder refuses a method it does not offer
    let mut config = SecurityConfig::default();
    config.negotiation.methods = vec!["curve25519-sha256".into()];
    let (mut x25519_only, _) = device(COORDINATOR, 4, config);
    let mut config = SecurityConfig::default();
    config.negotiation.methods = vec!["p256-sha256".into()];
    let (mut p256_only, _) = device(JOINER, 5, config);

    let anything = SupportedKeyNegotiationMethods {
        methods: 0xFF,
        secrets: 0xFF,
        source: None,
    };
    let request = x25519_only.start_negotiation(JOINER, &anything, 0).unwrap();
    assert_eq!(
        p256_only.handle_negotiation(COORDINATOR, &request, 1).unwrap_err(),
        Error::Negotiation(NegotiationError::NoCommonMethod)
    );
    assert!(p256_only.store().is_empty());
}

#[test]
fn over_long_tlv_aborts_the_message() {
    let (mut tc, _) = device(COORDINATOR, 6, SecurityConfig::default());
    let (mut joiner, _) = device(JOINER, 7, SecurityConfig::default());
    let mut request = tc
        .start_negotiation(JOINER, &joiner.supported_methods(), 0)
        .unwrap();
    // first TLV claims more bytes than the frame holds
    request[2] = 0xFF;
    assert!(matches!(
        joiner.handle_negotiation(COORDINATOR, &request, 1).unwrap_err(),
        Error::Wire(WireError::InvalidFormat(_))
    ));
    assert_eq!(joiner.negotiation_state(COORDINATOR), DlkState::Idle);
    assert!(joiner.store().is_empty());
}

#[test]
fn timeout_cancels_and_wipes() {
    let (mut tc, _) = device(COORDINATOR, 8, SecurityConfig::default());
    let (joiner, _) = device(JOINER, 9, SecurityConfig::default());
    tc.start_negotiation(JOINER, &joiner.supported_methods(), 1_000)
        .unwrap();
    assert!(tc.negotiations().context(JOINER).unwrap().holds_secrets());

    let deadline = 1_000 + tc.config().negotiation.step_timeout_ms;
    assert!(tc.poll(deadline - 1).is_empty());
    assert_eq!(tc.poll(deadline), vec![JOINER]);
    assert_eq!(
        tc.negotiation_state(JOINER),
        DlkState::Failed(NegotiationError::Timeout.into())
    );
    assert!(!tc.negotiations().context(JOINER).unwrap().holds_secrets());
    assert_eq!(tc.negotiations().active_sessions(), 0);
}

#[test]
fn deferred_key_agreement() {
    let mut config = SecurityConfig::default();
    config.negotiation.deferred_crypto = true;
    let (mut tc, _) = device(COORDINATOR, 10, SecurityConfig::default());
    let (mut joiner, _) = device(JOINER, 11, config);

    let request = tc
        .start_negotiation(JOINER, &joiner.supported_methods(), 0)
        .unwrap();
    assert_eq!(
        joiner.handle_negotiation(COORDINATOR, &request, 1).unwrap(),
        DlkOutcome::Pending
    );
    assert_eq!(
        joiner.handle_negotiation(COORDINATOR, &request, 2).unwrap_err(),
        Error::Negotiation(NegotiationError::StepInProgress)
    );
    let DlkOutcome::Send(response) = joiner.run_pending(COORDINATOR, 3).unwrap() else {
        panic!("deferred step must produce the start response");
    };
    let DlkOutcome::Send(confirm) = tc.handle_negotiation(JOINER, &response, 4).unwrap() else {
        panic!("initiator must confirm");
    };
    let DlkOutcome::Complete { reply: Some(reply) } =
        joiner.handle_negotiation(COORDINATOR, &confirm, 5).unwrap()
    else {
        panic!("responder must complete");
    };
    assert_eq!(
        tc.handle_negotiation(JOINER, &reply, 6).unwrap(),
        DlkOutcome::Complete { reply: None }
    );
    assert_eq!(
        tc.store().lookup(JOINER, KeyFilter::Any).unwrap().link_key(),
        joiner.store().lookup(COORDINATOR, KeyFilter::Any).unwrap().link_key()
    );
}

#[test]
fn key_survives_reboot() {
    let (mut tc, tc_log) = device(COORDINATOR, 12, SecurityConfig::default());
    let (mut joiner, _) = device(JOINER, 13, SecurityConfig::default());
    negotiate(&mut tc, &mut joiner, 0).unwrap();
    for _ in 0..3 {
        let frame = tc
            .secure_frame(FrameLayer::Aps, &APS_HEADER, b"before", KeySelector::Link(JOINER))
            .unwrap();
        joiner.unsecure_frame(&frame, aps_from(COORDINATOR)).unwrap();
    }

    let mut rebooted = zbsec::SecurityContext::new(
        COORDINATOR,
        SecurityConfig::default(),
        Box::new(tc_log.reboot()),
    )
    .unwrap();
    assert_eq!(
        rebooted.store().lookup(JOINER, KeyFilter::Any).unwrap().link_key(),
        tc.store().lookup(JOINER, KeyFilter::Any).unwrap().link_key()
    );
    // the rebooted device continues above every counter it used
    let frame = rebooted
        .secure_frame(FrameLayer::Aps, &APS_HEADER, b"after", KeySelector::Link(JOINER))
        .unwrap();
    assert_eq!(joiner.unsecure_frame(&frame, aps_from(COORDINATOR)).unwrap().payload(), b"after");
}
