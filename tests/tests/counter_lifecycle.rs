//! Frame counters across key switches, replay-table pressure and reboots

use std::collections::BTreeSet;

use proptest::prelude::*;
use zbsec::frame::AuxHeader;
use zbsec::prelude::*;
use zbsec::store::KeyFilter;
use zbsec_api::AuthError;
use zbsec_tests::fixtures::device;

const A: IeeeAddr = IeeeAddr::from_u64(0x0022_A300_0000_000A);
const B: IeeeAddr = IeeeAddr::from_u64(0x0022_A300_0000_000B);
const NWK_HEADER: [u8; 4] = [0x08, 0x12, 0xFF, 0xFF];
const APS_HEADER: [u8; 4] = [0x21, 0x0A, 0x04, 0x01];
const LINK_KEY: Key128 = [0x3C; 16];

fn nwk_in() -> IncomingFrame {
    IncomingFrame {
        layer: FrameLayer::Nwk,
        header_len: NWK_HEADER.len(),
        source: None,
    }
}

fn aps_from(source: IeeeAddr) -> IncomingFrame {
    IncomingFrame {
        layer: FrameLayer::Aps,
        header_len: APS_HEADER.len(),
        source: Some(source),
    }
}

fn sender(n: u8) -> IeeeAddr {
    IeeeAddr::from_u64(0x0022_A300_0000_0100 | n as u64)
}

#[derive(Debug, Clone)]
enum KeyOp {
    Switch(u8),
    SendActive,
    SendWith(u8),
    Reinstall(u8),
    Replace(u8),
}

fn key_op() -> impl Strategy<Value = KeyOp> {
    prop_oneof![
        2 => (0u8..3).prop_map(KeyOp::Switch),
        4 => Just(KeyOp::SendActive),
        2 => (0u8..3).prop_map(KeyOp::SendWith),
        1 => (0u8..3).prop_map(KeyOp::Reinstall),
        1 => (0u8..3).prop_map(KeyOp::Replace),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn network_key_nonces_are_never_reused(ops in prop::collection::vec(key_op(), 1..40)) {
        let (mut ctx, _) = device(A, 1, SecurityConfig::default());
        let mut values = [1u8, 2, 3];
        let mut fresh = 10u8;
        for (seq, value) in values.iter().enumerate() {
            ctx.set_network_key(seq as u8, &[*value; 16]).unwrap();
        }

        // (key value, frame counter) pairs already used
        let mut used = BTreeSet::new();
        for op in &ops {
            let selector = match *op {
                KeyOp::Switch(seq) => {
                    ctx.switch_network_key(seq).unwrap();
                    continue;
                }
                KeyOp::Reinstall(seq) => {
                    ctx.set_network_key(seq, &[values[seq as usize]; 16]).unwrap();
                    continue;
                }
                KeyOp::Replace(seq) => {
                    fresh += 1;
                    values[seq as usize] = fresh;
                    ctx.set_network_key(seq, &[fresh; 16]).unwrap();
                    continue;
                }
                KeyOp::SendActive => KeySelector::ActiveNetworkKey,
                KeyOp::SendWith(seq) => KeySelector::NetworkKey(seq),
            };
            let frame = ctx.secure_frame(FrameLayer::Nwk, &NWK_HEADER, b"route", selector).unwrap();
            let aux = AuxHeader::parse(&frame[NWK_HEADER.len()..]).unwrap();
            let seq = aux.key_sequence.unwrap();
            prop_assert!(
                used.insert((values[seq as usize], aux.frame_counter)),
                "counter {} reused under key {}", aux.frame_counter, seq
            );
        }
    }

    #[test]
    fn replay_table_pressure_never_releases_a_floor(
        picks in prop::collection::vec(0u8..4, 1..24),
        replay_pick in any::<prop::sample::Index>(),
    ) {
        let mut config = SecurityConfig::default();
        config.frame.replay_capacity = 2;
        let (mut receiver, _) = device(B, 2, config);
        receiver.set_network_key(0, &[0x55; 16]).unwrap();
        let mut senders: Vec<SecurityContext> = (0..4)
            .map(|n| {
                let (mut ctx, _) = device(sender(n), 10 + n as u64, SecurityConfig::default());
                ctx.set_network_key(0, &[0x55; 16]).unwrap();
                ctx
            })
            .collect();

        let mut accepted = Vec::new();
        for &n in &picks {
            let frame = senders[n as usize]
                .secure_frame(FrameLayer::Nwk, &NWK_HEADER, b"x", KeySelector::ActiveNetworkKey)
                .unwrap();
            match receiver.unsecure_frame(&frame, nwk_in()) {
                Ok(_) => accepted.push(frame),
                Err(err) => {
                    prop_assert_eq!(err, Error::Auth(AuthError::ReplayTableFull { capacity: 2 }));
                }
            }
            // any frame accepted so far stays refused
            if !accepted.is_empty() {
                let old = &accepted[replay_pick.index(accepted.len())];
                prop_assert!(matches!(
                    receiver.unsecure_frame(old, nwk_in()).unwrap_err(),
                    Error::Auth(AuthError::ReplayedCounter { .. })
                ), "expected ReplayedCounter");
            }
        }
        for old in &accepted {
            prop_assert!(matches!(
                receiver.unsecure_frame(old, nwk_in()).unwrap_err(),
                Error::Auth(AuthError::ReplayedCounter { .. })
            ), "expected ReplayedCounter");
        }
    }
}

#[test]
fn link_frames_stay_rejected_after_receiver_reboot() {
    let mut config = SecurityConfig::default();
    config.store.counter_stride = 4;
    let (mut a, _) = device(A, 3, config.clone());
    let (mut b, b_log) = device(B, 4, config.clone());
    a.install_link_key(B, &LINK_KEY, &EntryAttributes::with_attribute(KeyAttribute::Verified))
        .unwrap();
    b.install_link_key(A, &LINK_KEY, &EntryAttributes::with_attribute(KeyAttribute::Verified))
        .unwrap();

    let send = |a: &mut SecurityContext| {
        a.secure_frame(FrameLayer::Aps, &APS_HEADER, b"cmd", KeySelector::Link(B))
            .unwrap()
    };
    let sent: Vec<Vec<u8>> = (0..3).map(|_| send(&mut a)).collect();
    for frame in &sent {
        b.unsecure_frame(frame, aps_from(A)).unwrap();
    }
    assert_eq!(
        b.store().lookup(A, KeyFilter::Any).unwrap().frame_counter_in_highwater,
        Some(2)
    );
    drop(b);

    let mut b = SecurityContext::new(B, config, Box::new(b_log.reboot())).unwrap();
    for (counter, frame) in sent.iter().enumerate() {
        assert_eq!(
            b.unsecure_frame(frame, aps_from(A)).unwrap_err(),
            Error::Auth(AuthError::ReplayedCounter {
                counter: counter as u32,
                last_accepted: 4
            })
        );
    }
    // counters inside the persisted stride are given up, later ones pass
    let within = send(&mut a);
    assert!(b.unsecure_frame(&within, aps_from(A)).is_err());
    send(&mut a);
    let beyond = send(&mut a);
    assert_eq!(b.unsecure_frame(&beyond, aps_from(A)).unwrap().frame_counter, 5);
}

#[test]
fn network_key_switch_resumes_each_key_counter() {
    let (mut a, _) = device(A, 5, SecurityConfig::default());
    let (mut b, _) = device(B, 6, SecurityConfig::default());
    for ctx in [&mut a, &mut b] {
        ctx.set_network_key(0, &[0x11; 16]).unwrap();
        ctx.set_network_key(1, &[0x22; 16]).unwrap();
    }
    let send = |a: &mut SecurityContext| {
        a.secure_frame(FrameLayer::Nwk, &NWK_HEADER, b"x", KeySelector::ActiveNetworkKey)
            .unwrap()
    };
    let first = send(&mut a);
    a.switch_network_key(0).unwrap();
    let second = send(&mut a);
    a.switch_network_key(1).unwrap();
    send(&mut a);
    a.switch_network_key(0).unwrap();
    let third = send(&mut a);

    let counters: Vec<u32> = [&first, &second, &third]
        .iter()
        .map(|frame| b.unsecure_frame(frame, nwk_in()).unwrap().frame_counter)
        .collect();
    assert_eq!(counters, [0, 1, 2]);
    assert_eq!(a.frames().outgoing_counter(), 3);
}
