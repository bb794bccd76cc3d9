//! Software and accelerated backends on shared vectors

use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;
use zbsec::config::Backend;
use zbsec::frame::{FrameLayer, IncomingFrame, KeySelector};
use zbsec::{SecurityConfig, SecurityContext};
use zbsec_accel::AcceleratedBackend;
use zbsec_algorithms::CryptoEngine;
use zbsec_api::{CurveId, IeeeAddr, MicLength};
use zbsec_tests::fixtures::{device, negotiate};
use zbsec_tests::vectors::{known_answers, run_all};

fn accelerated() -> CryptoEngine {
    CryptoEngine::new(Box::new(AcceleratedBackend::new()))
}

#[test]
fn software_known_answers() {
    let total = known_answers().unwrap().len();
    assert_eq!(run_all(&CryptoEngine::software()).unwrap(), total);
}

#[test]
fn accelerated_known_answers() {
    let total = known_answers().unwrap().len();
    assert_eq!(run_all(&accelerated()).unwrap(), total);
}

#[test]
fn ecdh_is_symmetric_across_backends() {
    let software = CryptoEngine::software();
    let accel = accelerated();
    let mut rng = ChaCha20Rng::seed_from_u64(0x5EED);
    for curve in [CurveId::Curve25519, CurveId::P256] {
        for _ in 0..4 {
            let alice = software.generate_key_pair(curve, &mut rng).unwrap();
            let bob = accel.generate_key_pair(curve, &mut rng).unwrap();

            let ab = software
                .ecdh_shared_secret(curve, alice.private.as_slice(), &bob.public)
                .unwrap();
            let ba = accel
                .ecdh_shared_secret(curve, bob.private.as_slice(), &alice.public)
                .unwrap();
            assert_eq!(ab.as_slice(), ba.as_slice(), "{curve:?}");

            // same inputs on the other backend
            let again = accel
                .ecdh_shared_secret(curve, alice.private.as_slice(), &bob.public)
                .unwrap();
            assert_eq!(ab.as_slice(), again.as_slice());
        }
    }
}

#[test]
fn ccm_output_matches_across_backends() {
    let software = CryptoEngine::software();
    let accel = accelerated();
    let key = [0x3Cu8; 16];
    let nonce = [0x01u8; 13];
    for level in 4..=7u8 {
        let mic = MicLength::from_security_level(level);
        for len in [0usize, 1, 15, 16, 17, 80] {
            let payload = vec![level; len];
            let aad = vec![0xA5; len / 2];
            let a = software
                .ccm_encrypt_and_authenticate(&key, &nonce, mic, &aad, &payload)
                .unwrap();
            let b = accel
                .ccm_encrypt_and_authenticate(&key, &nonce, mic, &aad, &payload)
                .unwrap();
            assert_eq!(a, b, "level {level} len {len}");
            assert_eq!(
                accel
                    .ccm_decrypt_and_authenticate(&key, &nonce, mic, &aad, &a)
                    .unwrap(),
                payload
            );
        }
    }
}

#[test]
fn devices_on_different_backends_interoperate() {
    let a_addr = IeeeAddr::from_u64(0x0000_0000_0000_00A1);
    let b_addr = IeeeAddr::from_u64(0x0000_0000_0000_00B2);
    let (mut a, _) = device(a_addr, 11, SecurityConfig::default());

    let mut config = SecurityConfig::default();
    config.crypto.backend = Backend::Accelerated;
    let mut b = SecurityContext::with_rng(
        b_addr,
        config,
        Box::new(zbsec::store::LogStructuredMemory::new()),
        Box::new(ChaCha20Rng::seed_from_u64(12)),
    )
    .unwrap();
    assert_eq!(b.engine().backend_name(), "accelerated");

    negotiate(&mut a, &mut b, 0).unwrap();
    let header = [0x21, 0x00];
    let frame = a
        .secure_frame(FrameLayer::Aps, &header, b"interop", KeySelector::Link(b_addr))
        .unwrap();
    let opened = b
        .unsecure_frame(
            &frame,
            IncomingFrame {
                layer: FrameLayer::Aps,
                header_len: header.len(),
                source: Some(a_addr),
            },
        )
        .unwrap();
    assert_eq!(opened.payload(), b"interop");
}
