//! ECMQV shared secret over P-256 (SEC 1, section 6.2), cofactor 1
//!
//! Used by certificate-based key establishment, where each side combines
//! its static (certificate) key with an ephemeral key.

use zbsec_api::{CryptoError, Result};
use zbsec_params::curves::{P256_FIELD_ELEMENT_SIZE, P256_RAW_POINT_SIZE, P256_SCALAR_SIZE};
use zeroize::Zeroize;

use crate::ec::p256::{AffinePoint, ProjectivePoint, Scalar};

/// Associate value function: `(x mod 2^128) + 2^128`
fn associate_value(point: &AffinePoint) -> Scalar {
    let x = point.x_bytes();
    let mut avf = [0u8; P256_FIELD_ELEMENT_SIZE];
    avf[15] = 0x01;
    avf[16..].copy_from_slice(&x[16..]);
    Scalar::from_be_bytes_reduced(&avf)
}

/// Our side of the MQV exchange
pub struct MqvKeys<'a> {
    /// Static private key
    pub static_private: &'a [u8; P256_SCALAR_SIZE],
    /// Ephemeral private key
    pub ephemeral_private: &'a [u8; P256_SCALAR_SIZE],
    /// Ephemeral public key
    pub ephemeral_public: &'a [u8; P256_RAW_POINT_SIZE],
}

/// Shared field element `Z = x(s * (Q2' + avf(Q2') * Q1'))`
/// with the implicit signature `s = d2 + avf(Q2) * d1`
pub fn shared_secret(
    own: &MqvKeys<'_>,
    peer_static: &[u8; P256_RAW_POINT_SIZE],
    peer_ephemeral: &[u8; P256_RAW_POINT_SIZE],
) -> Result<[u8; P256_FIELD_ELEMENT_SIZE]> {
    let d1 = Scalar::from_be_bytes(own.static_private)?;
    let d2 = Scalar::from_be_bytes(own.ephemeral_private)?;
    let q2 = AffinePoint::from_raw(own.ephemeral_public)?;
    let q1_peer = AffinePoint::from_raw(peer_static)?;
    let q2_peer = AffinePoint::from_raw(peer_ephemeral)?;

    let s = d2.add(&associate_value(&q2).mul(&d1));
    let peer_avf = associate_value(&q2_peer).to_be_bytes();
    let combined = ProjectivePoint::from(q2_peer)
        .add(&ProjectivePoint::from(q1_peer).mul_bytes(&peer_avf));

    let mut s_bytes = s.to_be_bytes();
    let shared = combined.mul_bytes(&s_bytes);
    s_bytes.zeroize();

    shared
        .to_affine()
        .map(|p| p.x_bytes())
        .ok_or_else(|| CryptoError::InvalidPeerKey.into())
}
