//! NIST P-256 primitives
//!
//! Private keys are 32-byte big-endian scalars in `[1, n-1]`, public keys
//! travel as raw `x || y` (64 bytes) and the ECDH output is the big-endian
//! x-coordinate of the shared point.

mod point;
mod scalar;

pub use point::{AffinePoint, FieldElement, FieldP256, ProjectivePoint};
pub use scalar::{OrderP256, Scalar};

use zbsec_api::{CryptoError, Result};
use zbsec_params::curves::{P256_RAW_POINT_SIZE, P256_SCALAR_SIZE};
use zeroize::Zeroize;

/// `scalar * G`, validating the scalar first
pub fn mul_base(private: &[u8; P256_SCALAR_SIZE]) -> Result<[u8; P256_RAW_POINT_SIZE]> {
    let scalar = Scalar::from_be_bytes(private)?;
    let mut bytes = scalar.to_be_bytes();
    let point = ProjectivePoint::from(AffinePoint::generator()).mul_bytes(&bytes);
    bytes.zeroize();
    point
        .to_affine()
        .map(|p| p.to_raw())
        .ok_or_else(|| CryptoError::InvalidPrivateKey.into())
}

/// Whether `raw` is a valid P-256 public key
pub fn validate_public_key(raw: &[u8; P256_RAW_POINT_SIZE]) -> bool {
    AffinePoint::from_raw(raw).is_ok()
}

/// ECDH shared secret: x-coordinate of `private * peer`
pub fn ecdh(
    private: &[u8; P256_SCALAR_SIZE],
    peer: &[u8; P256_RAW_POINT_SIZE],
) -> Result<[u8; P256_SCALAR_SIZE]> {
    let scalar = Scalar::from_be_bytes(private)?;
    let peer = AffinePoint::from_raw(peer)?;
    let mut bytes = scalar.to_be_bytes();
    let shared = ProjectivePoint::from(peer).mul_bytes(&bytes);
    bytes.zeroize();
    shared
        .to_affine()
        .map(|p| p.x_bytes())
        .ok_or_else(|| CryptoError::InvalidPeerKey.into())
}
