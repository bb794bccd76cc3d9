//! ECQV implicit certificates over P-256 (SEC 4)
//!
//! A certificate carries the public-key reconstruction point `P_U`; the
//! subject's public key is `Q_U = e * P_U + Q_CA` and its private key
//! `d_U = e * k_U + r mod n`, where `e` is the certificate hash reduced
//! modulo the group order.

use zbsec_api::{CryptoError, Result};
use zbsec_common::SecretBuffer;
use zbsec_params::curves::{P256_RAW_POINT_SIZE, P256_SCALAR_SIZE};
use zeroize::Zeroize;

use crate::ec::p256::{AffinePoint, ProjectivePoint, Scalar};

/// Reconstruct the subject's public key from its certificate
pub fn reconstruct_public_key(
    cert_hash: &[u8; P256_SCALAR_SIZE],
    reconstruction_point: &[u8; P256_RAW_POINT_SIZE],
    ca_public_key: &[u8; P256_RAW_POINT_SIZE],
) -> Result<[u8; P256_RAW_POINT_SIZE]> {
    let e = Scalar::from_be_bytes_reduced(cert_hash);
    let p_u = AffinePoint::from_raw(reconstruction_point)?;
    let q_ca = AffinePoint::from_raw(ca_public_key)?;
    let q_u = ProjectivePoint::from(p_u)
        .mul_bytes(&e.to_be_bytes())
        .add(&ProjectivePoint::from(q_ca));
    q_u.to_affine()
        .map(|p| p.to_raw())
        .ok_or_else(|| CryptoError::InvalidPeerKey.into())
}

/// Reconstruct the subject's private key from its request secret `k_U`
/// and the CA's private-key reconstruction data `r`
pub fn reconstruct_private_key(
    cert_hash: &[u8; P256_SCALAR_SIZE],
    request_private: &[u8; P256_SCALAR_SIZE],
    reconstruction_value: &[u8; P256_SCALAR_SIZE],
) -> Result<SecretBuffer<P256_SCALAR_SIZE>> {
    let e = Scalar::from_be_bytes_reduced(cert_hash);
    let k_u = Scalar::from_be_bytes(request_private)?;
    let r = Scalar::from_be_bytes_reduced(reconstruction_value);
    let d_u = e.mul(&k_u).add(&r);
    if d_u.is_zero() {
        return Err(CryptoError::InvalidPrivateKey.into());
    }
    let mut bytes = d_u.to_be_bytes();
    let secret = SecretBuffer::new(bytes);
    bytes.zeroize();
    Ok(secret)
}

/// Check that `private * G == public`
pub fn verify_key_pair(
    private: &[u8; P256_SCALAR_SIZE],
    public: &[u8; P256_RAW_POINT_SIZE],
) -> Result<bool> {
    let derived = crate::ec::p256::mul_base(private)?;
    Ok(zbsec_common::ct_eq(derived, public))
}
