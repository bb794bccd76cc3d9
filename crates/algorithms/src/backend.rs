//! Bundled software implementation of [`CryptoBackend`]

use zbsec_api::{CryptoBackend, Key128, MicLength, Result};

use crate::aead::CcmStar;
use crate::block::Aes128;
use crate::ec::{p256, x25519};
use crate::hash::Sha256;
use crate::mac::hmac_sha256;

/// Pure Rust backend built from this crate's primitives
#[derive(Debug, Clone, Copy, Default)]
pub struct SoftwareBackend;

impl SoftwareBackend {
    /// Create the backend
    pub fn new() -> Self {
        SoftwareBackend
    }
}

impl CryptoBackend for SoftwareBackend {
    fn name(&self) -> &'static str {
        "software"
    }

    fn aes128_encrypt_block(&self, key: &Key128, block: &mut [u8; 16]) -> Result<()> {
        Aes128::new(key).encrypt_block(block);
        Ok(())
    }

    fn aes128_decrypt_block(&self, key: &Key128, block: &mut [u8; 16]) -> Result<()> {
        Aes128::new(key).decrypt_block(block);
        Ok(())
    }

    fn sha256(&self, input: &[u8]) -> Result<[u8; 32]> {
        Ok(Sha256::digest(input))
    }

    fn hmac_sha256(&self, key: &[u8], input: &[u8]) -> Result<[u8; 32]> {
        Ok(hmac_sha256(key, input))
    }

    fn ccm_encrypt_and_authenticate(
        &self,
        key: &Key128,
        nonce: &[u8; 13],
        mic: MicLength,
        aad: &[u8],
        plaintext: &[u8],
    ) -> Result<Vec<u8>> {
        CcmStar::new(Aes128::new(key), mic).encrypt(nonce, aad, plaintext)
    }

    fn ccm_decrypt_and_authenticate(
        &self,
        key: &Key128,
        nonce: &[u8; 13],
        mic: MicLength,
        aad: &[u8],
        ciphertext_and_mic: &[u8],
    ) -> Result<Vec<u8>> {
        CcmStar::new(Aes128::new(key), mic).decrypt(nonce, aad, ciphertext_and_mic)
    }

    fn x25519(&self, scalar: &[u8; 32], u: &[u8; 32]) -> Result<[u8; 32]> {
        Ok(x25519::x25519(scalar, u))
    }

    fn p256_mul_base(&self, scalar: &[u8; 32]) -> Result<[u8; 64]> {
        p256::mul_base(scalar)
    }

    fn p256_ecdh(&self, scalar: &[u8; 32], point: &[u8; 64]) -> Result<[u8; 32]> {
        p256::ecdh(scalar, point)
    }
}
