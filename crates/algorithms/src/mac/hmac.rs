//! HMAC-SHA-256 (RFC 2104 / FIPS 198-1)
//!
//! Keys longer than the block are hashed first. The selection between the
//! raw and the hashed key is done with a byte mask so the running time
//! depends only on the public key length.

use subtle::ConstantTimeEq;
use zbsec_common::SecretBuffer;
use zbsec_params::utils::hash::{SHA256_BLOCK_SIZE, SHA256_OUTPUT_SIZE};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::hash::Sha256;

const IPAD_BYTE: u8 = 0x36;
const OPAD_BYTE: u8 = 0x5c;

/// Streaming HMAC-SHA-256
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct HmacSha256 {
    #[zeroize(skip)]
    inner: Sha256,
    opad: SecretBuffer<SHA256_BLOCK_SIZE>,
}

impl HmacSha256 {
    /// Key the MAC
    pub fn new(key: &[u8]) -> Self {
        let hashed = Sha256::digest(key);
        let long = ((key.len() > SHA256_BLOCK_SIZE) as u8).wrapping_neg();

        let mut ipad = [0u8; SHA256_BLOCK_SIZE];
        let mut opad = [0u8; SHA256_BLOCK_SIZE];
        for i in 0..SHA256_BLOCK_SIZE {
            let raw = key.get(i).copied().unwrap_or(0);
            let compressed = hashed.get(i).copied().unwrap_or(0);
            let k = (compressed & long) | (raw & !long);
            ipad[i] = k ^ IPAD_BYTE;
            opad[i] = k ^ OPAD_BYTE;
        }

        let mut inner = Sha256::new();
        inner.update(&ipad);
        ipad.zeroize();

        let mac = HmacSha256 {
            inner,
            opad: SecretBuffer::new(opad),
        };
        opad.zeroize();
        mac
    }

    /// Absorb message bytes
    pub fn update(&mut self, data: &[u8]) -> &mut Self {
        self.inner.update(data);
        self
    }

    /// Produce the tag
    pub fn finalize(mut self) -> [u8; SHA256_OUTPUT_SIZE] {
        let inner_digest = self.inner.finalize();
        let mut outer = Sha256::new();
        outer.update(self.opad.as_slice()).update(&inner_digest);
        outer.finalize()
    }

    /// Compare against an expected tag in constant time
    pub fn verify(self, expected: &[u8]) -> bool {
        let tag = self.finalize();
        expected.len() == tag.len() && bool::from(tag[..].ct_eq(expected))
    }
}

/// One-shot HMAC-SHA-256
pub fn hmac_sha256(key: &[u8], data: &[u8]) -> [u8; SHA256_OUTPUT_SIZE] {
    let mut mac = HmacSha256::new(key);
    mac.update(data);
    mac.finalize()
}
