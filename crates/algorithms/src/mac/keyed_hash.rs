//! Zigbee keyed hash and install-code link keys
//!
//! The keyed hash is HMAC (FIPS 198) instantiated with AES-MMO, whose block
//! size equals the 16-byte key size, so the key is used without
//! compression. With a one-byte message it derives the key-transport
//! (`0x00`) and key-load (`0x02`) keys from a link key.

use zbsec_api::{CryptoError, Key128, Result};
use zbsec_common::ZeroizeGuard;
use zbsec_params::utils::hash::AES_MMO_OUTPUT_SIZE;
use zbsec_params::zigbee::{INSTALL_CODE_LENGTHS, KEYED_HASH_IPAD, KEYED_HASH_OPAD};
use zeroize::Zeroize;

use crate::hash::mmo::aes_mmo_128;

/// HMAC over an arbitrary AES-MMO implementation
///
/// Keys longer than one block are first hashed, as FIPS 198 requires.
pub fn hmac_mmo_with<F>(mut mmo: F, key: &[u8], message: &[u8]) -> Result<[u8; AES_MMO_OUTPUT_SIZE]>
where
    F: FnMut(&[u8]) -> Result<[u8; AES_MMO_OUTPUT_SIZE]>,
{
    let mut key_block = [0u8; AES_MMO_OUTPUT_SIZE];
    let mut k = ZeroizeGuard::new(&mut key_block);
    if key.len() > AES_MMO_OUTPUT_SIZE {
        *k = mmo(key)?;
    } else {
        k[..key.len()].copy_from_slice(key);
    }

    let mut inner = Vec::with_capacity(AES_MMO_OUTPUT_SIZE + message.len());
    inner.extend(k.iter().map(|b| b ^ KEYED_HASH_IPAD));
    inner.extend_from_slice(message);
    let inner_digest = mmo(&inner);
    inner.zeroize();
    let inner_digest = inner_digest?;

    let mut outer_block = [0u8; 2 * AES_MMO_OUTPUT_SIZE];
    let mut outer = ZeroizeGuard::new(&mut outer_block);
    for (o, b) in outer.iter_mut().zip(k.iter()) {
        *o = b ^ KEYED_HASH_OPAD;
    }
    outer[AES_MMO_OUTPUT_SIZE..].copy_from_slice(&inner_digest);
    mmo(&outer[..])
}

/// Keyed hash of a single byte under a 128-bit key, on the software AES
pub fn keyed_hash(key: &Key128, input: u8) -> Result<Key128> {
    hmac_mmo_with(aes_mmo_128, key, &[input])
}

/// Check an install code length (CRC included)
pub fn validate_install_code(code: &[u8]) -> Result<()> {
    if !INSTALL_CODE_LENGTHS.contains(&code.len()) {
        return Err(CryptoError::InvalidLength {
            context: "install code",
            expected: INSTALL_CODE_LENGTHS[INSTALL_CODE_LENGTHS.len() - 1],
            actual: code.len(),
        }
        .into());
    }
    Ok(())
}

/// Link key derived from an install code: AES-MMO of the code and its CRC
pub fn install_code_key(code: &[u8]) -> Result<Key128> {
    validate_install_code(code)?;
    aes_mmo_128(code)
}
