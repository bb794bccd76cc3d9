//! HKDF with HMAC-SHA-256 (RFC 5869)
//!
//! The `_with` variants take the HMAC as a closure so the engine can run
//! them on its configured backend.

use zbsec_api::Result;
use zbsec_params::utils::hash::SHA256_OUTPUT_SIZE;
use zeroize::{Zeroize, Zeroizing};

use crate::error::validate;
use crate::mac::hmac_sha256;

/// Longest output `expand` can produce, `255 * HashLen`
pub const HKDF_MAX_OUTPUT: usize = 255 * SHA256_OUTPUT_SIZE;

/// `HKDF-Extract(salt, ikm)`; an empty salt means `HashLen` zero bytes
pub fn hkdf_extract_with<F>(mut hmac: F, salt: &[u8], ikm: &[u8]) -> Result<[u8; SHA256_OUTPUT_SIZE]>
where
    F: FnMut(&[u8], &[u8]) -> Result<[u8; SHA256_OUTPUT_SIZE]>,
{
    if salt.is_empty() {
        hmac(&[0u8; SHA256_OUTPUT_SIZE], ikm)
    } else {
        hmac(salt, ikm)
    }
}

/// `HKDF-Expand(prk, info, length)`
pub fn hkdf_expand_with<F>(
    mut hmac: F,
    prk: &[u8],
    info: &[u8],
    length: usize,
) -> Result<Zeroizing<Vec<u8>>>
where
    F: FnMut(&[u8], &[u8]) -> Result<[u8; SHA256_OUTPUT_SIZE]>,
{
    validate::max_length("HKDF output", length, HKDF_MAX_OUTPUT)?;
    validate::min_length("HKDF PRK", prk.len(), SHA256_OUTPUT_SIZE)?;

    let mut okm = Zeroizing::new(Vec::with_capacity(length));
    let mut previous = [0u8; SHA256_OUTPUT_SIZE];
    let mut has_previous = false;
    let mut block_input = Zeroizing::new(Vec::with_capacity(SHA256_OUTPUT_SIZE + info.len() + 1));
    let mut counter = 1u8;

    while okm.len() < length {
        block_input.clear();
        if has_previous {
            block_input.extend_from_slice(&previous);
        }
        block_input.extend_from_slice(info);
        block_input.push(counter);

        previous = hmac(prk, &block_input)?;
        has_previous = true;
        let take = core::cmp::min(SHA256_OUTPUT_SIZE, length - okm.len());
        okm.extend_from_slice(&previous[..take]);
        counter = counter.wrapping_add(1);
    }
    previous.zeroize();
    Ok(okm)
}

/// Software HKDF-Extract
pub fn hkdf_extract(salt: &[u8], ikm: &[u8]) -> Result<[u8; SHA256_OUTPUT_SIZE]> {
    hkdf_extract_with(|k, m| Ok(hmac_sha256(k, m)), salt, ikm)
}

/// Software HKDF-Expand
pub fn hkdf_expand(prk: &[u8], info: &[u8], length: usize) -> Result<Zeroizing<Vec<u8>>> {
    hkdf_expand_with(|k, m| Ok(hmac_sha256(k, m)), prk, info, length)
}
