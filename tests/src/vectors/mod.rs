//! Known-answer vectors shared by every crypto backend
//!
//! The vectors live in `vectors/known_answers.toml` and are compiled into
//! the test crate, so the same file drives the software and the
//! accelerated engine.

pub mod error;
pub mod model;

use zbsec_algorithms::CryptoEngine;
use zbsec_api::MicLength;

pub use error::{Result, VectorError};
pub use model::{Vector, VectorFile};

const KNOWN_ANSWERS: &str = include_str!("../../vectors/known_answers.toml");

/// Parse the bundled vector file
pub fn known_answers() -> Result<Vec<Vector>> {
    let file: VectorFile = toml::from_str(KNOWN_ANSWERS)?;
    Ok(file.vectors)
}

fn bytes(value: &str) -> Result<Vec<u8>> {
    Ok(hex::decode(value)?)
}

fn array<const N: usize>(field: &'static str, value: &str) -> Result<[u8; N]> {
    let raw = bytes(value)?;
    let actual = raw.len();
    raw.try_into().map_err(|_| VectorError::Length {
        field,
        expected: N,
        actual,
    })
}

fn expect(vector: &Vector, expected: &str, actual: &[u8]) -> Result<()> {
    let actual = hex::encode(actual);
    if actual.eq_ignore_ascii_case(expected) {
        Ok(())
    } else {
        Err(VectorError::Mismatch {
            vector: vector.source().to_string(),
            expected: expected.to_string(),
            actual,
        })
    }
}

/// Check one vector against `engine`
pub fn run(engine: &CryptoEngine, vector: &Vector) -> Result<()> {
    match vector {
        Vector::Aes128 {
            key,
            plaintext,
            ciphertext,
            ..
        } => {
            let key = array::<16>("key", key)?;
            let block = array::<16>("plaintext", plaintext)?;
            let encrypted = engine.aes128_encrypt_block(&key, &block)?;
            expect(vector, ciphertext, &encrypted)?;
            let decrypted = engine.aes128_decrypt_block(&key, &encrypted)?;
            expect(vector, plaintext, &decrypted)
        }
        Vector::Sha256 {
            message, digest, ..
        } => expect(vector, digest, &engine.sha256(&bytes(message)?)?),
        Vector::HmacSha256 {
            key, message, mac, ..
        } => expect(
            vector,
            mac,
            &engine.hmac_sha256(&bytes(key)?, &bytes(message)?)?,
        ),
        Vector::HkdfSha256 {
            ikm,
            salt,
            info,
            prk,
            okm,
            ..
        } => {
            let extracted = engine.hkdf_extract(&bytes(salt)?, &bytes(ikm)?)?;
            expect(vector, prk, &extracted)?;
            let expected_len = okm.len() / 2;
            let expanded = engine.hkdf_expand(&extracted, &bytes(info)?, expected_len)?;
            expect(vector, okm, &expanded)
        }
        Vector::Ccm {
            key,
            nonce,
            aad,
            plaintext,
            mic,
            output,
            ..
        } => {
            let key = array::<16>("key", key)?;
            let nonce = array::<13>("nonce", nonce)?;
            let mic = MicLength::from_len(*mic)?;
            let aad = bytes(aad)?;
            let plaintext = bytes(plaintext)?;
            let sealed = engine.ccm_encrypt_and_authenticate(&key, &nonce, mic, &aad, &plaintext)?;
            expect(vector, output, &sealed)?;
            let opened = engine.ccm_decrypt_and_authenticate(&key, &nonce, mic, &aad, &sealed)?;
            expect(vector, &hex::encode(&plaintext), &opened)
        }
        Vector::X25519 {
            scalar, u, output, ..
        } => {
            let scalar = array::<32>("scalar", scalar)?;
            let u = array::<32>("u", u)?;
            expect(vector, output, &engine.backend().x25519(&scalar, &u)?)
        }
        Vector::InstallCode { code, key, .. } => {
            expect(vector, key, &engine.install_code_key(&bytes(code)?)?)
        }
        Vector::KeyedHash {
            key, input, output, ..
        } => {
            let key = array::<16>("key", key)?;
            expect(vector, output, &engine.keyed_hash(&key, *input)?)
        }
    }
}

/// Run every bundled vector; returns how many passed, or the failures
pub fn run_all(engine: &CryptoEngine) -> std::result::Result<usize, Vec<VectorError>> {
    let vectors = known_answers().map_err(|e| vec![e])?;
    let failures: Vec<VectorError> = vectors
        .iter()
        .filter_map(|v| run(engine, v).err())
        .collect();
    if failures.is_empty() {
        Ok(vectors.len())
    } else {
        Err(failures)
    }
}
