//! Data model of the known-answer vector file

use serde::Deserialize;

/// Every vector of one file
#[derive(Debug, Deserialize)]
pub struct VectorFile {
    /// `[[vector]]` tables in file order
    #[serde(rename = "vector")]
    pub vectors: Vec<Vector>,
}

/// One known-answer vector; byte strings are hex
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum Vector {
    /// Single-block AES-128 encryption
    Aes128 {
        source: String,
        key: String,
        plaintext: String,
        ciphertext: String,
    },
    /// SHA-256 digest
    Sha256 {
        source: String,
        message: String,
        digest: String,
    },
    /// HMAC-SHA-256
    HmacSha256 {
        source: String,
        key: String,
        message: String,
        mac: String,
    },
    /// HKDF-SHA-256 extract then expand
    HkdfSha256 {
        source: String,
        ikm: String,
        salt: String,
        info: String,
        prk: String,
        okm: String,
    },
    /// CCM* with a 13-byte nonce
    Ccm {
        source: String,
        key: String,
        nonce: String,
        aad: String,
        plaintext: String,
        mic: usize,
        output: String,
    },
    /// X25519 scalar multiplication
    X25519 {
        source: String,
        scalar: String,
        u: String,
        output: String,
    },
    /// Link key from an install code with its CRC
    InstallCode {
        source: String,
        code: String,
        key: String,
    },
    /// Zigbee keyed hash over one input byte
    KeyedHash {
        source: String,
        key: String,
        input: u8,
        output: String,
    },
}

impl Vector {
    /// Where the vector comes from
    pub fn source(&self) -> &str {
        match self {
            Vector::Aes128 { source, .. }
            | Vector::Sha256 { source, .. }
            | Vector::HmacSha256 { source, .. }
            | Vector::HkdfSha256 { source, .. }
            | Vector::Ccm { source, .. }
            | Vector::X25519 { source, .. }
            | Vector::InstallCode { source, .. }
            | Vector::KeyedHash { source, .. } => source,
        }
    }
}
