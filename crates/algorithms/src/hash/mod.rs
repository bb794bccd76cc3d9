//! Hash functions
//!
//! SHA-256 backs the SHA-256 key negotiation suites and HMAC/HKDF; AES-MMO
//! is the Zigbee block-cipher hash used for install codes, the keyed hash
//! and the AES-MMO negotiation suite.

pub mod mmo;
pub mod sha256;

pub use mmo::AesMmo;
pub use sha256::Sha256;
