//! Primitive crypto engine of the zbsec security core
//!
//! This crate provides the primitives the Zigbee security clauses build on,
//! implemented in pure Rust without table lookups indexed by secrets:
//!
//! - AES-128 and the AES-MMO-128 block-cipher hash
//! - SHA-256, HMAC-SHA-256 and HKDF
//! - the Zigbee keyed hash and install-code key derivation
//! - CCM* with 0, 4, 8 or 16 byte MICs
//! - X25519 and P-256 key agreement with full public-key validation
//! - ECQV implicit certificates and ECMQV for certificate-based key
//!   establishment
//!
//! [`SoftwareBackend`] packages the primitives behind the
//! [`zbsec_api::CryptoBackend`] trait, and [`CryptoEngine`] is the facade
//! the rest of the workspace calls.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod error;
pub use error::{validate, Error, Result};

pub mod block;
pub use block::Aes128;

pub mod hash;
pub use hash::{AesMmo, Sha256};

pub mod mac;
pub use mac::{hmac_sha256, install_code_key, keyed_hash, HmacSha256};

pub mod kdf;
pub use kdf::{hkdf_expand, hkdf_extract};

pub mod aead;
pub use aead::CcmStar;

pub mod ec;

pub mod backend;
pub use backend::SoftwareBackend;

pub mod engine;
pub use engine::{CryptoEngine, KeyPair};

pub use hash::mmo::aes_mmo_128;
