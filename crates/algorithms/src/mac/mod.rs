//! Message authentication codes

pub mod hmac;
pub mod keyed_hash;

pub use hmac::{hmac_sha256, HmacSha256};
pub use keyed_hash::{hmac_mmo_with, install_code_key, keyed_hash};
