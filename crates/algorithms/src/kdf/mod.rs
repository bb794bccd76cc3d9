//! Key derivation functions

pub mod hkdf;

pub use hkdf::{hkdf_expand, hkdf_expand_with, hkdf_extract, hkdf_extract_with, HKDF_MAX_OUTPUT};
