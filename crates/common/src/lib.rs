//! Common implementations shared by the zbsec crates
//!
//! Secret material (link keys, ephemeral scalars, intermediate hash state)
//! lives in the containers defined here so that it is wiped when dropped,
//! and comparisons of secret-dependent values go through the constant-time
//! helpers.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod security;

pub use security::{ct_eq, ct_is_zero, EphemeralSecret, SecretBuffer, ZeroizeGuard};
