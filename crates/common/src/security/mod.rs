//! Security primitives and memory hygiene

pub mod ct;
pub mod secret;

pub use ct::{ct_eq, ct_is_zero, ct_select_bytes};
pub use secret::{EphemeralSecret, SecretBuffer, ZeroizeGuard};
