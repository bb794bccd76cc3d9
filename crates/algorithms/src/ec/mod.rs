//! Elliptic curve primitives
//!
//! P-256 and Curve25519 share one Montgomery field implementation. The
//! legacy Koblitz curves of certificate-based key establishment are known
//! identifiers only.

pub mod ecmqv;
pub mod ecqv;
pub mod field;
pub mod p256;
pub mod x25519;
