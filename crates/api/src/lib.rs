//! Public API types for the zbsec security core
//!
//! This crate holds the pieces every other member depends on: the error
//! taxonomy, long-address and curve identifiers, and the [`CryptoBackend`]
//! trait that lets software and accelerated crypto engines be swapped at
//! startup.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod traits;
pub mod types;

pub use error::{AuthError, CryptoError, Error, NegotiationError, Result, StoreError, WireError};
pub use traits::{CryptoBackend, MicLength};
pub use types::{CurveId, HashType, IeeeAddr, Key128, KEY_SIZE};
