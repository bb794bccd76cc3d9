//! Error handling for the primitive crypto engine
//!
//! Primitives report through the shared [`zbsec_api::Error`] taxonomy; the
//! [`validate`] helpers keep the length and parameter checks uniform.

pub mod validate;

pub use zbsec_api::{CryptoError, Error, Result};
