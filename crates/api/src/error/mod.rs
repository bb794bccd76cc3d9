//! Error taxonomy for the security core
//!
//! Every layer reports failures through one of five component enums. The
//! umbrella [`Error`] wraps them so that the outer context can propagate any
//! of them with `?` while callers can still match on the precise cause.

pub mod types;

pub use types::{AuthError, CryptoError, Error, NegotiationError, StoreError, WireError};

/// Result type used across the workspace
pub type Result<T> = core::result::Result<T, Error>;

impl Error {
    /// True when the failure came from frame or tag authentication.
    ///
    /// These are never retried with the same key material.
    pub fn is_authentication_failure(&self) -> bool {
        matches!(
            self,
            Error::Auth(AuthError::AuthenticationFailed)
                | Error::Negotiation(NegotiationError::ConfirmationMismatch)
        )
    }
}
