//! Errors of the vector runner

use thiserror::Error;

/// Why a vector did not pass
#[derive(Debug, Error)]
pub enum VectorError {
    #[error("hex decode error: {0}")]
    Hex(#[from] hex::FromHexError),

    #[error("cannot parse vector file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("crypto operation failed: {0}")]
    Crypto(#[from] zbsec_api::Error),

    #[error("{field} must be {expected} bytes, got {actual}")]
    Length {
        field: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("{vector}: expected {expected}, got {actual}")]
    Mismatch {
        vector: String,
        expected: String,
        actual: String,
    },
}

pub type Result<T> = std::result::Result<T, VectorError>;
