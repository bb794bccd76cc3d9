//! Validation utilities for cryptographic primitives

use zbsec_api::{AuthError, CryptoError, Result};

/// Validate a parameter condition
#[inline(always)]
pub fn parameter(condition: bool, context: &'static str, reason: &'static str) -> Result<()> {
    if !condition {
        return Err(CryptoError::InvalidParameter { context, reason }.into());
    }
    Ok(())
}

/// Validate an exact length
#[inline(always)]
pub fn length(context: &'static str, actual: usize, expected: usize) -> Result<()> {
    if actual != expected {
        return Err(CryptoError::InvalidLength {
            context,
            expected,
            actual,
        }
        .into());
    }
    Ok(())
}

/// Validate a minimum length
#[inline(always)]
pub fn min_length(context: &'static str, actual: usize, min: usize) -> Result<()> {
    if actual < min {
        return Err(CryptoError::InvalidLength {
            context,
            expected: min,
            actual,
        }
        .into());
    }
    Ok(())
}

/// Validate a maximum length
#[inline(always)]
pub fn max_length(context: &'static str, actual: usize, max: usize) -> Result<()> {
    if actual > max {
        return Err(CryptoError::InvalidLength {
            context,
            expected: max,
            actual,
        }
        .into());
    }
    Ok(())
}

/// Validate the length of key material
#[inline(always)]
pub fn key_length(actual: usize, expected: usize) -> Result<()> {
    if actual != expected {
        return Err(CryptoError::InvalidKeyLength { expected, actual }.into());
    }
    Ok(())
}

/// Validate an authentication tag comparison
#[inline(always)]
pub fn authentication(is_valid: bool) -> Result<()> {
    if !is_valid {
        return Err(AuthError::AuthenticationFailed.into());
    }
    Ok(())
}
