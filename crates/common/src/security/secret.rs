//! Secret data types with guaranteed zeroization
//!
//! Link keys, derived keys and scalars are held in these wrappers so that
//! the bytes are wiped when the value goes out of scope, including on early
//! returns from failed negotiation steps.

use core::fmt;
use core::ops::{Deref, DerefMut};
use zbsec_api::{CryptoError, Result};
use zeroize::{Zeroize, ZeroizeOnDrop};

use super::ct::ct_eq;

/// Fixed-size secret buffer that is zeroized on drop
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SecretBuffer<const N: usize> {
    data: [u8; N],
}

impl<const N: usize> SecretBuffer<N> {
    /// Wrap existing bytes
    pub fn new(data: [u8; N]) -> Self {
        Self { data }
    }

    /// All-zero buffer
    pub fn zeroed() -> Self {
        Self { data: [0u8; N] }
    }

    /// Copy from a slice of exactly `N` bytes
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != N {
            return Err(CryptoError::InvalidKeyLength {
                expected: N,
                actual: bytes.len(),
            }
            .into());
        }
        let mut data = [0u8; N];
        data.copy_from_slice(bytes);
        Ok(Self { data })
    }

    /// Buffer length
    pub fn len(&self) -> usize {
        N
    }

    /// True only for `N == 0`
    pub fn is_empty(&self) -> bool {
        N == 0
    }

    /// Borrow the bytes
    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    /// Borrow the bytes mutably
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// Borrow as a fixed-size array
    pub fn expose(&self) -> &[u8; N] {
        &self.data
    }

    /// Constant-time equality
    pub fn ct_eq(&self, other: &Self) -> bool {
        ct_eq(self.data, other.data)
    }
}

impl<const N: usize> AsRef<[u8]> for SecretBuffer<N> {
    fn as_ref(&self) -> &[u8] {
        &self.data
    }
}

impl<const N: usize> AsMut<[u8]> for SecretBuffer<N> {
    fn as_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }
}

impl<const N: usize> From<[u8; N]> for SecretBuffer<N> {
    fn from(data: [u8; N]) -> Self {
        Self::new(data)
    }
}

impl<const N: usize> fmt::Debug for SecretBuffer<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SecretBuffer<{}>([REDACTED])", N)
    }
}

/// Wrapper that zeroizes any value when dropped
///
/// Used for intermediate values such as hash chaining state and the CCM*
/// keystream.
pub struct EphemeralSecret<T: Zeroize> {
    inner: T,
}

impl<T: Zeroize> EphemeralSecret<T> {
    /// Wrap a value
    pub fn new(value: T) -> Self {
        Self { inner: value }
    }
}

impl<T: Zeroize> Drop for EphemeralSecret<T> {
    fn drop(&mut self) {
        self.inner.zeroize();
    }
}

impl<T: Zeroize + Clone> Clone for EphemeralSecret<T> {
    fn clone(&self) -> Self {
        Self::new(self.inner.clone())
    }
}

impl<T: Zeroize + Default> Default for EphemeralSecret<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T: Zeroize> Deref for EphemeralSecret<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

impl<T: Zeroize> DerefMut for EphemeralSecret<T> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.inner
    }
}

impl<T: Zeroize> fmt::Debug for EphemeralSecret<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EphemeralSecret([REDACTED])")
    }
}

/// Guard that zeroizes a borrowed value when dropped
pub struct ZeroizeGuard<'a, T: Zeroize> {
    value: &'a mut T,
}

impl<'a, T: Zeroize> ZeroizeGuard<'a, T> {
    /// Guard `value` until the end of the scope
    pub fn new(value: &'a mut T) -> Self {
        Self { value }
    }
}

impl<T: Zeroize> Drop for ZeroizeGuard<'_, T> {
    fn drop(&mut self) {
        self.value.zeroize();
    }
}

impl<T: Zeroize> Deref for ZeroizeGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        self.value
    }
}

impl<T: Zeroize> DerefMut for ZeroizeGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.value
    }
}
