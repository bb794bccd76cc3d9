//! Integers modulo the P-256 group order

use subtle::ConstantTimeEq;
use zbsec_api::{CryptoError, Result};
use zbsec_params::curves::{NIST_P256, P256_SCALAR_SIZE};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::ec::field::{limbs_from_be, FieldParams, MontFe, LIMBS};

/// The group order `n`
pub struct OrderP256;

impl FieldParams for OrderP256 {
    const NAME: &'static str = "P-256 order";
    const MODULUS: [u64; LIMBS] = limbs_from_be(&NIST_P256.n);
}

/// P-256 scalar, wiped on drop
#[derive(Clone)]
pub struct Scalar(MontFe<OrderP256>);

impl Zeroize for Scalar {
    fn zeroize(&mut self) {
        self.0.zeroize();
    }
}

impl Drop for Scalar {
    fn drop(&mut self) {
        self.zeroize();
    }
}

impl ZeroizeOnDrop for Scalar {}

impl core::fmt::Debug for Scalar {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str("Scalar([REDACTED])")
    }
}

impl Scalar {
    /// Parse a private key: canonical big-endian value in `[1, n-1]`
    pub fn from_be_bytes(bytes: &[u8; P256_SCALAR_SIZE]) -> Result<Self> {
        let fe = MontFe::from_be_bytes(bytes).ok_or(CryptoError::InvalidPrivateKey)?;
        let scalar = Scalar(fe);
        if scalar.is_zero() {
            return Err(CryptoError::InvalidPrivateKey.into());
        }
        Ok(scalar)
    }

    /// Reduce any 256-bit big-endian integer modulo `n`; may be zero
    pub fn from_be_bytes_reduced(bytes: &[u8; P256_SCALAR_SIZE]) -> Self {
        Scalar(MontFe::from_be_bytes_reduced(bytes))
    }

    /// Reduce 64 bytes of randomness modulo `n`; may be zero
    pub fn from_wide(bytes: &[u8; 2 * P256_SCALAR_SIZE]) -> Self {
        Scalar(MontFe::from_be_bytes_wide(bytes))
    }

    /// Small integer
    pub fn from_u64(value: u64) -> Self {
        Scalar(MontFe::from_u64(value))
    }

    /// Big-endian encoding
    pub fn to_be_bytes(&self) -> [u8; P256_SCALAR_SIZE] {
        self.0.to_be_bytes()
    }

    /// True for zero
    pub fn is_zero(&self) -> bool {
        self.0.is_zero().into()
    }

    /// `self + rhs mod n`
    pub fn add(&self, rhs: &Scalar) -> Scalar {
        Scalar(self.0.add(&rhs.0))
    }

    /// `self * rhs mod n`
    pub fn mul(&self, rhs: &Scalar) -> Scalar {
        Scalar(self.0.mul(&rhs.0))
    }
}

impl PartialEq for Scalar {
    fn eq(&self, other: &Self) -> bool {
        self.0.ct_eq(&other.0).into()
    }
}

impl Eq for Scalar {}
