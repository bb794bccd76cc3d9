//! Montgomery arithmetic over 256-bit prime moduli
//!
//! One implementation serves the P-256 base field, the P-256 group order
//! and the Curve25519 base field. Elements are four little-endian 64-bit
//! limbs kept in Montgomery form `a * R mod m` with `R = 2^256`; the
//! multiplication is the CIOS variant of Montgomery reduction.
//!
//! The per-modulus constants (`-m^-1 mod 2^64`, `R mod m`, `R^2 mod m`) are
//! derived at compile time from the big-endian modulus bytes.

use core::fmt;
use core::marker::PhantomData;

use subtle::{Choice, ConditionallySelectable, ConstantTimeEq};
use zeroize::Zeroize;

/// Number of 64-bit limbs
pub const LIMBS: usize = 4;

/// Convert 32 big-endian bytes into little-endian limbs
pub const fn limbs_from_be(bytes: &[u8; 32]) -> [u64; LIMBS] {
    let mut limbs = [0u64; LIMBS];
    let mut i = 0;
    while i < 32 {
        let limb = LIMBS - 1 - i / 8;
        limbs[limb] = (limbs[limb] << 8) | bytes[i] as u64;
        i += 1;
    }
    limbs
}

/// `-m0^-1 mod 2^64` by Newton iteration (each step doubles the precision)
const fn neg_inv64(m0: u64) -> u64 {
    let mut inv = 1u64;
    let mut i = 0;
    while i < 6 {
        inv = inv.wrapping_mul(2u64.wrapping_sub(m0.wrapping_mul(inv)));
        i += 1;
    }
    inv.wrapping_neg()
}

const fn geq(a: &[u64; LIMBS], b: &[u64; LIMBS]) -> bool {
    let mut i = LIMBS;
    while i > 0 {
        i -= 1;
        if a[i] != b[i] {
            return a[i] > b[i];
        }
    }
    true
}

const fn sub_no_borrow(a: &[u64; LIMBS], b: &[u64; LIMBS]) -> [u64; LIMBS] {
    let mut out = [0u64; LIMBS];
    let mut borrow = 0u64;
    let mut i = 0;
    while i < LIMBS {
        let (d1, b1) = a[i].overflowing_sub(b[i]);
        let (d2, b2) = d1.overflowing_sub(borrow);
        out[i] = d2;
        borrow = (b1 | b2) as u64;
        i += 1;
    }
    out
}

/// `2^k mod m` by repeated modular doubling
const fn pow2_mod(m: &[u64; LIMBS], k: usize) -> [u64; LIMBS] {
    let mut x = [1u64, 0, 0, 0];
    let mut n = 0;
    while n < k {
        let carry = x[LIMBS - 1] >> 63;
        let mut i = LIMBS - 1;
        while i > 0 {
            x[i] = (x[i] << 1) | (x[i - 1] >> 63);
            i -= 1;
        }
        x[0] <<= 1;
        if carry == 1 || geq(&x, m) {
            x = sub_no_borrow(&x, m);
        }
        n += 1;
    }
    x
}

/// A 256-bit odd prime modulus
pub trait FieldParams: 'static {
    /// Name used in debug output
    const NAME: &'static str;
    /// Modulus, little-endian limbs
    const MODULUS: [u64; LIMBS];
    /// `-m^-1 mod 2^64`
    const M_PRIME: u64 = neg_inv64(Self::MODULUS[0]);
    /// `R mod m`, the Montgomery form of one
    const R: [u64; LIMBS] = pow2_mod(&Self::MODULUS, 256);
    /// `R^2 mod m`
    const R2: [u64; LIMBS] = pow2_mod(&Self::MODULUS, 512);
}

/// Element of `Z/mZ` in Montgomery form
pub struct MontFe<P: FieldParams> {
    limbs: [u64; LIMBS],
    _params: PhantomData<P>,
}

impl<P: FieldParams> Clone for MontFe<P> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<P: FieldParams> Copy for MontFe<P> {}

impl<P: FieldParams> fmt::Debug for MontFe<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MontFe<{}>(..)", P::NAME)
    }
}

impl<P: FieldParams> Zeroize for MontFe<P> {
    fn zeroize(&mut self) {
        self.limbs.zeroize();
    }
}

impl<P: FieldParams> ConstantTimeEq for MontFe<P> {
    fn ct_eq(&self, other: &Self) -> Choice {
        self.limbs.iter().zip(other.limbs.iter()).fold(Choice::from(1u8), |acc, (a, b)| {
            acc & a.ct_eq(b)
        })
    }
}

impl<P: FieldParams> PartialEq for MontFe<P> {
    fn eq(&self, other: &Self) -> bool {
        self.ct_eq(other).into()
    }
}

impl<P: FieldParams> Eq for MontFe<P> {}

impl<P: FieldParams> ConditionallySelectable for MontFe<P> {
    fn conditional_select(a: &Self, b: &Self, choice: Choice) -> Self {
        let mut limbs = [0u64; LIMBS];
        for (i, limb) in limbs.iter_mut().enumerate() {
            *limb = u64::conditional_select(&a.limbs[i], &b.limbs[i], choice);
        }
        Self::from_raw(limbs)
    }
}

impl<P: FieldParams> MontFe<P> {
    const fn from_raw(limbs: [u64; LIMBS]) -> Self {
        MontFe {
            limbs,
            _params: PhantomData,
        }
    }

    /// Additive identity
    pub const fn zero() -> Self {
        Self::from_raw([0u64; LIMBS])
    }

    /// Multiplicative identity
    pub const fn one() -> Self {
        Self::from_raw(P::R)
    }

    /// Small integer constant
    pub fn from_u64(value: u64) -> Self {
        Self::to_montgomery(&[value, 0, 0, 0])
    }

    /// Any 256-bit integer, reduced modulo `m`
    fn to_montgomery(value: &[u64; LIMBS]) -> Self {
        Self::from_raw(Self::mont_mul(value, &P::R2))
    }

    /// Parse a canonical big-endian encoding; `None` when the value is not
    /// below the modulus
    pub fn from_be_bytes(bytes: &[u8; 32]) -> Option<Self> {
        let limbs = limbs_from_be(bytes);
        if geq(&limbs, &P::MODULUS) {
            return None;
        }
        Some(Self::to_montgomery(&limbs))
    }

    /// Parse big-endian bytes and reduce modulo `m`
    pub fn from_be_bytes_reduced(bytes: &[u8; 32]) -> Self {
        Self::to_montgomery(&limbs_from_be(bytes))
    }

    /// Reduce a 512-bit big-endian integer modulo `m`
    pub fn from_be_bytes_wide(bytes: &[u8; 64]) -> Self {
        let mut hi = [0u8; 32];
        let mut lo = [0u8; 32];
        hi.copy_from_slice(&bytes[..32]);
        lo.copy_from_slice(&bytes[32..]);
        // hi * 2^256 + lo: to_montgomery(hi) is hi*R, one more factor of R
        // comes from multiplying by R^2 in Montgomery form
        let hi_r = Self::from_raw(Self::mont_mul(
            &Self::to_montgomery(&limbs_from_be(&hi)).limbs,
            &P::R2,
        ));
        let lo_m = Self::to_montgomery(&limbs_from_be(&lo));
        hi.zeroize();
        lo.zeroize();
        hi_r.add(&lo_m)
    }

    /// Parse little-endian bytes and reduce modulo `m`
    pub fn from_le_bytes_reduced(bytes: &[u8; 32]) -> Self {
        let mut be = *bytes;
        be.reverse();
        let fe = Self::from_be_bytes_reduced(&be);
        be.zeroize();
        fe
    }

    /// Canonical big-endian encoding
    pub fn to_be_bytes(&self) -> [u8; 32] {
        let plain = Self::mont_mul(&self.limbs, &[1, 0, 0, 0]);
        let mut out = [0u8; 32];
        for (i, limb) in plain.iter().enumerate() {
            out[32 - 8 * (i + 1)..32 - 8 * i].copy_from_slice(&limb.to_be_bytes());
        }
        out
    }

    /// Canonical little-endian encoding
    pub fn to_le_bytes(&self) -> [u8; 32] {
        let mut out = self.to_be_bytes();
        out.reverse();
        out
    }

    /// True for zero
    pub fn is_zero(&self) -> Choice {
        self.ct_eq(&Self::zero())
    }

    /// Conditionally subtract the modulus from a value below `2m`
    fn reduce_once(limbs: &[u64; LIMBS], carry: u64) -> [u64; LIMBS] {
        let mut diff = [0u64; LIMBS];
        let mut borrow = 0u64;
        for i in 0..LIMBS {
            let (d1, b1) = limbs[i].overflowing_sub(P::MODULUS[i]);
            let (d2, b2) = d1.overflowing_sub(borrow);
            diff[i] = d2;
            borrow = (b1 | b2) as u64;
        }
        // Keep the difference unless it borrowed past the carry limb
        let use_original = Choice::from(((borrow & !carry) & 1) as u8);
        let mut out = [0u64; LIMBS];
        for i in 0..LIMBS {
            out[i] = u64::conditional_select(&diff[i], &limbs[i], use_original);
        }
        out
    }

    fn mont_mul(a: &[u64; LIMBS], b: &[u64; LIMBS]) -> [u64; LIMBS] {
        let m = &P::MODULUS;
        let mut t = [0u64; LIMBS + 2];
        for i in 0..LIMBS {
            let mut carry = 0u64;
            for j in 0..LIMBS {
                let tmp = t[j] as u128 + (a[j] as u128) * (b[i] as u128) + carry as u128;
                t[j] = tmp as u64;
                carry = (tmp >> 64) as u64;
            }
            let tmp = t[LIMBS] as u128 + carry as u128;
            t[LIMBS] = tmp as u64;
            t[LIMBS + 1] = (tmp >> 64) as u64;

            let u = t[0].wrapping_mul(P::M_PRIME);
            let tmp = t[0] as u128 + (u as u128) * (m[0] as u128);
            let mut carry = (tmp >> 64) as u64;
            for j in 1..LIMBS {
                let tmp = t[j] as u128 + (u as u128) * (m[j] as u128) + carry as u128;
                t[j - 1] = tmp as u64;
                carry = (tmp >> 64) as u64;
            }
            let tmp = t[LIMBS] as u128 + carry as u128;
            t[LIMBS - 1] = tmp as u64;
            t[LIMBS] = t[LIMBS + 1] + (tmp >> 64) as u64;
            t[LIMBS + 1] = 0;
        }
        let mut low = [0u64; LIMBS];
        low.copy_from_slice(&t[..LIMBS]);
        let out = Self::reduce_once(&low, t[LIMBS]);
        t.zeroize();
        low.zeroize();
        out
    }

    /// `self + rhs`
    pub fn add(&self, rhs: &Self) -> Self {
        let mut sum = [0u64; LIMBS];
        let mut carry = 0u64;
        for i in 0..LIMBS {
            let tmp = self.limbs[i] as u128 + rhs.limbs[i] as u128 + carry as u128;
            sum[i] = tmp as u64;
            carry = (tmp >> 64) as u64;
        }
        Self::from_raw(Self::reduce_once(&sum, carry))
    }

    /// `self - rhs`
    pub fn sub(&self, rhs: &Self) -> Self {
        let mut diff = [0u64; LIMBS];
        let mut borrow = 0u64;
        for i in 0..LIMBS {
            let (d1, b1) = self.limbs[i].overflowing_sub(rhs.limbs[i]);
            let (d2, b2) = d1.overflowing_sub(borrow);
            diff[i] = d2;
            borrow = (b1 | b2) as u64;
        }
        // Add the modulus back when the subtraction wrapped
        let mask = borrow.wrapping_neg();
        let mut carry = 0u64;
        for i in 0..LIMBS {
            let tmp = diff[i] as u128 + (P::MODULUS[i] & mask) as u128 + carry as u128;
            diff[i] = tmp as u64;
            carry = (tmp >> 64) as u64;
        }
        Self::from_raw(diff)
    }

    /// `-self`
    pub fn neg(&self) -> Self {
        Self::zero().sub(self)
    }

    /// `2 * self`
    pub fn double(&self) -> Self {
        self.add(self)
    }

    /// `self * rhs`
    pub fn mul(&self, rhs: &Self) -> Self {
        Self::from_raw(Self::mont_mul(&self.limbs, &rhs.limbs))
    }

    /// `self^2`
    pub fn square(&self) -> Self {
        self.mul(self)
    }

    /// `self^e` for a little-endian limb exponent, constant sequence of
    /// operations for a given exponent width
    pub fn pow(&self, exp: &[u64; LIMBS]) -> Self {
        let mut acc = Self::one();
        for i in (0..LIMBS).rev() {
            for bit in (0..64).rev() {
                acc = acc.square();
                let with = acc.mul(self);
                let choice = Choice::from(((exp[i] >> bit) & 1) as u8);
                acc = Self::conditional_select(&acc, &with, choice);
            }
        }
        acc
    }

    /// Multiplicative inverse by Fermat's little theorem; zero maps to zero
    pub fn invert(&self) -> Self {
        let mut exp = P::MODULUS;
        exp[0] -= 2;
        self.pow(&exp)
    }

    /// Quadratic residue test by Euler's criterion; zero counts as a square
    pub fn is_square(&self) -> Choice {
        let mut exp = sub_no_borrow(&P::MODULUS, &[1, 0, 0, 0]);
        for i in 0..LIMBS {
            exp[i] = (exp[i] >> 1) | if i + 1 < LIMBS { exp[i + 1] << 63 } else { 0 };
        }
        let legendre = self.pow(&exp);
        legendre.ct_eq(&Self::one()) | self.is_zero()
    }
}
