//! X25519 (RFC 7748) and Curve25519 point validation
//!
//! Points are u-coordinates in 32 little-endian bytes. The ladder works on
//! projective `(X : Z)` pairs, with `Z = 0` standing for the point at
//! infinity, which is what the subgroup and cofactor checks rely on.

use subtle::{Choice, ConditionallySelectable};
use zbsec_params::curves::{
    CURVE25519_A, CURVE25519_A24, CURVE25519_BASE_U, CURVE25519_L, CURVE25519_P, CURVE25519_SIZE,
};
use zeroize::Zeroize;

use crate::ec::field::{limbs_from_be, FieldParams, MontFe, LIMBS};

/// The field prime `2^255 - 19`
pub struct Field25519;

impl FieldParams for Field25519 {
    const NAME: &'static str = "Curve25519 field";
    const MODULUS: [u64; LIMBS] = limbs_from_be(&CURVE25519_P);
}

type Fe = MontFe<Field25519>;

/// Scalar clamping: clear the three low bits and bit 255, set bit 254
pub fn clamp(scalar: &[u8; CURVE25519_SIZE]) -> [u8; CURVE25519_SIZE] {
    let mut k = *scalar;
    k[0] &= 248;
    k[31] &= 127;
    k[31] |= 64;
    k
}

/// Standard base point `u = 9`
pub fn base_point() -> [u8; CURVE25519_SIZE] {
    let mut u = [0u8; CURVE25519_SIZE];
    u[0] = CURVE25519_BASE_U as u8;
    u
}

fn decode_u(u: &[u8; CURVE25519_SIZE]) -> Fe {
    let mut masked = *u;
    masked[31] &= 0x7f;
    Fe::from_le_bytes_reduced(&masked)
}

/// Montgomery ladder over all 255 bits of a little-endian scalar
fn ladder(k: &[u8; CURVE25519_SIZE], x1: &Fe) -> (Fe, Fe) {
    let a24 = Fe::from_u64(CURVE25519_A24);
    let mut x2 = Fe::one();
    let mut z2 = Fe::zero();
    let mut x3 = *x1;
    let mut z3 = Fe::one();
    let mut swap = Choice::from(0u8);

    for t in (0..255).rev() {
        let k_t = Choice::from((k[t / 8] >> (t % 8)) & 1);
        swap ^= k_t;
        Fe::conditional_swap(&mut x2, &mut x3, swap);
        Fe::conditional_swap(&mut z2, &mut z3, swap);
        swap = k_t;

        let a = x2.add(&z2);
        let aa = a.square();
        let b = x2.sub(&z2);
        let bb = b.square();
        let e = aa.sub(&bb);
        let c = x3.add(&z3);
        let d = x3.sub(&z3);
        let da = d.mul(&a);
        let cb = c.mul(&b);
        x3 = da.add(&cb).square();
        z3 = x1.mul(&da.sub(&cb).square());
        x2 = aa.mul(&bb);
        z2 = e.mul(&aa.add(&a24.mul(&e)));
    }
    Fe::conditional_swap(&mut x2, &mut x3, swap);
    Fe::conditional_swap(&mut z2, &mut z3, swap);
    x3.zeroize();
    z3.zeroize();
    (x2, z2)
}

/// The X25519 function: clamps `scalar`, masks the top bit of `u`
pub fn x25519(scalar: &[u8; CURVE25519_SIZE], u: &[u8; CURVE25519_SIZE]) -> [u8; CURVE25519_SIZE] {
    let mut k = clamp(scalar);
    let (x2, z2) = ladder(&k, &decode_u(u));
    k.zeroize();
    x2.mul(&z2.invert()).to_le_bytes()
}

/// Canonical encoding: top bit clear and value below `p`
fn decode_canonical(u: &[u8; CURVE25519_SIZE]) -> Option<Fe> {
    if u[31] & 0x80 != 0 {
        return None;
    }
    let mut be = *u;
    be.reverse();
    Fe::from_be_bytes(&be)
}

/// `u^3 + A u^2 + u` is a square, i.e. the point is on the curve rather
/// than on its quadratic twist
fn on_curve(u: &Fe) -> bool {
    let a = Fe::from_u64(CURVE25519_A);
    let u2 = u.square();
    let rhs = u2.mul(u).add(&a.mul(&u2)).add(u);
    rhs.is_square().into()
}

/// `[k]P` is the point at infinity, for an unclamped little-endian `k`
fn mul_is_identity(k: &[u8; CURVE25519_SIZE], u: &Fe) -> bool {
    let (_, z) = ladder(k, u);
    z.is_zero().into()
}

fn order_le() -> [u8; CURVE25519_SIZE] {
    let mut l = CURVE25519_L;
    l.reverse();
    l
}

/// Full public-key validation
///
/// Rejects non-canonical encodings, `u = 0`, points on the twist and points
/// outside the prime-order subgroup.
pub fn validate_public_key(u: &[u8; CURVE25519_SIZE]) -> bool {
    let Some(fe) = decode_canonical(u) else {
        return false;
    };
    if bool::from(fe.is_zero()) || !on_curve(&fe) {
        return false;
    }
    mul_is_identity(&order_le(), &fe)
}

/// Whether `u` can serve as a generator: canonical, non-zero, on the curve
/// and with `[8]P` not at infinity
pub fn is_usable_base_point(u: &[u8; CURVE25519_SIZE]) -> bool {
    let Some(fe) = decode_canonical(u) else {
        return false;
    };
    if bool::from(fe.is_zero()) || !on_curve(&fe) {
        return false;
    }
    let mut eight = [0u8; CURVE25519_SIZE];
    eight[0] = 8;
    !mul_is_identity(&eight, &fe)
}
