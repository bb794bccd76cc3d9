//! P-256 points in affine and Jacobian coordinates

use subtle::{Choice, ConditionallySelectable, ConstantTimeEq};
use zbsec_api::{CryptoError, Result};
use zbsec_params::curves::{NIST_P256, P256_FIELD_ELEMENT_SIZE, P256_RAW_POINT_SIZE};

use crate::ec::field::{limbs_from_be, FieldParams, MontFe, LIMBS};

/// The base field prime `p`
pub struct FieldP256;

impl FieldParams for FieldP256 {
    const NAME: &'static str = "P-256 field";
    const MODULUS: [u64; LIMBS] = limbs_from_be(&NIST_P256.p);
}

/// Element of the P-256 base field
pub type FieldElement = MontFe<FieldP256>;

fn curve_b() -> FieldElement {
    FieldElement::from_be_bytes_reduced(&NIST_P256.b)
}

/// Affine point other than the point at infinity
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AffinePoint {
    x: FieldElement,
    y: FieldElement,
}

impl AffinePoint {
    /// The standard generator `G`
    pub fn generator() -> Self {
        AffinePoint {
            x: FieldElement::from_be_bytes_reduced(&NIST_P256.g_x),
            y: FieldElement::from_be_bytes_reduced(&NIST_P256.g_y),
        }
    }

    /// `y^2 == x^3 - 3x + b`
    pub fn is_on_curve(&self) -> bool {
        let x3 = self.x.square().mul(&self.x);
        let three_x = self.x.double().add(&self.x);
        let rhs = x3.sub(&three_x).add(&curve_b());
        self.y.square().ct_eq(&rhs).into()
    }

    /// Parse and validate a raw `x || y` point
    ///
    /// Both coordinates must be canonical field elements and the point must
    /// satisfy the curve equation. The cofactor is 1, so every such point
    /// lies in the prime-order group.
    pub fn from_raw(raw: &[u8; P256_RAW_POINT_SIZE]) -> Result<Self> {
        let mut xb = [0u8; P256_FIELD_ELEMENT_SIZE];
        let mut yb = [0u8; P256_FIELD_ELEMENT_SIZE];
        xb.copy_from_slice(&raw[..P256_FIELD_ELEMENT_SIZE]);
        yb.copy_from_slice(&raw[P256_FIELD_ELEMENT_SIZE..]);
        let x = FieldElement::from_be_bytes(&xb).ok_or(CryptoError::InvalidPeerKey)?;
        let y = FieldElement::from_be_bytes(&yb).ok_or(CryptoError::InvalidPeerKey)?;
        let point = AffinePoint { x, y };
        if !point.is_on_curve() {
            return Err(CryptoError::InvalidPeerKey.into());
        }
        Ok(point)
    }

    /// Raw `x || y` encoding
    pub fn to_raw(&self) -> [u8; P256_RAW_POINT_SIZE] {
        let mut out = [0u8; P256_RAW_POINT_SIZE];
        out[..P256_FIELD_ELEMENT_SIZE].copy_from_slice(&self.x.to_be_bytes());
        out[P256_FIELD_ELEMENT_SIZE..].copy_from_slice(&self.y.to_be_bytes());
        out
    }

    /// Big-endian x-coordinate
    pub fn x_bytes(&self) -> [u8; P256_FIELD_ELEMENT_SIZE] {
        self.x.to_be_bytes()
    }

    /// x-coordinate as a field element
    pub fn x(&self) -> FieldElement {
        self.x
    }
}

/// Jacobian point `(X : Y : Z)` with `x = X/Z^2`, `y = Y/Z^3`; `Z = 0` is
/// the point at infinity
#[derive(Clone, Copy, Debug)]
pub struct ProjectivePoint {
    x: FieldElement,
    y: FieldElement,
    z: FieldElement,
}

impl ConditionallySelectable for ProjectivePoint {
    fn conditional_select(a: &Self, b: &Self, choice: Choice) -> Self {
        ProjectivePoint {
            x: FieldElement::conditional_select(&a.x, &b.x, choice),
            y: FieldElement::conditional_select(&a.y, &b.y, choice),
            z: FieldElement::conditional_select(&a.z, &b.z, choice),
        }
    }
}

impl From<AffinePoint> for ProjectivePoint {
    fn from(p: AffinePoint) -> Self {
        ProjectivePoint {
            x: p.x,
            y: p.y,
            z: FieldElement::one(),
        }
    }
}

impl ProjectivePoint {
    /// Point at infinity
    pub fn identity() -> Self {
        ProjectivePoint {
            x: FieldElement::one(),
            y: FieldElement::one(),
            z: FieldElement::zero(),
        }
    }

    /// True for the point at infinity
    pub fn is_identity(&self) -> Choice {
        self.z.is_zero()
    }

    /// Back to affine coordinates; `None` for the point at infinity
    pub fn to_affine(&self) -> Option<AffinePoint> {
        if bool::from(self.is_identity()) {
            return None;
        }
        let z_inv = self.z.invert();
        let z_inv2 = z_inv.square();
        let z_inv3 = z_inv2.mul(&z_inv);
        Some(AffinePoint {
            x: self.x.mul(&z_inv2),
            y: self.y.mul(&z_inv3),
        })
    }

    /// Point doubling, "dbl-2001-b" for `a = -3`
    pub fn double(&self) -> Self {
        let delta = self.z.square();
        let gamma = self.y.square();
        let beta = self.x.mul(&gamma);
        let t = self.x.sub(&delta).mul(&self.x.add(&delta));
        let alpha = t.double().add(&t);
        let beta4 = beta.double().double();
        let x3 = alpha.square().sub(&beta4.double());
        let z3 = self.y.add(&self.z).square().sub(&gamma).sub(&delta);
        let gamma2_8 = gamma.square().double().double().double();
        let y3 = alpha.mul(&beta4.sub(&x3)).sub(&gamma2_8);
        ProjectivePoint {
            x: x3,
            y: y3,
            z: z3,
        }
    }

    /// Point addition, "add-2007-bl", with the exceptional cases (either
    /// input at infinity, equal or opposite inputs) resolved by selection
    pub fn add(&self, other: &Self) -> Self {
        let z1z1 = self.z.square();
        let z2z2 = other.z.square();
        let u1 = self.x.mul(&z2z2);
        let u2 = other.x.mul(&z1z1);
        let s1 = self.y.mul(&other.z).mul(&z2z2);
        let s2 = other.y.mul(&self.z).mul(&z1z1);
        let h = u2.sub(&u1);
        let i = h.double().square();
        let j = h.mul(&i);
        let r = s2.sub(&s1).double();
        let v = u1.mul(&i);
        let x3 = r.square().sub(&j).sub(&v.double());
        let y3 = r.mul(&v.sub(&x3)).sub(&s1.mul(&j).double());
        let z3 = self.z.add(&other.z).square().sub(&z1z1).sub(&z2z2).mul(&h);
        let generic = ProjectivePoint {
            x: x3,
            y: y3,
            z: z3,
        };

        let h_zero = h.is_zero();
        let r_zero = r.is_zero();
        let mut out = generic;
        out = Self::conditional_select(&out, &self.double(), h_zero & r_zero);
        out = Self::conditional_select(&out, &Self::identity(), h_zero & !r_zero);
        out = Self::conditional_select(&out, other, self.is_identity());
        out = Self::conditional_select(&out, self, other.is_identity());
        out
    }

    /// `k * self` for a big-endian scalar encoding, double-and-add-always
    pub fn mul_bytes(&self, scalar: &[u8]) -> Self {
        let mut acc = Self::identity();
        for byte in scalar {
            for bit in (0..8).rev() {
                acc = acc.double();
                let sum = acc.add(self);
                acc = Self::conditional_select(&acc, &sum, Choice::from((byte >> bit) & 1));
            }
        }
        acc
    }
}
