//! Constant-time comparisons

use subtle::{Choice, ConditionallySelectable, ConstantTimeEq};

/// Compare two byte strings without data-dependent early exit
///
/// Lengths are public, so a length mismatch returns immediately.
pub fn ct_eq<A, B>(a: A, b: B) -> bool
where
    A: AsRef<[u8]>,
    B: AsRef<[u8]>,
{
    let a = a.as_ref();
    let b = b.as_ref();
    if a.len() != b.len() {
        return false;
    }
    a.ct_eq(b).into()
}

/// True when every byte is zero, evaluated over the whole slice
pub fn ct_is_zero(bytes: &[u8]) -> bool {
    let acc = bytes.iter().fold(0u8, |acc, &b| acc | b);
    acc.ct_eq(&0u8).into()
}

/// Copy `src` into `dst` when `condition` is set, otherwise leave `dst`
///
/// Both slices must have the same length; extra bytes are ignored.
pub fn ct_select_bytes(dst: &mut [u8], src: &[u8], condition: bool) {
    let choice = Choice::from(condition as u8);
    for (d, s) in dst.iter_mut().zip(src.iter()) {
        *d = u8::conditional_select(d, s, choice);
    }
}
