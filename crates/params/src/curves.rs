//! Elliptic curve domain parameters
//!
//! Values are big-endian unless stated otherwise.

/// Domain parameters of a short Weierstrass curve `y^2 = x^3 - 3x + b`
pub struct WeierstrassParams {
    /// Field prime
    pub p: [u8; 32],
    /// Curve coefficient b
    pub b: [u8; 32],
    /// Base point x
    pub g_x: [u8; 32],
    /// Base point y
    pub g_y: [u8; 32],
    /// Group order
    pub n: [u8; 32],
    /// Cofactor
    pub h: u32,
}

/// NIST P-256 (secp256r1)
pub const NIST_P256: WeierstrassParams = WeierstrassParams {
    p: [
        0xFF, 0xFF, 0xFF, 0xFF, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
        0x00, 0x00, 0x00, 0x00, 0x00, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF,
        0xFF, 0xFF,
    ],
    b: [
        0x5A, 0xC6, 0x35, 0xD8, 0xAA, 0x3A, 0x93, 0xE7, 0xB3, 0xEB, 0xBD, 0x55, 0x76, 0x98, 0x86,
        0xBC, 0x65, 0x1D, 0x06, 0xB0, 0xCC, 0x53, 0xB0, 0xF6, 0x3B, 0xCE, 0x3C, 0x3E, 0x27, 0xD2,
        0x60, 0x4B,
    ],
    g_x: [
        0x6B, 0x17, 0xD1, 0xF2, 0xE1, 0x2C, 0x42, 0x47, 0xF8, 0xBC, 0xE6, 0xE5, 0x63, 0xA4, 0x40,
        0xF2, 0x77, 0x03, 0x7D, 0x81, 0x2D, 0xEB, 0x33, 0xA0, 0xF4, 0xA1, 0x39, 0x45, 0xD8, 0x98,
        0xC2, 0x96,
    ],
    g_y: [
        0x4F, 0xE3, 0x42, 0xE2, 0xFE, 0x1A, 0x7F, 0x9B, 0x8E, 0xE7, 0xEB, 0x4A, 0x7C, 0x0F, 0x9E,
        0x16, 0x2B, 0xCE, 0x33, 0x57, 0x6B, 0x31, 0x5E, 0xCE, 0xCB, 0xB6, 0x40, 0x68, 0x37, 0xBF,
        0x51, 0xF5,
    ],
    n: [
        0xFF, 0xFF, 0xFF, 0xFF, 0x00, 0x00, 0x00, 0x00, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF,
        0xFF, 0xBC, 0xE6, 0xFA, 0xAD, 0xA7, 0x17, 0x9E, 0x84, 0xF3, 0xB9, 0xCA, 0xC2, 0xFC, 0x63,
        0x25, 0x51,
    ],
    h: 1,
};

/// P-256 field element size in bytes
pub const P256_FIELD_ELEMENT_SIZE: usize = 32;

/// P-256 scalar size in bytes
pub const P256_SCALAR_SIZE: usize = 32;

/// P-256 raw public point `x || y`
pub const P256_RAW_POINT_SIZE: usize = 64;

/// Curve25519 field prime `2^255 - 19`, big-endian
pub const CURVE25519_P: [u8; 32] = [
    0x7F, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF,
    0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xED,
];

/// Order of the Curve25519 prime subgroup
/// `2^252 + 27742317777372353535851937790883648493`, big-endian
pub const CURVE25519_L: [u8; 32] = [
    0x10, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
    0x14, 0xDE, 0xF9, 0xDE, 0xA2, 0xF7, 0x9C, 0xD6, 0x58, 0x12, 0x63, 0x1A, 0x5C, 0xF5, 0xD3, 0xED,
];

/// Montgomery coefficient A of Curve25519
pub const CURVE25519_A: u64 = 486662;

/// `(A - 2) / 4`, the ladder constant
pub const CURVE25519_A24: u64 = 121665;

/// Standard base point u-coordinate
pub const CURVE25519_BASE_U: u64 = 9;

/// Curve25519 scalar and u-coordinate size in bytes
pub const CURVE25519_SIZE: usize = 32;
