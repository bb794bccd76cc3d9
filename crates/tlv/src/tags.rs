//! Tag space
//!
//! Only the tags the security core produces or consumes carry a length
//! rule. Every other tag in range is legal and skipped by the parser.

/// Selected key negotiation method (Security Start Key Update Request)
pub const SELECTED_KEY_NEGOTIATION_METHOD: u8 = 0x00;
/// Curve25519 public point in a key negotiation request/response
pub const KEY_NEGOTIATION_CURVE25519_POINT: u8 = 0x01;
/// Requested authentication token id
pub const REQUESTED_AUTHENTICATION_TOKEN_ID: u8 = 0x02;
/// Direct join key negotiation method
pub const DIRECT_KEY_NEGOTIATION_METHOD: u8 = 0x05;
/// P-256 public point of direct key negotiation
pub const DIRECT_P256_PUBLIC_POINT: u8 = 0x06;
/// Curve25519 public point of direct key negotiation
pub const DIRECT_CURVE25519_PUBLIC_POINT: u8 = 0x07;
/// Network key sequence number
pub const NWK_KEY_SEQUENCE_NUMBER: u8 = 0x08;
/// Key confirmation tag of a P-256 negotiation
pub const MAC_TAG_P256: u8 = 0x09;
/// Key confirmation tag of a Curve25519 negotiation
pub const MAC_TAG_CURVE25519: u8 = 0x0A;
/// Device IEEE address
pub const DEVICE_EUI64: u8 = 0x13;
/// Target IEEE address
pub const TARGET_EUI64: u8 = 0x23;
/// Manufacturer specific, first global tag
pub const MANUFACTURER_SPECIFIC: u8 = 0x28;
/// Supported key negotiation methods
pub const SUPPORTED_KEY_NEGOTIATION_METHODS: u8 = 0x29;
/// 128-bit symmetric passphrase
pub const SYMMETRIC_PASSPHRASE: u8 = 0x2D;
/// Fragmentation parameters
pub const FRAGMENTATION_PARAMETERS: u8 = 0x2F;
/// Highest assigned tag
pub const TAG_MAX: u8 = 0x33;
/// Reserved sentinel, never valid on the wire
pub const RESERVED_SENTINEL: u8 = 0x34;

/// First local tag
pub const LOCAL_MIN: u8 = 0x00;
/// First global tag
pub const GLOBAL_MIN: u8 = MANUFACTURER_SPECIFIC;

/// Scope of a tag
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagClass {
    /// Meaning depends on the enclosing command
    Local,
    /// Same meaning in every command
    Global,
}

/// Classify a tag; `None` for the sentinel and everything above it
pub fn classify(tag: u8) -> Option<TagClass> {
    match tag {
        t if t > TAG_MAX => None,
        t if t >= GLOBAL_MIN => Some(TagClass::Global),
        _ => Some(TagClass::Local),
    }
}

/// Payload length constraint of a known tag
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LengthRule {
    /// Exactly this many bytes
    Exact(usize),
    /// One of the listed lengths
    OneOf(&'static [usize]),
    /// At least this many bytes
    AtLeast(usize),
    /// Any length
    Any,
}

impl LengthRule {
    /// Whether `len` satisfies the rule
    pub fn accepts(&self, len: usize) -> bool {
        match *self {
            LengthRule::Exact(n) => len == n,
            LengthRule::OneOf(lens) => lens.contains(&len),
            LengthRule::AtLeast(n) => len >= n,
            LengthRule::Any => true,
        }
    }
}

/// Length rule of a tag
pub fn length_rule(tag: u8) -> LengthRule {
    match tag {
        // EUI64, method, secret
        SELECTED_KEY_NEGOTIATION_METHOD => LengthRule::Exact(10),
        // EUI64 followed by the point
        KEY_NEGOTIATION_CURVE25519_POINT | DIRECT_CURVE25519_PUBLIC_POINT => LengthRule::Exact(40),
        DIRECT_P256_PUBLIC_POINT => LengthRule::Exact(72),
        // EUI64 followed by an AES-MMO or SHA-256 sized tag
        MAC_TAG_P256 | MAC_TAG_CURVE25519 => LengthRule::OneOf(&[24, 40]),
        REQUESTED_AUTHENTICATION_TOKEN_ID | DIRECT_KEY_NEGOTIATION_METHOD => LengthRule::Exact(1),
        NWK_KEY_SEQUENCE_NUMBER => LengthRule::Exact(1),
        DEVICE_EUI64 | TARGET_EUI64 => LengthRule::Exact(8),
        MANUFACTURER_SPECIFIC => LengthRule::AtLeast(2),
        // methods, secrets, optional source EUI64
        SUPPORTED_KEY_NEGOTIATION_METHODS => LengthRule::OneOf(&[2, 10]),
        SYMMETRIC_PASSPHRASE => LengthRule::Exact(16),
        FRAGMENTATION_PARAMETERS => LengthRule::AtLeast(2),
        _ => LengthRule::Any,
    }
}

/// Whether a buffer may carry the tag more than once
///
/// Only manufacturer-specific TLVs and tags this core does not interpret
/// may repeat.
pub fn is_repeatable(tag: u8) -> bool {
    tag == MANUFACTURER_SPECIFIC || length_rule(tag) == LengthRule::Any
}
