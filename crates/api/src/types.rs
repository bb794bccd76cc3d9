//! Identifiers shared by every component of the security core

use core::fmt;

/// Size of every symmetric key handled by the core
pub const KEY_SIZE: usize = 16;

/// A 128-bit link, network or derived key
pub type Key128 = [u8; KEY_SIZE];

/// IEEE EUI-64 long address
///
/// Bytes are kept in over-the-air order (least significant byte first),
/// which is also the order used inside CCM* nonces and persisted records.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct IeeeAddr(pub [u8; 8]);

impl IeeeAddr {
    /// All-zero address, never a valid peer
    pub const ZERO: IeeeAddr = IeeeAddr([0u8; 8]);

    /// Build from the numeric form (`0x0011_2233_4455_6677`)
    pub const fn from_u64(value: u64) -> Self {
        IeeeAddr(value.to_le_bytes())
    }

    /// Numeric form of the address
    pub const fn as_u64(&self) -> u64 {
        u64::from_le_bytes(self.0)
    }

    /// Over-the-air byte order
    pub const fn to_le_bytes(&self) -> [u8; 8] {
        self.0
    }

    /// Byte order used by IEEE 802.15.4 MAC nonces
    pub const fn to_be_bytes(&self) -> [u8; 8] {
        self.as_u64().to_be_bytes()
    }

    /// Parse from over-the-air order
    pub fn from_le_slice(bytes: &[u8]) -> Option<Self> {
        let raw: [u8; 8] = bytes.get(..8)?.try_into().ok()?;
        Some(IeeeAddr(raw))
    }

    /// True for the all-zero address
    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 8]
    }
}

impl From<u64> for IeeeAddr {
    fn from(value: u64) -> Self {
        IeeeAddr::from_u64(value)
    }
}

impl fmt::Display for IeeeAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, b) in self.0.iter().rev().enumerate() {
            if i > 0 {
                f.write_str(":")?;
            }
            write!(f, "{:02x}", b)?;
        }
        Ok(())
    }
}

impl fmt::Debug for IeeeAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "IeeeAddr({})", self)
    }
}

/// Elliptic curve identifiers as carried on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum CurveId {
    /// sect163k1, legacy CBKE suite 1
    Sect163k1 = 0,
    /// sect283k1, legacy CBKE suite 2
    Sect283k1 = 1,
    /// Curve25519 (X25519)
    Curve25519 = 2,
    /// NIST P-256
    P256 = 3,
}

impl CurveId {
    /// Decode a wire identifier
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(CurveId::Sect163k1),
            1 => Some(CurveId::Sect283k1),
            2 => Some(CurveId::Curve25519),
            3 => Some(CurveId::P256),
            _ => None,
        }
    }

    /// Whether this build can perform arithmetic on the curve
    pub fn is_supported(&self) -> bool {
        matches!(self, CurveId::Curve25519 | CurveId::P256)
    }

    /// Public key length on the wire
    ///
    /// P-256 points travel as raw `x || y`, Curve25519 as the u-coordinate.
    /// Legacy Koblitz curves use compressed points.
    pub fn public_key_len(&self) -> usize {
        match self {
            CurveId::Sect163k1 => 22,
            CurveId::Sect283k1 => 37,
            CurveId::Curve25519 => 32,
            CurveId::P256 => 64,
        }
    }

    /// Private scalar length
    pub fn private_key_len(&self) -> usize {
        match self {
            CurveId::Sect163k1 => 21,
            CurveId::Sect283k1 => 36,
            CurveId::Curve25519 | CurveId::P256 => 32,
        }
    }

    /// Exact amount of randomness consumed by key generation
    ///
    /// P-256 takes 64 bytes so the reduction modulo the group order has a
    /// negligible bias.
    pub fn random_input_len(&self) -> usize {
        match self {
            CurveId::P256 => 64,
            other => other.private_key_len(),
        }
    }
}

/// Hash used by a key negotiation method
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum HashType {
    /// AES-MMO-128, 16-byte digest
    AesMmo128,
    /// SHA-256, 32-byte digest
    Sha256,
}

impl HashType {
    /// Digest length in bytes
    pub fn digest_len(&self) -> usize {
        match self {
            HashType::AesMmo128 => 16,
            HashType::Sha256 => 32,
        }
    }
}
