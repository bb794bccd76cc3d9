//! Security control byte
//!
//! ```text
//!  bit  7 6 | 5         | 4 3    | 2 1 0
//!      rsvd | ext nonce | key id | level
//! ```

use zbsec_api::{MicLength, Result, WireError};

/// Key a frame is secured with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum KeyIdentifier {
    /// Link key shared with the peer, used as is
    Data = 0,
    /// Active network key
    Network = 1,
    /// Link key hashed with the key-transport input
    KeyTransport = 2,
    /// Link key hashed with the key-load input
    KeyLoad = 3,
}

impl KeyIdentifier {
    /// Identifier from the two key id bits
    pub fn from_bits(bits: u8) -> Self {
        match bits & 0x03 {
            0 => KeyIdentifier::Data,
            1 => KeyIdentifier::Network,
            2 => KeyIdentifier::KeyTransport,
            _ => KeyIdentifier::KeyLoad,
        }
    }
}

/// Decoded security control byte
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SecurityControl {
    /// Security level, 0 to 7
    pub level: u8,
    /// Key the frame is secured with
    pub key_id: KeyIdentifier,
    /// Whether the auxiliary header carries the source address
    pub extended_nonce: bool,
}

const LEVEL_MASK: u8 = 0x07;
const KEY_ID_SHIFT: u8 = 3;
const EXT_NONCE_BIT: u8 = 1 << 5;
const RESERVED_MASK: u8 = 0xC0;

impl SecurityControl {
    /// Control byte for `level` and `key_id`
    pub fn new(level: u8, key_id: KeyIdentifier, extended_nonce: bool) -> Self {
        SecurityControl {
            level: level & LEVEL_MASK,
            key_id,
            extended_nonce,
        }
    }

    /// Wire byte
    pub fn to_byte(&self) -> u8 {
        let mut byte = (self.level & LEVEL_MASK) | ((self.key_id as u8) << KEY_ID_SHIFT);
        if self.extended_nonce {
            byte |= EXT_NONCE_BIT;
        }
        byte
    }

    /// Parse a wire byte; reserved bits must be clear
    pub fn from_byte(byte: u8) -> Result<Self> {
        if byte & RESERVED_MASK != 0 {
            return Err(WireError::InvalidFormat("reserved security control bits set").into());
        }
        Ok(SecurityControl {
            level: byte & LEVEL_MASK,
            key_id: KeyIdentifier::from_bits(byte >> KEY_ID_SHIFT),
            extended_nonce: byte & EXT_NONCE_BIT != 0,
        })
    }

    /// Same control with another level
    pub fn with_level(self, level: u8) -> Self {
        SecurityControl {
            level: level & LEVEL_MASK,
            ..self
        }
    }

    /// MIC carried by frames of this level
    pub fn mic(&self) -> MicLength {
        MicLength::from_security_level(self.level)
    }

    /// Whether the payload is encrypted at this level
    pub fn is_encrypted(&self) -> bool {
        self.level & 0x04 != 0
    }
}
