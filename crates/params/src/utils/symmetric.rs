//! Constants for symmetric primitives

/// AES-128 key size in bytes
pub const AES128_KEY_SIZE: usize = 16;

/// AES block size in bytes
pub const AES_BLOCK_SIZE: usize = 16;

/// CCM* nonce length used by Zigbee and IEEE 802.15.4
pub const CCM_NONCE_SIZE: usize = 13;

/// CCM* length field size `L` (15 - nonce length)
pub const CCM_LENGTH_FIELD_SIZE: usize = 2;

/// Largest CCM* message with a 2-byte length field
pub const CCM_MAX_MESSAGE_SIZE: usize = 0xFFFF;
