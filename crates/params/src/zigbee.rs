//! Fixed values from the Zigbee security clauses

/// Default global trust center link key, "ZigBeeAlliance09"
pub const DEFAULT_TC_LINK_KEY: [u8; 16] = *b"ZigBeeAlliance09";

/// Well-known secret for anonymous (unauthenticated) dynamic link key
/// negotiation, "ZigBeeAlliance18"
pub const WELL_KNOWN_DLK_SECRET: [u8; 16] = *b"ZigBeeAlliance18";

/// Keyed-hash input deriving the key-transport key from a link key
pub const KEY_TRANSPORT_HASH_INPUT: u8 = 0x00;

/// Keyed-hash input deriving the key-load key from a link key
pub const KEY_LOAD_HASH_INPUT: u8 = 0x02;

/// Inner padding of the keyed hash (FIPS 198)
pub const KEYED_HASH_IPAD: u8 = 0x36;

/// Outer padding of the keyed hash (FIPS 198)
pub const KEYED_HASH_OPAD: u8 = 0x5C;

/// Security level applied to NWK frames (ENC-MIC-32)
pub const DEFAULT_NWK_SECURITY_LEVEL: u8 = 5;

/// Size of a key confirmation MAC preamble
pub const MAC_PREAMBLE_SIZE: usize = 6;

/// Preamble of the tag produced by the negotiation initiator
pub const MAC_PREAMBLE_INITIATOR: [u8; MAC_PREAMBLE_SIZE] = *b"KC_2_U";

/// Preamble of the tag produced by the negotiation responder
pub const MAC_PREAMBLE_RESPONDER: [u8; MAC_PREAMBLE_SIZE] = *b"KC_2_V";

/// Size of a derived link key
pub const DERIVED_KEY_SIZE: usize = 16;

/// Size of an ECDH shared secret on both supported curves
pub const SHARED_SECRET_SIZE: usize = 32;

/// Info string of the HKDF expansion producing the dynamic link key
pub const DLK_KDF_INFO: &[u8] = b"ZigbeeDLK";

/// Valid install code lengths in bytes, CRC included
pub const INSTALL_CODE_LENGTHS: [usize; 4] = [8, 10, 14, 18];
