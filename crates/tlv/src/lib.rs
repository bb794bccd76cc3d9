//! TLV codec for Zigbee commissioning and key negotiation messages
//!
//! Every TLV is a one-byte tag, a one-byte length and `length` payload
//! bytes. Tags `0x00..=0x27` are local to the command carrying them, tags
//! `0x28..=0x33` are global, and `0x34` is the reserved sentinel also used
//! to report "not found".
//!
//! A received buffer must pass [`general_processing`] before any TLV in it
//! is acted upon; a single malformed element rejects the whole buffer.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod codec;
pub mod payload;
pub mod tags;
pub mod validate;

pub use codec::{find_tlv, write_tlv, TlvCursor, TlvView, TLV_HEADER_SIZE, TLV_MAX_PAYLOAD};
pub use payload::{
    DeviceEui64, KeyNegotiationMacTag, PublicPoint, SelectedKeyNegotiationMethod,
    SupportedKeyNegotiationMethods, SymmetricPassphrase, TlvPayload,
};
pub use tags::{LengthRule, TagClass};
pub use validate::general_processing;
