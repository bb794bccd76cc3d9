//! CCM* frame security for the zbsec security core
//!
//! Builds and validates the auxiliary security header and the 13-byte
//! CCM* nonce, selects the key and runs the crypto engine over
//! `header || aux` as associated data and the payload as plaintext.
//!
//! Zigbee NWK and APS frames use little-endian nonces and may transmit an
//! elided (zero) security level that receivers replace with the
//! configured one. IEEE 802.15.4 MAC frames use the big-endian nonce and
//! always carry their level.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod codec;
pub mod control;
pub mod header;
pub mod keys;
pub mod replay;

pub use codec::{FrameConfig, FrameLayer, FrameSecurityCodec, IncomingFrame, UnsecuredFrame};
pub use control::{KeyIdentifier, SecurityControl};
pub use header::{mac_nonce, zigbee_nonce, AuxHeader, MacAuxHeader};
pub use keys::{KeySelector, NetworkKeyTable, DEFAULT_NETWORK_KEY_SLOTS};
pub use replay::{ReplayScope, ReplayTable, DEFAULT_REPLAY_CAPACITY};
