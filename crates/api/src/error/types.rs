//! Component error enums

use crate::types::CurveId;
use thiserror::Error;

/// Failures of the primitive crypto engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum CryptoError {
    /// Key or random input does not have the length the curve requires
    #[error("invalid key length: expected {expected} bytes, got {actual}")]
    InvalidKeyLength {
        /// Required length
        expected: usize,
        /// Supplied length
        actual: usize,
    },

    /// Peer public key failed range, curve or subgroup validation
    #[error("peer public key rejected")]
    InvalidPeerKey,

    /// Hash input exceeds the maximum message length of the construction
    #[error("hash input of {0} bytes exceeds the construction limit")]
    HashInputTooLarge(usize),

    /// Generic length violation
    #[error("{context}: invalid length (expected {expected}, got {actual})")]
    InvalidLength {
        /// Operation that rejected the input
        context: &'static str,
        /// Expected or maximum length
        expected: usize,
        /// Supplied length
        actual: usize,
    },

    /// Curve identifier known on the wire but not implemented
    #[error("curve {0:?} is not supported")]
    UnsupportedCurve(CurveId),

    /// Private scalar is zero or out of range
    #[error("invalid private key")]
    InvalidPrivateKey,

    /// Any other rejected argument
    #[error("{context}: {reason}")]
    InvalidParameter {
        /// Operation that rejected the input
        context: &'static str,
        /// Reason
        reason: &'static str,
    },
}

/// Failures while authenticating protected frames
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AuthError {
    /// CCM* tag did not verify
    #[error("authentication failed")]
    AuthenticationFailed,

    /// Frame counter not strictly greater than the last accepted one
    #[error("replayed frame counter {counter} (last accepted {last_accepted})")]
    ReplayedCounter {
        /// Counter carried by the frame
        counter: u32,
        /// Highest counter accepted so far for the (source, key) pair
        last_accepted: u32,
    },

    /// No key is available for the frame
    #[error("no key available to process the frame")]
    UnknownKey,

    /// Outgoing frame counter space is used up; the key must be rotated
    #[error("outgoing frame counter exhausted, key rotation required")]
    CounterExhausted,

    /// A new sender arrived while every replay slot is taken
    #[error("replay table full ({capacity} senders tracked)")]
    ReplayTableFull {
        /// Configured capacity
        capacity: usize,
    },
}

/// Failures of the dynamic link key negotiation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum NegotiationError {
    /// No key negotiation method is supported by both sides
    #[error("no common key negotiation method")]
    NoCommonMethod,

    /// Peer's confirmation tag did not match
    #[error("key confirmation mismatch")]
    ConfirmationMismatch,

    /// A negotiation step did not complete in time
    #[error("key negotiation timed out")]
    Timeout,

    /// Message does not fit the current state
    #[error("unexpected message in state {state}")]
    UnexpectedMessage {
        /// Name of the state the message arrived in
        state: &'static str,
    },

    /// A crypto step for this peer is still outstanding
    #[error("a negotiation step is still in progress")]
    StepInProgress,

    /// No negotiation context exists for the peer
    #[error("no negotiation in progress for this peer")]
    NoContext,
}

/// Failures of the key-pair store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum StoreError {
    /// All slots are occupied
    #[error("key-pair store is full ({capacity} entries)")]
    StoreFull {
        /// Configured capacity
        capacity: usize,
    },

    /// No matching entry
    #[error("key-pair entry not found")]
    NotFound,

    /// The persistence collaborator refused the write
    #[error("persistence write failed for slot {slot}")]
    Persistence {
        /// Slot being written
        slot: u16,
    },

    /// A persisted record could not be decoded
    #[error("persisted record in slot {slot} is corrupt")]
    CorruptRecord {
        /// Slot holding the record
        slot: u16,
    },
}

/// Failures while parsing wire input
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum WireError {
    /// A TLV declares more bytes than remain in the buffer
    #[error("malformed TLV 0x{tag:02x}: declared {declared} bytes, {remaining} remain")]
    MalformedTlv {
        /// Tag of the offending TLV
        tag: u8,
        /// Declared payload length
        declared: usize,
        /// Bytes actually remaining
        remaining: usize,
    },

    /// Buffer content violates the format
    #[error("invalid format: {0}")]
    InvalidFormat(&'static str),

    /// Required element is absent
    #[error("required element 0x{0:02x} not found")]
    NotFound(u8),

    /// Buffer ends before a fixed-size field
    #[error("{context}: truncated (need {needed} bytes, have {available})")]
    Truncated {
        /// Structure being parsed
        context: &'static str,
        /// Bytes required
        needed: usize,
        /// Bytes available
        available: usize,
    },
}

/// Umbrella error of the security core
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Error {
    /// Primitive crypto failure
    #[error(transparent)]
    Crypto(#[from] CryptoError),

    /// Frame authentication failure
    #[error(transparent)]
    Auth(#[from] AuthError),

    /// Key negotiation failure
    #[error(transparent)]
    Negotiation(#[from] NegotiationError),

    /// Key-pair store failure
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Wire format failure
    #[error(transparent)]
    Wire(#[from] WireError),
}
