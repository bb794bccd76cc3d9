//! Dynamic link key negotiation for the zbsec security core
//!
//! Two devices agree on a fresh APS link key with an ephemeral
//! Diffie-Hellman exchange bound to a pre-shared secret: SPEKE over
//! Curve25519 (with SHA-256 or AES-MMO-128) or ECDHE over P-256. Both sides
//! prove possession of the derived key with a confirmation tag before it is
//! committed to the [`KeyPairStore`](zbsec_store::KeyPairStore) as a
//! provisional key.
//!
//! [`DlkManager`] drives one negotiation per peer. Time is injected as a
//! millisecond clock so that timeouts are deterministic under test, and the
//! key agreement step can be deferred to [`DlkManager::run_pending`] on
//! devices that must not block the receive path.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod context;
pub mod derive;
pub mod message;
pub mod method;
mod session;

pub use context::{DlkState, NegotiationContext, Role};
pub use message::DlkMessage;
pub use method::{KeyNegotiationMethod, MethodSet, PresharedSecret, SecretSet, METHOD_PREFERENCE};
pub use session::{preshared_key, DlkConfig, DlkManager, DlkOutcome, EntropySource};
