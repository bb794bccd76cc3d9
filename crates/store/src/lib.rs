//! Key-pair store for the zbsec security core
//!
//! A fixed-capacity table of link keys keyed by peer long address. Each
//! peer has at most one *primary* entry (provisional, verified or
//! application key) and one *unverified* entry waiting to replace it.
//!
//! Every mutation goes through a [`Persistence`] collaborator as a fixed
//! 52-byte record before the in-memory table changes, so a failed or torn
//! write is never observed as a half-updated entry.
//!
//! ```
//! use zbsec_api::IeeeAddr;
//! use zbsec_store::{EntryAttributes, KeyAttribute, KeyFilter, KeyPairStore, LogStructuredMemory};
//!
//! let mut store = KeyPairStore::new(8, Box::new(LogStructuredMemory::new()));
//! let peer = IeeeAddr::from_u64(0x0011_2233_4455_6677);
//! store
//!     .upsert(peer, &[0x42; 16], &EntryAttributes::with_attribute(KeyAttribute::Provisional))
//!     .unwrap();
//! assert_eq!(store.lookup(peer, KeyFilter::Any).unwrap().link_key(), &[0x42; 16]);
//! ```

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod entry;
pub mod persistence;
pub mod policy;
pub mod record;
mod store;

pub use entry::{
    ApsLinkKeyType, EntryAttributes, InitialJoinAuth, KeyAttribute, KeyClass, KeyPairEntry,
    KeyUpdateMethod, NegotiationState,
};
pub use persistence::{LogStructuredMemory, Persistence};
pub use policy::{policy_by_name, KeyUpdatePolicy, LegacyKeyUpdate, R22Defaults, R23Defaults};
pub use record::{Record, RECORD_SIZE};
pub use store::{ExtendedKeyUpdate, KeyFilter, KeyPairStore, DEFAULT_COUNTER_STRIDE};
