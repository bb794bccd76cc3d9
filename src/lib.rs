//! # zbsec
//!
//! The security core of a Zigbee stack: per-peer link keys, CCM* frame
//! protection and the dynamic link key (DLK) negotiation run during
//! commissioning.
//!
//! ## Usage
//!
//! ```toml
//! [dependencies]
//! zbsec = "0.3"
//! ```
//!
//! ```no_run
//! use zbsec::prelude::*;
//! use zbsec::store::LogStructuredMemory;
//!
//! let config = SecurityConfig::from_toml_str("[frame]\nsecurity_level = 5")?;
//! let local = IeeeAddr::from_u64(0x0011_2233_4455_6677);
//! let ctx = SecurityContext::new(local, config, Box::new(LogStructuredMemory::new()))?;
//! # Ok::<(), zbsec::SetupError>(())
//! ```
//!
//! ## Features
//!
//! - `accel` (default): build the RustCrypto-backed engine so that
//!   `crypto.backend = "accelerated"` can be configured
//!
//! ## Crate Structure
//!
//! This is a facade crate that re-exports the sub-crates and ties them
//! together in [`SecurityContext`]:
//!
//! - [`zbsec-api`]: errors, identifiers and the `CryptoBackend` trait
//! - [`zbsec-algorithms`]: the crypto engine and its software backend
//! - [`zbsec-tlv`]: TLV encoding of negotiation parameters
//! - [`zbsec-store`]: the key-pair store
//! - [`zbsec-dlk`]: the key negotiation state machine
//! - [`zbsec-frame`]: the frame security codec

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub use zbsec_algorithms as algorithms;
pub use zbsec_api as api;
pub use zbsec_common as common;
pub use zbsec_dlk as dlk;
pub use zbsec_frame as frame;
pub use zbsec_params as params;
pub use zbsec_store as store;
pub use zbsec_tlv as tlv;

#[cfg(feature = "accel")]
pub use zbsec_accel as accel;

pub mod config;
mod context;
mod error;

pub use config::{Backend, SecurityConfig};
pub use context::SecurityContext;
pub use error::{SetupError, SetupResult};

/// Common imports for zbsec users
pub mod prelude {
    pub use crate::api::{Error, IeeeAddr, Key128, Result};
    pub use crate::dlk::{DlkOutcome, DlkState};
    pub use crate::frame::{FrameLayer, IncomingFrame, KeySelector};
    pub use crate::store::{EntryAttributes, KeyAttribute, Persistence};
    pub use crate::{SecurityConfig, SecurityContext, SetupError};
}
