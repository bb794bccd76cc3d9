//! Defaults of the legacy key-pair update entry point
//!
//! r22 callers only know the key type, attribute and source. The attributes
//! introduced by r23 (initial join authentication, frame counter sync,
//! passphrase) are filled in by a [`KeyUpdatePolicy`].

use crate::entry::{
    ApsLinkKeyType, EntryAttributes, InitialJoinAuth, KeyAttribute, KeyUpdateMethod,
};

/// Arguments of the legacy (r22) key-pair update
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LegacyKeyUpdate {
    /// Unique or global
    pub key_type: ApsLinkKeyType,
    /// Trust level
    pub key_attribute: KeyAttribute,
    /// How the key was obtained
    pub key_source: KeyUpdateMethod,
}

/// Fills the attributes a legacy caller cannot supply
pub trait KeyUpdatePolicy: Send + Sync {
    /// Name used in configuration and logs
    fn name(&self) -> &'static str;

    /// Complete attributes for a legacy update
    fn legacy_attributes(&self, update: &LegacyKeyUpdate) -> EntryAttributes;
}

/// r22 behaviour
///
/// No passphrase, passphrase update allowed, no frame counter sync, and
/// initial join authentication `InstallCode` for CBKE keys and
/// `NoAuthentication` otherwise.
#[derive(Debug, Clone, Copy, Default)]
pub struct R22Defaults;

impl KeyUpdatePolicy for R22Defaults {
    fn name(&self) -> &'static str {
        "r22"
    }

    fn legacy_attributes(&self, update: &LegacyKeyUpdate) -> EntryAttributes {
        let initial_join_auth = if update.key_source == KeyUpdateMethod::CertificateBased {
            InitialJoinAuth::InstallCode
        } else {
            InitialJoinAuth::NoAuthentication
        };
        EntryAttributes {
            key_attribute: Some(update.key_attribute),
            key_source: update.key_source,
            initial_join_auth,
            aps_link_key_type: update.key_type,
            aps_frame_counter_sync_supported: false,
            negotiation_capabilities: None,
            passphrase: None,
            passphrase_update_allowed: true,
        }
    }
}

/// r23 behaviour for legacy callers
///
/// Same as [`R22Defaults`], except that the initial join authentication
/// follows a negotiated key source and frame counter synchronization is
/// enabled for unique keys.
#[derive(Debug, Clone, Copy, Default)]
pub struct R23Defaults;

impl KeyUpdatePolicy for R23Defaults {
    fn name(&self) -> &'static str {
        "r23"
    }

    fn legacy_attributes(&self, update: &LegacyKeyUpdate) -> EntryAttributes {
        let mut attrs = R22Defaults.legacy_attributes(update);
        attrs.initial_join_auth = match update.key_source {
            KeyUpdateMethod::UnauthenticatedKeyNegotiation => {
                InitialJoinAuth::AnonymousKeyNegotiation
            }
            KeyUpdateMethod::AuthenticatedKeyNegotiation => {
                InitialJoinAuth::AuthenticatedKeyNegotiation
            }
            _ => attrs.initial_join_auth,
        };
        attrs.aps_frame_counter_sync_supported = update.key_type == ApsLinkKeyType::Unique;
        attrs
    }
}

/// Policy registered under `name`
pub fn policy_by_name(name: &str) -> Option<Box<dyn KeyUpdatePolicy>> {
    match name {
        "r22" => Some(Box::new(R22Defaults)),
        "r23" => Some(Box::new(R23Defaults)),
        _ => None,
    }
}
