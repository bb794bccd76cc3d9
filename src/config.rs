//! TOML configuration
//!
//! ```toml
//! [store]
//! capacity = 16
//! counter_stride = 1024
//! key_update_policy = "r23"
//!
//! [negotiation]
//! methods = ["curve25519-sha256", "curve25519-aes-mmo", "p256-sha256"]
//! secrets = ["authentication-token", "install-code", "well-known"]
//! step_timeout_ms = 10000
//! max_sessions = 4
//! deferred_crypto = false
//!
//! [frame]
//! security_level = 5
//! elide_security_level = true
//! replay_capacity = 64
//! network_key_slots = 3
//!
//! [crypto]
//! backend = "software"
//! ```
//!
//! Every section and key is optional; missing values take the defaults
//! shown above.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;
use zbsec_algorithms::CryptoEngine;
use zbsec_dlk::{DlkConfig, KeyNegotiationMethod, MethodSet, PresharedSecret, SecretSet};
use zbsec_frame::{FrameConfig, DEFAULT_NETWORK_KEY_SLOTS, DEFAULT_REPLAY_CAPACITY};
use zbsec_params::zigbee::DEFAULT_NWK_SECURITY_LEVEL;
use zbsec_store::{policy_by_name, DEFAULT_COUNTER_STRIDE};

use crate::error::{SetupError, SetupResult};

const METHOD_NAMES: [(&str, KeyNegotiationMethod); 3] = [
    ("curve25519-sha256", KeyNegotiationMethod::Curve25519Sha256),
    ("curve25519-aes-mmo", KeyNegotiationMethod::Curve25519AesMmo),
    ("p256-sha256", KeyNegotiationMethod::P256Sha256),
];

const SECRET_NAMES: [(&str, PresharedSecret); 6] = [
    ("authentication-token", PresharedSecret::AuthenticationToken),
    ("install-code", PresharedSecret::InstallCode),
    ("pake-passcode", PresharedSecret::PakePasscode),
    ("basic-access-key", PresharedSecret::BasicAccessKey),
    ("admin-access-key", PresharedSecret::AdminAccessKey),
    ("well-known", PresharedSecret::WellKnown),
];

fn lookup<T: Copy>(table: &[(&str, T)], field: &'static str, name: &str) -> SetupResult<T> {
    table
        .iter()
        .find(|(n, _)| *n == name)
        .map(|(_, value)| *value)
        .ok_or_else(|| SetupError::UnknownName {
            field,
            value: name.to_string(),
        })
}

/// Key-pair store settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StoreSettings {
    /// Number of entries
    pub capacity: u16,
    /// Outgoing counters reserved per persisted write
    pub counter_stride: u32,
    /// `"r22"` or `"r23"`
    pub key_update_policy: String,
}

impl Default for StoreSettings {
    fn default() -> Self {
        StoreSettings {
            capacity: 16,
            counter_stride: DEFAULT_COUNTER_STRIDE,
            key_update_policy: "r23".to_string(),
        }
    }
}

/// Dynamic link key negotiation settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct NegotiationSettings {
    /// Methods offered, by name
    pub methods: Vec<String>,
    /// Pre-shared secrets offered, by name
    pub secrets: Vec<String>,
    /// Time allowed for each step
    pub step_timeout_ms: u64,
    /// Concurrent negotiations
    pub max_sessions: usize,
    /// Defer the key agreement step to an explicit call
    pub deferred_crypto: bool,
}

impl Default for NegotiationSettings {
    fn default() -> Self {
        let dlk = DlkConfig::default();
        NegotiationSettings {
            methods: METHOD_NAMES
                .iter()
                .filter(|(_, m)| dlk.methods.contains(*m))
                .map(|(n, _)| n.to_string())
                .collect(),
            secrets: SECRET_NAMES
                .iter()
                .filter(|(_, s)| dlk.secrets.contains(*s))
                .map(|(n, _)| n.to_string())
                .collect(),
            step_timeout_ms: dlk.step_timeout_ms,
            max_sessions: dlk.max_sessions,
            deferred_crypto: dlk.deferred_crypto,
        }
    }
}

/// Frame codec settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FrameSettings {
    /// Security level of outgoing frames
    pub security_level: u8,
    /// Transmit a zero level in Zigbee auxiliary headers
    pub elide_security_level: bool,
    /// Network-key senders tracked for replay; further senders are refused
    pub replay_capacity: usize,
    /// Network keys held at once
    pub network_key_slots: usize,
}

impl Default for FrameSettings {
    fn default() -> Self {
        FrameSettings {
            security_level: DEFAULT_NWK_SECURITY_LEVEL,
            elide_security_level: true,
            replay_capacity: DEFAULT_REPLAY_CAPACITY,
            network_key_slots: DEFAULT_NETWORK_KEY_SLOTS,
        }
    }
}

/// Crypto backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Backend {
    /// Bundled software implementation
    #[default]
    Software,
    /// RustCrypto-backed implementation; needs the `accel` feature
    Accelerated,
}

/// Crypto engine settings
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CryptoSettings {
    /// Backend behind the engine
    pub backend: Backend,
}

/// Complete configuration of a [`SecurityContext`](crate::SecurityContext)
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SecurityConfig {
    /// `[store]`
    pub store: StoreSettings,
    /// `[negotiation]`
    pub negotiation: NegotiationSettings,
    /// `[frame]`
    pub frame: FrameSettings,
    /// `[crypto]`
    pub crypto: CryptoSettings,
}

impl SecurityConfig {
    /// Parse and validate a TOML document
    pub fn from_toml_str(text: &str) -> SetupResult<Self> {
        let config: SecurityConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML file
    pub fn load(path: impl AsRef<Path>) -> SetupResult<Self> {
        let path = path.as_ref();
        debug!(path = %path.display(), "loading security configuration");
        Self::from_toml_str(&std::fs::read_to_string(path)?)
    }

    /// TOML form of this configuration
    pub fn to_toml_string(&self) -> SetupResult<String> {
        toml::to_string(self).map_err(|_| SetupError::Invalid {
            field: "config",
            reason: "not representable as TOML",
        })
    }

    /// Check every setting
    pub fn validate(&self) -> SetupResult<()> {
        let invalid = |field, reason| Err(SetupError::Invalid { field, reason });
        if self.store.capacity < 2 {
            return invalid("store.capacity", "at least two entries are needed");
        }
        if self.store.counter_stride == 0 {
            return invalid("store.counter_stride", "must be at least 1");
        }
        if policy_by_name(&self.store.key_update_policy).is_none() {
            return Err(SetupError::UnknownName {
                field: "store.key_update_policy",
                value: self.store.key_update_policy.clone(),
            });
        }
        self.dlk_config()?;
        if self.negotiation.step_timeout_ms == 0 {
            return invalid("negotiation.step_timeout_ms", "must be positive");
        }
        if self.negotiation.max_sessions == 0 {
            return invalid("negotiation.max_sessions", "must be at least 1");
        }
        self.frame_config()
            .validate()
            .map_err(|_| SetupError::Invalid {
                field: "frame",
                reason: "security level must be 4 to 7 and table sizes non-zero",
            })?;
        if self.crypto.backend == Backend::Accelerated && !cfg!(feature = "accel") {
            return invalid("crypto.backend", "built without the `accel` feature");
        }
        Ok(())
    }

    /// Negotiation settings in the form the state machine takes
    pub fn dlk_config(&self) -> SetupResult<DlkConfig> {
        let methods = self
            .negotiation
            .methods
            .iter()
            .map(|name| lookup(&METHOD_NAMES, "negotiation.methods", name))
            .collect::<SetupResult<MethodSet>>()?;
        let secrets = self
            .negotiation
            .secrets
            .iter()
            .map(|name| lookup(&SECRET_NAMES, "negotiation.secrets", name))
            .collect::<SetupResult<SecretSet>>()?;
        Ok(DlkConfig {
            methods,
            secrets,
            step_timeout_ms: self.negotiation.step_timeout_ms,
            max_sessions: self.negotiation.max_sessions,
            deferred_crypto: self.negotiation.deferred_crypto,
        })
    }

    /// Frame settings in the form the codec takes
    pub fn frame_config(&self) -> FrameConfig {
        FrameConfig {
            security_level: self.frame.security_level,
            elide_security_level: self.frame.elide_security_level,
            replay_capacity: self.frame.replay_capacity,
            network_key_slots: self.frame.network_key_slots,
        }
    }

    /// Crypto engine over the configured backend
    pub fn engine(&self) -> SetupResult<CryptoEngine> {
        match self.crypto.backend {
            Backend::Software => Ok(CryptoEngine::software()),
            #[cfg(feature = "accel")]
            Backend::Accelerated => Ok(CryptoEngine::new(Box::new(
                zbsec_accel::AcceleratedBackend::new(),
            ))),
            #[cfg(not(feature = "accel"))]
            Backend::Accelerated => Err(SetupError::Invalid {
                field: "crypto.backend",
                reason: "built without the `accel` feature",
            }),
        }
    }
}
