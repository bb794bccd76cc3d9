//! Errors raised while assembling a [`SecurityContext`](crate::SecurityContext)

use thiserror::Error;

/// Setup failures: configuration loading, validation and store restore
#[derive(Debug, Error)]
pub enum SetupError {
    /// Configuration file could not be read
    #[error("cannot read configuration: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration is not valid TOML for [`SecurityConfig`](crate::SecurityConfig)
    #[error("cannot parse configuration: {0}")]
    Parse(#[from] toml::de::Error),

    /// A value is out of range
    #[error("invalid `{field}`: {reason}")]
    Invalid {
        /// Dotted path of the setting
        field: &'static str,
        /// What is wrong with it
        reason: &'static str,
    },

    /// A name does not match any known method, secret or policy
    #[error("unknown `{field}` value {value:?}")]
    UnknownName {
        /// Dotted path of the setting
        field: &'static str,
        /// Offending value
        value: String,
    },

    /// The security core refused to start, e.g. a corrupt persisted record
    #[error(transparent)]
    Security(#[from] zbsec_api::Error),
}

/// Result of setup operations
pub type SetupResult<T> = core::result::Result<T, SetupError>;
