//! Loading `SecurityConfig` from TOML files

use zbsec::config::Backend;
use zbsec::store::LogStructuredMemory;
use zbsec::{SecurityConfig, SecurityContext, SetupError};
use zbsec_api::IeeeAddr;

const FULL: &str = r#"
[store]
capacity = 32
counter_stride = 256
key_update_policy = "r22"

[negotiation]
methods = ["curve25519-aes-mmo", "p256-sha256"]
secrets = ["install-code", "well-known"]
step_timeout_ms = 4000
max_sessions = 2
deferred_crypto = true

[frame]
security_level = 6
elide_security_level = false
replay_capacity = 128
network_key_slots = 2

[crypto]
backend = "accelerated"
"#;

fn scratch_file(name: &str, contents: &str) -> std::path::PathBuf {
    let path = std::env::temp_dir().join(format!("zbsec-{}-{name}", std::process::id()));
    std::fs::write(&path, contents).unwrap();
    path
}

#[test]
fn load_full_file() {
    let path = scratch_file("full.toml", FULL);
    let config = SecurityConfig::load(&path).unwrap();
    std::fs::remove_file(&path).ok();

    assert_eq!(config.store.capacity, 32);
    assert_eq!(config.crypto.backend, Backend::Accelerated);
    let dlk = config.dlk_config().unwrap();
    assert_eq!(dlk.step_timeout_ms, 4000);
    assert!(dlk.deferred_crypto);
    let frame = config.frame_config();
    assert_eq!(frame.security_level, 6);
    assert!(!frame.elide_security_level);

    let ctx = SecurityContext::new(
        IeeeAddr::from_u64(1),
        config,
        Box::new(LogStructuredMemory::new()),
    )
    .unwrap();
    assert_eq!(ctx.store().capacity(), 32);
    assert_eq!(ctx.store().policy_name(), "r22");
    assert_eq!(ctx.engine().backend_name(), "accelerated");
}

#[test]
fn empty_file_is_the_default() {
    let config = SecurityConfig::from_toml_str("").unwrap();
    assert_eq!(config, SecurityConfig::default());
}

#[test]
fn missing_file_is_an_io_error() {
    let path = std::env::temp_dir().join("zbsec-no-such-config.toml");
    assert!(matches!(SecurityConfig::load(path), Err(SetupError::Io(_))));
}

#[test]
fn errors_name_the_setting() {
    let err = SecurityConfig::from_toml_str("[negotiation]\nsecrets = [\"pin\"]").unwrap_err();
    assert_eq!(err.to_string(), "unknown `negotiation.secrets` value \"pin\"");
    let err = SecurityConfig::from_toml_str("[negotiation]\nmax_sessions = 0").unwrap_err();
    assert_eq!(
        err.to_string(),
        "invalid `negotiation.max_sessions`: must be at least 1"
    );
}
