use atmosphere::config::{ConfigError, ConfigLoader};
use std::{
    env, fs,
    path::PathBuf,
    sync::{Mutex, MutexGuard, OnceLock},
};
use tempfile::TempDir;

fn env_lock() -> &'static Mutex<()> {
    static LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    LOCK.get_or_init(|| Mutex::new(()))
}

fn env_guard() -> MutexGuard<'static, ()> {
    env_lock()
        .lock()
        .unwrap_or_else(|poison| poison.into_inner())
}

const VARS: &[&str] = &[
    "ATMO_PROFILE",
    "ATMO_API_BIND_ADDR",
    "ATMO_OPERATOR_TOKEN",
    "ATMO_OPERATOR_TOKENS",
    "ATMO_IMAGE_SIZE_HEADROOM_GB",
    "ATMO_PROVISIONING_CORE_USERNAMES",
    "ATMO_PROVISIONING_RATE_LIMIT_BACKOFF_SECONDS",
];

fn clear_env() {
    for var in VARS {
        unsafe {
            env::remove_var(var);
        }
    }
}

fn write_env_file(dir: &TempDir, name: &str, contents: &str) {
    fs::write(dir.path().join(name), contents).unwrap();
}

fn loader(dir: &TempDir) -> ConfigLoader {
    ConfigLoader::with_base_dir(PathBuf::from(dir.path()))
}

#[test]
fn loads_defaults_with_operator_token() {
    let _guard = env_guard();
    clear_env();
    let temp_dir = TempDir::new().unwrap();
    write_env_file(&temp_dir, ".env", "ATMO_OPERATOR_TOKEN=local-token\n");

    let cfg = loader(&temp_dir).load().expect("config loads with defaults");

    assert_eq!(cfg.profile, "local");
    assert_eq!(cfg.api_bind_addr, "0.0.0.0:8080");
    assert_eq!(cfg.operator_tokens, vec!["local-token"]);
    assert_eq!(cfg.image_size_headroom_gb, 4);
    assert_eq!(cfg.provisioning.rate_limit_backoff_seconds, 60);
    assert_eq!(cfg.provisioning.core_usernames.len(), 6);
    clear_env();
}

#[test]
fn missing_operator_token_is_rejected() {
    let _guard = env_guard();
    clear_env();
    let temp_dir = TempDir::new().unwrap();

    let err = loader(&temp_dir).load().unwrap_err();
    assert!(matches!(err, ConfigError::MissingOperatorTokens));
}

#[test]
fn layered_env_files_apply_in_order() {
    let _guard = env_guard();
    clear_env();

    let temp_dir = TempDir::new().unwrap();
    write_env_file(&temp_dir, ".env", "ATMO_API_BIND_ADDR=127.0.0.1:3000\n");
    write_env_file(
        &temp_dir,
        ".env.staging",
        "ATMO_API_BIND_ADDR=192.168.0.10:5000\nATMO_IMAGE_SIZE_HEADROOM_GB=8\n",
    );
    write_env_file(
        &temp_dir,
        ".env.staging.local",
        "ATMO_API_BIND_ADDR=10.0.0.5:6000\n",
    );
    // Profile comes from .env.local, before the profile files load
    write_env_file(
        &temp_dir,
        ".env.local",
        "ATMO_PROFILE=staging\nATMO_API_BIND_ADDR=127.0.0.1:4000\nATMO_OPERATOR_TOKENS=a, b,\n",
    );

    let cfg = loader(&temp_dir).load().expect("config loads with layered env files");

    assert_eq!(cfg.profile, "staging");
    assert_eq!(cfg.api_bind_addr, "10.0.0.5:6000");
    assert_eq!(cfg.image_size_headroom_gb, 8);
    assert_eq!(cfg.operator_tokens, vec!["a", "b"]);
    clear_env();
}

#[test]
fn os_environment_has_highest_precedence() {
    let _guard = env_guard();
    clear_env();

    let temp_dir = TempDir::new().unwrap();
    write_env_file(
        &temp_dir,
        ".env",
        "ATMO_API_BIND_ADDR=127.0.0.1:3000\nATMO_OPERATOR_TOKEN=file-token\nATMO_PROVISIONING_CORE_USERNAMES=admin\n",
    );
    unsafe {
        env::set_var("ATMO_API_BIND_ADDR", "0.0.0.0:9090");
        env::set_var("ATMO_PROVISIONING_CORE_USERNAMES", "admin, mlent");
    }

    let cfg = loader(&temp_dir).load().expect("config loads with env override");
    assert_eq!(cfg.api_bind_addr, "0.0.0.0:9090");
    assert_eq!(cfg.provisioning.core_usernames, vec!["admin", "mlent"]);
    clear_env();
}

#[test]
fn invalid_values_return_errors() {
    let _guard = env_guard();
    clear_env();

    let temp_dir = TempDir::new().unwrap();
    write_env_file(
        &temp_dir,
        ".env",
        "ATMO_OPERATOR_TOKEN=t\nATMO_PROVISIONING_RATE_LIMIT_BACKOFF_SECONDS=0\n",
    );
    let err = loader(&temp_dir).load().unwrap_err();
    assert!(matches!(err, ConfigError::InvalidRateLimitBackoff { value: 0 }));

    unsafe {
        env::set_var("ATMO_PROVISIONING_RATE_LIMIT_BACKOFF_SECONDS", "30");
        env::set_var("ATMO_API_BIND_ADDR", "not-an-addr");
    }
    let err = loader(&temp_dir).load().unwrap_err();
    assert!(matches!(err, ConfigError::InvalidBindAddr { .. }));
    clear_env();
}

#[test]
fn redacted_json_hides_secrets() {
    let _guard = env_guard();
    clear_env();
    let temp_dir = TempDir::new().unwrap();
    write_env_file(
        &temp_dir,
        ".env",
        "ATMO_OPERATOR_TOKEN=super-secret-token\nATMO_PROVISIONING_PASSWORD_SALT=pepper\n",
    );

    let cfg = loader(&temp_dir).load().unwrap();
    let json = cfg.redacted_json().unwrap();
    assert!(!json.contains("super-secret-token"));
    assert!(!json.contains("pepper"));
    clear_env();
}
