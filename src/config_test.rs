use super::*;
use std::sync::Mutex;

static ENV_LOCK: Mutex<()> = Mutex::new(());

const VARS: &[&str] = &[
    "SUCATA_BACKEND_URL",
    "SUCATA_ANON_KEY",
    "SUCATA_ACCESS_TOKEN",
    "SUCATA_REQUEST_TIMEOUT_SECS",
    "SUCATA_CONNECT_TIMEOUT_SECS",
    "SUCATA_CHECKOUT_WINDOW_SECS",
    "SUCATA_POLL_INTERVAL_MS",
    "SUCATA_APPROVAL_SETTLE_MS",
    "SUCATA_TRIAL_RECHECK_MS",
];

/// # Safety
/// Callers hold `ENV_LOCK` so no other test mutates the environment concurrently.
unsafe fn clear_env() {
    for var in VARS {
        unsafe { std::env::remove_var(var) };
    }
}

#[test]
fn from_env_applies_defaults() {
    let _guard = ENV_LOCK.lock().unwrap();
    unsafe {
        clear_env();
        std::env::set_var("SUCATA_BACKEND_URL", "https://abc.example.co/");
        std::env::set_var("SUCATA_ANON_KEY", "anon");
    }

    let cfg = AppConfig::from_env().unwrap();
    assert_eq!(cfg.backend.base_url, "https://abc.example.co");
    assert_eq!(cfg.backend.anon_key, "anon");
    assert_eq!(cfg.backend.access_token, None);
    assert_eq!(
        cfg.backend.timeouts,
        HttpTimeouts { request_secs: DEFAULT_REQUEST_TIMEOUT_SECS, connect_secs: DEFAULT_CONNECT_TIMEOUT_SECS }
    );
    assert_eq!(cfg.checkout, CheckoutConfig::default());
    assert_eq!(cfg.checkout.window_secs, 600);
    assert_eq!(cfg.gate, GateConfig::default());

    unsafe { clear_env() };
}

#[test]
fn from_env_parses_overrides() {
    let _guard = ENV_LOCK.lock().unwrap();
    unsafe {
        clear_env();
        std::env::set_var("SUCATA_BACKEND_URL", "http://localhost:54321");
        std::env::set_var("SUCATA_ANON_KEY", "anon");
        std::env::set_var("SUCATA_ACCESS_TOKEN", "jwt");
        std::env::set_var("SUCATA_CHECKOUT_WINDOW_SECS", "120");
        std::env::set_var("SUCATA_POLL_INTERVAL_MS", "250");
        std::env::set_var("SUCATA_APPROVAL_SETTLE_MS", "0");
        std::env::set_var("SUCATA_TRIAL_RECHECK_MS", "50");
        std::env::set_var("SUCATA_REQUEST_TIMEOUT_SECS", "5");
    }

    let cfg = AppConfig::from_env().unwrap();
    assert_eq!(cfg.backend.access_token.as_deref(), Some("jwt"));
    assert_eq!(cfg.backend.timeouts.request_secs, 5);
    assert_eq!(cfg.checkout.window_secs, 120);
    assert_eq!(cfg.checkout.poll_interval(), Duration::from_millis(250));
    assert_eq!(cfg.checkout.approval_settle(), Duration::ZERO);
    assert_eq!(cfg.gate.trial_recheck(), Duration::from_millis(50));

    unsafe { clear_env() };
}

#[test]
fn from_env_ignores_unparseable_tuning_values() {
    let _guard = ENV_LOCK.lock().unwrap();
    unsafe {
        clear_env();
        std::env::set_var("SUCATA_BACKEND_URL", "https://abc.example.co");
        std::env::set_var("SUCATA_ANON_KEY", "anon");
        std::env::set_var("SUCATA_POLL_INTERVAL_MS", "soon");
    }

    let cfg = AppConfig::from_env().unwrap();
    assert_eq!(cfg.checkout.poll_interval_ms, DEFAULT_POLL_INTERVAL_MS);

    unsafe { clear_env() };
}

#[test]
fn from_env_requires_backend_url() {
    let _guard = ENV_LOCK.lock().unwrap();
    unsafe {
        clear_env();
        std::env::set_var("SUCATA_ANON_KEY", "anon");
    }

    assert_eq!(AppConfig::from_env().unwrap_err(), ConfigError::Missing("SUCATA_BACKEND_URL"));

    unsafe { clear_env() };
}

#[test]
fn from_env_rejects_non_http_url() {
    let _guard = ENV_LOCK.lock().unwrap();
    unsafe {
        clear_env();
        std::env::set_var("SUCATA_BACKEND_URL", "ftp://nope");
        std::env::set_var("SUCATA_ANON_KEY", "anon");
    }

    let err = AppConfig::from_env().unwrap_err().to_string();
    assert!(err.contains("SUCATA_BACKEND_URL"));

    unsafe { clear_env() };
}

#[test]
fn blank_access_token_is_treated_as_absent() {
    let _guard = ENV_LOCK.lock().unwrap();
    unsafe {
        clear_env();
        std::env::set_var("SUCATA_BACKEND_URL", "https://abc.example.co");
        std::env::set_var("SUCATA_ANON_KEY", "anon");
        std::env::set_var("SUCATA_ACCESS_TOKEN", "  ");
    }

    assert_eq!(AppConfig::from_env().unwrap().backend.access_token, None);

    unsafe { clear_env() };
}
