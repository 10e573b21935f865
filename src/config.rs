//! Application configuration parsed from environment variables.
//!
//! DESIGN
//! ======
//! Required values (backend URL and public key) fail fast. Tuning knobs
//! fall back to defaults when absent or unparseable so a typo in a timer
//! value never blocks startup.

use std::time::Duration;

pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_CHECKOUT_WINDOW_SECS: u32 = 600;
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 5000;
pub const DEFAULT_APPROVAL_SETTLE_MS: u64 = 2000;
pub const DEFAULT_TRIAL_RECHECK_MS: u64 = 1000;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing required env var {0}")]
    Missing(&'static str),
    #[error("invalid value for {var}: {reason}")]
    Invalid { var: &'static str, reason: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HttpTimeouts {
    pub request_secs: u64,
    pub connect_secs: u64,
}

/// Backend endpoint and credentials.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendConfig {
    pub base_url: String,
    pub anon_key: String,
    pub access_token: Option<String>,
    pub timeouts: HttpTimeouts,
}

/// Timers that drive the PIX checkout flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CheckoutConfig {
    /// Countdown window in whole seconds.
    pub window_secs: u32,
    pub poll_interval_ms: u64,
    pub approval_settle_ms: u64,
}

impl CheckoutConfig {
    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    #[must_use]
    pub fn approval_settle(&self) -> Duration {
        Duration::from_millis(self.approval_settle_ms)
    }
}

impl Default for CheckoutConfig {
    fn default() -> Self {
        Self {
            window_secs: DEFAULT_CHECKOUT_WINDOW_SECS,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            approval_settle_ms: DEFAULT_APPROVAL_SETTLE_MS,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GateConfig {
    /// Delay between a trial activation and the gate's recheck.
    pub trial_recheck_ms: u64,
}

impl GateConfig {
    #[must_use]
    pub fn trial_recheck(&self) -> Duration {
        Duration::from_millis(self.trial_recheck_ms)
    }
}

impl Default for GateConfig {
    fn default() -> Self {
        Self { trial_recheck_ms: DEFAULT_TRIAL_RECHECK_MS }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub backend: BackendConfig,
    pub checkout: CheckoutConfig,
    pub gate: GateConfig,
}

impl AppConfig {
    /// Build typed config from environment variables.
    ///
    /// Required:
    /// - `SUCATA_BACKEND_URL`
    /// - `SUCATA_ANON_KEY`
    ///
    /// Optional:
    /// - `SUCATA_ACCESS_TOKEN`: bearer token for the signed-in user
    /// - `SUCATA_REQUEST_TIMEOUT_SECS`: default 30
    /// - `SUCATA_CONNECT_TIMEOUT_SECS`: default 10
    /// - `SUCATA_CHECKOUT_WINDOW_SECS`: default 600
    /// - `SUCATA_POLL_INTERVAL_MS`: default 5000
    /// - `SUCATA_APPROVAL_SETTLE_MS`: default 2000
    /// - `SUCATA_TRIAL_RECHECK_MS`: default 1000
    ///
    /// # Errors
    ///
    /// Returns an error if a required variable is missing or the backend
    /// URL is not an http(s) URL.
    pub fn from_env() -> Result<Self, ConfigError> {
        let base_url = required("SUCATA_BACKEND_URL")?.trim_end_matches('/').to_string();
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(ConfigError::Invalid {
                var: "SUCATA_BACKEND_URL",
                reason: format!("expected http(s) URL, got '{base_url}'"),
            });
        }
        let anon_key = required("SUCATA_ANON_KEY")?;
        let access_token = std::env::var("SUCATA_ACCESS_TOKEN")
            .ok()
            .filter(|v| !v.trim().is_empty());

        let timeouts = HttpTimeouts {
            request_secs: env_parse("SUCATA_REQUEST_TIMEOUT_SECS", DEFAULT_REQUEST_TIMEOUT_SECS),
            connect_secs: env_parse("SUCATA_CONNECT_TIMEOUT_SECS", DEFAULT_CONNECT_TIMEOUT_SECS),
        };
        let checkout = CheckoutConfig {
            window_secs: env_parse("SUCATA_CHECKOUT_WINDOW_SECS", DEFAULT_CHECKOUT_WINDOW_SECS).max(1),
            poll_interval_ms: env_parse("SUCATA_POLL_INTERVAL_MS", DEFAULT_POLL_INTERVAL_MS).max(1),
            approval_settle_ms: env_parse("SUCATA_APPROVAL_SETTLE_MS", DEFAULT_APPROVAL_SETTLE_MS),
        };
        let gate = GateConfig { trial_recheck_ms: env_parse("SUCATA_TRIAL_RECHECK_MS", DEFAULT_TRIAL_RECHECK_MS) };

        Ok(Self { backend: BackendConfig { base_url, anon_key, access_token, timeouts }, checkout, gate })
    }
}

fn required(key: &'static str) -> Result<String, ConfigError> {
    match std::env::var(key) {
        Ok(v) if !v.trim().is_empty() => Ok(v.trim().to_string()),
        _ => Err(ConfigError::Missing(key)),
    }
}

pub(crate) fn env_parse<T>(key: &str, default: T) -> T
where
    T: std::str::FromStr + Copy,
{
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
