//! Client configuration.

use std::time::Duration;

/// Crate version sent in the `User-Agent` header.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub const USER_AGENT: &str = concat!(
    "WeDeploy/",
    env!("CARGO_PKG_VERSION"),
    " (+https://wedeploy.com)"
);

/// Environment variable overriding [`ClientConfig::timeout`], in seconds.
/// `0` disables the transport timeout.
pub const TIMEOUT_ENV: &str = "WEDEPLOY_HTTP_TIMEOUT_SECS";

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Settings for the default transport.
///
/// Request builders carry their own per-request timeout on top of this one;
/// the shorter of the two wins.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    pub timeout: Option<Duration>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            timeout: Some(DEFAULT_TIMEOUT),
        }
    }
}

impl ClientConfig {
    /// Defaults overridden by `WEDEPLOY_HTTP_TIMEOUT_SECS` when it is set.
    pub fn from_env() -> Self {
        match std::env::var(TIMEOUT_ENV) {
            Ok(raw) => Self::from_timeout_var(&raw),
            Err(_) => Self::default(),
        }
    }

    fn from_timeout_var(raw: &str) -> Self {
        match raw.trim().parse::<u64>() {
            Ok(0) => Self { timeout: None },
            Ok(secs) => Self {
                timeout: Some(Duration::from_secs(secs)),
            },
            Err(_) => {
                tracing::warn!(value = raw, "ignoring invalid {}", TIMEOUT_ENV);
                Self::default()
            }
        }
    }
}
