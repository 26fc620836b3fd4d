//! Client configuration parsed from environment variables.

use std::time::Duration;

use crate::error::ClientError;

pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:8080";
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_FRAME_BUDGET_MS: u64 = 16;
pub const DEFAULT_HISTORY_LIMIT: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    pub request_secs: u64,
    pub connect_secs: u64,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self { request_secs: DEFAULT_REQUEST_TIMEOUT_SECS, connect_secs: DEFAULT_CONNECT_TIMEOUT_SECS }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// API origin without a trailing slash, e.g. `http://127.0.0.1:8080`.
    pub base_url: String,
    /// Session token sent as bearer + `token` cookie, when already known.
    pub token: Option<String>,
    pub timeouts: Timeouts,
    /// Minimum spacing between drop-target resolutions while dragging.
    pub frame_budget: Duration,
    /// Number of chat messages the history view expects to show.
    pub history_limit: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_owned(),
            token: None,
            timeouts: Timeouts::default(),
            frame_budget: Duration::from_millis(DEFAULT_FRAME_BUDGET_MS),
            history_limit: DEFAULT_HISTORY_LIMIT,
        }
    }
}

impl ClientConfig {
    /// Build typed client config from environment variables.
    ///
    /// All optional:
    /// - `BOARDCHAT_BASE_URL`: default `http://127.0.0.1:8080`
    /// - `BOARDCHAT_TOKEN`: session token, unset means anonymous
    /// - `BOARDCHAT_REQUEST_TIMEOUT_SECS`: default 30
    /// - `BOARDCHAT_CONNECT_TIMEOUT_SECS`: default 10
    /// - `BOARDCHAT_FRAME_BUDGET_MS`: default 16
    /// - `BOARDCHAT_HISTORY_LIMIT`: default 50
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::InvalidBaseUrl`] when the base URL is not http(s).
    pub fn from_env() -> Result<Self, ClientError> {
        let base_url = std::env::var("BOARDCHAT_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_owned());
        let token = std::env::var("BOARDCHAT_TOKEN")
            .ok()
            .filter(|token| !token.trim().is_empty());
        let timeouts = Timeouts {
            request_secs: env_parse("BOARDCHAT_REQUEST_TIMEOUT_SECS", DEFAULT_REQUEST_TIMEOUT_SECS),
            connect_secs: env_parse("BOARDCHAT_CONNECT_TIMEOUT_SECS", DEFAULT_CONNECT_TIMEOUT_SECS),
        };
        let frame_budget = Duration::from_millis(env_parse("BOARDCHAT_FRAME_BUDGET_MS", DEFAULT_FRAME_BUDGET_MS));
        let history_limit = env_parse("BOARDCHAT_HISTORY_LIMIT", DEFAULT_HISTORY_LIMIT);

        Ok(Self { base_url: normalize_base_url(&base_url)?, token, timeouts, frame_budget, history_limit })
    }

    /// Replace the base URL, validating it the same way as `from_env`.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::InvalidBaseUrl`] when the URL is not http(s).
    pub fn with_base_url(mut self, base_url: &str) -> Result<Self, ClientError> {
        self.base_url = normalize_base_url(base_url)?;
        Ok(self)
    }

    #[must_use]
    pub fn with_token(mut self, token: Option<String>) -> Self {
        self.token = token;
        self
    }
}

/// Trim trailing slashes and reject anything that is not http(s).
///
/// # Errors
///
/// Returns [`ClientError::InvalidBaseUrl`] for other schemes.
pub fn normalize_base_url(raw: &str) -> Result<String, ClientError> {
    let trimmed = raw.trim().trim_end_matches('/');
    if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
        Ok(trimmed.to_owned())
    } else {
        Err(ClientError::InvalidBaseUrl(raw.to_owned()))
    }
}

fn env_parse<T>(key: &str, default: T) -> T
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
