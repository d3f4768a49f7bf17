//! Client configuration supplied by the shell.
//!
//! The shell sends [`ClientConfig`] once at startup (`Event::Configure`); until
//! then the defaults point at a local development backend.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use crate::{DEFAULT_BASE_URL, DEFAULT_HISTORY_LIMIT, DEFAULT_TOKEN_KEY, MAX_HISTORY_LIMIT};

pub const MAX_URL_LENGTH: usize = 2048;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("invalid base URL '{url}': {reason}")]
    InvalidBaseUrl { url: String, reason: String },

    #[error("invalid storage key: {0}")]
    InvalidStorageKey(#[from] crate::capabilities::StorageKeyError),

    #[error("history limit {0} is out of range [1, {}]", MAX_HISTORY_LIMIT)]
    HistoryLimitOutOfRange(u32),

    #[error("malformed configuration: {0}")]
    Malformed(String),
}

/// Absolute http(s) URL every endpoint path is joined onto.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct BaseUrl(Url);

impl BaseUrl {
    pub fn parse(raw: &str) -> Result<Self, ConfigError> {
        let invalid = |reason: &str| ConfigError::InvalidBaseUrl {
            url: truncate(raw),
            reason: reason.to_string(),
        };

        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(invalid("URL cannot be empty"));
        }
        if trimmed.len() > MAX_URL_LENGTH {
            return Err(invalid("URL is too long"));
        }

        let parsed = Url::parse(trimmed).map_err(|e| invalid(&e.to_string()))?;

        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(invalid("only 'http' and 'https' are allowed"));
        }
        if parsed.host_str().is_none() {
            return Err(invalid("URL must have a host"));
        }
        if !parsed.username().is_empty() || parsed.password().is_some() {
            return Err(invalid("credentials in URL are not allowed"));
        }
        if parsed.query().is_some() || parsed.fragment().is_some() {
            return Err(invalid("base URL cannot carry a query or fragment"));
        }

        Ok(Self(parsed))
    }

    /// Joins an endpoint path (`/image/analyze`) onto the base, keeping any
    /// path prefix the base already has (`https://host/api`).
    #[must_use]
    pub fn join(&self, path: &str) -> String {
        let base = self.0.as_str().trim_end_matches('/');
        let path = path.trim_start_matches('/');
        format!("{base}/{path}")
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl Default for BaseUrl {
    fn default() -> Self {
        Self(Url::parse(DEFAULT_BASE_URL).expect("default base URL is valid"))
    }
}

impl TryFrom<String> for BaseUrl {
    type Error = ConfigError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<BaseUrl> for String {
    fn from(value: BaseUrl) -> Self {
        value.0.into()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub base_url: BaseUrl,
    /// Durable key holding the bearer token.
    pub token_key: String,
    /// Log out when an authenticated request comes back 401.
    pub logout_on_unauthorized: bool,
    pub history_limit: u32,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: BaseUrl::default(),
            token_key: DEFAULT_TOKEN_KEY.to_string(),
            logout_on_unauthorized: true,
            history_limit: DEFAULT_HISTORY_LIMIT,
        }
    }
}

impl ClientConfig {
    pub fn from_json(bytes: &[u8]) -> Result<Self, ConfigError> {
        let config: Self =
            serde_json::from_slice(bytes).map_err(|e| ConfigError::Malformed(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        crate::capabilities::StorageKey::new(&self.token_key)?;
        if !(1..=MAX_HISTORY_LIMIT).contains(&self.history_limit) {
            return Err(ConfigError::HistoryLimitOutOfRange(self.history_limit));
        }
        Ok(())
    }
}

fn truncate(url: &str) -> String {
    if url.len() <= 100 {
        url.to_string()
    } else {
        format!("{}...", url.chars().take(100).collect::<String>())
    }
}
