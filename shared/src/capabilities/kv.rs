use crux_kv::KeyValue;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::event::Event;

pub type KvCapability = KeyValue<Event>;

pub const MAX_KEY_LENGTH: usize = 512;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StorageKeyError {
    #[error("key cannot be empty")]
    Empty,

    #[error("key exceeds maximum length of {max} bytes")]
    TooLong { max: usize },

    #[error("key '{0}' contains whitespace or control characters")]
    InvalidCharacters(String),

    #[error("key '{0}' cannot contain path traversal sequences")]
    PathTraversal(String),
}

/// Validated name of a durable slot in the shell's key-value store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StorageKey(String);

impl StorageKey {
    pub fn new(key: impl Into<String>) -> Result<Self, StorageKeyError> {
        let key = key.into();

        if key.is_empty() {
            return Err(StorageKeyError::Empty);
        }
        if key.len() > MAX_KEY_LENGTH {
            return Err(StorageKeyError::TooLong { max: MAX_KEY_LENGTH });
        }
        if key.chars().any(|c| c.is_control() || c.is_whitespace()) {
            return Err(StorageKeyError::InvalidCharacters(key.escape_default().to_string()));
        }
        if key.contains("..") || key.starts_with('/') || key.starts_with('\\') {
            return Err(StorageKeyError::PathTraversal(key));
        }

        Ok(Self(key))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for StorageKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
