//! Bearer-token session and its durable copy in the shell's key-value store.

use std::fmt;

use crux_kv::error::KeyValueError;
use secrecy::{ExposeSecret, SecretString};
use tracing::{debug, info, warn};

use crate::capabilities::{KvCapability, StorageKey};
use crate::event::Event;

pub const MAX_TOKEN_LENGTH: usize = 8192;

// --- Token: redacted Debug, never serialized ---

#[derive(Clone)]
pub struct Token(SecretString);

impl Token {
    /// Accepts a non-empty token without whitespace or control characters.
    #[must_use]
    pub fn new(raw: impl Into<String>) -> Option<Self> {
        let raw = raw.into();
        if raw.is_empty()
            || raw.len() > MAX_TOKEN_LENGTH
            || raw.chars().any(|c| c.is_whitespace() || c.is_control())
        {
            return None;
        }
        Some(Self(SecretString::new(raw)))
    }

    #[must_use]
    pub fn expose(&self) -> &str {
        self.0.expose_secret()
    }

    #[must_use]
    pub fn bearer(&self) -> String {
        format!("Bearer {}", self.expose())
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Token([REDACTED])")
    }
}

impl PartialEq for Token {
    fn eq(&self, other: &Self) -> bool {
        self.expose() == other.expose()
    }
}

impl Eq for Token {}

/// How a restore attempt ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Restored {
    Found,
    Missing,
    /// The stored bytes were not a usable token and were deleted.
    Corrupt,
    Failed,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
enum Lifecycle {
    /// Before the first restore has been requested.
    #[default]
    Cold,
    Restoring,
    Ready,
}

#[derive(Debug, Default)]
pub struct SessionStore {
    token: Option<Token>,
    lifecycle: Lifecycle,
}

impl SessionStore {
    #[must_use]
    pub fn token(&self) -> Option<&Token> {
        self.token.as_ref()
    }

    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.token.is_some()
    }

    #[must_use]
    pub fn is_restoring(&self) -> bool {
        self.lifecycle == Lifecycle::Restoring
    }

    /// Reads the durable token. Ignored once a restore is in flight or done.
    pub fn restore(&mut self, key: &StorageKey, kv: &KvCapability) -> bool {
        if self.lifecycle != Lifecycle::Cold {
            return false;
        }
        self.lifecycle = Lifecycle::Restoring;
        debug!(key = %key, "restoring session");
        kv.get(key.to_string(), Event::TokenRestored);
        true
    }

    pub fn on_restored(
        &mut self,
        key: &StorageKey,
        result: Result<Option<Vec<u8>>, KeyValueError>,
        kv: &KvCapability,
    ) -> Restored {
        self.lifecycle = Lifecycle::Ready;

        // A login that finished while the read was in flight wins.
        if self.token.is_some() {
            return Restored::Found;
        }

        let bytes = match result {
            Ok(Some(bytes)) => bytes,
            Ok(None) => {
                debug!("no stored session");
                return Restored::Missing;
            }
            Err(e) => {
                warn!(error = %e, "session restore failed");
                return Restored::Failed;
            }
        };

        match String::from_utf8(bytes).ok().and_then(Token::new) {
            Some(token) => {
                info!("session restored");
                self.token = Some(token);
                Restored::Found
            }
            None => {
                warn!(key = %key, "discarding corrupt stored token");
                kv.delete(key.to_string(), Event::TokenCleared);
                Restored::Corrupt
            }
        }
    }

    pub fn login(&mut self, token: Token, key: &StorageKey, kv: &KvCapability) {
        kv.set(
            key.to_string(),
            token.expose().as_bytes().to_vec(),
            Event::TokenPersisted,
        );
        self.token = Some(token);
        self.lifecycle = Lifecycle::Ready;
        info!("session started");
    }

    pub fn logout(&mut self, key: &StorageKey, kv: &KvCapability) {
        self.token = None;
        kv.delete(key.to_string(), Event::TokenCleared);
        info!("session ended");
    }
}
