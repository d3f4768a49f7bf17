// lib.rs - Shared core for the multi-modal AI client

#![forbid(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::too_many_lines)]

pub mod api;
pub mod app;
pub mod capabilities;
pub mod config;
pub mod event;
pub mod model;
pub mod session;
pub mod task;
pub mod validation;
pub mod view;

use serde::{Deserialize, Serialize};

pub use app::App;
pub use capabilities::{Capabilities, Effect};
pub use config::ClientConfig;
pub use crux_core::{render::Render, App as CruxApp};
pub use event::Event;
pub use model::Model;
pub use view::ViewModel;

pub const DEFAULT_BASE_URL: &str = "http://localhost:8000";
pub const DEFAULT_TOKEN_KEY: &str = "token";
pub const DEFAULT_HISTORY_LIMIT: u32 = 20;
pub const MAX_HISTORY_LIMIT: u32 = 20;
pub const MAX_DETAIL_LENGTH: usize = 2048;

pub const NETWORK_ERROR_MESSAGE: &str = "Network error. Please try again.";
pub const DECODE_ERROR_MESSAGE: &str = "Received an unexpected response from the server.";
pub const SESSION_EXPIRED_MESSAGE: &str = "Your session has expired. Please log in again.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Non-2xx response other than 401.
    Server,
    /// 401 from the backend: bad credentials or an expired/invalid token.
    Unauthorized,
    /// No response was received.
    Network,
    /// 2xx response whose body did not match the expected payload.
    Decode,
    /// The request could not be built locally.
    Request,
}

impl ErrorKind {
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::Server => "SERVER_ERROR",
            Self::Unauthorized => "AUTH_ERROR",
            Self::Network => "NETWORK_ERROR",
            Self::Decode => "DESERIALIZATION_ERROR",
            Self::Request => "REQUEST_ERROR",
        }
    }

    #[must_use]
    pub const fn from_status(status: u16) -> Self {
        match status {
            401 | 403 => Self::Unauthorized,
            _ => Self::Server,
        }
    }
}

/// Every failure the API client can report. All of them surface on the owning
/// task with a non-empty `message`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[error("[{}] {message}", .kind.code())]
pub struct ApiError {
    pub kind: ErrorKind,
    pub status: Option<u16>,
    pub message: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    detail: Option<serde_json::Value>,
}

impl ApiError {
    #[must_use]
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        let message = message.into();
        let message = if message.trim().is_empty() {
            kind.code().to_string()
        } else {
            message
        };
        Self {
            kind,
            status: None,
            message,
        }
    }

    #[must_use]
    pub fn network() -> Self {
        Self::new(ErrorKind::Network, NETWORK_ERROR_MESSAGE)
    }

    #[must_use]
    pub fn decode() -> Self {
        Self::new(ErrorKind::Decode, DECODE_ERROR_MESSAGE)
    }

    /// Builds the error for a non-2xx response. The message is the body's
    /// `detail` when it is a non-empty string, otherwise `fallback`.
    #[must_use]
    pub fn from_http_status(status: u16, body: Option<&[u8]>, fallback: &str) -> Self {
        let message = body
            .and_then(detail_from_body)
            .unwrap_or_else(|| fallback.to_string());

        Self {
            status: Some(status),
            ..Self::new(ErrorKind::from_status(status), message)
        }
    }

    #[must_use]
    pub const fn code(&self) -> &'static str {
        self.kind.code()
    }

    #[must_use]
    pub const fn is_unauthorized(&self) -> bool {
        matches!(self.kind, ErrorKind::Unauthorized)
    }
}

fn detail_from_body(body: &[u8]) -> Option<String> {
    let parsed: ErrorBody = serde_json::from_slice(body).ok()?;
    match parsed.detail? {
        serde_json::Value::String(detail) => {
            let detail = detail.trim();
            if detail.is_empty() {
                None
            } else {
                Some(detail.chars().take(MAX_DETAIL_LENGTH).collect())
            }
        }
        _ => None,
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detail_is_used_when_present() {
        let err = ApiError::from_http_status(
            500,
            Some(br#"{"detail":"model unavailable"}"#),
            "Image analysis failed",
        );
        assert_eq!(err.message, "model unavailable");
        assert_eq!(err.kind, ErrorKind::Server);
        assert_eq!(err.status, Some(500));
    }

    #[test]
    fn fallback_when_detail_missing_or_not_a_string() {
        let missing = ApiError::from_http_status(502, Some(b"<html>bad gateway</html>"), "Summarization failed");
        assert_eq!(missing.message, "Summarization failed");

        // FastAPI validation errors carry a list in `detail`.
        let list = ApiError::from_http_status(
            422,
            Some(br#"{"detail":[{"loc":["body","file"],"msg":"field required"}]}"#),
            "Summarization failed",
        );
        assert_eq!(list.message, "Summarization failed");

        let blank = ApiError::from_http_status(400, Some(br#"{"detail":"   "}"#), "Login failed");
        assert_eq!(blank.message, "Login failed");

        let no_body = ApiError::from_http_status(500, None, "Login failed");
        assert_eq!(no_body.message, "Login failed");
    }

    #[test]
    fn unauthorized_status_is_classified() {
        let err = ApiError::from_http_status(401, Some(br#"{"detail":"Token expired"}"#), "x");
        assert!(err.is_unauthorized());
        assert_eq!(err.code(), "AUTH_ERROR");
        assert_eq!(err.message, "Token expired");
    }

    #[test]
    fn forbidden_status_is_an_authorization_failure() {
        let err = ApiError::from_http_status(403, Some(br#"{"detail":"Not authenticated"}"#), "x");
        assert!(err.is_unauthorized());
        assert_eq!(err.status, Some(403));
        assert_eq!(err.message, "Not authenticated");
    }

    #[test]
    fn network_error_is_distinct_from_server_detail() {
        let net = ApiError::network();
        assert_eq!(net.kind, ErrorKind::Network);
        assert_eq!(net.message, NETWORK_ERROR_MESSAGE);
        assert_eq!(net.status, None);
    }

    #[test]
    fn empty_message_never_survives() {
        let err = ApiError::new(ErrorKind::Server, "");
        assert!(!err.message.is_empty());
    }

    #[test]
    fn long_detail_is_truncated() {
        let body = serde_json::to_vec(&serde_json::json!({ "detail": "x".repeat(5000) })).unwrap();
        let err = ApiError::from_http_status(500, Some(&body), "fallback");
        assert_eq!(err.message.len(), MAX_DETAIL_LENGTH);
    }
}
