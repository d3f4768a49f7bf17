use serde::{Deserialize, Serialize};
use thiserror::Error;

use crux_http::Http;

use crate::event::Event;

pub type HttpCapability = Http<Event>;

/// What the shell hands back for every request: a response (any status) or a
/// transport failure.
pub type HttpOutcome = crux_http::Result<crux_http::Response<Vec<u8>>>;

pub const MAX_REQUEST_BODY_SIZE: usize = 50 * 1024 * 1024;
pub const MAX_HEADER_NAME_LENGTH: usize = 256;
pub const MAX_HEADER_VALUE_LENGTH: usize = 8192;

#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum HttpError {
    #[error("invalid header '{name}': {reason}")]
    InvalidHeader { name: String, reason: String },

    #[error("request body too large: {size} bytes exceeds maximum of {max} bytes")]
    BodyTooLarge { size: usize, max: usize },

    #[error("{method} requests cannot have a body")]
    UnexpectedBody { method: &'static str },

    #[error("serialization error: {message}")]
    Serialization { message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HttpMethod {
    Get,
    Post,
}

impl HttpMethod {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
        }
    }

    #[must_use]
    pub const fn has_request_body(self) -> bool {
        matches!(self, HttpMethod::Post)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HttpHeaders {
    headers: Vec<(String, String)>,
}

impl HttpHeaders {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces (case-insensitively) a header.
    pub fn insert(
        &mut self,
        name: impl Into<String>,
        value: impl Into<String>,
    ) -> Result<(), HttpError> {
        let name = name.into();
        let value = value.into();

        Self::validate_header_name(&name)?;
        Self::validate_header_value(&name, &value)?;

        self.headers.retain(|(n, _)| !n.eq_ignore_ascii_case(&name));
        self.headers.push((name, value));

        Ok(())
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.headers.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    fn validate_header_name(name: &str) -> Result<(), HttpError> {
        if name.is_empty() {
            return Err(HttpError::InvalidHeader {
                name: String::new(),
                reason: "header name cannot be empty".to_string(),
            });
        }

        if name.len() > MAX_HEADER_NAME_LENGTH {
            return Err(HttpError::InvalidHeader {
                name: name.chars().take(50).collect::<String>() + "...",
                reason: format!(
                    "header name exceeds maximum length of {MAX_HEADER_NAME_LENGTH} bytes"
                ),
            });
        }

        if let Some(c) = name
            .chars()
            .find(|c| !c.is_ascii_alphanumeric() && *c != '-' && *c != '_')
        {
            return Err(HttpError::InvalidHeader {
                name: name.to_string(),
                reason: format!("invalid character '{c}' in header name"),
            });
        }

        let lower = name.to_ascii_lowercase();
        if lower == "host" || lower == "content-length" || lower == "transfer-encoding" {
            return Err(HttpError::InvalidHeader {
                name: name.to_string(),
                reason: "this header is managed automatically".to_string(),
            });
        }

        Ok(())
    }

    fn validate_header_value(name: &str, value: &str) -> Result<(), HttpError> {
        if value.len() > MAX_HEADER_VALUE_LENGTH {
            return Err(HttpError::InvalidHeader {
                name: name.to_string(),
                reason: format!(
                    "header value exceeds maximum length of {MAX_HEADER_VALUE_LENGTH} bytes"
                ),
            });
        }

        if value.chars().any(|c| c == '\r' || c == '\n' || c == '\0') {
            return Err(HttpError::InvalidHeader {
                name: name.to_string(),
                reason: "header value contains invalid characters (CR, LF, or NULL)".to_string(),
            });
        }

        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Part {
    Text {
        name: String,
        value: String,
    },
    File {
        name: String,
        filename: String,
        content_type: String,
        bytes: Vec<u8>,
    },
}

impl Part {
    fn name(&self) -> &str {
        match self {
            Part::Text { name, .. } | Part::File { name, .. } => name,
        }
    }
}

/// `multipart/form-data` body builder (RFC 7578).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MultipartForm {
    boundary: String,
    parts: Vec<Part>,
}

impl Default for MultipartForm {
    fn default() -> Self {
        Self::new()
    }
}

impl MultipartForm {
    #[must_use]
    pub fn new() -> Self {
        Self::with_boundary(format!("----shared-form-{}", uuid::Uuid::new_v4().simple()))
    }

    #[must_use]
    pub fn with_boundary(boundary: impl Into<String>) -> Self {
        Self {
            boundary: boundary.into(),
            parts: Vec::new(),
        }
    }

    #[must_use]
    pub fn text(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.parts.push(Part::Text {
            name: name.into(),
            value: value.into(),
        });
        self
    }

    #[must_use]
    pub fn file(
        mut self,
        name: impl Into<String>,
        filename: impl Into<String>,
        content_type: impl Into<String>,
        bytes: Vec<u8>,
    ) -> Self {
        self.parts.push(Part::File {
            name: name.into(),
            filename: filename.into(),
            content_type: content_type.into(),
            bytes,
        });
        self
    }

    #[must_use]
    pub fn has_field(&self, name: &str) -> bool {
        self.parts.iter().any(|p| p.name() == name)
    }

    #[must_use]
    pub fn boundary(&self) -> &str {
        &self.boundary
    }

    #[must_use]
    pub fn content_type(&self) -> String {
        format!("multipart/form-data; boundary={}", self.boundary)
    }

    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::new();

        for part in &self.parts {
            out.extend_from_slice(format!("--{}\r\n", self.boundary).as_bytes());
            match part {
                Part::Text { name, value } => {
                    out.extend_from_slice(
                        format!(
                            "Content-Disposition: form-data; name=\"{}\"\r\n\r\n",
                            escape_quoted(name)
                        )
                        .as_bytes(),
                    );
                    out.extend_from_slice(value.as_bytes());
                }
                Part::File {
                    name,
                    filename,
                    content_type,
                    bytes,
                } => {
                    out.extend_from_slice(
                        format!(
                            "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\nContent-Type: {}\r\n\r\n",
                            escape_quoted(name),
                            escape_quoted(filename),
                            content_type
                        )
                        .as_bytes(),
                    );
                    out.extend_from_slice(bytes);
                }
            }
            out.extend_from_slice(b"\r\n");
        }

        out.extend_from_slice(format!("--{}--\r\n", self.boundary).as_bytes());
        out
    }
}

// Percent-encodes the characters that would break a quoted form-data parameter.
fn escape_quoted(value: &str) -> String {
    value
        .replace('"', "%22")
        .replace('\r', "%0D")
        .replace('\n', "%0A")
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestBody {
    Empty,
    Json(serde_json::Value),
    Multipart(MultipartForm),
}

/// Fully built request, independent of the capability that will carry it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiRequest {
    method: HttpMethod,
    url: String,
    headers: HttpHeaders,
    body: Vec<u8>,
}

impl ApiRequest {
    #[must_use]
    pub fn new(method: HttpMethod, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: HttpHeaders::new(),
            body: Vec::new(),
        }
    }

    pub fn with_header(
        mut self,
        name: impl Into<String>,
        value: impl Into<String>,
    ) -> Result<Self, HttpError> {
        self.headers.insert(name, value)?;
        Ok(self)
    }

    pub fn with_body(self, body: RequestBody) -> Result<Self, HttpError> {
        match body {
            RequestBody::Empty => Ok(self),
            RequestBody::Json(value) => {
                let bytes = serde_json::to_vec(&value).map_err(|e| HttpError::Serialization {
                    message: e.to_string(),
                })?;
                self.with_bytes(bytes, "application/json")
            }
            RequestBody::Multipart(form) => {
                let content_type = form.content_type();
                self.with_bytes(form.encode(), &content_type)
            }
        }
    }

    fn with_bytes(mut self, bytes: Vec<u8>, content_type: &str) -> Result<Self, HttpError> {
        if !self.method.has_request_body() {
            return Err(HttpError::UnexpectedBody {
                method: self.method.as_str(),
            });
        }
        if bytes.len() > MAX_REQUEST_BODY_SIZE {
            return Err(HttpError::BodyTooLarge {
                size: bytes.len(),
                max: MAX_REQUEST_BODY_SIZE,
            });
        }
        self.headers.insert("Content-Type", content_type)?;
        self.body = bytes;
        Ok(self)
    }

    #[must_use]
    pub fn method(&self) -> HttpMethod {
        self.method
    }

    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    #[must_use]
    pub fn headers(&self) -> &HttpHeaders {
        &self.headers
    }

    #[must_use]
    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Hands the request to the shell. `make_event` receives the raw outcome.
    pub fn send<F>(self, http: &HttpCapability, make_event: F)
    where
        F: FnOnce(HttpOutcome) -> Event + Send + 'static,
    {
        let Self {
            method,
            url,
            headers,
            body,
        } = self;

        let mut builder = match method {
            HttpMethod::Get => http.get(&url),
            HttpMethod::Post => http.post(&url),
        };

        // Body first: headers set afterwards win over the body's default mime.
        if !body.is_empty() {
            builder = builder.body(body);
        }
        for (name, value) in headers.iter() {
            builder = builder.header(name, value);
        }

        builder.send(make_event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_validation_empty_name() {
        let mut headers = HttpHeaders::new();
        assert!(headers.insert("", "value").is_err());
    }

    #[test]
    fn test_header_validation_crlf_injection() {
        let mut headers = HttpHeaders::new();
        assert!(headers.insert("Authorization", "Bearer x\r\nEvil: header").is_err());
    }

    #[test]
    fn test_header_validation_reserved() {
        let mut headers = HttpHeaders::new();
        assert!(headers.insert("Host", "evil.com").is_err());
    }

    #[test]
    fn test_header_deduplication() {
        let mut headers = HttpHeaders::new();
        headers.insert("Accept", "text/html").unwrap();
        headers.insert("accept", "application/json").unwrap();
        assert_eq!(headers.iter().count(), 1);
        assert_eq!(headers.get("ACCEPT"), Some("application/json"));
    }

    #[test]
    fn test_multipart_encoding() {
        let form = MultipartForm::with_boundary("XYZ")
            .file("file", "cat.jpg", "image/jpeg", vec![0xFF, 0xD8])
            .text("prompt", "What is this?");

        let mut expected = Vec::new();
        expected.extend_from_slice(
            b"--XYZ\r\nContent-Disposition: form-data; name=\"file\"; filename=\"cat.jpg\"\r\nContent-Type: image/jpeg\r\n\r\n",
        );
        expected.extend_from_slice(&[0xFF, 0xD8]);
        expected.extend_from_slice(
            b"\r\n--XYZ\r\nContent-Disposition: form-data; name=\"prompt\"\r\n\r\nWhat is this?\r\n--XYZ--\r\n",
        );

        assert_eq!(form.encode(), expected);
        assert_eq!(form.content_type(), "multipart/form-data; boundary=XYZ");
        assert!(form.has_field("file"));
        assert!(!form.has_field("url"));
    }

    #[test]
    fn test_multipart_escapes_filename() {
        let form = MultipartForm::with_boundary("B").file(
            "file",
            "evil\"\r\nname.pdf",
            "application/pdf",
            vec![],
        );
        let body = String::from_utf8(form.encode()).unwrap();
        assert!(body.contains("filename=\"evil%22%0D%0Aname.pdf\""));
    }

    #[test]
    fn test_boundaries_are_unique() {
        assert_ne!(MultipartForm::new().boundary(), MultipartForm::new().boundary());
    }

    #[test]
    fn test_json_body_sets_content_type() {
        let request = ApiRequest::new(HttpMethod::Post, "https://api.example.com/auth/login")
            .with_body(RequestBody::Json(serde_json::json!({"username": "ada"})))
            .unwrap();

        assert_eq!(request.headers().get("content-type"), Some("application/json"));
        let parsed: serde_json::Value = serde_json::from_slice(request.body()).unwrap();
        assert_eq!(parsed["username"], "ada");
    }

    #[test]
    fn test_body_on_get_fails() {
        let result = ApiRequest::new(HttpMethod::Get, "https://api.example.com/history")
            .with_body(RequestBody::Json(serde_json::json!({})));
        assert!(matches!(result, Err(HttpError::UnexpectedBody { .. })));

        let empty = ApiRequest::new(HttpMethod::Get, "https://api.example.com/history")
            .with_body(RequestBody::Empty)
            .unwrap();
        assert!(empty.body().is_empty());
    }

    #[test]
    fn test_body_size_limit() {
        let form = MultipartForm::with_boundary("B").file(
            "file",
            "big.pdf",
            "application/pdf",
            vec![0u8; MAX_REQUEST_BODY_SIZE],
        );
        let result = ApiRequest::new(HttpMethod::Post, "https://api.example.com/doc/summarize")
            .with_body(RequestBody::Multipart(form));
        assert!(matches!(result, Err(HttpError::BodyTooLarge { .. })));
    }
}
