//! Input payloads and the pure rules gating their submission.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::api::{Credentials, HistoryQuery};
use crate::MAX_HISTORY_LIMIT;

pub const IMAGE_MIME_TYPES: &[&str] = &["image/jpeg", "image/jpg", "image/png"];
pub const DOCUMENT_MIME_TYPES: &[&str] = &[
    "application/pdf",
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
];

#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum ValidationError {
    #[error("Please select a valid image file (JPG or PNG)")]
    InvalidImage,

    #[error("Please select a valid PDF or DOCX file")]
    InvalidDocument,

    #[error("Please enter a URL")]
    MissingUrl,

    #[error("Please enter a username and password")]
    MissingCredentials,

    #[error("History limit must be between 1 and {}", MAX_HISTORY_LIMIT)]
    HistoryLimitOutOfRange,
}

// --- Input payloads ---

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileInput {
    pub name: String,
    pub mime_type: String,
    #[serde(with = "serde_bytes")]
    pub bytes: Vec<u8>,
}

// File contents stay out of logs.
impl fmt::Debug for FileInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileInput")
            .field("name", &self.name)
            .field("mime_type", &self.mime_type)
            .field("size_bytes", &self.bytes.len())
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextInput {
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum InputPayload {
    File(FileInput),
    Text(TextInput),
}

impl InputPayload {
    /// Short label for the view: the file name or the URL.
    #[must_use]
    pub fn label(&self) -> &str {
        match self {
            InputPayload::File(file) => &file.name,
            InputPayload::Text(text) => &text.value,
        }
    }
}

/// Which branch of the summarizer form is active.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InputMode {
    #[default]
    File,
    Url,
}

// --- Rules ---

/// A pure, synchronous precondition. On success returns the input as it
/// should be stored (possibly normalized).
pub trait ValidationRule<I> {
    fn check(&self, input: I) -> Result<I, ValidationError>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ImageRule;

impl ValidationRule<InputPayload> for ImageRule {
    fn check(&self, input: InputPayload) -> Result<InputPayload, ValidationError> {
        match &input {
            InputPayload::File(file) if mime_allowed(&file.mime_type, IMAGE_MIME_TYPES) => {
                Ok(input)
            }
            _ => Err(ValidationError::InvalidImage),
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DocumentRule {
    pub mode: InputMode,
}

impl ValidationRule<InputPayload> for DocumentRule {
    fn check(&self, input: InputPayload) -> Result<InputPayload, ValidationError> {
        match (self.mode, input) {
            (InputMode::File, InputPayload::File(file))
                if mime_allowed(&file.mime_type, DOCUMENT_MIME_TYPES) =>
            {
                Ok(InputPayload::File(file))
            }
            (InputMode::File, _) => Err(ValidationError::InvalidDocument),
            (InputMode::Url, InputPayload::Text(text)) => {
                let value = text.value.trim();
                if value.is_empty() {
                    Err(ValidationError::MissingUrl)
                } else {
                    Ok(InputPayload::Text(TextInput {
                        value: value.to_string(),
                    }))
                }
            }
            (InputMode::Url, InputPayload::File(_)) => Err(ValidationError::MissingUrl),
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct CredentialsRule;

impl ValidationRule<Credentials> for CredentialsRule {
    fn check(&self, input: Credentials) -> Result<Credentials, ValidationError> {
        let username = input.username.trim();
        if username.is_empty() || input.password.is_empty() {
            return Err(ValidationError::MissingCredentials);
        }
        Ok(Credentials {
            username: username.to_string(),
            password: input.password,
        })
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct HistoryQueryRule;

impl ValidationRule<HistoryQuery> for HistoryQueryRule {
    fn check(&self, input: HistoryQuery) -> Result<HistoryQuery, ValidationError> {
        if (1..=MAX_HISTORY_LIMIT).contains(&input.limit) {
            Ok(input)
        } else {
            Err(ValidationError::HistoryLimitOutOfRange)
        }
    }
}

// Browsers report mime types in any case and sometimes with parameters.
fn mime_allowed(mime_type: &str, allowed: &[&str]) -> bool {
    let essence = mime_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    allowed.contains(&essence.as_str())
}
