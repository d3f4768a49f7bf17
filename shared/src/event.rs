use crux_kv::error::KeyValueError;
use serde::{Deserialize, Serialize};

use crate::api::{Credentials, Endpoint, HistoryItemType};
use crate::capabilities::HttpOutcome;
use crate::config::ClientConfig;
use crate::model::{AuthTab, DashboardTab};
use crate::task::Generation;
use crate::validation::{FileInput, InputMode, InputPayload};

pub type KvOutcome = Result<Option<Vec<u8>>, KeyValueError>;

// --- Event enum: shell-facing variants first, capability responses skipped ---

#[derive(Serialize, Deserialize, Debug)]
pub enum Event {
    // Lifecycle
    Configure(ClientConfig),
    AppStarted,
    #[serde(skip)]
    TokenRestored(KvOutcome),
    #[serde(skip)]
    TokenPersisted(KvOutcome),
    #[serde(skip)]
    TokenCleared(KvOutcome),

    // Auth
    SelectAuthTab(AuthTab),
    CredentialsSubmitted(Credentials),
    #[serde(skip)]
    AuthResponse {
        endpoint: Endpoint,
        generation: Generation,
        outcome: Box<HttpOutcome>,
    },
    Logout,

    // Dashboard
    SelectDashboardTab(DashboardTab),

    // Image analysis
    ImageSelected(InputPayload),
    ImagePromptChanged(String),
    AnalyzeImage,
    #[serde(skip)]
    ImageResponse {
        generation: Generation,
        outcome: Box<HttpOutcome>,
    },
    ResetImage,

    // Summarization
    SummarizerModeChanged(InputMode),
    DocumentSelected(FileInput),
    UrlChanged(String),
    MaxLengthChanged(Option<u32>),
    Summarize,
    #[serde(skip)]
    SummaryResponse {
        generation: Generation,
        outcome: Box<HttpOutcome>,
    },
    ResetSummary,

    // History
    HistoryRequested,
    HistoryFilterChanged(Option<HistoryItemType>),
    #[serde(skip)]
    HistoryResponse {
        generation: Generation,
        outcome: Box<HttpOutcome>,
    },
    ResetHistory,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shell_events_round_trip_through_json() {
        let event = Event::SelectDashboardTab(DashboardTab::History);
        let json = serde_json::to_string(&event).unwrap();
        assert!(matches!(
            serde_json::from_str::<Event>(&json).unwrap(),
            Event::SelectDashboardTab(DashboardTab::History)
        ));
    }

    #[test]
    fn file_bytes_serialize_as_byte_array() {
        let event = Event::DocumentSelected(FileInput {
            name: "a.pdf".into(),
            mime_type: "application/pdf".into(),
            bytes: vec![37, 80, 68, 70],
        });
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["DocumentSelected"]["bytes"], serde_json::json!([37, 80, 68, 70]));
    }

    #[test]
    fn capability_responses_are_not_serialized() {
        let event = Event::TokenRestored(Ok(None));
        assert!(serde_json::to_string(&event).is_err());
    }
}
