//! Backend contract: endpoints, request encoding and response normalization.
//!
//! Building a request is pure ([`ApiClient::request`]); sending it goes through
//! the HTTP capability; [`interpret`] turns whatever came back into either the
//! endpoint's payload or an [`ApiError`].

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use tracing::{debug, warn};
use url::Url;

use crate::capabilities::{ApiRequest, HttpMethod, HttpOutcome, MultipartForm, RequestBody};
use crate::config::BaseUrl;
use crate::session::Token;
use crate::validation::{FileInput, InputPayload};
use crate::{ApiError, ErrorKind, DEFAULT_HISTORY_LIMIT};

// --- Endpoints ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Endpoint {
    Login,
    Signup,
    AnalyzeImage,
    Summarize,
    History,
}

impl Endpoint {
    #[must_use]
    pub const fn path(self) -> &'static str {
        match self {
            Endpoint::Login => "/auth/login",
            Endpoint::Signup => "/auth/signup",
            Endpoint::AnalyzeImage => "/image/analyze",
            Endpoint::Summarize => "/doc/summarize",
            Endpoint::History => "/history",
        }
    }

    #[must_use]
    pub const fn method(self) -> HttpMethod {
        match self {
            Endpoint::History => HttpMethod::Get,
            _ => HttpMethod::Post,
        }
    }

    /// Shown when a failed response carries no usable `detail`.
    #[must_use]
    pub const fn failure_message(self) -> &'static str {
        match self {
            Endpoint::Login => "Login failed",
            Endpoint::Signup => "Signup failed",
            Endpoint::AnalyzeImage => "Image analysis failed",
            Endpoint::Summarize => "Summarization failed",
            Endpoint::History => "Failed to load history",
        }
    }

    /// Whether a 401 here means the session token is no longer good.
    #[must_use]
    pub const fn is_authenticated(self) -> bool {
        !matches!(self, Endpoint::Login | Endpoint::Signup)
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path())
    }
}

// --- Request inputs ---

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HistoryItemType {
    ImageAnalysis,
    DocumentSummary,
}

impl HistoryItemType {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            HistoryItemType::ImageAnalysis => "image_analysis",
            HistoryItemType::DocumentSummary => "document_summary",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryQuery {
    pub limit: u32,
    pub item_type: Option<HistoryItemType>,
}

impl HistoryQuery {
    #[must_use]
    pub const fn new(limit: u32) -> Self {
        Self {
            limit,
            item_type: None,
        }
    }

    #[must_use]
    pub const fn with_item_type(mut self, item_type: Option<HistoryItemType>) -> Self {
        self.item_type = item_type;
        self
    }
}

impl Default for HistoryQuery {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_LIMIT)
    }
}

// --- Response payloads ---

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthGrant {
    pub token: Token,
    pub message: Option<String>,
}

impl<'de> Deserialize<'de> for AuthGrant {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        struct Raw {
            token: String,
            #[serde(default)]
            message: Option<String>,
        }

        let raw = Raw::deserialize(deserializer)?;
        let token = Token::new(raw.token)
            .ok_or_else(|| serde::de::Error::custom("token is empty or malformed"))?;
        Ok(Self {
            token,
            message: raw.message,
        })
    }
}

/// What the auth task keeps once the token has moved into the session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedIn {
    pub message: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageSize(pub u32, pub u32);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageAnalysis {
    pub filename: String,
    pub description: String,
    #[serde(default)]
    pub image_size: Option<ImageSize>,
    #[serde(default)]
    pub model_used: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    pub summary: String,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub original_length: Option<u64>,
    #[serde(default)]
    pub summary_length: Option<u64>,
    #[serde(default)]
    pub compression_ratio: Option<f64>,
    #[serde(default)]
    pub model_used: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    #[serde(rename = "type")]
    pub kind: String,
    pub input_data: String,
    pub output: String,
    pub timestamp: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryPage {
    #[serde(default)]
    pub history: Vec<HistoryEntry>,
    #[serde(default)]
    pub total: Option<u64>,
}

// --- Calls ---

/// One endpoint plus the body it will carry.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiCall {
    endpoint: Endpoint,
    query: Option<HistoryQuery>,
    body: RequestBody,
}

impl ApiCall {
    pub fn login(credentials: &Credentials) -> Result<Self, ApiError> {
        Self::credentials(Endpoint::Login, credentials)
    }

    pub fn signup(credentials: &Credentials) -> Result<Self, ApiError> {
        Self::credentials(Endpoint::Signup, credentials)
    }

    fn credentials(endpoint: Endpoint, credentials: &Credentials) -> Result<Self, ApiError> {
        let value = serde_json::to_value(credentials)
            .map_err(|e| ApiError::new(ErrorKind::Request, e.to_string()))?;
        Ok(Self {
            endpoint,
            query: None,
            body: RequestBody::Json(value),
        })
    }

    /// Multipart `file` plus an optional non-blank `prompt`.
    pub fn analyze_image(input: &InputPayload, prompt: Option<&str>) -> Result<Self, ApiError> {
        let InputPayload::File(file) = input else {
            return Err(ApiError::new(
                ErrorKind::Request,
                Endpoint::AnalyzeImage.failure_message(),
            ));
        };

        let mut form = file_part(MultipartForm::new(), file);
        if let Some(prompt) = prompt.map(str::trim).filter(|p| !p.is_empty()) {
            form = form.text("prompt", prompt);
        }

        Ok(Self {
            endpoint: Endpoint::AnalyzeImage,
            query: None,
            body: RequestBody::Multipart(form),
        })
    }

    /// Multipart with exactly one of `file` or `url`, plus optional `max_length`.
    #[must_use]
    pub fn summarize(input: &InputPayload, max_length: Option<u32>) -> Self {
        let mut form = match input {
            InputPayload::File(file) => file_part(MultipartForm::new(), file),
            InputPayload::Text(text) => MultipartForm::new().text("url", text.value.as_str()),
        };
        if let Some(max_length) = max_length {
            form = form.text("max_length", max_length.to_string());
        }

        Self {
            endpoint: Endpoint::Summarize,
            query: None,
            body: RequestBody::Multipart(form),
        }
    }

    #[must_use]
    pub fn history(query: HistoryQuery) -> Self {
        Self {
            endpoint: Endpoint::History,
            query: Some(query),
            body: RequestBody::Empty,
        }
    }

    #[must_use]
    pub fn endpoint(&self) -> Endpoint {
        self.endpoint
    }

    #[must_use]
    pub fn body(&self) -> &RequestBody {
        &self.body
    }
}

fn file_part(form: MultipartForm, file: &FileInput) -> MultipartForm {
    form.file(
        "file",
        file.name.as_str(),
        file.mime_type.as_str(),
        file.bytes.clone(),
    )
}

// --- Client ---

/// Joins calls onto the base URL and attaches the session token.
#[derive(Debug, Clone, Copy)]
pub struct ApiClient<'a> {
    base_url: &'a BaseUrl,
    token: Option<&'a Token>,
}

impl<'a> ApiClient<'a> {
    #[must_use]
    pub fn new(base_url: &'a BaseUrl, token: Option<&'a Token>) -> Self {
        Self { base_url, token }
    }

    pub fn request(&self, call: ApiCall) -> Result<ApiRequest, ApiError> {
        let ApiCall {
            endpoint,
            query,
            body,
        } = call;
        let mut url = Url::parse(&self.base_url.join(endpoint.path()))
            .map_err(request_error)?;
        if let Some(query) = query {
            let mut pairs = url.query_pairs_mut();
            pairs.append_pair("limit", &query.limit.to_string());
            if let Some(item_type) = query.item_type {
                pairs.append_pair("item_type", item_type.as_str());
            }
        }

        let mut request = ApiRequest::new(endpoint.method(), url.as_str())
            .with_body(body)
            .map_err(request_error)?;

        if let Some(token) = self.token {
            request = request
                .with_header("Authorization", token.bearer())
                .map_err(request_error)?;
        }

        debug!(
            endpoint = %endpoint,
            authenticated = self.token.is_some(),
            body_bytes = request.body().len(),
            "request built"
        );
        Ok(request)
    }
}

fn request_error(e: impl fmt::Display) -> ApiError {
    ApiError::new(ErrorKind::Request, e.to_string())
}

// --- Responses ---

/// Normalizes a finished request: 2xx decodes as `R`, other statuses use the
/// body's `detail` or the endpoint's fallback, no response is a network error.
pub fn interpret<R: DeserializeOwned>(endpoint: Endpoint, outcome: HttpOutcome) -> Result<R, ApiError> {
    match outcome {
        Ok(mut response) => {
            let status = response.status();
            let body = response.take_body().unwrap_or_default();

            if status.is_success() {
                serde_json::from_slice(&body).map_err(|e| {
                    warn!(endpoint = %endpoint, error = %e, "unexpected response body");
                    ApiError::decode()
                })
            } else {
                let status = u16::from(status);
                debug!(endpoint = %endpoint, status, "request failed");
                Err(ApiError::from_http_status(
                    status,
                    Some(&body),
                    endpoint.failure_message(),
                ))
            }
        }
        Err(crux_http::HttpError::Http { code, body, .. }) => {
            let status = u16::from(code);
            debug!(endpoint = %endpoint, status, "request failed");
            Err(ApiError::from_http_status(
                status,
                body.as_deref(),
                endpoint.failure_message(),
            ))
        }
        Err(crux_http::HttpError::Json(e)) => {
            warn!(endpoint = %endpoint, error = %e, "unexpected response body");
            Err(ApiError::decode())
        }
        Err(e) => {
            warn!(endpoint = %endpoint, error = %e, "no response");
            Err(ApiError::network())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validation::TextInput;
    use crate::NETWORK_ERROR_MESSAGE;

    fn jpeg() -> InputPayload {
        InputPayload::File(FileInput {
            name: "cat.jpg".into(),
            mime_type: "image/jpeg".into(),
            bytes: vec![0xFF, 0xD8, 0xFF],
        })
    }

    fn url_input(value: &str) -> InputPayload {
        InputPayload::Text(TextInput {
            value: value.into(),
        })
    }

    fn form(call: &ApiCall) -> &MultipartForm {
        match call.body() {
            RequestBody::Multipart(form) => form,
            other => panic!("expected multipart, got {other:?}"),
        }
    }

    #[test]
    fn endpoints_match_backend_routes() {
        assert_eq!(Endpoint::Login.path(), "/auth/login");
        assert_eq!(Endpoint::Signup.method(), HttpMethod::Post);
        assert_eq!(Endpoint::History.method(), HttpMethod::Get);
        assert!(!Endpoint::Login.is_authenticated());
        assert!(Endpoint::Summarize.is_authenticated());
    }

    #[test]
    fn credentials_debug_hides_password() {
        let creds = Credentials {
            username: "ada".into(),
            password: "hunter2".into(),
        };
        assert!(!format!("{creds:?}").contains("hunter2"));
    }

    #[test]
    fn login_is_json_without_token() {
        let base = BaseUrl::default();
        let call = ApiCall::login(&Credentials {
            username: "ada".into(),
            password: "pw".into(),
        })
        .unwrap();
        let request = ApiClient::new(&base, None).request(call).unwrap();

        assert_eq!(request.url(), "http://localhost:8000/auth/login");
        assert_eq!(request.method(), HttpMethod::Post);
        assert_eq!(request.headers().get("Content-Type"), Some("application/json"));
        assert!(request.headers().get("Authorization").is_none());
        let body: serde_json::Value = serde_json::from_slice(request.body()).unwrap();
        assert_eq!(body, serde_json::json!({"username": "ada", "password": "pw"}));
    }

    #[test]
    fn bearer_token_attached_when_present() {
        let base = BaseUrl::default();
        let token = Token::new("abc123").unwrap();
        let call = ApiCall::analyze_image(&jpeg(), None).unwrap();
        let request = ApiClient::new(&base, Some(&token)).request(call).unwrap();

        assert_eq!(request.headers().get("authorization"), Some("Bearer abc123"));
        assert!(request
            .headers()
            .get("content-type")
            .unwrap()
            .starts_with("multipart/form-data; boundary="));
    }

    #[test]
    fn image_call_carries_file_and_prompt() {
        let call = ApiCall::analyze_image(&jpeg(), Some("  what breed?  ")).unwrap();
        let body = String::from_utf8_lossy(&form(&call).encode()).into_owned();
        assert!(body.contains("name=\"file\"; filename=\"cat.jpg\""));
        assert!(body.contains("Content-Type: image/jpeg"));
        assert!(body.contains("what breed?"));

        let blank = ApiCall::analyze_image(&jpeg(), Some("   ")).unwrap();
        assert!(!form(&blank).has_field("prompt"));

        assert!(ApiCall::analyze_image(&url_input("https://x"), None).is_err());
    }

    #[test]
    fn summarize_carries_exactly_one_source() {
        let by_file = ApiCall::summarize(
            &InputPayload::File(FileInput {
                name: "a.pdf".into(),
                mime_type: "application/pdf".into(),
                bytes: vec![b'%'],
            }),
            None,
        );
        assert!(form(&by_file).has_field("file"));
        assert!(!form(&by_file).has_field("url"));

        let by_url = ApiCall::summarize(&url_input("https://example.com"), Some(150));
        assert!(form(&by_url).has_field("url"));
        assert!(!form(&by_url).has_field("file"));
        assert!(form(&by_url).has_field("max_length"));
    }

    #[test]
    fn history_query_string() {
        let base = BaseUrl::parse("https://api.example.com/v1").unwrap();
        let token = Token::new("t").unwrap();
        let query = HistoryQuery::new(5).with_item_type(Some(HistoryItemType::DocumentSummary));
        let request = ApiClient::new(&base, Some(&token))
            .request(ApiCall::history(query))
            .unwrap();

        assert_eq!(request.method(), HttpMethod::Get);
        assert_eq!(
            request.url(),
            "https://api.example.com/v1/history?limit=5&item_type=document_summary"
        );
        assert!(request.body().is_empty());
    }

    #[test]
    fn auth_grant_rejects_blank_token() {
        let grant: AuthGrant =
            serde_json::from_str(r#"{"token":"abc123","message":"Login successful"}"#).unwrap();
        assert_eq!(grant.token.expose(), "abc123");
        assert!(!format!("{grant:?}").contains("abc123"));

        assert!(serde_json::from_str::<AuthGrant>(r#"{"token":""}"#).is_err());
    }

    #[test]
    fn payloads_decode_leniently() {
        let analysis: ImageAnalysis = serde_json::from_str(
            r#"{"filename":"cat.jpg","description":"A cat.","image_size":[640,480],"model_used":"m"}"#,
        )
        .unwrap();
        assert_eq!(analysis.image_size, Some(ImageSize(640, 480)));

        let minimal: ImageAnalysis =
            serde_json::from_str(r#"{"filename":"cat.jpg","description":"A cat."}"#).unwrap();
        assert!(minimal.model_used.is_none());

        let summary: Summary = serde_json::from_str(
            r#"{"summary":"short","source":"a.pdf","compression_ratio":12.5,"extra":true}"#,
        )
        .unwrap();
        assert_eq!(summary.compression_ratio, Some(12.5));

        // The backend omits `total` for users with no history yet.
        let empty: HistoryPage = serde_json::from_str(r#"{"history":[]}"#).unwrap();
        assert!(empty.history.is_empty());
        assert!(empty.total.is_none());

        let page: HistoryPage = serde_json::from_str(
            r#"{"history":[{"type":"image_analysis","input_data":"cat.jpg","output":"A cat.","timestamp":"2024-05-01T10:00:00"}],"total":1}"#,
        )
        .unwrap();
        assert_eq!(page.history[0].kind, "image_analysis");
    }

    #[test]
    fn transport_failure_is_network_error() {
        let outcome: HttpOutcome = Err(crux_http::HttpError::Io("connection refused".into()));
        let err = interpret::<ImageAnalysis>(Endpoint::AnalyzeImage, outcome).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Network);
        assert_eq!(err.message, NETWORK_ERROR_MESSAGE);

        let timeout: HttpOutcome = Err(crux_http::HttpError::Timeout);
        assert_eq!(
            interpret::<Summary>(Endpoint::Summarize, timeout).unwrap_err().kind,
            ErrorKind::Network
        );
    }
}
