#![allow(dead_code)]

use crux_core::testing::AppTester;
use crux_core::Request;
use crux_http::protocol::{HttpRequest, HttpResponse, HttpResult};
use crux_kv::value::Value;
use crux_kv::{KeyValueOperation, KeyValueResponse, KeyValueResult};
use serde_json::json;
use shared::api::Credentials;
use shared::validation::{FileInput, InputPayload};
use shared::{App, Effect, Event, Model};

pub type Tester = AppTester<App, Effect>;

pub fn http_requests(effects: Vec<Effect>) -> Vec<Request<HttpRequest>> {
    effects
        .into_iter()
        .filter_map(|e| match e {
            Effect::Http(request) => Some(request),
            _ => None,
        })
        .collect()
}

pub fn kv_requests(effects: Vec<Effect>) -> Vec<Request<KeyValueOperation>> {
    effects
        .into_iter()
        .filter_map(|e| match e {
            Effect::KeyValue(request) => Some(request),
            _ => None,
        })
        .collect()
}

pub fn renders(effects: &[Effect]) -> bool {
    effects.iter().any(|e| matches!(e, Effect::Render(_)))
}

pub fn header<'a>(request: &'a HttpRequest, name: &str) -> Option<&'a str> {
    request
        .headers
        .iter()
        .find(|h| h.name.eq_ignore_ascii_case(name))
        .map(|h| h.value.as_str())
}

/// Resolves an HTTP request and feeds the resulting events back into the app.
pub fn resolve_http(
    app: &Tester,
    model: &mut Model,
    request: &mut Request<HttpRequest>,
    result: HttpResult,
) -> Vec<Effect> {
    let update = app.resolve(request, result).expect("http request resolves");
    let mut effects = update.effects;
    for event in update.events {
        effects.extend(app.update(event, model).effects);
    }
    effects
}

pub fn resolve_kv(
    app: &Tester,
    model: &mut Model,
    request: &mut Request<KeyValueOperation>,
    result: KeyValueResult,
) -> Vec<Effect> {
    let update = app.resolve(request, result).expect("kv request resolves");
    let mut effects = update.effects;
    for event in update.events {
        effects.extend(app.update(event, model).effects);
    }
    effects
}

pub fn ok_json(body: serde_json::Value) -> HttpResult {
    HttpResult::Ok(HttpResponse::ok().json(body).build())
}

pub fn status_json(status: u16, body: serde_json::Value) -> HttpResult {
    HttpResult::Ok(HttpResponse::status(status).json(body).build())
}

pub fn stored(bytes: &[u8]) -> KeyValueResult {
    KeyValueResult::Ok {
        response: KeyValueResponse::Get {
            value: Value::Bytes(bytes.to_vec()),
        },
    }
}

pub fn nothing_stored() -> KeyValueResult {
    KeyValueResult::Ok {
        response: KeyValueResponse::Get { value: Value::None },
    }
}

pub fn credentials(username: &str, password: &str) -> Credentials {
    Credentials {
        username: username.into(),
        password: password.into(),
    }
}

pub fn jpeg(name: &str) -> InputPayload {
    InputPayload::File(FileInput {
        name: name.into(),
        mime_type: "image/jpeg".into(),
        bytes: vec![0xFF; 2 * 1024 * 1024],
    })
}

pub fn file(name: &str, mime_type: &str) -> FileInput {
    FileInput {
        name: name.into(),
        mime_type: mime_type.into(),
        bytes: b"%PDF-1.7".to_vec(),
    }
}

/// Logs in through the auth endpoint and returns the effects of the response.
pub fn sign_in(app: &Tester, model: &mut Model, token: &str) -> Vec<Effect> {
    let update = app.update(Event::CredentialsSubmitted(credentials("ada", "pw")), model);
    let mut request = http_requests(update.effects).remove(0);
    resolve_http(
        app,
        model,
        &mut request,
        ok_json(json!({ "token": token, "message": "Login successful" })),
    )
}
