mod http;
mod kv;

pub use self::http::{
    ApiRequest, HttpCapability, HttpError, HttpHeaders, HttpMethod, HttpOutcome, MultipartForm,
    RequestBody,
};
pub use self::kv::{KvCapability, StorageKey, StorageKeyError};

pub use crux_core::render::Render;
pub use crux_http::Http;
pub use crux_kv::KeyValue;

use crate::app::App;
use crate::event::Event;

// Field types are spelled out so the generated variants read
// `Effect::Http`, `Effect::KeyValue` and `Effect::Render`.
#[derive(crux_core::macros::Effect)]
pub struct Capabilities {
    pub http: Http<Event>,
    pub key_value: KeyValue<Event>,
    pub render: Render<Event>,
}
