//! HTTP seam used for every exchange the core makes.
//!
//! The core only builds requests and interprets replies; moving bytes is the
//! implementor's job. Futures are not required to be `Send` since the engine
//! runs on a single event loop.

use std::future::Future;

use serde_json::Value;
use thiserror::Error;

#[derive(Clone, Debug, Error, PartialEq)]
pub enum TransportError {
    #[error("request to {url} failed: {reason}")]
    Request { url: String, reason: String },
    #[error("request to {url} timed out")]
    Timeout { url: String },
}

#[derive(Clone, Debug, PartialEq)]
/// Status line plus the body decoded as JSON, when it was JSON.
pub struct JsonReply {
    pub status: u16,
    pub status_text: String,
    pub body: Option<Value>,
}

impl JsonReply {
    pub fn new(status: u16, status_text: impl Into<String>, body: Option<Value>) -> Self {
        Self {
            status,
            status_text: status_text.into(),
            body,
        }
    }

    pub fn ok(body: Value) -> Self {
        Self::new(200, "OK", Some(body))
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// First of `message` or `error` found on a JSON object body.
    pub fn error_message(&self) -> Option<String> {
        let body = self.body.as_ref()?.as_object()?;
        ["message", "error"]
            .iter()
            .find_map(|key| body.get(*key).filter(|v| !v.is_null()))
            .map(|value| match value {
                Value::String(text) => text.clone(),
                other => other.to_string(),
            })
    }
}

pub trait JsonTransport {
    fn get_json(&self, url: &str) -> impl Future<Output = Result<JsonReply, TransportError>>;

    fn post_json(
        &self,
        url: &str,
        body: &Value,
    ) -> impl Future<Output = Result<JsonReply, TransportError>>;
}

impl<T: JsonTransport + ?Sized> JsonTransport for &T {
    fn get_json(&self, url: &str) -> impl Future<Output = Result<JsonReply, TransportError>> {
        (**self).get_json(url)
    }

    fn post_json(
        &self,
        url: &str,
        body: &Value,
    ) -> impl Future<Output = Result<JsonReply, TransportError>> {
        (**self).post_json(url, body)
    }
}
