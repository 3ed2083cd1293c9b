//! Catalog/mask relay shared by the HTTP proxy and the headless commands.
//!
//! Upstream failures never surface as HTTP errors to the browser: a non-2xx
//! or non-JSON answer becomes `200 {"error": "Server returned an error: <status>"}`.
//! Only a request that never got an answer maps to `502`.

use metrics::counter;
use serde_json::{Value, json};
use snorkel_core::{JsonReply, JsonTransport, TransportError};
use tracing::{debug, warn};

/// Proxy base the headless commands hand to the core; requests under it are
/// relayed in-process instead of going over HTTP.
pub const LOCAL_PROXY_BASE: &str = "snorkel+local://proxy";

#[derive(Clone, Debug, PartialEq)]
pub enum Upstream {
    Get,
    Post(Value),
}

#[derive(Clone, Debug, PartialEq)]
/// What the proxy answers with.
pub struct Relayed {
    pub status: u16,
    pub body: Value,
}

impl Relayed {
    fn ok(body: Value) -> Self {
        Self { status: 200, body }
    }

    pub fn into_reply(self) -> JsonReply {
        let status_text = match self.status {
            200 => "OK",
            502 => "Bad Gateway",
            _ => "",
        };
        JsonReply::new(self.status, status_text, Some(self.body))
    }
}

/// Forward one request to `url` and shape the answer for the browser.
pub async fn relay<T: JsonTransport>(
    transport: &T,
    route: &'static str,
    url: Option<&str>,
    upstream: Upstream,
) -> Relayed {
    counter!("snorkel_proxy_requests_total", "route" => route).increment(1);

    let Some(url) = url.map(str::trim).filter(|url| !url.is_empty()) else {
        debug!(route, "no upstream URL given; answering with an empty object");
        return Relayed::ok(json!({}));
    };

    let reply = match &upstream {
        Upstream::Get => transport.get_json(url).await,
        Upstream::Post(payload) => transport.post_json(url, payload).await,
    };

    let reply = match reply {
        Ok(reply) => reply,
        Err(err) => {
            warn!(route, "upstream request failed: {err}");
            counter!("snorkel_proxy_upstream_errors_total", "route" => route).increment(1);
            return Relayed {
                status: 502,
                body: json!({ "error": err.to_string() }),
            };
        }
    };

    let success = reply.is_success();
    let status = reply.status;
    match reply.body {
        Some(body) if success => Relayed::ok(body),
        body => {
            let detail = body.map(|body| body.to_string()).unwrap_or_default();
            warn!(route, status, %url, "upstream returned an error: {detail}");
            counter!("snorkel_proxy_upstream_errors_total", "route" => route).increment(1);
            Relayed::ok(json!({ "error": format!("Server returned an error: {status}") }))
        }
    }
}

/// Answers `POST {LOCAL_PROXY_BASE}/catalog` and `/mask` itself and passes
/// everything else to the wrapped transport.
#[derive(Clone, Debug)]
pub struct InProcessProxy<T> {
    upstream: T,
}

impl<T> InProcessProxy<T> {
    pub fn new(upstream: T) -> Self {
        Self { upstream }
    }
}

impl<T: JsonTransport> JsonTransport for InProcessProxy<T> {
    async fn get_json(&self, url: &str) -> Result<JsonReply, TransportError> {
        self.upstream.get_json(url).await
    }

    async fn post_json(&self, url: &str, body: &Value) -> Result<JsonReply, TransportError> {
        let relayed = match url.strip_prefix(LOCAL_PROXY_BASE) {
            Some("/catalog") => {
                let target = body.get("catalogUrl").and_then(Value::as_str);
                relay(&self.upstream, "catalog", target, Upstream::Get).await
            }
            Some("/mask") => {
                let target = body.get("maskUrl").and_then(Value::as_str);
                let payload = body.get("payload").cloned().unwrap_or_else(|| json!({}));
                relay(&self.upstream, "mask", target, Upstream::Post(payload)).await
            }
            _ => return self.upstream.post_json(url, body).await,
        };
        Ok(relayed.into_reply())
    }
}
