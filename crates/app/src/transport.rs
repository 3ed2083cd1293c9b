//! `reqwest`-backed implementation of the core's JSON transport.

use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::{Client, Response};
use serde_json::Value;
use snorkel_core::{JsonReply, JsonTransport, TransportError};
use tracing::debug;

#[derive(Clone, Debug)]
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("snorkel/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self { client })
    }
}

fn transport_error(url: &str, err: reqwest::Error) -> TransportError {
    if err.is_timeout() {
        TransportError::Timeout { url: url.into() }
    } else {
        TransportError::Request {
            url: url.into(),
            reason: err.to_string(),
        }
    }
}

/// Read the whole body; anything that is not JSON becomes `body: None`.
async fn into_reply(url: &str, response: Response) -> Result<JsonReply, TransportError> {
    let status = response.status();
    let bytes = response
        .bytes()
        .await
        .map_err(|err| transport_error(url, err))?;
    let body = serde_json::from_slice::<Value>(&bytes).ok();
    if body.is_none() && !bytes.is_empty() {
        debug!(url, status = status.as_u16(), len = bytes.len(), "non-JSON response body");
    }
    Ok(JsonReply::new(
        status.as_u16(),
        status.canonical_reason().unwrap_or_default(),
        body,
    ))
}

impl JsonTransport for ReqwestTransport {
    async fn get_json(&self, url: &str) -> Result<JsonReply, TransportError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|err| transport_error(url, err))?;
        into_reply(url, response).await
    }

    async fn post_json(&self, url: &str, body: &Value) -> Result<JsonReply, TransportError> {
        let response = self
            .client
            .post(url)
            .json(body)
            .send()
            .await
            .map_err(|err| transport_error(url, err))?;
        into_reply(url, response).await
    }
}
