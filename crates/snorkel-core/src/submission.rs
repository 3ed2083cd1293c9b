//! Submission coordinator: validate -> clear -> POST -> interpret -> render.
//!
//! Each attempt gets a generation number. Starting a new attempt supersedes
//! any reply still outstanding from an older one; that reply is discarded
//! without touching the map or the coordinator state.

use std::{fmt, str::FromStr};

use serde::Deserialize;
use serde_json::{Value, json};
use thiserror::Error;
use tracing::{debug, warn};

use crate::bounds::BoundingBox;
use crate::geometry::{Geometry, GeometryError, geometry_from_value};
use crate::transport::{JsonReply, JsonTransport, TransportError};
use crate::view::{MapEngine, RenderedLayer, ViewController};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
/// Mask service API flavour; selects URLs and payload shape.
pub enum ApiVersion {
    V1,
    #[default]
    V2,
}

impl ApiVersion {
    pub const ALL: [ApiVersion; 2] = [ApiVersion::V1, ApiVersion::V2];

    pub fn label(self) -> &'static str {
        match self {
            ApiVersion::V1 => "v1",
            ApiVersion::V2 => "v2",
        }
    }

    pub fn catalog_url(self, host: &str) -> String {
        let host = trim_host(host);
        match self {
            ApiVersion::V1 => format!("{host}/catalog"),
            ApiVersion::V2 => format!("{host}/v2/catalog"),
        }
    }

    pub fn mask_url(self, host: &str, layer: &str) -> String {
        let host = trim_host(host);
        match self {
            ApiVersion::V1 => format!("{host}/mask"),
            ApiVersion::V2 => format!("{host}/v2/{layer}/mask"),
        }
    }

    pub fn mask_payload(self, layer: &str, version: &str, geometry: Value) -> Value {
        match self {
            ApiVersion::V1 => json!({
                "raster": layer,
                "geometry": geometry,
                "version": version,
            }),
            ApiVersion::V2 => json!({
                "version": version,
                "geometry": geometry,
            }),
        }
    }
}

impl fmt::Display for ApiVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for ApiVersion {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "v1" | "1" => Ok(ApiVersion::V1),
            "v2" | "2" => Ok(ApiVersion::V2),
            other => Err(format!("unknown API version {other:?} (expected v1 or v2)")),
        }
    }
}

fn trim_host(host: &str) -> &str {
    host.trim().trim_end_matches('/')
}

#[derive(Clone, Debug, PartialEq)]
/// Form state captured at submit time. `geometry` is the raw user text.
pub struct SubmissionRequest {
    pub host: String,
    pub layer: String,
    pub version: String,
    pub geometry: String,
    pub api: ApiVersion,
}

#[derive(Clone, Debug, Error, PartialEq)]
pub enum SubmissionError {
    #[error(transparent)]
    InvalidGeometry(#[from] GeometryError),
    #[error("missing required field `{0}`")]
    MissingField(&'static str),
    #[error("{0}")]
    NetworkError(String),
    #[error("{0}")]
    ServerError(String),
    #[error("submission was superseded by a newer one")]
    Superseded,
}

impl SubmissionError {
    /// Errors raised before any network traffic.
    pub fn is_local(&self) -> bool {
        matches!(
            self,
            SubmissionError::InvalidGeometry(_) | SubmissionError::MissingField(_)
        )
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub enum SubmissionState {
    #[default]
    Idle,
    InFlight {
        generation: u64,
    },
    Succeeded(RenderedLayer),
    Failed(SubmissionError),
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
/// Successful mask service body.
pub struct MaskReply {
    pub image: String,
    pub bounds: BoundingBox,
}

#[derive(Clone, Debug, PartialEq)]
/// A validated request on its way to the mask service.
pub struct SubmissionTicket {
    generation: u64,
    url: String,
    payload: Value,
    geometry: Geometry,
}

impl SubmissionTicket {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn payload(&self) -> &Value {
        &self.payload
    }

    pub fn geometry(&self) -> &Geometry {
        &self.geometry
    }
}

/// Validate a request and build the mask call it describes.
pub fn prepare_request(
    request: &SubmissionRequest,
    generation: u64,
) -> Result<SubmissionTicket, SubmissionError> {
    let text = request.geometry.trim();
    if text.is_empty() {
        return Err(SubmissionError::MissingField("geometry"));
    }
    let raw: Value =
        serde_json::from_str(text).map_err(|err| GeometryError::Syntax(err.to_string()))?;
    let geometry = geometry_from_value(raw.clone())?;

    let host = request.host.trim();
    let layer = request.layer.trim();
    let version = request.version.trim();
    if host.is_empty() {
        return Err(SubmissionError::MissingField("host"));
    }
    if layer.is_empty() {
        return Err(SubmissionError::MissingField("layer"));
    }
    if version.is_empty() {
        return Err(SubmissionError::MissingField("version"));
    }

    Ok(SubmissionTicket {
        generation,
        url: request.api.mask_url(host, layer),
        payload: request.api.mask_payload(layer, version, raw),
        geometry,
    })
}

/// Turn a transport outcome into a mask reply or a surfaced error.
pub fn interpret_reply(
    reply: Result<JsonReply, TransportError>,
) -> Result<MaskReply, SubmissionError> {
    let reply = reply.map_err(|err| SubmissionError::NetworkError(err.to_string()))?;
    let status_text = if reply.status_text.is_empty() {
        format!("HTTP {}", reply.status)
    } else {
        reply.status_text.clone()
    };

    let Some(body) = reply.body.as_ref() else {
        return Err(SubmissionError::NetworkError(status_text));
    };

    if let Some(message) = reply.error_message() {
        return Err(SubmissionError::ServerError(message));
    }
    if !reply.is_success() {
        return Err(SubmissionError::ServerError(status_text));
    }

    MaskReply::deserialize(body)
        .map_err(|err| SubmissionError::NetworkError(format!("unusable mask response: {err}")))
}

/// Send a prepared ticket through `transport` and interpret the answer.
pub async fn request_mask<T: JsonTransport>(
    transport: &T,
    ticket: &SubmissionTicket,
) -> Result<MaskReply, SubmissionError> {
    debug!(url = %ticket.url, generation = ticket.generation, "posting mask request");
    let reply = transport.post_json(&ticket.url, &ticket.payload).await;
    interpret_reply(reply)
}

pub struct SubmissionCoordinator<T> {
    transport: T,
    state: SubmissionState,
    generation: u64,
}

impl<T: JsonTransport> SubmissionCoordinator<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            state: SubmissionState::Idle,
            generation: 0,
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn state(&self) -> &SubmissionState {
        &self.state
    }

    pub fn is_in_flight(&self) -> bool {
        matches!(self.state, SubmissionState::InFlight { .. })
    }

    /// Steps 1 and 2 of a cycle: validate, then clear the map.
    ///
    /// A validation failure makes no network call, leaves the map as it was
    /// and does not supersede a submission already in flight.
    pub fn begin<E: MapEngine>(
        &mut self,
        request: &SubmissionRequest,
        view: &mut ViewController<E>,
    ) -> Result<SubmissionTicket, SubmissionError> {
        let ticket = match prepare_request(request, self.generation.saturating_add(1)) {
            Ok(ticket) => ticket,
            Err(err) => {
                warn!("submission rejected before sending: {err}");
                if !self.is_in_flight() {
                    self.state = SubmissionState::Failed(err.clone());
                }
                return Err(err);
            }
        };

        if let SubmissionState::InFlight { generation } = self.state {
            debug!(generation, "superseding in-flight submission");
        }
        self.generation = ticket.generation;
        view.clear();
        self.state = SubmissionState::InFlight {
            generation: ticket.generation,
        };
        Ok(ticket)
    }

    pub async fn dispatch(&self, ticket: &SubmissionTicket) -> Result<MaskReply, SubmissionError> {
        request_mask(&self.transport, ticket).await
    }

    /// Apply the outcome of `ticket`'s request. Stale tickets are dropped.
    pub fn finish<E: MapEngine>(
        &mut self,
        ticket: SubmissionTicket,
        outcome: Result<MaskReply, SubmissionError>,
        view: &mut ViewController<E>,
    ) -> Result<RenderedLayer, SubmissionError> {
        if ticket.generation != self.generation {
            debug!(
                stale = ticket.generation,
                current = self.generation,
                "discarding superseded mask reply"
            );
            return Err(SubmissionError::Superseded);
        }

        match outcome {
            Ok(reply) => {
                let layer = view.render_layer(ticket.geometry, reply.image, reply.bounds);
                debug!(generation = ticket.generation, "mask rendered");
                self.state = SubmissionState::Succeeded(layer);
                Ok(layer)
            }
            Err(err) => {
                warn!("mask submission failed: {err}");
                self.state = SubmissionState::Failed(err.clone());
                Err(err)
            }
        }
    }

    /// Run a whole cycle with exclusive access to the view.
    pub async fn submit<E: MapEngine>(
        &mut self,
        request: &SubmissionRequest,
        view: &mut ViewController<E>,
    ) -> Result<RenderedLayer, SubmissionError> {
        let ticket = self.begin(request, view)?;
        let outcome = self.dispatch(&ticket).await;
        self.finish(ticket, outcome, view)
    }
}
