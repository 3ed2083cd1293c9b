//! Layer catalog and geometry presets fetched at startup.
//!
//! Both keep the order the server sent, which decides the default selection.

use serde::Deserialize;
use serde_json::{Value, json};
use thiserror::Error;
use tracing::{debug, warn};

use crate::geometry::{Geometry, geometry_from_value};
use crate::transport::{JsonReply, JsonTransport, TransportError};

#[derive(Clone, Debug, Error, PartialEq)]
pub enum CatalogError {
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("{0}")]
    Server(String),
    #[error("malformed response: {0}")]
    Malformed(String),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CatalogLayer {
    pub name: String,
    pub versions: Vec<String>,
}

#[derive(Deserialize)]
struct LayerEntry {
    #[serde(default)]
    versions: Vec<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Catalog {
    layers: Vec<CatalogLayer>,
}

impl Catalog {
    pub fn new(layers: Vec<CatalogLayer>) -> Self {
        Self { layers }
    }

    /// Decode `{layer: {versions: [...]}}`. A top-level string `error` is a server failure.
    pub fn from_value(value: Value) -> Result<Self, CatalogError> {
        let entries = match value {
            Value::Object(entries) => entries,
            other => {
                return Err(CatalogError::Malformed(format!(
                    "catalog must be a JSON object, got {other}"
                )));
            }
        };
        if let Some(Value::String(message)) = entries.get("error") {
            return Err(CatalogError::Server(message.clone()));
        }

        let mut layers = Vec::with_capacity(entries.len());
        for (name, entry) in entries {
            match LayerEntry::deserialize(&entry) {
                Ok(entry) => layers.push(CatalogLayer {
                    name,
                    versions: entry.versions,
                }),
                Err(err) => warn!("skipping catalog entry {name:?}: {err}"),
            }
        }
        Ok(Self { layers })
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    pub fn layers(&self) -> &[CatalogLayer] {
        &self.layers
    }

    pub fn layer_names(&self) -> impl Iterator<Item = &str> {
        self.layers.iter().map(|layer| layer.name.as_str())
    }

    pub fn versions(&self, layer: &str) -> &[String] {
        self.layers
            .iter()
            .find(|entry| entry.name == layer)
            .map(|entry| entry.versions.as_slice())
            .unwrap_or(&[])
    }

    /// First layer that has at least one version.
    pub fn default_layer(&self) -> Option<&str> {
        self.layers
            .iter()
            .find(|layer| !layer.versions.is_empty())
            .map(|layer| layer.name.as_str())
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
/// Named geometries offered next to the custom text box.
pub struct GeometryPresets {
    entries: Vec<(String, Geometry)>,
}

impl GeometryPresets {
    pub fn new(entries: Vec<(String, Geometry)>) -> Self {
        Self { entries }
    }

    pub fn from_value(value: Value) -> Result<Self, CatalogError> {
        let Value::Object(map) = value else {
            return Err(CatalogError::Malformed(
                "geometry presets must be a JSON object".into(),
            ));
        };
        let mut entries = Vec::with_capacity(map.len());
        for (name, raw) in map {
            match geometry_from_value(raw) {
                Ok(geometry) => entries.push((name, geometry)),
                Err(err) => warn!("skipping geometry preset {name:?}: {err}"),
            }
        }
        Ok(Self { entries })
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(name, _)| name.as_str())
    }

    pub fn get(&self, name: &str) -> Option<&Geometry> {
        self.entries
            .iter()
            .find(|(entry, _)| entry == name)
            .map(|(_, geometry)| geometry)
    }

    pub fn first(&self) -> Option<(&str, &Geometry)> {
        self.entries
            .first()
            .map(|(name, geometry)| (name.as_str(), geometry))
    }
}

fn reply_body(reply: JsonReply, what: &str) -> Result<Value, CatalogError> {
    if !reply.is_success() {
        let message = reply
            .error_message()
            .unwrap_or_else(|| format!("{what} request failed: {} {}", reply.status, reply.status_text));
        return Err(CatalogError::Server(message));
    }
    reply
        .body
        .ok_or_else(|| CatalogError::Malformed(format!("{what} response was not JSON")))
}

/// Ask the proxy at `proxy_base` to fetch `catalog_url` on our behalf.
pub async fn fetch_catalog<T: JsonTransport>(
    transport: &T,
    proxy_base: &str,
    catalog_url: &str,
) -> Result<Catalog, CatalogError> {
    let url = format!("{}/catalog", proxy_base.trim().trim_end_matches('/'));
    debug!(%url, catalog_url, "fetching catalog");
    let reply = transport
        .post_json(&url, &json!({ "catalogUrl": catalog_url }))
        .await?;
    Catalog::from_value(reply_body(reply, "catalog")?)
}

pub async fn fetch_presets<T: JsonTransport>(
    transport: &T,
    url: &str,
) -> Result<GeometryPresets, CatalogError> {
    debug!(url, "fetching geometry presets");
    let reply = transport.get_json(url).await?;
    GeometryPresets::from_value(reply_body(reply, "geometry presets")?)
}
