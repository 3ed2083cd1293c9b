//! Terminal front end for the map session: drives a full catalog or
//! submission cycle with a map engine that only logs what it is asked to draw.

use std::path::Path;

use anyhow::{Context, Result, anyhow, bail};
use base64::{Engine as _, engine::general_purpose::STANDARD};
use serde::Serialize;
use serde_json::{Map, Value, json};
use snorkel_core::{
    BoundingBox, Feature, FeatureHandle, GeometryChoice, GeometryPresets, JsonTransport,
    MapEngine, MapSession, Overlay, OverlayHandle, SessionConfig, Viewport,
};
use tracing::{debug, info, warn};

use crate::config::{CatalogConfig, GeometrySource, SubmitConfig, UpstreamConfig};
use crate::proxy::{InProcessProxy, LOCAL_PROXY_BASE};
use crate::transport::ReqwestTransport;

#[derive(Debug, Default)]
/// Map engine without a screen. Counts what is currently drawn.
pub(crate) struct TracingMap {
    features: usize,
    overlays: usize,
}

impl MapEngine for TracingMap {
    fn show_feature(&mut self, handle: FeatureHandle, feature: &Feature) {
        debug!(handle = handle.0, kind = feature.geometry.kind(), "show feature");
        self.features += 1;
    }

    fn remove_feature(&mut self, handle: FeatureHandle) {
        debug!(handle = handle.0, "remove feature");
        self.features = self.features.saturating_sub(1);
    }

    fn show_overlay(&mut self, handle: OverlayHandle, overlay: &Overlay) {
        debug!(handle = handle.0, bytes = overlay.image.len(), "show overlay");
        self.overlays += 1;
    }

    fn remove_overlay(&mut self, handle: OverlayHandle) {
        debug!(handle = handle.0, "remove overlay");
        self.overlays = self.overlays.saturating_sub(1);
    }

    fn fit_bounds(&mut self, bounds: BoundingBox) {
        info!(
            west = bounds.west,
            south = bounds.south,
            east = bounds.east,
            north = bounds.north,
            "fit map to bounds"
        );
    }

    fn set_view(&mut self, viewport: Viewport) {
        debug!(
            lng = viewport.center.lng(),
            lat = viewport.center.lat(),
            zoom = viewport.zoom,
            "set view"
        );
    }
}

#[derive(Debug, Serialize)]
/// Printed after a successful `submit`.
pub(crate) struct SubmitReport {
    pub layer: String,
    pub version: String,
    pub bounds: BoundingBox,
    /// Features and overlays left on the map after rendering.
    pub features: usize,
    pub overlays: usize,
    #[serde(skip)]
    pub image: String,
}

fn session_config(upstream: &UpstreamConfig) -> SessionConfig {
    SessionConfig {
        default_host: upstream.host.clone(),
        proxy_base: LOCAL_PROXY_BASE.into(),
        geometries_url: None,
        api: upstream.api,
        ..SessionConfig::default()
    }
}

fn block_on<F: Future>(future: F) -> Result<F::Output> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to start async runtime")?;
    Ok(runtime.block_on(future))
}

pub(crate) fn run_submit(config: SubmitConfig) -> Result<()> {
    let transport = ReqwestTransport::new(config.upstream.timeout)?;
    let output = config.output.clone();
    let report = block_on(submit(config, transport))??;

    if let Some(path) = output {
        let (mime, bytes) = decode_data_uri(&report.image)?;
        std::fs::write(&path, &bytes)
            .with_context(|| format!("Failed to write mask image to {}", path.display()))?;
        info!(path = %path.display(), mime = %mime, bytes = bytes.len(), "wrote mask image");
    }
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

pub(crate) fn run_catalog(config: CatalogConfig) -> Result<()> {
    let transport = ReqwestTransport::new(config.upstream.timeout)?;
    let session = block_on(load_catalog(&config.upstream, transport))??;
    let panel = session.panel();

    if config.json {
        let layers: Map<String, Value> = panel
            .catalog()
            .layers()
            .iter()
            .map(|layer| (layer.name.clone(), json!({ "versions": layer.versions })))
            .collect();
        println!("{}", serde_json::to_string_pretty(&Value::Object(layers))?);
        return Ok(());
    }

    for layer in panel.catalog().layers() {
        println!("{}: {}", layer.name, layer.versions.join(", "));
    }
    match (panel.layer(), panel.version()) {
        (Some(layer), Some(version)) => println!("default: {layer} {version}"),
        _ => println!("default: none (no layer has versions)"),
    }
    Ok(())
}

async fn load_catalog<T: JsonTransport>(
    upstream: &UpstreamConfig,
    transport: T,
) -> Result<MapSession<TracingMap, InProcessProxy<T>>> {
    let mut session = MapSession::new(
        TracingMap::default(),
        InProcessProxy::new(transport),
        session_config(upstream),
    );
    session
        .refresh_catalog()
        .await
        .with_context(|| format!("Failed to load catalog from {}", upstream.host))?;
    Ok(session)
}

fn load_presets(path: &Path) -> Result<GeometryPresets> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read geometries file {}", path.display()))?;
    let value: Value = serde_json::from_str(&text)
        .with_context(|| format!("Geometries file {} is not valid JSON", path.display()))?;
    Ok(GeometryPresets::from_value(value)?)
}

/// One submission cycle: catalog (when needed), presets, form, submit.
pub(crate) async fn submit<T: JsonTransport>(
    config: SubmitConfig,
    transport: T,
) -> Result<SubmitReport> {
    let mut session = MapSession::new(
        TracingMap::default(),
        InProcessProxy::new(transport),
        session_config(&config.upstream),
    );

    if config.layer.is_none() || config.version.is_none() {
        if let Err(err) = session.refresh_catalog().await {
            warn!("continuing without a catalog: {err}");
        }
    }

    let presets = match config.geometries.as_deref() {
        Some(path) => load_presets(path)?,
        None => GeometryPresets::default(),
    };
    let panel = session.panel_mut();
    panel.apply_presets(presets);
    if let Some(layer) = config.layer.as_deref() {
        panel.select_layer(layer);
    }
    if let Some(version) = config.version.as_deref() {
        panel.select_version(version);
    }
    match config.geometry {
        GeometrySource::Default => {}
        GeometrySource::Inline(text) => panel.set_custom_geometry(text),
        GeometrySource::File(path) => {
            let text = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read geometry file {}", path.display()))?;
            panel.set_custom_geometry(text);
        }
        GeometrySource::Preset(name) => {
            if panel.presets().get(&name).is_none() {
                let known: Vec<&str> = panel.presets().names().collect();
                bail!("Unknown preset {name:?}; available: {}", known.join(", "));
            }
            panel.select_geometry(GeometryChoice::Preset(name));
        }
    }

    if !session.submit_enabled() {
        let panel = session.panel();
        let missing = if panel.layer().is_none() {
            "layer (pass --layer)"
        } else if panel.version().is_none() {
            "version (pass --version)"
        } else {
            "geometry"
        };
        bail!("Cannot submit: no {missing}");
    }

    let request = session.panel().build_request();
    info!(
        host = %request.host,
        layer = %request.layer,
        version = %request.version,
        api = %request.api,
        "submitting mask request"
    );
    let rendered = session.submit().await.context("Mask submission failed")?;

    let view = session.view();
    let image = view
        .store()
        .overlay(rendered.overlay)
        .map(|overlay| overlay.image.clone())
        .ok_or_else(|| anyhow!("Rendered overlay is missing from the store"))?;
    let map = view.engine();
    Ok(SubmitReport {
        layer: request.layer,
        version: request.version,
        bounds: rendered.bounds,
        features: map.features,
        overlays: map.overlays,
        image,
    })
}

/// Split a `data:<mime>;base64,<payload>` URI into its MIME type and bytes.
pub(crate) fn decode_data_uri(uri: &str) -> Result<(String, Vec<u8>)> {
    let rest = uri
        .strip_prefix("data:")
        .ok_or_else(|| anyhow!("Mask image is not a data URI"))?;
    let (meta, payload) = rest
        .split_once(',')
        .ok_or_else(|| anyhow!("Data URI has no payload"))?;
    let Some(mime) = meta.strip_suffix(";base64") else {
        bail!("Only base64 data URIs are supported, got {meta:?}");
    };
    let bytes = STANDARD
        .decode(payload.trim())
        .context("Data URI payload is not valid base64")?;
    Ok((mime.to_string(), bytes))
}
