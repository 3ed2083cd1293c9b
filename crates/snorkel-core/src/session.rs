//! Application state for one map page, owned in one place rather than
//! spread over globals.
//!
//! Startup fetches run as awaited tasks: the catalog is loaded before the
//! presets, and defaults are computed only once both have resolved.

use tracing::{info, warn};

use crate::catalog::{CatalogError, GeometryPresets, fetch_catalog, fetch_presets};
use crate::geometry::DrawnShape;
use crate::panel::ControlPanel;
use crate::splitter::{PanelSplitter, SplitLayout};
use crate::store::FeatureHandle;
use crate::submission::{
    ApiVersion, MaskReply, SubmissionCoordinator, SubmissionError, SubmissionState,
    SubmissionTicket,
};
use crate::transport::JsonTransport;
use crate::view::{MapEngine, RenderedLayer, ViewController, Viewport};

#[derive(Clone, Debug)]
pub struct SessionConfig {
    /// Mask service host the panel starts with.
    pub default_host: String,
    /// Base URL of the catalog proxy (`POST {proxy_base}/catalog`).
    pub proxy_base: String,
    /// Where to `GET` geometry presets; `None` skips the fetch.
    pub geometries_url: Option<String>,
    pub api: ApiVersion,
    pub home: Viewport,
    pub layout: SplitLayout,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            default_host: "http://localhost:5000".into(),
            proxy_base: "http://localhost:5000".into(),
            geometries_url: None,
            api: ApiVersion::default(),
            home: Viewport::default(),
            layout: SplitLayout::default(),
        }
    }
}

pub struct MapSession<E, T> {
    view: ViewController<E>,
    coordinator: SubmissionCoordinator<T>,
    panel: ControlPanel,
    splitter: PanelSplitter,
    config: SessionConfig,
}

impl<E: MapEngine, T: JsonTransport> MapSession<E, T> {
    pub fn new(engine: E, transport: T, config: SessionConfig) -> Self {
        Self {
            view: ViewController::new(engine, config.home),
            coordinator: SubmissionCoordinator::new(transport),
            panel: ControlPanel::new(config.default_host.clone(), config.api),
            splitter: PanelSplitter::new(config.layout),
            config,
        }
    }

    pub fn view(&self) -> &ViewController<E> {
        &self.view
    }

    pub fn view_mut(&mut self) -> &mut ViewController<E> {
        &mut self.view
    }

    pub fn panel(&self) -> &ControlPanel {
        &self.panel
    }

    pub fn panel_mut(&mut self) -> &mut ControlPanel {
        &mut self.panel
    }

    pub fn splitter(&self) -> &PanelSplitter {
        &self.splitter
    }

    pub fn splitter_mut(&mut self) -> &mut PanelSplitter {
        &mut self.splitter
    }

    pub fn transport(&self) -> &T {
        self.coordinator.transport()
    }

    pub fn submission_state(&self) -> &SubmissionState {
        self.coordinator.state()
    }

    /// Load catalog then presets. Both always leave usable defaults behind;
    /// the first failure is returned after both have been attempted.
    pub async fn load(&mut self) -> Result<(), CatalogError> {
        let catalog = self.refresh_catalog().await;
        let presets = self.load_presets().await;
        catalog.and(presets)
    }

    pub async fn refresh_catalog(&mut self) -> Result<(), CatalogError> {
        let catalog_url = self.panel.catalog_url();
        let fetched = fetch_catalog(
            self.coordinator.transport(),
            &self.config.proxy_base,
            &catalog_url,
        )
        .await;
        match fetched {
            Ok(catalog) => {
                info!(
                    layers = catalog.layers().len(),
                    %catalog_url,
                    "catalog loaded"
                );
                self.panel.apply_catalog(catalog);
                Ok(())
            }
            Err(err) => {
                warn!("failed to load catalog from {catalog_url}: {err}");
                Err(err)
            }
        }
    }

    pub async fn load_presets(&mut self) -> Result<(), CatalogError> {
        let Some(url) = self.config.geometries_url.clone() else {
            self.panel.apply_presets(GeometryPresets::default());
            return Ok(());
        };
        match fetch_presets(self.coordinator.transport(), &url).await {
            Ok(presets) => {
                self.panel.apply_presets(presets);
                Ok(())
            }
            Err(err) => {
                warn!("failed to load geometry presets from {url}: {err}");
                self.panel.apply_presets(GeometryPresets::default());
                Err(err)
            }
        }
    }

    /// Drawing-tool completion: show the shape and make it the custom geometry.
    pub fn on_shape_drawn(&mut self, shape: &DrawnShape) -> FeatureHandle {
        let geometry = shape.to_geometry();
        self.panel.use_drawn_geometry(&geometry);
        self.view.add_geometry(geometry)
    }

    /// Whether the submit control should be enabled.
    pub fn submit_enabled(&self) -> bool {
        self.panel.submit_ready() && !self.coordinator.is_in_flight()
    }

    /// First half of a submission for event-loop callers; send the ticket
    /// with [`crate::submission::request_mask`] and hand the outcome to
    /// [`MapSession::finish_submit`].
    pub fn begin_submit(&mut self) -> Result<SubmissionTicket, SubmissionError> {
        let request = self.panel.build_request();
        self.coordinator.begin(&request, &mut self.view)
    }

    pub fn finish_submit(
        &mut self,
        ticket: SubmissionTicket,
        outcome: Result<MaskReply, SubmissionError>,
    ) -> Result<RenderedLayer, SubmissionError> {
        self.coordinator.finish(ticket, outcome, &mut self.view)
    }

    pub async fn submit(&mut self) -> Result<RenderedLayer, SubmissionError> {
        let request = self.panel.build_request();
        self.coordinator.submit(&request, &mut self.view).await
    }

    pub fn clear(&mut self) {
        self.view.clear();
    }

    pub fn zoom_to_features(&mut self) {
        self.view.zoom_to_features();
    }
}
