//! Control panel form state: target host, API version, layer, version and
//! the geometry to submit.

use crate::catalog::{Catalog, GeometryPresets};
use crate::geometry::{Geometry, LngLat};
use crate::submission::{ApiVersion, SubmissionRequest};

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum GeometryChoice {
    #[default]
    Custom,
    Preset(String),
}

/// Polygon offered when the server has no presets.
pub fn fallback_geometry() -> Geometry {
    Geometry::Polygon(vec![vec![
        LngLat(177.66712, -38.97675),
        LngLat(177.70420, -38.97675),
        LngLat(177.70420, -38.95206),
        LngLat(177.66712, -38.95206),
        LngLat(177.66712, -38.97675),
    ]])
}

#[derive(Clone, Debug, Default)]
pub struct ControlPanel {
    host: String,
    api: ApiVersion,
    layer: Option<String>,
    version: Option<String>,
    choice: GeometryChoice,
    custom_geometry: String,
    catalog: Catalog,
    presets: GeometryPresets,
}

impl ControlPanel {
    pub fn new(host: impl Into<String>, api: ApiVersion) -> Self {
        Self {
            host: host.into(),
            api,
            ..Self::default()
        }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn set_host(&mut self, host: impl Into<String>) {
        self.host = host.into();
    }

    pub fn api(&self) -> ApiVersion {
        self.api
    }

    pub fn set_api(&mut self, api: ApiVersion) {
        self.api = api;
    }

    pub fn catalog_url(&self) -> String {
        self.api.catalog_url(&self.host)
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn presets(&self) -> &GeometryPresets {
        &self.presets
    }

    pub fn layer(&self) -> Option<&str> {
        self.layer.as_deref()
    }

    pub fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }

    /// Versions of the selected layer, oldest first.
    pub fn versions(&self) -> &[String] {
        match self.layer.as_deref() {
            Some(layer) => self.catalog.versions(layer),
            None => &[],
        }
    }

    /// Select a layer and its newest version.
    pub fn select_layer(&mut self, layer: &str) {
        self.layer = Some(layer.to_string());
        self.version = self.catalog.versions(layer).last().cloned();
    }

    pub fn select_version(&mut self, version: &str) {
        self.version = Some(version.to_string());
    }

    /// Replace the catalog and pick the first layer that has versions.
    pub fn apply_catalog(&mut self, catalog: Catalog) {
        self.catalog = catalog;
        self.layer = None;
        self.version = None;
        if let Some(layer) = self.catalog.default_layer().map(str::to_string) {
            self.select_layer(&layer);
        }
    }

    /// Replace the presets and seed the custom text with the first one.
    pub fn apply_presets(&mut self, presets: GeometryPresets) {
        self.presets = presets;
        let seed = match self.presets.first() {
            Some((_, geometry)) => geometry.to_json(),
            None => fallback_geometry().to_json(),
        };
        if let Ok(text) = seed {
            self.custom_geometry = text;
        }
    }

    pub fn choice(&self) -> &GeometryChoice {
        &self.choice
    }

    pub fn select_geometry(&mut self, choice: GeometryChoice) {
        self.choice = choice;
    }

    pub fn custom_geometry(&self) -> &str {
        &self.custom_geometry
    }

    pub fn set_custom_geometry(&mut self, text: impl Into<String>) {
        self.custom_geometry = text.into();
    }

    /// Put a freshly drawn geometry into the custom text box.
    pub fn use_drawn_geometry(&mut self, geometry: &Geometry) {
        if let Ok(text) = geometry.to_json() {
            self.custom_geometry = text;
            self.choice = GeometryChoice::Custom;
        }
    }

    /// Text that would be submitted right now.
    pub fn geometry_text(&self) -> String {
        match &self.choice {
            GeometryChoice::Custom => self.custom_geometry.clone(),
            GeometryChoice::Preset(name) => self
                .presets
                .get(name)
                .and_then(|geometry| geometry.to_json().ok())
                .unwrap_or_default(),
        }
    }

    pub fn submit_ready(&self) -> bool {
        let filled = |value: Option<&str>| value.is_some_and(|v| !v.trim().is_empty());
        filled(self.layer()) && filled(self.version()) && !self.geometry_text().trim().is_empty()
    }

    pub fn build_request(&self) -> SubmissionRequest {
        SubmissionRequest {
            host: self.host.clone(),
            layer: self.layer.clone().unwrap_or_default(),
            version: self.version.clone().unwrap_or_default(),
            geometry: self.geometry_text(),
            api: self.api,
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::geometry::parse_user_geometry;

    fn catalog() -> Catalog {
        Catalog::from_value(json!({
            "landcover": {"versions": []},
            "ndvi": {"versions": ["2018", "2019", "2020"]},
        }))
        .unwrap()
    }

    #[test]
    fn catalog_selects_first_layer_with_newest_version() {
        let mut panel = ControlPanel::new("http://x", ApiVersion::V2);
        panel.apply_catalog(catalog());
        assert_eq!(panel.layer(), Some("ndvi"));
        assert_eq!(panel.version(), Some("2020"));
        assert_eq!(panel.versions().len(), 3);
    }

    #[test]
    fn selecting_empty_layer_clears_version() {
        let mut panel = ControlPanel::new("http://x", ApiVersion::V2);
        panel.apply_catalog(catalog());
        panel.select_layer("landcover");
        assert_eq!(panel.version(), None);
        assert!(!panel.submit_ready());
    }

    #[test]
    fn no_presets_seeds_fallback_polygon() {
        let mut panel = ControlPanel::new("http://x", ApiVersion::V2);
        panel.apply_presets(GeometryPresets::default());
        assert_eq!(
            parse_user_geometry(panel.custom_geometry()).unwrap(),
            fallback_geometry()
        );
    }

    #[test]
    fn preset_choice_submits_preset_text() {
        let point = Geometry::Point(LngLat(178.0, -38.6));
        let mut panel = ControlPanel::new("http://x", ApiVersion::V1);
        panel.apply_catalog(catalog());
        panel.apply_presets(GeometryPresets::new(vec![("gisborne".into(), point.clone())]));
        panel.set_custom_geometry("");
        panel.select_geometry(GeometryChoice::Preset("gisborne".into()));

        assert!(panel.submit_ready());
        let request = panel.build_request();
        assert_eq!(parse_user_geometry(&request.geometry).unwrap(), point);
        assert_eq!(request.layer, "ndvi");
        assert_eq!(request.api, ApiVersion::V1);
    }

    #[test]
    fn drawn_geometry_becomes_custom_text() {
        let mut panel = ControlPanel::new("http://x", ApiVersion::V2);
        panel.select_geometry(GeometryChoice::Preset("gone".into()));
        assert_eq!(panel.geometry_text(), "");

        let point = Geometry::Point(LngLat(1.0, 2.0));
        panel.use_drawn_geometry(&point);
        assert_eq!(panel.choice(), &GeometryChoice::Custom);
        assert_eq!(parse_user_geometry(&panel.geometry_text()).unwrap(), point);
    }
}
