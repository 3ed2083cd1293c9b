//! Feature store: the single source of truth for what is drawn on the map.
//!
//! Holds vector features and raster overlays. Handles are only good for
//! removal; the store never hands out mutable access to its entries.

use serde_json::{Map, Value};

use crate::bounds::{Bounded, BoundingBox};
use crate::geometry::Geometry;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FeatureHandle(pub u64);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OverlayHandle(pub u64);

#[derive(Clone, Debug, PartialEq)]
/// Vector shape shown on the map. Properties are opaque and currently always empty.
pub struct Feature {
    pub geometry: Geometry,
    pub properties: Map<String, Value>,
}

impl Feature {
    pub fn new(geometry: Geometry) -> Self {
        Self {
            geometry,
            properties: Map::new(),
        }
    }

    /// GeoJSON `Feature` object for renderers that ingest GeoJSON directly.
    pub fn to_geojson(&self) -> Value {
        serde_json::json!({
            "type": "Feature",
            "properties": self.properties,
            "geometry": self.geometry,
        })
    }
}

impl Bounded for Feature {
    fn bounds(&self) -> BoundingBox {
        self.geometry.bounds()
    }
}

#[derive(Clone, Debug, PartialEq)]
/// Georeferenced raster. `image` is an encoded image reference, usually a data URI.
pub struct Overlay {
    pub image: String,
    pub bounds: BoundingBox,
}

impl Bounded for Overlay {
    fn bounds(&self) -> BoundingBox {
        self.bounds
    }
}

/// Handles removed by [`FeatureStore::clear_all`].
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Cleared {
    pub features: Vec<FeatureHandle>,
    pub overlays: Vec<OverlayHandle>,
}

impl Cleared {
    pub fn is_empty(&self) -> bool {
        self.features.is_empty() && self.overlays.is_empty()
    }
}

#[derive(Debug, Default)]
pub struct FeatureStore {
    features: Vec<(FeatureHandle, Feature)>,
    overlays: Vec<(OverlayHandle, Overlay)>,
    next_id: u64,
}

impl FeatureStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_feature(&mut self, geometry: Geometry) -> FeatureHandle {
        let handle = FeatureHandle(self.allocate_id());
        self.features.push((handle, Feature::new(geometry)));
        handle
    }

    pub fn add_overlay(&mut self, image: impl Into<String>, bounds: BoundingBox) -> OverlayHandle {
        let handle = OverlayHandle(self.allocate_id());
        self.overlays.push((
            handle,
            Overlay {
                image: image.into(),
                bounds,
            },
        ));
        handle
    }

    pub fn remove_feature(&mut self, handle: FeatureHandle) -> Option<Feature> {
        let idx = self.features.iter().position(|(h, _)| *h == handle)?;
        Some(self.features.remove(idx).1)
    }

    pub fn remove_overlay(&mut self, handle: OverlayHandle) -> Option<Overlay> {
        let idx = self.overlays.iter().position(|(h, _)| *h == handle)?;
        Some(self.overlays.remove(idx).1)
    }

    /// Drop every feature and overlay. Calling this on an empty store is a no-op.
    pub fn clear_all(&mut self) -> Cleared {
        Cleared {
            features: self.features.drain(..).map(|(handle, _)| handle).collect(),
            overlays: self.overlays.drain(..).map(|(handle, _)| handle).collect(),
        }
    }

    pub fn feature(&self, handle: FeatureHandle) -> Option<&Feature> {
        self.features
            .iter()
            .find(|(h, _)| *h == handle)
            .map(|(_, feature)| feature)
    }

    pub fn overlay(&self, handle: OverlayHandle) -> Option<&Overlay> {
        self.overlays
            .iter()
            .find(|(h, _)| *h == handle)
            .map(|(_, overlay)| overlay)
    }

    pub fn features(&self) -> impl Iterator<Item = (FeatureHandle, &Feature)> {
        self.features.iter().map(|(handle, feature)| (*handle, feature))
    }

    pub fn overlays(&self) -> impl Iterator<Item = (OverlayHandle, &Overlay)> {
        self.overlays.iter().map(|(handle, overlay)| (*handle, overlay))
    }

    pub fn feature_count(&self) -> usize {
        self.features.len()
    }

    pub fn overlay_count(&self) -> usize {
        self.overlays.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty() && self.overlays.is_empty()
    }

    /// Union of every feature's geometry bounds and every overlay's declared bounds.
    pub fn bounds_of_all(&self) -> BoundingBox {
        let features = self
            .features
            .iter()
            .fold(BoundingBox::EMPTY, |acc, (_, f)| acc.union(f.bounds()));
        self.overlays
            .iter()
            .fold(features, |acc, (_, o)| acc.union(o.bounds))
    }

    fn allocate_id(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id = self.next_id.saturating_add(1);
        id
    }
}
