//! View controller: keeps the rendering engine in step with the feature store
//! and frames the viewport.

use tracing::debug;

use crate::bounds::{Bounded, BoundingBox};
use crate::geometry::{DrawnShape, Geometry, LngLat};
use crate::store::{Feature, FeatureHandle, FeatureStore, Overlay, OverlayHandle};

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Viewport {
    pub center: LngLat,
    pub zoom: u8,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            center: LngLat(147.257, -29.078),
            zoom: 4,
        }
    }
}

/// Rendering collaborator. Drawing tools live on the engine side and report
/// finished shapes through [`ViewController::on_shape_drawn`].
pub trait MapEngine {
    fn show_feature(&mut self, handle: FeatureHandle, feature: &Feature);
    fn remove_feature(&mut self, handle: FeatureHandle);
    fn show_overlay(&mut self, handle: OverlayHandle, overlay: &Overlay);
    /// Must release whatever the engine allocated for the overlay.
    fn remove_overlay(&mut self, handle: OverlayHandle);
    fn fit_bounds(&mut self, bounds: BoundingBox);
    fn set_view(&mut self, viewport: Viewport);

    /// Nudge engines that do not repaint after bulk removal.
    fn force_redraw(&mut self) {}
}

#[derive(Clone, Copy, Debug, PartialEq)]
/// What a successful submission put on the map.
pub struct RenderedLayer {
    pub feature: FeatureHandle,
    pub overlay: OverlayHandle,
    pub bounds: BoundingBox,
}

pub struct ViewController<E> {
    engine: E,
    store: FeatureStore,
    home: Viewport,
}

impl<E: MapEngine> ViewController<E> {
    /// Take ownership of the engine and move it to the home view.
    pub fn new(mut engine: E, home: Viewport) -> Self {
        engine.set_view(home);
        Self {
            engine,
            store: FeatureStore::new(),
            home,
        }
    }

    pub fn store(&self) -> &FeatureStore {
        &self.store
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut E {
        &mut self.engine
    }

    pub fn home(&self) -> Viewport {
        self.home
    }

    /// Drawing-tool completion: accumulate the shape as a feature.
    pub fn on_shape_drawn(&mut self, shape: &DrawnShape) -> FeatureHandle {
        self.add_geometry(shape.to_geometry())
    }

    pub fn add_geometry(&mut self, geometry: Geometry) -> FeatureHandle {
        let handle = self.store.add_feature(geometry);
        if let Some(feature) = self.store.feature(handle) {
            self.engine.show_feature(handle, feature);
        }
        handle
    }

    /// Draw a returned raster together with the geometry it was masked by,
    /// then frame both.
    pub fn render_layer(
        &mut self,
        geometry: Geometry,
        image: String,
        bounds: BoundingBox,
    ) -> RenderedLayer {
        let overlay = self.store.add_overlay(image, bounds);
        if let Some(entry) = self.store.overlay(overlay) {
            self.engine.show_overlay(overlay, entry);
        }
        let geometry_bounds = geometry.bounds();
        let feature = self.add_geometry(geometry);

        let framed = bounds.union(geometry_bounds);
        if !framed.is_empty() {
            self.engine.fit_bounds(framed);
        }
        RenderedLayer {
            feature,
            overlay,
            bounds: framed,
        }
    }

    pub fn remove_feature(&mut self, handle: FeatureHandle) -> bool {
        let removed = self.store.remove_feature(handle).is_some();
        if removed {
            self.engine.remove_feature(handle);
        }
        removed
    }

    pub fn remove_overlay(&mut self, handle: OverlayHandle) -> bool {
        let removed = self.store.remove_overlay(handle).is_some();
        if removed {
            self.engine.remove_overlay(handle);
        }
        removed
    }

    /// Fit to everything on the map, or return home when there is nothing.
    pub fn zoom_to_features(&mut self) {
        let bounds = self.store.bounds_of_all();
        if bounds.is_empty() {
            debug!("no features on the map; resetting to home view");
            self.engine.set_view(self.home);
        } else {
            self.engine.fit_bounds(bounds);
        }
    }

    pub fn clear(&mut self) {
        let cleared = self.store.clear_all();
        debug!(
            features = cleared.features.len(),
            overlays = cleared.overlays.len(),
            "cleared map"
        );
        for handle in cleared.features {
            self.engine.remove_feature(handle);
        }
        for handle in cleared.overlays {
            self.engine.remove_overlay(handle);
        }
        self.engine.force_redraw();
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    #[derive(Clone, Debug, PartialEq)]
    pub(crate) enum EngineCall {
        ShowFeature(FeatureHandle),
        RemoveFeature(FeatureHandle),
        ShowOverlay(OverlayHandle),
        RemoveOverlay(OverlayHandle),
        Fit(BoundingBox),
        SetView(Viewport),
        Redraw,
    }

    #[derive(Default)]
    pub(crate) struct RecordingEngine {
        pub(crate) calls: Vec<EngineCall>,
    }

    impl RecordingEngine {
        pub(crate) fn fits(&self) -> Vec<BoundingBox> {
            self.calls
                .iter()
                .filter_map(|call| match call {
                    EngineCall::Fit(bounds) => Some(*bounds),
                    _ => None,
                })
                .collect()
        }
    }

    impl MapEngine for RecordingEngine {
        fn show_feature(&mut self, handle: FeatureHandle, _feature: &Feature) {
            self.calls.push(EngineCall::ShowFeature(handle));
        }
        fn remove_feature(&mut self, handle: FeatureHandle) {
            self.calls.push(EngineCall::RemoveFeature(handle));
        }
        fn show_overlay(&mut self, handle: OverlayHandle, _overlay: &Overlay) {
            self.calls.push(EngineCall::ShowOverlay(handle));
        }
        fn remove_overlay(&mut self, handle: OverlayHandle) {
            self.calls.push(EngineCall::RemoveOverlay(handle));
        }
        fn fit_bounds(&mut self, bounds: BoundingBox) {
            self.calls.push(EngineCall::Fit(bounds));
        }
        fn set_view(&mut self, viewport: Viewport) {
            self.calls.push(EngineCall::SetView(viewport));
        }
        fn force_redraw(&mut self) {
            self.calls.push(EngineCall::Redraw);
        }
    }

    fn controller() -> ViewController<RecordingEngine> {
        ViewController::new(RecordingEngine::default(), Viewport::default())
    }

    #[test]
    fn starts_at_home_view() {
        let view = controller();
        assert_eq!(
            view.engine().calls,
            vec![EngineCall::SetView(Viewport::default())]
        );
    }

    #[test]
    fn zoom_on_empty_map_resets_without_fitting() {
        let mut view = controller();
        view.zoom_to_features();
        assert!(view.engine().fits().is_empty());
        assert_eq!(
            view.engine().calls.last(),
            Some(&EngineCall::SetView(Viewport::default()))
        );
    }

    #[test]
    fn zoom_fits_all_drawn_shapes() {
        let mut view = controller();
        view.on_shape_drawn(&DrawnShape::Rectangle(BoundingBox::new(0.0, 0.0, 1.0, 1.0)));
        view.on_shape_drawn(&DrawnShape::Point(LngLat(5.0, -3.0)));
        view.zoom_to_features();
        assert_eq!(view.engine().fits(), vec![BoundingBox::new(0.0, -3.0, 5.0, 1.0)]);
    }

    #[test]
    fn render_layer_frames_overlay_and_geometry() {
        let mut view = controller();
        let geometry =
            DrawnShape::Rectangle(BoundingBox::new(170.2, -39.8, 171.5, -39.2)).to_geometry();
        let layer = view.render_layer(
            geometry,
            "data:image/png;base64,AAAA".into(),
            BoundingBox::new(170.0, -40.0, 171.0, -39.0),
        );
        let expected = BoundingBox::new(170.0, -40.0, 171.5, -39.0);
        assert_eq!(layer.bounds, expected);
        assert_eq!(view.engine().fits(), vec![expected]);
        assert_eq!(view.store().feature_count(), 1);
        assert_eq!(view.store().overlay_count(), 1);
    }

    #[test]
    fn clear_releases_everything_then_redraws() {
        let mut view = controller();
        let feature = view.on_shape_drawn(&DrawnShape::Point(LngLat(1.0, 1.0)));
        let layer = view.render_layer(
            Geometry::Point(LngLat(2.0, 2.0)),
            "img".into(),
            BoundingBox::new(1.5, 1.5, 2.5, 2.5),
        );
        view.engine_mut().calls.clear();

        view.clear();
        let calls = &view.engine().calls;
        assert!(calls.contains(&EngineCall::RemoveFeature(feature)));
        assert!(calls.contains(&EngineCall::RemoveFeature(layer.feature)));
        assert!(calls.contains(&EngineCall::RemoveOverlay(layer.overlay)));
        assert_eq!(calls.last(), Some(&EngineCall::Redraw));
        assert!(view.store().is_empty());

        view.engine_mut().calls.clear();
        view.clear();
        assert_eq!(view.engine().calls, vec![EngineCall::Redraw]);
    }

    #[test]
    fn removing_unknown_handle_does_not_touch_engine() {
        let mut view = controller();
        view.engine_mut().calls.clear();
        assert!(!view.remove_feature(FeatureHandle(42)));
        assert!(!view.remove_overlay(OverlayHandle(42)));
        assert!(view.engine().calls.is_empty());
    }
}
