//! Geometry/overlay synchronization engine for the Snorkel map tool.
//!
//! The crate tracks shapes drawn on a map, converts them to canonical
//! GeoJSON-style geometries, runs the submit/response cycle against a mask
//! service and keeps returned rasters aligned with the geometry that
//! produced them. Rendering and HTTP are supplied by the caller through
//! [`MapEngine`] and [`JsonTransport`].
//!
//! Modules, leaf to root:
//! - `splitter`: drag-resize of the map and control panes.
//! - `geometry` / `bounds`: drawn shape codec, JSON parsing, bounding boxes.
//! - `store`: features and overlays currently on the map.
//! - `submission`: validate -> clear -> POST -> render cycle.
//! - `view`: keeps the engine in step with the store and frames the viewport.
//! - `catalog` / `panel`: layer catalog, presets and form state.
//! - `session`: owns all of the above for one page.

pub mod bounds;
pub mod catalog;
pub mod geometry;
pub mod panel;
pub mod session;
pub mod splitter;
pub mod store;
pub mod submission;
pub mod transport;
pub mod view;

pub use bounds::{Bounded, BoundingBox, bounding_box_of};
pub use catalog::{Catalog, CatalogError, CatalogLayer, GeometryPresets};
pub use geometry::{DrawnShape, Geometry, GeometryError, LngLat, from_drawn_shape, parse_user_geometry};
pub use panel::{ControlPanel, GeometryChoice};
pub use session::{MapSession, SessionConfig};
pub use splitter::{PanelSplitter, SplitLayout};
pub use store::{Feature, FeatureHandle, FeatureStore, Overlay, OverlayHandle};
pub use submission::{
    ApiVersion, MaskReply, SubmissionCoordinator, SubmissionError, SubmissionRequest,
    SubmissionState, SubmissionTicket, request_mask,
};
pub use transport::{JsonReply, JsonTransport, TransportError};
pub use view::{MapEngine, RenderedLayer, ViewController, Viewport};
