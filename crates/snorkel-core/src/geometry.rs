//! Canonical geometry values and the codec between drawn map shapes and them.
//!
//! Geometries serialize in GeoJSON form (`{"type": ..., "coordinates": ...}`)
//! with coordinates ordered `(longitude, latitude)`. Rings built from drawn
//! shapes are always closed; rings parsed from user text are taken as given.

use std::fmt;

use serde::de::{self, IgnoredAny, SeqAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::bounds::{Bounded, BoundingBox};

/// A `(longitude, latitude)` pair in degrees, serialized as `[lng, lat]`.
///
/// Decoding accepts any position of at least two numbers; altitude and
/// further ordinates are skipped.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct LngLat(pub f64, pub f64);

impl<'de> Deserialize<'de> for LngLat {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct PositionVisitor;

        impl<'de> Visitor<'de> for PositionVisitor {
            type Value = LngLat;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a position of at least two numbers")
            }

            fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<LngLat, A::Error> {
                let lng = seq
                    .next_element::<f64>()?
                    .ok_or_else(|| de::Error::invalid_length(0, &self))?;
                let lat = seq
                    .next_element::<f64>()?
                    .ok_or_else(|| de::Error::invalid_length(1, &self))?;
                while seq.next_element::<IgnoredAny>()?.is_some() {}
                Ok(LngLat(lng, lat))
            }
        }

        deserializer.deserialize_seq(PositionVisitor)
    }
}

impl LngLat {
    pub fn lng(self) -> f64 {
        self.0
    }

    pub fn lat(self) -> f64 {
        self.1
    }
}

pub type Ring = Vec<LngLat>;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "coordinates")]
pub enum Geometry {
    Point(LngLat),
    Polygon(Vec<Ring>),
    MultiPolygon(Vec<Vec<Ring>>),
}

#[derive(Clone, Debug, Error, PartialEq)]
pub enum GeometryError {
    #[error("Geometry is not a valid JSON object: {0}")]
    Syntax(String),
    #[error("JSON is not a Point, Polygon or MultiPolygon geometry: {0}")]
    Shape(String),
    #[error("failed to encode geometry: {0}")]
    Encode(String),
}

impl Geometry {
    pub fn kind(&self) -> &'static str {
        match self {
            Geometry::Point(_) => "Point",
            Geometry::Polygon(_) => "Polygon",
            Geometry::MultiPolygon(_) => "MultiPolygon",
        }
    }

    /// Visit every coordinate pair in document order.
    pub fn for_each_position(&self, mut visit: impl FnMut(LngLat)) {
        match self {
            Geometry::Point(point) => visit(*point),
            Geometry::Polygon(rings) => rings.iter().flatten().for_each(|p| visit(*p)),
            Geometry::MultiPolygon(polygons) => polygons
                .iter()
                .flatten()
                .flatten()
                .for_each(|p| visit(*p)),
        }
    }

    pub fn to_json(&self) -> Result<String, GeometryError> {
        serde_json::to_string(self).map_err(|err| GeometryError::Encode(err.to_string()))
    }

    pub fn to_value(&self) -> Result<Value, GeometryError> {
        serde_json::to_value(self).map_err(|err| GeometryError::Encode(err.to_string()))
    }
}

impl Bounded for Geometry {
    fn bounds(&self) -> BoundingBox {
        let mut bounds = BoundingBox::EMPTY;
        self.for_each_position(|point| bounds.extend(point));
        bounds
    }
}

/// Parse user-supplied text into a geometry.
///
/// Invalid JSON and JSON that is not one of the supported geometry objects
/// both fail with a [`GeometryError`]. Ring closure and winding are not
/// checked.
pub fn parse_user_geometry(text: &str) -> Result<Geometry, GeometryError> {
    let value: Value =
        serde_json::from_str(text).map_err(|err| GeometryError::Syntax(err.to_string()))?;
    geometry_from_value(value)
}

pub fn geometry_from_value(value: Value) -> Result<Geometry, GeometryError> {
    serde_json::from_value(value).map_err(|err| GeometryError::Shape(err.to_string()))
}

/// Shape primitive produced by the map's drawing tools.
#[derive(Clone, Debug, PartialEq)]
pub enum DrawnShape {
    Point(LngLat),
    Rectangle(BoundingBox),
    /// One path per ring, open (the closing point is implied).
    Polygon { paths: Vec<Vec<LngLat>> },
}

impl DrawnShape {
    pub fn to_geometry(&self) -> Geometry {
        match self {
            DrawnShape::Point(point) => Geometry::Point(*point),
            DrawnShape::Rectangle(bounds) => Geometry::Polygon(vec![rectangle_ring(bounds)]),
            DrawnShape::Polygon { paths } => Geometry::Polygon(
                paths
                    .iter()
                    .filter_map(|path| close_ring(path))
                    .collect(),
            ),
        }
    }

    /// Split a geometry back into drawable primitives.
    pub fn from_geometry(geometry: &Geometry) -> Vec<DrawnShape> {
        match geometry {
            Geometry::Point(point) => vec![DrawnShape::Point(*point)],
            Geometry::Polygon(rings) => vec![polygon_from_rings(rings)],
            Geometry::MultiPolygon(polygons) => {
                polygons.iter().map(|rings| polygon_from_rings(rings)).collect()
            }
        }
    }
}

impl From<&DrawnShape> for Geometry {
    fn from(shape: &DrawnShape) -> Self {
        shape.to_geometry()
    }
}

/// Convert a drawn shape into its canonical geometry.
pub fn from_drawn_shape(shape: &DrawnShape) -> Geometry {
    shape.to_geometry()
}

fn rectangle_ring(bounds: &BoundingBox) -> Ring {
    vec![
        LngLat(bounds.west, bounds.south),
        LngLat(bounds.east, bounds.south),
        LngLat(bounds.east, bounds.north),
        LngLat(bounds.west, bounds.north),
        LngLat(bounds.west, bounds.south),
    ]
}

fn close_ring(path: &[LngLat]) -> Option<Ring> {
    let first = *path.first()?;
    let mut ring = Vec::with_capacity(path.len() + 1);
    ring.extend_from_slice(path);
    ring.push(first);
    Some(ring)
}

fn polygon_from_rings(rings: &[Ring]) -> DrawnShape {
    let paths = rings
        .iter()
        .map(|ring| match ring.split_last() {
            Some((last, rest)) if ring.len() > 1 && Some(last) == ring.first() => rest.to_vec(),
            _ => ring.clone(),
        })
        .collect();
    DrawnShape::Polygon { paths }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bounds::bounding_box_of;

    fn rectangle() -> DrawnShape {
        DrawnShape::Rectangle(BoundingBox::new(177.66712, -38.97675, 177.70420, -38.95206))
    }

    #[test]
    fn rectangle_emits_closed_five_point_ring() {
        let Geometry::Polygon(rings) = rectangle().to_geometry() else {
            panic!("rectangle should become a polygon");
        };
        assert_eq!(rings.len(), 1);
        let ring = &rings[0];
        assert_eq!(ring.len(), 5);
        assert_eq!(ring.first(), ring.last());
        assert_eq!(
            &ring[..4],
            &[
                LngLat(177.66712, -38.97675),
                LngLat(177.70420, -38.97675),
                LngLat(177.70420, -38.95206),
                LngLat(177.66712, -38.95206),
            ]
        );
    }

    #[test]
    fn polygon_emits_one_closed_ring_per_path() {
        let shape = DrawnShape::Polygon {
            paths: vec![
                vec![LngLat(0.0, 0.0), LngLat(4.0, 0.0), LngLat(4.0, 4.0)],
                vec![LngLat(1.0, 1.0), LngLat(2.0, 1.0), LngLat(2.0, 2.0), LngLat(1.0, 2.0)],
                vec![LngLat(3.0, 3.0), LngLat(3.5, 3.0), LngLat(3.5, 3.5)],
            ],
        };
        let Geometry::Polygon(rings) = shape.to_geometry() else {
            panic!("polygon should stay a polygon");
        };
        assert_eq!(rings.len(), 3);
        for ring in &rings {
            assert_eq!(ring.first(), ring.last());
        }
        assert_eq!(rings[1].len(), 5);
    }

    #[test]
    fn empty_paths_are_dropped() {
        let shape = DrawnShape::Polygon {
            paths: vec![Vec::new(), vec![LngLat(1.0, 1.0), LngLat(2.0, 2.0), LngLat(1.0, 2.0)]],
        };
        let Geometry::Polygon(rings) = shape.to_geometry() else {
            panic!("polygon should stay a polygon");
        };
        assert_eq!(rings.len(), 1);
    }

    #[test]
    fn serializes_as_geojson() {
        let json = Geometry::Point(LngLat(147.257, -29.078)).to_json().unwrap();
        assert_eq!(json, r#"{"type":"Point","coordinates":[147.257,-29.078]}"#);
    }

    #[test]
    fn drawn_geometry_survives_text_round_trip() {
        let geometry = rectangle().to_geometry();
        let text = geometry.to_json().unwrap();
        assert_eq!(parse_user_geometry(&text).unwrap(), geometry);

        let polygon = DrawnShape::Polygon {
            paths: vec![vec![LngLat(10.0, 10.0), LngLat(11.0, 10.0), LngLat(11.0, 11.5)]],
        }
        .to_geometry();
        assert_eq!(parse_user_geometry(&polygon.to_json().unwrap()).unwrap(), polygon);
    }

    #[test]
    fn invalid_json_is_a_syntax_error() {
        let err = parse_user_geometry("{\"type\": \"Polygon\", ").unwrap_err();
        assert!(matches!(err, GeometryError::Syntax(_)));
    }

    #[test]
    fn valid_json_of_wrong_shape_is_rejected() {
        let err = parse_user_geometry(r#"{"type": "LineString", "coordinates": []}"#).unwrap_err();
        assert!(matches!(err, GeometryError::Shape(_)));
    }

    #[test]
    fn positions_with_altitude_keep_lng_lat() {
        let geometry = parse_user_geometry(
            r#"{"type":"Polygon","coordinates":[[[0,0,10],[1,0,10],[1,1,12.5],[0,0,10]]]}"#,
        )
        .unwrap();
        assert_eq!(
            geometry,
            Geometry::Polygon(vec![vec![
                LngLat(0.0, 0.0),
                LngLat(1.0, 0.0),
                LngLat(1.0, 1.0),
                LngLat(0.0, 0.0),
            ]])
        );
        assert_eq!(
            bounding_box_of(&geometry),
            BoundingBox::new(0.0, 0.0, 1.0, 1.0)
        );

        let point =
            parse_user_geometry(r#"{"type":"Point","coordinates":[178.0,-38.6,4.0,1.0]}"#).unwrap();
        assert_eq!(point, Geometry::Point(LngLat(178.0, -38.6)));
    }

    #[test]
    fn position_needs_two_numbers() {
        let err = parse_user_geometry(r#"{"type":"Point","coordinates":[178.0]}"#).unwrap_err();
        assert!(matches!(err, GeometryError::Shape(_)));
        let err = parse_user_geometry(r#"{"type":"Point","coordinates":[178.0,"x"]}"#).unwrap_err();
        assert!(matches!(err, GeometryError::Shape(_)));
    }

    #[test]
    fn open_rings_from_user_text_are_accepted() {
        let geometry =
            parse_user_geometry(r#"{"type":"Polygon","coordinates":[[[0,0],[1,0],[1,1]]]}"#)
                .unwrap();
        let Geometry::Polygon(rings) = geometry else {
            panic!("expected polygon");
        };
        assert_eq!(rings[0].len(), 3);
    }

    #[test]
    fn multipolygon_bounds_cover_every_member() {
        let geometry = parse_user_geometry(
            r#"{"type":"MultiPolygon","coordinates":[
                [[[0,0],[1,0],[1,1],[0,0]]],
                [[[5,-2],[6,-2],[6,3],[5,-2]]]
            ]}"#,
        )
        .unwrap();
        assert_eq!(
            bounding_box_of(&geometry),
            BoundingBox::new(0.0, -2.0, 6.0, 3.0)
        );
    }

    #[test]
    fn bounds_ignore_coordinate_order() {
        let ring = vec![
            LngLat(3.0, -1.0),
            LngLat(-2.0, 4.0),
            LngLat(7.5, 0.5),
            LngLat(0.0, -6.0),
        ];
        let forward = Geometry::Polygon(vec![ring.clone()]);
        let mut reversed_ring = ring.clone();
        reversed_ring.reverse();
        let reversed = Geometry::Polygon(vec![reversed_ring]);
        let mut rotated_ring = ring;
        rotated_ring.rotate_left(2);
        let rotated = Geometry::Polygon(vec![rotated_ring]);

        assert_eq!(forward.bounds(), reversed.bounds());
        assert_eq!(forward.bounds(), rotated.bounds());
        assert_eq!(forward.bounds(), BoundingBox::new(-2.0, -6.0, 7.5, 4.0));
    }

    #[test]
    fn from_geometry_drops_closing_point() {
        let shape = DrawnShape::Polygon {
            paths: vec![vec![LngLat(0.0, 0.0), LngLat(2.0, 0.0), LngLat(2.0, 2.0)]],
        };
        let shapes = DrawnShape::from_geometry(&shape.to_geometry());
        assert_eq!(shapes, vec![shape]);
    }

    #[test]
    fn multipolygon_splits_into_polygons() {
        let geometry = Geometry::MultiPolygon(vec![
            vec![vec![LngLat(0.0, 0.0), LngLat(1.0, 0.0), LngLat(1.0, 1.0), LngLat(0.0, 0.0)]],
            vec![vec![LngLat(5.0, 5.0), LngLat(6.0, 5.0), LngLat(6.0, 6.0), LngLat(5.0, 5.0)]],
        ]);
        assert_eq!(DrawnShape::from_geometry(&geometry).len(), 2);
    }
}
