//! Axis-aligned bounding boxes in degrees and the min/max fold that builds them.
//!
//! Boxes never wrap the antimeridian. The empty box is an explicit sentinel
//! (`west > east`) and must be checked with [`BoundingBox::is_empty`] before a
//! viewport is fitted to it.

use serde::{Deserialize, Serialize};

use crate::geometry::LngLat;

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f64; 4]", into = "[f64; 4]")]
/// `{west, south, east, north}` box; serialized as `[west, south, east, north]`.
pub struct BoundingBox {
    pub west: f64,
    pub south: f64,
    pub east: f64,
    pub north: f64,
}

impl BoundingBox {
    /// Sentinel covering nothing. Any `extend`/`union` replaces it entirely.
    pub const EMPTY: Self = Self {
        west: f64::INFINITY,
        south: f64::INFINITY,
        east: f64::NEG_INFINITY,
        north: f64::NEG_INFINITY,
    };

    pub fn new(west: f64, south: f64, east: f64, north: f64) -> Self {
        Self {
            west,
            south,
            east,
            north,
        }
    }

    /// Build from the `[west, south, east, north]` order used on the wire.
    pub fn from_wsen(wsen: [f64; 4]) -> Self {
        Self::new(wsen[0], wsen[1], wsen[2], wsen[3])
    }

    pub fn to_wsen(self) -> [f64; 4] {
        [self.west, self.south, self.east, self.north]
    }

    pub fn is_empty(&self) -> bool {
        self.west > self.east || self.south > self.north
    }

    /// Grow the box to include `point`.
    pub fn extend(&mut self, point: LngLat) {
        self.west = self.west.min(point.lng());
        self.east = self.east.max(point.lng());
        self.south = self.south.min(point.lat());
        self.north = self.north.max(point.lat());
    }

    /// Component-wise min/max merge of two boxes.
    pub fn union(self, other: Self) -> Self {
        Self {
            west: self.west.min(other.west),
            south: self.south.min(other.south),
            east: self.east.max(other.east),
            north: self.north.max(other.north),
        }
    }

    pub fn south_west(&self) -> LngLat {
        LngLat(self.west, self.south)
    }

    pub fn north_east(&self) -> LngLat {
        LngLat(self.east, self.north)
    }

    pub fn center(&self) -> Option<LngLat> {
        if self.is_empty() {
            return None;
        }
        Some(LngLat(
            (self.west + self.east) / 2.0,
            (self.south + self.north) / 2.0,
        ))
    }
}

impl Default for BoundingBox {
    fn default() -> Self {
        Self::EMPTY
    }
}

impl From<[f64; 4]> for BoundingBox {
    fn from(wsen: [f64; 4]) -> Self {
        Self::from_wsen(wsen)
    }
}

impl From<BoundingBox> for [f64; 4] {
    fn from(bounds: BoundingBox) -> Self {
        bounds.to_wsen()
    }
}

/// Anything whose coordinates can be folded into a [`BoundingBox`].
pub trait Bounded {
    fn bounds(&self) -> BoundingBox;
}

impl Bounded for BoundingBox {
    fn bounds(&self) -> BoundingBox {
        *self
    }
}

impl<T: Bounded> Bounded for [T] {
    fn bounds(&self) -> BoundingBox {
        self.iter()
            .fold(BoundingBox::EMPTY, |acc, item| acc.union(item.bounds()))
    }
}

impl<T: Bounded> Bounded for Vec<T> {
    fn bounds(&self) -> BoundingBox {
        self.as_slice().bounds()
    }
}

impl<T: Bounded + ?Sized> Bounded for &T {
    fn bounds(&self) -> BoundingBox {
        (**self).bounds()
    }
}

/// Fold every coordinate reachable from `item` into one box.
pub fn bounding_box_of<B: Bounded + ?Sized>(item: &B) -> BoundingBox {
    item.bounds()
}
