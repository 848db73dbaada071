//! Geographic coordinates, deltas and bounds.

use serde::{Deserialize, Serialize};
use std::ops::{Add, Sub};

/// A point on the map in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatLng {
    pub lat: f64,
    pub lng: f64,
}

impl LatLng {
    pub const fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    /// Midpoint between two coordinates (planar).
    pub fn midpoint(self, other: LatLng) -> LatLng {
        LatLng::new((self.lat + other.lat) / 2.0, (self.lng + other.lng) / 2.0)
    }

    /// Exact coordinate equality, used for corner reuse.
    pub fn same_as(self, other: LatLng) -> bool {
        self.lat == other.lat && self.lng == other.lng
    }
}

/// Difference between two coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct LatLngDelta {
    pub lat: f64,
    pub lng: f64,
}

impl LatLngDelta {
    pub const fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    pub fn is_zero(&self) -> bool {
        self.lat == 0.0 && self.lng == 0.0
    }
}

impl Sub for LatLng {
    type Output = LatLngDelta;

    fn sub(self, rhs: LatLng) -> LatLngDelta {
        LatLngDelta::new(self.lat - rhs.lat, self.lng - rhs.lng)
    }
}

impl Add<LatLngDelta> for LatLng {
    type Output = LatLng;

    fn add(self, rhs: LatLngDelta) -> LatLng {
        LatLng::new(self.lat + rhs.lat, self.lng + rhs.lng)
    }
}

/// One of the four corners of an axis-aligned box.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Corner {
    NorthWest,
    NorthEast,
    SouthEast,
    SouthWest,
}

impl Corner {
    /// Corner order used for rectangle vertices.
    pub const ALL: [Corner; 4] = [
        Corner::NorthWest,
        Corner::NorthEast,
        Corner::SouthEast,
        Corner::SouthWest,
    ];

    /// Index of this corner in [`Corner::ALL`].
    pub fn index(self) -> usize {
        match self {
            Corner::NorthWest => 0,
            Corner::NorthEast => 1,
            Corner::SouthEast => 2,
            Corner::SouthWest => 3,
        }
    }

    pub fn from_index(index: usize) -> Option<Corner> {
        Corner::ALL.get(index).copied()
    }

    /// The corner sharing this corner's latitude (same horizontal edge).
    pub fn lat_partner(self) -> Corner {
        match self {
            Corner::NorthWest => Corner::NorthEast,
            Corner::NorthEast => Corner::NorthWest,
            Corner::SouthEast => Corner::SouthWest,
            Corner::SouthWest => Corner::SouthEast,
        }
    }

    /// The corner sharing this corner's longitude (same vertical edge).
    pub fn lng_partner(self) -> Corner {
        match self {
            Corner::NorthWest => Corner::SouthWest,
            Corner::NorthEast => Corner::SouthEast,
            Corner::SouthEast => Corner::NorthEast,
            Corner::SouthWest => Corner::NorthWest,
        }
    }
}

/// Axis-aligned box in lat/lng space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatLngBounds {
    pub south: f64,
    pub west: f64,
    pub north: f64,
    pub east: f64,
}

impl LatLngBounds {
    /// Zero-area bounds at a single point.
    pub fn at(point: LatLng) -> Self {
        Self {
            south: point.lat,
            west: point.lng,
            north: point.lat,
            east: point.lng,
        }
    }

    /// Bounds spanning two opposite corners, in any order.
    pub fn from_corners(a: LatLng, b: LatLng) -> Self {
        Self {
            south: a.lat.min(b.lat),
            west: a.lng.min(b.lng),
            north: a.lat.max(b.lat),
            east: a.lng.max(b.lng),
        }
    }

    /// Smallest bounds containing every point, or `None` for an empty slice.
    pub fn enclosing(points: &[LatLng]) -> Option<Self> {
        let (first, rest) = points.split_first()?;
        let mut bounds = Self::at(*first);
        for p in rest {
            bounds.extend(*p);
        }
        Some(bounds)
    }

    pub fn extend(&mut self, point: LatLng) {
        self.south = self.south.min(point.lat);
        self.north = self.north.max(point.lat);
        self.west = self.west.min(point.lng);
        self.east = self.east.max(point.lng);
    }

    pub fn corner(&self, corner: Corner) -> LatLng {
        match corner {
            Corner::NorthWest => LatLng::new(self.north, self.west),
            Corner::NorthEast => LatLng::new(self.north, self.east),
            Corner::SouthEast => LatLng::new(self.south, self.east),
            Corner::SouthWest => LatLng::new(self.south, self.west),
        }
    }

    /// Corners in NW, NE, SE, SW order.
    pub fn corners(&self) -> [LatLng; 4] {
        Corner::ALL.map(|c| self.corner(c))
    }

    pub fn translate(&mut self, delta: LatLngDelta) {
        self.south += delta.lat;
        self.north += delta.lat;
        self.west += delta.lng;
        self.east += delta.lng;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delta_arithmetic() {
        let a = LatLng::new(10.0, 20.0);
        let b = LatLng::new(12.5, 19.0);
        let d = b - a;
        assert!((d.lat - 2.5).abs() < f64::EPSILON);
        assert!((d.lng + 1.0).abs() < f64::EPSILON);
        assert_eq!(a + d, b);
    }

    #[test]
    fn test_bounds_from_corners_any_order() {
        let a = LatLng::new(0.0, 5.0);
        let b = LatLng::new(3.0, 1.0);
        assert_eq!(LatLngBounds::from_corners(a, b), LatLngBounds::from_corners(b, a));

        let bounds = LatLngBounds::from_corners(a, b);
        assert_eq!(bounds.corner(Corner::NorthWest), LatLng::new(3.0, 1.0));
        assert_eq!(bounds.corner(Corner::SouthEast), LatLng::new(0.0, 5.0));
    }

    #[test]
    fn test_corner_partners() {
        for corner in Corner::ALL {
            assert_eq!(corner.lat_partner().lat_partner(), corner);
            assert_eq!(corner.lng_partner().lng_partner(), corner);
            assert_ne!(corner.lat_partner(), corner.lng_partner());
        }
        assert_eq!(Corner::NorthWest.lat_partner(), Corner::NorthEast);
        assert_eq!(Corner::NorthWest.lng_partner(), Corner::SouthWest);
    }

    #[test]
    fn test_enclosing() {
        assert!(LatLngBounds::enclosing(&[]).is_none());
        let bounds = LatLngBounds::enclosing(&[
            LatLng::new(1.0, 1.0),
            LatLng::new(-1.0, 4.0),
            LatLng::new(0.5, -2.0),
        ])
        .unwrap();
        assert!((bounds.north - 1.0).abs() < f64::EPSILON);
        assert!((bounds.south + 1.0).abs() < f64::EPSILON);
        assert!((bounds.west + 2.0).abs() < f64::EPSILON);
        assert!((bounds.east - 4.0).abs() < f64::EPSILON);
    }
}
