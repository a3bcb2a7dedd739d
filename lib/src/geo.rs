//! Geographic primitives: coordinates, great-circle distance, bounds.
//!
//! Coordinates are plain WGS84-ish degrees. Ranges are assumed
//! (-90..=90 lat, -180..=180 lng) but never validated; NaN propagates.

use serde::{Deserialize, Serialize};

/// Mean Earth radius used by the haversine formula.
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Kilometers per degree of latitude (fixed-latitude approximation used
/// when scattering candidates around an origin).
pub const KM_PER_DEGREE: f64 = 111.32;

/// A latitude/longitude pair in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub lat: f64,
    pub lng: f64,
}

impl Coordinate {
    /// Fallback origin when the host cannot provide a position (New York City).
    pub const DEFAULT_ORIGIN: Coordinate = Coordinate {
        lat: 40.7128,
        lng: -74.0060,
    };

    pub const fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    /// Great-circle distance to `other` in kilometers.
    pub fn distance_km(&self, other: &Coordinate) -> f64 {
        haversine_km(self, other)
    }

    /// Move by a north/east displacement in kilometers.
    ///
    /// Uses 111.32 km per degree of latitude and scales longitude by
    /// `cos(lat)` of this coordinate.
    pub fn offset_km(&self, north_km: f64, east_km: f64) -> Coordinate {
        let dlat = north_km / KM_PER_DEGREE;
        let dlng = east_km / (KM_PER_DEGREE * self.lat.to_radians().cos());
        Coordinate {
            lat: self.lat + dlat,
            lng: self.lng + dlng,
        }
    }

    /// True when both axes differ by no more than `tolerance` degrees.
    pub fn quantized_eq(&self, other: &Coordinate, tolerance: f64) -> bool {
        (self.lat - other.lat).abs() <= tolerance && (self.lng - other.lng).abs() <= tolerance
    }

    pub fn is_finite(&self) -> bool {
        self.lat.is_finite() && self.lng.is_finite()
    }
}

/// Haversine distance between two coordinates in kilometers.
///
/// `a = sin²(Δlat/2) + cos(lat1)·cos(lat2)·sin²(Δlng/2)`,
/// `d = 2·R·atan2(√a, √(1−a))`.
pub fn haversine_km(a: &Coordinate, b: &Coordinate) -> f64 {
    let dlat = (b.lat - a.lat).to_radians();
    let dlng = (b.lng - a.lng).to_radians();
    let h = (dlat / 2.0).sin().powi(2)
        + a.lat.to_radians().cos() * b.lat.to_radians().cos() * (dlng / 2.0).sin().powi(2);
    // Rounding can push `h` a hair past 1.0 for antipodal points.
    let h = h.clamp(0.0, 1.0);
    2.0 * EARTH_RADIUS_KM * h.sqrt().atan2((1.0 - h).sqrt())
}

// ---------------------------------------------------------------------------
// Bounds
// ---------------------------------------------------------------------------

/// Axis-aligned lat/lng box (south-west and north-east corners).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub south_west: Coordinate,
    pub north_east: Coordinate,
}

impl Bounds {
    pub fn around(point: Coordinate) -> Self {
        Self {
            south_west: point,
            north_east: point,
        }
    }

    /// Smallest box containing every point. `None` for an empty iterator.
    pub fn from_points<I>(points: I) -> Option<Self>
    where
        I: IntoIterator<Item = Coordinate>,
    {
        let mut iter = points.into_iter();
        let first = iter.next()?;
        let mut bounds = Self::around(first);
        for p in iter {
            bounds.extend(p);
        }
        Some(bounds)
    }

    pub fn extend(&mut self, p: Coordinate) {
        self.south_west.lat = self.south_west.lat.min(p.lat);
        self.south_west.lng = self.south_west.lng.min(p.lng);
        self.north_east.lat = self.north_east.lat.max(p.lat);
        self.north_east.lng = self.north_east.lng.max(p.lng);
    }

    /// Grow each side by `ratio` of the current span.
    pub fn pad(&self, ratio: f64) -> Self {
        let dlat = (self.north_east.lat - self.south_west.lat) * ratio;
        let dlng = (self.north_east.lng - self.south_west.lng) * ratio;
        Self {
            south_west: Coordinate::new(self.south_west.lat - dlat, self.south_west.lng - dlng),
            north_east: Coordinate::new(self.north_east.lat + dlat, self.north_east.lng + dlng),
        }
    }

    pub fn center(&self) -> Coordinate {
        Coordinate::new(
            (self.south_west.lat + self.north_east.lat) / 2.0,
            (self.south_west.lng + self.north_east.lng) / 2.0,
        )
    }

    pub fn contains(&self, p: &Coordinate) -> bool {
        p.lat >= self.south_west.lat
            && p.lat <= self.north_east.lat
            && p.lng >= self.south_west.lng
            && p.lng <= self.north_east.lng
    }
}
