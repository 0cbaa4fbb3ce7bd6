use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use std::fmt;

use crate::core::bounds::Extent;
use crate::core::constants::{EARTH_RADIUS, MAX_LATITUDE};

/// Represents a geographical coordinate with latitude and longitude
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatLng {
    pub lat: f64,
    pub lng: f64,
}

impl LatLng {
    /// Creates a new LatLng coordinate
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    /// Validates that the coordinates are within valid ranges
    pub fn is_valid(&self) -> bool {
        self.lat >= -90.0 && self.lat <= 90.0 && self.lng >= -180.0 && self.lng <= 180.0
    }

    /// Clamps latitude to the range Web Mercator can represent
    pub fn clamp_lat(lat: f64) -> f64 {
        lat.clamp(-MAX_LATITUDE, MAX_LATITUDE)
    }

    /// Converts to Web Mercator meters (EPSG:3857)
    pub fn to_mercator(&self) -> (f64, f64) {
        geographic_to_meters(self.lng, self.lat)
    }

    /// Creates LatLng from Web Mercator meters
    pub fn from_mercator(mx: f64, my: f64) -> Self {
        let (lng, lat) = meters_to_geographic(mx, my);
        Self::new(lat, lng)
    }
}

impl Default for LatLng {
    fn default() -> Self {
        Self::new(0.0, 0.0)
    }
}

/// Projects a longitude/latitude pair into Web Mercator meters.
pub fn geographic_to_meters(lng: f64, lat: f64) -> (f64, f64) {
    let lat = LatLng::clamp_lat(lat);
    let x = lng.to_radians() * EARTH_RADIUS;
    let y = (PI / 4.0 + lat.to_radians() / 2.0).tan().ln() * EARTH_RADIUS;
    (x, y)
}

/// Inverse of [`geographic_to_meters`]; returns `(lng, lat)`.
pub fn meters_to_geographic(mx: f64, my: f64) -> (f64, f64) {
    let lng = (mx / EARTH_RADIUS).to_degrees();
    let lat = (2.0 * (my / EARTH_RADIUS).exp().atan() - PI / 2.0).to_degrees();
    (lng, lat)
}

/// Projects a lon/lat extent into meters.
pub fn geographic_extent_to_meters(extent: &Extent) -> Extent {
    let (xmin, ymin) = geographic_to_meters(extent.xmin, extent.ymin);
    let (xmax, ymax) = geographic_to_meters(extent.xmax, extent.ymax);
    Extent::new(xmin, ymin, xmax, ymax)
}

/// Unprojects a meter extent into lon/lat.
pub fn meters_extent_to_geographic(extent: &Extent) -> Extent {
    let (xmin, ymin) = meters_to_geographic(extent.xmin, extent.ymin);
    let (xmax, ymax) = meters_to_geographic(extent.xmax, extent.ymax);
    Extent::new(xmin, ymin, xmax, ymax)
}

/// A tile position in the quadtree.
///
/// `x` and `y` are signed: before wraparound normalisation `x` may lie outside
/// `[0, 2^z)` to address a horizontally repeated copy of the world.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TileCoord {
    pub x: i64,
    pub y: i64,
    pub z: u8,
}

impl TileCoord {
    pub fn new(x: i64, y: i64, z: u8) -> Self {
        Self { x, y, z }
    }

    /// Canonical cache key, `"x:y:z"`.
    pub fn cache_key(&self) -> String {
        self.to_string()
    }
}

impl AsRef<TileCoord> for TileCoord {
    fn as_ref(&self) -> &TileCoord {
        self
    }
}

impl fmt::Display for TileCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.x, self.y, self.z)
    }
}

impl From<(i64, i64, u8)> for TileCoord {
    fn from((x, y, z): (i64, i64, u8)) -> Self {
        Self::new(x, y, z)
    }
}
