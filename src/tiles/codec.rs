//! Web Mercator tile math
//!
//! Quadkeys, cache keys, the resolution ladder, level-of-detail selection and
//! the pixel/meter/tile conversions. Everything here is pure and deterministic.
//!
//! Tile rows follow the TMS convention (origin at the bottom-left); schemes that
//! speak top-origin rows flip with [`tms_to_wmts`] when building URLs.

use std::f64::consts::PI;

use crate::core::bounds::Extent;
use crate::core::config::TileSourceOptions;
use crate::core::constants::{
    DEFAULT_INITIAL_RESOLUTION, DEFAULT_MAX_ZOOM, DEFAULT_MIN_ZOOM, EARTH_RADIUS,
    MAX_SUPPORTED_ZOOM, MERCATOR_ORIGIN_OFFSET, TILE_SIZE,
};
use crate::core::geo::{meters_extent_to_geographic, TileCoord};
use crate::{Error, Result};

/// Longest quadkey that still fits the signed 64-bit tile indices.
const MAX_QUADKEY_LEN: usize = 62;

/// Deepest level the unclamped level search will consider.
const MAX_IDEAL_LEVEL: i32 = 62;

/// A tile together with its projected-meter bounds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TileBounds {
    pub coord: TileCoord,
    pub bounds: Extent,
}

impl AsRef<TileCoord> for TileBounds {
    fn as_ref(&self) -> &TileCoord {
        &self.coord
    }
}

/// Inclusive rectangle of tile indices at one zoom level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileRange {
    pub txmin: i64,
    pub tymin: i64,
    pub txmax: i64,
    pub tymax: i64,
}

impl TileRange {
    pub fn new(txmin: i64, tymin: i64, txmax: i64, tymax: i64) -> Self {
        Self {
            txmin,
            tymin,
            txmax,
            tymax,
        }
    }

    fn center(&self) -> (f64, f64) {
        (
            (self.txmax - self.txmin) as f64 / 2.0 + self.txmin as f64,
            (self.tymax - self.tymin) as f64 / 2.0 + self.tymin as f64,
        )
    }
}

/// Encodes a tile position as a base-4 quadkey, most significant level first.
///
/// `x` and `y` are expected to lie in `0..2^z`. Levels past the width of
/// `i64` contribute `0` digits.
pub fn tile_xyz_to_quadkey(x: i64, y: i64, z: u8) -> String {
    let mut quadkey = String::with_capacity(z as usize);
    for i in (1..=z as u32).rev() {
        let mask = 1i64.checked_shl(i - 1).unwrap_or(0);
        let mut digit = 0u8;
        if x & mask != 0 {
            digit += 1;
        }
        if y & mask != 0 {
            digit += 2;
        }
        quadkey.push(char::from(b'0' + digit));
    }
    quadkey
}

/// Decodes a quadkey back into its tile position.
///
/// Any character outside `0-3` is an [`Error::InvalidQuadkey`].
pub fn quadkey_to_tile_xyz(quadkey: &str) -> Result<TileCoord> {
    let z = quadkey.len();
    if z > MAX_QUADKEY_LEN {
        return Err(Error::InvalidQuadkey(quadkey.to_string()));
    }
    let mut x = 0i64;
    let mut y = 0i64;
    for (i, value) in quadkey.chars().enumerate() {
        let mask = 1i64 << (z - i - 1);
        match value {
            '0' => {}
            '1' => x |= mask,
            '2' => y |= mask,
            '3' => {
                x |= mask;
                y |= mask;
            }
            _ => return Err(Error::InvalidQuadkey(quadkey.to_string())),
        }
    }
    Ok(TileCoord::new(x, y, z as u8))
}

/// Canonical `"x:y:z"` cache key.
pub fn tile_xyz_to_key(x: i64, y: i64, z: u8) -> String {
    TileCoord::new(x, y, z).cache_key()
}

/// Parses a `"x:y:z"` cache key.
pub fn key_to_tile_xyz(key: &str) -> Result<TileCoord> {
    let invalid = || Error::InvalidCacheKey(key.to_string());
    let mut parts = key.split(':');
    let (Some(x), Some(y), Some(z), None) = (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return Err(invalid());
    };
    Ok(TileCoord::new(
        x.parse().map_err(|_| invalid())?,
        y.parse().map_err(|_| invalid())?,
        z.parse().map_err(|_| invalid())?,
    ))
}

/// Flips the row between bottom-origin and top-origin numbering. Self-inverse.
pub fn tms_to_wmts(x: i64, y: i64, z: u8) -> TileCoord {
    TileCoord::new(x, (1i64 << z) - 1 - y, z)
}

/// Same flip as [`tms_to_wmts`], named for the other direction.
pub fn wmts_to_tms(x: i64, y: i64, z: u8) -> TileCoord {
    tms_to_wmts(x, y, z)
}

/// Stable-sorts tiles by distance from the center of `tile_extent`, closest first.
pub fn sort_tiles_from_center<T: AsRef<TileCoord>>(tiles: &mut [T], tile_extent: TileRange) {
    let (center_x, center_y) = tile_extent.center();
    let distance = |coord: &TileCoord| {
        ((center_x - coord.x as f64).powi(2) + (center_y - coord.y as f64).powi(2)).sqrt()
    };
    tiles.sort_by(|a, b| distance(a.as_ref()).total_cmp(&distance(b.as_ref())));
}

/// Projection constants and the resolution ladder for one tile source.
#[derive(Debug, Clone, PartialEq)]
pub struct MercatorCodec {
    tile_size: u32,
    min_zoom: u8,
    max_zoom: u8,
    wrap_around: bool,
    snap_to_zoom: bool,
    x_origin_offset: f64,
    y_origin_offset: f64,
    initial_resolution: Option<f64>,
    resolutions: Vec<f64>,
}

impl Default for MercatorCodec {
    fn default() -> Self {
        let mut codec = Self {
            tile_size: TILE_SIZE,
            min_zoom: DEFAULT_MIN_ZOOM,
            max_zoom: DEFAULT_MAX_ZOOM,
            wrap_around: true,
            snap_to_zoom: false,
            x_origin_offset: MERCATOR_ORIGIN_OFFSET,
            y_origin_offset: MERCATOR_ORIGIN_OFFSET,
            initial_resolution: Some(DEFAULT_INITIAL_RESOLUTION),
            resolutions: Vec::new(),
        };
        codec.rebuild_ladder();
        codec
    }
}

impl MercatorCodec {
    /// Builds a codec from source options, rejecting unusable projection settings.
    pub fn from_options(options: &TileSourceOptions) -> Result<Self> {
        if options.tile_size == 0 {
            return Err(Error::Config("tile_size must be positive".into()));
        }
        if options.min_zoom > options.max_zoom {
            return Err(Error::Config(format!(
                "min_zoom {} exceeds max_zoom {}",
                options.min_zoom, options.max_zoom
            )));
        }
        if options.max_zoom > MAX_SUPPORTED_ZOOM {
            return Err(Error::Config(format!(
                "max_zoom {} exceeds supported maximum {}",
                options.max_zoom, MAX_SUPPORTED_ZOOM
            )));
        }
        if let Some(resolution) = options.initial_resolution {
            if !(resolution.is_finite() && resolution > 0.0) {
                return Err(Error::Config(format!(
                    "initial_resolution must be a positive number, got {resolution}"
                )));
            }
        }
        if !(options.x_origin_offset.is_finite() && options.y_origin_offset.is_finite()) {
            return Err(Error::Config("origin offsets must be finite".into()));
        }

        let mut codec = Self {
            tile_size: options.tile_size,
            min_zoom: options.min_zoom,
            max_zoom: options.max_zoom,
            wrap_around: options.wrap_around,
            snap_to_zoom: options.snap_to_zoom,
            x_origin_offset: options.x_origin_offset,
            y_origin_offset: options.y_origin_offset,
            initial_resolution: options.initial_resolution,
            resolutions: Vec::new(),
        };
        codec.rebuild_ladder();
        Ok(codec)
    }

    fn rebuild_ladder(&mut self) {
        self.resolutions = (self.min_zoom..=self.max_zoom)
            .map(|level| self.get_resolution(level as i32))
            .collect();
    }

    pub fn tile_size(&self) -> u32 {
        self.tile_size
    }

    pub fn min_zoom(&self) -> u8 {
        self.min_zoom
    }

    pub fn max_zoom(&self) -> u8 {
        self.max_zoom
    }

    pub fn wrap_around(&self) -> bool {
        self.wrap_around
    }

    pub fn snap_to_zoom(&self) -> bool {
        self.snap_to_zoom
    }

    pub fn x_origin_offset(&self) -> f64 {
        self.x_origin_offset
    }

    pub fn y_origin_offset(&self) -> f64 {
        self.y_origin_offset
    }

    pub fn set_snap_to_zoom(&mut self, snap_to_zoom: bool) {
        self.snap_to_zoom = snap_to_zoom;
    }

    /// Meters per pixel at zoom 0.
    pub fn computed_initial_resolution(&self) -> f64 {
        self.initial_resolution
            .unwrap_or_else(|| 2.0 * PI * EARTH_RADIUS / self.tile_size as f64)
    }

    pub fn get_resolution(&self, level: i32) -> f64 {
        self.computed_initial_resolution() / 2f64.powi(level)
    }

    /// The precomputed ladder, index 0 being `min_zoom`.
    pub fn resolutions(&self) -> &[f64] {
        &self.resolutions
    }

    /// Ladder resolution for a zoom level, falling back to the formula outside it.
    pub fn resolution_at(&self, level: u8) -> f64 {
        level
            .checked_sub(self.min_zoom)
            .and_then(|index| self.resolutions.get(index as usize))
            .copied()
            .unwrap_or_else(|| self.get_resolution(level as i32))
    }

    /// Meters per pixel needed on each axis to show `extent` in a `width`×`height` frame.
    pub fn get_resolution_by_extent(&self, extent: &Extent, height: f64, width: f64) -> (f64, f64) {
        (extent.width() / width, extent.height() / height)
    }

    fn required_resolution(&self, extent: &Extent, height: f64, width: f64) -> f64 {
        let (x_rs, y_rs) = self.get_resolution_by_extent(extent, height, width);
        x_rs.max(y_rs)
    }

    /// The coarsest zoom whose resolution is at least as fine as required,
    /// ignoring the configured zoom bounds. May fall below `min_zoom` or above
    /// `max_zoom`; the renderer uses this to detect out-of-range zoom requests.
    pub fn ideal_level_by_extent(&self, extent: &Extent, height: f64, width: f64) -> i32 {
        let required = self.required_resolution(extent, height, width);
        (0..=MAX_IDEAL_LEVEL)
            .find(|&level| self.get_resolution(level) <= required)
            .unwrap_or(MAX_IDEAL_LEVEL)
    }

    /// Picks the first ladder level whose resolution does not exceed the
    /// required resolution. Equal resolutions pick the coarser level; a
    /// requirement finer than the whole ladder picks the finest level.
    pub fn get_level_by_extent(&self, extent: &Extent, height: f64, width: f64) -> u8 {
        let required = self.required_resolution(extent, height, width);
        self.resolutions
            .iter()
            .position(|&resolution| resolution <= required)
            .map(|index| self.min_zoom + index as u8)
            .unwrap_or(self.max_zoom)
    }

    /// Picks the ladder level whose resolution is nearest the required one.
    pub fn get_closest_level_by_extent(&self, extent: &Extent, height: f64, width: f64) -> u8 {
        let required = self.required_resolution(extent, height, width);
        let mut best = 0usize;
        for (index, resolution) in self.resolutions.iter().enumerate() {
            if (resolution - required).abs() < (self.resolutions[best] - required).abs() {
                best = index;
            }
        }
        self.min_zoom + best as u8
    }

    /// Resizes `extent` around its center to match the resolution of `level`.
    ///
    /// With `snap_to_zoom` both axes take exactly `resolution * pixels`; otherwise
    /// only the axis that is short of the frame's aspect ratio grows.
    pub fn snap_to_zoom_level(&self, extent: &Extent, height: f64, width: f64, level: u8) -> Extent {
        let desired_res = self.resolution_at(level);
        let mut desired_x_delta = width * desired_res;
        let mut desired_y_delta = height * desired_res;
        if !self.snap_to_zoom {
            let xscale = extent.width() / desired_x_delta;
            let yscale = extent.height() / desired_y_delta;
            if xscale > yscale {
                desired_x_delta = extent.width();
                desired_y_delta *= xscale;
            } else {
                desired_x_delta *= yscale;
                desired_y_delta = extent.height();
            }
        }
        let x_adjust = (desired_x_delta - extent.width()) / 2.0;
        let y_adjust = (desired_y_delta - extent.height()) / 2.0;
        extent.expand(x_adjust, y_adjust)
    }

    pub fn pixels_to_meters(&self, px: f64, py: f64, level: u8) -> (f64, f64) {
        let res = self.get_resolution(level as i32);
        (px * res - self.x_origin_offset, py * res - self.y_origin_offset)
    }

    pub fn meters_to_pixels(&self, mx: f64, my: f64, level: u8) -> (f64, f64) {
        let res = self.get_resolution(level as i32);
        ((mx + self.x_origin_offset) / res, (my + self.y_origin_offset) / res)
    }

    pub fn pixels_to_tile(&self, px: f64, py: f64) -> (i64, i64) {
        let tile_size = self.tile_size as f64;
        let tx = (px / tile_size).ceil() as i64;
        let tx = if tx == 0 { tx } else { tx - 1 };
        let ty = ((py / tile_size).ceil() as i64 - 1).max(0);
        (tx, ty)
    }

    /// Flips a pixel row into raster (top-origin) order.
    pub fn pixels_to_raster(&self, px: f64, py: f64, level: u8) -> (f64, f64) {
        let map_size = self.tile_size as f64 * 2f64.powi(level as i32);
        (px, map_size - py)
    }

    pub fn meters_to_tile(&self, mx: f64, my: f64, level: u8) -> (i64, i64) {
        let (px, py) = self.meters_to_pixels(mx, my, level);
        self.pixels_to_tile(px, py)
    }

    /// Meter bounds of a TMS tile.
    pub fn get_tile_meter_bounds(&self, tx: i64, ty: i64, level: u8) -> Extent {
        let tile_size = self.tile_size as f64;
        let (xmin, ymin) = self.pixels_to_meters(tx as f64 * tile_size, ty as f64 * tile_size, level);
        let (xmax, ymax) =
            self.pixels_to_meters((tx + 1) as f64 * tile_size, (ty + 1) as f64 * tile_size, level);
        Extent::new(xmin, ymin, xmax, ymax)
    }

    /// Lon/lat bounds of a TMS tile.
    pub fn get_tile_geographic_bounds(&self, tx: i64, ty: i64, level: u8) -> Extent {
        meters_extent_to_geographic(&self.get_tile_meter_bounds(tx, ty, level))
    }

    pub fn is_valid_tile(&self, x: i64, y: i64, z: u8) -> bool {
        let count = 1i64 << z;
        if !self.wrap_around && (x < 0 || x >= count) {
            return false;
        }
        (0..count).contains(&y)
    }

    /// Every valid tile covering `extent` at `level`, plus `tile_border` extra
    /// tiles on each side, closest to the center first.
    pub fn get_tiles_by_extent(&self, extent: &Extent, level: u8, tile_border: i64) -> Vec<TileBounds> {
        let (txmin, tymin) = self.meters_to_tile(extent.xmin, extent.ymin, level);
        let (txmax, tymax) = self.meters_to_tile(extent.xmax, extent.ymax, level);
        let range = TileRange::new(
            txmin - tile_border,
            tymin - tile_border,
            txmax + tile_border,
            tymax + tile_border,
        );

        let mut tiles = Vec::new();
        for ty in (range.tymin..=range.tymax).rev() {
            for tx in range.txmin..=range.txmax {
                if self.is_valid_tile(tx, ty, level) {
                    tiles.push(TileBounds {
                        coord: TileCoord::new(tx, ty, level),
                        bounds: self.get_tile_meter_bounds(tx, ty, level),
                    });
                }
            }
        }
        sort_tiles_from_center(&mut tiles, range);
        tiles
    }

    /// Wraps `x` into `[0, 2^z)` when the source repeats horizontally.
    pub fn normalize_xyz(&self, x: i64, y: i64, z: u8) -> TileCoord {
        if self.wrap_around {
            TileCoord::new(x.rem_euclid(1i64 << z), y, z)
        } else {
            TileCoord::new(x, y, z)
        }
    }

    /// Moves a canonical tile back into world copy `world_x`.
    pub fn denormalize_xyz(&self, x: i64, y: i64, z: u8, world_x: i64) -> TileCoord {
        TileCoord::new(x + world_x * (1i64 << z), y, z)
    }

    pub fn denormalize_meters(&self, mx: f64, my: f64, _level: u8, world_x: i64) -> (f64, f64) {
        (mx + world_x as f64 * 2.0 * PI * EARTH_RADIUS, my)
    }

    /// Which horizontal copy of the world a tile column falls in.
    pub fn calculate_world_x_by_tile_xyz(&self, x: i64, _y: i64, z: u8) -> i64 {
        x.div_euclid(1i64 << z)
    }

    /// Quadkey of the tile after wraparound normalisation.
    pub fn quadkey_for(&self, x: i64, y: i64, z: u8) -> String {
        let normalized = self.normalize_xyz(x, y, z);
        tile_xyz_to_quadkey(normalized.x, normalized.y, normalized.z)
    }

    /// The four tiles one level deeper, kept in the same world copy.
    pub fn children_by_tile_xyz(&self, x: i64, y: i64, z: u8) -> Result<Vec<TileBounds>> {
        let world_x = self.calculate_world_x_by_tile_xyz(x, y, z);
        let quadkey = self.quadkey_for(x, y, z);
        let mut children = Vec::with_capacity(4);
        for digit in ['0', '1', '2', '3'] {
            let mut child_key = quadkey.clone();
            child_key.push(digit);
            let child = quadkey_to_tile_xyz(&child_key)?;
            let child = self.denormalize_xyz(child.x, child.y, child.z, world_x);
            children.push(TileBounds {
                coord: child,
                bounds: self.get_tile_meter_bounds(child.x, child.y, child.z),
            });
        }
        Ok(children)
    }

    /// The tile one level up. The root is its own parent.
    pub fn parent_by_tile_xyz(&self, x: i64, y: i64, z: u8) -> Result<TileCoord> {
        let world_x = self.calculate_world_x_by_tile_xyz(x, y, z);
        let quadkey = self.quadkey_for(x, y, z);
        let parent_key = &quadkey[..quadkey.len().saturating_sub(1)];
        let parent = quadkey_to_tile_xyz(parent_key)?;
        Ok(self.denormalize_xyz(parent.x, parent.y, parent.z, world_x))
    }

    /// Walks up the quadtree and returns the first ancestor whose cache key
    /// satisfies `is_cached`, or `(0, 0, 0)` when none does.
    pub fn closest_parent_where<F>(&self, x: i64, y: i64, z: u8, is_cached: F) -> Result<TileCoord>
    where
        F: Fn(&str) -> bool,
    {
        let world_x = self.calculate_world_x_by_tile_xyz(x, y, z);
        let mut quadkey = self.quadkey_for(x, y, z);
        while quadkey.pop().is_some() {
            let ancestor = quadkey_to_tile_xyz(&quadkey)?;
            let ancestor = self.denormalize_xyz(ancestor.x, ancestor.y, ancestor.z, world_x);
            if is_cached(&ancestor.cache_key()) {
                return Ok(ancestor);
            }
        }
        Ok(TileCoord::new(0, 0, 0))
    }
}
