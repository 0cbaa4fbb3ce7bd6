//! Configuration for tile sources and the tile renderer
//!
//! Both option structs deserialize from partial JSON documents: any field left
//! out takes its default, so `{"url": "..."}` is a complete source config.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::core::constants::{
    DEFAULT_INITIAL_RESOLUTION, DEFAULT_MAX_ZOOM, DEFAULT_MIN_ZOOM, DEFAULT_TILE_BORDER,
    FETCH_DEBOUNCE_MS, MERCATOR_ORIGIN_OFFSET, PREFETCH_DELAY_MS, PREFETCH_TILE_COUNT,
    PRUNE_INTERVAL_MS, TILE_SIZE,
};
use crate::Result;

/// Which URL layout a tile server speaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SchemeKind {
    /// Top-origin rows, `{X}/{Y}/{Z}` placeholders
    #[default]
    Wmts,
    /// Bottom-origin rows, `{X}/{Y}/{Z}` placeholders
    Tms,
    /// Bing-style `{Q}` placeholder
    Quadkey,
    /// WMS-style `{XMIN},{YMIN},{XMAX},{YMAX}` placeholders
    Bbox,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TileSourceOptions {
    pub url: String,
    pub scheme: SchemeKind,
    /// Bbox scheme only: substitute lon/lat bounds instead of meters
    pub use_latlon: bool,
    pub tile_size: u32,
    pub min_zoom: u8,
    pub max_zoom: u8,
    pub wrap_around: bool,
    pub snap_to_zoom: bool,
    pub attribution: String,
    pub x_origin_offset: f64,
    pub y_origin_offset: f64,
    /// `None` derives the resolution from the earth circumference and tile size
    pub initial_resolution: Option<f64>,
    pub extra_url_vars: BTreeMap<String, String>,
}

impl Default for TileSourceOptions {
    fn default() -> Self {
        Self {
            url: String::new(),
            scheme: SchemeKind::default(),
            use_latlon: false,
            tile_size: TILE_SIZE,
            min_zoom: DEFAULT_MIN_ZOOM,
            max_zoom: DEFAULT_MAX_ZOOM,
            wrap_around: true,
            snap_to_zoom: false,
            attribution: String::new(),
            x_origin_offset: MERCATOR_ORIGIN_OFFSET,
            y_origin_offset: MERCATOR_ORIGIN_OFFSET,
            initial_resolution: Some(DEFAULT_INITIAL_RESOLUTION),
            extra_url_vars: BTreeMap::new(),
        }
    }
}

impl TileSourceOptions {
    pub fn new(url: impl Into<String>, scheme: SchemeKind) -> Self {
        Self {
            url: url.into(),
            scheme,
            ..Default::default()
        }
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// How cached tiles leave the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RetentionPolicy {
    /// Periodic prune keeping visible tiles, their neighbours, ancestors and
    /// shallow descendants
    #[default]
    MultiCriteria,
    /// No pruning; the cache is emptied only when the source configuration changes
    InvalidateOnChange,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TileRendererOptions {
    pub alpha: f32,
    pub smoothing: bool,
    /// Draw cached ancestors (and descendants when zooming out) under missing tiles
    pub render_parents: bool,
    pub retention: RetentionPolicy,
    pub fetch_debounce_ms: u64,
    pub prefetch_delay_ms: u64,
    pub prefetch_tile_count: usize,
    pub prune_interval_ms: u64,
    pub tile_border: i64,
    pub outline_width: f64,
}

impl Default for TileRendererOptions {
    fn default() -> Self {
        Self {
            alpha: 1.0,
            smoothing: true,
            render_parents: true,
            retention: RetentionPolicy::default(),
            fetch_debounce_ms: FETCH_DEBOUNCE_MS,
            prefetch_delay_ms: PREFETCH_DELAY_MS,
            prefetch_tile_count: PREFETCH_TILE_COUNT,
            prune_interval_ms: PRUNE_INTERVAL_MS,
            tile_border: DEFAULT_TILE_BORDER,
            outline_width: 0.0,
        }
    }
}

impl TileRendererOptions {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// No prefetching and no placeholders; useful on metered connections
    pub fn low_bandwidth() -> Self {
        Self {
            render_parents: false,
            prefetch_tile_count: 0,
            ..Default::default()
        }
    }

    pub fn fetch_debounce(&self) -> Duration {
        Duration::from_millis(self.fetch_debounce_ms)
    }

    pub fn prefetch_delay(&self) -> Duration {
        Duration::from_millis(self.prefetch_delay_ms)
    }

    pub fn prune_interval(&self) -> Duration {
        Duration::from_millis(self.prune_interval_ms)
    }
}
