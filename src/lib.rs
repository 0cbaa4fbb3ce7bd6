//! # Tilecast
//!
//! Tile cache and viewport scheduling for Web Mercator map imagery.
//!
//! Given a viewport extent in projected meters and a tiling scheme (WMTS, TMS,
//! quadkey or bounding-box URLs), the engine works out which tiles are needed,
//! fetches them asynchronously, recycles their decoded images, keeps a working
//! set alive across pans and zooms, and evicts the rest.
//!
//! The pieces, leaves first:
//!
//! - [`tiles::codec`]: quadkeys, the resolution ladder and tile/pixel/meter math
//! - [`tiles::pool`]: a capped pool of reusable image handles
//! - [`tiles::source`]: URL schemes plus the tile cache and its retention rules
//! - [`layers::tile::renderer`]: the scheduler driving fetch, prefetch and prune timers

pub mod core;
pub mod layers;
pub mod prelude;
pub mod runtime;
pub mod tiles;
pub use crate::core::constants;

// Re-export public API
pub use crate::core::{
    bounds::Extent,
    config::{RetentionPolicy, SchemeKind, TileRendererOptions, TileSourceOptions},
    geo::{LatLng, TileCoord},
    viewport::{Frame, ScreenRect},
};

pub use layers::tile::{host::RenderHost, renderer::TileRenderer};

pub use tiles::{
    cache::CacheStats,
    loader::{HttpFetcher, TileFetcher, TileLoader},
    pool::{ImageHandle, ImagePool},
    source::TileSource,
};

/// Result type used throughout the library
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types
#[derive(Debug, thiserror::Error)]
pub enum TileError {
    #[error("invalid quadkey {0:?}: digits must be 0-3")]
    InvalidQuadkey(String),

    #[error("invalid cache key {0:?}: expected \"x:y:z\"")]
    InvalidCacheKey(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("HTTP {status} for {url}")]
    Http { status: u16, url: String },

    #[error("decode error: {0}")]
    Decode(#[from] image::ImageError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("runtime error: {0}")]
    Runtime(String),
}

/// Error type alias for convenience
pub type Error = TileError;

/// Initialises `env_logger` from `RUST_LOG`, defaulting to `info`.
///
/// Safe to call more than once.
#[cfg(feature = "debug")]
pub fn init_logging() {
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .try_init();
}
