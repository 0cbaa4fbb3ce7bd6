//! Prelude module for common tilecast types and traits
//!
//! Re-exports the types most hosts need, for `use tilecast::prelude::*;`

pub use crate::core::{
    bounds::Extent,
    config::{RetentionPolicy, SchemeKind, TileRendererOptions, TileSourceOptions},
    geo::{LatLng, TileCoord},
    viewport::{Frame, ScreenRect, ScreenTransform},
};

pub use crate::layers::tile::{
    host::RenderHost,
    renderer::{RenderState, TileRenderer},
    timer::Deadline,
};

pub use crate::runtime::{runtime, spawn, AsyncHandle, AsyncSpawner};

pub use crate::tiles::{
    cache::{CacheStats, RetentionCriteria, TileCache},
    codec::{MercatorCodec, TileBounds},
    loader::{HttpFetcher, TileFetcher, TileLoader, TileLoaderConfig, TileRequest, TileResult},
    pool::{ImageHandle, ImagePool},
    scheme::TilingScheme,
    source::TileSource,
    tile::Tile,
};

pub use crate::{Error as TileError, Result};

pub use std::{
    sync::Arc,
    time::{Duration, Instant},
};

pub use fxhash::{FxHashMap as HashMap, FxHashSet as HashSet};

pub use futures::Future;
pub use std::pin::Pin;
