//! Engine-wide constants for Web Mercator tiling and tile scheduling.
//! Keeping them in a single place makes it easier to tweak the magic numbers.

/// Default square tile size in pixels.
pub const TILE_SIZE: u32 = 256;

/// WGS84 semi-major axis in meters.
pub const EARTH_RADIUS: f64 = 6_378_137.0;

/// Half the Web Mercator world width. Used as the origin offset on both axes.
pub const MERCATOR_ORIGIN_OFFSET: f64 = 20_037_508.34;

/// Meters per pixel at zoom 0 for 256px tiles.
pub const DEFAULT_INITIAL_RESOLUTION: f64 = 156_543.033_928_040_97;

/// Latitude limit of the Web Mercator projection.
pub const MAX_LATITUDE: f64 = 85.051_128_779_8;

/// Default zoom bounds.
pub const DEFAULT_MIN_ZOOM: u8 = 0;
pub const DEFAULT_MAX_ZOOM: u8 = 30;

/// Highest zoom the quadkey and pixel math supports without overflow.
pub const MAX_SUPPORTED_ZOOM: u8 = 30;

/// Number of idle image handles the pool keeps. Not configurable at runtime,
/// but this is the knob to turn if decode churn shows up in profiles.
pub const IMAGE_POOL_CAPACITY: usize = 50;

/// Tiles shallower than this zoom are always retained.
pub const SHALLOW_RETAIN_ZOOM: u8 = 3;

/// Same-zoom neighbour window (in tiles) kept around each visible tile.
pub const NEIGHBOR_RADIUS: i64 = 4;

/// How many zoom levels of descendants are kept below each visible tile.
pub const DESCENDANT_RETAIN_DEPTH: usize = 3;

/// Extra ring of tiles requested beyond the viewport edge.
pub const DEFAULT_TILE_BORDER: i64 = 1;

/// Debounce before missing tiles are actually requested.
pub const FETCH_DEBOUNCE_MS: u64 = 65;

/// Delay before children of the central tiles are prefetched.
pub const PREFETCH_DELAY_MS: u64 = 500;

/// How many of the most central tiles get their children prefetched.
pub const PREFETCH_TILE_COUNT: usize = 10;

/// Interval between retention prune passes.
pub const PRUNE_INTERVAL_MS: u64 = 1_000;
