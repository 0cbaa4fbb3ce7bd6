//! A configured tile source: projection math, URL scheme, cache and image pool

use crate::core::config::{RetentionPolicy, TileSourceOptions};
use crate::core::geo::TileCoord;
use crate::tiles::cache::{CacheStats, RetentionCriteria, TileCache};
use crate::tiles::codec::MercatorCodec;
use crate::tiles::loader::{TileRequest, TileResult};
use crate::tiles::pool::ImagePool;
use crate::tiles::scheme::{TilingScheme, UrlTemplate};
use crate::tiles::tile::Tile;
use crate::Result;

/// What a fetch result did to the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    Loaded { cache_only: bool },
    Failed,
}

#[derive(Debug)]
pub struct TileSource {
    options: TileSourceOptions,
    codec: MercatorCodec,
    scheme: TilingScheme,
    template: UrlTemplate,
    cache: TileCache,
    pool: ImagePool,
    criteria: RetentionCriteria,
    retention: RetentionPolicy,
    /// Bumped on every invalidation so in-flight results can be recognised as stale
    generation: u64,
}

impl TileSource {
    pub fn new(options: TileSourceOptions) -> Result<Self> {
        let (codec, scheme, template) = Self::build(&options)?;
        log::info!(
            "tile source {:?} ({:?}, zoom {}..={})",
            template.as_str(),
            scheme.kind(),
            codec.min_zoom(),
            codec.max_zoom()
        );
        Ok(Self {
            options,
            codec,
            scheme,
            template,
            cache: TileCache::new(),
            pool: ImagePool::new(),
            criteria: RetentionCriteria::default(),
            retention: RetentionPolicy::default(),
            generation: 0,
        })
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Self::new(TileSourceOptions::from_json(json)?)
    }

    fn build(options: &TileSourceOptions) -> Result<(MercatorCodec, TilingScheme, UrlTemplate)> {
        let codec = MercatorCodec::from_options(options)?;
        let scheme = TilingScheme::from_options(options);
        let template = UrlTemplate::new(&options.url, options.extra_url_vars.clone());
        template.validate(&scheme)?;
        Ok((codec, scheme, template))
    }

    pub fn options(&self) -> &TileSourceOptions {
        &self.options
    }

    pub fn codec(&self) -> &MercatorCodec {
        &self.codec
    }

    pub fn scheme(&self) -> TilingScheme {
        self.scheme
    }

    pub fn attribution(&self) -> &str {
        &self.options.attribution
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn cache(&self) -> &TileCache {
        &self.cache
    }

    pub fn cache_mut(&mut self) -> &mut TileCache {
        &mut self.cache
    }

    pub fn pool(&self) -> &ImagePool {
        &self.pool
    }

    pub fn retention(&self) -> RetentionPolicy {
        self.retention
    }

    pub fn set_retention(&mut self, retention: RetentionPolicy) {
        self.retention = retention;
    }

    pub fn set_retention_criteria(&mut self, criteria: RetentionCriteria) {
        self.criteria = criteria;
    }

    pub fn stats(&self) -> CacheStats {
        self.cache.stats(&self.pool)
    }

    /// Replaces the configuration.
    ///
    /// Changes that alter tile identity or URLs always empty the cache. Under
    /// [`RetentionPolicy::InvalidateOnChange`] any change does. Returns whether
    /// the cache was invalidated.
    pub fn update_options(&mut self, options: TileSourceOptions) -> Result<bool> {
        if options == self.options {
            return Ok(false);
        }
        let (codec, scheme, template) = Self::build(&options)?;
        let identity_changed =
            !Self::same_tiling(&codec, &self.codec) || scheme != self.scheme || template != self.template;
        let invalidate = identity_changed || self.retention == RetentionPolicy::InvalidateOnChange;

        self.options = options;
        self.codec = codec;
        self.scheme = scheme;
        self.template = template;
        if invalidate {
            self.invalidate();
        }
        Ok(invalidate)
    }

    /// Equal apart from `snap_to_zoom`, which only affects extent snapping.
    fn same_tiling(a: &MercatorCodec, b: &MercatorCodec) -> bool {
        let mut a = a.clone();
        a.set_snap_to_zoom(b.snap_to_zoom());
        a == *b
    }

    pub fn set_url(&mut self, url: impl Into<String>) -> Result<bool> {
        let mut options = self.options.clone();
        options.url = url.into();
        self.update_options(options)
    }

    pub fn set_zoom_bounds(&mut self, min_zoom: u8, max_zoom: u8) -> Result<bool> {
        let mut options = self.options.clone();
        options.min_zoom = min_zoom;
        options.max_zoom = max_zoom;
        self.update_options(options)
    }

    /// Empties the cache into the pool and starts a new generation.
    pub fn invalidate(&mut self) {
        let evicted = self.cache.clear(&mut self.pool);
        self.generation += 1;
        log::debug!("tile cache invalidated: {evicted} tiles dropped, generation {}", self.generation);
    }

    /// Runs one multi-criteria retention pass. Returns the number of evicted tiles.
    pub fn prune(&mut self) -> usize {
        let evicted = self.cache.prune(&mut self.pool, &self.criteria);
        if evicted > 0 {
            log::debug!("pruned {evicted} tiles, {} remain", self.cache.len());
        }
        evicted
    }

    /// URL for a tile, wrapping it into the canonical world first.
    pub fn get_image_url(&self, x: i64, y: i64, z: u8) -> String {
        let normalized = self.codec.normalize_xyz(x, y, z);
        self.scheme
            .image_url(&self.template, &self.codec, normalized.x, normalized.y, normalized.z)
    }

    pub fn get_closest_parent_by_tile_xyz(&self, x: i64, y: i64, z: u8) -> Result<TileCoord> {
        self.codec
            .closest_parent_where(x, y, z, |key| self.cache.contains(key))
    }

    /// Creates a cache entry for `coord` and describes the fetch that will fill it.
    pub fn create_tile(&mut self, coord: TileCoord, cache_only: bool) -> TileRequest {
        let (x, y, z) = (coord.x, coord.y, coord.z);
        let url = self.get_image_url(x, y, z);
        let mut handle = self.pool.pop();
        handle.set_src(url.clone());

        let tile = Tile::new(
            coord,
            self.codec.normalize_xyz(x, y, z),
            self.codec.quadkey_for(x, y, z),
            self.codec.get_tile_meter_bounds(x, y, z),
            handle,
            cache_only,
        );
        let request = TileRequest {
            cache_key: tile.cache_key.clone(),
            coord,
            url,
            generation: self.generation,
            cache_only,
        };
        if let Some(previous) = self.cache.insert(tile) {
            self.pool.push(previous.into_image());
        }
        request
    }

    /// Applies a finished fetch. Results from an older generation, or for tiles
    /// no longer cached, are dropped.
    pub fn apply_result(&mut self, result: TileResult) -> Option<LoadOutcome> {
        let TileResult { request, image } = result;
        if request.generation != self.generation {
            log::debug!("dropping stale result for {} (generation {})", request.cache_key, request.generation);
            return None;
        }
        match image {
            Ok(image) => self
                .cache
                .mark_loaded(&request.cache_key, image)
                .then_some(LoadOutcome::Loaded {
                    cache_only: request.cache_only,
                }),
            Err(e) => {
                log::warn!("tile {} failed to load from {}: {e}", request.cache_key, request.url);
                self.cache
                    .mark_errored(&request.cache_key, e.to_string())
                    .then_some(LoadOutcome::Failed)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::SchemeKind;
    use crate::Error;
    use image::RgbaImage;

    fn source() -> TileSource {
        TileSource::new(TileSourceOptions::new(
            "https://tiles.example.com/{z}/{x}/{y}.png",
            SchemeKind::Wmts,
        ))
        .unwrap()
    }

    #[test]
    fn test_construction_errors() {
        assert!(matches!(
            TileSource::new(TileSourceOptions::new("", SchemeKind::Wmts)),
            Err(Error::Config(_))
        ));
        assert!(TileSource::new(TileSourceOptions::new("not a url/{X}", SchemeKind::Wmts)).is_err());
        assert!(TileSource::from_json(r#"{"url": "http://t/{Q}", "max_zoom": 31}"#).is_err());
        assert!(TileSource::from_json(r#"{"url": "http://t/{Q}", "scheme": "quadkey"}"#).is_ok());
    }

    #[test]
    fn test_image_url_wraps_world_copies() {
        let source = source();
        assert_eq!(source.get_image_url(-1, 0, 1), source.get_image_url(1, 0, 1));
        assert_eq!(source.get_image_url(1, 0, 1), "https://tiles.example.com/1/1/1.png");
    }

    #[test]
    fn test_create_tile_keeps_unwrapped_key() {
        let mut source = source();
        let request = source.create_tile(TileCoord::new(-1, 0, 1), false);
        assert_eq!(request.cache_key, "-1:0:1");
        assert_eq!(request.url, "https://tiles.example.com/1/1/1.png");
        let tile = source.cache().get("-1:0:1").unwrap();
        assert_eq!(tile.normalized, TileCoord::new(1, 0, 1));
        assert_eq!(tile.image().src(), Some(request.url.as_str()));
    }

    #[test]
    fn test_closest_parent_uses_cache() {
        let mut source = source();
        source.create_tile(TileCoord::new(0, 1, 1), false);
        assert_eq!(source.get_closest_parent_by_tile_xyz(0, 3, 2).unwrap(), TileCoord::new(0, 1, 1));
    }

    #[test]
    fn test_apply_result() {
        let mut source = source();
        let ok = source.create_tile(TileCoord::new(0, 0, 2), true);
        let bad = source.create_tile(TileCoord::new(1, 0, 2), false);

        let loaded = source.apply_result(TileResult {
            request: ok,
            image: Ok(RgbaImage::new(4, 4)),
        });
        assert_eq!(loaded, Some(LoadOutcome::Loaded { cache_only: true }));
        assert!(source.cache().get("0:0:2").unwrap().finished);

        let failed = source.apply_result(TileResult {
            request: bad,
            image: Err(Error::Runtime("unreachable".into())),
        });
        assert_eq!(failed, Some(LoadOutcome::Failed));
        assert_eq!(source.stats().finished, 2);
    }

    #[test]
    fn test_stale_results_dropped_after_invalidation() {
        let mut source = source();
        let request = source.create_tile(TileCoord::new(0, 0, 2), false);
        assert!(source.set_url("https://other.example.com/{z}/{x}/{y}.png").unwrap());
        assert!(source.cache().is_empty());
        assert_eq!(source.pool().len(), 1);

        let outcome = source.apply_result(TileResult {
            request,
            image: Ok(RgbaImage::new(1, 1)),
        });
        assert_eq!(outcome, None);
        assert!(source.cache().is_empty());
    }

    #[test]
    fn test_retention_criteria_are_tunable() {
        let mut source = source();
        source.create_tile(TileCoord::new(40, 40, 8), false);
        source.create_tile(TileCoord::new(42, 40, 8), false);
        source.cache_mut().set_current("40:40:8");

        source.set_retention_criteria(RetentionCriteria {
            neighbor_radius: 1,
            ..Default::default()
        });
        assert_eq!(source.prune(), 1);
        assert!(source.cache().contains("40:40:8"));
        assert!(!source.cache().contains("42:40:8"));
    }

    #[test]
    fn test_update_options_policies() {
        let mut source = source();
        source.create_tile(TileCoord::new(0, 0, 2), false);

        let mut options = source.options().clone();
        options.attribution = "© Example".into();
        assert!(!source.update_options(options.clone()).unwrap());
        assert_eq!(source.cache().len(), 1);
        assert_eq!(source.attribution(), "© Example");

        source.set_retention(RetentionPolicy::InvalidateOnChange);
        options.attribution = "© Other".into();
        assert!(source.update_options(options).unwrap());
        assert!(source.cache().is_empty());

        assert!(source.set_zoom_bounds(4, 2).is_err());
    }
}
