//! Tile cache keyed by `"x:y:z"` with multi-criteria retention
//!
//! The cache is only mutated through the transitions below, all driven from
//! the scheduler's thread: `insert`, `mark_loaded`, `mark_errored`,
//! `mark_drawn`, `prune` and `clear`.

use image::RgbaImage;
use serde::Serialize;

use crate::core::constants::{DESCENDANT_RETAIN_DEPTH, NEIGHBOR_RADIUS, SHALLOW_RETAIN_ZOOM};
use crate::core::geo::TileCoord;
use crate::prelude::HashMap;
use crate::tiles::pool::ImagePool;
use crate::tiles::tile::Tile;

/// What keeps a tile alive across a prune pass besides being visible.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetentionCriteria {
    /// Same-zoom tiles within this many columns/rows of a visible tile
    pub neighbor_radius: i64,
    /// Cached descendants up to this many levels below a visible tile
    pub descendant_depth: usize,
    /// Tiles shallower than this zoom are always kept
    pub shallow_zoom: u8,
}

impl Default for RetentionCriteria {
    fn default() -> Self {
        Self {
            neighbor_radius: NEIGHBOR_RADIUS,
            descendant_depth: DESCENDANT_RETAIN_DEPTH,
            shallow_zoom: SHALLOW_RETAIN_ZOOM,
        }
    }
}

/// Snapshot of cache occupancy for diagnostics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub tiles: usize,
    pub loaded: usize,
    pub finished: usize,
    pub pooled_images: usize,
}

#[derive(Debug, Default)]
pub struct TileCache {
    tiles: HashMap<String, Tile>,
}

fn world_of(coord: &TileCoord) -> i64 {
    coord.x.div_euclid(1i64 << coord.z)
}

impl TileCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.tiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.tiles.contains_key(key)
    }

    pub fn get(&self, key: &str) -> Option<&Tile> {
        self.tiles.get(key)
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut Tile> {
        self.tiles.get_mut(key)
    }

    pub fn tiles(&self) -> impl Iterator<Item = &Tile> {
        self.tiles.values()
    }

    /// Adds a tile, handing back whatever tile previously held the same key.
    pub fn insert(&mut self, tile: Tile) -> Option<Tile> {
        log::trace!("cache insert {}", tile.cache_key);
        self.tiles.insert(tile.cache_key.clone(), tile)
    }

    /// Stores a decoded image. Returns `false` if the tile is gone or already settled.
    pub fn mark_loaded(&mut self, key: &str, image: RgbaImage) -> bool {
        match self.tiles.get_mut(key) {
            Some(tile) if !tile.finished && !tile.loaded => {
                tile.mark_loaded(image);
                true
            }
            _ => false,
        }
    }

    /// Records a failed fetch. Returns `false` if the tile is gone or already settled.
    pub fn mark_errored(&mut self, key: &str, error: String) -> bool {
        match self.tiles.get_mut(key) {
            Some(tile) if !tile.finished => {
                tile.mark_errored(error);
                true
            }
            _ => false,
        }
    }

    pub fn mark_drawn(&mut self, key: &str) {
        if let Some(tile) = self.tiles.get_mut(key) {
            tile.mark_drawn();
        }
    }

    /// Clears the `current` flag on every tile ahead of a viewport update.
    pub fn reset_current(&mut self) {
        for tile in self.tiles.values_mut() {
            tile.current = false;
        }
    }

    pub fn set_current(&mut self, key: &str) {
        if let Some(tile) = self.tiles.get_mut(key) {
            tile.current = true;
        }
    }

    /// Marks what to keep, then evicts everything else into `pool`.
    /// Returns the number of evicted tiles.
    pub fn prune(&mut self, pool: &mut ImagePool, criteria: &RetentionCriteria) -> usize {
        self.mark_retained(criteria);
        let evicted: Vec<String> = self
            .tiles
            .values()
            .filter(|tile| !tile.retain)
            .map(|tile| tile.cache_key.clone())
            .collect();
        self.evict(evicted, pool)
    }

    /// Evicts every tile into `pool`. Returns the number of evicted tiles.
    pub fn clear(&mut self, pool: &mut ImagePool) -> usize {
        let keys: Vec<String> = self.tiles.keys().cloned().collect();
        self.evict(keys, pool)
    }

    fn evict(&mut self, keys: Vec<String>, pool: &mut ImagePool) -> usize {
        let mut count = 0;
        for key in keys {
            if let Some(tile) = self.tiles.remove(&key) {
                log::trace!("cache evict {key}");
                pool.push(tile.into_image());
                count += 1;
            }
        }
        count
    }

    fn mark_retained(&mut self, criteria: &RetentionCriteria) {
        for tile in self.tiles.values_mut() {
            tile.retain = tile.current || tile.normalized.z < criteria.shallow_zoom;
        }

        let visible: Vec<(TileCoord, String, i64)> = self
            .tiles
            .values()
            .filter(|tile| tile.current)
            .map(|tile| (tile.coord, tile.quadkey.clone(), world_of(&tile.coord)))
            .collect();

        let mut keep: Vec<String> = Vec::new();
        for (coord, quadkey, world) in &visible {
            let radius = criteria.neighbor_radius;
            for dx in -radius..=radius {
                for dy in -radius..=radius {
                    let key = TileCoord::new(coord.x + dx, coord.y + dy, coord.z).cache_key();
                    if self.tiles.contains_key(&key) {
                        keep.push(key);
                    }
                }
            }

            let deepest = quadkey.len() + criteria.descendant_depth;
            for tile in self.tiles.values() {
                if world_of(&tile.coord) != *world {
                    continue;
                }
                let other = &tile.quadkey;
                let descendant =
                    other.len() > quadkey.len() && other.len() <= deepest && other.starts_with(quadkey.as_str());
                let ancestor = other.len() < quadkey.len() && quadkey.starts_with(other.as_str());
                if descendant || ancestor {
                    keep.push(tile.cache_key.clone());
                }
            }
        }

        for key in keep {
            if let Some(tile) = self.tiles.get_mut(&key) {
                tile.retain = true;
            }
        }
    }

    pub fn stats(&self, pool: &ImagePool) -> CacheStats {
        CacheStats {
            tiles: self.tiles.len(),
            loaded: self.tiles.values().filter(|tile| tile.loaded).count(),
            finished: self.tiles.values().filter(|tile| tile.finished).count(),
            pooled_images: pool.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tiles::codec::MercatorCodec;

    fn add(cache: &mut TileCache, pool: &mut ImagePool, codec: &MercatorCodec, x: i64, y: i64, z: u8) -> u64 {
        let coord = TileCoord::new(x, y, z);
        let handle = pool.pop();
        let id = handle.id();
        cache.insert(Tile::new(
            coord,
            codec.normalize_xyz(x, y, z),
            codec.quadkey_for(x, y, z),
            codec.get_tile_meter_bounds(x, y, z),
            handle,
            false,
        ));
        id
    }

    #[test]
    fn test_load_and_error_transitions() {
        let codec = MercatorCodec::default();
        let mut pool = ImagePool::new();
        let mut cache = TileCache::new();
        add(&mut cache, &mut pool, &codec, 1, 1, 4);
        add(&mut cache, &mut pool, &codec, 2, 1, 4);

        assert!(cache.mark_loaded("1:1:4", RgbaImage::new(1, 1)));
        assert!(!cache.mark_loaded("1:1:4", RgbaImage::new(1, 1)));
        assert!(!cache.get("1:1:4").unwrap().finished);
        cache.mark_drawn("1:1:4");
        assert!(cache.get("1:1:4").unwrap().finished);

        assert!(cache.mark_errored("2:1:4", "boom".into()));
        let errored = cache.get("2:1:4").unwrap();
        assert!(errored.finished && !errored.loaded);
        // settled tiles ignore late results
        assert!(!cache.mark_loaded("2:1:4", RgbaImage::new(1, 1)));
        assert!(!cache.mark_errored("9:9:9", "missing".into()));
    }

    #[test]
    fn test_insert_replaces_same_key() {
        let codec = MercatorCodec::default();
        let mut pool = ImagePool::new();
        let mut cache = TileCache::new();
        add(&mut cache, &mut pool, &codec, 3, 3, 5);
        add(&mut cache, &mut pool, &codec, 3, 3, 5);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_prune_keeps_retention_set() {
        let codec = MercatorCodec::default();
        let mut pool = ImagePool::new();
        let mut cache = TileCache::new();

        add(&mut cache, &mut pool, &codec, 10, 10, 6); // visible
        add(&mut cache, &mut pool, &codec, 14, 6, 6); // neighbour at the radius edge
        add(&mut cache, &mut pool, &codec, 15, 10, 6); // just outside the radius
        add(&mut cache, &mut pool, &codec, 5, 5, 5); // ancestor
        add(&mut cache, &mut pool, &codec, 20, 20, 7); // child
        add(&mut cache, &mut pool, &codec, 80, 80, 9); // depth 3 descendant
        add(&mut cache, &mut pool, &codec, 160, 160, 10); // depth 4, too deep
        add(&mut cache, &mut pool, &codec, 1, 1, 2); // shallow
        add(&mut cache, &mut pool, &codec, 40, 40, 6); // unrelated
        cache.set_current("10:10:6");

        let evicted = cache.prune(&mut pool, &RetentionCriteria::default());
        assert_eq!(evicted, 3);
        for key in ["10:10:6", "14:6:6", "5:5:5", "20:20:7", "80:80:9", "1:1:2"] {
            assert!(cache.contains(key), "{key} should be retained");
        }
        for key in ["15:10:6", "160:160:10", "40:40:6"] {
            assert!(!cache.contains(key), "{key} should be evicted");
        }
        assert!(cache.tiles().all(|tile| tile.retain));
    }

    #[test]
    fn test_prune_respects_world_copies() {
        let codec = MercatorCodec::default();
        let mut pool = ImagePool::new();
        let mut cache = TileCache::new();
        add(&mut cache, &mut pool, &codec, 3, 3, 4);
        // same quadkey prefix, other world copy, far beyond the neighbour radius
        add(&mut cache, &mut pool, &codec, 6 - 32, 6, 5);
        cache.set_current("3:3:4");
        cache.prune(&mut pool, &RetentionCriteria::default());
        assert!(!cache.contains("-26:6:5"));
    }

    #[test]
    fn test_evicted_handles_return_to_pool_once() {
        let codec = MercatorCodec::default();
        let mut pool = ImagePool::new();
        let mut cache = TileCache::new();
        let mut ids = Vec::new();
        for x in 0..8 {
            ids.push(add(&mut cache, &mut pool, &codec, x * 10, 0, 8));
        }
        cache.set_current("0:0:8");

        let evicted = cache.prune(&mut pool, &RetentionCriteria::default());
        assert_eq!(evicted, 7);
        assert_eq!(pool.len(), 7);
        for id in &ids[1..] {
            assert!(pool.contains(*id));
        }
        assert!(!pool.contains(ids[0]));
    }

    #[test]
    fn test_clear_and_stats() {
        let codec = MercatorCodec::default();
        let mut pool = ImagePool::new();
        let mut cache = TileCache::new();
        add(&mut cache, &mut pool, &codec, 0, 0, 3);
        add(&mut cache, &mut pool, &codec, 1, 0, 3);
        cache.mark_loaded("0:0:3", RgbaImage::new(1, 1));

        let stats = cache.stats(&pool);
        assert_eq!(stats, CacheStats { tiles: 2, loaded: 1, finished: 0, pooled_images: 0 });

        assert_eq!(cache.clear(&mut pool), 2);
        assert!(cache.is_empty());
        assert_eq!(pool.len(), 2);
    }
}
