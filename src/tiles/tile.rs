use image::RgbaImage;

use crate::core::bounds::Extent;
use crate::core::geo::TileCoord;
use crate::tiles::pool::ImageHandle;

/// One cached tile and its lifecycle flags.
#[derive(Debug)]
pub struct Tile {
    /// Position as requested, possibly in a repeated world copy
    pub coord: TileCoord,
    /// Position wrapped into the canonical world
    pub normalized: TileCoord,
    pub quadkey: String,
    pub cache_key: String,
    pub bounds: Extent,
    pub loaded: bool,
    pub finished: bool,
    pub retain: bool,
    /// Needed by the most recent viewport update
    pub current: bool,
    /// Fetched ahead of need; never drawn from the load callback
    pub cache_only: bool,
    pub error: Option<String>,
    pub loaded_time: Option<std::time::Instant>,
    image: ImageHandle,
}

impl Tile {
    pub fn new(
        coord: TileCoord,
        normalized: TileCoord,
        quadkey: String,
        bounds: Extent,
        image: ImageHandle,
        cache_only: bool,
    ) -> Self {
        Self {
            coord,
            normalized,
            quadkey,
            cache_key: coord.cache_key(),
            bounds,
            loaded: false,
            finished: false,
            retain: false,
            current: false,
            cache_only,
            error: None,
            loaded_time: None,
            image,
        }
    }

    pub fn image(&self) -> &ImageHandle {
        &self.image
    }

    /// Gives up the image handle when the tile leaves the cache.
    pub fn into_image(self) -> ImageHandle {
        self.image
    }

    pub fn mark_loaded(&mut self, image: RgbaImage) {
        self.image.set_image(image);
        self.loaded = true;
        self.error = None;
        self.loaded_time = Some(std::time::Instant::now());
        if self.cache_only {
            self.finished = true;
        }
    }

    pub fn mark_errored(&mut self, error: String) {
        self.error = Some(error);
        self.finished = true;
    }

    /// A loaded tile that has been drawn once is finished.
    pub fn mark_drawn(&mut self) {
        if self.loaded {
            self.finished = true;
        }
    }
}
