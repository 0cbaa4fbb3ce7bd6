//! The tile scheduler
//!
//! [`TileRenderer`] is driven by two calls from the host's loop:
//!
//! - [`TileRenderer::paint_at`] on every render tick: snaps the viewport,
//!   classifies the needed tiles, draws what is cached and re-arms the fetch
//!   debounce and prefetch timers.
//! - [`TileRenderer::poll_at`] whenever a timer may be due or results may have
//!   arrived: applies fetch results, fires due timers and runs periodic prunes.
//!
//! Both take the current instant explicitly so the timers can be tested
//! without sleeping; [`TileRenderer::paint`] and [`TileRenderer::poll`] use
//! the real clock.

use std::time::Instant;

use crate::core::bounds::Extent;
use crate::core::config::{RetentionPolicy, TileRendererOptions, TileSourceOptions};
use crate::core::geo::TileCoord;
use crate::core::viewport::{Frame, ScreenTransform};
use crate::layers::tile::host::RenderHost;
use crate::layers::tile::timer::{earliest, Deadline};
use crate::prelude::HashSet;
use crate::tiles::cache::CacheStats;
use crate::tiles::codec::TileBounds;
use crate::tiles::loader::{TileLoader, TileRequest};
use crate::tiles::source::{LoadOutcome, TileSource};
use crate::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderState {
    /// Nothing painted yet
    Uninitialized,
    /// Initial extent snapped and written back to the host
    Initialized,
    /// At least one full update has run
    Steady,
}

/// Needed tiles sorted by how they can be shown this frame.
#[derive(Debug, Default)]
struct Classified {
    cached: Vec<String>,
    parents: Vec<String>,
    children: Vec<String>,
    present: Vec<String>,
    need_load: Vec<TileCoord>,
}

pub struct TileRenderer {
    source: TileSource,
    loader: TileLoader,
    options: TileRendererOptions,
    state: RenderState,
    /// Last accepted extent, the snap-back target
    extent: Option<Extent>,
    last_frame: Option<Frame>,
    zoom_level: Option<u8>,
    /// Cache keys created this session; `None` until the first tile is created
    session: Option<HashSet<String>>,
    pending_fetch: Vec<TileCoord>,
    fetch_timer: Deadline,
    prefetch_timer: Deadline,
    prune_timer: Deadline,
}

impl TileRenderer {
    pub fn new(mut source: TileSource, loader: TileLoader, options: TileRendererOptions) -> Self {
        source.set_retention(options.retention);
        Self {
            source,
            loader,
            options,
            state: RenderState::Uninitialized,
            extent: None,
            last_frame: None,
            zoom_level: None,
            session: None,
            pending_fetch: Vec::new(),
            fetch_timer: Deadline::new(),
            prefetch_timer: Deadline::new(),
            prune_timer: Deadline::new(),
        }
    }

    /// Renderer fetching over HTTP with the shared client
    pub fn with_http(source: TileSource, options: TileRendererOptions) -> Self {
        Self::new(source, TileLoader::http(), options)
    }

    pub fn source(&self) -> &TileSource {
        &self.source
    }

    pub fn source_mut(&mut self) -> &mut TileSource {
        &mut self.source
    }

    pub fn loader(&self) -> &TileLoader {
        &self.loader
    }

    pub fn options(&self) -> &TileRendererOptions {
        &self.options
    }

    pub fn state(&self) -> RenderState {
        self.state
    }

    pub fn attribution(&self) -> &str {
        self.source.attribution()
    }

    /// Zoom level used by the last update
    pub fn zoom_level(&self) -> Option<u8> {
        self.zoom_level
    }

    pub fn extent(&self) -> Option<Extent> {
        self.extent
    }

    /// Tiles waiting for the fetch debounce to expire
    pub fn pending_fetch(&self) -> &[TileCoord] {
        &self.pending_fetch
    }

    pub fn stats(&self) -> CacheStats {
        self.source.stats()
    }

    pub fn set_options(&mut self, options: TileRendererOptions) {
        self.source.set_retention(options.retention);
        if options.retention == RetentionPolicy::InvalidateOnChange {
            self.prune_timer.disarm();
        }
        self.options = options;
    }

    /// Reconfigures the source. Returns whether the cache was invalidated, in
    /// which case the session restarts with the next paint.
    pub fn set_source_options(&mut self, options: TileSourceOptions) -> Result<bool> {
        let invalidated = self.source.update_options(options)?;
        if invalidated {
            self.session = None;
            self.pending_fetch.clear();
            self.fetch_timer.disarm();
            self.prefetch_timer.disarm();
        }
        Ok(invalidated)
    }

    /// True once every tile created this session is finished or evicted.
    pub fn has_finished(&self) -> bool {
        let Some(session) = &self.session else {
            return false;
        };
        let cache = self.source.cache();
        session
            .iter()
            .all(|key| cache.get(key).map_or(true, |tile| tile.finished))
    }

    /// Declares the renderer finished with nothing outstanding.
    pub fn force_finished(&mut self) {
        self.session = Some(HashSet::default());
    }

    /// Earliest armed timer, for hosts that sleep between polls.
    pub fn next_deadline(&self) -> Option<Instant> {
        earliest([&self.fetch_timer, &self.prefetch_timer, &self.prune_timer])
    }

    pub fn paint(&mut self, host: &mut dyn RenderHost) -> Result<()> {
        self.paint_at(host, Instant::now())
    }

    pub fn poll(&mut self, host: &mut dyn RenderHost) -> Result<()> {
        self.poll_at(host, Instant::now())
    }

    pub fn paint_at(&mut self, host: &mut dyn RenderHost, now: Instant) -> Result<()> {
        let frame = host.frame();
        if !(frame.width > 0.0 && frame.height > 0.0) || !host.extent().has_area() {
            log::debug!("skipping paint: frame {frame:?} or extent {:?} unusable", host.extent());
            return Ok(());
        }

        if self.state == RenderState::Uninitialized {
            self.map_data(host);
            self.state = RenderState::Initialized;
        }
        self.process_tile_results(host);
        self.enforce_aspect_ratio(host);
        self.update(host, now)?;
        self.state = RenderState::Steady;

        if self.options.prefetch_tile_count > 0 {
            self.prefetch_timer.arm(now, self.options.prefetch_delay());
        }
        if self.options.retention == RetentionPolicy::MultiCriteria && !self.prune_timer.is_armed() {
            self.prune_timer.arm(now, self.options.prune_interval());
        }
        if self.has_finished() {
            host.notify_finished();
        }
        Ok(())
    }

    pub fn poll_at(&mut self, host: &mut dyn RenderHost, now: Instant) -> Result<()> {
        self.process_tile_results(host);

        if self.fetch_timer.fire(now) {
            let coords = std::mem::take(&mut self.pending_fetch);
            self.fetch_tiles(coords);
        }
        if self.prefetch_timer.fire(now) {
            self.prefetch_tiles(host)?;
        }
        if self.prune_timer.fire(now) && self.options.retention == RetentionPolicy::MultiCriteria {
            self.source.prune();
            self.prune_timer.arm(now, self.options.prune_interval());
        }
        Ok(())
    }

    /// Fits `extent` to the frame at a level inside the zoom bounds.
    ///
    /// An extent coarser than `min_zoom` (or finer than `max_zoom`) is
    /// resized around its centre to exactly one frame at that bound.
    fn snap_extent(&self, extent: &Extent, frame: &Frame) -> (Extent, u8) {
        let codec = self.source.codec();
        let (min_zoom, max_zoom) = (codec.min_zoom(), codec.max_zoom());
        let ideal = codec.ideal_level_by_extent(extent, frame.height, frame.width);
        let bound = if ideal < min_zoom as i32 {
            min_zoom
        } else if ideal > max_zoom as i32 {
            max_zoom
        } else {
            let level = codec.get_level_by_extent(extent, frame.height, frame.width);
            return (codec.snap_to_zoom_level(extent, frame.height, frame.width, level), level);
        };
        let resolution = codec.resolution_at(bound);
        (extent.resized(resolution * frame.width, resolution * frame.height), bound)
    }

    /// Snaps the host's initial extent to whole tiles at the chosen level.
    fn map_data(&mut self, host: &mut dyn RenderHost) {
        let frame = host.frame();
        let (snapped, level) = self.snap_extent(&host.extent(), &frame);
        host.set_extent(snapped);
        self.extent = Some(snapped);
        self.last_frame = None;
        log::info!("tile renderer initialised at zoom {level}, extent {:?}", snapped.to_array());
    }

    /// Re-snaps the extent when the frame's pixel size changed.
    fn enforce_aspect_ratio(&mut self, host: &mut dyn RenderHost) {
        let frame = host.frame();
        if self.last_frame.map_or(false, |last| last.same_size(&frame)) {
            return;
        }
        let (snapped, level) = self.snap_extent(&host.extent(), &frame);
        host.set_extent(snapped);
        self.extent = Some(snapped);
        self.last_frame = Some(frame);
        log::debug!("frame resized to {}x{}, extent re-snapped at zoom {level}", frame.width, frame.height);
    }

    fn update(&mut self, host: &mut dyn RenderHost, now: Instant) -> Result<()> {
        let frame = host.frame();
        let mut extent = host.extent();
        let previous = self.extent.unwrap_or(extent);
        let zooming_out = previous.width() < extent.width();

        let codec = self.source.codec();
        let (min_zoom, max_zoom) = (codec.min_zoom(), codec.max_zoom());
        let ideal = codec.ideal_level_by_extent(&extent, frame.height, frame.width);
        let zoom_level = if ideal < min_zoom as i32 {
            Some(min_zoom)
        } else if ideal > max_zoom as i32 {
            Some(max_zoom)
        } else {
            None
        };
        let zoom_level = match zoom_level {
            Some(bound) => {
                log::debug!("zoom {ideal} outside {min_zoom}..={max_zoom}, snapping back");
                extent = previous;
                host.set_extent(previous);
                bound
            }
            None => ideal as u8,
        };
        self.extent = Some(extent);
        self.zoom_level = Some(zoom_level);

        let tiles = codec.get_tiles_by_extent(&extent, zoom_level, self.options.tile_border);
        let classified = self.classify(&tiles, zooming_out)?;
        log::trace!(
            "zoom {zoom_level}: {} needed, {} cached, {} parents, {} children, {} missing",
            tiles.len(),
            classified.cached.len(),
            classified.parents.len(),
            classified.children.len(),
            classified.need_load.len()
        );

        let cache = self.source.cache_mut();
        cache.reset_current();
        for key in &classified.present {
            cache.set_current(key);
        }

        self.render_tiles(host, &extent, &classified.parents);
        self.render_tiles(host, &extent, &classified.children);
        self.render_tiles(host, &extent, &classified.cached);

        self.pending_fetch = classified.need_load;
        self.fetch_timer.arm(now, self.options.fetch_debounce());
        Ok(())
    }

    fn classify(&self, tiles: &[TileBounds], zooming_out: bool) -> Result<Classified> {
        let cache = self.source.cache();
        let codec = self.source.codec();
        let mut classified = Classified::default();

        for tile in tiles {
            let TileCoord { x, y, z } = tile.coord;
            let key = tile.coord.cache_key();
            let cached = cache.get(&key);

            if cached.map_or(false, |t| t.loaded) {
                classified.cached.push(key.clone());
            } else if self.options.render_parents {
                let parent_key = self.source.get_closest_parent_by_tile_xyz(x, y, z)?.cache_key();
                let parent_loaded = cache.get(&parent_key).map_or(false, |t| t.loaded);
                if parent_loaded && !classified.parents.contains(&parent_key) {
                    classified.parents.push(parent_key);
                }
                if zooming_out {
                    for child in codec.children_by_tile_xyz(x, y, z)? {
                        let child_key = child.coord.cache_key();
                        if cache.contains(&child_key) {
                            classified.children.push(child_key);
                        }
                    }
                }
            }

            if cached.is_none() {
                classified.need_load.push(tile.coord);
            } else {
                classified.present.push(key);
            }
        }
        Ok(classified)
    }

    /// Draws loaded tiles in one clipped pass and marks them finished.
    fn render_tiles(&mut self, host: &mut dyn RenderHost, extent: &Extent, keys: &[String]) {
        if keys.is_empty() {
            return;
        }
        let frame = host.frame();
        let transform = ScreenTransform::new(*extent, frame);
        let mut drawn = Vec::with_capacity(keys.len());

        host.begin_pass(frame.inset_for_outline(self.options.outline_width), self.options.alpha);
        for key in keys {
            if let Some(tile) = self.source.cache().get(key).filter(|t| t.loaded) {
                let rect = transform.bounds_to_screen(&tile.bounds);
                host.draw_image(tile.image(), rect, self.options.smoothing);
                drawn.push(key);
            }
        }
        host.end_pass();

        let cache = self.source.cache_mut();
        for key in drawn {
            cache.mark_drawn(key);
        }
    }

    fn create_tile(&mut self, coord: TileCoord, cache_only: bool) -> Option<TileRequest> {
        let key = coord.cache_key();
        if self.source.cache().contains(&key) {
            return None;
        }
        let request = self.source.create_tile(coord, cache_only);
        if !cache_only {
            self.source.cache_mut().set_current(&key);
        }
        self.session.get_or_insert_with(HashSet::default).insert(key);
        Some(request)
    }

    fn fetch_tiles(&mut self, coords: Vec<TileCoord>) {
        let requests: Vec<TileRequest> = coords
            .into_iter()
            .filter_map(|coord| self.create_tile(coord, false))
            .collect();
        self.loader.queue_tiles_batch(requests);
    }

    /// Warms the cache with the children of the tiles nearest the center.
    fn prefetch_tiles(&mut self, host: &mut dyn RenderHost) -> Result<()> {
        let extent = host.extent();
        let frame = host.frame();
        let codec = self.source.codec();
        let zoom_level = codec.get_level_by_extent(&extent, frame.height, frame.width);
        if zoom_level >= codec.max_zoom() {
            return Ok(());
        }
        let tiles = codec.get_tiles_by_extent(&extent, zoom_level, self.options.tile_border);

        let mut children = Vec::new();
        for tile in tiles.iter().take(self.options.prefetch_tile_count) {
            let TileCoord { x, y, z } = tile.coord;
            children.extend(codec.children_by_tile_xyz(x, y, z)?);
        }
        let requests: Vec<TileRequest> = children
            .into_iter()
            .filter_map(|child| self.create_tile(child.coord, true))
            .collect();
        if !requests.is_empty() {
            log::debug!("prefetching {} child tiles", requests.len());
        }
        self.loader.queue_tiles_batch(requests);
        Ok(())
    }

    /// Applies every fetch result that has arrived.
    fn process_tile_results(&mut self, host: &mut dyn RenderHost) {
        let mut render = false;
        let mut settled = false;
        for result in self.loader.try_recv_results() {
            match self.source.apply_result(result) {
                Some(LoadOutcome::Loaded { cache_only: false }) => render = true,
                Some(LoadOutcome::Loaded { cache_only: true }) | Some(LoadOutcome::Failed) => settled = true,
                None => {}
            }
        }
        if render {
            host.request_render();
        }
        if settled && self.has_finished() {
            host.notify_finished();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::SchemeKind;
    use crate::core::viewport::ScreenRect;
    use crate::tiles::loader::TileFetcher;
    use crate::tiles::pool::ImageHandle;
    use crate::{Error, TileSourceOptions as Options};
    use async_trait::async_trait;
    use image::RgbaImage;
    use std::sync::Arc;
    use std::time::Duration;

    // just outside the projected world so the whole world fits zoom 1 at 512px
    const N: f64 = 20037508.35;

    struct OfflineFetcher;

    #[async_trait]
    impl TileFetcher for OfflineFetcher {
        async fn fetch(&self, url: &str) -> crate::Result<Vec<u8>> {
            Err(Error::Http {
                status: 503,
                url: url.to_string(),
            })
        }
    }

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Event {
        Begin,
        Draw(u64),
        End,
    }

    #[derive(Default)]
    struct Host {
        extent: Option<Extent>,
        frame: Option<Frame>,
        draws: Vec<(u64, ScreenRect)>,
        events: Vec<Event>,
        passes: usize,
        finished: usize,
    }

    impl Host {
        /// Image ids drawn in each begin/end pass, in order.
        fn passes_drawn(&self) -> Vec<Vec<u64>> {
            let mut passes = Vec::new();
            let mut current = Vec::new();
            for event in &self.events {
                match event {
                    Event::Begin => current.clear(),
                    Event::Draw(id) => current.push(*id),
                    Event::End => passes.push(std::mem::take(&mut current)),
                }
            }
            passes
        }
    }

    impl RenderHost for Host {
        fn extent(&self) -> Extent {
            self.extent.unwrap_or(Extent::new(-N, -N, N, N))
        }

        fn set_extent(&mut self, extent: Extent) {
            self.extent = Some(extent);
        }

        fn frame(&self) -> Frame {
            self.frame.unwrap_or(Frame::sized(512.0, 512.0))
        }

        fn begin_pass(&mut self, _clip: ScreenRect, _alpha: f32) {
            self.passes += 1;
            self.events.push(Event::Begin);
        }

        fn draw_image(&mut self, image: &ImageHandle, rect: ScreenRect, _smoothing: bool) {
            self.draws.push((image.id(), rect));
            self.events.push(Event::Draw(image.id()));
        }

        fn end_pass(&mut self) {
            self.events.push(Event::End);
        }

        fn request_render(&mut self) {}

        fn notify_finished(&mut self) {
            self.finished += 1;
        }
    }

    fn renderer(options: Options) -> TileRenderer {
        let source = TileSource::new(options).unwrap();
        TileRenderer::new(source, TileLoader::new(Arc::new(OfflineFetcher)), TileRendererOptions::default())
    }

    fn world_renderer() -> TileRenderer {
        renderer(Options::new("https://t.example.com/{z}/{x}/{y}.png", SchemeKind::Wmts))
    }

    fn load(renderer: &mut TileRenderer, coord: TileCoord) {
        let source = renderer.source_mut();
        source.create_tile(coord, false);
        source.cache_mut().mark_loaded(&coord.cache_key(), RgbaImage::new(1, 1));
    }

    #[test]
    fn test_first_paint_snaps_and_queues() {
        let mut renderer = world_renderer();
        let mut host = Host::default();
        let now = Instant::now();

        assert_eq!(renderer.state(), RenderState::Uninitialized);
        renderer.paint_at(&mut host, now).unwrap();
        assert_eq!(renderer.state(), RenderState::Steady);
        assert_eq!(renderer.zoom_level(), Some(1));
        // whole world at zoom 1 plus border: 2x2 valid tiles with wraparound copies
        assert!(renderer.pending_fetch().len() >= 4);
        assert!(!renderer.has_finished());
        assert_eq!(host.finished, 0);
        assert_eq!(renderer.next_deadline(), Some(now + Duration::from_millis(65)));
    }

    #[test]
    fn test_debounce_coalesces_updates() {
        let mut renderer = world_renderer();
        let mut host = Host::default();
        let start = Instant::now();

        renderer.paint_at(&mut host, start).unwrap();
        renderer.paint_at(&mut host, start + Duration::from_millis(40)).unwrap();
        renderer.poll_at(&mut host, start + Duration::from_millis(70)).unwrap();
        assert!(renderer.source().cache().is_empty());

        renderer.poll_at(&mut host, start + Duration::from_millis(105)).unwrap();
        assert!(!renderer.source().cache().is_empty());
        assert!(renderer.pending_fetch().is_empty());
    }

    #[test]
    fn test_cached_tiles_drawn_and_finished() {
        let mut renderer = world_renderer();
        let mut host = Host::default();
        for x in 0..2 {
            for y in 0..2 {
                load(&mut renderer, TileCoord::new(x, y, 1));
            }
        }
        renderer.paint_at(&mut host, Instant::now()).unwrap();

        assert_eq!(host.draws.len(), 4);
        assert_eq!(host.passes, 1);
        for (_, rect) in &host.draws {
            assert!((rect.width - 256.0).abs() < 1e-6);
            assert!((rect.height - 256.0).abs() < 1e-6);
        }
        let cache = renderer.source().cache();
        assert!(cache.get("0:0:1").unwrap().finished);
        assert!(cache.get("0:0:1").unwrap().current);
    }

    #[test]
    fn test_parent_placeholder_drawn_once() {
        let mut renderer = world_renderer();
        let mut host = Host {
            extent: Some(Extent::new(-N, -N, 0.0, 0.0)),
            ..Default::default()
        };
        load(&mut renderer, TileCoord::new(0, 0, 1));
        renderer.paint_at(&mut host, Instant::now()).unwrap();

        assert_eq!(renderer.zoom_level(), Some(2));
        let parent_id = renderer.source().cache().get("0:0:1").unwrap().image().id();
        let parent_draws = host.draws.iter().filter(|(id, _)| *id == parent_id).count();
        assert_eq!(parent_draws, 1);
    }

    fn image_id(renderer: &TileRenderer, key: &str) -> u64 {
        renderer.source().cache().get(key).unwrap().image().id()
    }

    #[test]
    fn test_zoom_out_draws_parents_then_children_then_cached() {
        let mut renderer = world_renderer();
        let mut host = Host {
            extent: Some(Extent::new(-N, -N, 0.0, 0.0)),
            ..Default::default()
        };
        for x in 0..2 {
            for y in 0..2 {
                load(&mut renderer, TileCoord::new(x, y, 2));
            }
        }
        load(&mut renderer, TileCoord::new(0, 0, 0));
        load(&mut renderer, TileCoord::new(1, 1, 1));

        let start = Instant::now();
        renderer.paint_at(&mut host, start).unwrap();
        assert_eq!(renderer.zoom_level(), Some(2));

        host.events.clear();
        host.extent = Some(Extent::new(-N, -N, N, N));
        renderer.paint_at(&mut host, start + Duration::from_millis(10)).unwrap();
        assert_eq!(renderer.zoom_level(), Some(1));

        let passes = host.passes_drawn();
        assert_eq!(passes.len(), 3);
        assert_eq!(passes[0], vec![image_id(&renderer, "0:0:0")]);

        let mut children = passes[1].clone();
        children.sort_unstable();
        let mut expected: Vec<u64> = ["0:0:2", "1:0:2", "0:1:2", "1:1:2"]
            .iter()
            .map(|key| image_id(&renderer, key))
            .collect();
        expected.sort_unstable();
        assert_eq!(children, expected);

        assert_eq!(passes[2], vec![image_id(&renderer, "1:1:1")]);
    }

    #[test]
    fn test_first_extent_coarser_than_min_zoom_is_resized() {
        let mut options = Options::new("https://t.example.com/{z}/{x}/{y}.png", SchemeKind::Wmts);
        options.min_zoom = 10;
        let mut renderer = renderer(options);
        let mut host = Host::default();
        renderer.paint_at(&mut host, Instant::now()).unwrap();

        assert_eq!(renderer.zoom_level(), Some(10));
        // a frame's worth of zoom 10 tiles plus the border, not the whole world
        assert!(renderer.pending_fetch().len() <= 36, "{} tiles queued", renderer.pending_fetch().len());

        let expected = renderer.source().codec().resolution_at(10) * 512.0;
        let extent = host.extent();
        assert!((extent.width() - expected).abs() < 1e-3);
        assert!((extent.height() - expected).abs() < 1e-3);
        assert!(extent.center().0.abs() < 1e-3 && extent.center().1.abs() < 1e-3);
        assert_eq!(renderer.extent(), Some(extent));
    }

    #[test]
    fn test_render_parents_disabled() {
        let mut renderer = world_renderer();
        renderer.set_options(TileRendererOptions::low_bandwidth());
        let mut host = Host {
            extent: Some(Extent::new(-N, -N, 0.0, 0.0)),
            ..Default::default()
        };
        load(&mut renderer, TileCoord::new(0, 0, 1));
        renderer.paint_at(&mut host, Instant::now()).unwrap();
        assert!(host.draws.is_empty());
    }

    #[test]
    fn test_snap_back_beyond_max_zoom() {
        let mut options = Options::new("https://t.example.com/{z}/{x}/{y}.png", SchemeKind::Wmts);
        options.max_zoom = 3;
        let mut renderer = renderer(options);
        let mut host = Host::default();
        renderer.paint_at(&mut host, Instant::now()).unwrap();
        let accepted = host.extent();

        host.extent = Some(Extent::new(0.0, 0.0, 10.0, 10.0));
        renderer.paint_at(&mut host, Instant::now()).unwrap();
        assert_eq!(host.extent(), accepted);
        assert_eq!(renderer.extent(), Some(accepted));
        assert_eq!(renderer.zoom_level(), Some(3));
    }

    #[test]
    fn test_force_finished() {
        let mut renderer = world_renderer();
        assert!(!renderer.has_finished());
        renderer.force_finished();
        assert!(renderer.has_finished());
    }

    #[test]
    fn test_degenerate_frame_skipped() {
        let mut renderer = world_renderer();
        let mut host = Host {
            frame: Some(Frame::sized(0.0, 0.0)),
            ..Default::default()
        };
        renderer.paint_at(&mut host, Instant::now()).unwrap();
        assert_eq!(renderer.state(), RenderState::Uninitialized);
    }

    #[test]
    fn test_zero_area_extent_skipped() {
        let mut renderer = world_renderer();
        let mut host = Host {
            extent: Some(Extent::new(0.0, -N, 0.0, N)),
            ..Default::default()
        };
        renderer.paint_at(&mut host, Instant::now()).unwrap();
        assert_eq!(renderer.state(), RenderState::Uninitialized);
        assert!(renderer.pending_fetch().is_empty());
        assert!(host.events.is_empty());
    }

    #[test]
    fn test_source_reconfiguration_restarts_session() {
        let mut renderer = world_renderer();
        load(&mut renderer, TileCoord::new(0, 0, 1));
        renderer.force_finished();

        let mut options = renderer.source().options().clone();
        options.url = "https://other.example.com/{z}/{x}/{y}.png".into();
        assert!(renderer.set_source_options(options).unwrap());
        assert!(renderer.source().cache().is_empty());
        assert!(!renderer.has_finished());
    }
}
