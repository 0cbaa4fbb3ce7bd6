use std::time::{Duration, Instant};

use anyhow::Context;
use tilecast::core::geo::geographic_extent_to_meters;
use tilecast::prelude::*;

const OSM_URL: &str = "https://tile.openstreetmap.org/{Z}/{X}/{Y}.png";

/// Headless tile viewer
///
/// Usage: `tilecast-app [source.json]`. Without a config file the OpenStreetMap
/// tile server is used. The viewer zooms into San Francisco, pans east and
/// zooms back out, printing each frame's draws once its tiles have settled.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tilecast::init_logging();

    let source_options = match std::env::args().nth(1) {
        Some(path) => {
            let json = std::fs::read_to_string(&path).with_context(|| format!("reading {path}"))?;
            TileSourceOptions::from_json(&json).with_context(|| format!("parsing {path}"))?
        }
        None => TileSourceOptions {
            attribution: "© OpenStreetMap contributors".into(),
            ..TileSourceOptions::new(OSM_URL, SchemeKind::Wmts)
        },
    };
    log::debug!("source options: {}", serde_json::to_string(&source_options)?);

    let source = TileSource::new(source_options).context("building tile source")?;
    let mut renderer = TileRenderer::with_http(source, TileRendererOptions::default());
    let mut host = ConsoleHost::new(Frame::sized(1024.0, 768.0));

    for (name, extent) in tour() {
        log::info!("view: {name}");
        host.extent = extent;
        host.draws = 0;
        renderer.paint(&mut host)?;
        settle(&mut renderer, &mut host).await?;
        println!(
            "{name}: zoom {:?}, {} draws, cache {}",
            renderer.zoom_level(),
            host.draws,
            serde_json::to_string(&renderer.stats())?
        );
    }

    if !renderer.attribution().is_empty() {
        println!("{}", renderer.attribution());
    }
    Ok(())
}

/// Viewports as lon/lat boxes
fn tour() -> Vec<(&'static str, Extent)> {
    let views = [
        ("world", Extent::new(-180.0, -80.0, 180.0, 80.0)),
        ("bay area", Extent::new(-123.0, 37.2, -121.6, 38.2)),
        ("san francisco", Extent::new(-122.52, 37.70, -122.35, 37.82)),
        ("oakland", Extent::new(-122.33, 37.74, -122.16, 37.86)),
        ("california", Extent::new(-125.0, 32.0, -114.0, 42.0)),
    ];
    views
        .into_iter()
        .map(|(name, lonlat)| (name, geographic_extent_to_meters(&lonlat)))
        .collect()
}

/// Runs the scheduler until the view has finished or a time limit is reached.
async fn settle(renderer: &mut TileRenderer, host: &mut ConsoleHost) -> anyhow::Result<()> {
    let give_up = Instant::now() + Duration::from_secs(15);
    host.finished = false;
    loop {
        renderer.poll(host)?;
        if host.needs_render {
            host.needs_render = false;
            host.draws = 0;
            renderer.paint(host)?;
        }
        let settled = renderer.pending_fetch().is_empty() && renderer.has_finished();
        if host.finished || settled || Instant::now() >= give_up {
            break;
        }
        let wake = renderer
            .next_deadline()
            .map_or(Duration::from_millis(50), |at| at.saturating_duration_since(Instant::now()))
            .clamp(Duration::from_millis(5), Duration::from_millis(50));
        tokio::select! {
            _ = tokio::time::sleep(wake) => {}
            _ = tokio::signal::ctrl_c() => anyhow::bail!("interrupted"),
        }
    }
    if !renderer.has_finished() {
        log::warn!("view did not settle, {} fetches still pending", renderer.loader().pending_count());
    }
    Ok(())
}

/// Logs draw calls instead of rasterising them.
struct ConsoleHost {
    extent: Extent,
    frame: Frame,
    draws: usize,
    needs_render: bool,
    finished: bool,
}

impl ConsoleHost {
    fn new(frame: Frame) -> Self {
        Self {
            extent: Extent::new(0.0, 0.0, 0.0, 0.0),
            frame,
            draws: 0,
            needs_render: false,
            finished: false,
        }
    }
}

impl RenderHost for ConsoleHost {
    fn extent(&self) -> Extent {
        self.extent
    }

    fn set_extent(&mut self, extent: Extent) {
        self.extent = extent;
    }

    fn frame(&self) -> Frame {
        self.frame
    }

    fn begin_pass(&mut self, clip: ScreenRect, alpha: f32) {
        log::trace!("pass clip {clip:?} alpha {alpha}");
    }

    fn draw_image(&mut self, image: &ImageHandle, rect: ScreenRect, _smoothing: bool) {
        self.draws += 1;
        log::debug!(
            "draw {} ({:?}) at {:.0},{:.0} {:.0}x{:.0}",
            image.src().unwrap_or("?"),
            image.dimensions(),
            rect.x,
            rect.y,
            rect.width,
            rect.height
        );
    }

    fn request_render(&mut self) {
        self.needs_render = true;
    }

    fn notify_finished(&mut self) {
        self.finished = true;
    }
}
