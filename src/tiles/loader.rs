//! Asynchronous tile fetching
//!
//! Requests are spawned on the configured runtime; each task downloads and
//! decodes one tile and reports back over a channel. The scheduler drains the
//! channel on its own thread, so the cache is never touched from a task.

use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use crossbeam_channel::{unbounded, Receiver, Sender};
use futures::FutureExt;
use image::RgbaImage;
use once_cell::sync::Lazy;

use crate::core::geo::TileCoord;
use crate::prelude::Arc;
use crate::{Error, Result};

const DEFAULT_USER_AGENT: &str = concat!("tilecast/", env!("CARGO_PKG_VERSION"));

/// Shared async HTTP client used by [`HttpFetcher::new`]
static HTTP_CLIENT: Lazy<reqwest::Client> = Lazy::new(|| {
    build_client(&TileLoaderConfig::default()).unwrap_or_else(|e| {
        log::warn!("falling back to a default http client: {e}");
        reqwest::Client::new()
    })
});

fn build_client(config: &TileLoaderConfig) -> Result<reqwest::Client> {
    Ok(reqwest::Client::builder()
        .user_agent(config.user_agent.clone())
        .timeout(config.request_timeout)
        .pool_max_idle_per_host(config.max_idle_per_host)
        .build()?)
}

#[derive(Debug, Clone)]
pub struct TileLoaderConfig {
    pub request_timeout: Duration,
    pub user_agent: String,
    pub max_idle_per_host: usize,
}

impl Default for TileLoaderConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(10),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            max_idle_per_host: 16,
        }
    }
}

impl TileLoaderConfig {
    pub fn for_testing() -> Self {
        Self {
            request_timeout: Duration::from_secs(1),
            max_idle_per_host: 0,
            ..Default::default()
        }
    }
}

/// One tile fetch, tagged with the cache generation it was issued under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TileRequest {
    pub cache_key: String,
    pub coord: TileCoord,
    pub url: String,
    pub generation: u64,
    /// Prefetch: warm the cache without drawing
    pub cache_only: bool,
}

/// Outcome of a fetch, decoded to RGBA on success.
#[derive(Debug)]
pub struct TileResult {
    pub request: TileRequest,
    pub image: Result<RgbaImage>,
}

/// Transport for tile bytes.
#[async_trait]
pub trait TileFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>>;
}

/// Fetches tiles over HTTP(S).
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new() -> Self {
        Self {
            client: HTTP_CLIENT.clone(),
        }
    }

    pub fn with_config(config: &TileLoaderConfig) -> Result<Self> {
        Ok(Self {
            client: build_client(config)?,
        })
    }
}

impl Default for HttpFetcher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TileFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(Error::Http {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }
        Ok(response.bytes().await?.to_vec())
    }
}

/// Decodes PNG/JPEG/... bytes into an RGBA image.
pub fn decode_tile(bytes: &[u8]) -> Result<RgbaImage> {
    Ok(image::load_from_memory(bytes)?.to_rgba8())
}

/// Spawns fetches and collects their results.
pub struct TileLoader {
    fetcher: Arc<dyn TileFetcher>,
    result_tx: Sender<TileResult>,
    result_rx: Receiver<TileResult>,
    pending: Arc<AtomicUsize>,
}

impl TileLoader {
    pub fn new(fetcher: Arc<dyn TileFetcher>) -> Self {
        let (result_tx, result_rx) = unbounded();
        Self {
            fetcher,
            result_tx,
            result_rx,
            pending: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Loader over the shared HTTP client
    pub fn http() -> Self {
        Self::new(Arc::new(HttpFetcher::new()))
    }

    /// Starts every request in order. Completion order is up to the network.
    pub fn queue_tiles_batch(&self, requests: Vec<TileRequest>) {
        if requests.is_empty() {
            return;
        }
        log::debug!("queueing {} tile requests", requests.len());
        for request in requests {
            self.queue_tile(request);
        }
    }

    pub fn queue_tile(&self, request: TileRequest) {
        let fetcher = Arc::clone(&self.fetcher);
        let result_tx = self.result_tx.clone();
        let pending = Arc::clone(&self.pending);
        pending.fetch_add(1, Ordering::AcqRel);

        crate::runtime::spawn(async move {
            log::trace!("fetching {} from {}", request.cache_key, request.url);
            let fetch = async {
                match fetcher.fetch(&request.url).await {
                    Ok(bytes) => decode_tile(&bytes),
                    Err(e) => Err(e),
                }
            };
            // a panicking fetch must still settle its tile
            let image = AssertUnwindSafe(fetch).catch_unwind().await.unwrap_or_else(|_| {
                log::warn!("fetch of {} panicked", request.cache_key);
                Err(Error::Runtime(format!("fetch of {} panicked", request.url)))
            });
            pending.fetch_sub(1, Ordering::AcqRel);
            // the receiver lives as long as the loader
            let _ = result_tx.send(TileResult { request, image });
        });
    }

    /// Try to receive completed tile results (non-blocking)
    pub fn try_recv_results(&self) -> Vec<TileResult> {
        self.result_rx.try_iter().collect()
    }

    /// Blocks up to `timeout` for the next result.
    pub fn recv_timeout(&self, timeout: Duration) -> Option<TileResult> {
        self.result_rx.recv_timeout(timeout).ok()
    }

    /// Fetches started but not yet reported
    pub fn pending_count(&self) -> usize {
        self.pending.load(Ordering::Acquire)
    }
}
