//! Tile URL resolution backed by a memory and disk cache.

use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::ops::RangeInclusive;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use base64::Engine as _;
use futures::StreamExt as _;
use peak_motion_geo::{MAX_COVERING_RADIUS_METERS, MAX_ZOOM, TileCoord, tiles_covering};
use peak_motion_map::TileLayer;
use peak_motion_poi_models::Coordinate;
use peak_motion_storage::{Directory, FileStore, StorageError};
use tokio::task::JoinHandle;

use crate::progress::ProgressCallback;
use crate::{TileError, TileFetcher};

/// Prefix of the cached tile representation.
pub const DATA_URL_PREFIX: &str = "data:image/png;base64,";

/// Folder (inside [`Directory::Data`]) holding persisted tiles.
const TILE_DIR: &str = "tiles";

/// Concurrent downloads during [`TileCache::prefetch`].
const PREFETCH_CONCURRENCY: usize = 4;

/// What the map should load for a tile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TileSource {
    /// A `data:` URL from the cache.
    Cached(String),
    /// The remote tile URL.
    Remote(String),
}

impl TileSource {
    /// The URL to hand to the map, whichever variant this is.
    #[must_use]
    pub fn url(&self) -> &str {
        match self {
            Self::Cached(url) | Self::Remote(url) => url,
        }
    }

    /// Whether this is a cache hit.
    #[must_use]
    pub const fn is_cached(&self) -> bool {
        matches!(self, Self::Cached(_))
    }
}

/// Result of a [`TileCache::prefetch`] run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PrefetchSummary {
    /// Tiles covering the requested area.
    pub total: usize,
    /// Tiles that were already cached.
    pub already_cached: usize,
    /// Tiles downloaded and persisted by this run.
    pub fetched: usize,
    /// Tiles that could not be downloaded or persisted.
    pub failed: usize,
}

enum PrefetchOutcome {
    Cached,
    Fetched,
    Failed,
}

/// Builds the canonical remote URL of `coord` from the layer template.
///
/// The `{s}` subdomain is `subdomains[(x + y) % subdomains.len()]`, so a
/// tile always maps to the same server.
#[must_use]
pub fn tile_url(layer: &TileLayer, coord: TileCoord) -> String {
    let sum = u64::from(coord.x) + u64::from(coord.y);
    let subdomain = u64::try_from(layer.subdomains.len())
        .ok()
        .filter(|count| *count > 0)
        .and_then(|count| usize::try_from(sum % count).ok())
        .and_then(|index| layer.subdomains.get(index))
        .map_or("", String::as_str);

    layer
        .url_template
        .replace("{s}", subdomain)
        .replace("{z}", &coord.z.to_string())
        .replace("{x}", &coord.x.to_string())
        .replace("{y}", &coord.y.to_string())
}

/// Storage path of the tile downloaded from `url`: every character that
/// is not an ASCII letter or digit becomes `_`.
#[must_use]
pub fn tile_path(url: &str) -> String {
    let name: String = url
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();
    format!("{TILE_DIR}/{name}")
}

fn encode_data_url(bytes: &[u8]) -> String {
    format!(
        "{DATA_URL_PREFIX}{}",
        base64::engine::general_purpose::STANDARD.encode(bytes)
    )
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Debug, Default)]
struct MemoryTiles {
    entries: BTreeMap<String, String>,
    order: VecDeque<String>,
}

impl MemoryTiles {
    fn insert(&mut self, url: String, data: String, limit: Option<usize>) {
        if self.entries.insert(url.clone(), data).is_none() {
            self.order.push_back(url);
        }
        let Some(limit) = limit else {
            return;
        };
        while self.entries.len() > limit {
            let Some(oldest) = self.order.pop_front() else {
                break;
            };
            self.entries.remove(&oldest);
        }
    }
}

struct Shared {
    layer: TileLayer,
    fetcher: Arc<dyn TileFetcher>,
    files: Arc<dyn FileStore>,
    max_memory_entries: Option<usize>,
    memory: Mutex<MemoryTiles>,
    in_flight: Mutex<BTreeSet<String>>,
}

/// Releases a URL's in-flight slot when its background task ends,
/// including by panic.
struct InFlight {
    shared: Arc<Shared>,
    url: String,
}

impl Drop for InFlight {
    fn drop(&mut self) {
        lock(&self.shared.in_flight).remove(&self.url);
    }
}

impl Shared {
    fn remember(&self, url: String, data: String) {
        lock(&self.memory).insert(url, data, self.max_memory_entries);
    }

    fn cached(&self, url: &str) -> Option<String> {
        lock(&self.memory).entries.get(url).cloned()
    }

    async fn load_cached(&self, url: &str) -> Option<String> {
        match self.files.read_file(&tile_path(url), Directory::Data).await {
            Ok(data) => Some(data),
            Err(StorageError::NotFound { .. }) => None,
            Err(e) => {
                log::warn!("Failed to read cached tile {url}: {e}");
                None
            }
        }
    }

    async fn try_cache(&self, url: &str) -> Result<(), TileError> {
        let bytes = self.fetcher.fetch(url).await?;
        let data = encode_data_url(&bytes);
        let persisted = self
            .files
            .write_file(&tile_path(url), &data, Directory::Data)
            .await;
        self.remember(url.to_string(), data);
        persisted?;
        log::trace!("Cached tile {url} ({} bytes)", bytes.len());
        Ok(())
    }

    async fn cache(&self, url: &str) {
        if let Err(e) = self.try_cache(url).await {
            log::warn!("Failed to cache tile {url}: {e}");
        }
    }

    async fn load_or_cache(&self, url: &str) {
        if let Some(data) = self.load_cached(url).await {
            self.remember(url.to_string(), data);
            return;
        }
        self.cache(url).await;
    }
}

/// Read-through cache between the map and the tile server.
///
/// The in-memory layer answers [`Self::resolve_tile_url`] synchronously.
/// Persisted tiles live in the [`FileStore`] under [`Directory::Data`] and
/// are never evicted; the memory layer is bounded only when
/// `max_memory_entries` is set, in which case the oldest entries go first.
pub struct TileCache {
    shared: Arc<Shared>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl TileCache {
    /// Creates a cache for `layer`.
    #[must_use]
    pub fn new(
        layer: TileLayer,
        fetcher: Arc<dyn TileFetcher>,
        files: Arc<dyn FileStore>,
        max_memory_entries: Option<usize>,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                layer,
                fetcher,
                files,
                max_memory_entries,
                memory: Mutex::new(MemoryTiles::default()),
                in_flight: Mutex::new(BTreeSet::new()),
            }),
            tasks: Mutex::new(Vec::new()),
        }
    }

    /// The tile layer to register on the map surface.
    #[must_use]
    pub fn layer(&self) -> TileLayer {
        self.shared.layer.clone()
    }

    /// Canonical remote URL of `coord`.
    #[must_use]
    pub fn tile_url(&self, coord: TileCoord) -> String {
        tile_url(&self.shared.layer, coord)
    }

    /// Number of tiles held in memory.
    #[must_use]
    pub fn memory_len(&self) -> usize {
        lock(&self.shared.memory).entries.len()
    }

    /// Resolves the URL the map should load for `coord`.
    ///
    /// Returns the cached `data:` URL when the tile is in memory. Otherwise
    /// returns the remote URL and, when called inside a tokio runtime,
    /// schedules a background task that loads the tile from disk or
    /// downloads and persists it. A tile is scheduled at most once while
    /// its task is running.
    pub fn resolve_tile_url(&self, coord: TileCoord) -> TileSource {
        let url = self.tile_url(coord);
        if let Some(data) = self.shared.cached(&url) {
            return TileSource::Cached(data);
        }
        self.schedule(url.clone());
        TileSource::Remote(url)
    }

    fn schedule(&self, url: String) {
        if !lock(&self.shared.in_flight).insert(url.clone()) {
            return;
        }

        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            log::debug!("No runtime available, not caching tile {url}");
            lock(&self.shared.in_flight).remove(&url);
            return;
        };

        let slot = InFlight {
            shared: Arc::clone(&self.shared),
            url,
        };
        let task = runtime.spawn(async move {
            slot.shared.load_or_cache(&slot.url).await;
        });

        let mut tasks = lock(&self.tasks);
        tasks.retain(|task| !task.is_finished());
        tasks.push(task);
    }

    /// Downloads the tile at `url` and persists it.
    ///
    /// Failures are logged and swallowed.
    pub async fn cache_tile(&self, url: &str) {
        self.shared.cache(url).await;
    }

    /// Reads the persisted tile for `url`. Returns `None` when the tile
    /// was never cached or cannot be read.
    pub async fn load_cached_tile(&self, url: &str) -> Option<String> {
        self.shared.load_cached(url).await
    }

    /// Waits for every background cache task scheduled so far.
    pub async fn flush(&self) {
        let tasks = std::mem::take(&mut *lock(&self.tasks));
        for task in tasks {
            if let Err(e) = task.await {
                log::warn!("Tile cache task failed: {e}");
            }
        }
    }

    /// Caches every tile within `radius_meters` of `center` for each zoom
    /// level in `zooms`, skipping tiles that are already cached.
    pub async fn prefetch(
        &self,
        center: &Coordinate,
        radius_meters: f64,
        zooms: RangeInclusive<u8>,
        progress: &Arc<dyn ProgressCallback>,
    ) -> PrefetchSummary {
        let tiles = || {
            zooms
                .clone()
                .flat_map(move |zoom| tiles_covering(center, radius_meters, zoom))
        };
        if radius_meters > MAX_COVERING_RADIUS_METERS || *zooms.end() > MAX_ZOOM {
            log::warn!(
                "Prefetch limited to {MAX_COVERING_RADIUS_METERS} m and zoom {MAX_ZOOM}"
            );
        }

        let mut summary = PrefetchSummary {
            total: tiles().count(),
            ..PrefetchSummary::default()
        };
        log::info!(
            "Prefetching {} tile(s) within {radius_meters} m of {center}",
            summary.total
        );
        progress.set_total(u64::try_from(summary.total).unwrap_or(u64::MAX));
        progress.set_message("Prefetching tiles".to_string());

        let mut outcomes = futures::stream::iter(tiles())
            .map(|coord| async move {
                let outcome = self.prefetch_one(self.tile_url(coord)).await;
                progress.inc(1);
                outcome
            })
            .buffer_unordered(PREFETCH_CONCURRENCY);

        while let Some(outcome) = outcomes.next().await {
            match outcome {
                PrefetchOutcome::Cached => summary.already_cached += 1,
                PrefetchOutcome::Fetched => summary.fetched += 1,
                PrefetchOutcome::Failed => summary.failed += 1,
            }
        }

        progress.finish(format!(
            "{} fetched, {} already cached, {} failed",
            summary.fetched, summary.already_cached, summary.failed
        ));
        summary
    }

    async fn prefetch_one(&self, url: String) -> PrefetchOutcome {
        if self.shared.cached(&url).is_some() {
            return PrefetchOutcome::Cached;
        }
        if let Some(data) = self.shared.load_cached(&url).await {
            self.shared.remember(url, data);
            return PrefetchOutcome::Cached;
        }
        match self.shared.try_cache(&url).await {
            Ok(()) => PrefetchOutcome::Fetched,
            Err(e) => {
                log::warn!("Failed to prefetch tile {url}: {e}");
                PrefetchOutcome::Failed
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use peak_motion_storage::MemoryFileStore;

    use super::*;
    use crate::progress::null_progress;

    struct FakeFetcher {
        calls: AtomicUsize,
        fail: bool,
    }

    impl FakeFetcher {
        fn new(fail: bool) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                fail,
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl TileFetcher for FakeFetcher {
        async fn fetch(&self, url: &str) -> Result<Vec<u8>, TileError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(TileError::Empty {
                    url: url.to_string(),
                });
            }
            Ok(b"png".to_vec())
        }
    }

    struct PanickingFetcher {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl TileFetcher for PanickingFetcher {
        async fn fetch(&self, _url: &str) -> Result<Vec<u8>, TileError> {
            if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
                panic!("tile decoder crashed");
            }
            Ok(b"png".to_vec())
        }
    }

    fn layer() -> TileLayer {
        TileLayer {
            url_template: "https://{s}.tile.example/{z}/{x}/{y}.png".to_string(),
            subdomains: vec!["a".to_string(), "b".to_string(), "c".to_string()],
            attribution: String::new(),
        }
    }

    fn cache(
        fetcher: &Arc<FakeFetcher>,
        files: &Arc<MemoryFileStore>,
        max_memory_entries: Option<usize>,
    ) -> TileCache {
        TileCache::new(
            layer(),
            Arc::clone(fetcher) as Arc<dyn TileFetcher>,
            Arc::clone(files) as Arc<dyn FileStore>,
            max_memory_entries,
        )
    }

    #[test]
    fn subdomain_follows_x_plus_y() {
        let layer = layer();
        assert_eq!(
            tile_url(&layer, TileCoord::new(15, 1, 1)),
            "https://c.tile.example/15/1/1.png"
        );
        assert_eq!(
            tile_url(&layer, TileCoord::new(15, 1, 2)),
            "https://a.tile.example/15/1/2.png"
        );
    }

    #[test]
    fn template_without_subdomains() {
        let layer = TileLayer {
            url_template: "https://tiles.example/{z}/{x}/{y}.png".to_string(),
            subdomains: Vec::new(),
            attribution: String::new(),
        };
        assert_eq!(
            tile_url(&layer, TileCoord::new(3, 4, 5)),
            "https://tiles.example/3/4/5.png"
        );
    }

    #[test]
    fn path_is_filesystem_safe() {
        assert_eq!(
            tile_path("https://a.tile.example/1/2/3.png"),
            "tiles/https___a_tile_example_1_2_3_png"
        );
    }

    #[test]
    fn resolve_outside_runtime_returns_remote() {
        let fetcher = FakeFetcher::new(false);
        let cache = cache(&fetcher, &Arc::new(MemoryFileStore::new()), None);
        let source = cache.resolve_tile_url(TileCoord::new(1, 0, 0));
        assert_eq!(source, TileSource::Remote("https://a.tile.example/1/0/0.png".to_string()));
        assert_eq!(fetcher.calls(), 0);
    }

    #[tokio::test]
    async fn second_resolve_hits_after_background_write() {
        let fetcher = FakeFetcher::new(false);
        let files = Arc::new(MemoryFileStore::new());
        let cache = cache(&fetcher, &files, None);
        let coord = TileCoord::new(2, 1, 1);

        let first = cache.resolve_tile_url(coord);
        assert!(!first.is_cached());

        cache.flush().await;

        let second = cache.resolve_tile_url(coord);
        assert_eq!(second, TileSource::Cached("data:image/png;base64,cG5n".to_string()));
        assert_eq!(fetcher.calls(), 1);
        assert_eq!(files.len().await, 1);
        assert_eq!(
            cache.load_cached_tile(first.url()).await.as_deref(),
            Some("data:image/png;base64,cG5n")
        );
    }

    #[tokio::test]
    async fn repeated_resolve_schedules_once() {
        let fetcher = FakeFetcher::new(false);
        let cache = cache(&fetcher, &Arc::new(MemoryFileStore::new()), None);
        let coord = TileCoord::new(2, 0, 1);

        cache.resolve_tile_url(coord);
        cache.resolve_tile_url(coord);
        cache.flush().await;

        assert_eq!(fetcher.calls(), 1);
    }

    #[tokio::test]
    async fn failed_fetch_leaves_no_entry() {
        let fetcher = FakeFetcher::new(true);
        let files = Arc::new(MemoryFileStore::new());
        let cache = cache(&fetcher, &files, None);
        let coord = TileCoord::new(2, 3, 3);

        let url = cache.resolve_tile_url(coord).url().to_string();
        cache.flush().await;

        assert!(!cache.resolve_tile_url(coord).is_cached());
        assert_eq!(cache.load_cached_tile(&url).await, None);
        assert!(files.is_empty().await);
    }

    #[tokio::test]
    async fn persisted_tile_is_loaded_without_download() {
        let fetcher = FakeFetcher::new(false);
        let files = Arc::new(MemoryFileStore::new());
        let cache = cache(&fetcher, &files, None);
        let coord = TileCoord::new(4, 2, 2);
        let url = cache.tile_url(coord);

        files
            .write_file(&tile_path(&url), "data:image/png;base64,AAAA", Directory::Data)
            .await
            .unwrap();

        cache.resolve_tile_url(coord);
        cache.flush().await;

        assert_eq!(
            cache.resolve_tile_url(coord),
            TileSource::Cached("data:image/png;base64,AAAA".to_string())
        );
        assert_eq!(fetcher.calls(), 0);
    }

    #[tokio::test]
    async fn memory_bound_evicts_oldest_but_keeps_disk() {
        let fetcher = FakeFetcher::new(false);
        let files = Arc::new(MemoryFileStore::new());
        let cache = cache(&fetcher, &files, Some(1));
        let first = cache.tile_url(TileCoord::new(3, 0, 0));
        let second = cache.tile_url(TileCoord::new(3, 1, 0));

        cache.cache_tile(&first).await;
        cache.cache_tile(&second).await;

        assert_eq!(cache.memory_len(), 1);
        assert!(!cache.resolve_tile_url(TileCoord::new(3, 0, 0)).is_cached());
        assert!(cache.resolve_tile_url(TileCoord::new(3, 1, 0)).is_cached());
        assert!(cache.load_cached_tile(&first).await.is_some());
        cache.flush().await;
    }

    #[tokio::test]
    async fn prefetch_skips_cached_tiles() {
        let fetcher = FakeFetcher::new(false);
        let cache = cache(&fetcher, &Arc::new(MemoryFileStore::new()), None);
        let center = Coordinate::new(33.64, -84.43);
        let progress = null_progress();

        let first = cache.prefetch(&center, 100.0, 15..=15, &progress).await;
        assert!(first.total > 0);
        assert_eq!(first.fetched, first.total);
        assert_eq!(first.failed, 0);

        let second = cache.prefetch(&center, 100.0, 15..=15, &progress).await;
        assert_eq!(second.already_cached, second.total);
        assert_eq!(fetcher.calls(), first.total);
    }

    #[tokio::test]
    async fn prefetch_counts_failures() {
        let fetcher = FakeFetcher::new(true);
        let cache = cache(&fetcher, &Arc::new(MemoryFileStore::new()), None);
        let summary = cache
            .prefetch(&Coordinate::new(0.0, 0.0), 10.0, 1..=2, &null_progress())
            .await;
        assert_eq!(summary.failed, summary.total);
        assert_eq!(cache.memory_len(), 0);
    }

    #[tokio::test]
    async fn panicked_download_can_be_scheduled_again() {
        let fetcher = Arc::new(PanickingFetcher {
            calls: AtomicUsize::new(0),
        });
        let cache = TileCache::new(
            layer(),
            Arc::clone(&fetcher) as Arc<dyn TileFetcher>,
            Arc::new(MemoryFileStore::new()),
            None,
        );
        let coord = TileCoord::new(15, 1, 1);

        assert!(!cache.resolve_tile_url(coord).is_cached());
        cache.flush().await;
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 1);

        assert!(!cache.resolve_tile_url(coord).is_cached());
        cache.flush().await;
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 2);
        assert!(cache.resolve_tile_url(coord).is_cached());
    }

    #[tokio::test]
    async fn prefetch_caps_zoom() {
        let fetcher = FakeFetcher::new(false);
        let files = Arc::new(MemoryFileStore::new());
        let cache = cache(&fetcher, &files, None);
        let center = Coordinate::new(33.64, -84.43);

        let summary = cache.prefetch(&center, 1.0, 30..=30, &null_progress()).await;
        assert!(summary.total >= 1);
        assert_eq!(summary.fetched, summary.total);

        let covered = peak_motion_geo::tile_for(33.64, -84.43, MAX_ZOOM);
        assert!(cache.load_cached_tile(&cache.tile_url(covered)).await.is_some());
    }
}
