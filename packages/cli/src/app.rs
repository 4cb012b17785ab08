//! Wiring of configured components for the CLI commands.

use std::sync::Arc;
use std::time::Duration;

use peak_motion_config::AppConfig;
use peak_motion_map::TileLayer;
use peak_motion_refresh::RefreshConfig;
use peak_motion_source::retry::RetryPolicy;
use peak_motion_source::{PoiSource, SourceError, service_registry};
use peak_motion_storage::{FileKeyValueStore, FsFileStore, PoiLedger, paths};
use peak_motion_tiles::{HttpTileFetcher, TileCache};
use peak_motion_tracker::PositionOptions;

/// Loaded configuration plus the shared HTTP client.
pub struct App {
    pub config: AppConfig,
    client: reqwest::Client,
}

impl App {
    pub fn new(config: AppConfig) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("peak-motion/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { config, client })
    }

    pub fn poi_source(&self) -> Result<Arc<dyn PoiSource>, SourceError> {
        peak_motion_source::build_source(&service_registry::enabled_services(), &self.client)
    }

    pub async fn ledger(&self) -> PoiLedger {
        let path = paths::kv_store_path(&self.config.storage.data_dir);
        log::debug!("Using ledger at {}", path.display());
        PoiLedger::open(Arc::new(FileKeyValueStore::new(path))).await
    }

    pub fn tile_cache(&self, retry: RetryPolicy) -> TileCache {
        let tiles = &self.config.tiles;
        TileCache::new(
            TileLayer {
                url_template: tiles.url_template.clone(),
                subdomains: tiles.subdomains.clone(),
                attribution: tiles.attribution.clone(),
            },
            Arc::new(HttpTileFetcher::new(self.client.clone()).with_retry(retry)),
            Arc::new(FsFileStore::new(paths::files_root(
                &self.config.storage.data_dir,
            ))),
            tiles.max_memory_entries,
        )
    }

    pub fn refresh_config(&self) -> RefreshConfig {
        RefreshConfig {
            threshold_meters: self.config.threshold_meters(),
            radius_meters: self.config.refresh.radius_meters,
        }
    }

    pub fn position_options(&self) -> PositionOptions {
        let position = &self.config.position;
        PositionOptions {
            maximum_age: Duration::from_millis(position.maximum_age_ms),
            timeout: Duration::from_millis(position.timeout_ms),
            enable_high_accuracy: position.enable_high_accuracy,
        }
    }
}
