#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Map tile resolution with an offline cache.
//!
//! The map asks [`TileCache::resolve_tile_url`] for every tile it draws.
//! Tiles seen before are served from memory as `data:` URLs; anything else
//! is served from the remote tile server while a background task loads
//! the tile from disk or downloads and persists it for next time.

pub mod cache;
pub mod fetcher;
pub mod progress;

use peak_motion_source::SourceError;
use peak_motion_storage::StorageError;
use thiserror::Error;

pub use cache::{PrefetchSummary, TileCache, TileSource, tile_path, tile_url};
pub use fetcher::{HttpTileFetcher, TileFetcher};
pub use progress::{NullProgress, ProgressCallback};

/// Errors that can occur while caching a tile.
#[derive(Debug, Error)]
pub enum TileError {
    /// Downloading the tile failed.
    #[error("Tile download failed: {0}")]
    Download(#[from] SourceError),

    /// The tile server answered with an empty body.
    #[error("Empty tile body from {url}")]
    Empty {
        /// Tile URL.
        url: String,
    },

    /// Persisting the tile failed.
    #[error("Tile storage failed: {0}")]
    Storage(#[from] StorageError),
}
