//! Downloading tile images.

use async_trait::async_trait;
use peak_motion_source::retry::{self, RetryPolicy};

use crate::TileError;

/// Fetches the raw bytes of a tile image.
#[async_trait]
pub trait TileFetcher: Send + Sync {
    /// Downloads the tile at `url`.
    ///
    /// # Errors
    ///
    /// Returns [`TileError`] if the download fails.
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, TileError>;
}

/// [`TileFetcher`] over HTTP.
pub struct HttpTileFetcher {
    client: reqwest::Client,
    retry: RetryPolicy,
}

impl HttpTileFetcher {
    /// Creates a fetcher sharing `client`.
    ///
    /// Tile servers are fetched once without retries: a missing tile is
    /// simply drawn from the remote URL by the map.
    #[must_use]
    pub const fn new(client: reqwest::Client) -> Self {
        Self {
            client,
            retry: RetryPolicy::none(),
        }
    }

    /// Overrides the retry policy (prefetch uses retries).
    #[must_use]
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }
}

#[async_trait]
impl TileFetcher for HttpTileFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, TileError> {
        let bytes = retry::send_bytes(&self.retry, || self.client.get(url)).await?;
        if bytes.is_empty() {
            return Err(TileError::Empty {
                url: url.to_string(),
            });
        }
        Ok(bytes)
    }
}
