#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Persistent storage for peak-motion.
//!
//! Two storage shapes are abstracted behind traits so the device backends
//! can be swapped for in-memory ones in tests:
//!
//! - [`kv::KeyValueStore`]: small string values keyed by name. Backs the
//!   [`ledger::PoiLedger`].
//! - [`files::FileStore`]: named text files grouped by [`files::Directory`].
//!   Backs the map tile cache.

pub mod files;
pub mod kv;
pub mod ledger;
pub mod paths;

use thiserror::Error;

pub use files::{Directory, FileStore, FsFileStore, MemoryFileStore};
pub use kv::{FileKeyValueStore, KeyValueStore, MemoryKeyValueStore};
pub use ledger::PoiLedger;

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// I/O error (file read/write).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A stored value could not be encoded or decoded.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The requested entry does not exist.
    #[error("Not found: {path}")]
    NotFound {
        /// Key or path that was requested.
        path: String,
    },
}
