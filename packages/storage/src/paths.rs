#![allow(clippy::module_name_repetitions)]
//! Canonical file paths under the data directory.

use std::path::{Path, PathBuf};

/// File name of the key/value store inside the data directory.
pub const KV_FILE_NAME: &str = "storage.json";

/// Returns the key/value store path for `data_dir`.
#[must_use]
pub fn kv_store_path(data_dir: &Path) -> PathBuf {
    data_dir.join(KV_FILE_NAME)
}

/// Returns the root under which [`crate::Directory`] folders live.
#[must_use]
pub fn files_root(data_dir: &Path) -> PathBuf {
    data_dir.join("files")
}

/// Ensures a directory exists, creating it if necessary.
///
/// # Errors
///
/// Returns an I/O error if the directory cannot be created.
pub async fn ensure_dir(path: &Path) -> std::io::Result<()> {
    if !tokio::fs::try_exists(path).await? {
        tokio::fs::create_dir_all(path).await?;
    }
    Ok(())
}
