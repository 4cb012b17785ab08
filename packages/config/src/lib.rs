#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Layered configuration for peak-motion.
//!
//! The built-in defaults live in `config/default.toml` and are embedded at
//! compile time. An optional user file is merged on top of them key by
//! key, so a user file only needs to mention what it changes:
//!
//! ```toml
//! [refresh]
//! radius_meters = 5000
//! ```
//!
//! The user file path comes from `PEAK_MOTION_CONFIG` unless given
//! explicitly, and `PEAK_MOTION_DATA_DIR` overrides `storage.data_dir`.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

/// Environment variable naming the user configuration file.
pub const CONFIG_ENV: &str = "PEAK_MOTION_CONFIG";

/// Environment variable overriding the data directory.
pub const DATA_DIR_ENV: &str = "PEAK_MOTION_DATA_DIR";

const DEFAULT_TOML: &str = include_str!("../config/default.toml");

/// Errors from loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The user file could not be read.
    #[error("Failed to read config file {path}: {source}")]
    Io {
        /// Path that failed.
        path: PathBuf,
        /// Underlying error.
        source: std::io::Error,
    },

    /// A TOML document failed to parse or did not match the schema.
    #[error("Invalid configuration: {0}")]
    Toml(#[from] toml::de::Error),
}

/// Full application configuration.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AppConfig {
    /// Proximity refresh knobs.
    pub refresh: RefreshSettings,
    /// Location provider options.
    pub position: PositionSettings,
    /// Tile layer and cache settings.
    pub tiles: TileSettings,
    /// Persistent storage settings.
    pub storage: StorageSettings,
    /// Initial map view.
    pub map: MapSettings,
}

/// Proximity refresh knobs.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RefreshSettings {
    /// Minimum displacement in meters before a new query. `None` or `0`
    /// refreshes on every fix.
    #[serde(default)]
    pub threshold_meters: Option<f64>,
    /// Search radius in meters.
    pub radius_meters: u32,
}

/// Location provider options.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PositionSettings {
    /// Maximum age of a cached fix, in milliseconds.
    pub maximum_age_ms: u64,
    /// How long to wait for a fix, in milliseconds.
    pub timeout_ms: u64,
    /// Whether to prefer high-accuracy (GPS) fixes.
    pub enable_high_accuracy: bool,
}

/// Tile layer and cache settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TileSettings {
    /// URL template with `{s}`, `{z}`, `{x}` and `{y}` placeholders.
    pub url_template: String,
    /// Values substituted for `{s}`.
    pub subdomains: Vec<String>,
    /// Attribution shown with the layer.
    pub attribution: String,
    /// Upper bound on in-memory cached tiles. `None` keeps every tile.
    #[serde(default)]
    pub max_memory_entries: Option<usize>,
}

/// Persistent storage settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct StorageSettings {
    /// Root directory for the key/value store and cached tiles.
    pub data_dir: PathBuf,
}

/// Initial map view.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct MapSettings {
    /// `[latitude, longitude]` the map opens at before the first fix.
    pub initial_center: [f64; 2],
    /// Zoom level the map opens at.
    pub initial_zoom: u8,
}

impl AppConfig {
    /// Returns the built-in defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Toml`] if the embedded defaults are malformed.
    pub fn defaults() -> Result<Self, ConfigError> {
        Self::from_layers(DEFAULT_TOML, None)
    }

    /// Loads the configuration, layering the user file (explicit `path`,
    /// else `PEAK_MOTION_CONFIG`) over the defaults and applying
    /// environment overrides.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the user file cannot be read or either
    /// layer is invalid.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let path = path
            .map(Path::to_path_buf)
            .or_else(|| std::env::var_os(CONFIG_ENV).map(PathBuf::from));

        let user = match &path {
            Some(path) => {
                log::debug!("Loading config overrides from {}", path.display());
                Some(
                    std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
                        path: path.clone(),
                        source,
                    })?,
                )
            }
            None => None,
        };

        let mut config = Self::from_layers(DEFAULT_TOML, user.as_deref())?;

        if let Some(dir) = std::env::var_os(DATA_DIR_ENV) {
            config.storage.data_dir = PathBuf::from(dir);
        }

        Ok(config)
    }

    /// Parses `base` and merges `overrides` (if any) on top.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Toml`] if either document is invalid or the
    /// merged result does not match the schema.
    pub fn from_layers(base: &str, overrides: Option<&str>) -> Result<Self, ConfigError> {
        let mut table: toml::Table = toml::from_str(base)?;
        if let Some(overrides) = overrides {
            let overrides: toml::Table = toml::from_str(overrides)?;
            merge(&mut table, overrides);
        }
        Ok(toml::Value::Table(table).try_into()?)
    }

    /// The refresh threshold, with `0` normalized to "every fix".
    #[must_use]
    pub fn threshold_meters(&self) -> Option<f64> {
        self.refresh.threshold_meters.filter(|t| *t > 0.0)
    }
}

/// Recursively merges `overlay` into `base`; tables merge, everything else
/// replaces.
fn merge(base: &mut toml::Table, overlay: toml::Table) {
    for (key, value) in overlay {
        match (base.get_mut(&key), value) {
            (Some(toml::Value::Table(existing)), toml::Value::Table(incoming)) => {
                merge(existing, incoming);
            }
            (_, value) => {
                base.insert(key, value);
            }
        }
    }
}
