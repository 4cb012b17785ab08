#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! CLI entry point for peak-motion.
//!
//! Drives the POI pipeline without a device: one-off fetches, replaying a
//! recorded route through the refresh controller, injecting manual
//! positions, inspecting the ledger, and warming the tile cache.

mod app;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use futures::StreamExt as _;
use peak_motion_config::AppConfig;
use peak_motion_geo::TileCoord;
use peak_motion_map::{GeoJsonSurface, MapSurface};
use peak_motion_notify::{LogDispatcher, NotificationDispatcher};
use peak_motion_poi_models::Coordinate;
use peak_motion_refresh::ProximityRefreshController;
use peak_motion_source::retry::RetryPolicy;
use peak_motion_source::{fetch_or_empty, service_registry};
use peak_motion_tiles::TileSource;
use peak_motion_tracker::{LocationProvider, PositionTracker, ReplayLocationProvider, coordinate_channel};

use crate::app::App;

#[derive(Parser)]
#[command(name = "peak_motion", about = "Location-driven POI discovery")]
struct Cli {
    /// Configuration file layered over the defaults (overrides
    /// `PEAK_MOTION_CONFIG`)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch POIs around a position once and print them
    Fetch {
        /// Latitude (defaults to the configured map center)
        #[arg(long, allow_hyphen_values = true)]
        lat: Option<f64>,
        /// Longitude (defaults to the configured map center)
        #[arg(long, allow_hyphen_values = true)]
        lon: Option<f64>,
        /// Search radius in meters (defaults to `refresh.radius_meters`)
        #[arg(long)]
        radius: Option<u32>,
    },
    /// Replay a recorded route through the refresh pipeline
    Track {
        /// CSV file with `latitude,longitude` rows
        #[arg(long)]
        route: PathBuf,
        /// Delay between replayed positions
        #[arg(long, default_value = "1000")]
        interval_ms: u64,
        /// Write the final markers as `GeoJSON` to this file
        #[arg(long)]
        geojson: Option<PathBuf>,
    },
    /// Inject one manual position and run a refresh cycle
    Manual {
        /// Latitude
        #[arg(long, allow_hyphen_values = true)]
        lat: f64,
        /// Longitude
        #[arg(long, allow_hyphen_values = true)]
        lon: f64,
    },
    /// Show the notified POI ids and visited count
    Ledger,
    /// Tile cache operations
    Tiles {
        #[command(subcommand)]
        command: TilesCommand,
    },
    /// List the configured POI services
    Sources,
}

#[derive(Subcommand)]
enum TilesCommand {
    /// Resolve one tile and cache it
    Get {
        /// Zoom level
        #[arg(long)]
        z: u8,
        /// Column
        #[arg(long)]
        x: u32,
        /// Row
        #[arg(long)]
        y: u32,
    },
    /// Cache every tile around a position for offline use
    Prefetch {
        /// Latitude
        #[arg(long, allow_hyphen_values = true)]
        lat: f64,
        /// Longitude
        #[arg(long, allow_hyphen_values = true)]
        lon: f64,
        /// Radius in meters (at most 25 km)
        #[arg(long, default_value = "1000")]
        radius: f64,
        /// Lowest zoom level (defaults to `map.initial_zoom`)
        #[arg(long, value_parser = clap::value_parser!(u8).range(0..=19))]
        min_zoom: Option<u8>,
        /// Highest zoom level (defaults to `min_zoom`)
        #[arg(long, value_parser = clap::value_parser!(u8).range(0..=19))]
        max_zoom: Option<u8>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let multi = peak_motion_cli_utils::init_logger();
    let cli = Cli::parse();

    let app = App::new(AppConfig::load(cli.config.as_deref())?)?;

    match cli.command {
        Commands::Fetch { lat, lon, radius } => {
            let [default_lat, default_lon] = app.config.map.initial_center;
            let center = Coordinate::new(lat.unwrap_or(default_lat), lon.unwrap_or(default_lon));
            let radius = radius.unwrap_or(app.config.refresh.radius_meters);

            let source = app.poi_source()?;
            let pois = fetch_or_empty(source.as_ref(), &center, radius).await;

            println!("{:<14} {:<16} {:<32} FACT", "ID", "CATEGORY", "NAME");
            println!("{}", "-".repeat(80));
            for poi in &pois {
                println!(
                    "{:<14} {:<16} {:<32} {}",
                    poi.id.to_string(),
                    poi.category,
                    poi.name,
                    poi.fact.as_deref().unwrap_or("")
                );
            }
            log::info!("{} POI(s) within {radius} m of {center}", pois.len());
        }
        Commands::Track {
            route,
            interval_ms,
            geojson,
        } => {
            let provider =
                ReplayLocationProvider::from_csv_path(&route, Duration::from_millis(interval_ms))?;
            track(&app, Arc::new(provider), geojson.as_deref()).await?;
        }
        Commands::Manual { lat, lon } => {
            manual(&app, Coordinate::new(lat, lon)).await?;
        }
        Commands::Ledger => {
            let ledger = app.ledger().await;
            let ids = ledger.notified_ids().await;
            println!("Notified POIs: {}", ids.len());
            println!("Visited count: {}", ledger.visited_count());
        }
        Commands::Tiles { command } => match command {
            TilesCommand::Get { z, x, y } => {
                let cache = app.tile_cache(RetryPolicy::none());
                let coord = TileCoord::new(z, x, y);

                if let TileSource::Remote(url) = cache.resolve_tile_url(coord) {
                    log::info!("Tile {z}/{x}/{y} not cached, fetching {url}");
                    cache.flush().await;
                }
                match cache.resolve_tile_url(coord) {
                    TileSource::Cached(data) => {
                        println!("Tile {z}/{x}/{y} cached ({} bytes)", data.len());
                    }
                    TileSource::Remote(url) => println!("Tile {z}/{x}/{y} unavailable: {url}"),
                }
            }
            TilesCommand::Prefetch {
                lat,
                lon,
                radius,
                min_zoom,
                max_zoom,
            } => {
                let cache = app.tile_cache(RetryPolicy::default());
                let min_zoom = min_zoom.unwrap_or(app.config.map.initial_zoom);
                let max_zoom = max_zoom.unwrap_or(min_zoom).max(min_zoom);

                let progress =
                    peak_motion_cli_utils::IndicatifProgress::tiles_bar(&multi, "Prefetching tiles");
                let summary = cache
                    .prefetch(
                        &Coordinate::new(lat, lon),
                        radius,
                        min_zoom..=max_zoom,
                        &progress,
                    )
                    .await;

                println!(
                    "{} tile(s): {} fetched, {} already cached, {} failed",
                    summary.total, summary.fetched, summary.already_cached, summary.failed
                );
            }
        },
        Commands::Sources => {
            println!("{:<12} {:<28} {:<8} {:<8} URL", "ID", "NAME", "ENABLED", "PRIORITY");
            println!("{}", "-".repeat(90));
            for service in service_registry::all_services() {
                println!(
                    "{:<12} {:<28} {:<8} {:<8} {}",
                    service.id,
                    service.name,
                    service.enabled,
                    service.priority,
                    service.base_url()
                );
            }
        }
    }

    Ok(())
}

/// Builds a controller drawing onto `surface` with the file-backed ledger
/// and log notifications.
async fn controller(
    app: &App,
    surface: &GeoJsonSurface,
) -> Result<ProximityRefreshController, Box<dyn std::error::Error>> {
    let notifier: Arc<dyn NotificationDispatcher> = Arc::new(LogDispatcher);
    Ok(ProximityRefreshController::new(
        app.poi_source()?,
        Box::new(surface.clone()),
        app.ledger().await,
        notifier,
        app.refresh_config(),
    ))
}

async fn track(
    app: &App,
    provider: Arc<dyn LocationProvider>,
    geojson: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut surface = GeoJsonSurface::new();
    surface.add_tile_layer(app.tile_cache(RetryPolicy::none()).layer());

    let (publisher, subscriber) = coordinate_channel();
    let tracker = PositionTracker::new(provider, publisher, app.position_options());
    tracker.ensure_permission().await?;

    match tracker.current_position().await {
        Ok(start) => log::info!("Starting at {start}"),
        Err(e) => log::warn!("No initial position: {e}"),
    }

    let handle = controller(app, &surface).await?.spawn(subscriber);

    let mut positions = tracker.stream(false);
    let mut replayed = 0_usize;
    while let Some(position) = positions.next().await {
        match position {
            Ok(coordinate) => {
                replayed += 1;
                log::debug!("Position {replayed}: {coordinate}");
            }
            Err(e) => {
                log::error!("Position stream ended with an error: {e}");
                break;
            }
        }
    }

    // Closing the channel lets the controller finish the pending position.
    drop(positions);
    drop(tracker);
    let controller = handle.join().await?;

    println!("Replayed {replayed} position(s)");
    println!("Markers on map: {}", surface.markers().len());
    println!("Visited count: {}", controller.ledger().visited_count());

    if let Some(path) = geojson {
        let collection = surface.to_feature_collection();
        tokio::fs::write(path, serde_json::to_string_pretty(&collection)?).await?;
        log::info!("Wrote {} marker(s) to {}", collection.features.len(), path.display());
    }

    Ok(())
}

async fn manual(app: &App, position: Coordinate) -> Result<(), Box<dyn std::error::Error>> {
    let surface = GeoJsonSurface::new();
    let (publisher, subscriber) = coordinate_channel();

    // No device: positions only arrive through `set_manual`.
    let tracker = PositionTracker::new(
        Arc::new(ReplayLocationProvider::new(Vec::new(), Duration::ZERO)),
        publisher,
        app.position_options(),
    );
    let handle = controller(app, &surface).await?.spawn(subscriber);

    tracker.set_manual(position);
    drop(tracker);
    let controller = handle.join().await?;

    match controller.last_refresh() {
        Some(at) => println!("Refreshed at {at}"),
        None => println!("No refresh for {position}"),
    }
    for marker in surface.markers() {
        println!("{:<14} {:<16} {}", marker.poi_id.to_string(), marker.popup.category, marker.popup.name);
    }
    println!("Visited count: {}", controller.ledger().visited_count());

    Ok(())
}
