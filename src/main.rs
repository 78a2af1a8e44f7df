//! georank - rank nearby places by distance from the device position
//!
//! Command-line front end for the geolocation service.
//!
//! # Usage
//!
//! ```text
//! georank [locations.yaml] [map-id]
//! ```
//!
//! # Execution Flow
//!
//! 1. Load `georank-data/georank.yaml` (defaults if missing, `GEORANK__*` env overrides)
//! 2. Initialize logging → `<log_dir>/<log_prefix>.<date>`
//! 3. Create the tokio runtime
//! 4. Build the service on the scripted platform described by the `platform` section
//! 5. Run the permission check and the initial acquisition
//! 6. Rank the map's locations from the catalog file and print them
//! 7. Log metrics and shut down
//!
//! Without a catalog file only the permission state and position are printed.

use anyhow::{Context, Result};
use georank::platform::Platform;
use georank::services::YamlLocationSource;
use georank::{APP_NAME, ConfigManager, GeolocationService, VERSION};
use std::time::Duration;

const CONFIG_DIR: &str = "georank-data";
const DEFAULT_MAP_ID: &str = "default";

fn main() -> Result<()> {
    let mut args = std::env::args().skip(1);
    let catalog_path = args.next();
    let map_id = args.next().unwrap_or_else(|| DEFAULT_MAP_ID.to_string());

    let config_manager = ConfigManager::new(CONFIG_DIR)?;
    let config = config_manager.load_config()?;

    let _log_guard = georank::logging::setup_from_settings(&config.logging)?;
    tracing::info!("Starting {} v{}", APP_NAME, VERSION);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .worker_threads(2)
        .thread_name("georank-worker")
        .build()
        .context("Failed to create tokio runtime")?;

    let service = GeolocationService::new(&config, Platform::scripted(&config.platform));

    let result = runtime.block_on(async {
        let permission = service.initialize_with_permission_check().await;
        println!("Permission: {}", permission);

        match service.position() {
            Some(position) => println!("Position:   {}", position),
            None => println!(
                "Position:   unknown ({})",
                service.last_error().as_deref().unwrap_or("no fix yet")
            ),
        }

        let Some(path) = catalog_path else {
            tracing::info!("No catalog file given, skipping ranking");
            return Ok(());
        };

        let source = YamlLocationSource::new(&path);
        let ranked = service
            .rank_for_map(&source, &map_id)
            .await
            .with_context(|| format!("Failed to rank map {} from {}", map_id, path))?;

        println!();
        for entry in &ranked {
            println!(
                "{:>10}  {}",
                entry.distance_label().unwrap_or("-"),
                entry.location.name
            );
        }

        Ok::<(), anyhow::Error>(())
    });

    service.stop();
    service.metrics().log_summary();

    runtime.shutdown_timeout(Duration::from_secs(5));
    tracing::info!("Shutdown complete");

    result
}
