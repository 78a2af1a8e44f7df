// georank - Device geolocation and distance ranking of nearby places
//
// This is the library crate containing the services, state and platform boundary.
// The binary crate (main.rs) provides a command-line front end on a scripted platform.

pub mod config;
pub mod logging;
pub mod metrics;
pub mod models;
pub mod platform;
pub mod services;
pub mod state;

// Re-export commonly used types for convenience
pub use config::ConfigManager;
pub use models::{CandidateLocation, GeoConfig, GeoState, PermissionState, Position, RankedLocation};
pub use services::{GeolocationError, GeolocationService};
pub use state::{GeoStateChange, StateManager};

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
pub const APP_NAME: &str = env!("CARGO_PKG_NAME");
