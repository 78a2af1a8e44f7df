//! Services module - location acquisition, permission tracking and distance ranking.
//!
//! The services sit between the platform boundary ([`crate::platform`]) and the shared
//! state ([`crate::state`]). They are framework-agnostic: no UI code, every platform
//! capability is injected, and all results flow into one [`StateManager`](crate::state::StateManager).
//!
//! # Components
//!
//! - [`PermissionTracker`]: Queries the permission subsystem. Handles:
//!   - Missing or failing permission APIs (reported as unknown)
//!   - The iOS quirk where a revoked permission reads as `prompt`, via a hardware probe
//!   - One-time registration of a permission change listener
//!
//! - [`PositionService`]: Wraps the hardware position call with:
//!   - A cached position and a significance threshold for replacing it
//!   - Deduplication of concurrent requests into one hardware call
//!   - A retry ladder that relaxes options after each consecutive failure
//!
//! - [`UpdateScheduler`]: Periodic forced refresh, paused by the manual override flag.
//!
//! - [`ranking`]: Pure haversine ranking of [`CandidateLocation`](crate::models::CandidateLocation)s.
//!
//! - [`catalog`]: The [`LocationSource`] seam for candidate data, with a YAML backend.
//!
//! - [`GeolocationService`]: Facade tying the above together; this is what callers use.
//!
//! # Usage Example
//!
//! ```ignore
//! use georank::models::GeoConfig;
//! use georank::platform::Platform;
//! use georank::services::{GeolocationService, YamlLocationSource};
//!
//! let config = GeoConfig::default();
//! let service = GeolocationService::new(&config, Platform::scripted(&config.platform));
//!
//! service.initialize_with_permission_check().await;
//!
//! let source = YamlLocationSource::new("locations.yaml");
//! for ranked in service.rank_for_map(&source, "old-town").await? {
//!     println!("{} {}", ranked.location.name, ranked.distance_label().unwrap_or("?"));
//! }
//! ```

pub mod acquisition;
pub mod catalog;
pub mod error;
pub mod geolocation;
pub mod permission;
pub mod ranking;
pub mod scheduler;

pub use acquisition::{AcquireOptions, PositionService};
pub use catalog::{LocationFilter, LocationSource, YamlLocationSource, load_candidates};
pub use error::{CatalogError, GeolocationError, PlatformError};
pub use geolocation::GeolocationService;
pub use permission::PermissionTracker;
pub use ranking::{format_distance, haversine_m, rank};
pub use scheduler::{TickOutcome, UpdateScheduler};
