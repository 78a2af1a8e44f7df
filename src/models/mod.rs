//! Data models for georank.
//!
//! This module contains the core data structures used throughout the crate:
//! - [`GeoState`]: The shared state container (position cache, permission, retry counter, UI flags)
//! - [`Position`], [`PermissionState`], [`RetryState`]: The values the acquisition pipeline produces
//! - [`CandidateLocation`], [`RankedLocation`]: Ranking inputs and outputs
//! - [`RawLocation`]: Catalog records in any of their historical coordinate layouts
//! - [`GeoConfig`]: Settings loaded from `georank.yaml`
//!
//! # Architecture Note
//!
//! - **Serializable**: Config and location structs derive `Serialize`/`Deserialize` for YAML
//! - **Cloneable**: GeoState is wrapped in `Arc<RwLock<>>` by [`StateManager`](crate::state::StateManager)
//! - **Immutable**: State updates go through StateManager's `update()` method to ensure consistency

pub mod config;
pub mod geo_state;
pub mod location;
pub mod position;

pub use config::{
    AcquisitionSettings, GeoConfig, LadderStep, LoggingSettings, PermissionSettings,
    PlatformSettings, SchedulerSettings, SimulatedFix, StateSettings,
};
pub use geo_state::GeoState;
pub use location::{
    CandidateLocation, Coordinates, Distance, LegacyLocationEntry, RankedLocation,
    RawCoordinates, RawLocation,
};
pub use position::{PermissionState, Position, RetryState};
