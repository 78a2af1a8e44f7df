//! Permission state tracking for the location capability.
//!
//! iOS reports `prompt` from the permission API even after the user denied access, when
//! the query does not come from a user gesture. On that family the tracker looks past the
//! report with one cheap hardware probe:
//!
//! | probe result              | interpreted as |
//! |---------------------------|----------------|
//! | fix                       | `Granted`      |
//! | PERMISSION_DENIED         | `Prompt`       |
//! | any other error           | `Prompt`       |
//!
//! A probe denial is not a user denial: the platform is blocking background requests, and
//! a request made from a gesture can still succeed.

use crate::metrics::Metrics;
use crate::models::{PermissionSettings, PermissionState};
use crate::platform::{
    self, LocationHardware, PermissionListener, PermissionQuery, PlatformFamily,
    PositionErrorCode, PositionOptions,
};
use crate::state::StateManager;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// Queries and interprets the platform permission subsystem
pub struct PermissionTracker {
    query: Option<Arc<dyn PermissionQuery>>,
    hardware: Option<Arc<dyn LocationHardware>>,
    platform: PlatformFamily,
    state: StateManager,
    settings: PermissionSettings,
    metrics: Arc<Metrics>,
    listener_registered: AtomicBool,
}

impl PermissionTracker {
    /// Create a tracker.
    ///
    /// # Arguments
    /// * `query` - The platform permission subsystem, `None` where it is unsupported
    /// * `hardware` - Location hardware used for the behavioral probe
    /// * `platform` - Host platform family, decides whether the probe runs
    /// * `state` - Shared state the resolved permission is written to
    /// * `settings` - Probe timeout and safety check delay
    pub fn new(
        query: Option<Arc<dyn PermissionQuery>>,
        hardware: Option<Arc<dyn LocationHardware>>,
        platform: PlatformFamily,
        state: StateManager,
        settings: PermissionSettings,
    ) -> Self {
        let metrics = Arc::clone(state.metrics());
        Self {
            query,
            hardware,
            platform,
            state,
            settings,
            metrics,
            listener_registered: AtomicBool::new(false),
        }
    }

    pub fn platform(&self) -> PlatformFamily {
        self.platform
    }

    pub fn settings(&self) -> &PermissionSettings {
        &self.settings
    }

    /// Query the permission status of the location capability.
    ///
    /// Returns `Unknown` when the platform has no permission API or the query fails. A
    /// successful query is written to the shared state, after the probe correction on
    /// platforms that misreport revoked permissions.
    pub async fn check_permission(&self) -> PermissionState {
        let Some(query) = self.query.as_ref() else {
            tracing::debug!("Permission API unsupported, reporting unknown");
            return PermissionState::Unknown;
        };

        let reported = match query.query().await {
            Ok(state) => state,
            Err(e) => {
                tracing::warn!("Permission query failed: {}", e);
                return PermissionState::Unknown;
            }
        };

        let resolved = if reported == PermissionState::Prompt
            && self.platform.misreports_revoked_permission()
        {
            self.probe().await
        } else {
            reported
        };

        tracing::info!(
            "Location permission: reported={}, resolved={} ({:?})",
            reported,
            resolved,
            self.platform
        );
        self.state.set_permission(resolved);
        resolved
    }

    /// Register a listener for platform permission changes.
    ///
    /// Only the first call registers; later calls return false.
    pub fn watch_changes(&self, listener: PermissionListener) -> bool {
        let Some(query) = self.query.as_ref() else {
            return false;
        };

        if self.listener_registered.swap(true, Ordering::SeqCst) {
            return false;
        }

        query.on_change(listener);
        tracing::debug!("Registered permission change listener");
        true
    }

    async fn probe(&self) -> PermissionState {
        let Some(hardware) = self.hardware.as_ref() else {
            return PermissionState::Prompt;
        };

        let options = PositionOptions {
            enable_high_accuracy: false,
            timeout: self.settings.probe_timeout(),
            maximum_age: Duration::MAX,
        };

        self.metrics.record_probe();
        self.metrics.record_hardware_call();

        match platform::request_position(hardware.as_ref(), &options).await {
            Ok(_) => PermissionState::Granted,
            Err(e) if e.code() == Some(PositionErrorCode::PermissionDenied) => {
                tracing::info!("Background location request blocked; a user gesture is required");
                PermissionState::Prompt
            }
            Err(e) => {
                tracing::debug!("Permission probe inconclusive: {}", e);
                PermissionState::Prompt
            }
        }
    }
}
