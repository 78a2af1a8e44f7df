//! Geolocation service facade.
//!
//! [`GeolocationService`] wires the permission tracker, the acquisition service and the
//! update scheduler to one [`StateManager`] and exposes the operations the UI layer calls.
//! The shared state is the single source of truth; consumers either read it through the
//! accessors or [`subscribe`](GeolocationService::subscribe) to change events.

use crate::metrics::Metrics;
use crate::models::{
    CandidateLocation, GeoConfig, GeoState, PermissionSettings, PermissionState, Position,
    RankedLocation,
};
use crate::platform::Platform;
use crate::services::catalog::{self, LocationSource};
use crate::services::{
    AcquireOptions, CatalogError, GeolocationError, PermissionTracker, PositionService,
    UpdateScheduler, ranking,
};
use crate::state::{GeoStateChange, StateManager};
use futures::FutureExt;
use futures::future::BoxFuture;
use std::sync::{Arc, Weak};
use tokio::sync::broadcast;

struct ServiceInner {
    state: StateManager,
    positions: PositionService,
    permissions: PermissionTracker,
    scheduler: UpdateScheduler,
}

/// Entry point for everything location related.
///
/// Cheap to clone; clones share state, the pending acquisition and the scheduler.
#[derive(Clone)]
pub struct GeolocationService {
    inner: Arc<ServiceInner>,
}

impl GeolocationService {
    /// Build the service on `platform` with the given configuration
    pub fn new(config: &GeoConfig, platform: Platform) -> Self {
        let metrics = Arc::new(Metrics::new());
        let state = StateManager::with_capacity(config.state.event_buffer, metrics);

        let positions = PositionService::new(
            platform.hardware.clone(),
            state.clone(),
            config.acquisition.clone(),
        );
        let permissions = PermissionTracker::new(
            platform.permissions,
            platform.hardware,
            platform.family,
            state.clone(),
            config.permission.clone(),
        );
        let scheduler = UpdateScheduler::new(positions.clone(), config.scheduler.interval());

        tracing::info!(
            "Geolocation service created (platform={:?}, refresh every {:?})",
            platform.family,
            scheduler.interval()
        );

        Self {
            inner: Arc::new(ServiceInner {
                state,
                positions,
                permissions,
                scheduler,
            }),
        }
    }

    // Position acquisition

    /// Get the device position, from cache unless `force_refresh` is set
    pub async fn get_position(
        &self,
        force_refresh: bool,
        options: AcquireOptions,
    ) -> Result<Position, GeolocationError> {
        self.inner.positions.acquire(force_refresh, options).await
    }

    /// Ask for the position in response to a user gesture.
    ///
    /// The hardware is called before this returns, so the platform can tie its permission
    /// dialog to the gesture. On success background refresh starts; a denial hides the
    /// permission prompt since asking again would not help.
    pub fn request_permission(&self) -> BoxFuture<'static, Result<Position, GeolocationError>> {
        let request = self.inner.positions.request_direct();
        let inner = Arc::clone(&self.inner);

        async move {
            let result = request.await;
            match &result {
                Ok(_) => {
                    inner.scheduler.start();
                }
                Err(GeolocationError::PermissionDenied) => {
                    tracing::info!("User denied location access");
                    inner.state.set_permission_prompt(false);
                }
                Err(e) => tracing::warn!("Permission request did not produce a position: {}", e),
            }
            result
        }
        .boxed()
    }

    // Permission

    /// Query the permission state, correcting for platforms that misreport it
    pub async fn check_permission(&self) -> PermissionState {
        self.inner.permissions.check_permission().await
    }

    /// Check permission and bring the service into the matching mode.
    ///
    /// - `Granted`: hide the prompt, acquire a position and start background refresh
    /// - `Denied`: hide the prompt
    /// - `Prompt` / `Unknown`: show the prompt
    ///
    /// A safety check runs after the configured delay and shows the prompt if no position
    /// arrived, permission is not denied and the prompt is hidden. The first call also
    /// subscribes to platform permission changes, which re-run this routine.
    pub async fn initialize_with_permission_check(&self) -> PermissionState {
        self.watch_permission_changes();

        let permission = self.check_permission().await;
        tracing::info!("Initializing geolocation with permission {}", permission);

        match permission {
            PermissionState::Granted => {
                self.inner.state.set_permission_prompt(false);
                if let Err(e) = self.get_position(false, AcquireOptions::default()).await {
                    tracing::warn!("Initial position acquisition failed: {}", e);
                }
                self.inner.scheduler.start();
            }
            PermissionState::Denied => {
                self.inner.state.set_permission_prompt(false);
            }
            PermissionState::Prompt | PermissionState::Unknown => {
                self.inner.state.set_permission_prompt(true);
            }
        }

        self.spawn_safety_check();
        permission
    }

    fn watch_permission_changes(&self) {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            return;
        };
        let weak: Weak<ServiceInner> = Arc::downgrade(&self.inner);

        self.inner.permissions.watch_changes(Box::new(move |state| {
            let Some(inner) = weak.upgrade() else {
                return;
            };
            tracing::info!("Platform permission changed to {}, re-initializing", state);
            runtime.spawn(GeolocationService { inner }.reinitialize());
        }));
    }

    fn reinitialize(self) -> BoxFuture<'static, ()> {
        async move {
            self.initialize_with_permission_check().await;
        }
        .boxed()
    }

    fn spawn_safety_check(&self) {
        let state = self.inner.state.clone();
        let delay = self.permission_settings().safety_check_delay();

        tokio::spawn(async move {
            tokio::time::sleep(delay).await;

            let needs_prompt = state.read(|s| {
                !s.has_position() && !s.is_permission_denied() && !s.show_permission_prompt
            });
            if needs_prompt {
                tracing::info!("No position after {:?}, showing permission prompt", delay);
                state.set_permission_prompt(true);
            }
        });
    }

    fn permission_settings(&self) -> &PermissionSettings {
        self.inner.permissions.settings()
    }

    // Manual position and scheduling

    /// Pause or resume background refresh without stopping the scheduler
    pub fn set_manual_override(&self, enabled: bool) {
        self.inner.state.set_manual_override(enabled);
    }

    /// Pin a user-chosen position; background refresh stops replacing it
    pub fn set_manual_position(&self, lat: f64, lng: f64) {
        tracing::info!("Manual position set to ({:.6}, {:.6})", lat, lng);
        self.inner.state.set_manual_position(lat, lng);
    }

    /// Start background refresh. Returns false if it was already running.
    pub fn start(&self) -> bool {
        self.inner.scheduler.start()
    }

    pub fn stop(&self) -> bool {
        self.inner.scheduler.stop()
    }

    pub fn is_refreshing(&self) -> bool {
        self.inner.scheduler.is_running()
    }

    /// Forget the cached position, error and retry progress; permission is kept
    pub fn clear_position(&self) {
        self.inner.state.clear_position();
    }

    // Ranking

    /// Rank candidates against an explicit position
    pub fn rank(
        &self,
        locations: &[CandidateLocation],
        position: Option<&Position>,
    ) -> Vec<RankedLocation> {
        ranking::rank(locations, position)
    }

    /// Rank candidates against the cached position
    pub fn rank_nearby(&self, locations: &[CandidateLocation]) -> Vec<RankedLocation> {
        let position = self.position();
        ranking::rank(locations, position.as_ref())
    }

    /// Load a map's locations from `source` and rank them against the cached position
    pub async fn rank_for_map(
        &self,
        source: &dyn LocationSource,
        map_id: &str,
    ) -> Result<Vec<RankedLocation>, CatalogError> {
        let candidates = catalog::load_candidates(source, map_id).await?;
        Ok(self.rank_nearby(&candidates))
    }

    // State access

    pub fn subscribe(&self) -> broadcast::Receiver<GeoStateChange> {
        self.inner.state.subscribe()
    }

    pub fn snapshot(&self) -> GeoState {
        self.inner.state.snapshot()
    }

    pub fn state(&self) -> &StateManager {
        &self.inner.state
    }

    pub fn metrics(&self) -> &Arc<Metrics> {
        self.inner.state.metrics()
    }

    pub fn position(&self) -> Option<Position> {
        self.inner.state.read(|s| s.position)
    }

    pub fn is_in_progress(&self) -> bool {
        self.inner.state.read(|s| s.is_acquiring)
    }

    pub fn last_error(&self) -> Option<String> {
        self.inner.state.read(|s| s.last_error.clone())
    }

    pub fn show_permission_prompt(&self) -> bool {
        self.inner.state.read(|s| s.show_permission_prompt)
    }

    pub fn is_permission_denied(&self) -> bool {
        self.inner.state.read(|s| s.is_permission_denied())
    }

    pub fn is_degraded(&self) -> bool {
        self.inner.state.read(|s| s.is_degraded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::{
        LocationHardware, PermissionQuery, PlatformFamily, PositionErrorCode, ScriptedHardware,
        ScriptedPermission,
    };

    fn service(
        hardware: Arc<ScriptedHardware>,
        permission: Arc<ScriptedPermission>,
        family: PlatformFamily,
    ) -> GeolocationService {
        let platform = Platform {
            hardware: Some(hardware as Arc<dyn LocationHardware>),
            permissions: Some(permission as Arc<dyn PermissionQuery>),
            family,
        };
        GeolocationService::new(&GeoConfig::default(), platform)
    }

    #[tokio::test]
    async fn test_granted_initialization_acquires_and_starts_refresh() {
        let hardware = Arc::new(ScriptedHardware::with_fix(59.437, 24.7536, Some(12.0)));
        let service = service(
            Arc::clone(&hardware),
            Arc::new(ScriptedPermission::new(PermissionState::Granted)),
            PlatformFamily::Desktop,
        );

        let permission = service.initialize_with_permission_check().await;

        assert_eq!(permission, PermissionState::Granted);
        assert!(!service.show_permission_prompt());
        assert_eq!(service.position().map(|p| p.lat), Some(59.437));
        assert!(service.is_refreshing());
        assert_eq!(hardware.call_count(), 1);

        service.stop();
    }

    #[tokio::test]
    async fn test_denied_initialization_hides_prompt() {
        let hardware = Arc::new(ScriptedHardware::with_fix(1.0, 2.0, None));
        let service = service(
            Arc::clone(&hardware),
            Arc::new(ScriptedPermission::new(PermissionState::Denied)),
            PlatformFamily::Android,
        );

        service.initialize_with_permission_check().await;

        assert!(!service.show_permission_prompt());
        assert!(service.is_permission_denied());
        assert!(!service.is_refreshing());
        assert_eq!(hardware.call_count(), 0);
    }

    #[tokio::test]
    async fn test_prompt_initialization_shows_prompt() {
        let service = service(
            Arc::new(ScriptedHardware::new()),
            Arc::new(ScriptedPermission::new(PermissionState::Prompt)),
            PlatformFamily::Desktop,
        );

        service.initialize_with_permission_check().await;
        assert!(service.show_permission_prompt());
    }

    #[tokio::test]
    async fn test_request_permission_denied_hides_prompt() {
        let hardware = Arc::new(ScriptedHardware::new());
        hardware.push_error(PositionErrorCode::PermissionDenied);
        let service = service(
            Arc::clone(&hardware),
            Arc::new(ScriptedPermission::new(PermissionState::Prompt)),
            PlatformFamily::Desktop,
        );
        service.state().set_permission_prompt(true);

        let result = service.request_permission().await;

        assert_eq!(result.unwrap_err(), GeolocationError::PermissionDenied);
        assert!(!service.show_permission_prompt());
        assert!(service.is_permission_denied());
        assert!(!service.is_refreshing());
    }

    #[tokio::test]
    async fn test_request_permission_success_grants_and_starts_refresh() {
        let service = service(
            Arc::new(ScriptedHardware::with_fix(1.0, 2.0, None)),
            Arc::new(ScriptedPermission::new(PermissionState::Prompt)),
            PlatformFamily::Ios,
        );
        service.state().set_permission_prompt(true);

        let position = service.request_permission().await.unwrap();

        assert_eq!(position.lng, 2.0);
        assert!(!service.show_permission_prompt());
        assert_eq!(service.snapshot().permission, PermissionState::Granted);
        assert!(service.is_refreshing());

        service.stop();
    }

    #[tokio::test]
    async fn test_rank_nearby_without_position_is_passthrough() {
        let service = service(
            Arc::new(ScriptedHardware::new()),
            Arc::new(ScriptedPermission::new(PermissionState::Prompt)),
            PlatformFamily::Desktop,
        );
        let locations = vec![CandidateLocation {
            id: "1".to_string(),
            name: "One".to_string(),
            description: None,
            coordinates: None,
        }];

        let ranked = service.rank_nearby(&locations);
        assert_eq!(ranked.len(), 1);
        assert!(ranked[0].distance.is_none());
    }

    #[tokio::test]
    async fn test_manual_position_ranks_and_survives_refresh() {
        let hardware = Arc::new(ScriptedHardware::with_fix(10.0, 10.0, None));
        let service = service(
            Arc::clone(&hardware),
            Arc::new(ScriptedPermission::new(PermissionState::Granted)),
            PlatformFamily::Desktop,
        );

        service.set_manual_position(59.437, 24.7536);
        service
            .get_position(true, AcquireOptions::default())
            .await
            .unwrap();

        let position = service.position().unwrap();
        assert!(position.manual);
        assert_eq!(position.lat, 59.437);
    }
}
