use crate::models::{PermissionState, Position, RetryState};
use std::time::Instant;

/// Single source of truth for geolocation state.
///
/// Holds the current position, permission status, retry counter and the flags consumers
/// render from. It is shared process-wide through [`crate::state::StateManager`]; never
/// mutate it directly, go through [`update()`](crate::state::StateManager::update) so that
/// change events are emitted.
#[derive(Clone, Debug, Default)]
pub struct GeoState {
    // Position cache
    pub position: Option<Position>,
    pub last_acquired: Option<Instant>,

    // Permission
    pub permission: PermissionState,
    pub show_permission_prompt: bool,

    // Acquisition bookkeeping
    pub retry: RetryState,
    /// Hardware calls started and not yet settled
    pub acquisitions_in_flight: u32,
    /// True while `acquisitions_in_flight > 0`
    pub is_acquiring: bool,
    pub last_error: Option<String>,
    pub is_degraded: bool,

    // Set while a user-supplied position must not be replaced by background refresh
    pub manual_override: bool,
}

impl GeoState {
    pub fn is_permission_denied(&self) -> bool {
        self.permission == PermissionState::Denied
    }

    pub fn has_position(&self) -> bool {
        self.position.is_some()
    }

    /// True while a manual position is pinned by the override flag
    pub fn is_manual_pinned(&self) -> bool {
        self.manual_override && self.position.is_some_and(|p| p.manual)
    }

    pub fn begin_acquisition(&mut self) {
        self.acquisitions_in_flight += 1;
        self.is_acquiring = true;
    }

    /// Settle one hardware call. The progress flag drops only once none remain.
    pub fn finish_acquisition(&mut self) {
        self.acquisitions_in_flight = self.acquisitions_in_flight.saturating_sub(1);
        self.is_acquiring = self.acquisitions_in_flight > 0;
    }

    /// Drop the cached position and everything derived from it.
    pub fn clear_position(&mut self) {
        self.position = None;
        self.last_acquired = None;
        self.last_error = None;
        self.retry.reset();
        self.is_degraded = false;
    }
}
