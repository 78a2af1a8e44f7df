// State management module
//
// This module provides the StateManager which wraps GeoState with thread-safe access
// using Arc<RwLock<T>> and emits change events for consumers.

use crate::metrics::Metrics;
use crate::models::{GeoState, PermissionState, Position};
use crate::services::GeolocationError;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Instant;
use tokio::sync::broadcast;

/// Change events emitted when state is modified
///
/// These are the reactive observables of the service: consumers subscribe instead of
/// polling the position, progress flag, error message and permission flags.
#[derive(Clone, Debug, PartialEq)]
pub enum GeoStateChange {
    /// The cached position was replaced
    PositionChanged { position: Position },

    /// The cached position was cleared
    PositionCleared,

    /// A hardware acquisition is in flight
    AcquisitionStarted,

    /// The in-flight acquisition settled
    AcquisitionFinished,

    /// The user-facing error message changed (`None` once cleared)
    ErrorChanged { message: Option<String> },

    /// The permission status changed
    PermissionChanged { state: PermissionState },

    /// The "request permission" affordance was shown or hidden
    PermissionPromptChanged { visible: bool },

    /// The manual override flag was toggled
    ManualOverrideChanged { enabled: bool },

    /// Repeated transient failures crossed the degraded threshold
    ServiceDegraded { consecutive_failures: u32 },

    /// A fix arrived after the service was degraded
    ServiceRecovered,
}

/// Thread-safe state manager with event emission
///
/// This is the explicit process-wide context for geolocation:
/// - Provides thread-safe access to [`GeoState`] via `Arc<RwLock<T>>`
/// - Detects state changes and emits [`GeoStateChange`] events
/// - Supports subscribing to state changes via tokio broadcast channels
///
/// Create one per process and hand clones to every component; tests create a fresh one
/// per case.
///
/// # Usage
///
/// - [`read()`](Self::read) for reading individual fields
/// - [`update()`](Self::update) for mutations with automatic event emission
/// - [`subscribe()`](Self::subscribe) for listening to state changes
pub struct StateManager {
    /// The shared state protected by RwLock for thread-safe access
    state: Arc<RwLock<GeoState>>,

    /// Broadcast channel for emitting state change events
    state_tx: broadcast::Sender<GeoStateChange>,

    metrics: Arc<Metrics>,
}

impl StateManager {
    /// Create a new StateManager with default state and a 100 event buffer
    pub fn new() -> Self {
        Self::with_capacity(100, Arc::new(Metrics::new()))
    }

    /// Create a StateManager with a custom event buffer and shared metrics
    pub fn with_capacity(event_buffer: usize, metrics: Arc<Metrics>) -> Self {
        let (state_tx, _) = broadcast::channel(event_buffer.max(1));
        Self {
            state: Arc::new(RwLock::new(GeoState::default())),
            state_tx,
            metrics,
        }
    }

    /// Get a read-only snapshot of the current state
    pub fn snapshot(&self) -> GeoState {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Execute a function with read access to the state
    ///
    /// # Example
    /// ```ignore
    /// let denied = state_manager.read(|state| state.is_permission_denied());
    /// ```
    pub fn read<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&GeoState) -> R,
    {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        f(&state)
    }

    /// Update the state and emit change events
    ///
    /// 1. Captures the old state
    /// 2. Applies the update function
    /// 3. Detects what changed
    /// 4. Emits appropriate events
    ///
    /// # Returns
    /// A vector of GeoStateChange events that were emitted
    pub fn update<F>(&self, update_fn: F) -> Vec<GeoStateChange>
    where
        F: FnOnce(&mut GeoState),
    {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        let old_state = state.clone();

        update_fn(&mut state);

        let changes = Self::detect_changes(&old_state, &state);

        for change in &changes {
            // It's OK if no one is listening
            let _ = self.state_tx.send(change.clone());
            self.metrics.record_state_broadcast();
        }

        changes
    }

    /// Subscribe to state change events
    pub fn subscribe(&self) -> broadcast::Receiver<GeoStateChange> {
        self.state_tx.subscribe()
    }

    pub fn metrics(&self) -> &Arc<Metrics> {
        &self.metrics
    }

    fn detect_changes(old: &GeoState, new: &GeoState) -> Vec<GeoStateChange> {
        let mut changes = Vec::new();

        if old.position != new.position {
            changes.push(match new.position {
                Some(position) => GeoStateChange::PositionChanged { position },
                None => GeoStateChange::PositionCleared,
            });
        }

        if old.is_acquiring != new.is_acquiring {
            changes.push(if new.is_acquiring {
                GeoStateChange::AcquisitionStarted
            } else {
                GeoStateChange::AcquisitionFinished
            });
        }

        if old.last_error != new.last_error {
            changes.push(GeoStateChange::ErrorChanged {
                message: new.last_error.clone(),
            });
        }

        if old.permission != new.permission {
            changes.push(GeoStateChange::PermissionChanged {
                state: new.permission,
            });
        }

        if old.show_permission_prompt != new.show_permission_prompt {
            changes.push(GeoStateChange::PermissionPromptChanged {
                visible: new.show_permission_prompt,
            });
        }

        if old.manual_override != new.manual_override {
            changes.push(GeoStateChange::ManualOverrideChanged {
                enabled: new.manual_override,
            });
        }

        if old.is_degraded != new.is_degraded {
            changes.push(if new.is_degraded {
                GeoStateChange::ServiceDegraded {
                    consecutive_failures: new.retry.attempt_count,
                }
            } else {
                GeoStateChange::ServiceRecovered
            });
        }

        changes
    }

    // Convenience methods for common state updates

    pub fn set_permission(&self, permission: PermissionState) -> Vec<GeoStateChange> {
        self.update(|state| state.permission = permission)
    }

    pub fn set_permission_prompt(&self, visible: bool) -> Vec<GeoStateChange> {
        self.update(|state| state.show_permission_prompt = visible)
    }

    pub fn set_manual_override(&self, enabled: bool) -> Vec<GeoStateChange> {
        self.update(|state| state.manual_override = enabled)
    }

    /// Pin a user-supplied position and raise the manual override flag
    pub fn set_manual_position(&self, lat: f64, lng: f64) -> Vec<GeoStateChange> {
        self.update(|state| {
            state.position = Some(Position::manual(lat, lng));
            state.manual_override = true;
            state.last_error = None;
        })
    }

    pub fn clear_position(&self) -> Vec<GeoStateChange> {
        self.update(|state| state.clear_position())
    }

    pub fn begin_acquisition(&self) -> Vec<GeoStateChange> {
        self.update(|state| state.begin_acquisition())
    }

    /// Record a successful hardware fix and return the resulting cached position.
    ///
    /// The cached position is replaced only when nothing is cached, or when the fix moved
    /// more than `threshold_deg` on either axis. A manual position pinned by the override
    /// flag is never replaced. The last-acquired instant and retry counter are always
    /// refreshed.
    pub fn record_fix(&self, fix: Position, threshold_deg: f64) -> Position {
        let mut current = fix;
        self.update(|state| {
            let replace = match state.position {
                None => true,
                Some(_) if state.is_manual_pinned() => false,
                Some(cached) if cached.manual => true,
                Some(cached) => cached.differs_significantly(&fix, threshold_deg),
            };

            if replace {
                state.position = Some(fix);
            } else {
                tracing::debug!("Fix {} within jitter threshold, keeping cached position", fix);
            }

            current = state.position.unwrap_or(fix);
            state.last_acquired = Some(Instant::now());
            state.retry.reset();
            state.last_error = None;
            state.is_degraded = false;
            state.finish_acquisition();
            state.permission = PermissionState::Granted;
            state.show_permission_prompt = false;
        });
        current
    }

    /// Record a failed acquisition.
    ///
    /// Increments the retry counter and stores the user-facing message. Only a permission
    /// denial touches the permission status; transient failures raise the degraded flag
    /// once `degraded_after` consecutive failures have accumulated.
    pub fn record_failure(&self, error: &GeolocationError, degraded_after: u32) -> Vec<GeoStateChange> {
        self.update(|state| {
            state.retry.record_failure();
            state.last_error = Some(error.user_message().to_string());
            state.finish_acquisition();

            if *error == GeolocationError::PermissionDenied {
                state.permission = PermissionState::Denied;
                state.show_permission_prompt = false;
            } else if error.is_transient()
                && degraded_after > 0
                && state.retry.attempt_count >= degraded_after
            {
                state.is_degraded = true;
            }
        })
    }
}

impl Default for StateManager {
    fn default() -> Self {
        Self::new()
    }
}

// Make StateManager cloneable for sharing across tasks
impl Clone for StateManager {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
            state_tx: self.state_tx.clone(),
            metrics: Arc::clone(&self.metrics),
        }
    }
}
