//! Position acquisition with caching, request deduplication and a retry ladder.
//!
//! [`PositionService::acquire`] is the single entry point background refresh and
//! consumers go through:
//!
//! ```text
//! caller A ─┐                         ┌──────────────────────┐
//! caller B ─┼──► cached? ──no──► pending slot ──► hardware call (ladder step N)
//! caller C ─┘      │yes               │ (one Shared future)       │
//!                  ▼                  ▼                           ▼
//!           cached Position     all callers await it      StateManager::record_fix /
//!                                                          record_failure, slot cleared
//! ```
//!
//! Every acquisition is also driven by a task on the runtime, so the slot and the
//! in-progress flag are cleared even when all callers time out or are cancelled.
//!
//! The ladder step is chosen from the shared retry counter, so every consecutive failure
//! relaxes accuracy, timeout and acceptable cache age until a fix arrives.

use crate::metrics::Metrics;
use crate::models::{AcquisitionSettings, Position};
use crate::platform::{self, HardwareReading, LocationHardware, PositionError, PositionOptions};
use crate::services::GeolocationError;
use crate::state::StateManager;
use futures::FutureExt;
use futures::future::{self, BoxFuture, Shared};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

type PendingAcquisition = Shared<BoxFuture<'static, Result<Position, GeolocationError>>>;

/// Per-call overrides of the retry ladder's hardware options
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AcquireOptions {
    pub enable_high_accuracy: Option<bool>,
    pub timeout: Option<Duration>,
    pub maximum_age: Option<Duration>,
}

impl AcquireOptions {
    fn apply(&self, base: PositionOptions) -> PositionOptions {
        PositionOptions {
            enable_high_accuracy: self.enable_high_accuracy.unwrap_or(base.enable_high_accuracy),
            timeout: self.timeout.unwrap_or(base.timeout),
            maximum_age: self.maximum_age.unwrap_or(base.maximum_age),
        }
    }
}

struct Inner {
    hardware: Option<Arc<dyn LocationHardware>>,
    state: StateManager,
    settings: AcquisitionSettings,
    metrics: Arc<Metrics>,

    /// The in-flight acquisition, if any. Set before the hardware is called and cleared
    /// by the acquisition itself once it settles.
    pending: Mutex<Option<PendingAcquisition>>,
}

/// Service wrapping the hardware position call.
///
/// Cheap to clone; clones share the pending slot, so deduplication holds across every
/// component that holds one.
#[derive(Clone)]
pub struct PositionService {
    inner: Arc<Inner>,
}

impl PositionService {
    /// Create the service.
    ///
    /// `hardware` is `None` on hosts without location hardware; every acquisition then
    /// fails with [`GeolocationError::Unsupported`].
    pub fn new(
        hardware: Option<Arc<dyn LocationHardware>>,
        state: StateManager,
        settings: AcquisitionSettings,
    ) -> Self {
        let metrics = Arc::clone(state.metrics());
        Self {
            inner: Arc::new(Inner {
                hardware,
                state,
                settings,
                metrics,
                pending: Mutex::new(None),
            }),
        }
    }

    pub fn state(&self) -> &StateManager {
        &self.inner.state
    }

    pub fn has_hardware(&self) -> bool {
        self.inner.hardware.is_some()
    }

    /// True while an acquisition is in flight
    pub fn is_pending(&self) -> bool {
        self.lock_pending().is_some()
    }

    /// Get the device position.
    ///
    /// Without `force_refresh` a cached position is returned immediately. Otherwise the
    /// caller joins the in-flight acquisition if there is one, or starts a new one.
    pub async fn acquire(
        &self,
        force_refresh: bool,
        options: AcquireOptions,
    ) -> Result<Position, GeolocationError> {
        if !force_refresh {
            if let Some(position) = self.inner.state.read(|s| s.position) {
                self.inner.metrics.record_cache_hit();
                tracing::debug!("Returning cached position {}", position);
                return Ok(position);
            }
        }

        if !self.has_hardware() {
            self.record_unsupported();
            return Err(GeolocationError::Unsupported);
        }

        let pending = self.pending_or_start(options);
        pending.await
    }

    /// Issue a hardware call immediately, bypassing the cache and deduplication.
    ///
    /// The hardware is called before this method returns, so a caller running inside a
    /// user-gesture handler gets the platform permission dialog. The returned future only
    /// waits for the answer. Uses the first ladder step and updates the shared state like
    /// any other acquisition.
    pub fn request_direct(&self) -> BoxFuture<'static, Result<Position, GeolocationError>> {
        let Some(hardware) = self.inner.hardware.clone() else {
            self.record_unsupported();
            return future::ready(Err(GeolocationError::Unsupported)).boxed();
        };

        let options = PositionOptions::from(self.inner.settings.ladder_step(0));
        tracing::info!("Direct location request (high_accuracy={})", options.enable_high_accuracy);

        self.inner.state.begin_acquisition();
        self.inner.metrics.record_hardware_call();
        let started = Instant::now();
        let request = platform::request_position(hardware.as_ref(), &options);

        let service = self.clone();
        let settled = async move {
            let result = request.await;
            service.settle(result, started.elapsed())
        }
        .boxed()
        .shared();
        drive(settled.clone());
        settled.boxed()
    }

    fn pending_or_start(&self, options: AcquireOptions) -> PendingAcquisition {
        let mut slot = self.lock_pending();

        if let Some(pending) = slot.as_ref() {
            self.inner.metrics.record_deduplicated();
            tracing::debug!("Joining in-flight acquisition");
            return pending.clone();
        }

        let service = self.clone();
        let pending = async move { service.run_acquisition(options).await }
            .boxed()
            .shared();
        *slot = Some(pending.clone());
        drive(pending.clone());
        pending
    }

    async fn run_acquisition(&self, overrides: AcquireOptions) -> Result<Position, GeolocationError> {
        let attempt = self.inner.state.read(|s| s.retry.attempt_count);
        let options = overrides.apply(self.inner.settings.ladder_step(attempt).into());

        let result = match self.inner.hardware.as_ref() {
            Some(hardware) => {
                tracing::debug!(
                    "Acquiring position: attempt={}, high_accuracy={}, timeout={:?}, maximum_age={:?}",
                    attempt,
                    options.enable_high_accuracy,
                    options.timeout,
                    options.maximum_age
                );
                self.inner.state.begin_acquisition();
                self.inner.metrics.record_hardware_call();
                let started = Instant::now();
                let reading = platform::request_position(hardware.as_ref(), &options).await;
                self.settle(reading, started.elapsed())
            }
            None => Err(GeolocationError::Unsupported),
        };

        *self.lock_pending() = None;
        result
    }

    /// Fold one hardware answer into the shared state
    fn settle(
        &self,
        result: Result<HardwareReading, PositionError>,
        elapsed: Duration,
    ) -> Result<Position, GeolocationError> {
        self.inner.metrics.record_acquisition(result.is_ok(), elapsed);

        match result {
            Ok(reading) => {
                let fix = Position::from_hardware(reading.latitude, reading.longitude, reading.accuracy);
                let current = self
                    .inner
                    .state
                    .record_fix(fix, self.inner.settings.significance_threshold_deg);
                tracing::info!("Position acquired in {:.2}s: {}", elapsed.as_secs_f32(), current);
                Ok(current)
            }
            Err(raw) => {
                let error = GeolocationError::from(raw);
                self.inner
                    .state
                    .record_failure(&error, self.inner.settings.degraded_after_failures);
                let attempts = self.inner.state.read(|s| s.retry.attempt_count);
                tracing::warn!(
                    "Position acquisition failed after {:.2}s ({} consecutive failures): {}",
                    elapsed.as_secs_f32(),
                    attempts,
                    error
                );
                Err(error)
            }
        }
    }

    fn record_unsupported(&self) {
        tracing::warn!("No location hardware available");
        self.inner.state.update(|state| {
            state.last_error = Some(GeolocationError::Unsupported.user_message().to_string());
        });
    }

    fn lock_pending(&self) -> std::sync::MutexGuard<'_, Option<PendingAcquisition>> {
        self.inner.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Poll an acquisition to completion on the runtime, so it settles and clears its
/// bookkeeping even after every caller has stopped waiting for it.
fn drive(acquisition: PendingAcquisition) {
    match tokio::runtime::Handle::try_current() {
        Ok(runtime) => {
            runtime.spawn(acquisition);
        }
        Err(_) => tracing::warn!("No tokio runtime; acquisition settles only while awaited"),
    }
}
