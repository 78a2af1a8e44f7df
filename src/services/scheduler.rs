use crate::models::Position;
use crate::services::{AcquireOptions, GeolocationError, PositionService};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

/// What a single scheduler tick did
#[derive(Debug, Clone, PartialEq)]
pub enum TickOutcome {
    /// The manual override flag was set; nothing was acquired
    Skipped,
    Acquired(Position),
    Failed(GeolocationError),
}

/// Continuous background refresh of the device position.
///
/// Every `interval` the scheduler forces a fresh acquisition, unless the manual override
/// flag is set, in which case the tick does nothing and the user's position stays put.
/// Failures are not retried here; the retry ladder in [`PositionService`] already relaxes
/// the next tick's options.
pub struct UpdateScheduler {
    positions: PositionService,
    interval: Duration,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl UpdateScheduler {
    pub fn new(positions: PositionService, interval: Duration) -> Self {
        Self {
            positions,
            interval,
            handle: Mutex::new(None),
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Start the timer. The first tick fires one interval from now.
    ///
    /// Returns false if the scheduler was already running or no tokio runtime is
    /// available.
    pub fn start(&self) -> bool {
        let mut handle = self.handle.lock().unwrap_or_else(PoisonError::into_inner);

        if handle.as_ref().is_some_and(|h| !h.is_finished()) {
            tracing::debug!("Update scheduler already running");
            return false;
        }

        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            tracing::warn!("Cannot start update scheduler outside a tokio runtime");
            return false;
        };

        let positions = self.positions.clone();
        let period = self.interval;
        *handle = Some(runtime.spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                ticker.tick().await;
                Self::run_tick(&positions).await;
            }
        }));

        tracing::info!("Update scheduler started (every {:?})", period);
        true
    }

    /// Stop the timer. An acquisition already in flight still settles.
    pub fn stop(&self) -> bool {
        let handle = self
            .handle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();

        match handle {
            Some(handle) => {
                handle.abort();
                tracing::info!("Update scheduler stopped");
                true
            }
            None => false,
        }
    }

    pub fn is_running(&self) -> bool {
        self.handle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(|h| !h.is_finished())
    }

    /// Run one tick immediately, outside the timer
    pub async fn tick(&self) -> TickOutcome {
        Self::run_tick(&self.positions).await
    }

    async fn run_tick(positions: &PositionService) -> TickOutcome {
        let metrics = positions.state().metrics();

        if positions.state().read(|s| s.manual_override) {
            metrics.record_scheduler_tick(true);
            tracing::debug!("Manual override active, skipping scheduled refresh");
            return TickOutcome::Skipped;
        }

        metrics.record_scheduler_tick(false);
        match positions.acquire(true, AcquireOptions::default()).await {
            Ok(position) => TickOutcome::Acquired(position),
            Err(e) => TickOutcome::Failed(e),
        }
    }
}

impl Drop for UpdateScheduler {
    fn drop(&mut self) {
        if let Some(handle) = self
            .handle
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            handle.abort();
        }
    }
}
