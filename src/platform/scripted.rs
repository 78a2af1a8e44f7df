// Scripted platform implementations
//
// In-process stand-ins for the hardware and permission subsystem. The command-line front
// end drives them from configuration; the test suite drives them directly to reproduce
// platform behavior (slow fixes, denials, permission flips).

use super::{
    HardwareReading, LocationHardware, PermissionListener, PermissionQuery, PositionCallback,
    PositionError, PositionErrorCode, PositionOptions,
};
use crate::models::PermissionState;
use crate::services::PlatformError;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

type ScriptedResult = Result<HardwareReading, PositionError>;

#[derive(Debug, Default)]
struct HardwareScript {
    /// One-off answers, consumed in order
    queue: VecDeque<ScriptedResult>,
    /// Answer used once the queue is empty
    fallback: Option<ScriptedResult>,
    /// Options of every call received
    calls: Vec<PositionOptions>,
}

/// Location hardware that answers from a script.
///
/// Answers are delivered through the callback after `latency`; a zero latency answers
/// synchronously inside [`get_current_position`](LocationHardware::get_current_position).
#[derive(Debug, Default)]
pub struct ScriptedHardware {
    script: Mutex<HardwareScript>,
    latency: Duration,
}

impl ScriptedHardware {
    /// Hardware with no fix: every call fails as position-unavailable until scripted
    pub fn new() -> Self {
        Self::default()
    }

    /// Hardware that always reports the given fix
    pub fn with_fix(latitude: f64, longitude: f64, accuracy: Option<f64>) -> Self {
        let hardware = Self::new();
        hardware.set_fallback(Ok(HardwareReading {
            latitude,
            longitude,
            accuracy,
        }));
        hardware
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Queue a successful fix for the next unanswered call
    pub fn push_fix(&self, latitude: f64, longitude: f64, accuracy: Option<f64>) {
        self.lock().queue.push_back(Ok(HardwareReading {
            latitude,
            longitude,
            accuracy,
        }));
    }

    /// Queue a failure for the next unanswered call
    pub fn push_error(&self, code: PositionErrorCode) {
        self.lock().queue.push_back(Err(PositionError::from_code(code)));
    }

    pub fn set_fallback(&self, result: Result<HardwareReading, PositionError>) {
        self.lock().fallback = Some(result);
    }

    pub fn call_count(&self) -> usize {
        self.lock().calls.len()
    }

    /// Options of every call received so far, oldest first
    pub fn recorded_options(&self) -> Vec<PositionOptions> {
        self.lock().calls.clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HardwareScript> {
        // A poisoned script only means a test panicked mid-call; the data is still usable
        self.script.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl LocationHardware for ScriptedHardware {
    fn get_current_position(&self, options: &PositionOptions, callback: PositionCallback) {
        let result = {
            let mut script = self.lock();
            script.calls.push(*options);
            script
                .queue
                .pop_front()
                .or_else(|| script.fallback.clone())
                .unwrap_or_else(|| {
                    Err(PositionError::from_code(PositionErrorCode::PositionUnavailable))
                })
        };

        tracing::debug!(
            "Scripted hardware call (high_accuracy={}, timeout={:?}) -> {}",
            options.enable_high_accuracy,
            options.timeout,
            if result.is_ok() { "fix" } else { "error" }
        );

        match tokio::runtime::Handle::try_current() {
            Ok(handle) if !self.latency.is_zero() => {
                let latency = self.latency;
                handle.spawn(async move {
                    tokio::time::sleep(latency).await;
                    callback(result);
                });
            }
            _ => callback(result),
        }
    }
}

/// Permission subsystem that reports a scripted state.
///
/// [`set_state`](Self::set_state) simulates a platform permission change and notifies
/// every registered listener.
pub struct ScriptedPermission {
    state: Mutex<Result<PermissionState, PlatformError>>,
    listeners: Mutex<Vec<PermissionListener>>,
    queries: AtomicUsize,
}

impl ScriptedPermission {
    pub fn new(state: PermissionState) -> Self {
        Self {
            state: Mutex::new(Ok(state)),
            listeners: Mutex::new(Vec::new()),
            queries: AtomicUsize::new(0),
        }
    }

    /// A permission subsystem whose query always fails
    pub fn failing(error: PlatformError) -> Self {
        let permission = Self::new(PermissionState::Unknown);
        *permission.state.lock().unwrap_or_else(|e| e.into_inner()) = Err(error);
        permission
    }

    /// Change the reported state and fire change listeners
    pub fn set_state(&self, state: PermissionState) {
        *self.state.lock().unwrap_or_else(|e| e.into_inner()) = Ok(state);

        let listeners = self.listeners.lock().unwrap_or_else(|e| e.into_inner());
        tracing::debug!(
            "Scripted permission changed to {} ({} listeners)",
            state,
            listeners.len()
        );
        for listener in listeners.iter() {
            listener(state);
        }
    }

    pub fn query_count(&self) -> usize {
        self.queries.load(Ordering::Relaxed)
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

#[async_trait]
impl PermissionQuery for ScriptedPermission {
    async fn query(&self) -> Result<PermissionState, PlatformError> {
        self.queries.fetch_add(1, Ordering::Relaxed);
        self.state.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    fn on_change(&self, listener: PermissionListener) {
        self.listeners
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(listener);
    }
}
