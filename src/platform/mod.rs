//! Platform boundary - location hardware and permission subsystem.
//!
//! The platform exposes two callback-driven capabilities:
//!
//! - [`LocationHardware`]: a one-shot "get current position" call that reports through a
//!   callback, parameterized by accuracy/timeout/max-age options
//! - [`PermissionQuery`]: the permission status of the location capability, plus change
//!   notifications
//!
//! [`request_position`] adapts the hardware callback into a single-resolution future.
//! [`PlatformFamily`] classifies the host from its user agent so that platform quirks can
//! be handled by the permission tracker.
//!
//! [`scripted`] contains in-process implementations driven by configuration or by tests.

pub mod scripted;

use crate::models::{PermissionState, PlatformSettings};
use crate::services::PlatformError;
use async_trait::async_trait;
use regex::Regex;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, LazyLock};
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::sync::oneshot;

pub use scripted::{ScriptedHardware, ScriptedPermission};

/// Options passed to the hardware position call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PositionOptions {
    pub enable_high_accuracy: bool,
    /// How long the hardware may take before failing with a timeout
    pub timeout: Duration,
    /// Oldest cached fix the hardware may return instead of taking a new one
    pub maximum_age: Duration,
}

impl From<crate::models::LadderStep> for PositionOptions {
    fn from(step: crate::models::LadderStep) -> Self {
        Self {
            enable_high_accuracy: step.high_accuracy,
            timeout: step.timeout(),
            maximum_age: step.maximum_age(),
        }
    }
}

/// A raw fix reported by the hardware
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HardwareReading {
    pub latitude: f64,
    pub longitude: f64,
    pub accuracy: Option<f64>,
}

/// Error codes defined by the hardware position API
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum PositionErrorCode {
    PermissionDenied = 1,
    PositionUnavailable = 2,
    Timeout = 3,
}

/// Failure reported through the hardware error callback
///
/// The code is kept raw because platforms occasionally report codes outside the
/// documented set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PositionError {
    code: u16,
    message: String,
}

impl PositionError {
    pub fn new(code: u16, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn from_code(code: PositionErrorCode) -> Self {
        let message = match code {
            PositionErrorCode::PermissionDenied => "User denied Geolocation",
            PositionErrorCode::PositionUnavailable => "Position unavailable",
            PositionErrorCode::Timeout => "Timeout expired",
        };
        Self::new(code as u16, message)
    }

    pub fn raw_code(&self) -> u16 {
        self.code
    }

    /// The documented code, if the raw code is one of them
    pub fn code(&self) -> Option<PositionErrorCode> {
        match self.code {
            1 => Some(PositionErrorCode::PermissionDenied),
            2 => Some(PositionErrorCode::PositionUnavailable),
            3 => Some(PositionErrorCode::Timeout),
            _ => None,
        }
    }
}

impl fmt::Display for PositionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "code {}: {}", self.code, self.message)
    }
}

/// Completion callback handed to the hardware; invoked at most once
pub type PositionCallback =
    Box<dyn FnOnce(Result<HardwareReading, PositionError>) + Send + 'static>;

/// The platform's location hardware
pub trait LocationHardware: Send + Sync {
    /// Start a position request. The hardware calls `callback` exactly once, possibly
    /// before this method returns.
    fn get_current_position(&self, options: &PositionOptions, callback: PositionCallback);
}

/// Listener invoked whenever the platform reports a permission change
pub type PermissionListener = Box<dyn Fn(PermissionState) + Send + Sync + 'static>;

/// The platform's permission subsystem, scoped to the location capability
#[async_trait]
pub trait PermissionQuery: Send + Sync {
    async fn query(&self) -> Result<PermissionState, PlatformError>;

    fn on_change(&self, listener: PermissionListener);
}

/// Future resolving with the result of one hardware position call.
///
/// Created by [`request_position`]. If the hardware drops the callback without invoking
/// it, the request resolves as position-unavailable.
#[derive(Debug)]
pub struct PositionRequest {
    rx: oneshot::Receiver<Result<HardwareReading, PositionError>>,
}

impl Future for PositionRequest {
    type Output = Result<HardwareReading, PositionError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx).poll(cx).map(|received| {
            received.unwrap_or_else(|_| {
                Err(PositionError::new(
                    PositionErrorCode::PositionUnavailable as u16,
                    "hardware dropped the request without answering",
                ))
            })
        })
    }
}

/// Issue a hardware position call and adapt its callback into a future.
///
/// The hardware call happens synchronously, before this function returns; only the
/// wait for the answer is deferred to the returned future.
pub fn request_position(
    hardware: &dyn LocationHardware,
    options: &PositionOptions,
) -> PositionRequest {
    let (tx, rx) = oneshot::channel();
    hardware.get_current_position(
        options,
        Box::new(move |result| {
            // The receiver may be gone if every waiter gave up; nothing to do then
            let _ = tx.send(result);
        }),
    );
    PositionRequest { rx }
}

static IOS_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(iPhone|iPad|iPod)\b").expect("Invalid iOS regex"));

static ANDROID_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bAndroid\b").expect("Invalid Android regex"));

static DESKTOP_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(Windows NT|Macintosh|X11|Linux x86_64|CrOS)\b")
        .expect("Invalid desktop regex")
});

/// Host platform family, as far as the user agent reveals it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlatformFamily {
    Ios,
    Android,
    Desktop,
    Unknown,
}

impl PlatformFamily {
    pub fn from_user_agent(user_agent: &str) -> Self {
        if IOS_PATTERN.is_match(user_agent) {
            Self::Ios
        } else if ANDROID_PATTERN.is_match(user_agent) {
            Self::Android
        } else if DESKTOP_PATTERN.is_match(user_agent) {
            Self::Desktop
        } else {
            Self::Unknown
        }
    }

    /// Whether the permission API on this family may report `prompt` after the user
    /// already denied access, when queried outside a user gesture.
    pub fn misreports_revoked_permission(&self) -> bool {
        matches!(self, Self::Ios)
    }
}

/// The platform capabilities a geolocation service is built on.
///
/// Either capability may be missing; the services degrade to `Unsupported` / `Unknown`.
#[derive(Clone)]
pub struct Platform {
    pub hardware: Option<Arc<dyn LocationHardware>>,
    pub permissions: Option<Arc<dyn PermissionQuery>>,
    pub family: PlatformFamily,
}

impl Platform {
    /// A host with neither location hardware nor a permission API
    pub fn unsupported() -> Self {
        Self {
            hardware: None,
            permissions: None,
            family: PlatformFamily::Unknown,
        }
    }

    /// Scripted platform described by configuration.
    ///
    /// The hardware always answers with the configured fix, or fails as unavailable when
    /// none is set.
    pub fn scripted(settings: &PlatformSettings) -> Self {
        let hardware = match settings.simulated_fix {
            Some(fix) => ScriptedHardware::with_fix(fix.lat, fix.lng, fix.accuracy),
            None => ScriptedHardware::new(),
        };

        Self {
            hardware: Some(Arc::new(hardware)),
            permissions: Some(Arc::new(ScriptedPermission::new(settings.reported_permission))),
            family: PlatformFamily::from_user_agent(&settings.user_agent),
        }
    }
}
