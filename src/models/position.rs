use serde::{Deserialize, Serialize};
use std::fmt;

/// The device's current best-known position.
///
/// Produced by hardware acquisition or by an explicit manual override. Exactly one
/// current `Position` lives in [`GeoState`](crate::models::GeoState).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub lat: f64,
    pub lng: f64,
    /// Accuracy radius in meters, never negative
    pub accuracy: Option<f64>,
    /// True when the position was supplied by the user rather than the hardware
    pub manual: bool,
}

impl Position {
    /// Build a hardware-sourced position.
    ///
    /// Negative or non-finite accuracy values are dropped rather than stored.
    pub fn from_hardware(lat: f64, lng: f64, accuracy: Option<f64>) -> Self {
        Self {
            lat,
            lng,
            accuracy: accuracy.filter(|a| a.is_finite() && *a >= 0.0),
            manual: false,
        }
    }

    /// Build a user-sourced position
    pub fn manual(lat: f64, lng: f64) -> Self {
        Self {
            lat,
            lng,
            accuracy: None,
            manual: true,
        }
    }

    /// Check whether `other` moved more than `threshold` degrees on either axis.
    pub fn differs_significantly(&self, other: &Position, threshold: f64) -> bool {
        (self.lat - other.lat).abs() > threshold || (self.lng - other.lng).abs() > threshold
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.6}, {:.6})", self.lat, self.lng)?;
        if let Some(accuracy) = self.accuracy {
            write!(f, " ±{:.0}m", accuracy)?;
        }
        if self.manual {
            write!(f, " [manual]")?;
        }
        Ok(())
    }
}

/// Permission status of the location capability
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PermissionState {
    Granted,
    Denied,
    Prompt,
    #[default]
    Unknown,
}

impl fmt::Display for PermissionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Granted => "granted",
            Self::Denied => "denied",
            Self::Prompt => "prompt",
            Self::Unknown => "unknown",
        };
        f.write_str(name)
    }
}

/// Process-wide count of consecutive acquisition failures.
///
/// Selects which retry ladder entry the next acquisition uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RetryState {
    pub attempt_count: u32,
}

impl RetryState {
    pub fn record_failure(&mut self) {
        self.attempt_count = self.attempt_count.saturating_add(1);
    }

    pub fn reset(&mut self) {
        self.attempt_count = 0;
    }
}
