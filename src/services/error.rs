use crate::platform::{PositionError, PositionErrorCode};
use thiserror::Error;

/// Errors returned by position acquisition
///
/// `Clone` because one in-flight acquisition hands the same result to every waiter.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GeolocationError {
    #[error("Location permission denied")]
    PermissionDenied,

    #[error("Position unavailable")]
    PositionUnavailable,

    #[error("Location request timed out")]
    Timeout,

    #[error("Location hardware not supported")]
    Unsupported,

    #[error("Unknown location error: {0}")]
    Unknown(String),
}

impl GeolocationError {
    /// Message suitable for showing to the user
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::PermissionDenied => {
                "Location access was denied. Enable location permissions for this site to see nearby places."
            }
            Self::PositionUnavailable => {
                "Your location is currently unavailable. Check that location services are turned on."
            }
            Self::Timeout => "Locating your device took too long. Please try again.",
            Self::Unsupported => "Location services are not supported on this device.",
            Self::Unknown(_) => "An unknown error occurred while retrieving your location.",
        }
    }

    /// Failures caused by the hardware struggling rather than the user refusing
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::PositionUnavailable | Self::Timeout)
    }
}

impl From<PositionError> for GeolocationError {
    fn from(error: PositionError) -> Self {
        match error.code() {
            Some(PositionErrorCode::PermissionDenied) => Self::PermissionDenied,
            Some(PositionErrorCode::PositionUnavailable) => Self::PositionUnavailable,
            Some(PositionErrorCode::Timeout) => Self::Timeout,
            None => Self::Unknown(error.to_string()),
        }
    }
}

/// Errors from the platform permission query
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PlatformError {
    #[error("Permission query rejected: {0}")]
    QueryRejected(String),

    #[error("Permission name not supported: {0}")]
    UnsupportedName(String),
}

/// Errors from the location catalog collaborator
#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("Map {0} not found")]
    MapNotFound(String),

    #[error("Failed to read catalog: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse catalog: {0}")]
    Parse(#[from] serde_yaml_ng::Error),
}
