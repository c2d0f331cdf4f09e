//! Error catalog and crate error types.
//!
//! Two families of errors live here:
//!
//! - [`LocationError`] - the fixed catalog of failure conditions delivered to
//!   callers over a reply channel. Codes and messages are stable across
//!   versions; hosts match on the numeric code.
//! - [`BridgeError`] / [`ConfigError`] - ordinary Rust errors for the plugin
//!   boundary, the daemon handle and configuration loading.

use std::fmt;

use serde::Serialize;
use thiserror::Error;

/// Catalog of location failure conditions.
///
/// Codes `1` and `2` are the legacy position-error codes hosts already
/// understand; `100..=107` are the bridge's own conditions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LocationError {
    PermissionDenied,
    PositionUnavailable,
    LocationPermissionDenied,
    GoogleServicesErrorResolvable,
    GoogleServicesError,
    SerializationError,
    WatchIdNotFound,
    LocationSettingsErrorResolvable,
    LocationSettingsError,
    LocationNull,
}

impl LocationError {
    /// Every catalog entry, in code order.
    pub const ALL: [LocationError; 10] = [
        LocationError::PermissionDenied,
        LocationError::PositionUnavailable,
        LocationError::LocationPermissionDenied,
        LocationError::GoogleServicesErrorResolvable,
        LocationError::GoogleServicesError,
        LocationError::SerializationError,
        LocationError::WatchIdNotFound,
        LocationError::LocationSettingsErrorResolvable,
        LocationError::LocationSettingsError,
        LocationError::LocationNull,
    ];

    /// Stable numeric code.
    pub fn code(&self) -> i32 {
        match self {
            LocationError::PermissionDenied => 1,
            LocationError::PositionUnavailable => 2,
            LocationError::LocationPermissionDenied => 100,
            LocationError::GoogleServicesErrorResolvable => 101,
            LocationError::GoogleServicesError => 102,
            LocationError::SerializationError => 103,
            LocationError::WatchIdNotFound => 104,
            LocationError::LocationSettingsErrorResolvable => 105,
            LocationError::LocationSettingsError => 106,
            LocationError::LocationNull => 107,
        }
    }

    /// Human-readable message.
    pub fn message(&self) -> &'static str {
        match self {
            LocationError::PermissionDenied => "Permission denied",
            LocationError::PositionUnavailable => "Position unavailable",
            LocationError::LocationPermissionDenied => "Location permission request denied",
            LocationError::GoogleServicesErrorResolvable => {
                "Google Play Services error user resolvable"
            }
            LocationError::GoogleServicesError => "Google Play Services error",
            LocationError::SerializationError => "Location result serialization error",
            LocationError::WatchIdNotFound => "Watch id not found",
            LocationError::LocationSettingsErrorResolvable => {
                "Current location settings can not satisfy this request"
            }
            LocationError::LocationSettingsError => "Location settings error",
            LocationError::LocationNull => "Could not retrieve location",
        }
    }

    /// Look up a catalog entry by its code.
    pub fn from_code(code: i32) -> Option<Self> {
        Self::ALL.into_iter().find(|e| e.code() == code)
    }

    /// Build the immutable condition delivered to callers.
    pub fn condition(&self) -> ErrorCondition {
        ErrorCondition {
            code: self.code(),
            message: self.message().to_string(),
        }
    }
}

impl fmt::Display for LocationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.message(), self.code())
    }
}

/// Wire-level `{ code, message }` pair.
///
/// Only constructed through [`LocationError::condition`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorCondition {
    code: i32,
    message: String,
}

impl ErrorCondition {
    pub fn code(&self) -> i32 {
        self.code
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<LocationError> for ErrorCondition {
    fn from(error: LocationError) -> Self {
        error.condition()
    }
}

/// Errors raised at the plugin boundary and by the daemon handle.
#[derive(Debug, Error)]
pub enum BridgeError {
    /// The host sent an action this plugin does not handle.
    #[error("Unknown action: {0}")]
    UnknownAction(String),

    /// Arguments for a known action were missing or of the wrong type.
    #[error("Invalid arguments for {action}: {reason}")]
    InvalidArguments { action: String, reason: String },

    /// The daemon is no longer receiving host messages.
    #[error("Location daemon has stopped")]
    DaemonStopped,
}

/// Errors that can occur while loading [`crate::config::BridgeConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read config file
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] ini::Error),

    /// Invalid configuration value
    #[error("Invalid configuration: {section}.{key} = '{value}' - {reason}")]
    InvalidValue {
        section: String,
        key: String,
        value: String,
        reason: String,
    },
}
