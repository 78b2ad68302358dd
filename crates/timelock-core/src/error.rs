//! Core error types for timelock-core.
//!
//! Every concern gets its own thiserror enum; [`CoreError`] aggregates them
//! for callers that only want one error type.

use std::path::PathBuf;
use thiserror::Error;

use crate::channel::ChannelKind;

/// Core error type for timelock-core.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Notification channel errors
    #[error("Channel error: {0}")]
    Channel(#[from] ChannelError),

    /// Session collaborator errors
    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Raw failures reported by a platform backend.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PlatformError {
    /// The user or the OS refused access to the device
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// Another consumer holds the device
    #[error("Device busy: {0}")]
    Busy(String),

    /// The backend has no such facility on this host
    #[error("Not supported: {0}")]
    NotSupported(String),

    /// Any other I/O level failure
    #[error("Platform I/O failure: {0}")]
    Io(String),
}

impl From<std::io::Error> for PlatformError {
    fn from(err: std::io::Error) -> Self {
        // EBUSY
        if err.raw_os_error() == Some(16) {
            return PlatformError::Busy(err.to_string());
        }
        match err.kind() {
            std::io::ErrorKind::PermissionDenied => PlatformError::PermissionDenied(err.to_string()),
            std::io::ErrorKind::NotFound | std::io::ErrorKind::Unsupported => {
                PlatformError::NotSupported(err.to_string())
            }
            _ => PlatformError::Io(err.to_string()),
        }
    }
}

/// Errors surfaced by a notification channel's `fire`.
///
/// Re-entrant calls are not errors; see [`crate::channel::FireOutcome::Rejected`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChannelError {
    /// Probe failed or the required control surface is missing
    #[error("{channel} notifications are unavailable: {reason}")]
    CapabilityUnavailable { channel: ChannelKind, reason: String },

    /// The hardware handle request was rejected
    #[error("Failed to acquire {channel} handle: {source}")]
    AcquisitionFailure {
        channel: ChannelKind,
        #[source]
        source: PlatformError,
    },

    /// A platform call failed between phases; the effect was forced off first
    #[error("{channel} failed mid-sequence: {source}")]
    MidSequence {
        channel: ChannelKind,
        #[source]
        source: PlatformError,
    },
}

/// Session collaborator failures. Logged by the engine, never fatal.
#[derive(Error, Debug)]
pub enum SessionError {
    /// Transport-level failure talking to the remote store
    #[error("Session request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The remote store answered with a non-success status
    #[error("Session store returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    /// The base URL or a derived endpoint is malformed
    #[error("Invalid session endpoint: {0}")]
    Endpoint(#[from] url::ParseError),

    /// The create response carried no usable session id
    #[error("Session store returned no session id")]
    MissingId,

    /// The store does not know the given session id
    #[error("Unknown session: {0}")]
    UnknownSession(String),

    /// The store is unreachable (used by in-memory fakes)
    #[error("Session store unavailable")]
    Unavailable,
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to load configuration
    #[error("Failed to load configuration from {path}: {message}")]
    LoadFailed { path: PathBuf, message: String },

    /// Failed to save configuration
    #[error("Failed to save configuration to {path}: {message}")]
    SaveFailed { path: PathBuf, message: String },

    /// Unknown dot-path key
    #[error("Unknown configuration key: {0}")]
    UnknownKey(String),

    /// Invalid configuration value
    #[error("Invalid configuration value for '{key}': {message}")]
    InvalidValue { key: String, message: String },

    /// The home/config directory could not be determined or created
    #[error("Configuration directory unavailable: {0}")]
    NoDataDir(String),
}

/// Validation errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Empty collection
    #[error("Empty collection: {0}")]
    EmptyCollection(String),

    /// Invalid value
    #[error("Invalid value for '{field}': {message}")]
    InvalidValue { field: String, message: String },
}

/// Result type alias for CoreError
pub type Result<T, E = CoreError> = std::result::Result<T, E>;
