//! Error types surfaced by the room controller
//!
//! Every failure in the room is recoverable: components catch errors at the
//! asynchronous boundary, report them through the notification center and
//! return to an idle state.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::rtc::TrackRole;

/// Room-wide error type
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RoomError {
    /// A required local track has not been captured or was released
    #[error("{0} track is not available")]
    DeviceUnavailable(TrackRole),

    /// Joining the transport session failed
    #[error("failed to join room: {0}")]
    Join(String),

    /// The remote inference service rejected or failed a request
    #[error("{}", describe_remote(.status, .message))]
    RemoteService {
        status: Option<u16>,
        message: String,
    },

    /// The recorder does not accept the requested container/codec
    #[error("mimeType: {0} not supported")]
    UnsupportedFormat(String),

    /// Operation invoked in a state that does not allow it
    #[error("invalid operation: {0}")]
    Misuse(String),

    /// The media recorder failed to start or finalize
    #[error("recorder error: {0}")]
    Recorder(String),

    /// Synthesized audio could not be decoded or played
    #[error("playback failed: {0}")]
    Playback(String),

    /// A finished recording could not be written out
    #[error("export failed: {0}")]
    Export(String),
}

fn describe_remote(status: &Option<u16>, message: &str) -> String {
    match status {
        Some(status) => format!("request failed, http status: {status} ({message})"),
        None => format!("request failed: {message}"),
    }
}

impl RoomError {
    pub fn remote(status: Option<u16>, message: impl Into<String>) -> Self {
        Self::RemoteService {
            status,
            message: message.into(),
        }
    }

    /// Stable machine-readable code
    pub fn code(&self) -> &'static str {
        match self {
            RoomError::DeviceUnavailable(_) => "DEVICE_UNAVAILABLE",
            RoomError::Join(_) => "JOIN_ERROR",
            RoomError::RemoteService { .. } => "REMOTE_SERVICE_ERROR",
            RoomError::UnsupportedFormat(_) => "UNSUPPORTED_FORMAT",
            RoomError::Misuse(_) => "MISUSE",
            RoomError::Recorder(_) => "RECORDER_ERROR",
            RoomError::Playback(_) => "PLAYBACK_ERROR",
            RoomError::Export(_) => "EXPORT_ERROR",
        }
    }

    /// HTTP-like status reported by the remote service, if any
    pub fn remote_status(&self) -> Option<u16> {
        match self {
            RoomError::RemoteService { status, .. } => *status,
            _ => None,
        }
    }
}

/// Error payload for API consumers
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub code: String,
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
}

impl From<&RoomError> for ErrorResponse {
    fn from(error: &RoomError) -> Self {
        ErrorResponse {
            code: error.code().to_string(),
            error: error.to_string(),
            status: error.remote_status(),
        }
    }
}

/// Result type alias using RoomError
pub type RoomResult<T> = Result<T, RoomError>;
