use serde::Serialize;

use crate::device::FacingMode;
use crate::liveness::{ActionPhase, FlashPhase};
use crate::media::{RecordingState, TranscriptionState};
use crate::rtc::{SessionHandle, SessionState, TrackSummary};

/// Point-in-time view of the whole room
#[derive(Debug, Clone, Serialize)]
pub struct RoomStatus {
    pub session: SessionState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub handle: Option<SessionHandle>,
    pub facing: FacingMode,
    pub local_tracks: Vec<TrackSummary>,
    pub remote_tracks: Vec<TrackSummary>,
    pub action_phase: ActionPhase,
    pub countdown: Option<u32>,
    pub flash_phase: FlashPhase,
    pub transcription: TranscriptionState,
    pub caption: Option<String>,
    pub recording: RecordingState,
    pub recording_mime_type: String,
}
