use super::state::AppState;
use crate::device::FacingMode;
use crate::error::{ErrorResponse, RoomError};
use crate::inference::ActionType;
use crate::liveness::{ActionPhase, ChallengeOutcome, FlashPhase};
use crate::media::{RecordingState, ReferenceImage, TranscriptSegment, TranscriptionState};
use crate::notify::Notification;
use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Json, Response},
};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use tracing::{error, info, warn};

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct StartedResponse {
    pub status: String,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct CameraResponse {
    pub facing: FacingMode,
}

#[derive(Debug, Serialize)]
pub struct LivenessResponse {
    pub action_phase: ActionPhase,
    pub countdown: Option<u32>,
    pub flash_phase: FlashPhase,
    pub last_action: Option<ChallengeOutcome>,
    pub last_flash: Option<ChallengeOutcome>,
}

#[derive(Debug, Deserialize)]
pub struct SpeakRequest {
    pub text: String,
}

#[derive(Debug, Serialize)]
pub struct SpeakResponse {
    pub duration_seconds: f64,
    pub sample_rate: u32,
    pub channels: u16,
}

#[derive(Debug, Serialize)]
pub struct TranscriptionResponse {
    pub state: TranscriptionState,
    pub caption: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct RecordingResponse {
    pub state: RecordingState,
    pub mime_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RecordingFormatRequest {
    pub mime_type: String,
}

impl IntoResponse for RoomError {
    fn into_response(self) -> Response {
        let status = match &self {
            RoomError::DeviceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            RoomError::Join(_) | RoomError::RemoteService { .. } => StatusCode::BAD_GATEWAY,
            RoomError::UnsupportedFormat(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            RoomError::Misuse(_) => StatusCode::CONFLICT,
            RoomError::Recorder(_) | RoomError::Playback(_) | RoomError::Export(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        if status.is_server_error() {
            error!("Request failed: {}", self);
        } else {
            warn!("Request rejected: {}", self);
        }
        (status, Json(ErrorResponse::from(&self))).into_response()
    }
}

fn bad_request(code: &str, message: String) -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorResponse {
            code: code.to_string(),
            error: message,
            status: None,
        }),
    )
        .into_response()
}

// ============================================================================
// Handlers
// ============================================================================

/// GET /room/status
pub async fn get_status(State(state): State<AppState>) -> impl IntoResponse {
    (StatusCode::OK, Json(state.room.status()))
}

/// POST /room/leave
pub async fn leave_room(State(state): State<AppState>) -> Response {
    info!("Leave requested");
    match state.room.leave().await {
        Ok(()) => (StatusCode::OK, Json(state.room.status())).into_response(),
        Err(e) => e.into_response(),
    }
}

/// POST /camera/toggle
pub async fn toggle_camera(State(state): State<AppState>) -> impl IntoResponse {
    let facing = state.room.toggle_camera().await;
    (StatusCode::OK, Json(CameraResponse { facing }))
}

/// GET /liveness
pub async fn get_liveness(State(state): State<AppState>) -> impl IntoResponse {
    let liveness = state.room.liveness();
    (
        StatusCode::OK,
        Json(LivenessResponse {
            action_phase: liveness.action().phase(),
            countdown: liveness.action().countdown(),
            flash_phase: liveness.flash().phase(),
            last_action: liveness.action().last_outcome(),
            last_flash: liveness.flash().last_outcome(),
        }),
    )
}

/// POST /liveness/action/:action_type
/// Start a gesture challenge; the verdict arrives as a notification
pub async fn start_action_liveness(
    State(state): State<AppState>,
    Path(action_type): Path<String>,
) -> Response {
    let action = match ActionType::from_str(&action_type) {
        Ok(action) => action,
        Err(e) => return bad_request("INVALID_ACTION", format!("{:#}", e)),
    };

    match state.room.start_action_liveness(action).await {
        Ok(()) => (
            StatusCode::ACCEPTED,
            Json(StartedResponse {
                status: "started".to_string(),
                message: action.prompt().to_string(),
            }),
        )
            .into_response(),
        Err(e) => e.into_response(),
    }
}

/// POST /liveness/flash
pub async fn start_flash_liveness(State(state): State<AppState>) -> Response {
    match state.room.start_flash_liveness().await {
        Ok(()) => (
            StatusCode::ACCEPTED,
            Json(StartedResponse {
                status: "started".to_string(),
                message: "Flash liveness started".to_string(),
            }),
        )
            .into_response(),
        Err(e) => e.into_response(),
    }
}

/// POST /idcard
pub async fn recognize_id_card(State(state): State<AppState>) -> Response {
    match state.room.recognize_id_card().await {
        Ok(result) => (StatusCode::OK, Json(result)).into_response(),
        Err(e) => e.into_response(),
    }
}

/// POST /face/detect
pub async fn detect_face(State(state): State<AppState>) -> Response {
    match state.room.detect_face().await {
        Ok(result) => (StatusCode::OK, Json(result)).into_response(),
        Err(e) => e.into_response(),
    }
}

/// POST /face/compare
/// Body is the raw reference image; its type comes from `Content-Type`
pub async fn compare_face(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let mime = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();

    let reference = match ReferenceImage::new(mime, body.to_vec()) {
        Ok(reference) => reference,
        Err(e) => return e.into_response(),
    };

    match state.room.compare_face(&reference).await {
        Ok(result) => (StatusCode::OK, Json(result)).into_response(),
        Err(e) => e.into_response(),
    }
}

/// POST /speech/synthesize
pub async fn synthesize_speech(
    State(state): State<AppState>,
    Json(req): Json<SpeakRequest>,
) -> Response {
    match state.room.speak(&req.text).await {
        Ok(audio) => (
            StatusCode::OK,
            Json(SpeakResponse {
                duration_seconds: audio.duration_seconds,
                sample_rate: audio.sample_rate,
                channels: audio.channels,
            }),
        )
            .into_response(),
        Err(e) => e.into_response(),
    }
}

/// POST /speech/transcription/toggle
pub async fn toggle_transcription(State(state): State<AppState>) -> Response {
    match state.room.toggle_transcription().await {
        Ok(transcription) => (
            StatusCode::OK,
            Json(TranscriptionResponse {
                state: transcription,
                caption: state.room.transcription().caption(),
            }),
        )
            .into_response(),
        Err(e) => e.into_response(),
    }
}

/// GET /speech/transcript
/// Transcript accumulated so far
pub async fn get_transcript(State(state): State<AppState>) -> impl IntoResponse {
    let transcript: Vec<TranscriptSegment> = state.room.transcript().await;
    (StatusCode::OK, Json(transcript))
}

/// POST /recording/toggle
pub async fn toggle_recording(State(state): State<AppState>) -> Response {
    let recording = state.room.recording();

    let result = if recording.is_recording() {
        state.room.stop_recording().await.map(|file| RecordingResponse {
            state: RecordingState::Idle,
            mime_type: recording.mime_type(),
            file: file.map(|path| path.display().to_string()),
        })
    } else {
        state.room.toggle_recording().await.map(|next| RecordingResponse {
            state: next,
            mime_type: recording.mime_type(),
            file: None,
        })
    };

    match result {
        Ok(response) => (StatusCode::OK, Json(response)).into_response(),
        Err(e) => e.into_response(),
    }
}

/// PUT /recording/format
pub async fn select_recording_format(
    State(state): State<AppState>,
    Json(req): Json<RecordingFormatRequest>,
) -> Response {
    match state.room.select_recording_format(&req.mime_type) {
        Ok(()) => (
            StatusCode::OK,
            Json(RecordingResponse {
                state: state.room.recording().state(),
                mime_type: state.room.recording().mime_type(),
                file: None,
            }),
        )
            .into_response(),
        Err(e) => e.into_response(),
    }
}

/// GET /notifications
pub async fn get_notifications(State(state): State<AppState>) -> impl IntoResponse {
    let notifications: Vec<Notification> = state.room.notifications().recent();
    (StatusCode::OK, Json(notifications))
}

/// GET /health
/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}
