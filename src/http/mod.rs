//! HTTP API for operating the room
//!
//! - GET /room/status - Session, tracks, challenge phases, caption, recording
//! - POST /room/leave - Leave the session
//! - POST /camera/toggle - Switch front/rear camera
//! - GET /liveness - Challenge phases and last verdicts
//! - POST /liveness/action/:action_type - Start a gesture challenge
//! - POST /liveness/flash - Start a light-response challenge
//! - POST /idcard, /face/detect, /face/compare - One-shot analysis
//! - POST /speech/synthesize - Text to speech
//! - POST /speech/transcription/toggle, GET /speech/transcript - Speech to text
//! - POST /recording/toggle, PUT /recording/format - Recording
//! - GET /notifications - Recent operator notifications
//! - GET /health - Health check

mod handlers;
mod routes;
mod state;

pub use routes::create_router;
pub use state::AppState;
