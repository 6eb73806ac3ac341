use super::handlers;
use super::state::AppState;
use axum::{
    routing::{get, post, put},
    Router,
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Create the HTTP router with all routes
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health check
        .route("/health", get(handlers::health_check))
        // Session
        .route("/room/status", get(handlers::get_status))
        .route("/room/leave", post(handlers::leave_room))
        .route("/camera/toggle", post(handlers::toggle_camera))
        // Liveness challenges
        .route("/liveness", get(handlers::get_liveness))
        .route(
            "/liveness/action/:action_type",
            post(handlers::start_action_liveness),
        )
        .route("/liveness/flash", post(handlers::start_flash_liveness))
        // One-shot analysis
        .route("/idcard", post(handlers::recognize_id_card))
        .route("/face/detect", post(handlers::detect_face))
        .route("/face/compare", post(handlers::compare_face))
        // Speech
        .route("/speech/synthesize", post(handlers::synthesize_speech))
        .route(
            "/speech/transcription/toggle",
            post(handlers::toggle_transcription),
        )
        .route("/speech/transcript", get(handlers::get_transcript))
        // Recording
        .route("/recording/toggle", post(handlers::toggle_recording))
        .route("/recording/format", put(handlers::select_recording_format))
        .route("/notifications", get(handlers::get_notifications))
        // Add tracing middleware for request logging
        .layer(TraceLayer::new_for_http())
        // Operator consoles are served from other origins
        .layer(CorsLayer::permissive())
        .with_state(state)
}
