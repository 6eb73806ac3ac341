use serde_json::Value;
use std::sync::Arc;
use tokio::sync::mpsc;

use super::types::{
    ActionType, LivenessContext, SpeechOptions, SpeechPayload, TranscriptFragment,
};
use crate::error::RoomResult;
use crate::rtc::LocalTrack;

/// An armed liveness detector, sampling its track until committed
#[async_trait::async_trait]
pub trait LivenessDetector: Send + Sync {
    fn id(&self) -> &str;

    /// Send the collected challenge data and return the verdict
    async fn commit(&self) -> RoomResult<Value>;
}

/// A running speech-to-text analyzer
#[async_trait::async_trait]
pub trait SpeechAnalyzer: Send + Sync {
    /// Stop streaming audio; no fragments are delivered afterwards
    async fn stop(&mut self) -> RoomResult<()>;
}

/// Analyzer handle plus the fragments it produces
pub struct SpeechStream {
    pub analyzer: Box<dyn SpeechAnalyzer>,
    pub transcripts: mpsc::Receiver<TranscriptFragment>,
}

/// Remote AI inference service
///
/// All structured results are passed through as JSON; the room reports them
/// to the operator without interpreting them.
#[async_trait::async_trait]
pub trait InferenceService: Send + Sync {
    async fn detect_id_card(&self, camera: &LocalTrack) -> RoomResult<Value>;

    async fn detect_face(&self, camera: &LocalTrack) -> RoomResult<Value>;

    /// Compare the live face against a `data:` URL encoded reference image
    async fn compare_face(&self, camera: &LocalTrack, reference_image: &str) -> RoomResult<Value>;

    async fn start_action_liveness(
        &self,
        context: &LivenessContext,
        camera: &LocalTrack,
        actions: &[ActionType],
    ) -> RoomResult<Arc<dyn LivenessDetector>>;

    async fn start_flash_liveness(&self, camera: &LocalTrack)
        -> RoomResult<Arc<dyn LivenessDetector>>;

    async fn text_to_speech(&self, text: &str) -> RoomResult<SpeechPayload>;

    async fn start_speech_to_text(
        &self,
        microphone: &LocalTrack,
        options: &SpeechOptions,
    ) -> RoomResult<SpeechStream>;
}
