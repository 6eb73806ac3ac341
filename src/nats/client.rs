use anyhow::{Context, Result};
use async_nats::Client;
use base64::Engine;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use super::detector::NatsLivenessDetector;
use super::messages::{ImageRequest, ServiceReply, SpeechSynthesisRequest};
use super::speech::NatsSpeechAnalyzer;
use crate::error::{RoomError, RoomResult};
use crate::inference::{
    ActionType, InferenceService, LivenessContext, LivenessDetector, SpeechOptions,
    SpeechPayload, SpeechStream,
};
use crate::rtc::{LocalTrack, MediaSample};

pub(crate) const SUBJECT_ID_CARD: &str = "ai.idcard.detect";
pub(crate) const SUBJECT_FACE_DETECT: &str = "ai.face.detect";
pub(crate) const SUBJECT_FACE_COMPARE: &str = "ai.face.compare";
pub(crate) const SUBJECT_ACTION_COMMIT: &str = "ai.liveness.action.commit";
pub(crate) const SUBJECT_FLASH_COMMIT: &str = "ai.liveness.flash.commit";
pub(crate) const SUBJECT_TTS: &str = "ai.tts";

/// Tuning for the NATS inference client
#[derive(Debug, Clone)]
pub struct NatsSettings {
    /// Upper bound for a single request/reply round trip
    pub request_timeout: Duration,
    /// How often armed detectors and speech streams sample their track
    pub sample_interval: Duration,
    /// Frames kept per liveness detector (oldest dropped first)
    pub max_frames: usize,
}

impl Default for NatsSettings {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(15),
            sample_interval: Duration::from_millis(200),
            max_frames: 50,
        }
    }
}

/// Inference service speaking JSON request/reply over NATS
#[derive(Clone)]
pub struct NatsInference {
    client: Client,
    session_id: String,
    settings: Arc<NatsSettings>,
}

impl NatsInference {
    /// Connect to NATS server
    pub async fn connect(url: &str, session_id: String, settings: NatsSettings) -> Result<Self> {
        info!("Connecting to NATS at {}", url);

        let client = async_nats::connect(url)
            .await
            .context("Failed to connect to NATS")?;

        info!("Connected to NATS successfully");

        Ok(Self {
            client,
            session_id,
            settings: Arc::new(settings),
        })
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub(crate) fn settings(&self) -> &NatsSettings {
        &self.settings
    }

    pub(crate) fn client(&self) -> &Client {
        &self.client
    }

    /// Send one request and unwrap the reply envelope
    pub(crate) async fn request<T: Serialize>(&self, subject: &str, message: &T) -> RoomResult<Value> {
        let payload = serde_json::to_vec(message)
            .map_err(|e| RoomError::remote(None, format!("failed to encode request: {}", e)))?;

        debug!("Request on {} ({} bytes)", subject, payload.len());

        let reply = tokio::time::timeout(
            self.settings.request_timeout,
            self.client.request(subject.to_string(), payload.into()),
        )
        .await
        .map_err(|_| RoomError::remote(None, format!("{} timed out", subject)))?
        .map_err(|e| RoomError::remote(None, format!("{} failed: {}", subject, e)))?;

        let reply: ServiceReply = serde_json::from_slice(&reply.payload)
            .map_err(|e| RoomError::remote(None, format!("malformed reply on {}: {}", subject, e)))?;

        reply.into_result()
    }

    /// Publish a fire-and-forget message
    pub(crate) async fn publish<T: Serialize>(&self, subject: String, message: &T) -> Result<()> {
        let payload = serde_json::to_vec(message)?;
        self.client
            .publish(subject, payload.into())
            .await
            .context("Failed to publish message")?;
        Ok(())
    }

    async fn analyze_frame(
        &self,
        subject: &str,
        camera: &LocalTrack,
        reference: Option<String>,
    ) -> RoomResult<Value> {
        let request = ImageRequest {
            session_id: self.session_id.clone(),
            image: grab_frame(camera)?,
            reference,
        };
        self.request(subject, &request).await
    }

    /// Close NATS connection
    pub async fn close(self) -> Result<()> {
        info!("Closing NATS connection");
        self.client
            .flush()
            .await
            .context("Failed to flush NATS connection")?;
        Ok(())
    }
}

/// Grab the current camera frame as a `data:` URL
pub(crate) fn grab_frame(camera: &LocalTrack) -> RoomResult<String> {
    let sample = camera
        .grab()
        .map_err(|_| RoomError::DeviceUnavailable(camera.role()))?;
    sample_to_data_url(&sample)
}

pub fn sample_to_data_url(sample: &MediaSample) -> RoomResult<String> {
    match sample {
        MediaSample::Image { mime, data } => Ok(format!(
            "data:{};base64,{}",
            mime,
            base64::engine::general_purpose::STANDARD.encode(data)
        )),
        MediaSample::Audio { .. } => Err(RoomError::Misuse(
            "expected a video frame, got audio".to_string(),
        )),
    }
}

#[async_trait::async_trait]
impl InferenceService for NatsInference {
    async fn detect_id_card(&self, camera: &LocalTrack) -> RoomResult<Value> {
        self.analyze_frame(SUBJECT_ID_CARD, camera, None).await
    }

    async fn detect_face(&self, camera: &LocalTrack) -> RoomResult<Value> {
        self.analyze_frame(SUBJECT_FACE_DETECT, camera, None).await
    }

    async fn compare_face(&self, camera: &LocalTrack, reference_image: &str) -> RoomResult<Value> {
        self.analyze_frame(SUBJECT_FACE_COMPARE, camera, Some(reference_image.to_string()))
            .await
    }

    async fn start_action_liveness(
        &self,
        context: &LivenessContext,
        camera: &LocalTrack,
        actions: &[ActionType],
    ) -> RoomResult<Arc<dyn LivenessDetector>> {
        // Fail now rather than at commit if the camera cannot be sampled
        grab_frame(camera)?;

        let session_id = context
            .session_id
            .clone()
            .unwrap_or_else(|| self.session_id.clone());

        Ok(Arc::new(NatsLivenessDetector::arm(
            self.clone(),
            SUBJECT_ACTION_COMMIT,
            session_id,
            camera.clone(),
            actions.to_vec(),
        )))
    }

    async fn start_flash_liveness(
        &self,
        camera: &LocalTrack,
    ) -> RoomResult<Arc<dyn LivenessDetector>> {
        grab_frame(camera)?;

        Ok(Arc::new(NatsLivenessDetector::arm(
            self.clone(),
            SUBJECT_FLASH_COMMIT,
            self.session_id.clone(),
            camera.clone(),
            Vec::new(),
        )))
    }

    async fn text_to_speech(&self, text: &str) -> RoomResult<SpeechPayload> {
        let request = SpeechSynthesisRequest {
            session_id: self.session_id.clone(),
            text: text.to_string(),
        };
        let body = self.request(SUBJECT_TTS, &request).await?;

        serde_json::from_value(body)
            .map_err(|e| RoomError::remote(None, format!("malformed speech payload: {}", e)))
    }

    async fn start_speech_to_text(
        &self,
        microphone: &LocalTrack,
        options: &SpeechOptions,
    ) -> RoomResult<SpeechStream> {
        NatsSpeechAnalyzer::start(self.clone(), microphone.clone(), options).await
    }
}
