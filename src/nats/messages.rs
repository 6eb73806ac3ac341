use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{RoomError, RoomResult};
use crate::inference::ActionType;

/// Audio frame message published while speech-to-text is running
#[derive(Debug, Serialize, Deserialize)]
pub struct AudioFrameMessage {
    pub session_id: String,
    pub sequence: u32,
    pub pcm: String, // Base64-encoded PCM bytes
    pub sample_rate: u32,
    pub channels: u16,
    pub timestamp: String, // RFC3339 timestamp
    #[serde(rename = "final")]
    pub final_frame: bool,
}

/// Transcript message received from the STT service
#[derive(Debug, Serialize, Deserialize)]
pub struct TranscriptMessage {
    pub session_id: String,
    pub text: String,
    pub partial: bool,
    pub timestamp: String,
    #[serde(default)]
    pub confidence: Option<f32>,
}

/// Start/stop notice for a speech-to-text stream
#[derive(Debug, Serialize, Deserialize)]
pub struct SpeechControlMessage {
    pub session_id: String,
    pub command: SpeechCommand,
    /// Hot words in `word,weight;word,weight` form
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub hot_words: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpeechCommand {
    Start,
    Stop,
}

/// Single-image analysis request (ID card, face detect, face compare)
#[derive(Debug, Serialize, Deserialize)]
pub struct ImageRequest {
    pub session_id: String,
    /// `data:` URL of the sampled camera frame
    pub image: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
}

/// Liveness commit carrying the frames sampled while the detector was armed
#[derive(Debug, Serialize, Deserialize)]
pub struct LivenessCommitRequest {
    pub session_id: String,
    pub detector_id: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub action_types: Vec<ActionType>,
    pub frames: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SpeechSynthesisRequest {
    pub session_id: String,
    pub text: String,
}

/// Envelope of every inference reply
#[derive(Debug, Serialize, Deserialize)]
pub struct ServiceReply {
    pub status: u16,
    #[serde(default)]
    pub body: Value,
    #[serde(default)]
    pub message: Option<String>,
}

impl ServiceReply {
    /// Map non-2xx statuses to a remote service error
    pub fn into_result(self) -> RoomResult<Value> {
        if (200..300).contains(&self.status) {
            Ok(self.body)
        } else {
            let message = self
                .message
                .unwrap_or_else(|| format!("inference service returned {}", self.status));
            Err(RoomError::remote(Some(self.status), message))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_reply_yields_body() {
        let reply: ServiceReply =
            serde_json::from_str(r#"{"status":200,"body":{"live":true}}"#).unwrap();
        assert_eq!(reply.into_result().unwrap()["live"], true);
    }

    #[test]
    fn error_reply_keeps_status() {
        let reply: ServiceReply =
            serde_json::from_str(r#"{"status":403,"message":"token expired"}"#).unwrap();
        let err = reply.into_result().unwrap_err();
        assert_eq!(err.remote_status(), Some(403));
        assert!(err.to_string().contains("token expired"));
    }
}
