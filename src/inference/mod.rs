//! Remote inference service contract
//!
//! The NATS-backed implementation lives in `crate::nats`.

mod service;
mod types;

pub use service::{InferenceService, LivenessDetector, SpeechAnalyzer, SpeechStream};
pub use types::{
    ActionType, HotWord, LivenessContext, SpeechOptions, SpeechPayload, TranscriptFragment,
};
