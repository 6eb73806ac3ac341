pub mod client;
mod detector;
pub mod messages;
mod speech;

pub use client::{sample_to_data_url, NatsInference, NatsSettings};
pub use detector::NatsLivenessDetector;
pub use messages::{AudioFrameMessage, ServiceReply, TranscriptMessage};
pub use speech::NatsSpeechAnalyzer;
