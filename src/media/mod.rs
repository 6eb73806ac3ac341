//! Media utility operations layered over the current local tracks
//!
//! - One-shot analysis: ID card, face detection, face comparison
//! - Text-to-speech playback
//! - Streaming speech-to-text
//! - Recording with blob export

pub mod export;
pub mod operations;
pub mod recording;
pub mod speech;
pub mod transcription;

pub use export::BlobExporter;
pub use operations::{MediaOperations, ReferenceImage};
pub use recording::{
    MediaRecorder, RecordedBlob, RecorderFactory, RecordingSession, RecordingState,
    RecordingTracks, DEFAULT_MIME_TYPE, RECORD_MIME_TYPES,
};
pub use speech::{decode_wav, decode_wav_base64, AudioPlayer, DecodedAudio};
pub use transcription::{TranscriptSegment, TranscriptionSession, TranscriptionState};
