use anyhow::{bail, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::info;

use crate::media::{MediaRecorder, RecordedBlob, RecorderFactory, RecordingTracks, DEFAULT_MIME_TYPE};

/// Formats the loopback recorder cannot produce
const UNSUPPORTED: &[&str] = &["codecs=daala", "video/mpeg"];

/// Creates `LoopbackRecorder`s and counts how many were made
#[derive(Clone, Default)]
pub struct LoopbackRecorderFactory {
    created: Arc<AtomicUsize>,
}

impl LoopbackRecorderFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }
}

impl RecorderFactory for LoopbackRecorderFactory {
    fn create(&self) -> Result<Box<dyn MediaRecorder>> {
        self.created.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(LoopbackRecorder::new()))
    }
}

/// Recorder whose output is a JSON manifest of what was recorded
pub struct LoopbackRecorder {
    mime_type: String,
    started: Option<Started>,
}

struct Started {
    at: DateTime<Utc>,
    tracks: RecordingTracks,
}

#[derive(Serialize)]
struct Manifest {
    mime_type: String,
    started_at: DateTime<Utc>,
    stopped_at: DateTime<Utc>,
    duration_ms: i64,
    video_track: Option<String>,
    audio_track: Option<String>,
}

impl LoopbackRecorder {
    pub fn new() -> Self {
        Self {
            mime_type: DEFAULT_MIME_TYPE.to_string(),
            started: None,
        }
    }
}

impl Default for LoopbackRecorder {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl MediaRecorder for LoopbackRecorder {
    fn set_mime_type(&mut self, mime_type: &str) -> bool {
        if UNSUPPORTED.iter().any(|u| mime_type.contains(u)) {
            return false;
        }
        self.mime_type = mime_type.to_string();
        true
    }

    async fn start(&mut self, tracks: RecordingTracks) -> Result<()> {
        if self.started.is_some() {
            bail!("recorder already started");
        }
        info!("Loopback recorder started ({})", self.mime_type);
        self.started = Some(Started {
            at: Utc::now(),
            tracks,
        });
        Ok(())
    }

    async fn stop(&mut self) -> Result<RecordedBlob> {
        let Some(started) = self.started.take() else {
            bail!("recorder not started");
        };

        let stopped_at = Utc::now();
        let manifest = Manifest {
            mime_type: self.mime_type.clone(),
            started_at: started.at,
            stopped_at,
            duration_ms: (stopped_at - started.at).num_milliseconds(),
            video_track: started.tracks.video.as_ref().map(|t| t.id().to_string()),
            audio_track: started.tracks.audio.as_ref().map(|t| t.id().to_string()),
        };

        Ok(RecordedBlob {
            mime_type: self.mime_type.clone(),
            data: serde_json::to_vec_pretty(&manifest)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_unsupported_codecs() {
        let mut recorder = LoopbackRecorder::new();
        assert!(!recorder.set_mime_type("video/webm;codecs=daala"));
        assert!(!recorder.set_mime_type("video/mpeg"));
        assert!(recorder.set_mime_type("audio/webm;codecs=opus"));
    }

    #[tokio::test]
    async fn stop_without_start_fails() {
        let mut recorder = LoopbackRecorder::new();
        assert!(recorder.stop().await.is_err());

        recorder.start(RecordingTracks::default()).await.unwrap();
        let blob = recorder.stop().await.unwrap();
        assert_eq!(blob.mime_type, DEFAULT_MIME_TYPE);
        let manifest: serde_json::Value = serde_json::from_slice(&blob.data).unwrap();
        assert!(manifest["video_track"].is_null());
    }
}
