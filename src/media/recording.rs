use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{watch, Mutex};
use tracing::{info, warn};

use super::export::BlobExporter;
use crate::device::LocalTracks;
use crate::error::{RoomError, RoomResult};
use crate::notify::NotificationCenter;
use crate::rtc::{LocalTrack, TrackRole};

/// Container/codec combinations offered to the operator
pub const RECORD_MIME_TYPES: &[&str] = &[
    "video/webm",
    "audio/webm",
    "video/webm;codecs=vp8",
    "video/webm;codecs=daala",
    "video/webm;codecs=h264",
    "audio/webm;codecs=opus",
    "video/mpeg",
];

pub const DEFAULT_MIME_TYPE: &str = "video/webm";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordingState {
    Idle,
    Recording,
}

/// Tracks handed to the recorder at start
#[derive(Debug, Clone, Default)]
pub struct RecordingTracks {
    pub video: Option<LocalTrack>,
    pub audio: Option<LocalTrack>,
}

/// Finalized output of one recording
#[derive(Debug, Clone)]
pub struct RecordedBlob {
    pub mime_type: String,
    pub data: Vec<u8>,
}

/// Media recorder provided by the transport SDK
#[async_trait::async_trait]
pub trait MediaRecorder: Send + Sync {
    /// Select the output format; false when unsupported
    fn set_mime_type(&mut self, mime_type: &str) -> bool;

    async fn start(&mut self, tracks: RecordingTracks) -> Result<()>;

    async fn stop(&mut self) -> Result<RecordedBlob>;
}

pub trait RecorderFactory: Send + Sync {
    fn create(&self) -> Result<Box<dyn MediaRecorder>>;
}

/// Start/stop recording of the current camera and microphone
///
/// The recorder is created on first start and reused afterwards.
pub struct RecordingSession {
    factory: Arc<dyn RecorderFactory>,
    tracks: LocalTracks,
    exporter: BlobExporter,
    file_name: String,
    notifier: NotificationCenter,

    recorder: Mutex<Option<Box<dyn MediaRecorder>>>,
    state: watch::Sender<RecordingState>,
    mime_type: std::sync::Mutex<String>,
}

impl RecordingSession {
    pub fn new(
        factory: Arc<dyn RecorderFactory>,
        tracks: LocalTracks,
        exporter: BlobExporter,
        file_name: impl Into<String>,
        notifier: NotificationCenter,
    ) -> Self {
        let (state, _) = watch::channel(RecordingState::Idle);
        Self {
            factory,
            tracks,
            exporter,
            file_name: file_name.into(),
            notifier,
            recorder: Mutex::new(None),
            state,
            mime_type: std::sync::Mutex::new(DEFAULT_MIME_TYPE.to_string()),
        }
    }

    pub fn state(&self) -> RecordingState {
        *self.state.borrow()
    }

    pub fn is_recording(&self) -> bool {
        self.state() == RecordingState::Recording
    }

    pub fn subscribe(&self) -> watch::Receiver<RecordingState> {
        self.state.subscribe()
    }

    pub fn mime_type(&self) -> String {
        match self.mime_type.lock() {
            Ok(mime) => mime.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    /// Choose the format for the next recording
    pub fn select_format(&self, mime_type: &str) -> RoomResult<()> {
        let mime_type = mime_type.trim();
        if !RECORD_MIME_TYPES.contains(&mime_type) {
            return Err(RoomError::UnsupportedFormat(mime_type.to_string()));
        }
        if let Ok(mut current) = self.mime_type.lock() {
            *current = mime_type.to_string();
        }
        info!("Recording format set to {}", mime_type);
        Ok(())
    }

    pub async fn toggle(&self) -> RoomResult<RecordingState> {
        match self.state() {
            RecordingState::Idle => self.start().await.map(|_| RecordingState::Recording),
            RecordingState::Recording => self.stop().await.map(|_| RecordingState::Idle),
        }
    }

    pub async fn start(&self) -> RoomResult<()> {
        let result = self.try_start().await;
        if let Err(e) = &result {
            self.notifier.failure("Recording could not start", e);
        }
        result
    }

    async fn try_start(&self) -> RoomResult<()> {
        let mut slot = self.recorder.lock().await;

        if self.is_recording() {
            return Err(RoomError::Misuse("recording already in progress".to_string()));
        }

        if slot.is_none() {
            let recorder = self
                .factory
                .create()
                .map_err(|e| RoomError::Recorder(format!("{:#}", e)))?;
            info!("Media recorder created");
            *slot = Some(recorder);
        }
        let recorder = slot
            .as_mut()
            .ok_or_else(|| RoomError::Recorder("recorder unavailable".to_string()))?;

        let mime_type = self.mime_type();
        if !recorder.set_mime_type(&mime_type) {
            return Err(RoomError::UnsupportedFormat(mime_type));
        }

        let tracks = RecordingTracks {
            video: Some(self.tracks.require(TrackRole::Camera)?),
            audio: self.tracks.find(TrackRole::Microphone),
        };

        recorder
            .start(tracks)
            .await
            .map_err(|e| RoomError::Recorder(format!("{:#}", e)))?;

        self.state.send_replace(RecordingState::Recording);
        info!("Recording started ({})", mime_type);

        Ok(())
    }

    /// Stop and export; `None` when nothing was recording
    pub async fn stop(&self) -> RoomResult<Option<PathBuf>> {
        let mut slot = self.recorder.lock().await;

        if !self.is_recording() {
            warn!("Recording not active");
            return Ok(None);
        }

        let recorder = slot
            .as_mut()
            .ok_or_else(|| RoomError::Recorder("recorder unavailable".to_string()))?;

        let stopped = recorder.stop().await;
        self.state.send_replace(RecordingState::Idle);

        let blob = match stopped {
            Ok(blob) => blob,
            Err(e) => {
                let err = RoomError::Recorder(format!("{:#}", e));
                self.notifier.failure("Recording failed", &err);
                return Err(err);
            }
        };

        match self.exporter.export(&blob.data, &self.file_name).await {
            Ok(path) => {
                self.notifier.info(
                    "Recording exported",
                    format!("{} ({}, {} bytes)", path.display(), blob.mime_type, blob.data.len()),
                );
                Ok(Some(path))
            }
            Err(e) => {
                self.notifier.failure("Recording export failed", &e);
                Err(e)
            }
        }
    }
}
