use anyhow::{ensure, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::info;

use crate::device::FacingMode;

/// Device role of a local track
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackRole {
    Camera,
    Microphone,
}

impl fmt::Display for TrackRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrackRole::Camera => write!(f, "camera"),
            TrackRole::Microphone => write!(f, "microphone"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Audio,
    Video,
}

impl From<TrackRole> for MediaKind {
    fn from(role: TrackRole) -> Self {
        match role {
            TrackRole::Camera => MediaKind::Video,
            TrackRole::Microphone => MediaKind::Audio,
        }
    }
}

/// Display surface a track can be played into
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RenderTarget {
    /// Preview of the local camera
    LocalPreview,
    /// Area where remote participants are rendered
    RemoteView,
}

/// A single sample pulled from a live track
#[derive(Debug, Clone)]
pub enum MediaSample {
    /// Encoded still image (e.g. a JPEG or PGM frame)
    Image { mime: String, data: Vec<u8> },
    /// Interleaved 16-bit PCM
    Audio {
        samples: Vec<i16>,
        sample_rate: u32,
        channels: u16,
    },
}

/// Media backing a track, provided by the capture device or transport SDK
pub trait MediaSource: Send + Sync {
    /// Attach the media to a display target
    fn play(&self, target: RenderTarget) -> Result<()>;

    /// Pull the most recent sample
    fn grab(&self) -> Result<MediaSample>;

    /// Stop the underlying device or stream
    fn stop(&self);
}

struct LocalTrackInner {
    id: String,
    role: TrackRole,
    facing: Option<FacingMode>,
    source: Box<dyn MediaSource>,
    released: AtomicBool,
}

/// A captured local track
///
/// Clones share identity: releasing through any clone releases the track for
/// every holder. Only the device track manager releases tracks.
#[derive(Clone)]
pub struct LocalTrack {
    inner: Arc<LocalTrackInner>,
}

impl LocalTrack {
    pub fn new(
        id: impl Into<String>,
        role: TrackRole,
        facing: Option<FacingMode>,
        source: Box<dyn MediaSource>,
    ) -> Self {
        Self {
            inner: Arc::new(LocalTrackInner {
                id: id.into(),
                role,
                facing,
                source,
                released: AtomicBool::new(false),
            }),
        }
    }

    pub fn id(&self) -> &str {
        &self.inner.id
    }

    pub fn role(&self) -> TrackRole {
        self.inner.role
    }

    pub fn facing(&self) -> Option<FacingMode> {
        self.inner.facing
    }

    pub fn is_released(&self) -> bool {
        self.inner.released.load(Ordering::SeqCst)
    }

    pub fn is_active(&self) -> bool {
        !self.is_released()
    }

    pub fn play(&self, target: RenderTarget) -> Result<()> {
        ensure!(self.is_active(), "track {} has been released", self.inner.id);
        self.inner.source.play(target)
    }

    pub fn grab(&self) -> Result<MediaSample> {
        ensure!(self.is_active(), "track {} has been released", self.inner.id);
        self.inner.source.grab()
    }

    /// Release the device; later calls are no-ops
    pub(crate) fn release(&self) {
        if !self.inner.released.swap(true, Ordering::SeqCst) {
            self.inner.source.stop();
            info!("Released {} track {}", self.inner.role, self.inner.id);
        }
    }
}

impl PartialEq for LocalTrack {
    fn eq(&self, other: &Self) -> bool {
        self.inner.id == other.inner.id
    }
}

impl fmt::Debug for LocalTrack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocalTrack")
            .field("id", &self.inner.id)
            .field("role", &self.inner.role)
            .field("facing", &self.inner.facing)
            .field("released", &self.is_released())
            .finish()
    }
}

/// A track published by a remote participant
#[derive(Clone)]
pub struct RemoteTrack {
    pub id: String,
    pub participant_id: String,
    pub kind: MediaKind,
    source: Arc<dyn MediaSource>,
}

impl RemoteTrack {
    pub fn new(
        id: impl Into<String>,
        participant_id: impl Into<String>,
        kind: MediaKind,
        source: Arc<dyn MediaSource>,
    ) -> Self {
        Self {
            id: id.into(),
            participant_id: participant_id.into(),
            kind,
            source,
        }
    }

    pub fn play(&self, target: RenderTarget) -> Result<()> {
        self.source.play(target)
    }
}

impl fmt::Debug for RemoteTrack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteTrack")
            .field("id", &self.id)
            .field("participant_id", &self.participant_id)
            .field("kind", &self.kind)
            .finish()
    }
}

/// Serializable view of a track for status reporting
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackSummary {
    pub id: String,
    pub kind: MediaKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<TrackRole>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub participant_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub facing: Option<FacingMode>,
}

impl From<&LocalTrack> for TrackSummary {
    fn from(track: &LocalTrack) -> Self {
        Self {
            id: track.id().to_string(),
            kind: track.role().into(),
            role: Some(track.role()),
            participant_id: None,
            facing: track.facing(),
        }
    }
}

impl From<&RemoteTrack> for TrackSummary {
    fn from(track: &RemoteTrack) -> Self {
        Self {
            id: track.id.clone(),
            kind: track.kind,
            role: None,
            participant_id: Some(track.participant_id.clone()),
            facing: None,
        }
    }
}
