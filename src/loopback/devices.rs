use anyhow::{bail, Result};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tracing::info;

use crate::device::{DeviceCapture, FacingMode};
use crate::rtc::{LocalTrack, MediaKind, MediaSample, MediaSource, RenderTarget, TrackRole};

const FRAME_SIZE: usize = 16;
const AUDIO_SAMPLE_RATE: u32 = 16000;
const AUDIO_FRAME_SAMPLES: usize = 1600; // 100ms at 16kHz

/// A track attached to a render target
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Playback {
    pub source: String,
    pub target: RenderTarget,
}

/// Record of every `play` call made on loopback sources
#[derive(Clone, Default)]
pub struct PlaybackLog {
    entries: Arc<Mutex<Vec<Playback>>>,
}

impl PlaybackLog {
    fn record(&self, source: &str, target: RenderTarget) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.push(Playback {
                source: source.to_string(),
                target,
            });
        }
    }

    pub fn entries(&self) -> Vec<Playback> {
        self.entries.lock().map(|e| e.clone()).unwrap_or_default()
    }

    pub fn count_for(&self, source: &str, target: RenderTarget) -> usize {
        self.entries()
            .iter()
            .filter(|p| p.source == source && p.target == target)
            .count()
    }
}

/// Synthetic media: a moving grey ramp for video, silence for audio
pub struct VirtualSource {
    label: String,
    kind: MediaKind,
    log: PlaybackLog,
    frame: AtomicU64,
    stopped: AtomicBool,
}

impl VirtualSource {
    pub fn new(label: impl Into<String>, kind: MediaKind, log: PlaybackLog) -> Self {
        Self {
            label: label.into(),
            kind,
            log,
            frame: AtomicU64::new(0),
            stopped: AtomicBool::new(false),
        }
    }

    /// Binary PGM image; small, self-describing and dependency free
    fn video_frame(&self, index: u64) -> Vec<u8> {
        let mut data = format!("P5\n{} {}\n255\n", FRAME_SIZE, FRAME_SIZE).into_bytes();
        data.extend((0..FRAME_SIZE * FRAME_SIZE).map(|i| ((i as u64 + index) % 256) as u8));
        data
    }
}

impl MediaSource for VirtualSource {
    fn play(&self, target: RenderTarget) -> Result<()> {
        if self.stopped.load(Ordering::SeqCst) {
            bail!("source {} is stopped", self.label);
        }
        self.log.record(&self.label, target);
        Ok(())
    }

    fn grab(&self) -> Result<MediaSample> {
        if self.stopped.load(Ordering::SeqCst) {
            bail!("source {} is stopped", self.label);
        }
        let index = self.frame.fetch_add(1, Ordering::SeqCst);
        Ok(match self.kind {
            MediaKind::Video => MediaSample::Image {
                mime: "image/x-portable-graymap".to_string(),
                data: self.video_frame(index),
            },
            MediaKind::Audio => MediaSample::Audio {
                samples: vec![0; AUDIO_FRAME_SAMPLES],
                sample_rate: AUDIO_SAMPLE_RATE,
                channels: 1,
            },
        })
    }

    fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
    }
}

/// In-process camera and microphone
#[derive(Default)]
pub struct VirtualDevices {
    log: PlaybackLog,
    deny_camera: AtomicBool,
    deny_microphone: AtomicBool,
    opened: Mutex<Vec<LocalTrack>>,
}

impl VirtualDevices {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn playback(&self) -> PlaybackLog {
        self.log.clone()
    }

    /// Simulate a denied camera permission
    pub fn deny_camera(&self, deny: bool) {
        self.deny_camera.store(deny, Ordering::SeqCst);
    }

    pub fn deny_microphone(&self, deny: bool) {
        self.deny_microphone.store(deny, Ordering::SeqCst);
    }

    /// Every track ever opened, in order
    pub fn opened(&self) -> Vec<LocalTrack> {
        self.opened.lock().map(|o| o.clone()).unwrap_or_default()
    }

    fn open(&self, role: TrackRole, facing: Option<FacingMode>) -> LocalTrack {
        let id = format!("{}-{}", role, uuid::Uuid::new_v4());
        let source = VirtualSource::new(id.clone(), role.into(), self.log.clone());
        let track = LocalTrack::new(id, role, facing, Box::new(source));
        if let Ok(mut opened) = self.opened.lock() {
            opened.push(track.clone());
        }
        info!("Opened virtual {} {}", role, track.id());
        track
    }
}

#[async_trait::async_trait]
impl DeviceCapture for VirtualDevices {
    async fn camera(&self, facing: FacingMode) -> Result<LocalTrack> {
        if self.deny_camera.load(Ordering::SeqCst) {
            bail!("camera permission denied");
        }
        Ok(self.open(TrackRole::Camera, Some(facing)))
    }

    async fn microphone(&self) -> Result<LocalTrack> {
        if self.deny_microphone.load(Ordering::SeqCst) {
            bail!("microphone permission denied");
        }
        Ok(self.open(TrackRole::Microphone, None))
    }

    fn name(&self) -> &str {
        "virtual devices"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn video_frames_are_pgm() {
        let source = VirtualSource::new("cam", MediaKind::Video, PlaybackLog::default());
        match source.grab().unwrap() {
            MediaSample::Image { mime, data } => {
                assert_eq!(mime, "image/x-portable-graymap");
                assert!(data.starts_with(b"P5\n16 16\n255\n"));
                assert_eq!(data.len(), 13 + FRAME_SIZE * FRAME_SIZE);
            }
            other => panic!("unexpected sample: {:?}", other),
        }
    }

    #[test]
    fn stopped_source_refuses_to_play() {
        let log = PlaybackLog::default();
        let source = VirtualSource::new("mic", MediaKind::Audio, log.clone());
        source.play(RenderTarget::RemoteView).unwrap();
        source.stop();
        assert!(source.play(RenderTarget::RemoteView).is_err());
        assert!(source.grab().is_err());
        assert_eq!(log.count_for("mic", RenderTarget::RemoteView), 1);
    }
}
