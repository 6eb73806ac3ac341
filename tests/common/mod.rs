// Shared fixtures for integration tests
//
// `FakeInference` scripts the remote inference service and counts every call;
// `Harness` builds a full room on the loopback collaborators.

#![allow(dead_code)]

use anyhow::Result;
use base64::Engine;
use loqa_room::error::{RoomError, RoomResult};
use loqa_room::inference::{
    ActionType, InferenceService, LivenessContext, LivenessDetector, SpeechAnalyzer,
    SpeechOptions, SpeechPayload, SpeechStream, TranscriptFragment,
};
use loqa_room::loopback::{LogPlayer, LoopbackClient, LoopbackRecorderFactory, VirtualDevices};
use loqa_room::notify::NotificationCenter;
use loqa_room::room::{RoomComponents, RoomController, RoomSettings};
use loqa_room::rtc::LocalTrack;
use serde_json::{json, Value};
use std::io::Cursor;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::mpsc;

/// Encode a mono 16-bit WAV as base64
pub fn wav_base64(samples: &[i16], sample_rate: u32) -> String {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
        for sample in samples {
            writer.write_sample(*sample).unwrap();
        }
        writer.finalize().unwrap();
    }
    base64::engine::general_purpose::STANDARD.encode(cursor.into_inner())
}

/// Poll `condition` until it holds, sleeping between attempts
pub async fn wait_for<F: Fn() -> bool>(condition: F) -> bool {
    for _ in 0..500 {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    condition()
}

#[derive(Default)]
pub struct Calls {
    pub id_card: AtomicUsize,
    pub detect_face: AtomicUsize,
    pub compare_face: AtomicUsize,
    pub action_starts: AtomicUsize,
    pub flash_starts: AtomicUsize,
    pub commits: AtomicUsize,
    pub tts: AtomicUsize,
    pub stt_starts: AtomicUsize,
    pub stt_stops: AtomicUsize,
}

pub struct FakeDetector {
    id: String,
    calls: Arc<Calls>,
    fail: bool,
    delay: Option<Duration>,
}

#[async_trait::async_trait]
impl LivenessDetector for FakeDetector {
    fn id(&self) -> &str {
        &self.id
    }

    async fn commit(&self) -> RoomResult<Value> {
        self.calls.commits.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail {
            return Err(RoomError::remote(Some(500), "liveness backend unavailable"));
        }
        Ok(json!({ "live": true, "detector": self.id }))
    }
}

pub struct FakeAnalyzer {
    calls: Arc<Calls>,
}

#[async_trait::async_trait]
impl SpeechAnalyzer for FakeAnalyzer {
    async fn stop(&mut self) -> RoomResult<()> {
        self.calls.stt_stops.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Scripted inference service
#[derive(Default)]
pub struct FakeInference {
    pub calls: Arc<Calls>,
    pub fail_commit: AtomicBool,
    pub fail_remote: AtomicBool,
    pub commit_delay: Mutex<Option<Duration>>,
    pub tts_audio: Mutex<String>,
    pub references: Mutex<Vec<String>>,
    pub action_types: Mutex<Vec<ActionType>>,
    pub contexts: Mutex<Vec<LivenessContext>>,
    transcripts: Mutex<Option<mpsc::Sender<TranscriptFragment>>>,
}

impl FakeInference {
    pub fn new() -> Arc<Self> {
        let fake = Self::default();
        *fake.tts_audio.lock().unwrap() = wav_base64(&[0, 1000, -1000, 0], 16000);
        Arc::new(fake)
    }

    pub fn commits(&self) -> usize {
        self.calls.commits.load(Ordering::SeqCst)
    }

    pub fn set_commit_delay(&self, delay: Duration) {
        *self.commit_delay.lock().unwrap() = Some(delay);
    }

    /// Deliver a fragment to the running speech stream
    pub async fn push_transcript(&self, text: &str, is_final: bool) {
        let sender = self.transcripts.lock().unwrap().clone();
        if let Some(sender) = sender {
            let _ = sender
                .send(TranscriptFragment {
                    transcript: text.to_string(),
                    is_final,
                    confidence: Some(0.9),
                })
                .await;
        }
    }

    fn remote_result(&self, kind: &str) -> RoomResult<Value> {
        if self.fail_remote.load(Ordering::SeqCst) {
            return Err(RoomError::remote(Some(503), format!("{} service down", kind)));
        }
        Ok(json!({ "kind": kind, "ok": true }))
    }

    fn detector(&self) -> Arc<dyn LivenessDetector> {
        Arc::new(FakeDetector {
            id: uuid::Uuid::new_v4().to_string(),
            calls: Arc::clone(&self.calls),
            fail: self.fail_commit.load(Ordering::SeqCst),
            delay: *self.commit_delay.lock().unwrap(),
        })
    }
}

#[async_trait::async_trait]
impl InferenceService for FakeInference {
    async fn detect_id_card(&self, _camera: &LocalTrack) -> RoomResult<Value> {
        self.calls.id_card.fetch_add(1, Ordering::SeqCst);
        self.remote_result("idcard")
    }

    async fn detect_face(&self, _camera: &LocalTrack) -> RoomResult<Value> {
        self.calls.detect_face.fetch_add(1, Ordering::SeqCst);
        self.remote_result("face")
    }

    async fn compare_face(&self, _camera: &LocalTrack, reference_image: &str) -> RoomResult<Value> {
        self.calls.compare_face.fetch_add(1, Ordering::SeqCst);
        self.references
            .lock()
            .unwrap()
            .push(reference_image.to_string());
        self.remote_result("compare")
    }

    async fn start_action_liveness(
        &self,
        context: &LivenessContext,
        _camera: &LocalTrack,
        actions: &[ActionType],
    ) -> RoomResult<Arc<dyn LivenessDetector>> {
        self.calls.action_starts.fetch_add(1, Ordering::SeqCst);
        self.action_types.lock().unwrap().extend_from_slice(actions);
        self.contexts.lock().unwrap().push(context.clone());
        Ok(self.detector())
    }

    async fn start_flash_liveness(
        &self,
        _camera: &LocalTrack,
    ) -> RoomResult<Arc<dyn LivenessDetector>> {
        self.calls.flash_starts.fetch_add(1, Ordering::SeqCst);
        Ok(self.detector())
    }

    async fn text_to_speech(&self, _text: &str) -> RoomResult<SpeechPayload> {
        self.calls.tts.fetch_add(1, Ordering::SeqCst);
        Ok(SpeechPayload {
            audio: self.tts_audio.lock().unwrap().clone(),
        })
    }

    async fn start_speech_to_text(
        &self,
        _microphone: &LocalTrack,
        _options: &SpeechOptions,
    ) -> RoomResult<SpeechStream> {
        self.calls.stt_starts.fetch_add(1, Ordering::SeqCst);
        let (tx, rx) = mpsc::channel(16);
        *self.transcripts.lock().unwrap() = Some(tx);
        Ok(SpeechStream {
            analyzer: Box::new(FakeAnalyzer {
                calls: Arc::clone(&self.calls),
            }),
            transcripts: rx,
        })
    }
}

/// A full room on loopback collaborators
pub struct Harness {
    pub room: Arc<RoomController>,
    pub client: Arc<LoopbackClient>,
    pub devices: Arc<VirtualDevices>,
    pub inference: Arc<FakeInference>,
    pub recorders: LoopbackRecorderFactory,
    pub player: Arc<LogPlayer>,
    pub notifier: NotificationCenter,
    pub export_dir: TempDir,
}

pub fn harness() -> Result<Harness> {
    harness_with(|_| {})
}

pub fn harness_with(configure: impl FnOnce(&mut RoomSettings)) -> Result<Harness> {
    let export_dir = TempDir::new()?;
    let mut settings = RoomSettings {
        export_dir: export_dir.path().to_path_buf(),
        ..RoomSettings::default()
    };
    configure(&mut settings);

    let client = Arc::new(LoopbackClient::new());
    let devices = Arc::new(VirtualDevices::new());
    let inference = FakeInference::new();
    let recorders = LoopbackRecorderFactory::new();
    let player = Arc::new(LogPlayer::new());
    let notifier = NotificationCenter::new();

    let components = RoomComponents {
        client: client.clone(),
        capture: devices.clone(),
        inference: inference.clone(),
        recorders: Arc::new(recorders.clone()),
        player: player.clone(),
    };
    let room = Arc::new(RoomController::new(components, settings, notifier.clone())?);

    Ok(Harness {
        room,
        client,
        devices,
        inference,
        recorders,
        player,
        notifier,
        export_dir,
    })
}

impl Harness {
    /// Join and wait until the camera track is acquired
    pub async fn start(&self) -> Result<()> {
        self.room.start("test-token").await?;
        let tracks = self.room.devices().tracks();
        assert!(wait_for(|| tracks.find(loqa_room::rtc::TrackRole::Camera).is_some()).await);
        Ok(())
    }

    pub fn notification_titles(&self) -> Vec<String> {
        self.notifier
            .recent()
            .into_iter()
            .map(|n| n.title)
            .collect()
    }
}
