use serde_json::Value;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use super::status::RoomStatus;
use super::{render, RenderSettings, RoomSettings};
use crate::device::{DeviceCapture, DeviceTrackManager, FacingMode};
use crate::error::{RoomError, RoomResult};
use crate::inference::{ActionType, InferenceService, LivenessContext};
use crate::liveness::LivenessOrchestrator;
use crate::media::{
    AudioPlayer, BlobExporter, DecodedAudio, MediaOperations, RecorderFactory, RecordingSession,
    RecordingState, ReferenceImage, TranscriptSegment, TranscriptionSession, TranscriptionState,
};
use crate::notify::NotificationCenter;
use crate::rtc::{
    RemoteTrackRegistry, RtcClient, SessionGateway, SessionHandle, TrackSummary,
};

/// External collaborators the room is built from
pub struct RoomComponents {
    pub client: Arc<dyn RtcClient>,
    pub capture: Arc<dyn DeviceCapture>,
    pub inference: Arc<dyn InferenceService>,
    pub recorders: Arc<dyn RecorderFactory>,
    pub player: Arc<dyn AudioPlayer>,
}

pub struct RoomController {
    gateway: Arc<SessionGateway>,
    devices: Arc<DeviceTrackManager>,
    remote: Arc<RemoteTrackRegistry>,
    liveness: LivenessOrchestrator,
    media: MediaOperations,
    transcription: TranscriptionSession,
    recording: RecordingSession,
    render: RenderSettings,
    notifier: NotificationCenter,

    tasks: Mutex<Vec<JoinHandle<()>>>,
    started: AtomicBool,
    shut_down: AtomicBool,
}

impl RoomController {
    pub fn new(
        components: RoomComponents,
        settings: RoomSettings,
        notifier: NotificationCenter,
    ) -> RoomResult<Self> {
        let devices = Arc::new(DeviceTrackManager::new(
            components.capture,
            settings.facing,
            notifier.clone(),
        ));
        let tracks = devices.tracks();

        let liveness = LivenessOrchestrator::new(
            Arc::clone(&components.inference),
            tracks.clone(),
            settings.timing,
            settings.flash_delay,
            notifier.clone(),
        );
        let media = MediaOperations::new(
            Arc::clone(&components.inference),
            tracks.clone(),
            components.player,
            notifier.clone(),
        );
        let transcription = TranscriptionSession::new(
            components.inference,
            tracks.clone(),
            settings.speech,
            notifier.clone(),
        );
        let recording = RecordingSession::new(
            components.recorders,
            tracks,
            BlobExporter::new(settings.export_dir),
            settings.recording_file_name,
            notifier.clone(),
        );
        recording.select_format(&settings.recording_mime_type)?;

        Ok(Self {
            gateway: Arc::new(SessionGateway::new(components.client)),
            devices,
            remote: Arc::new(RemoteTrackRegistry::new()),
            liveness,
            media,
            transcription,
            recording,
            render: settings.render,
            notifier,
            tasks: Mutex::new(Vec::new()),
            started: AtomicBool::new(false),
            shut_down: AtomicBool::new(false),
        })
    }

    /// Acquire devices, follow the session and join the room
    ///
    /// Background work is spawned on the first call only; a failed join may
    /// be retried by calling `start` again.
    pub async fn start(&self, token: &str) -> RoomResult<SessionHandle> {
        if self.shut_down.load(Ordering::SeqCst) {
            return Err(RoomError::Misuse("room has been shut down".to_string()));
        }

        if !self.started.swap(true, Ordering::SeqCst) {
            let handles = vec![
                self.devices.spawn(),
                self.remote.spawn(Arc::clone(&self.gateway)),
                render::spawn(
                    Arc::clone(&self.gateway),
                    self.devices.tracks(),
                    self.remote.subscribe(),
                    self.render.clone(),
                ),
            ];
            if let Ok(mut tasks) = self.tasks.lock() {
                tasks.extend(handles);
            }
        }

        match self.gateway.join(token).await {
            Ok(handle) => {
                self.notifier.info(
                    "Joined room",
                    format!("{} as {}", handle.room.room_name, handle.room.user_id),
                );
                Ok(handle)
            }
            Err(e) => {
                self.notifier.failure("Join failed", &e);
                Err(e)
            }
        }
    }

    pub fn gateway(&self) -> &Arc<SessionGateway> {
        &self.gateway
    }

    pub fn devices(&self) -> &Arc<DeviceTrackManager> {
        &self.devices
    }

    pub fn remote(&self) -> &Arc<RemoteTrackRegistry> {
        &self.remote
    }

    pub fn liveness(&self) -> &LivenessOrchestrator {
        &self.liveness
    }

    pub fn transcription(&self) -> &TranscriptionSession {
        &self.transcription
    }

    pub fn recording(&self) -> &RecordingSession {
        &self.recording
    }

    pub fn notifications(&self) -> &NotificationCenter {
        &self.notifier
    }

    pub async fn leave(&self) -> RoomResult<()> {
        self.gateway.leave().await
    }

    /// Switch between front and rear camera
    pub async fn toggle_camera(&self) -> FacingMode {
        self.devices.toggle_facing().await
    }

    pub async fn start_action_liveness(&self, action: ActionType) -> RoomResult<()> {
        let context = LivenessContext {
            session_id: self.gateway.handle().map(|h| h.session_id),
        };
        self.liveness.start_action(action, context).await
    }

    pub async fn start_flash_liveness(&self) -> RoomResult<()> {
        self.liveness.start_flash().await
    }

    pub async fn recognize_id_card(&self) -> RoomResult<Value> {
        self.media.recognize_id_card().await
    }

    pub async fn detect_face(&self) -> RoomResult<Value> {
        self.media.detect_face().await
    }

    pub async fn compare_face(&self, reference: &ReferenceImage) -> RoomResult<Value> {
        self.media.compare_face(reference).await
    }

    pub async fn speak(&self, text: &str) -> RoomResult<DecodedAudio> {
        self.media.speak(text).await
    }

    pub async fn toggle_transcription(&self) -> RoomResult<TranscriptionState> {
        self.transcription.toggle().await
    }

    pub async fn transcript(&self) -> Vec<TranscriptSegment> {
        self.transcription.transcript().await
    }

    pub async fn toggle_recording(&self) -> RoomResult<RecordingState> {
        self.recording.toggle().await
    }

    /// Stop recording if active and return the exported file
    pub async fn stop_recording(&self) -> RoomResult<Option<PathBuf>> {
        self.recording.stop().await
    }

    pub fn select_recording_format(&self, mime_type: &str) -> RoomResult<()> {
        self.recording.select_format(mime_type)
    }

    pub fn status(&self) -> RoomStatus {
        let action = self.liveness.action();
        RoomStatus {
            session: self.gateway.state(),
            handle: self.gateway.handle(),
            facing: self.devices.facing_mode(),
            local_tracks: self
                .devices
                .tracks()
                .current()
                .tracks()
                .iter()
                .filter(|t| t.is_active())
                .map(TrackSummary::from)
                .collect(),
            remote_tracks: self.remote.current().iter().map(TrackSummary::from).collect(),
            action_phase: action.phase(),
            countdown: action.countdown(),
            flash_phase: self.liveness.flash().phase(),
            transcription: self.transcription.state(),
            caption: self.transcription.caption(),
            recording: self.recording.state(),
            recording_mime_type: self.recording.mime_type(),
        }
    }

    /// Tear the room down
    ///
    /// Cancels unfinished liveness runs, stops speech and recording, leaves
    /// the session and releases every local track. Idempotent.
    pub async fn shutdown(&self) {
        if self.shut_down.swap(true, Ordering::SeqCst) {
            return;
        }

        info!("Shutting down room");

        self.liveness.cancel_all();
        self.transcription.stop().await;

        if self.recording.is_recording() {
            if let Err(e) = self.recording.stop().await {
                warn!("Recording did not stop cleanly: {}", e);
            }
        }

        if let Err(e) = self.gateway.leave().await {
            warn!("Leave failed during shutdown: {}", e);
        }

        let tasks: Vec<JoinHandle<()>> = match self.tasks.lock() {
            Ok(mut tasks) => tasks.drain(..).collect(),
            Err(_) => Vec::new(),
        };
        for task in tasks {
            task.abort();
        }

        self.devices.release_all().await;

        info!("Room shut down");
    }
}
