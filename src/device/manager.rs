use std::sync::Arc;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use super::capture::{DeviceCapture, FacingMode};
use crate::error::{RoomError, RoomResult};
use crate::notify::NotificationCenter;
use crate::rtc::{LocalTrack, TrackRole};

/// The local tracks captured at one point in time
#[derive(Debug, Clone, Default)]
pub struct TrackSet {
    tracks: Vec<LocalTrack>,
}

impl TrackSet {
    pub fn new(camera: LocalTrack, microphone: Option<LocalTrack>) -> Self {
        let mut tracks = vec![camera];
        tracks.extend(microphone);
        Self { tracks }
    }

    pub fn find(&self, role: TrackRole) -> Option<&LocalTrack> {
        self.tracks.iter().find(|t| t.role() == role)
    }

    pub fn camera(&self) -> Option<&LocalTrack> {
        self.find(TrackRole::Camera)
    }

    pub fn microphone(&self) -> Option<&LocalTrack> {
        self.find(TrackRole::Microphone)
    }

    pub fn tracks(&self) -> &[LocalTrack] {
        &self.tracks
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    fn contains(&self, track: &LocalTrack) -> bool {
        self.tracks.iter().any(|t| t == track)
    }
}

/// Read-only view of the current local tracks
///
/// The set may be replaced wholesale at any time, so consumers resolve tracks
/// on every use instead of holding on to them.
#[derive(Clone)]
pub struct LocalTracks {
    rx: watch::Receiver<TrackSet>,
}

impl LocalTracks {
    pub fn current(&self) -> TrackSet {
        self.rx.borrow().clone()
    }

    /// Active track for `role`, if captured and not released
    pub fn find(&self, role: TrackRole) -> Option<LocalTrack> {
        self.rx
            .borrow()
            .find(role)
            .filter(|t| t.is_active())
            .cloned()
    }

    pub fn require(&self, role: TrackRole) -> RoomResult<LocalTrack> {
        self.find(role).ok_or(RoomError::DeviceUnavailable(role))
    }

    /// Wait for the set to be replaced; false once the manager is gone
    pub async fn changed(&mut self) -> bool {
        self.rx.changed().await.is_ok()
    }
}

/// Owns the local capture devices
///
/// The only component allowed to release tracks.
pub struct DeviceTrackManager {
    capture: Arc<dyn DeviceCapture>,
    facing: watch::Sender<FacingMode>,
    tracks: watch::Sender<TrackSet>,
    // Serializes acquisition against toggling
    mutation: Mutex<()>,
    notifier: NotificationCenter,
}

impl DeviceTrackManager {
    pub fn new(
        capture: Arc<dyn DeviceCapture>,
        facing: FacingMode,
        notifier: NotificationCenter,
    ) -> Self {
        let (facing, _) = watch::channel(facing);
        let (tracks, _) = watch::channel(TrackSet::default());
        Self {
            capture,
            facing,
            tracks,
            mutation: Mutex::new(()),
            notifier,
        }
    }

    pub fn tracks(&self) -> LocalTracks {
        LocalTracks {
            rx: self.tracks.subscribe(),
        }
    }

    pub fn facing_mode(&self) -> FacingMode {
        *self.facing.borrow()
    }

    pub fn subscribe_facing(&self) -> watch::Receiver<FacingMode> {
        self.facing.subscribe()
    }

    /// Capture a fresh camera + microphone set
    ///
    /// Camera failure yields no tracks at all; microphone failure yields a
    /// camera-only set. Both are reported to the operator.
    pub async fn acquire(&self, facing: FacingMode) -> RoomResult<TrackSet> {
        info!("Acquiring local tracks via {} ({})", self.capture.name(), facing);

        let camera = match self.capture.camera(facing).await {
            Ok(camera) => camera,
            Err(e) => {
                self.notifier
                    .error("Camera unavailable", format!("{:#}", e));
                return Err(RoomError::DeviceUnavailable(TrackRole::Camera));
            }
        };

        let microphone = match self.capture.microphone().await {
            Ok(microphone) => Some(microphone),
            Err(e) => {
                warn!("Continuing without microphone: {:#}", e);
                self.notifier
                    .error("Microphone unavailable", format!("{:#}", e));
                None
            }
        };

        Ok(TrackSet::new(camera, microphone))
    }

    /// Release every track in `set`
    pub fn release(&self, set: &TrackSet) {
        for track in set.tracks() {
            track.release();
        }
    }

    /// Acquire tracks for the current facing mode and make them current
    pub async fn refresh(&self) -> RoomResult<()> {
        let _guard = self.mutation.lock().await;
        let facing = self.facing_mode();

        match self.acquire(facing).await {
            Ok(set) => {
                info!("Local tracks ready: {} track(s), {}", set.len(), facing);
                self.install(set);
                Ok(())
            }
            Err(e) => {
                self.install(TrackSet::default());
                Err(e)
            }
        }
    }

    /// Flip the facing mode and release every held track
    ///
    /// Re-acquisition follows from the facing-mode change (see `spawn`).
    pub async fn toggle_facing(&self) -> FacingMode {
        let _guard = self.mutation.lock().await;

        let next = self.facing_mode().toggled();
        self.facing.send_replace(next);

        let previous = self.tracks.send_replace(TrackSet::default());
        self.release(&previous);

        info!("Camera facing switched to {}", next);
        next
    }

    /// Release everything; used on teardown
    pub async fn release_all(&self) {
        let _guard = self.mutation.lock().await;
        let previous = self.tracks.send_replace(TrackSet::default());
        self.release(&previous);
    }

    fn install(&self, set: TrackSet) {
        let previous = self.tracks.send_replace(set.clone());
        for track in previous.tracks() {
            if !set.contains(track) {
                track.release();
            }
        }
    }

    /// Acquire now and again after every facing-mode change
    pub fn spawn(self: &Arc<Self>) -> JoinHandle<()> {
        let manager = Arc::clone(self);
        let mut facing_rx = self.facing.subscribe();

        tokio::spawn(async move {
            loop {
                let _ = facing_rx.borrow_and_update();
                if let Err(e) = manager.refresh().await {
                    warn!("Local track acquisition failed: {}", e);
                }
                if facing_rx.changed().await.is_err() {
                    break;
                }
            }
        })
    }
}
