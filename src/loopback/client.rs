use anyhow::{bail, Result};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{debug, info};

use super::devices::{PlaybackLog, VirtualSource};
use crate::rtc::{LocalTrack, MediaKind, RemoteTrack, RoomInfo, RtcClient, TrackEvent};

/// In-process transport session
///
/// Remote participants are simulated with `add_remote_track` and friends.
pub struct LoopbackClient {
    events: broadcast::Sender<TrackEvent>,
    log: PlaybackLog,
    fail_join: AtomicBool,
    join_delay: Mutex<Option<Duration>>,
    joined: AtomicBool,
    published: Mutex<Vec<String>>,
    leaves: AtomicUsize,
}

impl LoopbackClient {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(64);
        Self {
            events,
            log: PlaybackLog::default(),
            fail_join: AtomicBool::new(false),
            join_delay: Mutex::new(None),
            joined: AtomicBool::new(false),
            published: Mutex::new(Vec::new()),
            leaves: AtomicUsize::new(0),
        }
    }

    /// Make subsequent joins fail
    pub fn set_fail_join(&self, fail: bool) {
        self.fail_join.store(fail, Ordering::SeqCst);
    }

    /// Delay subsequent joins
    pub fn set_join_delay(&self, delay: Option<Duration>) {
        if let Ok(mut slot) = self.join_delay.lock() {
            *slot = delay;
        }
    }

    pub fn is_joined(&self) -> bool {
        self.joined.load(Ordering::SeqCst)
    }

    /// Ids of every track published so far, in publish order
    pub fn published(&self) -> Vec<String> {
        self.published.lock().map(|p| p.clone()).unwrap_or_default()
    }

    pub fn leave_count(&self) -> usize {
        self.leaves.load(Ordering::SeqCst)
    }

    /// Playback of simulated remote tracks
    pub fn playback(&self) -> PlaybackLog {
        self.log.clone()
    }

    pub fn emit(&self, event: TrackEvent) {
        // No receivers simply means nobody is following the session yet
        let _ = self.events.send(event);
    }

    /// Simulate a remote participant publishing a track
    pub fn add_remote_track(&self, participant_id: &str, kind: MediaKind) -> RemoteTrack {
        let id = format!("{}-{}", participant_id, uuid::Uuid::new_v4());
        let source = VirtualSource::new(id.clone(), kind, self.log.clone());
        let track = RemoteTrack::new(id, participant_id, kind, Arc::new(source));
        self.emit(TrackEvent::TrackAdded(track.clone()));
        track
    }

    pub fn remove_remote_track(&self, track_id: &str) {
        self.emit(TrackEvent::TrackRemoved {
            track_id: track_id.to_string(),
        });
    }

    pub fn participant_left(&self, participant_id: &str) {
        self.emit(TrackEvent::ParticipantLeft {
            participant_id: participant_id.to_string(),
        });
    }
}

impl Default for LoopbackClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl RtcClient for LoopbackClient {
    async fn join(&self, token: &str) -> Result<RoomInfo> {
        let delay = self.join_delay.lock().ok().and_then(|d| *d);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if self.fail_join.load(Ordering::SeqCst) {
            bail!("loopback join rejected");
        }

        self.joined.store(true, Ordering::SeqCst);

        let room_name = format!("loopback-{}", token.chars().take(8).collect::<String>());
        info!("Loopback joined {}", room_name);

        Ok(RoomInfo {
            room_name,
            user_id: uuid::Uuid::new_v4().to_string(),
        })
    }

    async fn leave(&self) -> Result<()> {
        self.joined.store(false, Ordering::SeqCst);
        self.leaves.fetch_add(1, Ordering::SeqCst);
        info!("Loopback left");
        Ok(())
    }

    async fn publish(&self, tracks: &[LocalTrack]) -> Result<()> {
        if !self.is_joined() {
            bail!("loopback client is not joined");
        }
        if let Ok(mut published) = self.published.lock() {
            for track in tracks {
                debug!("Loopback published {}", track.id());
                published.push(track.id().to_string());
            }
        }
        Ok(())
    }

    fn events(&self) -> broadcast::Receiver<TrackEvent> {
        self.events.subscribe()
    }

    fn name(&self) -> &str {
        "loopback"
    }
}
