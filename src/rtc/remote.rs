use std::sync::Arc;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::client::TrackEvent;
use super::gateway::{SessionGateway, SessionState};
use super::track::RemoteTrack;

/// Current set of remote tracks, in subscription order
pub struct RemoteTrackRegistry {
    tracks: watch::Sender<Vec<RemoteTrack>>,
}

impl RemoteTrackRegistry {
    pub fn new() -> Self {
        let (tracks, _) = watch::channel(Vec::new());
        Self { tracks }
    }

    pub fn current(&self) -> Vec<RemoteTrack> {
        self.tracks.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Vec<RemoteTrack>> {
        self.tracks.subscribe()
    }

    /// Apply a single subscription change
    pub fn apply(&self, event: TrackEvent) {
        match event {
            TrackEvent::TrackAdded(track) => {
                info!(
                    "Remote {:?} track {} from {}",
                    track.kind, track.id, track.participant_id
                );
                self.tracks.send_modify(|tracks| {
                    match tracks.iter_mut().find(|t| t.id == track.id) {
                        Some(existing) => *existing = track,
                        None => tracks.push(track),
                    }
                });
            }
            TrackEvent::TrackRemoved { track_id } => {
                self.tracks.send_if_modified(|tracks| {
                    let before = tracks.len();
                    tracks.retain(|t| t.id != track_id);
                    before != tracks.len()
                });
                debug!("Remote track {} removed", track_id);
            }
            TrackEvent::ParticipantLeft { participant_id } => {
                self.tracks.send_if_modified(|tracks| {
                    let before = tracks.len();
                    tracks.retain(|t| t.participant_id != participant_id);
                    before != tracks.len()
                });
                info!("Participant {} left", participant_id);
            }
        }
    }

    fn clear(&self) {
        self.tracks.send_if_modified(|tracks| {
            let changed = !tracks.is_empty();
            tracks.clear();
            changed
        });
    }

    /// Follow transport notifications for the lifetime of the session
    ///
    /// Events are subscribed when the task is spawned so tracks announced at
    /// join are not missed. Events seen while joining are held until the
    /// gateway reports `Joined`; anything before that is dropped. The registry
    /// is cleared when the session is left.
    pub fn spawn(self: &Arc<Self>, gateway: Arc<SessionGateway>) -> JoinHandle<()> {
        let registry = Arc::clone(self);
        let mut state_rx = gateway.subscribe();
        let mut events = gateway.client().events();

        tokio::spawn(async move {
            let mut pending = Vec::new();
            loop {
                let state = *state_rx.borrow_and_update();
                match state {
                    SessionState::Joined => break,
                    SessionState::Left => return,
                    SessionState::Unjoined => pending.clear(),
                    SessionState::Joining => {}
                }
                tokio::select! {
                    changed = state_rx.changed() => {
                        if changed.is_err() {
                            return;
                        }
                    }
                    event = events.recv() => match event {
                        Ok(event) => {
                            if gateway.state() != SessionState::Unjoined {
                                pending.push(event);
                            }
                        }
                        Err(broadcast::error::RecvError::Lagged(skipped)) => {
                            warn!("Remote track registry lagged, {} event(s) skipped", skipped);
                        }
                        Err(broadcast::error::RecvError::Closed) => return,
                    }
                }
            }

            info!(
                "Remote track registry following session events ({} held)",
                pending.len()
            );
            for event in pending.drain(..) {
                registry.apply(event);
            }

            loop {
                tokio::select! {
                    changed = state_rx.changed() => {
                        if changed.is_err() || *state_rx.borrow() != SessionState::Joined {
                            break;
                        }
                    }
                    event = events.recv() => match event {
                        Ok(event) => registry.apply(event),
                        Err(broadcast::error::RecvError::Lagged(skipped)) => {
                            warn!("Remote track registry lagged, {} event(s) skipped", skipped);
                        }
                        Err(broadcast::error::RecvError::Closed) => break,
                    }
                }
            }

            registry.clear();
            info!("Remote track registry stopped");
        })
    }
}

impl Default for RemoteTrackRegistry {
    fn default() -> Self {
        Self::new()
    }
}
