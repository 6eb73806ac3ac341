use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use tokio::sync::watch;
use tracing::{info, warn};

use super::client::{RoomInfo, RtcClient};
use super::track::LocalTrack;
use crate::error::{RoomError, RoomResult};

/// Lifecycle of the transport session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    Unjoined,
    Joining,
    Joined,
    Left,
}

impl Default for SessionState {
    fn default() -> Self {
        Self::Unjoined
    }
}

/// Handle to a joined session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionHandle {
    pub session_id: String,
    pub room: RoomInfo,
    pub joined_at: DateTime<Utc>,
}

/// Owns join/leave of the transport session
pub struct SessionGateway {
    client: Arc<dyn RtcClient>,
    state: watch::Sender<SessionState>,
    handle: Mutex<Option<SessionHandle>>,
}

impl SessionGateway {
    pub fn new(client: Arc<dyn RtcClient>) -> Self {
        let (state, _) = watch::channel(SessionState::Unjoined);
        Self {
            client,
            state,
            handle: Mutex::new(None),
        }
    }

    pub fn client(&self) -> &Arc<dyn RtcClient> {
        &self.client
    }

    pub fn state(&self) -> SessionState {
        *self.state.borrow()
    }

    pub fn is_joined(&self) -> bool {
        self.state() == SessionState::Joined
    }

    /// Observe session state changes
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    pub fn handle(&self) -> Option<SessionHandle> {
        self.handle.lock().ok().and_then(|handle| handle.clone())
    }

    /// Join the room identified by `token`
    ///
    /// A failed join returns to `Unjoined` so the caller may retry. If the
    /// session is left while the join is in flight, the late join is left
    /// immediately and reported as a join error.
    pub async fn join(&self, token: &str) -> RoomResult<SessionHandle> {
        if token.trim().is_empty() {
            return Err(RoomError::Join("room token is empty".to_string()));
        }

        let mut rejected = None;
        self.state.send_if_modified(|state| match state {
            SessionState::Unjoined => {
                *state = SessionState::Joining;
                true
            }
            SessionState::Joining => {
                rejected = Some(RoomError::Misuse("join already in progress".to_string()));
                false
            }
            SessionState::Joined => {
                rejected = Some(RoomError::Misuse("session already joined".to_string()));
                false
            }
            SessionState::Left => {
                rejected = Some(RoomError::Misuse("session has been left".to_string()));
                false
            }
        });
        if let Some(err) = rejected {
            return Err(err);
        }

        info!("Joining room via {}", self.client.name());

        let room = match self.client.join(token).await {
            Ok(room) => room,
            Err(e) => {
                self.state.send_if_modified(|state| {
                    if *state == SessionState::Joining {
                        *state = SessionState::Unjoined;
                        true
                    } else {
                        false
                    }
                });
                return Err(RoomError::Join(format!("{:#}", e)));
            }
        };

        if self.state() == SessionState::Left {
            warn!("Session left while joining, leaving {}", room.room_name);
            if let Err(e) = self.client.leave().await {
                warn!("Failed to leave late-joined room: {:#}", e);
            }
            return Err(RoomError::Join(
                "session was left before join completed".to_string(),
            ));
        }

        let handle = SessionHandle {
            session_id: uuid::Uuid::new_v4().to_string(),
            room,
            joined_at: Utc::now(),
        };

        if let Ok(mut slot) = self.handle.lock() {
            *slot = Some(handle.clone());
        }
        self.state.send_replace(SessionState::Joined);

        info!(
            "Joined room {} as {} (session {})",
            handle.room.room_name, handle.room.user_id, handle.session_id
        );

        Ok(handle)
    }

    /// Leave the session
    ///
    /// Idempotent. Only calls into the transport when the session is joined.
    pub async fn leave(&self) -> RoomResult<()> {
        let previous = self.state.send_replace(SessionState::Left);

        match previous {
            SessionState::Joined => {
                if let Ok(mut slot) = self.handle.lock() {
                    slot.take();
                }
                info!("Leaving room");
                if let Err(e) = self.client.leave().await {
                    warn!("Transport leave failed: {:#}", e);
                }
            }
            SessionState::Joining => {
                info!("Leave requested while joining; join result will be discarded");
            }
            SessionState::Unjoined | SessionState::Left => {}
        }

        Ok(())
    }

    /// Publish local tracks; released tracks are skipped
    pub async fn publish(&self, tracks: &[LocalTrack]) -> Result<()> {
        if !self.is_joined() {
            anyhow::bail!("cannot publish before the session is joined");
        }

        let active: Vec<LocalTrack> = tracks.iter().filter(|t| t.is_active()).cloned().collect();
        if active.is_empty() {
            return Ok(());
        }

        self.client
            .publish(&active)
            .await
            .context("Failed to publish local tracks")?;

        info!("Published {} local track(s)", active.len());

        Ok(())
    }
}
