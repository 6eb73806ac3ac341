use anyhow::Result;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use super::track::{LocalTrack, RemoteTrack};

/// Subscription change reported by the transport session
#[derive(Debug, Clone)]
pub enum TrackEvent {
    /// A remote track was subscribed
    TrackAdded(RemoteTrack),
    /// A remote track was unpublished
    TrackRemoved { track_id: String },
    /// A remote participant left together with all of its tracks
    ParticipantLeft { participant_id: String },
}

/// Room details returned by a successful join
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoomInfo {
    pub room_name: String,
    pub user_id: String,
}

/// Transport session SDK
///
/// Implementations wrap a concrete real-time transport. The loopback client in
/// `crate::loopback` runs entirely in process.
#[async_trait::async_trait]
pub trait RtcClient: Send + Sync {
    /// Join the room identified by an opaque token
    async fn join(&self, token: &str) -> Result<RoomInfo>;

    /// Leave the room
    async fn leave(&self) -> Result<()>;

    /// Publish local tracks to the room
    async fn publish(&self, tracks: &[LocalTrack]) -> Result<()>;

    /// Subscribe to remote track notifications
    fn events(&self) -> broadcast::Receiver<TrackEvent>;

    /// Get client name for logging
    fn name(&self) -> &str;
}
