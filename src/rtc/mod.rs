//! Transport session plumbing
//!
//! - `SessionGateway` owns join/leave and publishes local tracks
//! - `RemoteTrackRegistry` mirrors the remote tracks of a joined session
//! - `RtcClient` is the seam to the concrete transport SDK

mod client;
mod gateway;
mod remote;
mod track;

pub use client::{RoomInfo, RtcClient, TrackEvent};
pub use gateway::{SessionGateway, SessionHandle, SessionState};
pub use remote::RemoteTrackRegistry;
pub use track::{
    LocalTrack, MediaKind, MediaSample, MediaSource, RemoteTrack, RenderTarget, TrackRole,
    TrackSummary,
};
