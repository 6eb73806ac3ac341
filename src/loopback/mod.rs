//! In-process collaborators
//!
//! Stand-ins for the transport SDK, capture devices, recorder and audio
//! output. The binary runs on them when no vendor SDK is linked, and the
//! tests drive them directly.

mod client;
mod devices;
mod player;
mod recorder;

pub use client::LoopbackClient;
pub use devices::{Playback, PlaybackLog, VirtualDevices, VirtualSource};
pub use player::LogPlayer;
pub use recorder::{LoopbackRecorder, LoopbackRecorderFactory};
