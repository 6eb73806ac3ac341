//! Room composition root
//!
//! `RoomController` wires the session gateway, device tracks, remote track
//! registry, liveness challenges and media operations together and exposes
//! one trigger per operator action.

mod controller;
mod render;
mod status;

pub use controller::{RoomComponents, RoomController};
pub use status::RoomStatus;

use std::path::PathBuf;
use std::time::Duration;

use crate::device::FacingMode;
use crate::inference::SpeechOptions;
use crate::liveness::ActionTiming;
use crate::media::DEFAULT_MIME_TYPE;

/// Which render targets receive media
#[derive(Debug, Clone)]
pub struct RenderSettings {
    pub local_preview: bool,
    pub remote_view: bool,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            local_preview: true,
            remote_view: true,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RoomSettings {
    pub facing: FacingMode,
    pub render: RenderSettings,
    pub timing: ActionTiming,
    pub flash_delay: Duration,
    pub recording_mime_type: String,
    pub recording_file_name: String,
    pub export_dir: PathBuf,
    pub speech: SpeechOptions,
}

impl Default for RoomSettings {
    fn default() -> Self {
        Self {
            facing: FacingMode::User,
            render: RenderSettings::default(),
            timing: ActionTiming::default(),
            flash_delay: Duration::from_millis(3000),
            recording_mime_type: DEFAULT_MIME_TYPE.to_string(),
            recording_file_name: "test.webm".to_string(),
            export_dir: std::env::temp_dir().join("loqa-room"),
            speech: SpeechOptions::default(),
        }
    }
}
