//! Local capture devices
//!
//! `DeviceTrackManager` owns the camera and microphone tracks, re-acquires them
//! when the facing mode is toggled and hands out read-only `LocalTracks` views.

mod capture;
mod manager;

pub use capture::{DeviceCapture, FacingMode};
pub use manager::{DeviceTrackManager, LocalTracks, TrackSet};
