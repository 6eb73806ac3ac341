use anyhow::Result;
use std::sync::Mutex;
use tracing::info;

use crate::media::{AudioPlayer, DecodedAudio};

/// Audio output that only logs what it would have played
#[derive(Default)]
pub struct LogPlayer {
    played: Mutex<Vec<f64>>,
}

impl LogPlayer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Durations in seconds of everything played so far
    pub fn played(&self) -> Vec<f64> {
        self.played.lock().map(|p| p.clone()).unwrap_or_default()
    }
}

#[async_trait::async_trait]
impl AudioPlayer for LogPlayer {
    async fn play(&self, audio: DecodedAudio) -> Result<()> {
        info!(
            "Playing {:.2}s of audio ({} Hz, {} channel(s))",
            audio.duration_seconds, audio.sample_rate, audio.channels
        );
        if let Ok(mut played) = self.played.lock() {
            played.push(audio.duration_seconds);
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "log"
    }
}
