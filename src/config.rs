use anyhow::{ensure, Context, Result};
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

use crate::device::FacingMode;
use crate::inference::{HotWord, SpeechOptions};
use crate::liveness::ActionTiming;
use crate::media::{DEFAULT_MIME_TYPE, RECORD_MIME_TYPES};
use crate::nats::NatsSettings;
use crate::room::{RenderSettings, RoomSettings};

/// Environment variables override file values, e.g. `LOQA_ROOM__ROOM__TOKEN`
const ENV_PREFIX: &str = "LOQA_ROOM";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub service: ServiceConfig,
    pub room: RoomConfig,
    pub liveness: LivenessConfig,
    pub recording: RecordingConfig,
    pub inference: InferenceConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub name: String,
    pub http: HttpConfig,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: "loqa-room".to_string(),
            http: HttpConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub bind: String,
    pub port: u16,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1".to_string(),
            port: 3100,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RoomConfig {
    /// Opaque room token; may also be given on the command line
    pub token: Option<String>,
    pub facing: FacingMode,
    /// Play the local camera into the preview target
    pub local_preview: bool,
    /// Play remote tracks into the remote view target
    pub remote_view: bool,
}

impl Default for RoomConfig {
    fn default() -> Self {
        Self {
            token: None,
            facing: FacingMode::User,
            local_preview: true,
            remote_view: true,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LivenessConfig {
    pub countdown: u32,
    pub tick_ms: u64,
    pub flash_delay_ms: u64,
}

impl Default for LivenessConfig {
    fn default() -> Self {
        Self {
            countdown: 3,
            tick_ms: 1000,
            flash_delay_ms: 3000,
        }
    }
}

impl LivenessConfig {
    pub fn timing(&self) -> ActionTiming {
        ActionTiming {
            countdown: self.countdown,
            tick: Duration::from_millis(self.tick_ms),
        }
    }

    pub fn flash_delay(&self) -> Duration {
        Duration::from_millis(self.flash_delay_ms)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RecordingConfig {
    pub mime_type: String,
    pub file_name: String,
    /// Export directory; `~` is expanded
    pub export_dir: String,
}

impl Default for RecordingConfig {
    fn default() -> Self {
        Self {
            mime_type: DEFAULT_MIME_TYPE.to_string(),
            file_name: "test.webm".to_string(),
            export_dir: "~/Downloads".to_string(),
        }
    }
}

impl RecordingConfig {
    pub fn export_dir(&self) -> PathBuf {
        PathBuf::from(shellexpand::tilde(&self.export_dir).into_owned())
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct InferenceConfig {
    pub nats_url: String,
    pub request_timeout_ms: u64,
    pub sample_interval_ms: u64,
    pub max_frames: usize,
    /// Speech bias list, `word,weight;word,weight`
    pub hot_words: String,
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            nats_url: "nats://localhost:4222".to_string(),
            request_timeout_ms: 15_000,
            sample_interval_ms: 200,
            max_frames: 50,
            hot_words: "清楚,10;清晰,1".to_string(),
        }
    }
}

impl InferenceConfig {
    pub fn nats_settings(&self) -> NatsSettings {
        NatsSettings {
            request_timeout: Duration::from_millis(self.request_timeout_ms),
            sample_interval: Duration::from_millis(self.sample_interval_ms),
            max_frames: self.max_frames,
        }
    }

    pub fn speech_options(&self) -> Result<SpeechOptions> {
        Ok(SpeechOptions {
            hot_words: HotWord::parse_list(&self.hot_words)?,
        })
    }
}

impl Config {
    /// Load `path` (extension optional, file optional) plus environment overrides
    pub fn load(path: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path).required(false))
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .with_context(|| format!("Failed to read config {}", path))?;

        let cfg: Config = settings
            .try_deserialize()
            .context("Invalid configuration")?;
        cfg.validate()?;

        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        ensure!(self.liveness.tick_ms > 0, "liveness.tick_ms must be positive");
        ensure!(
            self.inference.sample_interval_ms > 0,
            "inference.sample_interval_ms must be positive"
        );
        ensure!(
            self.inference.request_timeout_ms > 0,
            "inference.request_timeout_ms must be positive"
        );
        ensure!(
            RECORD_MIME_TYPES.contains(&self.recording.mime_type.as_str()),
            "unsupported recording mime type: {}",
            self.recording.mime_type
        );
        HotWord::parse_list(&self.inference.hot_words).context("Invalid inference.hot_words")?;
        Ok(())
    }

    /// Settings for the room controller
    pub fn room_settings(&self) -> Result<RoomSettings> {
        Ok(RoomSettings {
            facing: self.room.facing,
            render: RenderSettings {
                local_preview: self.room.local_preview,
                remote_view: self.room.remote_view,
            },
            timing: self.liveness.timing(),
            flash_delay: self.liveness.flash_delay(),
            recording_mime_type: self.recording.mime_type.clone(),
            recording_file_name: self.recording.file_name.clone(),
            export_dir: self.recording.export_dir(),
            speech: self.inference.speech_options()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_are_valid() {
        let cfg = Config::default();
        cfg.validate().unwrap();
        assert_eq!(cfg.liveness.timing().countdown, 3);
        assert_eq!(cfg.liveness.flash_delay(), Duration::from_millis(3000));
        assert_eq!(cfg.inference.speech_options().unwrap().hot_words.len(), 2);
        assert!(!cfg.recording.export_dir().to_string_lossy().starts_with('~'));
    }

    #[test]
    fn loads_partial_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            "[room]\nfacing = \"environment\"\n\n[liveness]\ncountdown = 5\n\n[service.http]\nport = 9000"
        )
        .unwrap();

        let cfg = Config::load(file.path().to_str().unwrap()).unwrap();
        assert_eq!(cfg.room.facing, FacingMode::Environment);
        assert_eq!(cfg.liveness.countdown, 5);
        assert_eq!(cfg.liveness.tick_ms, 1000);
        assert_eq!(cfg.service.http.port, 9000);
        assert_eq!(cfg.service.http.bind, "127.0.0.1");
    }

    #[test]
    fn rejects_malformed_hot_words() {
        let mut cfg = Config::default();
        cfg.inference.hot_words = "清楚;10".to_string();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn rejects_unknown_recording_format() {
        let mut cfg = Config::default();
        cfg.recording.mime_type = "video/avi".to_string();
        assert!(cfg.validate().is_err());
    }
}
