use anyhow::{Context, Result};
use base64::Engine;
use serde_json::Value;
use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

use super::speech::{decode_wav_base64, AudioPlayer, DecodedAudio};
use crate::device::LocalTracks;
use crate::error::{RoomError, RoomResult};
use crate::inference::InferenceService;
use crate::notify::NotificationCenter;
use crate::rtc::{LocalTrack, TrackRole};

/// User-supplied image for face comparison
#[derive(Debug, Clone)]
pub struct ReferenceImage {
    pub mime: String,
    pub data: Vec<u8>,
}

impl ReferenceImage {
    pub fn new(mime: impl Into<String>, data: Vec<u8>) -> RoomResult<Self> {
        let mime = mime.into();
        if !mime.starts_with("image/") {
            return Err(RoomError::Misuse(format!(
                "reference must be an image, got {}",
                mime
            )));
        }
        if data.is_empty() {
            return Err(RoomError::Misuse("reference image is empty".to_string()));
        }
        Ok(Self { mime, data })
    }

    /// Read an image file, inferring the mime type from its extension
    pub async fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mime = match path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .as_deref()
        {
            Some("jpg") | Some("jpeg") => "image/jpeg",
            Some("png") => "image/png",
            Some("gif") => "image/gif",
            Some("webp") => "image/webp",
            Some("bmp") => "image/bmp",
            _ => anyhow::bail!("unsupported image type: {}", path.display()),
        };

        let data = tokio::fs::read(path)
            .await
            .with_context(|| format!("Failed to read image {}", path.display()))?;

        Ok(Self::new(mime, data)?)
    }

    /// Encode as a `data:<mime>;base64,...` URL
    pub fn to_data_url(&self) -> String {
        format!(
            "data:{};base64,{}",
            self.mime,
            base64::engine::general_purpose::STANDARD.encode(&self.data)
        )
    }
}

/// One-shot analysis requests over the current local tracks
///
/// Each operation resolves its track at call time, issues exactly one remote
/// call and reports the outcome to the operator.
pub struct MediaOperations {
    inference: Arc<dyn InferenceService>,
    tracks: LocalTracks,
    player: Arc<dyn AudioPlayer>,
    notifier: NotificationCenter,
}

impl MediaOperations {
    pub fn new(
        inference: Arc<dyn InferenceService>,
        tracks: LocalTracks,
        player: Arc<dyn AudioPlayer>,
        notifier: NotificationCenter,
    ) -> Self {
        Self {
            inference,
            tracks,
            player,
            notifier,
        }
    }

    pub async fn recognize_id_card(&self) -> RoomResult<Value> {
        self.on_camera("ID card recognition", |camera| async move {
            self.inference.detect_id_card(&camera).await
        })
        .await
    }

    pub async fn detect_face(&self) -> RoomResult<Value> {
        self.on_camera("Face detection", |camera| async move {
            self.inference.detect_face(&camera).await
        })
        .await
    }

    pub async fn compare_face(&self, reference: &ReferenceImage) -> RoomResult<Value> {
        let image = reference.to_data_url();
        self.on_camera("Face comparison", |camera| async move {
            self.inference.compare_face(&camera, &image).await
        })
        .await
    }

    /// Synthesize `text` and play it
    pub async fn speak(&self, text: &str) -> RoomResult<DecodedAudio> {
        let title = "Text to speech";
        let result = self.synthesize(text).await;

        match result {
            Ok(audio) => {
                if let Err(e) = self.player.play(audio.clone()).await {
                    let err = RoomError::Playback(format!("{:#}", e));
                    self.notifier.failure(format!("{} playback failed", title), &err);
                    return Err(err);
                }
                info!(
                    "Played {:.1}s of synthesized speech via {}",
                    audio.duration_seconds,
                    self.player.name()
                );
                Ok(audio)
            }
            Err(e) => {
                self.notifier.failure(format!("{} failed", title), &e);
                Err(e)
            }
        }
    }

    async fn synthesize(&self, text: &str) -> RoomResult<DecodedAudio> {
        if text.trim().is_empty() {
            return Err(RoomError::Misuse("nothing to synthesize".to_string()));
        }
        let payload = self.inference.text_to_speech(text).await?;
        decode_wav_base64(&payload.audio)
    }

    async fn on_camera<'a, F, Fut>(&'a self, title: &str, call: F) -> RoomResult<Value>
    where
        F: FnOnce(LocalTrack) -> Fut,
        Fut: Future<Output = RoomResult<Value>> + 'a,
    {
        let outcome = match self.tracks.require(TrackRole::Camera) {
            Ok(camera) => {
                info!("{} on camera track {}", title, camera.id());
                call(camera).await
            }
            Err(e) => Err(e),
        };

        match &outcome {
            Ok(result) => self.notifier.result(title, result),
            Err(e) => self.notifier.failure(format!("{} failed", title), e),
        }

        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_url_uses_mime_and_base64() {
        let image = ReferenceImage::new("image/png", vec![1, 2, 3]).unwrap();
        assert_eq!(image.to_data_url(), "data:image/png;base64,AQID");
    }

    #[test]
    fn rejects_non_images() {
        assert!(ReferenceImage::new("text/plain", vec![1]).is_err());
        assert!(ReferenceImage::new("image/png", Vec::new()).is_err());
    }

    #[tokio::test]
    async fn reads_reference_from_disk() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("face.JPG");
        tokio::fs::write(&path, [0xffu8, 0xd8, 0xff]).await?;

        let image = ReferenceImage::from_path(&path).await?;
        assert_eq!(image.mime, "image/jpeg");
        assert_eq!(image.data.len(), 3);

        assert!(ReferenceImage::from_path(dir.path().join("notes.txt")).await.is_err());
        Ok(())
    }
}
