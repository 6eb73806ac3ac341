use anyhow::Result;
use base64::Engine;
use std::io::Cursor;

use crate::error::{RoomError, RoomResult};

/// PCM decoded from a synthesized speech payload
#[derive(Debug, Clone)]
pub struct DecodedAudio {
    /// Interleaved 16-bit samples
    pub samples: Vec<i16>,
    pub sample_rate: u32,
    pub channels: u16,
    pub duration_seconds: f64,
}

/// Audio output used for text-to-speech playback
#[async_trait::async_trait]
pub trait AudioPlayer: Send + Sync {
    async fn play(&self, audio: DecodedAudio) -> Result<()>;

    /// Get player name for logging
    fn name(&self) -> &str;
}

/// Decode a base64 WAV payload, optionally wrapped in a `data:` URL
pub fn decode_wav_base64(payload: &str) -> RoomResult<DecodedAudio> {
    let encoded = match payload.split_once(";base64,") {
        Some((prefix, data)) if prefix.starts_with("data:") => data,
        _ => payload,
    };

    let bytes = base64::engine::general_purpose::STANDARD
        .decode(encoded.trim())
        .map_err(|e| RoomError::Playback(format!("invalid base64 audio: {}", e)))?;

    decode_wav(&bytes)
}

pub fn decode_wav(bytes: &[u8]) -> RoomResult<DecodedAudio> {
    let reader = hound::WavReader::new(Cursor::new(bytes))
        .map_err(|e| RoomError::Playback(format!("invalid WAV payload: {}", e)))?;

    let spec = reader.spec();
    let samples: Vec<i16> = match (spec.sample_format, spec.bits_per_sample) {
        (hound::SampleFormat::Int, bits) if bits <= 16 => reader
            .into_samples::<i16>()
            .collect::<Result<Vec<_>, _>>(),
        (hound::SampleFormat::Int, bits) => {
            let shift = bits.saturating_sub(16) as u32;
            reader
                .into_samples::<i32>()
                .map(|s| s.map(|s| (s >> shift) as i16))
                .collect::<Result<Vec<_>, _>>()
        }
        (hound::SampleFormat::Float, _) => reader
            .into_samples::<f32>()
            .map(|s| s.map(|s| (s.clamp(-1.0, 1.0) * i16::MAX as f32) as i16))
            .collect::<Result<Vec<_>, _>>(),
    }
    .map_err(|e| RoomError::Playback(format!("failed to read WAV samples: {}", e)))?;

    if spec.channels == 0 || spec.sample_rate == 0 {
        return Err(RoomError::Playback("WAV payload has no audio format".to_string()));
    }

    let duration_seconds =
        samples.len() as f64 / (spec.sample_rate as f64 * spec.channels as f64);

    Ok(DecodedAudio {
        samples,
        sample_rate: spec.sample_rate,
        channels: spec.channels,
        duration_seconds,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wav_bytes(samples: &[i16], sample_rate: u32) -> Vec<u8> {
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut cursor = Cursor::new(Vec::new());
        {
            let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
            for &sample in samples {
                writer.write_sample(sample).unwrap();
            }
            writer.finalize().unwrap();
        }
        cursor.into_inner()
    }

    #[test]
    fn decodes_plain_and_data_url_payloads() {
        let bytes = wav_bytes(&[0i16; 1600], 16000);
        let encoded = base64::engine::general_purpose::STANDARD.encode(&bytes);

        let audio = decode_wav_base64(&encoded).unwrap();
        assert_eq!(audio.sample_rate, 16000);
        assert_eq!(audio.channels, 1);
        assert_eq!(audio.samples.len(), 1600);
        assert!((audio.duration_seconds - 0.1).abs() < 0.001);

        let data_url = format!("data:audio/wav;base64,{}", encoded);
        assert_eq!(decode_wav_base64(&data_url).unwrap().samples.len(), 1600);
    }

    #[test]
    fn rejects_garbage() {
        assert!(matches!(
            decode_wav_base64("not base64!"),
            Err(RoomError::Playback(_))
        ));

        let not_wav = base64::engine::general_purpose::STANDARD.encode(b"hello");
        assert!(matches!(decode_wav_base64(&not_wav), Err(RoomError::Playback(_))));
    }
}
