use base64::Engine;
use futures::stream::StreamExt;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use super::client::NatsInference;
use super::messages::{AudioFrameMessage, SpeechCommand, SpeechControlMessage, TranscriptMessage};
use crate::error::{RoomError, RoomResult};
use crate::inference::{HotWord, SpeechAnalyzer, SpeechOptions, SpeechStream, TranscriptFragment};
use crate::rtc::{LocalTrack, MediaSample};

const SUBJECT_CONTROL: &str = "stt.control";
const SUBJECT_TRANSCRIPTS: &str = "stt.text.>";

/// Streams microphone audio to the STT service and forwards its transcripts
pub struct NatsSpeechAnalyzer {
    inference: NatsInference,

    /// Whether audio is currently being streamed
    streaming: Arc<AtomicBool>,

    /// Frame sequence counter
    sequence: Arc<AtomicU32>,

    audio_task: Option<JoinHandle<()>>,
    transcript_task: Option<JoinHandle<()>>,
}

impl NatsSpeechAnalyzer {
    pub(crate) async fn start(
        inference: NatsInference,
        microphone: LocalTrack,
        options: &SpeechOptions,
    ) -> RoomResult<SpeechStream> {
        let session_id = inference.session_id().to_string();

        // Subscribe before announcing the stream so no transcript is missed
        let mut transcript_sub = inference
            .client()
            .subscribe(SUBJECT_TRANSCRIPTS.to_string())
            .await
            .map_err(|e| RoomError::remote(None, format!("failed to subscribe to transcripts: {}", e)))?;

        inference
            .publish(
                SUBJECT_CONTROL.to_string(),
                &SpeechControlMessage {
                    session_id: session_id.clone(),
                    command: SpeechCommand::Start,
                    hot_words: HotWord::format_list(&options.hot_words),
                },
            )
            .await
            .map_err(|e| RoomError::remote(None, format!("{:#}", e)))?;

        let streaming = Arc::new(AtomicBool::new(true));
        let sequence = Arc::new(AtomicU32::new(0));
        let (transcript_tx, transcript_rx) = mpsc::channel(100);

        // Spawn transcript receiving task
        let transcript_session = session_id.clone();
        let transcript_task = tokio::spawn(async move {
            info!("Transcript receiving task started");

            while let Some(msg) = transcript_sub.next().await {
                match serde_json::from_slice::<TranscriptMessage>(&msg.payload) {
                    Ok(transcript) => {
                        // Filter by session_id
                        if transcript.session_id != transcript_session {
                            continue;
                        }

                        let fragment = TranscriptFragment {
                            transcript: transcript.text,
                            is_final: !transcript.partial,
                            confidence: transcript.confidence,
                        };
                        if transcript_tx.send(fragment).await.is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        warn!("Failed to parse transcript message: {}", e);
                    }
                }
            }

            info!("Transcript receiving task stopped");
        });

        // Spawn audio streaming task
        let audio_inference = inference.clone();
        let audio_streaming = Arc::clone(&streaming);
        let audio_sequence = Arc::clone(&sequence);
        let interval = inference.settings().sample_interval;
        let subject = audio_subject(&session_id);

        let audio_task = tokio::spawn(async move {
            info!("Audio streaming task started");
            let mut ticker = tokio::time::interval(interval);

            while audio_streaming.load(Ordering::SeqCst) {
                ticker.tick().await;

                let (samples, sample_rate, channels) = match microphone.grab() {
                    Ok(MediaSample::Audio {
                        samples,
                        sample_rate,
                        channels,
                    }) => (samples, sample_rate, channels),
                    Ok(MediaSample::Image { .. }) => {
                        error!("Microphone track produced a video frame");
                        break;
                    }
                    Err(e) => {
                        warn!("Microphone sampling stopped: {:#}", e);
                        break;
                    }
                };

                let pcm_bytes: Vec<u8> = samples.iter().flat_map(|s| s.to_le_bytes()).collect();
                let message = AudioFrameMessage {
                    session_id: audio_inference.session_id().to_string(),
                    sequence: audio_sequence.fetch_add(1, Ordering::SeqCst),
                    pcm: base64::engine::general_purpose::STANDARD.encode(&pcm_bytes),
                    sample_rate,
                    channels,
                    timestamp: chrono::Utc::now().to_rfc3339(),
                    final_frame: false,
                };

                if let Err(e) = audio_inference.publish(subject.clone(), &message).await {
                    error!("Failed to publish audio frame: {:#}", e);
                }
            }

            info!("Audio streaming task stopped");
        });

        let analyzer = NatsSpeechAnalyzer {
            inference,
            streaming,
            sequence,
            audio_task: Some(audio_task),
            transcript_task: Some(transcript_task),
        };

        Ok(SpeechStream {
            analyzer: Box::new(analyzer),
            transcripts: transcript_rx,
        })
    }
}

fn audio_subject(session_id: &str) -> String {
    format!("audio.frame.{}", session_id)
}

#[async_trait::async_trait]
impl SpeechAnalyzer for NatsSpeechAnalyzer {
    async fn stop(&mut self) -> RoomResult<()> {
        if !self.streaming.swap(false, Ordering::SeqCst) {
            return Ok(());
        }

        if let Some(task) = self.audio_task.take() {
            task.abort();
        }
        if let Some(task) = self.transcript_task.take() {
            task.abort();
        }

        let session_id = self.inference.session_id().to_string();

        // Send final frame
        let final_frame = AudioFrameMessage {
            session_id: session_id.clone(),
            sequence: self.sequence.load(Ordering::SeqCst),
            pcm: String::new(),
            sample_rate: 16000,
            channels: 1,
            timestamp: chrono::Utc::now().to_rfc3339(),
            final_frame: true,
        };
        self.inference
            .publish(audio_subject(&session_id), &final_frame)
            .await
            .map_err(|e| RoomError::remote(None, format!("{:#}", e)))?;

        self.inference
            .publish(
                SUBJECT_CONTROL.to_string(),
                &SpeechControlMessage {
                    session_id,
                    command: SpeechCommand::Stop,
                    hot_words: String::new(),
                },
            )
            .await
            .map_err(|e| RoomError::remote(None, format!("{:#}", e)))?;

        Ok(())
    }
}

impl Drop for NatsSpeechAnalyzer {
    fn drop(&mut self) {
        self.streaming.store(false, Ordering::SeqCst);
        if let Some(task) = self.audio_task.take() {
            task.abort();
        }
        if let Some(task) = self.transcript_task.take() {
            task.abort();
        }
    }
}
