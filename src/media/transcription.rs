use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::{oneshot, watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::device::LocalTracks;
use crate::error::{RoomError, RoomResult};
use crate::inference::{
    InferenceService, SpeechAnalyzer, SpeechOptions, SpeechStream, TranscriptFragment,
};
use crate::notify::NotificationCenter;
use crate::rtc::{LocalTrack, TrackRole};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TranscriptionState {
    Idle,
    Listening,
}

/// A single transcript segment from the speech service
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptSegment {
    /// Transcribed text
    pub text: String,

    /// When this segment was received
    pub timestamp: DateTime<Utc>,

    /// Confidence score (0.0 to 1.0), if available
    pub confidence: Option<f32>,

    /// Whether this is a partial (interim) result
    pub partial: bool,
}

/// Most segments kept; older ones are dropped first
const MAX_SEGMENTS: usize = 1000;

/// Handle to the task driving one listening session
struct ActiveSession {
    stop: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

/// State shared between the session and its driver task
#[derive(Clone)]
struct Shared {
    inference: Arc<dyn InferenceService>,
    options: SpeechOptions,
    notifier: NotificationCenter,
    state: Arc<watch::Sender<TranscriptionState>>,
    caption: Arc<watch::Sender<Option<String>>>,
    segments: Arc<Mutex<VecDeque<TranscriptSegment>>>,
}

impl Shared {
    async fn record(&self, fragment: TranscriptFragment) {
        let text = fragment.transcript.trim();
        if text.is_empty() {
            return;
        }

        self.caption.send_replace(Some(text.to_string()));

        let mut segments = self.segments.lock().await;
        if segments.len() == MAX_SEGMENTS {
            segments.pop_front();
        }
        segments.push_back(TranscriptSegment {
            text: text.to_string(),
            timestamp: Utc::now(),
            confidence: fragment.confidence,
            partial: !fragment.is_final,
        });
    }

    async fn stop_analyzer(&self, analyzer: Option<Box<dyn SpeechAnalyzer>>) {
        if let Some(mut analyzer) = analyzer {
            if let Err(e) = analyzer.stop().await {
                warn!("Speech analyzer did not stop cleanly: {}", e);
                self.notifier.failure("Speech to text stop failed", &e);
            }
        }
    }

    /// Drive one listening session until stopped or the microphone is lost
    ///
    /// When the microphone is replaced (e.g. after a facing toggle) the
    /// analyzer is restarted on the new track.
    async fn run(
        self,
        mut tracks: LocalTracks,
        mut microphone: LocalTrack,
        stream: SpeechStream,
        mut stop: oneshot::Receiver<()>,
    ) {
        let mut analyzer = Some(stream.analyzer);
        let mut transcripts = stream.transcripts;
        let mut transcripts_open = true;

        loop {
            tokio::select! {
                _ = &mut stop => break,
                fragment = transcripts.recv(), if transcripts_open => match fragment {
                    Some(fragment) => self.record(fragment).await,
                    None => {
                        debug!("Transcript stream closed");
                        transcripts_open = false;
                    }
                },
                changed = tracks.changed() => {
                    if !changed {
                        break;
                    }
                    let set = tracks.current();
                    let current = set.microphone().filter(|m| m.is_active());
                    if analyzer.is_some()
                        && current.map(|m| m.id() == microphone.id()).unwrap_or(false)
                    {
                        continue;
                    }

                    // The bound microphone is gone
                    self.stop_analyzer(analyzer.take()).await;
                    transcripts_open = false;

                    if set.is_empty() {
                        debug!("Waiting for local tracks to be re-acquired");
                        continue;
                    }

                    let Some(next) = current.cloned() else {
                        let e = RoomError::DeviceUnavailable(TrackRole::Microphone);
                        self.notifier.failure("Speech to text interrupted", &e);
                        self.state.send_replace(TranscriptionState::Idle);
                        return;
                    };

                    match self.inference.start_speech_to_text(&next, &self.options).await {
                        Ok(stream) => {
                            info!("Speech to text moved to microphone {}", next.id());
                            analyzer = Some(stream.analyzer);
                            transcripts = stream.transcripts;
                            transcripts_open = true;
                            microphone = next;
                        }
                        Err(e) => {
                            self.notifier.failure("Speech to text interrupted", &e);
                            self.state.send_replace(TranscriptionState::Idle);
                            return;
                        }
                    }
                }
            }
        }

        self.stop_analyzer(analyzer.take()).await;
        self.state.send_replace(TranscriptionState::Idle);
    }
}

/// Streaming speech-to-text over the microphone track
pub struct TranscriptionSession {
    tracks: LocalTracks,
    shared: Shared,
    active: Mutex<Option<ActiveSession>>,
}

impl TranscriptionSession {
    pub fn new(
        inference: Arc<dyn InferenceService>,
        tracks: LocalTracks,
        options: SpeechOptions,
        notifier: NotificationCenter,
    ) -> Self {
        let (state, _) = watch::channel(TranscriptionState::Idle);
        let (caption, _) = watch::channel(None);
        Self {
            tracks,
            shared: Shared {
                inference,
                options,
                notifier,
                state: Arc::new(state),
                caption: Arc::new(caption),
                segments: Arc::new(Mutex::new(VecDeque::new())),
            },
            active: Mutex::new(None),
        }
    }

    pub fn state(&self) -> TranscriptionState {
        *self.shared.state.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<TranscriptionState> {
        self.shared.state.subscribe()
    }

    pub fn caption(&self) -> Option<String> {
        self.shared.caption.borrow().clone()
    }

    pub fn watch_caption(&self) -> watch::Receiver<Option<String>> {
        self.shared.caption.subscribe()
    }

    /// Segments of the current (or last) listening session
    pub async fn transcript(&self) -> Vec<TranscriptSegment> {
        self.shared.segments.lock().await.iter().cloned().collect()
    }

    /// Start listening when idle, stop when listening
    pub async fn toggle(&self) -> RoomResult<TranscriptionState> {
        let mut active = self.active.lock().await;

        // A session that ended on its own no longer counts as listening
        if let Some(running) = active.take() {
            if !running.task.is_finished() {
                Self::finish(running).await;
                return Ok(TranscriptionState::Idle);
            }
        }

        let notifier = &self.shared.notifier;
        let microphone = match self.tracks.require(TrackRole::Microphone) {
            Ok(microphone) => microphone,
            Err(e) => {
                notifier.failure("Speech to text failed", &e);
                return Err(e);
            }
        };

        let stream = match self
            .shared
            .inference
            .start_speech_to_text(&microphone, &self.shared.options)
            .await
        {
            Ok(stream) => stream,
            Err(e) => {
                notifier.failure("Speech to text failed", &e);
                return Err(e);
            }
        };

        // New session, fresh caption and transcript
        self.shared.caption.send_replace(None);
        self.shared.segments.lock().await.clear();
        self.shared.state.send_replace(TranscriptionState::Listening);

        info!("Speech to text started on microphone {}", microphone.id());

        let (stop, stop_rx) = oneshot::channel();
        let task = tokio::spawn(self.shared.clone().run(
            self.tracks.clone(),
            microphone,
            stream,
            stop_rx,
        ));
        *active = Some(ActiveSession { stop, task });

        Ok(TranscriptionState::Listening)
    }

    /// Stop listening if active; no-op otherwise
    pub async fn stop(&self) {
        let running = self.active.lock().await.take();
        if let Some(running) = running {
            Self::finish(running).await;
        }
    }

    async fn finish(running: ActiveSession) {
        let _ = running.stop.send(());
        if let Err(e) = running.task.await {
            warn!("Speech to text task ended abnormally: {}", e);
        }
        info!("Speech to text stopped");
    }
}
