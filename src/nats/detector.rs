use serde_json::Value;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::client::{grab_frame, NatsInference};
use super::messages::LivenessCommitRequest;
use crate::error::RoomResult;
use crate::inference::{ActionType, LivenessDetector};
use crate::rtc::LocalTrack;

/// Liveness detector that samples camera frames until it is committed
pub struct NatsLivenessDetector {
    id: String,
    subject: &'static str,
    session_id: String,
    action_types: Vec<ActionType>,
    inference: NatsInference,
    frames: Arc<Mutex<VecDeque<String>>>,
    sampler: JoinHandle<()>,
}

impl NatsLivenessDetector {
    pub(crate) fn arm(
        inference: NatsInference,
        subject: &'static str,
        session_id: String,
        camera: LocalTrack,
        action_types: Vec<ActionType>,
    ) -> Self {
        let id = uuid::Uuid::new_v4().to_string();
        let frames = Arc::new(Mutex::new(VecDeque::new()));

        let interval = inference.settings().sample_interval;
        let max_frames = inference.settings().max_frames.max(1);
        let buffer = Arc::clone(&frames);
        let detector_id = id.clone();

        let sampler = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);

            loop {
                ticker.tick().await;

                if camera.is_released() {
                    warn!("Detector {} camera released, sampling stopped", detector_id);
                    break;
                }

                match grab_frame(&camera) {
                    Ok(frame) => {
                        if let Ok(mut frames) = buffer.lock() {
                            if frames.len() == max_frames {
                                frames.pop_front();
                            }
                            frames.push_back(frame);
                        }
                    }
                    Err(e) => {
                        warn!("Detector {} failed to sample frame: {}", detector_id, e);
                        break;
                    }
                }
            }
        });

        info!("Armed liveness detector {} on {}", id, subject);

        Self {
            id,
            subject,
            session_id,
            action_types,
            inference,
            frames,
            sampler,
        }
    }
}

#[async_trait::async_trait]
impl LivenessDetector for NatsLivenessDetector {
    fn id(&self) -> &str {
        &self.id
    }

    async fn commit(&self) -> RoomResult<Value> {
        self.sampler.abort();

        let frames: Vec<String> = match self.frames.lock() {
            Ok(mut frames) => frames.drain(..).collect(),
            Err(poisoned) => poisoned.into_inner().drain(..).collect(),
        };

        debug!("Detector {} committing {} frame(s)", self.id, frames.len());

        let request = LivenessCommitRequest {
            session_id: self.session_id.clone(),
            detector_id: self.id.clone(),
            action_types: self.action_types.clone(),
            frames,
        };

        self.inference.request(self.subject, &request).await
    }
}

impl Drop for NatsLivenessDetector {
    fn drop(&mut self) {
        self.sampler.abort();
    }
}
