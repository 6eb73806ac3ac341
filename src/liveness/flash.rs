use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, watch};
use tracing::info;

use super::challenge::{Challenge, ChallengeOutcome, ChallengeVariant};
use crate::device::LocalTracks;
use crate::error::{RoomError, RoomResult};
use crate::inference::InferenceService;
use crate::notify::NotificationCenter;
use crate::rtc::TrackRole;

/// Status of the light-response challenge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlashPhase {
    /// Sampling the light response; no request issued yet
    Pending,
    /// Commit request in flight
    InProgress,
    Closed,
}

pub(crate) struct FlashVariant;

impl ChallengeVariant for FlashVariant {
    type Phase = FlashPhase;

    const NAME: &'static str = "flash liveness";
    const RESULT_TITLE: &'static str = "Flash liveness result";
    const FAILURE_TITLE: &'static str = "Flash liveness failed";

    fn idle() -> FlashPhase {
        FlashPhase::Closed
    }

    fn committing() -> FlashPhase {
        FlashPhase::InProgress
    }

    fn settled(_succeeded: bool) -> Option<FlashPhase> {
        None
    }
}

/// Timed light-response challenge
pub struct FlashLiveness {
    challenge: Challenge<FlashVariant>,
    inference: Arc<dyn InferenceService>,
    tracks: LocalTracks,
    delay: Duration,
}

impl FlashLiveness {
    pub fn new(
        inference: Arc<dyn InferenceService>,
        tracks: LocalTracks,
        delay: Duration,
        notifier: NotificationCenter,
    ) -> Self {
        Self {
            challenge: Challenge::new(notifier),
            inference,
            tracks,
            delay,
        }
    }

    /// Arm a detector now and commit after the sampling window
    pub async fn start(&self) -> RoomResult<()> {
        let guard = self
            .challenge
            .begin()
            .map_err(|e| self.report_start_failure(e))?;
        let phase = self.challenge.phase_cell();

        phase.set(FlashPhase::Pending);
        info!("Flash liveness started, committing in {:?}", self.delay);

        let camera = self
            .tracks
            .require(TrackRole::Camera)
            .map_err(|e| self.report_start_failure(e))?;

        let detector = self
            .inference
            .start_flash_liveness(&camera)
            .await
            .map_err(|e| self.report_start_failure(e))?;
        guard.attach(detector);

        let delay = self.delay;
        let arm = async move {
            tokio::time::sleep(delay).await;
            if camera.is_released() {
                return Err(RoomError::DeviceUnavailable(TrackRole::Camera));
            }
            Ok(())
        };

        self.challenge.launch(guard, arm);
        Ok(())
    }

    fn report_start_failure(&self, err: RoomError) -> RoomError {
        self.challenge
            .notifier()
            .failure("Flash liveness could not start", &err);
        err
    }

    pub fn phase(&self) -> FlashPhase {
        self.challenge.phase()
    }

    pub fn watch(&self) -> watch::Receiver<FlashPhase> {
        self.challenge.watch()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<FlashPhase> {
        self.challenge.subscribe()
    }

    pub fn is_busy(&self) -> bool {
        self.challenge.is_busy()
    }

    pub fn has_detector(&self) -> bool {
        self.challenge.has_detector()
    }

    pub fn last_outcome(&self) -> Option<ChallengeOutcome> {
        self.challenge.last_outcome()
    }

    pub fn cancel(&self) {
        self.challenge.cancel();
    }
}
