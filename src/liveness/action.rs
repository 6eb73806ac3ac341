use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, watch};
use tracing::info;

use super::challenge::{Challenge, ChallengeOutcome, ChallengeVariant};
use crate::device::LocalTracks;
use crate::error::{RoomError, RoomResult};
use crate::inference::{ActionType, InferenceService, LivenessContext};
use crate::notify::NotificationCenter;
use crate::rtc::TrackRole;

/// Phase of the gesture challenge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "value", rename_all = "snake_case")]
pub enum ActionPhase {
    Idle,
    Requested(ActionType),
    CountingDown(u32),
    Committing,
    Succeeded,
    Failed,
}

pub(crate) struct ActionVariant;

impl ChallengeVariant for ActionVariant {
    type Phase = ActionPhase;

    const NAME: &'static str = "action liveness";
    const RESULT_TITLE: &'static str = "Action liveness result";
    const FAILURE_TITLE: &'static str = "Action liveness failed";

    fn idle() -> ActionPhase {
        ActionPhase::Idle
    }

    fn committing() -> ActionPhase {
        ActionPhase::Committing
    }

    fn settled(succeeded: bool) -> Option<ActionPhase> {
        Some(if succeeded {
            ActionPhase::Succeeded
        } else {
            ActionPhase::Failed
        })
    }
}

/// Countdown parameters
#[derive(Debug, Clone)]
pub struct ActionTiming {
    /// First value shown; the countdown runs down to and including zero
    pub countdown: u32,
    pub tick: Duration,
}

impl Default for ActionTiming {
    fn default() -> Self {
        Self {
            countdown: 3,
            tick: Duration::from_secs(1),
        }
    }
}

/// Countdown-gated gesture challenge
pub struct ActionLiveness {
    challenge: Challenge<ActionVariant>,
    inference: Arc<dyn InferenceService>,
    tracks: LocalTracks,
    timing: ActionTiming,
}

impl ActionLiveness {
    pub fn new(
        inference: Arc<dyn InferenceService>,
        tracks: LocalTracks,
        timing: ActionTiming,
        notifier: NotificationCenter,
    ) -> Self {
        Self {
            challenge: Challenge::new(notifier),
            inference,
            tracks,
            timing,
        }
    }

    /// Start a challenge for `action`
    ///
    /// Returns once the detector is armed and the countdown is running; the
    /// commit and its finalization happen in the background.
    pub async fn start(&self, action: ActionType, context: LivenessContext) -> RoomResult<()> {
        let guard = self
            .challenge
            .begin()
            .map_err(|e| self.report_start_failure(e))?;
        let phase = self.challenge.phase_cell();

        phase.set(ActionPhase::Requested(action));
        info!("Action liveness requested: {}", action);

        let camera = self
            .tracks
            .require(TrackRole::Camera)
            .map_err(|e| self.report_start_failure(e))?;

        let detector = self
            .inference
            .start_action_liveness(&context, &camera, &[action])
            .await
            .map_err(|e| self.report_start_failure(e))?;
        guard.attach(detector);

        let timing = self.timing.clone();
        let arm = async move {
            let mut remaining = timing.countdown;
            phase.set(ActionPhase::CountingDown(remaining));

            let mut ticker = tokio::time::interval(timing.tick.max(Duration::from_millis(1)));
            ticker.tick().await;
            while remaining > 0 {
                ticker.tick().await;
                remaining -= 1;
                phase.set(ActionPhase::CountingDown(remaining));
            }

            // The detector samples this exact track; a toggled camera voids the run
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
            .failure("Action liveness could not start", &err);
        err
    }

    pub fn phase(&self) -> ActionPhase {
        self.challenge.phase()
    }

    /// Seconds left, while counting down
    pub fn countdown(&self) -> Option<u32> {
        match self.phase() {
            ActionPhase::CountingDown(remaining) => Some(remaining),
            _ => None,
        }
    }

    pub fn watch(&self) -> watch::Receiver<ActionPhase> {
        self.challenge.watch()
    }

    /// Every phase transition, in order
    pub fn subscribe(&self) -> broadcast::Receiver<ActionPhase> {
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
