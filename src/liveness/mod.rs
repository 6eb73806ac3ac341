//! Liveness detection challenges
//!
//! Two challenges share one driver (`challenge.rs`):
//! - action: operator picks a gesture, a countdown runs, then the detector commits
//! - flash: the detector samples a light response for a fixed window, then commits
//!
//! Both consume the camera track, so only one challenge of either kind may be
//! unfinished at a time.

mod action;
mod challenge;
mod flash;

pub use action::{ActionLiveness, ActionPhase, ActionTiming};
pub use challenge::ChallengeOutcome;
pub use flash::{FlashLiveness, FlashPhase};

use std::sync::Arc;
use std::time::Duration;

use crate::device::LocalTracks;
use crate::error::{RoomError, RoomResult};
use crate::inference::{ActionType, InferenceService, LivenessContext};
use crate::notify::NotificationCenter;

pub struct LivenessOrchestrator {
    action: ActionLiveness,
    flash: FlashLiveness,
    notifier: NotificationCenter,
}

impl LivenessOrchestrator {
    pub fn new(
        inference: Arc<dyn InferenceService>,
        tracks: LocalTracks,
        timing: ActionTiming,
        flash_delay: Duration,
        notifier: NotificationCenter,
    ) -> Self {
        Self {
            action: ActionLiveness::new(
                Arc::clone(&inference),
                tracks.clone(),
                timing,
                notifier.clone(),
            ),
            flash: FlashLiveness::new(inference, tracks, flash_delay, notifier.clone()),
            notifier,
        }
    }

    pub fn action(&self) -> &ActionLiveness {
        &self.action
    }

    pub fn flash(&self) -> &FlashLiveness {
        &self.flash
    }

    pub fn is_busy(&self) -> bool {
        self.action.is_busy() || self.flash.is_busy()
    }

    pub async fn start_action(&self, action: ActionType, context: LivenessContext) -> RoomResult<()> {
        if self.flash.is_busy() {
            return Err(self.reject("flash liveness is still running"));
        }
        self.action.start(action, context).await
    }

    pub async fn start_flash(&self) -> RoomResult<()> {
        if self.action.is_busy() {
            return Err(self.reject("action liveness is still running"));
        }
        self.flash.start().await
    }

    /// Abort both challenges; each finalizes through its guard
    pub fn cancel_all(&self) {
        self.action.cancel();
        self.flash.cancel();
    }

    fn reject(&self, reason: &str) -> RoomError {
        let err = RoomError::Misuse(reason.to_string());
        self.notifier.failure("Liveness challenge rejected", &err);
        err
    }
}
