// Shared "arm -> commit -> finalize" driver for liveness challenges
//
// A challenge owns at most one detector at a time. The detector slot is held
// by a `RunGuard` for the whole run; dropping the guard clears the slot and
// resets the phase, so finalization happens after success, failure, early
// setup errors and task cancellation alike.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::future::Future;
use std::marker::PhantomData;
use std::sync::{Arc, Mutex};
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::error::{RoomError, RoomResult};
use crate::inference::LivenessDetector;
use crate::notify::NotificationCenter;

/// Variant-specific parameters of a challenge
pub(crate) trait ChallengeVariant: Send + Sync + 'static {
    type Phase: Clone + fmt::Debug + PartialEq + Send + Sync + 'static;

    const NAME: &'static str;
    const RESULT_TITLE: &'static str;
    const FAILURE_TITLE: &'static str;

    fn idle() -> Self::Phase;

    /// Phase while the commit request is in flight
    fn committing() -> Self::Phase;

    /// Phase reported once the commit settled, if the variant has one
    fn settled(succeeded: bool) -> Option<Self::Phase>;
}

/// Current phase plus an ordered feed of every transition
pub(crate) struct PhaseCell<P> {
    current: watch::Sender<P>,
    history: broadcast::Sender<P>,
}

impl<P: Clone + fmt::Debug + PartialEq + Send + Sync + 'static> PhaseCell<P> {
    fn new(initial: P) -> Self {
        let (current, _) = watch::channel(initial);
        let (history, _) = broadcast::channel(64);
        Self { current, history }
    }

    pub(crate) fn set(&self, phase: P) {
        debug!("Liveness phase -> {:?}", phase);
        self.current.send_replace(phase.clone());
        let _ = self.history.send(phase);
    }

    pub(crate) fn get(&self) -> P {
        self.current.borrow().clone()
    }

    fn watch(&self) -> watch::Receiver<P> {
        self.current.subscribe()
    }

    fn subscribe(&self) -> broadcast::Receiver<P> {
        self.history.subscribe()
    }
}

#[derive(Default)]
enum SlotState {
    #[default]
    Free,
    Reserved,
    Armed(Arc<dyn LivenessDetector>),
}

/// Single-occupancy holder of the in-flight detector handle
#[derive(Default)]
struct DetectorSlot {
    state: Mutex<SlotState>,
}

impl DetectorSlot {
    fn lock(&self) -> std::sync::MutexGuard<'_, SlotState> {
        match self.state.lock() {
            Ok(state) => state,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn reserve(&self) -> bool {
        let mut state = self.lock();
        match *state {
            SlotState::Free => {
                *state = SlotState::Reserved;
                true
            }
            _ => false,
        }
    }

    fn attach(&self, detector: Arc<dyn LivenessDetector>) {
        *self.lock() = SlotState::Armed(detector);
    }

    fn detector(&self) -> Option<Arc<dyn LivenessDetector>> {
        match &*self.lock() {
            SlotState::Armed(detector) => Some(Arc::clone(detector)),
            _ => None,
        }
    }

    fn is_busy(&self) -> bool {
        !matches!(*self.lock(), SlotState::Free)
    }

    fn clear(&self) {
        *self.lock() = SlotState::Free;
    }
}

/// Scoped ownership of a challenge run
pub(crate) struct RunGuard<V: ChallengeVariant> {
    slot: Arc<DetectorSlot>,
    phase: Arc<PhaseCell<V::Phase>>,
    _variant: PhantomData<V>,
}

impl<V: ChallengeVariant> RunGuard<V> {
    pub(crate) fn attach(&self, detector: Arc<dyn LivenessDetector>) {
        info!("{} detector {} armed", V::NAME, detector.id());
        self.slot.attach(detector);
    }

    fn detector(&self) -> Option<Arc<dyn LivenessDetector>> {
        self.slot.detector()
    }
}

impl<V: ChallengeVariant> Drop for RunGuard<V> {
    fn drop(&mut self) {
        self.slot.clear();
        self.phase.set(V::idle());
        debug!("{} finalized", V::NAME);
    }
}

/// How the most recent run ended
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChallengeOutcome {
    pub succeeded: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    pub finished_at: DateTime<Utc>,
}

impl ChallengeOutcome {
    fn from_result(outcome: &RoomResult<Value>) -> Self {
        match outcome {
            Ok(result) => Self {
                succeeded: true,
                result: Some(result.clone()),
                error: None,
                status: None,
                finished_at: Utc::now(),
            },
            Err(e) => Self {
                succeeded: false,
                result: None,
                error: Some(e.to_string()),
                status: e.remote_status(),
                finished_at: Utc::now(),
            },
        }
    }
}

pub(crate) struct Challenge<V: ChallengeVariant> {
    slot: Arc<DetectorSlot>,
    phase: Arc<PhaseCell<V::Phase>>,
    notifier: NotificationCenter,
    run: Mutex<Option<JoinHandle<()>>>,
    last_outcome: Arc<Mutex<Option<ChallengeOutcome>>>,
}

impl<V: ChallengeVariant> Challenge<V> {
    pub(crate) fn new(notifier: NotificationCenter) -> Self {
        Self {
            slot: Arc::new(DetectorSlot::default()),
            phase: Arc::new(PhaseCell::new(V::idle())),
            notifier,
            run: Mutex::new(None),
            last_outcome: Arc::new(Mutex::new(None)),
        }
    }

    pub(crate) fn phase_cell(&self) -> Arc<PhaseCell<V::Phase>> {
        Arc::clone(&self.phase)
    }

    pub(crate) fn phase(&self) -> V::Phase {
        self.phase.get()
    }

    pub(crate) fn watch(&self) -> watch::Receiver<V::Phase> {
        self.phase.watch()
    }

    pub(crate) fn subscribe(&self) -> broadcast::Receiver<V::Phase> {
        self.phase.subscribe()
    }

    pub(crate) fn is_busy(&self) -> bool {
        self.slot.is_busy()
    }

    pub(crate) fn has_detector(&self) -> bool {
        self.slot.detector().is_some()
    }

    pub(crate) fn last_outcome(&self) -> Option<ChallengeOutcome> {
        self.last_outcome.lock().ok().and_then(|o| o.clone())
    }

    pub(crate) fn notifier(&self) -> &NotificationCenter {
        &self.notifier
    }

    /// Claim the detector slot for a new run
    pub(crate) fn begin(&self) -> RoomResult<RunGuard<V>> {
        if !self.slot.reserve() {
            return Err(RoomError::Misuse(format!("{} already in progress", V::NAME)));
        }

        Ok(RunGuard {
            slot: Arc::clone(&self.slot),
            phase: Arc::clone(&self.phase),
            _variant: PhantomData,
        })
    }

    /// Run `arm`, then commit exactly once, then finalize
    ///
    /// The commit is skipped when `arm` fails or when no detector was
    /// attached to the guard.
    pub(crate) fn launch<F>(&self, guard: RunGuard<V>, arm: F)
    where
        F: Future<Output = RoomResult<()>> + Send + 'static,
    {
        let phase = Arc::clone(&self.phase);
        let notifier = self.notifier.clone();
        let last_outcome = Arc::clone(&self.last_outcome);

        let handle = tokio::spawn(async move {
            let guard = guard;

            let outcome = match arm.await {
                Ok(()) => match guard.detector() {
                    Some(detector) => {
                        phase.set(V::committing());
                        info!("Committing {} detector {}", V::NAME, detector.id());
                        detector.commit().await
                    }
                    None => Err(RoomError::Misuse(format!(
                        "{} has no detector to commit",
                        V::NAME
                    ))),
                },
                Err(e) => Err(e),
            };

            match &outcome {
                Ok(result) => notifier.result(V::RESULT_TITLE, result),
                Err(e) => notifier.failure(V::FAILURE_TITLE, e),
            }

            if let Some(settled) = V::settled(outcome.is_ok()) {
                phase.set(settled);
            }

            if let Ok(mut last) = last_outcome.lock() {
                *last = Some(ChallengeOutcome::from_result(&outcome));
            }

            drop(guard);
        });

        if let Ok(mut run) = self.run.lock() {
            *run = Some(handle);
        }
    }

    /// Abort the in-flight run, if any; its guard finalizes on drop
    pub(crate) fn cancel(&self) {
        let handle = self.run.lock().ok().and_then(|mut run| run.take());
        if let Some(handle) = handle {
            if !handle.is_finished() {
                info!("Cancelling in-flight {}", V::NAME);
            }
            handle.abort();
        }
    }
}
