//! Timed stage sequencer for the reveal animation
//!
//! Drives the fixed timeline `Summon (0 ms) -> Entangle (1500 ms) ->
//! Reveal (4500 ms) -> Complete (8500 ms)`, firing an audio cue on each of
//! the first three stages and the completion callback on the last.
//!
//! # Restart protocol
//!
//! `start` cancels every pending transition of the previous run before it
//! schedules anything for the new one, all under one lock. Each transition
//! task re-checks, under that same lock, that its run is still the live one
//! before it touches the stage or fires a cue. A superseded run therefore
//! never produces a stage update, cue or completion after its successor has
//! begun.

mod schedule;

use crate::audio::CuePlayer;
use packop_common::events::{EventBus, RevealEvent};
use packop_common::Stage;
use schedule::RunSchedule;
use serde::Serialize;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, info};

/// Identity of one run: which card, at which position in the pack
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct RunKey {
    pub reference: String,
    pub ordinal: u32,
}

impl RunKey {
    pub fn new(reference: impl Into<String>, ordinal: u32) -> Self {
        Self {
            reference: reference.into(),
            ordinal,
        }
    }
}

impl std::fmt::Display for RunKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{} {}", self.ordinal, self.reference)
    }
}

/// Current stage of the live run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StageSnapshot {
    pub run: u64,
    pub key: RunKey,
    pub stage: Stage,
}

/// Invoked once per run that reaches Complete
pub type CompletionCallback = Arc<dyn Fn() + Send + Sync>;

/// Drives one run of the stage timeline at a time
///
/// Dropping the sequencer cancels the live run.
pub struct StageSequencer {
    inner: Arc<SequencerInner>,
}

struct SequencerInner {
    cues: Arc<dyn CuePlayer>,
    events: EventBus,
    on_complete: Mutex<Option<CompletionCallback>>,
    slot: Mutex<ScheduleSlot>,
    stage_tx: watch::Sender<Option<StageSnapshot>>,
}

#[derive(Default)]
struct ScheduleSlot {
    last_run: u64,
    active: Option<RunSchedule>,
}

impl StageSequencer {
    pub fn new(cues: Arc<dyn CuePlayer>, events: EventBus) -> Self {
        let (stage_tx, _) = watch::channel(None);
        Self {
            inner: Arc::new(SequencerInner {
                cues,
                events,
                on_complete: Mutex::new(None),
                slot: Mutex::new(ScheduleSlot::default()),
                stage_tx,
            }),
        }
    }

    /// Replace the completion callback
    ///
    /// Applies to whichever run completes next, including the live one.
    pub fn set_on_complete(&self, callback: CompletionCallback) {
        *lock(&self.inner.on_complete) = Some(callback);
    }

    /// Start a run for `key`, cancelling the previous run first
    ///
    /// Summon is entered (and the ambient cue fired) before this returns.
    /// Must be called from within a tokio runtime. Returns the run number.
    pub fn start(&self, key: RunKey) -> u64 {
        let mut slot = lock(&self.inner.slot);

        if let Some(previous) = slot.active.take() {
            info!(run = previous.run, key = %previous.key, stage = %previous.stage, "Superseding run");
            self.inner.emit_cancelled(&previous);
            previous.cancel();
        }

        slot.last_run += 1;
        let run = slot.last_run;
        let started = Instant::now();

        info!(run, key = %key, "Starting reveal run");
        self.inner.events.emit_lossy(RevealEvent::RunStarted {
            reference: key.reference.clone(),
            ordinal: key.ordinal,
            timestamp: packop_common::time::now(),
        });

        let mut schedule = RunSchedule::new(run, key);
        self.inner.enter_stage(&mut schedule, Stage::Summon);

        for stage in Stage::TIMELINE.into_iter().skip(1) {
            let deadline = started + stage.offset();
            let inner = Arc::clone(&self.inner);
            let token = schedule.token().clone();

            let task = tokio::spawn(async move {
                tokio::select! {
                    biased;
                    _ = token.cancelled() => {}
                    _ = tokio::time::sleep_until(deadline) => inner.fire(run, stage),
                }
            });
            schedule.push(task.abort_handle());
        }

        debug!(run, pending = schedule.pending(), "Transitions scheduled");
        slot.active = Some(schedule);
        run
    }

    /// Tear down the live run, if any; nothing of it fires afterwards
    pub fn cancel(&self) {
        let previous = lock(&self.inner.slot).active.take();
        if let Some(previous) = previous {
            info!(run = previous.run, key = %previous.key, "Cancelling run");
            self.inner.emit_cancelled(&previous);
            previous.cancel();
        }
        self.inner.stage_tx.send_replace(None);
    }

    /// Stage of the most recent run (None = idle)
    pub fn current(&self) -> Option<StageSnapshot> {
        self.inner.stage_tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<StageSnapshot>> {
        self.inner.stage_tx.subscribe()
    }

    /// Whether a run is scheduled and has not completed
    pub fn is_running(&self) -> bool {
        lock(&self.inner.slot).active.is_some()
    }

    /// Transitions of the live run still waiting to fire
    pub fn pending_transitions(&self) -> usize {
        lock(&self.inner.slot)
            .active
            .as_ref()
            .map_or(0, RunSchedule::pending)
    }
}

impl Drop for StageSequencer {
    fn drop(&mut self) {
        if let Some(previous) = lock(&self.inner.slot).active.take() {
            debug!(run = previous.run, "Sequencer dropped, cancelling run");
            previous.cancel();
        }
    }
}

impl SequencerInner {
    /// Scheduled transition for `run` reached its offset
    fn fire(&self, run: u64, stage: Stage) {
        let completion = {
            let mut slot = lock(&self.slot);
            let Some(schedule) = slot.active.as_mut().filter(|s| s.is_live(run)) else {
                debug!(run, stage = %stage, "Dropping transition of a finished run");
                return;
            };
            if stage <= schedule.stage {
                return;
            }

            self.enter_stage(schedule, stage);
            if !stage.is_terminal() {
                return;
            }

            // Run is over; nothing left to cancel
            let finished = slot.active.take();
            if let Some(finished) = finished {
                info!(run, key = %finished.key, "Reveal run complete");
                self.events.emit_lossy(RevealEvent::RunCompleted {
                    reference: finished.key.reference,
                    ordinal: finished.key.ordinal,
                    timestamp: packop_common::time::now(),
                });
            }
            lock(&self.on_complete).clone()
        };

        // Outside the lock: the callback may start the next run
        if let Some(callback) = completion {
            callback();
        }
    }

    fn enter_stage(&self, schedule: &mut RunSchedule, stage: Stage) {
        schedule.stage = stage;
        info!(run = schedule.run, stage = %stage, offset_ms = stage.offset_ms(), "Stage entered");

        self.stage_tx.send_replace(Some(StageSnapshot {
            run: schedule.run,
            key: schedule.key.clone(),
            stage,
        }));
        self.events.emit_lossy(RevealEvent::StageEntered {
            reference: schedule.key.reference.clone(),
            ordinal: schedule.key.ordinal,
            stage,
            offset_ms: stage.offset_ms(),
            timestamp: packop_common::time::now(),
        });

        if let Some(cue) = stage.cue() {
            self.cues.play_cue(cue);
            self.events.emit_lossy(RevealEvent::CueTriggered {
                cue,
                timestamp: packop_common::time::now(),
            });
        }
    }

    fn emit_cancelled(&self, schedule: &RunSchedule) {
        self.events.emit_lossy(RevealEvent::RunCancelled {
            reference: schedule.key.reference.clone(),
            ordinal: schedule.key.ordinal,
            last_stage: schedule.stage,
            timestamp: packop_common::time::now(),
        });
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
