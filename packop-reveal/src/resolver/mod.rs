//! Resilient resolution of content references to image URLs
//!
//! A reference is expanded into an ordered candidate list and the candidates
//! are probed strictly one at a time. A failed candidate is followed by a
//! fixed backoff before the next one is tried. Once every candidate has
//! failed the last one is adopted anyway, so resolution never fails outward.
//!
//! Progress is published on a `tokio::sync::watch` channel. Every update of
//! a run is checked against the current run number under the same lock that
//! `resolve` takes, so a superseded run can never publish after its
//! successor has started.

mod candidates;
mod probe;
mod state;

pub use candidates::{CandidateList, ContentReference, GatewayPolicy};
pub use probe::{HttpImageProbe, ImageProbe, ProbeError};
pub use state::ResolutionState;

use packop_common::events::{EventBus, RevealEvent};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::watch;
use tokio::task::AbortHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Turns content references into usable image URLs
///
/// Owned by exactly one presentation instance. Dropping the resolver cancels
/// any in-flight probe.
pub struct ResourceResolver {
    inner: Arc<ResolverInner>,
}

struct ResolverInner {
    probe: Arc<dyn ImageProbe>,
    policy: GatewayPolicy,
    events: EventBus,
    state_tx: watch::Sender<Option<ResolutionState>>,
    slot: Mutex<RunSlot>,
}

#[derive(Default)]
struct RunSlot {
    last_run: u64,
    active: Option<ActiveRun>,
}

struct ActiveRun {
    run: u64,
    token: CancellationToken,
    task: AbortHandle,
}

impl ActiveRun {
    fn cancel(self) {
        self.token.cancel();
        self.task.abort();
    }
}

impl ResourceResolver {
    pub fn new(probe: Arc<dyn ImageProbe>, policy: GatewayPolicy, events: EventBus) -> Self {
        let (state_tx, _) = watch::channel(None);
        Self {
            inner: Arc::new(ResolverInner {
                probe,
                policy,
                events,
                state_tx,
                slot: Mutex::new(RunSlot::default()),
            }),
        }
    }

    /// Start resolving `reference`, superseding any run in flight
    ///
    /// Returns the new run number immediately. Must be called from within a
    /// tokio runtime.
    pub fn resolve(&self, reference: impl Into<ContentReference>) -> u64 {
        let reference = reference.into();
        let candidates = CandidateList::for_reference(&reference, &self.inner.policy);

        let mut slot = self.inner.lock_slot();
        if let Some(previous) = slot.active.take() {
            debug!(run = previous.run, "Superseding in-flight resolution");
            previous.cancel();
        }

        slot.last_run += 1;
        let run = slot.last_run;

        info!(
            run,
            reference = %reference,
            candidates = candidates.len(),
            "Resolving card image"
        );

        let initial = ResolutionState::pending(run, reference, candidates);
        self.inner.state_tx.send_replace(Some(initial.clone()));
        self.inner.events.emit_lossy(RevealEvent::ResolutionStarted {
            run,
            reference: initial.reference.to_string(),
            candidate_count: initial.candidates.len(),
            timestamp: packop_common::time::now(),
        });

        let token = CancellationToken::new();
        let task = tokio::spawn(probe_candidates(Arc::clone(&self.inner), initial, token.clone()));
        slot.active = Some(ActiveRun {
            run,
            token,
            task: task.abort_handle(),
        });

        run
    }

    /// Abandon the run in flight, if any; its state is never updated again
    pub fn cancel(&self) {
        if let Some(active) = self.inner.lock_slot().active.take() {
            debug!(run = active.run, "Cancelling resolution");
            active.cancel();
        }
    }

    /// Latest published state (None before the first `resolve`)
    pub fn state(&self) -> Option<ResolutionState> {
        self.inner.state_tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<ResolutionState>> {
        self.inner.state_tx.subscribe()
    }

    /// Wait until `run` reaches a terminal state
    ///
    /// Returns None if the run is superseded or cancelled first.
    pub async fn wait_for_run(&self, run: u64) -> Option<ResolutionState> {
        let mut rx = self.subscribe();
        let abandoned = self.inner.run_token(run);
        let finished = rx.wait_for(|state| {
            state
                .as_ref()
                .is_some_and(|s| s.run > run || (s.run == run && s.is_terminal()))
        });

        tokio::select! {
            biased;
            result = finished => result
                .ok()
                .and_then(|state| state.clone())
                .filter(|s| s.run == run),
            // Cancelled runs never publish again
            _ = abandoned.cancelled() => self.state().filter(|s| s.run == run && s.is_terminal()),
        }
    }
}

impl Drop for ResourceResolver {
    fn drop(&mut self) {
        self.cancel();
    }
}

impl ResolverInner {
    fn lock_slot(&self) -> MutexGuard<'_, RunSlot> {
        self.slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Token that fires when `run` is cancelled or superseded
    ///
    /// Already cancelled if `run` is not in flight anymore.
    fn run_token(&self, run: u64) -> CancellationToken {
        match &self.lock_slot().active {
            Some(active) if active.run == run => active.token.clone(),
            _ => {
                let token = CancellationToken::new();
                token.cancel();
                token
            }
        }
    }

    /// Publish a state update and/or event for `run` if it is still current
    ///
    /// Returns false when the run has been superseded or cancelled.
    fn publish(
        &self,
        run: u64,
        state: Option<&ResolutionState>,
        event: Option<RevealEvent>,
    ) -> bool {
        let mut slot = self.lock_slot();
        let is_current = matches!(
            &slot.active,
            Some(active) if active.run == run && !active.token.is_cancelled()
        );
        if !is_current {
            return false;
        }

        if let Some(state) = state {
            self.state_tx.send_replace(Some(state.clone()));
            if state.is_terminal() {
                slot.active = None;
            }
        }
        if let Some(event) = event {
            self.events.emit_lossy(event);
        }
        true
    }
}

/// Sequential probe loop for one run
async fn probe_candidates(
    inner: Arc<ResolverInner>,
    mut state: ResolutionState,
    token: CancellationToken,
) {
    let run = state.run;

    while let Some(url) = state.candidates.get(state.cursor).map(str::to_string) {
        let attempt = tokio::select! {
            biased;
            _ = token.cancelled() => return,
            result = inner.probe.probe(&url) => result,
        };

        match attempt {
            Ok(()) => {
                state.resolve();
                info!(
                    run,
                    candidate = state.cursor + 1,
                    total = state.candidates.len(),
                    url = %url,
                    "Image loaded"
                );
                inner.publish(run, Some(&state), Some(finished_event(&state, url)));
                return;
            }
            Err(e) => {
                warn!(
                    run,
                    candidate = state.cursor + 1,
                    total = state.candidates.len(),
                    url = %url,
                    error = %e,
                    "Candidate failed to load"
                );
                let failed = RevealEvent::CandidateFailed {
                    run,
                    index: state.cursor,
                    url,
                    reason: e.to_string(),
                    timestamp: packop_common::time::now(),
                };
                if !inner.publish(run, None, Some(failed)) {
                    return;
                }
            }
        }

        tokio::select! {
            biased;
            _ = token.cancelled() => return,
            _ = tokio::time::sleep(inner.policy.backoff) => {}
        }

        state.advance();
        if state.is_terminal() {
            let url = state.resolved_url.clone().unwrap_or_default();
            error!(run, reference = %state.reference, url = %url, "All candidates failed, using fallback");
            inner.publish(run, Some(&state), Some(finished_event(&state, url)));
            return;
        }
        if !inner.publish(run, Some(&state), None) {
            return;
        }
    }
}

fn finished_event(state: &ResolutionState, url: String) -> RevealEvent {
    RevealEvent::ResolutionFinished {
        run: state.run,
        reference: state.reference.to_string(),
        status: state.status,
        url,
        timestamp: packop_common::time::now(),
    }
}
