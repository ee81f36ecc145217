//! Pending transitions owned by one run

use super::RunKey;
use packop_common::Stage;
use tokio::task::AbortHandle;
use tokio_util::sync::CancellationToken;

/// Cancellable set of scheduled transitions for one traversal of the timeline
///
/// A run is never patched: restarting cancels the whole schedule and builds
/// a new one.
pub(crate) struct RunSchedule {
    pub(crate) run: u64,
    pub(crate) key: RunKey,
    /// Last stage entered
    pub(crate) stage: Stage,
    token: CancellationToken,
    handles: Vec<AbortHandle>,
}

impl RunSchedule {
    pub(crate) fn new(run: u64, key: RunKey) -> Self {
        Self {
            run,
            key,
            stage: Stage::Summon,
            token: CancellationToken::new(),
            handles: Vec::with_capacity(Stage::TIMELINE.len() - 1),
        }
    }

    pub(crate) fn token(&self) -> &CancellationToken {
        &self.token
    }

    pub(crate) fn is_live(&self, run: u64) -> bool {
        self.run == run && !self.token.is_cancelled()
    }

    pub(crate) fn push(&mut self, handle: AbortHandle) {
        self.handles.push(handle);
    }

    /// Transitions scheduled but not yet fired
    pub(crate) fn pending(&self) -> usize {
        self.handles.iter().filter(|h| !h.is_finished()).count()
    }

    /// Cancel every pending transition in one step
    ///
    /// The token stops tasks that are already past their sleep; the abort
    /// handles stop tasks that have not been polled yet.
    pub(crate) fn cancel(self) {
        self.token.cancel();
        for handle in &self.handles {
            handle.abort();
        }
    }
}
