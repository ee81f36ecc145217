//! Resolution state for one resolver run

use super::candidates::{CandidateList, ContentReference};
use packop_common::ResolutionStatus;
use serde::Serialize;

/// Progress of one resolution run
///
/// `cursor` only increases. `status` leaves `Pending` exactly once, after
/// which the state is never modified again.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolutionState {
    /// Run number, increasing across `resolve` calls on one resolver
    pub run: u64,
    pub reference: ContentReference,
    pub candidates: CandidateList,
    /// Index of the candidate being tried (equals `candidates.len()` once exhausted)
    pub cursor: usize,
    pub status: ResolutionStatus,
    pub resolved_url: Option<String>,
}

impl ResolutionState {
    pub(crate) fn pending(run: u64, reference: ContentReference, candidates: CandidateList) -> Self {
        Self {
            run,
            reference,
            candidates,
            cursor: 0,
            status: ResolutionStatus::Pending,
            resolved_url: None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// URL the surface should display right now
    ///
    /// The resolved URL once terminal, otherwise the candidate being tried.
    pub fn current_url(&self) -> Option<&str> {
        self.resolved_url
            .as_deref()
            .or_else(|| self.candidates.get(self.cursor))
    }

    /// Candidate at the cursor succeeded
    pub(crate) fn resolve(&mut self) {
        debug_assert!(!self.is_terminal());
        self.resolved_url = self.candidates.get(self.cursor).map(str::to_string);
        self.status = ResolutionStatus::Resolved;
    }

    /// Move past a failed candidate; exhausts the run after the last one
    pub(crate) fn advance(&mut self) {
        debug_assert!(!self.is_terminal());
        self.cursor += 1;
        if self.cursor >= self.candidates.len() {
            self.cursor = self.candidates.len();
            self.resolved_url = self.candidates.last().map(str::to_string);
            self.status = ResolutionStatus::Exhausted;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::GatewayPolicy;

    fn state_for(reference: &str) -> ResolutionState {
        let reference = ContentReference::new(reference);
        let candidates = CandidateList::for_reference(&reference, &GatewayPolicy::default());
        ResolutionState::pending(1, reference, candidates)
    }

    #[test]
    fn test_pending_shows_first_candidate() {
        let state = state_for("ipfs://Qm");
        assert_eq!(state.status, ResolutionStatus::Pending);
        assert_eq!(state.current_url(), Some("https://cloudflare-ipfs.com/ipfs/Qm"));
    }

    #[test]
    fn test_resolve_adopts_cursor_candidate() {
        let mut state = state_for("ipfs://Qm");
        state.advance();
        state.resolve();
        assert_eq!(state.status, ResolutionStatus::Resolved);
        assert_eq!(state.resolved_url.as_deref(), Some("https://ipfs.io/ipfs/Qm"));
        assert_eq!(state.cursor, 1);
    }

    #[test]
    fn test_advancing_past_last_exhausts_with_last_url() {
        let mut state = state_for("ipfs://Qm");
        for _ in 0..4 {
            state.advance();
        }
        assert_eq!(state.status, ResolutionStatus::Exhausted);
        assert_eq!(state.cursor, 4);
        assert_eq!(state.resolved_url.as_deref(), state.candidates.last());
        assert_eq!(state.current_url(), state.candidates.last());
    }

    #[test]
    fn test_single_candidate_exhausts_with_original_url() {
        let mut state = state_for("https://cards.example/1.png");
        state.advance();
        assert_eq!(state.status, ResolutionStatus::Exhausted);
        assert_eq!(state.resolved_url.as_deref(), Some("https://cards.example/1.png"));
    }
}
