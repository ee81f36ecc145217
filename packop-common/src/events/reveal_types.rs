//! Reveal-related type definitions
//!
//! Supporting types for the stage timeline, audio cues and image resolution.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// One named point in the reveal timeline
///
/// Ordered: `Summon < Entangle < Reveal < Complete`. Each stage has a fixed
/// offset from the start of its run.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    /// Box appears, ambient drone starts (0 ms)
    Summon,
    /// Vines grow around the box (1500 ms)
    Entangle,
    /// Card is shown (4500 ms)
    Reveal,
    /// Run finished, completion callback fires (8500 ms)
    Complete,
}

impl Stage {
    /// Every stage in timeline order
    pub const TIMELINE: [Stage; 4] = [Stage::Summon, Stage::Entangle, Stage::Reveal, Stage::Complete];

    /// Offset from run start in milliseconds
    pub const fn offset_ms(self) -> u64 {
        match self {
            Stage::Summon => 0,
            Stage::Entangle => 1_500,
            Stage::Reveal => 4_500,
            Stage::Complete => 8_500,
        }
    }

    /// Offset from run start
    pub const fn offset(self) -> Duration {
        Duration::from_millis(self.offset_ms())
    }

    /// Audio cue triggered on entering this stage (Complete has none)
    pub const fn cue(self) -> Option<CueKind> {
        match self {
            Stage::Summon => Some(CueKind::Ambient),
            Stage::Entangle => Some(CueKind::Entangle),
            Stage::Reveal => Some(CueKind::Reveal),
            Stage::Complete => None,
        }
    }

    /// Whether this is the terminal stage
    pub const fn is_terminal(self) -> bool {
        matches!(self, Stage::Complete)
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Stage::Summon => write!(f, "summon"),
            Stage::Entangle => write!(f, "entangle"),
            Stage::Reveal => write!(f, "reveal"),
            Stage::Complete => write!(f, "complete"),
        }
    }
}

/// Audio cue kinds
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum CueKind {
    Ambient,
    Entangle,
    Reveal,
}

impl std::fmt::Display for CueKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CueKind::Ambient => write!(f, "ambient"),
            CueKind::Entangle => write!(f, "entangle"),
            CueKind::Reveal => write!(f, "reveal"),
        }
    }
}

/// Resolution status of a content reference
///
/// Transitions `Pending -> Resolved` or `Pending -> Exhausted`, once per run.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ResolutionStatus {
    /// Candidates still being probed
    Pending,
    /// A candidate loaded successfully
    Resolved,
    /// Every candidate failed; the last candidate is adopted
    Exhausted,
}

impl ResolutionStatus {
    /// Whether no further transitions can happen
    pub const fn is_terminal(self) -> bool {
        !matches!(self, ResolutionStatus::Pending)
    }
}

impl std::fmt::Display for ResolutionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResolutionStatus::Pending => write!(f, "pending"),
            ResolutionStatus::Resolved => write!(f, "resolved"),
            ResolutionStatus::Exhausted => write!(f, "exhausted"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeline_offsets_strictly_increase() {
        let offsets: Vec<u64> = Stage::TIMELINE.iter().map(|s| s.offset_ms()).collect();
        assert_eq!(offsets, vec![0, 1_500, 4_500, 8_500]);
        assert!(offsets.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_stage_ordering_matches_timeline() {
        let mut sorted = Stage::TIMELINE;
        sorted.sort();
        assert_eq!(sorted, Stage::TIMELINE);
    }

    #[test]
    fn test_stage_cues() {
        assert_eq!(Stage::Summon.cue(), Some(CueKind::Ambient));
        assert_eq!(Stage::Entangle.cue(), Some(CueKind::Entangle));
        assert_eq!(Stage::Reveal.cue(), Some(CueKind::Reveal));
        assert_eq!(Stage::Complete.cue(), None);
    }

    #[test]
    fn test_only_complete_is_terminal() {
        assert!(Stage::Complete.is_terminal());
        assert!(!Stage::Reveal.is_terminal());
        assert!(!ResolutionStatus::Pending.is_terminal());
        assert!(ResolutionStatus::Resolved.is_terminal());
        assert!(ResolutionStatus::Exhausted.is_terminal());
    }

    #[test]
    fn test_serde_lowercase() {
        assert_eq!(serde_json::to_string(&Stage::Entangle).unwrap(), "\"entangle\"");
        assert_eq!(serde_json::to_string(&CueKind::Reveal).unwrap(), "\"reveal\"");
        assert_eq!(
            serde_json::to_string(&ResolutionStatus::Exhausted).unwrap(),
            "\"exhausted\""
        );
    }
}
