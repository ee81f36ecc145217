//! Test helper modules for packop-reveal integration tests
//!
//! - ScriptedProbe: per-URL probe outcomes with simulated load times
//! - RecordingCuePlayer: records every cue with its virtual timestamp

#![allow(dead_code)]

pub mod recording_cues;
pub mod scripted_probe;

pub use recording_cues::RecordingCuePlayer;
pub use scripted_probe::{ProbeAttempt, ScriptedProbe};

use packop_reveal::resolver::GatewayPolicy;
use std::time::Duration;

pub const MIRROR_A: &str = "https://mirror-a.test/ipfs/";
pub const MIRROR_B: &str = "https://mirror-b.test/ipfs/";
pub const MIRROR_C: &str = "https://mirror-c.test/ipfs/";
pub const PLACEHOLDER: &str = "https://placeholder.test/card.png";

/// Three test mirrors, the test placeholder and the production backoff
pub fn test_policy() -> GatewayPolicy {
    GatewayPolicy {
        mirrors: vec![MIRROR_A.to_string(), MIRROR_B.to_string(), MIRROR_C.to_string()],
        placeholder_url: PLACEHOLDER.to_string(),
        backoff: Duration::from_millis(300),
    }
}

/// Milliseconds of virtual time elapsed since `start`
pub fn elapsed_ms(start: tokio::time::Instant, at: tokio::time::Instant) -> u64 {
    u64::try_from(at.saturating_duration_since(start).as_millis()).unwrap_or(u64::MAX)
}
