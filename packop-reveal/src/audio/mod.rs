//! Audio cue trigger contract
//!
//! The stage sequencer fires cues through [`CuePlayer`] and never looks at
//! the outcome. Implementations must not block and must silently no-op when
//! no audio capability is present.

mod output;
mod stream;
mod voice;

pub use output::{ContextState, CueOutput};
pub use packop_common::CueKind;
pub use stream::{CpalBackend, CpalStream, CueStream, SharedVoices, StreamBackend};
pub use voice::CueVoice;

use packop_common::config::AudioConfig;
use std::sync::Arc;

/// Fire-and-forget audio cue trigger
pub trait CuePlayer: Send + Sync {
    fn play_cue(&self, kind: CueKind);
}

/// Cue player for hosts without audio (or with audio disabled)
#[derive(Debug, Default, Clone, Copy)]
pub struct SilentCuePlayer;

impl CuePlayer for SilentCuePlayer {
    fn play_cue(&self, _kind: CueKind) {}
}

/// Cue player matching the audio configuration
pub fn cue_player_from_config(config: &AudioConfig) -> Arc<dyn CuePlayer> {
    if config.enabled {
        Arc::new(CueOutput::from_config(config))
    } else {
        Arc::new(SilentCuePlayer)
    }
}
