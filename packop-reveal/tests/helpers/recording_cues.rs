//! Cue player recording every trigger

use packop_reveal::audio::{CueKind, CuePlayer};
use std::sync::Mutex;
use tokio::time::Instant;

#[derive(Default)]
pub struct RecordingCuePlayer {
    cues: Mutex<Vec<(CueKind, Instant)>>,
}

impl RecordingCuePlayer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cues(&self) -> Vec<(CueKind, Instant)> {
        self.cues.lock().unwrap().clone()
    }

    pub fn kinds(&self) -> Vec<CueKind> {
        self.cues().into_iter().map(|(kind, _)| kind).collect()
    }
}

impl CuePlayer for RecordingCuePlayer {
    fn play_cue(&self, kind: CueKind) {
        self.cues.lock().unwrap().push((kind, Instant::now()));
    }
}
