//! Stage sequencer integration tests on virtual time

mod helpers;

use helpers::{elapsed_ms, RecordingCuePlayer};
use packop_common::events::{EventBus, RevealEvent};
use packop_common::{CueKind, Stage};
use packop_reveal::audio::CuePlayer;
use packop_reveal::sequencer::{RunKey, StageSequencer};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;

fn sequencer(cues: &Arc<RecordingCuePlayer>, events: EventBus) -> StageSequencer {
    let cues: Arc<dyn CuePlayer> = cues.clone();
    StageSequencer::new(cues, events)
}

fn drain(rx: &mut tokio::sync::broadcast::Receiver<RevealEvent>) -> Vec<RevealEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

fn entered(events: &[RevealEvent]) -> Vec<(String, Stage)> {
    events
        .iter()
        .filter_map(|e| match e {
            RevealEvent::StageEntered { reference, stage, .. } => Some((reference.clone(), *stage)),
            _ => None,
        })
        .collect()
}

#[tokio::test(start_paused = true)]
async fn test_stages_fire_in_order_at_their_offsets() {
    let cues = Arc::new(RecordingCuePlayer::new());
    let events = EventBus::new(64);
    let mut rx = events.subscribe();
    let seq = sequencer(&cues, events);

    let completed_at = Arc::new(Mutex::new(Vec::new()));
    let recorder = Arc::clone(&completed_at);
    seq.set_on_complete(Arc::new(move || recorder.lock().unwrap().push(Instant::now())));

    let start = Instant::now();
    seq.start(RunKey::new("ipfs://Qm1", 1));
    tokio::time::sleep(Duration::from_secs(12)).await;

    let stages: Vec<Stage> = entered(&drain(&mut rx)).into_iter().map(|(_, s)| s).collect();
    assert_eq!(stages, Stage::TIMELINE.to_vec());

    let cue_times: Vec<(CueKind, u64)> = cues
        .cues()
        .into_iter()
        .map(|(kind, at)| (kind, elapsed_ms(start, at)))
        .collect();
    assert_eq!(
        cue_times,
        vec![
            (CueKind::Ambient, 0),
            (CueKind::Entangle, 1_500),
            (CueKind::Reveal, 4_500),
        ]
    );

    let completed_at = completed_at.lock().unwrap();
    assert_eq!(completed_at.len(), 1);
    assert_eq!(elapsed_ms(start, completed_at[0]), 8_500);
}

#[tokio::test(start_paused = true)]
async fn test_restart_mid_entangle_discards_old_run() {
    let cues = Arc::new(RecordingCuePlayer::new());
    let events = EventBus::new(64);
    let mut rx = events.subscribe();
    let seq = sequencer(&cues, events);

    let completions = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&completions);
    seq.set_on_complete(Arc::new(move || {
        counter.fetch_add(1, Ordering::SeqCst);
    }));

    let start = Instant::now();
    let run1 = seq.start(RunKey::new("ipfs://R1", 1));
    tokio::time::sleep(Duration::from_millis(2_000)).await;
    let run2 = seq.start(RunKey::new("ipfs://R2", 1));

    // Fresh Summon is visible before any time passes
    let snapshot = seq.current().unwrap();
    assert_eq!(snapshot.run, run2);
    assert_ne!(run1, run2);
    assert_eq!(snapshot.stage, Stage::Summon);

    tokio::time::sleep(Duration::from_secs(15)).await;

    let events = drain(&mut rx);
    let stages = entered(&events);
    assert!(!stages
        .iter()
        .any(|(r, s)| r == "ipfs://R1" && matches!(s, Stage::Reveal | Stage::Complete)));
    assert_eq!(
        stages.iter().filter(|(r, _)| r == "ipfs://R2").map(|(_, s)| *s).collect::<Vec<_>>(),
        Stage::TIMELINE.to_vec()
    );

    let cancelled: Vec<_> = events
        .iter()
        .filter_map(|e| match e {
            RevealEvent::RunCancelled { reference, last_stage, .. } => Some((reference.as_str(), *last_stage)),
            _ => None,
        })
        .collect();
    assert_eq!(cancelled, vec![("ipfs://R1", Stage::Entangle)]);

    let cue_times: Vec<(CueKind, u64)> = cues
        .cues()
        .into_iter()
        .map(|(kind, at)| (kind, elapsed_ms(start, at)))
        .collect();
    assert_eq!(
        cue_times,
        vec![
            (CueKind::Ambient, 0),
            (CueKind::Entangle, 1_500),
            (CueKind::Ambient, 2_000),
            (CueKind::Entangle, 3_500),
            (CueKind::Reveal, 6_500),
        ]
    );
    assert_eq!(completions.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn test_restart_at_same_instant_as_transition() {
    let cues = Arc::new(RecordingCuePlayer::new());
    let seq = sequencer(&cues, EventBus::new(64));

    let completions = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&completions);
    seq.set_on_complete(Arc::new(move || {
        counter.fetch_add(1, Ordering::SeqCst);
    }));

    seq.start(RunKey::new("ipfs://R1", 1));
    // Land on Reveal's deadline; whichever wakes first, R1 must not complete
    tokio::time::sleep(Duration::from_millis(4_500)).await;
    let run2 = seq.start(RunKey::new("ipfs://R1", 2));

    tokio::time::sleep(Duration::from_millis(8_000)).await;
    assert_eq!(completions.load(Ordering::SeqCst), 0);
    assert_eq!(seq.current().unwrap().run, run2);
    assert_eq!(seq.current().unwrap().stage, Stage::Reveal);

    tokio::time::sleep(Duration::from_millis(1_000)).await;
    assert_eq!(completions.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn test_completion_callback_may_start_next_run() {
    let cues = Arc::new(RecordingCuePlayer::new());
    let seq = Arc::new(sequencer(&cues, EventBus::new(64)));

    let completions = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&completions);
    let weak = Arc::downgrade(&seq);
    seq.set_on_complete(Arc::new(move || {
        let done = counter.fetch_add(1, Ordering::SeqCst) + 1;
        if done < 2 {
            if let Some(seq) = weak.upgrade() {
                seq.start(RunKey::new("ipfs://next", 2));
            }
        }
    }));

    let start = Instant::now();
    seq.start(RunKey::new("ipfs://first", 1));

    tokio::time::sleep(Duration::from_millis(8_600)).await;
    assert_eq!(completions.load(Ordering::SeqCst), 1);
    let snapshot = seq.current().unwrap();
    assert_eq!(snapshot.key, RunKey::new("ipfs://next", 2));
    assert_eq!(snapshot.stage, Stage::Summon);

    tokio::time::sleep(Duration::from_secs(10)).await;
    assert_eq!(completions.load(Ordering::SeqCst), 2);
    assert!(!seq.is_running());

    let ambient: Vec<u64> = cues
        .cues()
        .into_iter()
        .filter(|(kind, _)| *kind == CueKind::Ambient)
        .map(|(_, at)| elapsed_ms(start, at))
        .collect();
    assert_eq!(ambient, vec![0, 8_500]);
}

#[tokio::test(start_paused = true)]
async fn test_drop_cancels_pending_transitions() {
    let cues = Arc::new(RecordingCuePlayer::new());
    let seq = sequencer(&cues, EventBus::new(64));

    let completions = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&completions);
    seq.set_on_complete(Arc::new(move || {
        counter.fetch_add(1, Ordering::SeqCst);
    }));

    seq.start(RunKey::new("ipfs://Qm", 1));
    tokio::time::sleep(Duration::from_millis(100)).await;
    drop(seq);

    tokio::time::sleep(Duration::from_secs(10)).await;
    assert_eq!(completions.load(Ordering::SeqCst), 0);
    assert_eq!(cues.kinds(), vec![CueKind::Ambient]);
}
