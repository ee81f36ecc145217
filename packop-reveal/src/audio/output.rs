//! Cue output context
//!
//! The context is created on the first cue and reused for the lifetime of
//! its owner. Its stream lives on a dedicated audio thread (cpal streams must
//! not be created on the async runtime); the owner talks to it over a command
//! channel and never waits for it. Cues sent while the device is still
//! opening queue on the channel and play once the stream is up. The stream
//! starts suspended, suspends itself when no cue has been playing for a
//! while, and is resumed before every cue.

use super::stream::{lock_voices, CpalBackend, CueStream, SharedVoices, StreamBackend};
use super::voice::CueVoice;
use super::CuePlayer;
use crate::error::{Error, Result};
use packop_common::config::AudioConfig;
use packop_common::CueKind;
use std::sync::mpsc;
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::JoinHandle;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Idle time after which the stream is suspended
const IDLE_SUSPEND: Duration = Duration::from_secs(2);

/// Lifecycle of the cue context as seen by its owner
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextState {
    /// No cue has been played yet
    NotCreated,
    /// Audio thread spawned, device not open yet
    Opening,
    Running,
    Suspended,
    /// Device could not be opened (or the context was released); cues are no-ops
    Unavailable,
}

/// Lazily opened, owner-scoped audio output for cues
pub struct CueOutput<B: StreamBackend = CpalBackend> {
    backend: Arc<B>,
    idle_suspend: Duration,
    context: Mutex<ContextSlot>,
}

enum ContextSlot {
    NotCreated,
    Created(AudioContext),
    Unavailable,
}

enum ContextCommand {
    Resume,
    Play(CueKind),
    Shutdown,
}

type SharedState = Arc<Mutex<ContextState>>;

/// Handle to the audio thread owning the stream
struct AudioContext {
    commands: mpsc::Sender<ContextCommand>,
    state: SharedState,
    thread: Option<JoinHandle<()>>,
}

impl CueOutput<CpalBackend> {
    pub fn new(device_name: Option<String>, volume: f32) -> Self {
        Self::with_backend(CpalBackend::new(device_name, volume), IDLE_SUSPEND)
    }

    pub fn from_config(config: &AudioConfig) -> Self {
        Self::new(config.device.clone(), config.volume)
    }
}

impl<B: StreamBackend> CueOutput<B> {
    pub fn with_backend(backend: B, idle_suspend: Duration) -> Self {
        Self {
            backend: Arc::new(backend),
            idle_suspend,
            context: Mutex::new(ContextSlot::NotCreated),
        }
    }

    pub fn state(&self) -> ContextState {
        match &*self.lock_context() {
            ContextSlot::NotCreated => ContextState::NotCreated,
            ContextSlot::Created(context) => context.state(),
            ContextSlot::Unavailable => ContextState::Unavailable,
        }
    }

    fn lock_context(&self) -> MutexGuard<'_, ContextSlot> {
        self.context.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl<B: StreamBackend> CuePlayer for CueOutput<B> {
    fn play_cue(&self, kind: CueKind) {
        let mut slot = self.lock_context();

        if matches!(*slot, ContextSlot::NotCreated) {
            *slot = match AudioContext::spawn(Arc::clone(&self.backend), self.idle_suspend) {
                Ok(context) => ContextSlot::Created(context),
                Err(e) => {
                    warn!("Audio cues unavailable, continuing silently: {}", e);
                    ContextSlot::Unavailable
                }
            };
        }

        match &*slot {
            ContextSlot::Created(context) => context.trigger(kind),
            _ => debug!(cue = %kind, "No audio context, cue skipped"),
        }
    }
}

impl<B: StreamBackend> Drop for CueOutput<B> {
    fn drop(&mut self) {
        let slot = std::mem::replace(&mut *self.lock_context(), ContextSlot::Unavailable);
        if let ContextSlot::Created(context) = slot {
            context.close();
        }
    }
}

fn lock_state(state: &Mutex<ContextState>) -> MutexGuard<'_, ContextState> {
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn set_state(state: &Mutex<ContextState>, next: ContextState) {
    *lock_state(state) = next;
}

impl AudioContext {
    /// Spawn the audio thread; the device is opened there
    fn spawn<B: StreamBackend>(backend: Arc<B>, idle_suspend: Duration) -> Result<Self> {
        let (commands, command_rx) = mpsc::channel();
        let state: SharedState = Arc::new(Mutex::new(ContextState::Opening));
        let thread_state = Arc::clone(&state);

        let thread = std::thread::Builder::new()
            .name("packop-cues".to_string())
            .spawn(move || run_audio_thread(backend.as_ref(), command_rx, &thread_state, idle_suspend))
            .map_err(|e| Error::AudioOutput(format!("Failed to spawn audio thread: {}", e)))?;

        Ok(Self {
            commands,
            state,
            thread: Some(thread),
        })
    }

    fn state(&self) -> ContextState {
        *lock_state(&self.state)
    }

    fn trigger(&self, kind: CueKind) {
        match self.state() {
            ContextState::Unavailable => debug!(cue = %kind, "Audio context unavailable, cue skipped"),
            ContextState::Suspended => {
                debug!("Resuming suspended audio context");
                self.send(ContextCommand::Resume);
                self.send(ContextCommand::Play(kind));
            }
            _ => self.send(ContextCommand::Play(kind)),
        }
    }

    fn send(&self, command: ContextCommand) {
        if self.commands.send(command).is_err() {
            debug!("Audio thread gone, command dropped");
        }
    }

    fn close(mut self) {
        self.send(ContextCommand::Shutdown);
        let Some(thread) = self.thread.take() else {
            return;
        };
        if self.state() == ContextState::Opening {
            // Exits on its own once the device answers and it sees Shutdown
            debug!("Audio device still opening, not waiting for the audio thread");
            return;
        }
        if thread.join().is_err() {
            error!("Audio thread panicked");
        }
    }
}

/// Audio thread body: opens the stream, then serves commands until Shutdown
/// or the owner goes away
fn run_audio_thread<B: StreamBackend>(
    backend: &B,
    commands: mpsc::Receiver<ContextCommand>,
    state: &Mutex<ContextState>,
    idle_suspend: Duration,
) {
    let voices: SharedVoices = Arc::new(Mutex::new(Vec::new()));

    let (stream, sample_rate) = match backend.open(Arc::clone(&voices)) {
        Ok(opened) => opened,
        Err(e) => {
            warn!("Audio cues unavailable, continuing silently: {}", e);
            set_state(state, ContextState::Unavailable);
            return;
        }
    };

    // Built suspended; the first cue resumes it
    if let Err(e) = stream.pause() {
        debug!("Stream could not be paused initially: {}", e);
    }
    set_state(state, ContextState::Suspended);
    info!(sample_rate, "Audio cue context opened");

    let resume = |stream: &B::Stream| match stream.play() {
        Ok(()) => set_state(state, ContextState::Running),
        Err(e) => warn!("Failed to resume audio stream: {}", e),
    };

    loop {
        match commands.recv_timeout(idle_suspend) {
            Ok(ContextCommand::Resume) => resume(&stream),
            Ok(ContextCommand::Play(kind)) => {
                if *lock_state(state) == ContextState::Suspended {
                    resume(&stream);
                }
                debug!(cue = %kind, "Playing cue");
                lock_voices(&voices).push(CueVoice::new(kind, sample_rate));
            }
            Ok(ContextCommand::Shutdown) | Err(mpsc::RecvTimeoutError::Disconnected) => break,
            Err(mpsc::RecvTimeoutError::Timeout) => {
                let idle = lock_voices(&voices).is_empty();
                if idle && *lock_state(state) == ContextState::Running {
                    match stream.pause() {
                        Ok(()) => {
                            set_state(state, ContextState::Suspended);
                            debug!("Audio context idle, suspended");
                        }
                        Err(e) => debug!("Failed to suspend idle stream: {}", e),
                    }
                }
            }
        }
    }

    drop(stream);
    set_state(state, ContextState::Unavailable);
    info!("Audio cue context released");
}
