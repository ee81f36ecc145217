//! Reveal presentation instance
//!
//! One `RevealController` corresponds to one mounted reveal: it owns the
//! resolver, the stage sequencer and (through the sequencer) the cue output.
//! Presenting a card with a new `(reference, ordinal)` restarts both
//! components; presenting the same card again changes nothing.

use crate::audio::{cue_player_from_config, CuePlayer};
use crate::error::{Error, Result};
use crate::resolver::{GatewayPolicy, HttpImageProbe, ImageProbe, ResourceResolver};
use crate::sequencer::{CompletionCallback, RunKey, StageSequencer};
use packop_common::config::TomlConfig;
use packop_common::events::{EventBus, RevealEvent};
use packop_common::{ResolutionStatus, Stage};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info};

/// Skip affordance handler supplied by the host
pub type SkipHandler = Arc<dyn Fn() + Send + Sync>;

fn default_position() -> u32 {
    1
}

/// Card supplied by the hosting surface
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardInput {
    /// Content reference of the card artwork
    pub reference: String,
    /// 1-based position of this card in the pack
    #[serde(default = "default_position")]
    pub ordinal: u32,
    /// Number of cards in the pack (only decides skip availability)
    #[serde(default = "default_position")]
    pub total: u32,
}

impl CardInput {
    pub fn new(reference: impl Into<String>) -> Self {
        Self {
            reference: reference.into(),
            ordinal: 1,
            total: 1,
        }
    }

    pub fn with_position(mut self, ordinal: u32, total: u32) -> Self {
        self.ordinal = ordinal;
        self.total = total;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.ordinal == 0 {
            return Err(Error::InvalidInput("card ordinal must be at least 1".to_string()));
        }
        if self.total == 0 {
            return Err(Error::InvalidInput("pack total must be at least 1".to_string()));
        }
        Ok(())
    }

    pub fn run_key(&self) -> RunKey {
        RunKey::new(self.reference.clone(), self.ordinal)
    }

    /// Caption shown under the revealed card
    pub fn recovered_label(&self) -> String {
        format!("#{:04} RECOVERED", self.ordinal)
    }
}

/// Snapshot of what the surface should render
#[derive(Debug, Clone, Serialize)]
pub struct RevealView {
    pub card: Option<CardInput>,
    pub stage: Option<Stage>,
    pub image_url: Option<String>,
    pub image_status: Option<ResolutionStatus>,
    /// True once resolution is terminal (resolved or placeholder adopted)
    pub image_loaded: bool,
    pub skip_available: bool,
    pub label: Option<String>,
}

/// One mounted reveal
pub struct RevealController {
    resolver: ResourceResolver,
    sequencer: StageSequencer,
    events: EventBus,
    current: Mutex<Option<CardInput>>,
    on_skip: Mutex<Option<SkipHandler>>,
}

impl RevealController {
    pub fn new(
        probe: Arc<dyn ImageProbe>,
        policy: GatewayPolicy,
        cues: Arc<dyn CuePlayer>,
        events: EventBus,
    ) -> Self {
        Self {
            resolver: ResourceResolver::new(probe, policy, events.clone()),
            sequencer: StageSequencer::new(cues, events.clone()),
            events,
            current: Mutex::new(None),
            on_skip: Mutex::new(None),
        }
    }

    /// Controller with the HTTP probe and the configured cue output
    pub fn from_config(config: &TomlConfig, events: EventBus) -> Result<Self> {
        config.validate()?;
        let probe = HttpImageProbe::from_config(&config.gateways)?;
        Ok(Self::new(
            Arc::new(probe),
            GatewayPolicy::from_config(&config.gateways),
            cue_player_from_config(&config.audio),
            events,
        ))
    }

    pub fn set_on_complete(&self, callback: CompletionCallback) {
        self.sequencer.set_on_complete(callback);
    }

    pub fn set_on_skip(&self, handler: Option<SkipHandler>) {
        *lock(&self.on_skip) = handler;
    }

    /// Show `card`, restarting resolution and the timeline if it is a new card
    ///
    /// Returns whether a restart happened.
    pub fn present(&self, card: CardInput) -> Result<bool> {
        card.validate()?;

        let mut current = lock(&self.current);
        if let Some(shown) = current.as_mut() {
            if shown.run_key() == card.run_key() {
                debug!(key = %card.run_key(), "Card unchanged, keeping current run");
                shown.total = card.total;
                return Ok(false);
            }
        }

        info!(
            reference = %card.reference,
            ordinal = card.ordinal,
            total = card.total,
            "Presenting card"
        );
        self.resolver.resolve(card.reference.as_str());
        self.sequencer.start(card.run_key());
        *current = Some(card);
        Ok(true)
    }

    /// Invoke the host's skip handler when the affordance is offered
    ///
    /// Pending transitions keep running; the host is expected to tear the
    /// reveal down (see [`RevealController::close`]).
    pub fn skip(&self) -> bool {
        let card = lock(&self.current).clone();
        let handler = lock(&self.on_skip).clone();

        match (card, handler) {
            (Some(card), Some(handler)) if card.total > 1 => {
                info!(ordinal = card.ordinal, total = card.total, "Skip requested");
                self.events.emit_lossy(RevealEvent::SkipRequested {
                    ordinal: card.ordinal,
                    total: card.total,
                    timestamp: packop_common::time::now(),
                });
                handler();
                true
            }
            _ => {
                debug!("Skip not available");
                false
            }
        }
    }

    /// Tear the reveal down: cancel resolution and every pending transition
    pub fn close(&self) {
        self.resolver.cancel();
        self.sequencer.cancel();
        *lock(&self.current) = None;
    }

    pub fn view(&self) -> RevealView {
        let card = lock(&self.current).clone();
        let skip_available =
            lock(&self.on_skip).is_some() && card.as_ref().is_some_and(|c| c.total > 1);

        let resolution = card.as_ref().and(self.resolver.state());
        let stage = card.as_ref().and(self.sequencer.current()).map(|s| s.stage);

        RevealView {
            label: card.as_ref().map(CardInput::recovered_label),
            stage,
            image_url: resolution.as_ref().and_then(|r| r.current_url().map(str::to_string)),
            image_status: resolution.as_ref().map(|r| r.status),
            image_loaded: resolution.as_ref().is_some_and(|r| r.is_terminal()),
            skip_available,
            card,
        }
    }

    pub fn resolver(&self) -> &ResourceResolver {
        &self.resolver
    }

    pub fn sequencer(&self) -> &StageSequencer {
        &self.sequencer
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
