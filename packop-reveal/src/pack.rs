//! Multi-card pack session
//!
//! Presents the cards of a pack one after another on a single
//! `RevealController`: each completion advances to the next card, a skip
//! ends the session early and tears the reveal down.

use crate::error::{Error, Result};
use crate::reveal::{CardInput, RevealController};
use packop_common::events::RevealEvent;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Commands delivered from the controller callbacks to the session loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PackCommand {
    Completed,
    Skipped,
}

/// How a pack session ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PackOutcome {
    /// Cards that reached Complete
    pub revealed: usize,
    /// Whether the user skipped the rest of the pack
    pub skipped: bool,
}

/// Ordered cards of one pack
#[derive(Debug, Clone)]
pub struct PackSession {
    references: Vec<String>,
}

impl PackSession {
    pub fn new(references: Vec<String>) -> Result<Self> {
        if references.is_empty() {
            return Err(Error::InvalidInput("pack contains no cards".to_string()));
        }
        if references.iter().any(|r| r.trim().is_empty()) {
            return Err(Error::InvalidInput("card reference is empty".to_string()));
        }
        Ok(Self { references })
    }

    pub fn len(&self) -> usize {
        self.references.len()
    }

    pub fn is_empty(&self) -> bool {
        self.references.is_empty()
    }

    /// Cards with their 1-based ordinal and the pack total
    pub fn cards(&self) -> Vec<CardInput> {
        let total = u32::try_from(self.references.len()).unwrap_or(u32::MAX);
        self.references
            .iter()
            .zip(1..=total)
            .map(|(reference, ordinal)| CardInput::new(reference.clone()).with_position(ordinal, total))
            .collect()
    }

    /// Reveal every card in order on `controller`
    ///
    /// Installs the controller's completion and skip handlers for the
    /// duration of the session. Whatever the controller was showing before
    /// is torn down first.
    pub async fn run(self, controller: Arc<RevealController>) -> Result<PackOutcome> {
        let (tx, mut rx) = mpsc::channel(4);

        let completed = tx.clone();
        controller.set_on_complete(Arc::new(move || {
            if completed.try_send(PackCommand::Completed).is_err() {
                warn!("Pack session gone, completion dropped");
            }
        }));
        let skipped = tx;
        controller.set_on_skip(Some(Arc::new(move || {
            if skipped.try_send(PackCommand::Skipped).is_err() {
                warn!("Pack session gone, skip dropped");
            }
        })));

        let cards = self.cards();
        let total = cards.len();
        let mut outcome = PackOutcome {
            revealed: 0,
            skipped: false,
        };

        info!(cards = total, "Pack session started");
        // A previously shown card with the same key must not satisfy the first present
        controller.close();

        for card in cards {
            let ordinal = card.ordinal;
            controller.present(card)?;

            match rx.recv().await {
                Some(PackCommand::Completed) => {
                    outcome.revealed += 1;
                    debug!(ordinal, total, "Card revealed");
                }
                Some(PackCommand::Skipped) => {
                    info!(ordinal, total, "Pack skipped");
                    outcome.skipped = true;
                    controller.close();
                    break;
                }
                None => break,
            }
        }

        controller.set_on_skip(None);

        info!(
            revealed = outcome.revealed,
            skipped = outcome.skipped,
            "Pack session finished"
        );
        controller.events().emit_lossy(RevealEvent::PackFinished {
            revealed: outcome.revealed,
            skipped: outcome.skipped,
            timestamp: packop_common::time::now(),
        });

        Ok(outcome)
    }
}
