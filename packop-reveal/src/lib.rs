//! # Pack Opening Reveal Library (packop-reveal)
//!
//! Timed, audio-synchronized reveal of a single collectible card whose
//! artwork lives on a content-addressed network behind unreliable gateways.
//!
//! **Architecture:**
//! - `resolver`: sequential gateway probing with backoff and a guaranteed placeholder
//! - `sequencer`: fixed four-stage timeline with cancellable, run-scoped timers
//! - `audio`: cue trigger contract and a lazily opened cpal output context
//! - `reveal` / `pack`: the presentation instance and the multi-card session
//! - `api`: HTTP/SSE control surface

pub mod api;
pub mod audio;
pub mod error;
pub mod pack;
pub mod resolver;
pub mod reveal;
pub mod sequencer;

pub use error::{Error, Result};
pub use reveal::{CardInput, RevealController, RevealView};
