//! HTTP/SSE control surface
//!
//! Hosts one reveal at a time: a POSTed pack is played on the shared
//! `RevealController`, its progress is readable as a `RevealView` and
//! streamed as `RevealEvent`s over SSE.

pub mod handlers;
pub mod server;
pub mod sse;

pub use server::{router, run, AppContext};
