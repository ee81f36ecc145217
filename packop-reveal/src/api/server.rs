//! HTTP server setup and routing
//!
//! Sets up the Axum HTTP server with routes for the reveal endpoints and SSE.

use crate::error::{Error, Result};
use crate::pack::PackSession;
use crate::reveal::RevealController;
use axum::{
    routing::{get, post},
    Router,
};
use packop_common::events::EventBus;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use tokio::task::JoinHandle;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

/// Shared application context passed to all handlers
#[derive(Clone)]
pub struct AppContext {
    pub controller: Arc<RevealController>,
    pub events: EventBus,
    pub port: u16,
    session: Arc<Mutex<Option<JoinHandle<()>>>>,
}

impl AppContext {
    pub fn new(controller: Arc<RevealController>, port: u16) -> Self {
        let events = controller.events().clone();
        Self {
            controller,
            events,
            port,
            session: Arc::new(Mutex::new(None)),
        }
    }

    /// Start `pack` on the shared controller, superseding a running session
    pub fn start_session(&self, pack: PackSession) {
        let mut slot = self.session.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(previous) = slot.take() {
            if !previous.is_finished() {
                info!("Superseding running pack session");
                previous.abort();
            }
        }

        let controller = Arc::clone(&self.controller);
        *slot = Some(tokio::spawn(async move {
            match pack.run(controller).await {
                Ok(outcome) => info!(
                    revealed = outcome.revealed,
                    skipped = outcome.skipped,
                    "Pack session ended"
                ),
                Err(e) => warn!("Pack session failed: {}", e),
            }
        }));
    }

    /// Whether a pack session is still being played
    pub fn session_active(&self) -> bool {
        self.session
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }
}

/// Build the router with every endpoint attached to `ctx`
pub fn router(ctx: AppContext) -> Router {
    Router::new()
        // Health endpoint
        .route("/health", get(super::handlers::health))
        // Reveal control
        .route(
            "/api/v1/reveal",
            get(super::handlers::get_reveal).post(super::handlers::start_reveal),
        )
        .route("/api/v1/reveal/skip", post(super::handlers::skip_reveal))
        // SSE event stream
        .route("/api/v1/events", get(super::sse::event_stream))
        .with_state(ctx)
        .layer(TraceLayer::new_for_http())
        // Enable CORS for local access
        .layer(CorsLayer::permissive())
}

/// Run the HTTP API server until `shutdown` resolves
pub async fn run<F>(ctx: AppContext, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let addr = SocketAddr::from(([0, 0, 0, 0], ctx.port));
    let controller = Arc::clone(&ctx.controller);
    let app = router(ctx);

    info!("Starting HTTP server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| Error::Http(format!("Failed to bind to {}: {}", addr, e)))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|e| Error::Http(format!("Server error: {}", e)))?;

    controller.close();
    info!("HTTP server stopped");
    Ok(())
}
