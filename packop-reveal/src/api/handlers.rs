//! HTTP request handlers

use crate::api::server::AppContext;
use crate::pack::PackSession;
use crate::reveal::RevealView;
use axum::{extract::State, http::StatusCode, Json};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    status: String,
    module: String,
    version: String,
    git_hash: String,
    port: u16,
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    status: String,
}

#[derive(Debug, Deserialize)]
pub struct RevealRequest {
    /// Content references in pack order
    cards: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct RevealStartedResponse {
    status: String,
    cards: usize,
}

#[derive(Debug, Serialize)]
pub struct SkipResponse {
    skipped: bool,
}

// ============================================================================
// Handlers
// ============================================================================

/// GET /health
pub async fn health(State(ctx): State<AppContext>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        module: "packop".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        git_hash: env!("GIT_HASH").to_string(),
        port: ctx.port,
    })
}

/// GET /api/v1/reveal - current reveal snapshot
pub async fn get_reveal(State(ctx): State<AppContext>) -> Json<RevealView> {
    Json(ctx.controller.view())
}

/// POST /api/v1/reveal - play a pack, superseding whatever is showing
pub async fn start_reveal(
    State(ctx): State<AppContext>,
    Json(request): Json<RevealRequest>,
) -> Result<(StatusCode, Json<RevealStartedResponse>), (StatusCode, Json<StatusResponse>)> {
    let pack = match PackSession::new(request.cards) {
        Ok(pack) => pack,
        Err(e) => {
            warn!("Rejected reveal request: {}", e);
            return Err((
                StatusCode::BAD_REQUEST,
                Json(StatusResponse {
                    status: format!("error: {}", e),
                }),
            ));
        }
    };

    let cards = pack.len();
    info!(cards, "Reveal requested");
    ctx.start_session(pack);

    Ok((
        StatusCode::ACCEPTED,
        Json(RevealStartedResponse {
            status: "started".to_string(),
            cards,
        }),
    ))
}

/// POST /api/v1/reveal/skip
pub async fn skip_reveal(State(ctx): State<AppContext>) -> Json<SkipResponse> {
    Json(SkipResponse {
        skipped: ctx.controller.skip(),
    })
}
