//! API route handlers.
//!
//! All endpoints return JSON. State is shared via `Arc<ApiState>`.

use axum::{extract::State, http::StatusCode, response::IntoResponse, response::Response, Json};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::warn;

use crate::engine::ConsensusEngine;
use crate::types::{ConsensusError, Market, Tier};
use crate::weights::WeightRegistry;

// ---------------------------------------------------------------------------
// Shared state
// ---------------------------------------------------------------------------

/// Shared state accessible by all route handlers.
pub struct ApiState {
    pub engine: ConsensusEngine,
    pub registry: Arc<WeightRegistry>,
}

pub type AppState = Arc<ApiState>;

// ---------------------------------------------------------------------------
// Request / response types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct AnalyzeRequest {
    pub market: Market,
    #[serde(default = "default_tier")]
    pub tier: Tier,
}

fn default_tier() -> Tier {
    Tier::Standard
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

#[derive(Debug, Serialize)]
pub struct WeightsResponse {
    pub version: u64,
    pub published_at: String,
    /// Sorted by provider id for stable output.
    pub weights: BTreeMap<String, f64>,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

// ---------------------------------------------------------------------------
// Route handlers
// ---------------------------------------------------------------------------

/// POST /api/analyze
pub async fn analyze(
    State(state): State<AppState>,
    Json(request): Json<AnalyzeRequest>,
) -> Response {
    match state.engine.analyze(&request.market, request.tier).await {
        Ok(result) => (StatusCode::OK, Json(result)).into_response(),
        Err(e) => error_response(e),
    }
}

/// GET /api/weights
pub async fn weights(State(state): State<AppState>) -> Json<WeightsResponse> {
    let snapshot = state.registry.snapshot();
    Json(WeightsResponse {
        version: snapshot.version,
        published_at: snapshot.published_at.to_rfc3339(),
        weights: snapshot
            .entries()
            .map(|(id, w)| (id.to_string(), w))
            .collect(),
    })
}

/// GET /api/health
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

fn error_response(error: ConsensusError) -> Response {
    let status = match &error {
        ConsensusError::Validation(_) => StatusCode::BAD_REQUEST,
        ConsensusError::AggregationFailed { .. } => StatusCode::BAD_GATEWAY,
        ConsensusError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    warn!(status = %status, error = %error, "Request failed");
    (
        status,
        Json(ErrorResponse {
            error: error.to_string(),
        }),
    )
        .into_response()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
