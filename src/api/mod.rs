//! HTTP API — Axum server exposing the consensus engine.
//!
//! One analysis endpoint plus health and weight introspection.
//! CORS enabled for local development.

pub mod routes;

use anyhow::{Context, Result};
use axum::{
    http::{header, HeaderValue, Method},
    routing::{get, post},
    Router,
};
use tower_http::cors::CorsLayer;
use tracing::info;

use routes::AppState;

/// Start the API server. This spawns a background task — it doesn't block.
pub fn spawn_server(state: AppState, host: &str, port: u16) -> Result<()> {
    let app = build_router(state);
    let addr: std::net::SocketAddr = format!("{host}:{port}")
        .parse()
        .with_context(|| format!("Invalid server address {host}:{port}"))?;

    tokio::spawn(async move {
        info!(%addr, "API server starting");

        match tokio::net::TcpListener::bind(addr).await {
            Ok(listener) => {
                if let Err(e) = axum::serve(listener, app).await {
                    tracing::error!(error = %e, "API server error");
                }
            }
            Err(e) => tracing::error!(error = %e, "Failed to bind API port"),
        }
    });

    Ok(())
}

/// Build the Axum router with all routes and middleware.
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin("*".parse::<HeaderValue>().expect("static origin"))
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE]);

    Router::new()
        .route("/api/analyze", post(routes::analyze))
        .route("/api/weights", get(routes::weights))
        .route("/api/health", get(routes::health))
        .layer(cors)
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
