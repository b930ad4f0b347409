//! HTTP API surface.
//!
//! Stateless request/response over the shared [`ServiceContext`]. Every
//! request runs its own full forward pass; there is no queueing, batching,
//! admission control, or cancellation anywhere in the request path. That
//! absence of backpressure is a known scalability gap, preserved
//! deliberately.

pub mod routes;

use anyhow::{Context as _, Result};
use axum::routing::{get, post};
use axum::Router;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::config::ServerConfig;
use crate::context::ServiceContext;

/// Build the router with all routes bound to the shared context.
pub fn build_router(context: Arc<ServiceContext>) -> Router {
    Router::new()
        .route("/healthcheck", get(routes::healthcheck))
        .route(
            "/predict/feature_embedding/image",
            post(routes::predict_image),
        )
        .route(
            "/predict/feature_embedding/text",
            post(routes::predict_text),
        )
        .route("/predict/similar_images", post(routes::predict_similar))
        .layer(TraceLayer::new_for_http())
        .with_state(context)
}

/// Bind the listener and serve until the process is stopped.
pub async fn run(context: Arc<ServiceContext>, server: &ServerConfig) -> Result<()> {
    let addr: SocketAddr = format!("{}:{}", server.host, server.port)
        .parse()
        .with_context(|| format!("Invalid listen address {}:{}", server.host, server.port))?;

    let router = build_router(context);

    tracing::info!("Starting visim server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    axum::serve(listener, router)
        .await
        .context("Server error")?;

    Ok(())
}
