//! HTTP status surface for operators

use crate::dispatcher::{AccountBalance, FaucetDispatcher, FaucetStatus};
use crate::error::FaucetResult;
use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde::Serialize;
use std::sync::Arc;
use tracing::error;

/// Success response
#[derive(Debug, Serialize)]
pub struct SuccessResponse<T> {
    pub data: T,
    pub timestamp: String,
}

impl<T> SuccessResponse<T> {
    fn new(data: T) -> Json<Self> {
        Json(Self {
            data,
            timestamp: chrono::Utc::now().to_rfc3339(),
        })
    }
}

pub fn router(dispatcher: Arc<FaucetDispatcher>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/api/status", get(status_handler))
        .route("/api/balance/:address", get(balance_handler))
        .route("/metrics", get(metrics_handler))
        .with_state(dispatcher)
}

/// Health check handler
pub async fn health_handler() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

/// Status handler
pub async fn status_handler(
    State(dispatcher): State<Arc<FaucetDispatcher>>,
) -> Json<SuccessResponse<FaucetStatus>> {
    SuccessResponse::new(dispatcher.status())
}

/// Balance lookup, same semantics as the `!balance` command
pub async fn balance_handler(
    State(dispatcher): State<Arc<FaucetDispatcher>>,
    Path(address): Path<String>,
) -> FaucetResult<Json<SuccessResponse<AccountBalance>>> {
    let balance = dispatcher.balance_of(&address).await?;
    Ok(SuccessResponse::new(balance))
}

/// Prometheus text exposition
pub async fn metrics_handler(State(dispatcher): State<Arc<FaucetDispatcher>>) -> impl IntoResponse {
    match dispatcher.metrics().gather_text() {
        Ok(text) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            text,
        )
            .into_response(),
        Err(e) => {
            error!("Failed to encode metrics: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
