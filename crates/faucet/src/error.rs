//! Error types for the faucet bot

use crate::config::ConfigError;
use crate::cooldown::RemainingWait;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Faucet errors
#[derive(Error, Debug)]
pub enum FaucetError {
    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    #[error("Rate limited: try again in {remaining}")]
    RateLimited { remaining: RemainingWait },

    #[error("Transaction failed: {0}")]
    SubmissionFailed(String),

    #[error("Notification failed: {0}")]
    NotificationFailed(String),

    #[error("RPC error: {0}")]
    Rpc(String),

    #[error("Signing error: {0}")]
    Signing(String),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl FaucetError {
    /// Stable machine-readable code, used by the HTTP surface and metrics labels.
    pub fn code(&self) -> &'static str {
        match self {
            FaucetError::InvalidAddress(_) => "INVALID_ADDRESS",
            FaucetError::RateLimited { .. } => "RATE_LIMITED",
            FaucetError::SubmissionFailed(_) => "SUBMISSION_FAILED",
            FaucetError::NotificationFailed(_) => "NOTIFICATION_FAILED",
            FaucetError::Rpc(_) => "RPC_ERROR",
            FaucetError::Signing(_) => "SIGNING_ERROR",
            FaucetError::Config(_) => "CONFIG_ERROR",
            FaucetError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

impl IntoResponse for FaucetError {
    fn into_response(self) -> Response {
        let status = match self {
            FaucetError::InvalidAddress(_) => StatusCode::BAD_REQUEST,
            FaucetError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            FaucetError::Rpc(_) => StatusCode::BAD_GATEWAY,
            FaucetError::SubmissionFailed(_)
            | FaucetError::NotificationFailed(_)
            | FaucetError::Signing(_)
            | FaucetError::Config(_)
            | FaucetError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = Json(json!({
            "error": self.code(),
            "message": self.to_string(),
            "timestamp": chrono::Utc::now().to_rfc3339()
        }));

        (status, body).into_response()
    }
}

pub type FaucetResult<T> = Result<T, FaucetError>;

impl From<prometheus::Error> for FaucetError {
    fn from(e: prometheus::Error) -> Self {
        FaucetError::Internal(format!("Metrics error: {}", e))
    }
}
