//! Low-balance notifications.

use crate::error::{FaucetError, FaucetResult};
use async_trait::async_trait;
use mission_control_common::Address;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

/// Payload of a low-balance alert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LowBalanceAlert {
    pub account: Address,
    /// Current operator balance in whole tokens.
    pub balance_tokens: u128,
    pub remaining_grants: u128,
    pub token_symbol: String,
}

/// Destination for operator alerts.
#[async_trait]
pub trait AlertSink: Send + Sync {
    async fn low_balance(&self, alert: &LowBalanceAlert) -> FaucetResult<()>;
}

/// Deliver an alert in the background. Failures are logged and never reach
/// the caller.
pub fn spawn_alert(sink: Arc<dyn AlertSink>, alert: LowBalanceAlert) {
    tokio::spawn(async move {
        match sink.low_balance(&alert).await {
            Ok(()) => info!(
                account = %alert.account,
                balance = %alert.balance_tokens,
                "Low balance alert delivered"
            ),
            Err(e) => error!(
                account = %alert.account,
                error = %e,
                "Failed to deliver low balance alert"
            ),
        }
    });
}

/// Posts alerts to a Slack incoming webhook.
pub struct SlackNotifier {
    webhook: String,
    client: reqwest::Client,
}

impl SlackNotifier {
    pub fn new(webhook: String) -> FaucetResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| FaucetError::NotificationFailed(format!("Client setup failed: {}", e)))?;

        Ok(Self { webhook, client })
    }

    /// Slack "blocks" message naming the account and its balance.
    pub fn payload(alert: &LowBalanceAlert) -> serde_json::Value {
        json!({
            "blocks": [
                {
                    "type": "section",
                    "text": {
                        "type": "mrkdwn",
                        "text": "The account linked to the bot is running low on funds."
                    }
                },
                {
                    "type": "section",
                    "fields": [
                        {
                            "type": "mrkdwn",
                            "text": format!("*Account ID:*\n{}", alert.account)
                        },
                        {
                            "type": "mrkdwn",
                            "text": format!("*Current balance:*\n{} {}", alert.balance_tokens, alert.token_symbol)
                        },
                        {
                            "type": "mrkdwn",
                            "text": format!("*Remaining grants:*\n{}", alert.remaining_grants)
                        }
                    ]
                }
            ]
        })
    }
}

#[async_trait]
impl AlertSink for SlackNotifier {
    async fn low_balance(&self, alert: &LowBalanceAlert) -> FaucetResult<()> {
        let response = self
            .client
            .post(&self.webhook)
            .json(&Self::payload(alert))
            .send()
            .await
            .map_err(|e| FaucetError::NotificationFailed(format!("Request failed: {}", e)))?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        if !status.is_success() {
            return Err(FaucetError::NotificationFailed(format!(
                "Webhook returned {}: {}",
                status, body
            )));
        }

        info!("Received data from Slack webhook: {}", body);
        Ok(())
    }
}
