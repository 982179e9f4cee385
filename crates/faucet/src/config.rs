//! Faucet configuration

use mission_control_common::units::tokens_to_base;
use mission_control_common::Address;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Variables that must be present (and non-empty) at startup.
pub const REQUIRED_VARS: [&str; 8] = [
    "DISCORD_TOKEN",
    "DISCORD_CHANNEL",
    "TESTS_DISCORD_CHANNEL",
    "NOT_LIMITED_USERS",
    "SLACK_WEBHOOK",
    "RPC_URL",
    "ACCOUNT_ID",
    "ACCOUNT_KEY",
];

/// Ten years.
const MAX_SEND_INTERVAL_HOURS: u64 = 24 * 365 * 10;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing {} env variables", .0.join(", "))]
    Missing(Vec<&'static str>),

    #[error("Invalid {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
}

/// Faucet bot configuration
#[derive(Clone, Serialize, Deserialize)]
pub struct FaucetConfig {
    /// Discord bot token
    pub discord_token: String,

    /// Channels the bot answers in
    pub discord_channel: u64,
    pub tests_discord_channel: u64,

    /// Requesters exempt from the cooldown (monitoring)
    pub not_limited_users: Vec<String>,

    /// Webhook for low-balance alerts
    pub slack_webhook: String,

    /// RPC endpoint for blockchain
    pub rpc_url: String,

    /// Operator account and its private key
    pub account_id: Address,
    pub account_key: String,

    /// Whole tokens sent per grant
    pub token_count: u128,

    /// Cooldown between grants to one requester, in hours
    pub faucet_send_interval_hours: u64,

    /// Operator balance alert floor, in whole tokens
    pub balance_alert_threshold: u128,

    /// Symbol shown in replies and alerts
    pub token_symbol: String,

    /// Gas price to use (base units)
    pub gas_price: u128,

    /// Gas limit for transfers
    pub gas_limit: u64,

    /// Fallback poll interval while waiting for the queue head
    pub queue_poll_interval_secs: u64,

    /// Upper bound on one submission, receipt included
    pub submission_timeout_secs: u64,

    /// Receipt poll interval after submission
    pub receipt_poll_interval_ms: u64,

    /// Bind address of the HTTP status server, disabled when unset
    pub status_addr: Option<String>,
}

impl Default for FaucetConfig {
    fn default() -> Self {
        Self {
            discord_token: String::new(),
            discord_channel: 0,
            tests_discord_channel: 0,
            not_limited_users: Vec::new(),
            slack_webhook: String::new(),
            rpc_url: "http://localhost:9933".to_string(),
            account_id: Address::default(),
            account_key: String::new(),
            token_count: 10,
            faucet_send_interval_hours: 1,
            balance_alert_threshold: 100,
            token_symbol: "DEV".to_string(),
            gas_price: 1,
            gas_limit: 0x21000,
            queue_poll_interval_secs: 6, // block time
            submission_timeout_secs: 120,
            receipt_poll_interval_ms: 2_000,
            status_addr: None,
        }
    }
}

impl FaucetConfig {
    /// Load from environment variables with defaults
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load through an arbitrary variable lookup. Every missing required
    /// variable is reported, not just the first.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let missing: Vec<&'static str> = REQUIRED_VARS
            .iter()
            .copied()
            .filter(|key| get(key).is_none())
            .collect();
        if !missing.is_empty() {
            return Err(ConfigError::Missing(missing));
        }

        let required = |key: &'static str| {
            get(key).ok_or(ConfigError::Missing(vec![key]))
        };

        let mut config = Self {
            discord_token: required("DISCORD_TOKEN")?,
            discord_channel: parse_number("DISCORD_CHANNEL", &required("DISCORD_CHANNEL")?)?,
            tests_discord_channel: parse_number("TESTS_DISCORD_CHANNEL", &required("TESTS_DISCORD_CHANNEL")?)?,
            not_limited_users: parse_user_list(&required("NOT_LIMITED_USERS")?)?,
            slack_webhook: required("SLACK_WEBHOOK")?,
            rpc_url: required("RPC_URL")?,
            account_id: required("ACCOUNT_ID")?
                .parse()
                .map_err(|e| invalid("ACCOUNT_ID", e))?,
            account_key: required("ACCOUNT_KEY")?,
            ..Self::default()
        };

        if let Some(count) = get("TOKEN_COUNT") {
            config.token_count = parse_positive("TOKEN_COUNT", &count)?;
        }
        if let Some(interval) = get("FAUCET_SEND_INTERVAL") {
            config.faucet_send_interval_hours = parse_positive("FAUCET_SEND_INTERVAL", &interval)?;
            if config.faucet_send_interval_hours > MAX_SEND_INTERVAL_HOURS {
                return Err(invalid("FAUCET_SEND_INTERVAL", "interval too large"));
            }
        }
        if let Some(threshold) = get("BALANCE_ALERT_THRESHOLD") {
            config.balance_alert_threshold = parse_positive("BALANCE_ALERT_THRESHOLD", &threshold)?;
        }
        if let Some(symbol) = get("TOKEN_SYMBOL") {
            config.token_symbol = symbol;
        }
        if let Some(gas_price) = get("GAS_PRICE") {
            config.gas_price = parse_number("GAS_PRICE", &gas_price)?;
        }
        if let Some(gas_limit) = get("GAS_LIMIT") {
            config.gas_limit = parse_positive("GAS_LIMIT", &gas_limit)?;
        }
        if let Some(poll) = get("QUEUE_POLL_INTERVAL") {
            config.queue_poll_interval_secs = parse_positive("QUEUE_POLL_INTERVAL", &poll)?;
        }
        if let Some(timeout) = get("SUBMISSION_TIMEOUT") {
            config.submission_timeout_secs = parse_positive("SUBMISSION_TIMEOUT", &timeout)?;
        }
        config.status_addr = get("STATUS_ADDR");

        config.amount_per_request()?;
        Ok(config)
    }

    /// Base units sent per grant.
    pub fn amount_per_request(&self) -> Result<u128, ConfigError> {
        tokens_to_base(self.token_count).ok_or_else(|| ConfigError::Invalid {
            key: "TOKEN_COUNT",
            reason: "amount overflows".to_string(),
        })
    }

    /// Alert floor in base units.
    pub fn alert_threshold(&self) -> Result<u128, ConfigError> {
        tokens_to_base(self.balance_alert_threshold).ok_or_else(|| ConfigError::Invalid {
            key: "BALANCE_ALERT_THRESHOLD",
            reason: "amount overflows".to_string(),
        })
    }

    pub fn send_interval(&self) -> chrono::Duration {
        chrono::Duration::hours(self.faucet_send_interval_hours as i64)
    }

    pub fn queue_poll_interval(&self) -> Duration {
        Duration::from_secs(self.queue_poll_interval_secs)
    }

    pub fn submission_timeout(&self) -> Duration {
        Duration::from_secs(self.submission_timeout_secs)
    }

    pub fn receipt_poll_interval(&self) -> Duration {
        Duration::from_millis(self.receipt_poll_interval_ms)
    }

    pub fn channels(&self) -> [u64; 2] {
        [self.discord_channel, self.tests_discord_channel]
    }
}

impl std::fmt::Debug for FaucetConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FaucetConfig")
            .field("discord_channel", &self.discord_channel)
            .field("tests_discord_channel", &self.tests_discord_channel)
            .field("not_limited_users", &self.not_limited_users)
            .field("rpc_url", &self.rpc_url)
            .field("account_id", &self.account_id)
            .field("token_count", &self.token_count)
            .field("faucet_send_interval_hours", &self.faucet_send_interval_hours)
            .field("balance_alert_threshold", &self.balance_alert_threshold)
            .field("gas_price", &self.gas_price)
            .field("gas_limit", &self.gas_limit)
            .field("status_addr", &self.status_addr)
            .finish_non_exhaustive()
    }
}

fn invalid(key: &'static str, reason: impl ToString) -> ConfigError {
    ConfigError::Invalid {
        key,
        reason: reason.to_string(),
    }
}

/// Decimal, or hex with a `0x` prefix.
fn parse_number<T>(key: &'static str, value: &str) -> Result<T, ConfigError>
where
    T: TryFrom<u128>,
{
    let value = value.trim();
    let parsed = match value.strip_prefix("0x") {
        Some(hex_digits) => u128::from_str_radix(hex_digits, 16),
        None => value.parse::<u128>(),
    }
    .map_err(|e| invalid(key, format!("{} ({})", e, value)))?;

    T::try_from(parsed).map_err(|_| invalid(key, format!("out of range ({})", value)))
}

fn parse_positive<T>(key: &'static str, value: &str) -> Result<T, ConfigError>
where
    T: TryFrom<u128>,
{
    if parse_number::<u128>(key, value)? == 0 {
        return Err(invalid(key, "must be greater than zero"));
    }
    parse_number(key, value)
}

/// JSON array of requester ids; numeric ids are accepted too.
fn parse_user_list(value: &str) -> Result<Vec<String>, ConfigError> {
    let entries: Vec<serde_json::Value> =
        serde_json::from_str(value).map_err(|e| invalid("NOT_LIMITED_USERS", e))?;

    entries
        .into_iter()
        .map(|entry| match entry {
            serde_json::Value::String(id) => Ok(id),
            serde_json::Value::Number(id) => Ok(id.to_string()),
            other => Err(invalid(
                "NOT_LIMITED_USERS",
                format!("unexpected entry {}", other),
            )),
        })
        .collect()
}
