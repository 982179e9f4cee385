//! Faucet dispatcher: rate limiting, serialized submission and balance alerts.
//!
//! Request lifecycle:
//!
//! 1. the destination address is validated; malformed input never touches
//!    shared state
//! 2. the requester's cooldown is checked and optimistically reserved
//! 3. the request joins the FIFO submission queue and waits for the head
//! 4. the transfer is signed, submitted and awaited
//! 5. success commits the cooldown; failure rolls it back
//! 6. the operator balance is sampled (at most once per window) and a
//!    low-balance alert is raised when needed

use crate::alert::{spawn_alert, AlertSink, LowBalanceAlert};
use crate::balance_watch::{BalanceWatch, BALANCE_CHECK_INTERVAL_SECS};
use crate::clock::{Clock, SystemClock};
use crate::config::{ConfigError, FaucetConfig};
use crate::cooldown::CooldownBook;
use crate::error::{FaucetError, FaucetResult};
use crate::metrics::{
    FaucetMetrics, OUTCOME_FAILED, OUTCOME_GRANTED, OUTCOME_INVALID_ADDRESS, OUTCOME_RATE_LIMITED,
};
use crate::queue::SubmissionQueue;
use crate::rpc::ChainClient;
use crate::signer::{OperatorKey, TransferRequest};
use chrono::{DateTime, Utc};
use mission_control_common::units::base_to_tokens;
use mission_control_common::Address;
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::OnceCell;
use tracing::{debug, error, info, warn};

/// Tunables of the dispatcher, derived from [`FaucetConfig`].
#[derive(Debug, Clone)]
pub struct DispatcherSettings {
    /// Base units per grant
    pub amount_per_request: u128,
    pub gas_price: u128,
    pub gas_limit: u64,
    pub send_interval: chrono::Duration,
    pub not_limited_users: Vec<String>,
    /// Alert floor in base units
    pub alert_threshold: u128,
    pub balance_check_interval: chrono::Duration,
    pub queue_poll_interval: Duration,
    pub submission_timeout: Duration,
    pub receipt_poll_interval: Duration,
    pub token_symbol: String,
}

impl DispatcherSettings {
    pub fn from_config(config: &FaucetConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            amount_per_request: config.amount_per_request()?,
            gas_price: config.gas_price,
            gas_limit: config.gas_limit,
            send_interval: config.send_interval(),
            not_limited_users: config.not_limited_users.clone(),
            alert_threshold: config.alert_threshold()?,
            balance_check_interval: chrono::Duration::seconds(BALANCE_CHECK_INTERVAL_SECS),
            queue_poll_interval: config.queue_poll_interval(),
            submission_timeout: config.submission_timeout(),
            receipt_poll_interval: config.receipt_poll_interval(),
            token_symbol: config.token_symbol.clone(),
        })
    }
}

/// A completed grant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Grant {
    pub recipient: Address,
    /// Base units sent
    pub amount_sent: u128,
    /// Recipient balance after the transfer, if it could be read
    pub resulting_balance: Option<u128>,
    pub tx_hash: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccountBalance {
    pub address: Address,
    /// Base units, decimal string
    #[serde(serialize_with = "as_decimal")]
    pub balance: u128,
}

/// Snapshot for the status surface.
#[derive(Debug, Clone, Serialize)]
pub struct FaucetStatus {
    pub operator: Address,
    pub amount_per_request: String,
    pub token_symbol: String,
    pub queue_depth: usize,
    pub pending: Vec<String>,
    pub requesters: usize,
    pub last_balance: String,
    pub last_balance_checked_at: Option<DateTime<Utc>>,
}

fn as_decimal<S: serde::Serializer>(value: &u128, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&value.to_string())
}

pub struct FaucetDispatcher {
    settings: DispatcherSettings,
    operator: OperatorKey,
    chain: Arc<dyn ChainClient>,
    alerts: Arc<dyn AlertSink>,
    clock: Arc<dyn Clock>,
    cooldowns: CooldownBook,
    queue: SubmissionQueue,
    balance_watch: BalanceWatch,
    chain_id: OnceCell<u64>,
    /// Nonce of the last transaction accepted by the node
    last_nonce: Mutex<Option<u64>>,
    metrics: FaucetMetrics,
}

impl FaucetDispatcher {
    pub fn new(
        settings: DispatcherSettings,
        operator: OperatorKey,
        chain: Arc<dyn ChainClient>,
        alerts: Arc<dyn AlertSink>,
    ) -> FaucetResult<Self> {
        if settings.amount_per_request == 0 {
            return Err(ConfigError::Invalid {
                key: "TOKEN_COUNT",
                reason: "must be greater than zero".to_string(),
            }
            .into());
        }

        info!("Faucet operator address: {}", operator.address());

        Ok(Self {
            cooldowns: CooldownBook::new(settings.send_interval, settings.not_limited_users.clone()),
            queue: SubmissionQueue::new(settings.queue_poll_interval),
            balance_watch: BalanceWatch::new(
                settings.balance_check_interval,
                settings.alert_threshold,
                settings.amount_per_request,
            ),
            settings,
            operator,
            chain,
            alerts,
            clock: Arc::new(SystemClock),
            chain_id: OnceCell::new(),
            last_nonce: Mutex::new(None),
            metrics: FaucetMetrics::new()?,
        })
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn operator(&self) -> Address {
        self.operator.address()
    }

    pub fn settings(&self) -> &DispatcherSettings {
        &self.settings
    }

    pub fn metrics(&self) -> &FaucetMetrics {
        &self.metrics
    }

    pub fn cooldowns(&self) -> &CooldownBook {
        &self.cooldowns
    }

    pub fn queue(&self) -> &SubmissionQueue {
        &self.queue
    }

    /// Send one grant from the operator account to `destination`.
    pub async fn request_funds(&self, requester: &str, destination: &str) -> FaucetResult<Grant> {
        let recipient = self.parse_destination(destination)?;

        let cooldown = match self.cooldowns.try_reserve(requester, self.clock.now()) {
            Ok(guard) => guard,
            Err(remaining) => {
                info!(requester, "Request rejected, cooldown remaining {}", remaining);
                self.metrics.record_outcome(OUTCOME_RATE_LIMITED);
                return Err(FaucetError::RateLimited { remaining });
            }
        };

        let slot = self.queue.admit(format!("{}:{}", requester, recipient));
        self.metrics.queue_depth.set(self.queue.depth() as i64);
        slot.wait_turn().await;

        debug!(requester, seq = slot.seq(), "Submitting transfer to {}", recipient);
        let started = Instant::now();
        let mut sent_hash = None;
        let outcome = tokio::time::timeout(
            self.settings.submission_timeout,
            self.submit_transfer(recipient, &mut sent_hash),
        )
        .await;
        let outcome = match outcome {
            Ok(outcome) => outcome,
            Err(_) => Err(FaucetError::SubmissionFailed(match sent_hash {
                Some(tx_hash) => format!(
                    "no receipt for {} within {}s, it may still be included",
                    tx_hash,
                    self.settings.submission_timeout.as_secs()
                ),
                None => format!(
                    "not submitted within {}s",
                    self.settings.submission_timeout.as_secs()
                ),
            })),
        };
        drop(slot);
        self.metrics.queue_depth.set(self.queue.depth() as i64);

        let tx_hash = match outcome {
            Ok(tx_hash) => {
                cooldown.commit();
                self.metrics
                    .submission_duration
                    .observe(started.elapsed().as_secs_f64());
                tx_hash
            }
            Err(e) => {
                cooldown.rollback();
                // The chain becomes the nonce authority again.
                *self.last_nonce.lock() = None;
                error!(requester, "Transfer to {} failed: {}", recipient, e);
                self.metrics.record_outcome(OUTCOME_FAILED);
                return Err(match e {
                    FaucetError::SubmissionFailed(_) => e,
                    other => FaucetError::SubmissionFailed(other.to_string()),
                });
            }
        };

        let resulting_balance = match self.chain.balance(&recipient).await {
            Ok(balance) => Some(balance),
            Err(e) => {
                warn!("Could not read balance of {} after grant: {}", recipient, e);
                None
            }
        };

        self.check_operator_balance().await;

        self.metrics.record_outcome(OUTCOME_GRANTED);
        info!(requester, tx_hash = %tx_hash, "Sent {} base units to {}", self.settings.amount_per_request, recipient);

        Ok(Grant {
            recipient,
            amount_sent: self.settings.amount_per_request,
            resulting_balance,
            tx_hash,
        })
    }

    /// Read-only balance query; no rate limit.
    pub async fn balance_of(&self, destination: &str) -> FaucetResult<AccountBalance> {
        let address = self.parse_destination(destination)?;
        let balance = self.chain.balance(&address).await?;
        Ok(AccountBalance { address, balance })
    }

    pub fn status(&self) -> FaucetStatus {
        let sample = self.balance_watch.last_sample();
        let sampled = sample.checked_at > DateTime::<Utc>::UNIX_EPOCH;

        FaucetStatus {
            operator: self.operator.address(),
            amount_per_request: self.settings.amount_per_request.to_string(),
            token_symbol: self.settings.token_symbol.clone(),
            queue_depth: self.queue.depth(),
            pending: self.queue.snapshot(),
            requesters: self.cooldowns.len(),
            last_balance: sample.balance.to_string(),
            last_balance_checked_at: sampled.then_some(sample.checked_at),
        }
    }

    fn parse_destination(&self, destination: &str) -> FaucetResult<Address> {
        destination.parse().map_err(|e| {
            debug!("Rejected destination {:?}: {}", destination, e);
            self.metrics.record_outcome(OUTCOME_INVALID_ADDRESS);
            FaucetError::InvalidAddress(format!("{}", e))
        })
    }

    async fn chain_id(&self) -> FaucetResult<u64> {
        self.chain_id
            .get_or_try_init(|| self.chain.chain_id())
            .await
            .copied()
    }

    /// Chain's pending count, never below the last nonce this process used.
    async fn next_nonce(&self) -> FaucetResult<u64> {
        let pending = self.chain.pending_nonce(&self.operator.address()).await?;
        let local = (*self.last_nonce.lock()).map(|nonce| nonce + 1);
        Ok(local.map_or(pending, |local| local.max(pending)))
    }

    /// `sent_hash` is filled as soon as the node accepts the transaction.
    async fn submit_transfer(&self, to: Address, sent_hash: &mut Option<String>) -> FaucetResult<String> {
        let chain_id = self.chain_id().await?;
        let nonce = self.next_nonce().await?;

        let request = TransferRequest {
            nonce,
            gas_price: self.settings.gas_price,
            gas_limit: self.settings.gas_limit,
            to,
            value: self.settings.amount_per_request,
            chain_id,
        };
        let signed = self.operator.sign_transfer(&request)?;

        let tx_hash = self
            .chain
            .send_raw_transaction(&signed.raw)
            .await
            .map_err(|e| FaucetError::SubmissionFailed(e.to_string()))?;
        *self.last_nonce.lock() = Some(nonce);
        *sent_hash = Some(tx_hash.clone());
        info!(nonce, tx_hash = %tx_hash, "Transaction sent");

        let local_hash = signed.hash_hex();
        if !tx_hash.eq_ignore_ascii_case(&local_hash) {
            warn!(nonce, "Node returned hash {} for transaction {}", tx_hash, local_hash);
        }

        self.wait_for_receipt(&tx_hash).await?;
        Ok(tx_hash)
    }

    async fn wait_for_receipt(&self, tx_hash: &str) -> FaucetResult<()> {
        loop {
            match self.chain.receipt_status(tx_hash).await {
                Ok(Some(true)) => return Ok(()),
                Ok(Some(false)) => {
                    return Err(FaucetError::SubmissionFailed(format!(
                        "transaction {} reverted",
                        tx_hash
                    )))
                }
                Ok(None) => {}
                Err(e) => warn!("Receipt lookup for {} failed: {}", tx_hash, e),
            }
            tokio::time::sleep(self.settings.receipt_poll_interval).await;
        }
    }

    /// Sample the operator balance at most once per window and raise an
    /// alert when it is under the threshold. Never fails the grant.
    async fn check_operator_balance(&self) {
        let Some(claim) = self.balance_watch.try_claim(self.clock.now()) else {
            return;
        };

        let operator = self.operator.address();
        let balance = match self.chain.balance(&operator).await {
            Ok(balance) => balance,
            Err(e) => {
                // Dropping the claim leaves the window open for the next grant.
                warn!("Operator balance check failed: {}", e);
                return;
            }
        };

        let balance_tokens = base_to_tokens(balance);
        self.metrics.operator_balance_tokens.set(balance_tokens as f64);
        debug!("Operator balance: {} {}", balance_tokens, self.settings.token_symbol);

        if let Some(low) = claim.record(balance) {
            warn!(
                "Operator balance low: {} {}, about {} grants left",
                balance_tokens, self.settings.token_symbol, low.remaining_grants
            );
            self.metrics.alerts_total.inc();
            spawn_alert(
                self.alerts.clone(),
                LowBalanceAlert {
                    account: operator,
                    balance_tokens,
                    remaining_grants: low.remaining_grants,
                    token_symbol: self.settings.token_symbol.clone(),
                },
            );
        }
    }
}
