//! Shared fixtures for the faucet integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use mission_control_common::logging::init_test_logging;
use mission_control_common::units::ONE_TOKEN;
use mission_control_common::Address;
use mission_control_faucet::balance_watch::BALANCE_CHECK_INTERVAL_SECS;
use mission_control_faucet::{
    AlertSink, ChainClient, DispatcherSettings, FaucetDispatcher, FaucetError, FaucetResult,
    LowBalanceAlert, ManualClock, OperatorKey,
};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

/// Operator key used throughout the tests
pub const OPERATOR_KEY: &str = "0x4646464646464646464646464646464646464646464646464646464646464646";

pub const CHAIN_ID: u64 = 1281;

pub fn address(n: u8) -> Address {
    let mut bytes = [0u8; 20];
    bytes[19] = n;
    bytes[0] = 0xaa;
    Address(bytes)
}

pub fn address_str(n: u8) -> String {
    address(n).to_string()
}

pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentTransaction {
    pub nonce: u64,
    pub to: Address,
    pub hash: String,
}

/// In-memory chain. Transactions are included on the first receipt poll
/// unless receipts are held back.
pub struct MockChain {
    grant_amount: u128,
    balances: Mutex<HashMap<Address, u128>>,
    /// Value reported by `pending_nonce`
    reported_nonce: AtomicU64,
    /// Keep reporting the same pending nonce, like a lagging node
    lagging: AtomicBool,
    sent: Mutex<Vec<SentTransaction>>,
    pending: Mutex<HashMap<String, Address>>,
    reverted: Mutex<HashSet<String>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    fail_next_send: AtomicBool,
    revert_next: AtomicBool,
    hold_receipts: AtomicBool,
    fail_balance_reads: AtomicBool,
    send_delay: Duration,
}

impl MockChain {
    pub fn new(grant_amount: u128) -> Self {
        Self {
            grant_amount,
            balances: Mutex::new(HashMap::new()),
            reported_nonce: AtomicU64::new(0),
            lagging: AtomicBool::new(false),
            sent: Mutex::new(Vec::new()),
            pending: Mutex::new(HashMap::new()),
            reverted: Mutex::new(HashSet::new()),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            fail_next_send: AtomicBool::new(false),
            revert_next: AtomicBool::new(false),
            hold_receipts: AtomicBool::new(false),
            fail_balance_reads: AtomicBool::new(false),
            send_delay: Duration::from_millis(5),
        }
    }

    pub fn set_balance(&self, address: Address, balance: u128) {
        self.balances.lock().insert(address, balance);
    }

    pub fn set_reported_nonce(&self, nonce: u64) {
        self.reported_nonce.store(nonce, Ordering::SeqCst);
    }

    pub fn set_lagging(&self, lagging: bool) {
        self.lagging.store(lagging, Ordering::SeqCst);
    }

    pub fn fail_next_send(&self) {
        self.fail_next_send.store(true, Ordering::SeqCst);
    }

    pub fn revert_next(&self) {
        self.revert_next.store(true, Ordering::SeqCst);
    }

    pub fn hold_receipts(&self, hold: bool) {
        self.hold_receipts.store(hold, Ordering::SeqCst);
    }

    pub fn fail_balance_reads(&self, fail: bool) {
        self.fail_balance_reads.store(fail, Ordering::SeqCst);
    }

    pub fn sent(&self) -> Vec<SentTransaction> {
        self.sent.lock().clone()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ChainClient for MockChain {
    async fn balance(&self, address: &Address) -> FaucetResult<u128> {
        if self.fail_balance_reads.load(Ordering::SeqCst) {
            return Err(FaucetError::Rpc("connection refused".to_string()));
        }
        Ok(self.balances.lock().get(address).copied().unwrap_or(0))
    }

    async fn pending_nonce(&self, _address: &Address) -> FaucetResult<u64> {
        Ok(self.reported_nonce.load(Ordering::SeqCst))
    }

    async fn chain_id(&self) -> FaucetResult<u64> {
        Ok(CHAIN_ID)
    }

    async fn send_raw_transaction(&self, raw: &[u8]) -> FaucetResult<String> {
        let in_flight = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(in_flight, Ordering::SeqCst);

        tokio::time::sleep(self.send_delay).await;

        if self.fail_next_send.swap(false, Ordering::SeqCst) {
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            return Err(FaucetError::Rpc("nonce too low".to_string()));
        }

        let tx = rlp::Rlp::new(raw);
        let nonce: u64 = tx.val_at(0).map_err(|e| FaucetError::Rpc(e.to_string()))?;
        let to: Vec<u8> = tx.val_at(3).map_err(|e| FaucetError::Rpc(e.to_string()))?;
        let to = Address::from_slice(&to);
        let hash = format!("0x{}", hex::encode(keccak_hash::keccak(raw).0));

        self.sent.lock().push(SentTransaction {
            nonce,
            to,
            hash: hash.clone(),
        });
        self.pending.lock().insert(hash.clone(), to);
        if self.revert_next.swap(false, Ordering::SeqCst) {
            self.reverted.lock().insert(hash.clone());
        }
        if !self.lagging.load(Ordering::SeqCst) {
            self.reported_nonce.store(nonce + 1, Ordering::SeqCst);
        }

        Ok(hash)
    }

    async fn receipt_status(&self, tx_hash: &str) -> FaucetResult<Option<bool>> {
        if self.hold_receipts.load(Ordering::SeqCst) {
            return Ok(None);
        }

        let Some(to) = self.pending.lock().remove(tx_hash) else {
            return Ok(None);
        };
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.reverted.lock().contains(tx_hash) {
            return Ok(Some(false));
        }

        *self.balances.lock().entry(to).or_insert(0) += self.grant_amount;
        Ok(Some(true))
    }
}

/// Alert sink forwarding every alert to a channel.
pub struct ChannelSink(pub mpsc::UnboundedSender<LowBalanceAlert>);

#[async_trait]
impl AlertSink for ChannelSink {
    async fn low_balance(&self, alert: &LowBalanceAlert) -> FaucetResult<()> {
        self.0
            .send(alert.clone())
            .map_err(|e| FaucetError::NotificationFailed(e.to_string()))
    }
}

pub fn settings() -> DispatcherSettings {
    DispatcherSettings {
        amount_per_request: 10 * ONE_TOKEN,
        gas_price: 1,
        gas_limit: 0x21000,
        send_interval: chrono::Duration::hours(1),
        not_limited_users: vec!["monitor".to_string()],
        alert_threshold: 100 * ONE_TOKEN,
        balance_check_interval: chrono::Duration::seconds(BALANCE_CHECK_INTERVAL_SECS),
        queue_poll_interval: Duration::from_millis(10),
        submission_timeout: Duration::from_secs(5),
        receipt_poll_interval: Duration::from_millis(1),
        token_symbol: "DEV".to_string(),
    }
}

pub struct Harness {
    pub dispatcher: Arc<FaucetDispatcher>,
    pub chain: Arc<MockChain>,
    pub clock: Arc<ManualClock>,
    pub alerts: mpsc::UnboundedReceiver<LowBalanceAlert>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_settings(settings())
    }

    pub fn with_settings(settings: DispatcherSettings) -> Self {
        init_test_logging();
        let operator = OperatorKey::from_hex(OPERATOR_KEY).unwrap();
        let chain = Arc::new(MockChain::new(settings.amount_per_request));
        chain.set_balance(operator.address(), 1_000 * ONE_TOKEN);

        let clock = Arc::new(ManualClock::new(t0()));
        let (tx, alerts) = mpsc::unbounded_channel();

        let dispatcher = FaucetDispatcher::new(settings, operator, chain.clone(), Arc::new(ChannelSink(tx)))
            .unwrap()
            .with_clock(clock.clone());

        Self {
            dispatcher: Arc::new(dispatcher),
            chain,
            clock,
            alerts,
        }
    }

    pub fn operator(&self) -> Address {
        self.dispatcher.operator()
    }

    /// Wait for the next background alert, if any arrives shortly.
    pub async fn next_alert(&mut self) -> Option<LowBalanceAlert> {
        tokio::time::timeout(Duration::from_millis(500), self.alerts.recv())
            .await
            .ok()
            .flatten()
    }
}
