//! Throttled sampling of the operator balance.

use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use serde::Serialize;

/// Minimum time between two operator balance samples.
pub const BALANCE_CHECK_INTERVAL_SECS: i64 = 600;

/// Last operator balance sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BalanceSample {
    pub checked_at: DateTime<Utc>,
    pub balance: u128,
}

/// Operator balance fell under the alert threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LowBalance {
    pub balance: u128,
    /// Grants that can still be served before the account runs dry.
    pub remaining_grants: u128,
}

#[derive(Debug)]
struct WatchState {
    /// Start of the window currently claimed, sampled or not
    claimed_at: DateTime<Utc>,
    sample: BalanceSample,
}

#[derive(Debug)]
pub struct BalanceWatch {
    window: Duration,
    threshold: u128,
    amount_per_request: u128,
    state: Mutex<WatchState>,
}

impl BalanceWatch {
    pub fn new(window: Duration, threshold: u128, amount_per_request: u128) -> Self {
        Self {
            window,
            threshold,
            amount_per_request,
            state: Mutex::new(WatchState {
                claimed_at: DateTime::<Utc>::UNIX_EPOCH,
                sample: BalanceSample {
                    checked_at: DateTime::<Utc>::UNIX_EPOCH,
                    balance: 0,
                },
            }),
        }
    }

    /// Claim the current window for a sample. Returns `None` if the window
    /// was already claimed. Concurrent callers cannot both win; a claim that
    /// is dropped without [`BalanceClaim::record`] frees the window again.
    pub fn try_claim(&self, now: DateTime<Utc>) -> Option<BalanceClaim<'_>> {
        let mut state = self.state.lock();
        if state.claimed_at >= now - self.window {
            return None;
        }
        let previous = state.claimed_at;
        state.claimed_at = now;
        Some(BalanceClaim {
            watch: self,
            claimed_at: now,
            previous: Some(previous),
        })
    }

    pub fn last_sample(&self) -> BalanceSample {
        self.state.lock().sample
    }

    fn low_balance(&self, balance: u128) -> Option<LowBalance> {
        if balance >= self.threshold {
            return None;
        }
        Some(LowBalance {
            balance,
            remaining_grants: balance.checked_div(self.amount_per_request).unwrap_or(0),
        })
    }

    fn release(&self, claimed_at: DateTime<Utc>, previous: DateTime<Utc>) {
        let mut state = self.state.lock();
        if state.claimed_at == claimed_at {
            state.claimed_at = previous;
        }
    }
}

/// An unsampled claim on the current window.
#[must_use]
#[derive(Debug)]
pub struct BalanceClaim<'a> {
    watch: &'a BalanceWatch,
    claimed_at: DateTime<Utc>,
    /// Cleared once a sample is recorded
    previous: Option<DateTime<Utc>>,
}

impl BalanceClaim<'_> {
    /// Store the sampled balance, reporting it when under the threshold.
    pub fn record(mut self, balance: u128) -> Option<LowBalance> {
        self.previous = None;
        self.watch.state.lock().sample = BalanceSample {
            checked_at: self.claimed_at,
            balance,
        };
        self.watch.low_balance(balance)
    }
}

impl Drop for BalanceClaim<'_> {
    fn drop(&mut self) {
        if let Some(previous) = self.previous.take() {
            self.watch.release(self.claimed_at, previous);
        }
    }
}
