//! Testnet faucet bot
//!
//! Dispenses native tokens from a single operator account on chat request:
//! - Per-requester cooldown with an allow-list for monitoring accounts
//! - FIFO submission queue, one transaction in flight at a time
//! - Throttled operator balance checks with low-balance alerts
//! - Discord front end and an HTTP status surface

pub mod alert;
pub mod api;
pub mod balance_watch;
pub mod clock;
pub mod commands;
pub mod config;
pub mod cooldown;
pub mod discord;
pub mod dispatcher;
pub mod error;
pub mod metrics;
pub mod queue;
pub mod reply;
pub mod rpc;
pub mod signer;

pub use alert::{AlertSink, LowBalanceAlert, SlackNotifier};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{ConfigError, FaucetConfig};
pub use dispatcher::{AccountBalance, DispatcherSettings, FaucetDispatcher, FaucetStatus, Grant};
pub use error::{FaucetError, FaucetResult};
pub use rpc::{ChainClient, JsonRpcClient};
pub use signer::{OperatorKey, SignedTransfer, TransferRequest};
