//! Shared types and utilities for the mission control faucet bot.

pub mod logging;
pub mod types;
pub mod units;

pub use types::{Address, AddressError, ADDRESS_LENGTH};
