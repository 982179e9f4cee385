//! Chat replies, independent of the chat platform.

use crate::dispatcher::{AccountBalance, Grant};
use crate::error::FaucetError;
use mission_control_common::units::base_to_tokens;

pub const EMBED_COLOR_CORRECT: u32 = 0x642f95;
pub const EMBED_COLOR_ERROR: u32 = 0xc0392b;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplyField {
    pub name: String,
    pub value: String,
    pub inline: bool,
}

/// Embed-style message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub title: String,
    pub color: u32,
    pub fields: Vec<ReplyField>,
    pub footer: Option<String>,
}

/// Presentation settings shared by all replies.
#[derive(Debug, Clone)]
pub struct ReplyStyle {
    pub token_symbol: String,
    pub send_interval_hours: u64,
}

impl ReplyStyle {
    fn limit_footer(&self) -> String {
        match self.send_interval_hours {
            1 => "Funds transactions are limited to once per hour".to_string(),
            hours => format!("Funds transactions are limited to once every {} hours", hours),
        }
    }

    fn tokens(&self, base: u128) -> String {
        format!("{} {}", base_to_tokens(base), self.token_symbol)
    }
}

impl Reply {
    fn new(title: impl Into<String>, color: u32) -> Self {
        Self {
            title: title.into(),
            color,
            fields: Vec::new(),
            footer: None,
        }
    }

    fn field(mut self, name: impl Into<String>, value: impl Into<String>, inline: bool) -> Self {
        self.fields.push(ReplyField {
            name: name.into(),
            value: value.into(),
            inline,
        });
        self
    }

    fn footer(mut self, footer: impl Into<String>) -> Self {
        self.footer = Some(footer.into());
        self
    }

    pub fn grant(grant: &Grant, style: &ReplyStyle) -> Self {
        let balance = grant
            .resulting_balance
            .map(|balance| style.tokens(balance))
            .unwrap_or_else(|| "unavailable".to_string());

        Reply::new("Transaction of funds", EMBED_COLOR_CORRECT)
            .field("To account", grant.recipient.to_string(), true)
            .field("Amount sent", style.tokens(grant.amount_sent), true)
            .field("Current account balance", balance, false)
            .footer(style.limit_footer())
    }

    pub fn balance(balance: &AccountBalance, style: &ReplyStyle) -> Self {
        Reply::new("Account Balance", EMBED_COLOR_CORRECT)
            .field("Account", balance.address.to_string(), true)
            .field("Balance", style.tokens(balance.balance), true)
    }

    /// User-facing rendering of an error. Internal details are left to the
    /// logs.
    pub fn error(error: &FaucetError, style: &ReplyStyle) -> Self {
        match error {
            FaucetError::InvalidAddress(_) => Reply::new("Invalid address", EMBED_COLOR_ERROR)
                .footer("Addresses must follow the H160 address format"),
            FaucetError::RateLimited { remaining } => {
                Reply::new("You already received tokens!", EMBED_COLOR_ERROR)
                    .field(
                        "Remaining time",
                        format!("You still need to wait {} to receive more tokens", remaining),
                        false,
                    )
                    .footer(style.limit_footer())
            }
            FaucetError::SubmissionFailed(_) => Reply::new("Transaction failed", EMBED_COLOR_ERROR)
                .field(
                    "Details",
                    "The transfer could not be completed. You can try again right away.",
                    false,
                ),
            FaucetError::Rpc(_) => Reply::new("Chain unavailable", EMBED_COLOR_ERROR)
                .field("Details", "The chain endpoint did not answer. Please try again later.", false),
            _ => Reply::new("Something went wrong", EMBED_COLOR_ERROR),
        }
    }
}
