//! Chat command parsing.

pub const FAUCET_SEND_PREFIX: &str = "!faucet send";
pub const BALANCE_PREFIX: &str = "!balance";

/// A recognised chat command. The argument is the trimmed remainder of the
/// message; address validation happens in the dispatcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command<'a> {
    /// `!faucet send <address>`
    FaucetSend { address: &'a str },
    /// `!balance <address>`
    Balance { address: &'a str },
}

/// Prefix-match a message. Anything else is not for the bot.
pub fn parse(content: &str) -> Option<Command<'_>> {
    if let Some(rest) = content.strip_prefix(FAUCET_SEND_PREFIX) {
        return Some(Command::FaucetSend {
            address: rest.trim(),
        });
    }
    if let Some(rest) = content.strip_prefix(BALANCE_PREFIX) {
        return Some(Command::Balance {
            address: rest.trim(),
        });
    }
    None
}
