//! Fixed-point conversion between whole tokens and base units.

/// Decimals of the native token.
pub const TOKEN_DECIMALS: u32 = 18;

/// Base units in one whole token.
pub const ONE_TOKEN: u128 = 10u128.pow(TOKEN_DECIMALS);

/// Converts whole tokens to base units, `None` on overflow.
pub fn tokens_to_base(tokens: u128) -> Option<u128> {
    tokens.checked_mul(ONE_TOKEN)
}

/// Whole tokens contained in `base` units, rounded down.
pub fn base_to_tokens(base: u128) -> u128 {
    base / ONE_TOKEN
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_conversion() {
        assert_eq!(tokens_to_base(10), Some(10_000_000_000_000_000_000));
        assert_eq!(base_to_tokens(10_000_000_000_000_000_000), 10);
        assert_eq!(base_to_tokens(ONE_TOKEN - 1), 0);
        assert_eq!(base_to_tokens(ONE_TOKEN * 3 + 42), 3);
    }

    #[test]
    fn test_overflow_is_reported() {
        assert_eq!(tokens_to_base(u128::MAX), None);
    }
}
