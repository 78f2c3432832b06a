use std::fmt::Display;

use thiserror::Error;

use super::{ETH_DECIMALS, WEI_PER_ETH};

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct WeiNewtype(pub i128);

#[derive(Debug, Error, PartialEq)]
pub enum ParseEthAmountError {
    #[error("empty amount")]
    Empty,
    #[error("invalid amount {0}")]
    Invalid(String),
    #[error("amount {0} has more than 18 decimals")]
    TooPrecise(String),
    #[error("amount {0} is too large")]
    Overflow(String),
}

impl WeiNewtype {
    pub fn from_eth(eth: i128) -> Self {
        Self(eth * WEI_PER_ETH)
    }

    /// Parses a decimal ETH amount like `0.001` or `-1.5` without going through floats.
    pub fn from_eth_str(input: &str) -> Result<Self, ParseEthAmountError> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(ParseEthAmountError::Empty);
        }

        let (is_negative, unsigned) = match trimmed.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, trimmed.strip_prefix('+').unwrap_or(trimmed)),
        };

        let (whole, fraction) = unsigned.split_once('.').unwrap_or((unsigned, ""));
        let is_digits = |s: &str| s.chars().all(|c| c.is_ascii_digit());
        if (whole.is_empty() && fraction.is_empty()) || !is_digits(whole) || !is_digits(fraction)
        {
            return Err(ParseEthAmountError::Invalid(input.to_string()));
        }

        if fraction.len() > ETH_DECIMALS {
            return Err(ParseEthAmountError::TooPrecise(input.to_string()));
        }

        let overflow = || ParseEthAmountError::Overflow(input.to_string());

        let whole_wei = if whole.is_empty() {
            0
        } else {
            whole
                .parse::<i128>()
                .map_err(|_| overflow())?
                .checked_mul(WEI_PER_ETH)
                .ok_or_else(overflow)?
        };

        let fraction_wei = if fraction.is_empty() {
            0
        } else {
            let padded = format!("{fraction:0<width$}", width = ETH_DECIMALS);
            padded.parse::<i128>().map_err(|_| overflow())?
        };

        let amount = whole_wei.checked_add(fraction_wei).ok_or_else(overflow)?;

        Ok(if is_negative {
            WeiNewtype(-amount)
        } else {
            WeiNewtype(amount)
        })
    }

    pub fn is_positive(&self) -> bool {
        self.0 > 0
    }

    /// Hex quantity as expected by JSON-RPC, `None` for negative amounts.
    pub fn to_hex_quantity(&self) -> Option<String> {
        u128::try_from(self.0)
            .ok()
            .map(|amount| format!("0x{amount:x}"))
    }

    /// Decimal ETH representation, trailing zeros trimmed.
    pub fn to_eth_string(&self) -> String {
        let WeiNewtype(amount) = self;
        let sign = if *amount < 0 { "-" } else { "" };
        let abs = amount.unsigned_abs();
        let whole = abs / WEI_PER_ETH as u128;
        let fraction = abs % WEI_PER_ETH as u128;

        if fraction == 0 {
            format!("{sign}{whole}")
        } else {
            let fraction = format!("{fraction:0>width$}", width = ETH_DECIMALS);
            format!("{sign}{whole}.{}", fraction.trim_end_matches('0'))
        }
    }
}

impl Display for WeiNewtype {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let WeiNewtype(amount) = self;
        write!(f, "{amount}")
    }
}
