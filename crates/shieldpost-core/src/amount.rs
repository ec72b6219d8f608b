//! Token amounts in the smallest unit (nRLC, 9 decimals).

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Number of decimals between RLC and nRLC
pub const DECIMALS: u32 = 9;

const NANO_PER_TOKEN: u64 = 10u64.pow(DECIMALS);

/// Amount expressed in nRLC.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TokenAmount(u64);

impl TokenAmount {
    pub const ZERO: TokenAmount = TokenAmount(0);

    pub const fn new(nano: u64) -> Self {
        Self(nano)
    }

    pub const fn as_nano(&self) -> u64 {
        self.0
    }

    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Parse user input.
    ///
    /// A bare number is read as nRLC; `RLC` and `nRLC` suffixes are accepted
    /// (case-insensitive) and only RLC amounts may carry decimals.
    pub fn parse(input: &str) -> Result<Self, CoreError> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(CoreError::validation("amount must not be empty"));
        }

        let (number, unit) = match trimmed.find(|c: char| c.is_ascii_alphabetic()) {
            Some(idx) => (trimmed[..idx].trim(), trimmed[idx..].trim()),
            None => (trimmed, ""),
        };

        match unit.to_ascii_lowercase().as_str() {
            "" | "nrlc" => number
                .parse::<u64>()
                .map(Self)
                .map_err(|_| CoreError::validation(format!("invalid nRLC amount \"{input}\""))),
            "rlc" => parse_decimal(number)
                .map(Self)
                .ok_or_else(|| CoreError::validation(format!("invalid RLC amount \"{input}\""))),
            other => Err(CoreError::validation(format!(
                "unknown unit \"{other}\" (expected RLC or nRLC)"
            ))),
        }
    }

    /// Human-readable form in whole tokens, e.g. `1.5 RLC`.
    pub fn to_token_string(&self) -> String {
        let whole = self.0 / NANO_PER_TOKEN;
        let frac = self.0 % NANO_PER_TOKEN;
        if frac == 0 {
            return format!("{whole} RLC");
        }
        let frac = format!("{frac:09}");
        format!("{whole}.{} RLC", frac.trim_end_matches('0'))
    }
}

fn parse_decimal(number: &str) -> Option<u64> {
    let (whole, frac) = match number.split_once('.') {
        Some((w, f)) => (w, f),
        None => (number, ""),
    };
    if whole.is_empty() && frac.is_empty() {
        return None;
    }
    if frac.len() > DECIMALS as usize || !frac.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    let whole: u64 = if whole.is_empty() { 0 } else { whole.parse().ok()? };
    let frac_nano: u64 = if frac.is_empty() {
        0
    } else {
        format!("{frac:0<9}").parse().ok()?
    };
    whole.checked_mul(NANO_PER_TOKEN)?.checked_add(frac_nano)
}

impl fmt::Display for TokenAmount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} nRLC", self.0)
    }
}

impl FromStr for TokenAmount {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl From<u64> for TokenAmount {
    fn from(value: u64) -> Self {
        Self(value)
    }
}
