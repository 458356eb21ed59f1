// crates/keel-core/src/amount.rs
//
// Fixed-point amounts for every ledger in the protocol.
//
// All balances, prices and supplies are unsigned integers with 18 implied
// decimal places: 1.0 == 10^18. Percentages are basis points out of 10_000.
// Products of two amounts are computed through a 256-bit intermediate so that
// `supply * price / ONE` style expressions cannot overflow before dividing.

pub use primitive_types::U256;

use crate::error::KeelError;

/// Fixed-point amount with `DECIMALS` implied decimal places.
pub type Amount = u128;

/// Number of implied decimal places.
pub const DECIMALS: u32 = 18;

/// 1.0 in fixed-point representation (10^18).
pub const ONE: Amount = 1_000_000_000_000_000_000;

/// Denominator for basis-point percentages (100% == 10_000).
pub const BPS_DENOMINATOR: u128 = 10_000;

/// Whole-token amount: `tokens(3) == 3 * ONE`.
pub const fn tokens(whole: u128) -> Amount {
    whole * ONE
}

/// Compute `a * b / denominator`, rounding down.
///
/// # Errors
/// `InvalidState` on a zero denominator, `Overflow` if the quotient does not
/// fit in an `Amount`.
pub fn mul_div(a: Amount, b: Amount, denominator: Amount) -> Result<Amount, KeelError> {
    if denominator == 0 {
        return Err(KeelError::InvalidState(
            "mul_div by zero denominator".to_string(),
        ));
    }
    let q = U256::from(a) * U256::from(b) / U256::from(denominator);
    to_amount(q)
}

/// Compute `a * b / denominator`, rounding up.
pub fn mul_div_up(a: Amount, b: Amount, denominator: Amount) -> Result<Amount, KeelError> {
    if denominator == 0 {
        return Err(KeelError::InvalidState(
            "mul_div_up by zero denominator".to_string(),
        ));
    }
    let product = U256::from(a) * U256::from(b);
    let d = U256::from(denominator);
    let mut q = product / d;
    if !(product % d).is_zero() {
        q += U256::one();
    }
    to_amount(q)
}

/// `amount * bps / 10_000`, rounding down.
pub fn bps_of(amount: Amount, bps: u32) -> Result<Amount, KeelError> {
    mul_div(amount, bps as u128, BPS_DENOMINATOR)
}

/// Narrow a 256-bit intermediate back to an `Amount`.
pub fn to_amount(value: U256) -> Result<Amount, KeelError> {
    if value > U256::from(u128::MAX) {
        return Err(KeelError::Overflow(format!(
            "{} does not fit in a 128-bit amount",
            value
        )));
    }
    Ok(value.low_u128())
}

/// Render an amount as a decimal string, trimming trailing zeros.
///
/// `format_amount(1_500_000_000_000_000_000) == "1.5"`
pub fn format_amount(amount: Amount) -> String {
    let whole = amount / ONE;
    let frac = amount % ONE;
    if frac == 0 {
        return whole.to_string();
    }
    let frac_str = format!("{:018}", frac);
    format!("{}.{}", whole, frac_str.trim_end_matches('0'))
}

/// Parse a decimal string such as `"1.01"` or `"250"` into an amount.
///
/// # Errors
/// `InvalidState` if the string is empty, contains anything other than ASCII
/// digits and one `.`, or carries more than 18 fractional digits.
pub fn parse_amount(text: &str) -> Result<Amount, KeelError> {
    let text = text.trim();
    let (whole, frac) = match text.split_once('.') {
        Some((w, f)) => (w, f),
        None => (text, ""),
    };
    let is_digits = |s: &str| s.bytes().all(|b| b.is_ascii_digit());
    if (whole.is_empty() && frac.is_empty()) || !is_digits(whole) || !is_digits(frac) {
        return Err(KeelError::InvalidState(format!(
            "'{}' is not a decimal amount",
            text
        )));
    }
    if frac.len() > DECIMALS as usize {
        return Err(KeelError::InvalidState(format!(
            "'{}' has more than {} decimal places",
            text, DECIMALS
        )));
    }

    let whole_units: u128 = if whole.is_empty() {
        0
    } else {
        whole
            .parse()
            .map_err(|_| KeelError::Overflow(format!("'{}' is too large", text)))?
    };
    let frac_units: u128 = if frac.is_empty() {
        0
    } else {
        let padded = format!("{:0<18}", frac);
        padded
            .parse()
            .map_err(|_| KeelError::InvalidState(format!("'{}' is not a decimal amount", text)))?
    };

    whole_units
        .checked_mul(ONE)
        .and_then(|w| w.checked_add(frac_units))
        .ok_or_else(|| KeelError::Overflow(format!("'{}' is too large", text)))
}

/// Serde adapter that reads and writes amounts as decimal strings.
///
/// Use with `#[serde(with = "keel_core::amount::decimal")]`.
pub mod decimal {
    use serde::{Deserialize, Deserializer, Serializer};

    use super::{format_amount, parse_amount, Amount};

    pub fn serialize<S: Serializer>(amount: &Amount, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format_amount(*amount))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Amount, D::Error> {
        let text = String::deserialize(deserializer)?;
        parse_amount(&text).map_err(serde::de::Error::custom)
    }
}
