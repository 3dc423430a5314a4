// src/utils/amount.rs
//! Exact decimal amount conversion
//!
//! Fees and minting units are configured as decimal strings ("1.5") and
//! converted to integer base units using the decimals of the chain or
//! currency. Floats are never involved.

use crate::utils::error::MinerError;

/// Converts a decimal string into base units with `decimals` fractional digits
///
/// Fails if the value is negative, malformed, has more fractional digits than
/// `decimals`, or overflows `u64`.
pub fn to_base_units(value: &str, decimals: u32) -> Result<u64, MinerError> {
    let value = value.trim();
    let invalid = || MinerError::InputError(format!("Invalid amount '{}'", value));

    let (whole, fraction) = match value.split_once('.') {
        Some((w, f)) => (w, f),
        None => (value, ""),
    };
    if whole.is_empty() && fraction.is_empty() {
        return Err(invalid());
    }
    if !whole.chars().all(|c| c.is_ascii_digit()) || !fraction.chars().all(|c| c.is_ascii_digit())
    {
        return Err(invalid());
    }

    let fraction = fraction.trim_end_matches('0');
    if fraction.len() > decimals as usize {
        return Err(MinerError::InputError(format!(
            "Amount '{}' has more than {} decimal places",
            value, decimals
        )));
    }

    let scale = 10u64.checked_pow(decimals).ok_or_else(invalid)?;
    let whole: u64 = if whole.is_empty() { 0 } else { whole.parse().map_err(|_| invalid())? };
    let fraction_units: u64 = if fraction.is_empty() {
        0
    } else {
        let padded = format!("{:0<width$}", fraction, width = decimals as usize);
        padded.parse().map_err(|_| invalid())?
    };

    whole
        .checked_mul(scale)
        .and_then(|w| w.checked_add(fraction_units))
        .ok_or_else(|| MinerError::InputError(format!("Amount '{}' is too large", value)))
}

/// Formats base units back into a decimal string
pub fn format_units(units: u64, decimals: u32) -> String {
    if decimals == 0 {
        return units.to_string();
    }
    let scale = 10u64.pow(decimals);
    let fraction = format!("{:0width$}", units % scale, width = decimals as usize);
    let fraction = fraction.trim_end_matches('0');
    if fraction.is_empty() {
        format!("{}", units / scale)
    } else {
        format!("{}.{}", units / scale, fraction)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scales_whole_and_fractional_amounts() {
        assert_eq!(to_base_units("1", 8).unwrap(), 100_000_000);
        assert_eq!(to_base_units("0.5", 8).unwrap(), 50_000_000);
        assert_eq!(to_base_units("12.340", 2).unwrap(), 1234);
        assert_eq!(to_base_units(".25", 2).unwrap(), 25);
        assert_eq!(to_base_units("7", 0).unwrap(), 7);
    }

    #[test]
    fn rejects_excess_precision_and_garbage() {
        assert!(to_base_units("0.001", 2).is_err());
        assert!(to_base_units("-1", 8).is_err());
        assert!(to_base_units("1e5", 8).is_err());
        assert!(to_base_units("", 8).is_err());
        assert!(to_base_units("99999999999999999999", 8).is_err());
    }

    #[test]
    fn formats_units() {
        assert_eq!(format_units(150_000_000, 8), "1.5");
        assert_eq!(format_units(100, 2), "1");
        assert_eq!(format_units(42, 0), "42");
    }
}
