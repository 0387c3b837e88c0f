//! Money Conversion Module
//!
//! Unified conversion between internal minor-unit `u64` representation and the
//! client-facing string/Decimal representation. All conversions MUST go
//! through this module.
//!
//! ## Internal Representation
//! - Amounts and balances are integer minor units (cents)
//! - The scale factor is `10^CURRENCY_DECIMALS`
//! - Floats never appear on the money path
//!
//! ## Usage
//! ```rust
//! use bankly::money::{parse_amount, format_amount};
//!
//! // Client sends "12.50"
//! let internal = parse_amount("12.50", 2).unwrap();
//! assert_eq!(internal, 1250);
//!
//! assert_eq!(format_amount(1250, 2), "12.50");
//! ```

use rust_decimal::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core_types::{CURRENCY_DECIMALS, MinorUnits};

/// Money conversion errors
#[derive(Debug, Error, PartialEq, Eq)]
pub enum MoneyError {
    #[error("Precision overflow: provided {provided} decimals, max allowed {max}")]
    PrecisionOverflow { provided: u32, max: u32 },

    #[error("Amount must be positive")]
    InvalidAmount,

    #[error("Amount too large, would overflow")]
    Overflow,

    #[error("Invalid format: {0}")]
    InvalidFormat(String),
}

// ============================================================================
// Parse: Client → Internal
// ============================================================================

/// Convert a client string amount to minor units
///
/// # Errors
/// * `PrecisionOverflow` - more decimal places than allowed (no silent truncation)
/// * `InvalidAmount` - zero, negative or explicitly signed
/// * `Overflow` - result does not fit in `u64`
/// * `InvalidFormat` - anything that is not `digits[.digits]`
pub fn parse_amount(amount_str: &str, decimals: u32) -> Result<MinorUnits, MoneyError> {
    let amount_str = amount_str.trim();
    if amount_str.is_empty() {
        return Err(MoneyError::InvalidFormat("empty string".into()));
    }

    if amount_str.starts_with('-') || amount_str.starts_with('+') {
        return Err(MoneyError::InvalidAmount);
    }

    let (whole, frac) = match amount_str.split_once('.') {
        None => (amount_str, ""),
        Some((whole, frac)) => {
            // Require both sides of the dot: ".5" and "5." are ambiguous
            if whole.is_empty() {
                return Err(MoneyError::InvalidFormat(
                    "missing leading zero (e.g., use 0.5 instead of .5)".into(),
                ));
            }
            if frac.is_empty() {
                return Err(MoneyError::InvalidFormat(
                    "missing fractional part (e.g., use 5.0 instead of 5.)".into(),
                ));
            }
            if frac.contains('.') {
                return Err(MoneyError::InvalidFormat("multiple decimal points".into()));
            }
            (whole, frac)
        }
    };

    if !whole.bytes().all(|b| b.is_ascii_digit()) || !frac.bytes().all(|b| b.is_ascii_digit()) {
        return Err(MoneyError::InvalidFormat(format!(
            "invalid character in amount: {}",
            amount_str
        )));
    }

    if frac.len() > decimals as usize {
        return Err(MoneyError::PrecisionOverflow {
            provided: frac.len() as u32,
            max: decimals,
        });
    }

    let whole_num: u64 = whole.parse().map_err(|_| MoneyError::Overflow)?;

    let frac_num: u64 = if frac.is_empty() {
        0
    } else {
        let frac_padded = format!("{:0<width$}", frac, width = decimals as usize);
        frac_padded
            .parse()
            .map_err(|_| MoneyError::InvalidFormat("invalid fractional part".into()))?
    };

    let amount = whole_num
        .checked_mul(10u64.pow(decimals))
        .and_then(|v| v.checked_add(frac_num))
        .ok_or(MoneyError::Overflow)?;

    if amount == 0 {
        return Err(MoneyError::InvalidAmount);
    }

    Ok(amount)
}

// ============================================================================
// Format: Internal → Client
// ============================================================================

/// Render minor units as a fixed-precision decimal string
pub fn format_amount(value: MinorUnits, decimals: u32) -> String {
    let decimal_value = Decimal::from(value) / Decimal::from(10u64.pow(decimals));
    format!("{:.prec$}", decimal_value, prec = decimals as usize)
}

// ============================================================================
// ClientAmount: serde-level amount input
// ============================================================================

/// Amount as sent by a client: JSON string (`"12.50"`) or number (`12.5`).
///
/// Format validation happens during deserialization; conversion to minor
/// units (and the positive/precision checks) happens in [`ClientAmount::to_minor`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientAmount(String);

impl ClientAmount {
    /// Convert to ledger minor units
    pub fn to_minor(&self) -> Result<MinorUnits, MoneyError> {
        parse_amount(&self.0, CURRENCY_DECIMALS)
    }
}

impl<'de> Deserialize<'de> for ClientAmount {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        use serde::de::Error;

        #[derive(Deserialize)]
        #[serde(untagged)]
        enum DecimalOrString {
            String(String),
            Number(Decimal),
        }

        match DecimalOrString::deserialize(deserializer)? {
            DecimalOrString::String(s) => {
                if s.trim().is_empty() {
                    return Err(D::Error::custom("Amount cannot be empty"));
                }
                Ok(ClientAmount(s))
            }
            DecimalOrString::Number(d) => Ok(ClientAmount(d.normalize().to_string())),
        }
    }
}

impl Serialize for ClientAmount {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_amount_variations() {
        assert_eq!(parse_amount("1.23", 2).unwrap(), 123);
        assert_eq!(parse_amount("300", 2).unwrap(), 30_000);
        assert_eq!(parse_amount("001.5", 2).unwrap(), 150);
        assert_eq!(parse_amount(" 0.01 ", 2).unwrap(), 1);
    }

    #[test]
    fn test_parse_amount_rejects_zero_and_signs() {
        assert_eq!(parse_amount("0", 2), Err(MoneyError::InvalidAmount));
        assert_eq!(parse_amount("0.00", 2), Err(MoneyError::InvalidAmount));
        assert_eq!(parse_amount("-5", 2), Err(MoneyError::InvalidAmount));
        assert_eq!(parse_amount("+5", 2), Err(MoneyError::InvalidAmount));
    }

    #[test]
    fn test_parse_amount_invalid_formats() {
        for case in ["1,000.00", "1.2.3", "1. 23", "1e2", "0x12", ".", ".5", "5.", "abc"] {
            assert!(parse_amount(case, 2).is_err(), "should reject {:?}", case);
        }
    }

    #[test]
    fn test_parse_amount_precision_overflow() {
        assert_eq!(
            parse_amount("1.234", 2),
            Err(MoneyError::PrecisionOverflow {
                provided: 3,
                max: 2
            })
        );
    }

    #[test]
    fn test_parse_amount_overflow() {
        assert_eq!(
            parse_amount("184467440737095516150", 2),
            Err(MoneyError::Overflow)
        );
    }

    #[test]
    fn test_format_amount() {
        assert_eq!(format_amount(70_000, 2), "700.00");
        assert_eq!(format_amount(1, 2), "0.01");
    }

    #[test]
    fn test_client_amount_from_json() {
        let from_str: ClientAmount = serde_json::from_str("\"300.00\"").unwrap();
        assert_eq!(from_str.to_minor().unwrap(), 30_000);

        let from_num: ClientAmount = serde_json::from_str("12.5").unwrap();
        assert_eq!(from_num.to_minor().unwrap(), 1250);

        assert!(serde_json::from_str::<ClientAmount>("\"\"").is_err());
    }
}
