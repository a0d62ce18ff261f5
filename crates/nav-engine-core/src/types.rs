use chrono::NaiveDate;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

/// All monetary values. Wraps Decimal to prevent accidental f64 usage.
pub type Money = Decimal;

/// Returns and growth rates expressed as percentages (20 = 20%).
pub type Percent = Decimal;

/// Fund units held.
pub type Units = Decimal;

/// Year fractions or counts
pub type Years = Decimal;

/// Decimal places for unit counts
pub const UNITS_DP: u32 = 4;

/// Decimal places for currency amounts and percentages
pub const CURRENCY_DP: u32 = 2;

/// Round half away from zero to `dp` decimal places.
pub fn round_to(value: Decimal, dp: u32) -> Decimal {
    value.round_dp_with_strategy(dp, RoundingStrategy::MidpointAwayFromZero)
}

pub fn round_units(value: Units) -> Units {
    round_to(value, UNITS_DP)
}

/// Interpolated NAVs are reported at unit precision.
pub fn round_nav(value: Decimal) -> Decimal {
    round_to(value, UNITS_DP)
}

pub fn round_money(value: Money) -> Money {
    round_to(value, CURRENCY_DP)
}

pub fn round_percent(value: Percent) -> Percent {
    round_to(value, CURRENCY_DP)
}

/// A single dated cash flow. Negative amounts are investments, positive
/// amounts are valuations or redemptions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CashFlow {
    pub date: NaiveDate,
    pub amount: Money,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

impl CashFlow {
    pub fn new(date: NaiveDate, amount: Money) -> Self {
        CashFlow {
            date,
            amount,
            label: None,
        }
    }

    pub fn labelled(date: NaiveDate, amount: Money, label: impl Into<String>) -> Self {
        CashFlow {
            date,
            amount,
            label: Some(label.into()),
        }
    }
}

/// Standard computation output envelope
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComputationOutput<T: Serialize> {
    pub result: T,
    pub methodology: String,
    pub assumptions: serde_json::Value,
    pub warnings: Vec<String>,
    pub metadata: ComputationMetadata,
}

/// Metadata for every computation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComputationMetadata {
    pub version: String,
    pub computation_time_us: u64,
    pub precision: String,
}

/// Helper to wrap computation results with metadata
pub fn with_metadata<T: Serialize>(
    methodology: &str,
    assumptions: &impl Serialize,
    warnings: Vec<String>,
    elapsed_us: u64,
    result: T,
) -> ComputationOutput<T> {
    ComputationOutput {
        result,
        methodology: methodology.to_string(),
        assumptions: serde_json::to_value(assumptions).unwrap_or_default(),
        warnings,
        metadata: ComputationMetadata {
            version: env!("CARGO_PKG_VERSION").to_string(),
            computation_time_us: elapsed_us,
            precision: "rust_decimal_128bit".to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_rounding_midpoint_away_from_zero() {
        assert_eq!(round_money(dec!(2.345)), dec!(2.35));
        assert_eq!(round_money(dec!(-2.345)), dec!(-2.35));
        assert_eq!(round_units(dec!(95.238095)), dec!(95.2381));
        assert_eq!(round_percent(dec!(19.994)), dec!(19.99));
    }

    #[test]
    fn test_envelope_carries_warnings() {
        let out = with_metadata(
            "test",
            &serde_json::json!({ "k": 1 }),
            vec!["careful".into()],
            7,
            dec!(1.5),
        );
        assert_eq!(out.warnings, vec!["careful".to_string()]);
        assert_eq!(out.metadata.computation_time_us, 7);
        assert_eq!(out.assumptions["k"], 1);
    }
}
