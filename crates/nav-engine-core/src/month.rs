use chrono::{Datelike, NaiveDate};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use crate::clock::Clock;
use crate::error::NavEngineError;
use crate::NavEngineResult;

/// A calendar month, the time axis of every NAV calculation.
///
/// Serialises as the zero-padded `"YYYY-MM"` token. Field order makes the
/// derived ordering chronological, which matches lexicographic order of the
/// fixed-width string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct MonthKey {
    year: i32,
    month: u32,
}

impl MonthKey {
    pub const MIN_YEAR: i32 = 1900;
    pub const MAX_YEAR: i32 = 2100;

    pub fn new(year: i32, month: u32) -> NavEngineResult<Self> {
        if !(Self::MIN_YEAR..=Self::MAX_YEAR).contains(&year) {
            return Err(NavEngineError::validation(
                "year",
                format!(
                    "Year {year} outside supported range {}-{}",
                    Self::MIN_YEAR,
                    Self::MAX_YEAR
                ),
            ));
        }
        if !(1..=12).contains(&month) {
            return Err(NavEngineError::validation(
                "month",
                format!("Month {month} outside range 1-12"),
            ));
        }
        Ok(MonthKey { year, month })
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn month(&self) -> u32 {
        self.month
    }

    /// Months elapsed since January of year 0.
    fn ordinal(&self) -> i64 {
        i64::from(self.year) * 12 + i64::from(self.month) - 1
    }

    fn from_ordinal(ordinal: i64) -> NavEngineResult<Self> {
        let year = ordinal.div_euclid(12);
        let month = ordinal.rem_euclid(12) + 1;
        let year = i32::try_from(year).map_err(|_| {
            NavEngineError::validation("months", format!("Month offset {ordinal} overflows"))
        })?;
        MonthKey::new(year, month as u32)
    }
}

impl fmt::Display for MonthKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl FromStr for MonthKey {
    type Err = NavEngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (year, month) = parse_key(s)?;
        MonthKey::new(year, month)
    }
}

impl TryFrom<String> for MonthKey {
    type Error = NavEngineError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<MonthKey> for String {
    fn from(key: MonthKey) -> Self {
        key.to_string()
    }
}

/// Month containing `date`.
pub fn date_to_key(date: NaiveDate) -> NavEngineResult<MonthKey> {
    MonthKey::new(date.year(), date.month())
}

/// First day of the month.
pub fn key_to_date(key: &MonthKey) -> NavEngineResult<NaiveDate> {
    NaiveDate::from_ymd_opt(key.year, key.month, 1).ok_or_else(|| {
        NavEngineError::validation("month_key", format!("{key} has no calendar date"))
    })
}

pub fn month_year_to_key(year: i32, month: u32) -> NavEngineResult<MonthKey> {
    MonthKey::new(year, month)
}

/// Split a `"YYYY-MM"` token into year and month, enforcing the fixed width
/// and the supported ranges.
pub fn parse_key(s: &str) -> NavEngineResult<(i32, u32)> {
    let malformed = || {
        NavEngineError::validation(
            "month_key",
            format!("'{s}' is not a valid YYYY-MM month key"),
        )
    };

    let bytes = s.as_bytes();
    if bytes.len() != 7 || bytes[4] != b'-' {
        return Err(malformed());
    }
    let (year_part, month_part) = (&s[..4], &s[5..]);
    if !year_part.bytes().all(|b| b.is_ascii_digit())
        || !month_part.bytes().all(|b| b.is_ascii_digit())
    {
        return Err(malformed());
    }

    let year: i32 = year_part.parse().map_err(|_| malformed())?;
    let month: u32 = month_part.parse().map_err(|_| malformed())?;
    let key = MonthKey::new(year, month)?;
    Ok((key.year, key.month))
}

/// Signed month distance from `a` to `b`.
pub fn months_between(a: &MonthKey, b: &MonthKey) -> i64 {
    b.ordinal() - a.ordinal()
}

/// Inclusive ascending list of months from `start` to `end`.
pub fn generate_month_range(start: &MonthKey, end: &MonthKey) -> NavEngineResult<Vec<MonthKey>> {
    if end < start {
        return Err(NavEngineError::validation(
            "range",
            format!("End month {end} is before start month {start}"),
        ));
    }
    (start.ordinal()..=end.ordinal())
        .map(MonthKey::from_ordinal)
        .collect()
}

pub fn add_months(key: &MonthKey, n: i64) -> NavEngineResult<MonthKey> {
    MonthKey::from_ordinal(key.ordinal() + n)
}

/// The `n` months ending at (and including) `end`, ascending.
pub fn get_last_n_months(end: &MonthKey, n: usize) -> NavEngineResult<Vec<MonthKey>> {
    if n < 1 {
        return Err(NavEngineError::validation(
            "n",
            "Number of months must be at least 1",
        ));
    }
    let start = add_months(end, -(n as i64 - 1))?;
    generate_month_range(&start, end)
}

/// Fractional years between two months, for annualisation.
pub fn years_between(a: &MonthKey, b: &MonthKey) -> Decimal {
    Decimal::from(months_between(a, b)) / Decimal::from(12)
}

pub fn compare_keys(a: &MonthKey, b: &MonthKey) -> i32 {
    match a.cmp(b) {
        Ordering::Less => -1,
        Ordering::Equal => 0,
        Ordering::Greater => 1,
    }
}

pub fn get_current_month_key(clock: &dyn Clock) -> NavEngineResult<MonthKey> {
    date_to_key(clock.today())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use rust_decimal_macros::dec;

    fn key(s: &str) -> MonthKey {
        s.parse().unwrap()
    }

    #[test]
    fn test_parse_and_display() {
        let k = key("2024-03");
        assert_eq!(k.year(), 2024);
        assert_eq!(k.month(), 3);
        assert_eq!(k.to_string(), "2024-03");
    }

    #[test]
    fn test_malformed_keys_rejected() {
        for bad in ["2024-3", "2024/03", "24-03", "2024-13", "2024-00", "1899-12", "2101-01", "abcd-ef", "2024-03-01"] {
            assert!(bad.parse::<MonthKey>().is_err(), "{bad} should be rejected");
        }
    }

    #[test]
    fn test_date_round_trip() {
        let date = NaiveDate::from_ymd_opt(2023, 11, 27).unwrap();
        let k = date_to_key(date).unwrap();
        assert_eq!(k, key("2023-11"));
        assert_eq!(key_to_date(&k).unwrap(), NaiveDate::from_ymd_opt(2023, 11, 1).unwrap());
    }

    #[test]
    fn test_date_out_of_range() {
        let date = NaiveDate::from_ymd_opt(1850, 1, 1).unwrap();
        assert!(date_to_key(date).is_err());
    }

    #[test]
    fn test_months_between_signed() {
        assert_eq!(months_between(&key("2023-11"), &key("2024-02")), 3);
        assert_eq!(months_between(&key("2024-02"), &key("2023-11")), -3);
        assert_eq!(months_between(&key("2024-02"), &key("2024-02")), 0);
    }

    #[test]
    fn test_month_range_across_year() {
        let range = generate_month_range(&key("2023-11"), &key("2024-02")).unwrap();
        let labels: Vec<String> = range.iter().map(|k| k.to_string()).collect();
        assert_eq!(labels, vec!["2023-11", "2023-12", "2024-01", "2024-02"]);
    }

    #[test]
    fn test_month_range_inverted() {
        assert!(generate_month_range(&key("2024-02"), &key("2024-01")).is_err());
    }

    #[test]
    fn test_add_months_negative_rollover() {
        assert_eq!(add_months(&key("2024-01"), -1).unwrap(), key("2023-12"));
        assert_eq!(add_months(&key("2024-01"), -13).unwrap(), key("2022-12"));
        assert_eq!(add_months(&key("2023-12"), 1).unwrap(), key("2024-01"));
        assert_eq!(add_months(&key("2024-05"), 0).unwrap(), key("2024-05"));
        assert!(add_months(&key("2100-12"), 1).is_err());
    }

    #[test]
    fn test_last_n_months() {
        let months = get_last_n_months(&key("2024-02"), 3).unwrap();
        assert_eq!(months, vec![key("2023-12"), key("2024-01"), key("2024-02")]);
        assert!(get_last_n_months(&key("2024-02"), 0).is_err());
    }

    #[test]
    fn test_years_between() {
        assert_eq!(years_between(&key("2020-01"), &key("2021-07")), dec!(1.5));
    }

    #[test]
    fn test_compare_keys() {
        assert_eq!(compare_keys(&key("2023-12"), &key("2024-01")), -1);
        assert_eq!(compare_keys(&key("2024-01"), &key("2024-01")), 0);
        assert_eq!(compare_keys(&key("2024-10"), &key("2024-09")), 1);
    }

    #[test]
    fn test_current_month_from_clock() {
        let clock = FixedClock(NaiveDate::from_ymd_opt(2025, 8, 31).unwrap());
        assert_eq!(get_current_month_key(&clock).unwrap(), key("2025-08"));
    }

    #[test]
    fn test_serde_string_form() {
        let json = serde_json::to_string(&key("2024-07")).unwrap();
        assert_eq!(json, "\"2024-07\"");
        let back: MonthKey = serde_json::from_str(&json).unwrap();
        assert_eq!(back, key("2024-07"));
        assert!(serde_json::from_str::<MonthKey>("\"2024-7\"").is_err());
    }
}
