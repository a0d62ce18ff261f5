use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::collections::BTreeMap;

use crate::error::NavEngineError;
use crate::month::{generate_month_range, months_between, MonthKey};
use crate::types::round_percent;
use crate::NavEngineResult;

/// Monthly NAV history of a single fund.
///
/// Keys are always valid months and values always strictly positive; the
/// map keeps entries in chronological order. Operations never modify a
/// series in place, they return a new one.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "BTreeMap<String, Decimal>")]
pub struct NavSeries(BTreeMap<MonthKey, Decimal>);

impl NavSeries {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, month: &MonthKey) -> Option<Decimal> {
        self.0.get(month).copied()
    }

    pub fn contains(&self, month: &MonthKey) -> bool {
        self.0.contains_key(month)
    }

    /// Entries in chronological order.
    pub fn iter(&self) -> impl Iterator<Item = (&MonthKey, &Decimal)> + '_ {
        self.0.iter()
    }

    pub fn first(&self) -> Option<NavPoint> {
        self.0
            .first_key_value()
            .map(|(month, nav)| NavPoint { month: *month, nav: *nav })
    }

    pub fn last(&self) -> Option<NavPoint> {
        self.0
            .last_key_value()
            .map(|(month, nav)| NavPoint { month: *month, nav: *nav })
    }

    /// Closest known entry strictly before `month`.
    fn before(&self, month: &MonthKey) -> Option<NavPoint> {
        self.0
            .range(..*month)
            .next_back()
            .map(|(m, nav)| NavPoint { month: *m, nav: *nav })
    }

    /// Closest known entry strictly after `month`.
    fn after(&self, month: &MonthKey) -> Option<NavPoint> {
        self.0
            .range(*month..)
            .find(|(m, _)| *m > month)
            .map(|(m, nav)| NavPoint { month: *m, nav: *nav })
    }
}

impl TryFrom<BTreeMap<String, Decimal>> for NavSeries {
    type Error = NavEngineError;

    fn try_from(raw: BTreeMap<String, Decimal>) -> Result<Self, Self::Error> {
        normalize_nav_data(&raw)
    }
}

/// One month's NAV.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NavPoint {
    pub month: MonthKey,
    pub nav: Decimal,
}

/// Span of months covered by a series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NavRange {
    pub start: MonthKey,
    pub end: MonthKey,
    /// Months with a NAV, ascending
    pub months: Vec<MonthKey>,
}

/// Diagnostic for partially covered ranges.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NavCoverage {
    pub is_valid: bool,
    pub missing: Vec<MonthKey>,
    pub coverage_percent: Decimal,
}

/// Validate raw `"YYYY-MM" -> NAV` pairs and build a sorted series.
///
/// Fails on the first malformed key or non-positive value, naming it. When
/// the same month appears twice the later pair wins.
pub fn normalize_nav_data<K, V, I>(raw: I) -> NavEngineResult<NavSeries>
where
    I: IntoIterator<Item = (K, V)>,
    K: AsRef<str>,
    V: Borrow<Decimal>,
{
    let mut series = BTreeMap::new();
    for (key, value) in raw {
        let key = key.as_ref();
        let nav = *value.borrow();
        let month: MonthKey = key.parse().map_err(|_| {
            NavEngineError::validation(
                "nav_data",
                format!("Invalid month key '{key}' (expected YYYY-MM)"),
            )
        })?;
        if nav <= Decimal::ZERO {
            return Err(NavEngineError::validation(
                "nav_data",
                format!("NAV for {key} must be positive, got {nav}"),
            ));
        }
        series.insert(month, nav);
    }
    Ok(NavSeries(series))
}

pub fn get_nav_range(series: &NavSeries) -> NavEngineResult<NavRange> {
    match (series.first(), series.last()) {
        (Some(first), Some(last)) => Ok(NavRange {
            start: first.month,
            end: last.month,
            months: extract_months(series),
        }),
        _ => Err(NavEngineError::data_availability(
            "NAV history is empty; no range available",
        )),
    }
}

/// Produce a NAV for every month in `[start, end]`.
///
/// Known months are copied. Months before the first entry take the first
/// NAV, months after the last entry take the last NAV, and months between
/// two entries are linearly interpolated on month distance.
pub fn fill_missing_nav_data(
    series: &NavSeries,
    start: &MonthKey,
    end: &MonthKey,
) -> NavEngineResult<NavSeries> {
    let (earliest, latest) = match (series.first(), series.last()) {
        (Some(first), Some(last)) => (first, last),
        _ => {
            return Err(NavEngineError::data_availability(format!(
                "Cannot fill {start} to {end}: NAV history is empty"
            )))
        }
    };

    let mut filled = BTreeMap::new();
    for month in generate_month_range(start, end)? {
        let nav = if let Some(nav) = series.get(&month) {
            nav
        } else if month < earliest.month {
            earliest.nav
        } else if month > latest.month {
            latest.nav
        } else {
            let value = interpolate(series, &month)?;
            tracing::debug!(month = %month, nav = %value, "interpolated missing NAV");
            value
        };
        filled.insert(month, nav);
    }
    Ok(NavSeries(filled))
}

fn interpolate(series: &NavSeries, target: &MonthKey) -> NavEngineResult<Decimal> {
    let (before, after) = match (series.before(target), series.after(target)) {
        (Some(b), Some(a)) => (b, a),
        _ => {
            return Err(NavEngineError::data_availability(format!(
                "No bounding NAVs around {target} for interpolation"
            )))
        }
    };

    let span = months_between(&before.month, &after.month);
    let offset = months_between(&before.month, target);
    let ratio = Decimal::from(offset) / Decimal::from(span);
    Ok(before.nav + (after.nav - before.nav) * ratio)
}

pub fn extract_months(series: &NavSeries) -> Vec<MonthKey> {
    series.0.keys().copied().collect()
}

/// Exploratory lookup; absent months yield `None`.
pub fn get_nav_for_month(series: &NavSeries, month: &MonthKey) -> Option<Decimal> {
    series.get(month)
}

pub fn get_latest_nav(series: &NavSeries) -> NavEngineResult<NavPoint> {
    series
        .last()
        .ok_or_else(|| NavEngineError::data_availability("NAV history is empty; no latest NAV"))
}

pub fn get_earliest_nav(series: &NavSeries) -> NavEngineResult<NavPoint> {
    series
        .first()
        .ok_or_else(|| NavEngineError::data_availability("NAV history is empty; no earliest NAV"))
}

pub fn validate_nav_coverage(
    series: &NavSeries,
    start: &MonthKey,
    end: &MonthKey,
) -> NavEngineResult<NavCoverage> {
    let months = generate_month_range(start, end)?;
    let total = months.len();
    let missing: Vec<MonthKey> = months
        .into_iter()
        .filter(|m| !series.contains(m))
        .collect();

    let covered = total - missing.len();
    let coverage_percent =
        round_percent(Decimal::from(covered as i64) * Decimal::from(100) / Decimal::from(total as i64));

    Ok(NavCoverage {
        is_valid: missing.is_empty(),
        missing,
        coverage_percent,
    })
}

/// Union of several series; on a shared month the later series wins.
pub fn merge_nav_data(sets: &[NavSeries]) -> NavSeries {
    let mut merged = BTreeMap::new();
    for set in sets {
        for (month, nav) in set.iter() {
            merged.insert(*month, *nav);
        }
    }
    NavSeries(merged)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn key(s: &str) -> MonthKey {
        s.parse().unwrap()
    }

    fn series(pairs: &[(&str, Decimal)]) -> NavSeries {
        normalize_nav_data(pairs.iter().map(|(k, v)| (*k, *v))).unwrap()
    }

    #[test]
    fn test_normalize_sorts() {
        let s = series(&[("2024-03", dec!(110)), ("2024-01", dec!(100))]);
        assert_eq!(extract_months(&s), vec![key("2024-01"), key("2024-03")]);
    }

    #[test]
    fn test_normalize_rejects_bad_key() {
        let err = normalize_nav_data([("2024-1", dec!(100))]).unwrap_err();
        assert!(err.to_string().contains("2024-1"));
    }

    #[test]
    fn test_normalize_rejects_non_positive() {
        let err = normalize_nav_data([("2024-01", dec!(0))]).unwrap_err();
        assert!(err.to_string().contains("2024-01"));
        assert!(normalize_nav_data([("2024-01", dec!(-3))]).is_err());
    }

    #[test]
    fn test_nav_range_empty() {
        let err = get_nav_range(&NavSeries::default()).unwrap_err();
        assert!(matches!(err, NavEngineError::DataAvailability { .. }));
    }

    #[test]
    fn test_fill_interpolates_by_month_distance() {
        let s = series(&[("2024-01", dec!(100)), ("2024-05", dec!(140))]);
        let filled = fill_missing_nav_data(&s, &key("2024-01"), &key("2024-05")).unwrap();
        assert_eq!(filled.len(), 5);
        assert_eq!(filled.get(&key("2024-02")), Some(dec!(110)));
        assert_eq!(filled.get(&key("2024-03")), Some(dec!(120)));
        assert_eq!(filled.get(&key("2024-04")), Some(dec!(130)));
    }

    #[test]
    fn test_fill_backward_and_forward() {
        let s = series(&[("2024-03", dec!(50)), ("2024-04", dec!(60))]);
        let filled = fill_missing_nav_data(&s, &key("2024-01"), &key("2024-06")).unwrap();
        assert_eq!(filled.get(&key("2024-01")), Some(dec!(50)));
        assert_eq!(filled.get(&key("2024-02")), Some(dec!(50)));
        assert_eq!(filled.get(&key("2024-05")), Some(dec!(60)));
        assert_eq!(filled.get(&key("2024-06")), Some(dec!(60)));
    }

    #[test]
    fn test_fill_empty_series_fails() {
        let err = fill_missing_nav_data(&NavSeries::default(), &key("2024-01"), &key("2024-02"))
            .unwrap_err();
        assert!(matches!(err, NavEngineError::DataAvailability { .. }));
    }

    #[test]
    fn test_fill_does_not_touch_input() {
        let s = series(&[("2024-01", dec!(100)), ("2024-03", dec!(120))]);
        let before = s.clone();
        let _ = fill_missing_nav_data(&s, &key("2023-12"), &key("2024-04")).unwrap();
        assert_eq!(s, before);
    }

    #[test]
    fn test_lookup_optional() {
        let s = series(&[("2024-01", dec!(100))]);
        assert_eq!(get_nav_for_month(&s, &key("2024-01")), Some(dec!(100)));
        assert_eq!(get_nav_for_month(&s, &key("2024-02")), None);
    }

    #[test]
    fn test_latest_and_earliest() {
        let s = series(&[("2024-02", dec!(105)), ("2023-12", dec!(98)), ("2024-01", dec!(100))]);
        assert_eq!(get_latest_nav(&s).unwrap().month, key("2024-02"));
        assert_eq!(get_earliest_nav(&s).unwrap().nav, dec!(98));
        assert!(get_latest_nav(&NavSeries::default()).is_err());
    }

    #[test]
    fn test_coverage() {
        let s = series(&[("2024-01", dec!(100)), ("2024-04", dec!(110))]);
        let cov = validate_nav_coverage(&s, &key("2024-01"), &key("2024-04")).unwrap();
        assert!(!cov.is_valid);
        assert_eq!(cov.missing, vec![key("2024-02"), key("2024-03")]);
        assert_eq!(cov.coverage_percent, dec!(50));
    }

    #[test]
    fn test_merge_later_wins() {
        let a = series(&[("2024-01", dec!(100)), ("2024-02", dec!(101))]);
        let b = series(&[("2024-02", dec!(102)), ("2024-03", dec!(103))]);
        let merged = merge_nav_data(&[a, b]);
        assert_eq!(merged.len(), 3);
        assert_eq!(merged.get(&key("2024-02")), Some(dec!(102)));
    }

    #[test]
    fn test_deserialize_validates() {
        let s: NavSeries = serde_json::from_str(r#"{"2024-02": 105, "2024-01": "100.5"}"#).unwrap();
        assert_eq!(s.first().unwrap().nav, dec!(100.5));
        assert!(serde_json::from_str::<NavSeries>(r#"{"2024-1": 105}"#).is_err());
        assert!(serde_json::from_str::<NavSeries>(r#"{"2024-01": -1}"#).is_err());
    }
}
