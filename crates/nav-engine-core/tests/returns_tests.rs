use chrono::{Duration, NaiveDate};
use nav_engine_core::month::{add_months, MonthKey};
use nav_engine_core::nav::normalize_nav_data;
use nav_engine_core::returns::{
    calculate_cagr, calculate_fund_risk, calculate_monthly_returns, calculate_nav_cagr,
    calculate_sharpe_ratio, calculate_trailing_returns, calculate_xirr, TrailingWindow,
    XirrConfig, XirrStopReason, DEFAULT_RISK_FREE_RATE,
};
use nav_engine_core::valuation::{generate_cash_flows, SipPlan};
use nav_engine_core::{CashFlow, FixedClock, NavEngineError};
use pretty_assertions::assert_eq;
use proptest::prelude::*;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

// ===========================================================================
// CAGR / XIRR / trailing returns
// ===========================================================================

fn key(s: &str) -> MonthKey {
    s.parse().unwrap()
}

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

#[test]
fn test_xirr_twenty_percent_over_four_years() {
    // 1461 days = 4 x 365.25
    let t0 = date(2019, 1, 1);
    let flows = vec![
        CashFlow::new(t0, dec!(-100000)),
        CashFlow::new(t0 + Duration::days(1461), dec!(207360)),
    ];
    let result = calculate_xirr(&flows, &XirrConfig::default()).unwrap();
    assert!(result.converged);
    assert!((result.xirr - dec!(20)).abs() <= dec!(0.01), "got {}", result.xirr);
}

#[test]
fn test_xirr_one_calendar_year() {
    // 365 days is slightly short of a 365.25-day year: 1.2^(365.25/365) - 1
    let flows = vec![
        CashFlow::new(date(2023, 1, 1), dec!(-100000)),
        CashFlow::new(date(2024, 1, 1), dec!(120000)),
    ];
    let result = calculate_xirr(&flows, &XirrConfig::default()).unwrap();
    assert!(result.converged);
    assert!((result.xirr - dec!(20.015)).abs() < dec!(0.01), "got {}", result.xirr);
}

#[test]
fn test_xirr_matches_cagr_for_two_points() {
    let flows = vec![
        CashFlow::new(date(2016, 1, 1), dec!(-100000)),
        CashFlow::new(date(2024, 1, 1), dec!(180000)),
    ];
    // 2016-01-01 to 2024-01-01 spans 2922 days = 8 x 365.25
    let xirr = calculate_xirr(&flows, &XirrConfig::default()).unwrap();
    let cagr = calculate_cagr(dec!(100000), dec!(180000), dec!(8)).unwrap();
    assert!((xirr.xirr - cagr).abs() <= dec!(0.01), "xirr {} cagr {}", xirr.xirr, cagr);
}

#[test]
fn test_xirr_total_loss_hits_lower_bound_region() {
    let flows = vec![
        CashFlow::new(date(2020, 1, 1), dec!(-100000)),
        CashFlow::new(date(2021, 1, 1), dec!(1)),
    ];
    let result = calculate_xirr(&flows, &XirrConfig::default()).unwrap();
    assert!(!result.converged);
    assert!(result.rate >= dec!(-0.99));
    assert!(result.xirr < dec!(-90));
}

#[test]
fn test_xirr_same_date_flows_are_flat() {
    // All flows on one date: NPV does not depend on the rate
    let flows = vec![
        CashFlow::new(date(2020, 1, 1), dec!(-100)),
        CashFlow::new(date(2020, 1, 1), dec!(150)),
    ];
    let result = calculate_xirr(&flows, &XirrConfig::default()).unwrap();
    assert!(!result.converged);
    assert_eq!(result.stop_reason, XirrStopReason::FlatDerivative);
}

#[test]
fn test_xirr_rejects_bad_guess() {
    let flows = vec![
        CashFlow::new(date(2020, 1, 1), dec!(-100)),
        CashFlow::new(date(2021, 1, 1), dec!(150)),
    ];
    let config = XirrConfig { guess: dec!(-1.5), ..XirrConfig::default() };
    let err = calculate_xirr(&flows, &config).unwrap_err();
    assert!(matches!(err, NavEngineError::Validation { .. }));
}

#[test]
fn test_xirr_on_generated_sip_flows() {
    let nav = normalize_nav_data([
        ("2023-01", dec!(100)),
        ("2023-06", dec!(108)),
        ("2023-12", dec!(115)),
    ])
    .unwrap();
    let sip = SipPlan { monthly_amount: dec!(5000), start_month: key("2023-01"), end_month: None };
    let clock = FixedClock(date(2024, 2, 1));
    let flows = generate_cash_flows(Some(&sip), None, &nav, &clock).unwrap();
    assert_eq!(flows.len(), 13);
    let result = calculate_xirr(&flows, &XirrConfig::default()).unwrap();
    assert!(result.converged);
    assert!(result.xirr > Decimal::ZERO);
}

#[test]
fn test_trailing_returns_windows() {
    let nav = normalize_nav_data([
        ("2023-01", dec!(80)),
        ("2023-07", dec!(90)),
        ("2023-10", dec!(95)),
        ("2023-12", dec!(98)),
        ("2024-01", dec!(100)),
    ])
    .unwrap();
    let t = calculate_trailing_returns(&nav).unwrap();
    assert_eq!(t.as_of, key("2024-01"));

    let one_month = t.one_month.as_ref().unwrap();
    assert_eq!(one_month.start_month, key("2023-12"));
    assert_eq!(one_month.absolute_return, dec!(2.04));
    assert!(one_month.annualized_return > one_month.absolute_return);

    assert_eq!(t.three_months.as_ref().unwrap().start_month, key("2023-10"));
    assert_eq!(t.six_months.as_ref().unwrap().start_month, key("2023-07"));

    let one_year = t.get(TrailingWindow::OneYear).unwrap();
    assert_eq!(one_year.absolute_return, dec!(25));
    assert_eq!(one_year.annualized_return, dec!(25));
}

#[test]
fn test_trailing_returns_missing_start_is_none() {
    let nav = normalize_nav_data([("2024-01", dec!(100)), ("2024-03", dec!(103))]).unwrap();
    let t = calculate_trailing_returns(&nav).unwrap();
    assert!(t.one_month.is_none());
    assert!(t.three_months.is_none());
    assert!(t.one_year.is_none());
}

#[test]
fn test_trailing_returns_with_explosive_month_still_reported() {
    let nav = normalize_nav_data([
        ("2023-08", dec!(1)),
        ("2024-01", dec!(1)),
        ("2024-02", dec!(300)),
    ])
    .unwrap();
    let t = calculate_trailing_returns(&nav).unwrap();

    let one_month = t.one_month.unwrap();
    assert_eq!(one_month.absolute_return, dec!(29900));
    assert_eq!(one_month.annualized_return, Decimal::MAX);

    let six_months = t.six_months.unwrap();
    assert_eq!(six_months.start_month, key("2023-08"));
    assert_eq!(six_months.absolute_return, dec!(29900));
    assert!(six_months.annualized_return > dec!(1000000));
    assert!(t.three_months.is_none());
}

#[test]
fn test_cagr_over_days_does_not_error() {
    assert_eq!(calculate_cagr(dec!(100), dec!(200), dec!(0.01)).unwrap(), Decimal::MAX);
}

#[test]
fn test_trailing_window_start_agrees_with_month_arithmetic() {
    // Calendar-month subtraction from the 1st of the month and plain
    // month-count arithmetic must pick the same start month, including across
    // year ends and from months whose predecessors are shorter.
    for latest in ["2024-01", "2024-03", "2024-05", "2023-12", "2024-10"] {
        let latest = key(latest);
        let mut pairs: Vec<(String, Decimal)> = Vec::new();
        for back in 0..=12 {
            let m = add_months(&latest, -back).unwrap();
            pairs.push((m.to_string(), Decimal::from(100 + back)));
        }
        let nav = normalize_nav_data(pairs).unwrap();
        let t = calculate_trailing_returns(&nav).unwrap();
        for window in TrailingWindow::ALL {
            let expected = add_months(&latest, -(window.months() as i64)).unwrap();
            assert_eq!(t.get(window).unwrap().start_month, expected);
        }
    }
}

#[test]
fn test_nav_cagr_over_two_years() {
    let nav = normalize_nav_data([("2022-01", dec!(100)), ("2024-01", dec!(121))]).unwrap();
    assert_eq!(calculate_nav_cagr(&nav, &key("2022-01"), &key("2024-01")).unwrap(), dec!(10));
}

#[test]
fn test_fund_risk_summary() {
    let nav = normalize_nav_data([
        ("2023-01", dec!(100)),
        ("2023-02", dec!(102)),
        ("2023-03", dec!(99)),
        ("2023-04", dec!(104)),
        ("2024-01", dec!(112)),
    ])
    .unwrap();
    let monthly = calculate_monthly_returns(&nav).unwrap();
    assert_eq!(monthly.len(), 4);
    assert_eq!(monthly[0].return_percent, dec!(2));

    let risk = calculate_fund_risk(&nav, DEFAULT_RISK_FREE_RATE).unwrap();
    assert_eq!(risk.cagr, dec!(12));
    assert_eq!(risk.monthly_statistics.count, 4);
    assert!(risk.annualized_volatility > Decimal::ZERO);
    assert_eq!(risk.drawdown.peak_month, Some(key("2023-02")));
}

#[test]
fn test_fund_risk_needs_two_points() {
    let nav = normalize_nav_data([("2023-01", dec!(100))]).unwrap();
    assert!(matches!(
        calculate_fund_risk(&nav, DEFAULT_RISK_FREE_RATE).unwrap_err(),
        NavEngineError::DataAvailability { .. }
    ));
}

proptest! {
    #[test]
    fn prop_cagr_of_zero_final_is_total_loss(initial in 1u32..1_000_000, months in 1u32..600) {
        let years = Decimal::from(months) / Decimal::from(12);
        prop_assert_eq!(
            calculate_cagr(Decimal::from(initial), Decimal::ZERO, years).unwrap(),
            dec!(-100)
        );
    }

    #[test]
    fn prop_sharpe_zero_volatility(r in -50i32..50, rf in 0i32..10) {
        prop_assert_eq!(
            calculate_sharpe_ratio(Decimal::from(r), Decimal::from(rf), Decimal::ZERO),
            Decimal::ZERO
        );
    }
}
