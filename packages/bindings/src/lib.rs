use chrono::NaiveDate;
use napi::Result as NapiResult;
use napi_derive::napi;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::time::Instant;

use nav_engine_core::returns::{InvestmentComparisonInput, XirrConfig, DEFAULT_RISK_FREE_RATE};
use nav_engine_core::valuation::{Lumpsum, PortfolioInput};
use nav_engine_core::{
    with_metadata, CashFlow, Clock, FixedClock, MonthKey, NavSeries, SystemClock,
};

/// Convert any Display error into a napi::Error.
fn to_napi_error(e: impl std::fmt::Display) -> napi::Error {
    napi::Error::from_reason(e.to_string())
}

fn parse<'a, T: Deserialize<'a>>(input_json: &'a str) -> NapiResult<T> {
    serde_json::from_str(input_json).map_err(to_napi_error)
}

fn to_json<T: Serialize>(value: &T) -> NapiResult<String> {
    serde_json::to_string(value).map_err(to_napi_error)
}

fn month(key: &str) -> NapiResult<MonthKey> {
    key.parse().map_err(to_napi_error)
}

/// Serialise `result` inside the standard computation envelope.
fn envelope<T: Serialize>(
    methodology: &str,
    assumptions: &impl Serialize,
    warnings: Vec<String>,
    started: Instant,
    result: T,
) -> NapiResult<String> {
    let elapsed_us = started.elapsed().as_micros() as u64;
    to_json(&with_metadata(
        methodology,
        assumptions,
        warnings,
        elapsed_us,
        result,
    ))
}

fn clock_for(as_of: Option<MonthKey>) -> NapiResult<Box<dyn Clock>> {
    match as_of {
        Some(m) => {
            let date = nav_engine_core::month::key_to_date(&m).map_err(to_napi_error)?;
            Ok(Box::new(FixedClock(date)))
        }
        None => Ok(Box::new(SystemClock)),
    }
}

#[derive(Deserialize)]
struct SeriesInput {
    nav_data: NavSeries,
}

#[derive(Deserialize)]
struct SeriesRangeInput {
    nav_data: NavSeries,
    start: MonthKey,
    end: MonthKey,
}

// ---------------------------------------------------------------------------
// Months
// ---------------------------------------------------------------------------

#[napi]
pub fn parse_key(key: String) -> NapiResult<String> {
    let (year, month) = nav_engine_core::month::parse_key(&key).map_err(to_napi_error)?;
    to_json(&serde_json::json!({ "year": year, "month": month }))
}

#[napi]
pub fn date_to_key(date: String) -> NapiResult<String> {
    let date: NaiveDate = date.parse().map_err(to_napi_error)?;
    let key = nav_engine_core::month::date_to_key(date).map_err(to_napi_error)?;
    Ok(key.to_string())
}

#[napi]
pub fn key_to_date(key: String) -> NapiResult<String> {
    let date = nav_engine_core::month::key_to_date(&month(&key)?).map_err(to_napi_error)?;
    Ok(date.to_string())
}

#[napi]
pub fn month_year_to_key(year: i32, month: u32) -> NapiResult<String> {
    let key = nav_engine_core::month::month_year_to_key(year, month).map_err(to_napi_error)?;
    Ok(key.to_string())
}

#[napi]
pub fn months_between(a: String, b: String) -> NapiResult<i64> {
    Ok(nav_engine_core::month::months_between(&month(&a)?, &month(&b)?))
}

#[napi]
pub fn generate_month_range(start: String, end: String) -> NapiResult<String> {
    let range = nav_engine_core::month::generate_month_range(&month(&start)?, &month(&end)?)
        .map_err(to_napi_error)?;
    to_json(&range)
}

#[napi]
pub fn add_months(key: String, n: i64) -> NapiResult<String> {
    let key = nav_engine_core::month::add_months(&month(&key)?, n).map_err(to_napi_error)?;
    Ok(key.to_string())
}

#[napi]
pub fn get_last_n_months(end: String, n: u32) -> NapiResult<String> {
    let months = nav_engine_core::month::get_last_n_months(&month(&end)?, n as usize)
        .map_err(to_napi_error)?;
    to_json(&months)
}

#[napi]
pub fn years_between(a: String, b: String) -> NapiResult<String> {
    Ok(nav_engine_core::month::years_between(&month(&a)?, &month(&b)?).to_string())
}

#[napi]
pub fn compare_keys(a: String, b: String) -> NapiResult<i32> {
    Ok(nav_engine_core::month::compare_keys(&month(&a)?, &month(&b)?))
}

#[napi]
pub fn get_current_month_key() -> NapiResult<String> {
    let key = nav_engine_core::month::get_current_month_key(&SystemClock).map_err(to_napi_error)?;
    Ok(key.to_string())
}

// ---------------------------------------------------------------------------
// NAV series
// ---------------------------------------------------------------------------

/// Takes a bare `{"YYYY-MM": nav}` object.
#[napi]
pub fn normalize_nav_data(input_json: String) -> NapiResult<String> {
    let raw: std::collections::BTreeMap<String, Decimal> = parse(&input_json)?;
    let series = nav_engine_core::nav::normalize_nav_data(&raw).map_err(to_napi_error)?;
    to_json(&series)
}

#[napi]
pub fn get_nav_range(input_json: String) -> NapiResult<String> {
    let input: SeriesInput = parse(&input_json)?;
    let range = nav_engine_core::nav::get_nav_range(&input.nav_data).map_err(to_napi_error)?;
    to_json(&range)
}

#[napi]
pub fn fill_missing_nav_data(input_json: String) -> NapiResult<String> {
    let input: SeriesRangeInput = parse(&input_json)?;
    let filled = nav_engine_core::nav::fill_missing_nav_data(&input.nav_data, &input.start, &input.end)
        .map_err(to_napi_error)?;
    to_json(&filled)
}

#[napi]
pub fn extract_months(input_json: String) -> NapiResult<String> {
    let input: SeriesInput = parse(&input_json)?;
    to_json(&nav_engine_core::nav::extract_months(&input.nav_data))
}

#[derive(Deserialize)]
struct NavLookupInput {
    nav_data: NavSeries,
    month: MonthKey,
}

/// `null` when the month has no NAV.
#[napi]
pub fn get_nav_for_month(input_json: String) -> NapiResult<String> {
    let input: NavLookupInput = parse(&input_json)?;
    to_json(&nav_engine_core::nav::get_nav_for_month(&input.nav_data, &input.month))
}

#[napi]
pub fn get_latest_nav(input_json: String) -> NapiResult<String> {
    let input: SeriesInput = parse(&input_json)?;
    let point = nav_engine_core::nav::get_latest_nav(&input.nav_data).map_err(to_napi_error)?;
    to_json(&point)
}

#[napi]
pub fn get_earliest_nav(input_json: String) -> NapiResult<String> {
    let input: SeriesInput = parse(&input_json)?;
    let point = nav_engine_core::nav::get_earliest_nav(&input.nav_data).map_err(to_napi_error)?;
    to_json(&point)
}

#[napi]
pub fn validate_nav_coverage(input_json: String) -> NapiResult<String> {
    let input: SeriesRangeInput = parse(&input_json)?;
    let coverage =
        nav_engine_core::nav::validate_nav_coverage(&input.nav_data, &input.start, &input.end)
            .map_err(to_napi_error)?;
    to_json(&coverage)
}

/// Takes a JSON array of NAV objects; later entries win on shared months.
#[napi]
pub fn merge_nav_data(input_json: String) -> NapiResult<String> {
    let sets: Vec<NavSeries> = parse(&input_json)?;
    to_json(&nav_engine_core::nav::merge_nav_data(&sets))
}

// ---------------------------------------------------------------------------
// Valuation
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct LumpsumInput {
    nav_data: NavSeries,
    amount: Decimal,
    purchase_month: MonthKey,
    #[serde(default)]
    as_of: Option<MonthKey>,
}

#[napi]
pub fn calculate_lumpsum_value(input_json: String) -> NapiResult<String> {
    let input: LumpsumInput = parse(&input_json)?;
    let started = Instant::now();
    let clock = clock_for(input.as_of)?;
    let valuation = nav_engine_core::valuation::calculate_lumpsum_value(
        input.amount,
        &input.purchase_month,
        &input.nav_data,
        clock.as_ref(),
    )
    .map_err(to_napi_error)?;
    envelope(
        "Units bought at purchase NAV, valued at the latest NAV",
        &serde_json::json!({ "amount": input.amount, "purchase_month": input.purchase_month }),
        Vec::new(),
        started,
        valuation,
    )
}

#[derive(Deserialize)]
struct SipInput {
    nav_data: NavSeries,
    monthly_amount: Decimal,
    start_month: MonthKey,
    #[serde(default)]
    end_month: Option<MonthKey>,
}

#[napi]
pub fn calculate_sip_value(input_json: String) -> NapiResult<String> {
    let input: SipInput = parse(&input_json)?;
    let started = Instant::now();
    let valuation = nav_engine_core::valuation::calculate_sip_value(
        input.monthly_amount,
        &input.start_month,
        &input.nav_data,
        input.end_month.as_ref(),
    )
    .map_err(to_napi_error)?;
    envelope(
        "One installment per month, valued at the latest NAV",
        &serde_json::json!({
            "monthly_amount": input.monthly_amount,
            "start_month": input.start_month,
            "end_month": input.end_month,
        }),
        Vec::new(),
        started,
        valuation,
    )
}

#[derive(Deserialize)]
struct MultiLumpsumInput {
    nav_data: NavSeries,
    lumpsums: Vec<Lumpsum>,
    #[serde(default)]
    as_of: Option<MonthKey>,
}

#[napi]
pub fn calculate_multiple_lumpsums(input_json: String) -> NapiResult<String> {
    let input: MultiLumpsumInput = parse(&input_json)?;
    let started = Instant::now();
    let clock = clock_for(input.as_of)?;
    let valuation = nav_engine_core::valuation::calculate_multiple_lumpsums(
        &input.lumpsums,
        &input.nav_data,
        clock.as_ref(),
    )
    .map_err(to_napi_error)?;
    envelope(
        "Each lumpsum valued independently and summed",
        &serde_json::json!({ "lumpsum_count": input.lumpsums.len() }),
        Vec::new(),
        started,
        valuation,
    )
}

#[derive(Deserialize)]
struct PortfolioRequest {
    #[serde(flatten)]
    portfolio: PortfolioInput,
    #[serde(default)]
    as_of: Option<MonthKey>,
}

#[napi]
pub fn calculate_combined_value(input_json: String) -> NapiResult<String> {
    let input: PortfolioRequest = parse(&input_json)?;
    let started = Instant::now();
    let clock = clock_for(input.as_of)?;
    let p = &input.portfolio;
    let valuation = nav_engine_core::valuation::calculate_combined_value(
        p.sip.as_ref(),
        Some(p.lumpsums.as_slice()),
        &p.nav_data,
        clock.as_ref(),
    )
    .map_err(to_napi_error)?;
    envelope(
        "SIP and lumpsum holdings valued separately and summed",
        &serde_json::json!({ "has_sip": p.sip.is_some(), "lumpsum_count": p.lumpsums.len() }),
        Vec::new(),
        started,
        valuation,
    )
}

#[napi]
pub fn generate_cash_flows(input_json: String) -> NapiResult<String> {
    let input: PortfolioRequest = parse(&input_json)?;
    let clock = clock_for(input.as_of)?;
    let p = &input.portfolio;
    let flows = nav_engine_core::valuation::generate_cash_flows(
        p.sip.as_ref(),
        Some(p.lumpsums.as_slice()),
        &p.nav_data,
        clock.as_ref(),
    )
    .map_err(to_napi_error)?;
    to_json(&flows)
}

// ---------------------------------------------------------------------------
// Returns
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct GrowthInput {
    initial: Decimal,
    final_value: Decimal,
    #[serde(default)]
    years: Option<Decimal>,
}

#[napi]
pub fn calculate_absolute_return(input_json: String) -> NapiResult<String> {
    let input: GrowthInput = parse(&input_json)?;
    let value = nav_engine_core::returns::calculate_absolute_return(input.initial, input.final_value)
        .map_err(to_napi_error)?;
    Ok(value.to_string())
}

#[napi]
pub fn calculate_cagr(input_json: String) -> NapiResult<String> {
    let input: GrowthInput = parse(&input_json)?;
    let years = input
        .years
        .ok_or_else(|| to_napi_error("years is required for CAGR"))?;
    let value = nav_engine_core::returns::calculate_cagr(input.initial, input.final_value, years)
        .map_err(to_napi_error)?;
    Ok(value.to_string())
}

#[napi]
pub fn calculate_nav_cagr(input_json: String) -> NapiResult<String> {
    let input: SeriesRangeInput = parse(&input_json)?;
    let value =
        nav_engine_core::returns::calculate_nav_cagr(&input.nav_data, &input.start, &input.end)
            .map_err(to_napi_error)?;
    Ok(value.to_string())
}

#[napi]
pub fn calculate_trailing_returns(input_json: String) -> NapiResult<String> {
    let input: SeriesInput = parse(&input_json)?;
    let started = Instant::now();
    let trailing = nav_engine_core::returns::calculate_trailing_returns(&input.nav_data)
        .map_err(to_napi_error)?;
    envelope(
        "Point-to-point returns ending at the latest NAV month",
        &serde_json::json!({ "as_of": trailing.as_of }),
        Vec::new(),
        started,
        trailing,
    )
}

#[derive(Deserialize)]
struct RollingInput {
    nav_data: NavSeries,
    window_months: usize,
}

#[napi]
pub fn calculate_rolling_returns(input_json: String) -> NapiResult<String> {
    let input: RollingInput = parse(&input_json)?;
    let rolling =
        nav_engine_core::returns::calculate_rolling_returns(&input.nav_data, input.window_months)
            .map_err(to_napi_error)?;
    to_json(&rolling)
}

#[napi]
pub fn calculate_monthly_returns(input_json: String) -> NapiResult<String> {
    let input: SeriesInput = parse(&input_json)?;
    let monthly = nav_engine_core::returns::calculate_monthly_returns(&input.nav_data)
        .map_err(to_napi_error)?;
    to_json(&monthly)
}

#[derive(Deserialize)]
struct XirrInput {
    cash_flows: Vec<CashFlow>,
    #[serde(default)]
    config: XirrConfig,
}

#[napi]
pub fn calculate_xirr(input_json: String) -> NapiResult<String> {
    let input: XirrInput = parse(&input_json)?;
    let started = Instant::now();
    let result = nav_engine_core::returns::calculate_xirr(&input.cash_flows, &input.config)
        .map_err(to_napi_error)?;
    let warnings = if result.converged {
        Vec::new()
    } else {
        vec![format!(
            "XIRR did not converge ({:?} after {} iterations); best estimate reported",
            result.stop_reason, result.iterations
        )]
    };
    envelope(
        "Newton-Raphson on NPV with 365.25-day years",
        &input.config,
        warnings,
        started,
        result,
    )
}

#[derive(Deserialize)]
struct SipXirrInput {
    monthly_amount: Decimal,
    total_months: i64,
    current_value: Decimal,
}

#[napi]
pub fn approximate_sip_xirr(input_json: String) -> NapiResult<String> {
    let input: SipXirrInput = parse(&input_json)?;
    let value = nav_engine_core::returns::approximate_sip_xirr(
        input.monthly_amount,
        input.total_months,
        input.current_value,
    )
    .map_err(to_napi_error)?;
    Ok(value.to_string())
}

#[derive(Deserialize)]
struct StatisticsInput {
    returns: Vec<Decimal>,
}

#[napi]
pub fn calculate_return_statistics(input_json: String) -> NapiResult<String> {
    let input: StatisticsInput = parse(&input_json)?;
    let stats = nav_engine_core::returns::calculate_return_statistics(&input.returns)
        .map_err(to_napi_error)?;
    to_json(&stats)
}

#[derive(Deserialize)]
struct SharpeInput {
    return_percent: Decimal,
    #[serde(default = "default_risk_free_rate")]
    risk_free_rate: Decimal,
    std_dev: Decimal,
}

fn default_risk_free_rate() -> Decimal {
    DEFAULT_RISK_FREE_RATE
}

#[napi]
pub fn calculate_sharpe_ratio(input_json: String) -> NapiResult<String> {
    let input: SharpeInput = parse(&input_json)?;
    let sharpe = nav_engine_core::returns::calculate_sharpe_ratio(
        input.return_percent,
        input.risk_free_rate,
        input.std_dev,
    );
    Ok(sharpe.to_string())
}

#[napi]
pub fn calculate_max_drawdown(input_json: String) -> NapiResult<String> {
    let input: SeriesInput = parse(&input_json)?;
    let drawdown = nav_engine_core::returns::calculate_max_drawdown(&input.nav_data)
        .map_err(to_napi_error)?;
    to_json(&drawdown)
}

#[derive(Deserialize)]
struct FundRiskInput {
    nav_data: NavSeries,
    #[serde(default = "default_risk_free_rate")]
    risk_free_rate: Decimal,
}

#[napi]
pub fn calculate_fund_risk(input_json: String) -> NapiResult<String> {
    let input: FundRiskInput = parse(&input_json)?;
    let started = Instant::now();
    let risk = nav_engine_core::returns::calculate_fund_risk(&input.nav_data, input.risk_free_rate)
        .map_err(to_napi_error)?;
    envelope(
        "Monthly return statistics, volatility annualised by sqrt(12), Sharpe on CAGR",
        &serde_json::json!({ "risk_free_rate": input.risk_free_rate }),
        Vec::new(),
        started,
        risk,
    )
}

#[derive(Deserialize)]
struct CompareInput {
    investments: Vec<InvestmentComparisonInput>,
}

#[napi]
pub fn compare_investments(input_json: String) -> NapiResult<String> {
    let input: CompareInput = parse(&input_json)?;
    let ranked = nav_engine_core::returns::compare_investments(&input.investments)
        .map_err(to_napi_error)?;
    to_json(&ranked)
}
