use chrono::{Months, NaiveDate};
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;
use rust_decimal::MathematicalOps;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::error::NavEngineError;
use crate::month::{date_to_key, key_to_date, years_between, MonthKey};
use crate::nav::{get_latest_nav, NavPoint, NavSeries};
use crate::types::*;
use crate::NavEngineResult;

/// Annual risk-free rate, in percent, used when the caller has no better figure
pub const DEFAULT_RISK_FREE_RATE: Percent = dec!(6);

/// Sentinel CAGR for a total loss
const TOTAL_LOSS: Percent = dec!(-100);

const MIN_XIRR_RATE: f64 = -0.99;
const MAX_XIRR_RATE: f64 = 10.0;
const FLAT_SLOPE: f64 = 1e-10;
const DAYS_PER_YEAR: f64 = 365.25;

// ---------------------------------------------------------------------------
// Point-to-point returns
// ---------------------------------------------------------------------------

/// Simple return from `initial` to `final_value`, in percent.
pub fn calculate_absolute_return(initial: Money, final_value: Money) -> NavEngineResult<Percent> {
    if initial <= Decimal::ZERO {
        return Err(NavEngineError::validation(
            "initial",
            format!("Initial value must be positive, got {initial}"),
        ));
    }
    Ok(round_percent(
        (final_value - initial) / initial * Decimal::from(100),
    ))
}

/// Compound annual growth rate, in percent.
///
/// A non-positive final value is a total loss and returns exactly -100
/// without attempting a fractional power of a non-positive base.
pub fn calculate_cagr(initial: Money, final_value: Money, years: Years) -> NavEngineResult<Percent> {
    if initial <= Decimal::ZERO {
        return Err(NavEngineError::validation(
            "initial",
            format!("Initial value must be positive, got {initial}"),
        ));
    }
    if years <= Decimal::ZERO {
        return Err(NavEngineError::validation(
            "years",
            format!("Holding period must be positive, got {years}"),
        ));
    }
    if final_value <= Decimal::ZERO {
        return Ok(TOTAL_LOSS);
    }

    let ratio = final_value / initial;
    let exponent = Decimal::ONE / years;
    let cagr = ratio
        .checked_powd(exponent)
        .and_then(|growth| (growth - Decimal::ONE).checked_mul(Decimal::from(100)))
        .unwrap_or_else(|| saturating_cagr(ratio, exponent));
    Ok(round_percent(cagr))
}

/// CAGR in percent through f64 when the Decimal power overflows, pinned to
/// `Decimal::MAX` once the result leaves the Decimal range.
fn saturating_cagr(ratio: Decimal, exponent: Decimal) -> Percent {
    let percent = match (ratio.to_f64(), exponent.to_f64()) {
        (Some(r), Some(e)) => (r.powf(e) - 1.0) * 100.0,
        _ => f64::INFINITY,
    };
    let cagr = Decimal::from_f64(percent).unwrap_or(Decimal::MAX);
    tracing::debug!(%ratio, %exponent, %cagr, "CAGR exceeded Decimal power range");
    cagr
}

/// CAGR between the NAVs of two months of the series.
pub fn calculate_nav_cagr(
    series: &NavSeries,
    start: &MonthKey,
    end: &MonthKey,
) -> NavEngineResult<Percent> {
    let start_nav = series.get(start).ok_or_else(|| {
        NavEngineError::data_availability(format!("No NAV for CAGR start month {start}"))
    })?;
    let end_nav = series.get(end).ok_or_else(|| {
        NavEngineError::data_availability(format!("No NAV for CAGR end month {end}"))
    })?;

    let years = years_between(start, end);
    if years <= Decimal::ZERO {
        return Ok(Decimal::ZERO);
    }
    calculate_cagr(start_nav, end_nav, years)
}

// ---------------------------------------------------------------------------
// Trailing and rolling returns
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrailingWindow {
    OneMonth,
    ThreeMonths,
    SixMonths,
    OneYear,
}

impl TrailingWindow {
    pub const ALL: [TrailingWindow; 4] = [
        TrailingWindow::OneMonth,
        TrailingWindow::ThreeMonths,
        TrailingWindow::SixMonths,
        TrailingWindow::OneYear,
    ];

    pub fn months(&self) -> u32 {
        match self {
            TrailingWindow::OneMonth => 1,
            TrailingWindow::ThreeMonths => 3,
            TrailingWindow::SixMonths => 6,
            TrailingWindow::OneYear => 12,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrailingReturn {
    pub start_month: MonthKey,
    pub end_month: MonthKey,
    pub start_nav: Decimal,
    pub end_nav: Decimal,
    pub absolute_return: Percent,
    /// Sub-year windows are annualised; the one-year window repeats the absolute return
    pub annualized_return: Percent,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrailingReturns {
    pub as_of: MonthKey,
    pub one_month: Option<TrailingReturn>,
    pub three_months: Option<TrailingReturn>,
    pub six_months: Option<TrailingReturn>,
    pub one_year: Option<TrailingReturn>,
}

impl TrailingReturns {
    pub fn get(&self, window: TrailingWindow) -> Option<&TrailingReturn> {
        match window {
            TrailingWindow::OneMonth => self.one_month.as_ref(),
            TrailingWindow::ThreeMonths => self.three_months.as_ref(),
            TrailingWindow::SixMonths => self.six_months.as_ref(),
            TrailingWindow::OneYear => self.one_year.as_ref(),
        }
    }
}

/// 1M/3M/6M/1Y returns ending at the latest month of the series.
///
/// Window starts are found by calendar-month subtraction from the first day
/// of the latest month. A window whose start month has no NAV, or whose
/// return cannot be computed, is `None` without affecting the others.
pub fn calculate_trailing_returns(series: &NavSeries) -> NavEngineResult<TrailingReturns> {
    let latest = get_latest_nav(series)?;
    let latest_date = key_to_date(&latest.month)?;

    let window = |w: TrailingWindow| -> Option<TrailingReturn> {
        match trailing_window(series, &latest, latest_date, w) {
            Ok(result) => result,
            Err(e) => {
                tracing::warn!(months = w.months(), error = %e, "trailing window skipped");
                None
            }
        }
    };

    Ok(TrailingReturns {
        as_of: latest.month,
        one_month: window(TrailingWindow::OneMonth),
        three_months: window(TrailingWindow::ThreeMonths),
        six_months: window(TrailingWindow::SixMonths),
        one_year: window(TrailingWindow::OneYear),
    })
}

fn trailing_window(
    series: &NavSeries,
    latest: &NavPoint,
    latest_date: NaiveDate,
    w: TrailingWindow,
) -> NavEngineResult<Option<TrailingReturn>> {
    let start_month = match latest_date
        .checked_sub_months(Months::new(w.months()))
        .and_then(|d| date_to_key(d).ok())
    {
        Some(m) => m,
        None => return Ok(None),
    };
    let start_nav = match series.get(&start_month) {
        Some(nav) => nav,
        None => return Ok(None),
    };

    let absolute_return = calculate_absolute_return(start_nav, latest.nav)?;
    let annualized_return = if w.months() < 12 {
        let years = Decimal::from(w.months()) / Decimal::from(12);
        calculate_cagr(start_nav, latest.nav, years)?
    } else {
        absolute_return
    };

    Ok(Some(TrailingReturn {
        start_month,
        end_month: latest.month,
        start_nav,
        end_nav: latest.nav,
        absolute_return,
        annualized_return,
    }))
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RollingReturn {
    pub start_month: MonthKey,
    pub end_month: MonthKey,
    pub start_nav: Decimal,
    pub end_nav: Decimal,
    pub return_percent: Percent,
}

/// Absolute return over every window of `window_months` consecutive series
/// entries. Windows step over entry positions, not calendar months.
pub fn calculate_rolling_returns(
    series: &NavSeries,
    window_months: usize,
) -> NavEngineResult<Vec<RollingReturn>> {
    if window_months < 1 {
        return Err(NavEngineError::validation(
            "window_months",
            "Rolling window must be at least 1 month",
        ));
    }

    let entries: Vec<(MonthKey, Decimal)> = series.iter().map(|(m, n)| (*m, *n)).collect();
    if entries.len() <= window_months {
        return Ok(Vec::new());
    }

    (0..entries.len() - window_months)
        .map(|i| {
            let (start_month, start_nav) = entries[i];
            let (end_month, end_nav) = entries[i + window_months];
            Ok(RollingReturn {
                start_month,
                end_month,
                start_nav,
                end_nav,
                return_percent: calculate_absolute_return(start_nav, end_nav)?,
            })
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthlyReturn {
    pub month: MonthKey,
    pub return_percent: Percent,
}

/// Percentage change between each pair of consecutive series entries,
/// labelled with the later month.
pub fn calculate_monthly_returns(series: &NavSeries) -> NavEngineResult<Vec<MonthlyReturn>> {
    let entries: Vec<(MonthKey, Decimal)> = series.iter().map(|(m, n)| (*m, *n)).collect();
    entries
        .windows(2)
        .map(|pair| {
            Ok(MonthlyReturn {
                month: pair[1].0,
                return_percent: calculate_absolute_return(pair[0].1, pair[1].1)?,
            })
        })
        .collect()
}

// ---------------------------------------------------------------------------
// XIRR
// ---------------------------------------------------------------------------

/// Newton-Raphson settings for XIRR. Passed per call.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct XirrConfig {
    /// Starting rate as a decimal (0.1 = 10%)
    pub guess: Decimal,
    /// Convergence threshold on |NPV|
    pub tolerance: Decimal,
    pub max_iterations: u32,
}

impl Default for XirrConfig {
    fn default() -> Self {
        XirrConfig {
            guess: dec!(0.1),
            tolerance: dec!(0.0001),
            max_iterations: 100,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum XirrStopReason {
    Converged,
    /// NPV slope vanished; the last rate is returned
    FlatDerivative,
    IterationLimit,
    /// NPV left the finite range at the current rate
    NumericOverflow,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct XirrResult {
    /// Annualised rate in percent
    pub xirr: Percent,
    /// Unrounded annualised rate as a decimal
    pub rate: Decimal,
    pub converged: bool,
    pub stop_reason: XirrStopReason,
    pub iterations: u32,
    /// NPV at the returned rate; `None` when it is not finite
    pub residual: Option<Decimal>,
}

/// Money-weighted annual return of dated cash flows.
///
/// Solves `sum(a_i / (1 + r)^t_i) = 0` by Newton-Raphson, where `t_i` is the
/// offset in years (365.25 days) from the earliest flow. A step that would
/// leave (-0.99, 10) moves halfway from the current rate to the bound
/// instead. When the solver stops without meeting the tolerance the best
/// estimate is returned with `converged == false`.
pub fn calculate_xirr(cash_flows: &[CashFlow], config: &XirrConfig) -> NavEngineResult<XirrResult> {
    if cash_flows.len() < 2 {
        return Err(NavEngineError::validation(
            "cash_flows",
            "XIRR requires at least 2 cash flows",
        ));
    }
    if !cash_flows.iter().any(|cf| cf.amount < Decimal::ZERO) {
        return Err(NavEngineError::validation(
            "cash_flows",
            "XIRR requires at least one negative (investment) cash flow",
        ));
    }
    if !cash_flows.iter().any(|cf| cf.amount > Decimal::ZERO) {
        return Err(NavEngineError::validation(
            "cash_flows",
            "XIRR requires at least one positive (valuation) cash flow",
        ));
    }

    let guess = to_f64("guess", config.guess)?;
    if guess <= MIN_XIRR_RATE || guess >= MAX_XIRR_RATE {
        return Err(NavEngineError::validation(
            "guess",
            format!("Initial guess {} must lie in (-0.99, 10)", config.guess),
        ));
    }
    let tolerance = to_f64("tolerance", config.tolerance)?;
    if tolerance <= 0.0 {
        return Err(NavEngineError::validation(
            "tolerance",
            "Tolerance must be positive",
        ));
    }

    let mut flows = cash_flows.to_vec();
    flows.sort_by_key(|cf| cf.date);
    let base_date = flows[0].date;
    let points = flows
        .iter()
        .map(|cf| {
            let years = (cf.date - base_date).num_days() as f64 / DAYS_PER_YEAR;
            Ok((years, to_f64("amount", cf.amount)?))
        })
        .collect::<NavEngineResult<Vec<(f64, f64)>>>()?;

    let mut rate = guess;
    let mut residual = f64::NAN;
    let mut iterations = 0;
    let mut stop_reason = XirrStopReason::IterationLimit;

    while iterations < config.max_iterations {
        iterations += 1;
        let (npv, slope) = npv_and_slope(&points, rate);
        if !npv.is_finite() || !slope.is_finite() {
            stop_reason = XirrStopReason::NumericOverflow;
            break;
        }
        residual = npv;

        if npv.abs() < tolerance {
            stop_reason = XirrStopReason::Converged;
            break;
        }
        if slope.abs() < FLAT_SLOPE {
            stop_reason = XirrStopReason::FlatDerivative;
            break;
        }

        rate = step_within_bounds(rate, rate - npv / slope);
    }

    if stop_reason == XirrStopReason::IterationLimit {
        let (npv, _) = npv_and_slope(&points, rate);
        if npv.is_finite() {
            residual = npv;
        }
    }

    let converged = stop_reason == XirrStopReason::Converged;
    if !converged {
        tracing::warn!(
            rate,
            residual,
            iterations,
            reason = ?stop_reason,
            "XIRR did not converge; returning best estimate"
        );
    }

    let rate_dec = Decimal::from_f64(rate).ok_or_else(|| NavEngineError::NumericOverflow {
        context: format!("XIRR rate {rate} is not representable"),
    })?;
    Ok(XirrResult {
        xirr: round_percent(rate_dec * Decimal::from(100)),
        rate: rate_dec,
        converged,
        stop_reason,
        iterations,
        residual: residual_at(residual),
    })
}

fn residual_at(npv: f64) -> Option<Decimal> {
    if npv.is_finite() {
        Decimal::from_f64(npv)
    } else {
        None
    }
}

/// NPV and its derivative with respect to the rate.
fn npv_and_slope(points: &[(f64, f64)], rate: f64) -> (f64, f64) {
    let base = 1.0 + rate;
    points.iter().fold((0.0, 0.0), |(npv, slope), &(years, amount)| {
        let discount = base.powf(years);
        (
            npv + amount / discount,
            slope - years * amount / (discount * base),
        )
    })
}

/// Accept `proposed` if it stays inside the rate bounds, otherwise move
/// halfway from `current` to the bound it would have crossed.
fn step_within_bounds(current: f64, proposed: f64) -> f64 {
    if proposed <= MIN_XIRR_RATE {
        (current + MIN_XIRR_RATE) / 2.0
    } else if proposed >= MAX_XIRR_RATE {
        (current + MAX_XIRR_RATE) / 2.0
    } else {
        proposed
    }
}

fn to_f64(field: &str, value: Decimal) -> NavEngineResult<f64> {
    value.to_f64().ok_or_else(|| {
        NavEngineError::validation(field, format!("{value} cannot be represented as f64"))
    })
}

/// Closed-form XIRR estimate for a SIP, treating the whole investment as
/// held for the average installment holding period.
pub fn approximate_sip_xirr(
    monthly_amount: Money,
    total_months: i64,
    current_value: Money,
) -> NavEngineResult<Percent> {
    if monthly_amount <= Decimal::ZERO {
        return Err(NavEngineError::validation(
            "monthly_amount",
            format!("Monthly amount must be positive, got {monthly_amount}"),
        ));
    }
    if total_months <= 0 {
        return Err(NavEngineError::validation(
            "total_months",
            format!("Total months must be positive, got {total_months}"),
        ));
    }
    if current_value <= Decimal::ZERO {
        return Ok(TOTAL_LOSS);
    }

    let total_invested = monthly_amount * Decimal::from(total_months);
    let average_years = Decimal::from(total_months + 1) / Decimal::from(24);
    calculate_cagr(total_invested, current_value, average_years)
}

// ---------------------------------------------------------------------------
// Statistics and risk
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReturnStatistics {
    pub count: usize,
    pub min: Percent,
    pub max: Percent,
    pub mean: Percent,
    pub median: Percent,
    /// Population standard deviation
    pub std_dev: Percent,
}

struct RawStatistics {
    min: Decimal,
    max: Decimal,
    mean: Decimal,
    median: Decimal,
    std_dev: Decimal,
}

fn describe(values: &[Decimal]) -> NavEngineResult<RawStatistics> {
    if values.is_empty() {
        return Err(NavEngineError::validation(
            "returns",
            "At least one return is required for statistics",
        ));
    }

    let mut sorted = values.to_vec();
    sorted.sort();
    let n = sorted.len();
    let n_dec = Decimal::from(n as i64);

    let mean = sorted.iter().sum::<Decimal>() / n_dec;
    let median = if n % 2 == 0 {
        (sorted[n / 2 - 1] + sorted[n / 2]) / dec!(2)
    } else {
        sorted[n / 2]
    };
    let variance = sorted.iter().map(|x| (x - mean) * (x - mean)).sum::<Decimal>() / n_dec;

    Ok(RawStatistics {
        min: sorted[0],
        max: sorted[n - 1],
        mean,
        median,
        std_dev: sqrt_decimal(variance),
    })
}

pub fn calculate_return_statistics(returns: &[Decimal]) -> NavEngineResult<ReturnStatistics> {
    let raw = describe(returns)?;
    Ok(ReturnStatistics {
        count: returns.len(),
        min: round_percent(raw.min),
        max: round_percent(raw.max),
        mean: round_percent(raw.mean),
        median: round_percent(raw.median),
        std_dev: round_percent(raw.std_dev),
    })
}

/// Excess return per unit of volatility; zero when there is no volatility.
pub fn calculate_sharpe_ratio(
    return_percent: Percent,
    risk_free_rate: Percent,
    std_dev: Percent,
) -> Decimal {
    if std_dev <= Decimal::ZERO {
        return Decimal::ZERO;
    }
    round_to((return_percent - risk_free_rate) / std_dev, CURRENCY_DP)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Drawdown {
    /// Largest peak-to-trough fall, as a positive percentage
    pub max_drawdown: Percent,
    pub peak_month: Option<MonthKey>,
    pub trough_month: Option<MonthKey>,
}

pub fn calculate_max_drawdown(series: &NavSeries) -> NavEngineResult<Drawdown> {
    let first = series.first().ok_or_else(|| {
        NavEngineError::data_availability("NAV history is empty; no drawdown available")
    })?;

    let mut peak = first;
    let mut worst = Decimal::ZERO;
    let mut worst_span: Option<(MonthKey, MonthKey)> = None;
    for (month, nav) in series.iter() {
        if *nav > peak.nav {
            peak = NavPoint {
                month: *month,
                nav: *nav,
            };
            continue;
        }
        let fall = (peak.nav - nav) / peak.nav;
        if fall > worst {
            worst = fall;
            worst_span = Some((peak.month, *month));
        }
    }

    Ok(Drawdown {
        max_drawdown: round_percent(worst * Decimal::from(100)),
        peak_month: worst_span.map(|(p, _)| p),
        trough_month: worst_span.map(|(_, t)| t),
    })
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FundRisk {
    pub start_month: MonthKey,
    pub end_month: MonthKey,
    pub monthly_statistics: ReturnStatistics,
    pub annualized_volatility: Percent,
    pub cagr: Percent,
    pub risk_free_rate: Percent,
    pub sharpe_ratio: Decimal,
    pub drawdown: Drawdown,
}

/// Volatility, CAGR, Sharpe and drawdown of a fund's own NAV history.
pub fn calculate_fund_risk(series: &NavSeries, risk_free_rate: Percent) -> NavEngineResult<FundRisk> {
    let (first, last) = match (series.first(), series.last()) {
        (Some(f), Some(l)) if series.len() >= 2 => (f, l),
        _ => {
            return Err(NavEngineError::data_availability(
                "At least 2 NAV points are required for risk metrics",
            ))
        }
    };

    let monthly: Vec<Decimal> = calculate_monthly_returns(series)?
        .into_iter()
        .map(|r| r.return_percent)
        .collect();
    let raw = describe(&monthly)?;
    let annualized_volatility = raw.std_dev * sqrt_decimal(Decimal::from(12));
    let cagr = calculate_nav_cagr(series, &first.month, &last.month)?;

    Ok(FundRisk {
        start_month: first.month,
        end_month: last.month,
        monthly_statistics: calculate_return_statistics(&monthly)?,
        annualized_volatility: round_percent(annualized_volatility),
        cagr,
        risk_free_rate,
        sharpe_ratio: calculate_sharpe_ratio(cagr, risk_free_rate, annualized_volatility),
        drawdown: calculate_max_drawdown(series)?,
    })
}

fn sqrt_decimal(val: Decimal) -> Decimal {
    if val <= Decimal::ZERO {
        return Decimal::ZERO;
    }
    val.sqrt().unwrap_or(Decimal::ZERO)
}

// ---------------------------------------------------------------------------
// Ranking
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvestmentComparisonInput {
    pub name: String,
    pub initial_value: Money,
    pub final_value: Money,
    pub years: Years,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedInvestment {
    pub rank: u32,
    pub name: String,
    pub initial_value: Money,
    pub final_value: Money,
    pub years: Years,
    pub absolute_return: Percent,
    pub cagr: Percent,
}

/// Rank investments by CAGR, best first. Equal CAGRs share a rank and the
/// next distinct CAGR takes the following rank.
pub fn compare_investments(
    investments: &[InvestmentComparisonInput],
) -> NavEngineResult<Vec<RankedInvestment>> {
    let mut ranked = investments
        .iter()
        .map(|inv| {
            Ok(RankedInvestment {
                rank: 0,
                name: inv.name.clone(),
                initial_value: inv.initial_value,
                final_value: inv.final_value,
                years: inv.years,
                absolute_return: calculate_absolute_return(inv.initial_value, inv.final_value)?,
                cagr: calculate_cagr(inv.initial_value, inv.final_value, inv.years)?,
            })
        })
        .collect::<NavEngineResult<Vec<_>>>()?;

    ranked.sort_by(|a, b| b.cagr.cmp(&a.cagr));

    let mut rank = 0;
    let mut previous: Option<Decimal> = None;
    for entry in ranked.iter_mut() {
        if previous != Some(entry.cagr) {
            rank += 1;
            previous = Some(entry.cagr);
        }
        entry.rank = rank;
    }
    Ok(ranked)
}
