use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::clock::Clock;
use crate::error::NavEngineError;
use crate::month::{generate_month_range, get_current_month_key, key_to_date, MonthKey};
use crate::nav::{fill_missing_nav_data, get_latest_nav, NavSeries};
use crate::types::*;
use crate::NavEngineResult;

/// A one-time investment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lumpsum {
    pub amount: Money,
    pub purchase_month: MonthKey,
}

/// A recurring monthly investment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SipPlan {
    pub monthly_amount: Money,
    pub start_month: MonthKey,
    /// Defaults to the latest month of the NAV series
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_month: Option<MonthKey>,
}

/// NAV history together with the investments made in the fund
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortfolioInput {
    pub nav_data: NavSeries,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sip: Option<SipPlan>,
    #[serde(default)]
    pub lumpsums: Vec<Lumpsum>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LumpsumValuation {
    pub amount_invested: Money,
    pub purchase_month: MonthKey,
    pub purchase_nav: Decimal,
    pub units: Units,
    /// Latest month of the NAV series, the month the holding is valued at
    pub valuation_month: MonthKey,
    pub current_nav: Decimal,
    pub current_value: Money,
    pub absolute_return: Money,
    pub absolute_return_percent: Percent,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SipInstallment {
    pub month: MonthKey,
    pub amount: Money,
    pub nav: Decimal,
    pub units: Units,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SipValuation {
    pub monthly_amount: Money,
    pub start_month: MonthKey,
    pub end_month: MonthKey,
    pub installment_count: usize,
    pub installments: Vec<SipInstallment>,
    pub total_invested: Money,
    pub total_units: Units,
    /// Cost basis: total invested / total units
    pub average_nav: Decimal,
    pub valuation_month: MonthKey,
    pub current_nav: Decimal,
    pub current_value: Money,
    pub absolute_return: Money,
    pub absolute_return_percent: Percent,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MultiLumpsumValuation {
    pub lumpsums: Vec<LumpsumValuation>,
    pub total_invested: Money,
    pub total_units: Units,
    pub valuation_month: MonthKey,
    pub current_nav: Decimal,
    pub current_value: Money,
    pub absolute_return: Money,
    pub absolute_return_percent: Percent,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CombinedValuation {
    pub sip: Option<SipValuation>,
    pub lumpsums: Option<MultiLumpsumValuation>,
    pub total_invested: Money,
    pub total_units: Units,
    pub current_value: Money,
    pub absolute_return: Money,
    pub absolute_return_percent: Percent,
}

fn require_positive(field: &str, value: Money) -> NavEngineResult<()> {
    if value <= Decimal::ZERO {
        return Err(NavEngineError::validation(
            field,
            format!("Amount must be positive, got {value}"),
        ));
    }
    Ok(())
}

/// Gain as a percentage of the amount invested; zero when nothing was invested.
fn gain_percent(invested: Money, gain: Money) -> Percent {
    if invested.is_zero() {
        Decimal::ZERO
    } else {
        round_percent(gain / invested * Decimal::from(100))
    }
}

/// Value a single lumpsum purchase at the latest month of the series.
///
/// When the purchase month has no NAV the series is gap-filled from the
/// purchase month to the current month and the filled value is used.
pub fn calculate_lumpsum_value(
    amount: Money,
    purchase_month: &MonthKey,
    series: &NavSeries,
    clock: &dyn Clock,
) -> NavEngineResult<LumpsumValuation> {
    value_lumpsum(amount, purchase_month, series, clock).map(|p| p.valuation)
}

/// A rounded lumpsum valuation plus the unrounded figures totals are built from.
struct LumpsumPosition {
    valuation: LumpsumValuation,
    units: Units,
    current_value: Money,
}

fn value_lumpsum(
    amount: Money,
    purchase_month: &MonthKey,
    series: &NavSeries,
    clock: &dyn Clock,
) -> NavEngineResult<LumpsumPosition> {
    require_positive("amount", amount)?;
    let latest = get_latest_nav(series)?;

    let purchase_nav = match series.get(purchase_month) {
        Some(nav) => nav,
        None => {
            let current_month = get_current_month_key(clock)?;
            tracing::debug!(
                purchase_month = %purchase_month,
                current_month = %current_month,
                "purchase NAV missing, gap-filling"
            );
            let filled = fill_missing_nav_data(series, purchase_month, &current_month)?;
            filled.get(purchase_month).ok_or_else(|| {
                NavEngineError::data_availability(format!(
                    "No NAV available for purchase month {purchase_month}"
                ))
            })?
        }
    };

    let units = amount / purchase_nav;
    let current_value = units * latest.nav;
    let gain = current_value - amount;

    Ok(LumpsumPosition {
        valuation: LumpsumValuation {
            amount_invested: round_money(amount),
            purchase_month: *purchase_month,
            purchase_nav: round_nav(purchase_nav),
            units: round_units(units),
            valuation_month: latest.month,
            current_nav: latest.nav,
            current_value: round_money(current_value),
            absolute_return: round_money(gain),
            absolute_return_percent: gain_percent(amount, gain),
        },
        units,
        current_value,
    })
}

/// Value a SIP: one purchase of `monthly_amount` in every month from
/// `start_month` to `end_month` (or the series' latest month).
pub fn calculate_sip_value(
    monthly_amount: Money,
    start_month: &MonthKey,
    series: &NavSeries,
    end_month: Option<&MonthKey>,
) -> NavEngineResult<SipValuation> {
    require_positive("monthly_amount", monthly_amount)?;
    let latest = get_latest_nav(series)?;
    let end = end_month.copied().unwrap_or(latest.month);
    let months = generate_month_range(start_month, &end)?;

    if *start_month > latest.month {
        return Err(NavEngineError::data_availability(format!(
            "SIP starts at {start_month}, after the latest NAV month {}",
            latest.month
        )));
    }
    let filled = fill_missing_nav_data(series, start_month, &latest.month)?;

    let mut installments = Vec::with_capacity(months.len());
    let mut total_units = Decimal::ZERO;
    for month in months {
        let nav = filled.get(&month).ok_or_else(|| {
            NavEngineError::data_availability(format!("No NAV available for SIP installment {month}"))
        })?;
        let units = monthly_amount / nav;
        total_units += units;
        installments.push(SipInstallment {
            month,
            amount: round_money(monthly_amount),
            nav: round_nav(nav),
            units: round_units(units),
        });
    }

    let installment_count = installments.len();
    let total_invested = monthly_amount * Decimal::from(installment_count as i64);
    let average_nav = total_invested / total_units;
    let current_value = total_units * latest.nav;
    let gain = current_value - total_invested;

    Ok(SipValuation {
        monthly_amount: round_money(monthly_amount),
        start_month: *start_month,
        end_month: end,
        installment_count,
        installments,
        total_invested: round_money(total_invested),
        total_units: round_units(total_units),
        average_nav: round_money(average_nav),
        valuation_month: latest.month,
        current_nav: latest.nav,
        current_value: round_money(current_value),
        absolute_return: round_money(gain),
        absolute_return_percent: gain_percent(total_invested, gain),
    })
}

pub fn calculate_multiple_lumpsums(
    lumpsums: &[Lumpsum],
    series: &NavSeries,
    clock: &dyn Clock,
) -> NavEngineResult<MultiLumpsumValuation> {
    if lumpsums.is_empty() {
        return Err(NavEngineError::validation(
            "lumpsums",
            "At least one lumpsum is required",
        ));
    }
    let latest = get_latest_nav(series)?;

    let positions = lumpsums
        .iter()
        .map(|l| value_lumpsum(l.amount, &l.purchase_month, series, clock))
        .collect::<NavEngineResult<Vec<_>>>()?;

    let total_invested: Money = lumpsums.iter().map(|l| l.amount).sum();
    let total_units: Units = positions.iter().map(|p| p.units).sum();
    let current_value: Money = total_units * latest.nav;
    let gain = current_value - total_invested;

    Ok(MultiLumpsumValuation {
        lumpsums: positions.into_iter().map(|p| p.valuation).collect(),
        total_invested: round_money(total_invested),
        total_units: round_units(total_units),
        valuation_month: latest.month,
        current_nav: latest.nav,
        current_value: round_money(current_value),
        absolute_return: round_money(gain),
        absolute_return_percent: gain_percent(total_invested, gain),
    })
}

/// Value a SIP and any lumpsums held in the same fund together.
pub fn calculate_combined_value(
    sip: Option<&SipPlan>,
    lumpsums: Option<&[Lumpsum]>,
    series: &NavSeries,
    clock: &dyn Clock,
) -> NavEngineResult<CombinedValuation> {
    let lumpsums = lumpsums.filter(|l| !l.is_empty());
    if sip.is_none() && lumpsums.is_none() {
        return Err(NavEngineError::validation(
            "investments",
            "Provide a SIP plan, lumpsums, or both",
        ));
    }

    let sip_value = sip
        .map(|plan| {
            calculate_sip_value(
                plan.monthly_amount,
                &plan.start_month,
                series,
                plan.end_month.as_ref(),
            )
        })
        .transpose()?;
    let lumpsum_value = lumpsums
        .map(|l| calculate_multiple_lumpsums(l, series, clock))
        .transpose()?;

    let mut total_invested = Decimal::ZERO;
    let mut total_units = Decimal::ZERO;
    let mut current_value = Decimal::ZERO;
    if let Some(ref s) = sip_value {
        total_invested += s.total_invested;
        total_units += s.total_units;
        current_value += s.current_value;
    }
    if let Some(ref l) = lumpsum_value {
        total_invested += l.total_invested;
        total_units += l.total_units;
        current_value += l.current_value;
    }
    let gain = current_value - total_invested;

    Ok(CombinedValuation {
        sip: sip_value,
        lumpsums: lumpsum_value,
        total_invested: round_money(total_invested),
        total_units: round_units(total_units),
        current_value: round_money(current_value),
        absolute_return: round_money(gain),
        absolute_return_percent: gain_percent(total_invested, gain),
    })
}

/// Dated cash flows for XIRR: an outflow per SIP installment and per
/// lumpsum, then a single inflow of the combined value at the latest NAV
/// month. Sorted by date.
pub fn generate_cash_flows(
    sip: Option<&SipPlan>,
    lumpsums: Option<&[Lumpsum]>,
    series: &NavSeries,
    clock: &dyn Clock,
) -> NavEngineResult<Vec<CashFlow>> {
    let combined = calculate_combined_value(sip, lumpsums, series, clock)?;
    let latest = get_latest_nav(series)?;

    let mut flows = Vec::new();
    if let Some(ref s) = combined.sip {
        for inst in &s.installments {
            flows.push(CashFlow::labelled(
                key_to_date(&inst.month)?,
                -inst.amount,
                format!("SIP {}", inst.month),
            ));
        }
    }
    if let Some(ref l) = combined.lumpsums {
        for lump in &l.lumpsums {
            flows.push(CashFlow::labelled(
                key_to_date(&lump.purchase_month)?,
                -lump.amount_invested,
                format!("Lumpsum {}", lump.purchase_month),
            ));
        }
    }
    flows.push(CashFlow::labelled(
        key_to_date(&latest.month)?,
        combined.current_value,
        "Current value",
    ));

    flows.sort_by_key(|cf| cf.date);
    Ok(flows)
}
