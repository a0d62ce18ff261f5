use clap::Args;
use rust_decimal::Decimal;
use serde_json::json;
use std::time::Instant;

use nav_engine_core::returns::approximate_sip_xirr;
use nav_engine_core::valuation::{
    calculate_combined_value, calculate_lumpsum_value, calculate_sip_value, generate_cash_flows,
    PortfolioInput,
};
use nav_engine_core::{Clock, MonthKey};

use super::{envelope, read_series, CommandResult};
use crate::input;

#[derive(Args)]
pub struct LumpsumArgs {
    /// Path to a JSON NAV history (or pipe it on stdin)
    #[arg(long)]
    pub input: Option<String>,

    /// Amount invested
    #[arg(long)]
    pub amount: Decimal,

    /// Month of purchase (YYYY-MM)
    #[arg(long)]
    pub purchase_month: MonthKey,
}

pub fn run_lumpsum(args: LumpsumArgs, clock: &dyn Clock) -> CommandResult {
    let series = read_series(args.input.as_deref())?;
    let started = Instant::now();
    let valuation = calculate_lumpsum_value(args.amount, &args.purchase_month, &series, clock)?;

    let mut warnings = Vec::new();
    if !series.contains(&args.purchase_month) {
        warnings.push(format!(
            "No NAV recorded for {}; purchase NAV was gap-filled",
            args.purchase_month
        ));
    }

    envelope(
        "Units bought at purchase NAV, valued at the latest NAV",
        &json!({ "amount": args.amount, "purchase_month": args.purchase_month }),
        warnings,
        started,
        valuation,
    )
}

#[derive(Args)]
pub struct SipArgs {
    #[arg(long)]
    pub input: Option<String>,

    /// Amount invested every month
    #[arg(long)]
    pub monthly_amount: Decimal,

    /// First installment month (YYYY-MM)
    #[arg(long)]
    pub start_month: MonthKey,

    /// Last installment month (defaults to the latest NAV month)
    #[arg(long)]
    pub end_month: Option<MonthKey>,
}

pub fn run_sip(args: SipArgs) -> CommandResult {
    let series = read_series(args.input.as_deref())?;
    let started = Instant::now();
    let valuation = calculate_sip_value(
        args.monthly_amount,
        &args.start_month,
        &series,
        args.end_month.as_ref(),
    )?;

    let mut warnings = Vec::new();
    let filled = valuation
        .installments
        .iter()
        .filter(|i| !series.contains(&i.month))
        .count();
    if filled > 0 {
        warnings.push(format!("{filled} installment NAVs were gap-filled"));
    }

    let approximate_xirr = approximate_sip_xirr(
        args.monthly_amount,
        valuation.installment_count as i64,
        valuation.current_value,
    )?;

    envelope(
        "One installment per month with a recorded NAV, valued at the latest NAV",
        &json!({
            "monthly_amount": args.monthly_amount,
            "start_month": args.start_month,
            "end_month": args.end_month,
        }),
        warnings,
        started,
        json!({ "valuation": valuation, "approximate_xirr": approximate_xirr }),
    )
}

#[derive(Args)]
pub struct PortfolioArgs {
    /// Path to a JSON portfolio: `nav_data`, optional `sip`, optional `lumpsums`
    #[arg(long)]
    pub input: Option<String>,
}

pub fn run_combined(args: PortfolioArgs, clock: &dyn Clock) -> CommandResult {
    let portfolio: PortfolioInput = input::read_input(args.input.as_deref(), "portfolio")?;
    let started = Instant::now();
    let valuation = calculate_combined_value(
        portfolio.sip.as_ref(),
        Some(portfolio.lumpsums.as_slice()),
        &portfolio.nav_data,
        clock,
    )?;

    envelope(
        "SIP and lumpsum holdings valued separately and summed",
        &json!({
            "has_sip": portfolio.sip.is_some(),
            "lumpsum_count": portfolio.lumpsums.len(),
        }),
        Vec::new(),
        started,
        valuation,
    )
}

pub fn run_cash_flows(args: PortfolioArgs, clock: &dyn Clock) -> CommandResult {
    let portfolio: PortfolioInput = input::read_input(args.input.as_deref(), "portfolio")?;
    let started = Instant::now();
    let flows = generate_cash_flows(
        portfolio.sip.as_ref(),
        Some(portfolio.lumpsums.as_slice()),
        &portfolio.nav_data,
        clock,
    )?;

    envelope(
        "Investments as outflows on the first of their month, current value as the final inflow",
        &json!({ "flows": flows.len() }),
        Vec::new(),
        started,
        flows,
    )
}
