use clap::Args;
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::json;
use std::time::Instant;

use nav_engine_core::nav::get_nav_range;
use nav_engine_core::returns::{
    calculate_absolute_return, calculate_cagr, calculate_fund_risk, calculate_max_drawdown,
    calculate_nav_cagr, calculate_return_statistics, calculate_rolling_returns,
    calculate_sharpe_ratio, calculate_trailing_returns, calculate_xirr, compare_investments,
    InvestmentComparisonInput, TrailingWindow, XirrConfig, DEFAULT_RISK_FREE_RATE,
};
use nav_engine_core::valuation::{generate_cash_flows, PortfolioInput};
use nav_engine_core::{CashFlow, Clock, MonthKey};

use super::{envelope, read_series, CommandResult};
use crate::input;

/// Either explicit dated flows or a portfolio to derive them from.
#[derive(Deserialize)]
#[serde(untagged)]
enum XirrInput {
    Flows {
        cash_flows: Vec<CashFlow>,
        #[serde(default)]
        config: Option<XirrConfig>,
    },
    Portfolio(PortfolioInput),
}

#[derive(Args)]
pub struct XirrArgs {
    /// JSON with `cash_flows` (and optional `config`) or a portfolio
    #[arg(long)]
    pub input: Option<String>,

    /// Initial rate guess as a decimal (0.1 = 10%)
    #[arg(long, allow_hyphen_values = true)]
    pub guess: Option<Decimal>,

    /// Convergence threshold on |NPV|
    #[arg(long)]
    pub tolerance: Option<Decimal>,

    #[arg(long)]
    pub max_iterations: Option<u32>,
}

pub fn run_xirr(args: XirrArgs, clock: &dyn Clock) -> CommandResult {
    let xirr_input: XirrInput = input::read_input(args.input.as_deref(), "cash flows")?;
    let started = Instant::now();

    let (flows, base_config) = match xirr_input {
        XirrInput::Flows { cash_flows, config } => (cash_flows, config.unwrap_or_default()),
        XirrInput::Portfolio(p) => {
            let flows = generate_cash_flows(
                p.sip.as_ref(),
                Some(p.lumpsums.as_slice()),
                &p.nav_data,
                clock,
            )?;
            (flows, XirrConfig::default())
        }
    };
    let config = XirrConfig {
        guess: args.guess.unwrap_or(base_config.guess),
        tolerance: args.tolerance.unwrap_or(base_config.tolerance),
        max_iterations: args.max_iterations.unwrap_or(base_config.max_iterations),
    };

    let result = calculate_xirr(&flows, &config)?;
    let mut warnings = Vec::new();
    if !result.converged {
        let residual = result
            .residual
            .map_or_else(|| "not finite".to_string(), |r| r.to_string());
        warnings.push(format!(
            "XIRR did not converge ({:?} after {} iterations, residual {}); best estimate reported",
            result.stop_reason, result.iterations, residual
        ));
    }

    envelope(
        "Newton-Raphson on NPV with 365.25-day years",
        &config,
        warnings,
        started,
        result,
    )
}

#[derive(Args)]
pub struct CagrArgs {
    /// NAV history; used when the value flags are not given
    #[arg(long)]
    pub input: Option<String>,

    /// Starting value
    #[arg(long)]
    pub initial: Option<Decimal>,

    /// Ending value
    #[arg(long, allow_hyphen_values = true)]
    pub final_value: Option<Decimal>,

    /// Holding period in years
    #[arg(long)]
    pub years: Option<Decimal>,

    /// Start month for a NAV-based CAGR (defaults to the earliest NAV)
    #[arg(long)]
    pub start: Option<MonthKey>,

    /// End month for a NAV-based CAGR (defaults to the latest NAV)
    #[arg(long)]
    pub end: Option<MonthKey>,
}

pub fn run_cagr(args: CagrArgs) -> CommandResult {
    if let (Some(initial), Some(final_value)) = (args.initial, args.final_value) {
        let years = args
            .years
            .ok_or("--years is required with --initial and --final-value")?;
        let started = Instant::now();
        let cagr = calculate_cagr(initial, final_value, years)?;
        let absolute_return = calculate_absolute_return(initial, final_value)?;
        return envelope(
            "(final / initial)^(1 / years) - 1",
            &json!({ "initial": initial, "final_value": final_value, "years": years }),
            Vec::new(),
            started,
            json!({ "cagr": cagr, "absolute_return": absolute_return }),
        );
    }

    let series = read_series(args.input.as_deref())?;
    let started = Instant::now();
    let range = get_nav_range(&series)?;
    let start = args.start.unwrap_or(range.start);
    let end = args.end.unwrap_or(range.end);
    let cagr = calculate_nav_cagr(&series, &start, &end)?;

    envelope(
        "CAGR between the NAVs of two months",
        &json!({ "start": start, "end": end }),
        Vec::new(),
        started,
        json!({ "start_month": start, "end_month": end, "cagr": cagr }),
    )
}

#[derive(Args)]
pub struct SeriesArgs {
    /// Path to a JSON NAV history (or pipe it on stdin)
    #[arg(long)]
    pub input: Option<String>,
}

pub fn run_trailing(args: SeriesArgs) -> CommandResult {
    let series = read_series(args.input.as_deref())?;
    let started = Instant::now();
    let trailing = calculate_trailing_returns(&series)?;

    let mut warnings = Vec::new();
    let unavailable: Vec<String> = TrailingWindow::ALL
        .iter()
        .filter(|w| trailing.get(**w).is_none())
        .map(|w| format!("{}m", w.months()))
        .collect();
    if !unavailable.is_empty() {
        warnings.push(format!(
            "No NAV at the start of the {} window(s)",
            unavailable.join(", ")
        ));
    }

    envelope(
        "Point-to-point returns ending at the latest NAV month",
        &json!({ "as_of": trailing.as_of }),
        warnings,
        started,
        trailing,
    )
}

#[derive(Args)]
pub struct RollingArgs {
    #[arg(long)]
    pub input: Option<String>,

    /// Window length in months
    #[arg(long, default_value_t = 12)]
    pub window: usize,
}

pub fn run_rolling(args: RollingArgs) -> CommandResult {
    let series = read_series(args.input.as_deref())?;
    let started = Instant::now();
    let rolling = calculate_rolling_returns(&series, args.window)?;

    envelope(
        "Return over every window of consecutive NAV entries",
        &json!({ "window_months": args.window }),
        Vec::new(),
        started,
        rolling,
    )
}

#[derive(Args)]
pub struct StatsArgs {
    /// NAV history; used when --returns is not given
    #[arg(long)]
    pub input: Option<String>,

    /// Period returns in percent (comma-separated, e.g. "1.2,-0.4,2.5")
    #[arg(long, value_delimiter = ',', allow_hyphen_values = true)]
    pub returns: Option<Vec<Decimal>>,

    /// Risk-free rate in percent
    #[arg(long, default_value_t = DEFAULT_RISK_FREE_RATE, allow_hyphen_values = true)]
    pub risk_free_rate: Decimal,
}

pub fn run_stats(args: StatsArgs) -> CommandResult {
    if let Some(returns) = args.returns {
        let started = Instant::now();
        let statistics = calculate_return_statistics(&returns)?;
        let sharpe_ratio =
            calculate_sharpe_ratio(statistics.mean, args.risk_free_rate, statistics.std_dev);
        return envelope(
            "Population statistics of the given returns; Sharpe on their mean",
            &json!({ "risk_free_rate": args.risk_free_rate }),
            Vec::new(),
            started,
            json!({ "statistics": statistics, "sharpe_ratio": sharpe_ratio }),
        );
    }

    let series = read_series(args.input.as_deref())?;
    let started = Instant::now();
    let risk = calculate_fund_risk(&series, args.risk_free_rate)?;

    envelope(
        "Monthly return statistics, volatility annualised by sqrt(12), Sharpe on CAGR",
        &json!({ "risk_free_rate": args.risk_free_rate }),
        Vec::new(),
        started,
        risk,
    )
}

#[derive(Deserialize)]
#[serde(untagged)]
enum CompareFile {
    Wrapped {
        investments: Vec<InvestmentComparisonInput>,
    },
    Bare(Vec<InvestmentComparisonInput>),
}

#[derive(Args)]
pub struct CompareArgs {
    /// JSON list of `{name, initial_value, final_value, years}`
    #[arg(long)]
    pub input: Option<String>,
}

pub fn run_compare(args: CompareArgs) -> CommandResult {
    let file: CompareFile = input::read_input(args.input.as_deref(), "investments")?;
    let investments = match file {
        CompareFile::Wrapped { investments } => investments,
        CompareFile::Bare(investments) => investments,
    };
    let started = Instant::now();
    let ranked = compare_investments(&investments)?;

    envelope(
        "Ranked by CAGR, equal CAGRs share a rank",
        &json!({ "investments": investments.len() }),
        Vec::new(),
        started,
        ranked,
    )
}

pub fn run_drawdown(args: SeriesArgs) -> CommandResult {
    let series = read_series(args.input.as_deref())?;
    let started = Instant::now();
    let drawdown = calculate_max_drawdown(&series)?;

    envelope(
        "Largest fall from a running NAV peak",
        &json!({ "months": series.len() }),
        Vec::new(),
        started,
        drawdown,
    )
}
