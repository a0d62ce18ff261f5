mod commands;
mod input;
mod output;

use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use std::process;
use tracing_subscriber::EnvFilter;

use nav_engine_core::month::key_to_date;
use nav_engine_core::{Clock, FixedClock, MonthKey, SystemClock};

use commands::nav::{CoverageArgs, FillArgs, NormalizeArgs};
use commands::returns::{CagrArgs, CompareArgs, RollingArgs, SeriesArgs, StatsArgs, XirrArgs};
use commands::valuation::{LumpsumArgs, PortfolioArgs, SipArgs};
use commands::CommandResult;

/// NAV-based fund valuation and returns
#[derive(Parser)]
#[command(
    name = "navx",
    version,
    about = "NAV-based fund valuation and returns",
    long_about = "Value lumpsum and SIP investments against a monthly NAV history and \
                  compute XIRR, CAGR, trailing and rolling returns, risk statistics and \
                  drawdowns with decimal precision."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format
    #[arg(long, default_value = "json", global = true)]
    output: OutputFormat,

    /// Treat this month (YYYY-MM) as the current month
    #[arg(long, global = true)]
    as_of: Option<MonthKey>,

    /// Log calculation details to stderr
    #[arg(long, short, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate and sort a raw NAV history
    Normalize(NormalizeArgs),
    /// Fill missing months by interpolation
    Fill(FillArgs),
    /// Report which months of a range lack a NAV
    Coverage(CoverageArgs),
    /// Value a one-time investment
    Lumpsum(LumpsumArgs),
    /// Value a monthly SIP
    Sip(SipArgs),
    /// Value a SIP and lumpsums held together
    Combined(PortfolioArgs),
    /// List the dated cash flows of a portfolio
    CashFlows(PortfolioArgs),
    /// Extended internal rate of return
    Xirr(XirrArgs),
    /// Compound annual growth rate
    Cagr(CagrArgs),
    /// 1, 3, 6 and 12 month trailing returns
    Trailing(SeriesArgs),
    /// Rolling returns over a fixed window
    Rolling(RollingArgs),
    /// Return statistics, volatility and Sharpe ratio
    Stats(StatsArgs),
    /// Rank investments by CAGR
    Compare(CompareArgs),
    /// Maximum drawdown of a NAV history
    Drawdown(SeriesArgs),
    /// Print version information
    Version,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Csv,
    Minimal,
}

fn init_tracing(verbose: bool) {
    let default = if verbose {
        "nav_engine_core=debug,navx=debug"
    } else {
        "nav_engine_core=warn"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn build_clock(as_of: Option<MonthKey>) -> Result<Box<dyn Clock>, Box<dyn std::error::Error>> {
    match as_of {
        Some(month) => Ok(Box::new(FixedClock(key_to_date(&month)?))),
        None => Ok(Box::new(SystemClock)),
    }
}

fn dispatch(command: Commands, clock: &dyn Clock) -> CommandResult {
    match command {
        Commands::Normalize(args) => commands::nav::run_normalize(args),
        Commands::Fill(args) => commands::nav::run_fill(args),
        Commands::Coverage(args) => commands::nav::run_coverage(args),
        Commands::Lumpsum(args) => commands::valuation::run_lumpsum(args, clock),
        Commands::Sip(args) => commands::valuation::run_sip(args),
        Commands::Combined(args) => commands::valuation::run_combined(args, clock),
        Commands::CashFlows(args) => commands::valuation::run_cash_flows(args, clock),
        Commands::Xirr(args) => commands::returns::run_xirr(args, clock),
        Commands::Cagr(args) => commands::returns::run_cagr(args),
        Commands::Trailing(args) => commands::returns::run_trailing(args),
        Commands::Rolling(args) => commands::returns::run_rolling(args),
        Commands::Stats(args) => commands::returns::run_stats(args),
        Commands::Compare(args) => commands::returns::run_compare(args),
        Commands::Drawdown(args) => commands::returns::run_drawdown(args),
        Commands::Version => Ok(serde_json::json!({
            "name": "navx",
            "version": env!("CARGO_PKG_VERSION"),
        })),
    }
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result = build_clock(cli.as_of).and_then(|clock| dispatch(cli.command, clock.as_ref()));

    match result {
        Ok(value) => {
            cli.output.render(&value);
            process::exit(0);
        }
        Err(e) => {
            eprintln!("{}: {}", "error".red().bold(), e);
            process::exit(1);
        }
    }
}
