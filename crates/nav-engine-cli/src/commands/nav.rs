use clap::Args;
use serde_json::json;
use std::time::Instant;

use nav_engine_core::nav::{
    extract_months, fill_missing_nav_data, get_nav_range, normalize_nav_data,
    validate_nav_coverage,
};
use nav_engine_core::MonthKey;

use super::{envelope, read_raw_nav, read_series, CommandResult};

#[derive(Args)]
pub struct NormalizeArgs {
    /// Path to a JSON NAV history (or pipe it on stdin)
    #[arg(long)]
    pub input: Option<String>,
}

pub fn run_normalize(args: NormalizeArgs) -> CommandResult {
    let raw = read_raw_nav(args.input.as_deref())?;
    let started = Instant::now();
    let series = normalize_nav_data(&raw)?;

    let mut warnings = Vec::new();
    let range = if series.is_empty() {
        warnings.push("NAV history is empty".to_string());
        None
    } else {
        Some(get_nav_range(&series)?)
    };

    envelope(
        "Validated YYYY-MM keys and positive NAVs, sorted chronologically",
        &json!({ "entries": raw.len() }),
        warnings,
        started,
        json!({ "nav_data": series, "range": range }),
    )
}

#[derive(Args)]
pub struct FillArgs {
    #[arg(long)]
    pub input: Option<String>,

    /// First month to fill (defaults to the earliest NAV month)
    #[arg(long)]
    pub start: Option<MonthKey>,

    /// Last month to fill (defaults to the latest NAV month)
    #[arg(long)]
    pub end: Option<MonthKey>,
}

pub fn run_fill(args: FillArgs) -> CommandResult {
    let series = read_series(args.input.as_deref())?;
    let started = Instant::now();

    let range = get_nav_range(&series)?;
    let start = args.start.unwrap_or(range.start);
    let end = args.end.unwrap_or(range.end);
    let filled = fill_missing_nav_data(&series, &start, &end)?;

    let filled_months: Vec<MonthKey> = extract_months(&filled)
        .into_iter()
        .filter(|m| !series.contains(m))
        .collect();

    envelope(
        "Linear interpolation between known NAVs, flat extension at the edges",
        &json!({ "start": start, "end": end }),
        Vec::new(),
        started,
        json!({ "nav_data": filled, "filled_months": filled_months }),
    )
}

#[derive(Args)]
pub struct CoverageArgs {
    #[arg(long)]
    pub input: Option<String>,

    /// First month of the required range
    #[arg(long)]
    pub start: MonthKey,

    /// Last month of the required range
    #[arg(long)]
    pub end: MonthKey,
}

pub fn run_coverage(args: CoverageArgs) -> CommandResult {
    let series = read_series(args.input.as_deref())?;
    let started = Instant::now();
    let coverage = validate_nav_coverage(&series, &args.start, &args.end)?;

    envelope(
        "Share of months in range with a recorded NAV",
        &json!({ "start": args.start, "end": args.end }),
        Vec::new(),
        started,
        coverage,
    )
}
