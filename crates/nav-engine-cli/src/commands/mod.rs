pub mod nav;
pub mod returns;
pub mod valuation;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::time::Instant;

use nav_engine_core::nav::normalize_nav_data;
use nav_engine_core::{with_metadata, NavSeries};

use crate::input;

pub type CommandResult = Result<Value, Box<dyn std::error::Error>>;

/// NAV history either bare (`{"2024-01": 10.5, ...}`) or wrapped as
/// `{"nav_data": {...}}` like the portfolio files.
#[derive(Deserialize)]
#[serde(untagged)]
enum NavFile {
    Wrapped { nav_data: BTreeMap<String, Decimal> },
    Bare(BTreeMap<String, Decimal>),
}

impl NavFile {
    fn into_raw(self) -> BTreeMap<String, Decimal> {
        match self {
            NavFile::Wrapped { nav_data } => nav_data,
            NavFile::Bare(raw) => raw,
        }
    }
}

/// Raw NAV pairs, before month keys and values are validated.
pub fn read_raw_nav(path: Option<&str>) -> Result<BTreeMap<String, Decimal>, Box<dyn std::error::Error>> {
    let file: NavFile = input::read_input(path, "NAV history")?;
    Ok(file.into_raw())
}

pub fn read_series(path: Option<&str>) -> Result<NavSeries, Box<dyn std::error::Error>> {
    let raw = read_raw_nav(path)?;
    Ok(normalize_nav_data(&raw)?)
}

/// Wrap a command result in the standard envelope.
pub fn envelope<T: Serialize>(
    methodology: &str,
    assumptions: &impl Serialize,
    warnings: Vec<String>,
    started: Instant,
    result: T,
) -> CommandResult {
    let elapsed_us = started.elapsed().as_micros() as u64;
    let output = with_metadata(methodology, assumptions, warnings, elapsed_us, result);
    Ok(serde_json::to_value(output)?)
}
