pub mod csv_out;
pub mod json;
pub mod minimal;
pub mod table;

use crate::OutputFormat;
use serde_json::Value;

impl OutputFormat {
    /// Print a command envelope on stdout in this format.
    pub fn render(&self, value: &Value) {
        match self {
            OutputFormat::Json => json::print_json(value),
            OutputFormat::Table => table::print_table(value),
            OutputFormat::Csv => csv_out::print_csv(value),
            OutputFormat::Minimal => minimal::print_minimal(value),
        }
    }
}
