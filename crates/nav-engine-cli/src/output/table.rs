use serde_json::{Map, Value};
use tabled::{builder::Builder, settings::Style, Table};

/// Render an envelope as tables: scalar result fields first, then one table
/// per list of rows (installments, rolling windows, rankings, ...).
pub fn print_table(value: &Value) {
    let Some(envelope) = value.as_object() else {
        println!("{}", value);
        return;
    };

    match envelope.get("result") {
        Some(Value::Array(rows)) => print_rows(None, rows),
        Some(Value::Object(result)) => print_result(result),
        Some(other) => println!("{}", format_value(other)),
        None => print_fields(&flatten(envelope)),
    }

    print_warnings(envelope);
}

fn print_result(result: &Map<String, Value>) {
    print_fields(&flatten(result));

    for (key, val) in result {
        if let Value::Array(rows) = val {
            if rows.iter().any(Value::is_object) {
                print_rows(Some(key.as_str()), rows);
            }
        }
    }
}

fn print_fields(fields: &[(String, String)]) {
    if fields.is_empty() {
        return;
    }
    let mut builder = Builder::default();
    builder.push_record(["Field", "Value"]);
    for (key, val) in fields {
        builder.push_record([key.as_str(), val.as_str()]);
    }
    println!("{}", Table::from(builder).with(Style::rounded()));
}

fn print_rows(title: Option<&str>, rows: &[Value]) {
    if let Some(title) = title {
        println!("\n{}:", title);
    }
    let Some(Value::Object(first)) = rows.first() else {
        println!("(empty)");
        return;
    };

    let headers: Vec<String> = first.keys().cloned().collect();
    let mut builder = Builder::default();
    builder.push_record(&headers);
    for row in rows.iter().filter_map(Value::as_object) {
        let cells: Vec<String> = headers
            .iter()
            .map(|h| row.get(h.as_str()).map(format_value).unwrap_or_default())
            .collect();
        builder.push_record(cells);
    }
    println!("{}", Table::from(builder).with(Style::rounded()));
}

fn print_warnings(envelope: &Map<String, Value>) {
    if let Some(Value::Array(warnings)) = envelope.get("warnings") {
        if !warnings.is_empty() {
            println!("\nWarnings:");
            for w in warnings.iter().filter_map(Value::as_str) {
                println!("  - {}", w);
            }
        }
    }

    if let Some(Value::String(meth)) = envelope.get("methodology") {
        println!("\nMethodology: {}", meth);
    }
}

/// Scalar fields with nested objects flattened to dotted keys. Lists of
/// rows are skipped here and printed as their own tables.
fn flatten(map: &Map<String, Value>) -> Vec<(String, String)> {
    let mut out = Vec::new();
    flatten_into("", map, &mut out);
    out
}

fn flatten_into(prefix: &str, map: &Map<String, Value>, out: &mut Vec<(String, String)>) {
    for (key, val) in map {
        let name = if prefix.is_empty() {
            key.clone()
        } else {
            format!("{}.{}", prefix, key)
        };
        match val {
            Value::Object(inner) => flatten_into(&name, inner, out),
            Value::Array(items) if items.iter().any(Value::is_object) => {}
            other => out.push((name, format_value(other))),
        }
    }
}

fn format_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => "-".to_string(),
        Value::Array(arr) => {
            let items: Vec<String> = arr.iter().map(format_value).collect();
            items.join(", ")
        }
        Value::Object(_) => serde_json::to_string(value).unwrap_or_default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_flatten_dots_nested_keys_and_skips_rows() {
        let value = json!({
            "current_value": "1200.00",
            "drawdown": { "max_drawdown": "8.33", "peak_month": "2024-02" },
            "installments": [{ "month": "2024-01" }],
            "missing": ["2024-03"]
        });
        let fields = flatten(value.as_object().unwrap());
        let keys: Vec<&str> = fields.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(
            keys,
            vec!["current_value", "drawdown.max_drawdown", "drawdown.peak_month", "missing"]
        );
        assert_eq!(fields[3].1, "2024-03");
    }
}
