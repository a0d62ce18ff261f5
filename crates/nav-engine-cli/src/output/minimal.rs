use serde_json::Value;

/// Headline figure of each command, in the order they are looked for.
const HEADLINE_KEYS: [&str; 10] = [
    "xirr",
    "cagr",
    "approximate_xirr",
    "current_value",
    "sharpe_ratio",
    "max_drawdown",
    "coverage_percent",
    "return_percent",
    "mean",
    "absolute_return",
];

/// Print just the headline value of a result envelope.
pub fn print_minimal(value: &Value) {
    let result = value
        .as_object()
        .and_then(|m| m.get("result"))
        .unwrap_or(value);

    if let Some(headline) = find_headline(result) {
        println!("{}", format_minimal(headline));
        return;
    }

    match result {
        Value::Object(map) => {
            if let Some((key, val)) = map.iter().next() {
                println!("{}: {}", key, format_minimal(val));
            }
        }
        Value::Array(items) => println!("{} rows", items.len()),
        other => println!("{}", format_minimal(other)),
    }
}

/// First non-null headline field, looking one level into nested objects
/// (e.g. the `valuation` half of a SIP result).
fn find_headline(result: &Value) -> Option<&Value> {
    let map = result.as_object()?;
    for key in HEADLINE_KEYS {
        if let Some(val) = map.get(key).filter(|v| !v.is_null()) {
            return Some(val);
        }
    }
    map.values().filter(|v| v.is_object()).find_map(find_headline)
}

fn format_minimal(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => "null".to_string(),
        _ => serde_json::to_string(value).unwrap_or_default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_headline_prefers_xirr() {
        let result = json!({ "cagr": "12.5", "xirr": "14.1", "current_value": "1000" });
        assert_eq!(find_headline(&result), Some(&json!("14.1")));
    }

    #[test]
    fn test_headline_searches_nested_objects() {
        let result = json!({
            "approximate_xirr": null,
            "valuation": { "current_value": "3226.17", "installment_count": 3 }
        });
        assert_eq!(find_headline(&result), Some(&json!("3226.17")));
    }

    #[test]
    fn test_no_headline_for_plain_rows() {
        assert_eq!(find_headline(&json!([{ "rank": 1 }])), None);
    }
}
