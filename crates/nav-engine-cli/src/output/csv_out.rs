use serde_json::{Map, Value};
use std::io;

/// Write a result envelope as CSV on stdout.
///
/// Results that are lists (rolling returns, rankings, cash flows) become one
/// row per entry; a result object holding exactly one list of rows (SIP
/// installments, missing months) is written as that list; anything else is a
/// two-column `field,value` listing with nested keys dotted.
pub fn print_csv(value: &Value) {
    let stdout = io::stdout();
    let mut wtr = csv::Writer::from_writer(stdout.lock());

    let result = value
        .as_object()
        .and_then(|m| m.get("result"))
        .unwrap_or(value);

    match result {
        Value::Array(rows) => write_rows(&mut wtr, rows),
        Value::Object(map) => match single_row_list(map) {
            Some(rows) => write_rows(&mut wtr, rows),
            None => {
                let _ = wtr.write_record(["field", "value"]);
                write_fields(&mut wtr, "", map);
            }
        },
        other => {
            let _ = wtr.write_record([format_csv_value(other)]);
        }
    }

    let _ = wtr.flush();
}

fn single_row_list(map: &Map<String, Value>) -> Option<&[Value]> {
    let mut lists = map.values().filter_map(|v| match v {
        Value::Array(rows) if rows.iter().all(Value::is_object) && !rows.is_empty() => {
            Some(rows.as_slice())
        }
        _ => None,
    });
    let first = lists.next()?;
    lists.next().is_none().then_some(first)
}

fn write_rows<W: io::Write>(wtr: &mut csv::Writer<W>, rows: &[Value]) {
    let Some(Value::Object(first)) = rows.first() else {
        for item in rows {
            let _ = wtr.write_record([format_csv_value(item)]);
        }
        return;
    };

    let headers: Vec<&str> = first.keys().map(String::as_str).collect();
    let _ = wtr.write_record(&headers);
    for row in rows.iter().filter_map(Value::as_object) {
        let cells: Vec<String> = headers
            .iter()
            .map(|h| row.get(*h).map(format_csv_value).unwrap_or_default())
            .collect();
        let _ = wtr.write_record(&cells);
    }
}

fn write_fields<W: io::Write>(wtr: &mut csv::Writer<W>, prefix: &str, map: &Map<String, Value>) {
    for (key, val) in map {
        let name = if prefix.is_empty() {
            key.clone()
        } else {
            format!("{}.{}", prefix, key)
        };
        match val {
            Value::Object(inner) => write_fields(wtr, &name, inner),
            other => {
                let _ = wtr.write_record([name.as_str(), &format_csv_value(other)]);
            }
        }
    }
}

fn format_csv_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => String::new(),
        _ => serde_json::to_string(value).unwrap_or_default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_single_row_list_found() {
        let value = json!({ "total_units": "1.5", "installments": [{ "month": "2024-01" }] });
        let rows = single_row_list(value.as_object().unwrap()).unwrap();
        assert_eq!(rows.len(), 1);
    }

    #[test]
    fn test_two_row_lists_fall_back_to_fields() {
        let value = json!({ "a": [{ "x": 1 }], "b": [{ "y": 2 }] });
        assert!(single_row_list(value.as_object().unwrap()).is_none());
    }

    #[test]
    fn test_rows_written_with_headers() {
        let mut wtr = csv::Writer::from_writer(Vec::new());
        write_rows(
            &mut wtr,
            &[json!({ "month": "2024-01", "return_percent": "1.25" })],
        );
        let out = String::from_utf8(wtr.into_inner().unwrap()).unwrap();
        assert_eq!(out, "month,return_percent\n2024-01,1.25\n");
    }
}
