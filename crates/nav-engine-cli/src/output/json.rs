use serde_json::Value;
use std::io::{self, Write};

pub fn print_json(value: &Value) {
    let stdout = io::stdout();
    if let Err(e) = write_json(&mut stdout.lock(), value) {
        eprintln!("JSON output error: {}", e);
    }
}

/// Pretty JSON with a trailing newline. Decimals already serialise as
/// strings, so amounts keep their exact digits.
fn write_json<W: Write>(out: &mut W, value: &Value) -> io::Result<()> {
    serde_json::to_writer_pretty(&mut *out, value)?;
    writeln!(out)?;
    out.flush()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decimal_strings_written_verbatim() {
        let mut buf = Vec::new();
        write_json(&mut buf, &json!({ "result": { "xirr": "12.30" } })).unwrap();
        let out = String::from_utf8(buf).unwrap();
        assert!(out.contains("\"xirr\": \"12.30\""));
        assert!(out.ends_with("}\n"));
    }
}
