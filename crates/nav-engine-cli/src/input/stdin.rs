use serde::de::DeserializeOwned;
use std::io::{self, Read};

/// Typed JSON piped on stdin. `None` when stdin is a terminal or carries
/// only whitespace.
pub fn read_stdin<T: DeserializeOwned>(what: &str) -> Result<Option<T>, Box<dyn std::error::Error>> {
    if atty::is(atty::Stream::Stdin) {
        return Ok(None);
    }

    let mut buffer = String::new();
    io::stdin().read_to_string(&mut buffer)?;
    Ok(parse_piped(&buffer, what)?)
}

fn parse_piped<T: DeserializeOwned>(text: &str, what: &str) -> Result<Option<T>, String> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    serde_json::from_str(trimmed)
        .map(Some)
        .map_err(|e| format!("Invalid {what} on stdin: {e}"))
}
