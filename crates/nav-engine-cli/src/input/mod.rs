pub mod file;
pub mod stdin;

use serde::de::DeserializeOwned;

/// Load command input from `--input <file>`, falling back to JSON piped on stdin.
pub fn read_input<T: DeserializeOwned>(
    path: Option<&str>,
    what: &str,
) -> Result<T, Box<dyn std::error::Error>> {
    if let Some(path) = path {
        return file::read_json(path);
    }
    stdin::read_stdin(what)?
        .ok_or_else(|| format!("Provide {what} with --input <file> or pipe JSON via stdin").into())
}
