//! YAML parsing wrapper used by the loading pass.
//!
//! The engine works on generic `serde_yaml::Value` trees; this module is the
//! only place raw document text is turned into one.

use std::path::Path;

use crate::errors::{TameError, TameResult};
use crate::models::Value;

/// Parse one document's text into a generic tree.
///
/// Syntax errors are attributed to `path` with the parser's line and column
/// when it reports them, plus an excerpt of the offending line.
pub fn parse_source(source: &str, path: &Path) -> TameResult<Value> {
    serde_yaml::from_str::<Value>(source).map_err(|e| {
        let location = e.location();
        let line = location.as_ref().map(|l| l.line());
        let column = location.as_ref().map(|l| l.column());
        TameError::Parse {
            path: path.to_path_buf(),
            line,
            column,
            message: first_line(&e.to_string()),
            excerpt: line.and_then(|l| excerpt(source, l, column)),
        }
    })
}

/// Read and parse a document from disk.
///
/// Bytes that are not UTF-8 are a parse error at the first bad byte; only
/// failures to read the file are IO errors.
pub fn parse_file(path: &Path) -> TameResult<Value> {
    let bytes = std::fs::read(path).map_err(|e| TameError::io(path, e))?;
    let source = String::from_utf8(bytes).map_err(|e| {
        let valid = &e.as_bytes()[..e.utf8_error().valid_up_to()];
        let line = valid.iter().filter(|b| **b == b'\n').count() + 1;
        let line_start = valid
            .iter()
            .rposition(|b| *b == b'\n')
            .map_or(0, |i| i + 1);
        let column = String::from_utf8_lossy(&valid[line_start..]).chars().count() + 1;
        TameError::Parse {
            path: path.to_path_buf(),
            line: Some(line),
            column: Some(column),
            message: "document is not valid UTF-8".to_string(),
            excerpt: None,
        }
    })?;
    parse_source(&source, path)
}

/// The 1-based `line` of `source` with a caret under 1-based `column`.
fn excerpt(source: &str, line: usize, column: Option<usize>) -> Option<String> {
    let text = source.lines().nth(line.checked_sub(1)?)?.trim_end();
    if text.trim().is_empty() {
        return None;
    }
    let indent = column.unwrap_or(1).saturating_sub(1).min(text.chars().count());
    Some(format!("{text}\n{}^", " ".repeat(indent)))
}

fn first_line(message: &str) -> String {
    let line = message.lines().next().unwrap_or(message);
    // serde_yaml appends " at line X column Y"; the location is carried separately.
    match line.find(" at line ") {
        Some(idx) => line[..idx].to_string(),
        None => line.to_string(),
    }
}
