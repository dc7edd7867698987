//! Recovery of a JSON object from free-form model replies

use serde_json::{Map, Value};
use tct_core::{Result, TctError};
use tracing::{debug, warn};

const PREVIEW_CHARS: usize = 200;

/// Parse a model reply as a JSON object
///
/// The whole reply is tried first. Failing that, every bracket-balanced
/// `{...}` span is collected (quotes and escapes respected), and the spans
/// are tried longest first; the first that parses as an object wins.
pub fn extract_json_object(text: &str) -> Result<Map<String, Value>> {
    if let Ok(Value::Object(map)) = serde_json::from_str::<Value>(text.trim()) {
        return Ok(map);
    }

    let mut spans = balanced_spans(text);
    // Stable sort: equal lengths keep document order
    spans.sort_by(|a, b| (b.1 - b.0).cmp(&(a.1 - a.0)));
    debug!(candidates = spans.len(), "Recovering JSON object from reply");

    for (start, end) in spans {
        if let Ok(Value::Object(map)) = serde_json::from_str::<Value>(&text[start..end]) {
            return Ok(map);
        }
    }

    let preview: String = text.chars().take(PREVIEW_CHARS).collect();
    warn!(reply_chars = text.len(), "Model reply contains no JSON object");
    Err(TctError::MalformedResponse(format!(
        "no JSON object found in reply: {preview}"
    )))
}

/// Byte ranges of every balanced `{...}` span, collected in one pass
///
/// Quotes only open a string while inside a brace, so stray quotes in
/// surrounding prose do not hide an object.
fn balanced_spans(text: &str) -> Vec<(usize, usize)> {
    let mut spans = Vec::new();
    let mut open: Vec<usize> = Vec::new();
    let mut in_string = false;
    let mut escaped = false;

    for (i, &b) in text.as_bytes().iter().enumerate() {
        if in_string {
            match b {
                _ if escaped => escaped = false,
                b'\\' => escaped = true,
                b'"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match b {
            b'"' if !open.is_empty() => in_string = true,
            b'{' => open.push(i),
            b'}' => {
                if let Some(start) = open.pop() {
                    spans.push((start, i + 1));
                }
            }
            _ => {}
        }
    }
    spans
}
