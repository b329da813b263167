//! Best-effort JSON recovery for replies produced in JSON mode.
//!
//! Parsing never fails a turn: when nothing parses the raw text is handed back.

use serde_json::Value;

use super::Reply;

/// Parses the outermost `{ ... }` span of `text`.
///
/// # Examples
///
/// ```
/// use llmanager::session::json_mode::extract_json;
///
/// let value = extract_json("Sure! {\"a\": [1, 2]} Anything else?").unwrap();
/// assert_eq!(value["a"][1], 2);
/// assert!(extract_json("no braces here").is_none());
/// ```
pub fn extract_json(text: &str) -> Option<Value> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end < start {
        return None;
    }
    serde_json::from_str(&text[start..=end]).ok()
}

/// Reconstructs a JSON object from a reply that continued an opening brace.
///
/// The reply is cut at its last closing brace and re-prefixed with `{`. A reply
/// that repeated the brace itself is handled by falling back to
/// [`extract_json`].
pub fn complete_primed_json(text: &str) -> Option<Value> {
    let end = text.rfind('}')?;
    let body = text[..=end].trim_start();
    serde_json::from_str(&format!("{{{body}"))
        .ok()
        .or_else(|| serde_json::from_str(&format!("{{\"{body}")).ok())
        .or_else(|| extract_json(text))
}

/// Turns a finished reply into [`Reply::Json`] when JSON mode is on and the
/// text parses, otherwise [`Reply::Text`].
pub(crate) fn finish_reply(
    json_mode: bool,
    text: String,
    parse: fn(&str) -> Option<Value>,
) -> Reply<'static> {
    if !json_mode {
        return Reply::Text(text);
    }
    match parse(&text) {
        Some(value) => Reply::Json(value),
        None => {
            tracing::debug!("reply is not valid JSON, returning raw text");
            Reply::Text(text)
        }
    }
}
