//! Formatting helpers for rich-text (Telegram HTML) replies.

/// Escape HTML special characters for Telegram HTML parse mode.
pub fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// Strip a leading `@` and lowercase a username argument.
pub fn strip_tag(name: &str) -> String {
    let lower = name.to_lowercase();
    match lower.strip_prefix('@') {
        Some(rest) => rest.to_string(),
        None => lower,
    }
}
