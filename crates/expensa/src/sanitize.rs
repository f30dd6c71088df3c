//! Helpers for sanitizing data before it enters tracing span attributes or
//! storage keys.
//!
//! Object keys embed tenant and subject identifiers; spans only ever see the
//! last key component.

use std::sync::LazyLock;

use regex::Regex;

static UNSAFE_KEY_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^A-Za-z0-9._-]").unwrap());

/// Returns only the last `/`-separated component of an object key.
///
/// Safe for span fields: reveals the document name without exposing the
/// tenant or subject path segments.
pub fn redact_key(key: &str) -> String {
    match key.rsplit('/').next() {
        Some(name) if !name.is_empty() => name.to_string(),
        _ => "<unknown>".to_string(),
    }
}

/// Replaces every character outside `[A-Za-z0-9._-]` with `_`.
///
/// Leading dots are stripped so the result can never be `.` or `..`.
pub fn sanitize_component(name: &str) -> String {
    let replaced = UNSAFE_KEY_CHARS.replace_all(name, "_");
    let trimmed = replaced.trim_start_matches('.');
    if trimmed.is_empty() {
        "document".to_string()
    } else {
        trimmed.to_string()
    }
}

/// Splits a file name into `(base, extension)` at the last dot.
///
/// The extension is lowercased. Returns `None` when there is no extension
/// or the base is empty.
pub fn split_file_name(file_name: &str) -> Option<(&str, String)> {
    let name = file_name.rsplit(['/', '\\']).next().unwrap_or(file_name);
    let (base, ext) = name.rsplit_once('.')?;
    if base.trim().is_empty() || ext.is_empty() {
        return None;
    }
    Some((base, ext.to_ascii_lowercase()))
}
