// Flat token substitution for title/content templates.
//
// `{{field}}` tokens resolve against the task's data snapshot: direct key
// first, then the positional `col_<n>` form when the name matches that shape
// numerically, otherwise the empty string. Row values are sanitized at the
// embedding point; everything outside a matched token is left untouched.

use lazy_static::lazy_static;
use regex::Regex;
use std::collections::HashMap;

lazy_static! {
    static ref TOKEN_RE: Regex = Regex::new(r"\{\{\s*([A-Za-z0-9_]+)\s*\}\}").unwrap();
    static ref COL_RE: Regex = Regex::new(r"^col_(\d+)$").unwrap();
    static ref TAG_RE: Regex = Regex::new(r"<[^>]*>").unwrap();
}

/// How substituted row values are sanitized
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueMode {
    /// Markup stripped from values; for titles
    StripMarkup,
    /// Values HTML-escaped; for body content
    EscapeMarkup,
}

/// Substitute all matched `{{field}}` tokens in the template
pub fn render(template: &str, fields: &HashMap<String, String>, mode: ValueMode) -> String {
    TOKEN_RE
        .replace_all(template, |caps: &regex::Captures| {
            let value = lookup(fields, &caps[1]).unwrap_or_default();
            match mode {
                ValueMode::StripMarkup => strip_markup(&value),
                ValueMode::EscapeMarkup => escape_markup(&value),
            }
        })
        .into_owned()
}

fn lookup(fields: &HashMap<String, String>, name: &str) -> Option<String> {
    if let Some(value) = fields.get(name) {
        return Some(value.clone());
    }
    // col_007 addresses the same position as col_7
    if let Some(caps) = COL_RE.captures(name) {
        if let Ok(index) = caps[1].parse::<usize>() {
            return fields.get(&format!("col_{}", index)).cloned();
        }
    }
    None
}

/// Remove markup elements entirely
pub fn strip_markup(value: &str) -> String {
    TAG_RE.replace_all(value, "").into_owned()
}

/// Escape HTML metacharacters so row data cannot inject markup
pub fn escape_markup(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}
