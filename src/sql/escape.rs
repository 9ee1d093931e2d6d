//! Quoting for generated SQL
//!
//! Every literal and identifier interpolated into generated SQL goes through
//! this module.

use regex::Regex;
use std::sync::LazyLock;

static PLAIN_IDENTIFIER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").unwrap());

/// Check if a column name needs quoting (spaces, punctuation, leading digit)
pub fn needs_quoting(name: &str) -> bool {
    !PLAIN_IDENTIFIER.is_match(name)
}

/// Quote an identifier if necessary
pub fn quote_identifier(name: &str) -> String {
    if needs_quoting(name) {
        format!("\"{}\"", name.replace('"', "\"\""))
    } else {
        name.to_string()
    }
}

/// Single-quoted string literal with embedded quotes doubled
pub fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

/// Escape LIKE wildcards so the value matches literally under `ESCAPE '\'`
pub fn like_pattern(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Identifier-safe fragment for aliases such as `avg_<field>`
pub fn alias_fragment(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect()
}
