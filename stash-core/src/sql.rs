//! Shallow SQL text analysis: dependency-table extraction and statement
//! classification.
//!
//! The extractor is deliberately regex-level, not a SQL parser. It only
//! feeds tagging and invalidation: a missed table name risks staleness, a
//! spurious one only costs an unnecessary invalidation.

use std::collections::BTreeSet;

use once_cell::sync::Lazy;
use regex::Regex;

/// Matches the object reference after FROM or JOIN: an identifier, a
/// bracket-quoted or double-quoted name, optionally preceded by one
/// schema qualifier in any of those forms.
static TABLE_REFERENCE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"(?i)\b(?:from|join)\s+((?:\[[^\]]+\]|"[^"]+"|[A-Za-z_][A-Za-z0-9_$]*)(?:\s*\.\s*(?:\[[^\]]+\]|"[^"]+"|[A-Za-z_][A-Za-z0-9_$]*))?)"#,
    )
    .expect("table reference pattern")
});

/// Extract the lowercased set of table names referenced by FROM and JOIN
/// clauses. One optional schema prefix and one level of bracket or
/// double-quote quoting are unwrapped; aliases are ignored.
pub fn extract_tables(sql: &str) -> BTreeSet<String> {
    TABLE_REFERENCE
        .captures_iter(sql)
        .filter_map(|caps| caps.get(1))
        .map(|m| {
            let reference = m.as_str();
            let last = reference
                .rsplit('.')
                .next()
                .unwrap_or(reference)
                .trim();
            unquote(last).to_ascii_lowercase()
        })
        .collect()
}

fn unquote(name: &str) -> &str {
    let name = name.trim();
    if let Some(inner) = name.strip_prefix('[').and_then(|s| s.strip_suffix(']')) {
        return inner;
    }
    if let Some(inner) = name.strip_prefix('"').and_then(|s| s.strip_suffix('"')) {
        return inner;
    }
    name
}

/// Skip leading whitespace, `--` line comments, and `/* */` block comments.
/// An unterminated block comment consumes the rest of the text.
pub fn strip_leading_comments(sql: &str) -> &str {
    let mut rest = sql;
    loop {
        rest = rest.trim_start();
        if let Some(after) = rest.strip_prefix("--") {
            rest = match after.find('\n') {
                Some(i) => &after[i + 1..],
                None => "",
            };
        } else if let Some(after) = rest.strip_prefix("/*") {
            rest = match after.find("*/") {
                Some(i) => &after[i + 2..],
                None => "",
            };
        } else {
            return rest;
        }
    }
}

/// True iff the first token after leading comments is SELECT or WITH.
pub fn is_query_statement(sql: &str) -> bool {
    let body = strip_leading_comments(sql);
    let first = body
        .split(|c: char| c.is_whitespace() || c == '(')
        .next()
        .unwrap_or("");
    first.eq_ignore_ascii_case("select") || first.eq_ignore_ascii_case("with")
}
