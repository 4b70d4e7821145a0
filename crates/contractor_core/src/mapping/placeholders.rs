//! Named-placeholder translation.
//!
//! Rewrites `:identifier` tokens into driver positional markers and collects
//! the ordered argument list.
//!
//! # Invariants
//! - The i-th distinct token (first-occurrence order) maps to position i.
//! - Repeated tokens reuse their position and do not grow the argument list.
//! - Translation is all-or-nothing: a missing argument yields no output.
//! - A token needs one non-`:` character in front of it, so a token at the
//!   very start of the text is left as-is. `::type` casts are never tokens.
//! - Token names are ASCII word characters only; a token ends at the first
//!   non-ASCII character.

use super::{MapError, MapResult, NamedArgs};
use once_cell::sync::Lazy;
use regex::Regex;
use rusqlite::types::Value;
use std::collections::HashMap;

static TOKEN_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^:](:(?-u:\w)+)").expect("valid placeholder regex"));

/// `?N` markers (1-based) understood by SQLite.
pub fn sqlite_marker(position: usize) -> String {
    format!("?{}", position + 1)
}

/// `$N` markers (1-based) understood by Postgres drivers.
pub fn postgres_marker(position: usize) -> String {
    format!("${}", position + 1)
}

/// Translates SQL with named tokens into positional SQL plus ordered values.
///
/// `marker` renders the driver-specific marker for a zero-based position.
///
/// # Errors
/// - [`MapError::MissingParameter`] when a token has no entry in `args`.
pub fn inline_named_placeholders<F>(
    marker: F,
    sql: &str,
    args: &NamedArgs,
) -> MapResult<(String, Vec<Value>)>
where
    F: Fn(usize) -> String,
{
    let mut positions: HashMap<&str, usize> = HashMap::new();
    let mut values: Vec<Value> = Vec::new();
    let mut rewritten = String::with_capacity(sql.len());
    let mut copied_until = 0;

    for captures in TOKEN_RE.captures_iter(sql) {
        let Some(token) = captures.get(1) else {
            continue;
        };
        let name = &token.as_str()[1..];

        let position = match positions.get(name) {
            Some(position) => *position,
            None => {
                let value = args
                    .get(name)
                    .ok_or_else(|| MapError::MissingParameter(name.to_string()))?;
                let position = values.len();
                values.push(value.clone());
                positions.insert(name, position);
                position
            }
        };

        rewritten.push_str(&sql[copied_until..token.start()]);
        rewritten.push_str(&marker(position));
        copied_until = token.end();
    }
    rewritten.push_str(&sql[copied_until..]);

    Ok((rewritten, values))
}
