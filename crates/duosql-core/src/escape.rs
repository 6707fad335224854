//! LIKE-pattern escaping.

use crate::types::Dialect;

/// The escape character this crate emits in `ESCAPE '#'` clauses.
pub const LIKE_ESCAPE_CHAR: char = '#';

/// Escapes the dialect's LIKE metacharacters with [`LIKE_ESCAPE_CHAR`].
///
/// A value escaped here must be used together with an `ESCAPE '#'` clause;
/// the `%L` template helper appends one automatically.
///
/// ```
/// use duosql_core::{escape_like, Dialect};
///
/// assert_eq!(escape_like("10%off", Dialect::Sqlite), "10#%off");
/// assert_eq!(escape_like("file_name", Dialect::Oracle), "file#_name");
/// ```
pub fn escape_like(value: &str, dialect: Dialect) -> String {
    escape_like_with(value, dialect, LIKE_ESCAPE_CHAR)
}

/// Like [`escape_like`], with a caller-chosen escape character.
pub fn escape_like_with(value: &str, dialect: Dialect, escape_char: char) -> String {
    let specials = dialect.like_escape_chars();
    let mut out = String::with_capacity(value.len());
    for ch in value.chars() {
        if specials.contains(&ch) {
            out.push(escape_char);
        }
        out.push(ch);
    }
    out
}
