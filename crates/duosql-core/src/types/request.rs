//! Dialects and placeholder styles.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// RDBMS dialect controlling placeholder syntax, IN-list splitting, LIKE
/// escaping, and string-literal escape rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    #[default]
    Sqlite,
    Postgresql,
    Mysql,
    Oracle,
}

impl Dialect {
    /// Stable identifier, also used as the dialect file suffix
    /// (`find.oracle.sql`).
    pub fn id(&self) -> &'static str {
        match self {
            Self::Sqlite => "sqlite",
            Self::Postgresql => "postgresql",
            Self::Mysql => "mysql",
            Self::Oracle => "oracle",
        }
    }

    /// The placeholder style this dialect's drivers expect.
    pub fn placeholder(&self) -> PlaceholderStyle {
        match self {
            Self::Sqlite => PlaceholderStyle::Question,
            Self::Postgresql | Self::Mysql => PlaceholderStyle::Format,
            Self::Oracle => PlaceholderStyle::Named,
        }
    }

    /// Maximum number of elements a single IN list may carry, or `None`
    /// when the dialect imposes no limit. Oracle caps IN lists at 1000.
    pub fn in_clause_limit(&self) -> Option<usize> {
        match self {
            Self::Oracle => Some(1000),
            _ => None,
        }
    }

    /// Characters that need escaping inside a LIKE pattern.
    ///
    /// Oracle additionally treats the full-width `％` and `＿` as wildcards.
    pub fn like_escape_chars(&self) -> &'static [char] {
        match self {
            Self::Oracle => &['#', '%', '_', '％', '＿'],
            _ => &['#', '%', '_'],
        }
    }

    /// Whether backslash acts as an escape inside string literals.
    pub fn backslash_is_escape(&self) -> bool {
        matches!(self, Self::Mysql | Self::Postgresql)
    }
}

/// Placeholder syntax emitted into the final SQL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "lowercase")]
pub enum PlaceholderStyle {
    /// `?` positional placeholders (SQLite and most JDBC-style drivers).
    #[default]
    Question,
    /// `%s` positional placeholders (PostgreSQL and MySQL client libraries).
    Format,
    /// `:name` named placeholders (Oracle).
    Named,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_placeholder_per_dialect() {
        assert_eq!(Dialect::Sqlite.placeholder(), PlaceholderStyle::Question);
        assert_eq!(Dialect::Postgresql.placeholder(), PlaceholderStyle::Format);
        assert_eq!(Dialect::Mysql.placeholder(), PlaceholderStyle::Format);
        assert_eq!(Dialect::Oracle.placeholder(), PlaceholderStyle::Named);
    }

    #[test]
    fn test_in_clause_limit() {
        assert_eq!(Dialect::Oracle.in_clause_limit(), Some(1000));
        assert_eq!(Dialect::Sqlite.in_clause_limit(), None);
        assert_eq!(Dialect::Postgresql.in_clause_limit(), None);
        assert_eq!(Dialect::Mysql.in_clause_limit(), None);
    }

    #[test]
    fn test_like_escape_chars() {
        assert!(Dialect::Sqlite.like_escape_chars().contains(&'%'));
        assert!(!Dialect::Sqlite.like_escape_chars().contains(&'％'));
        assert!(Dialect::Oracle.like_escape_chars().contains(&'％'));
        assert!(Dialect::Oracle.like_escape_chars().contains(&'＿'));
    }

    #[test]
    fn test_backslash_escape() {
        assert!(Dialect::Mysql.backslash_is_escape());
        assert!(Dialect::Postgresql.backslash_is_escape());
        assert!(!Dialect::Sqlite.backslash_is_escape());
        assert!(!Dialect::Oracle.backslash_is_escape());
    }

    #[test]
    fn test_serde_ids() {
        let d: Dialect = serde_json::from_str("\"oracle\"").unwrap();
        assert_eq!(d, Dialect::Oracle);
        assert_eq!(serde_json::to_string(&Dialect::Postgresql).unwrap(), "\"postgresql\"");
        for d in [Dialect::Sqlite, Dialect::Postgresql, Dialect::Mysql, Dialect::Oracle] {
            let json = serde_json::to_string(&d).unwrap();
            assert_eq!(json.trim_matches('"'), d.id());
        }
    }
}
