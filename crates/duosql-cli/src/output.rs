//! Output formatting.

use anyhow::{Context, Result};
use duosql_core::ParsedSql;

/// Formats the parse result as JSON.
pub fn format_json(result: &ParsedSql, compact: bool) -> Result<String> {
    if compact {
        serde_json::to_string(result).context("failed to serialize result")
    } else {
        serde_json::to_string_pretty(result).context("failed to serialize result")
    }
}

/// Formats just the rendered SQL.
pub fn format_sql(result: &ParsedSql) -> String {
    result.sql.clone()
}
