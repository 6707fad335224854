//! Diagnostics attached to a successful parse.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// A non-fatal notice produced while rendering a template.
///
/// Fatal conditions are [`crate::ParseError`]s instead; diagnostics ride
/// along inside [`crate::ParsedSql`] and are never logged by the engine.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Diagnostic {
    /// Severity level.
    pub severity: Severity,

    /// Machine-readable code, one of [`diagnostic_codes`].
    pub code: String,

    /// Human-readable message.
    pub message: String,

    /// One-based template line the notice refers to, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line: Option<usize>,
}

impl Diagnostic {
    pub fn warning(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            code: code.into(),
            message: message.into(),
            line: None,
        }
    }

    pub fn info(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Info,
            code: code.into(),
            message: message.into(),
            line: None,
        }
    }

    pub fn with_line(mut self, line: usize) -> Self {
        self.line = Some(line);
        self
    }
}

/// Severity of a [`Diagnostic`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Warning,
    Info,
}

/// Machine-readable diagnostic codes.
pub mod diagnostic_codes {
    /// A `%STR`/`%SQL` helper spliced a value into the SQL text verbatim,
    /// bypassing placeholder binding.
    pub const RAW_EMBED: &str = "RAW_EMBED";
}
