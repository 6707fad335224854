//! Error types for two-way SQL parsing.
//!
//! # Error Handling Strategy
//!
//! This crate uses two complementary patterns:
//!
//! - [`ParseError`]: fatal errors that abort the whole parse. There is never
//!   a partial result; the first failing site or directive stops processing.
//!
//! - [`crate::types::Diagnostic`]: non-fatal notices collected during a
//!   successful parse (e.g. a `%STR`/`%SQL` splice that bypassed binding).
//!   These travel inside [`crate::ParsedSql`] so callers can surface them;
//!   the engine itself never logs.

use std::fmt;

/// Error encountered while parsing a two-way SQL template.
///
/// Carries the offending line number and, when snippet capture is enabled on
/// the parser, the text of the offending line.
#[derive(Debug, Clone)]
pub struct ParseError {
    /// Human-readable error message.
    pub message: String,
    /// One-based line number in the template, if known.
    pub line: Option<usize>,
    /// The offending line's text, if snippet capture is enabled.
    pub snippet: Option<String>,
    /// The parameter name involved, for parameter-related kinds.
    pub name: Option<String>,
    /// The specific category of parse error.
    pub kind: ParseErrorKind,
}

/// Category of parse error for programmatic handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseErrorKind {
    /// A string literal or block comment ran off the end of the input.
    Unterminated,
    /// Illegal modifier combination on a parameter comment.
    Modifier,
    /// An `@`-marked parameter was missing or negative.
    Required,
    /// Unbalanced or unknown `%`-directive.
    Directive,
    /// IN-list splitting could not locate a column expression.
    Dialect,
    /// `%include` reached a file already on the include path.
    IncludeCycle,
    /// A SQL file could not be resolved by the loader.
    SqlFileNotFound,
}

impl ParseErrorKind {
    fn label(self) -> &'static str {
        match self {
            Self::Unterminated => "unterminated",
            Self::Modifier => "modifier",
            Self::Required => "required",
            Self::Directive => "directive",
            Self::Dialect => "dialect",
            Self::IncludeCycle => "include cycle",
            Self::SqlFileNotFound => "sql file not found",
        }
    }
}

impl ParseError {
    /// Creates a new parse error with a kind and message.
    pub fn new(kind: ParseErrorKind, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            line: None,
            snippet: None,
            name: None,
            kind,
        }
    }

    /// Attaches the one-based template line number.
    pub fn with_line(mut self, line: usize) -> Self {
        self.line = Some(line);
        self
    }

    /// Attaches the offending line's text.
    pub fn with_snippet(mut self, snippet: impl Into<String>) -> Self {
        self.snippet = Some(snippet.into());
        self
    }

    /// Attaches the parameter name involved.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "parse error ({})", self.kind.label())?;

        if let Some(line) = self.line {
            write!(f, " at line {line}")?;
        }

        if let Some(ref name) = self.name {
            write!(f, " for parameter '{name}'")?;
        }

        write!(f, ": {}", self.message)?;

        if let Some(ref snippet) = self.snippet {
            write!(f, " in `{}`", snippet.trim())?;
        }

        Ok(())
    }
}

impl std::error::Error for ParseError {}

impl From<crate::loader::LoaderError> for ParseError {
    fn from(err: crate::loader::LoaderError) -> Self {
        Self::new(ParseErrorKind::SqlFileNotFound, err.to_string())
    }
}
