//! duosql-core: a two-way SQL template engine.
//!
//! Two-way SQL is source that works twice: executed as-is it is ordinary
//! SQL with literal default values, and processed by this crate it is a
//! parameterized template. The engine binds named inputs into
//! placeholders, expands list parameters into IN clauses, prunes
//! conditions whose parameters are absent, and repairs the SQL left
//! behind (dangling `WHERE`, leading `AND`/`OR`, empty parentheses,
//! orphan set operators).

pub mod error;
pub mod escape;
pub mod loader;
pub mod parser;
pub mod types;

pub use error::{ParseError, ParseErrorKind};
pub use escape::{escape_like, escape_like_with};
pub use loader::{LoaderError, SqlLoader};
pub use parser::{parse, parse_with_dialect, parse_with_placeholder, TwoWayParser};
pub use types::{
    diagnostic_codes, Diagnostic, Dialect, ParamValue, Params, ParsedSql, PlaceholderStyle,
    Severity,
};
