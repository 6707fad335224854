//! The two-way SQL parser.
//!
//! A two-way template is valid SQL as written: parameters hide in block
//! comments with literal defaults, so the raw file runs in any SQL client.
//! [`TwoWayParser::parse`] turns the same text into a driver-ready
//! statement by binding parameters, expanding IN lists, pruning lines with
//! negative bindings, and repairing the surrounding SQL.
//!
//! ```
//! use duosql_core::{parse, ParamValue};
//! use std::collections::HashMap;
//!
//! let sql = "SELECT * FROM users WHERE name = /* $name */'default'";
//! let params = HashMap::from([("name".to_string(), ParamValue::from("Alice"))]);
//! let parsed = parse(sql, &params).unwrap();
//! assert_eq!(parsed.sql, "SELECT * FROM users WHERE name = ?");
//! assert_eq!(parsed.params, vec![ParamValue::from("Alice")]);
//! ```

mod binder;
mod cleanup;
mod directives;
mod evaluate;
mod include;
mod line_unit;
mod rebuild;
mod tokenizer;

use std::collections::HashSet;
use std::path::PathBuf;

#[cfg(feature = "tracing")]
use tracing::trace;

use crate::error::ParseError;
use crate::types::{Dialect, Params, ParsedSql, PlaceholderStyle};

/// Parses and renders two-way SQL templates.
///
/// The parser borrows the template text and is configured with builder
/// methods; [`parse`](Self::parse) can then be called any number of times
/// with different bindings.
#[derive(Debug, Clone)]
pub struct TwoWayParser<'a> {
    sql: &'a str,
    dialect: Option<Dialect>,
    placeholder: PlaceholderStyle,
    base_path: Option<PathBuf>,
    include_snippets: bool,
}

impl<'a> TwoWayParser<'a> {
    /// Creates a parser with the default `?` placeholder style and no
    /// dialect.
    pub fn new(sql: &'a str) -> Self {
        Self {
            sql,
            dialect: None,
            placeholder: PlaceholderStyle::Question,
            base_path: None,
            include_snippets: true,
        }
    }

    /// Selects a dialect; this also selects the dialect's placeholder
    /// style.
    pub fn with_dialect(mut self, dialect: Dialect) -> Self {
        self.dialect = Some(dialect);
        self.placeholder = dialect.placeholder();
        self
    }

    /// Overrides the placeholder style independently of the dialect.
    pub fn with_placeholder(mut self, placeholder: PlaceholderStyle) -> Self {
        self.placeholder = placeholder;
        self
    }

    /// Enables `%include` expansion, resolving paths against `base_path`.
    /// Without a base path, include directives pass through untouched.
    pub fn with_base_path(mut self, base_path: impl Into<PathBuf>) -> Self {
        self.base_path = Some(base_path.into());
        self
    }

    /// Controls whether errors carry the offending line's text.
    pub fn with_snippets(mut self, include_snippets: bool) -> Self {
        self.include_snippets = include_snippets;
        self
    }

    /// Renders the template against the given bindings.
    pub fn parse(&self, params: &Params) -> Result<ParsedSql, ParseError> {
        let backslash_escape = self.dialect.map_or(false, |d| d.backslash_is_escape());

        let sql = match &self.base_path {
            Some(base) => include::expand_includes(self.sql, base, &HashSet::new())?,
            None => self.sql.to_string(),
        };

        let mut units = line_unit::parse_lines(&sql, backslash_escape)?;
        #[cfg(feature = "tracing")]
        trace!(lines = units.len(), "assembled logical lines");

        units = directives::process_block_directives(units, params, self.include_snippets)?;

        for unit in &mut units {
            if unit.is_empty() {
                continue;
            }
            unit.content = directives::resolve_inline_conditions(&unit.content, params)
                .map_err(|e| {
                    let e = e.with_line(unit.line_number);
                    if self.include_snippets {
                        e.with_snippet(&unit.content)
                    } else {
                        e
                    }
                })?;
        }

        line_unit::build_tree(&mut units, backslash_escape);

        let has_sites = evaluate::evaluate_params(
            &mut units,
            params,
            backslash_escape,
            self.include_snippets,
        )?;
        evaluate::propagate_removal(&mut units, &has_sites);
        #[cfg(feature = "tracing")]
        trace!(
            removed = units.iter().filter(|u| u.removed).count(),
            "evaluated parameters"
        );

        let rebuilt = rebuild::rebuild(
            &units,
            params,
            self.dialect,
            backslash_escape,
            self.include_snippets,
        )?;
        let cleaned = cleanup::clean_sql(&rebuilt.sql, backslash_escape);

        let (sql, positional, named) =
            binder::bind_placeholders(&cleaned, rebuilt.binds, self.placeholder, params);
        #[cfg(feature = "tracing")]
        trace!(placeholders = positional.len(), "bound placeholders");

        Ok(ParsedSql {
            sql,
            params: positional,
            named_params: named,
            diagnostics: rebuilt.diagnostics,
        })
    }
}

/// Renders a template with `?` placeholders.
pub fn parse(sql: &str, params: &Params) -> Result<ParsedSql, ParseError> {
    TwoWayParser::new(sql).parse(params)
}

/// Renders a template with an explicit placeholder style.
pub fn parse_with_placeholder(
    sql: &str,
    params: &Params,
    placeholder: PlaceholderStyle,
) -> Result<ParsedSql, ParseError> {
    TwoWayParser::new(sql).with_placeholder(placeholder).parse(params)
}

/// Renders a template for a dialect, using the dialect's placeholder
/// style, IN-list limit, and LIKE escape set.
pub fn parse_with_dialect(
    sql: &str,
    params: &Params,
    dialect: Dialect,
) -> Result<ParsedSql, ParseError> {
    TwoWayParser::new(sql).with_dialect(dialect).parse(params)
}
