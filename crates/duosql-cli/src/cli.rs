//! CLI argument parsing using clap.

use clap::{Parser, ValueEnum};
use std::path::PathBuf;

/// duosql - two-way SQL template renderer
#[derive(Parser, Debug)]
#[command(name = "duosql")]
#[command(about = "Render two-way SQL templates into bound statements", long_about = None)]
#[command(version)]
pub struct Args {
    /// Template file to render (reads from stdin if omitted)
    #[arg(value_name = "TEMPLATE")]
    pub template: Option<PathBuf>,

    /// SQL dialect
    #[arg(short, long, value_enum)]
    pub dialect: Option<DialectArg>,

    /// Placeholder style, overriding the dialect's default
    #[arg(long, value_enum)]
    pub placeholder: Option<PlaceholderArg>,

    /// Parameter binding in KEY=VALUE format (can be repeated).
    /// Values are parsed as JSON, falling back to plain strings.
    #[arg(short = 'p', long = "param", value_name = "KEY=VALUE")]
    pub params: Vec<String>,

    /// JSON object file with parameter bindings
    #[arg(long = "params", value_name = "FILE")]
    pub params_file: Option<PathBuf>,

    /// Base directory for %include resolution
    #[arg(long, value_name = "DIR")]
    pub base_path: Option<PathBuf>,

    /// Output format
    #[arg(short, long, default_value = "sql", value_enum)]
    pub format: OutputFormat,

    /// Output file (defaults to stdout)
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Compact JSON output (no pretty-printing)
    #[arg(short, long)]
    pub compact: bool,

    /// Suppress diagnostics on stderr
    #[arg(short, long)]
    pub quiet: bool,
}

/// SQL dialect options
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum DialectArg {
    Sqlite,
    Postgresql,
    Mysql,
    Oracle,
}

impl From<DialectArg> for duosql_core::Dialect {
    fn from(d: DialectArg) -> Self {
        match d {
            DialectArg::Sqlite => duosql_core::Dialect::Sqlite,
            DialectArg::Postgresql => duosql_core::Dialect::Postgresql,
            DialectArg::Mysql => duosql_core::Dialect::Mysql,
            DialectArg::Oracle => duosql_core::Dialect::Oracle,
        }
    }
}

/// Placeholder style options
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum PlaceholderArg {
    /// `?` positional placeholders
    Question,
    /// `%s` positional placeholders
    Format,
    /// `:name` named placeholders
    Named,
}

impl From<PlaceholderArg> for duosql_core::PlaceholderStyle {
    fn from(p: PlaceholderArg) -> Self {
        match p {
            PlaceholderArg::Question => duosql_core::PlaceholderStyle::Question,
            PlaceholderArg::Format => duosql_core::PlaceholderStyle::Format,
            PlaceholderArg::Named => duosql_core::PlaceholderStyle::Named,
        }
    }
}

/// Output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// The rendered SQL text
    Sql,
    /// The full parse result as JSON
    Json,
}
