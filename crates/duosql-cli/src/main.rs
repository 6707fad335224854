//! duosql - render two-way SQL templates from the command line.

use duosql_cli::cli::{Args, OutputFormat};
use duosql_cli::input;
use duosql_cli::output;

use anyhow::{Context, Result};
use clap::Parser;
use duosql_core::{Severity, TwoWayParser};
use std::io::Write;
use std::process::ExitCode;

fn main() -> ExitCode {
    init_tracing();

    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("duosql: error: {e:#}");
            ExitCode::from(1)
        }
    }
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .try_init();
}

fn run() -> Result<()> {
    let args = Args::parse();

    let template = input::read_template(&args.template)?;
    let params = input::collect_params(&args.params, &args.params_file)?;

    let mut parser = TwoWayParser::new(&template);
    if let Some(dialect) = args.dialect {
        parser = parser.with_dialect(dialect.into());
    }
    if let Some(placeholder) = args.placeholder {
        parser = parser.with_placeholder(placeholder.into());
    }
    if let Some(ref base) = args.base_path {
        parser = parser.with_base_path(base.clone());
    }

    let result = parser.parse(&params).context("failed to render template")?;

    let rendered = match args.format {
        OutputFormat::Sql => output::format_sql(&result),
        OutputFormat::Json => output::format_json(&result, args.compact)?,
    };
    write_output(&args.output, &rendered)?;

    if !args.quiet && args.format != OutputFormat::Json {
        for diagnostic in &result.diagnostics {
            let level = match diagnostic.severity {
                Severity::Warning => "warning",
                Severity::Info => "info",
            };
            let location = diagnostic
                .line
                .map(|l| format!(" (line {l})"))
                .unwrap_or_default();
            eprintln!("duosql: {level}:{location} {}", diagnostic.message);
        }
    }

    Ok(())
}

fn write_output(path: &Option<std::path::PathBuf>, content: &str) -> Result<()> {
    if let Some(path) = path {
        std::fs::write(path, content)
            .with_context(|| format!("failed to write to {}", path.display()))?;
    } else {
        let mut stdout = std::io::stdout();
        stdout
            .write_all(content.as_bytes())
            .context("failed to write to stdout")?;
        if !content.ends_with('\n') {
            println!();
        }
    }
    Ok(())
}
