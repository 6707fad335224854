//! `%include` expansion.
//!
//! Includes are textual: the referenced file's content replaces the
//! directive before line assembly, recursively. Relative paths resolve
//! against the including file's directory; a visited set along the current
//! include path catches cycles (the same fragment may still appear twice
//! through different branches).

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use regex::Regex;

use crate::error::{ParseError, ParseErrorKind};

fn include_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r#"/\*\s*%include\s+(?:"([^"]+)"|'([^']+)')\s*\*/|--\s*%include\s+(?:"([^"]+)"|'([^']+)')"#,
        )
        .expect("invalid include regex")
    })
}

/// One `%include` directive found on a line.
#[derive(Debug, Clone, PartialEq)]
struct IncludeRef {
    path: String,
    start: usize,
    end: usize,
}

fn parse_includes(line: &str) -> Vec<IncludeRef> {
    include_regex()
        .captures_iter(line)
        .map(|caps| {
            let whole = caps.get(0).unwrap();
            let path = caps
                .get(1)
                .or_else(|| caps.get(2))
                .or_else(|| caps.get(3))
                .or_else(|| caps.get(4))
                .map(|m| m.as_str().to_string())
                .unwrap_or_default();
            IncludeRef {
                path,
                start: whole.start(),
                end: whole.end(),
            }
        })
        .collect()
}

/// Expands every `%include` in `sql`, resolving paths against `base`.
pub(crate) fn expand_includes(
    sql: &str,
    base: &Path,
    visited: &HashSet<PathBuf>,
) -> Result<String, ParseError> {
    let mut result_lines: Vec<String> = Vec::new();

    for (line_idx, line) in sql.split('\n').enumerate() {
        let includes = parse_includes(line);
        if includes.is_empty() {
            result_lines.push(line.to_string());
            continue;
        }

        let mut processed = line.to_string();
        for include in includes.iter().rev() {
            let joined = base.join(&include.path);
            if !joined.is_file() {
                return Err(ParseError::new(
                    ParseErrorKind::SqlFileNotFound,
                    format!("included SQL file not found: {}", joined.display()),
                )
                .with_line(line_idx + 1));
            }
            let canonical = joined.canonicalize().map_err(|e| {
                ParseError::new(
                    ParseErrorKind::SqlFileNotFound,
                    format!("cannot resolve included SQL file {}: {e}", joined.display()),
                )
                .with_line(line_idx + 1)
            })?;

            if visited.contains(&canonical) {
                return Err(ParseError::new(
                    ParseErrorKind::IncludeCycle,
                    format!("include cycle through {}", canonical.display()),
                )
                .with_line(line_idx + 1));
            }

            let included = std::fs::read_to_string(&canonical).map_err(|e| {
                ParseError::new(
                    ParseErrorKind::SqlFileNotFound,
                    format!("cannot read included SQL file {}: {e}", canonical.display()),
                )
                .with_line(line_idx + 1)
            })?;

            let mut branch_visited = visited.clone();
            branch_visited.insert(canonical.clone());
            let next_base = canonical.parent().unwrap_or(base);
            let expanded = expand_includes(&included, next_base, &branch_visited)?;

            processed.replace_range(include.start..include.end, &expanded);
        }

        result_lines.push(processed);
    }

    Ok(result_lines.join("\n"))
}
