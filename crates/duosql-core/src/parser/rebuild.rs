//! Rebuilds SQL text from surviving lines.
//!
//! Each site is replaced back-to-front within its line so earlier byte
//! offsets stay valid. Placeholders are emitted as sentinels; see
//! [`crate::parser::binder`] for the final projection.

use std::sync::OnceLock;

use regex::Regex;

use crate::error::{ParseError, ParseErrorKind};
use crate::escape::escape_like;
use crate::parser::binder::{Bind, SENTINEL};
use crate::parser::evaluate::resolve_value;
use crate::parser::line_unit::LineUnit;
use crate::parser::tokenizer::{scan_sites, CompareOp, HelperFunc, ParamSite, SiteKind};
use crate::types::{diagnostic_codes, Diagnostic, Dialect, ParamValue, Params};

/// The rewriter's output: sentinel-bearing SQL plus the recorded binds.
#[derive(Debug, Default)]
pub(crate) struct RebuildOutput {
    pub sql: String,
    pub binds: Vec<Bind>,
    pub diagnostics: Vec<Diagnostic>,
}

/// One computed substitution within a line.
struct Replacement {
    start: usize,
    end: usize,
    text: String,
}

pub(crate) fn rebuild(
    units: &[LineUnit],
    params: &Params,
    dialect: Option<Dialect>,
    backslash_escape: bool,
    include_snippets: bool,
) -> Result<RebuildOutput, ParseError> {
    let mut out = RebuildOutput::default();
    let mut result_lines: Vec<String> = Vec::new();

    for unit in units {
        if unit.removed {
            continue;
        }
        if unit.is_empty() {
            result_lines.push(unit.original.clone());
            continue;
        }

        let mut line = unit.content.clone();
        let sites = scan_sites(&line, backslash_escape)
            .map_err(|e| locate(e, unit, include_snippets))?;
        let indent = " ".repeat(unit.indent.unwrap_or(0));

        if sites.is_empty() {
            result_lines.push(format!("{indent}{line}"));
            continue;
        }

        let mut replacements: Vec<Replacement> = Vec::with_capacity(sites.len());
        for site in &sites {
            let (replacement, binds, diagnostic) =
                substitute_site(&line, site, params, dialect, unit.line_number)
                    .map_err(|e| locate(e, unit, include_snippets))?;
            replacements.push(replacement);
            out.binds.extend(binds);
            if let Some(d) = diagnostic {
                out.diagnostics.push(d);
            }
        }

        for rep in replacements.iter().rev() {
            line.replace_range(rep.start..rep.end, &rep.text);
        }
        result_lines.push(format!("{indent}{line}"));
    }

    out.sql = result_lines.join("\n");
    Ok(out)
}

fn locate(err: ParseError, unit: &LineUnit, include_snippets: bool) -> ParseError {
    let err = if err.line.is_some() {
        err
    } else {
        err.with_line(unit.line_number)
    };
    if include_snippets && err.snippet.is_none() {
        err.with_snippet(&unit.content)
    } else {
        err
    }
}

fn sentinels(n: usize) -> String {
    let one = SENTINEL.to_string();
    vec![one; n].join(", ")
}

fn bind(name: &str, value: ParamValue, indexed: bool) -> Bind {
    Bind {
        name: name.to_string(),
        value,
        indexed,
    }
}

#[allow(clippy::too_many_lines)]
fn substitute_site(
    line: &str,
    site: &ParamSite,
    params: &Params,
    dialect: Option<Dialect>,
    line_number: usize,
) -> Result<(Replacement, Vec<Bind>, Option<Diagnostic>), ParseError> {
    let value = resolve_value(site, params);

    // `&` drops the comment (and its default) without binding anything.
    if site.modifiers.bindless {
        return Ok((
            Replacement {
                start: site.start,
                end: site.end,
                text: String::new(),
            },
            Vec::new(),
            None,
        ));
    }

    let mut start = site.start;
    let mut binds = Vec::new();
    let mut diagnostic = None;

    let text = match &site.kind {
        SiteKind::InList => match &value {
            ParamValue::List(items) => {
                let limit = dialect.and_then(|d| d.in_clause_limit());
                if let Some(limit) = limit.filter(|&l| items.len() > l) {
                    let Some((col, col_start)) = extract_in_column(line, site.start) else {
                        return Err(ParseError::new(
                            ParseErrorKind::Dialect,
                            "cannot locate the column expression for IN-list splitting",
                        ));
                    };
                    start = col_start;
                    for item in items {
                        binds.push(bind(&site.name, item.clone(), true));
                    }
                    let parts: Vec<String> = items
                        .chunks(limit)
                        .map(|chunk| format!("{col} IN ({})", sentinels(chunk.len())))
                        .collect();
                    format!("({})", parts.join(" OR "))
                } else if items.is_empty() {
                    "IN (NULL)".to_string()
                } else {
                    for item in items {
                        binds.push(bind(&site.name, item.clone(), true));
                    }
                    format!("IN ({})", sentinels(items.len()))
                }
            }
            other => {
                binds.push(bind(&site.name, other.clone(), false));
                format!("IN ({SENTINEL})")
            }
        },

        SiteKind::Compare(op) => {
            let negation = *op == CompareOp::Ne;
            match &value {
                ParamValue::Null => {
                    if negation {
                        "IS NOT NULL".to_string()
                    } else {
                        "IS NULL".to_string()
                    }
                }
                ParamValue::List(items) if items.is_empty() => {
                    if negation {
                        "IS NOT NULL".to_string()
                    } else {
                        "IS NULL".to_string()
                    }
                }
                ParamValue::List(items) if items.len() == 1 => {
                    binds.push(bind(&site.name, items[0].clone(), false));
                    format!("{} {SENTINEL}", if negation { "<>" } else { "=" })
                }
                ParamValue::List(items) => {
                    for item in items {
                        binds.push(bind(&site.name, item.clone(), true));
                    }
                    format!(
                        "{}IN ({})",
                        if negation { "NOT " } else { "" },
                        sentinels(items.len())
                    )
                }
                scalar => {
                    binds.push(bind(&site.name, scalar.clone(), false));
                    format!("{} {SENTINEL}", if negation { "<>" } else { "=" })
                }
            }
        }

        SiteKind::Like { negated } => {
            let col = extract_column_before(line, site.start);
            let prefix_len = line[..site.start].trim_end().len();
            start = prefix_len - col.len();
            let keyword = if *negated { "NOT LIKE" } else { "LIKE" };
            match &value {
                ParamValue::List(items) if items.is_empty() => {
                    // LIKE over nothing never matches; NOT LIKE always does.
                    let tautology = if *negated { "1=1" } else { "1=0" };
                    tautology.to_string()
                }
                ParamValue::List(items) => {
                    let joiner = if *negated { " AND " } else { " OR " };
                    for item in items {
                        binds.push(bind(&site.name, item.clone(), true));
                    }
                    let parts: Vec<String> = items
                        .iter()
                        .map(|_| format!("{col} {keyword} {SENTINEL}"))
                        .collect();
                    format!("({})", parts.join(joiner))
                }
                other => {
                    binds.push(bind(&site.name, other.clone(), false));
                    format!("{col} {keyword} {SENTINEL}")
                }
            }
        }

        SiteKind::PartialIn => match &value {
            ParamValue::List(items) => {
                if items.is_empty() {
                    "NULL".to_string()
                } else {
                    for item in items {
                        binds.push(bind(&site.name, item.clone(), true));
                    }
                    sentinels(items.len())
                }
            }
            other => {
                binds.push(bind(&site.name, other.clone(), false));
                SENTINEL.to_string()
            }
        },

        SiteKind::Helper(func) => match func {
            HelperFunc::Concat => {
                let concatenated = concat_args(&site.helper_args, params, None);
                binds.push(bind(&site.name, ParamValue::Text(concatenated), false));
                SENTINEL.to_string()
            }
            HelperFunc::LikeEscape => {
                let dialect = dialect.unwrap_or_default();
                let concatenated = concat_args(&site.helper_args, params, Some(dialect));
                binds.push(bind(&site.name, ParamValue::Text(concatenated), false));
                if has_escape_clause(line) {
                    SENTINEL.to_string()
                } else {
                    format!("{SENTINEL} ESCAPE '#'")
                }
            }
            HelperFunc::Str | HelperFunc::Sql => {
                let spliced = match params.get(&site.name) {
                    Some(ParamValue::Null) | None => site.default_text.clone(),
                    Some(v) => v.to_text(),
                };
                let label = if *func == HelperFunc::Str { "%STR" } else { "%SQL" };
                diagnostic = Some(
                    Diagnostic::warning(
                        diagnostic_codes::RAW_EMBED,
                        format!(
                            "{label} spliced parameter '{}' into the SQL without binding",
                            site.name
                        ),
                    )
                    .with_line(line_number),
                );
                spliced
            }
        },

        SiteKind::Bind => {
            binds.push(bind(&site.name, value, false));
            SENTINEL.to_string()
        }
    };

    Ok((
        Replacement {
            start,
            end: site.end,
            text,
        },
        binds,
        diagnostic,
    ))
}

/// Concatenates helper arguments: quoted literals verbatim (doubling
/// unescaped), parameter names through their bound values. With a dialect,
/// parameter values are LIKE-escaped on the way in.
fn concat_args(args: &[String], params: &Params, escape_for: Option<Dialect>) -> String {
    let mut result = String::new();
    for arg in args {
        if let Some(literal) = unquote(arg) {
            result.push_str(&literal);
        } else if let Some(value) = params.get(arg) {
            if *value != ParamValue::Null {
                match escape_for {
                    Some(dialect) => result.push_str(&escape_like(&value.to_text(), dialect)),
                    None => result.push_str(&value.to_text()),
                }
            }
        }
    }
    result
}

fn unquote(arg: &str) -> Option<String> {
    for quote in ['\'', '"'] {
        if arg.len() >= 2 && arg.starts_with(quote) && arg.ends_with(quote) {
            let inner = &arg[1..arg.len() - 1];
            let doubled = format!("{quote}{quote}");
            return Some(inner.replace(&doubled, &quote.to_string()));
        }
    }
    None
}

fn escape_clause_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)\bESCAPE\s+'").expect("invalid escape regex"))
}

fn has_escape_clause(line: &str) -> bool {
    escape_clause_regex().is_match(line)
}

fn like_column_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(\w+(?:\.\w+)?)\s*$").expect("invalid column regex"))
}

/// Extracts the column expression before a LIKE keyword, falling back to
/// the last dotted word of the prefix.
fn extract_column_before(line: &str, token_start: usize) -> String {
    if let Some((col, _)) = extract_in_column(line, token_start) {
        return col;
    }
    let prefix = line[..token_start].trim_end();
    like_column_regex()
        .captures(prefix)
        .map(|caps| caps[1].to_string())
        .unwrap_or_default()
}

/// Extracts the column expression before an IN keyword for list splitting.
///
/// Handles identifier chains (`e.dept_id`), quoted identifiers, and
/// function calls (`LOWER(t.name)`). Returns the expression and its byte
/// offset, or `None` when the prefix does not end in one.
fn extract_in_column(line: &str, token_start: usize) -> Option<(String, usize)> {
    let prefix = line[..token_start].trim_end();
    if prefix.is_empty() {
        return None;
    }
    let chars: Vec<(usize, char)> = prefix.char_indices().collect();
    let last = chars.len() - 1;

    if chars[last].1 == ')' {
        let open = find_matching_open_paren(&chars, last)?;
        let mut expr_start = open;
        if open > 0 {
            if let Some(func_start) = parse_identifier_chain(&chars, open - 1) {
                expr_start = func_start;
            }
        }
        let byte_start = chars[expr_start].0;
        return Some((prefix[byte_start..].trim().to_string(), byte_start));
    }

    let ident_start = parse_identifier_chain(&chars, last)?;
    let byte_start = chars[ident_start].0;
    Some((prefix[byte_start..].trim().to_string(), byte_start))
}

fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '$'
}

/// Walks a dotted identifier chain backwards from `end`, returning the
/// index of its first character.
fn parse_identifier_chain(chars: &[(usize, char)], end: usize) -> Option<usize> {
    let mut i = end as isize;
    while i >= 0 && chars[i as usize].1.is_whitespace() {
        i -= 1;
    }
    if i < 0 {
        return None;
    }

    let mut start = parse_identifier_segment(chars, i as usize)?;
    i = start as isize - 1;

    while i >= 0 {
        let c = chars[i as usize].1;
        if c.is_whitespace() || c != '.' {
            return Some(start);
        }
        i -= 1;
        if i < 0 {
            return Some(start);
        }
        match parse_identifier_segment(chars, i as usize) {
            Some(seg_start) => {
                start = seg_start;
                i = start as isize - 1;
            }
            None => return Some(start),
        }
    }

    Some(start)
}

/// A single identifier segment ending at `end`: a quoted identifier or a
/// word that starts with a letter or underscore.
fn parse_identifier_segment(chars: &[(usize, char)], end: usize) -> Option<usize> {
    if chars[end].1 == '"' {
        let mut i = end as isize - 1;
        while i >= 0 {
            if chars[i as usize].1 == '"' {
                if i >= 1 && chars[(i - 1) as usize].1 == '"' {
                    i -= 2;
                    continue;
                }
                return Some(i as usize);
            }
            i -= 1;
        }
        return None;
    }

    if !is_ident_char(chars[end].1) {
        return None;
    }
    let mut i = end as isize;
    while i >= 0 && is_ident_char(chars[i as usize].1) {
        i -= 1;
    }
    let start = (i + 1) as usize;
    let first = chars[start].1;
    if !first.is_alphabetic() && first != '_' {
        return None;
    }
    Some(start)
}

/// Finds the `(` matching the `)` at `close_idx`, skipping quoted text.
fn find_matching_open_paren(chars: &[(usize, char)], close_idx: usize) -> Option<usize> {
    let mut depth = 0;
    let mut in_single = false;
    let mut in_double = false;
    let mut i = close_idx as isize;

    while i >= 0 {
        let c = chars[i as usize].1;
        if c == '\'' && !in_double {
            if i >= 1 && chars[(i - 1) as usize].1 == '\'' {
                i -= 2;
                continue;
            }
            in_single = !in_single;
            i -= 1;
            continue;
        }
        if c == '"' && !in_single {
            if i >= 1 && chars[(i - 1) as usize].1 == '"' {
                i -= 2;
                continue;
            }
            in_double = !in_double;
            i -= 1;
            continue;
        }
        if in_single || in_double {
            i -= 1;
            continue;
        }
        if c == ')' {
            depth += 1;
        } else if c == '(' {
            depth -= 1;
            if depth == 0 {
                return Some(i as usize);
            }
        }
        i -= 1;
    }
    None
}
