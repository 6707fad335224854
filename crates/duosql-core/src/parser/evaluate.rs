//! Parameter evaluation and removal propagation.
//!
//! Removal is clause-grained, not blindly line-grained: a negative
//! `$`/`&` site whose condition is delimited by an `AND`/`OR` at the same
//! paren depth takes only that clause with it, so single-line templates
//! like `WHERE a = /* $a */1 AND b = /* $b */2` keep their surviving
//! conditions. A dead clause with no such boundary removes its whole
//! [`LineUnit`], and the propagator then walks the tree bottom-up so that
//! structural lines (a `WHERE`, an opening paren) disappear with their
//! last surviving child.

use std::sync::OnceLock;

use regex::Regex;

use crate::error::{ParseError, ParseErrorKind};
use crate::parser::line_unit::LineUnit;
use crate::parser::tokenizer::{scan_sites, ParamSite, SiteKind};
use crate::types::{ParamValue, Params};

/// Resolves a site's value against the bindings. A missing name is Null;
/// a fallback chain yields its first positive value.
pub(crate) fn resolve_value(site: &ParamSite, params: &Params) -> ParamValue {
    if site.modifiers.fallback && !site.fallback_names.is_empty() {
        for name in &site.fallback_names {
            if let Some(value) = params.get(name) {
                if !value.is_negative() {
                    return value.clone();
                }
            }
        }
        return ParamValue::Null;
    }
    params.get(&site.name).cloned().unwrap_or(ParamValue::Null)
}

/// A clause-structure token found outside string literals and comments.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BoundaryKind {
    /// `AND` / `OR`.
    Separator,
    Open,
    Close,
    /// `WHERE` / `HAVING` / `ON` / `WHEN` — heads a condition region.
    LeftKeyword,
    /// `ORDER` / `GROUP` / `LIMIT` / set operators and friends.
    RightKeyword,
}

#[derive(Debug, Clone, Copy)]
struct Boundary {
    start: usize,
    end: usize,
    kind: BoundaryKind,
}

/// Scans a line for clause boundaries, skipping string literals, block
/// comments, and `--` tails.
fn clause_boundaries(line: &str, backslash_escape: bool) -> Vec<Boundary> {
    let bytes = line.as_bytes();
    let mut bounds = Vec::new();
    let mut in_single = false;
    let mut in_double = false;
    let mut i = 0;

    while i < bytes.len() {
        let ch = bytes[i];
        if in_single || in_double {
            let quote = if in_single { b'\'' } else { b'"' };
            if backslash_escape && ch == b'\\' {
                i += 2;
            } else if ch == quote {
                if bytes.get(i + 1) == Some(&quote) {
                    i += 2;
                } else {
                    in_single = false;
                    in_double = false;
                    i += 1;
                }
            } else {
                i += 1;
            }
            continue;
        }
        match ch {
            b'\'' => {
                in_single = true;
                i += 1;
            }
            b'"' => {
                in_double = true;
                i += 1;
            }
            b'-' if bytes.get(i + 1) == Some(&b'-') => match line[i..].find('\n') {
                Some(off) => i += off + 1,
                None => break,
            },
            b'/' if bytes.get(i + 1) == Some(&b'*') => match line[i + 2..].find("*/") {
                Some(off) => i += off + 4,
                None => break,
            },
            b'(' => {
                bounds.push(Boundary {
                    start: i,
                    end: i + 1,
                    kind: BoundaryKind::Open,
                });
                i += 1;
            }
            b')' => {
                bounds.push(Boundary {
                    start: i,
                    end: i + 1,
                    kind: BoundaryKind::Close,
                });
                i += 1;
            }
            c if c.is_ascii_alphanumeric() || c == b'_' => {
                let start = i;
                let is_word_start = c.is_ascii_alphabetic() || c == b'_';
                while i < bytes.len()
                    && (bytes[i].is_ascii_alphanumeric() || bytes[i] == b'_' || bytes[i] == b'$')
                {
                    i += 1;
                }
                if !is_word_start {
                    continue;
                }
                let kind = match line[start..i].to_ascii_uppercase().as_str() {
                    "AND" | "OR" => Some(BoundaryKind::Separator),
                    "WHERE" | "HAVING" | "ON" | "WHEN" => Some(BoundaryKind::LeftKeyword),
                    "ORDER" | "GROUP" | "LIMIT" | "UNION" | "EXCEPT" | "INTERSECT" | "OFFSET"
                    | "FETCH" | "FOR" => Some(BoundaryKind::RightKeyword),
                    _ => None,
                };
                if let Some(kind) = kind {
                    bounds.push(Boundary { start, end: i, kind });
                }
            }
            _ => i += 1,
        }
    }
    bounds
}

/// The byte range a dead site's clause occupies, separator included.
///
/// `None` means the clause has no adjacent same-depth `AND`/`OR` — the
/// whole line goes instead, exactly as if the clause stood on its own
/// line.
fn dead_clause_span(
    line: &str,
    bounds: &[Boundary],
    site_start: usize,
    site_end: usize,
) -> Option<(usize, usize)> {
    // Nearest boundary to the left, honouring paren nesting inside the
    // clause itself (function calls stay balanced).
    let mut left: Option<Boundary> = None;
    let mut balance = 0u32;
    for b in bounds.iter().rev().filter(|b| b.end <= site_start) {
        match b.kind {
            BoundaryKind::Close => balance += 1,
            BoundaryKind::Open if balance > 0 => balance -= 1,
            _ if balance > 0 => {}
            _ => {
                left = Some(*b);
                break;
            }
        }
    }

    let mut right: Option<Boundary> = None;
    let mut balance = 0u32;
    for b in bounds.iter().filter(|b| b.start >= site_end) {
        match b.kind {
            BoundaryKind::Open => balance += 1,
            BoundaryKind::Close if balance > 0 => balance -= 1,
            _ if balance > 0 => {}
            _ => {
                right = Some(*b);
                break;
            }
        }
    }

    let left_sep = left.filter(|b| b.kind == BoundaryKind::Separator);
    let right_sep = right.filter(|b| b.kind == BoundaryKind::Separator);

    if let Some(sep) = left_sep {
        // Take the preceding separator with the clause; stop short of the
        // next boundary so its own separator survives for the next clause.
        let start = line[..sep.start].trim_end().len();
        let end = match right {
            Some(b) => line[..b.start].trim_end().len(),
            None => line.trim_end().len(),
        };
        return Some((start, end));
    }

    if let Some(sep) = right_sep {
        // First clause: take the following separator instead.
        let clause_left = left.map_or(0, |b| b.end);
        let start = clause_left + whitespace_run(&line[clause_left..]);
        let end = sep.end + whitespace_run(&line[sep.end..]);
        return Some((start, end));
    }

    None
}

fn whitespace_run(text: &str) -> usize {
    text.len() - text.trim_start().len()
}

/// Marks dead clauses and lines based on their sites, and validates
/// `@`-required parameters. Returns, per unit, whether the unit still
/// carries any site (the propagator needs this to tell structural lines
/// apart).
pub(crate) fn evaluate_params(
    units: &mut [LineUnit],
    params: &Params,
    backslash_escape: bool,
    include_snippets: bool,
) -> Result<Vec<bool>, ParseError> {
    let mut has_sites = vec![false; units.len()];

    for idx in 0..units.len() {
        if units[idx].is_empty() || units[idx].removed {
            continue;
        }
        let sites = scan_sites(&units[idx].content, backslash_escape)
            .map_err(|e| locate(e, &units[idx], include_snippets))?;
        has_sites[idx] = !sites.is_empty();

        let mut whole_line = false;
        let mut dead_spans: Vec<(usize, usize)> = Vec::new();
        let mut boundaries: Option<Vec<Boundary>> = None;

        for site in &sites {
            if matches!(site.kind, SiteKind::Helper(_)) {
                continue;
            }
            // A site inside an already-dead clause goes with it.
            if dead_spans
                .iter()
                .any(|&(s, e)| site.start >= s && site.end <= e)
            {
                continue;
            }

            let value = params.get(&site.name);
            let mut negative = value.map_or(true, ParamValue::is_negative);
            if site.modifiers.negated {
                negative = !negative;
            }

            if site.modifiers.required && negative {
                return Err(locate(
                    ParseError::new(
                        ParseErrorKind::Required,
                        "required parameter is missing or negative",
                    )
                    .with_name(&site.name),
                    &units[idx],
                    include_snippets,
                ));
            }

            let dead = if site.modifiers.fallback && !site.fallback_names.is_empty() {
                site.fallback_names
                    .iter()
                    .all(|name| params.get(name).map_or(true, ParamValue::is_negative))
            } else if (site.modifiers.removable || site.modifiers.bindless) && negative {
                // An empty list behind IN stays: it renders as IN (NULL).
                !(site.kind == SiteKind::InList
                    && matches!(value, Some(ParamValue::List(items)) if items.is_empty()))
            } else {
                false
            };
            if !dead {
                continue;
            }

            let bounds = boundaries.get_or_insert_with(|| {
                clause_boundaries(&units[idx].content, backslash_escape)
            });
            match dead_clause_span(&units[idx].content, bounds, site.start, site.end) {
                Some(span) => dead_spans.push(span),
                None => {
                    whole_line = true;
                    break;
                }
            }
        }

        if whole_line {
            units[idx].removed = true;
            continue;
        }
        if dead_spans.is_empty() {
            continue;
        }

        let residue = delete_spans(&units[idx].content, dead_spans);
        if residue.trim().is_empty() {
            units[idx].removed = true;
            continue;
        }
        units[idx].content = residue;
        has_sites[idx] = !scan_sites(&units[idx].content, backslash_escape)
            .map_err(|e| locate(e, &units[idx], include_snippets))?
            .is_empty();
    }

    Ok(has_sites)
}

/// Deletes the (possibly overlapping) dead spans from a line.
fn delete_spans(content: &str, mut spans: Vec<(usize, usize)>) -> String {
    spans.sort_unstable();
    let mut merged: Vec<(usize, usize)> = Vec::with_capacity(spans.len());
    for span in spans {
        match merged.last_mut() {
            Some(last) if span.0 <= last.1 => last.1 = last.1.max(span.1),
            _ => merged.push(span),
        }
    }
    let mut residue = content.to_string();
    for &(start, end) in merged.iter().rev() {
        residue.replace_range(start..end, "");
    }
    residue.trim_end().to_string()
}

fn locate(err: ParseError, unit: &LineUnit, include_snippets: bool) -> ParseError {
    let err = err.with_line(unit.line_number);
    if include_snippets {
        err.with_snippet(&unit.content)
    } else {
        err
    }
}

fn protected_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)^(?:SELECT|INSERT|UPDATE|DELETE)\b").expect("invalid keyword regex")
    })
}

/// Bottom-up removal: a parent whose children are all removed is removed;
/// a site-less leaf whose siblings are all removed goes with them.
///
/// Lines opening with SELECT/INSERT/UPDATE/DELETE are exempt, so the query
/// body inside a `WITH name AS ( ... )` survives even when every condition
/// under it was pruned.
pub(crate) fn propagate_removal(units: &mut [LineUnit], has_sites: &[bool]) {
    let mut changed = true;
    while changed {
        changed = false;
        for idx in (0..units.len()).rev() {
            if units[idx].is_empty() || units[idx].removed {
                continue;
            }
            if units[idx].children.is_empty() {
                let Some(parent) = units[idx].parent else {
                    continue;
                };
                if has_sites[idx] || protected_regex().is_match(&units[idx].content) {
                    continue;
                }
                let others: Vec<usize> = units[parent]
                    .children
                    .iter()
                    .copied()
                    .filter(|&s| s != idx)
                    .collect();
                if !others.is_empty() && others.iter().all(|&s| units[s].removed) {
                    units[idx].removed = true;
                    changed = true;
                }
                continue;
            }
            if units[idx]
                .children
                .iter()
                .all(|&child| units[child].removed)
            {
                if protected_regex().is_match(&units[idx].content) {
                    continue;
                }
                units[idx].removed = true;
                changed = true;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::line_unit::{build_tree, parse_lines};
    use std::collections::HashMap;

    fn params(pairs: &[(&str, ParamValue)]) -> Params {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect::<HashMap<_, _>>()
    }

    fn evaluated(sql: &str, p: &Params) -> (Vec<LineUnit>, Vec<bool>) {
        let mut units = parse_lines(sql, false).unwrap();
        build_tree(&mut units, false);
        let has_sites = evaluate_params(&mut units, p, false, true).unwrap();
        (units, has_sites)
    }

    #[test]
    fn test_removable_null_removes_line() {
        let sql = "SELECT * FROM users\nWHERE\n  AND name = /* $name */'default'";
        let (units, _) = evaluated(sql, &params(&[("name", ParamValue::Null)]));
        assert!(units[2].removed);
    }

    #[test]
    fn test_removable_with_value_keeps_line() {
        let sql = "SELECT * FROM users\nWHERE\n  AND name = /* $name */'default'";
        let (units, _) = evaluated(sql, &params(&[("name", ParamValue::from("Alice"))]));
        assert!(!units[2].removed);
    }

    #[test]
    fn test_non_removable_null_keeps_line() {
        let sql = "SELECT * FROM users\nWHERE\n  AND name = /* name */'default'";
        let (units, _) = evaluated(sql, &params(&[("name", ParamValue::Null)]));
        assert!(!units[2].removed);
    }

    #[test]
    fn test_missing_param_removes_removable_line() {
        let sql = "SELECT * FROM users\nWHERE\n  AND name = /* $name */'default'";
        let (units, _) = evaluated(sql, &Params::new());
        assert!(units[2].removed);
    }

    #[test]
    fn test_dead_clause_carved_out_of_shared_line() {
        let sql = "SELECT * FROM t WHERE a = /* $a */1 AND b = /* $b */2";
        let (units, has_sites) = evaluated(
            sql,
            &params(&[("a", ParamValue::Int(10)), ("b", ParamValue::Null)]),
        );
        assert!(!units[0].removed);
        assert_eq!(units[0].content, "SELECT * FROM t WHERE a = /* $a */1");
        assert!(has_sites[0]);
    }

    #[test]
    fn test_first_clause_carved_out_takes_following_separator() {
        let sql = "WHERE a = /* $a */1 AND b = /* $b */2";
        let (units, _) = evaluated(
            sql,
            &params(&[("a", ParamValue::Null), ("b", ParamValue::Int(2))]),
        );
        assert_eq!(units[0].content, "WHERE b = /* $b */2");
    }

    #[test]
    fn test_all_clauses_dead_leaves_bare_clause_head() {
        let sql = "SELECT * FROM t WHERE a = /* $a */1 AND b = /* $b */2";
        let (units, has_sites) = evaluated(
            sql,
            &params(&[("a", ParamValue::Null), ("b", ParamValue::Null)]),
        );
        assert!(!units[0].removed);
        assert_eq!(units[0].content, "SELECT * FROM t WHERE");
        assert!(!has_sites[0]);
    }

    #[test]
    fn test_dead_clause_without_boundary_removes_whole_line() {
        let sql = "SELECT * FROM users\nWHERE\n    name = /* $name */'x'";
        let (units, _) = evaluated(sql, &params(&[("name", ParamValue::Null)]));
        assert!(units[2].removed);
    }

    #[test]
    fn test_separator_inside_string_is_not_a_boundary() {
        let sql = "WHERE note = 'a AND b' AND flag = /* $flag */1";
        let (units, _) = evaluated(sql, &params(&[("flag", ParamValue::Null)]));
        assert!(!units[0].removed);
        assert_eq!(units[0].content, "WHERE note = 'a AND b'");
    }

    #[test]
    fn test_required_negative_errors() {
        let sql = "SELECT * FROM users WHERE id = /* @id */1";
        let mut units = parse_lines(sql, false).unwrap();
        build_tree(&mut units, false);
        let err =
            evaluate_params(&mut units, &params(&[("id", ParamValue::Null)]), false, true)
                .unwrap_err();
        assert_eq!(err.kind, ParseErrorKind::Required);
        assert_eq!(err.name.as_deref(), Some("id"));
        assert_eq!(err.line, Some(1));
    }

    #[test]
    fn test_negated_flips_removal() {
        let sql = "WHERE\n  AND age = /* $!age */25\n  AND id = /* id */1";
        let (units, _) = evaluated(sql, &params(&[("age", ParamValue::Int(30)), ("id", ParamValue::Int(1))]));
        assert!(units[1].removed);

        let (units, _) = evaluated(sql, &params(&[("age", ParamValue::Null), ("id", ParamValue::Int(1))]));
        assert!(!units[1].removed);
    }

    #[test]
    fn test_propagation_removes_parent() {
        let sql = "SELECT * FROM users\nWHERE\n  AND a = /* $a */1\n  AND b = /* $b */2";
        let (mut units, has_sites) = evaluated(
            sql,
            &params(&[("a", ParamValue::Null), ("b", ParamValue::Null)]),
        );
        propagate_removal(&mut units, &has_sites);
        assert!(units[1].removed);
    }

    #[test]
    fn test_partial_children_keep_parent() {
        let sql = "SELECT * FROM users\nWHERE\n  AND a = /* $a */1\n  AND b = /* $b */2";
        let (mut units, has_sites) = evaluated(
            sql,
            &params(&[("a", ParamValue::Null), ("b", ParamValue::Int(2))]),
        );
        propagate_removal(&mut units, &has_sites);
        assert!(!units[1].removed);
    }

    #[test]
    fn test_propagation_through_grandchildren() {
        let sql = "WHERE\n  AND (\n    OR s = /* $s1 */'a'\n    OR s = /* $s2 */'b'\n  )";
        let (mut units, has_sites) = evaluated(
            sql,
            &params(&[("s1", ParamValue::Null), ("s2", ParamValue::Null)]),
        );
        propagate_removal(&mut units, &has_sites);
        assert!(units[2].removed);
        assert!(units[3].removed);
        assert!(units[1].removed);
        assert!(units[4].removed); // closing paren goes with its group
        assert!(units[0].removed); // WHERE goes last
    }

    #[test]
    fn test_select_line_protected() {
        let sql = "WITH f AS (\n    SELECT * FROM users\n    WHERE\n        s = /* $s */'a'\n)\nSELECT * FROM f";
        let (mut units, has_sites) = evaluated(sql, &params(&[("s", ParamValue::Null)]));
        propagate_removal(&mut units, &has_sites);
        assert!(units[3].removed); // the condition
        assert!(units[2].removed); // WHERE
        assert!(!units[1].removed); // SELECT inside the CTE survives
        assert!(!units[0].removed); // so the CTE header stays
        assert!(!units[4].removed); // and its closing paren
    }
}
