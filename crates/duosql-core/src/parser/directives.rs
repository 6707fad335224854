//! Conditional directives.
//!
//! Two surface forms select template text before parameters are evaluated:
//!
//! - block: `-- %IF cond` / `-- %ELSEIF cond` / `-- %ELSE` / `-- %END`,
//!   one directive per physical line, blocks may nest;
//! - inline: `/*%if cond */ a /*%elseif c2 */ b /*%else */ c /*%end*/`
//!   within a single logical line.
//!
//! Conditions are boolean expressions over binding names with `NOT` > `AND`
//! > `OR` and parentheses; a bare name is true iff its value is positive.

use std::sync::OnceLock;

use regex::Regex;

use crate::error::{ParseError, ParseErrorKind};
use crate::parser::line_unit::LineUnit;
use crate::types::Params;

/// A parsed block directive line.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Directive {
    pub dtype: DirectiveType,
    pub condition: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum DirectiveType {
    If,
    ElseIf,
    Else,
    End,
}

fn directive_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^--\s*%(\w+)\s*(.*)$").expect("invalid directive regex"))
}

/// Parses a unit's content as a block directive, if it is one.
///
/// `-- %include` lines are not block directives (they are expanded before
/// line assembly, or left untouched when includes are disabled). Any other
/// `-- %NAME` form is an error.
pub(crate) fn parse_directive(content: &str) -> Result<Option<Directive>, ParseError> {
    if content.contains('\n') {
        return Ok(None);
    }
    let Some(caps) = directive_regex().captures(content.trim()) else {
        return Ok(None);
    };
    let word = caps[1].to_ascii_uppercase();
    let rest = caps[2].trim();

    let (dtype, wants_condition) = match word.as_str() {
        "IF" => (DirectiveType::If, true),
        "ELSEIF" => (DirectiveType::ElseIf, true),
        "ELSE" => (DirectiveType::Else, false),
        "END" => (DirectiveType::End, false),
        "INCLUDE" => return Ok(None),
        _ => {
            return Err(ParseError::new(
                ParseErrorKind::Directive,
                format!("unknown directive '%{}'", &caps[1]),
            ));
        }
    };

    if wants_condition && rest.is_empty() {
        return Err(ParseError::new(
            ParseErrorKind::Directive,
            format!("%{word} is missing its condition"),
        ));
    }

    Ok(Some(Directive {
        dtype,
        condition: if wants_condition {
            Some(rest.to_string())
        } else {
            None
        },
    }))
}

/// Resolves `-- %IF` blocks, keeping exactly one branch per block.
/// Directive lines themselves never survive.
pub(crate) fn process_block_directives(
    units: Vec<LineUnit>,
    params: &Params,
    include_snippets: bool,
) -> Result<Vec<LineUnit>, ParseError> {
    let mut result = Vec::with_capacity(units.len());
    let mut i = 0;

    while i < units.len() {
        let directive = parse_directive(&units[i].content)
            .map_err(|e| locate(e, &units[i], include_snippets))?;

        match directive.map(|d| d.dtype) {
            None => {
                result.push(units[i].clone());
                i += 1;
            }
            Some(DirectiveType::If) => {
                let (end_idx, mut selected) =
                    process_if_block(&units, i, params, include_snippets)?;
                result.append(&mut selected);
                i = end_idx + 1;
            }
            Some(_) => {
                return Err(locate(
                    ParseError::new(
                        ParseErrorKind::Directive,
                        "directive without a matching %IF",
                    ),
                    &units[i],
                    include_snippets,
                ));
            }
        }
    }

    Ok(result)
}

/// Walks one `%IF` block, returning the index of its `%END` (or the last
/// unit when a single-branch block runs to end-of-input) and the surviving
/// branch, with nested blocks resolved recursively.
fn process_if_block(
    units: &[LineUnit],
    start_idx: usize,
    params: &Params,
    include_snippets: bool,
) -> Result<(usize, Vec<LineUnit>), ParseError> {
    let if_directive = parse_directive(&units[start_idx].content)
        .map_err(|e| locate(e, &units[start_idx], include_snippets))?
        .expect("caller checked this is an %IF line");

    let mut branches: Vec<(Option<String>, usize, usize)> = Vec::new();
    let mut current_condition = if_directive.condition;
    let mut current_start = start_idx + 1;
    let mut saw_alternative = false;
    let mut depth = 0usize;
    let mut end_idx = None;

    let mut i = start_idx + 1;
    while i < units.len() {
        let Some(directive) = parse_directive(&units[i].content)
            .map_err(|e| locate(e, &units[i], include_snippets))?
        else {
            i += 1;
            continue;
        };

        if directive.dtype == DirectiveType::If {
            depth += 1;
            i += 1;
            continue;
        }
        if depth > 0 {
            if directive.dtype == DirectiveType::End {
                depth -= 1;
            }
            i += 1;
            continue;
        }

        match directive.dtype {
            DirectiveType::ElseIf => {
                saw_alternative = true;
                branches.push((current_condition.take(), current_start, i));
                current_condition = directive.condition;
                current_start = i + 1;
                i += 1;
            }
            DirectiveType::Else => {
                saw_alternative = true;
                branches.push((current_condition.take(), current_start, i));
                current_condition = None;
                current_start = i + 1;
                i += 1;
            }
            DirectiveType::End => {
                branches.push((current_condition.take(), current_start, i));
                end_idx = Some(i);
                break;
            }
            DirectiveType::If => unreachable!(),
        }
    }

    let end_idx = match end_idx {
        Some(idx) => idx,
        // A single-branch block may run to end-of-input; anything with an
        // %ELSEIF/%ELSE needs its %END.
        None if !saw_alternative => {
            branches.push((current_condition.take(), current_start, units.len()));
            units.len().saturating_sub(1)
        }
        None => {
            return Err(locate(
                ParseError::new(
                    ParseErrorKind::Directive,
                    "unclosed %IF block (missing %END)",
                ),
                &units[start_idx],
                include_snippets,
            ));
        }
    };

    // The first true branch wins; an %ELSE branch has no condition and is
    // always true.
    let mut selected = Vec::new();
    for (condition, block_start, block_end) in branches {
        let truthy = match condition {
            None => true,
            Some(ref cond) => evaluate_condition(cond, params),
        };
        if truthy {
            let block = units[block_start..block_end].to_vec();
            selected = process_block_directives(block, params, include_snippets)?;
            break;
        }
    }

    Ok((end_idx, selected))
}

fn locate(err: ParseError, unit: &LineUnit, include_snippets: bool) -> ParseError {
    let err = err.with_line(unit.line_number);
    if include_snippets {
        err.with_snippet(&unit.content)
    } else {
        err
    }
}

/// Evaluates a condition expression against the bindings.
pub(crate) fn evaluate_condition(condition: &str, params: &Params) -> bool {
    parse_or_expr(condition.trim(), params)
}

fn parse_or_expr(expr: &str, params: &Params) -> bool {
    split_by_operator(expr, "OR")
        .iter()
        .any(|part| parse_and_expr(part.trim(), params))
}

fn parse_and_expr(expr: &str, params: &Params) -> bool {
    split_by_operator(expr, "AND")
        .iter()
        .all(|part| parse_not_expr(part.trim(), params))
}

fn parse_not_expr(expr: &str, params: &Params) -> bool {
    let expr = expr.trim();
    if expr.len() >= 4 && expr[..4].eq_ignore_ascii_case("NOT ") {
        return !parse_primary_expr(expr[4..].trim(), params);
    }
    parse_primary_expr(expr, params)
}

fn parse_primary_expr(expr: &str, params: &Params) -> bool {
    let expr = expr.trim();
    if let Some(inner) = expr.strip_prefix('(').and_then(|e| e.strip_suffix(')')) {
        return parse_or_expr(inner.trim(), params);
    }
    params.get(expr).map_or(false, |v| !v.is_negative())
}

/// Splits on a logical operator at paren depth zero. The operator must be
/// delimited by whitespace (or the ends of the expression).
fn split_by_operator(expr: &str, operator: &str) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut depth = 0usize;
    let chars: Vec<char> = expr.chars().collect();
    let op: Vec<char> = operator.chars().collect();
    let mut i = 0;

    while i < chars.len() {
        let ch = chars[i];
        if ch == '(' {
            depth += 1;
            current.push(ch);
            i += 1;
        } else if ch == ')' {
            depth = depth.saturating_sub(1);
            current.push(ch);
            i += 1;
        } else if depth == 0
            && i + op.len() <= chars.len()
            && chars[i..i + op.len()]
                .iter()
                .zip(&op)
                .all(|(a, b)| a.eq_ignore_ascii_case(b))
        {
            let before_ok = i == 0 || chars[i - 1].is_whitespace();
            let after_ok = i + op.len() >= chars.len() || chars[i + op.len()].is_whitespace();
            if before_ok && after_ok {
                parts.push(current.clone());
                current.clear();
                i += op.len();
            } else {
                current.push(ch);
                i += 1;
            }
        } else {
            current.push(ch);
            i += 1;
        }
    }

    if !current.is_empty() {
        parts.push(current);
    }
    if parts.is_empty() {
        parts.push(expr.to_string());
    }
    parts
}

/// One `/*%if*/.../*%end*/` construct found on a line.
#[derive(Debug, Clone, PartialEq)]
struct InlineConstruct {
    conditions: Vec<String>,
    values: Vec<String>,
    start: usize,
    end: usize,
}

fn inline_marker_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"/\*\s*%(if|elseif|else|end)\b([^*]*)\*/").expect("invalid inline regex")
    })
}

/// Resolves inline conditionals on one logical line. Exactly one branch's
/// text replaces the whole construct.
pub(crate) fn resolve_inline_conditions(
    line: &str,
    params: &Params,
) -> Result<String, ParseError> {
    let constructs = parse_inline_constructs(line)?;
    if constructs.is_empty() {
        return Ok(line.to_string());
    }

    let mut line = line.to_string();
    for construct in constructs.iter().rev() {
        let mut selected = String::new();
        let mut found = false;
        for (i, condition) in construct.conditions.iter().enumerate() {
            if evaluate_condition(condition, params) {
                selected = construct.values.get(i).cloned().unwrap_or_default();
                found = true;
                break;
            }
        }
        // No condition held: use the %else value when the construct has one.
        if !found && construct.values.len() > construct.conditions.len() {
            selected = construct.values.last().cloned().unwrap_or_default();
        }
        line.replace_range(construct.start..construct.end, &selected);
    }

    Ok(line)
}

fn parse_inline_constructs(line: &str) -> Result<Vec<InlineConstruct>, ParseError> {
    let mut constructs = Vec::new();
    let mut current: Option<InlineConstruct> = None;
    let mut last_marker_end = 0;

    for caps in inline_marker_regex().captures_iter(line) {
        let whole = caps.get(0).unwrap();
        let marker = caps[1].to_string();
        let condition = caps[2].trim().to_string();

        let Some(construct) = current.as_mut() else {
            if marker == "if" {
                current = Some(InlineConstruct {
                    conditions: vec![condition],
                    values: Vec::new(),
                    start: whole.start(),
                    end: 0,
                });
                last_marker_end = whole.end();
                continue;
            }
            return Err(ParseError::new(
                ParseErrorKind::Directive,
                format!("inline '%{marker}' without a matching '%if'"),
            ));
        };

        if marker == "if" {
            return Err(ParseError::new(
                ParseErrorKind::Directive,
                "nested inline %if is not supported",
            ));
        }

        construct
            .values
            .push(line[last_marker_end..whole.start()].trim().to_string());
        let mut finished = false;
        match marker.as_str() {
            "elseif" => construct.conditions.push(condition),
            "else" => {}
            "end" => {
                construct.end = whole.end();
                finished = true;
            }
            _ => unreachable!(),
        }
        if finished {
            constructs.push(current.take().unwrap());
        }
        last_marker_end = whole.end();
    }

    if current.is_some() {
        return Err(ParseError::new(
            ParseErrorKind::Directive,
            "inline %if without a matching %end",
        ));
    }

    Ok(constructs)
}
