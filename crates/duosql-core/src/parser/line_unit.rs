//! Logical line units and the indentation tree.
//!
//! The line is the atom of removal: every pruning decision marks whole
//! [`LineUnit`]s. Units live in one arena `Vec`; parent/child links are
//! indices into it, so no cycles are possible (a parent's indent is always
//! strictly smaller).

use std::sync::OnceLock;

use regex::Regex;

use crate::error::{ParseError, ParseErrorKind};
use crate::parser::tokenizer::{advance_state, ScanState};

/// Tab stops expand to this many columns when measuring indent.
const TAB_WIDTH: usize = 4;

/// One logical line of the template.
#[derive(Debug, Clone)]
pub(crate) struct LineUnit {
    /// One-based number of the first physical line.
    pub line_number: usize,
    /// The original text, physical newlines included.
    pub original: String,
    /// Indent depth of the first physical line; `None` for blank lines.
    pub indent: Option<usize>,
    /// Text with the first line's indent stripped. Multi-line string
    /// literals and glued separators keep their embedded newlines.
    pub content: String,
    /// Arena indices of child units.
    pub children: Vec<usize>,
    /// Arena index of the parent unit.
    pub parent: Option<usize>,
    /// Set by the evaluator and the removal propagator; removed units are
    /// skipped by the rewriter. Units are never deleted from the arena.
    pub removed: bool,
}

impl LineUnit {
    pub fn is_empty(&self) -> bool {
        self.indent.is_none()
    }
}

fn separator_only_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)^\s*(?:AND|OR|UNION(?:\s+ALL)?|INTERSECT|EXCEPT|,)\s*$")
            .expect("invalid separator regex")
    })
}

/// Splits the template into logical lines.
///
/// Physical lines are joined while a string literal or block comment stays
/// open, and separator-only lines (`AND`, `OR`, `UNION [ALL]`, `INTERSECT`,
/// `EXCEPT`, a bare `,`) are glued onto the next non-blank line so that the
/// pair lives or dies together.
pub(crate) fn parse_lines(
    sql: &str,
    backslash_escape: bool,
) -> Result<Vec<LineUnit>, ParseError> {
    let raw_lines: Vec<&str> = sql.lines().collect();
    let mut units: Vec<LineUnit> = Vec::new();
    let mut i = 0;

    while i < raw_lines.len() {
        let start_line_number = i + 1;
        let mut collected = vec![raw_lines[i]];
        let mut state = advance_state(raw_lines[i], backslash_escape, ScanState::default());

        while state.is_open() && i + 1 < raw_lines.len() {
            i += 1;
            collected.push(raw_lines[i]);
            state = advance_state(raw_lines[i], backslash_escape, state);
        }
        if state.is_open() {
            let what = if state.in_block_comment {
                "block comment"
            } else {
                "string literal"
            };
            return Err(ParseError::new(
                ParseErrorKind::Unterminated,
                format!("{what} is not terminated"),
            )
            .with_line(start_line_number)
            .with_snippet(collected[0]));
        }

        let first = collected[0];
        let stripped = first.trim_start();
        let indent = if stripped.is_empty() && collected.len() == 1 {
            None
        } else {
            Some(measure_indent(first))
        };

        let content = if collected.len() > 1 {
            let mut joined = stripped.to_string();
            for rest in &collected[1..] {
                joined.push('\n');
                joined.push_str(rest);
            }
            joined
        } else {
            stripped.to_string()
        };

        units.push(LineUnit {
            line_number: start_line_number,
            original: collected.join("\n"),
            indent,
            content,
            children: Vec::new(),
            parent: None,
            removed: false,
        });
        i += 1;
    }

    glue_separators(&mut units);
    Ok(units)
}

fn measure_indent(line: &str) -> usize {
    let mut indent = 0;
    for ch in line.chars() {
        match ch {
            ' ' => indent += 1,
            '\t' => indent += TAB_WIDTH,
            _ => break,
        }
    }
    indent
}

/// Merges separator-only units into the following non-blank unit. The glued
/// unit adopts the follower's indent; its content keeps the follower's
/// original indentation so the rewriter reproduces the text.
fn glue_separators(units: &mut Vec<LineUnit>) {
    let mut i = 0;
    while i < units.len() {
        let is_separator = !units[i].is_empty() && separator_only_regex().is_match(&units[i].content);
        if !is_separator {
            i += 1;
            continue;
        }
        let Some(next) = (i + 1..units.len()).find(|&j| !units[j].is_empty()) else {
            i += 1;
            continue;
        };

        let separator = units.remove(i);
        let next = next - 1;
        let follower = &mut units[next];
        follower.content = format!("{}\n{}", separator.content.trim(), follower.original);
        follower.original = format!("{}\n{}", separator.original, follower.original);
        follower.line_number = separator.line_number;
    }
}

/// Counts `(` minus `)` outside string literals and comments.
fn net_parens(content: &str, backslash_escape: bool) -> i32 {
    let bytes = content.as_bytes();
    let mut st = ScanState::default();
    let mut net = 0;
    let mut i = 0;
    while i < bytes.len() {
        if st.in_block_comment {
            match content[i..].find("*/") {
                Some(off) => {
                    st.in_block_comment = false;
                    i += off + 2;
                }
                None => break,
            }
            continue;
        }
        let ch = bytes[i];
        if st.in_single || st.in_double {
            let quote = if st.in_single { b'\'' } else { b'"' };
            if backslash_escape && ch == b'\\' {
                i += 2;
            } else if ch == quote {
                if bytes.get(i + 1) == Some(&quote) {
                    i += 2;
                } else {
                    st.in_single = false;
                    st.in_double = false;
                    i += 1;
                }
            } else {
                i += 1;
            }
            continue;
        }
        match ch {
            b'\'' => {
                st.in_single = true;
                i += 1;
            }
            b'"' => {
                st.in_double = true;
                i += 1;
            }
            b'-' if bytes.get(i + 1) == Some(&b'-') => match content[i..].find('\n') {
                Some(off) => i += off + 1,
                None => break,
            },
            b'/' if bytes.get(i + 1) == Some(&b'*') => {
                st.in_block_comment = true;
                i += 2;
            }
            b'(' => {
                net += 1;
                i += 1;
            }
            b')' => {
                net -= 1;
                i += 1;
            }
            _ => i += 1,
        }
    }
    net
}

/// Attaches every unit to the nearest prior unit of strictly smaller indent.
///
/// Units inside a parenthesized group whose opener sits on an earlier line
/// attach to that opener even when indentation alone would pick an earlier
/// ancestor; a line starting with `)` closes the innermost group before its
/// own parent is chosen.
pub(crate) fn build_tree(units: &mut [LineUnit], backslash_escape: bool) {
    let mut stack: Vec<usize> = Vec::new();
    let mut paren_stack: Vec<usize> = Vec::new();

    for idx in 0..units.len() {
        if units[idx].is_empty() {
            continue;
        }
        let indent = units[idx].indent.unwrap_or(0);
        let net = net_parens(&units[idx].content, backslash_escape);
        let leading_close = units[idx].content.trim_start().starts_with(')');

        if leading_close && !paren_stack.is_empty() {
            paren_stack.pop();
        }

        while let Some(&top) = stack.last() {
            if units[top].indent.unwrap_or(0) >= indent {
                stack.pop();
            } else {
                break;
            }
        }

        let mut parent = stack.last().copied();
        if let Some(&opener) = paren_stack.last() {
            if opener < idx && parent.map_or(true, |p| p < opener) {
                parent = Some(opener);
            }
        }

        if let Some(p) = parent {
            units[idx].parent = Some(p);
            units[p].children.push(idx);
        }
        stack.push(idx);

        let remaining = net + i32::from(leading_close);
        match remaining.cmp(&0) {
            std::cmp::Ordering::Greater => {
                for _ in 0..remaining {
                    paren_stack.push(idx);
                }
            }
            std::cmp::Ordering::Less => {
                for _ in 0..(-remaining) {
                    paren_stack.pop();
                }
            }
            std::cmp::Ordering::Equal => {}
        }
    }
}
