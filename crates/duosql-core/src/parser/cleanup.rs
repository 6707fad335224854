//! Bounded cleanup of the rebuilt SQL.
//!
//! Line removal leaves debris: dangling `WHERE`, a leading `AND` after the
//! first surviving condition, trailing separators, orphan set operators,
//! stray closing parens. Each pass below repairs one of those; the whole
//! function is idempotent, so running it on its own output changes nothing.
//!
//! Cleanup never crosses string-literal or comment boundaries. The text is
//! split into logical lines only at newlines *outside* any literal or
//! comment, and every pass matches against a masked shadow of each line in
//! which literal/comment bytes are blanked out; edits computed on the mask
//! apply to the real text at the same offsets.

use std::sync::OnceLock;

use regex::Regex;

use crate::parser::tokenizer::{advance_state, ScanState};

/// Placeholder byte for masked (string-literal or comment) content. Not
/// whitespace and not a word character, so no cleanup pattern can match
/// into it.
const MASK: u8 = 0x01;

/// One cleanup line: the real text and its masked shadow, byte-for-byte
/// the same length.
#[derive(Debug, Clone)]
struct CleanLine {
    text: String,
    masked: String,
}

impl CleanLine {
    fn is_blank(&self) -> bool {
        self.masked.trim().is_empty()
    }

    fn delete(&mut self, range: std::ops::Range<usize>) {
        self.text.replace_range(range.clone(), "");
        self.masked.replace_range(range, "");
    }

    fn truncate(&mut self, at: usize) {
        self.text.truncate(at);
        self.masked.truncate(at);
    }
}

fn set_operator_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)^\s*(?:UNION\s+ALL|UNION|EXCEPT|INTERSECT)\s*$")
            .expect("invalid set operator regex")
    })
}

fn bare_separator_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)^[ \t]*(?:AND|OR|,)[ \t]*$").expect("invalid separator regex")
    })
}

fn empty_parens_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    // The leading whitespace (or line start) keeps zero-argument function
    // calls such as NOW() out of reach.
    RE.get_or_init(|| Regex::new(r"(^|[ \t(])\([ \t]*\)").expect("invalid parens regex"))
}

fn trailing_conjunction_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)[ \t]+(?:AND|OR)[ \t]*$").expect("invalid conjunction regex")
    })
}

fn clause_tail_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)\b(?:WHERE|HAVING)[ \t]*$").expect("invalid clause tail regex")
    })
}

fn leading_conjunction_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)^([ \t]+)(?:AND|OR)\b[ \t]+").expect("invalid leading conjunction regex")
    })
}

fn clause_only_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)^[ \t]*(?:WHERE|HAVING)[ \t]*$").expect("invalid clause line regex")
    })
}

fn dangling_tail_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)[ \t]+(?:WHERE|HAVING)[ \t]*$").expect("invalid dangling tail regex")
    })
}

fn next_clause_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)^(?:ORDER|GROUP|LIMIT|UNION|EXCEPT|INTERSECT|FETCH|OFFSET|FOR)\b")
            .expect("invalid clause keyword regex")
    })
}

/// Repairs the rebuilt SQL after clause and line removal.
pub(crate) fn clean_sql(sql: &str, backslash_escape: bool) -> String {
    let mut lines = protected_lines(sql, backslash_escape);

    remove_orphan_set_operators(&mut lines);
    remove_unmatched_close_parens(&mut lines);
    collapse_empty_parens(&mut lines);
    lines.retain(|line| !bare_separator_regex().is_match(&line.masked));
    strip_trailing_conjunctions(&mut lines);
    remove_trailing_commas(&mut lines);
    strip_leading_conjunctions(&mut lines);
    remove_dangling_clauses(&mut lines);
    collapse_blank_runs(&mut lines);

    let texts: Vec<&str> = lines.iter().map(|l| l.text.as_str()).collect();
    texts.join("\n")
}

/// Splits the SQL at newlines outside string literals and comments, and
/// pairs each logical line with its masked shadow.
fn protected_lines(sql: &str, backslash_escape: bool) -> Vec<CleanLine> {
    let mut lines = Vec::new();
    let mut state = ScanState::default();
    let mut pending: Vec<&str> = Vec::new();

    for physical in sql.split('\n') {
        pending.push(physical);
        state = advance_state(physical, backslash_escape, state);
        if !state.is_open() {
            let text = pending.join("\n");
            let masked = mask_protected(&text, backslash_escape);
            lines.push(CleanLine { text, masked });
            pending.clear();
        }
    }
    if !pending.is_empty() {
        // A splice left something unterminated; keep it opaque.
        let text = pending.join("\n");
        let masked = mask_protected(&text, backslash_escape);
        lines.push(CleanLine { text, masked });
    }
    lines
}

/// Blanks every byte inside a string literal or comment (delimiters
/// included), preserving length so offsets map one to one.
fn mask_protected(text: &str, backslash_escape: bool) -> String {
    let bytes = text.as_bytes();
    let mut out = bytes.to_vec();
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            quote @ (b'\'' | b'"') => {
                out[i] = MASK;
                i += 1;
                while i < bytes.len() {
                    let ch = bytes[i];
                    out[i] = MASK;
                    if backslash_escape && ch == b'\\' {
                        if i + 1 < bytes.len() {
                            out[i + 1] = MASK;
                        }
                        i += 2;
                    } else if ch == quote {
                        if bytes.get(i + 1) == Some(&quote) {
                            out[i + 1] = MASK;
                            i += 2;
                        } else {
                            i += 1;
                            break;
                        }
                    } else {
                        i += 1;
                    }
                }
            }
            b'-' if bytes.get(i + 1) == Some(&b'-') => {
                while i < bytes.len() && bytes[i] != b'\n' {
                    out[i] = MASK;
                    i += 1;
                }
            }
            b'/' if bytes.get(i + 1) == Some(&b'*') => {
                let end = text[i + 2..]
                    .find("*/")
                    .map_or(bytes.len(), |off| i + 2 + off + 2);
                for byte in &mut out[i..end] {
                    *byte = MASK;
                }
                i = end;
            }
            _ => i += 1,
        }
    }
    String::from_utf8(out).expect("masking replaces whole characters")
}

/// Drops set-operator lines with no surviving query on one side, then
/// collapses runs of consecutive set operators down to the first.
fn remove_orphan_set_operators(lines: &mut Vec<CleanLine>) {
    let is_set_operator = |line: &CleanLine| set_operator_regex().is_match(&line.masked);

    let mut changed = true;
    while changed {
        changed = false;
        let mut kept: Vec<CleanLine> = Vec::with_capacity(lines.len());
        for (i, line) in lines.iter().enumerate() {
            if !is_set_operator(line) {
                kept.push(line.clone());
                continue;
            }
            let has_before = lines[..i]
                .iter()
                .any(|l| !l.is_blank() && !is_set_operator(l));
            let has_after = lines[i + 1..]
                .iter()
                .any(|l| !l.is_blank() && !is_set_operator(l));
            if has_before && has_after {
                kept.push(line.clone());
            } else {
                changed = true;
            }
        }
        *lines = kept;
    }

    let mut result = Vec::with_capacity(lines.len());
    let mut previous_was_set_op = false;
    for line in lines.drain(..) {
        if is_set_operator(&line) {
            if !previous_was_set_op {
                result.push(line);
                previous_was_set_op = true;
            }
        } else {
            if !line.is_blank() {
                previous_was_set_op = false;
            }
            result.push(line);
        }
    }
    *lines = result;
}

/// Drops `)`-only lines that close nothing. Parens hidden inside literals
/// or comments never count.
fn remove_unmatched_close_parens(lines: &mut Vec<CleanLine>) {
    let mut open_stack = 0usize;
    let mut removed = vec![false; lines.len()];

    for (i, line) in lines.iter().enumerate() {
        let stripped = line.masked.trim();
        if stripped == ")" {
            if open_stack > 0 {
                open_stack -= 1;
            } else {
                removed[i] = true;
            }
        } else if stripped.ends_with('(') {
            let opens = stripped.matches('(').count();
            let closes = stripped.matches(')').count();
            if opens > closes {
                open_stack += 1;
            }
        }
    }

    let mut idx = 0;
    lines.retain(|_| {
        let keep = !removed[idx];
        idx += 1;
        keep
    });
}

/// Collapses `( )` pairs whose interior is whitespace.
fn collapse_empty_parens(lines: &mut [CleanLine]) {
    for line in lines.iter_mut() {
        loop {
            let Some(caps) = empty_parens_regex().captures(&line.masked) else {
                break;
            };
            let whole = caps.get(0).unwrap();
            let keep = caps.get(1).map_or(0, |m| m.len());
            line.delete(whole.start() + keep..whole.end());
        }
    }
}

/// A trailing AND/OR survives when the following line was removed.
fn strip_trailing_conjunctions(lines: &mut [CleanLine]) {
    for line in lines.iter_mut() {
        if let Some(m) = trailing_conjunction_regex().find(&line.masked) {
            line.truncate(m.start());
        }
    }
}

/// Drops a trailing comma when the next non-blank line starts with `)`.
fn remove_trailing_commas(lines: &mut [CleanLine]) {
    for i in 0..lines.len() {
        let trimmed_len = lines[i].masked.trim_end().len();
        if trimmed_len == 0 || !lines[i].masked[..trimmed_len].ends_with(',') {
            continue;
        }
        let closes_next = lines[i + 1..]
            .iter()
            .find(|l| !l.is_blank())
            .map_or(false, |l| l.masked.trim_start().starts_with(')'));
        if closes_next {
            lines[i].delete(trimmed_len - 1..trimmed_len);
        }
    }
}

/// The first surviving condition after a line ending in WHERE/HAVING loses
/// its leading AND/OR.
fn strip_leading_conjunctions(lines: &mut [CleanLine]) {
    for i in 0..lines.len() {
        if !clause_tail_regex().is_match(&lines[i].masked) {
            continue;
        }
        let Some(j) = (i + 1..lines.len()).find(|&j| !lines[j].is_blank()) else {
            continue;
        };
        if let Some(caps) = leading_conjunction_regex().captures(&lines[j].masked) {
            let indent_end = caps.get(1).unwrap().end();
            let match_end = caps.get(0).unwrap().end();
            lines[j].delete(indent_end..match_end);
        }
    }
}

/// Drops a WHERE/HAVING with nothing left under it: at the end of the
/// text, directly before the next clause keyword, or directly before a
/// bare closing paren.
fn remove_dangling_clauses(lines: &mut Vec<CleanLine>) {
    let mut i = 0;
    while i < lines.len() {
        let vacuous_follower = lines.get(i + 1).map_or(false, |next| {
            let trimmed = next.masked.trim_start();
            next_clause_regex().is_match(trimmed) || trimmed.starts_with(')')
        });
        if vacuous_follower {
            if clause_only_regex().is_match(&lines[i].masked) {
                lines.remove(i);
                continue;
            }
            if let Some(start) = dangling_tail_regex().find(&lines[i].masked).map(|m| m.start()) {
                lines[i].truncate(start);
            }
        }
        i += 1;
    }

    while let Some(last) = lines.iter().rposition(|l| !l.is_blank()) {
        if clause_only_regex().is_match(&lines[last].masked) {
            lines.truncate(last);
            continue;
        }
        if let Some(start) = dangling_tail_regex().find(&lines[last].masked).map(|m| m.start()) {
            lines[last].truncate(start);
            lines.truncate(last + 1);
            continue;
        }
        break;
    }
}

/// Collapses runs of two or more blank lines to one.
fn collapse_blank_runs(lines: &mut Vec<CleanLine>) {
    let mut result = Vec::with_capacity(lines.len());
    let mut run = 0usize;
    for line in lines.drain(..) {
        if line.is_blank() {
            run += 1;
            if run == 1 {
                result.push(line);
            }
        } else {
            run = 0;
            result.push(line);
        }
    }
    *lines = result;
}
