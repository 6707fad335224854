//! Parameter-site scanner for logical lines.
//!
//! A two-way template carries its parameters inside block comments
//! (`/* $name */'default'`). This module walks a logical line, skipping
//! string literals and ordinary comments, and produces the ordered list of
//! [`ParamSite`]s the evaluator and rewriter operate on.

use std::sync::OnceLock;

use regex::Regex;

use crate::error::{ParseError, ParseErrorKind};

/// Modifier flags parsed from a parameter comment prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub(crate) struct Modifiers {
    /// `$` — remove the line when the value is negative.
    pub removable: bool,
    /// `&` — remove the line when negative; no placeholder when positive.
    pub bindless: bool,
    /// `@` — error when the value is negative.
    pub required: bool,
    /// `?` — fallback chain member.
    pub fallback: bool,
    /// `!` — invert the polarity test for this site.
    pub negated: bool,
}

impl Modifiers {
    fn parse(prefix: &str) -> Self {
        Self {
            removable: prefix.contains('$'),
            bindless: prefix.contains('&'),
            required: prefix.contains('@'),
            fallback: prefix.contains('?'),
            negated: prefix.contains('!'),
        }
    }

    /// At most one of `$`, `&`, `@`, `?` may be present; `!` combines with
    /// any of them.
    fn is_legal(self) -> bool {
        let primary = [self.removable, self.bindless, self.required, self.fallback];
        primary.iter().filter(|&&f| f).count() <= 1
    }
}

/// Comparison operator adjacent to a pre-operator site.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CompareOp {
    Eq,
    Ne,
}

/// Auxiliary helper functions (`/*%concat(...)*/` and friends).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum HelperFunc {
    /// `%concat(...)` / `%C ...` — concatenate into one bound string.
    Concat,
    /// `%L ...` — concatenate, escape LIKE metacharacters, bind.
    LikeEscape,
    /// `%STR(name)` — splice the value verbatim.
    Str,
    /// `%SQL(name)` — splice the value verbatim.
    Sql,
}

/// What a site does when the rewriter reaches it.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum SiteKind {
    /// Plain placeholder substitution.
    Bind,
    /// A parenthesized default not behind `IN`: list values splice into the
    /// surrounding list in place.
    PartialIn,
    /// `IN /* name */(...)` — full IN-clause expansion.
    InList,
    /// `/* name */= 100` — the operator is rewritten by value shape.
    Compare(CompareOp),
    /// `col [NOT] LIKE /* name */'pat'` — list values fan out to OR/AND.
    Like { negated: bool },
    /// An auxiliary function call.
    Helper(HelperFunc),
}

/// One parameter or helper occurrence inside a logical line.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct ParamSite {
    /// Parameter name (for fallback chains, the first name).
    pub name: String,
    pub kind: SiteKind,
    pub modifiers: Modifiers,
    /// All names of a `?`-fallback chain, in order.
    pub fallback_names: Vec<String>,
    /// Raw helper arguments (`'%'`, `part`, ...), quoted literals included.
    pub helper_args: Vec<String>,
    /// Default literal text, quotes and parens included. Empty when absent.
    pub default_text: String,
    /// Byte range within the line that substitution replaces.
    pub start: usize,
    pub end: usize,
}

/// String/comment scanner state threaded across physical lines by the
/// line assembler.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct ScanState {
    pub in_single: bool,
    pub in_double: bool,
    pub in_block_comment: bool,
}

impl ScanState {
    pub fn is_open(self) -> bool {
        self.in_single || self.in_double || self.in_block_comment
    }
}

/// Advances the scanner state across one physical line.
///
/// Quote doubling (`''`, `""`) stays inside the literal; backslash escapes
/// are honoured when the dialect says so. A `--` outside any literal or
/// comment hides the rest of the physical line.
pub(crate) fn advance_state(line: &str, backslash_escape: bool, mut st: ScanState) -> ScanState {
    let bytes = line.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if st.in_block_comment {
            match line[i..].find("*/") {
                Some(off) => {
                    st.in_block_comment = false;
                    i += off + 2;
                }
                None => return st,
            }
            continue;
        }
        let ch = bytes[i];
        if st.in_single {
            if backslash_escape && ch == b'\\' {
                i += 2;
            } else if ch == b'\'' {
                if bytes.get(i + 1) == Some(&b'\'') {
                    i += 2;
                } else {
                    st.in_single = false;
                    i += 1;
                }
            } else {
                i += 1;
            }
            continue;
        }
        if st.in_double {
            if backslash_escape && ch == b'\\' {
                i += 2;
            } else if ch == b'"' {
                if bytes.get(i + 1) == Some(&b'"') {
                    i += 2;
                } else {
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
            b'-' if bytes.get(i + 1) == Some(&b'-') => return st,
            b'/' if bytes.get(i + 1) == Some(&b'*') => {
                st.in_block_comment = true;
                i += 2;
            }
            _ => i += 1,
        }
    }
    st
}

/// A block comment found outside string literals.
#[derive(Debug, Clone, PartialEq)]
struct CommentSpan {
    start: usize,
    end: usize,
    interior: String,
}

/// Collects `/* ... */` spans, honouring string literals, embedded newlines,
/// and `--` comment tails.
fn collect_comments(line: &str, backslash_escape: bool) -> Result<Vec<CommentSpan>, ParseError> {
    let bytes = line.as_bytes();
    let mut spans = Vec::new();
    let mut st = ScanState::default();
    let mut i = 0;
    while i < bytes.len() {
        let ch = bytes[i];
        if st.in_single {
            if backslash_escape && ch == b'\\' {
                i += 2;
            } else if ch == b'\'' {
                if bytes.get(i + 1) == Some(&b'\'') {
                    i += 2;
                } else {
                    st.in_single = false;
                    i += 1;
                }
            } else {
                i += 1;
            }
            continue;
        }
        if st.in_double {
            if backslash_escape && ch == b'\\' {
                i += 2;
            } else if ch == b'"' {
                if bytes.get(i + 1) == Some(&b'"') {
                    i += 2;
                } else {
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
            b'-' if bytes.get(i + 1) == Some(&b'-') => {
                // Line comment: skip to the end of this physical line.
                match line[i..].find('\n') {
                    Some(off) => i += off + 1,
                    None => break,
                }
            }
            b'/' if bytes.get(i + 1) == Some(&b'*') => {
                let Some(off) = line[i + 2..].find("*/") else {
                    return Err(ParseError::new(
                        ParseErrorKind::Unterminated,
                        "block comment is not terminated",
                    ));
                };
                let end = i + 2 + off + 2;
                spans.push(CommentSpan {
                    start: i,
                    end,
                    interior: line[i + 2..end - 2].to_string(),
                });
                i = end;
            }
            _ => i += 1,
        }
    }
    Ok(spans)
}

/// Classification of a comment interior.
enum Interior {
    Param { modifiers: Modifiers, name: String },
    Fallback { names: Vec<String> },
    Helper { func: HelperFunc, name: String, args: Vec<String> },
    /// `%if` / `%elseif` / `%else` / `%end` leftovers.
    InlineMarker(String),
    Include,
    Plain,
}

fn param_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^([$&@?!]+)?([A-Za-z_]\w*)$").expect("invalid param regex")
    })
}

fn fallback_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^\?[A-Za-z_]\w*(?:\s+\?[A-Za-z_]\w*)*$").expect("invalid fallback regex")
    })
}

fn in_behind_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)\bIN\s*$").expect("invalid IN regex"))
}

fn like_behind_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)\b(NOT\s+)?LIKE\s*$").expect("invalid LIKE regex"))
}

fn classify_interior(text: &str) -> Result<Interior, ParseError> {
    let trimmed = text.trim();

    if let Some(rest) = trimmed.strip_prefix('%') {
        let word: String = rest
            .chars()
            .take_while(|c| c.is_alphanumeric() || *c == '_')
            .collect();
        let tail = rest[word.len()..].trim();
        return match word.as_str() {
            "if" | "elseif" | "else" | "end" => Ok(Interior::InlineMarker(word)),
            "include" => Ok(Interior::Include),
            "concat" => parse_call_args(tail).map(|(name, args)| Interior::Helper {
                func: HelperFunc::Concat,
                name,
                args,
            }),
            "C" => parse_space_args(tail).map(|(name, args)| Interior::Helper {
                func: HelperFunc::Concat,
                name,
                args,
            }),
            "L" => parse_space_args(tail).map(|(name, args)| Interior::Helper {
                func: HelperFunc::LikeEscape,
                name,
                args,
            }),
            "STR" => parse_single_arg(tail).map(|name| Interior::Helper {
                func: HelperFunc::Str,
                name: name.clone(),
                args: vec![name],
            }),
            "SQL" => parse_single_arg(tail).map(|name| Interior::Helper {
                func: HelperFunc::Sql,
                name: name.clone(),
                args: vec![name],
            }),
            _ => Err(ParseError::new(
                ParseErrorKind::Directive,
                format!("unknown directive '%{word}'"),
            )),
        };
    }

    if fallback_regex().is_match(trimmed) {
        let names = trimmed
            .split_whitespace()
            .map(|part| part.trim_start_matches('?').to_string())
            .collect();
        return Ok(Interior::Fallback { names });
    }

    if let Some(caps) = param_regex().captures(trimmed) {
        let modifiers = Modifiers::parse(caps.get(1).map_or("", |m| m.as_str()));
        if !modifiers.is_legal() {
            return Err(ParseError::new(
                ParseErrorKind::Modifier,
                format!("conflicting modifiers on parameter '{}'", &caps[2]),
            ));
        }
        return Ok(Interior::Param {
            modifiers,
            name: caps[2].to_string(),
        });
    }

    Ok(Interior::Plain)
}

/// Parses `( 'lit', name, ... )` helper arguments.
fn parse_call_args(tail: &str) -> Result<(String, Vec<String>), ParseError> {
    let inner = tail
        .strip_prefix('(')
        .and_then(|t| t.strip_suffix(')'))
        .ok_or_else(|| {
            ParseError::new(
                ParseErrorKind::Directive,
                "helper call is missing its argument list",
            )
        })?;
    let args: Vec<String> = split_args(inner, ',');
    Ok((primary_name(&args), args))
}

/// Parses space-separated helper arguments (`%C '%' part '%'`).
fn parse_space_args(tail: &str) -> Result<(String, Vec<String>), ParseError> {
    let args = split_args(tail, ' ');
    if args.is_empty() {
        return Err(ParseError::new(
            ParseErrorKind::Directive,
            "helper is missing its arguments",
        ));
    }
    Ok((primary_name(&args), args))
}

fn parse_single_arg(tail: &str) -> Result<String, ParseError> {
    let inner = tail
        .strip_prefix('(')
        .and_then(|t| t.strip_suffix(')'))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| {
            ParseError::new(
                ParseErrorKind::Directive,
                "helper expects a single parameter name",
            )
        })?;
    Ok(inner.to_string())
}

/// Splits helper arguments on `sep`, keeping quoted literals intact.
fn split_args(text: &str, sep: char) -> Vec<String> {
    let mut args = Vec::new();
    let mut current = String::new();
    let mut quote: Option<char> = None;
    let mut chars = text.chars().peekable();
    while let Some(ch) = chars.next() {
        match quote {
            Some(q) => {
                current.push(ch);
                if ch == q {
                    if chars.peek() == Some(&q) {
                        current.push(chars.next().unwrap());
                    } else {
                        quote = None;
                    }
                }
            }
            None if ch == '\'' || ch == '"' => {
                quote = Some(ch);
                current.push(ch);
            }
            None if ch == sep || (sep == ' ' && ch.is_whitespace()) => {
                if !current.trim().is_empty() {
                    args.push(current.trim().to_string());
                }
                current.clear();
            }
            None => current.push(ch),
        }
    }
    if !current.trim().is_empty() {
        args.push(current.trim().to_string());
    }
    args
}

/// The bind name a concatenating helper uses: its first non-literal argument.
fn primary_name(args: &[String]) -> String {
    args.iter()
        .find(|a| !a.starts_with('\'') && !a.starts_with('"'))
        .cloned()
        .unwrap_or_else(|| "concat".to_string())
}

/// Parses the default literal following a parameter comment.
///
/// Returns the literal text (quotes/parens included) and the byte offset
/// just past it, or `None` when no default follows.
fn parse_default(line: &str, from: usize, backslash_escape: bool) -> Option<(String, usize)> {
    let rest = &line[from..];
    let skipped = rest.len() - rest.trim_start().len();
    let at = from + skipped;
    let rest = &line[at..];
    let mut chars = rest.char_indices();
    let (_, first) = chars.next()?;

    let end_off = match first {
        '\'' | '"' => closing_quote(rest, first, backslash_escape)?,
        '(' => rest.find(')').map(|i| i + 1)?,
        c if c.is_ascii_digit() => {
            let re = number_regex();
            re.find(rest).map(|m| m.end())?
        }
        c if c.is_alphabetic() || c == '_' => rest
            .char_indices()
            .take_while(|(_, c)| c.is_alphanumeric() || *c == '_')
            .last()
            .map(|(i, c)| i + c.len_utf8())?,
        _ => return None,
    };
    Some((rest[..end_off].to_string(), at + end_off))
}

fn number_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\d+(?:\.\d+)?").expect("invalid number regex"))
}

/// Finds the end of a quoted literal starting at offset 0, quote doubling
/// and optional backslash escapes included.
fn closing_quote(text: &str, quote: char, backslash_escape: bool) -> Option<usize> {
    let bytes = text.as_bytes();
    let q = quote as u8;
    let mut i = 1;
    while i < bytes.len() {
        let ch = bytes[i];
        if backslash_escape && ch == b'\\' {
            i += 2;
        } else if ch == q {
            if bytes.get(i + 1) == Some(&q) {
                i += 2;
            } else {
                return Some(i + 1);
            }
        } else {
            i += 1;
        }
    }
    None
}

/// Scans a logical line and returns its parameter sites in order.
pub(crate) fn scan_sites(
    line: &str,
    backslash_escape: bool,
) -> Result<Vec<ParamSite>, ParseError> {
    let comments = collect_comments(line, backslash_escape)?;
    let mut sites: Vec<ParamSite> = Vec::new();

    for comment in comments {
        let interior = classify_interior(&comment.interior)?;
        let last_end = sites.last().map_or(0, |s| s.end);

        match interior {
            Interior::Plain | Interior::Include => continue,
            Interior::InlineMarker(word) => {
                return Err(ParseError::new(
                    ParseErrorKind::Directive,
                    format!("inline '%{word}' without a matching '%if'"),
                ));
            }
            Interior::Helper { func, name, args } => {
                let (default_text, end) =
                    match parse_default(line, comment.end, backslash_escape) {
                        Some((text, end)) => (text, end),
                        None => (String::new(), comment.end),
                    };
                sites.push(ParamSite {
                    name,
                    kind: SiteKind::Helper(func),
                    modifiers: Modifiers::default(),
                    fallback_names: Vec::new(),
                    helper_args: args,
                    default_text,
                    start: comment.start,
                    end,
                });
            }
            Interior::Fallback { names } => {
                let (default_text, end) =
                    match parse_default(line, comment.end, backslash_escape) {
                        Some((text, end)) => (text, end),
                        None => (String::new(), comment.end),
                    };
                sites.push(ParamSite {
                    name: names[0].clone(),
                    kind: SiteKind::Bind,
                    modifiers: Modifiers {
                        removable: true,
                        fallback: true,
                        ..Modifiers::default()
                    },
                    fallback_names: names,
                    helper_args: Vec::new(),
                    default_text,
                    start: comment.start,
                    end,
                });
            }
            Interior::Param { modifiers, name } => {
                let site = build_param_site(
                    line,
                    &comment,
                    modifiers,
                    name,
                    last_end,
                    backslash_escape,
                );
                sites.push(site);
            }
        }
    }

    Ok(sites)
}

fn build_param_site(
    line: &str,
    comment: &CommentSpan,
    modifiers: Modifiers,
    name: String,
    last_end: usize,
    backslash_escape: bool,
) -> ParamSite {
    let prefix = &line[..comment.start];
    let default = parse_default(line, comment.end, backslash_escape);

    // IN /* name */(...) — the span swallows the keyword and the default list.
    if let Some((ref text, end)) = default {
        if text.starts_with('(') {
            if let Some(m) = in_behind_regex().find(prefix) {
                if m.start() >= last_end {
                    return ParamSite {
                        name,
                        kind: SiteKind::InList,
                        modifiers,
                        fallback_names: Vec::new(),
                        helper_args: Vec::new(),
                        default_text: text.clone(),
                        start: m.start(),
                        end,
                    };
                }
            }
        }
    }

    // col [NOT] LIKE /* name */'pat'
    if let Some(m) = like_behind_regex().find(prefix) {
        if m.start() >= last_end {
            let negated = m.as_str().trim_start().to_ascii_uppercase().starts_with("NOT");
            let (default_text, end) = match default {
                Some((text, end)) => (text, end),
                None => (String::new(), comment.end),
            };
            return ParamSite {
                name,
                kind: SiteKind::Like { negated },
                modifiers,
                fallback_names: Vec::new(),
                helper_args: Vec::new(),
                default_text,
                start: m.start(),
                end,
            };
        }
    }

    // /* name */= 100 — operator follows the comment instead of a default.
    if default.is_none() {
        if let Some((op, end)) = operator_default_after(line, comment.end, backslash_escape) {
            return ParamSite {
                name,
                kind: SiteKind::Compare(op),
                modifiers,
                fallback_names: Vec::new(),
                helper_args: Vec::new(),
                default_text: String::new(),
                start: comment.start,
                end,
            };
        }
    }

    let (default_text, end) = match default {
        Some((text, end)) => (text, end),
        None => (String::new(), comment.end),
    };
    let kind = if default_text.starts_with('(') {
        SiteKind::PartialIn
    } else {
        SiteKind::Bind
    };
    ParamSite {
        name,
        kind,
        modifiers,
        fallback_names: Vec::new(),
        helper_args: Vec::new(),
        default_text,
        start: comment.start,
        end,
    }
}

/// Matches `= default`, `<> default`, or `!= default` after a comment.
fn operator_default_after(
    line: &str,
    from: usize,
    backslash_escape: bool,
) -> Option<(CompareOp, usize)> {
    let rest = &line[from..];
    let skipped = rest.len() - rest.trim_start().len();
    let at = from + skipped;
    let rest = &line[at..];
    let (op, op_len) = if rest.starts_with("<>") || rest.starts_with("!=") {
        (CompareOp::Ne, 2)
    } else if rest.starts_with('=') {
        (CompareOp::Eq, 1)
    } else {
        return None;
    };
    let (_, end) = parse_default(line, at + op_len, backslash_escape)?;
    Some((op, end))
}
