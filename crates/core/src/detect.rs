//! `case class` detection over comment-stripped text.
//!
//! A hand-rolled scanner with an explicit bracket stack: it finds the keyword
//! pair, reads the declared name, optional type parameters and access
//! modifiers, then requires a balanced first parameter list. Anything that does
//! not balance before end of file is dropped as a [`Rejection`].

use crate::extract::split_top_level;
use crate::tokenizer::is_ident_byte;
use crate::types::Span;
use std::ops::Range;

/// A raw declaration occurrence, not yet split into fields.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Candidate {
    pub name: String,
    pub type_parameters: Vec<String>,
    /// `case` keyword through the closing paren of the first parameter list.
    pub span: Span,
    /// Inside of the first parameter list, parens excluded. May be empty.
    pub params: Range<usize>,
    /// End of the declaration statement; companions are merged here.
    pub insert_at: usize,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Rejection {
    MissingName,
    UnbalancedTypeParameters,
    MissingParameterList,
    UnbalancedParameterList,
}

impl std::fmt::Display for Rejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let msg = match self {
            Rejection::MissingName => "no name after `case class`",
            Rejection::UnbalancedTypeParameters => "type parameter list never closes",
            Rejection::MissingParameterList => "no parameter list",
            Rejection::UnbalancedParameterList => "parameter list never closes",
        };
        f.write_str(msg)
    }
}

#[derive(Clone, Debug, Default)]
pub struct Detection {
    pub candidates: Vec<Candidate>,
    /// (offset of the `case` keyword, reason)
    pub rejected: Vec<(usize, Rejection)>,
}

// ---------------------------------------------------------------------------
// Detection
// ---------------------------------------------------------------------------

/// Find every `case class` declaration in `cleaned` (output of
/// [`crate::tokenizer::strip_noise`]), in source order.
pub fn detect_declarations(cleaned: &str) -> Detection {
    let b = cleaned.as_bytes();
    let mut detection = Detection::default();
    let mut i = 0;

    while let Some(pos) = find_word(b, i, b"case") {
        let Some(after_keywords) = keyword_pair_end(b, pos) else {
            i = pos + 4;
            continue;
        };

        match read_declaration(cleaned, pos, after_keywords) {
            Ok(candidate) => {
                // Resume after the span: a keyword inside it cannot start another declaration.
                i = candidate.span.end;
                detection.candidates.push(candidate);
            }
            Err(reason) => {
                detection.rejected.push((pos, reason));
                i = after_keywords;
            }
        }
    }

    detection
}

/// If `case` at `pos` is followed by whitespace and a word-bounded `class`,
/// return the offset just past `class`.
fn keyword_pair_end(b: &[u8], pos: usize) -> Option<usize> {
    let gap = skip_ws(b, pos + 4);
    if gap == pos + 4 || !starts_with_word(b, gap, b"class") {
        return None;
    }
    Some(gap + 5)
}

fn read_declaration(cleaned: &str, pos: usize, after_keywords: usize) -> Result<Candidate, Rejection> {
    let b = cleaned.as_bytes();

    let mut j = skip_ws(b, after_keywords);
    let name_end = ident_end(b, j).ok_or(Rejection::MissingName)?;
    let name = cleaned[j..name_end].to_string();
    j = skip_ws(b, name_end);

    let mut type_parameters = Vec::new();
    if b.get(j) == Some(&b'[') {
        let close = match_brackets(b, j).ok_or(Rejection::UnbalancedTypeParameters)?;
        type_parameters = split_top_level(&cleaned[j + 1..close - 1], b',')
            .into_iter()
            .map(collapse_ws)
            .filter(|p| !p.is_empty())
            .collect();
        j = skip_ws(b, close);
    }

    j = skip_constructor_modifiers(b, j);

    if b.get(j) != Some(&b'(') {
        return Err(Rejection::MissingParameterList);
    }
    let close = match_brackets(b, j).ok_or(Rejection::UnbalancedParameterList)?;

    Ok(Candidate {
        name,
        type_parameters,
        span: Span::new(pos, close),
        params: j + 1..close - 1,
        insert_at: statement_end(b, pos, close),
    })
}

/// Skip `private`, `protected[scope]` and constructor annotations such as
/// `@Inject()` sitting between the type parameters and the parameter list.
fn skip_constructor_modifiers(b: &[u8], mut j: usize) -> usize {
    loop {
        if starts_with_word(b, j, b"private") || starts_with_word(b, j, b"protected") {
            j = skip_ws(b, ident_end(b, j).unwrap_or(j));
            if b.get(j) == Some(&b'[') {
                match match_brackets(b, j) {
                    Some(close) => j = skip_ws(b, close),
                    None => return j,
                }
            }
        } else if b.get(j) == Some(&b'@') {
            j = skip_annotation(b, j);
            j = skip_ws(b, j);
        } else {
            return j;
        }
    }
}

/// Skip `@pkg.Name[T](args)` starting at the `@`. Arguments only count when
/// attached directly to the name.
pub(crate) fn skip_annotation(b: &[u8], at: usize) -> usize {
    let mut j = at + 1;
    while let Some(end) = ident_end(b, j) {
        j = end;
        if b.get(j) == Some(&b'.') {
            j += 1;
        } else {
            break;
        }
    }
    for open in [b'[', b'('] {
        if b.get(j) == Some(&open) {
            if let Some(close) = match_brackets(b, j) {
                j = close;
            }
        }
    }
    j
}

// ---------------------------------------------------------------------------
// Bracket matching and statement ends
// ---------------------------------------------------------------------------

/// Index just past the bracket closing the one opened at `open`. `None` on a
/// mismatched closer or end of input.
pub fn match_brackets(b: &[u8], open: usize) -> Option<usize> {
    let mut stack: Vec<u8> = Vec::new();
    for (i, &c) in b.iter().enumerate().skip(open) {
        match c {
            b'(' => stack.push(b')'),
            b'[' => stack.push(b']'),
            b'{' => stack.push(b'}'),
            b')' | b']' | b'}' => {
                if stack.pop() != Some(c) {
                    return None;
                }
                if stack.is_empty() {
                    return Some(i + 1);
                }
            }
            _ => {}
        }
    }
    None
}

/// End of the declaration statement that continues at `from`: further
/// parameter lists, `extends`/`with`/`derives` clauses and a template body
/// belong to it. A line ending in `:` opens a braceless body, which runs
/// while lines are indented deeper than the line holding `decl_start`.
fn statement_end(b: &[u8], decl_start: usize, from: usize) -> usize {
    let base_indent = indent_width(b, line_start(b, decl_start));
    let mut depth = 0usize;
    let mut braceless = false;
    let mut i = from;
    while i < b.len() {
        match b[i] {
            b'(' | b'[' | b'{' => depth += 1,
            b')' | b']' | b'}' => {
                if depth == 0 {
                    // Closer of an enclosing scope.
                    return i;
                }
                depth -= 1;
            }
            b';' if depth == 0 && !braceless => return i + 1,
            b'\n' if depth == 0 => {
                if !braceless && last_byte_before(b, from, i).is_some_and(|k| b[k] == b':') {
                    braceless = true;
                }
                if braceless {
                    match next_code_line(b, i + 1) {
                        Some(start) if indent_width(b, start) > base_indent => {
                            i = start;
                            continue;
                        }
                        Some(start)
                            if indent_width(b, start) == base_indent
                                && starts_with_word(b, start + base_indent, b"end") =>
                        {
                            return line_end(b, start);
                        }
                        _ => return i,
                    }
                }
                if !line_continues(b, from, i) && !continues_statement(b, i + 1) {
                    return i;
                }
            }
            _ => {}
        }
        i += 1;
    }
    b.len()
}

/// Whether the line ending at `newline` leaves the statement open: a trailing
/// `,` or a trailing `extends`, `with` or `derives`.
fn line_continues(b: &[u8], from: usize, newline: usize) -> bool {
    let Some(last) = last_byte_before(b, from, newline) else {
        return false;
    };
    if b[last] == b',' {
        return true;
    }
    let mut word_start = last + 1;
    while word_start > from && is_ident_byte(b[word_start - 1]) {
        word_start -= 1;
    }
    [&b"extends"[..], &b"with"[..], &b"derives"[..]].contains(&&b[word_start..last + 1])
}

fn continues_statement(b: &[u8], from: usize) -> bool {
    let j = skip_ws(b, from);
    b.get(j) == Some(&b'{')
        || starts_with_word(b, j, b"extends")
        || starts_with_word(b, j, b"with")
        || starts_with_word(b, j, b"derives")
}

/// Last non-blank byte in `from..end`.
fn last_byte_before(b: &[u8], from: usize, end: usize) -> Option<usize> {
    (from..end).rev().find(|&k| !b[k].is_ascii_whitespace())
}

/// Start of the next line at or after `from` holding anything but whitespace.
fn next_code_line(b: &[u8], mut from: usize) -> Option<usize> {
    while from < b.len() {
        let end = line_end(b, from);
        if b[from..end].iter().any(|c| !c.is_ascii_whitespace()) {
            return Some(from);
        }
        from = end + 1;
    }
    None
}

fn line_start(b: &[u8], offset: usize) -> usize {
    b[..offset].iter().rposition(|&c| c == b'\n').map_or(0, |p| p + 1)
}

fn line_end(b: &[u8], from: usize) -> usize {
    b[from..].iter().position(|&c| c == b'\n').map_or(b.len(), |p| from + p)
}

fn indent_width(b: &[u8], line_start: usize) -> usize {
    b[line_start..].iter().take_while(|&&c| c == b' ' || c == b'\t').count()
}

/// Leading whitespace of the line containing `offset`.
pub fn line_indent(text: &str, offset: usize) -> String {
    let line_start = text[..offset].rfind('\n').map_or(0, |p| p + 1);
    text[line_start..]
        .chars()
        .take_while(|c| *c == ' ' || *c == '\t')
        .collect()
}

// ---------------------------------------------------------------------------
// Byte helpers
// ---------------------------------------------------------------------------

fn skip_ws(b: &[u8], mut i: usize) -> usize {
    while i < b.len() && b[i].is_ascii_whitespace() {
        i += 1;
    }
    i
}

/// Next word-bounded occurrence of `word` at or after `from`.
fn find_word(b: &[u8], from: usize, word: &[u8]) -> Option<usize> {
    let mut i = from;
    while i + word.len() <= b.len() {
        let hit = b[i..].windows(word.len()).position(|w| w == word)? + i;
        if starts_with_word(b, hit, word) {
            return Some(hit);
        }
        i = hit + 1;
    }
    None
}

fn starts_with_word(b: &[u8], at: usize, word: &[u8]) -> bool {
    b.get(at..at + word.len()) == Some(word)
        && (at == 0 || !is_ident_byte(b[at - 1]))
        && b.get(at + word.len()).is_none_or(|&c| !is_ident_byte(c))
}

/// End of a plain or back-quoted identifier starting at `at`. Non-ASCII
/// letters are accepted as identifier bytes.
pub(crate) fn ident_end(b: &[u8], at: usize) -> Option<usize> {
    let first = *b.get(at)?;
    if first == b'`' {
        let close = b[at + 1..].iter().position(|&c| c == b'`' || c == b'\n')? + at + 1;
        return (b[close] == b'`' && close > at + 1).then_some(close + 1);
    }
    if first.is_ascii_digit() || !(is_ident_byte(first) || first >= 0x80) {
        return None;
    }
    let mut j = at + 1;
    while j < b.len() && (is_ident_byte(b[j]) || b[j] >= 0x80) {
        j += 1;
    }
    Some(j)
}

pub(crate) fn collapse_ws(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
