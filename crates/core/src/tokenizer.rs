//! Comment and literal stripping for Scala source.
//!
//! Produces a copy of the input with every byte inside a comment or inside a
//! string/character literal replaced by a space. Newlines are kept and
//! multi-byte characters become one space per byte, so byte offsets and line
//! numbers in the cleaned text are valid in the original. String delimiters
//! stay in place; only their contents are blanked.
//!
//! Scala block comments nest, so `/* a /* b */ c */` is one comment.
//! Unterminated comments and literals run to end of file.

use std::ops::Range;

/// Strip comments and literal contents, preserving offsets.
pub fn strip_noise(content: &str) -> String {
    let regions = noise_regions(content.as_bytes());
    if regions.is_empty() {
        return content.to_string();
    }

    let mut out = String::with_capacity(content.len());
    let mut regions = regions.iter().peekable();
    for (i, ch) in content.char_indices() {
        while regions.peek().is_some_and(|r| r.end <= i) {
            regions.next();
        }
        let blank = regions.peek().is_some_and(|r| r.start <= i);
        if blank && ch != '\n' && ch != '\r' {
            for _ in 0..ch.len_utf8() {
                out.push(' ');
            }
        } else {
            out.push(ch);
        }
    }
    out
}

// ---------------------------------------------------------------------------
// Region scanning
// ---------------------------------------------------------------------------

/// Byte ranges to blank, in ascending order and non-overlapping.
fn noise_regions(b: &[u8]) -> Vec<Range<usize>> {
    let mut regions = Vec::new();
    let mut i = 0;

    while i < b.len() {
        match b[i] {
            b'/' if b.get(i + 1) == Some(&b'/') => {
                let end = line_end(b, i);
                regions.push(i..end);
                i = end;
            }
            b'/' if b.get(i + 1) == Some(&b'*') => {
                let end = block_comment_end(b, i);
                regions.push(i..end);
                i = end;
            }
            b'"' => {
                let interpolated = i > 0 && is_ident_byte(b[i - 1]);
                i = skip_string(b, i, interpolated, &mut regions);
            }
            b'\'' => {
                if let Some(end) = char_literal_end(b, i) {
                    if end - 1 > i + 1 {
                        regions.push(i + 1..end - 1);
                    }
                    i = end;
                } else {
                    i += 1;
                }
            }
            _ => i += 1,
        }
    }

    regions
}

fn line_end(b: &[u8], from: usize) -> usize {
    b[from..].iter().position(|&c| c == b'\n').map_or(b.len(), |p| from + p)
}

/// End (exclusive) of a possibly nested block comment starting at `start`.
fn block_comment_end(b: &[u8], start: usize) -> usize {
    let mut depth = 0usize;
    let mut i = start;
    while i < b.len() {
        if b[i] == b'/' && b.get(i + 1) == Some(&b'*') {
            depth += 1;
            i += 2;
        } else if b[i] == b'*' && b.get(i + 1) == Some(&b'/') {
            depth -= 1;
            i += 2;
            if depth == 0 {
                return i;
            }
        } else {
            i += 1;
        }
    }
    b.len()
}

/// Skip a string literal starting at the opening quote `start`, pushing the
/// blanked content range. Returns the index just past the closing delimiter.
fn skip_string(b: &[u8], start: usize, interpolated: bool, regions: &mut Vec<Range<usize>>) -> usize {
    if b[start..].starts_with(b"\"\"\"") {
        let body = start + 3;
        let (content_end, end) = triple_quote_end(b, body, interpolated);
        if content_end > body {
            regions.push(body..content_end);
        }
        return end;
    }

    let body = start + 1;
    let (content_end, end) = single_quote_end(b, body, interpolated);
    if content_end > body {
        regions.push(body..content_end);
    }
    end
}

/// Returns (content end, literal end) for a `"..."` body starting at `from`.
fn single_quote_end(b: &[u8], from: usize, interpolated: bool) -> (usize, usize) {
    let mut i = from;
    while i < b.len() {
        match b[i] {
            b'\\' => i += 2,
            b'$' if interpolated && b.get(i + 1) == Some(&b'"') => i += 2,
            b'$' if interpolated && b.get(i + 1) == Some(&b'{') => i = skip_splice(b, i + 2),
            b'"' => return (i, i + 1),
            // A plain string literal cannot span lines.
            b'\n' if !interpolated => return (i, i),
            _ => i += 1,
        }
    }
    (b.len(), b.len())
}

/// Returns (content end, literal end) for a `"""..."""` body starting at `from`.
/// A run of more than three quotes closes on its last three.
fn triple_quote_end(b: &[u8], from: usize, interpolated: bool) -> (usize, usize) {
    let mut i = from;
    while i < b.len() {
        match b[i] {
            b'$' if interpolated && b.get(i + 1) == Some(&b'{') => i = skip_splice(b, i + 2),
            b'$' if interpolated => i += 2,
            b'"' if b[i..].starts_with(b"\"\"\"") => {
                let mut run = 3;
                while b.get(i + run) == Some(&b'"') {
                    run += 1;
                }
                let end = i + run;
                return (end - 3, end);
            }
            _ => i += 1,
        }
    }
    (b.len(), b.len())
}

/// Skip a `${ ... }` splice body (just after the `{`), honouring nested braces
/// and plain string literals inside the expression.
fn skip_splice(b: &[u8], from: usize) -> usize {
    let mut depth = 1usize;
    let mut i = from;
    while i < b.len() {
        match b[i] {
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    return i + 1;
                }
            }
            b'"' => {
                let (_, end) = single_quote_end(b, i + 1, false);
                i = end.max(i + 1);
                continue;
            }
            _ => {}
        }
        i += 1;
    }
    b.len()
}

/// End (exclusive) of a character literal at `start`, or `None` when the quote
/// is a symbol literal or quote syntax rather than a character.
fn char_literal_end(b: &[u8], start: usize) -> Option<usize> {
    match b.get(start + 1)? {
        b'\\' => {
            // '\n', '\'', '\u0041'
            let mut i = start + 3;
            while i < b.len() && i < start + 10 {
                match b[i] {
                    b'\'' => return Some(i + 1),
                    b'\n' => return None,
                    _ => i += 1,
                }
            }
            None
        }
        b'\n' => None,
        &c => {
            let width = utf8_width(c);
            (b.get(start + 1 + width) == Some(&b'\'')).then_some(start + 2 + width)
        }
    }
}

fn utf8_width(first: u8) -> usize {
    match first {
        0x00..=0x7f => 1,
        0xc0..=0xdf => 2,
        0xe0..=0xef => 3,
        _ => 4,
    }
}

pub(crate) fn is_ident_byte(c: u8) -> bool {
    c.is_ascii_alphanumeric() || c == b'_' || c == b'$'
}
