//! Field extraction from a `case class` parameter list.
//!
//! Splits on top-level commas, then each segment on its first top-level colon.
//! Annotations and modifiers are dropped from the name side; a default value
//! is dropped from the type side. One bad segment fails the whole declaration.

use crate::detect::{collapse_ws, ident_end, match_brackets, skip_annotation};
use crate::types::FieldDeclaration;
use regex::Regex;
use std::sync::LazyLock;

static IDENT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:[\p{L}_$][\p{L}\p{N}_$]*|`[^`\n]+`)$").expect("identifier pattern")
});

/// Parameter modifiers that may precede a field name.
const MODIFIERS: &[&str] =
    &["val", "var", "private", "protected", "override", "final", "implicit", "lazy", "using", "erased"];

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FieldError {
    /// `a: Int,, b: Int`
    EmptySegment { index: usize },
    MissingColon { segment: String },
    InvalidName { name: String },
    EmptyType { name: String },
    /// `case class Unit()`
    NoFields,
}

impl std::fmt::Display for FieldError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FieldError::EmptySegment { index } => write!(f, "empty parameter at position {index}"),
            FieldError::MissingColon { segment } => write!(f, "parameter `{segment}` has no type"),
            FieldError::InvalidName { name } => write!(f, "`{name}` is not a field name"),
            FieldError::EmptyType { name } => write!(f, "field `{name}` has an empty type"),
            FieldError::NoFields => write!(f, "empty parameter list"),
        }
    }
}

/// Parse the inside of a parameter list (parens excluded) into ordered fields.
pub fn extract_fields(params: &str) -> Result<Vec<FieldDeclaration>, FieldError> {
    let segments = split_top_level(params, b',');
    let last = segments.len().saturating_sub(1);
    let mut fields = Vec::with_capacity(segments.len());

    for (index, segment) in segments.iter().enumerate() {
        let segment = segment.trim();
        if segment.is_empty() {
            // Trailing comma
            if index == last {
                continue;
            }
            return Err(FieldError::EmptySegment { index });
        }
        fields.push(parse_field(segment)?);
    }

    if fields.is_empty() {
        return Err(FieldError::NoFields);
    }
    Ok(fields)
}

fn parse_field(segment: &str) -> Result<FieldDeclaration, FieldError> {
    let colon = find_top_level(segment, |b, i| b[i] == b':')
        .ok_or_else(|| FieldError::MissingColon { segment: collapse_ws(segment) })?;

    let name = field_name(&segment[..colon])?;

    let type_part = &segment[colon + 1..];
    let type_part = match find_top_level(type_part, is_default_eq) {
        Some(eq) => &type_part[..eq],
        None => type_part,
    };
    let declared_type = collapse_ws(type_part);
    if declared_type.is_empty() {
        return Err(FieldError::EmptyType { name });
    }

    Ok(FieldDeclaration { name, declared_type })
}

/// `=` introducing a default value, as opposed to the `=>` of a function type.
fn is_default_eq(b: &[u8], i: usize) -> bool {
    b[i] == b'=' && b.get(i + 1) != Some(&b'>') && (i == 0 || !matches!(b[i - 1], b'<' | b'>' | b'!' | b'='))
}

/// Strip annotations and modifiers; exactly one identifier must remain.
fn field_name(name_part: &str) -> Result<String, FieldError> {
    let b = name_part.as_bytes();
    let mut words: Vec<&str> = Vec::new();
    let mut i = 0;

    while i < b.len() {
        let c = b[i];
        if c.is_ascii_whitespace() {
            i += 1;
        } else if c == b'@' {
            i = skip_annotation(b, i);
        } else if c == b'[' && !words.is_empty() {
            // Qualifier of `private[pkg]`
            i = match_brackets(b, i).unwrap_or(b.len());
        } else if let Some(end) = ident_end(b, i) {
            words.push(&name_part[i..end]);
            i = end;
        } else {
            return Err(FieldError::InvalidName { name: collapse_ws(name_part) });
        }
    }

    while words.len() > 1 && MODIFIERS.contains(&words[0]) {
        words.remove(0);
    }

    match words.as_slice() {
        [name] if IDENT_RE.is_match(name) => Ok(name.to_string()),
        _ => Err(FieldError::InvalidName { name: collapse_ws(name_part) }),
    }
}

// ---------------------------------------------------------------------------
// Top-level splitting
// ---------------------------------------------------------------------------

/// Split on `sep` where it is not nested inside `()`, `[]` or `{}`.
pub fn split_top_level(text: &str, sep: u8) -> Vec<&str> {
    let b = text.as_bytes();
    let mut parts = Vec::new();
    let mut depth = 0i32;
    let mut start = 0;

    for (i, &c) in b.iter().enumerate() {
        match c {
            b'(' | b'[' | b'{' => depth += 1,
            b')' | b']' | b'}' => depth -= 1,
            _ if c == sep && depth == 0 => {
                parts.push(&text[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(&text[start..]);
    parts
}

/// First index at bracket depth zero where `pred` holds.
fn find_top_level(text: &str, pred: impl Fn(&[u8], usize) -> bool) -> Option<usize> {
    let b = text.as_bytes();
    let mut depth = 0i32;
    for i in 0..b.len() {
        match b[i] {
            b'(' | b'[' | b'{' => depth += 1,
            b')' | b']' | b'}' => depth -= 1,
            _ if depth == 0 && pred(b, i) => return Some(i),
            _ => {}
        }
    }
    None
}
