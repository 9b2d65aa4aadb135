//! Companion planning: decide Create / SkipUnchanged / Conflict per declaration.
//!
//! Existing companions are looked up in the original text (they are code, not
//! noise) by their sentinel lines. Field identity is a set: reordering fields in
//! the declaration does not make a companion stale.

use crate::emit::{begin_marker, end_marker, render_companion};
use crate::types::{CompanionPlan, ConflictDetails, Edit, RecordDeclaration, Span};
use regex::Regex;
use std::collections::{BTreeSet, HashSet};
use std::sync::LazyLock;
use tracing::{debug, warn};

static VAL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(?:final\s+)?val\s+(`[^`\n]+`|[\p{L}_$][\p{L}\p{N}_$]*)\s*:").expect("val pattern")
});

/// A sentinel-delimited block already present in a file.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExistingCompanion {
    /// Start of the begin-sentinel line through the end of the end-sentinel line (newline excluded).
    pub span: Span,
    pub fields: Vec<String>,
    pub indent: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Lookup {
    Missing,
    Found(ExistingCompanion),
    /// Begin sentinel on this (1-based) line but no end sentinel after it.
    Unterminated { line: usize },
}

/// Find the companion block generated for `name` in `original`.
pub fn find_companion(original: &str, name: &str) -> Lookup {
    let begin = begin_marker(name);
    let end = end_marker(name);

    let mut offset = 0;
    let mut open: Option<(usize, usize, String)> = None;
    let mut fields = Vec::new();

    for (idx, raw_line) in original.split_inclusive('\n').enumerate() {
        let line = raw_line.trim_end_matches(['\n', '\r']);
        let trimmed = line.trim();

        if let Some((start, _, indent)) = &open {
            if trimmed == end {
                return Lookup::Found(ExistingCompanion {
                    span: Span::new(*start, offset + line.len()),
                    fields,
                    indent: indent.clone(),
                });
            }
            if let Some(cap) = VAL_RE.captures(line) {
                fields.push(cap[1].to_string());
            }
        } else if trimmed == begin {
            let indent: String = line.chars().take_while(|c| c.is_whitespace()).collect();
            open = Some((offset, idx + 1, indent));
        }
        offset += raw_line.len();
    }

    match open {
        Some((_, line, _)) => Lookup::Unterminated { line },
        None => Lookup::Missing,
    }
}

/// Plan every declaration of one file.
///
/// `cleaned` is only used to warn about hand-written `object`s that would clash
/// with a generated companion.
pub fn plan_declarations(
    original: &str,
    cleaned: &str,
    declarations: &[RecordDeclaration],
    unsafe_override: bool,
) -> Vec<CompanionPlan> {
    let mut seen = HashSet::new();
    let mut plans = Vec::with_capacity(declarations.len());

    for decl in declarations {
        if !seen.insert(decl.name.as_str()) {
            plans.push(CompanionPlan::conflict(&decl.name, ConflictDetails::DuplicateDeclaration));
            continue;
        }
        plans.push(plan_one(original, cleaned, decl, unsafe_override));
    }

    plans
}

fn plan_one(original: &str, cleaned: &str, decl: &RecordDeclaration, unsafe_override: bool) -> CompanionPlan {
    match find_companion(original, &decl.name) {
        Lookup::Missing => {
            if has_unmarked_object(cleaned, &decl.name) {
                warn!(
                    declaration = decl.name.as_str(),
                    "A hand-written `object {}` exists; the generated companion will clash with it",
                    decl.name
                );
            }
            let text = render_companion(&decl.name, &decl.fields, &decl.indent);
            CompanionPlan::create(&decl.name, text, Edit::Insert { at: decl.insert_at })
        }
        Lookup::Unterminated { line } => {
            CompanionPlan::conflict(&decl.name, ConflictDetails::UnterminatedBlock { line })
        }
        Lookup::Found(existing) => {
            let extracted: BTreeSet<&str> = decl.field_names().into_iter().collect();
            let present: BTreeSet<&str> = existing.fields.iter().map(String::as_str).collect();

            if extracted == present {
                debug!(declaration = decl.name.as_str(), "Companion is up to date");
                return CompanionPlan::skip(&decl.name);
            }

            let details = ConflictDetails::FieldMismatch {
                missing_in_companion: extracted.difference(&present).map(|s| s.to_string()).collect(),
                stale_in_companion: present.difference(&extracted).map(|s| s.to_string()).collect(),
            };

            if unsafe_override {
                warn!(declaration = decl.name.as_str(), %details, "Overwriting stale companion");
                let text = render_companion(&decl.name, &decl.fields, &existing.indent);
                CompanionPlan::create(&decl.name, text, Edit::Replace { span: existing.span })
            } else {
                CompanionPlan::conflict(&decl.name, details)
            }
        }
    }
}

/// Whether `cleaned` declares `object <name>`. Only asked when no sentinel
/// block exists, so any hit is hand-written.
fn has_unmarked_object(cleaned: &str, name: &str) -> bool {
    let needle = format!("object {name}");
    cleaned.match_indices(&needle).any(|(at, _)| {
        let before_ok = at == 0 || !crate::tokenizer::is_ident_byte(cleaned.as_bytes()[at - 1]);
        let after = cleaned.as_bytes().get(at + needle.len()).copied();
        before_ok && after.is_none_or(|c| !crate::tokenizer::is_ident_byte(c))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::FieldDeclaration;

    fn decl(name: &str, fields: &[&str], insert_at: usize) -> RecordDeclaration {
        RecordDeclaration {
            name: name.into(),
            type_parameters: vec![],
            fields: fields.iter().map(|f| FieldDeclaration::new(*f, "String")).collect(),
            span: Span::new(0, 1),
            insert_at,
            indent: String::new(),
        }
    }

    fn existing_block(name: &str, fields: &[&str]) -> String {
        let fields: Vec<_> = fields.iter().map(|f| FieldDeclaration::new(*f, "String")).collect();
        render_companion(name, &fields, "")
    }

    #[test]
    fn test_missing_companion_creates() {
        let src = "case class A(x: Int)\n";
        let plans = plan_declarations(src, src, &[decl("A", &["x"], 20)], false);
        assert_eq!(plans[0].action, crate::types::PlanAction::Create);
        assert_eq!(plans[0].edit, Some(Edit::Insert { at: 20 }));
        assert!(plans[0].rendered_text.as_deref().unwrap().contains("val x: String = \"x\""));
    }

    #[test]
    fn test_matching_set_is_order_insensitive() {
        let src = format!("case class A(b: Int, a: Int)\n\n{}\n", existing_block("A", &["a", "b"]));
        let plans = plan_declarations(&src, &src, &[decl("A", &["b", "a"], 0)], false);
        assert_eq!(plans[0], CompanionPlan::skip("A"));
    }

    #[test]
    fn test_new_field_is_conflict() {
        let src = format!("{}\n", existing_block("AliasInfo", &["alias", "source"]));
        let d = decl("AliasInfo", &["alias", "source", "brand_bounded"], 0);
        let plans = plan_declarations(&src, &src, &[d], false);
        assert_eq!(plans[0].action, crate::types::PlanAction::Conflict);
        assert_eq!(
            plans[0].conflict,
            Some(ConflictDetails::FieldMismatch {
                missing_in_companion: vec!["brand_bounded".into()],
                stale_in_companion: vec![],
            })
        );
    }

    #[test]
    fn test_override_replaces_stale_block() {
        let block = existing_block("A", &["old"]);
        let src = format!("case class A(x: Int)\n\n{block}\nval tail = 1\n");
        let start = src.find("// @generated").unwrap();
        let plans = plan_declarations(&src, &src, &[decl("A", &["x"], 20)], true);
        assert_eq!(plans[0].action, crate::types::PlanAction::Create);
        assert_eq!(plans[0].edit, Some(Edit::Replace { span: Span::new(start, start + block.len()) }));
    }

    #[test]
    fn test_unterminated_block_never_downgraded() {
        let src = "case class A(x: Int)\n// @generated companiongen begin A\nobject A {\n";
        let plans = plan_declarations(src, src, &[decl("A", &["x"], 20)], true);
        assert_eq!(plans[0].conflict, Some(ConflictDetails::UnterminatedBlock { line: 2 }));
    }

    #[test]
    fn test_duplicate_declaration_conflicts() {
        let src = "";
        let plans = plan_declarations(src, src, &[decl("A", &["x"], 0), decl("A", &["y"], 0)], true);
        assert_eq!(plans[0].action, crate::types::PlanAction::Create);
        assert_eq!(plans[1].conflict, Some(ConflictDetails::DuplicateDeclaration));
    }

    #[test]
    fn test_find_companion_reads_fields_and_indent() {
        let src = format!("object M {{\n{}\n}}\n", render_companion("A", &[FieldDeclaration::new("`type`", "String")], "  "));
        match find_companion(&src, "A") {
            Lookup::Found(existing) => {
                assert_eq!(existing.fields, vec!["`type`".to_string()]);
                assert_eq!(existing.indent, "  ");
                assert!(existing.span.slice(&src).ends_with("end A"));
            }
            other => panic!("expected a block, got {other:?}"),
        }
    }

    #[test]
    fn test_other_names_do_not_match() {
        let src = existing_block("AliasInfoV2", &["a"]);
        assert_eq!(find_companion(&src, "AliasInfo"), Lookup::Missing);
    }

    #[test]
    fn test_has_unmarked_object() {
        assert!(has_unmarked_object("object A {\n}", "A"));
        assert!(!has_unmarked_object("object AB {\n}", "A"));
    }
}
