//! Companion rendering and edit application.
//!
//! A companion is a plain `object` named after the case class, one
//! `val <field>: String = "<field>"` per field, framed by begin/end sentinel
//! comments so a later run can find and compare it.

use crate::types::{CompanionPlan, Edit, FieldDeclaration, PlanAction};

pub const MARKER_PREFIX: &str = "// @generated companiongen";

pub fn begin_marker(name: &str) -> String {
    format!("{MARKER_PREFIX} begin {name}")
}

pub fn end_marker(name: &str) -> String {
    format!("{MARKER_PREFIX} end {name}")
}

/// Render the companion block, every line prefixed with `indent`, without a
/// trailing newline.
pub fn render_companion(name: &str, fields: &[FieldDeclaration], indent: &str) -> String {
    let mut lines = Vec::with_capacity(fields.len() + 4);
    lines.push(format!("{indent}{}", begin_marker(name)));
    lines.push(format!("{indent}object {name} {{"));
    for field in fields {
        lines.push(format!(
            "{indent}  val {}: String = \"{}\"",
            field.name,
            string_value(&field.name)
        ));
    }
    lines.push(format!("{indent}}}"));
    lines.push(format!("{indent}{}", end_marker(name)));
    lines.join("\n")
}

/// The literal for a field name: back-quotes dropped, quotes and backslashes escaped.
fn string_value(name: &str) -> String {
    let bare = name
        .strip_prefix('`')
        .and_then(|n| n.strip_suffix('`'))
        .unwrap_or(name);
    bare.replace('\\', "\\\\").replace('"', "\\\"")
}

/// Apply every `Create` plan to `original`. Returns `None` if nothing is created.
///
/// Edits are applied from the end of the file backwards so earlier offsets
/// stay valid. Inserts at the same offset keep declaration order.
pub fn apply_plans(original: &str, plans: &[CompanionPlan]) -> Option<String> {
    let mut edits: Vec<(usize, Edit, &str)> = plans
        .iter()
        .enumerate()
        .filter(|(_, p)| p.action == PlanAction::Create)
        .filter_map(|(idx, p)| Some((idx, p.edit?, p.rendered_text.as_deref()?)))
        .collect();

    if edits.is_empty() {
        return None;
    }

    edits.sort_by(|a, b| b.1.position().cmp(&a.1.position()).then(b.0.cmp(&a.0)));

    let mut out = original.to_string();
    for (_, edit, text) in edits {
        match edit {
            Edit::Insert { at } => {
                let mut block = String::with_capacity(text.len() + 3);
                block.push_str("\n\n");
                block.push_str(text);
                if at < out.len() && !out[at..].starts_with('\n') && !out[at..].starts_with("\r\n") {
                    block.push('\n');
                }
                out.insert_str(at, &block);
            }
            Edit::Replace { span } => out.replace_range(span.start..span.end, text),
        }
    }
    Some(out)
}
