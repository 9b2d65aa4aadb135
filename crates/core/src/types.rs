//! Core types shared across companiongen: run configuration, source buffers,
//! detected declarations, companion plans, and per-file / per-run reports.

use serde::Serialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

// ---------------------------------------------------------------------------
// Run configuration
// ---------------------------------------------------------------------------

/// Explicit configuration record passed into the pipeline.
///
/// Built by the CLI from command-line flags layered over `.companiongen.toml`
/// (see [`crate::load_companiongen_config`]).
#[derive(Clone, Debug)]
pub struct GenerateConfig {
    pub root: PathBuf,
    /// Write results under `output_root` instead of rewriting sources.
    pub dry_run: bool,
    /// Mirrors `--verbose` for library callers. Not read by the pipeline:
    /// log detail is chosen by the tracing filter.
    pub verbose: bool,
    /// Downgrade field-set conflicts to creates and skip repository checks.
    pub unsafe_override: bool,
    /// Fail the whole run (before writing) if any conflict is planned.
    pub strict: bool,
    /// Mirror root for dry runs. `None` = sibling `<root-name>.companiongen`.
    pub output_root: Option<PathBuf>,
    pub scan: ScanConfig,
}

impl GenerateConfig {
    pub fn new(root: PathBuf) -> Self {
        Self {
            root,
            dry_run: false,
            verbose: false,
            unsafe_override: false,
            strict: false,
            output_root: None,
            scan: ScanConfig::default(),
        }
    }

    /// Resolve where dry-run output goes.
    pub fn dry_run_root(&self) -> PathBuf {
        if let Some(out) = &self.output_root {
            return out.clone();
        }
        let name = self
            .root
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("project");
        let sibling = format!("{name}.companiongen");
        match self.root.parent() {
            Some(parent) => parent.join(sibling),
            None => self.root.join(sibling),
        }
    }
}

/// Which files the scanner picks up.
#[derive(Clone, Debug)]
pub struct ScanConfig {
    /// Directories to scan (relative to root). Empty = scan root itself.
    pub scan_dirs: Vec<String>,
    /// Directory names to skip during walk.
    pub skip_dirs: HashSet<String>,
    /// File extensions to include.
    pub extensions: HashSet<String>,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            scan_dirs: Vec::new(),
            skip_dirs: [
                ".git",
                ".hg",
                ".svn",
                "target",
                "node_modules",
                ".bloop",
                ".metals",
                ".bsp",
                ".idea",
                ".scala-build",
                "out",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            extensions: ["scala".to_string()].into_iter().collect(),
        }
    }
}

// ---------------------------------------------------------------------------
// Source text
// ---------------------------------------------------------------------------

/// A file discovered by the scanner.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ScannedFile {
    pub rel_path: String,
    pub abs_path: PathBuf,
}

/// Immutable text of one file plus its path. Lives for one file's processing.
#[derive(Clone, Debug)]
pub struct SourceBuffer {
    pub path: PathBuf,
    pub text: String,
}

impl SourceBuffer {
    pub fn new(path: impl Into<PathBuf>, text: impl Into<String>) -> Self {
        Self { path: path.into(), text: text.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Half-open byte range `[start, end)` into a [`SourceBuffer`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        debug_assert!(start < end, "empty span {start}..{end}");
        Self { start, end }
    }

    pub fn slice<'a>(&self, text: &'a str) -> &'a str {
        &text[self.start..self.end]
    }
}

// ---------------------------------------------------------------------------
// Declarations
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct FieldDeclaration {
    pub name: String,
    /// Declared type with whitespace collapsed. Not parsed further.
    pub declared_type: String,
}

impl FieldDeclaration {
    pub fn new(name: impl Into<String>, declared_type: impl Into<String>) -> Self {
        Self { name: name.into(), declared_type: declared_type.into() }
    }
}

/// A `case class` with its ordered, non-empty field list.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct RecordDeclaration {
    pub name: String,
    pub type_parameters: Vec<String>,
    pub fields: Vec<FieldDeclaration>,
    /// From the `case` keyword through the closing paren of the first parameter list.
    pub span: Span,
    /// Byte offset where a new companion block is merged in.
    pub insert_at: usize,
    /// Leading whitespace of the line the declaration starts on.
    pub indent: String,
}

impl RecordDeclaration {
    pub fn field_names(&self) -> Vec<&str> {
        self.fields.iter().map(|f| f.name.as_str()).collect()
    }
}

// ---------------------------------------------------------------------------
// Plans
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanAction {
    Create,
    SkipUnchanged,
    Conflict,
}

impl std::fmt::Display for PlanAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PlanAction::Create => write!(f, "create"),
            PlanAction::SkipUnchanged => write!(f, "unchanged"),
            PlanAction::Conflict => write!(f, "conflict"),
        }
    }
}

/// Where a rendered companion goes in the original text.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Edit {
    /// Merge a new block at this byte offset.
    Insert { at: usize },
    /// Replace a stale block (begin sentinel line start through end sentinel line end).
    Replace { span: Span },
}

impl Edit {
    pub fn position(&self) -> usize {
        match self {
            Edit::Insert { at } => *at,
            Edit::Replace { span } => span.start,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum ConflictDetails {
    /// The marked companion names a different field set.
    FieldMismatch {
        /// Fields in the declaration but missing from the companion.
        missing_in_companion: Vec<String>,
        /// Fields in the companion that the declaration no longer has.
        stale_in_companion: Vec<String>,
    },
    /// A begin sentinel without its end sentinel.
    UnterminatedBlock { line: usize },
    /// Another declaration in this file already claimed the name.
    DuplicateDeclaration,
}

impl std::fmt::Display for ConflictDetails {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConflictDetails::FieldMismatch { missing_in_companion, stale_in_companion } => {
                write!(f, "companion is out of date")?;
                if !missing_in_companion.is_empty() {
                    write!(f, "; missing: {}", missing_in_companion.join(", "))?;
                }
                if !stale_in_companion.is_empty() {
                    write!(f, "; stale: {}", stale_in_companion.join(", "))?;
                }
                Ok(())
            }
            ConflictDetails::UnterminatedBlock { line } => {
                write!(f, "generated block starting on line {line} has no end marker")
            }
            ConflictDetails::DuplicateDeclaration => {
                write!(f, "declared more than once in this file")
            }
        }
    }
}

/// Planned action for one declaration. Consumed once by the writer boundary.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct CompanionPlan {
    pub target_name: String,
    pub action: PlanAction,
    /// Present only for [`PlanAction::Create`].
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rendered_text: Option<String>,
    /// Present only for [`PlanAction::Create`].
    #[serde(skip_serializing_if = "Option::is_none")]
    pub edit: Option<Edit>,
    /// Present only for [`PlanAction::Conflict`].
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conflict: Option<ConflictDetails>,
}

impl CompanionPlan {
    pub fn create(target_name: impl Into<String>, rendered_text: String, edit: Edit) -> Self {
        Self {
            target_name: target_name.into(),
            action: PlanAction::Create,
            rendered_text: Some(rendered_text),
            edit: Some(edit),
            conflict: None,
        }
    }

    pub fn skip(target_name: impl Into<String>) -> Self {
        Self {
            target_name: target_name.into(),
            action: PlanAction::SkipUnchanged,
            rendered_text: None,
            edit: None,
            conflict: None,
        }
    }

    pub fn conflict(target_name: impl Into<String>, details: ConflictDetails) -> Self {
        Self {
            target_name: target_name.into(),
            action: PlanAction::Conflict,
            rendered_text: None,
            edit: None,
            conflict: Some(details),
        }
    }
}

/// Result of the pure planning phase for one file.
#[derive(Clone, Debug)]
pub struct FilePlan {
    pub plans: Vec<CompanionPlan>,
    /// Candidates rejected by the detector or extractor.
    pub malformed: usize,
    /// New file contents; `None` when nothing is created.
    pub updated: Option<String>,
}

impl FilePlan {
    pub fn count(&self, action: PlanAction) -> usize {
        self.plans.iter().filter(|p| p.action == action).count()
    }
}

// ---------------------------------------------------------------------------
// Reports
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, Serialize)]
pub struct DeclarationReport {
    pub declaration_name: String,
    pub action: PlanAction,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conflict_details: Option<String>,
}

impl From<&CompanionPlan> for DeclarationReport {
    fn from(plan: &CompanionPlan) -> Self {
        Self {
            declaration_name: plan.target_name.clone(),
            action: plan.action,
            conflict_details: plan.conflict.as_ref().map(|c| c.to_string()),
        }
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct FileReport {
    pub path: String,
    pub declarations: Vec<DeclarationReport>,
    pub malformed: usize,
    /// Where the updated content landed (in place or under the dry-run root).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub written_to: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl FileReport {
    pub fn failed(path: impl Into<String>, error: impl ToString) -> Self {
        Self {
            path: path.into(),
            declarations: Vec::new(),
            malformed: 0,
            written_to: None,
            error: Some(error.to_string()),
        }
    }
}

/// Aggregated outcome of one run.
#[derive(Clone, Debug, Default, Serialize)]
pub struct RunSummary {
    pub files_scanned: usize,
    pub files_changed: usize,
    pub created: usize,
    pub skipped: usize,
    pub conflicted: usize,
    pub malformed: usize,
    pub failed_files: usize,
    /// Set when cancellation stopped new file tasks from starting.
    pub cancelled: bool,
    pub dry_run: bool,
    pub files: Vec<FileReport>,
}

impl RunSummary {
    pub fn record(&mut self, report: FileReport) {
        for decl in &report.declarations {
            match decl.action {
                PlanAction::Create => self.created += 1,
                PlanAction::SkipUnchanged => self.skipped += 1,
                PlanAction::Conflict => self.conflicted += 1,
            }
        }
        self.malformed += report.malformed;
        if report.error.is_some() {
            self.failed_files += 1;
        }
        if report.written_to.is_some() {
            self.files_changed += 1;
        }
        self.files.push(report);
    }
}
