//! Per-file orchestration: plan every file in parallel, gate on strict mode,
//! then write.
//!
//! Planning is pure once a file has been read, so nothing touches the tree
//! until every file has a plan.

use crate::detect::{detect_declarations, line_indent};
use crate::emit::apply_plans;
use crate::error::{CompanionError, Result};
use crate::extract::extract_fields;
use crate::plan::plan_declarations;
use crate::scan::scan_sources;
use crate::tokenizer::strip_noise;
use crate::types::*;
use crate::validate::validate_repository;
use crate::write::{InPlaceWriter, MirrorWriter, Writer};
use rayon::prelude::*;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info, warn};

// ---------------------------------------------------------------------------
// Single file
// ---------------------------------------------------------------------------

/// Plan one file: strip, detect, extract, plan and render.
pub fn plan_source(buffer: &SourceBuffer, unsafe_override: bool) -> FilePlan {
    let original = buffer.text.as_str();
    let mut file_plan = FilePlan { plans: Vec::new(), malformed: 0, updated: None };

    // The keywords may sit on different lines, so check them separately.
    if !(original.contains("case") && original.contains("class")) {
        return file_plan;
    }

    let cleaned = strip_noise(original);
    let declarations = record_declarations(buffer, &cleaned, &mut file_plan.malformed);
    if declarations.is_empty() {
        return file_plan;
    }

    file_plan.plans = plan_declarations(original, &cleaned, &declarations, unsafe_override);
    file_plan.updated = apply_plans(original, &file_plan.plans);

    for plan in &file_plan.plans {
        match &plan.conflict {
            Some(details) => warn!(
                path = %buffer.path().display(),
                declaration = plan.target_name.as_str(),
                %details,
                "Companion conflict"
            ),
            None => debug!(
                path = %buffer.path().display(),
                declaration = plan.target_name.as_str(),
                action = %plan.action,
                "Planned companion"
            ),
        }
    }

    file_plan
}

/// Every well-formed declaration in `buffer`. Malformed candidates are logged
/// and counted, never returned.
fn record_declarations(buffer: &SourceBuffer, cleaned: &str, malformed: &mut usize) -> Vec<RecordDeclaration> {
    let original = buffer.text.as_str();
    let detection = detect_declarations(cleaned);

    for (pos, reason) in &detection.rejected {
        debug!(
            path = %buffer.path().display(),
            line = line_of(original, *pos),
            %reason,
            "Skipping malformed case class"
        );
    }
    *malformed += detection.rejected.len();

    let mut declarations = Vec::with_capacity(detection.candidates.len());
    for candidate in detection.candidates {
        match extract_fields(&cleaned[candidate.params.clone()]) {
            Ok(fields) => declarations.push(RecordDeclaration {
                indent: line_indent(original, candidate.span.start),
                name: candidate.name,
                type_parameters: candidate.type_parameters,
                fields,
                span: candidate.span,
                insert_at: candidate.insert_at,
            }),
            Err(err) => {
                debug!(
                    path = %buffer.path().display(),
                    line = line_of(original, candidate.span.start),
                    declaration = candidate.name.as_str(),
                    error = %err,
                    "Skipping malformed case class"
                );
                *malformed += 1;
            }
        }
    }
    declarations
}

fn line_of(text: &str, offset: usize) -> usize {
    text[..offset].matches('\n').count() + 1
}

fn read_source(file: &ScannedFile) -> Result<SourceBuffer> {
    let text = std::fs::read_to_string(&file.abs_path).map_err(|e| CompanionError::io(&file.abs_path, e))?;
    Ok(SourceBuffer::new(&file.abs_path, text))
}

// ---------------------------------------------------------------------------
// Whole run
// ---------------------------------------------------------------------------

/// Validate, scan, plan, gate and write. Files whose task had not started when
/// `cancel` was raised are left out of the summary.
pub fn run(config: &GenerateConfig, cancel: &AtomicBool) -> Result<RunSummary> {
    preflight(config)?;

    let files = source_files(config);
    info!(root = %config.root.display(), files = files.len(), "Planning companions");

    let planned: Vec<(&ScannedFile, Result<FilePlan>)> = files
        .par_iter()
        .filter_map(|file| {
            if cancel.load(Ordering::Relaxed) {
                return None;
            }
            let outcome = read_source(file).map(|buffer| plan_source(&buffer, config.unsafe_override));
            Some((file, outcome))
        })
        .collect();
    let mut skipped_tasks = files.len() - planned.len();

    let conflicts: usize = planned
        .iter()
        .filter_map(|(_, outcome)| outcome.as_ref().ok())
        .map(|plan| plan.count(PlanAction::Conflict))
        .sum();
    if config.strict && conflicts > 0 {
        return Err(CompanionError::StrictConflicts { count: conflicts });
    }

    let writer: Box<dyn Writer> = if config.dry_run {
        let output_root = config.dry_run_root();
        info!(output = %output_root.display(), "Dry run, originals stay untouched");
        Box::new(MirrorWriter::new(&config.root, output_root))
    } else {
        Box::new(InPlaceWriter)
    };

    let to_finish = planned.len();
    let reports: Vec<FileReport> = planned
        .into_par_iter()
        .filter_map(|(file, outcome)| {
            if cancel.load(Ordering::Relaxed) {
                return None;
            }
            Some(finish_file(writer.as_ref(), file, outcome))
        })
        .collect();
    skipped_tasks += to_finish - reports.len();

    let mut summary = RunSummary {
        files_scanned: files.len(),
        dry_run: config.dry_run,
        // A flag raised after the last task started cancels nothing.
        cancelled: skipped_tasks > 0,
        ..RunSummary::default()
    };
    for report in reports {
        summary.record(report);
    }

    info!(
        created = summary.created,
        skipped = summary.skipped,
        conflicted = summary.conflicted,
        malformed = summary.malformed,
        failed = summary.failed_files,
        "Run complete"
    );
    Ok(summary)
}

/// Scanned sources minus anything under the dry-run output root, which may sit
/// inside `config.root`.
fn source_files(config: &GenerateConfig) -> Vec<ScannedFile> {
    let mut files = scan_sources(&config.root, &config.scan);
    let output_root = config.dry_run_root();
    if output_root == config.root {
        return files;
    }
    let canonical = output_root.canonicalize().unwrap_or_else(|_| output_root.clone());
    let before = files.len();
    files.retain(|f| !f.abs_path.starts_with(&output_root) && !f.abs_path.starts_with(&canonical));
    if files.len() < before {
        debug!(output = %output_root.display(), excluded = before - files.len(), "Skipping dry-run output");
    }
    files
}

fn preflight(config: &GenerateConfig) -> Result<()> {
    if config.unsafe_override {
        warn!(root = %config.root.display(), "Repository checks skipped (--unsafe)");
        return Ok(());
    }
    let check = validate_repository(&config.root)?;
    info!(vcs = %check.vcs, markers = ?check.build_markers, "Repository looks like a JVM project");
    Ok(())
}

fn finish_file(writer: &dyn Writer, file: &ScannedFile, outcome: Result<FilePlan>) -> FileReport {
    let plan = match outcome {
        Ok(plan) => plan,
        Err(err) => {
            warn!(path = file.rel_path.as_str(), error = %err, "Failed to read source");
            return FileReport::failed(&file.rel_path, err);
        }
    };

    let mut report = FileReport {
        path: file.rel_path.clone(),
        declarations: plan.plans.iter().map(DeclarationReport::from).collect(),
        malformed: plan.malformed,
        written_to: None,
        error: None,
    };

    if let Some(updated) = &plan.updated {
        match writer.write(file, updated) {
            Ok(path) => {
                debug!(path = %path.display(), "Wrote companions");
                report.written_to = Some(path);
            }
            Err(err) => {
                warn!(path = file.rel_path.as_str(), error = %err, "Failed to write companions");
                report.error = Some(err.to_string());
            }
        }
    }
    report
}

// ---------------------------------------------------------------------------
// Listing
// ---------------------------------------------------------------------------

/// A source file with the well-formed declarations found in it.
#[derive(Clone, Debug, Serialize)]
pub struct DeclaringFile {
    pub path: String,
    pub declarations: Vec<String>,
}

/// Read-only pass: which files declare case classes, and which ones.
pub fn list_declarations(config: &GenerateConfig) -> Result<Vec<DeclaringFile>> {
    preflight(config)?;

    let files = source_files(config);
    let listed: Vec<DeclaringFile> = files
        .par_iter()
        .filter_map(|file| {
            let buffer = match read_source(file) {
                Ok(buffer) => buffer,
                Err(err) => {
                    warn!(path = file.rel_path.as_str(), error = %err, "Failed to read source");
                    return None;
                }
            };
            let cleaned = strip_noise(&buffer.text);
            let mut malformed = 0;
            let names: Vec<String> =
                record_declarations(&buffer, &cleaned, &mut malformed).into_iter().map(|d| d.name).collect();
            (!names.is_empty()).then(|| DeclaringFile { path: file.rel_path.clone(), declarations: names })
        })
        .collect();
    Ok(listed)
}
