//! companiongen CLI: generate field-name companion objects for Scala case classes.
//!
//! Exit codes: 0 success, 1 fatal error, 2 some files failed, 130 cancelled.

use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{info, warn};

use companiongen_core::types::*;
use companiongen_core::{list_declarations, load_companiongen_config, run, DeclaringFile};

/// Generate companion objects exposing each case class field name as a string constant.
#[derive(Parser)]
#[command(name = "companiongen", version, about)]
struct Cli {
    /// Root of the Scala project
    #[arg(short = 'p', long)]
    base_path: PathBuf,

    /// Write results under a separate output directory instead of rewriting sources
    #[arg(short, long)]
    dry_run: bool,

    /// Output directory for --dry-run (default: sibling `<root>.companiongen`)
    #[arg(long, requires = "dry_run")]
    output_dir: Option<PathBuf>,

    /// Log every decision, including unchanged companions and malformed declarations
    #[arg(short, long)]
    verbose: bool,

    /// Skip repository checks and overwrite stale companions
    #[arg(short, long = "unsafe")]
    unsafe_override: bool,

    /// Fail without writing anything if any companion conflicts
    #[arg(long)]
    strict: bool,

    /// Only list files that declare case classes
    #[arg(long)]
    list: bool,

    /// Output as JSON instead of human-readable text
    #[arg(long)]
    json: bool,
}

const EXIT_FAILED_FILES: u8 = 2;
const EXIT_CANCELLED: u8 = 130;

fn init_logging(verbose: bool) {
    let directive = if verbose { "companiongen=debug" } else { "companiongen=warn" };
    let mut filter = tracing_subscriber::EnvFilter::from_default_env();
    if let Ok(directive) = directive.parse() {
        filter = filter.add_directive(directive);
    }
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Resolves on SIGINT or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => info!("Received SIGINT, finishing in-flight files..."),
                    _ = sigterm.recv() => info!("Received SIGTERM, finishing in-flight files..."),
                }
            }
            Err(err) => {
                warn!(error = %err, "Failed to register SIGTERM handler");
                let _ = ctrl_c.await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = ctrl_c.await;
        info!("Received Ctrl+C, finishing in-flight files...");
    }
}

// ---------------------------------------------------------------------------
// Output
// ---------------------------------------------------------------------------

fn print_summary(summary: &RunSummary, verbose: bool, output_root: &std::path::Path) {
    for file in &summary.files {
        if let Some(error) = &file.error {
            println!("  {:<10} {}: {error}", "failed", file.path);
            continue;
        }
        for decl in &file.declarations {
            match decl.action {
                PlanAction::SkipUnchanged if !verbose => {}
                PlanAction::Conflict => println!(
                    "  {:<10} {}: {} ({})",
                    decl.action,
                    file.path,
                    decl.declaration_name,
                    decl.conflict_details.as_deref().unwrap_or("conflict")
                ),
                _ => println!("  {:<10} {}: {}", decl.action, file.path, decl.declaration_name),
            }
        }
    }

    let verb = if summary.dry_run { "would change" } else { "changed" };
    eprintln!(
        "\n{} files scanned, {} {verb}: {} created, {} unchanged, {} conflicts, {} malformed, {} failed",
        summary.files_scanned,
        summary.files_changed,
        summary.created,
        summary.skipped,
        summary.conflicted,
        summary.malformed,
        summary.failed_files,
    );
    if summary.dry_run && summary.files_changed > 0 {
        eprintln!("Dry-run output written to {}", output_root.display());
    }
    if summary.cancelled {
        eprintln!("Cancelled: files not yet started were left alone");
    }
}

fn print_listing(files: &[DeclaringFile]) {
    for file in files {
        println!("{:<60} {}", file.path, file.declarations.join(", "));
    }
    eprintln!("\n{} files declare case classes", files.len());
}

fn print_json<T: serde::Serialize>(value: &T) -> bool {
    match serde_json::to_string_pretty(value) {
        Ok(text) => {
            println!("{text}");
            true
        }
        Err(err) => {
            eprintln!("Error: failed to serialize output: {err}");
            false
        }
    }
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let root = match cli.base_path.canonicalize() {
        Ok(root) => root,
        Err(err) => {
            eprintln!("Error: {}: {err}", cli.base_path.display());
            return ExitCode::FAILURE;
        }
    };

    // Flags win over .companiongen.toml.
    let mut config = load_companiongen_config(&root);
    config.dry_run = cli.dry_run;
    config.verbose = cli.verbose;
    config.unsafe_override = cli.unsafe_override;
    config.strict |= cli.strict;
    if let Some(dir) = cli.output_dir {
        // Absolute, so it can be recognised when it sits inside the root.
        config.output_root = Some(std::path::absolute(&dir).unwrap_or(dir));
    }

    if cli.list {
        let listed = tokio::task::spawn_blocking(move || list_declarations(&config)).await;
        return match listed {
            Ok(Ok(files)) => {
                if cli.json {
                    if !print_json(&files) {
                        return ExitCode::FAILURE;
                    }
                } else {
                    print_listing(&files);
                }
                ExitCode::SUCCESS
            }
            Ok(Err(err)) => {
                eprintln!("Error: {err}");
                ExitCode::FAILURE
            }
            Err(err) => {
                eprintln!("Error: worker failed: {err}");
                ExitCode::FAILURE
            }
        };
    }

    let output_root = config.dry_run_root();
    let cancel = Arc::new(AtomicBool::new(false));
    let mut worker = {
        let cancel = Arc::clone(&cancel);
        tokio::task::spawn_blocking(move || run(&config, &cancel))
    };

    let outcome = tokio::select! {
        outcome = &mut worker => outcome,
        _ = shutdown_signal() => {
            cancel.store(true, Ordering::SeqCst);
            worker.await
        }
    };

    let summary = match outcome {
        Ok(Ok(summary)) => summary,
        Ok(Err(err)) => {
            eprintln!("Error: {err}");
            return ExitCode::FAILURE;
        }
        Err(err) => {
            eprintln!("Error: worker failed: {err}");
            return ExitCode::FAILURE;
        }
    };

    if cli.json {
        if !print_json(&summary) {
            return ExitCode::FAILURE;
        }
    } else {
        print_summary(&summary, cli.verbose, &output_root);
    }

    if summary.cancelled {
        ExitCode::from(EXIT_CANCELLED)
    } else if summary.failed_files > 0 {
        ExitCode::from(EXIT_FAILED_FILES)
    } else {
        ExitCode::SUCCESS
    }
}
