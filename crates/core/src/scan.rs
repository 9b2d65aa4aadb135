//! Source file discovery.

use crate::types::{ScanConfig, ScannedFile};
use ignore::WalkBuilder;
use std::path::Path;
use std::sync::Mutex;
use tracing::{debug, warn};

/// Parallel walk of `root` (or its configured scan dirs) collecting files whose
/// extension is in `config.extensions`. Sorted by relative path.
///
/// Hidden entries are skipped. Ignore files are not honoured: generated or
/// git-ignored sources still get companions.
pub fn scan_sources(root: &Path, config: &ScanConfig) -> Vec<ScannedFile> {
    let results: Mutex<Vec<ScannedFile>> = Mutex::new(Vec::new());

    let dirs: Vec<std::path::PathBuf> = if config.scan_dirs.is_empty() {
        vec![root.to_path_buf()]
    } else {
        config.scan_dirs.iter().map(|d| root.join(d)).collect()
    };

    for dir in dirs {
        if !dir.is_dir() {
            warn!(dir = %dir.display(), "Skipping scan dir (not found)");
            continue;
        }

        let skip = config.skip_dirs.clone();
        WalkBuilder::new(&dir)
            .hidden(true)
            .ignore(false)
            .git_ignore(false)
            .git_global(false)
            .git_exclude(false)
            .threads(rayon::current_num_threads().min(12))
            .filter_entry(move |entry| {
                if entry.file_type().is_some_and(|ft| ft.is_dir()) {
                    let name = entry.file_name().to_string_lossy();
                    return !skip.contains(name.as_ref());
                }
                true
            })
            .build_parallel()
            .run(|| {
                Box::new(|entry| {
                    let entry = match entry {
                        Ok(e) => e,
                        Err(err) => {
                            debug!(error = %err, "Walk error");
                            return ignore::WalkState::Continue;
                        }
                    };
                    if !entry.file_type().is_some_and(|ft| ft.is_file()) {
                        return ignore::WalkState::Continue;
                    }

                    let abs_path = entry.path().to_path_buf();
                    let ext = abs_path.extension().and_then(|e| e.to_str()).unwrap_or("");
                    if !config.extensions.contains(ext) {
                        return ignore::WalkState::Continue;
                    }

                    let rel_path = abs_path
                        .strip_prefix(root)
                        .unwrap_or(&abs_path)
                        .to_string_lossy()
                        .replace('\\', "/");

                    if let Ok(mut files) = results.lock() {
                        files.push(ScannedFile { rel_path, abs_path });
                    }
                    ignore::WalkState::Continue
                })
            });
    }

    let mut files = results.into_inner().unwrap_or_else(|poisoned| poisoned.into_inner());
    files.sort_by(|a, b| a.rel_path.cmp(&b.rel_path));
    files.dedup_by(|a, b| a.rel_path == b.rel_path);
    debug!(count = files.len(), "Scanned source files");
    files
}
