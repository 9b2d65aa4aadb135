//! Writing updated sources: in place, or mirrored under a dry-run root.
//!
//! Every write goes to a temp file in the destination directory and is then
//! renamed over the target, so a file is either fully old or fully new.

use crate::error::{CompanionError, Result};
use crate::types::ScannedFile;
use std::fs;
use std::io::Write as _;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

pub trait Writer: Send + Sync {
    /// Write `contents` for `file`; returns where it landed.
    fn write(&self, file: &ScannedFile, contents: &str) -> Result<PathBuf>;
}

/// Rewrites the scanned file itself.
pub struct InPlaceWriter;

impl Writer for InPlaceWriter {
    fn write(&self, file: &ScannedFile, contents: &str) -> Result<PathBuf> {
        write_atomic(&file.abs_path, contents)?;
        Ok(file.abs_path.clone())
    }
}

/// Writes `output_root/<relative path>`, leaving the original untouched.
pub struct MirrorWriter {
    pub root: PathBuf,
    pub output_root: PathBuf,
}

impl MirrorWriter {
    pub fn new(root: impl Into<PathBuf>, output_root: impl Into<PathBuf>) -> Self {
        Self { root: root.into(), output_root: output_root.into() }
    }

    fn target(&self, file: &ScannedFile) -> Result<PathBuf> {
        let rel = file.abs_path.strip_prefix(&self.root).map_err(|_| CompanionError::OutsideRoot {
            path: file.abs_path.clone(),
            root: self.root.clone(),
        })?;
        Ok(self.output_root.join(rel))
    }
}

impl Writer for MirrorWriter {
    fn write(&self, file: &ScannedFile, contents: &str) -> Result<PathBuf> {
        let target = self.target(file)?;
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).map_err(|e| CompanionError::io(parent, e))?;
        }
        write_atomic(&target, contents)?;
        Ok(target)
    }
}

fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let mut tmp = NamedTempFile::new_in(dir).map_err(|e| CompanionError::io(dir, e))?;
    tmp.write_all(contents.as_bytes()).map_err(|e| CompanionError::io(path, e))?;

    // Keep the original file's permissions.
    if let Ok(meta) = fs::metadata(path) {
        let _ = fs::set_permissions(tmp.path(), meta.permissions());
    }

    tmp.persist(path).map_err(|e| CompanionError::Persist { path: path.to_path_buf(), source: e })?;
    Ok(())
}
