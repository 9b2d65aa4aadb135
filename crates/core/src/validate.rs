//! Repository preconditions checked before anything is written.

use crate::error::{CompanionError, Result};
use serde::Serialize;
use std::path::Path;
use tracing::debug;

/// Top-level files that mark a JVM build.
pub const BUILD_MARKERS: &[&str] = &[
    "build.sbt",
    "build.scala",
    "version.sbt",
    "pom.xml",
    "gradle.properties",
    "gradlew",
    "build.sc",
    "build.gradle",
    "build.gradle.kts",
];

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Vcs {
    Git,
    Mercurial,
    Subversion,
}

impl std::fmt::Display for Vcs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Vcs::Git => write!(f, "git"),
            Vcs::Mercurial => write!(f, "mercurial"),
            Vcs::Subversion => write!(f, "subversion"),
        }
    }
}

/// What a successful check found.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct RepoCheck {
    pub vcs: Vcs,
    pub build_markers: Vec<String>,
}

/// Check that `root` is a directory under version control with a build file.
///
/// Every failed condition is collected so the error names all of them at once.
pub fn validate_repository(root: &Path) -> Result<RepoCheck> {
    if !root.is_dir() {
        return Err(CompanionError::Precondition {
            root: root.to_path_buf(),
            missing: vec!["directory does not exist".into()],
        });
    }

    let mut missing = Vec::new();

    let vcs = detect_vcs(root);
    if vcs.is_none() {
        missing.push("no version control (.git, .hg or .svn)".to_string());
    }

    let build_markers: Vec<String> = BUILD_MARKERS
        .iter()
        .filter(|m| root.join(m).is_file())
        .map(|m| m.to_string())
        .collect();
    if build_markers.is_empty() {
        missing.push(format!("no build file ({})", BUILD_MARKERS.join(", ")));
    }

    match vcs {
        Some(vcs) if missing.is_empty() => {
            debug!(root = %root.display(), %vcs, markers = ?build_markers, "Repository check passed");
            Ok(RepoCheck { vcs, build_markers })
        }
        _ => Err(CompanionError::Precondition { root: root.to_path_buf(), missing }),
    }
}

fn detect_vcs(root: &Path) -> Option<Vcs> {
    if git2::Repository::open(root).is_ok() {
        return Some(Vcs::Git);
    }
    if root.join(".hg").is_dir() {
        return Some(Vcs::Mercurial);
    }
    if root.join(".svn").is_dir() {
        return Some(Vcs::Subversion);
    }
    None
}
