//! Test harness for pipeline integration tests.
//!
//! Copies a fixture project into a temp dir and turns it into a git repository
//! so the repository checks pass, then runs the pipeline against it directly.

pub mod fixtures;

use companiongen_core::{load_companiongen_config, run, GenerateConfig, Result, RunSummary};
use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicBool;
use tempfile::TempDir;

pub struct TestHarness {
    pub root: PathBuf,
    _temp_dir: TempDir,
}

impl TestHarness {
    /// Create a harness from a named fixture directory under `tests/fixtures`.
    pub fn from_fixture(name: &str) -> Self {
        let fixture_src = Self::fixture_path(name);
        assert!(fixture_src.exists(), "Fixture '{name}' not found at {}", fixture_src.display());

        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let root = temp_dir.path().join(name);
        fixtures::copy_dir_recursive(&fixture_src, &root);

        git2::Repository::init(&root).expect("git init failed");

        Self { root, _temp_dir: temp_dir }
    }

    pub fn fixture_path(name: &str) -> PathBuf {
        Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures").join(name)
    }

    /// Config as the CLI would build it without flags.
    pub fn config(&self) -> GenerateConfig {
        load_companiongen_config(&self.root)
    }

    pub fn run(&self, config: &GenerateConfig) -> Result<RunSummary> {
        run(config, &AtomicBool::new(false))
    }

    pub fn read(&self, rel: &str) -> String {
        std::fs::read_to_string(self.root.join(rel))
            .unwrap_or_else(|e| panic!("Failed to read {rel}: {e}"))
    }

    pub fn snapshot(&self) -> std::collections::BTreeMap<String, String> {
        fixtures::snapshot(&self.root)
    }
}
