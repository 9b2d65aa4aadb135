//! companiongen: field-name companion objects for Scala case classes.
//!
//! For every `case class` in a source tree this crate generates a companion
//! `object` holding one `String` constant per field, named and valued after the
//! field, so code addressing schema-less data (DataFrame columns, JSON keys)
//! can refer to field names symbolically.
//!
//! # Modules
//!
//! - [`tokenizer`]: Comment and literal stripping with offsets preserved
//! - [`detect`]: `case class` detection with a bracket stack
//! - [`extract`]: Parameter list to ordered `(name, type)` fields
//! - [`plan`]: Create / unchanged / conflict decisions against existing companions
//! - [`emit`]: Companion rendering and edit application
//! - [`validate`]: Repository precondition checks
//! - [`scan`]: Parallel source file discovery
//! - [`write`]: Atomic in-place and dry-run writes
//! - [`pipeline`]: Per-file orchestration and the run summary
//! - [`types`]: Core types shared across the crate
//! - [`error`]: Error type

pub mod detect;
pub mod emit;
pub mod error;
pub mod extract;
pub mod pipeline;
pub mod plan;
pub mod scan;
pub mod tokenizer;
pub mod types;
pub mod validate;
pub mod write;

pub use error::{CompanionError, Result};
pub use pipeline::{list_declarations, plan_source, run, DeclaringFile};
pub use types::*;

use std::path::{Path, PathBuf};
use tracing::{debug, warn};

// ---------------------------------------------------------------------------
// .companiongen.toml config loading
// ---------------------------------------------------------------------------

pub const CONFIG_FILE: &str = ".companiongen.toml";

/// Known keys in `.companiongen.toml` for config validation.
const KNOWN_CONFIG_KEYS: &[&str] = &["scan_dirs", "skip_dirs", "extensions", "output_dir", "strict"];

/// Simple Levenshtein edit distance for typo suggestions.
fn edit_distance(a: &str, b: &str) -> usize {
    let (a, b) = (a.as_bytes(), b.as_bytes());
    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0; b.len() + 1];
    for (i, &ca) in a.iter().enumerate() {
        curr[0] = i + 1;
        for (j, &cb) in b.iter().enumerate() {
            let cost = if ca == cb { 0 } else { 1 };
            curr[j + 1] = (prev[j + 1] + 1).min(curr[j] + 1).min(prev[j] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[b.len()]
}

fn string_list(value: &toml::Value) -> Option<Vec<String>> {
    value
        .as_array()
        .map(|items| items.iter().filter_map(|v| v.as_str().map(|s| s.to_string())).collect())
}

/// Load a [`GenerateConfig`] for `root`, applying `.companiongen.toml` if present.
///
/// A missing file means defaults. An unreadable or unparsable file is a
/// warning, never an error. Unknown keys trigger a warning with a typo
/// suggestion. `skip_dirs` merges with the defaults; `extensions` and
/// `scan_dirs` replace them. A relative `output_dir` is resolved against `root`.
pub fn load_companiongen_config(root: &Path) -> GenerateConfig {
    let mut config = GenerateConfig::new(root.to_path_buf());
    let config_path = root.join(CONFIG_FILE);

    if !config_path.exists() {
        return config;
    }
    debug!("Loading {CONFIG_FILE}");

    let table = match std::fs::read_to_string(&config_path) {
        Ok(content) => match content.parse::<toml::Table>() {
            Ok(table) => table,
            Err(err) => {
                warn!(error = %err, "Failed to parse {CONFIG_FILE}, using defaults");
                return config;
            }
        },
        Err(err) => {
            warn!(error = %err, "Failed to read {CONFIG_FILE}, using defaults");
            return config;
        }
    };

    for key in table.keys() {
        if KNOWN_CONFIG_KEYS.contains(&key.as_str()) {
            continue;
        }
        let suggestion = KNOWN_CONFIG_KEYS.iter().min_by_key(|k| edit_distance(key, k));
        match suggestion {
            Some(suggestion) if edit_distance(key, suggestion) <= 3 => warn!(
                key = key.as_str(),
                suggestion = *suggestion,
                "Unknown key in {CONFIG_FILE}, did you mean '{suggestion}'?"
            ),
            _ => warn!(
                key = key.as_str(),
                "Unknown key in {CONFIG_FILE} (known keys: {})",
                KNOWN_CONFIG_KEYS.join(", ")
            ),
        }
    }

    if let Some(dirs) = table.get("scan_dirs").and_then(string_list) {
        config.scan.scan_dirs = dirs;
    }

    // skip_dirs merge with defaults
    if let Some(dirs) = table.get("skip_dirs").and_then(string_list) {
        config.scan.skip_dirs.extend(dirs);
    }

    if let Some(exts) = table.get("extensions").and_then(string_list) {
        config.scan.extensions =
            exts.into_iter().map(|e| e.trim_start_matches('.').to_string()).collect();
    }

    if let Some(dir) = table.get("output_dir").and_then(|v| v.as_str()) {
        let dir = PathBuf::from(dir);
        config.output_root = Some(if dir.is_absolute() { dir } else { root.join(dir) });
    }

    if let Some(strict) = table.get("strict").and_then(|v| v.as_bool()) {
        config.strict = strict;
    }

    config
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_edit_distance() {
        assert_eq!(edit_distance("skip_dir", "skip_dirs"), 1);
        assert_eq!(edit_distance("strict", "strict"), 0);
    }

    #[test]
    fn test_missing_config_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_companiongen_config(dir.path());
        assert!(config.scan.extensions.contains("scala"));
        assert!(config.scan.skip_dirs.contains("target"));
        assert!(!config.strict);
        assert_eq!(config.output_root, None);
    }

    #[test]
    fn test_config_overrides() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join(CONFIG_FILE),
            "extensions = [\".scala\", \"sc\"]\nskip_dirs = [\"legacy\"]\nscan_dirs = [\"modules\"]\noutput_dir = \"preview\"\nstrict = true\nskip_dir = [\"typo\"]\n",
        )
        .unwrap();

        let config = load_companiongen_config(dir.path());
        assert_eq!(config.scan.extensions.len(), 2);
        assert!(config.scan.extensions.contains("sc"));
        assert!(config.scan.skip_dirs.contains("legacy"), "skip_dirs should merge");
        assert!(config.scan.skip_dirs.contains("target"), "defaults should survive the merge");
        assert_eq!(config.scan.scan_dirs, vec!["modules".to_string()]);
        assert_eq!(config.output_root, Some(dir.path().join("preview")));
        assert!(config.strict);
    }

    #[test]
    fn test_verbose_is_not_a_config_key() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(CONFIG_FILE), "verbose = true\n").unwrap();
        let config = load_companiongen_config(dir.path());
        assert!(!config.verbose, "verbosity only comes from the command line");
    }

    #[test]
    fn test_invalid_toml_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(CONFIG_FILE), "extensions = [").unwrap();
        let config = load_companiongen_config(dir.path());
        assert!(config.scan.extensions.contains("scala"));
    }
}
