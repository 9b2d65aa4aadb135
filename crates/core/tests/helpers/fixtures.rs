//! Fixture project scaffolding utilities for integration tests.

use std::path::Path;

/// Recursively copy a directory tree. Preserves file contents but not metadata.
pub fn copy_dir_recursive(src: &Path, dst: &Path) {
    if !dst.exists() {
        std::fs::create_dir_all(dst).expect("Failed to create dir");
    }
    for entry in std::fs::read_dir(src).expect("Failed to read dir") {
        let entry = entry.expect("Failed to read entry");
        let src_path = entry.path();
        let dst_path = dst.join(entry.file_name());
        if src_path.is_dir() {
            copy_dir_recursive(&src_path, &dst_path);
        } else {
            std::fs::copy(&src_path, &dst_path).expect("Failed to copy file");
        }
    }
}

/// Every file under `root` with its contents, keyed by relative path.
pub fn snapshot(root: &Path) -> std::collections::BTreeMap<String, String> {
    let mut files = std::collections::BTreeMap::new();
    collect(root, root, &mut files);
    files
}

fn collect(root: &Path, dir: &Path, files: &mut std::collections::BTreeMap<String, String>) {
    for entry in std::fs::read_dir(dir).expect("Failed to read dir") {
        let path = entry.expect("Failed to read entry").path();
        if path.file_name().is_some_and(|n| n == ".git") {
            continue;
        }
        if path.is_dir() {
            collect(root, &path, files);
        } else {
            let rel = path.strip_prefix(root).unwrap().to_string_lossy().replace('\\', "/");
            files.insert(rel, std::fs::read_to_string(&path).unwrap_or_default());
        }
    }
}
