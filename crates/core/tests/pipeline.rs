//! Integration tests for the full generate pipeline.
//!
//! Each test copies the `sbt_project` fixture (a small git-tracked sbt build)
//! into a temp dir and runs the pipeline against it.

mod helpers;

use companiongen_core::{list_declarations, CompanionError, PlanAction, RunSummary};
use helpers::TestHarness;
use std::sync::atomic::AtomicBool;

const FIXTURE: &str = "sbt_project";
const ALIAS_INFO: &str = "modules/billing/src/main/scala/billing/AliasInfo.scala";
const MERCHANT: &str = "modules/billing/src/main/scala/billing/Merchant.scala";
const EVENTS: &str = "modules/billing/src/main/scala/billing/events/Events.scala";

fn actions(summary: &RunSummary, path: &str) -> Vec<(String, PlanAction)> {
    let file = summary
        .files
        .iter()
        .find(|f| f.path == path)
        .unwrap_or_else(|| panic!("{path} missing from summary"));
    file.declarations.iter().map(|d| (d.declaration_name.clone(), d.action)).collect()
}

// ---------------------------------------------------------------------------
// Normal runs
// ---------------------------------------------------------------------------

#[test]
fn test_first_run_creates_companions() {
    let h = TestHarness::from_fixture(FIXTURE);
    let summary = h.run(&h.config()).expect("run failed");

    assert_eq!(summary.files_scanned, 3, "target/ should be skipped: {:?}", summary.files);
    assert_eq!(summary.created, 4);
    assert_eq!(summary.conflicted, 1);
    assert_eq!(summary.skipped, 0);
    assert_eq!(summary.malformed, 1, "the truncated Broken declaration");
    assert_eq!(summary.failed_files, 0);
    assert_eq!(summary.files_changed, 3);

    let alias = h.read(ALIAS_INFO);
    for field in ["alias", "mcc_restriction", "regex_match", "source", "brand_bounded"] {
        assert!(alias.contains(&format!("  val {field}: String = \"{field}\"")), "missing {field}:\n{alias}");
    }
    assert!(!alias.contains("object NotReal"), "scaladoc example picked up:\n{alias}");
    assert!(!alias.contains("object Fake"), "string literal picked up:\n{alias}");
    assert!(
        alias.contains("brand_bounded: Boolean)\n\n// @generated companiongen begin AliasInfo\n"),
        "companion not placed after the declaration:\n{alias}"
    );
}

#[test]
fn test_generic_declaration_with_body_and_defaults() {
    let h = TestHarness::from_fixture(FIXTURE);
    let summary = h.run(&h.config()).unwrap();

    assert_eq!(
        actions(&summary, MERCHANT),
        vec![("Merchant".to_string(), PlanAction::Create), ("Settlement".to_string(), PlanAction::Conflict)]
    );

    let merchant = h.read(MERCHANT);
    let block = "object Merchant {\n  val merchant_id: String = \"merchant_id\"\n  val name: String = \"name\"\n  val tags: String = \"tags\"\n  val createdAt: String = \"createdAt\"\n}";
    assert!(merchant.contains(block), "unexpected Merchant companion:\n{merchant}");
    let body_end = merchant.find("mkString").unwrap();
    assert!(merchant.find("begin Merchant").unwrap() > body_end, "companion inside the class body:\n{merchant}");
    assert!(!merchant.contains("object Commented"));
}

#[test]
fn test_nested_declarations_indented_inside_enclosing_object() {
    let h = TestHarness::from_fixture(FIXTURE);
    let summary = h.run(&h.config()).unwrap();

    assert_eq!(
        actions(&summary, EVENTS),
        vec![("Charged".to_string(), PlanAction::Create), ("Refunded".to_string(), PlanAction::Create)]
    );
    let events = h.read(EVENTS);
    assert!(
        events.contains("  // @generated companiongen begin Refunded\n  object Refunded {\n    val id: String = \"id\"\n    val reason: String = \"reason\"\n  }\n"),
        "nested companion not indented:\n{events}"
    );
}

#[test]
fn test_second_run_is_idempotent() {
    let h = TestHarness::from_fixture(FIXTURE);
    h.run(&h.config()).unwrap();
    let after_first = h.snapshot();

    let second = h.run(&h.config()).unwrap();
    assert_eq!(second.created, 0);
    assert_eq!(second.skipped, 4);
    assert_eq!(second.conflicted, 1, "stale Settlement companion stays a conflict");
    assert_eq!(second.files_changed, 0);
    assert_eq!(h.snapshot(), after_first, "second run changed files");
}

// ---------------------------------------------------------------------------
// Modes
// ---------------------------------------------------------------------------

#[test]
fn test_unsafe_rewrites_stale_companion() {
    let h = TestHarness::from_fixture(FIXTURE);
    let mut config = h.config();
    config.unsafe_override = true;

    let summary = h.run(&config).unwrap();
    assert_eq!(summary.created, 5);
    assert_eq!(summary.conflicted, 0);

    let merchant = h.read(MERCHANT);
    assert_eq!(merchant.matches("begin Settlement").count(), 1, "block duplicated:\n{merchant}");
    assert!(merchant.contains("  val settled_at: String = \"settled_at\"\n"));

    let again = h.run(&h.config()).unwrap();
    assert_eq!(again.skipped, 5);
    assert_eq!(again.conflicted, 0);
}

#[test]
fn test_strict_writes_nothing_on_conflict() {
    let h = TestHarness::from_fixture(FIXTURE);
    let before = h.snapshot();
    let mut config = h.config();
    config.strict = true;

    match h.run(&config) {
        Err(CompanionError::StrictConflicts { count }) => assert_eq!(count, 1),
        other => panic!("expected strict failure, got {other:?}"),
    }
    assert_eq!(h.snapshot(), before, "strict mode wrote files");
}

#[test]
fn test_dry_run_mirrors_without_touching_sources() {
    let h = TestHarness::from_fixture(FIXTURE);
    let before = h.snapshot();
    let out = tempfile::tempdir().unwrap();
    let mut config = h.config();
    config.dry_run = true;
    config.output_root = Some(out.path().to_path_buf());

    let summary = h.run(&config).unwrap();
    assert!(summary.dry_run);
    assert_eq!(summary.files_changed, 3);
    assert_eq!(h.snapshot(), before, "dry run modified the source tree");

    let mirrored = std::fs::read_to_string(out.path().join(ALIAS_INFO)).unwrap();
    assert!(mirrored.contains("object AliasInfo {"));
    assert_eq!(summary.files[0].written_to.as_deref(), Some(out.path().join(ALIAS_INFO).as_path()));
}

#[test]
fn test_dry_run_output_inside_root_is_not_rescanned() {
    let h = TestHarness::from_fixture(FIXTURE);
    let mut config = h.config();
    config.dry_run = true;
    config.output_root = Some(h.root.join("preview"));

    let first = h.run(&config).unwrap();
    assert!(h.root.join("preview").join(ALIAS_INFO).exists());

    let second = h.run(&config).unwrap();
    assert_eq!(second.files_scanned, first.files_scanned, "mirrored copies were scanned: {:?}", second.files);
    assert_eq!(second.conflicted, 1);

    let listed = list_declarations(&config).unwrap();
    assert!(listed.iter().all(|f| !f.path.starts_with("preview/")), "listing includes mirror: {listed:?}");
    assert_eq!(listed.len(), 3);
}

#[test]
fn test_unreadable_file_fails_alone() {
    let h = TestHarness::from_fixture(FIXTURE);
    let latin1 = "modules/billing/src/main/scala/billing/Latin1.scala";
    std::fs::write(h.root.join(latin1), b"case class Caf\xe9(x: Int)\n").unwrap();

    let summary = h.run(&h.config()).unwrap();
    assert_eq!(summary.files_scanned, 4);
    assert_eq!(summary.failed_files, 1);
    assert_eq!(summary.created, 4, "other files should still be planned");
    assert_eq!(summary.files_changed, 3);

    let failed = summary.files.iter().find(|f| f.path == latin1).expect("failed file reported");
    assert!(failed.error.is_some());
    assert!(failed.written_to.is_none());
    assert!(h.read(ALIAS_INFO).contains("object AliasInfo {"));
}

#[test]
fn test_cancelled_before_start_writes_nothing() {
    let h = TestHarness::from_fixture(FIXTURE);
    let before = h.snapshot();

    let summary = companiongen_core::run(&h.config(), &AtomicBool::new(true)).unwrap();
    assert!(summary.cancelled);
    assert!(summary.files.is_empty());
    assert_eq!(h.snapshot(), before);
}

#[test]
fn test_late_cancel_with_nothing_skipped_is_not_cancelled() {
    let h = TestHarness::from_fixture(FIXTURE);
    let mut config = h.config();
    config.scan.scan_dirs = vec!["project".to_string()];

    let summary = companiongen_core::run(&config, &AtomicBool::new(true)).unwrap();
    assert_eq!(summary.files_scanned, 0);
    assert!(!summary.cancelled, "no task was skipped");
}

// ---------------------------------------------------------------------------
// Preconditions and listing
// ---------------------------------------------------------------------------

#[test]
fn test_rejects_directory_without_build_file() {
    let h = TestHarness::from_fixture(FIXTURE);
    std::fs::remove_file(h.root.join("build.sbt")).unwrap();

    match h.run(&h.config()) {
        Err(CompanionError::Precondition { missing, .. }) => {
            assert_eq!(missing.len(), 1, "only the build file is missing: {missing:?}");
        }
        other => panic!("expected precondition failure, got {other:?}"),
    }

    let mut config = h.config();
    config.unsafe_override = true;
    assert!(h.run(&config).is_ok(), "--unsafe should bypass repository checks");
}

#[test]
fn test_list_declarations() {
    let h = TestHarness::from_fixture(FIXTURE);
    let before = h.snapshot();
    let listed = list_declarations(&h.config()).unwrap();

    let mut pairs: Vec<(String, Vec<String>)> =
        listed.into_iter().map(|f| (f.path, f.declarations)).collect();
    pairs.sort();
    assert_eq!(
        pairs,
        vec![
            (ALIAS_INFO.to_string(), vec!["AliasInfo".to_string()]),
            (MERCHANT.to_string(), vec!["Merchant".to_string(), "Settlement".to_string()]),
            (EVENTS.to_string(), vec!["Charged".to_string(), "Refunded".to_string()]),
        ]
    );
    assert_eq!(h.snapshot(), before);
}
