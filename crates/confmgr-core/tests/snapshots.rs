//! Snapshots, restore and scoped overrides

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::PathBuf;
use std::process::Command;

use chrono::NaiveDate;
use confmgr_core::{
    BackupPolicy, ConfigManager, ManagerOptions, Registry, Snapshot, SnapshotError, TypeHint, Value,
};
use confmgr_test_utils::TempConfigDir;
use pretty_assertions::assert_eq;

const SNAPSHOT_ENV: &str = "CONFMGR_SNAPSHOT_FILE";

fn open(dir: &TempConfigDir) -> ConfigManager {
    let options = ManagerOptions::for_path(dir.path("config.yaml"))
        .watch(false)
        .with_backup(BackupPolicy::Disabled);
    Registry::new().resolve(&options).unwrap()
}

fn populate(config: &ConfigManager) {
    let when = NaiveDate::from_ymd_opt(2023, 11, 5)
        .and_then(|d| d.and_hms_opt(6, 7, 8))
        .unwrap();
    config.set("service.name", "indexer").unwrap();
    config.set("service.workers", 4_i64).unwrap();
    config.set("service.ratio", 0.75).unwrap();
    config.set("service.tags", vec!["a", "b"]).unwrap();
    config.set("schedule.next", when).unwrap();
    config.set("paths.cache", PathBuf::from("/var/cache/indexer")).unwrap();
}

#[test]
fn snapshot_answers_like_the_live_tree() {
    let dir = TempConfigDir::new();
    let config = open(&dir);
    populate(&config);
    let snap = config.snapshot();

    for path in snap.data().leaf_paths() {
        let path = path.to_string();
        assert_eq!(snap.get(&path).cloned(), config.get(&path), "{path}");
        assert_eq!(snap.type_hint(&path).cloned(), config.type_hint(&path), "{path}");
    }
    assert_eq!(snap.keys(), config.keys());
    assert_eq!(snap.config_path(), Some(config.config_path()));
    assert_eq!(
        snap.attr("service").unwrap().attr("workers").unwrap().get_as::<u32>(),
        Some(4)
    );
}

#[test]
fn snapshot_is_detached_from_later_writes() {
    let dir = TempConfigDir::new();
    let config = open(&dir);
    populate(&config);
    let snap = config.snapshot();
    config.set("service.workers", 16_i64).unwrap();
    assert_eq!(snap.get_as::<i64>("service.workers"), Some(4));
}

#[test]
fn snapshot_mutation_fails_distinctly() {
    let dir = TempConfigDir::new();
    let config = open(&dir);
    populate(&config);
    let snap = config.snapshot();

    let err = snap.set("service.workers", 1_i64).unwrap_err();
    assert!(matches!(err, SnapshotError::Immutable { .. }));
    assert!(err.to_string().contains("read-only"));
    assert_eq!(config.get_as::<i64>("service.workers"), Some(4));
}

#[test]
fn snapshot_crosses_a_process_boundary() {
    if let Ok(file) = std::env::var(SNAPSHOT_ENV) {
        let bytes = std::fs::read(file).unwrap();
        let snap = Snapshot::from_bytes(&bytes).unwrap();
        assert_eq!(snap.get_as::<String>("service.name").as_deref(), Some("indexer"));
        assert_eq!(snap.type_hint("schedule.next"), Some(&TypeHint::DateTime));
        assert!(matches!(
            snap.set("service.name", "other"),
            Err(SnapshotError::Immutable { .. })
        ));
        return;
    }

    let dir = TempConfigDir::new();
    let config = open(&dir);
    populate(&config);
    let transport = dir.path("snapshot.json");
    std::fs::write(&transport, config.snapshot().to_bytes().unwrap()).unwrap();

    let status = Command::new(std::env::current_exe().unwrap())
        .args(["snapshot_crosses_a_process_boundary", "--exact", "--test-threads=1"])
        .env(SNAPSHOT_ENV, &transport)
        .status()
        .unwrap();
    assert!(status.success());
}

#[test]
fn restore_replaces_tree_and_file() {
    let dir = TempConfigDir::new();
    let config = open(&dir);
    populate(&config);
    let snap = config.snapshot();

    config.set("service.name", "changed").unwrap();
    config.set("extra", true).unwrap();
    assert!(config.restore(&snap));

    assert_eq!(config.get("service.name"), Some(Value::from("indexer")));
    assert!(!config.contains("extra"));
    assert!(!config.is_dirty());
    let text = dir.read("config.yaml");
    assert!(text.contains("indexer"));
    assert!(!text.contains("extra"));
}

#[test]
fn restore_restamps_derived_keys() {
    let dir = TempConfigDir::new();
    let other = TempConfigDir::new();
    let source = open(&other);
    source.set("shared", 1_i64).unwrap();

    let config = open(&dir);
    assert!(config.restore(&source.snapshot()));
    assert_eq!(config.get_as::<i64>("shared"), Some(1));
    assert_eq!(config.config_file_path(), dir.path("config.yaml"));
}

#[test]
fn temporary_overrides_are_undone() {
    let dir = TempConfigDir::new();
    let config = open(&dir);
    config.set("mode", "production").unwrap();

    {
        let scoped = config
            .temporary([("mode", Value::from("test")), ("debug", Value::from(true))])
            .unwrap();
        assert_eq!(scoped.get_as::<String>("mode").as_deref(), Some("test"));
        assert_eq!(config.get_as::<bool>("debug"), Some(true));
    }

    assert_eq!(config.get_as::<String>("mode").as_deref(), Some("production"));
    assert!(!config.contains("debug"));
    assert!(!dir.read("config.yaml").contains("debug"));
}

#[test]
fn temporary_overrides_are_undone_on_panic() {
    let dir = TempConfigDir::new();
    let config = open(&dir);
    config.set("mode", "production").unwrap();

    let outcome = catch_unwind(AssertUnwindSafe(|| {
        let _scoped = config.temporary([("mode", "test")]).unwrap();
        panic!("boom");
    }));
    assert!(outcome.is_err());
    assert_eq!(config.get_as::<String>("mode").as_deref(), Some("production"));
}

#[test]
fn rejected_overrides_change_nothing() {
    let dir = TempConfigDir::new();
    let config = open(&dir);
    config.set("mode", "production").unwrap();
    let before = config.snapshot();

    assert!(config
        .temporary([("mode", "test"), ("config_file_path", "/elsewhere")])
        .is_err());
    assert_eq!(config.snapshot(), before);
}
