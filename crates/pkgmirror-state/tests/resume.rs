use chrono::{TimeZone, Utc};
use pkgmirror_state::{
    CURSOR_FILE, CatalogSnapshot, FULL_SNAPSHOT_FILE, INCREMENTAL_SNAPSHOT_FILE,
    LAST_SUCCESS_FILE, ResumeCursor, ResumeState, SnapshotKind, SnapshotSlot,
};

#[test]
fn snapshot_survives_reload() {
    let dir = tempfile::tempdir().unwrap();
    let state = ResumeState::new(dir.path());
    let snapshot = CatalogSnapshot::new(
        SnapshotKind::Incremental { window_secs: 7200 },
        ["alpha", "beta", "alpha"],
    );

    state.save_snapshot(SnapshotSlot::Incremental, &snapshot).unwrap();
    let loaded = state.load_snapshot(SnapshotSlot::Incremental).unwrap();

    assert_eq!(loaded, snapshot);
    assert_eq!(loaded.names(), ["alpha", "beta"]);
    assert!(state.load_snapshot(SnapshotSlot::Full).is_none());
}

#[test]
fn clear_run_keeps_last_success() {
    let dir = tempfile::tempdir().unwrap();
    let state = ResumeState::new(dir.path());
    let when = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();

    let full = CatalogSnapshot::new(SnapshotKind::Full, ["a"]);
    state.save_snapshot(SnapshotSlot::Full, &full).unwrap();
    state
        .save_snapshot(
            SnapshotSlot::Incremental,
            &CatalogSnapshot::new(SnapshotKind::Incremental { window_secs: 1 }, ["a"]),
        )
        .unwrap();
    state.save_cursor(&ResumeCursor::new(&full, 1)).unwrap();
    state.save_last_success(when).unwrap();

    state.clear_run().unwrap();

    for file in [FULL_SNAPSHOT_FILE, INCREMENTAL_SNAPSHOT_FILE, CURSOR_FILE] {
        assert!(!dir.path().join(file).exists(), "{file} should be gone");
    }
    assert!(dir.path().join(LAST_SUCCESS_FILE).exists());
    assert_eq!(state.load_last_success(), Some(when));
}

#[test]
fn clear_run_on_empty_dir_is_ok() {
    let dir = tempfile::tempdir().unwrap();
    ResumeState::new(dir.path()).clear_run().unwrap();
}

#[test]
fn state_dir_is_created_on_first_save() {
    let dir = tempfile::tempdir().unwrap();
    let state = ResumeState::new(dir.path().join("nested").join("state"));
    let snapshot = CatalogSnapshot::new(SnapshotKind::Full, ["a", "b", "c", "d"]);
    state.save_cursor(&ResumeCursor::new(&snapshot, 0)).unwrap();
    assert_eq!(state.load_cursor(&snapshot), Some(ResumeCursor::new(&snapshot, 0)));
}

#[test]
fn cursor_survives_reload_only_for_its_snapshot() {
    let dir = tempfile::tempdir().unwrap();
    let state = ResumeState::new(dir.path());
    let full = CatalogSnapshot::new(SnapshotKind::Full, ["p1", "p2", "p3"]);
    state.save_snapshot(SnapshotSlot::Full, &full).unwrap();
    state.save_cursor(&ResumeCursor::new(&full, 2)).unwrap();

    let reloaded = state.load_snapshot(SnapshotSlot::Full).unwrap();
    assert_eq!(state.load_cursor(&reloaded).map(|c| c.completed), Some(2));

    let changes = CatalogSnapshot::new(
        SnapshotKind::Incremental { window_secs: 3600 },
        ["p3", "p2", "p1"],
    );
    assert_eq!(state.load_cursor(&changes), None);
}
