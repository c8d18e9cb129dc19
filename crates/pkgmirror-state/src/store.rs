use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use pkgmirror_fs::AtomicWriteOptions;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::checkpoint::{CatalogSnapshot, LastSuccess, ResumeCursor};
use crate::{Result, StateError};

pub const FULL_SNAPSHOT_FILE: &str = "packages.json";
pub const INCREMENTAL_SNAPSHOT_FILE: &str = "incremental_packages.json";
pub const CURSOR_FILE: &str = "cursor.json";
pub const LAST_SUCCESS_FILE: &str = "last_success.json";

/// Which of the two persisted snapshots to address.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SnapshotSlot {
    Full,
    Incremental,
}

impl SnapshotSlot {
    fn file_name(self) -> &'static str {
        match self {
            Self::Full => FULL_SNAPSHOT_FILE,
            Self::Incremental => INCREMENTAL_SNAPSHOT_FILE,
        }
    }

    fn accepts(self, snapshot: &CatalogSnapshot) -> bool {
        snapshot.kind.is_full() == (self == Self::Full)
    }
}

/// Checkpoint files of a mirror run, all kept in one directory.
///
/// Unreadable checkpoints are treated as absent: a warning is logged and the
/// run starts over from the catalog.
#[derive(Clone, Debug)]
pub struct ResumeState {
    dir: PathBuf,
}

impl ResumeState {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path(&self, file: &str) -> PathBuf {
        self.dir.join(file)
    }

    pub fn load_snapshot(&self, slot: SnapshotSlot) -> Option<CatalogSnapshot> {
        let snapshot: CatalogSnapshot = self.load(slot.file_name())?;
        if !slot.accepts(&snapshot) {
            warn!(file = slot.file_name(), "snapshot kind does not match its file, ignoring");
            return None;
        }
        Some(snapshot)
    }

    pub fn save_snapshot(&self, slot: SnapshotSlot, snapshot: &CatalogSnapshot) -> Result<()> {
        self.save(slot.file_name(), snapshot)
    }

    pub fn clear_snapshot(&self, slot: SnapshotSlot) -> Result<()> {
        self.remove(slot.file_name())
    }

    /// Cursor written while walking `snapshot`. A cursor left behind by any
    /// other snapshot is ignored.
    pub fn load_cursor(&self, snapshot: &CatalogSnapshot) -> Option<ResumeCursor> {
        let cursor: ResumeCursor = self.load(CURSOR_FILE)?;
        if !cursor.belongs_to(snapshot) {
            warn!(
                saved_total = cursor.total,
                total = snapshot.len(),
                "cursor belongs to another snapshot, ignoring"
            );
            return None;
        }
        Some(cursor)
    }

    pub fn save_cursor(&self, cursor: &ResumeCursor) -> Result<()> {
        self.save(CURSOR_FILE, cursor)
    }

    pub fn clear_cursor(&self) -> Result<()> {
        self.remove(CURSOR_FILE)
    }

    /// Remove the cursor and both snapshots. The last-success record stays.
    pub fn clear_run(&self) -> Result<()> {
        self.clear_cursor()?;
        self.clear_snapshot(SnapshotSlot::Full)?;
        self.clear_snapshot(SnapshotSlot::Incremental)
    }

    pub fn load_last_success(&self) -> Option<DateTime<Utc>> {
        self.load::<LastSuccess>(LAST_SUCCESS_FILE)
            .map(|record| record.finished_at)
    }

    pub fn save_last_success(&self, finished_at: DateTime<Utc>) -> Result<()> {
        self.save(LAST_SUCCESS_FILE, &LastSuccess { finished_at })
    }

    fn load<T: DeserializeOwned>(&self, file: &str) -> Option<T> {
        let path = self.path(file);
        let bytes = match pkgmirror_fs::read_optional(&path) {
            Ok(Some(bytes)) => bytes,
            Ok(None) => return None,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "cannot read checkpoint");
                return None;
            }
        };
        match serde_json::from_slice(&bytes) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "corrupt checkpoint, ignoring");
                None
            }
        }
    }

    fn save<T: Serialize>(&self, file: &str, value: &T) -> Result<()> {
        let path = self.path(file);
        let content = serde_json::to_vec_pretty(value).map_err(|source| StateError::Encode {
            path: path.clone(),
            source,
        })?;
        pkgmirror_fs::ensure_dir(&self.dir)?;
        pkgmirror_fs::atomic_write(&path, &content, AtomicWriteOptions::new().sync(true))?;
        debug!(path = %path.display(), "checkpoint saved");
        Ok(())
    }

    fn remove(&self, file: &str) -> Result<()> {
        pkgmirror_fs::remove_if_exists(self.path(file))?;
        Ok(())
    }
}
