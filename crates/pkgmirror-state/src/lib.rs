//! Resumable progress for long mirror runs.
//!
//! A run persists the catalog snapshot it works through and a cursor saying
//! how many names of it are finished. After a crash the next run picks both
//! up and continues after the last finished package.

mod checkpoint;
mod error;
mod store;

pub use checkpoint::{CatalogSnapshot, ResumeCursor, SnapshotId, SnapshotKind, dedup};
pub use error::{Result, StateError};
pub use store::{
    CURSOR_FILE, FULL_SNAPSHOT_FILE, INCREMENTAL_SNAPSHOT_FILE, LAST_SUCCESS_FILE, ResumeState,
    SnapshotSlot,
};
