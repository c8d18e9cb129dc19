//! Mirror synchronization engine.
//!
//! [`Mirror::run`] performs one pass over the packages a catalog diff selects:
//! each package's index page is scanned for artifact links, and every link
//! goes through the fetch-verify [`Pipeline`] into the local store. Progress is
//! checkpointed after every package so an interrupted pass resumes where it
//! stopped.

mod error;
mod links;
mod mirror;
mod pipeline;
mod stats;

pub use error::{ArtifactError, Result, SyncError};
pub use links::{FilenameFilter, RemoteReference, scan_external, scan_index};
pub use mirror::{
    AUTO_WINDOW_MARGIN, DEFAULT_WINDOW, ERROR_LOG_FILE, Mirror, MirrorConfig, RunRequest,
    WindowSpec, retouch,
};
pub use pipeline::{Outcome, Pipeline};
pub use stats::{RunStats, format_runtime};

pub use pkgmirror_archive::RetouchSummary;
pub use pkgmirror_catalog::SyncMode;
