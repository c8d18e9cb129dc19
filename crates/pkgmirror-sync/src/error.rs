use std::path::PathBuf;

use pkgmirror_fetch::UnresolvedReason;
use thiserror::Error;

/// Errors that abort a whole run.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("catalog unavailable: {0}")]
    CatalogUnavailable(#[source] pkgmirror_catalog::CatalogError),

    #[error("mirror root '{path}' is unusable: {source}")]
    MirrorRoot {
        path: PathBuf,
        #[source]
        source: pkgmirror_store::StoreError,
    },

    #[error("cannot acquire run lock: {0}")]
    Lock(#[source] pkgmirror_fs::Error),

    #[error("cannot write checkpoint: {0}")]
    Checkpoint(#[from] pkgmirror_state::StateError),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("retouch walk failed: {0}")]
    Retouch(#[source] pkgmirror_archive::Error),
}

/// Errors contained to a single artifact; the run carries on.
#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error("cannot resolve '{url}': {reason}")]
    InvalidUrl { url: String, reason: UnresolvedReason },

    #[error("'{url}' served {content_type} instead of a package file")]
    NotAPackageFile { url: String, content_type: String },

    #[error("digest mismatch for '{url}': expected {expected}, got {actual}")]
    DigestMismatch {
        url: String,
        expected: String,
        actual: String,
    },

    #[error("download of '{url}' failed: {reason}")]
    Download { url: String, reason: String },

    #[error(transparent)]
    Store(#[from] pkgmirror_store::StoreError),
}

pub type Result<T> = std::result::Result<T, SyncError>;
