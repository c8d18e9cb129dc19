use std::io;
use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("'{name}' is not a valid file name inside the mirror")]
    InvalidName { name: String },

    #[error("mirror root '{path}' is not writable: {source}")]
    RootNotWritable { path: PathBuf, source: io::Error },

    #[error("failed to write '{path}': {source}")]
    Write { path: PathBuf, source: io::Error },

    #[error(transparent)]
    Fs(#[from] pkgmirror_fs::Error),

    #[error(transparent)]
    Verify(#[from] pkgmirror_verify::VerificationError),
}

pub type Result<T> = std::result::Result<T, StoreError>;
