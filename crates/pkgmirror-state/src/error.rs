use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("failed to encode checkpoint '{path}': {source}")]
    Encode {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error(transparent)]
    Fs(#[from] pkgmirror_fs::Error),
}

pub type Result<T> = std::result::Result<T, StateError>;
