use thiserror::Error;

/// Upstream name that is not a valid package identifier.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("invalid package name '{name}': {reason}")]
pub struct InvalidPackageName {
    pub name: String,
    pub reason: &'static str,
}

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("catalog unavailable at '{url}': {reason}")]
    Unavailable { url: String, reason: String },

    #[error("catalog at '{url}' returned a malformed response: {reason}")]
    Malformed { url: String, reason: String },

    #[error("XML-RPC fault {code}: {message}")]
    Fault { code: i64, message: String },

    #[error("invalid glob pattern '{pattern}': {reason}")]
    Pattern { pattern: String, reason: String },

    #[error(transparent)]
    State(#[from] pkgmirror_state::StateError),
}

pub type Result<T> = std::result::Result<T, CatalogError>;
