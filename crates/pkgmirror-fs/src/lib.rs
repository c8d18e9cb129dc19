//! Filesystem primitives shared by the mirror crates.
//!
//! - [`atomic_write`] replaces files through a sibling temp file and rename
//! - [`append_line`] feeds append-only record files
//! - [`RunLock`] is the advisory lock that keeps one run per mirror root

mod error;
mod lock;
mod rw;

pub use error::{Error, Result};
pub use lock::RunLock;
pub use rw::{
    AtomicWriteOptions, append_line, atomic_read, atomic_write, ensure_dir, read_optional,
    remove_if_exists, staging_path,
};
