//! Container classification and archive timestamp normalization.
//!
//! A freshly downloaded archive carries the download wall-clock time. The
//! [`Normalizer`] replaces it with the newest timestamp recorded inside the
//! container so mirrored files sort by when they were built.
//!
//! ```no_run
//! use pkgmirror_archive::{Normalizer, NormalizeOutcome};
//! use std::path::Path;
//!
//! let normalizer = Normalizer::new().with_error_log("file_errors.txt");
//! if let NormalizeOutcome::Touched { mtime } = normalizer.normalize(Path::new("pkg-1.0.tar.gz")) {
//!     println!("mtime set to {mtime}");
//! }
//! ```

mod error;
mod format;
mod normalize;
mod tar;
mod zip;

pub use error::{Error, Result};
pub use format::{ContainerFormat, Decoder, TarCompress, detect_format};
pub use normalize::{NormalizeOutcome, Normalizer, RetouchSummary};
