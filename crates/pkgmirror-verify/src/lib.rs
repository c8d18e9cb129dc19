//! Content verification primitives for mirrored artifacts.
//!
//! Digests are computed incrementally while bytes stream past, so a download
//! is hashed in the same pass that writes it to disk.
//!
//! # Example
//!
//! ```
//! use pkgmirror_verify::{Digest, Hasher, Md5Hasher};
//!
//! let expected = Digest::from_fragment("md5=5eb63bbbe01eeed093cb22bb8f5acdc3").unwrap();
//! let mut hasher = expected.algorithm().hasher();
//! hasher.update(b"hello world");
//! let actual = Digest::new(expected.algorithm(), hasher.finalize()).unwrap();
//! expected.verify(&actual).unwrap();
//! # let _ = Md5Hasher::digest(b"");
//! ```

pub use self::digest::{Digest, DigestAlgorithm, digest_file};
pub use self::error::{Result, VerificationError};
pub use self::hasher::{AnyHasher, Hasher, Md5Hasher, Sha256Hasher};
pub use self::reader::VerifiedReader;

mod digest;
mod error;
mod hasher;
mod reader;
