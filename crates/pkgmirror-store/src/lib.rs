//! The local replica of mirrored artifacts.
//!
//! Only this crate writes artifacts and digest sidecars. Downloads land in a
//! hidden staging file first and are renamed into place once verified.

mod error;
mod integrity;
mod store;

pub use error::{Result, StoreError};
pub use store::{MirrorStore, StagedArtifact};
