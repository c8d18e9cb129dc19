//! Which packages a mirror run has to visit.
//!
//! [`CatalogDiff`] turns the remote catalog into a [`CatalogSnapshot`]: the
//! whole (filtered) universe for a full run, or only the packages whose files
//! changed within a time window for an incremental one.
//!
//! [`CatalogSnapshot`]: pkgmirror_state::CatalogSnapshot

mod diff;
mod error;
mod name;
mod service;
pub mod xmlrpc;

pub use diff::{CatalogDiff, NameFilter, SyncMode};
pub use error::{CatalogError, InvalidPackageName, Result};
pub use name::PackageName;
pub use service::{CatalogService, ChangeEntry, PypiCatalog, SIMPLE_JSON};
