//! HTTP seam and redirect resolution for the package mirror.
//!
//! Upstream package links often hide the real file behind redirects and query
//! strings. [`RedirectResolver`] walks those with HEAD requests under a hop
//! budget and reports a typed [`Resolution`].

mod error;
pub mod http;
#[cfg(any(test, feature = "mock"))]
pub mod mock;
mod redirect;

pub use error::{FetchError, Result};
#[cfg(feature = "reqwest")]
pub use http::ReqwestClient;
pub use http::{HeadResponse, HttpClient, HttpConfig, Response};
pub use redirect::{
    DEFAULT_MAX_HOPS, RedirectPolicy, RedirectResolver, RemovedMarker, Resolution,
    ResolvedDownload, RewriteRule, UnresolvedReason, file_name, filename_from_disposition,
    is_redirect,
};
