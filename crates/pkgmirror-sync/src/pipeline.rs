use futures_util::StreamExt;
use pkgmirror_archive::{NormalizeOutcome, Normalizer};
use pkgmirror_catalog::PackageName;
use pkgmirror_fetch::{HttpClient, RedirectResolver, Resolution};
use pkgmirror_store::MirrorStore;
use pkgmirror_verify::DigestAlgorithm;
use tracing::{debug, info, warn};

use crate::error::ArtifactError;
use crate::links::RemoteReference;

/// Algorithm for the sidecar of an artifact that came without a digest.
const DEFAULT_SIDECAR_ALGORITHM: DigestAlgorithm = DigestAlgorithm::Md5;

const HTML_TYPES: &[&str] = &["text/html", "application/xhtml+xml"];

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Outcome {
    /// Already present and verified; nothing was downloaded.
    Found { filename: String },
    /// Downloaded, verified and committed.
    Stored { filename: String, bytes: u64 },
}

/// Resolve, check, download, verify, commit, normalize: one artifact at a
/// time.
pub struct Pipeline<'a, C> {
    client: &'a C,
    resolver: &'a RedirectResolver<C>,
    store: &'a MirrorStore,
    normalizer: &'a Normalizer,
}

impl<'a, C: HttpClient> Pipeline<'a, C> {
    pub fn new(
        client: &'a C,
        resolver: &'a RedirectResolver<C>,
        store: &'a MirrorStore,
        normalizer: &'a Normalizer,
    ) -> Self {
        Self {
            client,
            resolver,
            store,
            normalizer,
        }
    }

    pub async fn ensure(
        &self,
        package: &PackageName,
        reference: &RemoteReference,
    ) -> Result<Outcome, ArtifactError> {
        let download = match self.resolver.resolve(&reference.url).await {
            Resolution::Resolved(download) => download,
            Resolution::Unresolved(reason) => {
                return Err(ArtifactError::InvalidUrl {
                    url: reference.url.clone(),
                    reason,
                });
            }
        };
        let pkg = package.as_str();
        let filename = download.filename;
        let url = download.url;

        let local = self.store.artifact_path(pkg, &filename)?;
        let expected_size = match (&reference.digest, local.is_file()) {
            (None, true) => self.resolver.probe_size(&url).await,
            _ => None,
        };
        if self
            .store
            .is_up_to_date(pkg, &filename, reference.digest.as_ref(), expected_size)
        {
            debug!(package = %package, %filename, "found");
            return Ok(Outcome::Found { filename });
        }

        let response = self
            .client
            .get(&url, &[])
            .await
            .map_err(|e| ArtifactError::Download {
                url: url.clone(),
                reason: e.to_string(),
            })?;
        if !response.is_success() {
            return Err(ArtifactError::Download {
                url,
                reason: format!("HTTP {}", response.status),
            });
        }
        if let Some(content_type) = response.content_type.as_deref() {
            let lowered = content_type.to_ascii_lowercase();
            if HTML_TYPES.iter().any(|t| lowered.contains(t)) {
                return Err(ArtifactError::NotAPackageFile {
                    url,
                    content_type: content_type.to_string(),
                });
            }
        }

        let algorithm = reference
            .digest
            .as_ref()
            .map_or(DEFAULT_SIDECAR_ALGORITHM, |d| d.algorithm());
        let mut staged = self.store.stage(pkg, &filename, algorithm).await?;
        let mut body = response.body;
        while let Some(chunk) = body.next().await {
            let chunk = chunk.map_err(|e| ArtifactError::Download {
                url: url.clone(),
                reason: e.to_string(),
            })?;
            staged.write_chunk(&chunk).await?;
        }
        let actual = staged.seal().await?;

        if let Some(expected) = &reference.digest {
            if expected.verify(&actual).is_err() {
                return Err(ArtifactError::DigestMismatch {
                    url,
                    expected: expected.to_string(),
                    actual: actual.to_string(),
                });
            }
        }

        let bytes = staged.size();
        let path = staged.commit()?;
        if let Err(e) = self.store.write_sidecar(pkg, &filename, &actual) {
            warn!(package = %package, %filename, error = %e, "cannot write digest sidecar");
        }
        info!(package = %package, %filename, bytes, "stored");

        match self.normalizer.normalize(&path) {
            NormalizeOutcome::Touched { mtime } => debug!(%filename, mtime, "timestamp normalized"),
            other => debug!(%filename, outcome = ?other, "timestamp left as downloaded"),
        }
        Ok(Outcome::Stored { filename, bytes })
    }
}
