use std::fs;
use std::path::{Path, PathBuf};

use pkgmirror_fs::AtomicWriteOptions;
use pkgmirror_verify::{AnyHasher, Digest, DigestAlgorithm, Hasher};
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use crate::{Result, StoreError};

const STAGING_SUFFIX: &str = ".part";
const PROBE_FILE: &str = ".pkgmirror-write-probe";

/// Filesystem replica: `<root>/<package>/<filename>` plus hidden digest
/// sidecars `<root>/<package>/.<filename>.<algorithm>`.
#[derive(Clone, Debug)]
pub struct MirrorStore {
    root: PathBuf,
}

impl MirrorStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create the root if needed and prove it accepts writes.
    pub fn prepare(&self) -> Result<()> {
        pkgmirror_fs::ensure_dir(&self.root)?;
        let probe = self.root.join(PROBE_FILE);
        fs::write(&probe, b"").map_err(|source| StoreError::RootNotWritable {
            path: self.root.clone(),
            source,
        })?;
        let _ = fs::remove_file(&probe);
        Ok(())
    }

    pub fn package_dir(&self, package: &str) -> Result<PathBuf> {
        check_component(package)?;
        Ok(self.root.join(package))
    }

    pub fn artifact_path(&self, package: &str, filename: &str) -> Result<PathBuf> {
        check_component(filename)?;
        Ok(self.package_dir(package)?.join(filename))
    }

    pub fn sidecar_path(
        &self,
        package: &str,
        filename: &str,
        algorithm: DigestAlgorithm,
    ) -> Result<PathBuf> {
        check_component(filename)?;
        Ok(self
            .package_dir(package)?
            .join(format!(".{filename}.{}", algorithm.as_str())))
    }

    /// Cached digest of an artifact. Unreadable or malformed sidecars count as
    /// missing.
    pub fn read_sidecar(
        &self,
        package: &str,
        filename: &str,
        algorithm: DigestAlgorithm,
    ) -> Option<Digest> {
        let path = self.sidecar_path(package, filename, algorithm).ok()?;
        let bytes = pkgmirror_fs::read_optional(&path).ok()??;
        match Digest::from_hex(algorithm, &String::from_utf8_lossy(&bytes)) {
            Ok(digest) => Some(digest),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "ignoring malformed sidecar");
                None
            }
        }
    }

    pub fn write_sidecar(&self, package: &str, filename: &str, digest: &Digest) -> Result<()> {
        let path = self.sidecar_path(package, filename, digest.algorithm())?;
        pkgmirror_fs::atomic_write(&path, digest.to_hex().as_bytes(), AtomicWriteOptions::new())?;
        Ok(())
    }

    /// Open a staging file next to the final artifact location. Bytes written
    /// to it are hashed with `algorithm` on the way through.
    pub async fn stage(
        &self,
        package: &str,
        filename: &str,
        algorithm: DigestAlgorithm,
    ) -> Result<StagedArtifact> {
        let target = self.artifact_path(package, filename)?;
        pkgmirror_fs::ensure_dir(self.package_dir(package)?)?;
        let staging = pkgmirror_fs::staging_path(
            &target,
            AtomicWriteOptions::new().suffix(STAGING_SUFFIX),
        );
        let file = tokio::fs::File::create(&staging)
            .await
            .map_err(|source| StoreError::Write {
                path: staging.clone(),
                source,
            })?;
        Ok(StagedArtifact {
            file: Some(file),
            staging,
            target,
            algorithm,
            hasher: Some(algorithm.hasher()),
            size: 0,
            committed: false,
        })
    }
}

fn check_component(name: &str) -> Result<()> {
    let bad = name.is_empty()
        || name == "."
        || name == ".."
        || name.contains(['/', '\\', '\0']);
    if bad {
        return Err(StoreError::InvalidName {
            name: name.to_string(),
        });
    }
    Ok(())
}

/// A download in progress. Dropping it without [`commit`](Self::commit)
/// removes the staging file, so the final path never holds a partial body.
pub struct StagedArtifact {
    file: Option<tokio::fs::File>,
    staging: PathBuf,
    target: PathBuf,
    algorithm: DigestAlgorithm,
    hasher: Option<AnyHasher>,
    size: u64,
    committed: bool,
}

impl StagedArtifact {
    pub async fn write_chunk(&mut self, chunk: &[u8]) -> Result<()> {
        let Some(file) = self.file.as_mut() else {
            return Ok(());
        };
        file.write_all(chunk)
            .await
            .map_err(|source| StoreError::Write {
                path: self.staging.clone(),
                source,
            })?;
        if let Some(hasher) = self.hasher.as_mut() {
            hasher.update(chunk);
        }
        self.size += chunk.len() as u64;
        Ok(())
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    /// Flush the body to disk and return its digest. Further writes are
    /// ignored.
    pub async fn seal(&mut self) -> Result<Digest> {
        if let Some(mut file) = self.file.take() {
            let synced = async {
                file.flush().await?;
                file.sync_all().await
            };
            synced.await.map_err(|source| StoreError::Write {
                path: self.staging.clone(),
                source,
            })?;
        }
        let bytes = self
            .hasher
            .take()
            .unwrap_or_else(|| self.algorithm.hasher())
            .finalize();
        Ok(Digest::new(self.algorithm, bytes)?)
    }

    /// Move the staged body into its final place.
    pub fn commit(mut self) -> Result<PathBuf> {
        drop(self.file.take());
        fs::rename(&self.staging, &self.target).map_err(|source| StoreError::Write {
            path: self.target.clone(),
            source,
        })?;
        self.committed = true;
        debug!(path = %self.target.display(), size = self.size, "artifact committed");
        Ok(self.target.clone())
    }
}

impl std::fmt::Debug for StagedArtifact {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StagedArtifact")
            .field("staging", &self.staging)
            .field("target", &self.target)
            .field("algorithm", &self.algorithm)
            .field("size", &self.size)
            .finish_non_exhaustive()
    }
}

impl Drop for StagedArtifact {
    fn drop(&mut self) {
        if !self.committed {
            drop(self.file.take());
            let _ = fs::remove_file(&self.staging);
        }
    }
}
