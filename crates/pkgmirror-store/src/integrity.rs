use pkgmirror_verify::{Digest, digest_file};
use tracing::{debug, warn};

use crate::MirrorStore;

impl MirrorStore {
    /// Whether the local copy of `filename` can be kept as is.
    ///
    /// With a digest, the cached sidecar is trusted when present; otherwise the
    /// file is hashed once and the result cached. Without a digest only an
    /// exact size match confirms the file, and an unknown remote size never
    /// does.
    pub fn is_up_to_date(
        &self,
        package: &str,
        filename: &str,
        expected_digest: Option<&Digest>,
        expected_size: Option<u64>,
    ) -> bool {
        let Ok(path) = self.artifact_path(package, filename) else {
            return false;
        };
        let Ok(metadata) = std::fs::metadata(&path) else {
            return false;
        };
        if !metadata.is_file() {
            return false;
        }

        let Some(expected) = expected_digest else {
            return expected_size == Some(metadata.len());
        };

        let algorithm = expected.algorithm();
        let actual = match self.read_sidecar(package, filename, algorithm) {
            Some(cached) => cached,
            None => match digest_file(&path, algorithm) {
                Ok(computed) => {
                    if let Err(e) = self.write_sidecar(package, filename, &computed) {
                        warn!(path = %path.display(), error = %e, "cannot cache digest");
                    }
                    computed
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "cannot hash local artifact");
                    return false;
                }
            },
        };

        let matches = expected.verify(&actual).is_ok();
        if !matches {
            debug!(path = %path.display(), %expected, %actual, "local artifact is stale");
        }
        matches
    }
}
