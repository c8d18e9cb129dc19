use std::path::{Path, PathBuf};

use filetime::FileTime;
use tracing::{debug, warn};

use crate::format::ContainerFormat;
use crate::{Error, Result};

const EMPTY_FILE_PREFIX: &str = "(empty file) ";
const DEFAULT_FUTURE_SLACK_SECS: i64 = 24 * 60 * 60;

/// Result of normalizing one file's modification time.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NormalizeOutcome {
    /// The file's atime and mtime were set to the newest internal entry.
    Touched { mtime: i64 },
    /// The container's newest timestamp is zero, negative or in the future.
    Implausible { mtime: i64 },
    /// A container without any timestamped entries.
    NoEntries,
    /// Not a container; left as downloaded.
    Passthrough,
    /// Zero-length file, recorded in the error log.
    Empty,
    /// Could not be opened or parsed, recorded in the error log.
    Failed,
}

/// Per-outcome counts of a [`Normalizer::normalize_tree`] walk.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RetouchSummary {
    pub touched: usize,
    pub implausible: usize,
    pub no_entries: usize,
    pub passthrough: usize,
    pub empty: usize,
    pub failed: usize,
}

impl RetouchSummary {
    fn count(&mut self, outcome: NormalizeOutcome) {
        let slot = match outcome {
            NormalizeOutcome::Touched { .. } => &mut self.touched,
            NormalizeOutcome::Implausible { .. } => &mut self.implausible,
            NormalizeOutcome::NoEntries => &mut self.no_entries,
            NormalizeOutcome::Passthrough => &mut self.passthrough,
            NormalizeOutcome::Empty => &mut self.empty,
            NormalizeOutcome::Failed => &mut self.failed,
        };
        *slot += 1;
    }

    pub fn files(&self) -> usize {
        self.touched
            + self.implausible
            + self.no_entries
            + self.passthrough
            + self.empty
            + self.failed
    }
}

/// Applies a container's newest internal timestamp to the file itself.
///
/// Failures never propagate: they are logged and appended to the optional
/// error side-record, and the file keeps its download-time mtime.
#[derive(Clone, Debug)]
pub struct Normalizer {
    error_log: Option<PathBuf>,
    future_slack_secs: i64,
}

impl Default for Normalizer {
    fn default() -> Self {
        Self {
            error_log: None,
            future_slack_secs: DEFAULT_FUTURE_SLACK_SECS,
        }
    }
}

impl Normalizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append failing paths to `path`, one per line.
    pub fn with_error_log(mut self, path: impl Into<PathBuf>) -> Self {
        self.error_log = Some(path.into());
        self
    }

    pub fn error_log(&self) -> Option<&Path> {
        self.error_log.as_deref()
    }

    pub fn normalize(&self, path: &Path) -> NormalizeOutcome {
        match self.try_normalize(path) {
            Ok(outcome) => {
                if outcome == NormalizeOutcome::Empty {
                    self.record(&format!("{EMPTY_FILE_PREFIX}{}", path.display()));
                }
                outcome
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "cannot read archive timestamps");
                self.record(&path.display().to_string());
                NormalizeOutcome::Failed
            }
        }
    }

    /// Normalize every regular file below `root`, in name order.
    ///
    /// Dot-files (digest sidecars, lock and staging files) are skipped. A
    /// directory that cannot be listed aborts the walk; per-file failures
    /// only show up in the summary and the error log.
    pub fn normalize_tree(&self, root: &Path) -> Result<RetouchSummary> {
        let mut summary = RetouchSummary::default();
        self.walk(root, &mut summary)?;
        Ok(summary)
    }

    fn walk(&self, dir: &Path, summary: &mut RetouchSummary) -> Result<()> {
        let open = |source: std::io::Error| Error::Open {
            path: dir.to_path_buf(),
            source,
        };
        let mut entries = std::fs::read_dir(dir)
            .map_err(open)?
            .collect::<std::io::Result<Vec<_>>>()
            .map_err(open)?;
        entries.sort_by_key(|entry| entry.file_name());

        for entry in entries {
            if entry.file_name().to_string_lossy().starts_with('.') {
                continue;
            }
            let path = entry.path();
            let file_type = entry.file_type().map_err(|source| Error::Open {
                path: path.clone(),
                source,
            })?;
            if file_type.is_dir() {
                debug!(path = %path.display(), "retouching directory");
                self.walk(&path, summary)?;
            } else if file_type.is_file() {
                summary.count(self.normalize(&path));
            }
        }
        Ok(())
    }

    fn try_normalize(&self, path: &Path) -> Result<NormalizeOutcome> {
        let metadata = std::fs::metadata(path).map_err(|source| Error::Open {
            path: path.to_path_buf(),
            source,
        })?;
        if metadata.len() == 0 {
            return Ok(NormalizeOutcome::Empty);
        }

        let format = ContainerFormat::classify(path)?;
        if !format.has_internal_timestamps() {
            return Ok(NormalizeOutcome::Passthrough);
        }

        let Some(mtime) = format.latest_internal_timestamp(path)? else {
            return Ok(NormalizeOutcome::NoEntries);
        };
        if !self.is_plausible(mtime) {
            debug!(path = %path.display(), mtime, "ignoring implausible archive timestamp");
            return Ok(NormalizeOutcome::Implausible { mtime });
        }

        let stamp = FileTime::from_unix_time(mtime, 0);
        filetime::set_file_times(path, stamp, stamp).map_err(|source| Error::Touch {
            path: path.to_path_buf(),
            source,
        })?;
        debug!(path = %path.display(), mtime, "normalized archive mtime");
        Ok(NormalizeOutcome::Touched { mtime })
    }

    fn is_plausible(&self, mtime: i64) -> bool {
        mtime > 0 && mtime <= chrono::Utc::now().timestamp() + self.future_slack_secs
    }

    fn record(&self, line: &str) {
        let Some(log) = &self.error_log else {
            return;
        };
        if let Err(e) = pkgmirror_fs::append_line(log, line) {
            warn!(log = %log.display(), error = %e, "cannot append to error log");
        }
    }
}
