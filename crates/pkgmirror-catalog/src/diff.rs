use std::collections::HashSet;
use std::time::Duration;

use chrono::Utc;
use pkgmirror_state::{CatalogSnapshot, ResumeState, SnapshotKind, SnapshotSlot};
use tracing::info;

use crate::service::CatalogService;
use crate::{CatalogError, Result};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SyncMode {
    Full,
    Incremental,
}

/// Shell-style globs over package names. No patterns accepts everything.
#[derive(Clone, Debug, Default)]
pub struct NameFilter {
    patterns: Vec<glob::Pattern>,
}

impl NameFilter {
    pub fn new<S: AsRef<str>>(patterns: &[S]) -> Result<Self> {
        let patterns = patterns
            .iter()
            .map(|p| {
                glob::Pattern::new(p.as_ref()).map_err(|e| CatalogError::Pattern {
                    pattern: p.as_ref().to_string(),
                    reason: e.to_string(),
                })
            })
            .collect::<Result<_>>()?;
        Ok(Self { patterns })
    }

    pub fn accept_all() -> Self {
        Self::default()
    }

    pub fn accepts(&self, name: &str) -> bool {
        self.patterns.is_empty() || self.patterns.iter().any(|p| p.matches(name))
    }
}

/// Decides which package names a run has to visit.
///
/// Both modes reuse a snapshot persisted by an unfinished earlier run, so a
/// resumed run walks exactly the list its cursor was written against.
pub struct CatalogDiff<'a, S> {
    service: &'a S,
    state: &'a ResumeState,
}

impl<'a, S: CatalogService> CatalogDiff<'a, S> {
    pub fn new(service: &'a S, state: &'a ResumeState) -> Self {
        Self { service, state }
    }

    pub async fn resolve(
        &self,
        mode: SyncMode,
        window: Duration,
        filter: &NameFilter,
    ) -> Result<CatalogSnapshot> {
        match mode {
            SyncMode::Full => self.filtered_universe(filter).await,
            SyncMode::Incremental => self.incremental(window, filter).await,
        }
    }

    async fn universe(&self) -> Result<CatalogSnapshot> {
        if let Some(snapshot) = self.state.load_snapshot(SnapshotSlot::Full) {
            info!(count = snapshot.len(), "reusing persisted package list");
            return Ok(snapshot);
        }
        let names = self.service.list_all_names().await?;
        let snapshot = CatalogSnapshot::new(SnapshotKind::Full, names);
        self.state.save_snapshot(SnapshotSlot::Full, &snapshot)?;
        info!(count = snapshot.len(), "persisted package list");
        Ok(snapshot)
    }

    async fn filtered_universe(&self, filter: &NameFilter) -> Result<CatalogSnapshot> {
        let universe = self.universe().await?;
        let created_at = universe.created_at;
        let mut filtered = CatalogSnapshot::new(
            SnapshotKind::Full,
            universe.into_names().into_iter().filter(|n| filter.accepts(n)),
        );
        filtered.created_at = created_at;
        info!(count = filtered.len(), "filtered package list");
        Ok(filtered)
    }

    async fn incremental(&self, window: Duration, filter: &NameFilter) -> Result<CatalogSnapshot> {
        if let Some(snapshot) = self.state.load_snapshot(SnapshotSlot::Incremental) {
            info!(count = snapshot.len(), "reusing persisted incremental list");
            return Ok(snapshot);
        }

        let universe = self.filtered_universe(filter).await?;
        let known: HashSet<&str> = universe.names().iter().map(String::as_str).collect();

        let window_secs = window.as_secs();
        let since = Utc::now().timestamp() - i64::try_from(window_secs).unwrap_or(i64::MAX);
        let changes = self.service.changes_since(since).await?;

        let changed = changes
            .into_iter()
            .filter(|entry| entry.is_file_change() && known.contains(entry.name.as_str()))
            .map(|entry| entry.name);
        let snapshot = CatalogSnapshot::new(SnapshotKind::Incremental { window_secs }, changed);

        self.state.save_snapshot(SnapshotSlot::Incremental, &snapshot)?;
        info!(count = snapshot.len(), window_secs, "persisted incremental list");
        Ok(snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_filter_accepts_all() {
        assert!(NameFilter::accept_all().accepts("anything"));
    }

    #[test]
    fn globs_select_names() {
        let filter = NameFilter::new(&["zope*", "django-?"]).unwrap();
        assert!(filter.accepts("zope.interface"));
        assert!(filter.accepts("django-x"));
        assert!(!filter.accepts("requests"));
    }

    #[test]
    fn bad_pattern_is_reported() {
        assert!(matches!(
            NameFilter::new(&["[unclosed"]),
            Err(CatalogError::Pattern { .. })
        ));
    }
}
