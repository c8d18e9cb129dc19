use std::path::PathBuf;
use std::time::Duration;

use chrono::Utc;
use pkgmirror_archive::{Normalizer, RetouchSummary};
use pkgmirror_catalog::{
    CatalogDiff, CatalogError, CatalogService, NameFilter, PackageName, SyncMode,
};
use pkgmirror_fetch::{HttpClient, RedirectPolicy, RedirectResolver};
use pkgmirror_fs::RunLock;
use pkgmirror_state::{ResumeCursor, ResumeState, StateError};
use pkgmirror_store::MirrorStore;
use tracing::{debug, error, info, warn};
use url::Url;

use crate::error::{Result, SyncError};
use crate::links::{FilenameFilter, scan_external, scan_index};
use crate::pipeline::{Outcome, Pipeline};
use crate::stats::RunStats;

pub const DEFAULT_WINDOW: Duration = Duration::from_secs(7 * 24 * 3600);
pub const AUTO_WINDOW_MARGIN: Duration = Duration::from_secs(3 * 3600);
pub const ERROR_LOG_FILE: &str = "file_errors.txt";

/// Everything a [`Mirror`] needs to know about its environment.
#[derive(Clone, Debug)]
pub struct MirrorConfig {
    pub mirror_root: PathBuf,
    pub state_dir: PathBuf,
    pub lock_file_name: String,
    pub simple_url: String,
    pub package_patterns: Vec<String>,
    pub filename_patterns: Vec<String>,
    pub include_undigested: bool,
    /// Also mirror files behind `download_url` and `home_page` links.
    pub external_links: bool,
    pub redirect: RedirectPolicy,
    pub default_window: Duration,
    pub poll_interval: Duration,
}

impl MirrorConfig {
    pub fn new(mirror_root: impl Into<PathBuf>, simple_url: impl Into<String>) -> Self {
        Self {
            mirror_root: mirror_root.into(),
            state_dir: PathBuf::from("."),
            lock_file_name: ".pkgmirror.lock".to_string(),
            simple_url: simple_url.into(),
            package_patterns: Vec::new(),
            filename_patterns: Vec::new(),
            include_undigested: false,
            external_links: false,
            redirect: RedirectPolicy::default(),
            default_window: DEFAULT_WINDOW,
            poll_interval: Duration::from_secs(3600),
        }
    }

    pub fn error_log(&self) -> PathBuf {
        self.state_dir.join(ERROR_LOG_FILE)
    }
}

/// Incremental window of a run.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WindowSpec {
    Fixed(Duration),
    /// Time since the last successful run plus a margin.
    Auto,
}

#[derive(Clone, Debug)]
pub struct RunRequest {
    pub mode: SyncMode,
    pub window: WindowSpec,
    /// Discard run checkpoints before resolving the catalog.
    pub restart: bool,
}

impl RunRequest {
    pub fn full() -> Self {
        Self {
            mode: SyncMode::Full,
            window: WindowSpec::Auto,
            restart: false,
        }
    }

    pub fn incremental(window: WindowSpec) -> Self {
        Self {
            mode: SyncMode::Incremental,
            window,
            restart: false,
        }
    }

    pub fn restart(mut self, restart: bool) -> Self {
        self.restart = restart;
        self
    }
}

/// The synchronization engine.
///
/// A pass takes the run lock, resolves which packages to visit, walks them in
/// order while saving a cursor after each one, and clears its checkpoints
/// once the walk completes.
pub struct Mirror<C, S> {
    config: MirrorConfig,
    client: C,
    catalog: S,
    resolver: RedirectResolver<C>,
    store: MirrorStore,
    state: ResumeState,
    normalizer: Normalizer,
    names: NameFilter,
    files: FilenameFilter,
    index_url: Url,
}

impl<C, S> Mirror<C, S>
where
    C: HttpClient + Clone,
    S: CatalogService,
{
    pub fn new(config: MirrorConfig, client: C, catalog: S) -> Result<Self> {
        let names = NameFilter::new(&config.package_patterns)
            .map_err(|e| SyncError::Config(e.to_string()))?;
        let files = FilenameFilter::new(&config.filename_patterns)
            .map_err(|e| SyncError::Config(format!("invalid filename pattern: {e}")))?;
        let mut simple_url = config.simple_url.clone();
        if !simple_url.ends_with('/') {
            simple_url.push('/');
        }
        let index_url = Url::parse(&simple_url).map_err(|e| {
            SyncError::Config(format!("invalid simple index URL '{simple_url}': {e}"))
        })?;

        Ok(Self {
            resolver: RedirectResolver::new(client.clone(), config.redirect.clone()),
            store: MirrorStore::new(&config.mirror_root),
            state: ResumeState::new(&config.state_dir),
            normalizer: Normalizer::new().with_error_log(config.error_log()),
            client,
            catalog,
            names,
            files,
            index_url,
            config,
        })
    }

    pub fn config(&self) -> &MirrorConfig {
        &self.config
    }

    pub fn catalog(&self) -> &S {
        &self.catalog
    }

    pub fn store(&self) -> &MirrorStore {
        &self.store
    }

    pub fn state(&self) -> &ResumeState {
        &self.state
    }

    /// Run one pass.
    pub async fn run(&self, request: &RunRequest) -> Result<RunStats> {
        self.store.prepare().map_err(|source| SyncError::MirrorRoot {
            path: self.config.mirror_root.clone(),
            source,
        })?;
        let lock_path = self.config.mirror_root.join(&self.config.lock_file_name);
        let _lock = RunLock::try_acquire(&lock_path).map_err(SyncError::Lock)?;
        debug!(path = %lock_path.display(), "run lock acquired");
        pkgmirror_fs::ensure_dir(self.state.dir()).map_err(StateError::from)?;

        if request.restart {
            info!("discarding run checkpoints");
            self.state.clear_run()?;
        }

        let window = self.window(request.window);
        let snapshot = CatalogDiff::new(&self.catalog, &self.state)
            .resolve(request.mode, window, &self.names)
            .await
            .map_err(|e| match e {
                CatalogError::State(e) => SyncError::Checkpoint(e),
                other => SyncError::CatalogUnavailable(other),
            })?;

        let total = snapshot.len();
        let mut cursor = match self.state.load_cursor(&snapshot) {
            Some(cursor) if !cursor.is_finished() => {
                info!(completed = cursor.completed, total, "resuming interrupted run");
                cursor
            }
            _ => {
                self.state.clear_cursor()?;
                ResumeCursor::new(&snapshot, 0)
            }
        };
        info!(mode = ?request.mode, total, "starting pass");

        let mut stats = RunStats::new();
        for (i, raw) in snapshot.names().iter().enumerate().skip(cursor.completed) {
            self.process_package(raw, &mut stats).await;
            cursor.completed = i + 1;
            self.state.save_cursor(&cursor)?;
        }

        self.state.clear_run()?;
        self.state.save_last_success(Utc::now())?;
        stats.finish();
        for line in stats.summary_lines() {
            info!("{line}");
        }
        Ok(stats)
    }

    /// Run passes until `max_passes` is reached, or forever without one.
    ///
    /// Every pass after the first is incremental with an automatic window.
    /// A failed pass is logged and retried after the poll interval.
    pub async fn run_forever(&self, first: &RunRequest, max_passes: Option<usize>) {
        let mut request = first.clone();
        let mut passes = 0;
        loop {
            match self.run(&request).await {
                Ok(stats) => debug!(stored = stats.stored, "pass complete"),
                Err(e) => error!(error = %e, "pass failed"),
            }
            passes += 1;
            if max_passes.is_some_and(|max| passes >= max) {
                return;
            }
            info!(secs = self.config.poll_interval.as_secs(), "sleeping until next pass");
            tokio::time::sleep(self.config.poll_interval).await;
            request = RunRequest::incremental(WindowSpec::Auto);
        }
    }

    fn window(&self, spec: WindowSpec) -> Duration {
        match spec {
            WindowSpec::Fixed(window) => window,
            WindowSpec::Auto => match self.state.load_last_success() {
                Some(last) => {
                    let since = (Utc::now() - last).to_std().unwrap_or(Duration::ZERO);
                    since + AUTO_WINDOW_MARGIN
                }
                None => self.config.default_window,
            },
        }
    }

    async fn process_package(&self, raw: &str, stats: &mut RunStats) {
        let package = match PackageName::new(raw) {
            Ok(package) => package,
            Err(e) => {
                warn!(error = %e, "skipping package");
                stats.invalid_package += 1;
                return;
            }
        };

        let Some((page_url, html)) = self.fetch_index(&package).await else {
            stats.not_found += 1;
            return;
        };

        let mut references =
            scan_index(&page_url, &html, &self.files, self.config.include_undigested);
        if self.config.external_links {
            for external in scan_external(&page_url, &html, &self.files) {
                if !references.iter().any(|r| r.url == external.url) {
                    references.push(external);
                }
            }
        }
        debug!(package = %package, links = references.len(), "scanned index page");

        let pipeline = Pipeline::new(&self.client, &self.resolver, &self.store, &self.normalizer);
        for reference in &references {
            match pipeline.ensure(&package, reference).await {
                Ok(Outcome::Found { .. }) => stats.found += 1,
                Ok(Outcome::Stored { .. }) => stats.stored += 1,
                Err(e) => {
                    warn!(package = %package, url = %reference.url, error = %e, "skipping artifact");
                    stats.invalid_url += 1;
                }
            }
        }
    }

    async fn fetch_index(&self, package: &PackageName) -> Option<(Url, String)> {
        let page_url = match self.index_url.join(&format!("{}/", package.canonical())) {
            Ok(url) => url,
            Err(e) => {
                warn!(package = %package, error = %e, "cannot build index URL");
                return None;
            }
        };
        let response = match self.client.get(page_url.as_str(), &[]).await {
            Ok(response) => response,
            Err(e) => {
                warn!(package = %package, url = %page_url, error = %e, "index page unreachable");
                return None;
            }
        };
        if response.status != 200 {
            info!(package = %package, url = %page_url, status = response.status, "index page not found");
            return None;
        }
        match response.text().await {
            Ok(html) => Some((page_url, html)),
            Err(e) => {
                warn!(package = %package, url = %page_url, error = %e, "unreadable index page");
                None
            }
        }
    }
}

/// Re-apply archive timestamps to every file already in the mirror.
///
/// Holds the run lock for the whole walk, so it never races a pass.
pub fn retouch(config: &MirrorConfig) -> Result<RetouchSummary> {
    if !config.mirror_root.is_dir() {
        return Err(SyncError::Config(format!(
            "mirror root '{}' is not a directory",
            config.mirror_root.display()
        )));
    }
    let lock_path = config.mirror_root.join(&config.lock_file_name);
    let _lock = RunLock::try_acquire(&lock_path).map_err(SyncError::Lock)?;
    pkgmirror_fs::ensure_dir(&config.state_dir).map_err(StateError::from)?;

    info!(root = %config.mirror_root.display(), "retouching mirror");
    let summary = Normalizer::new()
        .with_error_log(config.error_log())
        .normalize_tree(&config.mirror_root)
        .map_err(SyncError::Retouch)?;
    info!(
        files = summary.files(),
        touched = summary.touched,
        failed = summary.failed,
        empty = summary.empty,
        "retouch complete"
    );
    Ok(summary)
}
