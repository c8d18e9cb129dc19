use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{NaiveDate, Utc};
use filetime::FileTime;
use pkgmirror_catalog::{CatalogError, CatalogService, ChangeEntry};
use pkgmirror_fetch::mock::{Method, MockClient, MockRoute};
use pkgmirror_fs::RunLock;
use pkgmirror_state::{
    CURSOR_FILE, CatalogSnapshot, FULL_SNAPSHOT_FILE, INCREMENTAL_SNAPSHOT_FILE,
    LAST_SUCCESS_FILE, ResumeCursor, ResumeState, SnapshotKind, SnapshotSlot,
};
use pkgmirror_sync::{
    Mirror, MirrorConfig, RetouchSummary, RunRequest, SyncError, WindowSpec, retouch,
};
use pkgmirror_verify::{Digest, DigestAlgorithm, Md5Hasher, Sha256Hasher};

const SIMPLE: &str = "https://pypi.test/simple/";

#[derive(Default)]
struct FakeCatalog {
    names: Vec<String>,
    changes: Vec<ChangeEntry>,
    unavailable: bool,
    list_calls: AtomicUsize,
    since_calls: Mutex<Vec<i64>>,
}

impl FakeCatalog {
    fn with_names(names: &[&str]) -> Self {
        Self {
            names: names.iter().map(|n| n.to_string()).collect(),
            ..Self::default()
        }
    }
}

impl CatalogService for FakeCatalog {
    async fn list_all_names(&self) -> pkgmirror_catalog::Result<Vec<String>> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        if self.unavailable {
            return Err(CatalogError::Unavailable {
                url: "fake://catalog".into(),
                reason: "down".into(),
            });
        }
        Ok(self.names.clone())
    }

    async fn changes_since(&self, since: i64) -> pkgmirror_catalog::Result<Vec<ChangeEntry>> {
        self.since_calls.lock().unwrap().push(since);
        Ok(self.changes.clone())
    }
}

struct Fixture {
    _dir: tempfile::TempDir,
    root: PathBuf,
    state_dir: PathBuf,
    client: Arc<MockClient>,
}

impl Fixture {
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("web");
        let state_dir = dir.path().join("state");
        Self {
            root,
            state_dir,
            client: Arc::new(MockClient::new()),
            _dir: dir,
        }
    }

    fn config(&self) -> MirrorConfig {
        let mut config = MirrorConfig::new(&self.root, SIMPLE);
        config.state_dir = self.state_dir.clone();
        config.poll_interval = Duration::ZERO;
        config
    }

    fn mirror(&self, catalog: FakeCatalog) -> Mirror<Arc<MockClient>, FakeCatalog> {
        self.mirror_with(catalog, |_| {})
    }

    fn mirror_with(
        &self,
        catalog: FakeCatalog,
        tweak: impl FnOnce(&mut MirrorConfig),
    ) -> Mirror<Arc<MockClient>, FakeCatalog> {
        let mut config = self.config();
        tweak(&mut config);
        Mirror::new(config, self.client.clone(), catalog).unwrap()
    }

    fn local_file(&self, package: &str, filename: &str, body: &[u8]) -> PathBuf {
        let dir = self.root.join(package);
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join(filename);
        fs::write(&path, body).unwrap();
        path
    }

    fn index_page(&self, package: &str, links: &[String]) {
        let anchors: String = links
            .iter()
            .map(|href| format!("<a href=\"{href}\">file</a><br/>\n"))
            .collect();
        let html = format!("<html><body>\n{anchors}</body></html>");
        self.client.set_route(
            &format!("{SIMPLE}{package}/"),
            MockRoute::ok(html).content_type("text/html"),
        );
    }

    fn state(&self) -> ResumeState {
        ResumeState::new(&self.state_dir)
    }
}

fn md5_hex(data: &[u8]) -> String {
    Digest::new(DigestAlgorithm::Md5, Md5Hasher::digest(data))
        .unwrap()
        .to_hex()
}

fn sha256_hex(data: &[u8]) -> String {
    Digest::new(DigestAlgorithm::Sha256, Sha256Hasher::digest(data))
        .unwrap()
        .to_hex()
}

fn zip_bytes(entries: &[(&str, (u16, u8, u8, u8))]) -> Vec<u8> {
    let mut writer = zip::ZipWriter::new(std::io::Cursor::new(Vec::new()));
    for (name, (y, m, d, h)) in entries {
        let stamp = zip::DateTime::from_date_and_time(*y, *m, *d, *h, 0, 0).unwrap();
        let options = zip::write::SimpleFileOptions::default().last_modified_time(stamp);
        writer.start_file(*name, options).unwrap();
        writer.write_all(name.as_bytes()).unwrap();
    }
    writer.finish().unwrap().into_inner()
}

fn mtime_of(path: &Path) -> i64 {
    FileTime::from_last_modification_time(&fs::metadata(path).unwrap()).unix_seconds()
}

fn no_run_checkpoints(state_dir: &Path) -> bool {
    [FULL_SNAPSHOT_FILE, INCREMENTAL_SNAPSHOT_FILE, CURSOR_FILE]
        .iter()
        .all(|f| !state_dir.join(f).exists())
}

#[tokio::test]
async fn end_to_end_found_and_stored() {
    let fx = Fixture::new();

    let alpha = b"alpha source".to_vec();
    let alpha_url = "https://pypi.test/packages/alpha-1.0.tar.gz";
    fs::create_dir_all(fx.root.join("alpha")).unwrap();
    File::create(fx.root.join("alpha/alpha-1.0.tar.gz"))
        .unwrap()
        .write_all(&alpha)
        .unwrap();
    fx.index_page(
        "alpha",
        &[format!("../../packages/alpha-1.0.tar.gz#md5={}", md5_hex(&alpha))],
    );

    let beta = zip_bytes(&[
        ("beta/a.py", (2019, 1, 2, 3)),
        ("beta/c.py", (2023, 6, 7, 8)),
        ("beta/b.py", (2021, 4, 5, 6)),
    ]);
    let beta_url = "https://files.test/beta-2.0.zip";
    fx.index_page("beta", &[format!("{beta_url}#sha256={}", sha256_hex(&beta))]);
    fx.client.set_route(
        beta_url,
        MockRoute::ok(beta.clone()).content_type("application/zip"),
    );

    let mirror = fx.mirror(FakeCatalog::with_names(&["alpha", "beta"]));
    let stats = mirror.run(&RunRequest::full()).await.unwrap();

    assert_eq!((stats.found, stats.stored, stats.invalid_url), (1, 1, 0));
    assert_eq!(fx.client.count_url(Method::Get, alpha_url), 0);
    assert_eq!(fx.client.count_url(Method::Get, beta_url), 1);

    let stored = fx.root.join("beta/beta-2.0.zip");
    assert_eq!(fs::read(&stored).unwrap(), beta);
    assert_eq!(
        fs::read_to_string(fx.root.join("beta/.beta-2.0.zip.sha256")).unwrap(),
        sha256_hex(&beta)
    );
    let newest = NaiveDate::from_ymd_opt(2023, 6, 7)
        .unwrap()
        .and_hms_opt(8, 0, 0)
        .unwrap()
        .and_utc()
        .timestamp();
    assert_eq!(mtime_of(&stored), newest);

    assert!(no_run_checkpoints(&fx.state_dir));
    assert!(fx.state_dir.join(LAST_SUCCESS_FILE).exists());
}

#[tokio::test]
async fn second_pass_downloads_nothing() {
    let fx = Fixture::new();
    let body = b"gamma wheel".to_vec();
    let url = "https://files.test/gamma-0.1-py3-none-any.whl";
    fx.index_page("gamma", &[format!("{url}#md5={}", md5_hex(&body))]);
    fx.client.set_route(url, MockRoute::ok(body));

    let mirror = fx.mirror(FakeCatalog::with_names(&["gamma"]));
    let first = mirror.run(&RunRequest::full()).await.unwrap();
    let second = mirror.run(&RunRequest::full()).await.unwrap();

    assert_eq!(first.stored, 1);
    assert_eq!((second.found, second.stored), (1, 0));
    assert_eq!(fx.client.count_url(Method::Get, url), 1);
}

#[tokio::test]
async fn interrupted_run_resumes_after_last_finished_package() {
    let fx = Fixture::new();
    for name in ["p1", "p2", "p3"] {
        fx.index_page(name, &[]);
    }
    let state = fx.state();
    fs::create_dir_all(&fx.state_dir).unwrap();
    let snapshot = CatalogSnapshot::new(SnapshotKind::Full, ["p1", "p2", "p3"]);
    state.save_snapshot(SnapshotSlot::Full, &snapshot).unwrap();
    state.save_cursor(&ResumeCursor::new(&snapshot, 2)).unwrap();

    let catalog = FakeCatalog::with_names(&["p1", "p2", "p3", "p4"]);
    let mirror = fx.mirror(catalog);
    mirror.run(&RunRequest::full()).await.unwrap();

    assert_eq!(fx.client.count_url(Method::Get, &format!("{SIMPLE}p1/")), 0);
    assert_eq!(fx.client.count_url(Method::Get, &format!("{SIMPLE}p2/")), 0);
    assert_eq!(fx.client.count_url(Method::Get, &format!("{SIMPLE}p3/")), 1);
    assert_eq!(fx.client.count_url(Method::Get, &format!("{SIMPLE}p4/")), 0);
    assert!(no_run_checkpoints(&fx.state_dir));
}

#[tokio::test]
async fn cursor_from_full_pass_does_not_skip_incremental_names() {
    let fx = Fixture::new();
    for name in ["p1", "p2", "p3"] {
        fx.index_page(name, &[]);
    }
    let state = fx.state();
    fs::create_dir_all(&fx.state_dir).unwrap();
    let snapshot = CatalogSnapshot::new(SnapshotKind::Full, ["p1", "p2", "p3"]);
    state.save_snapshot(SnapshotSlot::Full, &snapshot).unwrap();
    state.save_cursor(&ResumeCursor::new(&snapshot, 2)).unwrap();

    let now = Utc::now().timestamp();
    let catalog = FakeCatalog {
        changes: ["p3", "p2", "p1"]
            .iter()
            .map(|name| ChangeEntry {
                name: name.to_string(),
                version: Some("1.0".into()),
                timestamp: now,
                action: "add source file".into(),
            })
            .collect(),
        ..FakeCatalog::default()
    };
    let mirror = fx.mirror(catalog);
    mirror
        .run(&RunRequest::incremental(WindowSpec::Fixed(Duration::from_secs(3600))))
        .await
        .unwrap();

    for name in ["p1", "p2", "p3"] {
        assert_eq!(fx.client.count_url(Method::Get, &format!("{SIMPLE}{name}/")), 1);
    }
    assert!(no_run_checkpoints(&fx.state_dir));
}

#[tokio::test]
async fn restart_discards_checkpoints() {
    let fx = Fixture::new();
    fs::create_dir_all(&fx.state_dir).unwrap();
    let state = fx.state();
    let snapshot = CatalogSnapshot::new(SnapshotKind::Full, ["p1", "p2"]);
    state.save_snapshot(SnapshotSlot::Full, &snapshot).unwrap();
    state.save_cursor(&ResumeCursor::new(&snapshot, 1)).unwrap();

    let mirror = fx.mirror(FakeCatalog::with_names(&["p1", "p2", "p3"]));
    let stats = mirror
        .run(&RunRequest::full().restart(true))
        .await
        .unwrap();

    assert_eq!(stats.not_found, 3);
    assert_eq!(fx.client.count_url(Method::Get, &format!("{SIMPLE}p1/")), 1);
}

#[tokio::test]
async fn html_is_never_stored() {
    let fx = Fixture::new();
    let url = "https://files.test/delta-1.0.tar.gz";
    fx.index_page("delta", &[format!("{url}#md5={}", md5_hex(b"whatever"))]);
    fx.client.set_route(
        url,
        MockRoute::ok("<html>please log in</html>").content_type("text/html; charset=utf-8"),
    );

    let mirror = fx.mirror(FakeCatalog::with_names(&["delta"]));
    let stats = mirror.run(&RunRequest::full()).await.unwrap();

    assert_eq!((stats.stored, stats.invalid_url), (0, 1));
    let dir = fx.root.join("delta");
    assert!(!dir.exists() || fs::read_dir(&dir).unwrap().count() == 0);
}

#[tokio::test]
async fn digest_mismatch_leaves_no_file() {
    let fx = Fixture::new();
    let url = "https://files.test/eps-1.0.zip";
    fx.index_page("eps", &[format!("{url}#md5={}", md5_hex(b"expected"))]);
    fx.client.set_route(url, MockRoute::ok("tampered"));

    let mirror = fx.mirror(FakeCatalog::with_names(&["eps"]));
    let stats = mirror.run(&RunRequest::full()).await.unwrap();

    assert_eq!(stats.invalid_url, 1);
    assert_eq!(fs::read_dir(fx.root.join("eps")).unwrap().count(), 0);
}

#[tokio::test]
async fn bad_names_and_missing_pages_are_counted() {
    let fx = Fixture::new();
    let mirror = fx.mirror(FakeCatalog::with_names(&["bäd", "ghost"]));
    let stats = mirror.run(&RunRequest::full()).await.unwrap();

    assert_eq!(stats.invalid_package, 1);
    assert_eq!(stats.not_found, 1);
}

#[tokio::test]
async fn unreachable_catalog_is_fatal() {
    let fx = Fixture::new();
    let catalog = FakeCatalog {
        unavailable: true,
        ..FakeCatalog::default()
    };
    let err = fx.mirror(catalog).run(&RunRequest::full()).await.unwrap_err();
    assert!(matches!(err, SyncError::CatalogUnavailable(_)));
}

#[tokio::test]
async fn held_lock_is_fatal() {
    let fx = Fixture::new();
    fs::create_dir_all(&fx.root).unwrap();
    let _held = RunLock::try_acquire(fx.root.join(".pkgmirror.lock")).unwrap();

    let catalog = FakeCatalog::with_names(&["alpha"]);
    let err = fx.mirror(catalog).run(&RunRequest::full()).await.unwrap_err();

    assert!(matches!(err, SyncError::Lock(_)));
}

#[tokio::test]
async fn auto_window_extends_past_last_success() {
    let fx = Fixture::new();
    fs::create_dir_all(&fx.state_dir).unwrap();
    let last = Utc::now() - chrono::Duration::hours(10);
    fx.state().save_last_success(last).unwrap();

    let catalog = FakeCatalog::with_names(&["alpha"]);
    let mirror = fx.mirror(catalog);
    mirror
        .run(&RunRequest::incremental(WindowSpec::Auto))
        .await
        .unwrap();

    let expected = (last - chrono::Duration::hours(3)).timestamp();
    let seen = mirror.catalog().since_calls.lock().unwrap().clone();
    assert_eq!(seen.len(), 1);
    assert!((seen[0] - expected).abs() <= 5, "since {} vs {expected}", seen[0]);
}

#[tokio::test]
async fn forever_loop_switches_to_incremental() {
    let fx = Fixture::new();
    let mirror = fx.mirror(FakeCatalog::with_names(&["alpha"]));

    mirror.run_forever(&RunRequest::full(), Some(2)).await;

    let catalog = mirror.catalog();
    assert_eq!(catalog.since_calls.lock().unwrap().len(), 1);
    assert_eq!(catalog.list_calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn undigested_links_are_checked_by_size() {
    let fx = Fixture::new();
    let same = "https://files.test/eps-1.0.tar.gz";
    let grown = "https://files.test/eps-2.0.tar.gz";
    let fresh = "https://files.test/eps-3.0.tar.gz";
    fx.local_file("eps", "eps-1.0.tar.gz", b"same size");
    fx.local_file("eps", "eps-2.0.tar.gz", b"old");
    fx.index_page("eps", &[same.to_string(), grown.to_string(), fresh.to_string()]);
    fx.client.set_route(same, MockRoute::ok("same size"));
    fx.client.set_route(grown, MockRoute::ok("newer body"));
    fx.client.set_route(fresh, MockRoute::ok("brand new"));

    let mirror = fx.mirror_with(FakeCatalog::with_names(&["eps"]), |config| {
        config.include_undigested = true;
    });
    let stats = mirror.run(&RunRequest::full()).await.unwrap();

    assert_eq!((stats.found, stats.stored, stats.invalid_url), (1, 2, 0));
    assert_eq!(fx.client.count_url(Method::Head, same), 1);
    assert_eq!(fx.client.count_url(Method::Get, same), 0);
    assert_eq!(fx.client.count_url(Method::Head, grown), 1);
    assert_eq!(fx.client.count_url(Method::Get, grown), 1);
    assert_eq!(fx.client.count_url(Method::Head, fresh), 0);
    assert_eq!(fs::read(fx.root.join("eps/eps-2.0.tar.gz")).unwrap(), b"newer body");
    assert_eq!(
        fs::read_to_string(fx.root.join("eps/.eps-3.0.tar.gz.md5")).unwrap(),
        md5_hex(b"brand new")
    );
}

#[tokio::test]
async fn query_links_are_stored_under_their_resolved_name() {
    let fx = Fixture::new();
    let redirected = "https://dl.test/get?id=7";
    let target = "https://dl.test/files/zeta-3.1.tar.gz";
    let disposed = "https://dl.test/fetch?pkg=zeta";
    let tarball = b"zeta tarball".to_vec();
    let wheel = b"zeta zip".to_vec();
    fx.index_page(
        "zeta",
        &[
            format!("{redirected}#md5={}", md5_hex(&tarball)),
            format!("{disposed}#md5={}", md5_hex(&wheel)),
        ],
    );
    fx.client
        .set_route(redirected, MockRoute::redirect("/files/zeta-3.1.tar.gz"));
    fx.client.set_route(target, MockRoute::ok(tarball.clone()));
    fx.client.set_route(
        disposed,
        MockRoute::ok(wheel.clone())
            .content_disposition("attachment; filename*=UTF-8''zeta-3.2.zip"),
    );

    let mirror = fx.mirror(FakeCatalog::with_names(&["zeta"]));
    let stats = mirror.run(&RunRequest::full()).await.unwrap();

    assert_eq!((stats.stored, stats.invalid_url), (2, 0));
    assert_eq!(fx.client.count_url(Method::Head, redirected), 1);
    assert_eq!(fx.client.count_url(Method::Get, redirected), 0);
    assert_eq!(fx.client.count_url(Method::Get, target), 1);
    assert_eq!(fs::read(fx.root.join("zeta/zeta-3.1.tar.gz")).unwrap(), tarball);
    assert_eq!(fs::read(fx.root.join("zeta/zeta-3.2.zip")).unwrap(), wheel);
    let names: Vec<_> = fs::read_dir(fx.root.join("zeta"))
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .filter(|n| !n.starts_with('.'))
        .collect();
    assert_eq!(names.len(), 2, "unexpected files {names:?}");
}

#[tokio::test]
async fn external_download_links_follow_config() {
    let html = r#"<html><body>
        <a href="https://files.test/omega-1.0.tar.gz#md5=5eb63bbbe01eeed093cb22bb8f5acdc3">omega-1.0.tar.gz</a><br/>
        <a href="https://ext.test/dl/omega-1.0.zip" rel="download">1.0 download_url</a><br/>
        <a href="https://ext.test/" rel="homepage">1.0 home_page</a><br/>
        </body></html>"#;
    let external = "https://ext.test/dl/omega-1.0.zip";

    for enabled in [false, true] {
        let fx = Fixture::new();
        fx.client.set_route(
            &format!("{SIMPLE}omega/"),
            MockRoute::ok(html).content_type("text/html"),
        );
        fx.client.set_route(external, MockRoute::ok("omega zip"));

        let mirror = fx.mirror_with(FakeCatalog::with_names(&["omega"]), |config| {
            config.external_links = enabled;
            config.filename_patterns = vec!["*.zip".into()];
        });
        let stats = mirror.run(&RunRequest::full()).await.unwrap();

        let stored = fx.root.join("omega/omega-1.0.zip");
        assert_eq!(stored.exists(), enabled);
        assert_eq!(stats.stored, usize::from(enabled));
        assert_eq!(fx.client.count_url(Method::Get, external), usize::from(enabled));
        assert_eq!(fx.client.count_url(Method::Get, "https://ext.test/"), 0);
    }
}

#[test]
fn retouch_walks_the_mirror_under_the_run_lock() {
    let fx = Fixture::new();
    let stamp = zip::DateTime::from_date_and_time(2016, 8, 9, 10, 0, 0).unwrap();
    let mut writer = zip::ZipWriter::new(std::io::Cursor::new(Vec::new()));
    writer
        .start_file(
            "kappa/a.py",
            zip::write::SimpleFileOptions::default().last_modified_time(stamp),
        )
        .unwrap();
    writer.write_all(b"print()").unwrap();
    let archive = writer.finish().unwrap().into_inner();
    let path = fx.local_file("kappa", "kappa-1.0.zip", &archive);
    fx.local_file("kappa", "kappa-1.0.txt", b"notes");

    let summary = retouch(&fx.config()).unwrap();

    assert_eq!(
        summary,
        RetouchSummary {
            touched: 1,
            passthrough: 1,
            ..RetouchSummary::default()
        }
    );
    let newest = NaiveDate::from_ymd_opt(2016, 8, 9)
        .unwrap()
        .and_hms_opt(10, 0, 0)
        .unwrap()
        .and_utc()
        .timestamp();
    assert_eq!(mtime_of(&path), newest);

    let _held = RunLock::try_acquire(fx.root.join(".pkgmirror.lock")).unwrap();
    assert!(matches!(retouch(&fx.config()), Err(SyncError::Lock(_))));
}

#[test]
fn retouch_needs_an_existing_root() {
    let fx = Fixture::new();
    assert!(matches!(retouch(&fx.config()), Err(SyncError::Config(_))));
}
