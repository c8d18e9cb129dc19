use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};
use pkgmirror_fetch::{DEFAULT_MAX_HOPS, HttpConfig, RedirectPolicy};
use pkgmirror_sync::{DEFAULT_WINDOW, MirrorConfig};
use serde::Deserialize;

pub const DEFAULT_FILENAME_PATTERNS: &[&str] = &[
    "*.zip", "*.tgz", "*.egg", "*.tar.gz", "*.tar.bz2", "*.whl", "*.py", "*.md", "*.md5",
    "*.xml", "*.sha1",
];

/// A `<n>s|m|h|d` duration as written in config files and on the command line.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(try_from = "String")]
pub struct HumanDuration(pub Duration);

impl FromStr for HumanDuration {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        parse_duration(s).map(Self)
    }
}

impl TryFrom<String> for HumanDuration {
    type Error = String;

    fn try_from(s: String) -> std::result::Result<Self, Self::Error> {
        s.parse()
    }
}

pub fn parse_duration(s: &str) -> std::result::Result<Duration, String> {
    let s = s.trim();
    let split = s
        .find(|c: char| !c.is_ascii_digit())
        .ok_or_else(|| format!("'{s}' lacks a unit (s, m, h or d)"))?;
    let (digits, unit) = s.split_at(split);
    let n: u64 = digits
        .parse()
        .map_err(|_| format!("'{s}' does not start with a number"))?;
    let scale = match unit {
        "s" => 1,
        "m" => 60,
        "h" => 3600,
        "d" => 86_400,
        other => return Err(format!("unknown duration unit '{other}' in '{s}'")),
    };
    n.checked_mul(scale)
        .map(Duration::from_secs)
        .ok_or_else(|| format!("'{s}' is out of range"))
}

/// Contents of the TOML configuration file. Every field has a default.
#[derive(Clone, Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub mirror_root: PathBuf,
    pub state_dir: PathBuf,
    pub simple_url: String,
    pub xmlrpc_url: String,
    pub lock_file_name: String,
    pub package_patterns: Vec<String>,
    pub filename_patterns: Vec<String>,
    pub include_undigested: bool,
    /// Follow `download_url` and `home_page` links to matching files.
    pub external_links: bool,
    /// Incremental window used when the command line names none.
    pub window: Option<HumanDuration>,
    pub poll_interval: HumanDuration,
    pub timeout: HumanDuration,
    pub max_hops: u32,
    pub user_agent: String,
    pub log_file: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            mirror_root: PathBuf::from("web"),
            state_dir: PathBuf::from("."),
            simple_url: "https://pypi.org/simple/".to_string(),
            xmlrpc_url: "https://pypi.org/pypi".to_string(),
            lock_file_name: ".pkgmirror.lock".to_string(),
            package_patterns: Vec::new(),
            filename_patterns: DEFAULT_FILENAME_PATTERNS
                .iter()
                .map(|p| p.to_string())
                .collect(),
            include_undigested: false,
            external_links: false,
            window: None,
            poll_interval: HumanDuration(Duration::from_secs(3600)),
            timeout: HumanDuration(Duration::from_secs(30)),
            max_hops: DEFAULT_MAX_HOPS,
            user_agent: HttpConfig::default().user_agent,
            log_file: None,
        }
    }
}

impl Config {
    /// Load `path`; a missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(e) => {
                return Err(e).with_context(|| format!("cannot read config '{}'", path.display()));
            }
        };
        toml::from_str(&text).with_context(|| format!("invalid config '{}'", path.display()))
    }

    pub fn http(&self) -> HttpConfig {
        HttpConfig {
            timeout: self.timeout.0,
            user_agent: self.user_agent.clone(),
        }
    }

    pub fn mirror(&self) -> MirrorConfig {
        let mut config = MirrorConfig::new(&self.mirror_root, &self.simple_url);
        config.state_dir = self.state_dir.clone();
        config.lock_file_name = self.lock_file_name.clone();
        config.package_patterns = self.package_patterns.clone();
        config.filename_patterns = self.filename_patterns.clone();
        config.include_undigested = self.include_undigested;
        config.external_links = self.external_links;
        config.redirect = RedirectPolicy::default().with_max_hops(self.max_hops);
        config.default_window = DEFAULT_WINDOW;
        config.poll_interval = self.poll_interval.0;
        config
    }
}
