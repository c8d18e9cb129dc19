use std::path::PathBuf;
use std::time::Duration;

use clap::{ArgGroup, Parser};
use pkgmirror_sync::{RunRequest, SyncMode, WindowSpec};

use crate::config::parse_duration;

#[derive(Clone, Debug, Parser)]
#[command(name = "pkgmirror", version = env!("CARGO_PKG_VERSION"), about, long_about = None)]
#[command(group(ArgGroup::new("mode").required(true).args(["initial_fetch", "update_fetch", "retouch"])))]
pub struct Cli {
    /// TOML configuration file; a missing file means defaults
    pub config: PathBuf,

    /// Mirror the whole (filtered) catalog
    #[arg(long)]
    pub initial_fetch: bool,

    /// Mirror only packages changed within the window
    #[arg(long)]
    pub update_fetch: bool,

    /// Re-apply archive timestamps to every file already mirrored
    #[arg(long, conflicts_with_all = ["window", "auto_window", "restart", "forever"])]
    pub retouch: bool,

    /// Incremental window, e.g. 36h or 7d
    #[arg(long, value_name = "DURATION", value_parser = parse_duration, conflicts_with = "auto_window")]
    pub window: Option<Duration>,

    /// Derive the window from the last successful run
    #[arg(long)]
    pub auto_window: bool,

    /// Discard run checkpoints and start over
    #[arg(long)]
    pub restart: bool,

    /// Keep polling for changes after the first pass
    #[arg(long)]
    pub forever: bool,

    #[arg(short, long)]
    pub verbose: bool,
}

impl Cli {
    pub fn run_request(&self, config_window: Option<Duration>) -> RunRequest {
        let mode = if self.initial_fetch {
            SyncMode::Full
        } else {
            SyncMode::Incremental
        };
        let window = match (self.window, self.auto_window) {
            (Some(window), _) => WindowSpec::Fixed(window),
            (None, true) => WindowSpec::Auto,
            (None, false) => config_window.map_or(WindowSpec::Auto, WindowSpec::Fixed),
        };
        RunRequest {
            mode,
            window,
            restart: self.restart,
        }
    }
}
