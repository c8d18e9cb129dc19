use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use pkgmirror_catalog::PypiCatalog;
use pkgmirror_fetch::ReqwestClient;
use pkgmirror_sync::Mirror;
use tokio::task;
use tracing::{error, info, warn};

use crate::cli::Cli;
use crate::config::Config;

mod cli;
mod config;
mod logging;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match Config::load(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            let _ = logging::init(cli.verbose, None);
            error!("{e:#}");
            return ExitCode::FAILURE;
        }
    };
    if let Err(e) = logging::init(cli.verbose, config.log_file.as_deref()) {
        eprintln!("pkgmirror: {e:#}");
        return ExitCode::FAILURE;
    }

    match run(&cli, config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: &Cli, config: Config) -> Result<()> {
    if cli.retouch {
        return retouch(config).await;
    }

    let client = ReqwestClient::new(&config.http()).context("cannot build HTTP client")?;
    let catalog = PypiCatalog::new(client.clone(), &config.simple_url, &config.xmlrpc_url);
    let mirror =
        Mirror::new(config.mirror(), client, catalog).context("invalid mirror configuration")?;

    let request = cli.run_request(config.window.map(|w| w.0));
    info!(
        root = %config.mirror_root.display(),
        mode = ?request.mode,
        window = ?request.window,
        "pkgmirror starting"
    );

    if cli.forever {
        mirror.run_forever(&request, None).await;
        return Ok(());
    }
    mirror
        .run(&request)
        .await
        .with_context(|| format!("mirror pass into '{}' failed", config.mirror_root.display()))?;
    Ok(())
}

async fn retouch(config: Config) -> Result<()> {
    let mirror = config.mirror();
    let summary = task::spawn_blocking(move || pkgmirror_sync::retouch(&mirror))
        .await
        .context("retouch task panicked")?
        .with_context(|| format!("cannot retouch '{}'", config.mirror_root.display()))?;
    if summary.failed + summary.empty > 0 {
        warn!(
            failed = summary.failed,
            empty = summary.empty,
            "some files could not be retouched, see the error log"
        );
    }
    Ok(())
}
