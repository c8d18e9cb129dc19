use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use crate::format::TarCompress;
use crate::{Error, Result};

/// Newest `mtime` across all tar headers. Payloads are skipped by the tar
/// iterator, never copied out.
pub(crate) fn latest_timestamp(path: &Path, codec: TarCompress) -> Result<Option<i64>> {
    let file = File::open(path).map_err(|source| Error::Open {
        path: path.to_path_buf(),
        source,
    })?;
    let reader = codec.decoder(BufReader::new(file))?;
    let mut archive = ::tar::Archive::new(reader);

    let corrupted = |e: std::io::Error| Error::Corrupted {
        path: path.to_path_buf(),
        reason: e.to_string(),
    };

    let mut latest: Option<i64> = None;
    for entry in archive.entries().map_err(corrupted)? {
        let entry = entry.map_err(corrupted)?;
        let mtime = entry.header().mtime().map_err(corrupted)?;
        let mtime = i64::try_from(mtime).unwrap_or(i64::MAX);
        latest = Some(latest.map_or(mtime, |cur| cur.max(mtime)));
    }
    Ok(latest)
}
