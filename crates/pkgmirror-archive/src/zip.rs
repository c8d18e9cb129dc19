use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};

use crate::{Error, Result};

/// Newest entry time in the central directory. The MS-DOS date fields carry
/// no zone; they are read as UTC.
pub(crate) fn latest_timestamp(path: &Path) -> Result<Option<i64>> {
    let file = File::open(path).map_err(|source| Error::Open {
        path: path.to_path_buf(),
        source,
    })?;
    let corrupted = |e: ::zip::result::ZipError| Error::Corrupted {
        path: path.to_path_buf(),
        reason: e.to_string(),
    };

    let mut archive = ::zip::ZipArchive::new(BufReader::new(file)).map_err(corrupted)?;

    let mut latest: Option<i64> = None;
    for i in 0..archive.len() {
        let entry = archive.by_index_raw(i).map_err(corrupted)?;
        let Some(stamp) = entry.last_modified().and_then(to_unix_seconds) else {
            continue;
        };
        latest = Some(latest.map_or(stamp, |cur| cur.max(stamp)));
    }
    Ok(latest)
}

fn to_unix_seconds(value: ::zip::DateTime) -> Option<i64> {
    let date = NaiveDate::from_ymd_opt(
        value.year().into(),
        value.month().into(),
        value.day().into(),
    )?;
    let time = NaiveTime::from_hms_opt(
        value.hour().into(),
        value.minute().into(),
        value.second().into(),
    )?;
    Some(NaiveDateTime::new(date, time).and_utc().timestamp())
}
