//! Isolated test environments
//!
//! Test-mode managers keep their files under
//! `<temp>/tests/<YYYYMMDD>/<HHMMSS>_<id>/`. Those directories are never
//! removed automatically; [`cleanup_older_than`] prunes whole days.

use std::fs;
use std::io;
use std::path::PathBuf;

use chrono::{NaiveDate, NaiveDateTime};

/// Directory holding every test environment
#[must_use]
pub fn root() -> PathBuf {
    std::env::temp_dir().join("tests")
}

/// Fresh, uniquely named environment directory for `now` (not created)
#[must_use]
pub fn new_environment_dir(now: NaiveDateTime) -> PathBuf {
    let id = uuid::Uuid::new_v4().simple().to_string();
    root()
        .join(now.format("%Y%m%d").to_string())
        .join(format!("{}_{}", now.format("%H%M%S"), &id[..8]))
}

/// Every existing environment directory, sorted
///
/// # Errors
/// IO errors other than the root not existing.
pub fn list() -> io::Result<Vec<PathBuf>> {
    let mut found = Vec::new();
    for (_, day_dir) in day_dirs()? {
        for entry in fs::read_dir(&day_dir)? {
            let entry = entry?;
            if entry.file_type()?.is_dir() {
                found.push(entry.path());
            }
        }
    }
    found.sort();
    Ok(found)
}

/// Remove day directories dated more than `days` before `today`
///
/// Returns how many day directories were removed.
///
/// # Errors
/// The first IO error encountered.
pub fn cleanup_older_than(days: i64, today: NaiveDate) -> io::Result<usize> {
    let cutoff = today - chrono::Duration::days(days);
    let mut removed = 0;
    for (date, dir) in day_dirs()? {
        if date < cutoff {
            fs::remove_dir_all(&dir)?;
            tracing::info!(dir = %dir.display(), "removed old test environments");
            removed += 1;
        }
    }
    Ok(removed)
}

fn day_dirs() -> io::Result<Vec<(NaiveDate, PathBuf)>> {
    let entries = match fs::read_dir(root()) {
        Ok(entries) => entries,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(err) => return Err(err),
    };
    let mut days = Vec::new();
    for entry in entries {
        let entry = entry?;
        let name = entry.file_name();
        let Some(date) = name
            .to_str()
            .and_then(|n| NaiveDate::parse_from_str(n, "%Y%m%d").ok())
        else {
            continue;
        };
        if entry.file_type()?.is_dir() {
            days.push((date, entry.path()));
        }
    }
    Ok(days)
}
