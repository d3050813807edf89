//! Testing utilities for the confmgr workspace
//!
//! Temporary config directories and polling helpers for tests that wait on
//! background threads.

#![allow(missing_docs)]

use std::fs;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant, SystemTime};

/// A temporary directory holding configuration files, removed on drop
#[derive(Debug)]
pub struct TempConfigDir {
    dir: tempfile::TempDir,
}

impl Default for TempConfigDir {
    fn default() -> Self {
        Self::new()
    }
}

impl TempConfigDir {
    pub fn new() -> Self {
        Self {
            dir: tempfile::tempdir().unwrap(),
        }
    }

    /// Root of the directory
    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    /// Absolute path of `name` inside the directory (not created)
    pub fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    /// Write `contents` to `name`, creating parent directories
    pub fn write(&self, name: &str, contents: &str) -> PathBuf {
        let path = self.path(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(&path, contents).unwrap();
        path
    }

    /// Read `name` as text
    pub fn read(&self, name: &str) -> String {
        fs::read_to_string(self.path(name)).unwrap()
    }

    /// Sorted names of the entries directly inside the directory
    pub fn file_names(&self) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(self.dir.path())
            .unwrap()
            .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    /// Every file below `backup/`, sorted
    pub fn backups(&self) -> Vec<PathBuf> {
        let mut found = Vec::new();
        collect_files(&self.path("backup"), &mut found);
        found.sort();
        found
    }
}

fn collect_files(dir: &Path, out: &mut Vec<PathBuf>) {
    let Ok(entries) = fs::read_dir(dir) else {
        return;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            collect_files(&path, out);
        } else {
            out.push(path);
        }
    }
}

/// Poll `condition` every few milliseconds until it holds or `timeout` passes
pub fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    loop {
        if condition() {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        thread::sleep(Duration::from_millis(5));
    }
}

/// Overwrite `path` from "another process": new content and a modification
/// time strictly later than the current one
pub fn external_write(path: &Path, contents: &str) {
    let before = fs::metadata(path).and_then(|m| m.modified()).ok();
    fs::write(path, contents).unwrap();
    if let Some(before) = before {
        let after = fs::metadata(path).unwrap().modified().unwrap();
        if after <= before {
            let bumped = before + Duration::from_millis(10);
            let file = fs::File::options().write(true).open(path).unwrap();
            file.set_modified(bumped.max(SystemTime::now())).unwrap();
        }
    }
}
