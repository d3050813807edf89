//! Config file location and registry keys
//!
//! | Input | Cache key | File |
//! |---|---|---|
//! | explicit `path` | `Explicit(abs path)` | `abs path` |
//! | no path | `Auto(cwd)` | `<project root>/src/config/config.yaml`, else `<cwd>/config/config.yaml` |
//! | `test_mode` | same key, flagged | `<temp>/tests/<YYYYMMDD>/<HHMMSS>_<id>/<file name>` |
//!
//! The project root is the nearest ancestor of the working directory that
//! contains a `src/` directory.

use std::fmt::{self, Display, Formatter};
use std::path::{Component, Path, PathBuf};

use chrono::NaiveDateTime;

use crate::error::ConfigError;
use crate::options::ManagerOptions;
use crate::testenv;

/// File name used when no explicit path is given
pub const DEFAULT_FILE_NAME: &str = "config.yaml";

/// Identity of a manager in a [`crate::Registry`]
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CacheKey {
    /// Caller named the file
    Explicit {
        /// Absolute, normalised path
        path: PathBuf,
        /// Test mode flag
        test_mode: bool,
    },
    /// File resolved from the working directory
    Auto {
        /// Absolute, normalised working directory
        cwd: PathBuf,
        /// Test mode flag
        test_mode: bool,
    },
}

impl CacheKey {
    /// Key for `options` relative to the process working directory
    ///
    /// # Errors
    /// [`ConfigError::WorkingDirectory`] if the working directory is gone.
    pub fn for_options(options: &ManagerOptions) -> Result<Self, ConfigError> {
        let cwd = std::env::current_dir().map_err(ConfigError::WorkingDirectory)?;
        Ok(Self::derive(options, &cwd))
    }

    /// Key for `options` relative to `cwd`
    #[must_use]
    pub fn derive(options: &ManagerOptions, cwd: &Path) -> Self {
        match &options.path {
            Some(path) => Self::Explicit {
                path: absolutize(path, cwd),
                test_mode: options.test_mode,
            },
            None => Self::Auto {
                cwd: absolutize(cwd, cwd),
                test_mode: options.test_mode,
            },
        }
    }

    /// True if the key was derived in test mode
    #[must_use]
    pub fn is_test_mode(&self) -> bool {
        match self {
            Self::Explicit { test_mode, .. } | Self::Auto { test_mode, .. } => *test_mode,
        }
    }

    /// File this key refers to, before any test-mode redirection
    #[must_use]
    pub fn target(&self) -> PathBuf {
        match self {
            Self::Explicit { path, .. } => path.clone(),
            Self::Auto { cwd, .. } => default_location(cwd),
        }
    }

    /// Concrete file location for a manager created at `now`
    #[must_use]
    pub fn resolve_file(&self, now: NaiveDateTime) -> PathBuf {
        let target = self.target();
        if !self.is_test_mode() {
            return target;
        }
        let name = target
            .file_name()
            .map_or_else(|| DEFAULT_FILE_NAME.into(), ToOwned::to_owned);
        testenv::new_environment_dir(now).join(name)
    }
}

impl Display for CacheKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Explicit { path, .. } => write!(f, "{}", path.display())?,
            Self::Auto { cwd, .. } => write!(f, "auto:{}", cwd.display())?,
        }
        if self.is_test_mode() {
            f.write_str(" [test]")?;
        }
        Ok(())
    }
}

/// Where the config lives when no path is given
#[must_use]
pub fn default_location(cwd: &Path) -> PathBuf {
    match find_project_root(cwd) {
        Some(root) => root.join("src").join("config").join(DEFAULT_FILE_NAME),
        None => cwd.join("config").join(DEFAULT_FILE_NAME),
    }
}

/// Nearest ancestor of `start` (inclusive) holding a `src/` directory
#[must_use]
pub fn find_project_root(start: &Path) -> Option<PathBuf> {
    start
        .ancestors()
        .filter(|dir| dir.file_name().map_or(true, |name| name != "src"))
        .find(|dir| dir.join("src").is_dir())
        .map(Path::to_path_buf)
}

/// Join `path` onto `cwd` if relative, then drop `.` and fold `..`
#[must_use]
pub fn absolutize(path: &Path, cwd: &Path) -> PathBuf {
    let joined = if path.is_absolute() {
        path.to_path_buf()
    } else {
        cwd.join(path)
    };
    let mut out = PathBuf::new();
    for component in joined.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push(component);
                }
            }
            other => out.push(other),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use confmgr_test_utils::TempConfigDir;

    #[test]
    fn absolutize_folds_dots() {
        let cwd = Path::new("/work/app");
        assert_eq!(
            absolutize(Path::new("./conf/../settings.yaml"), cwd),
            PathBuf::from("/work/app/settings.yaml")
        );
        assert_eq!(
            absolutize(Path::new("/etc/./x.yaml"), cwd),
            PathBuf::from("/etc/x.yaml")
        );
    }

    #[test]
    fn equivalent_spellings_share_a_key() {
        let cwd = Path::new("/work/app");
        let a = CacheKey::derive(&ManagerOptions::for_path("config.yaml"), cwd);
        let b = CacheKey::derive(&ManagerOptions::for_path("./sub/../config.yaml"), cwd);
        let c = CacheKey::derive(&ManagerOptions::for_path("/work/app/config.yaml"), cwd);
        assert_eq!(a, b);
        assert_eq!(a, c);
    }

    #[test]
    fn test_mode_is_part_of_the_key() {
        let cwd = Path::new("/work/app");
        let prod = CacheKey::derive(&ManagerOptions::new(), cwd);
        let test = CacheKey::derive(&ManagerOptions::new().test_mode(true), cwd);
        assert_ne!(prod, test);
        assert!(test.is_test_mode());
        assert!(test.to_string().ends_with("[test]"));
    }

    #[test]
    fn default_location_prefers_project_root() {
        let dir = TempConfigDir::new();
        std::fs::create_dir_all(dir.path("proj/src/pkg")).unwrap();
        let nested = dir.path("proj/src/pkg");
        assert_eq!(
            default_location(&nested),
            dir.path("proj/src/config/config.yaml")
        );

        let plain = dir.path("elsewhere");
        std::fs::create_dir_all(&plain).unwrap();
        let found = default_location(&plain);
        assert!(found.ends_with("config/config.yaml"));
    }

    #[test]
    fn test_mode_redirects_into_isolated_dir() {
        let now = chrono::Local::now().naive_local();
        let key = CacheKey::derive(
            &ManagerOptions::for_path("/srv/app/settings.yaml").test_mode(true),
            Path::new("/"),
        );
        let first = key.resolve_file(now);
        let second = key.resolve_file(now);
        assert!(first.starts_with(testenv::root()));
        assert!(first.ends_with("settings.yaml"));
        assert_ne!(first, second);
    }
}
