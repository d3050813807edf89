//! Read-only, transportable copies of a configuration tree
//!
//! A [`Snapshot`] owns its data outright: no reference back to the manager,
//! no locks, no threads. It can be serialised with serde (or
//! [`Snapshot::to_bytes`]) and rebuilt in another process, where every read
//! form answers exactly as the live tree did when the snapshot was taken.
//!
//! Mutation always fails with [`SnapshotError::Immutable`].

use std::ops::Index;
use std::path::{Path, PathBuf};

use confmgr_node::{is_identifier, ConfigNode, ConfigPath, FromValue, PathError, TypeHint, TypeHints, Value};
use serde::{Deserialize, Serialize};

use crate::error::SnapshotError;

static NULL: Value = Value::Null;

/// Frozen copy of a tree with its type hints
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    data: ConfigNode,
    #[serde(default)]
    type_hints: TypeHints,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    config_path: Option<PathBuf>,
}

impl Snapshot {
    /// Build a snapshot from owned parts
    #[must_use]
    pub fn new(data: ConfigNode, type_hints: TypeHints, config_path: Option<PathBuf>) -> Self {
        Self {
            data,
            type_hints,
            config_path,
        }
    }

    /// The data tree
    #[inline]
    #[must_use]
    pub fn data(&self) -> &ConfigNode {
        &self.data
    }

    /// The type hints
    #[inline]
    #[must_use]
    pub fn type_hints(&self) -> &TypeHints {
        &self.type_hints
    }

    /// File the snapshot was taken from, if any
    #[inline]
    #[must_use]
    pub fn config_path(&self) -> Option<&Path> {
        self.config_path.as_deref()
    }

    /// Value at a dotted path
    #[must_use]
    pub fn get(&self, path: &str) -> Option<&Value> {
        let path = path.parse::<ConfigPath>().ok()?;
        self.data.get_path(&path)
    }

    /// Value at `path`, or `default`
    #[must_use]
    pub fn get_or(&self, path: &str, default: impl Into<Value>) -> Value {
        self.get(path).cloned().unwrap_or_else(|| default.into())
    }

    /// Value at `path` read as `T`
    #[must_use]
    pub fn get_as<T: FromValue>(&self, path: &str) -> Option<T> {
        self.get(path).and_then(|value| T::from_value(value).ok())
    }

    /// Value at `path` read as a filesystem path
    #[must_use]
    pub fn get_path(&self, path: &str) -> Option<PathBuf> {
        self.get_as(path)
    }

    /// True if a value exists at `path`
    #[must_use]
    pub fn contains(&self, path: &str) -> bool {
        self.get(path).is_some()
    }

    /// Top-level keys in order
    #[must_use]
    pub fn keys(&self) -> Vec<&str> {
        self.data.keys().collect()
    }

    /// Type hint declared for `path`
    #[must_use]
    pub fn type_hint(&self, path: &str) -> Option<&TypeHint> {
        let path = path.parse::<ConfigPath>().ok()?;
        self.type_hints.get(&path)
    }

    /// Attribute-style view of a top-level key
    ///
    /// # Errors
    /// [`PathError::NotAnIdentifier`] for names that are not identifiers.
    pub fn attr(&self, name: &str) -> Result<SnapshotView<'_>, SnapshotError> {
        SnapshotView {
            snapshot: self,
            path: ConfigPath::root(),
        }
        .attr(name)
    }

    /// Always fails: snapshots are read-only
    ///
    /// # Errors
    /// Always [`SnapshotError::Immutable`].
    pub fn set(&self, path: &str, _value: impl Into<Value>) -> Result<(), SnapshotError> {
        Err(SnapshotError::Immutable {
            path: path.to_string(),
        })
    }

    /// Encode for transport to another process
    ///
    /// # Errors
    /// [`SnapshotError::Codec`].
    pub fn to_bytes(&self) -> Result<Vec<u8>, SnapshotError> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Decode a snapshot produced by [`to_bytes`](Self::to_bytes)
    ///
    /// # Errors
    /// [`SnapshotError::Codec`].
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, SnapshotError> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

impl Index<&str> for Snapshot {
    type Output = Value;

    /// Missing paths index to [`Value::Null`]
    fn index(&self, path: &str) -> &Value {
        self.get(path).unwrap_or(&NULL)
    }
}

/// Path-bound, read-only view into a [`Snapshot`]
#[derive(Debug, Clone)]
pub struct SnapshotView<'a> {
    snapshot: &'a Snapshot,
    path: ConfigPath,
}

impl<'a> SnapshotView<'a> {
    /// Path this view addresses
    #[must_use]
    pub fn path(&self) -> &ConfigPath {
        &self.path
    }

    /// View of child `name`
    ///
    /// # Errors
    /// [`PathError::NotAnIdentifier`] for names that are not identifiers.
    pub fn attr(&self, name: &str) -> Result<Self, SnapshotError> {
        if !is_identifier(name) {
            return Err(PathError::NotAnIdentifier(name.to_string()).into());
        }
        Ok(Self {
            snapshot: self.snapshot,
            path: self.path.child(name)?,
        })
    }

    /// Value at this path
    #[must_use]
    pub fn get(&self) -> Option<&'a Value> {
        self.snapshot.data.get_path(&self.path)
    }

    /// Value at this path read as `T`
    #[must_use]
    pub fn get_as<T: FromValue>(&self) -> Option<T> {
        self.get().and_then(|value| T::from_value(value).ok())
    }

    /// Always fails: snapshots are read-only
    ///
    /// # Errors
    /// Always [`SnapshotError::Immutable`].
    pub fn set(&self, _value: impl Into<Value>) -> Result<(), SnapshotError> {
        Err(SnapshotError::Immutable {
            path: self.path.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use pretty_assertions::assert_eq;

    fn sample() -> Snapshot {
        let mut data = ConfigNode::new();
        let when = NaiveDate::from_ymd_opt(2024, 5, 1)
            .and_then(|d| d.and_hms_opt(9, 30, 0))
            .unwrap();
        data.set_path(&"server.port".parse().unwrap(), 8080_i64);
        data.set_path(&"server.root".parse().unwrap(), PathBuf::from("/srv/www"));
        data.insert("started", when);
        let mut hints = TypeHints::new();
        hints.insert(&"server.root".parse().unwrap(), TypeHint::Path);
        hints.insert(&"started".parse().unwrap(), TypeHint::DateTime);
        Snapshot::new(data, hints, Some(PathBuf::from("/etc/app/config.yaml")))
    }

    #[test]
    fn read_forms_agree() {
        let snap = sample();
        assert_eq!(snap.get_as::<i64>("server.port"), Some(8080));
        assert_eq!(snap["server.port"], Value::Int(8080));
        assert_eq!(snap["server.missing"], Value::Null);
        assert_eq!(
            snap.attr("server").unwrap().attr("port").unwrap().get_as::<i64>(),
            Some(8080)
        );
        assert_eq!(snap.get_path("server.root"), Some(PathBuf::from("/srv/www")));
        assert_eq!(snap.get_or("server.host", "localhost"), Value::from("localhost"));
        assert_eq!(snap.keys(), vec!["server", "started"]);
        assert!(snap.contains("started"));
    }

    #[test]
    fn mutation_is_refused() {
        let snap = sample();
        let err = snap.set("server.port", 1_i64).unwrap_err();
        assert!(matches!(err, SnapshotError::Immutable { ref path } if path == "server.port"));
        let view = snap.attr("server").unwrap();
        assert!(matches!(view.set(1_i64), Err(SnapshotError::Immutable { .. })));
        assert_eq!(snap.get_as::<i64>("server.port"), Some(8080));
    }

    #[test]
    fn survives_byte_transport() {
        let snap = sample();
        let bytes = snap.to_bytes().unwrap();
        let copy = Snapshot::from_bytes(&bytes).unwrap();
        assert_eq!(copy, snap);
        assert_eq!(copy.type_hint("server.root"), Some(&TypeHint::Path));
        assert_eq!(copy.config_path(), Some(Path::new("/etc/app/config.yaml")));
    }

    #[test]
    fn garbage_bytes_are_a_codec_error() {
        assert!(matches!(
            Snapshot::from_bytes(b"not json"),
            Err(SnapshotError::Codec(_))
        ));
    }
}
