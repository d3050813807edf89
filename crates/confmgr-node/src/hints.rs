//! Type hints
//!
//! Files only store strings, numbers, booleans, lists and maps. A type hint
//! records, per dotted path, which richer type a leaf had when it was saved,
//! so that loading can turn `"2024-05-01T10:30:00"` back into a date-time.
//!
//! Hint names are stored verbatim (`datetime`, `Path`, `str`, ...). Names this
//! crate does not know are carried through untouched and never coerce.

use std::fmt::{self, Display, Formatter};
use std::path::PathBuf;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::CoercionError;
use crate::path::ConfigPath;
use crate::value::{parse_datetime, Value};

/// Declared type of a stored leaf
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum TypeHint {
    /// `datetime`
    DateTime,
    /// `Path`
    Path,
    /// `str`
    Str,
    /// `int`
    Int,
    /// `float`
    Float,
    /// `bool`
    Bool,
    /// `list`
    List,
    /// `dict`
    Dict,
    /// Any other name found in a file
    Other(String),
}

impl TypeHint {
    /// Name as written to the file
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::DateTime => "datetime",
            Self::Path => "Path",
            Self::Str => "str",
            Self::Int => "int",
            Self::Float => "float",
            Self::Bool => "bool",
            Self::List => "list",
            Self::Dict => "dict",
            Self::Other(name) => name,
        }
    }

    /// Hint that is recorded automatically when a value of this shape is set
    #[must_use]
    pub fn implied_by(value: &Value) -> Option<Self> {
        match value {
            Value::DateTime(_) => Some(Self::DateTime),
            Value::Path(_) => Some(Self::Path),
            _ => None,
        }
    }

    /// Reconstruct a typed value from what was read out of a file
    ///
    /// Values that already have the declared shape pass through, as does
    /// anything under an unknown hint.
    ///
    /// # Errors
    /// Returns [`CoercionError`] when the stored text does not parse as the
    /// declared type.
    #[allow(clippy::cast_precision_loss)]
    pub fn coerce(&self, path: &ConfigPath, value: Value) -> Result<Value, CoercionError> {
        let fail = |raw: &Value| CoercionError {
            path: path.to_string(),
            hint: self.clone(),
            raw: raw.to_string(),
        };
        match (self, value) {
            (_, Value::Null) => Ok(Value::Null),
            (Self::DateTime, Value::Str(s)) => parse_datetime(&s)
                .map(Value::DateTime)
                .ok_or_else(|| fail(&Value::Str(s))),
            (Self::Path, Value::Str(s)) => Ok(Value::Path(PathBuf::from(s))),
            (Self::Int, Value::Str(s)) => s
                .trim()
                .parse()
                .map(Value::Int)
                .map_err(|_| fail(&Value::Str(s))),
            (Self::Float, Value::Int(i)) => Ok(Value::Float(i as f64)),
            (Self::Float, Value::Str(s)) => s
                .trim()
                .parse()
                .map(Value::Float)
                .map_err(|_| fail(&Value::Str(s))),
            (Self::Str, v @ (Value::Bool(_) | Value::Int(_) | Value::Float(_))) => {
                Ok(Value::Str(v.to_string()))
            }
            (Self::DateTime, v @ Value::DateTime(_))
            | (Self::Path, v @ Value::Path(_))
            | (Self::Int, v @ Value::Int(_))
            | (Self::Float, v @ Value::Float(_))
            | (Self::Bool, v @ Value::Bool(_))
            | (Self::Str, v @ Value::Str(_))
            | (Self::List, v @ Value::List(_))
            | (Self::Dict, v @ Value::Node(_))
            | (Self::Other(_), v) => Ok(v),
            (_, v) => Err(fail(&v)),
        }
    }
}

impl Display for TypeHint {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl From<String> for TypeHint {
    fn from(name: String) -> Self {
        match name.as_str() {
            "datetime" => Self::DateTime,
            "Path" | "PosixPath" | "WindowsPath" => Self::Path,
            "str" => Self::Str,
            "int" => Self::Int,
            "float" => Self::Float,
            "bool" => Self::Bool,
            "list" => Self::List,
            "dict" => Self::Dict,
            _ => Self::Other(name),
        }
    }
}

impl From<&str> for TypeHint {
    fn from(name: &str) -> Self {
        Self::from(name.to_string())
    }
}

impl From<TypeHint> for String {
    fn from(hint: TypeHint) -> Self {
        hint.name().to_string()
    }
}

/// Map from dotted path to declared type, in insertion order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TypeHints {
    entries: IndexMap<String, TypeHint>,
}

impl TypeHints {
    /// Empty map
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of hints
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True if there are no hints
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Hint declared for exactly this path
    #[must_use]
    pub fn get(&self, path: &ConfigPath) -> Option<&TypeHint> {
        self.entries.get(&path.to_string())
    }

    /// Declare a hint, replacing any previous one for the path
    pub fn insert(&mut self, path: &ConfigPath, hint: TypeHint) -> Option<TypeHint> {
        self.entries.insert(path.to_string(), hint)
    }

    /// Remove the hint declared for exactly this path
    pub fn remove(&mut self, path: &ConfigPath) -> Option<TypeHint> {
        self.entries.shift_remove(&path.to_string())
    }

    /// Insert a raw `(dotted path, name)` pair as read from a file
    pub fn insert_raw(&mut self, path: impl Into<String>, name: impl Into<String>) {
        self.entries.insert(path.into(), TypeHint::from(name.into()));
    }

    /// Remove the hint at `path` and every hint below it
    pub fn remove_subtree(&mut self, path: &ConfigPath) -> usize {
        let before = self.entries.len();
        self.entries.retain(|key, _| {
            key.parse::<ConfigPath>()
                .map_or(true, |hinted| !path.is_prefix_of(&hinted))
        });
        before - self.entries.len()
    }

    /// Record the hints implied by `value` (and its children) stored at `path`
    pub fn record_implied(&mut self, path: &ConfigPath, value: &Value) {
        match value {
            Value::Node(node) => {
                for (key, child) in node.iter() {
                    if let Ok(child_path) = path.child(key) {
                        self.record_implied(&child_path, child);
                    }
                }
            }
            other => {
                if let Some(hint) = TypeHint::implied_by(other) {
                    self.insert(path, hint);
                }
            }
        }
    }

    /// `(dotted path, hint)` pairs in insertion order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &TypeHint)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Drop every hint
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::ConfigNode;

    fn path(s: &str) -> ConfigPath {
        s.parse().unwrap()
    }

    #[test]
    fn names_round_trip() {
        for name in ["datetime", "Path", "str", "int", "float", "bool", "list", "dict"] {
            assert_eq!(TypeHint::from(name).name(), name);
        }
        assert_eq!(TypeHint::from("Decimal"), TypeHint::Other("Decimal".into()));
        assert_eq!(TypeHint::from("PosixPath"), TypeHint::Path);
    }

    #[test]
    fn coerces_datetime_and_path() {
        let p = path("first_start_time");
        let value = TypeHint::DateTime
            .coerce(&p, Value::from("2024-05-01T10:30:00"))
            .unwrap();
        assert!(value.as_datetime().is_some());

        let value = TypeHint::Path.coerce(&p, Value::from("/srv/app")).unwrap();
        assert_eq!(value, Value::Path(PathBuf::from("/srv/app")));
    }

    #[test]
    fn bad_text_reports_coercion_error() {
        let err = TypeHint::DateTime
            .coerce(&path("when"), Value::from("not a date"))
            .unwrap_err();
        assert_eq!(err.path, "when");
        assert_eq!(err.raw, "not a date");

        assert!(TypeHint::Int.coerce(&path("n"), Value::Bool(true)).is_err());
    }

    #[test]
    fn matching_shapes_and_unknown_hints_pass_through() {
        let p = path("x");
        assert_eq!(TypeHint::Int.coerce(&p, Value::Int(4)).unwrap(), Value::Int(4));
        assert_eq!(
            TypeHint::Other("Decimal".into())
                .coerce(&p, Value::from("1.5"))
                .unwrap(),
            Value::from("1.5")
        );
        assert_eq!(TypeHint::DateTime.coerce(&p, Value::Null).unwrap(), Value::Null);
        assert_eq!(TypeHint::Float.coerce(&p, Value::Int(2)).unwrap(), Value::Float(2.0));
    }

    #[test]
    fn record_implied_walks_nodes() {
        let mut node = ConfigNode::new();
        node.insert("dir", PathBuf::from("/tmp"));
        node.insert("plain", 1_i64);
        let mut hints = TypeHints::new();
        hints.record_implied(&path("paths"), &Value::Node(node));
        assert_eq!(hints.get(&path("paths.dir")), Some(&TypeHint::Path));
        assert_eq!(hints.len(), 1);
    }

    #[test]
    fn remove_subtree_keeps_siblings() {
        let mut hints = TypeHints::new();
        hints.insert_raw("a.b", "datetime");
        hints.insert_raw("a.c", "Path");
        hints.insert_raw("ab", "Path");
        assert_eq!(hints.remove_subtree(&path("a")), 2);
        assert_eq!(hints.iter().map(|(k, _)| k).collect::<Vec<_>>(), ["ab"]);
    }
}
