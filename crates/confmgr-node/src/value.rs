//! Configuration values
//!
//! A [`Value`] is either a scalar, a list, or a nested [`ConfigNode`].
//! Date-times and filesystem paths are first-class scalars so that a value
//! read back from disk has the same type it was written with (the file
//! itself only knows strings; see [`crate::hints`]).

use std::fmt::{self, Display, Formatter};
use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::node::ConfigNode;

/// Text form used when a date-time is written to a file
pub const DATETIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f";

/// A single configuration value
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub enum Value {
    /// Explicit null
    #[default]
    Null,
    /// Boolean
    Bool(bool),
    /// 64-bit signed integer
    Int(i64),
    /// Floating point
    Float(f64),
    /// String
    Str(String),
    /// Naive (zone-less) date-time
    DateTime(NaiveDateTime),
    /// Filesystem path
    Path(PathBuf),
    /// Ordered list
    List(Vec<Value>),
    /// Nested node
    Node(ConfigNode),
}

/// Discriminant of a [`Value`], used in error messages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    /// [`Value::Null`]
    Null,
    /// [`Value::Bool`]
    Bool,
    /// [`Value::Int`]
    Int,
    /// [`Value::Float`]
    Float,
    /// [`Value::Str`]
    Str,
    /// [`Value::DateTime`]
    DateTime,
    /// [`Value::Path`]
    Path,
    /// [`Value::List`]
    List,
    /// [`Value::Node`]
    Node,
}

impl Display for ValueKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Null => "null",
            Self::Bool => "bool",
            Self::Int => "int",
            Self::Float => "float",
            Self::Str => "string",
            Self::DateTime => "datetime",
            Self::Path => "path",
            Self::List => "list",
            Self::Node => "node",
        };
        f.write_str(name)
    }
}

impl Value {
    /// Discriminant of this value
    #[must_use]
    pub fn kind(&self) -> ValueKind {
        match self {
            Self::Null => ValueKind::Null,
            Self::Bool(_) => ValueKind::Bool,
            Self::Int(_) => ValueKind::Int,
            Self::Float(_) => ValueKind::Float,
            Self::Str(_) => ValueKind::Str,
            Self::DateTime(_) => ValueKind::DateTime,
            Self::Path(_) => ValueKind::Path,
            Self::List(_) => ValueKind::List,
            Self::Node(_) => ValueKind::Node,
        }
    }

    /// True for [`Value::Null`]
    #[inline]
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// True for [`Value::Node`]
    #[inline]
    #[must_use]
    pub fn is_node(&self) -> bool {
        matches!(self, Self::Node(_))
    }

    /// Boolean payload
    #[inline]
    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Integer payload
    #[inline]
    #[must_use]
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Float payload; integers widen
    #[inline]
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Float(f) => Some(*f),
            Self::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    /// String payload
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Date-time payload
    #[inline]
    #[must_use]
    pub fn as_datetime(&self) -> Option<NaiveDateTime> {
        match self {
            Self::DateTime(dt) => Some(*dt),
            _ => None,
        }
    }

    /// Path payload
    #[inline]
    #[must_use]
    pub fn as_path(&self) -> Option<&Path> {
        match self {
            Self::Path(p) => Some(p),
            _ => None,
        }
    }

    /// List payload
    #[inline]
    #[must_use]
    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Self::List(items) => Some(items),
            _ => None,
        }
    }

    /// Nested node payload
    #[inline]
    #[must_use]
    pub fn as_node(&self) -> Option<&ConfigNode> {
        match self {
            Self::Node(node) => Some(node),
            _ => None,
        }
    }

    /// Mutable nested node payload
    #[inline]
    pub fn as_node_mut(&mut self) -> Option<&mut ConfigNode> {
        match self {
            Self::Node(node) => Some(node),
            _ => None,
        }
    }

    /// Text-level view: date-times and paths become strings, recursively
    ///
    /// This is what a value looks like once written to a file and read back
    /// without type hints.
    #[must_use]
    pub fn to_plain(&self) -> Value {
        match self {
            Self::DateTime(dt) => Self::Str(format_datetime(dt)),
            Self::Path(p) => Self::Str(p.to_string_lossy().into_owned()),
            Self::List(items) => Self::List(items.iter().map(Value::to_plain).collect()),
            Self::Node(node) => Self::Node(node.to_plain()),
            other => other.clone(),
        }
    }
}

/// Format a date-time the way it is stored on disk
#[must_use]
pub fn format_datetime(dt: &NaiveDateTime) -> String {
    dt.format(DATETIME_FORMAT).to_string()
}

/// Parse a stored date-time
///
/// Accepts `2024-05-01T10:30:00`, an optional fraction, a space instead of
/// `T`, and RFC 3339 strings with an offset (the offset is dropped).
#[must_use]
pub fn parse_datetime(text: &str) -> Option<NaiveDateTime> {
    let text = text.trim();
    NaiveDateTime::parse_from_str(text, DATETIME_FORMAT)
        .or_else(|_| NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S%.f"))
        .ok()
        .or_else(|| DateTime::parse_from_rfc3339(text).ok().map(|dt| dt.naive_local()))
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Null, Self::Null) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Int(a), Self::Int(b)) => a == b,
            (Self::Float(a), Self::Float(b)) => a == b || (a.is_nan() && b.is_nan()),
            (Self::Str(a), Self::Str(b)) => a == b,
            (Self::DateTime(a), Self::DateTime(b)) => a == b,
            (Self::Path(a), Self::Path(b)) => a == b,
            (Self::List(a), Self::List(b)) => a == b,
            (Self::Node(a), Self::Node(b)) => a == b,
            _ => false,
        }
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("null"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(i) => write!(f, "{i}"),
            Self::Float(x) => write!(f, "{x}"),
            Self::Str(s) => f.write_str(s),
            Self::DateTime(dt) => f.write_str(&format_datetime(dt)),
            Self::Path(p) => write!(f, "{}", p.display()),
            Self::List(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("]")
            }
            Self::Node(node) => write!(f, "{node}"),
        }
    }
}

macro_rules! impl_from {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for Value {
                fn from(v: $ty) -> Self {
                    Self::$variant(v.into())
                }
            }
        )*
    };
}

impl_from! {
    bool => Bool,
    i32 => Int,
    i64 => Int,
    u32 => Int,
    f32 => Float,
    f64 => Float,
    String => Str,
    &str => Str,
    NaiveDateTime => DateTime,
    PathBuf => Path,
    &Path => Path,
    ConfigNode => Node,
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(items: Vec<T>) -> Self {
        Self::List(items.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Self::Null, Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn sample_datetime() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 5, 1)
            .unwrap()
            .and_hms_micro_opt(10, 30, 0, 250_000)
            .unwrap()
    }

    #[test]
    fn datetime_text_round_trip() {
        let dt = sample_datetime();
        let text = format_datetime(&dt);
        assert_eq!(text, "2024-05-01T10:30:00.250");
        assert_eq!(parse_datetime(&text), Some(dt));
    }

    #[test]
    fn datetime_parse_variants() {
        let whole = NaiveDate::from_ymd_opt(2024, 5, 1)
            .unwrap()
            .and_hms_opt(10, 30, 0)
            .unwrap();
        assert_eq!(parse_datetime("2024-05-01T10:30:00"), Some(whole));
        assert_eq!(parse_datetime("2024-05-01 10:30:00"), Some(whole));
        assert_eq!(parse_datetime("2024-05-01T10:30:00+02:00"), Some(whole));
        assert_eq!(parse_datetime("yesterday"), None);
    }

    #[test]
    fn plain_view_flattens_typed_scalars() {
        let value = Value::List(vec![
            Value::DateTime(sample_datetime()),
            Value::Path(PathBuf::from("/tmp/x")),
            Value::Int(3),
        ]);
        assert_eq!(
            value.to_plain(),
            Value::List(vec![
                Value::Str("2024-05-01T10:30:00.250".into()),
                Value::Str("/tmp/x".into()),
                Value::Int(3),
            ])
        );
    }

    #[test]
    fn nan_equals_nan() {
        assert_eq!(Value::Float(f64::NAN), Value::Float(f64::NAN));
        assert_ne!(Value::Float(1.0), Value::Int(1));
    }

    #[test]
    fn conversions_into_value() {
        assert_eq!(Value::from("x"), Value::Str("x".into()));
        assert_eq!(Value::from(Some(3_i64)), Value::Int(3));
        assert_eq!(Value::from(None::<i64>), Value::Null);
        assert_eq!(
            Value::from(vec![1_i64, 2]),
            Value::List(vec![Value::Int(1), Value::Int(2)])
        );
        assert_eq!(Value::Int(2).as_f64(), Some(2.0));
    }
}
