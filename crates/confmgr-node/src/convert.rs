//! Typed reads out of a [`Value`]
//!
//! [`FromValue`] backs the `get_as::<T>()` family. Conversions are lenient in
//! the direction users expect from a configuration file: `"42"` reads as an
//! integer, any scalar reads as a string, a string reads as a path.

use std::path::PathBuf;

use chrono::NaiveDateTime;

use crate::error::ConversionError;
use crate::node::ConfigNode;
use crate::value::{parse_datetime, Value};

/// Types that can be read out of a configuration value
pub trait FromValue: Sized {
    /// Convert, borrowing the stored value
    ///
    /// # Errors
    /// Returns [`ConversionError`] when the value has no sensible reading as
    /// `Self`.
    fn from_value(value: &Value) -> Result<Self, ConversionError>;
}

impl FromValue for Value {
    fn from_value(value: &Value) -> Result<Self, ConversionError> {
        Ok(value.clone())
    }
}

impl FromValue for bool {
    fn from_value(value: &Value) -> Result<Self, ConversionError> {
        match value {
            Value::Bool(b) => Ok(*b),
            Value::Int(i) => Ok(*i != 0),
            Value::Str(s) => match s.trim().to_ascii_lowercase().as_str() {
                "true" | "yes" | "on" | "1" => Ok(true),
                "false" | "no" | "off" | "0" => Ok(false),
                _ => Err(ConversionError::new(value.kind(), "bool")),
            },
            other => Err(ConversionError::new(other.kind(), "bool")),
        }
    }
}

impl FromValue for i64 {
    #[allow(clippy::cast_possible_truncation)]
    fn from_value(value: &Value) -> Result<Self, ConversionError> {
        match value {
            Value::Int(i) => Ok(*i),
            Value::Bool(b) => Ok(i64::from(*b)),
            Value::Float(f) if f.is_finite() => Ok(f.trunc() as i64),
            Value::Str(s) => s
                .trim()
                .parse()
                .map_err(|_| ConversionError::new(value.kind(), "i64")),
            other => Err(ConversionError::new(other.kind(), "i64")),
        }
    }
}

macro_rules! from_value_via_i64 {
    ($($ty:ty),*) => {
        $(
            impl FromValue for $ty {
                fn from_value(value: &Value) -> Result<Self, ConversionError> {
                    let wide = i64::from_value(value)?;
                    <$ty>::try_from(wide)
                        .map_err(|_| ConversionError::new(value.kind(), stringify!($ty)))
                }
            }
        )*
    };
}

from_value_via_i64!(i32, u16, u32, u64, usize);

impl FromValue for f64 {
    fn from_value(value: &Value) -> Result<Self, ConversionError> {
        match value {
            Value::Str(s) => s
                .trim()
                .parse()
                .map_err(|_| ConversionError::new(value.kind(), "f64")),
            other => other
                .as_f64()
                .ok_or_else(|| ConversionError::new(other.kind(), "f64")),
        }
    }
}

impl FromValue for String {
    fn from_value(value: &Value) -> Result<Self, ConversionError> {
        match value {
            Value::List(_) | Value::Node(_) => Err(ConversionError::new(value.kind(), "String")),
            other => Ok(other.to_string()),
        }
    }
}

impl FromValue for PathBuf {
    fn from_value(value: &Value) -> Result<Self, ConversionError> {
        match value {
            Value::Path(p) => Ok(p.clone()),
            Value::Str(s) => Ok(PathBuf::from(s)),
            other => Err(ConversionError::new(other.kind(), "PathBuf")),
        }
    }
}

impl FromValue for NaiveDateTime {
    fn from_value(value: &Value) -> Result<Self, ConversionError> {
        match value {
            Value::DateTime(dt) => Ok(*dt),
            Value::Str(s) => {
                parse_datetime(s).ok_or_else(|| ConversionError::new(value.kind(), "datetime"))
            }
            other => Err(ConversionError::new(other.kind(), "datetime")),
        }
    }
}

impl FromValue for ConfigNode {
    fn from_value(value: &Value) -> Result<Self, ConversionError> {
        value
            .as_node()
            .cloned()
            .ok_or_else(|| ConversionError::new(value.kind(), "ConfigNode"))
    }
}

impl<T: FromValue> FromValue for Vec<T> {
    fn from_value(value: &Value) -> Result<Self, ConversionError> {
        match value {
            Value::List(items) => items.iter().map(T::from_value).collect(),
            other => Err(ConversionError::new(other.kind(), "list")),
        }
    }
}

impl<T: FromValue> FromValue for Option<T> {
    fn from_value(value: &Value) -> Result<Self, ConversionError> {
        if value.is_null() {
            Ok(None)
        } else {
            T::from_value(value).map(Some)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::ValueKind;

    #[test]
    fn numbers_from_text() {
        assert_eq!(i64::from_value(&Value::from("42")), Ok(42));
        assert_eq!(u16::from_value(&Value::from(8080_i64)), Ok(8080));
        assert_eq!(f64::from_value(&Value::from(" 1.5 ")), Ok(1.5));
        assert_eq!(i64::from_value(&Value::Float(3.9)), Ok(3));
        assert!(u16::from_value(&Value::Int(-1)).is_err());
    }

    #[test]
    fn any_scalar_reads_as_string() {
        assert_eq!(String::from_value(&Value::Int(7)).unwrap(), "7");
        assert_eq!(String::from_value(&Value::Bool(true)).unwrap(), "true");
        let err = String::from_value(&Value::List(vec![])).unwrap_err();
        assert_eq!(err.found, ValueKind::List);
    }

    #[test]
    fn bool_spellings() {
        assert_eq!(bool::from_value(&Value::from("Yes")), Ok(true));
        assert_eq!(bool::from_value(&Value::from("off")), Ok(false));
        assert!(bool::from_value(&Value::from("maybe")).is_err());
    }

    #[test]
    fn lists_and_options() {
        let list = Value::from(vec!["1", "2"]);
        assert_eq!(Vec::<i64>::from_value(&list), Ok(vec![1, 2]));
        assert_eq!(Option::<i64>::from_value(&Value::Null), Ok(None));
    }

    #[test]
    fn path_and_datetime_from_strings() {
        assert_eq!(
            PathBuf::from_value(&Value::from("/srv")).unwrap(),
            PathBuf::from("/srv")
        );
        assert!(NaiveDateTime::from_value(&Value::from("2024-01-01T00:00:00")).is_ok());
    }
}
