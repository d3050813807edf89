//! Error types for the value model
//!
//! - [`PathError`]: a dotted path or attribute name could not be parsed
//! - [`ConversionError`]: a stored value cannot be read as the requested type
//! - [`CoercionError`]: stored text does not match its declared type hint

use crate::hints::TypeHint;
use crate::value::ValueKind;

/// Errors while parsing dotted paths and attribute names
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PathError {
    /// The path string was empty
    #[error("empty configuration path")]
    Empty,

    /// Two dots in a row, or a leading/trailing dot
    #[error("empty segment in path '{0}'")]
    EmptySegment(String),

    /// Attribute-style access needs identifier-shaped names
    #[error("'{0}' is not a valid attribute name")]
    NotAnIdentifier(String),
}

/// A value could not be read as the requested Rust type
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("cannot read {found} value as {wanted}")]
pub struct ConversionError {
    /// Kind of the stored value
    pub found: ValueKind,
    /// Name of the requested type
    pub wanted: &'static str,
}

impl ConversionError {
    pub(crate) fn new(found: ValueKind, wanted: &'static str) -> Self {
        Self { found, wanted }
    }
}

/// Stored text does not match the type hint recorded for its path
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("value at '{path}' does not parse as {hint}: {raw}")]
pub struct CoercionError {
    /// Dotted path of the offending leaf
    pub path: String,
    /// Declared type
    pub hint: TypeHint,
    /// Raw value as found in the file
    pub raw: String,
}
