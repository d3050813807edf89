//! Dotted paths for addressing values inside a configuration tree
//!
//! `paths.work_dir` addresses the `work_dir` key of the `paths` node. Keys may
//! contain any character except `.`; attribute-style access additionally
//! requires identifier-shaped names (see [`is_identifier`]).

use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::PathError;

/// Path from the root of a tree to one of its values
///
/// # Examples
/// - `["database", "host"]` → `database.host`
/// - `["first_start_time"]` → `first_start_time`
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ConfigPath(Vec<String>);

impl ConfigPath {
    /// Path addressing the root node itself
    #[inline]
    #[must_use]
    pub fn root() -> Self {
        Self(Vec::new())
    }

    /// Path made of a single key
    ///
    /// # Errors
    /// Returns an error if the key is empty or contains a dot.
    pub fn key(key: impl Into<String>) -> Result<Self, PathError> {
        let key = key.into();
        validate_segment(&key, &key)?;
        Ok(Self(vec![key]))
    }

    /// Path segments from root to leaf
    #[inline]
    #[must_use]
    pub fn segments(&self) -> &[String] {
        &self.0
    }

    /// Number of segments
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True for the root path
    #[inline]
    #[must_use]
    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    /// Parent path, `None` for the root
    #[must_use]
    pub fn parent(&self) -> Option<Self> {
        self.0
            .split_last()
            .map(|(_, parent)| Self(parent.to_vec()))
    }

    /// Final key, `None` for the root
    #[inline]
    #[must_use]
    pub fn last(&self) -> Option<&str> {
        self.0.last().map(String::as_str)
    }

    /// Append a key, returning the new path
    ///
    /// # Errors
    /// Returns an error if the key is empty or contains a dot.
    pub fn child(&self, key: impl Into<String>) -> Result<Self, PathError> {
        let key = key.into();
        validate_segment(&key, &key)?;
        let mut next = self.clone();
        next.0.push(key);
        Ok(next)
    }

    /// True when `self` equals `other` or is one of its ancestors
    ///
    /// `paths` is a prefix of `paths.work_dir`; `path` is not.
    #[must_use]
    pub fn is_prefix_of(&self, other: &Self) -> bool {
        self.0.len() <= other.0.len() && self.0 == other.0[..self.0.len()]
    }

    /// Iterator over keys from root to leaf
    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

/// True for names usable with attribute-style access (`[A-Za-z_][A-Za-z0-9_]*`)
#[must_use]
pub fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn validate_segment(segment: &str, whole: &str) -> Result<(), PathError> {
    if segment.is_empty() || segment.contains('.') {
        Err(PathError::EmptySegment(whole.to_string()))
    } else {
        Ok(())
    }
}

impl Display for ConfigPath {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.join("."))
    }
}

impl FromStr for ConfigPath {
    type Err = PathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Err(PathError::Empty);
        }
        let segments = s
            .split('.')
            .map(|seg| validate_segment(seg, s).map(|()| seg.to_string()))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self(segments))
    }
}

impl TryFrom<String> for ConfigPath {
    type Error = PathError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl TryFrom<&str> for ConfigPath {
    type Error = PathError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ConfigPath> for String {
    fn from(path: ConfigPath) -> Self {
        path.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_and_display() {
        let path: ConfigPath = "paths.work_dir".parse().unwrap();
        assert_eq!(path.segments(), ["paths", "work_dir"]);
        assert_eq!(path.to_string(), "paths.work_dir");
        assert_eq!(path.last(), Some("work_dir"));
    }

    #[test]
    fn keys_may_hold_non_identifier_characters() {
        let path: ConfigPath = "servers.eu-west-1.port".parse().unwrap();
        assert_eq!(path.len(), 3);
    }

    #[test]
    fn rejects_empty_segments() {
        assert_eq!("".parse::<ConfigPath>(), Err(PathError::Empty));
        assert!(matches!(
            "a..b".parse::<ConfigPath>(),
            Err(PathError::EmptySegment(_))
        ));
        assert!("a.".parse::<ConfigPath>().is_err());
        assert!(ConfigPath::key("a.b").is_err());
    }

    #[test]
    fn parent_and_prefix() {
        let leaf: ConfigPath = "a.b.c".parse().unwrap();
        let parent = leaf.parent().unwrap();
        assert_eq!(parent.to_string(), "a.b");
        assert!(parent.is_prefix_of(&leaf));
        assert!(leaf.is_prefix_of(&leaf));
        assert!(!leaf.is_prefix_of(&parent));
        assert!(ConfigPath::root().is_prefix_of(&leaf));

        let sibling: ConfigPath = "a.bc".parse().unwrap();
        assert!(!parent.is_prefix_of(&sibling));
    }

    #[test]
    fn identifier_check() {
        assert!(is_identifier("work_dir"));
        assert!(is_identifier("_private"));
        assert!(!is_identifier("9lives"));
        assert!(!is_identifier("eu-west"));
        assert!(!is_identifier(""));
    }

    #[test]
    fn serde_uses_dotted_form() {
        let path: ConfigPath = "a.b".parse().unwrap();
        let json = serde_json::to_string(&path).unwrap();
        assert_eq!(json, "\"a.b\"");
        let back: ConfigPath = serde_json::from_str(&json).unwrap();
        assert_eq!(back, path);
    }
}
