//! On-disk document layout
//!
//! A saved file has exactly two top-level sections:
//!
//! ```yaml
//! __data__:
//!   database:
//!     host: localhost
//!   first_start_time: 2024-05-01T10:30:00
//! __type_hints__:
//!   first_start_time: datetime
//! ```
//!
//! Older files without `__data__` are read as a bare data tree with no
//! hints. Stray top-level keys next to `__data__` are folded into the data
//! section unless they duplicate a key already there, in which case the
//! data section wins and the stray copy is discarded.

use confmgr_node::{CoercionError, ConfigNode, ConfigPath, TypeHints, Value};
use serde_yaml::Mapping;

use crate::yaml::{self, Parsed};

/// Top-level key holding the data tree
pub const DATA_KEY: &str = "__data__";
/// Top-level key holding the type-hint map
pub const HINTS_KEY: &str = "__type_hints__";

/// True for keys that belong to the file layout rather than to the data
#[must_use]
pub fn is_reserved_key(key: &str) -> bool {
    key == DATA_KEY || key == HINTS_KEY
}

/// Why raw text could not be split into a document
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum RawError {
    Syntax(String),
    Layout(String),
}

impl std::fmt::Display for RawError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Syntax(message) | Self::Layout(message) => f.write_str(message),
        }
    }
}

/// A configuration document: data tree, type hints and header comments
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Document {
    /// The data tree
    pub data: ConfigNode,
    /// Declared types by dotted path
    pub type_hints: TypeHints,
    /// Leading `#` comment lines, written back verbatim on save
    pub header: Vec<String>,
}

/// What a load had to repair or discard
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LoadReport {
    /// The file had no `__data__` section
    pub legacy_layout: bool,
    /// Keys discarded because an earlier or canonical copy won
    pub dropped_duplicates: Vec<String>,
    /// Stray top-level keys moved into the data section
    pub folded_keys: Vec<String>,
    /// Reserved layout keys found (and removed) inside the data tree
    pub stripped_reserved: usize,
    /// Alias markers expanded into independent copies
    pub shared_references: usize,
    /// Leaves whose text did not match their type hint (kept as read)
    pub coercion_failures: Vec<CoercionError>,
}

impl LoadReport {
    /// True if the next save will write something structurally different
    /// from what was read
    #[must_use]
    pub fn needs_rewrite(&self) -> bool {
        self.legacy_layout
            || !self.dropped_duplicates.is_empty()
            || !self.folded_keys.is_empty()
            || self.stripped_reserved > 0
            || self.shared_references > 0
    }
}

impl Document {
    /// Document with the given data and hints and no header
    #[must_use]
    pub fn new(data: ConfigNode, type_hints: TypeHints) -> Self {
        Self {
            data,
            type_hints,
            header: Vec::new(),
        }
    }

    /// Empty document, as written when a file is auto-created
    #[inline]
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Split raw text into a document without applying type hints
    pub(crate) fn parse_raw(text: &str) -> Result<(Self, LoadReport), RawError> {
        let parsed = yaml::parse(text).map_err(|e| RawError::Syntax(e.to_string()))?;
        let mut report = LoadReport {
            shared_references: yaml::count_aliases(text),
            ..LoadReport::default()
        };
        let mut document = Self::from_parsed(parsed, &mut report).map_err(RawError::Layout)?;
        document.header = header_comments(text);
        Ok((document, report))
    }

    fn from_parsed(parsed: Parsed, report: &mut LoadReport) -> Result<Self, String> {
        report.dropped_duplicates = parsed.duplicates;
        let mut top = match parsed.value {
            Value::Null => return Ok(Self::empty()),
            Value::Node(node) => node,
            other => return Err(format!("top level must be a mapping, found {}", other.kind())),
        };

        let type_hints = match top.remove(HINTS_KEY) {
            Some(raw) => hints_from_value(raw)?,
            None => TypeHints::new(),
        };

        let mut data = match top.remove(DATA_KEY) {
            Some(Value::Node(data)) => data,
            Some(Value::Null) => ConfigNode::new(),
            Some(other) => return Err(format!("{DATA_KEY} must be a mapping, found {}", other.kind())),
            None => {
                report.legacy_layout = true;
                ConfigNode::new()
            }
        };

        for (key, value) in top {
            if key.starts_with("__") {
                tracing::debug!(key = %key, "ignoring system key");
            } else if report.legacy_layout {
                data.insert(key, value);
            } else if data.contains_key(&key) {
                report.dropped_duplicates.push(key);
            } else {
                report.folded_keys.push(key.clone());
                data.insert(key, value);
            }
        }

        report.stripped_reserved = data.strip_keys(&is_reserved_key);
        Ok(Self::new(data, type_hints))
    }

    /// Replace hinted leaves by their typed form
    ///
    /// Leaves that do not parse as their hint keep the raw value; the
    /// failures are returned for the caller to report.
    pub fn apply_type_hints(&mut self) -> Vec<CoercionError> {
        let mut failures = Vec::new();
        let hinted: Vec<_> = self
            .type_hints
            .iter()
            .filter_map(|(path, hint)| Some((path.parse::<ConfigPath>().ok()?, hint.clone())))
            .collect();
        for (path, hint) in hinted {
            let Some(slot) = self.data.get_path_mut(&path) else {
                continue;
            };
            match hint.coerce(&path, slot.clone()) {
                Ok(typed) => *slot = typed,
                Err(err) => failures.push(err),
            }
        }
        failures
    }

    /// Render as a two-section YAML mapping
    pub(crate) fn to_yaml(&self) -> serde_yaml::Value {
        let hints: Mapping = self
            .type_hints
            .iter()
            .map(|(path, hint)| {
                (
                    serde_yaml::Value::from(path),
                    serde_yaml::Value::from(hint.name()),
                )
            })
            .collect();
        let mut root = Mapping::new();
        root.insert(DATA_KEY.into(), serde_yaml::Value::Mapping(yaml::node_to_yaml(&self.data)));
        root.insert(HINTS_KEY.into(), serde_yaml::Value::Mapping(hints));
        serde_yaml::Value::Mapping(root)
    }

    /// Render as file text, header comments first
    pub(crate) fn render(&self) -> Result<String, serde_yaml::Error> {
        let body = serde_yaml::to_string(&self.to_yaml())?;
        if self.header.is_empty() {
            return Ok(body);
        }
        let mut text = self.header.join("\n");
        text.push('\n');
        text.push_str(&body);
        Ok(text)
    }
}

fn hints_from_value(raw: Value) -> Result<TypeHints, String> {
    let mut hints = TypeHints::new();
    match raw {
        Value::Null => {}
        Value::Node(entries) => {
            for (path, name) in entries {
                match name {
                    Value::Str(name) => hints.insert_raw(path, name),
                    other => tracing::warn!(path = %path, found = %other.kind(), "ignoring malformed type hint"),
                }
            }
        }
        other => return Err(format!("{HINTS_KEY} must be a mapping, found {}", other.kind())),
    }
    Ok(hints)
}

fn header_comments(text: &str) -> Vec<String> {
    text.lines()
        .take_while(|line| line.trim_start().starts_with('#'))
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use confmgr_node::TypeHint;
    use pretty_assertions::assert_eq;

    fn path(s: &str) -> ConfigPath {
        s.parse().unwrap()
    }

    #[test]
    fn two_section_layout() {
        let text = "__data__:\n  when: '2024-05-01T10:30:00'\n  n: 1\n__type_hints__:\n  when: datetime\n";
        let (mut doc, report) = Document::parse_raw(text).unwrap();
        assert!(!report.legacy_layout);
        assert_eq!(doc.type_hints.get(&path("when")), Some(&TypeHint::DateTime));
        assert!(doc.apply_type_hints().is_empty());
        assert!(doc.data.get("when").unwrap().as_datetime().is_some());
    }

    #[test]
    fn legacy_layout_is_whole_data() {
        let (doc, report) = Document::parse_raw("a: 1\nb:\n  c: 2\n__secret__: x\n").unwrap();
        assert!(report.legacy_layout);
        assert!(report.needs_rewrite());
        assert_eq!(doc.data.keys().collect::<Vec<_>>(), ["a", "b"]);
        assert!(doc.type_hints.is_empty());
    }

    #[test]
    fn stray_top_level_keys() {
        let text = "__data__:\n  a: 1\na: 99\nextra: 5\n__type_hints__: {}\n";
        let (doc, report) = Document::parse_raw(text).unwrap();
        assert_eq!(doc.data.get("a"), Some(&Value::Int(1)));
        assert_eq!(doc.data.get("extra"), Some(&Value::Int(5)));
        assert_eq!(report.dropped_duplicates, ["a"]);
        assert_eq!(report.folded_keys, ["extra"]);
    }

    #[test]
    fn reserved_keys_inside_data_are_stripped() {
        let text = "__data__:\n  nested:\n    __data__: {x: 1}\n    keep: 2\n";
        let (doc, report) = Document::parse_raw(text).unwrap();
        assert_eq!(report.stripped_reserved, 1);
        assert_eq!(doc.data.leaf_paths(), vec![path("nested.keep")]);
    }

    #[test]
    fn bad_hint_text_is_reported_not_fatal() {
        let text = "__data__:\n  when: soon\n__type_hints__:\n  when: datetime\n";
        let (mut doc, _) = Document::parse_raw(text).unwrap();
        let failures = doc.apply_type_hints();
        assert_eq!(failures.len(), 1);
        assert_eq!(doc.data.get("when"), Some(&Value::from("soon")));
    }

    #[test]
    fn non_mapping_top_level_is_rejected() {
        assert!(matches!(
            Document::parse_raw("- 1\n- 2\n"),
            Err(RawError::Layout(_))
        ));
        assert!(matches!(
            Document::parse_raw("__data__: [1]\n"),
            Err(RawError::Layout(_))
        ));
        assert!(matches!(
            Document::parse_raw("a: [1\n"),
            Err(RawError::Syntax(_))
        ));
    }

    #[test]
    fn render_keeps_header_and_sections() {
        let (doc, _) = Document::parse_raw("# managed file\n# do not edit\na: 1\n").unwrap();
        let text = doc.render().unwrap();
        assert!(text.starts_with("# managed file\n# do not edit\n__data__:"));
        assert!(text.contains("__type_hints__: {}"));
        let (again, report) = Document::parse_raw(&text).unwrap();
        assert!(!report.needs_rewrite());
        assert_eq!(again, doc);
    }
}
