//! Derived, read-only keys
//!
//! Some keys in the tree are maintained by the manager rather than by
//! callers. They are written on every load and restore and refuse
//! assignment with [`ConfigError::ReadOnlyProperty`]; the attempted value is
//! never stored.

use std::path::Path;

use confmgr_node::{ConfigNode, ConfigPath, TypeHint, TypeHints, Value};
use confmgr_persist::is_reserved_key;

use crate::error::ConfigError;

/// Key mirroring the resolved config file location
pub const CONFIG_FILE_PATH: &str = "config_file_path";

/// Key holding the first-start time (managed, but assignable)
pub const FIRST_START_TIME: &str = "first_start_time";

/// A key whose value always mirrors something else
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DerivedProperty {
    /// Top-level key
    pub key: &'static str,
    /// What it mirrors, for error messages
    pub mirrors: &'static str,
}

/// Every derived property
pub const DERIVED_PROPERTIES: &[DerivedProperty] = &[DerivedProperty {
    key: CONFIG_FILE_PATH,
    mirrors: "the resolved config file location",
}];

/// Derived property at or above `path`, if any
///
/// `config_file_path.x` resolves to `config_file_path`: writing below a
/// derived key would replace it with a node.
#[must_use]
pub fn derived_property(path: &ConfigPath) -> Option<&'static DerivedProperty> {
    let key = path.segments().first()?;
    DERIVED_PROPERTIES.iter().find(|d| d.key == key.as_str())
}

/// Refuse writes that would touch a derived property or a layout key
pub(crate) fn check_assignable(path: &ConfigPath, value: Option<&Value>) -> Result<(), ConfigError> {
    if let Some(derived) = derived_property(path) {
        return Err(ConfigError::ReadOnlyProperty {
            property: derived.key.to_string(),
            derived_from: derived.mirrors,
        });
    }
    if path.len() > 1 && is_first_start(path) {
        return Err(ConfigError::ManagedKey {
            path: path.to_string(),
            key: FIRST_START_TIME,
        });
    }
    if path.iter().any(is_layout_key) || value.is_some_and(holds_layout_key) {
        return Err(ConfigError::ReservedKey(path.to_string()));
    }
    Ok(())
}

/// Refuse removals and hint changes at or below a managed key
///
/// `first_start_time` may be reassigned a date-time but never removed or
/// re-hinted.
pub(crate) fn check_managed_subtree(path: &ConfigPath) -> Result<(), ConfigError> {
    check_assignable(path, None)?;
    if is_first_start(path) {
        return Err(ConfigError::ManagedKey {
            path: path.to_string(),
            key: FIRST_START_TIME,
        });
    }
    Ok(())
}

fn is_first_start(path: &ConfigPath) -> bool {
    path.segments().first().is_some_and(|key| key == FIRST_START_TIME)
}

fn is_layout_key(key: &str) -> bool {
    is_reserved_key(key) || key == "<<"
}

fn holds_layout_key(value: &Value) -> bool {
    match value {
        Value::Node(node) => node
            .iter()
            .any(|(key, child)| is_layout_key(key) || holds_layout_key(child)),
        Value::List(items) => items.iter().any(holds_layout_key),
        _ => false,
    }
}

/// Write the derived keys for a manager of `file`; true if anything changed
pub(crate) fn stamp(tree: &mut ConfigNode, hints: &mut TypeHints, file: &Path) -> bool {
    let value = Value::Path(file.to_path_buf());
    let changed = tree.get(CONFIG_FILE_PATH) != Some(&value);
    if changed {
        tree.insert(CONFIG_FILE_PATH, value);
    }
    if let Ok(path) = ConfigPath::key(CONFIG_FILE_PATH) {
        if hints.get(&path) != Some(&TypeHint::Path) {
            hints.insert(&path, TypeHint::Path);
            return true;
        }
    }
    changed
}
