//! Ordered configuration nodes
//!
//! A [`ConfigNode`] maps keys to [`Value`]s in insertion order. Nodes own
//! their children outright: cloning a node is a deep copy, and two keys can
//! never share one child, so mutating through one key is never observable
//! through another.

use std::fmt::{self, Display, Formatter};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::path::ConfigPath;
use crate::value::Value;

/// Ordered mapping from keys to values
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConfigNode {
    entries: IndexMap<String, Value>,
}

impl ConfigNode {
    /// Empty node
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of direct children
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True if the node has no children
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Direct child by key
    #[inline]
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.get(key)
    }

    /// Mutable direct child by key
    #[inline]
    pub fn get_mut(&mut self, key: &str) -> Option<&mut Value> {
        self.entries.get_mut(key)
    }

    /// True if `key` is a direct child
    #[inline]
    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Insert or replace a direct child, keeping its position if it existed
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.entries.insert(key.into(), value.into())
    }

    /// Remove a direct child, preserving the order of the others
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.entries.shift_remove(key)
    }

    /// Keys in insertion order
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Values in insertion order
    pub fn values(&self) -> impl Iterator<Item = &Value> {
        self.entries.values()
    }

    /// `(key, value)` pairs in insertion order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Drop every child
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Value at a dotted path; the root path yields `None`
    #[must_use]
    pub fn get_path(&self, path: &ConfigPath) -> Option<&Value> {
        let (last, parents) = path.segments().split_last()?;
        let mut current = self;
        for key in parents {
            current = current.get(key)?.as_node()?;
        }
        current.get(last)
    }

    /// Mutable value at a dotted path
    pub fn get_path_mut(&mut self, path: &ConfigPath) -> Option<&mut Value> {
        let (last, parents) = path.segments().split_last()?;
        let mut current = self;
        for key in parents {
            current = current.get_mut(key)?.as_node_mut()?;
        }
        current.get_mut(last)
    }

    /// Node at a dotted path; the root path yields `self`
    #[must_use]
    pub fn node_at(&self, path: &ConfigPath) -> Option<&ConfigNode> {
        if path.is_root() {
            return Some(self);
        }
        self.get_path(path)?.as_node()
    }

    /// Assign a value at a dotted path, creating intermediate nodes
    ///
    /// A non-node value standing where an intermediate node is needed is
    /// replaced by an empty node. Returns the previous value, if any. The
    /// root path is ignored and yields `None`.
    pub fn set_path(&mut self, path: &ConfigPath, value: impl Into<Value>) -> Option<Value> {
        let (last, parents) = path.segments().split_last()?;
        let mut current = self;
        for key in parents {
            let slot = current
                .entries
                .entry(key.clone())
                .or_insert_with(|| Value::Node(ConfigNode::new()));
            if !slot.is_node() {
                tracing::debug!(key = %key, replaced = %slot.kind(), "replacing scalar with node");
                *slot = Value::Node(ConfigNode::new());
            }
            current = slot.as_node_mut()?;
        }
        current.insert(last.clone(), value)
    }

    /// Remove the value at a dotted path
    pub fn remove_path(&mut self, path: &ConfigPath) -> Option<Value> {
        let (last, parents) = path.segments().split_last()?;
        let mut current = self;
        for key in parents {
            current = current.get_mut(key)?.as_node_mut()?;
        }
        current.remove(last)
    }

    /// Dotted paths of every non-node value, depth first
    #[must_use]
    pub fn leaf_paths(&self) -> Vec<ConfigPath> {
        let mut out = Vec::new();
        collect_leaves(self, &ConfigPath::root(), &mut out);
        out
    }

    /// Text-level view of the whole node (see [`Value::to_plain`])
    #[must_use]
    pub fn to_plain(&self) -> ConfigNode {
        self.entries
            .iter()
            .map(|(k, v)| (k.clone(), v.to_plain()))
            .collect()
    }

    /// Recursively remove keys matching `reserved`, returning how many went
    pub fn strip_keys(&mut self, reserved: &dyn Fn(&str) -> bool) -> usize {
        let before = self.entries.len();
        self.entries.retain(|k, _| !reserved(k));
        let mut removed = before - self.entries.len();
        for value in self.entries.values_mut() {
            removed += strip_in_value(value, reserved);
        }
        removed
    }
}

fn strip_in_value(value: &mut Value, reserved: &dyn Fn(&str) -> bool) -> usize {
    match value {
        Value::Node(node) => node.strip_keys(reserved),
        Value::List(items) => items.iter_mut().map(|v| strip_in_value(v, reserved)).sum(),
        _ => 0,
    }
}

fn collect_leaves(node: &ConfigNode, prefix: &ConfigPath, out: &mut Vec<ConfigPath>) {
    for (key, value) in &node.entries {
        // keys containing dots cannot be addressed by a dotted path
        let Ok(path) = prefix.child(key.clone()) else {
            continue;
        };
        match value {
            Value::Node(child) => collect_leaves(child, &path, out),
            _ => out.push(path),
        }
    }
}

impl FromIterator<(String, Value)> for ConfigNode {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

impl IntoIterator for ConfigNode {
    type Item = (String, Value);
    type IntoIter = indexmap::map::IntoIter<String, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

impl Display for ConfigNode {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str("{")?;
        for (i, (key, value)) in self.entries.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{key}: {value}")?;
        }
        f.write_str("}")
    }
}
