//! Attribute-style access into a live tree
//!
//! A [`NodeHandle`] is a dotted path plus a weak reference to the manager it
//! came from. It holds no data; every read and write goes through the
//! manager, so handles never observe stale copies.

use std::fmt::{self, Display, Formatter};
use std::sync::{Arc, Weak};

use confmgr_node::{is_identifier, ConfigPath, FromValue, PathError, Value};

use crate::error::{ConfigError, ConfigResult};
use crate::manager::{ConfigManager, ManagerInner, SetOptions};

/// Path-bound view of a manager's tree
#[derive(Debug, Clone)]
pub struct NodeHandle {
    root: Weak<ManagerInner>,
    path: ConfigPath,
}

impl NodeHandle {
    pub(crate) fn root(root: Weak<ManagerInner>) -> Self {
        Self {
            root,
            path: ConfigPath::root(),
        }
    }

    /// Path this handle addresses
    #[inline]
    #[must_use]
    pub fn path(&self) -> &ConfigPath {
        &self.path
    }

    /// Handle for child `name`
    ///
    /// # Errors
    /// [`PathError::NotAnIdentifier`] if `name` is not identifier-shaped.
    pub fn attr(&self, name: &str) -> ConfigResult<Self> {
        if !is_identifier(name) {
            return Err(PathError::NotAnIdentifier(name.to_string()).into());
        }
        Ok(Self {
            root: self.root.clone(),
            path: self.path.child(name)?,
        })
    }

    fn manager(&self) -> ConfigResult<Arc<ManagerInner>> {
        self.root.upgrade().ok_or(ConfigError::ManagerDropped)
    }

    /// Current value, `None` if absent
    ///
    /// # Errors
    /// [`ConfigError::ManagerDropped`].
    pub fn get(&self) -> ConfigResult<Option<Value>> {
        Ok(self.manager()?.get_at(&self.path))
    }

    /// Current value read as `T`
    ///
    /// # Errors
    /// [`ConfigError::ManagerDropped`], or [`ConfigError::Conversion`] if
    /// the value exists but is not convertible.
    pub fn get_as<T: FromValue>(&self) -> ConfigResult<Option<T>> {
        match self.get()? {
            Some(value) => Ok(Some(T::from_value(&value)?)),
            None => Ok(None),
        }
    }

    /// True if a value exists here
    ///
    /// # Errors
    /// [`ConfigError::ManagerDropped`].
    pub fn exists(&self) -> ConfigResult<bool> {
        Ok(self.get()?.is_some())
    }

    /// Assign at this path (same rules as [`ConfigManager::set`])
    ///
    /// # Errors
    /// [`ConfigError::ManagerDropped`] or any refusal from the manager.
    pub fn set(&self, value: impl Into<Value>) -> ConfigResult<()> {
        if self.path.is_root() {
            return Err(PathError::Empty.into());
        }
        self.manager()?
            .set_at(&self.path, value.into(), &SetOptions::default())
    }

    /// Remove the value at this path
    ///
    /// # Errors
    /// [`ConfigError::ManagerDropped`] or any refusal from the manager.
    pub fn remove(&self) -> ConfigResult<Option<Value>> {
        if self.path.is_root() {
            return Err(PathError::Empty.into());
        }
        self.manager()?.remove_at(&self.path)
    }

    /// Manager this handle belongs to, if still alive
    #[must_use]
    pub fn manager_handle(&self) -> Option<ConfigManager> {
        self.root.upgrade().map(|inner| ConfigManager { inner })
    }
}

impl Display for NodeHandle {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "<node {}>", self.path)
    }
}
