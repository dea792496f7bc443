//! In-memory registry of managed objects.
//!
//! The registry maps unique [`ObjectName`]s to live managed objects and the
//! descriptors derived from them at registration time.
//!
//! # Thread Safety
//!
//! The table sits behind a `RwLock`. Lookups clone the entry's `Arc` under the
//! read lock and release it before the caller touches the managed object, so
//! an access racing with `unregister` either completes against the old object
//! or fails with `NotFound`; it never sees a half-removed entry.

use crate::descriptor::ManagedObjectInfo;
use crate::name::NameMatcher;
use crate::object::ManagedObject;
use crate::{ManagementError, ObjectName, Result};
use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::debug;

/// One registered managed object and its descriptor.
pub struct RegistryEntry {
    name: ObjectName,
    object: Arc<dyn ManagedObject>,
    info: Arc<ManagedObjectInfo>,
}

impl RegistryEntry {
    pub fn name(&self) -> &ObjectName {
        &self.name
    }

    pub fn object(&self) -> &Arc<dyn ManagedObject> {
        &self.object
    }

    pub fn info(&self) -> &Arc<ManagedObjectInfo> {
        &self.info
    }
}

impl std::fmt::Debug for RegistryEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegistryEntry")
            .field("name", &self.name)
            .field("info", &self.info)
            .finish_non_exhaustive()
    }
}

/// Table of unique names to managed objects.
#[derive(Default)]
pub struct Registry {
    entries: RwLock<HashMap<ObjectName, Arc<RegistryEntry>>>,
}

impl Registry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, HashMap<ObjectName, Arc<RegistryEntry>>>> {
        self.entries.read().map_err(|_| ManagementError::Internal {
            message: "Failed to acquire registry read lock".to_string(),
        })
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, HashMap<ObjectName, Arc<RegistryEntry>>>> {
        self.entries.write().map_err(|_| ManagementError::Internal {
            message: "Failed to acquire registry write lock".to_string(),
        })
    }

    /// Register `object` under `name`.
    ///
    /// The descriptor is derived before the table is touched, so a failed
    /// registration leaves `name` absent.
    pub fn register(&self, name: ObjectName, object: Arc<dyn ManagedObject>) -> Result<()> {
        if name.is_pattern() {
            return Err(ManagementError::invalid_argument(
                "name",
                format!("cannot register pattern {}", name),
            ));
        }

        let info = ManagedObjectInfo::derive(&object.methods())?
            .with_description(object.description());

        let mut entries = self.write()?;
        if entries.contains_key(&name) {
            return Err(ManagementError::DuplicateName {
                name: name.to_string(),
            });
        }

        debug!(
            "Registered {} ({} attributes, {} operations)",
            name,
            info.attributes.len(),
            info.operations.len()
        );
        let entry = RegistryEntry {
            name: name.clone(),
            object,
            info: Arc::new(info),
        };
        entries.insert(name, Arc::new(entry));
        Ok(())
    }

    /// Remove the entry for `name`.
    pub fn unregister(&self, name: &ObjectName) -> Result<()> {
        let removed = self.write()?.remove(name);
        match removed {
            Some(_) => {
                debug!("Unregistered {}", name);
                Ok(())
            }
            None => Err(ManagementError::NotFound {
                name: name.to_string(),
            }),
        }
    }

    /// Resolve `name` to its entry.
    pub fn lookup(&self, name: &ObjectName) -> Result<Arc<RegistryEntry>> {
        self.read()?
            .get(name)
            .cloned()
            .ok_or_else(|| ManagementError::NotFound {
                name: name.to_string(),
            })
    }

    pub fn is_registered(&self, name: &ObjectName) -> Result<bool> {
        Ok(self.read()?.contains_key(name))
    }

    /// All registered names matching `pattern`; every name when `pattern` is `None`.
    pub fn query_names(&self, pattern: Option<&ObjectName>) -> Result<BTreeSet<ObjectName>> {
        let entries = self.read()?;
        let names = match pattern {
            None => entries.keys().cloned().collect(),
            Some(pattern) => {
                let matcher = NameMatcher::new(pattern);
                entries
                    .keys()
                    .filter(|name| matcher.matches(name))
                    .cloned()
                    .collect()
            }
        };
        Ok(names)
    }

    /// Distinct domains of registered names, sorted.
    pub fn domains(&self) -> Result<Vec<String>> {
        let entries = self.read()?;
        let domains: BTreeSet<&str> = entries.keys().map(ObjectName::domain).collect();
        Ok(domains.into_iter().map(String::from).collect())
    }

    pub fn object_count(&self) -> Result<usize> {
        Ok(self.read()?.len())
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let count = self.entries.read().map(|e| e.len()).unwrap_or(0);
        f.debug_struct("Registry").field("entries", &count).finish()
    }
}
