//! Connection: the discovery and access surface shared by local and remote
//! dispatchers.
//!
//! Proxies and monitoring clients program against `dyn Connection`, so the
//! same code runs unchanged over an in-process [`Dispatcher`] or an
//! [`IpcClient`](crate::ipc::IpcClient) talking to another process.

use crate::descriptor::ManagedObjectInfo;
use crate::dispatch::Dispatcher;
use crate::open_type::OpenValue;
use crate::{ObjectName, Result};
use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet};

/// Access to a registry, local or remote.
#[async_trait]
pub trait Connection: Send + Sync {
    async fn query_names(&self, pattern: Option<&ObjectName>) -> Result<BTreeSet<ObjectName>>;

    async fn is_registered(&self, name: &ObjectName) -> Result<bool>;

    async fn get_info(&self, name: &ObjectName) -> Result<ManagedObjectInfo>;

    async fn get_attribute(&self, name: &ObjectName, attribute: &str) -> Result<OpenValue>;

    /// Best-effort batch read; see [`Dispatcher::get_attributes`].
    async fn get_attributes(
        &self,
        name: &ObjectName,
        attributes: &[String],
    ) -> Result<BTreeMap<String, Result<OpenValue>>>;

    async fn set_attribute(&self, name: &ObjectName, attribute: &str, value: &OpenValue) -> Result<()>;

    async fn invoke(&self, name: &ObjectName, operation: &str, args: &[OpenValue]) -> Result<OpenValue>;

    async fn domains(&self) -> Result<Vec<String>>;

    async fn object_count(&self) -> Result<usize>;
}

#[async_trait]
impl Connection for Dispatcher {
    async fn query_names(&self, pattern: Option<&ObjectName>) -> Result<BTreeSet<ObjectName>> {
        Dispatcher::query_names(self, pattern)
    }

    async fn is_registered(&self, name: &ObjectName) -> Result<bool> {
        Dispatcher::is_registered(self, name)
    }

    async fn get_info(&self, name: &ObjectName) -> Result<ManagedObjectInfo> {
        Dispatcher::get_info(self, name)
    }

    async fn get_attribute(&self, name: &ObjectName, attribute: &str) -> Result<OpenValue> {
        Dispatcher::get_attribute(self, name, attribute)
    }

    async fn get_attributes(
        &self,
        name: &ObjectName,
        attributes: &[String],
    ) -> Result<BTreeMap<String, Result<OpenValue>>> {
        Dispatcher::get_attributes(self, name, attributes)
    }

    async fn set_attribute(&self, name: &ObjectName, attribute: &str, value: &OpenValue) -> Result<()> {
        Dispatcher::set_attribute(self, name, attribute, value)
    }

    async fn invoke(&self, name: &ObjectName, operation: &str, args: &[OpenValue]) -> Result<OpenValue> {
        Dispatcher::invoke(self, name, operation, args)
    }

    async fn domains(&self) -> Result<Vec<String>> {
        Dispatcher::domains(self)
    }

    async fn object_count(&self) -> Result<usize> {
        Dispatcher::object_count(self)
    }
}
