//! Platform managed objects and the process-wide registry.
//!
//! [`platform_registry`] creates the registry on first use and registers the
//! standard platform objects under their names from [`PlatformConfig`]:
//!
//! | Name                                  | Attributes                                                                 |
//! |---------------------------------------|----------------------------------------------------------------------------|
//! | `vigil.platform:type=Runtime`         | `Name`, `VmVendor`, `VmVersion`, `StartTime`, `Uptime`, `InputArguments`, `SystemProperties` |
//! | `vigil.platform:type=OperatingSystem` | `Name`, `Arch`, `Version`, `AvailableProcessors`, `SystemLoadAverage`       |
//! | `vigil.platform:type=Memory`          | `HeapMemoryUsage`, `Verbose` (writable); operation `refresh`               |
//!
//! Applications register their own objects into the same registry. Vendor
//! extensions should use a vendor prefix for new attributes; an extension
//! whose attribute collides with an existing one is rejected with
//! `DuplicateName` when it is registered.

mod memory;
mod os;
mod runtime;

pub use memory::{memory_usage_type, MemoryObject, MemoryProxy, MemoryUsage};
pub use os::{OperatingSystemObject, OperatingSystemProxy};
pub use runtime::{system_properties_type, RuntimeObject, RuntimeProxy, SystemProperty};

use crate::config::PlatformConfig;
use crate::connection::Connection;
use crate::dispatch::Dispatcher;
use crate::proxy::{ManagementInterface, Proxy};
use crate::registry::Registry;
use crate::{ManagementError, ObjectName, Result};
use std::sync::{Arc, OnceLock};
use tracing::debug;

/// A management interface of a platform object with a well-known name.
pub trait PlatformInterface: ManagementInterface {
    const OBJECT_NAME: &'static str;
}

static PLATFORM_REGISTRY: OnceLock<Arc<Registry>> = OnceLock::new();

/// Register the standard platform objects into `registry`.
pub fn register_platform_objects(registry: &Registry) -> Result<()> {
    registry.register(
        PlatformConfig::RUNTIME_NAME.parse()?,
        Arc::new(RuntimeObject::new()?),
    )?;
    registry.register(
        PlatformConfig::OPERATING_SYSTEM_NAME.parse()?,
        Arc::new(OperatingSystemObject::new()),
    )?;
    registry.register(
        PlatformConfig::MEMORY_NAME.parse()?,
        Arc::new(MemoryObject::new()?),
    )?;
    Ok(())
}

/// The process-wide registry, holding the platform objects.
pub fn platform_registry() -> Result<Arc<Registry>> {
    if let Some(registry) = PLATFORM_REGISTRY.get() {
        return Ok(registry.clone());
    }

    let registry = Arc::new(Registry::new());
    register_platform_objects(&registry)?;
    debug!("Platform registry created");

    // A concurrent first call may have won; everyone gets the same registry.
    Ok(PLATFORM_REGISTRY.get_or_init(|| registry).clone())
}

/// A dispatcher over [`platform_registry`].
pub fn platform_dispatcher() -> Result<Dispatcher> {
    Ok(Dispatcher::new(platform_registry()?))
}

/// Proxy for the platform object implementing `I`, under its standard name.
pub async fn platform_proxy<I: PlatformInterface>(connection: Arc<dyn Connection>) -> Result<I> {
    new_platform_proxy(connection, I::OBJECT_NAME.parse()?).await
}

/// Proxies for every object in the platform domain that is compatible with
/// interface `I`, in name order. Incompatible objects are skipped.
pub async fn platform_proxies<I: ManagementInterface>(
    connection: Arc<dyn Connection>,
) -> Result<Vec<I>> {
    let pattern: ObjectName = format!("{}:*", PlatformConfig::DOMAIN).parse()?;
    let mut proxies = Vec::new();
    for name in connection.query_names(Some(&pattern)).await? {
        match new_platform_proxy::<I>(connection.clone(), name.clone()).await {
            Ok(proxy) => proxies.push(proxy),
            // Unregistered since the query, or a different shape.
            Err(ManagementError::NotFound { .. } | ManagementError::NotManageable { .. }) => {
                debug!("{} skipped: not compatible", name);
            }
            Err(e) => return Err(e),
        }
    }
    Ok(proxies)
}

/// Proxy for interface `I` bound to `name`.
///
/// Unlike [`make_proxy`](crate::proxy::make_proxy), this contacts the
/// connection: the object must be registered (`NotFound`) and expose every
/// attribute and operation the interface declares, with at least the same
/// access (`NotManageable`).
pub async fn new_platform_proxy<I: ManagementInterface>(
    connection: Arc<dyn Connection>,
    name: ObjectName,
) -> Result<I> {
    let proxy = Proxy::new(connection.clone(), name.clone(), &I::methods()?)?;
    let expected = proxy.info();
    let actual = connection.get_info(&name).await?;

    for attribute in &expected.attributes {
        let compatible = actual.attribute(&attribute.name).is_some_and(|found| {
            (found.readable || !attribute.readable) && (found.writable || !attribute.writable)
        });
        if !compatible {
            return Err(ManagementError::NotManageable {
                reason: format!("{} does not provide attribute {}", name, attribute.name),
            });
        }
    }
    for operation in &expected.operations {
        let compatible = actual
            .operation(&operation.name)
            .is_some_and(|found| found.params.len() == operation.params.len());
        if !compatible {
            return Err(ManagementError::NotManageable {
                reason: format!("{} does not provide operation {}", name, operation.name),
            });
        }
    }

    Ok(I::from_proxy(proxy))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_platform_registry_is_shared() {
        let first = platform_registry().unwrap();
        let second = platform_registry().unwrap();
        assert!(Arc::ptr_eq(&first, &second));

        let names = first
            .query_names(Some(&"vigil.platform:*".parse().unwrap()))
            .unwrap();
        assert_eq!(names.len(), 3);
    }

    #[test]
    fn test_register_platform_objects_twice_is_duplicate() {
        let registry = Registry::new();
        register_platform_objects(&registry).unwrap();
        assert!(matches!(
            register_platform_objects(&registry),
            Err(ManagementError::DuplicateName { .. })
        ));
    }

    #[tokio::test]
    async fn test_platform_proxies() {
        let registry = Arc::new(Registry::new());
        register_platform_objects(&registry).unwrap();
        let connection: Arc<dyn Connection> = Arc::new(Dispatcher::new(registry));

        let memory: MemoryProxy = platform_proxy(connection.clone()).await.unwrap();
        memory.set_verbose(true).await.unwrap();
        assert!(memory.is_verbose().await.unwrap());
        let usage = memory.get_heap_memory_usage().await.unwrap();
        assert!(usage.max > 0);

        let os: OperatingSystemProxy = platform_proxy(connection.clone()).await.unwrap();
        assert_eq!(os.get_arch().await.unwrap(), std::env::consts::ARCH);

        let runtime: RuntimeProxy = platform_proxy(connection).await.unwrap();
        assert!(runtime.get_uptime().await.unwrap() >= 0);
        assert!(runtime.get_start_time().await.unwrap() > 0);
    }

    #[tokio::test]
    async fn test_new_platform_proxy_checks_target() {
        let registry = Arc::new(Registry::new());
        register_platform_objects(&registry).unwrap();
        let connection: Arc<dyn Connection> = Arc::new(Dispatcher::new(registry));

        let absent = new_platform_proxy::<MemoryProxy>(
            connection.clone(),
            "vigil.platform:type=Missing".parse().unwrap(),
        )
        .await;
        assert!(matches!(absent, Err(ManagementError::NotFound { .. })));

        let mismatched = new_platform_proxy::<MemoryProxy>(
            connection,
            PlatformConfig::RUNTIME_NAME.parse().unwrap(),
        )
        .await;
        assert!(matches!(
            mismatched,
            Err(ManagementError::NotManageable { .. })
        ));
    }

    #[tokio::test]
    async fn test_platform_proxies_finds_every_compatible_object() {
        let registry = Arc::new(Registry::new());
        register_platform_objects(&registry).unwrap();
        registry
            .register(
                "vigil.platform:type=Memory,pool=Young".parse().unwrap(),
                Arc::new(MemoryObject::new().unwrap()),
            )
            .unwrap();
        let connection: Arc<dyn Connection> = Arc::new(Dispatcher::new(registry));

        let memories: Vec<MemoryProxy> = platform_proxies(connection.clone()).await.unwrap();
        assert_eq!(memories.len(), 2);
        for memory in &memories {
            assert!(memory.get_heap_memory_usage().await.unwrap().max > 0);
        }

        let runtimes: Vec<RuntimeProxy> = platform_proxies(connection).await.unwrap();
        assert_eq!(runtimes.len(), 1);
    }
}
