//! Memory managed object: memory usage of the current process.

use super::PlatformInterface;
use crate::config::PlatformConfig;
use crate::descriptor::MethodSignature;
use crate::object::{arg, native, unknown_method, ManagedObject};
use crate::open_type::{CompositeType, OpenType};
use crate::proxy::{ManagementInterface, Proxy};
use crate::{ManagementError, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, OnceLock};
use sysinfo::{Pid, ProcessRefreshKind, ProcessesToUpdate, System};
use tracing::info;

/// A memory usage snapshot in bytes. `-1` marks an unknown value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryUsage {
    pub init: i64,
    pub used: i64,
    pub committed: i64,
    pub max: i64,
}

/// Composite type of [`MemoryUsage`].
pub fn memory_usage_type() -> Result<OpenType> {
    static TYPE: OnceLock<Arc<CompositeType>> = OnceLock::new();
    if let Some(existing) = TYPE.get() {
        return Ok(existing.clone().into());
    }
    let built = CompositeType::builder("MemoryUsage")
        .description("Memory usage snapshot in bytes")
        .described_field("init", "Usage when the process started", OpenType::INT64)
        .described_field("used", "Resident memory", OpenType::INT64)
        .described_field("committed", "Virtual memory reserved", OpenType::INT64)
        .described_field("max", "Physical memory of the host", OpenType::INT64)
        .build()?;
    Ok(TYPE.get_or_init(|| built).clone().into())
}

fn memory_methods() -> Result<Vec<MethodSignature>> {
    Ok(vec![
        MethodSignature::getter("get_heap_memory_usage", memory_usage_type()?),
        MethodSignature::getter("is_verbose", OpenType::BOOLEAN),
        MethodSignature::setter("set_verbose", OpenType::BOOLEAN),
        MethodSignature::operation("refresh", OpenType::VOID),
    ])
}

fn bytes(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

/// The `Memory` platform object.
pub struct MemoryObject {
    methods: Vec<MethodSignature>,
    system: Mutex<System>,
    pid: Option<Pid>,
    init: i64,
    verbose: AtomicBool,
}

impl MemoryObject {
    pub fn new() -> Result<Self> {
        let object = Self {
            methods: memory_methods()?,
            system: Mutex::new(System::new()),
            pid: sysinfo::get_current_pid().ok(),
            init: -1,
            verbose: AtomicBool::new(false),
        };
        let init = object.sample()?.used;
        Ok(Self { init, ..object })
    }

    /// Take one consistent snapshot.
    pub fn sample(&self) -> Result<MemoryUsage> {
        let mut system = self.system.lock().map_err(|_| ManagementError::Internal {
            message: "Failed to acquire memory sampler lock".to_string(),
        })?;
        system.refresh_memory();

        let (used, committed) = match self.pid {
            Some(pid) => {
                system.refresh_processes_specifics(
                    ProcessesToUpdate::Some(&[pid]),
                    true,
                    ProcessRefreshKind::new().with_memory(),
                );
                system
                    .process(pid)
                    .map(|p| (bytes(p.memory()), bytes(p.virtual_memory())))
                    .unwrap_or((-1, -1))
            }
            None => (-1, -1),
        };

        Ok(MemoryUsage {
            init: self.init,
            used,
            committed,
            max: bytes(system.total_memory()),
        })
    }

    pub fn is_verbose(&self) -> bool {
        self.verbose.load(Ordering::SeqCst)
    }

    pub fn set_verbose(&self, verbose: bool) {
        self.verbose.store(verbose, Ordering::SeqCst);
        info!("Verbose memory reporting {}", if verbose { "enabled" } else { "disabled" });
    }

    /// Resample and, when verbose, log the result.
    pub fn refresh(&self) -> Result<()> {
        let usage = self.sample()?;
        if self.is_verbose() {
            info!(
                "Memory: used={} committed={} max={}",
                usage.used, usage.committed, usage.max
            );
        }
        Ok(())
    }
}

impl ManagedObject for MemoryObject {
    fn methods(&self) -> Vec<MethodSignature> {
        self.methods.clone()
    }

    fn description(&self) -> String {
        "Memory system of the managed process".to_string()
    }

    fn call(&self, method: &str, args: &[Value]) -> Result<Value> {
        match method {
            "get_heap_memory_usage" => native(&self.sample()?),
            "is_verbose" => native(&self.is_verbose()),
            "set_verbose" => {
                self.set_verbose(arg(args, 0)?);
                native(&())
            }
            "refresh" => {
                self.refresh()?;
                native(&())
            }
            other => Err(unknown_method(other)),
        }
    }
}

/// Typed proxy for the `Memory` platform object.
#[derive(Debug, Clone)]
pub struct MemoryProxy(Proxy);

impl ManagementInterface for MemoryProxy {
    fn methods() -> Result<Vec<MethodSignature>> {
        memory_methods()
    }

    fn from_proxy(proxy: Proxy) -> Self {
        Self(proxy)
    }
}

impl PlatformInterface for MemoryProxy {
    const OBJECT_NAME: &'static str = PlatformConfig::MEMORY_NAME;
}

impl MemoryProxy {
    pub async fn get_heap_memory_usage(&self) -> Result<MemoryUsage> {
        self.0.call("get_heap_memory_usage", &[]).await
    }

    pub async fn is_verbose(&self) -> Result<bool> {
        self.0.call("is_verbose", &[]).await
    }

    pub async fn set_verbose(&self, verbose: bool) -> Result<()> {
        self.0.call("set_verbose", &[Value::Bool(verbose)]).await
    }

    pub async fn refresh(&self) -> Result<()> {
        self.0.call("refresh", &[]).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::open_type::OpenValue;
    use crate::{Dispatcher, ObjectName, Registry};

    fn dispatcher() -> (Dispatcher, ObjectName) {
        let registry = Arc::new(Registry::new());
        let name: ObjectName = PlatformConfig::MEMORY_NAME.parse().unwrap();
        registry
            .register(name.clone(), Arc::new(MemoryObject::new().unwrap()))
            .unwrap();
        (Dispatcher::new(registry), name)
    }

    #[test]
    fn test_descriptor() {
        let (d, name) = dispatcher();
        let info = d.get_info(&name).unwrap();

        let verbose = info.attribute("Verbose").unwrap();
        assert!(verbose.readable && verbose.writable && verbose.is_getter);
        assert!(!info.attribute("HeapMemoryUsage").unwrap().writable);
        assert!(info.operation("refresh").is_some());
    }

    #[test]
    fn test_heap_memory_usage_is_composite() {
        let (d, name) = dispatcher();
        let value = d.get_attribute(&name, "HeapMemoryUsage").unwrap();
        let usage = value.as_composite().unwrap();
        for field in ["init", "used", "committed", "max"] {
            assert!(usage.contains_key(field), "missing {}", field);
        }
        assert!(usage.get("max").unwrap().as_i64().unwrap() > 0);
    }

    #[test]
    fn test_verbose_read_after_write() {
        let (d, name) = dispatcher();
        assert_eq!(
            d.get_attribute(&name, "Verbose").unwrap(),
            OpenValue::Boolean(false)
        );
        d.set_attribute(&name, "Verbose", &OpenValue::Boolean(true))
            .unwrap();
        assert_eq!(
            d.get_attribute(&name, "Verbose").unwrap(),
            OpenValue::Boolean(true)
        );
        assert_eq!(d.invoke(&name, "refresh", &[]).unwrap(), OpenValue::Void);
    }
}
