//! Operating system managed object.

use super::PlatformInterface;
use crate::config::PlatformConfig;
use crate::descriptor::MethodSignature;
use crate::object::{native, unknown_method, ManagedObject};
use crate::open_type::OpenType;
use crate::proxy::{ManagementInterface, Proxy};
use crate::Result;
use serde_json::Value;
use sysinfo::System;

fn os_methods() -> Vec<MethodSignature> {
    vec![
        MethodSignature::getter("get_name", OpenType::STRING),
        MethodSignature::getter("get_arch", OpenType::STRING),
        MethodSignature::getter("get_version", OpenType::STRING),
        MethodSignature::getter("get_available_processors", OpenType::INT32),
        MethodSignature::getter("get_system_load_average", OpenType::FLOAT64),
    ]
}

/// The `OperatingSystem` platform object.
#[derive(Debug, Default)]
pub struct OperatingSystemObject;

impl OperatingSystemObject {
    pub fn new() -> Self {
        Self
    }

    pub fn name(&self) -> String {
        System::name().unwrap_or_else(|| std::env::consts::OS.to_string())
    }

    pub fn version(&self) -> String {
        System::os_version().unwrap_or_default()
    }

    pub fn available_processors(&self) -> i32 {
        std::thread::available_parallelism()
            .ok()
            .and_then(|n| i32::try_from(n.get()).ok())
            .unwrap_or(1)
    }

    /// One-minute load average, or -1.0 where the platform has none.
    pub fn system_load_average(&self) -> f64 {
        if cfg!(windows) {
            return -1.0;
        }
        System::load_average().one
    }
}

impl ManagedObject for OperatingSystemObject {
    fn methods(&self) -> Vec<MethodSignature> {
        os_methods()
    }

    fn description(&self) -> String {
        "Operating system the managed process runs on".to_string()
    }

    fn call(&self, method: &str, _args: &[Value]) -> Result<Value> {
        match method {
            "get_name" => native(&self.name()),
            "get_arch" => native(std::env::consts::ARCH),
            "get_version" => native(&self.version()),
            "get_available_processors" => native(&self.available_processors()),
            "get_system_load_average" => native(&self.system_load_average()),
            other => Err(unknown_method(other)),
        }
    }
}

/// Typed proxy for the `OperatingSystem` platform object.
#[derive(Debug, Clone)]
pub struct OperatingSystemProxy(Proxy);

impl ManagementInterface for OperatingSystemProxy {
    fn methods() -> Result<Vec<MethodSignature>> {
        Ok(os_methods())
    }

    fn from_proxy(proxy: Proxy) -> Self {
        Self(proxy)
    }
}

impl PlatformInterface for OperatingSystemProxy {
    const OBJECT_NAME: &'static str = PlatformConfig::OPERATING_SYSTEM_NAME;
}

impl OperatingSystemProxy {
    pub async fn get_name(&self) -> Result<String> {
        self.0.call("get_name", &[]).await
    }

    pub async fn get_arch(&self) -> Result<String> {
        self.0.call("get_arch", &[]).await
    }

    pub async fn get_version(&self) -> Result<String> {
        self.0.call("get_version", &[]).await
    }

    pub async fn get_available_processors(&self) -> Result<i32> {
        self.0.call("get_available_processors", &[]).await
    }

    pub async fn get_system_load_average(&self) -> Result<f64> {
        self.0.call("get_system_load_average", &[]).await
    }
}
