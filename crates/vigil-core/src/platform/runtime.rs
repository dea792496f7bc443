//! Runtime managed object: identity, start time and launch arguments of the
//! current process.

use super::PlatformInterface;
use crate::config::PlatformConfig;
use crate::descriptor::MethodSignature;
use crate::object::{native, unknown_method, ManagedObject};
use crate::open_type::{CompositeType, OpenType, TabularType};
use crate::proxy::{ManagementInterface, Proxy};
use crate::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::{Arc, OnceLock};
use std::time::Instant;

/// One row of the `SystemProperties` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemProperty {
    pub key: String,
    pub value: String,
}

/// Tabular type of `SystemProperties`, indexed by `key`.
pub fn system_properties_type() -> Result<OpenType> {
    static TYPE: OnceLock<Arc<TabularType>> = OnceLock::new();
    if let Some(existing) = TYPE.get() {
        return Ok(existing.clone().into());
    }
    let row = CompositeType::builder("SystemProperty")
        .description("A process property")
        .field("key", OpenType::STRING)
        .field("value", OpenType::STRING)
        .build()?;
    let table = TabularType::new("SystemProperties", row, ["key"])?;
    Ok(TYPE.get_or_init(|| table).clone().into())
}

fn runtime_methods() -> Result<Vec<MethodSignature>> {
    Ok(vec![
        MethodSignature::getter("get_name", OpenType::STRING),
        MethodSignature::getter("get_vm_vendor", OpenType::STRING),
        MethodSignature::getter("get_vm_version", OpenType::STRING),
        MethodSignature::getter("get_start_time", OpenType::INT64),
        MethodSignature::getter("get_uptime", OpenType::INT64),
        MethodSignature::getter("get_input_arguments", OpenType::array(OpenType::STRING)),
        MethodSignature::getter("get_system_properties", system_properties_type()?),
    ])
}

/// The `Runtime` platform object.
pub struct RuntimeObject {
    methods: Vec<MethodSignature>,
    started_at: DateTime<Utc>,
    started: Instant,
}

impl RuntimeObject {
    pub fn new() -> Result<Self> {
        Ok(Self {
            methods: runtime_methods()?,
            started_at: Utc::now(),
            started: Instant::now(),
        })
    }

    /// `pid@host`, the conventional process display name.
    pub fn name(&self) -> String {
        let host = sysinfo::System::host_name().unwrap_or_else(|| "localhost".to_string());
        format!("{}@{}", std::process::id(), host)
    }

    pub fn uptime_millis(&self) -> i64 {
        i64::try_from(self.started.elapsed().as_millis()).unwrap_or(i64::MAX)
    }

    /// Process arguments after the program name. Non-UTF-8 bytes are
    /// replaced rather than rejected.
    pub fn input_arguments(&self) -> Vec<String> {
        lossy_arguments(std::env::args_os().skip(1))
    }

    /// Properties of the running process, sorted by key.
    pub fn system_properties(&self) -> Vec<SystemProperty> {
        let mut properties = vec![
            ("os.name", std::env::consts::OS.to_string()),
            ("os.arch", std::env::consts::ARCH.to_string()),
            ("os.family", std::env::consts::FAMILY.to_string()),
            ("process.id", std::process::id().to_string()),
            ("vigil.version", env!("CARGO_PKG_VERSION").to_string()),
        ];
        if let Ok(exe) = std::env::current_exe() {
            properties.push(("process.executable", exe.display().to_string()));
        }
        if let Ok(dir) = std::env::current_dir() {
            properties.push(("user.dir", dir.display().to_string()));
        }
        properties.sort_by(|a, b| a.0.cmp(b.0));
        properties
            .into_iter()
            .map(|(key, value)| SystemProperty {
                key: key.to_string(),
                value,
            })
            .collect()
    }
}

impl ManagedObject for RuntimeObject {
    fn methods(&self) -> Vec<MethodSignature> {
        self.methods.clone()
    }

    fn description(&self) -> String {
        "Runtime system of the managed process".to_string()
    }

    fn call(&self, method: &str, _args: &[Value]) -> Result<Value> {
        match method {
            "get_name" => native(&self.name()),
            "get_vm_vendor" => native(PlatformConfig::VM_VENDOR),
            "get_vm_version" => native(env!("CARGO_PKG_VERSION")),
            "get_start_time" => native(&self.started_at.timestamp_millis()),
            "get_uptime" => native(&self.uptime_millis()),
            "get_input_arguments" => native(&self.input_arguments()),
            "get_system_properties" => native(&self.system_properties()),
            other => Err(unknown_method(other)),
        }
    }
}

/// Typed proxy for the `Runtime` platform object.
#[derive(Debug, Clone)]
pub struct RuntimeProxy(Proxy);

impl ManagementInterface for RuntimeProxy {
    fn methods() -> Result<Vec<MethodSignature>> {
        runtime_methods()
    }

    fn from_proxy(proxy: Proxy) -> Self {
        Self(proxy)
    }
}

impl PlatformInterface for RuntimeProxy {
    const OBJECT_NAME: &'static str = PlatformConfig::RUNTIME_NAME;
}

impl RuntimeProxy {
    pub async fn get_name(&self) -> Result<String> {
        self.0.call("get_name", &[]).await
    }

    pub async fn get_vm_vendor(&self) -> Result<String> {
        self.0.call("get_vm_vendor", &[]).await
    }

    pub async fn get_vm_version(&self) -> Result<String> {
        self.0.call("get_vm_version", &[]).await
    }

    /// Start time in milliseconds since the Unix epoch.
    pub async fn get_start_time(&self) -> Result<i64> {
        self.0.call("get_start_time", &[]).await
    }

    /// Uptime in milliseconds.
    pub async fn get_uptime(&self) -> Result<i64> {
        self.0.call("get_uptime", &[]).await
    }

    pub async fn get_input_arguments(&self) -> Result<Vec<String>> {
        self.0.call("get_input_arguments", &[]).await
    }

    pub async fn get_system_properties(&self) -> Result<Vec<SystemProperty>> {
        self.0.call("get_system_properties", &[]).await
    }
}

fn lossy_arguments(args: impl IntoIterator<Item = std::ffi::OsString>) -> Vec<String> {
    args.into_iter()
        .map(|arg| arg.to_string_lossy().into_owned())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::open_type::OpenValue;
    use crate::{Dispatcher, Registry};

    fn dispatcher() -> Dispatcher {
        let registry = Arc::new(Registry::new());
        registry
            .register(
                PlatformConfig::RUNTIME_NAME.parse().unwrap(),
                Arc::new(RuntimeObject::new().unwrap()),
            )
            .unwrap();
        Dispatcher::new(registry)
    }

    #[test]
    fn test_runtime_attributes_are_read_only() {
        let d = dispatcher();
        let info = d
            .get_info(&PlatformConfig::RUNTIME_NAME.parse().unwrap())
            .unwrap();
        assert_eq!(info.attributes.len(), 7);
        assert!(info.attributes.iter().all(|a| a.readable && !a.writable));
        assert!(info.operations.is_empty());
    }

    #[test]
    fn test_runtime_name_and_vendor() {
        let d = dispatcher();
        let name = PlatformConfig::RUNTIME_NAME.parse().unwrap();
        let display = d.get_attribute(&name, "Name").unwrap();
        let prefix = format!("{}@", std::process::id());
        assert!(display.as_str().unwrap().starts_with(&prefix));
        assert_eq!(
            d.get_attribute(&name, "VmVendor").unwrap(),
            OpenValue::String(PlatformConfig::VM_VENDOR.to_string())
        );
    }

    #[test]
    fn test_system_properties_table() {
        let d = dispatcher();
        let name = PlatformConfig::RUNTIME_NAME.parse().unwrap();
        let value = d.get_attribute(&name, "SystemProperties").unwrap();
        let table = value.as_tabular().unwrap();

        let row = table
            .get(&[OpenValue::String("os.arch".to_string())])
            .unwrap();
        assert_eq!(
            row.get("value"),
            Some(&OpenValue::String(std::env::consts::ARCH.to_string()))
        );
        assert!(table.contains_key(&[OpenValue::String("process.id".to_string())]));
    }

    #[test]
    fn test_uptime_is_not_negative() {
        let runtime = RuntimeObject::new().unwrap();
        assert!(runtime.uptime_millis() >= 0);
    }

    #[cfg(unix)]
    #[test]
    fn test_non_utf8_arguments_are_read_lossily() {
        use std::ffi::OsString;
        use std::os::unix::ffi::OsStringExt;

        let args = vec![
            OsString::from("--verbose"),
            OsString::from_vec(vec![b'a', 0xff, b'b']),
        ];
        assert_eq!(
            lossy_arguments(args),
            vec!["--verbose".to_string(), "a\u{FFFD}b".to_string()]
        );
    }
}
