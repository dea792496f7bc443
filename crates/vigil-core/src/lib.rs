//! Vigil Core - management registry and uniform access to managed objects.
//!
//! This crate lets a process expose named managed objects (attributes and
//! operations) and lets monitoring code read, write and invoke them through a
//! single surface, either in-process or from another process.
//!
//! - [`open_type`]: portable value kinds used at every access boundary
//! - [`ManagedObject`] and [`ManagedObjectInfo`]: what an object declares and
//!   the descriptor derived from it
//! - [`Registry`]: unique names to managed objects
//! - [`Dispatcher`]: get/set/invoke over a registry
//! - [`Connection`] and [`proxy`]: typed adapters over a local dispatcher or a
//!   remote [`ipc::IpcClient`]
//! - [`platform`]: the process-wide registry and its standard objects
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use std::sync::atomic::{AtomicI64, Ordering};
//! use serde_json::Value;
//! use vigil_core::object::{native, unknown_method};
//! use vigil_core::{Dispatcher, ManagedObject, MethodSignature, OpenType, OpenValue, Registry};
//!
//! struct Mem(AtomicI64);
//!
//! impl ManagedObject for Mem {
//!     fn methods(&self) -> Vec<MethodSignature> {
//!         vec![MethodSignature::getter("get_used", OpenType::INT64)]
//!     }
//!
//!     fn call(&self, method: &str, _args: &[Value]) -> vigil_core::Result<Value> {
//!         match method {
//!             "get_used" => native(&self.0.load(Ordering::SeqCst)),
//!             other => Err(unknown_method(other)),
//!         }
//!     }
//! }
//!
//! # fn main() -> vigil_core::Result<()> {
//! let registry = Arc::new(Registry::new());
//! registry.register("dom:type=Mem".parse()?, Arc::new(Mem(AtomicI64::new(100))))?;
//!
//! let dispatcher = Dispatcher::new(registry);
//! let used = dispatcher.get_attribute(&"dom:type=Mem".parse()?, "Used")?;
//! assert_eq!(used, OpenValue::Int64(100));
//! # Ok(())
//! # }
//! ```

pub mod cancel;
pub mod config;
pub mod connection;
pub mod descriptor;
pub mod dispatch;
pub mod error;
pub mod ipc;
pub mod name;
pub mod object;
pub mod open_type;
pub mod platform;
pub mod proxy;
pub mod registry;

// Re-export commonly used types
pub use cancel::{CancellationToken, CancelledError};
pub use config::{IpcConfig, PlatformConfig};
pub use connection::Connection;
pub use descriptor::{AttributeInfo, ManagedObjectInfo, MethodSignature, OperationInfo, ParameterInfo};
pub use dispatch::Dispatcher;
pub use error::{ManagementError, Result};
pub use ipc::{IpcClient, IpcOptions, IpcServer, IpcServerHandle};
pub use name::ObjectName;
pub use object::ManagedObject;
pub use open_type::{CompositeData, CompositeType, OpenType, OpenValue, TabularData, TabularType};
pub use platform::{
    platform_dispatcher, platform_proxies, platform_proxy, platform_registry, PlatformInterface,
};
pub use proxy::{make_proxy, ManagementInterface, Proxy};
pub use registry::Registry;
