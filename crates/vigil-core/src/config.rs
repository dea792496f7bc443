//! Centralized configuration for the management core.
//!
//! This module provides configuration constants for the IPC transport and the
//! standard names of the platform managed objects.

use std::time::Duration;

/// Local IPC transport limits and timeouts.
pub struct IpcConfig;

impl IpcConfig {
    pub const MAX_IPC_MESSAGE_SIZE: usize = 16 * 1024 * 1024; // 16MB
    pub const MAX_IPC_CONNECTIONS: usize = 64;
    pub const IPC_CONNECT_TIMEOUT: Duration = Duration::from_secs(2);
    pub const IPC_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
    pub const IPC_BIND_ADDR: &'static str = "127.0.0.1:0";
}

/// Standard names of the platform managed objects.
pub struct PlatformConfig;

impl PlatformConfig {
    pub const DOMAIN: &'static str = "vigil.platform";
    pub const RUNTIME_NAME: &'static str = "vigil.platform:type=Runtime";
    pub const OPERATING_SYSTEM_NAME: &'static str = "vigil.platform:type=OperatingSystem";
    pub const MEMORY_NAME: &'static str = "vigil.platform:type=Memory";
    pub const VM_VENDOR: &'static str = "Vigil Project";
}
