//! Remote management access over local IPC.
//!
//! Provides a lightweight TCP-based transport that exposes a [`Dispatcher`]
//! to other processes. Uses length-prefixed JSON-RPC 2.0 over `127.0.0.1` TCP
//! connections.
//!
//! # Architecture
//!
//! - **Server**: Runs next to the registry, accepts connections, dispatches method calls
//! - **Client**: Connects to a server and implements [`Connection`](crate::Connection)
//! - **Protocol**: Shared framing and JSON-RPC types used by both
//! - **Methods**: The JSON-RPC method table of a dispatcher
//!
//! [`Dispatcher`]: crate::Dispatcher

pub mod client;
pub mod methods;
pub mod protocol;
pub mod server;

pub use client::{IpcClient, IpcOptions};
pub use protocol::{AttributeSlot, IpcRequest, IpcResponse};
pub use server::{IpcDispatch, IpcServer, IpcServerHandle};
