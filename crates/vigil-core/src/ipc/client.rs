//! TCP IPC client for a remote dispatcher.
//!
//! Establishes a TCP connection to an [`IpcServer`](super::IpcServer) and
//! implements [`Connection`] on top of it, so proxies and monitoring code work
//! unchanged against another process.
//!
//! # Thread Safety
//!
//! The client uses a tokio `Mutex` to serialize access to the TCP stream,
//! allowing safe concurrent use from multiple async tasks.
//!
//! # Timeouts and cancellation
//!
//! Every round trip is bounded by [`IpcOptions::request_timeout`] and watches
//! a cancellation token: [`IpcOptions::cancel`] for [`IpcClient::call`], or the
//! caller's own token for [`IpcClient::call_with`]. A round trip abandoned
//! either way leaves an unread response on the stream, so the stream is
//! dropped and the next call opens a fresh connection.

use super::protocol::{read_frame, write_frame, AttributeSlot, IpcRequest, IpcResponse};
use crate::cancel::CancellationToken;
use crate::config::IpcConfig;
use crate::connection::Connection;
use crate::descriptor::ManagedObjectInfo;
use crate::open_type::OpenValue;
use crate::{ManagementError, ObjectName, Result};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use std::collections::{BTreeMap, BTreeSet};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tracing::debug;

/// Runtime options of an [`IpcClient`].
#[derive(Debug, Clone)]
pub struct IpcOptions {
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
    pub cancel: CancellationToken,
}

impl Default for IpcOptions {
    fn default() -> Self {
        Self {
            connect_timeout: IpcConfig::IPC_CONNECT_TIMEOUT,
            request_timeout: IpcConfig::IPC_REQUEST_TIMEOUT,
            cancel: CancellationToken::new(),
        }
    }
}

impl IpcOptions {
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

fn transport(addr: SocketAddr, reason: impl std::fmt::Display) -> ManagementError {
    ManagementError::Transport {
        message: format!("{}: {}", addr, reason),
    }
}

async fn open_stream(
    addr: SocketAddr,
    timeout: Duration,
    cancel: &CancellationToken,
) -> Result<TcpStream> {
    cancel.check()?;
    let connect = tokio::time::timeout(timeout, TcpStream::connect(addr));
    tokio::select! {
        _ = cancel.cancelled() => Err(ManagementError::Cancelled),
        result = connect => result
            .map_err(|_| ManagementError::Timeout {
                after_ms: millis(timeout),
            })?
            .map_err(|e| transport(addr, e)),
    }
}

/// IPC client connected to a remote dispatcher.
#[derive(Debug)]
pub struct IpcClient {
    stream: Mutex<Option<TcpStream>>,
    addr: SocketAddr,
    next_id: AtomicU64,
    closed: AtomicBool,
    options: IpcOptions,
}

impl IpcClient {
    /// Connect to an IPC server.
    pub async fn connect(addr: SocketAddr, options: IpcOptions) -> Result<Self> {
        let stream = open_stream(addr, options.connect_timeout, &options.cancel).await?;
        debug!("IPC client connected to {}", addr);

        Ok(Self {
            stream: Mutex::new(Some(stream)),
            addr,
            next_id: AtomicU64::new(1),
            closed: AtomicBool::new(false),
            options,
        })
    }

    /// Get the address of the connected server.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn options(&self) -> &IpcOptions {
        &self.options
    }

    /// Whether a stream is open. A dropped stream is reopened by the next call.
    pub async fn is_connected(&self) -> bool {
        self.stream.lock().await.is_some()
    }

    /// Close the connection for good; later calls fail with `Transport`.
    pub async fn close(&self) {
        self.closed.store(true, Ordering::Release);
        if self.stream.lock().await.take().is_some() {
            debug!("IPC client closed connection to {}", self.addr);
        }
    }

    /// Call a JSON-RPC method on the server, watching the client's token.
    ///
    /// Returns the result value on success. A failed remote call returns the
    /// exact [`ManagementError`] the server produced.
    pub async fn call(&self, method: &str, params: Value) -> Result<Value> {
        self.call_with(method, params, &self.options.cancel).await
    }

    /// Call a JSON-RPC method on the server, cancelled by `cancel`.
    pub async fn call_with(
        &self,
        method: &str,
        params: Value,
        cancel: &CancellationToken,
    ) -> Result<Value> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let request_bytes = serde_json::to_vec(&IpcRequest::new(method, params, id))?;

        let mut guard = tokio::select! {
            _ = cancel.cancelled() => return Err(ManagementError::Cancelled),
            guard = self.stream.lock() => guard,
        };
        if self.closed.load(Ordering::Acquire) {
            return Err(transport(self.addr, "client closed"));
        }
        if guard.is_none() {
            debug!("IPC client reconnecting to {}", self.addr);
            *guard = Some(open_stream(self.addr, self.options.connect_timeout, cancel).await?);
        }

        let outcome = {
            let stream = guard
                .as_mut()
                .ok_or_else(|| transport(self.addr, "connection closed"))?;
            cancel.check()?;

            let exchange = tokio::time::timeout(
                self.options.request_timeout,
                Self::exchange(stream, &request_bytes, self.addr),
            );
            tokio::select! {
                _ = cancel.cancelled() => Err(ManagementError::Cancelled),
                result = exchange => result.unwrap_or(Err(ManagementError::Timeout {
                    after_ms: millis(self.options.request_timeout),
                })),
            }
        };

        let response_bytes = match outcome {
            Ok(bytes) => bytes,
            Err(e) => {
                debug!("IPC call {} to {} abandoned: {}", method, self.addr, e);
                *guard = None;
                return Err(e);
            }
        };
        drop(guard);

        let response: IpcResponse = serde_json::from_slice(&response_bytes).map_err(|e| {
            ManagementError::Internal {
                message: format!("Failed to parse IPC response: {}", e),
            }
        })?;

        response.into_result()
    }

    async fn exchange(stream: &mut TcpStream, request: &[u8], addr: SocketAddr) -> Result<Vec<u8>> {
        let (mut reader, mut writer) = stream.split();

        write_frame(&mut writer, request)
            .await
            .map_err(|e| transport(addr, e))?;

        read_frame(&mut reader)
            .await
            .map_err(|e| transport(addr, e))?
            .ok_or_else(|| transport(addr, "connection closed by peer"))
    }

    async fn call_as<T: DeserializeOwned>(&self, method: &str, params: Value) -> Result<T> {
        let result = self.call(method, params).await?;
        serde_json::from_value(result).map_err(|e| ManagementError::Internal {
            message: format!("Malformed {} response: {}", method, e),
        })
    }
}

#[async_trait]
impl Connection for IpcClient {
    async fn query_names(&self, pattern: Option<&ObjectName>) -> Result<BTreeSet<ObjectName>> {
        let pattern = pattern.map(ObjectName::to_string);
        self.call_as("query_names", json!({ "pattern": pattern })).await
    }

    async fn is_registered(&self, name: &ObjectName) -> Result<bool> {
        self.call_as("is_registered", json!({ "name": name })).await
    }

    async fn get_info(&self, name: &ObjectName) -> Result<ManagedObjectInfo> {
        self.call_as("get_info", json!({ "name": name })).await
    }

    async fn get_attribute(&self, name: &ObjectName, attribute: &str) -> Result<OpenValue> {
        self.call_as(
            "get_attribute",
            json!({ "name": name, "attribute": attribute }),
        )
        .await
    }

    async fn get_attributes(
        &self,
        name: &ObjectName,
        attributes: &[String],
    ) -> Result<BTreeMap<String, Result<OpenValue>>> {
        let slots: BTreeMap<String, AttributeSlot> = self
            .call_as(
                "get_attributes",
                json!({ "name": name, "attributes": attributes }),
            )
            .await?;
        Ok(slots
            .into_iter()
            .map(|(attribute, slot)| (attribute, slot.into()))
            .collect())
    }

    async fn set_attribute(&self, name: &ObjectName, attribute: &str, value: &OpenValue) -> Result<()> {
        self.call(
            "set_attribute",
            json!({ "name": name, "attribute": attribute, "value": value }),
        )
        .await?;
        Ok(())
    }

    async fn invoke(&self, name: &ObjectName, operation: &str, args: &[OpenValue]) -> Result<OpenValue> {
        self.call_as(
            "invoke",
            json!({ "name": name, "operation": operation, "args": args }),
        )
        .await
    }

    async fn domains(&self) -> Result<Vec<String>> {
        self.call_as("get_domains", json!({})).await
    }

    async fn object_count(&self) -> Result<usize> {
        self.call_as("get_object_count", json!({})).await
    }
}
