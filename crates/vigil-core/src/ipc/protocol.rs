//! Wire format shared by the IPC server and client.
//!
//! Every message is one frame: a big-endian `u32` byte length followed by a
//! UTF-8 JSON-RPC 2.0 object of that length.
//!
//! ```text
//! [u32 BE: len][UTF-8 JSON bytes of len]
//! ```
//!
//! A failed management call is answered with the serialized
//! [`ManagementError`] in `error.data`, so the client re-raises the same
//! error the remote dispatcher produced.

use crate::config::IpcConfig;
use crate::open_type::OpenValue;
use crate::{ManagementError, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::io::{AsyncReadExt, AsyncWriteExt};

pub const JSONRPC_VERSION: &str = "2.0";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IpcRequest {
    pub jsonrpc: String,
    pub method: String,
    #[serde(default)]
    pub params: Option<Value>,
    pub id: Option<Value>,
}

impl IpcRequest {
    pub fn new(method: impl Into<String>, params: Value, id: u64) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            method: method.into(),
            params: Some(params),
            id: Some(Value::from(id)),
        }
    }

    pub fn has_supported_version(&self) -> bool {
        self.jsonrpc == JSONRPC_VERSION
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IpcResponse {
    pub jsonrpc: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<IpcError>,
    pub id: Option<Value>,
}

impl IpcResponse {
    fn reply(id: Option<Value>, outcome: std::result::Result<Value, IpcError>) -> Self {
        let (result, error) = match outcome {
            Ok(value) => (Some(value), None),
            Err(error) => (None, Some(error)),
        };
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            result,
            error,
            id,
        }
    }

    pub fn success(id: Option<Value>, result: Value) -> Self {
        Self::reply(id, Ok(result))
    }

    /// A protocol-level error (parse failure, bad envelope) with no
    /// management error attached.
    pub fn error(id: Option<Value>, code: i32, message: String) -> Self {
        Self::reply(
            id,
            Err(IpcError {
                code,
                message,
                data: None,
            }),
        )
    }

    /// The answer to a management call that failed with `err`.
    pub fn failure(id: Option<Value>, err: &ManagementError) -> Self {
        Self::reply(id, Err(IpcError::from(err)))
    }

    /// The call's result, or the error it carries.
    pub fn into_result(self) -> Result<Value> {
        match (self.error, self.result) {
            (Some(error), _) => Err(error.into_management_error()),
            (None, Some(result)) => Ok(result),
            (None, None) => Err(ManagementError::Internal {
                message: "IPC response has neither result nor error".to_string(),
            }),
        }
    }
}

/// JSON-RPC 2.0 error object.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IpcError {
    pub code: i32,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl From<&ManagementError> for IpcError {
    fn from(err: &ManagementError) -> Self {
        Self {
            code: err.to_rpc_error_code(),
            message: err.to_string(),
            data: serde_json::to_value(err).ok(),
        }
    }
}

impl IpcError {
    /// The management error in `data`; anything else becomes `Internal`.
    pub fn into_management_error(self) -> ManagementError {
        self.data
            .and_then(|data| serde_json::from_value(data).ok())
            .unwrap_or(ManagementError::Internal {
                message: format!("remote error {}: {}", self.code, self.message),
            })
    }
}

/// One slot of a batch attribute read on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttributeSlot {
    Value(OpenValue),
    Error(ManagementError),
}

impl From<Result<OpenValue>> for AttributeSlot {
    fn from(result: Result<OpenValue>) -> Self {
        result.map_or_else(AttributeSlot::Error, AttributeSlot::Value)
    }
}

impl From<AttributeSlot> for Result<OpenValue> {
    fn from(slot: AttributeSlot) -> Self {
        match slot {
            AttributeSlot::Value(value) => Ok(value),
            AttributeSlot::Error(err) => Err(err),
        }
    }
}

fn check_frame_len(len: usize) -> Result<u32> {
    match u32::try_from(len) {
        Ok(encoded) if len <= IpcConfig::MAX_IPC_MESSAGE_SIZE => Ok(encoded),
        _ => Err(ManagementError::invalid_argument(
            "ipc_frame",
            format!(
                "frame of {} bytes exceeds the {} byte limit",
                len,
                IpcConfig::MAX_IPC_MESSAGE_SIZE
            ),
        )),
    }
}

/// Read one frame. `None` means the peer closed the stream between frames.
pub async fn read_frame<R: AsyncReadExt + Unpin>(reader: &mut R) -> Result<Option<Vec<u8>>> {
    let len = match reader.read_u32().await {
        Ok(len) => len as usize,
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    check_frame_len(len)?;

    let mut payload = vec![0u8; len];
    reader.read_exact(&mut payload).await?;
    Ok(Some(payload))
}

/// Write one frame and flush it.
pub async fn write_frame<W: AsyncWriteExt + Unpin>(writer: &mut W, payload: &[u8]) -> Result<()> {
    let len = check_frame_len(payload.len())?;
    writer.write_u32(len).await?;
    writer.write_all(payload).await?;
    writer.flush().await?;
    Ok(())
}
