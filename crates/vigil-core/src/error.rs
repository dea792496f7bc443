//! Error types for the management core.
//!
//! Every failure of the registry, the access dispatcher, the open type layer
//! and the remote transport is a variant of [`ManagementError`]. The enum is
//! serializable so a remote dispatcher can hand the exact same error back to a
//! client, which keeps proxies over a local and a remote connection
//! observably identical.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Main error type for the management core.
#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ManagementError {
    // Registry errors
    #[error("Name already registered: {name}")]
    DuplicateName { name: String },

    #[error("Name not registered: {name}")]
    NotFound { name: String },

    #[error("Object is not manageable: {reason}")]
    NotManageable { reason: String },

    // Attribute and operation dispatch errors
    #[error("No such attribute: {attribute}")]
    NoSuchAttribute { attribute: String },

    #[error("Attribute is not readable: {attribute}")]
    NotReadable { attribute: String },

    #[error("Attribute is not writable: {attribute}")]
    NotWritable { attribute: String },

    #[error("No such operation: {operation}")]
    NoSuchOperation { operation: String },

    #[error("Operation {operation} expects {expected} argument(s), got {actual}")]
    ArityMismatch {
        operation: String,
        expected: usize,
        actual: usize,
    },

    // Open type errors
    #[error("Shape mismatch: {message}")]
    ShapeMismatch { message: String },

    #[error("Duplicate tabular key: {key}")]
    DuplicateKey { key: String },

    // Remote access errors
    #[error("Request timeout after {after_ms}ms")]
    Timeout { after_ms: u64 },

    #[error("Request cancelled")]
    Cancelled,

    #[error("Transport error: {message}")]
    Transport { message: String },

    // Protocol errors
    #[error("Method not found: {method}")]
    MethodNotFound { method: String },

    // Validation errors
    #[error("Invalid argument {field}: {message}")]
    InvalidArgument { field: String, message: String },

    /// The managed object's own getter, setter or operation failed.
    #[error("Invocation of {target} failed: {message}")]
    InvocationFailed { target: String, message: String },

    // Serialization and IO errors
    #[error("JSON error: {message}")]
    Json { message: String },

    #[error("IO error: {message}")]
    Io { message: String },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

/// Result type alias for management operations.
pub type Result<T> = std::result::Result<T, ManagementError>;

impl From<std::io::Error> for ManagementError {
    fn from(err: std::io::Error) -> Self {
        ManagementError::Io {
            message: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for ManagementError {
    fn from(err: serde_json::Error) -> Self {
        ManagementError::Json {
            message: err.to_string(),
        }
    }
}

impl ManagementError {
    /// Create a shape mismatch error.
    pub fn shape(message: impl Into<String>) -> Self {
        ManagementError::ShapeMismatch {
            message: message.into(),
        }
    }

    /// Create an invalid argument error for a named field.
    pub fn invalid_argument(field: impl Into<String>, message: impl Into<String>) -> Self {
        ManagementError::InvalidArgument {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create an invocation failure for a managed object method.
    pub fn invocation(target: impl Into<String>, message: impl Into<String>) -> Self {
        ManagementError::InvocationFailed {
            target: target.into(),
            message: message.into(),
        }
    }

    /// Convert to a JSON-RPC error code.
    ///
    /// Standard JSON-RPC error codes:
    /// - -32601: Method not found
    /// - -32602: Invalid params
    /// - -32603: Internal error
    ///
    /// Application codes (-32000 to -32099):
    /// - -32000: Transport, timeout or cancellation
    /// - -32001: Name not registered
    /// - -32002: Name already registered
    /// - -32003: Object not manageable
    /// - -32004: No such attribute or operation
    /// - -32005: Attribute access not permitted
    /// - -32006: Value or argument shape rejected
    /// - -32007: Managed object invocation failed
    pub fn to_rpc_error_code(&self) -> i32 {
        match self {
            ManagementError::Transport { .. }
            | ManagementError::Timeout { .. }
            | ManagementError::Cancelled => -32000,

            ManagementError::NotFound { .. } => -32001,

            ManagementError::DuplicateName { .. } => -32002,

            ManagementError::NotManageable { .. } => -32003,

            ManagementError::NoSuchAttribute { .. } | ManagementError::NoSuchOperation { .. } => {
                -32004
            }

            ManagementError::NotReadable { .. } | ManagementError::NotWritable { .. } => -32005,

            ManagementError::ArityMismatch { .. }
            | ManagementError::ShapeMismatch { .. }
            | ManagementError::DuplicateKey { .. } => -32006,

            ManagementError::InvocationFailed { .. } => -32007,

            ManagementError::MethodNotFound { .. } => -32601,

            ManagementError::InvalidArgument { .. } => -32602,

            ManagementError::Json { .. }
            | ManagementError::Io { .. }
            | ManagementError::Internal { .. } => -32603,
        }
    }

    /// Check if the failure is transient and the same request may succeed
    /// when retried unchanged.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ManagementError::Transport { .. }
                | ManagementError::Timeout { .. }
                | ManagementError::Cancelled
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ManagementError::NotFound {
            name: "dom:type=Mem".into(),
        };
        assert_eq!(err.to_string(), "Name not registered: dom:type=Mem");

        let err = ManagementError::ArityMismatch {
            operation: "reset".into(),
            expected: 1,
            actual: 2,
        };
        assert_eq!(
            err.to_string(),
            "Operation reset expects 1 argument(s), got 2"
        );
    }

    #[test]
    fn test_rpc_error_codes() {
        assert_eq!(
            ManagementError::NotFound { name: "a:b=c".into() }.to_rpc_error_code(),
            -32001
        );
        assert_eq!(ManagementError::Cancelled.to_rpc_error_code(), -32000);
        assert_eq!(
            ManagementError::invalid_argument("name", "missing").to_rpc_error_code(),
            -32602
        );
    }

    #[test]
    fn test_retryable_errors() {
        assert!(ManagementError::Timeout { after_ms: 50 }.is_retryable());
        assert!(!ManagementError::NotWritable {
            attribute: "Used".into()
        }
        .is_retryable());
    }

    #[test]
    fn test_error_survives_wire_form() {
        let err = ManagementError::NotReadable {
            attribute: "Secret".into(),
        };
        let json = serde_json::to_value(&err).unwrap();
        assert_eq!(json["kind"], "not_readable");

        let back: ManagementError = serde_json::from_value(json).unwrap();
        assert_eq!(back, err);
    }
}
