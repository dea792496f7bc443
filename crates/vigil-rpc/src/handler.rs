//! JSON-RPC request handlers.
//!
//! Management methods are forwarded to the core dispatcher's JSON-RPC method
//! table, so the HTTP agent and the IPC transport answer the same calls with
//! the same results and errors.

use crate::server::AppState;
use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, error, warn};
use vigil_core::ipc::IpcDispatch;
use vigil_core::ManagementError;

/// JSON-RPC 2.0 request structure.
#[derive(Debug, Deserialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: String,
    pub method: String,
    #[serde(default)]
    pub params: Option<Value>,
    pub id: Option<Value>,
}

/// JSON-RPC 2.0 response structure.
#[derive(Debug, Serialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
    pub id: Option<Value>,
}

/// JSON-RPC 2.0 error structure.
///
/// `data` carries the serialized [`ManagementError`] when there is one.
#[derive(Debug, Serialize)]
pub struct JsonRpcError {
    pub code: i32,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl JsonRpcResponse {
    pub fn success(id: Option<Value>, result: Value) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            result: Some(result),
            error: None,
            id,
        }
    }

    pub fn error(id: Option<Value>, code: i32, message: String) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            result: None,
            error: Some(JsonRpcError {
                code,
                message,
                data: None,
            }),
            id,
        }
    }

    pub fn failure(id: Option<Value>, err: &ManagementError) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            result: None,
            error: Some(JsonRpcError {
                code: err.to_rpc_error_code(),
                message: err.to_string(),
                data: serde_json::to_value(err).ok(),
            }),
            id,
        }
    }
}

/// Health check endpoint.
pub async fn handle_health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let objects = state.dispatcher.object_count().unwrap_or(0);
    Json(json!({
        "status": "ok",
        "objects": objects,
        "ipc_port": state.ipc_port,
    }))
}

/// Main JSON-RPC handler.
pub async fn handle_rpc(
    State(state): State<Arc<AppState>>,
    Json(request): Json<JsonRpcRequest>,
) -> impl IntoResponse {
    let id = request.id.clone();

    if request.jsonrpc != "2.0" {
        warn!("Rejected request with jsonrpc version {}", request.jsonrpc);
        return (
            StatusCode::OK,
            Json(JsonRpcResponse::error(
                id,
                -32600,
                format!("Invalid JSON-RPC version: {}", request.jsonrpc),
            )),
        );
    }

    let method = request.method.as_str();
    let params = request.params.unwrap_or(Value::Object(Default::default()));

    debug!("RPC call: {}({:?})", method, params);

    if method == "health_check" {
        return (
            StatusCode::OK,
            Json(JsonRpcResponse::success(id, json!({"status": "ok"}))),
        );
    }

    match state.dispatcher.dispatch(method, params).await {
        Ok(value) => (StatusCode::OK, Json(JsonRpcResponse::success(id, value))),
        Err(e) => {
            error!("RPC error for {}: {}", method, e);
            (StatusCode::OK, Json(JsonRpcResponse::failure(id, &e)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_carries_error_data() {
        let err = ManagementError::NotFound {
            name: "dom:type=Mem".to_string(),
        };
        let response = JsonRpcResponse::failure(Some(json!(7)), &err);
        let body = serde_json::to_value(&response).unwrap();

        assert_eq!(body["error"]["code"], -32001);
        assert_eq!(body["error"]["data"]["kind"], "not_found");
        assert!(body.get("result").is_none());

        let restored: ManagementError =
            serde_json::from_value(body["error"]["data"].clone()).unwrap();
        assert_eq!(restored, err);
    }

    #[test]
    fn test_success_omits_error() {
        let body =
            serde_json::to_value(JsonRpcResponse::success(Some(json!(1)), json!(true))).unwrap();
        assert_eq!(body["result"], true);
        assert!(body.get("error").is_none());
    }
}
