//! JSON-RPC method table of a dispatcher.
//!
//! | Method             | Params                                   | Result                         |
//! |--------------------|------------------------------------------|--------------------------------|
//! | `query_names`      | `pattern?`                               | array of names                 |
//! | `is_registered`    | `name`                                   | bool                           |
//! | `get_info`         | `name`                                   | descriptor                     |
//! | `get_attribute`    | `name`, `attribute`                      | open value                     |
//! | `get_attributes`   | `name`, `attributes`                     | map of attribute to slot       |
//! | `set_attribute`    | `name`, `attribute`, `value`             | null                           |
//! | `invoke`           | `name`, `operation`, `args?`             | open value                     |
//! | `get_domains`      | none                                     | array of domains               |
//! | `get_object_count` | none                                     | count                          |
//!
//! Parameter names are accepted in snake_case and camelCase.

use super::protocol::AttributeSlot;
use super::server::IpcDispatch;
use crate::dispatch::Dispatcher;
use crate::open_type::OpenValue;
use crate::{ManagementError, ObjectName, Result};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use std::collections::BTreeMap;

/// Extract an optional string parameter, supporting both snake_case and camelCase.
pub fn get_str_param<'a>(params: &'a Value, snake: &str, camel: &str) -> Option<&'a str> {
    params
        .get(snake)
        .or_else(|| params.get(camel))
        .and_then(|v| v.as_str())
}

/// Extract a required string parameter or return an error.
pub fn require_str_param<'a>(params: &'a Value, snake: &str, camel: &str) -> Result<&'a str> {
    get_str_param(params, snake, camel).ok_or_else(|| {
        ManagementError::invalid_argument(snake, format!("Missing required parameter: {}", snake))
    })
}

/// Extract and deserialize a required parameter.
pub fn require_param<T: DeserializeOwned>(params: &Value, snake: &str, camel: &str) -> Result<T> {
    let value = params
        .get(snake)
        .or_else(|| params.get(camel))
        .filter(|v| !v.is_null())
        .ok_or_else(|| {
            ManagementError::invalid_argument(
                snake,
                format!("Missing required parameter: {}", snake),
            )
        })?;
    T::deserialize(value).map_err(|e| ManagementError::invalid_argument(snake, e.to_string()))
}

fn require_name(params: &Value) -> Result<ObjectName> {
    require_str_param(params, "name", "name")?.parse()
}

#[async_trait::async_trait]
impl IpcDispatch for Dispatcher {
    async fn dispatch(&self, method: &str, params: Value) -> Result<Value> {
        // Native getters and operations may block.
        let dispatcher = self.clone();
        let method = method.to_string();
        tokio::task::spawn_blocking(move || dispatch_blocking(&dispatcher, &method, params))
            .await
            .map_err(|e| ManagementError::Internal {
                message: format!("Dispatch task failed: {}", e),
            })?
    }
}

fn dispatch_blocking(dispatcher: &Dispatcher, method: &str, params: Value) -> Result<Value> {
    match method {
        "query_names" => {
            let pattern = get_str_param(&params, "pattern", "pattern")
                .map(str::parse::<ObjectName>)
                .transpose()?;
            let names: Vec<String> = dispatcher
                .query_names(pattern.as_ref())?
                .into_iter()
                .map(String::from)
                .collect();
            Ok(json!(names))
        }
        "is_registered" => Ok(json!(dispatcher.is_registered(&require_name(&params)?)?)),
        "get_info" => Ok(serde_json::to_value(dispatcher.get_info(&require_name(&params)?)?)?),
        "get_attribute" => {
            let name = require_name(&params)?;
            let attribute = require_str_param(&params, "attribute", "attribute")?;
            Ok(serde_json::to_value(dispatcher.get_attribute(&name, attribute)?)?)
        }
        "get_attributes" => {
            let name = require_name(&params)?;
            let attributes: Vec<String> = require_param(&params, "attributes", "attributes")?;
            let slots: BTreeMap<String, AttributeSlot> = dispatcher
                .get_attributes(&name, &attributes)?
                .into_iter()
                .map(|(attribute, slot)| (attribute, AttributeSlot::from(slot)))
                .collect();
            Ok(serde_json::to_value(slots)?)
        }
        "set_attribute" => {
            let name = require_name(&params)?;
            let attribute = require_str_param(&params, "attribute", "attribute")?;
            let value: OpenValue = require_param(&params, "value", "value")?;
            dispatcher.set_attribute(&name, attribute, &value)?;
            Ok(Value::Null)
        }
        "invoke" => {
            let name = require_name(&params)?;
            let operation = require_str_param(&params, "operation", "operation")?;
            let args: Vec<OpenValue> = match params.get("args") {
                Some(Value::Null) | None => Vec::new(),
                Some(_) => require_param(&params, "args", "args")?,
            };
            Ok(serde_json::to_value(dispatcher.invoke(&name, operation, &args)?)?)
        }
        "get_domains" => Ok(json!(dispatcher.domains()?)),
        "get_object_count" => Ok(json!(dispatcher.object_count()?)),
        other => Err(ManagementError::MethodNotFound {
            method: other.to_string(),
        }),
    }
}
