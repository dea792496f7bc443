//! Typed proxies over a [`Connection`].
//!
//! A management interface is a plain Rust type wrapping a [`Proxy`]. It
//! declares its methods with the same naming convention managed objects use,
//! and each of its methods forwards to [`Proxy::call`]:
//!
//! ```rust
//! use std::sync::Arc;
//! use vigil_core::proxy::{make_proxy, ManagementInterface, Proxy};
//! use vigil_core::{Connection, MethodSignature, ObjectName, OpenType, Result};
//!
//! struct MemProxy(Proxy);
//!
//! impl ManagementInterface for MemProxy {
//!     fn methods() -> Result<Vec<MethodSignature>> {
//!         Ok(vec![MethodSignature::getter("get_used", OpenType::INT64)])
//!     }
//!
//!     fn from_proxy(proxy: Proxy) -> Self {
//!         MemProxy(proxy)
//!     }
//! }
//!
//! impl MemProxy {
//!     async fn get_used(&self) -> Result<i64> {
//!         self.0.call("get_used", &[]).await
//!     }
//! }
//!
//! fn bind(connection: Arc<dyn Connection>) -> Result<MemProxy> {
//!     make_proxy(connection, "dom:type=Mem".parse()?)
//! }
//! ```
//!
//! The proxy neither knows nor cares whether the connection is in-process or
//! remote; errors from the dispatcher come back unchanged.

use crate::connection::Connection;
use crate::descriptor::{ManagedObjectInfo, MethodSignature};
use crate::open_type::{from_open, json_to_open, OpenType, OpenValue};
use crate::{ManagementError, ObjectName, Result};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;

/// A typed management interface built on a [`Proxy`].
pub trait ManagementInterface: Sized {
    /// Declared method surface of the interface.
    ///
    /// Fallible because declaring composite and tabular types is.
    fn methods() -> Result<Vec<MethodSignature>>;

    /// Wrap a proxy bound to one object name.
    fn from_proxy(proxy: Proxy) -> Self;
}

/// Bind interface `I` to `name` over `connection`.
///
/// Fails with `NotManageable` or `DuplicateName` if the interface's own
/// declaration does not derive a valid descriptor. The target object is not
/// contacted.
pub fn make_proxy<I: ManagementInterface>(
    connection: Arc<dyn Connection>,
    name: ObjectName,
) -> Result<I> {
    Proxy::new(connection, name, &I::methods()?).map(I::from_proxy)
}

/// Forwards interface method calls to a connection.
#[derive(Clone)]
pub struct Proxy {
    connection: Arc<dyn Connection>,
    name: ObjectName,
    info: Arc<ManagedObjectInfo>,
}

impl Proxy {
    pub fn new(
        connection: Arc<dyn Connection>,
        name: ObjectName,
        methods: &[MethodSignature],
    ) -> Result<Self> {
        if name.is_pattern() {
            return Err(ManagementError::invalid_argument(
                "name",
                format!("cannot bind a proxy to pattern {}", name),
            ));
        }
        let info = ManagedObjectInfo::derive(methods)?;
        Ok(Self {
            connection,
            name,
            info: Arc::new(info),
        })
    }

    pub fn name(&self) -> &ObjectName {
        &self.name
    }

    pub fn connection(&self) -> &Arc<dyn Connection> {
        &self.connection
    }

    /// Descriptor derived from the interface declaration.
    pub fn info(&self) -> &ManagedObjectInfo {
        &self.info
    }

    /// Forward one interface method call.
    ///
    /// `args` are the native (serde JSON) arguments in declaration order.
    /// Getters become attribute reads, setters attribute writes, and anything
    /// else an operation invocation. Received values are projected onto the
    /// interface's declared type before conversion, so an interface built
    /// against an older composite definition keeps working when the object
    /// grows new fields.
    pub async fn call<R: DeserializeOwned>(&self, method: &str, args: &[Value]) -> Result<R> {
        if let Some((attribute, is_setter)) = self.info.attribute_for_method(method) {
            if is_setter {
                let value = single_arg(method, args, &attribute.open_type)?;
                self.connection
                    .set_attribute(&self.name, &attribute.name, &value)
                    .await?;
                return from_open(&OpenValue::Void, &OpenType::VOID);
            }

            expect_arity(method, args, 0)?;
            let value = self
                .connection
                .get_attribute(&self.name, &attribute.name)
                .await?;
            return received(&value, &attribute.open_type);
        }

        let operation =
            self.info
                .operation(method)
                .ok_or_else(|| ManagementError::NoSuchOperation {
                    operation: method.to_string(),
                })?;
        expect_arity(method, args, operation.params.len())?;
        let open_args = operation
            .params
            .iter()
            .zip(args)
            .map(|(param, arg)| json_to_open(arg, &param.open_type))
            .collect::<Result<Vec<_>>>()?;

        let value = self
            .connection
            .invoke(&self.name, &operation.name, &open_args)
            .await?;
        received(&value, &operation.returns)
    }
}

impl std::fmt::Debug for Proxy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Proxy")
            .field("name", &self.name)
            .field("info", &self.info)
            .finish_non_exhaustive()
    }
}

fn expect_arity(method: &str, args: &[Value], expected: usize) -> Result<()> {
    if args.len() != expected {
        return Err(ManagementError::ArityMismatch {
            operation: method.to_string(),
            expected,
            actual: args.len(),
        });
    }
    Ok(())
}

fn single_arg(method: &str, args: &[Value], declared: &OpenType) -> Result<OpenValue> {
    expect_arity(method, args, 1)?;
    json_to_open(&args[0], declared)
}

fn received<R: DeserializeOwned>(value: &OpenValue, declared: &OpenType) -> Result<R> {
    let projected = value.project(declared)?;
    from_open(&projected, declared)
}
