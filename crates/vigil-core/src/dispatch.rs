//! Access dispatcher: uniform get/set/invoke over the registry.
//!
//! Every operation resolves the name through the [`Registry`] first, checks
//! the request against the descriptor derived at registration, and only then
//! calls into the managed object. Values cross this boundary as
//! [`OpenValue`]s in both directions.

use crate::descriptor::{AttributeInfo, ManagedObjectInfo, OperationInfo};
use crate::open_type::{json_to_open, open_to_json, OpenType, OpenValue};
use crate::registry::{Registry, RegistryEntry};
use crate::{ManagementError, ObjectName, Result};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tracing::{trace, warn};

/// Gateway for attribute access and operation invocation.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    registry: Arc<Registry>,
}

impl Dispatcher {
    pub fn new(registry: Arc<Registry>) -> Self {
        Self { registry }
    }

    /// The registry this dispatcher resolves names against.
    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    /// Read one attribute.
    pub fn get_attribute(&self, name: &ObjectName, attribute: &str) -> Result<OpenValue> {
        require_member("attribute", attribute)?;
        let entry = self.registry.lookup(name)?;
        read_attribute(&entry, attribute)
    }

    /// Write one attribute.
    ///
    /// The value is checked against the declared type before the setter runs,
    /// so a rejected value leaves the object untouched.
    pub fn set_attribute(&self, name: &ObjectName, attribute: &str, value: &OpenValue) -> Result<()> {
        require_member("attribute", attribute)?;
        let entry = self.registry.lookup(name)?;
        let info = find_attribute(&entry, attribute)?;
        let setter = match (&info.setter, info.writable) {
            (Some(setter), true) => setter,
            _ => {
                return Err(ManagementError::NotWritable {
                    attribute: attribute.to_string(),
                })
            }
        };

        let native = open_to_json(value, &info.open_type)?;
        trace!("{}: set {}", name, attribute);
        call_native(&entry, setter, &[native])?;
        Ok(())
    }

    /// Read several attributes of one object.
    ///
    /// Only a failure to resolve `name` fails the whole call. Each requested
    /// attribute gets its own slot holding either its value or the error that
    /// reading it produced.
    pub fn get_attributes(
        &self,
        name: &ObjectName,
        attributes: &[String],
    ) -> Result<BTreeMap<String, Result<OpenValue>>> {
        let entry = self.registry.lookup(name)?;
        let mut slots = BTreeMap::new();
        for attribute in attributes {
            let slot = require_member("attribute", attribute)
                .and_then(|_| read_attribute(&entry, attribute));
            if let Err(e) = &slot {
                warn!("{}: attribute {} unavailable: {}", name, attribute, e);
            }
            slots.insert(attribute.clone(), slot);
        }
        Ok(slots)
    }

    /// Invoke an operation with ordered arguments.
    ///
    /// Arity and argument types are checked before the managed object is
    /// called.
    pub fn invoke(&self, name: &ObjectName, operation: &str, args: &[OpenValue]) -> Result<OpenValue> {
        require_member("operation", operation)?;
        let entry = self.registry.lookup(name)?;
        let info = find_operation(&entry, operation)?;

        if args.len() != info.params.len() {
            return Err(ManagementError::ArityMismatch {
                operation: operation.to_string(),
                expected: info.params.len(),
                actual: args.len(),
            });
        }

        let native_args = info
            .params
            .iter()
            .zip(args)
            .map(|(param, arg)| {
                open_to_json(arg, &param.open_type).map_err(|e| {
                    ManagementError::shape(format!(
                        "argument {} of {}: {}",
                        param.name,
                        operation,
                        inner_message(e)
                    ))
                })
            })
            .collect::<Result<Vec<Value>>>()?;

        trace!("{}: invoke {}", name, operation);
        let result = call_native(&entry, operation, &native_args)?;
        native_result(&result, &info.returns)
    }

    /// Descriptor of a registered object.
    pub fn get_info(&self, name: &ObjectName) -> Result<ManagedObjectInfo> {
        Ok(self.registry.lookup(name)?.info().as_ref().clone())
    }

    pub fn query_names(&self, pattern: Option<&ObjectName>) -> Result<BTreeSet<ObjectName>> {
        self.registry.query_names(pattern)
    }

    pub fn is_registered(&self, name: &ObjectName) -> Result<bool> {
        self.registry.is_registered(name)
    }

    pub fn domains(&self) -> Result<Vec<String>> {
        self.registry.domains()
    }

    pub fn object_count(&self) -> Result<usize> {
        self.registry.object_count()
    }
}

fn require_member(field: &str, member: &str) -> Result<()> {
    if member.is_empty() {
        return Err(ManagementError::invalid_argument(
            field,
            format!("{} name is empty", field),
        ));
    }
    Ok(())
}

fn find_attribute<'a>(entry: &'a RegistryEntry, attribute: &str) -> Result<&'a AttributeInfo> {
    entry
        .info()
        .attribute(attribute)
        .ok_or_else(|| ManagementError::NoSuchAttribute {
            attribute: attribute.to_string(),
        })
}

fn find_operation<'a>(entry: &'a RegistryEntry, operation: &str) -> Result<&'a OperationInfo> {
    entry
        .info()
        .operation(operation)
        .ok_or_else(|| ManagementError::NoSuchOperation {
            operation: operation.to_string(),
        })
}

fn read_attribute(entry: &RegistryEntry, attribute: &str) -> Result<OpenValue> {
    let info = find_attribute(entry, attribute)?;
    let getter = match (&info.getter, info.readable) {
        (Some(getter), true) => getter,
        _ => {
            return Err(ManagementError::NotReadable {
                attribute: attribute.to_string(),
            })
        }
    };
    let result = call_native(entry, getter, &[])?;
    native_result(&result, &info.open_type)
}

/// Call into the managed object. Whatever it fails with is reported as
/// `InvocationFailed`, so a native error never reads as a registry error.
fn call_native(entry: &RegistryEntry, method: &str, args: &[Value]) -> Result<Value> {
    entry.object().call(method, args).map_err(|e| match e {
        ManagementError::InvocationFailed { .. } => e,
        other => ManagementError::invocation(method, other.to_string()),
    })
}

fn native_result(result: &Value, declared: &OpenType) -> Result<OpenValue> {
    if declared.is_void() {
        return Ok(OpenValue::Void);
    }
    json_to_open(result, declared)
}

fn inner_message(err: ManagementError) -> String {
    match err {
        ManagementError::ShapeMismatch { message } => message,
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::MethodSignature;
    use crate::object::{arg, native, unknown_method, ManagedObject};
    use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
    use std::sync::Mutex;

    #[derive(Default)]
    struct Gauge {
        value: AtomicI64,
        label: Mutex<String>,
        invoked: AtomicBool,
    }

    impl ManagedObject for Gauge {
        fn methods(&self) -> Vec<MethodSignature> {
            vec![
                MethodSignature::getter("get_value", OpenType::INT64),
                MethodSignature::setter("set_value", OpenType::INT64),
                MethodSignature::getter("get_label", OpenType::STRING),
                MethodSignature::setter("set_secret", OpenType::STRING),
                MethodSignature::getter("get_broken", OpenType::INT32),
                MethodSignature::getter("get_stale", OpenType::INT32),
                MethodSignature::operation("recalibrate", OpenType::VOID),
                MethodSignature::operation("add", OpenType::INT64).param("delta", OpenType::INT64),
                MethodSignature::operation("reset", OpenType::VOID),
            ]
        }

        fn call(&self, method: &str, args: &[Value]) -> Result<Value> {
            match method {
                "get_value" => native(&self.value.load(Ordering::SeqCst)),
                "set_value" => {
                    self.value.store(arg(args, 0)?, Ordering::SeqCst);
                    native(&())
                }
                "get_label" => native(&*self.label.lock().unwrap()),
                "set_secret" => native(&()),
                "get_broken" => Err(ManagementError::invocation("get_broken", "sensor offline")),
                "get_stale" => Err(ManagementError::NotFound {
                    name: "other:type=Gone".to_string(),
                }),
                "recalibrate" => Err(ManagementError::NoSuchAttribute {
                    attribute: "Inner".to_string(),
                }),
                "add" => {
                    self.invoked.store(true, Ordering::SeqCst);
                    let delta: i64 = arg(args, 0)?;
                    native(&(self.value.fetch_add(delta, Ordering::SeqCst) + delta))
                }
                "reset" => {
                    self.invoked.store(true, Ordering::SeqCst);
                    self.value.store(0, Ordering::SeqCst);
                    native(&())
                }
                other => Err(unknown_method(other)),
            }
        }
    }

    fn setup() -> (Dispatcher, Arc<Gauge>, ObjectName) {
        let registry = Arc::new(Registry::new());
        let gauge = Arc::new(Gauge::default());
        gauge.value.store(100, Ordering::SeqCst);
        *gauge.label.lock().unwrap() = "heap".to_string();
        let name: ObjectName = "dom:type=Gauge".parse().unwrap();
        registry.register(name.clone(), gauge.clone()).unwrap();
        (Dispatcher::new(registry), gauge, name)
    }

    #[test]
    fn test_get_attribute() {
        let (dispatcher, _, name) = setup();
        assert_eq!(
            dispatcher.get_attribute(&name, "Value").unwrap(),
            OpenValue::Int64(100)
        );
        assert_eq!(
            dispatcher.get_attribute(&name, "Label").unwrap(),
            OpenValue::String("heap".to_string())
        );
    }

    #[test]
    fn test_get_attribute_errors() {
        let (dispatcher, _, name) = setup();
        assert!(matches!(
            dispatcher.get_attribute(&name, "Missing"),
            Err(ManagementError::NoSuchAttribute { .. })
        ));
        assert!(matches!(
            dispatcher.get_attribute(&name, "Secret"),
            Err(ManagementError::NotReadable { .. })
        ));
        assert!(matches!(
            dispatcher.get_attribute(&name, ""),
            Err(ManagementError::InvalidArgument { .. })
        ));

        let absent: ObjectName = "dom:type=Absent".parse().unwrap();
        assert!(matches!(
            dispatcher.get_attribute(&absent, "Value"),
            Err(ManagementError::NotFound { .. })
        ));
    }

    #[test]
    fn test_read_after_write() {
        let (dispatcher, _, name) = setup();
        dispatcher
            .set_attribute(&name, "Value", &OpenValue::Int64(250))
            .unwrap();
        assert_eq!(
            dispatcher.get_attribute(&name, "Value").unwrap(),
            OpenValue::Int64(250)
        );
    }

    #[test]
    fn test_set_attribute_errors_leave_state_unchanged() {
        let (dispatcher, gauge, name) = setup();
        assert!(matches!(
            dispatcher.set_attribute(&name, "Label", &OpenValue::String("x".into())),
            Err(ManagementError::NotWritable { .. })
        ));
        assert!(matches!(
            dispatcher.set_attribute(&name, "Value", &OpenValue::String("x".into())),
            Err(ManagementError::ShapeMismatch { .. })
        ));
        assert_eq!(gauge.value.load(Ordering::SeqCst), 100);
    }

    #[test]
    fn test_get_attributes_partial_success() {
        let (dispatcher, _, name) = setup();
        let requested = vec![
            "Value".to_string(),
            "Broken".to_string(),
            "Secret".to_string(),
            "Missing".to_string(),
        ];
        let slots = dispatcher.get_attributes(&name, &requested).unwrap();

        assert_eq!(slots.len(), 4);
        assert_eq!(slots["Value"], Ok(OpenValue::Int64(100)));
        assert!(matches!(
            slots["Broken"],
            Err(ManagementError::InvocationFailed { .. })
        ));
        assert!(matches!(
            slots["Secret"],
            Err(ManagementError::NotReadable { .. })
        ));
        assert!(matches!(
            slots["Missing"],
            Err(ManagementError::NoSuchAttribute { .. })
        ));
    }

    #[test]
    fn test_invoke() {
        let (dispatcher, _, name) = setup();
        assert_eq!(
            dispatcher
                .invoke(&name, "add", &[OpenValue::Int64(5)])
                .unwrap(),
            OpenValue::Int64(105)
        );
        assert_eq!(dispatcher.invoke(&name, "reset", &[]).unwrap(), OpenValue::Void);
        assert_eq!(
            dispatcher.get_attribute(&name, "Value").unwrap(),
            OpenValue::Int64(0)
        );
    }

    #[test]
    fn test_invoke_checks_before_native_call() {
        let (dispatcher, gauge, name) = setup();

        let arity = dispatcher.invoke(&name, "add", &[]);
        match arity {
            Err(ManagementError::ArityMismatch {
                expected, actual, ..
            }) => {
                assert_eq!(expected, 1);
                assert_eq!(actual, 0);
            }
            other => panic!("Expected ArityMismatch, got: {:?}", other),
        }

        let shape = dispatcher.invoke(&name, "add", &[OpenValue::Boolean(true)]);
        assert!(matches!(shape, Err(ManagementError::ShapeMismatch { .. })));

        assert!(!gauge.invoked.load(Ordering::SeqCst));
    }

    #[test]
    fn test_invoke_unknown_operation() {
        let (dispatcher, _, name) = setup();
        assert!(matches!(
            dispatcher.invoke(&name, "get_value", &[]),
            Err(ManagementError::NoSuchOperation { .. })
        ));
    }

    #[test]
    fn test_get_info() {
        let (dispatcher, _, name) = setup();
        let info = dispatcher.get_info(&name).unwrap();
        assert_eq!(info.attributes.len(), 5);
        assert!(info.operation("add").is_some());
    }

    #[test]
    fn test_native_errors_are_reported_as_invocation_failures() {
        let (dispatcher, _, name) = setup();

        match dispatcher.get_attribute(&name, "Stale") {
            Err(ManagementError::InvocationFailed { target, message }) => {
                assert_eq!(target, "get_stale");
                assert!(message.contains("other:type=Gone"));
            }
            other => panic!("Expected InvocationFailed, got: {:?}", other),
        }
        assert!(matches!(
            dispatcher.invoke(&name, "recalibrate", &[]),
            Err(ManagementError::InvocationFailed { .. })
        ));

        // Already-wrapped failures keep their own target.
        match dispatcher.get_attribute(&name, "Broken") {
            Err(ManagementError::InvocationFailed { target, message }) => {
                assert_eq!(target, "get_broken");
                assert_eq!(message, "sensor offline");
            }
            other => panic!("Expected InvocationFailed, got: {:?}", other),
        }
    }
}
