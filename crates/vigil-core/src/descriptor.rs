//! Managed object descriptors.
//!
//! A managed object (or a typed interface used to build a proxy) declares its
//! methods as a list of [`MethodSignature`]s. [`ManagedObjectInfo::derive`]
//! turns that list into attributes and operations with a naming convention:
//!
//! | Method shape                                  | Result                         |
//! |-----------------------------------------------|--------------------------------|
//! | `get_foo_bar()` returning a non-void type     | readable attribute `FooBar`    |
//! | `is_foo_bar()` returning boolean              | readable attribute `FooBar`    |
//! | `set_foo_bar(value)` returning void           | writable attribute `FooBar`    |
//! | anything else                                 | operation named after the method |

use crate::open_type::OpenType;
use crate::{ManagementError, Result};
use heck::ToUpperCamelCase;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

/// A named, typed method parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterInfo {
    pub name: String,
    pub open_type: OpenType,
}

/// The declared shape of one method.
#[derive(Debug, Clone, PartialEq)]
pub struct MethodSignature {
    pub name: String,
    pub params: Vec<ParameterInfo>,
    pub returns: OpenType,
}

impl MethodSignature {
    /// A no-argument method returning `returns`.
    pub fn getter(name: impl Into<String>, returns: OpenType) -> Self {
        Self {
            name: name.into(),
            params: Vec::new(),
            returns,
        }
    }

    /// A one-argument method returning void.
    pub fn setter(name: impl Into<String>, value: OpenType) -> Self {
        Self {
            name: name.into(),
            params: vec![ParameterInfo {
                name: "value".to_string(),
                open_type: value,
            }],
            returns: OpenType::VOID,
        }
    }

    /// Any method; add parameters with [`param`](Self::param).
    pub fn operation(name: impl Into<String>, returns: OpenType) -> Self {
        Self::getter(name, returns)
    }

    pub fn param(mut self, name: impl Into<String>, open_type: OpenType) -> Self {
        self.params.push(ParameterInfo {
            name: name.into(),
            open_type,
        });
        self
    }
}

/// A readable and/or writable attribute.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributeInfo {
    pub name: String,
    pub open_type: OpenType,
    pub readable: bool,
    pub writable: bool,
    /// Read through an `is_` accessor.
    #[serde(default)]
    pub is_getter: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub getter: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub setter: Option<String>,
}

/// An invokable operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationInfo {
    pub name: String,
    pub params: Vec<ParameterInfo>,
    pub returns: OpenType,
}

/// Attributes and operations of one managed object.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ManagedObjectInfo {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    pub attributes: Vec<AttributeInfo>,
    pub operations: Vec<OperationInfo>,
}

enum Accessor {
    Get { attribute: String, is: bool },
    Set { attribute: String },
    Operation,
}

fn classify(method: &MethodSignature) -> Accessor {
    let attribute = |rest: &str| rest.to_upper_camel_case();

    if let Some(rest) = method.name.strip_prefix("get_") {
        if !rest.is_empty() && method.params.is_empty() && !method.returns.is_void() {
            return Accessor::Get {
                attribute: attribute(rest),
                is: false,
            };
        }
    }
    if let Some(rest) = method.name.strip_prefix("is_") {
        if !rest.is_empty() && method.params.is_empty() && method.returns == OpenType::BOOLEAN {
            return Accessor::Get {
                attribute: attribute(rest),
                is: true,
            };
        }
    }
    if let Some(rest) = method.name.strip_prefix("set_") {
        if !rest.is_empty() && method.params.len() == 1 && method.returns.is_void() {
            return Accessor::Set {
                attribute: attribute(rest),
            };
        }
    }
    Accessor::Operation
}

impl ManagedObjectInfo {
    /// Derive attributes and operations from declared methods.
    ///
    /// Fails with `DuplicateName` if two methods define the same attribute
    /// accessor or operation (including a vendor extension colliding with an
    /// existing attribute), and with `NotManageable` if nothing is exposed or
    /// a setter's type disagrees with its getter.
    pub fn derive(methods: &[MethodSignature]) -> Result<Self> {
        let mut seen_methods = HashSet::new();
        let mut order: Vec<String> = Vec::new();
        let mut getters: BTreeMap<String, (&MethodSignature, bool)> = BTreeMap::new();
        let mut setters: BTreeMap<String, &MethodSignature> = BTreeMap::new();
        let mut operations = Vec::new();

        for method in methods {
            if method.name.is_empty() {
                return Err(ManagementError::NotManageable {
                    reason: "method with an empty name".to_string(),
                });
            }
            if !seen_methods.insert(method.name.as_str()) {
                return Err(ManagementError::DuplicateName {
                    name: method.name.clone(),
                });
            }

            match classify(method) {
                Accessor::Get { attribute, is } => {
                    if getters.contains_key(&attribute) {
                        return Err(ManagementError::DuplicateName { name: attribute });
                    }
                    if !setters.contains_key(&attribute) {
                        order.push(attribute.clone());
                    }
                    getters.insert(attribute, (method, is));
                }
                Accessor::Set { attribute } => {
                    if setters.contains_key(&attribute) {
                        return Err(ManagementError::DuplicateName { name: attribute });
                    }
                    if !getters.contains_key(&attribute) {
                        order.push(attribute.clone());
                    }
                    setters.insert(attribute, method);
                }
                Accessor::Operation => operations.push(OperationInfo {
                    name: method.name.clone(),
                    params: method.params.clone(),
                    returns: method.returns.clone(),
                }),
            }
        }

        let mut attributes = Vec::with_capacity(order.len());
        for name in order {
            let getter = getters.get(&name);
            let setter = setters.get(&name);
            let open_type = match (getter, setter) {
                (Some((get, _)), Some(set)) => {
                    let written = &set.params[0].open_type;
                    if *written != get.returns {
                        return Err(ManagementError::NotManageable {
                            reason: format!(
                                "attribute {} is read as {} but written as {}",
                                name, get.returns, written
                            ),
                        });
                    }
                    get.returns.clone()
                }
                (Some((get, _)), None) => get.returns.clone(),
                (None, Some(set)) => set.params[0].open_type.clone(),
                (None, None) => continue,
            };
            attributes.push(AttributeInfo {
                open_type,
                readable: getter.is_some(),
                writable: setter.is_some(),
                is_getter: getter.map(|(_, is)| *is).unwrap_or(false),
                getter: getter.map(|(m, _)| m.name.clone()),
                setter: setter.map(|m| m.name.clone()),
                name,
            });
        }

        if attributes.is_empty() && operations.is_empty() {
            return Err(ManagementError::NotManageable {
                reason: "no attributes or operations are exposed".to_string(),
            });
        }

        Ok(Self {
            description: String::new(),
            attributes,
            operations,
        })
    }

    /// Attach a human-readable description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn attribute(&self, name: &str) -> Option<&AttributeInfo> {
        self.attributes.iter().find(|a| a.name == name)
    }

    pub fn operation(&self, name: &str) -> Option<&OperationInfo> {
        self.operations.iter().find(|o| o.name == name)
    }

    /// Find the attribute accessed by a getter or setter method.
    pub(crate) fn attribute_for_method(&self, method: &str) -> Option<(&AttributeInfo, bool)> {
        self.attributes.iter().find_map(|a| {
            if a.getter.as_deref() == Some(method) {
                Some((a, false))
            } else if a.setter.as_deref() == Some(method) {
                Some((a, true))
            } else {
                None
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn memory_methods() -> Vec<MethodSignature> {
        vec![
            MethodSignature::getter("get_used", OpenType::INT64),
            MethodSignature::getter("is_verbose", OpenType::BOOLEAN),
            MethodSignature::setter("set_verbose", OpenType::BOOLEAN),
            MethodSignature::operation("refresh", OpenType::VOID),
            MethodSignature::operation("reset_peak", OpenType::INT64).param("pool", OpenType::STRING),
        ]
    }

    #[test]
    fn test_derive_attributes_and_operations() {
        let info = ManagedObjectInfo::derive(&memory_methods()).unwrap();

        let used = info.attribute("Used").unwrap();
        assert!(used.readable);
        assert!(!used.writable);
        assert_eq!(used.open_type, OpenType::INT64);
        assert_eq!(used.getter.as_deref(), Some("get_used"));

        let verbose = info.attribute("Verbose").unwrap();
        assert!(verbose.readable && verbose.writable && verbose.is_getter);

        assert_eq!(info.operations.len(), 2);
        assert_eq!(info.operation("reset_peak").unwrap().params.len(), 1);
        assert!(info.operation("get_used").is_none());
    }

    #[test]
    fn test_snake_case_becomes_upper_camel_attribute() {
        let info = ManagedObjectInfo::derive(&[MethodSignature::getter(
            "get_heap_memory_usage",
            OpenType::INT64,
        )])
        .unwrap();
        assert!(info.attribute("HeapMemoryUsage").is_some());
    }

    #[test]
    fn test_non_accessor_shapes_are_operations() {
        let info = ManagedObjectInfo::derive(&[
            // getter with a parameter
            MethodSignature::operation("get_thread_info", OpenType::STRING)
                .param("id", OpenType::INT64),
            // is_ not returning boolean
            MethodSignature::getter("is_count", OpenType::INT32),
            // setter returning a value
            MethodSignature::operation("set_level", OpenType::INT32).param("level", OpenType::INT32),
        ])
        .unwrap();
        assert!(info.attributes.is_empty());
        assert_eq!(info.operations.len(), 3);
    }

    #[test]
    fn test_write_only_attribute() {
        let info =
            ManagedObjectInfo::derive(&[MethodSignature::setter("set_level", OpenType::INT32)])
                .unwrap();
        let level = info.attribute("Level").unwrap();
        assert!(!level.readable);
        assert!(level.writable);
    }

    #[test]
    fn test_empty_interface_not_manageable() {
        assert!(matches!(
            ManagedObjectInfo::derive(&[]),
            Err(ManagementError::NotManageable { .. })
        ));
    }

    #[test]
    fn test_setter_type_must_match_getter() {
        let result = ManagedObjectInfo::derive(&[
            MethodSignature::getter("get_level", OpenType::INT32),
            MethodSignature::setter("set_level", OpenType::STRING),
        ]);
        assert!(matches!(result, Err(ManagementError::NotManageable { .. })));
    }

    #[test]
    fn test_colliding_attribute_rejected() {
        // A vendor getter that maps onto an existing attribute name.
        let result = ManagedObjectInfo::derive(&[
            MethodSignature::getter("is_verbose", OpenType::BOOLEAN),
            MethodSignature::getter("get_verbose", OpenType::BOOLEAN),
        ]);
        match result {
            Err(ManagementError::DuplicateName { name }) => assert_eq!(name, "Verbose"),
            other => panic!("Expected DuplicateName, got: {:?}", other),
        }

        let result = ManagedObjectInfo::derive(&[
            MethodSignature::operation("gc", OpenType::VOID),
            MethodSignature::operation("gc", OpenType::VOID),
        ]);
        assert!(matches!(result, Err(ManagementError::DuplicateName { .. })));
    }

    #[test]
    fn test_derive_is_idempotent() {
        let first = ManagedObjectInfo::derive(&memory_methods()).unwrap();
        let second = ManagedObjectInfo::derive(&memory_methods()).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_attribute_for_method() {
        let info = ManagedObjectInfo::derive(&memory_methods()).unwrap();
        let (attr, is_setter) = info.attribute_for_method("set_verbose").unwrap();
        assert_eq!(attr.name, "Verbose");
        assert!(is_setter);
        assert!(info.attribute_for_method("refresh").is_none());
    }
}
