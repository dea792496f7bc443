//! Open type definitions.

use super::value::OpenValue;
use crate::{ManagementError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

/// Scalar open types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SimpleType {
    /// Return type of setters and of operations without a result.
    Void,
    Boolean,
    Int8,
    Int16,
    Int32,
    Int64,
    Float32,
    Float64,
    Char,
    String,
    ObjectName,
}

impl SimpleType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SimpleType::Void => "void",
            SimpleType::Boolean => "boolean",
            SimpleType::Int8 => "int8",
            SimpleType::Int16 => "int16",
            SimpleType::Int32 => "int32",
            SimpleType::Int64 => "int64",
            SimpleType::Float32 => "float32",
            SimpleType::Float64 => "float64",
            SimpleType::Char => "char",
            SimpleType::String => "string",
            SimpleType::ObjectName => "object_name",
        }
    }
}

/// The closed set of portable value kinds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "type", rename_all = "snake_case")]
pub enum OpenType {
    Simple(SimpleType),
    /// Enumerated symbol drawn from a fixed set.
    Enum(Arc<EnumType>),
    Array(Box<OpenType>),
    Composite(Arc<CompositeType>),
    Tabular(Arc<TabularType>),
}

impl OpenType {
    pub const VOID: OpenType = OpenType::Simple(SimpleType::Void);
    pub const BOOLEAN: OpenType = OpenType::Simple(SimpleType::Boolean);
    pub const INT8: OpenType = OpenType::Simple(SimpleType::Int8);
    pub const INT16: OpenType = OpenType::Simple(SimpleType::Int16);
    pub const INT32: OpenType = OpenType::Simple(SimpleType::Int32);
    pub const INT64: OpenType = OpenType::Simple(SimpleType::Int64);
    pub const FLOAT32: OpenType = OpenType::Simple(SimpleType::Float32);
    pub const FLOAT64: OpenType = OpenType::Simple(SimpleType::Float64);
    pub const CHAR: OpenType = OpenType::Simple(SimpleType::Char);
    pub const STRING: OpenType = OpenType::Simple(SimpleType::String);
    pub const OBJECT_NAME: OpenType = OpenType::Simple(SimpleType::ObjectName);

    /// Array whose elements all have `element` type.
    pub fn array(element: OpenType) -> Self {
        OpenType::Array(Box::new(element))
    }

    pub fn is_void(&self) -> bool {
        matches!(self, OpenType::Simple(SimpleType::Void))
    }

    /// Scalars (other than void) and enums can serve as tabular index fields.
    pub fn is_scalar(&self) -> bool {
        match self {
            OpenType::Simple(simple) => *simple != SimpleType::Void,
            OpenType::Enum(_) => true,
            _ => false,
        }
    }

    /// Check whether `value` is a value of this type.
    pub fn is_value(&self, value: &OpenValue) -> bool {
        match (self, value) {
            (OpenType::Simple(simple), value) => matches!(
                (simple, value),
                (SimpleType::Void, OpenValue::Void)
                    | (SimpleType::Boolean, OpenValue::Boolean(_))
                    | (SimpleType::Int8, OpenValue::Int8(_))
                    | (SimpleType::Int16, OpenValue::Int16(_))
                    | (SimpleType::Int32, OpenValue::Int32(_))
                    | (SimpleType::Int64, OpenValue::Int64(_))
                    | (SimpleType::Float32, OpenValue::Float32(_))
                    | (SimpleType::Float64, OpenValue::Float64(_))
                    | (SimpleType::Char, OpenValue::Char(_))
                    | (SimpleType::String, OpenValue::String(_))
                    | (SimpleType::ObjectName, OpenValue::ObjectName(_))
            ),
            (OpenType::Enum(enum_type), OpenValue::Enum(symbol)) => enum_type.contains(symbol),
            (OpenType::Array(element), OpenValue::Array(items)) => {
                items.iter().all(|item| element.is_value(item))
            }
            (OpenType::Composite(expected), OpenValue::Composite(data)) => {
                Arc::ptr_eq(expected, data.composite_type()) || **expected == **data.composite_type()
            }
            (OpenType::Tabular(expected), OpenValue::Tabular(data)) => {
                Arc::ptr_eq(expected, data.tabular_type()) || **expected == **data.tabular_type()
            }
            _ => false,
        }
    }
}

impl fmt::Display for OpenType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OpenType::Simple(simple) => f.write_str(simple.as_str()),
            OpenType::Enum(enum_type) => write!(f, "enum {}", enum_type.name),
            OpenType::Array(element) => write!(f, "array<{}>", element),
            OpenType::Composite(composite) => write!(f, "composite {}", composite.name),
            OpenType::Tabular(tabular) => write!(f, "tabular {}", tabular.name),
        }
    }
}

impl From<SimpleType> for OpenType {
    fn from(simple: SimpleType) -> Self {
        OpenType::Simple(simple)
    }
}

impl From<Arc<CompositeType>> for OpenType {
    fn from(composite: Arc<CompositeType>) -> Self {
        OpenType::Composite(composite)
    }
}

impl From<Arc<TabularType>> for OpenType {
    fn from(tabular: Arc<TabularType>) -> Self {
        OpenType::Tabular(tabular)
    }
}

impl From<Arc<EnumType>> for OpenType {
    fn from(enum_type: Arc<EnumType>) -> Self {
        OpenType::Enum(enum_type)
    }
}

/// A named set of symbols.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "EnumTypeWire")]
pub struct EnumType {
    pub name: String,
    pub symbols: Vec<String>,
}

impl EnumType {
    /// Create an enum type. Symbols must be non-empty and unique.
    pub fn new<S: Into<String>>(
        name: impl Into<String>,
        symbols: impl IntoIterator<Item = S>,
    ) -> Result<Arc<Self>> {
        let symbols = symbols.into_iter().map(Into::into).collect();
        Self::validated(name.into(), symbols).map(Arc::new)
    }

    fn validated(name: String, symbols: Vec<String>) -> Result<Self> {
        if symbols.is_empty() {
            return Err(ManagementError::invalid_argument(
                "symbols",
                format!("enum {} has no symbols", name),
            ));
        }
        let mut seen = HashSet::new();
        if let Some(dup) = symbols.iter().find(|s| !seen.insert(s.as_str())) {
            return Err(ManagementError::invalid_argument(
                "symbols",
                format!("enum {} repeats symbol {}", name, dup),
            ));
        }
        Ok(Self { name, symbols })
    }

    pub fn contains(&self, symbol: &str) -> bool {
        self.symbols.iter().any(|s| s == symbol)
    }
}

/// One named, typed field of a composite type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldType {
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    pub open_type: OpenType,
}

/// A record type with a fixed, ordered set of named fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "CompositeTypeWire")]
pub struct CompositeType {
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    fields: Vec<FieldType>,
}

impl CompositeType {
    /// Start building a composite type.
    pub fn builder(name: impl Into<String>) -> CompositeTypeBuilder {
        CompositeTypeBuilder {
            name: name.into(),
            description: String::new(),
            fields: Vec::new(),
        }
    }

    /// Fields in declaration order.
    pub fn fields(&self) -> &[FieldType] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&FieldType> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn field_index(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.field(name).is_some()
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|f| f.name.as_str())
    }
}

/// Fluent builder for [`CompositeType`].
#[derive(Debug)]
pub struct CompositeTypeBuilder {
    name: String,
    description: String,
    fields: Vec<FieldType>,
}

impl CompositeTypeBuilder {
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Add a field.
    pub fn field(self, name: impl Into<String>, open_type: impl Into<OpenType>) -> Self {
        self.described_field(name, "", open_type)
    }

    /// Add a field with a description.
    pub fn described_field(
        mut self,
        name: impl Into<String>,
        description: impl Into<String>,
        open_type: impl Into<OpenType>,
    ) -> Self {
        self.fields.push(FieldType {
            name: name.into(),
            description: description.into(),
            open_type: open_type.into(),
        });
        self
    }

    /// Validate and build.
    ///
    /// Fails if the type has no fields, a field name repeats, or a field is void.
    pub fn build(self) -> Result<Arc<CompositeType>> {
        self.validated().map(Arc::new)
    }

    fn validated(self) -> Result<CompositeType> {
        if self.fields.is_empty() {
            return Err(ManagementError::invalid_argument(
                "fields",
                format!("composite {} has no fields", self.name),
            ));
        }
        let mut seen = HashSet::new();
        for field in &self.fields {
            if field.name.is_empty() {
                return Err(ManagementError::invalid_argument(
                    "fields",
                    format!("composite {} has an unnamed field", self.name),
                ));
            }
            if !seen.insert(field.name.as_str()) {
                return Err(ManagementError::invalid_argument(
                    "fields",
                    format!("composite {} repeats field {}", self.name, field.name),
                ));
            }
            if field.open_type.is_void() {
                return Err(ManagementError::invalid_argument(
                    "fields",
                    format!("field {}.{} cannot be void", self.name, field.name),
                ));
            }
        }
        Ok(CompositeType {
            name: self.name,
            description: self.description,
            fields: self.fields,
        })
    }
}

/// A collection of composite rows indexed by a subset of their fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "TabularTypeWire")]
pub struct TabularType {
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    row_type: Arc<CompositeType>,
    index: Vec<String>,
}

impl TabularType {
    /// Create a tabular type.
    ///
    /// Every index field must exist in `row_type` and be a scalar.
    pub fn new<S: Into<String>>(
        name: impl Into<String>,
        row_type: Arc<CompositeType>,
        index: impl IntoIterator<Item = S>,
    ) -> Result<Arc<Self>> {
        let index = index.into_iter().map(Into::into).collect();
        Self::validated(name.into(), String::new(), row_type, index).map(Arc::new)
    }

    fn validated(
        name: String,
        description: String,
        row_type: Arc<CompositeType>,
        index: Vec<String>,
    ) -> Result<Self> {
        if index.is_empty() {
            return Err(ManagementError::invalid_argument(
                "index",
                format!("tabular {} has no index fields", name),
            ));
        }
        let mut seen = HashSet::new();
        for key in &index {
            if !seen.insert(key.as_str()) {
                return Err(ManagementError::invalid_argument(
                    "index",
                    format!("tabular {} repeats index field {}", name, key),
                ));
            }
            match row_type.field(key) {
                Some(field) if field.open_type.is_scalar() => {}
                Some(_) => {
                    return Err(ManagementError::invalid_argument(
                        "index",
                        format!("index field {}.{} is not a scalar", name, key),
                    ))
                }
                None => {
                    return Err(ManagementError::invalid_argument(
                        "index",
                        format!("index field {} is not a field of {}", key, row_type.name),
                    ))
                }
            }
        }
        Ok(Self {
            name,
            description,
            row_type,
            index,
        })
    }

    pub fn row_type(&self) -> &Arc<CompositeType> {
        &self.row_type
    }

    /// Names of the fields that form the unique row key.
    pub fn index(&self) -> &[String] {
        &self.index
    }
}

// Decoded types go through the same checks as constructed ones.

#[derive(Deserialize)]
struct EnumTypeWire {
    name: String,
    symbols: Vec<String>,
}

impl TryFrom<EnumTypeWire> for EnumType {
    type Error = ManagementError;

    fn try_from(wire: EnumTypeWire) -> Result<Self> {
        EnumType::validated(wire.name, wire.symbols)
    }
}

#[derive(Deserialize)]
struct CompositeTypeWire {
    name: String,
    #[serde(default)]
    description: String,
    fields: Vec<FieldType>,
}

impl TryFrom<CompositeTypeWire> for CompositeType {
    type Error = ManagementError;

    fn try_from(wire: CompositeTypeWire) -> Result<Self> {
        CompositeTypeBuilder {
            name: wire.name,
            description: wire.description,
            fields: wire.fields,
        }
        .validated()
    }
}

#[derive(Deserialize)]
struct TabularTypeWire {
    name: String,
    #[serde(default)]
    description: String,
    row_type: Arc<CompositeType>,
    index: Vec<String>,
}

impl TryFrom<TabularTypeWire> for TabularType {
    type Error = ManagementError;

    fn try_from(wire: TabularTypeWire) -> Result<Self> {
        TabularType::validated(wire.name, wire.description, wire.row_type, wire.index)
    }
}
