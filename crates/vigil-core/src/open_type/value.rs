//! Open values: composite records, tabular collections and scalars.

use super::types::{CompositeType, OpenType, TabularType};
use crate::{ManagementError, ObjectName, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

/// A value of exactly one open type kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum OpenValue {
    Void,
    Boolean(bool),
    Int8(i8),
    Int16(i16),
    Int32(i32),
    Int64(i64),
    Float32(#[serde(with = "super::native::wire_f32")] f32),
    Float64(#[serde(with = "super::native::wire_f64")] f64),
    Char(char),
    String(String),
    ObjectName(ObjectName),
    Enum(String),
    Array(Vec<OpenValue>),
    Composite(CompositeData),
    Tabular(TabularData),
}

impl OpenValue {
    /// Short name of the value's kind, for diagnostics.
    pub fn kind_name(&self) -> &'static str {
        match self {
            OpenValue::Void => "void",
            OpenValue::Boolean(_) => "boolean",
            OpenValue::Int8(_) => "int8",
            OpenValue::Int16(_) => "int16",
            OpenValue::Int32(_) => "int32",
            OpenValue::Int64(_) => "int64",
            OpenValue::Float32(_) => "float32",
            OpenValue::Float64(_) => "float64",
            OpenValue::Char(_) => "char",
            OpenValue::String(_) => "string",
            OpenValue::ObjectName(_) => "object_name",
            OpenValue::Enum(_) => "enum",
            OpenValue::Array(_) => "array",
            OpenValue::Composite(_) => "composite",
            OpenValue::Tabular(_) => "tabular",
        }
    }

    pub fn as_composite(&self) -> Option<&CompositeData> {
        match self {
            OpenValue::Composite(data) => Some(data),
            _ => None,
        }
    }

    pub fn as_tabular(&self) -> Option<&TabularData> {
        match self {
            OpenValue::Tabular(data) => Some(data),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            OpenValue::Int8(v) => Some(i64::from(*v)),
            OpenValue::Int16(v) => Some(i64::from(*v)),
            OpenValue::Int32(v) => Some(i64::from(*v)),
            OpenValue::Int64(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            OpenValue::String(s) | OpenValue::Enum(s) => Some(s),
            _ => None,
        }
    }

    /// Project this value onto `declared`, dropping composite fields the
    /// declared type does not know about.
    ///
    /// This is how a consumer built against an older composite definition
    /// reads values produced against a newer one. Fails with `ShapeMismatch`
    /// when a declared field is missing or a scalar kind differs.
    pub fn project(&self, declared: &OpenType) -> Result<OpenValue> {
        match (self, declared) {
            (OpenValue::Composite(data), OpenType::Composite(composite)) => {
                Ok(OpenValue::Composite(data.project(composite)?))
            }
            (OpenValue::Array(items), OpenType::Array(element)) => items
                .iter()
                .map(|item| item.project(element))
                .collect::<Result<Vec<_>>>()
                .map(OpenValue::Array),
            (OpenValue::Tabular(data), OpenType::Tabular(tabular)) => {
                let mut projected = TabularData::new(tabular.clone());
                for row in data.rows() {
                    projected.put(row.project(tabular.row_type())?)?;
                }
                Ok(OpenValue::Tabular(projected))
            }
            (value, declared) if declared.is_value(value) => Ok(value.clone()),
            (value, declared) => Err(ManagementError::shape(format!(
                "expected {}, got {}",
                declared,
                value.kind_name()
            ))),
        }
    }
}

impl fmt::Display for OpenValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OpenValue::Void => f.write_str("void"),
            OpenValue::Boolean(v) => write!(f, "{}", v),
            OpenValue::Int8(v) => write!(f, "{}", v),
            OpenValue::Int16(v) => write!(f, "{}", v),
            OpenValue::Int32(v) => write!(f, "{}", v),
            OpenValue::Int64(v) => write!(f, "{}", v),
            OpenValue::Float32(v) => write!(f, "{}", v),
            OpenValue::Float64(v) => write!(f, "{}", v),
            OpenValue::Char(v) => write!(f, "{}", v),
            OpenValue::String(v) | OpenValue::Enum(v) => f.write_str(v),
            OpenValue::ObjectName(v) => write!(f, "{}", v),
            OpenValue::Array(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                f.write_str("]")
            }
            OpenValue::Composite(data) => write!(f, "{}", data),
            OpenValue::Tabular(data) => {
                write!(f, "{}[{} rows]", data.tabular_type().name, data.len())
            }
        }
    }
}

/// A composite record: one value per field of its [`CompositeType`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "CompositeWire", into = "CompositeWire")]
pub struct CompositeData {
    composite_type: Arc<CompositeType>,
    /// Values in field declaration order.
    values: Vec<OpenValue>,
}

impl CompositeData {
    /// Build a composite value.
    ///
    /// The items must supply exactly the declared field set and every value
    /// must conform to its field's declared type.
    pub fn new<S: Into<String>>(
        composite_type: Arc<CompositeType>,
        items: impl IntoIterator<Item = (S, OpenValue)>,
    ) -> Result<Self> {
        let mut supplied: HashMap<String, OpenValue> = HashMap::new();
        for (name, value) in items {
            let name = name.into();
            if !composite_type.contains(&name) {
                return Err(ManagementError::shape(format!(
                    "unexpected field {} for composite {}",
                    name, composite_type.name
                )));
            }
            supplied.insert(name, value);
        }

        let mut values = Vec::with_capacity(composite_type.fields().len());
        for field in composite_type.fields() {
            let value = supplied.remove(&field.name).ok_or_else(|| {
                ManagementError::shape(format!(
                    "missing field {} for composite {}",
                    field.name, composite_type.name
                ))
            })?;
            if !field.open_type.is_value(&value) {
                return Err(ManagementError::shape(format!(
                    "field {}.{} expects {}, got {}",
                    composite_type.name,
                    field.name,
                    field.open_type,
                    value.kind_name()
                )));
            }
            values.push(value);
        }

        Ok(Self {
            composite_type,
            values,
        })
    }

    pub fn composite_type(&self) -> &Arc<CompositeType> {
        &self.composite_type
    }

    pub fn get(&self, field: &str) -> Option<&OpenValue> {
        self.composite_type
            .field_index(field)
            .and_then(|i| self.values.get(i))
    }

    pub fn contains_key(&self, field: &str) -> bool {
        self.composite_type.contains(field)
    }

    /// `(field, value)` pairs in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &OpenValue)> {
        self.composite_type
            .fields()
            .iter()
            .map(|f| f.name.as_str())
            .zip(self.values.iter())
    }

    fn project(&self, declared: &Arc<CompositeType>) -> Result<CompositeData> {
        if Arc::ptr_eq(declared, &self.composite_type) || **declared == *self.composite_type {
            return Ok(self.clone());
        }
        let mut items = Vec::with_capacity(declared.fields().len());
        for field in declared.fields() {
            let value = self.get(&field.name).ok_or_else(|| {
                ManagementError::shape(format!(
                    "missing field {} for composite {}",
                    field.name, declared.name
                ))
            })?;
            items.push((field.name.clone(), value.project(&field.open_type)?));
        }
        CompositeData::new(declared.clone(), items)
    }
}

impl fmt::Display for CompositeData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{{", self.composite_type.name)?;
        for (i, (name, value)) in self.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}={}", name, value)?;
        }
        f.write_str("}")
    }
}

#[derive(Serialize, Deserialize)]
struct CompositeWire {
    #[serde(rename = "type")]
    composite_type: Arc<CompositeType>,
    values: BTreeMap<String, OpenValue>,
}

impl TryFrom<CompositeWire> for CompositeData {
    type Error = ManagementError;

    fn try_from(wire: CompositeWire) -> Result<Self> {
        CompositeData::new(wire.composite_type, wire.values)
    }
}

impl From<CompositeData> for CompositeWire {
    fn from(data: CompositeData) -> Self {
        let values = data
            .composite_type
            .fields()
            .iter()
            .map(|f| f.name.clone())
            .zip(data.values)
            .collect();
        CompositeWire {
            composite_type: data.composite_type,
            values,
        }
    }
}

/// A set of composite rows sharing one row type, unique by index fields.
///
/// Rows iterate in insertion order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "TabularWire", into = "TabularWire")]
pub struct TabularData {
    tabular_type: Arc<TabularType>,
    rows: Vec<CompositeData>,
    /// Canonical index key to row position.
    index: HashMap<Vec<KeyPart>, usize>,
}

impl TabularData {
    /// Create an empty tabular value.
    pub fn new(tabular_type: Arc<TabularType>) -> Self {
        Self {
            tabular_type,
            rows: Vec::new(),
            index: HashMap::new(),
        }
    }

    /// Create a tabular value from rows, failing on the first duplicate key.
    pub fn from_rows(
        tabular_type: Arc<TabularType>,
        rows: impl IntoIterator<Item = CompositeData>,
    ) -> Result<Self> {
        let mut data = Self::new(tabular_type);
        for row in rows {
            data.put(row)?;
        }
        Ok(data)
    }

    pub fn tabular_type(&self) -> &Arc<TabularType> {
        &self.tabular_type
    }

    /// Append a row.
    ///
    /// Fails with `ShapeMismatch` if the row type differs from the declared
    /// row type and with `DuplicateKey` if a row with the same index values
    /// already exists.
    pub fn put(&mut self, row: CompositeData) -> Result<()> {
        let row_type = self.tabular_type.row_type();
        if !(Arc::ptr_eq(row_type, row.composite_type()) || **row_type == **row.composite_type())
        {
            return Err(ManagementError::shape(format!(
                "row type {} does not match {} of tabular {}",
                row.composite_type().name,
                row_type.name,
                self.tabular_type.name
            )));
        }
        let key = self.key_of(&row);
        let slot = index_key(&key);
        if self.index.contains_key(&slot) {
            return Err(ManagementError::DuplicateKey {
                key: display_key(&key),
            });
        }
        self.index.insert(slot, self.rows.len());
        self.rows.push(row);
        Ok(())
    }

    /// Index values of `row`, in index declaration order.
    pub fn key_of(&self, row: &CompositeData) -> Vec<OpenValue> {
        self.tabular_type
            .index()
            .iter()
            .filter_map(|field| row.get(field).cloned())
            .collect()
    }

    /// Look a row up by its index values.
    pub fn get(&self, key: &[OpenValue]) -> Option<&CompositeData> {
        self.index
            .get(&index_key(key))
            .and_then(|&pos| self.rows.get(pos))
    }

    pub fn contains_key(&self, key: &[OpenValue]) -> bool {
        self.index.contains_key(&index_key(key))
    }

    /// Remove a row by its index values, keeping the order of the rest.
    pub fn remove(&mut self, key: &[OpenValue]) -> Option<CompositeData> {
        let pos = self.index.remove(&index_key(key))?;
        let row = self.rows.remove(pos);
        for slot in self.index.values_mut() {
            if *slot > pos {
                *slot -= 1;
            }
        }
        Some(row)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Rows in insertion order.
    pub fn rows(&self) -> &[CompositeData] {
        &self.rows
    }

    pub fn iter(&self) -> impl Iterator<Item = &CompositeData> {
        self.rows.iter()
    }
}

/// Hashable form of one index value. Floats compare by value, except that
/// all NaNs are one key; `-0.0` and `0.0` are the same key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum KeyPart {
    Void,
    Boolean(bool),
    Int { bits: u8, value: i64 },
    Float { bits: u8, value: u64 },
    Char(char),
    String(String),
    Enum(String),
    ObjectName(String),
    Array(Vec<KeyPart>),
    /// Composite and tabular values never index a table; lookups with them
    /// still need a key.
    Other(String),
}

fn index_key(key: &[OpenValue]) -> Vec<KeyPart> {
    key.iter().map(key_part).collect()
}

fn key_part(value: &OpenValue) -> KeyPart {
    match value {
        OpenValue::Void => KeyPart::Void,
        OpenValue::Boolean(v) => KeyPart::Boolean(*v),
        OpenValue::Int8(v) => KeyPart::Int {
            bits: 8,
            value: i64::from(*v),
        },
        OpenValue::Int16(v) => KeyPart::Int {
            bits: 16,
            value: i64::from(*v),
        },
        OpenValue::Int32(v) => KeyPart::Int {
            bits: 32,
            value: i64::from(*v),
        },
        OpenValue::Int64(v) => KeyPart::Int { bits: 64, value: *v },
        OpenValue::Float32(v) => KeyPart::Float {
            bits: 32,
            value: float_key(f64::from(*v)),
        },
        OpenValue::Float64(v) => KeyPart::Float {
            bits: 64,
            value: float_key(*v),
        },
        OpenValue::Char(v) => KeyPart::Char(*v),
        OpenValue::String(v) => KeyPart::String(v.clone()),
        OpenValue::Enum(v) => KeyPart::Enum(v.clone()),
        OpenValue::ObjectName(v) => KeyPart::ObjectName(v.to_string()),
        OpenValue::Array(items) => KeyPart::Array(items.iter().map(key_part).collect()),
        OpenValue::Composite(_) | OpenValue::Tabular(_) => KeyPart::Other(value.to_string()),
    }
}

fn float_key(v: f64) -> u64 {
    if v.is_nan() {
        f64::NAN.to_bits()
    } else if v == 0.0 {
        0
    } else {
        v.to_bits()
    }
}

fn display_key(key: &[OpenValue]) -> String {
    let parts: Vec<String> = key.iter().map(ToString::to_string).collect();
    format!("({})", parts.join(", "))
}

#[derive(Serialize, Deserialize)]
struct TabularWire {
    #[serde(rename = "type")]
    tabular_type: Arc<TabularType>,
    rows: Vec<CompositeData>,
}

impl TryFrom<TabularWire> for TabularData {
    type Error = ManagementError;

    fn try_from(wire: TabularWire) -> Result<Self> {
        TabularData::from_rows(wire.tabular_type, wire.rows)
    }
}

impl From<TabularData> for TabularWire {
    fn from(data: TabularData) -> Self {
        TabularWire {
            tabular_type: data.tabular_type,
            rows: data.rows,
        }
    }
}
