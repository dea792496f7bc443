//! Mapping between native Rust values and open values.
//!
//! Native values are taken through their `serde` data model: a struct maps to
//! a composite, a sequence of structs to a tabular value (or an array), and
//! numbers, booleans and strings to scalars of the declared width. Fields of
//! a native struct that the declared composite type does not name are dropped
//! on the way out, so an object can grow new fields without breaking older
//! declared types.

use super::native::{float_to_json, from_json, json_to_float, to_json};
use super::types::{OpenType, SimpleType};
use super::value::{CompositeData, OpenValue, TabularData};
use crate::{ManagementError, ObjectName, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};

/// Convert a native value to an open value of type `declared`.
pub fn to_open<T: Serialize + ?Sized>(native: &T, declared: &OpenType) -> Result<OpenValue> {
    let json = to_json(native)?;
    json_to_open(&json, declared)
}

/// Convert an open value of type `declared` back to a native value.
pub fn from_open<T: DeserializeOwned>(open: &OpenValue, declared: &OpenType) -> Result<T> {
    let json = open_to_json(open, declared)?;
    from_json(json).map_err(|e| {
        ManagementError::shape(format!("cannot build native value from {}: {}", declared, e))
    })
}

/// Convert the serde JSON form of a native value to an open value.
pub fn json_to_open(json: &Value, declared: &OpenType) -> Result<OpenValue> {
    convert_in(json, declared, "value")
}

/// Convert an open value to the serde JSON form of its native value.
pub fn open_to_json(open: &OpenValue, declared: &OpenType) -> Result<Value> {
    convert_out(open, declared, "value")
}

fn mismatch(path: &str, declared: &OpenType, found: impl std::fmt::Display) -> ManagementError {
    ManagementError::shape(format!("{}: expected {}, found {}", path, declared, found))
}

fn json_kind(json: &Value) -> &'static str {
    match json {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn int_in<T: TryFrom<i64>>(json: &Value, declared: &OpenType, path: &str) -> Result<T> {
    let wide = json
        .as_i64()
        .ok_or_else(|| mismatch(path, declared, json_kind(json)))?;
    T::try_from(wide).map_err(|_| mismatch(path, declared, format!("out-of-range {}", wide)))
}

fn convert_in(json: &Value, declared: &OpenType, path: &str) -> Result<OpenValue> {
    match declared {
        OpenType::Simple(simple) => simple_in(json, *simple, declared, path),
        OpenType::Enum(enum_type) => match json.as_str() {
            Some(symbol) if enum_type.contains(symbol) => Ok(OpenValue::Enum(symbol.to_string())),
            Some(symbol) => Err(mismatch(path, declared, format!("symbol {}", symbol))),
            None => Err(mismatch(path, declared, json_kind(json))),
        },
        OpenType::Array(element) => {
            let items = json
                .as_array()
                .ok_or_else(|| mismatch(path, declared, json_kind(json)))?;
            items
                .iter()
                .enumerate()
                .map(|(i, item)| convert_in(item, element, &format!("{}[{}]", path, i)))
                .collect::<Result<Vec<_>>>()
                .map(OpenValue::Array)
        }
        OpenType::Composite(composite) => {
            let object = json
                .as_object()
                .ok_or_else(|| mismatch(path, declared, json_kind(json)))?;
            let mut items = Vec::with_capacity(composite.fields().len());
            for field in composite.fields() {
                let field_path = format!("{}.{}", path, field.name);
                let native = object.get(&field.name).ok_or_else(|| {
                    ManagementError::shape(format!(
                        "{}: missing field of composite {}",
                        field_path, composite.name
                    ))
                })?;
                items.push((
                    field.name.clone(),
                    convert_in(native, &field.open_type, &field_path)?,
                ));
            }
            Ok(OpenValue::Composite(CompositeData::new(
                composite.clone(),
                items,
            )?))
        }
        OpenType::Tabular(tabular) => {
            let rows = json
                .as_array()
                .ok_or_else(|| mismatch(path, declared, json_kind(json)))?;
            let row_type = OpenType::Composite(tabular.row_type().clone());
            let mut data = TabularData::new(tabular.clone());
            for (i, row) in rows.iter().enumerate() {
                match convert_in(row, &row_type, &format!("{}[{}]", path, i))? {
                    OpenValue::Composite(row) => data.put(row)?,
                    other => return Err(mismatch(path, &row_type, other.kind_name())),
                }
            }
            Ok(OpenValue::Tabular(data))
        }
    }
}

fn simple_in(
    json: &Value,
    simple: SimpleType,
    declared: &OpenType,
    path: &str,
) -> Result<OpenValue> {
    let wrong = || mismatch(path, declared, json_kind(json));
    let value = match simple {
        SimpleType::Void => match json {
            Value::Null => OpenValue::Void,
            _ => return Err(wrong()),
        },
        SimpleType::Boolean => OpenValue::Boolean(json.as_bool().ok_or_else(wrong)?),
        SimpleType::Int8 => OpenValue::Int8(int_in(json, declared, path)?),
        SimpleType::Int16 => OpenValue::Int16(int_in(json, declared, path)?),
        SimpleType::Int32 => OpenValue::Int32(int_in(json, declared, path)?),
        SimpleType::Int64 => OpenValue::Int64(int_in(json, declared, path)?),
        SimpleType::Float32 => {
            let wide = json_to_float(json).ok_or_else(wrong)?;
            if wide.is_finite() && wide.abs() > f64::from(f32::MAX) {
                return Err(mismatch(path, declared, format!("out-of-range {}", wide)));
            }
            OpenValue::Float32(wide as f32)
        }
        SimpleType::Float64 => OpenValue::Float64(json_to_float(json).ok_or_else(wrong)?),
        SimpleType::Char => {
            let s = json.as_str().ok_or_else(wrong)?;
            let mut chars = s.chars();
            match (chars.next(), chars.next()) {
                (Some(c), None) => OpenValue::Char(c),
                _ => return Err(mismatch(path, declared, format!("string {:?}", s))),
            }
        }
        SimpleType::String => OpenValue::String(json.as_str().ok_or_else(wrong)?.to_string()),
        SimpleType::ObjectName => {
            let s = json.as_str().ok_or_else(wrong)?;
            let name: ObjectName = s
                .parse()
                .map_err(|_| mismatch(path, declared, format!("malformed name {:?}", s)))?;
            OpenValue::ObjectName(name)
        }
    };
    Ok(value)
}

fn convert_out(open: &OpenValue, declared: &OpenType, path: &str) -> Result<Value> {
    match (open, declared) {
        (OpenValue::Composite(data), OpenType::Composite(composite)) => {
            if let Some((unexpected, _)) = data.iter().find(|(name, _)| !composite.contains(name)) {
                return Err(ManagementError::shape(format!(
                    "{}.{}: field not declared by composite {}",
                    path, unexpected, composite.name
                )));
            }
            let mut object = Map::new();
            for field in composite.fields() {
                let field_path = format!("{}.{}", path, field.name);
                let value = data.get(&field.name).ok_or_else(|| {
                    ManagementError::shape(format!(
                        "{}: missing field of composite {}",
                        field_path, composite.name
                    ))
                })?;
                object.insert(
                    field.name.clone(),
                    convert_out(value, &field.open_type, &field_path)?,
                );
            }
            Ok(Value::Object(object))
        }
        (OpenValue::Tabular(data), OpenType::Tabular(tabular)) => {
            let row_type = OpenType::Composite(tabular.row_type().clone());
            data.iter()
                .enumerate()
                .map(|(i, row)| {
                    convert_out(
                        &OpenValue::Composite(row.clone()),
                        &row_type,
                        &format!("{}[{}]", path, i),
                    )
                })
                .collect::<Result<Vec<_>>>()
                .map(Value::Array)
        }
        (OpenValue::Array(items), OpenType::Array(element)) => items
            .iter()
            .enumerate()
            .map(|(i, item)| convert_out(item, element, &format!("{}[{}]", path, i)))
            .collect::<Result<Vec<_>>>()
            .map(Value::Array),
        (OpenValue::Enum(symbol), OpenType::Enum(enum_type)) if enum_type.contains(symbol) => {
            Ok(Value::String(symbol.clone()))
        }
        (OpenValue::Void, OpenType::Simple(SimpleType::Void)) => Ok(Value::Null),
        (OpenValue::Boolean(v), OpenType::Simple(SimpleType::Boolean)) => Ok(Value::Bool(*v)),
        (OpenValue::Int8(v), OpenType::Simple(SimpleType::Int8)) => Ok(Value::from(*v)),
        (OpenValue::Int16(v), OpenType::Simple(SimpleType::Int16)) => Ok(Value::from(*v)),
        (OpenValue::Int32(v), OpenType::Simple(SimpleType::Int32)) => Ok(Value::from(*v)),
        (OpenValue::Int64(v), OpenType::Simple(SimpleType::Int64)) => Ok(Value::from(*v)),
        (OpenValue::Float32(v), OpenType::Simple(SimpleType::Float32)) => {
            Ok(float_to_json(f64::from(*v)))
        }
        (OpenValue::Float64(v), OpenType::Simple(SimpleType::Float64)) => Ok(float_to_json(*v)),
        (OpenValue::Char(v), OpenType::Simple(SimpleType::Char)) => {
            Ok(Value::String(v.to_string()))
        }
        (OpenValue::String(v), OpenType::Simple(SimpleType::String)) => {
            Ok(Value::String(v.clone()))
        }
        (OpenValue::ObjectName(v), OpenType::Simple(SimpleType::ObjectName)) => {
            Ok(Value::String(v.to_string()))
        }
        (open, declared) => Err(mismatch(path, declared, open.kind_name())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::open_type::{CompositeType, EnumType, TabularType};
    use serde::Deserialize;
    use std::sync::Arc;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct MemoryUsage {
        init: i64,
        used: i64,
        committed: i64,
        max: i64,
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct MemoryUsageV2 {
        init: i64,
        used: i64,
        committed: i64,
        max: i64,
        peak: i64,
    }

    fn memory_usage_type() -> Arc<CompositeType> {
        CompositeType::builder("MemoryUsage")
            .field("init", OpenType::INT64)
            .field("used", OpenType::INT64)
            .field("committed", OpenType::INT64)
            .field("max", OpenType::INT64)
            .build()
            .unwrap()
    }

    fn usage() -> MemoryUsage {
        MemoryUsage {
            init: 1,
            used: 2,
            committed: 3,
            max: 4,
        }
    }

    #[test]
    fn test_scalar_roundtrip() {
        let cases: Vec<(Value, OpenType)> = vec![
            (Value::from(true), OpenType::BOOLEAN),
            (Value::from(-12), OpenType::INT8),
            (Value::from(i64::MAX), OpenType::INT64),
            (Value::from(1.5), OpenType::FLOAT64),
            (Value::from("héllo"), OpenType::STRING),
            (Value::from("x"), OpenType::CHAR),
            (Value::from("dom:type=Mem"), OpenType::OBJECT_NAME),
        ];
        for (native, ty) in cases {
            let open = json_to_open(&native, &ty).unwrap();
            assert!(ty.is_value(&open));
            assert_eq!(open_to_json(&open, &ty).unwrap(), native);
        }
    }

    #[test]
    fn test_integer_width_is_enforced() {
        let result = to_open(&300i64, &OpenType::INT8);
        assert!(matches!(result, Err(ManagementError::ShapeMismatch { .. })));
        assert_eq!(to_open(&127i64, &OpenType::INT8).unwrap(), OpenValue::Int8(127));
    }

    #[test]
    fn test_composite_roundtrip() {
        let ty = OpenType::from(memory_usage_type());
        let open = to_open(&usage(), &ty).unwrap();
        let back: MemoryUsage = from_open(&open, &ty).unwrap();
        assert_eq!(back, usage());
    }

    #[test]
    fn test_newer_native_fields_are_dropped() {
        let ty = OpenType::from(memory_usage_type());
        let newer = MemoryUsageV2 {
            init: 1,
            used: 2,
            committed: 3,
            max: 4,
            peak: 9,
        };
        let open = to_open(&newer, &ty).unwrap();
        assert!(open.as_composite().unwrap().get("peak").is_none());
        let back: MemoryUsage = from_open(&open, &ty).unwrap();
        assert_eq!(back, usage());
    }

    #[test]
    fn test_missing_native_field_fails() {
        let ty = OpenType::from(memory_usage_type());
        let partial = serde_json::json!({"init": 1, "used": 2});
        assert!(matches!(
            json_to_open(&partial, &ty),
            Err(ManagementError::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn test_from_open_rejects_unexpected_field() {
        let older = CompositeType::builder("MemoryUsage")
            .field("init", OpenType::INT64)
            .field("used", OpenType::INT64)
            .build()
            .unwrap();
        let open = to_open(&usage(), &OpenType::from(memory_usage_type())).unwrap();
        let result = open_to_json(&open, &OpenType::from(older));
        assert!(matches!(result, Err(ManagementError::ShapeMismatch { .. })));
    }

    #[test]
    fn test_tabular_from_native_rows() {
        #[derive(Serialize, Deserialize, Debug, PartialEq)]
        struct Property {
            key: String,
            value: String,
        }
        let row = CompositeType::builder("Property")
            .field("key", OpenType::STRING)
            .field("value", OpenType::STRING)
            .build()
            .unwrap();
        let ty = OpenType::from(TabularType::new("Properties", row, ["key"]).unwrap());

        let rows = vec![
            Property {
                key: "b".into(),
                value: "2".into(),
            },
            Property {
                key: "a".into(),
                value: "1".into(),
            },
        ];
        let open = to_open(&rows, &ty).unwrap();
        assert_eq!(open.as_tabular().unwrap().len(), 2);
        let back: Vec<Property> = from_open(&open, &ty).unwrap();
        assert_eq!(back, rows);

        let duplicated = serde_json::json!([
            {"key": "a", "value": "1"},
            {"key": "a", "value": "2"},
        ]);
        assert!(matches!(
            json_to_open(&duplicated, &ty),
            Err(ManagementError::DuplicateKey { .. })
        ));
    }

    #[test]
    fn test_enum_symbols_checked() {
        let ty = OpenType::from(EnumType::new("State", ["NEW", "RUNNABLE"]).unwrap());
        assert_eq!(
            to_open("RUNNABLE", &ty).unwrap(),
            OpenValue::Enum("RUNNABLE".into())
        );
        assert!(to_open("BLOCKED", &ty).is_err());
    }

    #[test]
    fn test_array_of_strings() {
        let ty = OpenType::array(OpenType::STRING);
        let args = vec!["--verbose".to_string(), "-Xmx".to_string()];
        let open = to_open(&args, &ty).unwrap();
        let back: Vec<String> = from_open(&open, &ty).unwrap();
        assert_eq!(back, args);
    }

    #[test]
    fn test_void_maps_to_unit() {
        assert_eq!(to_open(&(), &OpenType::VOID).unwrap(), OpenValue::Void);
        from_open::<()>(&OpenValue::Void, &OpenType::VOID).unwrap();
    }

    #[test]
    fn test_non_finite_floats_roundtrip() {
        for v in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
            let open = to_open(&v, &OpenType::FLOAT64).unwrap();
            match open {
                OpenValue::Float64(mapped) => assert!((mapped.is_nan() && v.is_nan()) || mapped == v),
                other => panic!("Expected Float64, got: {:?}", other),
            }
            let back: f64 = from_open(&open, &OpenType::FLOAT64).unwrap();
            assert!((back.is_nan() && v.is_nan()) || back == v);
        }

        let open = to_open(&f32::NEG_INFINITY, &OpenType::FLOAT32).unwrap();
        assert_eq!(open, OpenValue::Float32(f32::NEG_INFINITY));
        assert_eq!(from_open::<f32>(&open, &OpenType::FLOAT32).unwrap(), f32::NEG_INFINITY);
    }

    #[test]
    fn test_non_finite_floats_inside_composites() {
        #[derive(Debug, Serialize, Deserialize)]
        struct Load {
            average: f64,
            peak: f64,
        }
        let ty = OpenType::from(
            CompositeType::builder("Load")
                .field("average", OpenType::FLOAT64)
                .field("peak", OpenType::FLOAT64)
                .build()
                .unwrap(),
        );
        let open = to_open(
            &Load {
                average: f64::NAN,
                peak: f64::INFINITY,
            },
            &ty,
        )
        .unwrap();
        assert_eq!(
            open_to_json(&open, &ty).unwrap(),
            serde_json::json!({"average": "NaN", "peak": "Infinity"})
        );
        let back: Load = from_open(&open, &ty).unwrap();
        assert!(back.average.is_nan());
        assert_eq!(back.peak, f64::INFINITY);
    }
}
