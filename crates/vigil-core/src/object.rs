//! The capability trait implemented by managed objects.

use crate::descriptor::MethodSignature;
use crate::open_type::{from_json, to_json};
use crate::{ManagementError, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

/// An entity exposing attributes and operations for instrumentation and control.
///
/// The object declares its methods once through [`methods`](Self::methods);
/// the registry derives attributes and operations from those declarations
/// at registration time. [`call`](Self::call) then receives the native (serde
/// JSON) form of the arguments and returns the native form of the result.
/// Conversion to and from open values happens at the dispatcher boundary.
///
/// # Example
///
/// ```rust
/// use std::sync::atomic::{AtomicI64, Ordering};
/// use serde_json::Value;
/// use vigil_core::object::{arg, native, unknown_method};
/// use vigil_core::{ManagedObject, MethodSignature, OpenType, Result};
///
/// struct Counter(AtomicI64);
///
/// impl ManagedObject for Counter {
///     fn methods(&self) -> Vec<MethodSignature> {
///         vec![
///             MethodSignature::getter("get_count", OpenType::INT64),
///             MethodSignature::operation("add", OpenType::INT64).param("delta", OpenType::INT64),
///         ]
///     }
///
///     fn call(&self, method: &str, args: &[Value]) -> Result<Value> {
///         match method {
///             "get_count" => native(&self.0.load(Ordering::SeqCst)),
///             "add" => {
///                 let delta: i64 = arg(args, 0)?;
///                 native(&(self.0.fetch_add(delta, Ordering::SeqCst) + delta))
///             }
///             other => Err(unknown_method(other)),
///         }
///     }
/// }
/// ```
pub trait ManagedObject: Send + Sync + 'static {
    /// Declared method surface.
    fn methods(&self) -> Vec<MethodSignature>;

    /// Human-readable description carried in the descriptor.
    fn description(&self) -> String {
        String::new()
    }

    /// Execute a declared method.
    fn call(&self, method: &str, args: &[Value]) -> Result<Value>;
}

/// Serialize a native result.
pub fn native<T: Serialize + ?Sized>(value: &T) -> Result<Value> {
    Ok(to_json(value)?)
}

/// Deserialize the argument at `index`.
pub fn arg<T: DeserializeOwned>(args: &[Value], index: usize) -> Result<T> {
    let value = args.get(index).ok_or_else(|| {
        ManagementError::invalid_argument(format!("arg{}", index), "argument not supplied")
    })?;
    from_json(value.clone()).map_err(|e| {
        ManagementError::shape(format!("argument {} cannot be read: {}", index, e))
    })
}

/// Error for a method name the object does not implement.
pub fn unknown_method(method: &str) -> ManagementError {
    ManagementError::NoSuchOperation {
        operation: method.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_arg_extraction() {
        let args = vec![Value::from(5), Value::from("x")];
        assert_eq!(arg::<i64>(&args, 0).unwrap(), 5);
        assert_eq!(arg::<String>(&args, 1).unwrap(), "x");
        assert!(matches!(
            arg::<i64>(&args, 1),
            Err(ManagementError::ShapeMismatch { .. })
        ));
        assert!(matches!(
            arg::<i64>(&args, 2),
            Err(ManagementError::InvalidArgument { .. })
        ));
    }

    #[test]
    fn test_native() {
        assert_eq!(native(&42i64).unwrap(), Value::from(42));
        assert_eq!(native(&()).unwrap(), Value::Null);
        assert_eq!(native(&f64::NAN).unwrap(), Value::from("NaN"));
        assert_eq!(arg::<f32>(&[Value::from("Infinity")], 0).unwrap(), f32::INFINITY);
    }
}
