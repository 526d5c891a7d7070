//! Traits for converting between `Value` and concrete Rust types.
//!
//! `FromValue` unpacks a dynamic value into a typed argument; `IntoValue`
//! packs a typed result back into a dynamic value. Invoker thunks generated
//! by `proxy_schema!` are built entirely out of these two traits, so every
//! supported parameter and return type needs an implementation here.
//!
//! Conversions are strict: an `i32` parameter accepts only an integer value
//! (range-checked), never a float or a string. The absent value converts
//! only into `Option` (as `None`) and `()`.

use crate::error::{InvokeError, InvokeResult};
use crate::token::short_type_name;
use crate::value::Value;

/// Unpack a dynamic value into a typed Rust value.
pub trait FromValue: Sized {
    /// Convert from a borrowed `Value`
    fn from_value(value: &Value) -> InvokeResult<Self>;
}

/// Pack a typed Rust value into a dynamic value.
pub trait IntoValue {
    /// Convert into an owned `Value`
    fn into_value(self) -> Value;
}

fn mismatch<T>(value: &Value) -> InvokeError {
    InvokeError::TypeMismatch {
        expected: short_type_name(std::any::type_name::<T>()).to_string(),
        got: value.type_name().to_string(),
    }
}

// ============================================================================
// FromValue
// ============================================================================

macro_rules! int_from_value {
    ($($t:ty),*) => {
        $(
            impl FromValue for $t {
                fn from_value(value: &Value) -> InvokeResult<Self> {
                    let i = value.as_int().ok_or_else(|| mismatch::<$t>(value))?;
                    <$t>::try_from(i).map_err(|_| mismatch::<$t>(value))
                }
            }
        )*
    };
}

int_from_value!(i8, i16, i32, u8, u16, u32);

impl FromValue for i64 {
    fn from_value(value: &Value) -> InvokeResult<Self> {
        value.as_int().ok_or_else(|| mismatch::<i64>(value))
    }
}

impl FromValue for f64 {
    fn from_value(value: &Value) -> InvokeResult<Self> {
        value.as_float().ok_or_else(|| mismatch::<f64>(value))
    }
}

impl FromValue for f32 {
    fn from_value(value: &Value) -> InvokeResult<Self> {
        value
            .as_float()
            .map(|f| f as f32)
            .ok_or_else(|| mismatch::<f32>(value))
    }
}

impl FromValue for bool {
    fn from_value(value: &Value) -> InvokeResult<Self> {
        value.as_bool().ok_or_else(|| mismatch::<bool>(value))
    }
}

impl FromValue for String {
    fn from_value(value: &Value) -> InvokeResult<Self> {
        value
            .as_str()
            .map(str::to_owned)
            .ok_or_else(|| mismatch::<String>(value))
    }
}

impl FromValue for Value {
    fn from_value(value: &Value) -> InvokeResult<Self> {
        Ok(value.clone())
    }
}

impl FromValue for () {
    fn from_value(value: &Value) -> InvokeResult<Self> {
        if value.is_absent() {
            Ok(())
        } else {
            Err(mismatch::<()>(value))
        }
    }
}

impl<T: FromValue> FromValue for Option<T> {
    fn from_value(value: &Value) -> InvokeResult<Self> {
        if value.is_absent() {
            Ok(None)
        } else {
            T::from_value(value).map(Some)
        }
    }
}

// ============================================================================
// IntoValue
// ============================================================================

macro_rules! int_into_value {
    ($($t:ty),*) => {
        $(
            impl IntoValue for $t {
                fn into_value(self) -> Value {
                    Value::int(self as i64)
                }
            }
        )*
    };
}

int_into_value!(i8, i16, i32, i64, u8, u16, u32);

impl IntoValue for f64 {
    fn into_value(self) -> Value {
        Value::float(self)
    }
}

impl IntoValue for f32 {
    fn into_value(self) -> Value {
        Value::float(self as f64)
    }
}

impl IntoValue for bool {
    fn into_value(self) -> Value {
        Value::bool(self)
    }
}

impl IntoValue for String {
    fn into_value(self) -> Value {
        Value::string(self)
    }
}

impl IntoValue for &str {
    fn into_value(self) -> Value {
        Value::string(self)
    }
}

impl IntoValue for () {
    fn into_value(self) -> Value {
        Value::absent()
    }
}

impl IntoValue for Value {
    fn into_value(self) -> Value {
        self
    }
}

impl<T: IntoValue> IntoValue for Option<T> {
    fn into_value(self) -> Value {
        match self {
            Some(v) => v.into_value(),
            None => Value::absent(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_int_roundtrip() {
        let v = 42i32.into_value();
        assert_eq!(v, Value::int(42));
        assert_eq!(i32::from_value(&v).unwrap(), 42);
        assert_eq!(i64::from_value(&v).unwrap(), 42);
    }

    #[test]
    fn test_int_range_check() {
        let v = Value::int(i64::from(i32::MAX) + 1);
        assert!(i32::from_value(&v).is_err());
        assert!(i64::from_value(&v).is_ok());

        let v = Value::int(-1);
        assert!(u32::from_value(&v).is_err());
    }

    #[test]
    fn test_float_roundtrip() {
        let v = 2.5f64.into_value();
        assert_eq!(f64::from_value(&v).unwrap(), 2.5);
        assert_eq!(f32::from_value(&v).unwrap(), 2.5f32);
    }

    #[test]
    fn test_strict_kinds() {
        // A float does not convert to an integer, and vice versa
        assert!(i32::from_value(&Value::float(1.0)).is_err());
        assert!(f64::from_value(&Value::int(1)).is_err());
        assert!(bool::from_value(&Value::int(1)).is_err());
        assert!(String::from_value(&Value::int(1)).is_err());
    }

    #[test]
    fn test_string_roundtrip() {
        let v = "hello".into_value();
        assert_eq!(String::from_value(&v).unwrap(), "hello");
    }

    #[test]
    fn test_unit() {
        assert_eq!(().into_value(), Value::absent());
        assert!(<()>::from_value(&Value::absent()).is_ok());
        assert!(<()>::from_value(&Value::int(0)).is_err());
    }

    #[test]
    fn test_option() {
        assert_eq!(Option::<i32>::from_value(&Value::absent()).unwrap(), None);
        assert_eq!(Option::<i32>::from_value(&Value::int(3)).unwrap(), Some(3));
        assert_eq!(Some(3i32).into_value(), Value::int(3));
        assert_eq!(Option::<i32>::None.into_value(), Value::absent());
    }

    #[test]
    fn test_mismatch_message() {
        let err = i32::from_value(&Value::string("x")).unwrap_err();
        assert_eq!(err.to_string(), "Type mismatch: expected i32, got string");
    }
}
