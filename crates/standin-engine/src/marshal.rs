//! Boxing, unboxing, and checked casts
//!
//! One implementation of the marshaling rules, used both by the evaluator
//! (BOX, UNBOX, and CAST opcodes) and by the dynamic interface path, which
//! marshals without generated bytecode. The rules are driven by declared
//! types, never by inspecting the incoming value: a parameter boxes
//! according to its own declared kind, a return site unboxes or casts
//! according to the declared return type.

use standin_sdk::{InvokeError, InvokeResult, PrimKind, TypeToken, Value};

/// Decode a primitive-kind operand byte
pub fn prim_kind_from_code(code: u8) -> Option<PrimKind> {
    match code {
        0 => Some(PrimKind::Int),
        1 => Some(PrimKind::Float),
        2 => Some(PrimKind::Bool),
        _ => None,
    }
}

fn kind_name(kind: PrimKind) -> &'static str {
    match kind {
        PrimKind::Int => "int",
        PrimKind::Float => "float",
        PrimKind::Bool => "bool",
    }
}

fn mismatch(kind: PrimKind, value: &Value) -> InvokeError {
    InvokeError::TypeMismatch {
        expected: kind_name(kind).to_string(),
        got: value.type_name().to_string(),
    }
}

/// Box a primitive value for marshaling.
///
/// The declared kind selects the check; a value of any other shape is a
/// type mismatch.
pub fn box_value(kind: PrimKind, value: Value) -> InvokeResult<Value> {
    let matches = match kind {
        PrimKind::Int => value.is_int(),
        PrimKind::Float => value.is_float(),
        PrimKind::Bool => value.is_bool(),
    };
    if matches {
        Ok(value)
    } else {
        Err(mismatch(kind, &value))
    }
}

/// Unbox a value back to the declared primitive kind.
///
/// Absent values are handled by the caller before unboxing; seeing one
/// here is a type mismatch.
pub fn unbox_value(kind: PrimKind, value: Value) -> InvokeResult<Value> {
    let matches = match kind {
        PrimKind::Int => value.is_int(),
        PrimKind::Float => value.is_float(),
        PrimKind::Bool => value.is_bool(),
    };
    if matches {
        Ok(value)
    } else {
        Err(mismatch(kind, &value))
    }
}

/// Checked cast of a reference value against a declared type.
///
/// Absent always passes (a missing reference casts to anything). The
/// universal object type accepts every value. Synthetic tokens carry no
/// runtime identity to check against and pass unchecked.
pub fn cast_value(token: &TypeToken, value: Value) -> InvokeResult<Value> {
    if value.is_absent() || token.is_object() || token.is_synthetic() {
        return Ok(value);
    }
    if token.is_string() {
        return if value.is_str() {
            Ok(value)
        } else {
            Err(InvokeError::TypeMismatch {
                expected: "String".to_string(),
                got: value.type_name().to_string(),
            })
        };
    }
    if let Some(kind) = token.prim_kind() {
        return unbox_value(kind, value);
    }
    // Remaining case: a Rust type token, checked against the referent
    match value.clone_ref() {
        Some(referent) if Some(referent.as_ref().type_id()) == token.rust_id() => Ok(value),
        _ => Err(InvokeError::TypeMismatch {
            expected: token.name().to_string(),
            got: value.type_name().to_string(),
        }),
    }
}

/// Marshal actual arguments against declared parameter types.
///
/// Checks arity, boxes primitive parameters by their declared kinds, and
/// passes reference parameters through unchanged.
pub fn pack_arguments(params: &[TypeToken], args: &[Value]) -> InvokeResult<Vec<Value>> {
    if params.len() != args.len() {
        return Err(InvokeError::ArityMismatch {
            expected: params.len(),
            got: args.len(),
        });
    }
    params
        .iter()
        .zip(args.iter())
        .map(|(param, arg)| match param.prim_kind() {
            Some(kind) => box_value(kind, arg.clone()),
            None => Ok(arg.clone()),
        })
        .collect()
}

/// Coerce an interceptor result to the declared return type.
///
/// Void discards the value. Primitive returns substitute the zero value
/// when the interceptor produced nothing, and unbox otherwise. Reference
/// returns go through the checked cast.
pub fn coerce_result(token: &TypeToken, value: Value) -> InvokeResult<Value> {
    if token.is_void() {
        return Ok(Value::absent());
    }
    if let Some(kind) = token.prim_kind() {
        return if value.is_absent() {
            Ok(kind.zero())
        } else {
            unbox_value(kind, value)
        };
    }
    cast_value(token, value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_box_checks_declared_kind() {
        assert_eq!(
            box_value(PrimKind::Int, Value::int(4)).unwrap(),
            Value::int(4)
        );
        assert_eq!(
            box_value(PrimKind::Float, Value::float(0.5)).unwrap(),
            Value::float(0.5)
        );
        assert_eq!(
            box_value(PrimKind::Bool, Value::bool(true)).unwrap(),
            Value::bool(true)
        );

        assert!(box_value(PrimKind::Int, Value::float(1.0)).is_err());
        assert!(box_value(PrimKind::Bool, Value::absent()).is_err());
    }

    #[test]
    fn test_unbox_rejects_absent() {
        assert!(matches!(
            unbox_value(PrimKind::Int, Value::absent()),
            Err(InvokeError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn test_cast_absent_passes() {
        let token = TypeToken::of::<Vec<u8>>();
        assert!(cast_value(&token, Value::absent()).unwrap().is_absent());
    }

    #[test]
    fn test_cast_object_accepts_everything() {
        let token = TypeToken::object();
        assert_eq!(cast_value(&token, Value::int(1)).unwrap(), Value::int(1));
        assert_eq!(
            cast_value(&token, Value::string("x")).unwrap(),
            Value::string("x")
        );
    }

    #[test]
    fn test_cast_string() {
        let token = TypeToken::string();
        assert!(cast_value(&token, Value::string("ok")).is_ok());
        assert!(cast_value(&token, Value::int(1)).is_err());
    }

    #[test]
    fn test_cast_synthetic_passes_unchecked() {
        let token = TypeToken::synthetic("demo.Api");
        assert!(cast_value(&token, Value::object(vec![1u8])).is_ok());
        assert!(cast_value(&token, Value::int(7)).is_ok());
    }

    #[test]
    fn test_cast_rust_reference() {
        let token = TypeToken::of::<Vec<u8>>();

        let matching = Value::object(vec![1u8, 2u8]);
        assert!(cast_value(&token, matching).is_ok());

        let foreign = Value::object("not a vec".to_string());
        assert!(matches!(
            cast_value(&token, foreign),
            Err(InvokeError::TypeMismatch { .. })
        ));

        // Non-reference values never satisfy a Rust type token
        assert!(cast_value(&token, Value::int(1)).is_err());
    }

    #[test]
    fn test_pack_arguments() {
        let params = vec![TypeToken::of::<i64>(), TypeToken::string()];
        let args = vec![Value::int(1), Value::string("a")];

        let packed = pack_arguments(&params, &args).unwrap();
        assert_eq!(packed, args);
    }

    #[test]
    fn test_pack_arguments_arity() {
        let params = vec![TypeToken::of::<i64>()];
        match pack_arguments(&params, &[]) {
            Err(InvokeError::ArityMismatch { expected, got }) => {
                assert_eq!(expected, 1);
                assert_eq!(got, 0);
            }
            other => panic!("expected ArityMismatch, got {other:?}"),
        }
    }

    #[test]
    fn test_pack_arguments_checks_prims() {
        let params = vec![TypeToken::of::<i64>()];
        assert!(pack_arguments(&params, &[Value::string("no")]).is_err());
    }

    #[test]
    fn test_coerce_void_discards() {
        let out = coerce_result(&TypeToken::void(), Value::int(42)).unwrap();
        assert!(out.is_absent());
    }

    #[test]
    fn test_coerce_prim_zero_for_absent() {
        assert_eq!(
            coerce_result(&TypeToken::of::<i64>(), Value::absent()).unwrap(),
            Value::int(0)
        );
        assert_eq!(
            coerce_result(&TypeToken::of::<f64>(), Value::absent()).unwrap(),
            Value::float(0.0)
        );
        assert_eq!(
            coerce_result(&TypeToken::of::<bool>(), Value::absent()).unwrap(),
            Value::bool(false)
        );
    }

    #[test]
    fn test_coerce_prim_present() {
        assert_eq!(
            coerce_result(&TypeToken::of::<i64>(), Value::int(7)).unwrap(),
            Value::int(7)
        );
        assert!(coerce_result(&TypeToken::of::<i64>(), Value::string("x")).is_err());
    }

    #[test]
    fn test_coerce_reference_casts() {
        let token = TypeToken::string();
        assert!(coerce_result(&token, Value::string("ok")).is_ok());
        assert!(coerce_result(&token, Value::bool(true)).is_err());
    }

    #[test]
    fn test_prim_kind_codes_round_trip() {
        for kind in [PrimKind::Int, PrimKind::Float, PrimKind::Bool] {
            assert_eq!(prim_kind_from_code(kind as u8), Some(kind));
        }
        assert_eq!(prim_kind_from_code(9), None);
    }
}
