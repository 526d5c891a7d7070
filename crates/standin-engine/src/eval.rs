//! Interpreter for generated method bodies
//!
//! Runs a [`Program`] against a live proxy instance. The operand stack
//! holds tagged slots: plain values, type tokens, array handles, and the
//! receiver marker. Arrays have reference semantics (a load of an array
//! local aliases the same backing store), matching the fill-loop shape the
//! synthesizer emits: allocate, store to a local, reload and store one
//! element per index.
//!
//! Marshaling opcodes delegate to the `marshal` module so the interpreted
//! path and the dynamic interface path share one rule set.

use std::cell::RefCell;
use std::rc::Rc;

use standin_sdk::{InvokeError, InvokeResult, TypeToken, Value};

use crate::dispatch;
use crate::emit::{opcode, ArrayKind, ConstantValue, Program};
use crate::instance::ProxyObject;
use crate::marshal;

/// One slot on the operand stack or in the local table
#[derive(Debug, Clone)]
enum Slot {
    /// A plain value
    Value(Value),
    /// A type token
    Type(TypeToken),
    /// Handle to a type token array
    Types(Rc<RefCell<Vec<TypeToken>>>),
    /// Handle to a value array
    Values(Rc<RefCell<Vec<Value>>>),
    /// The receiver marker
    This,
}

fn underflow() -> InvokeError {
    InvokeError::Runtime("Stack underflow".to_string())
}

fn truncated() -> InvokeError {
    InvokeError::Runtime("Truncated bytecode".to_string())
}

fn pop_slot(stack: &mut Vec<Slot>) -> InvokeResult<Slot> {
    stack.pop().ok_or_else(underflow)
}

fn pop_value(stack: &mut Vec<Slot>) -> InvokeResult<Value> {
    match pop_slot(stack)? {
        Slot::Value(value) => Ok(value),
        other => Err(InvokeError::Runtime(format!(
            "Expected a value on the stack, found {other:?}"
        ))),
    }
}

fn read_bytes<'a>(code: &'a [u8], pos: &mut usize, len: usize) -> InvokeResult<&'a [u8]> {
    let end = *pos + len;
    if end > code.len() {
        return Err(truncated());
    }
    let bytes = &code[*pos..end];
    *pos = end;
    Ok(bytes)
}

fn read_u8(code: &[u8], pos: &mut usize) -> InvokeResult<u8> {
    Ok(read_bytes(code, pos, 1)?[0])
}

fn read_u16(code: &[u8], pos: &mut usize) -> InvokeResult<u16> {
    let bytes = read_bytes(code, pos, 2)?;
    Ok(u16::from_le_bytes([bytes[0], bytes[1]]))
}

fn read_u32(code: &[u8], pos: &mut usize) -> InvokeResult<u32> {
    let bytes = read_bytes(code, pos, 4)?;
    Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
}

fn read_i32(code: &[u8], pos: &mut usize) -> InvokeResult<i32> {
    let bytes = read_bytes(code, pos, 4)?;
    Ok(i32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
}

fn read_i64(code: &[u8], pos: &mut usize) -> InvokeResult<i64> {
    let bytes = read_bytes(code, pos, 8)?;
    let mut buf = [0u8; 8];
    buf.copy_from_slice(bytes);
    Ok(i64::from_le_bytes(buf))
}

fn read_f64(code: &[u8], pos: &mut usize) -> InvokeResult<f64> {
    let bytes = read_bytes(code, pos, 8)?;
    let mut buf = [0u8; 8];
    buf.copy_from_slice(bytes);
    Ok(f64::from_le_bytes(buf))
}

fn constant<'a>(program: &'a Program, index: u32) -> InvokeResult<&'a ConstantValue> {
    program
        .constants
        .get(index as usize)
        .ok_or_else(|| InvokeError::Runtime(format!("Constant index {index} out of range")))
}

fn jump(code: &[u8], pos: &mut usize, relative: i32) -> InvokeResult<()> {
    let target = *pos as i64 + relative as i64;
    if target < 0 || target as usize > code.len() {
        return Err(InvokeError::Runtime(format!(
            "Jump target {target} out of range"
        )));
    }
    *pos = target as usize;
    Ok(())
}

/// Run a method body against a proxy instance.
///
/// `args` populate the leading local slots. The result is whatever the
/// body returns; void bodies produce the absent value.
pub fn run(object: &mut ProxyObject, program: &Program, args: &[Value]) -> InvokeResult<Value> {
    if args.len() != program.param_count {
        return Err(InvokeError::ArityMismatch {
            expected: program.param_count,
            got: args.len(),
        });
    }

    let mut locals: Vec<Slot> = Vec::with_capacity(program.local_count);
    for arg in args {
        locals.push(Slot::Value(arg.clone()));
    }
    while locals.len() < program.local_count {
        locals.push(Slot::Value(Value::absent()));
    }

    let mut stack: Vec<Slot> = Vec::with_capacity(program.max_stack);
    let code = &program.code;
    let mut pos = 0usize;

    while pos < code.len() {
        let op = code[pos];
        pos += 1;
        match op {
            opcode::NOP => {}
            opcode::POP => {
                pop_slot(&mut stack)?;
            }
            opcode::DUP => {
                let top = stack.last().cloned().ok_or_else(underflow)?;
                stack.push(top);
            }
            opcode::CONST_ABSENT => stack.push(Slot::Value(Value::absent())),
            opcode::CONST_TRUE => stack.push(Slot::Value(Value::bool(true))),
            opcode::CONST_FALSE => stack.push(Slot::Value(Value::bool(false))),
            opcode::CONST_I64 => {
                let value = read_i64(code, &mut pos)?;
                stack.push(Slot::Value(Value::int(value)));
            }
            opcode::CONST_F64 => {
                let value = read_f64(code, &mut pos)?;
                stack.push(Slot::Value(Value::float(value)));
            }
            opcode::CONST_STR => {
                let index = read_u32(code, &mut pos)?;
                match constant(program, index)? {
                    ConstantValue::String(s) => stack.push(Slot::Value(Value::string(s.clone()))),
                    other => {
                        return Err(InvokeError::Runtime(format!(
                            "CONST_STR expects a string constant, found {other:?}"
                        )))
                    }
                }
            }
            opcode::CONST_TYPE => {
                let index = read_u32(code, &mut pos)?;
                match constant(program, index)? {
                    ConstantValue::Type(token) => stack.push(Slot::Type(token.clone())),
                    other => {
                        return Err(InvokeError::Runtime(format!(
                            "CONST_TYPE expects a type constant, found {other:?}"
                        )))
                    }
                }
            }
            opcode::LOAD_LOCAL => {
                let index = read_u16(code, &mut pos)? as usize;
                let slot = locals
                    .get(index)
                    .cloned()
                    .ok_or_else(|| InvokeError::Runtime(format!("Local {index} out of range")))?;
                stack.push(slot);
            }
            opcode::STORE_LOCAL => {
                let index = read_u16(code, &mut pos)? as usize;
                let slot = pop_slot(&mut stack)?;
                match locals.get_mut(index) {
                    Some(dest) => *dest = slot,
                    None => {
                        return Err(InvokeError::Runtime(format!("Local {index} out of range")))
                    }
                }
            }
            opcode::LOAD_THIS => stack.push(Slot::This),
            opcode::NEW_ARRAY => {
                let kind_code = read_u8(code, &mut pos)?;
                let kind = ArrayKind::from_code(kind_code).ok_or_else(|| {
                    InvokeError::Runtime(format!("Unknown array kind {kind_code}"))
                })?;
                let length = pop_value(&mut stack)?
                    .as_int()
                    .filter(|len| *len >= 0)
                    .ok_or_else(|| {
                        InvokeError::Runtime("Array length must be a non-negative integer".to_string())
                    })? as usize;
                match kind {
                    ArrayKind::Types => stack.push(Slot::Types(Rc::new(RefCell::new(vec![
                        TypeToken::void();
                        length
                    ])))),
                    ArrayKind::Values => stack.push(Slot::Values(Rc::new(RefCell::new(vec![
                        Value::absent();
                        length
                    ])))),
                }
            }
            opcode::ARRAY_STORE => {
                let element = pop_slot(&mut stack)?;
                let index = pop_value(&mut stack)?
                    .as_int()
                    .filter(|i| *i >= 0)
                    .ok_or_else(|| {
                        InvokeError::Runtime("Array index must be a non-negative integer".to_string())
                    })? as usize;
                let array = pop_slot(&mut stack)?;
                match (array, element) {
                    (Slot::Types(handle), Slot::Type(token)) => {
                        let mut tokens = handle.borrow_mut();
                        match tokens.get_mut(index) {
                            Some(dest) => *dest = token,
                            None => {
                                return Err(InvokeError::Runtime(format!(
                                    "Array index {index} out of range"
                                )))
                            }
                        }
                    }
                    (Slot::Values(handle), Slot::Value(value)) => {
                        let mut values = handle.borrow_mut();
                        match values.get_mut(index) {
                            Some(dest) => *dest = value,
                            None => {
                                return Err(InvokeError::Runtime(format!(
                                    "Array index {index} out of range"
                                )))
                            }
                        }
                    }
                    (array, element) => {
                        return Err(InvokeError::Runtime(format!(
                            "Array store kind mismatch: {array:?} <- {element:?}"
                        )))
                    }
                }
            }
            opcode::ARRAY_LOAD => {
                let index = pop_value(&mut stack)?
                    .as_int()
                    .filter(|i| *i >= 0)
                    .ok_or_else(|| {
                        InvokeError::Runtime("Array index must be a non-negative integer".to_string())
                    })? as usize;
                let array = pop_slot(&mut stack)?;
                match array {
                    Slot::Types(handle) => {
                        let token = handle.borrow().get(index).cloned().ok_or_else(|| {
                            InvokeError::Runtime(format!("Array index {index} out of range"))
                        })?;
                        stack.push(Slot::Type(token));
                    }
                    Slot::Values(handle) => {
                        let value = handle.borrow().get(index).cloned().ok_or_else(|| {
                            InvokeError::Runtime(format!("Array index {index} out of range"))
                        })?;
                        stack.push(Slot::Value(value));
                    }
                    other => {
                        return Err(InvokeError::Runtime(format!(
                            "Array load from non-array slot {other:?}"
                        )))
                    }
                }
            }
            opcode::LOAD_FIELD => {
                let index = read_u16(code, &mut pos)? as usize;
                match pop_slot(&mut stack)? {
                    Slot::This => {}
                    other => {
                        return Err(InvokeError::Runtime(format!(
                            "Field load needs the receiver, found {other:?}"
                        )))
                    }
                }
                let value = object.field(index).cloned().ok_or_else(|| {
                    InvokeError::Runtime(format!("Field index {index} out of range"))
                })?;
                stack.push(Slot::Value(value));
            }
            opcode::STORE_FIELD => {
                let index = read_u16(code, &mut pos)? as usize;
                let value = pop_value(&mut stack)?;
                match pop_slot(&mut stack)? {
                    Slot::This => {}
                    other => {
                        return Err(InvokeError::Runtime(format!(
                            "Field store needs the receiver, found {other:?}"
                        )))
                    }
                }
                if !object.set_field(index, value) {
                    return Err(InvokeError::Runtime(format!(
                        "Field index {index} out of range"
                    )));
                }
            }
            opcode::BOX => {
                let kind_code = read_u8(code, &mut pos)?;
                let kind = marshal::prim_kind_from_code(kind_code).ok_or_else(|| {
                    InvokeError::Runtime(format!("Unknown primitive kind {kind_code}"))
                })?;
                let value = pop_value(&mut stack)?;
                stack.push(Slot::Value(marshal::box_value(kind, value)?));
            }
            opcode::UNBOX => {
                let kind_code = read_u8(code, &mut pos)?;
                let kind = marshal::prim_kind_from_code(kind_code).ok_or_else(|| {
                    InvokeError::Runtime(format!("Unknown primitive kind {kind_code}"))
                })?;
                let value = pop_value(&mut stack)?;
                stack.push(Slot::Value(marshal::unbox_value(kind, value)?));
            }
            opcode::CAST => {
                let index = read_u32(code, &mut pos)?;
                let token = match constant(program, index)? {
                    ConstantValue::Type(token) => token.clone(),
                    other => {
                        return Err(InvokeError::Runtime(format!(
                            "CAST expects a type constant, found {other:?}"
                        )))
                    }
                };
                let value = pop_value(&mut stack)?;
                stack.push(Slot::Value(marshal::cast_value(&token, value)?));
            }
            opcode::JMP => {
                let relative = read_i32(code, &mut pos)?;
                jump(code, &mut pos, relative)?;
            }
            opcode::JMP_IF_ABSENT => {
                let relative = read_i32(code, &mut pos)?;
                let value = pop_value(&mut stack)?;
                if value.is_absent() {
                    jump(code, &mut pos, relative)?;
                }
            }
            opcode::INVOKE_DISPATCH => {
                match pop_slot(&mut stack)? {
                    Slot::This => {}
                    other => {
                        return Err(InvokeError::Runtime(format!(
                            "Dispatch needs the receiver, found {other:?}"
                        )))
                    }
                }
                let values = match pop_slot(&mut stack)? {
                    Slot::Values(handle) => handle.borrow().clone(),
                    other => {
                        return Err(InvokeError::Runtime(format!(
                            "Dispatch needs a value array, found {other:?}"
                        )))
                    }
                };
                let types = match pop_slot(&mut stack)? {
                    Slot::Types(handle) => handle.borrow().clone(),
                    other => {
                        return Err(InvokeError::Runtime(format!(
                            "Dispatch needs a type array, found {other:?}"
                        )))
                    }
                };
                let name = pop_value(&mut stack)?;
                let name = name.as_str().ok_or_else(|| {
                    InvokeError::Runtime("Dispatch needs a method name".to_string())
                })?;
                let result = dispatch::notify_interceptor(object, name, &types, &values)?;
                stack.push(Slot::Value(result));
            }
            opcode::INVOKE_SUPER => {
                let slot = read_u16(code, &mut pos)? as usize;
                let class = object.class().clone();
                let method = class.schema.methods.get(slot).ok_or_else(|| {
                    InvokeError::Runtime(format!("No schema method at slot {slot}"))
                })?;
                let invoker = method
                    .invoker
                    .ok_or_else(|| InvokeError::NoOriginal(method.name.clone()))?;
                let mut call_args = Vec::with_capacity(method.arity());
                for _ in 0..method.arity() {
                    call_args.push(pop_value(&mut stack)?);
                }
                call_args.reverse();
                let receiver = object
                    .base_mut()
                    .ok_or_else(|| InvokeError::NoOriginal(method.name.clone()))?;
                let result = invoker(receiver, &call_args)?;
                stack.push(Slot::Value(result));
            }
            opcode::RETURN => return pop_value(&mut stack),
            opcode::RETURN_VOID => return Ok(Value::absent()),
            other => {
                return Err(InvokeError::Runtime(format!(
                    "Unknown opcode 0x{other:02X}"
                )))
            }
        }
    }

    Err(InvokeError::Runtime(format!(
        "Method `{}` ended without a return",
        program.name
    )))
}
