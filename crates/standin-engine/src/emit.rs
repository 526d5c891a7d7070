//! Bytecode emission for synthesized proxy methods
//!
//! Provides the assemblers that proxy synthesis drives: [`MethodAssembler`]
//! emits one method body as stack bytecode with label patching and stack
//! tracking, [`ClassAssembler`] collects the emitted members into a
//! [`ProxyClassDefinition`] ready for loading.
//!
//! ## Instruction Set
//!
//! | Opcode          | Operands            | Stack effect                          |
//! |-----------------|---------------------|---------------------------------------|
//! | NOP             |                     |                                       |
//! | POP             |                     | value →                               |
//! | DUP             |                     | value → value value                   |
//! | CONST_ABSENT    |                     | → absent                              |
//! | CONST_TRUE      |                     | → true                                |
//! | CONST_FALSE     |                     | → false                               |
//! | CONST_I64       | i64                 | → int                                 |
//! | CONST_F64       | f64                 | → float                               |
//! | CONST_STR       | u32 pool index      | → string                              |
//! | CONST_TYPE      | u32 pool index      | → type                                |
//! | LOAD_LOCAL      | u16 index           | → value                               |
//! | STORE_LOCAL     | u16 index           | value →                               |
//! | LOAD_THIS       |                     | → this                                |
//! | NEW_ARRAY       | u8 element kind     | length → array                        |
//! | ARRAY_STORE     |                     | array index value →                   |
//! | ARRAY_LOAD      |                     | array index → value                   |
//! | LOAD_FIELD      | u16 index           | this → value                          |
//! | STORE_FIELD     | u16 index           | this value →                          |
//! | BOX             | u8 prim kind        | prim → boxed                          |
//! | UNBOX           | u8 prim kind        | boxed → prim                          |
//! | CAST            | u32 pool index      | value → value                         |
//! | JMP             | i32 relative        |                                       |
//! | JMP_IF_ABSENT   | i32 relative        | value →                               |
//! | INVOKE_DISPATCH |                     | name types values this → result       |
//! | INVOKE_SUPER    | u16 method slot     | arg* → result                         |
//! | RETURN          |                     | value →                               |
//! | RETURN_VOID     |                     |                                       |
//!
//! Jump operands are relative to the offset following the 4-byte field.
//! INVOKE_SUPER takes its argument count from the schema entry at the
//! operand slot.

use rustc_hash::FxHashMap;

use standin_sdk::{PrimKind, TypeToken};

use crate::descriptor::TypeDescriptor;
use crate::{ProxyError, ProxyResult};

/// Opcode constants for generated method bodies
pub mod opcode {
    // Stack manipulation
    pub const NOP: u8 = 0x00;
    pub const POP: u8 = 0x01;
    pub const DUP: u8 = 0x02;
    pub const CONST_ABSENT: u8 = 0x03;
    pub const CONST_TRUE: u8 = 0x04;
    pub const CONST_FALSE: u8 = 0x05;
    pub const CONST_I64: u8 = 0x06;
    pub const CONST_F64: u8 = 0x07;
    pub const CONST_STR: u8 = 0x08;
    pub const CONST_TYPE: u8 = 0x09;

    // Locals
    pub const LOAD_LOCAL: u8 = 0x10;
    pub const STORE_LOCAL: u8 = 0x11;
    pub const LOAD_THIS: u8 = 0x12;

    // Arrays
    pub const NEW_ARRAY: u8 = 0x20;
    pub const ARRAY_STORE: u8 = 0x21;
    pub const ARRAY_LOAD: u8 = 0x22;

    // Fields
    pub const LOAD_FIELD: u8 = 0x30;
    pub const STORE_FIELD: u8 = 0x31;

    // Marshaling
    pub const BOX: u8 = 0x40;
    pub const UNBOX: u8 = 0x41;
    pub const CAST: u8 = 0x42;

    // Control flow
    pub const JMP: u8 = 0x50;
    pub const JMP_IF_ABSENT: u8 = 0x51;

    // Invocation
    pub const INVOKE_DISPATCH: u8 = 0x60;
    pub const INVOKE_SUPER: u8 = 0x61;

    // Returns
    pub const RETURN: u8 = 0x70;
    pub const RETURN_VOID: u8 = 0x71;
}

/// Element kind operand for NEW_ARRAY
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArrayKind {
    /// Array of type tokens
    Types,
    /// Array of boxed values
    Values,
}

impl ArrayKind {
    /// Operand byte for this kind
    pub fn code(self) -> u8 {
        match self {
            ArrayKind::Types => 0,
            ArrayKind::Values => 1,
        }
    }

    /// Decode an operand byte
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(ArrayKind::Types),
            1 => Some(ArrayKind::Values),
            _ => None,
        }
    }
}

/// A label for jump targets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Label {
    /// Unique label ID within the assembler
    pub id: usize,
}

/// Unresolved jump that needs label patching
#[derive(Debug, Clone)]
struct UnresolvedJump {
    /// Position in bytecode where the offset needs to be written
    offset_position: usize,
    /// Target label
    target_label: Label,
}

/// Kind tracked on the operand stack for validation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotKind {
    /// Absent value
    Absent,
    /// Boolean
    Boolean,
    /// Integer
    Integer,
    /// Float
    Float,
    /// String
    String,
    /// Boxed value of unknown shape
    Object,
    /// Type token
    TypeRef,
    /// Array of type tokens
    TypeArray,
    /// Array of boxed values
    ValueArray,
    /// The receiver
    This,
    /// Unknown/any kind
    Unknown,
}

impl SlotKind {
    fn for_prim(kind: PrimKind) -> Self {
        match kind {
            PrimKind::Int => SlotKind::Integer,
            PrimKind::Float => SlotKind::Float,
            PrimKind::Bool => SlotKind::Boolean,
        }
    }
}

/// Local variable information
#[derive(Debug, Clone)]
pub struct LocalSlot {
    /// Variable name (optional, for diagnostics)
    pub name: Option<String>,
    /// Tracked kind
    pub kind: SlotKind,
    /// Index in the local table
    pub index: usize,
}

/// Constant pool entry
#[derive(Debug, Clone, PartialEq)]
pub enum ConstantValue {
    /// String constant
    String(String),
    /// Integer constant
    Integer(i64),
    /// Float constant
    Float(f64),
    /// Type token constant
    Type(TypeToken),
}

/// Result of bytecode validation
#[derive(Debug, Clone)]
pub struct ValidationResult {
    /// Whether validation passed
    pub is_valid: bool,
    /// Validation errors
    pub errors: Vec<String>,
}

/// A finished method body ready for evaluation
#[derive(Debug, Clone)]
pub struct Program {
    /// Method name
    pub name: String,
    /// Parameter count
    pub param_count: usize,
    /// Local variable count
    pub local_count: usize,
    /// Maximum stack depth
    pub max_stack: usize,
    /// Bytecode
    pub code: Vec<u8>,
    /// Constant pool
    pub constants: Vec<ConstantValue>,
}

/// Assembler for one method body
#[derive(Debug)]
pub struct MethodAssembler {
    /// Method name
    pub name: String,
    /// Parameter count
    pub param_count: usize,
    /// Bytecode buffer
    code: Vec<u8>,
    /// Local variables (parameters occupy the leading slots)
    locals: Vec<LocalSlot>,
    /// Next label ID
    next_label_id: usize,
    /// Label positions (label ID -> bytecode offset)
    label_positions: FxHashMap<usize, usize>,
    /// Unresolved jumps that need patching
    unresolved_jumps: Vec<UnresolvedJump>,
    /// Operand stack for validation
    type_stack: Vec<SlotKind>,
    /// Maximum stack depth reached
    max_stack: usize,
    /// Constant pool
    constants: Vec<ConstantValue>,
    /// Whether build() has been called
    finalized: bool,
    /// Validation errors accumulated
    errors: Vec<String>,
}

impl MethodAssembler {
    /// Create an assembler with the parameter slots pre-declared
    pub fn new(name: impl Into<String>, param_count: usize) -> Self {
        let mut assembler = Self {
            name: name.into(),
            param_count,
            code: Vec::with_capacity(64),
            locals: Vec::with_capacity(param_count + 4),
            next_label_id: 0,
            label_positions: FxHashMap::default(),
            unresolved_jumps: Vec::new(),
            type_stack: Vec::with_capacity(8),
            max_stack: 0,
            constants: Vec::new(),
            finalized: false,
            errors: Vec::new(),
        };
        for index in 0..param_count {
            assembler.locals.push(LocalSlot {
                name: None,
                kind: SlotKind::Unknown,
                index,
            });
        }
        assembler
    }

    fn guard(&self) -> ProxyResult<()> {
        if self.finalized {
            return Err(ProxyError::Synthesis(
                "Cannot modify finalized MethodAssembler".to_string(),
            ));
        }
        Ok(())
    }

    fn current_offset(&self) -> usize {
        self.code.len()
    }

    fn push_kind(&mut self, kind: SlotKind) {
        self.type_stack.push(kind);
        if self.type_stack.len() > self.max_stack {
            self.max_stack = self.type_stack.len();
        }
    }

    fn pop_kind(&mut self) -> Option<SlotKind> {
        self.type_stack.pop()
    }

    fn emit_byte(&mut self, byte: u8) {
        self.code.push(byte);
    }

    fn emit_u16(&mut self, value: u16) {
        self.code.extend_from_slice(&value.to_le_bytes());
    }

    fn emit_u32(&mut self, value: u32) {
        self.code.extend_from_slice(&value.to_le_bytes());
    }

    fn emit_i32(&mut self, value: i32) {
        self.code.extend_from_slice(&value.to_le_bytes());
    }

    // ===== Constants =====

    /// Emit NOP
    pub fn emit_nop(&mut self) -> ProxyResult<()> {
        self.guard()?;
        self.emit_byte(opcode::NOP);
        Ok(())
    }

    /// Emit POP
    pub fn emit_pop(&mut self) -> ProxyResult<()> {
        self.guard()?;
        self.pop_kind();
        self.emit_byte(opcode::POP);
        Ok(())
    }

    /// Emit DUP
    pub fn emit_dup(&mut self) -> ProxyResult<()> {
        self.guard()?;
        if let Some(kind) = self.type_stack.last().copied() {
            self.push_kind(kind);
        }
        self.emit_byte(opcode::DUP);
        Ok(())
    }

    /// Push the absent value
    pub fn emit_push_absent(&mut self) -> ProxyResult<()> {
        self.guard()?;
        self.push_kind(SlotKind::Absent);
        self.emit_byte(opcode::CONST_ABSENT);
        Ok(())
    }

    /// Push a boolean constant
    pub fn emit_push_bool(&mut self, value: bool) -> ProxyResult<()> {
        self.guard()?;
        self.push_kind(SlotKind::Boolean);
        if value {
            self.emit_byte(opcode::CONST_TRUE);
        } else {
            self.emit_byte(opcode::CONST_FALSE);
        }
        Ok(())
    }

    /// Push an integer constant
    pub fn emit_push_int(&mut self, value: i64) -> ProxyResult<()> {
        self.guard()?;
        self.push_kind(SlotKind::Integer);
        self.emit_byte(opcode::CONST_I64);
        self.code.extend_from_slice(&value.to_le_bytes());
        Ok(())
    }

    /// Push a float constant
    pub fn emit_push_float(&mut self, value: f64) -> ProxyResult<()> {
        self.guard()?;
        self.push_kind(SlotKind::Float);
        self.emit_byte(opcode::CONST_F64);
        self.code.extend_from_slice(&value.to_le_bytes());
        Ok(())
    }

    /// Push a string constant through the pool
    pub fn emit_push_str(&mut self, value: impl Into<String>) -> ProxyResult<()> {
        self.guard()?;
        let index = self.constants.len();
        self.constants.push(ConstantValue::String(value.into()));
        self.push_kind(SlotKind::String);
        self.emit_byte(opcode::CONST_STR);
        self.emit_u32(index as u32);
        Ok(())
    }

    /// Push a type token through the pool
    pub fn emit_push_type(&mut self, token: TypeToken) -> ProxyResult<()> {
        self.guard()?;
        let index = self.constants.len();
        self.constants.push(ConstantValue::Type(token));
        self.push_kind(SlotKind::TypeRef);
        self.emit_byte(opcode::CONST_TYPE);
        self.emit_u32(index as u32);
        Ok(())
    }

    // ===== Locals =====

    /// Declare a local variable
    pub fn declare_local(
        &mut self,
        name: Option<String>,
        kind: SlotKind,
    ) -> ProxyResult<usize> {
        self.guard()?;
        let index = self.locals.len();
        self.locals.push(LocalSlot { name, kind, index });
        Ok(index)
    }

    /// Emit load local variable
    pub fn emit_load_local(&mut self, index: usize) -> ProxyResult<()> {
        self.guard()?;
        let kind = self
            .locals
            .get(index)
            .map(|l| l.kind)
            .unwrap_or(SlotKind::Unknown);
        self.push_kind(kind);
        self.emit_byte(opcode::LOAD_LOCAL);
        self.emit_u16(index as u16);
        Ok(())
    }

    /// Emit store local variable
    pub fn emit_store_local(&mut self, index: usize) -> ProxyResult<()> {
        self.guard()?;
        self.pop_kind();
        self.emit_byte(opcode::STORE_LOCAL);
        self.emit_u16(index as u16);
        Ok(())
    }

    /// Push the receiver
    pub fn emit_load_this(&mut self) -> ProxyResult<()> {
        self.guard()?;
        self.push_kind(SlotKind::This);
        self.emit_byte(opcode::LOAD_THIS);
        Ok(())
    }

    // ===== Labels and Control Flow =====

    /// Define a new label
    pub fn define_label(&mut self) -> Label {
        let label = Label {
            id: self.next_label_id,
        };
        self.next_label_id += 1;
        label
    }

    /// Mark the current position with a label
    pub fn mark_label(&mut self, label: Label) -> ProxyResult<()> {
        self.guard()?;
        self.label_positions.insert(label.id, self.current_offset());
        Ok(())
    }

    /// Emit unconditional jump to label
    pub fn emit_jump(&mut self, label: Label) -> ProxyResult<()> {
        self.guard()?;
        self.emit_byte(opcode::JMP);
        let offset_position = self.current_offset();
        self.emit_i32(0); // Placeholder, patched in build()
        self.unresolved_jumps.push(UnresolvedJump {
            offset_position,
            target_label: label,
        });
        Ok(())
    }

    /// Emit jump taken when the popped value is absent
    pub fn emit_jump_if_absent(&mut self, label: Label) -> ProxyResult<()> {
        self.guard()?;
        self.pop_kind();
        self.emit_byte(opcode::JMP_IF_ABSENT);
        let offset_position = self.current_offset();
        self.emit_i32(0); // Placeholder
        self.unresolved_jumps.push(UnresolvedJump {
            offset_position,
            target_label: label,
        });
        Ok(())
    }

    // ===== Arrays =====

    /// Emit new array (pops length)
    pub fn emit_new_array(&mut self, kind: ArrayKind) -> ProxyResult<()> {
        self.guard()?;
        self.pop_kind();
        self.push_kind(match kind {
            ArrayKind::Types => SlotKind::TypeArray,
            ArrayKind::Values => SlotKind::ValueArray,
        });
        self.emit_byte(opcode::NEW_ARRAY);
        self.emit_byte(kind.code());
        Ok(())
    }

    /// Emit array store (pops value, index, array)
    pub fn emit_array_store(&mut self) -> ProxyResult<()> {
        self.guard()?;
        self.pop_kind();
        self.pop_kind();
        self.pop_kind();
        self.emit_byte(opcode::ARRAY_STORE);
        Ok(())
    }

    /// Emit array load (pops index, array)
    pub fn emit_array_load(&mut self) -> ProxyResult<()> {
        self.guard()?;
        self.pop_kind();
        self.pop_kind();
        self.push_kind(SlotKind::Unknown);
        self.emit_byte(opcode::ARRAY_LOAD);
        Ok(())
    }

    // ===== Fields =====

    /// Emit load field (pops the receiver)
    pub fn emit_load_field(&mut self, index: u16) -> ProxyResult<()> {
        self.guard()?;
        self.pop_kind();
        self.push_kind(SlotKind::Unknown);
        self.emit_byte(opcode::LOAD_FIELD);
        self.emit_u16(index);
        Ok(())
    }

    /// Emit store field (pops value and receiver)
    pub fn emit_store_field(&mut self, index: u16) -> ProxyResult<()> {
        self.guard()?;
        self.pop_kind();
        self.pop_kind();
        self.emit_byte(opcode::STORE_FIELD);
        self.emit_u16(index);
        Ok(())
    }

    // ===== Marshaling =====

    /// Emit box (prim to boxed value)
    pub fn emit_box(&mut self, kind: PrimKind) -> ProxyResult<()> {
        self.guard()?;
        self.pop_kind();
        self.push_kind(SlotKind::Object);
        self.emit_byte(opcode::BOX);
        self.emit_byte(kind as u8);
        Ok(())
    }

    /// Emit unbox (boxed value to prim)
    pub fn emit_unbox(&mut self, kind: PrimKind) -> ProxyResult<()> {
        self.guard()?;
        self.pop_kind();
        self.push_kind(SlotKind::for_prim(kind));
        self.emit_byte(opcode::UNBOX);
        self.emit_byte(kind as u8);
        Ok(())
    }

    /// Emit checked cast against a pooled type token
    pub fn emit_cast(&mut self, token: TypeToken) -> ProxyResult<()> {
        self.guard()?;
        let index = self.constants.len();
        self.constants.push(ConstantValue::Type(token));
        self.pop_kind();
        self.push_kind(SlotKind::Object);
        self.emit_byte(opcode::CAST);
        self.emit_u32(index as u32);
        Ok(())
    }

    // ===== Invocation =====

    /// Emit interceptor dispatch (pops name, type array, value array, receiver)
    pub fn emit_invoke_dispatch(&mut self) -> ProxyResult<()> {
        self.guard()?;
        self.pop_kind(); // this
        self.pop_kind(); // values
        self.pop_kind(); // types
        self.pop_kind(); // name
        self.push_kind(SlotKind::Object);
        self.emit_byte(opcode::INVOKE_DISPATCH);
        Ok(())
    }

    /// Emit direct invocation of the base method at a schema slot.
    ///
    /// `arity` is the argument count popped from the stack; the evaluator
    /// recovers it from the schema entry.
    pub fn emit_invoke_super(&mut self, slot: u16, arity: usize) -> ProxyResult<()> {
        self.guard()?;
        for _ in 0..arity {
            self.pop_kind();
        }
        self.push_kind(SlotKind::Object);
        self.emit_byte(opcode::INVOKE_SUPER);
        self.emit_u16(slot);
        Ok(())
    }

    /// Emit return with value
    pub fn emit_return(&mut self) -> ProxyResult<()> {
        self.guard()?;
        self.pop_kind();
        self.emit_byte(opcode::RETURN);
        Ok(())
    }

    /// Emit return void
    pub fn emit_return_void(&mut self) -> ProxyResult<()> {
        self.guard()?;
        self.emit_byte(opcode::RETURN_VOID);
        Ok(())
    }

    // ===== Validation =====

    /// Validate the assembled body
    pub fn validate(&mut self) -> ValidationResult {
        self.errors.clear();

        // Check all labels are marked
        for jump in &self.unresolved_jumps {
            if !self.label_positions.contains_key(&jump.target_label.id) {
                self.errors.push(format!(
                    "Label {} is used but never marked",
                    jump.target_label.id
                ));
            }
        }

        // Check stack is balanced
        if !self.type_stack.is_empty() {
            self.errors.push(format!(
                "Stack not balanced: {} values remaining",
                self.type_stack.len()
            ));
        }

        ValidationResult {
            is_valid: self.errors.is_empty(),
            errors: self.errors.clone(),
        }
    }

    /// Build the method body, resolving all labels
    pub fn build(&mut self) -> ProxyResult<Program> {
        if self.finalized {
            return Err(ProxyError::Synthesis(
                "MethodAssembler already finalized".to_string(),
            ));
        }

        let validation = self.validate();
        if !validation.is_valid {
            return Err(ProxyError::Synthesis(format!(
                "Bytecode validation failed for `{}`: {}",
                self.name,
                validation.errors.join("; ")
            )));
        }

        // Resolve all jump labels
        for jump in &self.unresolved_jumps {
            let target_offset = self.label_positions[&jump.target_label.id];
            // Relative offset from the instruction after the jump field
            let relative_offset = (target_offset as i32) - ((jump.offset_position + 4) as i32);
            let bytes = relative_offset.to_le_bytes();
            self.code[jump.offset_position..jump.offset_position + 4].copy_from_slice(&bytes);
        }

        self.finalized = true;

        Ok(Program {
            name: self.name.clone(),
            param_count: self.param_count,
            local_count: self.locals.len().max(self.param_count),
            max_stack: self.max_stack,
            code: self.code.clone(),
            constants: self.constants.clone(),
        })
    }
}

// ============================================================================
// Class Assembly
// ============================================================================

/// A declared field on a synthesized class
#[derive(Debug, Clone)]
pub struct FieldDef {
    /// Field name
    pub name: String,
    /// Declared type
    pub token: TypeToken,
    /// Index in the instance field table
    pub index: u16,
}

/// One emitted method attached to a class definition
#[derive(Debug, Clone)]
pub struct EmittedMethod {
    /// Method name
    pub name: String,
    /// Declared parameter types
    pub params: Vec<TypeToken>,
    /// Declared return type
    pub return_type: TypeToken,
    /// Assembled body
    pub program: Program,
}

/// Constructor slot mirroring one schema constructor
#[derive(Debug, Clone)]
pub struct CtorSlot {
    /// Declared parameter types
    pub params: Vec<TypeToken>,
    /// Index into the target schema's constructor table
    pub index: usize,
}

/// A complete synthesized class, ready for the loader
#[derive(Debug, Clone)]
pub struct ProxyClassDefinition {
    /// Synthesized class name
    pub name: String,
    /// Name of the extended target type
    pub target_name: String,
    /// Implemented marker interfaces
    pub interfaces: Vec<String>,
    /// Declared instance fields
    pub fields: Vec<FieldDef>,
    /// Emitted methods
    pub methods: Vec<EmittedMethod>,
    /// Constructor table
    pub constructors: Vec<CtorSlot>,
    /// Type descriptor table from the synthesis session
    pub types: Vec<TypeDescriptor>,
}

/// Assembler collecting emitted members into a class definition
#[derive(Debug)]
pub struct ClassAssembler {
    name: String,
    target_name: String,
    interfaces: Vec<String>,
    fields: Vec<FieldDef>,
    methods: Vec<EmittedMethod>,
    constructors: Vec<CtorSlot>,
    finalized: bool,
}

impl ClassAssembler {
    /// Create an assembler for a class extending `target_name`
    pub fn new(name: impl Into<String>, target_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            target_name: target_name.into(),
            interfaces: Vec::new(),
            fields: Vec::new(),
            methods: Vec::new(),
            constructors: Vec::new(),
            finalized: false,
        }
    }

    fn guard(&self) -> ProxyResult<()> {
        if self.finalized {
            return Err(ProxyError::Synthesis(
                "Cannot modify finalized ClassAssembler".to_string(),
            ));
        }
        Ok(())
    }

    /// Synthesized class name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declare an implemented interface
    pub fn add_interface(&mut self, name: impl Into<String>) -> ProxyResult<()> {
        self.guard()?;
        self.interfaces.push(name.into());
        Ok(())
    }

    /// Declare an instance field, returning its index
    pub fn declare_field(&mut self, name: impl Into<String>, token: TypeToken) -> ProxyResult<u16> {
        self.guard()?;
        let name = name.into();
        if self.fields.iter().any(|f| f.name == name) {
            return Err(ProxyError::Synthesis(format!(
                "Duplicate field `{}` on `{}`",
                name, self.name
            )));
        }
        let index = self.fields.len() as u16;
        self.fields.push(FieldDef { name, token, index });
        Ok(index)
    }

    /// Attach an emitted method
    pub fn add_method(&mut self, method: EmittedMethod) -> ProxyResult<()> {
        self.guard()?;
        if self.methods.iter().any(|m| m.name == method.name) {
            return Err(ProxyError::Synthesis(format!(
                "Duplicate method `{}` on `{}`",
                method.name, self.name
            )));
        }
        self.methods.push(method);
        Ok(())
    }

    /// Attach a constructor slot
    pub fn add_constructor(&mut self, ctor: CtorSlot) -> ProxyResult<()> {
        self.guard()?;
        self.constructors.push(ctor);
        Ok(())
    }

    /// Finish the class, attaching the session's descriptor table
    pub fn finish(mut self, types: Vec<TypeDescriptor>) -> ProxyClassDefinition {
        self.finalized = true;
        ProxyClassDefinition {
            name: self.name,
            target_name: self.target_name,
            interfaces: self.interfaces,
            fields: self.fields,
            methods: self.methods,
            constructors: self.constructors,
            types,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_method_assembler_creation() {
        let assembler = MethodAssembler::new("test", 2);
        assert_eq!(assembler.name, "test");
        assert_eq!(assembler.param_count, 2);
        assert!(!assembler.finalized);
        assert_eq!(assembler.locals.len(), 2);
    }

    #[test]
    fn test_emit_constants() {
        let mut assembler = MethodAssembler::new("test", 0);

        assembler.emit_push_absent().unwrap();
        assembler.emit_push_bool(true).unwrap();
        assembler.emit_push_bool(false).unwrap();
        assembler.emit_push_int(42).unwrap();

        assert!(!assembler.code.is_empty());
        assert_eq!(assembler.type_stack.len(), 4);
    }

    #[test]
    fn test_pooled_constants() {
        let mut assembler = MethodAssembler::new("test", 0);

        assembler.emit_push_str("add").unwrap();
        assembler.emit_push_type(TypeToken::of::<i64>()).unwrap();
        assembler.emit_pop().unwrap();
        assembler.emit_return().unwrap();

        let program = assembler.build().unwrap();
        assert_eq!(program.constants.len(), 2);
        match &program.constants[0] {
            ConstantValue::String(s) => assert_eq!(s, "add"),
            other => panic!("expected string constant, got {other:?}"),
        }
        match &program.constants[1] {
            ConstantValue::Type(token) => assert!(token.is::<i64>()),
            other => panic!("expected type constant, got {other:?}"),
        }
    }

    #[test]
    fn test_labels_and_jumps() {
        let mut assembler = MethodAssembler::new("cond", 1);

        let absent_label = assembler.define_label();
        let end_label = assembler.define_label();

        assembler.emit_load_local(0).unwrap();
        assembler.emit_jump_if_absent(absent_label).unwrap();

        assembler.emit_push_int(1).unwrap();
        assembler.emit_jump(end_label).unwrap();

        assembler.mark_label(absent_label).unwrap();
        assembler.emit_push_int(0).unwrap();

        assembler.mark_label(end_label).unwrap();
        assembler.emit_return().unwrap();

        assert!(assembler.build().is_ok());
    }

    #[test]
    fn test_jump_offsets_are_relative_to_next_instruction() {
        let mut assembler = MethodAssembler::new("fwd", 0);

        let label = assembler.define_label();
        assembler.emit_jump(label).unwrap();
        assembler.emit_push_absent().unwrap();
        assembler.mark_label(label).unwrap();
        assembler.emit_return_void().unwrap();

        let program = assembler.build().unwrap();
        // JMP at 0, offset field at 1..5, CONST_ABSENT at 5, target at 6.
        // Relative offset = 6 - (1 + 4) = 1.
        assert_eq!(program.code[0], opcode::JMP);
        assert_eq!(
            i32::from_le_bytes([
                program.code[1],
                program.code[2],
                program.code[3],
                program.code[4]
            ]),
            1
        );
    }

    #[test]
    fn test_validation_unmarked_label() {
        let mut assembler = MethodAssembler::new("test", 0);

        let label = assembler.define_label();
        assembler.emit_jump(label).unwrap();
        // Don't mark the label

        let validation = assembler.validate();
        assert!(!validation.is_valid);
        assert!(validation.errors[0].contains("never marked"));
    }

    #[test]
    fn test_validation_unbalanced_stack() {
        let mut assembler = MethodAssembler::new("test", 0);

        assembler.emit_push_int(1).unwrap();
        assembler.emit_push_int(2).unwrap();
        assembler.emit_return().unwrap();

        let validation = assembler.validate();
        assert!(!validation.is_valid);
        assert!(validation.errors[0].contains("not balanced"));
    }

    #[test]
    fn test_cannot_modify_finalized() {
        let mut assembler = MethodAssembler::new("test", 0);
        assembler.emit_return_void().unwrap();
        assembler.build().unwrap();

        assert!(assembler.emit_push_int(42).is_err());
        assert!(assembler.build().is_err());
    }

    #[test]
    fn test_local_variables() {
        let mut assembler = MethodAssembler::new("locals", 1);

        let types = assembler
            .declare_local(Some("types".to_string()), SlotKind::TypeArray)
            .unwrap();
        let values = assembler
            .declare_local(Some("values".to_string()), SlotKind::ValueArray)
            .unwrap();
        assert_eq!(types, 1);
        assert_eq!(values, 2);

        assembler.emit_push_int(0).unwrap();
        assembler.emit_new_array(ArrayKind::Types).unwrap();
        assembler.emit_store_local(types).unwrap();
        assembler.emit_push_int(0).unwrap();
        assembler.emit_new_array(ArrayKind::Values).unwrap();
        assembler.emit_store_local(values).unwrap();
        assembler.emit_return_void().unwrap();

        let program = assembler.build().unwrap();
        assert_eq!(program.local_count, 3);
        assert_eq!(program.param_count, 1);
    }

    #[test]
    fn test_max_stack_depth() {
        let mut assembler = MethodAssembler::new("stack", 0);

        for i in 0..5 {
            assembler.emit_push_int(i).unwrap();
        }
        for _ in 0..5 {
            assembler.emit_pop().unwrap();
        }
        assembler.emit_return_void().unwrap();

        let program = assembler.build().unwrap();
        assert_eq!(program.max_stack, 5);
    }

    #[test]
    fn test_dispatch_stack_effect() {
        let mut assembler = MethodAssembler::new("dispatch", 0);

        assembler.emit_push_str("add").unwrap();
        assembler.emit_push_int(0).unwrap();
        assembler.emit_new_array(ArrayKind::Types).unwrap();
        assembler.emit_push_int(0).unwrap();
        assembler.emit_new_array(ArrayKind::Values).unwrap();
        assembler.emit_load_this().unwrap();
        assembler.emit_invoke_dispatch().unwrap();
        assembler.emit_return().unwrap();

        let program = assembler.build().unwrap();
        assert_eq!(program.max_stack, 4);
    }

    #[test]
    fn test_invoke_super_pops_arguments() {
        let mut assembler = MethodAssembler::new("twin", 2);

        assembler.emit_load_local(0).unwrap();
        assembler.emit_load_local(1).unwrap();
        assembler.emit_invoke_super(0, 2).unwrap();
        assembler.emit_return().unwrap();

        let program = assembler.build().unwrap();
        assert_eq!(program.max_stack, 2);
    }

    #[test]
    fn test_class_assembler_duplicate_field() {
        let mut assembler = ClassAssembler::new("demo.W$Proxy", "demo.W");

        assembler
            .declare_field("$interceptor", TypeToken::object())
            .unwrap();
        let result = assembler.declare_field("$interceptor", TypeToken::object());
        assert!(matches!(result, Err(ProxyError::Synthesis(_))));
    }

    #[test]
    fn test_class_assembler_duplicate_method() {
        let mut assembler = ClassAssembler::new("demo.W$Proxy", "demo.W");

        let make = |name: &str| {
            let mut body = MethodAssembler::new(name, 0);
            body.emit_return_void().unwrap();
            EmittedMethod {
                name: name.to_string(),
                params: Vec::new(),
                return_type: TypeToken::void(),
                program: body.build().unwrap(),
            }
        };

        assembler.add_method(make("run")).unwrap();
        let result = assembler.add_method(make("run"));
        assert!(matches!(result, Err(ProxyError::Synthesis(_))));
    }

    #[test]
    fn test_class_assembler_finish() {
        let mut assembler = ClassAssembler::new("demo.W$Proxy", "demo.W");
        assembler.add_interface("Proxied").unwrap();
        let field = assembler
            .declare_field("$interceptor", TypeToken::object())
            .unwrap();
        assembler
            .add_constructor(CtorSlot {
                params: Vec::new(),
                index: 0,
            })
            .unwrap();

        let definition = assembler.finish(Vec::new());
        assert_eq!(definition.name, "demo.W$Proxy");
        assert_eq!(definition.target_name, "demo.W");
        assert_eq!(definition.interfaces, vec!["Proxied".to_string()]);
        assert_eq!(definition.fields[field as usize].name, "$interceptor");
        assert_eq!(definition.constructors.len(), 1);
    }
}
