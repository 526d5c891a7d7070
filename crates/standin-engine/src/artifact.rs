//! On-disk persistence of synthesized classes
//!
//! Artifacts let a later session load a generated proxy class without
//! re-running synthesis. Layout: magic, format version, class identity,
//! the session type descriptor table, then fields, constructors, and
//! methods with their assembled programs. Type references inside the
//! artifact are u16 ids into the descriptor table; decoding rebuilds live
//! tokens by canonical name where one exists and falls back to synthetic
//! tokens for everything else.
//!
//! All integers are little endian. Strings are u32 length prefixed UTF-8.

use std::path::{Path, PathBuf};

use rustc_hash::FxHashMap;

use standin_sdk::TypeToken;

use crate::descriptor::TypeDescriptor;
use crate::emit::{ConstantValue, CtorSlot, EmittedMethod, FieldDef, Program, ProxyClassDefinition};
use crate::{ProxyError, ProxyResult};

/// File extension for persisted proxy classes
pub const ARTIFACT_EXTENSION: &str = "sbc";

const MAGIC: u32 = 0x5342_4331; // "SBC1"
const VERSION: u32 = 1;

// Constant pool entry tags
const TAG_STRING: u8 = 0;
const TAG_INTEGER: u8 = 1;
const TAG_FLOAT: u8 = 2;
const TAG_TYPE: u8 = 3;

/// Encode a definition and write it under `dir`, creating the directory
/// if needed. The file is named `<class name>.sbc`.
pub fn write_artifact(dir: &Path, definition: &ProxyClassDefinition) -> ProxyResult<PathBuf> {
    let bytes = encode(definition)?;
    std::fs::create_dir_all(dir).map_err(|error| {
        ProxyError::Artifact(format!("Cannot create `{}`: {error}", dir.display()))
    })?;
    let path = dir.join(format!("{}.{}", definition.name, ARTIFACT_EXTENSION));
    std::fs::write(&path, bytes).map_err(|error| {
        ProxyError::Artifact(format!("Cannot write `{}`: {error}", path.display()))
    })?;
    Ok(path)
}

/// Read a definition back from a persisted artifact.
pub fn read_artifact(path: &Path) -> ProxyResult<ProxyClassDefinition> {
    let bytes = std::fs::read(path).map_err(|error| {
        ProxyError::Artifact(format!("Cannot read `{}`: {error}", path.display()))
    })?;
    decode(&bytes)
}

/// Encode a definition into artifact bytes.
pub fn encode(definition: &ProxyClassDefinition) -> ProxyResult<Vec<u8>> {
    let mut ids: FxHashMap<TypeToken, u16> = FxHashMap::default();
    for descriptor in &definition.types {
        ids.insert(descriptor.token.clone(), descriptor.id);
    }

    let mut w = Writer::new();
    w.write_u32(MAGIC);
    w.write_u32(VERSION);
    w.write_str(&definition.name);
    w.write_str(&definition.target_name);

    w.write_u32(definition.interfaces.len() as u32);
    for interface in &definition.interfaces {
        w.write_str(interface);
    }

    w.write_u32(definition.types.len() as u32);
    for descriptor in &definition.types {
        w.write_u16(descriptor.id);
        w.write_str(&descriptor.name);
    }

    w.write_u32(definition.fields.len() as u32);
    for field in &definition.fields {
        w.write_str(&field.name);
        w.write_u16(lookup_id(&ids, &field.token)?);
    }

    w.write_u32(definition.constructors.len() as u32);
    for ctor in &definition.constructors {
        w.write_u32(ctor.index as u32);
        w.write_u32(ctor.params.len() as u32);
        for param in &ctor.params {
            w.write_u16(lookup_id(&ids, param)?);
        }
    }

    w.write_u32(definition.methods.len() as u32);
    for method in &definition.methods {
        w.write_str(&method.name);
        w.write_u32(method.params.len() as u32);
        for param in &method.params {
            w.write_u16(lookup_id(&ids, param)?);
        }
        w.write_u16(lookup_id(&ids, &method.return_type)?);
        encode_program(&mut w, &method.program, &ids)?;
    }

    Ok(w.buf)
}

/// Decode artifact bytes back into a definition.
pub fn decode(bytes: &[u8]) -> ProxyResult<ProxyClassDefinition> {
    let mut r = Reader::new(bytes);

    if r.read_u32()? != MAGIC {
        return Err(ProxyError::Artifact("Not a proxy artifact".to_string()));
    }
    let version = r.read_u32()?;
    if version != VERSION {
        return Err(ProxyError::Artifact(format!(
            "Unsupported artifact version {version}"
        )));
    }

    let name = r.read_str()?;
    let target_name = r.read_str()?;

    let interface_count = r.read_u32()? as usize;
    let mut interfaces = Vec::with_capacity(interface_count.min(64));
    for _ in 0..interface_count {
        interfaces.push(r.read_str()?);
    }

    let type_count = r.read_u32()? as usize;
    let mut types = Vec::with_capacity(type_count.min(256));
    let mut tokens: FxHashMap<u16, TypeToken> = FxHashMap::default();
    for _ in 0..type_count {
        let id = r.read_u16()?;
        let type_name = r.read_str()?;
        let token = TypeToken::canonical(&type_name)
            .unwrap_or_else(|| TypeToken::synthetic(type_name.as_str()));
        tokens.insert(id, token.clone());
        types.push(TypeDescriptor {
            id,
            name: type_name,
            token,
        });
    }

    let field_count = r.read_u32()? as usize;
    let mut fields = Vec::with_capacity(field_count.min(64));
    for index in 0..field_count {
        let field_name = r.read_str()?;
        let token = token_for(&tokens, r.read_u16()?)?;
        fields.push(FieldDef {
            name: field_name,
            token,
            index: index as u16,
        });
    }

    let ctor_count = r.read_u32()? as usize;
    let mut constructors = Vec::with_capacity(ctor_count.min(64));
    for _ in 0..ctor_count {
        let index = r.read_u32()? as usize;
        let param_count = r.read_u32()? as usize;
        let mut params = Vec::with_capacity(param_count.min(64));
        for _ in 0..param_count {
            params.push(token_for(&tokens, r.read_u16()?)?);
        }
        constructors.push(CtorSlot { params, index });
    }

    let method_count = r.read_u32()? as usize;
    let mut methods = Vec::with_capacity(method_count.min(256));
    for _ in 0..method_count {
        let method_name = r.read_str()?;
        let param_count = r.read_u32()? as usize;
        let mut params = Vec::with_capacity(param_count.min(64));
        for _ in 0..param_count {
            params.push(token_for(&tokens, r.read_u16()?)?);
        }
        let return_type = token_for(&tokens, r.read_u16()?)?;
        let program = decode_program(&mut r, &tokens)?;
        methods.push(EmittedMethod {
            name: method_name,
            params,
            return_type,
            program,
        });
    }

    if !r.done() {
        return Err(ProxyError::Artifact(
            "Trailing bytes after artifact".to_string(),
        ));
    }

    Ok(ProxyClassDefinition {
        name,
        target_name,
        interfaces,
        fields,
        methods,
        constructors,
        types,
    })
}

fn lookup_id(ids: &FxHashMap<TypeToken, u16>, token: &TypeToken) -> ProxyResult<u16> {
    ids.get(token).copied().ok_or_else(|| {
        ProxyError::Artifact(format!(
            "Type `{}` is not in the descriptor table",
            token.name()
        ))
    })
}

fn token_for(tokens: &FxHashMap<u16, TypeToken>, id: u16) -> ProxyResult<TypeToken> {
    tokens.get(&id).cloned().ok_or_else(|| {
        ProxyError::Artifact(format!("Type id {id} missing from descriptor table"))
    })
}

fn encode_program(
    w: &mut Writer,
    program: &Program,
    ids: &FxHashMap<TypeToken, u16>,
) -> ProxyResult<()> {
    w.write_str(&program.name);
    w.write_u32(program.param_count as u32);
    w.write_u32(program.local_count as u32);
    w.write_u32(program.max_stack as u32);
    w.write_u32(program.code.len() as u32);
    w.write_bytes(&program.code);

    w.write_u32(program.constants.len() as u32);
    for constant in &program.constants {
        match constant {
            ConstantValue::String(value) => {
                w.write_u8(TAG_STRING);
                w.write_str(value);
            }
            ConstantValue::Integer(value) => {
                w.write_u8(TAG_INTEGER);
                w.write_i64(*value);
            }
            ConstantValue::Float(value) => {
                w.write_u8(TAG_FLOAT);
                w.write_f64(*value);
            }
            ConstantValue::Type(token) => {
                w.write_u8(TAG_TYPE);
                w.write_u16(lookup_id(ids, token)?);
            }
        }
    }
    Ok(())
}

fn decode_program(r: &mut Reader<'_>, tokens: &FxHashMap<u16, TypeToken>) -> ProxyResult<Program> {
    let name = r.read_str()?;
    let param_count = r.read_u32()? as usize;
    let local_count = r.read_u32()? as usize;
    let max_stack = r.read_u32()? as usize;
    let code_len = r.read_u32()? as usize;
    let code = r.take(code_len)?.to_vec();

    let constant_count = r.read_u32()? as usize;
    let mut constants = Vec::with_capacity(constant_count.min(256));
    for _ in 0..constant_count {
        let constant = match r.read_u8()? {
            TAG_STRING => ConstantValue::String(r.read_str()?),
            TAG_INTEGER => ConstantValue::Integer(r.read_i64()?),
            TAG_FLOAT => ConstantValue::Float(r.read_f64()?),
            TAG_TYPE => ConstantValue::Type(token_for(tokens, r.read_u16()?)?),
            other => {
                return Err(ProxyError::Artifact(format!(
                    "Unknown constant tag {other}"
                )))
            }
        };
        constants.push(constant);
    }

    Ok(Program {
        name,
        param_count,
        local_count,
        max_stack,
        code,
        constants,
    })
}

struct Writer {
    buf: Vec<u8>,
}

impl Writer {
    fn new() -> Self {
        Self {
            buf: Vec::with_capacity(256),
        }
    }

    fn write_u8(&mut self, value: u8) {
        self.buf.push(value);
    }

    fn write_u16(&mut self, value: u16) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    fn write_u32(&mut self, value: u32) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    fn write_i64(&mut self, value: i64) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    fn write_f64(&mut self, value: f64) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    fn write_bytes(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    fn write_str(&mut self, value: &str) {
        self.write_u32(value.len() as u32);
        self.buf.extend_from_slice(value.as_bytes());
    }
}

struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    fn take(&mut self, len: usize) -> ProxyResult<&'a [u8]> {
        let end = self
            .pos
            .checked_add(len)
            .filter(|end| *end <= self.bytes.len())
            .ok_or_else(truncated)?;
        let slice = &self.bytes[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn read_u8(&mut self) -> ProxyResult<u8> {
        Ok(self.take(1)?[0])
    }

    fn read_u16(&mut self) -> ProxyResult<u16> {
        let bytes = self.take(2)?;
        Ok(u16::from_le_bytes([bytes[0], bytes[1]]))
    }

    fn read_u32(&mut self) -> ProxyResult<u32> {
        let bytes = self.take(4)?;
        Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    fn read_i64(&mut self) -> ProxyResult<i64> {
        let bytes = self.take(8)?;
        let mut buf = [0u8; 8];
        buf.copy_from_slice(bytes);
        Ok(i64::from_le_bytes(buf))
    }

    fn read_f64(&mut self) -> ProxyResult<f64> {
        let bytes = self.take(8)?;
        let mut buf = [0u8; 8];
        buf.copy_from_slice(bytes);
        Ok(f64::from_le_bytes(buf))
    }

    fn read_str(&mut self) -> ProxyResult<String> {
        let len = self.read_u32()? as usize;
        let bytes = self.take(len)?;
        String::from_utf8(bytes.to_vec())
            .map_err(|_| ProxyError::Artifact("Invalid UTF-8 in artifact string".to_string()))
    }

    fn done(&self) -> bool {
        self.pos == self.bytes.len()
    }
}

fn truncated() -> ProxyError {
    ProxyError::Artifact("Truncated artifact".to_string())
}
