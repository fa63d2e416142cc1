//! Value Builder
//!
//! Builds constants and declares functions. Composite constants only accept
//! constant elements whose type is exactly the declared element type;
//! interning makes that an identity comparison.

use log::{debug, trace};

use crate::arena::HandleArena;
use crate::error::{IrError, Result};
use crate::function::FunctionData;
use crate::handles::{BlockId, ContextId, FunctionId, TypeId, ValueId};
use crate::instructions::InstructionKind;
use crate::types::TypeKind;

/// What a value is
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValueKind {
    /// Integer constant truncated to its type's width, then sign-extended
    /// back to 64 bits. Wider types hold the value exactly.
    ConstInt { value: i64 },
    ConstArray { elements: Vec<ValueId> },
    /// Byte array constant produced by `const_string`
    ConstData { bytes: Vec<u8> },
    ConstStruct { fields: Vec<ValueId> },
    Undef,
    Function,
    Parameter { function: FunctionId, index: u32 },
    Instruction { block: BlockId, kind: InstructionKind },
}

impl ValueKind {
    pub fn is_constant(&self) -> bool {
        matches!(
            self,
            ValueKind::ConstInt { .. }
                | ValueKind::ConstArray { .. }
                | ValueKind::ConstData { .. }
                | ValueKind::ConstStruct { .. }
                | ValueKind::Undef
                | ValueKind::Function
        )
    }
}

#[derive(Debug, Clone)]
pub(crate) struct ValueData {
    pub(crate) ty: TypeId,
    pub(crate) kind: ValueKind,
    pub(crate) name: String,
}

impl ValueData {
    pub(crate) fn new(ty: TypeId, kind: ValueKind) -> Self {
        Self { ty, kind, name: String::new() }
    }

    pub(crate) fn named(ty: TypeId, kind: ValueKind, name: impl Into<String>) -> Self {
        Self { ty, kind, name: name.into() }
    }
}

impl HandleArena {
    pub fn value_kind(&self, value: ValueId) -> Result<&ValueKind> {
        Ok(&self.value(value)?.kind)
    }

    pub fn type_of(&self, value: impl Into<ValueId>) -> Result<TypeId> {
        Ok(self.value(value.into())?.ty)
    }

    /// Name of a value; empty for anonymous values
    pub fn value_name(&self, value: impl Into<ValueId>) -> Result<&str> {
        Ok(&self.value(value.into())?.name)
    }

    /// Resolve an operand that must live in `context`
    pub(crate) fn value_in(&self, context: ContextId, value: ValueId) -> Result<&ValueData> {
        if value.context != context {
            return Err(IrError::CrossContextValue {
                value: value.to_string(),
                expected: context.to_string(),
                found: value.context.to_string(),
            });
        }
        self.value(value)
    }
}

/// Builds constants and function declarations
pub struct ValueBuilder<'a> {
    arena: &'a mut HandleArena,
}

impl<'a> ValueBuilder<'a> {
    pub(crate) fn new(arena: &'a mut HandleArena) -> Self {
        Self { arena }
    }

    /// Integer constant truncated to the width of `ty`
    pub fn const_int(&mut self, ty: TypeId, value: i64) -> Result<ValueId> {
        let bits = match self.arena.type_kind(ty)? {
            TypeKind::Integer { bits } => *bits,
            _ => return Err(IrError::type_mismatch("integer type", self.arena.describe_type(ty))),
        };
        let value = if bits >= 64 {
            value
        } else {
            let shift = 64 - bits;
            (value << shift) >> shift
        };
        self.push(ty.context, ty, ValueKind::ConstInt { value })
    }

    /// Constant array whose elements all have type `element`
    pub fn const_array(&mut self, element: TypeId, values: &[ValueId]) -> Result<ValueId> {
        let context = element.context;
        let length = array_length(values.len())?;
        self.arena.type_kind(element)?;
        for &value in values {
            self.expect_constant_of(context, value, element)?;
        }

        let array = self.arena.types().get_array(element, length)?;
        self.push(context, array, ValueKind::ConstArray { elements: values.to_vec() })
    }

    /// `[n x i8]` constant holding `content`, plus a trailing NUL when asked
    pub fn const_string(&mut self, context: ContextId, content: &[u8], null_terminate: bool) -> Result<ValueId> {
        let length = array_length(content.len() + usize::from(null_terminate))?;
        let byte = self.arena.types().get_integer(context, 8)?;
        let array = self.arena.types().get_array(byte, length)?;

        let mut bytes = content.to_vec();
        if null_terminate {
            bytes.push(0);
        }
        self.push(context, array, ValueKind::ConstData { bytes })
    }

    /// Literal struct constant; the struct type is derived from the fields
    pub fn const_struct(&mut self, context: ContextId, values: &[ValueId], packed: bool) -> Result<ValueId> {
        let mut field_types = Vec::with_capacity(values.len());
        for &value in values {
            let data = self.arena.value_in(context, value)?;
            if !data.kind.is_constant() {
                return Err(IrError::NotConstant { value: value.to_string() });
            }
            field_types.push(data.ty);
        }

        let ty = self.arena.types().get_struct(context, &field_types, packed)?;
        self.push(context, ty, ValueKind::ConstStruct { fields: values.to_vec() })
    }

    pub fn undef(&mut self, ty: TypeId) -> Result<ValueId> {
        if !self.arena.type_kind(ty)?.is_sized() {
            return Err(IrError::type_mismatch("sized type", self.arena.describe_type(ty)));
        }
        self.push(ty.context, ty, ValueKind::Undef)
    }

    /// Declare a function in the context's module.
    ///
    /// Parameters are created here, one per signature parameter, and never
    /// change afterwards. An empty name declares an anonymous function.
    pub fn declare_function(&mut self, context: ContextId, name: &str, signature: TypeId) -> Result<FunctionId> {
        if signature.context != context {
            return Err(IrError::CrossContextType {
                ty: signature.to_string(),
                expected: context.to_string(),
                found: signature.context.to_string(),
            });
        }
        let param_types = match self.arena.type_kind(signature)? {
            TypeKind::Function { params, .. } => params.clone(),
            _ => {
                return Err(IrError::type_mismatch(
                    "function signature",
                    self.arena.describe_type(signature),
                ))
            }
        };
        let call_convention = self.arena.config().default_call_convention.to_native();

        let data = self.arena.context_mut(context)?;
        if !name.is_empty() && data.function_names.contains_key(name) {
            return Err(IrError::DuplicateName { name: name.to_string() });
        }

        let function = FunctionId(data.push_value(ValueData::named(signature, ValueKind::Function, name)));
        let params = param_types
            .iter()
            .enumerate()
            .map(|(index, &ty)| {
                data.push_value(ValueData::new(ty, ValueKind::Parameter { function, index: index as u32 }))
            })
            .collect();

        data.bodies.insert(function.0.index, FunctionData::new(signature, params, call_convention));
        data.functions.push(function);
        if !name.is_empty() {
            data.function_names.insert(name.to_string(), function);
        }
        debug!("Declared function '{name}' as {function}");
        Ok(function)
    }

    /// Look a function up by name in the context's module
    pub fn get_function(&self, context: ContextId, name: &str) -> Result<Option<FunctionId>> {
        Ok(self.arena.context(context)?.function_names.get(name).copied())
    }

    pub fn type_of(&self, value: impl Into<ValueId>) -> Result<TypeId> {
        self.arena.type_of(value)
    }

    pub fn name(&self, value: impl Into<ValueId>) -> Result<String> {
        self.arena.value_name(value).map(str::to_string)
    }

    /// Rename a value. Renaming a function keeps module names unique.
    pub fn set_name(&mut self, value: impl Into<ValueId>, name: &str) -> Result<()> {
        let value = value.into();
        let (is_function, old) = {
            let data = self.arena.value(value)?;
            (data.kind == ValueKind::Function, data.name.clone())
        };
        if !is_function {
            self.arena.value_mut(value)?.name = name.to_string();
            return Ok(());
        }

        let function = FunctionId(value);
        let context = self.arena.context_mut(value.context)?;
        if !name.is_empty() && context.function_names.get(name).is_some_and(|&f| f != function) {
            return Err(IrError::DuplicateName { name: name.to_string() });
        }
        if context.function_names.get(&old) == Some(&function) {
            context.function_names.remove(&old);
        }
        if !name.is_empty() {
            context.function_names.insert(name.to_string(), function);
        }
        self.arena.value_mut(value)?.name = name.to_string();
        trace!("Renamed {function} from '{old}' to '{name}'");
        Ok(())
    }

    fn expect_constant_of(&self, context: ContextId, value: ValueId, expected: TypeId) -> Result<()> {
        let data = self.arena.value_in(context, value)?;
        if !data.kind.is_constant() {
            return Err(IrError::NotConstant { value: value.to_string() });
        }
        if data.ty != expected {
            return Err(IrError::type_mismatch(
                self.arena.describe_type(expected),
                self.arena.describe_type(data.ty),
            ));
        }
        Ok(())
    }

    fn push(&mut self, context: ContextId, ty: TypeId, kind: ValueKind) -> Result<ValueId> {
        let value = self.arena.context_mut(context)?.push_value(ValueData::new(ty, kind));
        trace!("Built constant {value}");
        Ok(value)
    }
}

fn array_length(len: usize) -> Result<u32> {
    u32::try_from(len).map_err(|_| IrError::InvalidLength { length: len as u64 })
}
