//! Type Registry
//!
//! Types are immutable and structurally interned per context: asking twice
//! for `[4 x i8]` in the same context yields the same `TypeId`, while the
//! same request in another context yields a different one. Because of that,
//! type equality within a context is plain `TypeId` equality.

use log::trace;

use crate::arena::HandleArena;
use crate::error::{IrError, Result};
use crate::handles::{ContextId, TypeId};

/// Structure of an interned type
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TypeKind {
    Void,
    /// Type of basic block addresses
    Label,
    Integer { bits: u32 },
    Array { element: TypeId, length: u32 },
    Struct { fields: Vec<TypeId>, packed: bool },
    Function {
        return_type: TypeId,
        params: Vec<TypeId>,
        is_var_arg: bool,
    },
}

impl TypeKind {
    pub fn is_integer(&self) -> bool {
        matches!(self, TypeKind::Integer { .. })
    }

    /// Types that can be stored in memory, passed and returned
    pub fn is_sized(&self) -> bool {
        matches!(self, TypeKind::Integer { .. } | TypeKind::Array { .. } | TypeKind::Struct { .. })
    }

    pub fn is_void(&self) -> bool {
        matches!(self, TypeKind::Void)
    }
}

impl HandleArena {
    pub fn type_kind(&self, ty: TypeId) -> Result<&TypeKind> {
        self.context(ty.context)?
            .types
            .get(ty.index as usize)
            .ok_or_else(|| IrError::use_after_free(ty))
    }

    /// Textual form of a type for messages; never fails
    pub fn describe_type(&self, ty: TypeId) -> String {
        crate::printer::format_type(self, ty).unwrap_or_else(|_| format!("<released {ty}>"))
    }
}

/// Constructs and interns types inside a context
pub struct TypeRegistry<'a> {
    arena: &'a mut HandleArena,
}

impl<'a> TypeRegistry<'a> {
    pub(crate) fn new(arena: &'a mut HandleArena) -> Self {
        Self { arena }
    }

    pub fn get_void(&mut self, context: ContextId) -> Result<TypeId> {
        self.intern(context, TypeKind::Void)
    }

    pub fn get_label(&mut self, context: ContextId) -> Result<TypeId> {
        self.intern(context, TypeKind::Label)
    }

    /// `iN`; zero and widths above the configured maximum are rejected
    pub fn get_integer(&mut self, context: ContextId, bits: u32) -> Result<TypeId> {
        if bits == 0 || bits > self.arena.config().max_integer_width {
            return Err(IrError::InvalidWidth { bits });
        }
        self.intern(context, TypeKind::Integer { bits })
    }

    /// `[length x element]`, interned in the element's context
    pub fn get_array(&mut self, element: TypeId, length: u32) -> Result<TypeId> {
        let context = element.context;
        self.require_sized(context, element)?;
        self.intern(context, TypeKind::Array { element, length })
    }

    pub fn get_struct(&mut self, context: ContextId, fields: &[TypeId], packed: bool) -> Result<TypeId> {
        for &field in fields {
            self.require_sized(context, field)?;
        }
        self.intern(context, TypeKind::Struct { fields: fields.to_vec(), packed })
    }

    /// Function signature; the return type may be void, parameters must be sized
    pub fn get_function_signature(
        &mut self,
        return_type: TypeId,
        params: &[TypeId],
        is_var_arg: bool,
    ) -> Result<TypeId> {
        let context = return_type.context;
        let kind = self.member(context, return_type)?;
        if !(kind.is_sized() || kind.is_void()) {
            return Err(IrError::type_mismatch(
                "sized or void return type",
                self.arena.describe_type(return_type),
            ));
        }
        for &param in params {
            self.require_sized(context, param)?;
        }
        self.intern(
            context,
            TypeKind::Function { return_type, params: params.to_vec(), is_var_arg },
        )
    }

    pub fn element_type(&self, array: TypeId) -> Result<TypeId> {
        match self.arena.type_kind(array)? {
            TypeKind::Array { element, .. } => Ok(*element),
            _ => Err(IrError::type_mismatch("array type", self.arena.describe_type(array))),
        }
    }

    pub fn length(&self, array: TypeId) -> Result<u32> {
        match self.arena.type_kind(array)? {
            TypeKind::Array { length, .. } => Ok(*length),
            _ => Err(IrError::type_mismatch("array type", self.arena.describe_type(array))),
        }
    }

    pub fn struct_fields(&self, ty: TypeId) -> Result<Vec<TypeId>> {
        match self.arena.type_kind(ty)? {
            TypeKind::Struct { fields, .. } => Ok(fields.clone()),
            _ => Err(IrError::type_mismatch("struct type", self.arena.describe_type(ty))),
        }
    }

    /// Return type, parameter types and var-arg flag of a signature
    pub fn signature_parts(&self, signature: TypeId) -> Result<(TypeId, Vec<TypeId>, bool)> {
        match self.arena.type_kind(signature)? {
            TypeKind::Function { return_type, params, is_var_arg } => {
                Ok((*return_type, params.clone(), *is_var_arg))
            }
            _ => Err(IrError::type_mismatch(
                "function signature",
                self.arena.describe_type(signature),
            )),
        }
    }

    /// Resolve `ty` and check that it lives in `context`
    fn member(&self, context: ContextId, ty: TypeId) -> Result<&TypeKind> {
        if ty.context != context {
            return Err(IrError::CrossContextType {
                ty: ty.to_string(),
                expected: context.to_string(),
                found: ty.context.to_string(),
            });
        }
        self.arena.type_kind(ty)
    }

    fn require_sized(&self, context: ContextId, ty: TypeId) -> Result<()> {
        if self.member(context, ty)?.is_sized() {
            Ok(())
        } else {
            Err(IrError::type_mismatch("sized type", self.arena.describe_type(ty)))
        }
    }

    fn intern(&mut self, context: ContextId, kind: TypeKind) -> Result<TypeId> {
        let data = self.arena.context_mut(context)?;
        if let Some(&index) = data.interned.get(&kind) {
            return Ok(TypeId { context, index });
        }

        let index = data.types.len() as u32;
        data.types.push(kind.clone());
        trace!("Interned {kind:?} as type#{index} in {context}");
        data.interned.insert(kind, index);
        Ok(TypeId { context, index })
    }
}
