//! Handle identifiers
//!
//! Handles are plain `Copy` identifiers. None of them can be dereferenced on
//! its own: every lookup goes through [`HandleArena`](crate::HandleArena),
//! which checks that the owning context is still alive (same slot, same
//! generation) and that the entry inside it has not been tombstoned.
//!
//! Constructors are crate-private, so every handle in existence was produced
//! by an allocation path that tagged it with its owning context.

use std::fmt;

/// Identifies a context slot together with the generation it was created in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContextId {
    pub(crate) index: u32,
    pub(crate) generation: u32,
}

/// An interned type inside one context
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeId {
    pub(crate) context: ContextId,
    pub(crate) index: u32,
}

/// A constant, parameter, function or instruction result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ValueId {
    pub(crate) context: ContextId,
    pub(crate) index: u32,
}

/// A value known to be a function
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FunctionId(pub(crate) ValueId);

/// A basic block owned by one function
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlockId {
    pub(crate) context: ContextId,
    pub(crate) index: u32,
}

impl ContextId {
    pub fn index(self) -> u32 {
        self.index
    }

    pub fn generation(self) -> u32 {
        self.generation
    }
}

impl TypeId {
    pub fn context(self) -> ContextId {
        self.context
    }
}

impl ValueId {
    pub fn context(self) -> ContextId {
        self.context
    }
}

impl FunctionId {
    pub fn context(self) -> ContextId {
        self.0.context
    }

    /// The function viewed as an ordinary value
    pub fn as_value(self) -> ValueId {
        self.0
    }
}

impl From<FunctionId> for ValueId {
    fn from(function: FunctionId) -> Self {
        function.0
    }
}

impl BlockId {
    pub fn context(self) -> ContextId {
        self.context
    }
}

impl fmt::Display for ContextId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "context#{}.{}", self.index, self.generation)
    }
}

impl fmt::Display for TypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "type#{} in {}", self.index, self.context)
    }
}

impl fmt::Display for ValueId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "value#{} in {}", self.index, self.context)
    }
}

impl fmt::Display for FunctionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "function#{} in {}", self.0.index, self.0.context)
    }
}

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "block#{} in {}", self.index, self.context)
    }
}

/// Any handle kind, for queries that accept all of them
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnyHandle {
    Context(ContextId),
    Type(TypeId),
    Value(ValueId),
    Function(FunctionId),
    Block(BlockId),
}

impl AnyHandle {
    /// The context the handle was tagged with at allocation
    pub fn tag(self) -> ContextId {
        match self {
            AnyHandle::Context(id) => id,
            AnyHandle::Type(id) => id.context,
            AnyHandle::Value(id) => id.context,
            AnyHandle::Function(id) => id.context(),
            AnyHandle::Block(id) => id.context,
        }
    }
}

impl fmt::Display for AnyHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AnyHandle::Context(id) => id.fmt(f),
            AnyHandle::Type(id) => id.fmt(f),
            AnyHandle::Value(id) => id.fmt(f),
            AnyHandle::Function(id) => id.fmt(f),
            AnyHandle::Block(id) => id.fmt(f),
        }
    }
}

macro_rules! any_handle_from {
    ($($ty:ident => $variant:ident),+ $(,)?) => {
        $(
            impl From<$ty> for AnyHandle {
                fn from(id: $ty) -> Self {
                    AnyHandle::$variant(id)
                }
            }
        )+
    };
}

any_handle_from! {
    ContextId => Context,
    TypeId => Type,
    ValueId => Value,
    FunctionId => Function,
    BlockId => Block,
}
