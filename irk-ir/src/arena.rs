//! Handle Arena
//!
//! The arena is the single owner of every context and of everything allocated
//! inside one. Context slots carry a generation counter: destroying a context
//! empties its slot and bumps the generation, so any handle minted for the old
//! occupant fails the lookup with `UseAfterFree` instead of aliasing whatever
//! context reuses the slot later.
//!
//! The arena is `Send` but not `Sync`. It may move to another thread, but
//! IR mutation never happens from two threads at once.

use log::debug;
use std::cell::Cell;
use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;

use crate::config::ArenaConfig;
use crate::engine::{NativeEngine, NativeHandle, ReferenceEngine};
use crate::error::{IrError, Result};
use crate::function::{BlockData, FunctionData, FunctionEditor};
use crate::handles::{AnyHandle, BlockId, ContextId, FunctionId, ValueId};
use crate::instructions::InstructionBuilder;
use crate::types::{TypeKind, TypeRegistry};
use crate::values::{ValueBuilder, ValueData};
use crate::verify::{Verifier, VerifierAction};

/// Everything allocated in one context. Value and block slots are never
/// reused; deletion leaves a `None` tombstone behind.
pub(crate) struct ContextData {
    pub(crate) id: ContextId,
    pub(crate) native: NativeHandle,
    pub(crate) module_name: String,
    pub(crate) types: Vec<TypeKind>,
    pub(crate) interned: HashMap<TypeKind, u32>,
    pub(crate) values: Vec<Option<ValueData>>,
    pub(crate) blocks: Vec<Option<BlockData>>,
    pub(crate) bodies: HashMap<u32, FunctionData>,
    /// Declaration order of the module's functions
    pub(crate) functions: Vec<FunctionId>,
    pub(crate) function_names: HashMap<String, FunctionId>,
}

impl ContextData {
    fn new(id: ContextId, native: NativeHandle, module_name: String) -> Self {
        Self {
            id,
            native,
            module_name,
            types: Vec::new(),
            interned: HashMap::new(),
            values: Vec::new(),
            blocks: Vec::new(),
            bodies: HashMap::new(),
            functions: Vec::new(),
            function_names: HashMap::new(),
        }
    }

    pub(crate) fn push_value(&mut self, data: ValueData) -> ValueId {
        let index = self.values.len() as u32;
        self.values.push(Some(data));
        ValueId { context: self.id, index }
    }

    pub(crate) fn push_block(&mut self, data: BlockData) -> BlockId {
        let index = self.blocks.len() as u32;
        self.blocks.push(Some(data));
        BlockId { context: self.id, index }
    }

    pub(crate) fn release_value(&mut self, value: ValueId) {
        if let Some(slot) = self.values.get_mut(value.index as usize) {
            *slot = None;
        }
    }

    pub(crate) fn release_block(&mut self, block: BlockId) -> Option<BlockData> {
        self.blocks.get_mut(block.index as usize).and_then(Option::take)
    }
}

struct ContextSlot {
    generation: u32,
    data: Option<ContextData>,
}

/// Owner of all contexts and of the native engine they are mirrored into
///
/// The arena can be sent to another thread but never shared between threads:
///
/// ```
/// fn assert_send<T: Send>() {}
/// assert_send::<irk_ir::HandleArena>();
/// ```
///
/// ```compile_fail
/// fn assert_sync<T: Sync>() {}
/// assert_sync::<irk_ir::HandleArena>();
/// ```
pub struct HandleArena {
    slots: Vec<ContextSlot>,
    free_slots: Vec<u32>,
    engine: Box<dyn NativeEngine + Send>,
    config: ArenaConfig,
    _not_sync: PhantomData<Cell<()>>,
}

impl HandleArena {
    pub fn new() -> Self {
        Self::with_config(ArenaConfig::default())
    }

    pub fn with_config(config: ArenaConfig) -> Self {
        Self::with_engine(Box::new(ReferenceEngine::new()), config)
    }

    pub fn with_engine(engine: Box<dyn NativeEngine + Send>, config: ArenaConfig) -> Self {
        debug!("Creating handle arena on the {} engine", engine.name());
        Self {
            slots: Vec::new(),
            free_slots: Vec::new(),
            engine,
            config,
            _not_sync: PhantomData,
        }
    }

    /// Run `f` against a fresh arena and default context.
    ///
    /// This is the only place a context is created implicitly. Everything
    /// allocated inside `f` is released when it returns.
    pub fn scoped<R>(f: impl FnOnce(&mut HandleArena, ContextId) -> R) -> R {
        let mut arena = HandleArena::new();
        let context = arena.create_context();
        f(&mut arena, context)
    }

    pub fn config(&self) -> &ArenaConfig {
        &self.config
    }

    pub fn engine(&self) -> &dyn NativeEngine {
        self.engine.as_ref()
    }

    pub fn create_context(&mut self) -> ContextId {
        self.create_context_named("module")
    }

    /// Create a context whose module carries `module_name`
    pub fn create_context_named(&mut self, module_name: impl Into<String>) -> ContextId {
        let native = self.engine.create_context();
        let index = match self.free_slots.pop() {
            Some(index) => index,
            None => {
                self.slots.push(ContextSlot { generation: 0, data: None });
                (self.slots.len() - 1) as u32
            }
        };

        let slot = &mut self.slots[index as usize];
        let id = ContextId { index, generation: slot.generation };
        slot.data = Some(ContextData::new(id, native, module_name.into()));
        debug!("Created {id} backed by native handle {native}");
        id
    }

    /// Release a context and every handle tagged with it.
    ///
    /// Destroying an already destroyed context fails with `UseAfterFree`.
    pub fn destroy_context(&mut self, id: ContextId) -> Result<()> {
        let slot = self
            .slots
            .get_mut(id.index as usize)
            .filter(|slot| slot.generation == id.generation)
            .ok_or_else(|| IrError::use_after_free(id))?;
        let data = slot.data.take().ok_or_else(|| IrError::use_after_free(id))?;

        // A slot whose generation would wrap is retired for good
        if slot.generation < u32::MAX {
            slot.generation += 1;
            self.free_slots.push(id.index);
        }

        self.engine.dispose_context(data.native);
        debug!(
            "Destroyed {id}: released {} types, {} values, {} blocks",
            data.types.len(),
            data.values.len(),
            data.blocks.len()
        );
        Ok(())
    }

    pub fn is_alive(&self, id: ContextId) -> bool {
        self.context(id).is_ok()
    }

    pub fn live_contexts(&self) -> usize {
        self.slots.iter().filter(|slot| slot.data.is_some()).count()
    }

    /// The context a handle is tagged with, provided the handle is still live
    pub fn owner_of(&self, handle: impl Into<AnyHandle>) -> Result<ContextId> {
        let handle = handle.into();
        match handle {
            AnyHandle::Context(id) => self.context(id).map(|data| data.id),
            AnyHandle::Type(id) => self.type_kind(id).map(|_| id.context),
            AnyHandle::Value(id) => self.value(id).map(|_| id.context),
            AnyHandle::Function(id) => self.function(id).map(|_| id.context()),
            AnyHandle::Block(id) => self.block(id).map(|_| id.context),
        }
    }

    pub fn module_name(&self, context: ContextId) -> Result<&str> {
        Ok(&self.context(context)?.module_name)
    }

    pub fn set_module_name(&mut self, context: ContextId, name: impl Into<String>) -> Result<()> {
        self.context_mut(context)?.module_name = name.into();
        Ok(())
    }

    /// Functions of the context's module in declaration order
    pub fn functions_in(&self, context: ContextId) -> Result<Vec<FunctionId>> {
        Ok(self.context(context)?.functions.clone())
    }

    /// Serialize the module through the native engine.
    ///
    /// With `verify_before_emit` set, an invalid module is refused with
    /// `IrError::Invalid` and nothing is serialized.
    pub fn emit_module(&mut self, context: ContextId) -> Result<Vec<u8>> {
        if self.config.verify_before_emit {
            self.verifier()
                .verify_module(context, VerifierAction::ReturnStatus)?
                .into_result()?;
        }
        let arena: &HandleArena = self;
        arena.engine.write_module(arena, context)
    }

    pub fn types(&mut self) -> TypeRegistry<'_> {
        TypeRegistry::new(self)
    }

    pub fn values(&mut self) -> ValueBuilder<'_> {
        ValueBuilder::new(self)
    }

    pub fn functions(&mut self) -> FunctionEditor<'_> {
        FunctionEditor::new(self)
    }

    pub fn instructions(&mut self) -> InstructionBuilder<'_> {
        InstructionBuilder::new(self)
    }

    pub fn verifier(&mut self) -> Verifier<'_> {
        Verifier::new(self)
    }

    pub(crate) fn context(&self, id: ContextId) -> Result<&ContextData> {
        self.slots
            .get(id.index as usize)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.data.as_ref())
            .ok_or_else(|| IrError::use_after_free(id))
    }

    pub(crate) fn context_mut(&mut self, id: ContextId) -> Result<&mut ContextData> {
        self.slots
            .get_mut(id.index as usize)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.data.as_mut())
            .ok_or_else(|| IrError::use_after_free(id))
    }

    pub(crate) fn value(&self, id: ValueId) -> Result<&ValueData> {
        self.context(id.context)?
            .values
            .get(id.index as usize)
            .and_then(Option::as_ref)
            .ok_or_else(|| IrError::use_after_free(id))
    }

    pub(crate) fn value_mut(&mut self, id: ValueId) -> Result<&mut ValueData> {
        self.context_mut(id.context)?
            .values
            .get_mut(id.index as usize)
            .and_then(Option::as_mut)
            .ok_or_else(|| IrError::use_after_free(id))
    }

    pub(crate) fn function(&self, id: FunctionId) -> Result<&FunctionData> {
        self.context(id.context())?
            .bodies
            .get(&id.0.index)
            .ok_or_else(|| IrError::use_after_free(id))
    }

    pub(crate) fn function_mut(&mut self, id: FunctionId) -> Result<&mut FunctionData> {
        self.context_mut(id.context())?
            .bodies
            .get_mut(&id.0.index)
            .ok_or_else(|| IrError::use_after_free(id))
    }

    pub(crate) fn block(&self, id: BlockId) -> Result<&BlockData> {
        self.context(id.context)?
            .blocks
            .get(id.index as usize)
            .and_then(Option::as_ref)
            .ok_or_else(|| IrError::use_after_free(id))
    }

    pub(crate) fn block_mut(&mut self, id: BlockId) -> Result<&mut BlockData> {
        self.context_mut(id.context)?
            .blocks
            .get_mut(id.index as usize)
            .and_then(Option::as_mut)
            .ok_or_else(|| IrError::use_after_free(id))
    }
}

impl Default for HandleArena {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for HandleArena {
    fn drop(&mut self) {
        for slot in &mut self.slots {
            if let Some(data) = slot.data.take() {
                self.engine.dispose_context(data.native);
            }
        }
    }
}

impl fmt::Debug for HandleArena {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandleArena")
            .field("engine", &self.engine.name())
            .field("live_contexts", &self.live_contexts())
            .field("config", &self.config)
            .finish()
    }
}
