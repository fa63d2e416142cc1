//! Function Editor
//!
//! Edits the bodies of declared functions: basic blocks, parameters,
//! attributes, calling convention, personality function and GC strategy.
//! Every edit that changes what the verifier would see resets the function's
//! verification state to `Unverified`.

use log::{debug, trace};
use std::collections::{BTreeMap, HashSet};

use irk_common::{AttributeIndex, AttributeKind, CallConvention};

use crate::arena::HandleArena;
use crate::attributes::{Attribute, AttributeKey, AttributeSet};
use crate::error::{IrError, Result};
use crate::handles::{BlockId, FunctionId, TypeId, ValueId};
use crate::values::ValueKind;
use crate::verify::VerificationState;

/// Body and configuration of one function
#[derive(Debug, Clone)]
pub(crate) struct FunctionData {
    pub(crate) signature: TypeId,
    pub(crate) params: Vec<ValueId>,
    pub(crate) blocks: Vec<BlockId>,
    /// Native calling-convention code
    pub(crate) call_convention: u32,
    pub(crate) personality: Option<FunctionId>,
    pub(crate) gc: Option<String>,
    pub(crate) attributes: BTreeMap<AttributeIndex, AttributeSet>,
    pub(crate) state: VerificationState,
}

impl FunctionData {
    pub(crate) fn new(signature: TypeId, params: Vec<ValueId>, call_convention: u32) -> Self {
        Self {
            signature,
            params,
            blocks: Vec::new(),
            call_convention,
            personality: None,
            gc: None,
            attributes: BTreeMap::new(),
            state: VerificationState::Unverified,
        }
    }

    pub(crate) fn attributes_at(&self, index: AttributeIndex) -> impl Iterator<Item = &Attribute> {
        self.attributes.get(&index).into_iter().flat_map(AttributeSet::iter)
    }
}

#[derive(Debug, Clone)]
pub(crate) struct BlockData {
    pub(crate) function: FunctionId,
    pub(crate) name: String,
    pub(crate) instructions: Vec<ValueId>,
}

impl HandleArena {
    pub fn function_name(&self, function: FunctionId) -> Result<&str> {
        self.function(function)?;
        self.value_name(function)
    }

    pub fn function_signature(&self, function: FunctionId) -> Result<TypeId> {
        Ok(self.function(function)?.signature)
    }

    pub fn block_instructions(&self, block: BlockId) -> Result<&[ValueId]> {
        Ok(&self.block(block)?.instructions)
    }

    /// Mark a function as changed since its last verification
    pub(crate) fn invalidate(&mut self, function: FunctionId) -> Result<()> {
        self.function_mut(function)?.state = VerificationState::Unverified;
        Ok(())
    }
}

/// Edits function bodies and configuration
pub struct FunctionEditor<'a> {
    arena: &'a mut HandleArena,
}

impl<'a> FunctionEditor<'a> {
    pub(crate) fn new(arena: &'a mut HandleArena) -> Self {
        Self { arena }
    }

    /// Append a block at the end of the function.
    ///
    /// Names are made unique within the function by appending a counter, so
    /// asking for `loop` twice yields `loop` and `loop1`. Empty names stay
    /// anonymous.
    pub fn append_basic_block(&mut self, function: FunctionId, name: &str) -> Result<BlockId> {
        let label = {
            let body = self.arena.function(function)?;
            let taken: HashSet<&str> = body
                .blocks
                .iter()
                .filter_map(|&block| self.arena.block(block).ok())
                .map(|block| block.name.as_str())
                .collect();
            unique_label(name, &taken)
        };

        let block = self.arena.context_mut(function.context())?.push_block(BlockData {
            function,
            name: label,
            instructions: Vec::new(),
        });
        let body = self.arena.function_mut(function)?;
        body.blocks.push(block);
        body.state = VerificationState::Unverified;
        trace!("Appended {block} to {function}");
        Ok(block)
    }

    pub fn blocks(&self, function: FunctionId) -> Result<Vec<BlockId>> {
        Ok(self.arena.function(function)?.blocks.clone())
    }

    pub fn entry_block(&self, function: FunctionId) -> Result<Option<BlockId>> {
        Ok(self.arena.function(function)?.blocks.first().copied())
    }

    pub fn block_name(&self, block: BlockId) -> Result<String> {
        Ok(self.arena.block(block)?.name.clone())
    }

    pub fn block_parent(&self, block: BlockId) -> Result<FunctionId> {
        Ok(self.arena.block(block)?.function)
    }

    pub fn get_parameter(&self, function: FunctionId, index: u32) -> Result<ValueId> {
        let params = &self.arena.function(function)?.params;
        params.get(index as usize).copied().ok_or(IrError::IndexOutOfRange {
            index,
            count: params.len() as u32,
        })
    }

    pub fn parameter_count(&self, function: FunctionId) -> Result<u32> {
        Ok(self.arena.function(function)?.params.len() as u32)
    }

    pub fn parameters(&self, function: FunctionId) -> Result<Vec<ValueId>> {
        Ok(self.arena.function(function)?.params.clone())
    }

    /// Set the `align` attribute on the parameter `value`
    pub fn set_parameter_alignment(&mut self, value: ValueId, align: u32) -> Result<()> {
        let (function, index) = self.parameter_position(value)?;
        if !align.is_power_of_two() {
            return Err(IrError::InvalidAlignment { align });
        }
        self.add_attribute(
            function,
            AttributeIndex::Param(index),
            Attribute::int(AttributeKind::Alignment, u64::from(align)),
        )
    }

    pub fn parameter_alignment(&self, value: ValueId) -> Result<Option<u32>> {
        let (function, index) = self.parameter_position(value)?;
        let attribute = self.get_attribute(function, AttributeIndex::Param(index), AttributeKind::Alignment)?;
        Ok(attribute.and_then(|attribute| match attribute {
            Attribute::Enum { value, .. } => u32::try_from(value).ok(),
            Attribute::String { .. } => None,
        }))
    }

    pub fn call_convention(&self, function: FunctionId) -> Result<CallConvention> {
        Ok(CallConvention::from_native(self.call_convention_code(function)?)?)
    }

    pub fn set_call_convention(&mut self, function: FunctionId, convention: CallConvention) -> Result<()> {
        self.set_call_convention_code(function, convention.to_native())
    }

    /// Raw native calling-convention code
    pub fn call_convention_code(&self, function: FunctionId) -> Result<u32> {
        Ok(self.arena.function(function)?.call_convention)
    }

    /// Set a raw code; the native engine decides which codes it supports
    pub fn set_call_convention_code(&mut self, function: FunctionId, code: u32) -> Result<()> {
        self.arena.function(function)?;
        let engine = self.arena.engine();
        if !engine.accepts_call_convention(code) {
            return Err(IrError::UnsupportedConvention { code, engine: engine.name().to_string() });
        }

        let body = self.arena.function_mut(function)?;
        body.call_convention = code;
        body.state = VerificationState::Unverified;
        Ok(())
    }

    /// The personality function; fails when none is set
    pub fn personality_function(&self, function: FunctionId) -> Result<FunctionId> {
        self.arena.function(function)?.personality.ok_or_else(|| IrError::NoPersonalityFunction {
            function: self.arena.value_name(function).unwrap_or_default().to_string(),
        })
    }

    pub fn has_personality_function(&self, function: FunctionId) -> Result<bool> {
        Ok(self.arena.function(function)?.personality.is_some())
    }

    pub fn set_personality_function(&mut self, function: FunctionId, personality: FunctionId) -> Result<()> {
        if personality.context() != function.context() {
            return Err(IrError::CrossContextValue {
                value: personality.to_string(),
                expected: function.context().to_string(),
                found: personality.context().to_string(),
            });
        }
        self.arena.function(personality)?;

        let body = self.arena.function_mut(function)?;
        body.personality = Some(personality);
        body.state = VerificationState::Unverified;
        Ok(())
    }

    pub fn clear_personality_function(&mut self, function: FunctionId) -> Result<()> {
        let body = self.arena.function_mut(function)?;
        body.personality = None;
        body.state = VerificationState::Unverified;
        Ok(())
    }

    /// GC strategy name, empty when unset
    pub fn garbage_collector(&self, function: FunctionId) -> Result<String> {
        Ok(self.arena.function(function)?.gc.clone().unwrap_or_default())
    }

    /// Set the GC strategy; an empty name unsets it
    pub fn set_garbage_collector(&mut self, function: FunctionId, strategy: &str) -> Result<()> {
        let body = self.arena.function_mut(function)?;
        body.gc = (!strategy.is_empty()).then(|| strategy.to_string());
        body.state = VerificationState::Unverified;
        Ok(())
    }

    /// Remove a function from its module.
    ///
    /// The function handle, its parameters, blocks and instructions are all
    /// released at once. Other functions that named it as personality lose
    /// that reference, and every remaining function in the module must be
    /// verified again since calls to it are now dangling.
    pub fn delete_function(&mut self, function: FunctionId) -> Result<()> {
        let name = self.arena.function_name(function)?.to_string();
        let data = self.arena.context_mut(function.context())?;
        let body = data
            .bodies
            .remove(&function.0.index)
            .ok_or_else(|| IrError::use_after_free(function))?;

        let mut instructions = 0usize;
        for &block in &body.blocks {
            if let Some(block_data) = data.release_block(block) {
                instructions += block_data.instructions.len();
                for &instruction in &block_data.instructions {
                    data.release_value(instruction);
                }
            }
        }
        for &param in &body.params {
            data.release_value(param);
        }
        data.release_value(function.0);

        data.functions.retain(|&f| f != function);
        if data.function_names.get(&name) == Some(&function) {
            data.function_names.remove(&name);
        }
        for other in data.bodies.values_mut() {
            if other.personality == Some(function) {
                other.personality = None;
            }
            other.state = VerificationState::Unverified;
        }

        debug!(
            "Deleted function '{name}' ({function}): {} blocks, {instructions} instructions",
            body.blocks.len()
        );
        Ok(())
    }

    /// Attach `attribute` at `index`, replacing one with the same key
    pub fn add_attribute(&mut self, function: FunctionId, index: AttributeIndex, attribute: Attribute) -> Result<()> {
        self.check_index(function, index)?;
        trace!("Adding attribute {attribute} at {index} of {function}");
        let body = self.arena.function_mut(function)?;
        body.attributes.entry(index).or_default().insert(attribute);
        body.state = VerificationState::Unverified;
        Ok(())
    }

    pub fn get_attributes(&self, function: FunctionId, index: AttributeIndex) -> Result<Vec<Attribute>> {
        self.check_index(function, index)?;
        Ok(self.arena.function(function)?.attributes_at(index).cloned().collect())
    }

    pub fn get_attribute(
        &self,
        function: FunctionId,
        index: AttributeIndex,
        key: impl Into<AttributeKey>,
    ) -> Result<Option<Attribute>> {
        self.check_index(function, index)?;
        let key = key.into();
        Ok(self
            .arena
            .function(function)?
            .attributes
            .get(&index)
            .and_then(|set| set.get(&key))
            .cloned())
    }

    pub fn attribute_count(&self, function: FunctionId, index: AttributeIndex) -> Result<usize> {
        self.check_index(function, index)?;
        Ok(self.arena.function(function)?.attributes.get(&index).map_or(0, AttributeSet::len))
    }

    /// Remove the attribute with `key` at `index`; absent attributes are ignored
    pub fn remove_attribute(
        &mut self,
        function: FunctionId,
        index: AttributeIndex,
        key: impl Into<AttributeKey>,
    ) -> Result<()> {
        self.check_index(function, index)?;
        let key = key.into();
        let body = self.arena.function_mut(function)?;
        let Some(set) = body.attributes.get_mut(&index) else {
            return Ok(());
        };
        if set.remove(&key).is_some() {
            if set.is_empty() {
                body.attributes.remove(&index);
            }
            body.state = VerificationState::Unverified;
        }
        Ok(())
    }

    /// Function-level string attribute interpreted only by the target
    pub fn add_target_dependent_attribute(&mut self, function: FunctionId, name: &str, value: &str) -> Result<()> {
        self.add_attribute(function, AttributeIndex::Function, Attribute::string(name, value))
    }

    fn parameter_position(&self, value: ValueId) -> Result<(FunctionId, u32)> {
        match self.arena.value_kind(value)? {
            ValueKind::Parameter { function, index } => Ok((*function, *index)),
            _ => Err(IrError::NotAParameter { value: value.to_string() }),
        }
    }

    fn check_index(&self, function: FunctionId, index: AttributeIndex) -> Result<()> {
        let count = self.arena.function(function)?.params.len() as u32;
        match index {
            AttributeIndex::Param(i) if i >= count => Err(IrError::IndexOutOfRange { index: i, count }),
            _ => Ok(()),
        }
    }
}

fn unique_label(name: &str, taken: &HashSet<&str>) -> String {
    if name.is_empty() || !taken.contains(name) {
        return name.to_string();
    }
    let mut suffix = 1u32;
    loop {
        let candidate = format!("{name}{suffix}");
        if !taken.contains(candidate.as_str()) {
            return candidate;
        }
        suffix += 1;
    }
}
