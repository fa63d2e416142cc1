//! Builds a module from its JSON description through the component APIs

use anyhow::{anyhow, bail, Context, Result};
use log::debug;
use std::collections::HashMap;

use irk_ir::{BlockId, ContextId, FunctionId, HandleArena, TypeId, ValueId};

use crate::desc::{FunctionDesc, InstructionDesc, ModuleDesc, OperandDesc, TypeDesc};

/// Create a context for `desc` and build every function in it
pub fn build_module(arena: &mut HandleArena, desc: &ModuleDesc) -> Result<ContextId> {
    let context = arena.create_context_named(desc.module.as_str());
    match populate(arena, context, desc) {
        Ok(()) => Ok(context),
        Err(err) => {
            arena.destroy_context(context)?;
            Err(err)
        }
    }
}

fn populate(arena: &mut HandleArena, context: ContextId, desc: &ModuleDesc) -> Result<()> {
    let mut functions = Vec::with_capacity(desc.functions.len());
    for function in &desc.functions {
        let id = declare(arena, context, function).with_context(|| format!("in function '{}'", function.name))?;
        functions.push(id);
    }

    for (function, id) in desc.functions.iter().zip(&functions) {
        if let Some(personality) = &function.personality {
            let target = lookup_function(arena, context, personality)?;
            arena.functions().set_personality_function(*id, target)?;
        }
    }

    for (function, &id) in desc.functions.iter().zip(&functions) {
        FunctionBuilder::new(arena, context, id)
            .build(function)
            .with_context(|| format!("in function '{}'", function.name))?;
    }
    debug!("Built module '{}' with {} functions", desc.module, functions.len());
    Ok(())
}

fn declare(arena: &mut HandleArena, context: ContextId, desc: &FunctionDesc) -> Result<FunctionId> {
    let returns = lower_type(arena, context, &desc.returns)?;
    let params = desc
        .params
        .iter()
        .map(|param| lower_type(arena, context, &param.ty))
        .collect::<Result<Vec<_>>>()?;
    let signature = arena.types().get_function_signature(returns, &params, desc.var_arg)?;
    let function = arena.values().declare_function(context, &desc.name, signature)?;

    for (index, param) in desc.params.iter().enumerate() {
        let value = arena.functions().get_parameter(function, index as u32)?;
        if !param.name.is_empty() {
            arena.values().set_name(value, &param.name)?;
        }
        if let Some(align) = param.align {
            arena.functions().set_parameter_alignment(value, align)?;
        }
    }
    if let Some(convention) = desc.call_convention {
        arena.functions().set_call_convention(function, convention)?;
    }
    if let Some(gc) = &desc.gc {
        arena.functions().set_garbage_collector(function, gc)?;
    }
    for attribute in &desc.attributes {
        arena.functions().add_attribute(function, attribute.index, attribute.attribute.clone())?;
    }
    Ok(function)
}

fn lower_type(arena: &mut HandleArena, context: ContextId, desc: &TypeDesc) -> Result<TypeId> {
    let ty = match desc {
        TypeDesc::Void => arena.types().get_void(context)?,
        TypeDesc::Int(bits) => arena.types().get_integer(context, *bits)?,
        TypeDesc::Array(element, length) => {
            let element = lower_type(arena, context, element)?;
            arena.types().get_array(element, *length)?
        }
        TypeDesc::Struct(fields, packed) => {
            let fields = fields
                .iter()
                .map(|field| lower_type(arena, context, field))
                .collect::<Result<Vec<_>>>()?;
            arena.types().get_struct(context, &fields, *packed)?
        }
    };
    Ok(ty)
}

fn lookup_function(arena: &mut HandleArena, context: ContextId, name: &str) -> Result<FunctionId> {
    let name = name.strip_prefix('@').unwrap_or(name);
    arena
        .values()
        .get_function(context, name)?
        .ok_or_else(|| anyhow!("unknown function '@{name}'"))
}

/// Builds the body of one function; locals are resolved by name
struct FunctionBuilder<'a> {
    arena: &'a mut HandleArena,
    context: ContextId,
    function: FunctionId,
    locals: HashMap<String, ValueId>,
    blocks: HashMap<String, BlockId>,
}

impl<'a> FunctionBuilder<'a> {
    fn new(arena: &'a mut HandleArena, context: ContextId, function: FunctionId) -> Self {
        Self { arena, context, function, locals: HashMap::new(), blocks: HashMap::new() }
    }

    fn build(mut self, desc: &FunctionDesc) -> Result<()> {
        for param in self.arena.functions().parameters(self.function)? {
            let name = self.arena.value_name(param)?.to_string();
            if !name.is_empty() {
                self.locals.insert(name, param);
            }
        }

        // Blocks first so that branches may jump forward
        let mut order = Vec::with_capacity(desc.blocks.len());
        for block in &desc.blocks {
            let id = self.arena.functions().append_basic_block(self.function, &block.name)?;
            if self.blocks.insert(block.name.clone(), id).is_some() {
                bail!("duplicate block '{}'", block.name);
            }
            order.push(id);
        }

        for (block, &id) in desc.blocks.iter().zip(&order) {
            for instruction in &block.instructions {
                self.instruction(id, instruction)
                    .with_context(|| format!("in block '{}'", block.name))?;
            }
        }
        Ok(())
    }

    fn instruction(&mut self, block: BlockId, desc: &InstructionDesc) -> Result<()> {
        let (value, name) = match desc {
            InstructionDesc::Binary { operator, lhs, rhs, name } => {
                let (lhs, rhs) = (self.operand(lhs)?, self.operand(rhs)?);
                (self.arena.instructions().build_binary(block, *operator, lhs, rhs, name)?, name)
            }
            InstructionDesc::Icmp { predicate, lhs, rhs, name } => {
                let (lhs, rhs) = (self.operand(lhs)?, self.operand(rhs)?);
                (self.arena.instructions().build_icmp(block, *predicate, lhs, rhs, name)?, name)
            }
            InstructionDesc::Select { condition, then_value, else_value, name } => {
                let condition = self.operand(condition)?;
                let then_value = self.operand(then_value)?;
                let else_value = self.operand(else_value)?;
                let value = self.arena.instructions().build_select(block, condition, then_value, else_value, name)?;
                (value, name)
            }
            InstructionDesc::Call { callee, args, name } => {
                let callee = lookup_function(self.arena, self.context, callee)?;
                let args = args.iter().map(|arg| self.operand(arg)).collect::<Result<Vec<_>>>()?;
                (self.arena.instructions().build_call(block, callee, &args, name)?, name)
            }
            InstructionDesc::Ret { value } => {
                let value = value.as_ref().map(|value| self.operand(value)).transpose()?;
                self.arena.instructions().build_return(block, value)?;
                return Ok(());
            }
            InstructionDesc::Br { target } => {
                let target = self.block(target)?;
                self.arena.instructions().build_branch(block, target)?;
                return Ok(());
            }
            InstructionDesc::CondBr { condition, then_block, else_block } => {
                let condition = self.operand(condition)?;
                let (then_block, else_block) = (self.block(then_block)?, self.block(else_block)?);
                self.arena.instructions().build_cond_branch(block, condition, then_block, else_block)?;
                return Ok(());
            }
            InstructionDesc::Unreachable => {
                self.arena.instructions().build_unreachable(block)?;
                return Ok(());
            }
        };

        if !name.is_empty() {
            self.locals.insert(name.clone(), value);
        }
        Ok(())
    }

    fn operand(&mut self, desc: &OperandDesc) -> Result<ValueId> {
        match desc {
            OperandDesc::Ref(reference) => {
                if let Some(local) = reference.strip_prefix('%') {
                    self.locals.get(local).copied().ok_or_else(|| anyhow!("unknown local '%{local}'"))
                } else if reference.starts_with('@') {
                    Ok(lookup_function(self.arena, self.context, reference)?.as_value())
                } else {
                    bail!("operand '{reference}' must start with '%' or '@'")
                }
            }
            OperandDesc::Int { value, ty } => {
                let ty = lower_type(self.arena, self.context, ty)?;
                Ok(self.arena.values().const_int(ty, *value)?)
            }
            OperandDesc::String { string, null_terminate } => {
                Ok(self.arena.values().const_string(self.context, string.as_bytes(), *null_terminate)?)
            }
        }
    }

    fn block(&self, name: &str) -> Result<BlockId> {
        let name = name.strip_prefix('%').unwrap_or(name);
        self.blocks.get(name).copied().ok_or_else(|| anyhow!("unknown block '%{name}'"))
    }
}
