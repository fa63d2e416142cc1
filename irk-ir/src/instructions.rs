//! Instruction Builder
//!
//! Instructions are only ever produced by appending them at the end of a
//! basic block. Type rules local to one instruction are checked here, before
//! anything is appended; rules that span the function (terminator placement,
//! dominance, cross-function references) are left to the verifier.

use log::trace;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::arena::HandleArena;
use crate::error::{IrError, Result};
use crate::handles::{BlockId, ContextId, FunctionId, TypeId, ValueId};
use crate::types::TypeKind;
use crate::values::{ValueData, ValueKind};

/// Integer binary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Udiv,
    Sdiv,
    Urem,
    Srem,
    And,
    Or,
    Xor,
    Shl,
    Lshr,
    Ashr,
}

impl BinaryOp {
    pub fn as_str(self) -> &'static str {
        match self {
            BinaryOp::Add => "add",
            BinaryOp::Sub => "sub",
            BinaryOp::Mul => "mul",
            BinaryOp::Udiv => "udiv",
            BinaryOp::Sdiv => "sdiv",
            BinaryOp::Urem => "urem",
            BinaryOp::Srem => "srem",
            BinaryOp::And => "and",
            BinaryOp::Or => "or",
            BinaryOp::Xor => "xor",
            BinaryOp::Shl => "shl",
            BinaryOp::Lshr => "lshr",
            BinaryOp::Ashr => "ashr",
        }
    }
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Integer comparison predicates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntPredicate {
    Eq,
    Ne,
    Ugt,
    Uge,
    Ult,
    Ule,
    Sgt,
    Sge,
    Slt,
    Sle,
}

impl IntPredicate {
    pub fn as_str(self) -> &'static str {
        match self {
            IntPredicate::Eq => "eq",
            IntPredicate::Ne => "ne",
            IntPredicate::Ugt => "ugt",
            IntPredicate::Uge => "uge",
            IntPredicate::Ult => "ult",
            IntPredicate::Ule => "ule",
            IntPredicate::Sgt => "sgt",
            IntPredicate::Sge => "sge",
            IntPredicate::Slt => "slt",
            IntPredicate::Sle => "sle",
        }
    }
}

impl fmt::Display for IntPredicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstructionKind {
    Binary { op: BinaryOp, lhs: ValueId, rhs: ValueId },
    ICmp { predicate: IntPredicate, lhs: ValueId, rhs: ValueId },
    Select { condition: ValueId, then_value: ValueId, else_value: ValueId },
    Call { callee: FunctionId, args: Vec<ValueId> },
    Return { value: Option<ValueId> },
    Branch { target: BlockId },
    CondBranch { condition: ValueId, then_block: BlockId, else_block: BlockId },
    Unreachable,
}

impl InstructionKind {
    pub fn is_terminator(&self) -> bool {
        matches!(
            self,
            InstructionKind::Return { .. }
                | InstructionKind::Branch { .. }
                | InstructionKind::CondBranch { .. }
                | InstructionKind::Unreachable
        )
    }

    /// Value operands, excluding the callee of a call
    pub fn operands(&self) -> Vec<ValueId> {
        match self {
            InstructionKind::Binary { lhs, rhs, .. } | InstructionKind::ICmp { lhs, rhs, .. } => vec![*lhs, *rhs],
            InstructionKind::Select { condition, then_value, else_value } => {
                vec![*condition, *then_value, *else_value]
            }
            InstructionKind::Call { args, .. } => args.clone(),
            InstructionKind::Return { value } => value.iter().copied().collect(),
            InstructionKind::CondBranch { condition, .. } => vec![*condition],
            InstructionKind::Branch { .. } | InstructionKind::Unreachable => Vec::new(),
        }
    }

    pub fn successors(&self) -> Vec<BlockId> {
        match self {
            InstructionKind::Branch { target } => vec![*target],
            InstructionKind::CondBranch { then_block, else_block, .. } => vec![*then_block, *else_block],
            _ => Vec::new(),
        }
    }

    pub fn opcode(&self) -> &'static str {
        match self {
            InstructionKind::Binary { op, .. } => op.as_str(),
            InstructionKind::ICmp { .. } => "icmp",
            InstructionKind::Select { .. } => "select",
            InstructionKind::Call { .. } => "call",
            InstructionKind::Return { .. } => "ret",
            InstructionKind::Branch { .. } | InstructionKind::CondBranch { .. } => "br",
            InstructionKind::Unreachable => "unreachable",
        }
    }
}

/// Appends instructions to basic blocks
pub struct InstructionBuilder<'a> {
    arena: &'a mut HandleArena,
}

impl<'a> InstructionBuilder<'a> {
    pub(crate) fn new(arena: &'a mut HandleArena) -> Self {
        Self { arena }
    }

    pub fn build_binary(
        &mut self,
        block: BlockId,
        op: BinaryOp,
        lhs: ValueId,
        rhs: ValueId,
        name: &str,
    ) -> Result<ValueId> {
        self.arena.block(block)?;
        let ty = self.integer_operand(block.context, lhs)?;
        let rhs_ty = self.integer_operand(block.context, rhs)?;
        self.expect_type(ty, rhs_ty)?;
        self.append(block, ty, InstructionKind::Binary { op, lhs, rhs }, name)
    }

    /// Integer comparison producing an `i1`
    pub fn build_icmp(
        &mut self,
        block: BlockId,
        predicate: IntPredicate,
        lhs: ValueId,
        rhs: ValueId,
        name: &str,
    ) -> Result<ValueId> {
        self.arena.block(block)?;
        let ty = self.integer_operand(block.context, lhs)?;
        let rhs_ty = self.integer_operand(block.context, rhs)?;
        self.expect_type(ty, rhs_ty)?;
        let bool_ty = self.arena.types().get_integer(block.context, 1)?;
        self.append(block, bool_ty, InstructionKind::ICmp { predicate, lhs, rhs }, name)
    }

    pub fn build_select(
        &mut self,
        block: BlockId,
        condition: ValueId,
        then_value: ValueId,
        else_value: ValueId,
        name: &str,
    ) -> Result<ValueId> {
        self.arena.block(block)?;
        self.expect_condition(block.context, condition)?;
        let ty = self.operand(block.context, then_value)?;
        let else_ty = self.operand(block.context, else_value)?;
        if !self.arena.type_kind(ty)?.is_sized() {
            return Err(IrError::type_mismatch("sized type", self.arena.describe_type(ty)));
        }
        self.expect_type(ty, else_ty)?;
        self.append(block, ty, InstructionKind::Select { condition, then_value, else_value }, name)
    }

    /// Call `callee`; var-arg callees accept extra trailing arguments
    pub fn build_call(&mut self, block: BlockId, callee: FunctionId, args: &[ValueId], name: &str) -> Result<ValueId> {
        self.arena.block(block)?;
        self.arena.value_in(block.context, callee.as_value())?;
        let signature = self.arena.function_signature(callee)?;
        let (return_type, params, is_var_arg) = match self.arena.type_kind(signature)? {
            TypeKind::Function { return_type, params, is_var_arg } => (*return_type, params.clone(), *is_var_arg),
            _ => return Err(IrError::type_mismatch("function signature", self.arena.describe_type(signature))),
        };

        if args.len() < params.len() || (args.len() > params.len() && !is_var_arg) {
            return Err(IrError::type_mismatch(
                format!("{} arguments", params.len()),
                format!("{} arguments", args.len()),
            ));
        }
        for (index, &arg) in args.iter().enumerate() {
            let ty = self.operand(block.context, arg)?;
            match params.get(index) {
                Some(&param) => self.expect_type(param, ty)?,
                None if !self.arena.type_kind(ty)?.is_sized() => {
                    return Err(IrError::type_mismatch("sized type", self.arena.describe_type(ty)))
                }
                None => {}
            }
        }

        self.append(block, return_type, InstructionKind::Call { callee, args: args.to_vec() }, name)
    }

    /// `ret` with a value for non-void functions, without one for void functions
    pub fn build_return(&mut self, block: BlockId, value: Option<ValueId>) -> Result<ValueId> {
        let function = self.arena.block(block)?.function;
        let signature = self.arena.function_signature(function)?;
        let return_type = match self.arena.type_kind(signature)? {
            TypeKind::Function { return_type, .. } => *return_type,
            _ => return Err(IrError::type_mismatch("function signature", self.arena.describe_type(signature))),
        };
        let returns_void = self.arena.type_kind(return_type)?.is_void();

        match value {
            Some(value) => {
                let ty = self.operand(block.context, value)?;
                if returns_void {
                    return Err(IrError::type_mismatch("no return value", self.arena.describe_type(ty)));
                }
                self.expect_type(return_type, ty)?;
            }
            None if !returns_void => {
                return Err(IrError::type_mismatch(self.arena.describe_type(return_type), "no return value"));
            }
            None => {}
        }
        self.append_terminator(block, InstructionKind::Return { value })
    }

    pub fn build_branch(&mut self, block: BlockId, target: BlockId) -> Result<ValueId> {
        self.arena.block(block)?;
        self.expect_block(block.context, target)?;
        self.append_terminator(block, InstructionKind::Branch { target })
    }

    pub fn build_cond_branch(
        &mut self,
        block: BlockId,
        condition: ValueId,
        then_block: BlockId,
        else_block: BlockId,
    ) -> Result<ValueId> {
        self.arena.block(block)?;
        self.expect_condition(block.context, condition)?;
        self.expect_block(block.context, then_block)?;
        self.expect_block(block.context, else_block)?;
        self.append_terminator(block, InstructionKind::CondBranch { condition, then_block, else_block })
    }

    pub fn build_unreachable(&mut self, block: BlockId) -> Result<ValueId> {
        self.arena.block(block)?;
        self.append_terminator(block, InstructionKind::Unreachable)
    }

    fn operand(&self, context: ContextId, value: ValueId) -> Result<TypeId> {
        Ok(self.arena.value_in(context, value)?.ty)
    }

    fn integer_operand(&self, context: ContextId, value: ValueId) -> Result<TypeId> {
        let ty = self.operand(context, value)?;
        if self.arena.type_kind(ty)?.is_integer() {
            Ok(ty)
        } else {
            Err(IrError::type_mismatch("integer type", self.arena.describe_type(ty)))
        }
    }

    fn expect_condition(&self, context: ContextId, condition: ValueId) -> Result<()> {
        let ty = self.operand(context, condition)?;
        match self.arena.type_kind(ty)? {
            TypeKind::Integer { bits: 1 } => Ok(()),
            _ => Err(IrError::type_mismatch("i1", self.arena.describe_type(ty))),
        }
    }

    fn expect_type(&self, expected: TypeId, found: TypeId) -> Result<()> {
        if expected == found {
            Ok(())
        } else {
            Err(IrError::type_mismatch(
                self.arena.describe_type(expected),
                self.arena.describe_type(found),
            ))
        }
    }

    fn expect_block(&self, context: ContextId, target: BlockId) -> Result<()> {
        if target.context != context {
            return Err(IrError::CrossContextValue {
                value: target.to_string(),
                expected: context.to_string(),
                found: target.context.to_string(),
            });
        }
        self.arena.block(target).map(|_| ())
    }

    fn append_terminator(&mut self, block: BlockId, kind: InstructionKind) -> Result<ValueId> {
        let void = self.arena.types().get_void(block.context)?;
        self.append(block, void, kind, "")
    }

    fn append(&mut self, block: BlockId, ty: TypeId, kind: InstructionKind, name: &str) -> Result<ValueId> {
        let function = self.arena.block(block)?.function;
        let opcode = kind.opcode();
        let value = self
            .arena
            .context_mut(block.context)?
            .push_value(ValueData::named(ty, ValueKind::Instruction { block, kind }, name));
        self.arena.block_mut(block)?.instructions.push(value);
        self.arena.invalidate(function)?;
        trace!("Appended '{opcode}' as {value} to {block}");
        Ok(value)
    }
}
