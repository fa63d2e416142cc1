//! Structural checks run by the reference engine
//!
//! Findings go into a [`DiagnosticReport`]; errors make the function invalid,
//! warnings (unreachable blocks) are informational only. Dominance is
//! computed over the blocks reachable from the entry block with the iterative
//! algorithm of Cooper, Harvey and Kennedy; code in unreachable blocks is
//! exempt from dominance checks.

use irk_common::{AttributeIndex, AttributeKind, Diagnostic, DiagnosticReport};
use std::collections::HashMap;

use crate::arena::HandleArena;
use crate::attributes::Attribute;
use crate::handles::{BlockId, FunctionId, ValueId};
use crate::instructions::InstructionKind;
use crate::values::ValueKind;

pub(crate) fn check_function(arena: &HandleArena, function: FunctionId, report: &mut DiagnosticReport) {
    let name = match arena.function_name(function) {
        Ok(name) if name.is_empty() => format!("@{}", function),
        Ok(name) => format!("@{name}"),
        Err(err) => {
            report.error(err.to_string(), function.to_string());
            return;
        }
    };
    let Ok(body) = arena.function(function) else {
        return;
    };

    for (&index, set) in &body.attributes {
        for attribute in set.iter() {
            check_attribute(attribute, index, &name, report);
        }
    }
    if let Some(personality) = body.personality {
        if arena.function(personality).is_err() {
            report.error(format!("personality function {personality} has been released"), name.as_str());
        }
    }

    if body.blocks.is_empty() {
        return;
    }
    Checker::new(arena, function, name, &body.blocks).run(report);
}

fn check_attribute(attribute: &Attribute, index: AttributeIndex, location: &str, report: &mut DiagnosticReport) {
    let Attribute::Enum { kind, value } = attribute else {
        return;
    };
    if !kind.is_valid_at(index) {
        report.error(format!("attribute '{kind}' does not apply to {index}"), location);
    }
    let alignment = matches!(kind, AttributeKind::Alignment | AttributeKind::StackAlignment);
    if alignment && !value.is_power_of_two() {
        report.error(format!("attribute '{attribute}' is not a power of two"), location);
    }
}

struct Checker<'a> {
    arena: &'a HandleArena,
    function: FunctionId,
    name: String,
    blocks: &'a [BlockId],
    position: HashMap<BlockId, usize>,
    successors: Vec<Vec<usize>>,
}

impl<'a> Checker<'a> {
    fn new(arena: &'a HandleArena, function: FunctionId, name: String, blocks: &'a [BlockId]) -> Self {
        let position = blocks.iter().enumerate().map(|(i, &block)| (block, i)).collect();
        Self {
            arena,
            function,
            name,
            blocks,
            position,
            successors: vec![Vec::new(); blocks.len()],
        }
    }

    fn location(&self, block: usize) -> String {
        match self.arena.block(self.blocks[block]) {
            Ok(data) if !data.name.is_empty() => format!("{}/{}", self.name, data.name),
            _ => format!("{}/{}", self.name, self.blocks[block]),
        }
    }

    fn run(mut self, report: &mut DiagnosticReport) {
        for index in 0..self.blocks.len() {
            self.check_block(index, report);
        }

        let order = self.reverse_postorder();
        let mut reachable = vec![false; self.blocks.len()];
        for &block in &order {
            reachable[block] = true;
        }
        if self.arena.config().report_unreachable_blocks {
            for index in (0..reachable.len()).filter(|&i| !reachable[i]) {
                report.warning("block is unreachable from the entry block", self.location(index));
            }
        }

        let idom = self.dominators(&order);
        for &index in &order {
            self.check_dominance(index, &idom, report);
        }
    }

    /// Terminator placement, operand liveness and ownership, branch targets
    fn check_block(&mut self, index: usize, report: &mut DiagnosticReport) {
        let location = self.location(index);
        let Ok(block) = self.arena.block(self.blocks[index]) else {
            report.error(format!("{} has been released", self.blocks[index]), location);
            return;
        };
        if block.instructions.is_empty() {
            report.error("block is empty and has no terminator", location);
            return;
        }

        let last = block.instructions.len() - 1;
        for (position, &instruction) in block.instructions.iter().enumerate() {
            let Some(kind) = self.instruction_kind(instruction) else {
                report.error(format!("instruction {instruction} has been released"), location.as_str());
                continue;
            };

            if kind.is_terminator() && position != last {
                report.error(
                    format!("terminator '{}' in the middle of the block", kind.opcode()),
                    location.as_str(),
                );
            }
            if position == last && !kind.is_terminator() {
                report.error(
                    format!("block does not end with a terminator (last instruction is '{}')", kind.opcode()),
                    location.as_str(),
                );
            }

            if let InstructionKind::Call { callee, .. } = kind {
                if self.arena.function(*callee).is_err() {
                    report.error(format!("call to released function {callee}"), location.as_str());
                }
            }
            for operand in kind.operands() {
                self.check_operand(operand, kind.opcode(), &location, report);
            }

            for target in kind.successors() {
                match self.position.get(&target) {
                    Some(0) => {
                        report.error("entry block cannot be a branch target", location.as_str());
                    }
                    Some(&successor) => {
                        if position == last {
                            self.successors[index].push(successor);
                        }
                    }
                    None => {
                        report.error(
                            format!("branch target {target} is not a block of this function"),
                            location.as_str(),
                        );
                    }
                }
            }
        }
    }

    fn check_operand(&self, operand: ValueId, opcode: &str, location: &str, report: &mut DiagnosticReport) {
        let kind = match self.arena.value_kind(operand) {
            Ok(kind) => kind,
            Err(_) => {
                report.error(format!("operand {operand} of '{opcode}' has been released"), location);
                return;
            }
        };
        let owner = match kind {
            ValueKind::Parameter { function, .. } => Some(*function),
            ValueKind::Instruction { block, .. } => self.arena.block(*block).ok().map(|data| data.function),
            _ => None,
        };
        if owner.is_some_and(|owner| owner != self.function) {
            report.error(
                format!("operand {operand} of '{opcode}' belongs to another function"),
                location,
            );
        }
    }

    /// Every instruction operand must be defined earlier in the same block
    /// or in a block that dominates the use
    fn check_dominance(&self, index: usize, idom: &[Option<usize>], report: &mut DiagnosticReport) {
        let Ok(block) = self.arena.block(self.blocks[index]) else {
            return;
        };
        for (position, &instruction) in block.instructions.iter().enumerate() {
            let Some(kind) = self.instruction_kind(instruction) else {
                continue;
            };
            for operand in kind.operands() {
                let Ok(ValueKind::Instruction { block: def_block, .. }) = self.arena.value_kind(operand) else {
                    continue;
                };
                let Some(&def_index) = self.position.get(def_block) else {
                    continue;
                };

                let dominated = if def_index == index {
                    block.instructions[..position].contains(&operand)
                } else {
                    dominates(idom, def_index, index)
                };
                if !dominated {
                    report.push(
                        Diagnostic::error(
                            format!("instruction {operand} does not dominate its use in '{}'", kind.opcode()),
                            self.location(index),
                        )
                        .with_note(format!("defined in {}", self.location(def_index))),
                    );
                }
            }
        }
    }

    fn instruction_kind(&self, value: ValueId) -> Option<&'a InstructionKind> {
        match self.arena.value_kind(value) {
            Ok(ValueKind::Instruction { kind, .. }) => Some(kind),
            _ => None,
        }
    }

    /// Blocks reachable from the entry block, in reverse postorder
    fn reverse_postorder(&self) -> Vec<usize> {
        let mut visited = vec![false; self.blocks.len()];
        let mut postorder = Vec::with_capacity(self.blocks.len());
        let mut stack = vec![(0usize, 0usize)];
        visited[0] = true;

        while let Some((block, next)) = stack.pop() {
            match self.successors[block].get(next) {
                Some(&successor) => {
                    stack.push((block, next + 1));
                    if !visited[successor] {
                        visited[successor] = true;
                        stack.push((successor, 0));
                    }
                }
                None => postorder.push(block),
            }
        }
        postorder.reverse();
        postorder
    }

    /// Immediate dominators indexed by block position; `None` for
    /// unreachable blocks, the entry block is its own dominator
    fn dominators(&self, order: &[usize]) -> Vec<Option<usize>> {
        let mut rank = vec![usize::MAX; self.blocks.len()];
        for (i, &block) in order.iter().enumerate() {
            rank[block] = i;
        }
        let mut predecessors = vec![Vec::new(); self.blocks.len()];
        for (block, successors) in self.successors.iter().enumerate() {
            for &successor in successors {
                predecessors[successor].push(block);
            }
        }

        let mut idom: Vec<Option<usize>> = vec![None; self.blocks.len()];
        idom[0] = Some(0);
        let mut changed = true;
        while changed {
            changed = false;
            for &block in order.iter().skip(1) {
                let mut new_idom = None;
                for &pred in &predecessors[block] {
                    if idom[pred].is_none() {
                        continue;
                    }
                    new_idom = Some(match new_idom {
                        None => pred,
                        Some(current) => intersect(&idom, &rank, pred, current),
                    });
                }
                if new_idom.is_some() && idom[block] != new_idom {
                    idom[block] = new_idom;
                    changed = true;
                }
            }
        }
        idom
    }
}

fn intersect(idom: &[Option<usize>], rank: &[usize], mut a: usize, mut b: usize) -> usize {
    while a != b {
        while rank[a] > rank[b] {
            a = idom[a].unwrap_or(0);
        }
        while rank[b] > rank[a] {
            b = idom[b].unwrap_or(0);
        }
    }
    a
}

/// Whether block `a` dominates block `b`; unreachable `b` is never dominated
fn dominates(idom: &[Option<usize>], a: usize, b: usize) -> bool {
    let mut current = b;
    loop {
        if current == a {
            return true;
        }
        match idom[current] {
            Some(parent) if parent != current => current = parent,
            _ => return false,
        }
    }
}
