//! Textual IR printer
//!
//! Renders types, functions and whole modules in an LLVM-flavoured text
//! format. This is what the reference engine emits from `write_module`.

use std::collections::{HashMap, HashSet};
use std::fmt::Write;

use irk_common::{AttributeIndex, CallConvention};

use crate::arena::HandleArena;
use crate::error::Result;
use crate::function::FunctionData;
use crate::handles::{BlockId, ContextId, FunctionId, TypeId, ValueId};
use crate::instructions::InstructionKind;
use crate::types::TypeKind;
use crate::values::ValueKind;

pub fn format_type(arena: &HandleArena, ty: TypeId) -> Result<String> {
    let text = match arena.type_kind(ty)? {
        TypeKind::Void => "void".to_string(),
        TypeKind::Label => "label".to_string(),
        TypeKind::Integer { bits } => format!("i{bits}"),
        TypeKind::Array { element, length } => format!("[{length} x {}]", format_type(arena, *element)?),
        TypeKind::Struct { fields, packed } => {
            let fields = fields
                .iter()
                .map(|&field| format_type(arena, field))
                .collect::<Result<Vec<_>>>()?;
            let body = if fields.is_empty() { "{}".to_string() } else { format!("{{ {} }}", fields.join(", ")) };
            if *packed {
                format!("<{body}>")
            } else {
                body
            }
        }
        TypeKind::Function { return_type, params, is_var_arg } => {
            let mut parts = params
                .iter()
                .map(|&param| format_type(arena, param))
                .collect::<Result<Vec<_>>>()?;
            if *is_var_arg {
                parts.push("...".to_string());
            }
            format!("{} ({})", format_type(arena, *return_type)?, parts.join(", "))
        }
    };
    Ok(text)
}

pub fn print_module(arena: &HandleArena, context: ContextId) -> Result<String> {
    let module = arena.module_name(context)?;
    let mut out = String::new();
    let _ = writeln!(out, "; ModuleID = '{module}'");
    let _ = writeln!(out, "source_filename = \"{module}\"");

    for function in arena.functions_in(context)? {
        out.push('\n');
        out.push_str(&FunctionPrinter::new(arena, function)?.print()?);
    }
    Ok(out)
}

impl HandleArena {
    /// The context's module as textual IR
    pub fn module_to_string(&self, context: ContextId) -> Result<String> {
        print_module(self, context)
    }

    pub fn function_to_string(&self, function: FunctionId) -> Result<String> {
        FunctionPrinter::new(self, function)?.print()
    }
}

fn convention_prefix(code: u32) -> String {
    match CallConvention::from_native(code) {
        Ok(CallConvention::C) => String::new(),
        Ok(convention) => format!("{convention} "),
        Err(_) => format!("cc {code} "),
    }
}

fn function_symbol(arena: &HandleArena, function: FunctionId) -> String {
    match arena.function_name(function) {
        Ok("") => format!("@{}", function.as_value().index),
        Ok(name) => format!("@{name}"),
        Err(_) => "@<released>".to_string(),
    }
}

/// Assigns local names and prints one function
struct FunctionPrinter<'a> {
    arena: &'a HandleArena,
    function: FunctionId,
    body: &'a FunctionData,
    locals: HashMap<ValueId, String>,
    block_labels: Vec<String>,
}

impl<'a> FunctionPrinter<'a> {
    fn new(arena: &'a HandleArena, function: FunctionId) -> Result<Self> {
        let body = arena.function(function)?;
        let mut taken = HashSet::new();
        let mut next = 0u32;
        let mut label = |name: &str| {
            if !name.is_empty() {
                let mut candidate = name.to_string();
                let mut suffix = 1;
                while !taken.insert(candidate.clone()) {
                    candidate = format!("{name}{suffix}");
                    suffix += 1;
                }
                return candidate;
            }
            loop {
                let candidate = next.to_string();
                next += 1;
                if taken.insert(candidate.clone()) {
                    return candidate;
                }
            }
        };

        let mut locals = HashMap::new();
        for &param in &body.params {
            locals.insert(param, format!("%{}", label(arena.value_name(param)?)));
        }
        let mut block_labels = Vec::with_capacity(body.blocks.len());
        for &block in &body.blocks {
            let data = arena.block(block)?;
            block_labels.push(label(&data.name));
            for &instruction in &data.instructions {
                if !arena.type_kind(arena.type_of(instruction)?)?.is_void() {
                    locals.insert(instruction, format!("%{}", label(arena.value_name(instruction)?)));
                }
            }
        }

        Ok(Self { arena, function, body, locals, block_labels })
    }

    fn print(&self) -> Result<String> {
        let arena = self.arena;
        let (return_type, is_var_arg) = match arena.type_kind(self.body.signature)? {
            TypeKind::Function { return_type, is_var_arg, .. } => (*return_type, *is_var_arg),
            _ => (self.body.signature, false),
        };

        let mut params = Vec::with_capacity(self.body.params.len());
        for (index, &param) in self.body.params.iter().enumerate() {
            let mut text = format_type(arena, arena.type_of(param)?)?;
            text.push_str(&self.attributes(AttributeIndex::Param(index as u32), " "));
            if self.is_definition() {
                text.push(' ');
                text.push_str(&self.locals[&param]);
            }
            params.push(text);
        }
        if is_var_arg {
            params.push("...".to_string());
        }

        let mut out = String::new();
        let keyword = if self.is_definition() { "define" } else { "declare" };
        let return_attrs = self.attributes(AttributeIndex::Return, "");
        let _ = write!(
            out,
            "{keyword} {}{}{}{} {}({})",
            convention_prefix(self.body.call_convention),
            return_attrs,
            if return_attrs.is_empty() { "" } else { " " },
            format_type(arena, return_type)?,
            function_symbol(arena, self.function),
            params.join(", ")
        );
        out.push_str(&self.attributes(AttributeIndex::Function, " "));
        if let Some(gc) = &self.body.gc {
            let _ = write!(out, " gc \"{gc}\"");
        }
        if let Some(personality) = self.body.personality {
            let _ = write!(out, " personality {}", function_symbol(arena, personality));
        }

        if !self.is_definition() {
            out.push('\n');
            return Ok(out);
        }

        out.push_str(" {\n");
        for (index, &block) in self.body.blocks.iter().enumerate() {
            if index > 0 {
                out.push('\n');
            }
            let _ = writeln!(out, "{}:", self.block_labels[index]);
            for &instruction in arena.block_instructions(block)? {
                let _ = writeln!(out, "  {}", self.instruction(instruction)?);
            }
        }
        out.push_str("}\n");
        Ok(out)
    }

    fn is_definition(&self) -> bool {
        !self.body.blocks.is_empty()
    }

    /// Attributes at `index`, each preceded by a space, or `""`
    fn attributes(&self, index: AttributeIndex, lead: &str) -> String {
        let rendered: Vec<String> = self.body.attributes_at(index).map(ToString::to_string).collect();
        if rendered.is_empty() {
            String::new()
        } else {
            format!("{lead}{}", rendered.join(" "))
        }
    }

    fn instruction(&self, value: ValueId) -> Result<String> {
        let arena = self.arena;
        let kind = match arena.value_kind(value)? {
            ValueKind::Instruction { kind, .. } => kind,
            _ => return self.operand(value),
        };
        let result = self.locals.get(&value).map(|local| format!("{local} = ")).unwrap_or_default();

        let text = match kind {
            InstructionKind::Binary { op, lhs, rhs } => {
                format!("{op} {}, {}", self.typed(*lhs)?, self.operand(*rhs)?)
            }
            InstructionKind::ICmp { predicate, lhs, rhs } => {
                format!("icmp {predicate} {}, {}", self.typed(*lhs)?, self.operand(*rhs)?)
            }
            InstructionKind::Select { condition, then_value, else_value } => format!(
                "select {}, {}, {}",
                self.typed(*condition)?,
                self.typed(*then_value)?,
                self.typed(*else_value)?
            ),
            InstructionKind::Call { callee, args } => {
                let args = args.iter().map(|&arg| self.typed(arg)).collect::<Result<Vec<_>>>()?;
                let convention = arena.function(*callee).map(|body| body.call_convention).unwrap_or(0);
                format!(
                    "call {}{} {}({})",
                    convention_prefix(convention),
                    format_type(arena, arena.type_of(value)?)?,
                    function_symbol(arena, *callee),
                    args.join(", ")
                )
            }
            InstructionKind::Return { value: Some(returned) } => format!("ret {}", self.typed(*returned)?),
            InstructionKind::Return { value: None } => "ret void".to_string(),
            InstructionKind::Branch { target } => format!("br label {}", self.block_ref(*target)),
            InstructionKind::CondBranch { condition, then_block, else_block } => format!(
                "br {}, label {}, label {}",
                self.typed(*condition)?,
                self.block_ref(*then_block),
                self.block_ref(*else_block)
            ),
            InstructionKind::Unreachable => "unreachable".to_string(),
        };
        Ok(format!("{result}{text}"))
    }

    fn typed(&self, value: ValueId) -> Result<String> {
        match self.arena.type_of(value) {
            Ok(ty) => Ok(format!("{} {}", format_type(self.arena, ty)?, self.operand(value)?)),
            Err(_) => Ok("<released>".to_string()),
        }
    }

    fn operand(&self, value: ValueId) -> Result<String> {
        if let Some(local) = self.locals.get(&value) {
            return Ok(local.clone());
        }
        let arena = self.arena;
        let Ok(data) = arena.value(value) else {
            return Ok("<released>".to_string());
        };

        let text = match &data.kind {
            ValueKind::ConstInt { value } => format_int(arena, data.ty, *value)?,
            ValueKind::ConstArray { elements } => {
                let elements = elements.iter().map(|&e| self.typed(e)).collect::<Result<Vec<_>>>()?;
                format!("[{}]", elements.join(", "))
            }
            ValueKind::ConstData { bytes } => format!("c\"{}\"", escape_bytes(bytes)),
            ValueKind::ConstStruct { fields } => {
                let fields = fields.iter().map(|&f| self.typed(f)).collect::<Result<Vec<_>>>()?;
                let packed = matches!(arena.type_kind(data.ty)?, TypeKind::Struct { packed: true, .. });
                let body = if fields.is_empty() { "{}".to_string() } else { format!("{{ {} }}", fields.join(", ")) };
                if packed {
                    format!("<{body}>")
                } else {
                    body
                }
            }
            ValueKind::Undef => "undef".to_string(),
            ValueKind::Function => function_symbol(arena, FunctionId(value)),
            // Locals of other functions
            ValueKind::Parameter { .. } | ValueKind::Instruction { .. } => match data.name.as_str() {
                "" => format!("%<{value}>"),
                name => format!("%{name}"),
            },
        };
        Ok(text)
    }

    fn block_ref(&self, block: BlockId) -> String {
        match self.body.blocks.iter().position(|&b| b == block) {
            Some(index) => format!("%{}", self.block_labels[index]),
            None => format!("%<{block}>"),
        }
    }
}

/// Integers print signed, `i1` prints as a boolean
fn format_int(arena: &HandleArena, ty: TypeId, value: i64) -> Result<String> {
    let text = match arena.type_kind(ty)? {
        TypeKind::Integer { bits: 1 } => if value == 0 { "false" } else { "true" }.to_string(),
        _ => value.to_string(),
    };
    Ok(text)
}

fn escape_bytes(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len());
    for &byte in bytes {
        if (byte.is_ascii_graphic() && byte != b'"' && byte != b'\\') || byte == b' ' {
            out.push(byte as char);
        } else {
            let _ = write!(out, "\\{byte:02X}");
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_bytes() {
        assert_eq!(escape_bytes(b"hi there\0"), "hi there\\00");
        assert_eq!(escape_bytes(b"a\"b\n"), "a\\22b\\0A");
    }

    #[test]
    fn test_format_int_sign() {
        let mut arena = HandleArena::new();
        let ctx = arena.create_context();
        let i8_ty = arena.types().get_integer(ctx, 8).unwrap();
        let i1_ty = arena.types().get_integer(ctx, 1).unwrap();
        assert_eq!(format_int(&arena, i8_ty, -1).unwrap(), "-1");
        assert_eq!(format_int(&arena, i8_ty, 0x7f).unwrap(), "127");
        assert_eq!(format_int(&arena, i1_ty, -1).unwrap(), "true");
        assert_eq!(format_int(&arena, i1_ty, 0).unwrap(), "false");
    }
}
