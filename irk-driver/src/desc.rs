//! JSON module descriptions
//!
//! A description lists the functions of one module. Types are written in
//! their textual form (`i32`, `[4 x i8]`, `{ i32, i8 }`, `<{ i8 }>`), locals
//! are referenced as `%name` and functions as `@name`.

use serde::Deserialize;
use thiserror::Error;

use irk_ir::{Attribute, AttributeIndex, BinaryOp, CallConvention, IntPredicate};

#[derive(Debug, Clone, Deserialize)]
pub struct ModuleDesc {
    #[serde(default = "default_module_name")]
    pub module: String,
    #[serde(default)]
    pub functions: Vec<FunctionDesc>,
}

fn default_module_name() -> String {
    "module".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct FunctionDesc {
    pub name: String,
    pub returns: TypeDesc,
    #[serde(default)]
    pub params: Vec<ParamDesc>,
    #[serde(default)]
    pub var_arg: bool,
    pub call_convention: Option<CallConvention>,
    pub gc: Option<String>,
    pub personality: Option<String>,
    #[serde(default)]
    pub attributes: Vec<AttributeDesc>,
    /// A function without blocks is a declaration
    #[serde(default)]
    pub blocks: Vec<BlockDesc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ParamDesc {
    #[serde(default)]
    pub name: String,
    #[serde(rename = "type")]
    pub ty: TypeDesc,
    pub align: Option<u32>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AttributeDesc {
    pub index: AttributeIndex,
    #[serde(flatten)]
    pub attribute: Attribute,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BlockDesc {
    pub name: String,
    #[serde(default)]
    pub instructions: Vec<InstructionDesc>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum InstructionDesc {
    Binary {
        operator: BinaryOp,
        lhs: OperandDesc,
        rhs: OperandDesc,
        #[serde(default)]
        name: String,
    },
    Icmp {
        predicate: IntPredicate,
        lhs: OperandDesc,
        rhs: OperandDesc,
        #[serde(default)]
        name: String,
    },
    Select {
        condition: OperandDesc,
        then_value: OperandDesc,
        else_value: OperandDesc,
        #[serde(default)]
        name: String,
    },
    Call {
        callee: String,
        #[serde(default)]
        args: Vec<OperandDesc>,
        #[serde(default)]
        name: String,
    },
    Ret {
        #[serde(default)]
        value: Option<OperandDesc>,
    },
    Br {
        target: String,
    },
    CondBr {
        condition: OperandDesc,
        then_block: String,
        else_block: String,
    },
    Unreachable,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum OperandDesc {
    /// `%local` or `@function`
    Ref(String),
    Int {
        #[serde(rename = "const")]
        value: i64,
        #[serde(rename = "type")]
        ty: TypeDesc,
    },
    String {
        string: String,
        #[serde(default = "default_true")]
        null_terminate: bool,
    },
}

fn default_true() -> bool {
    true
}

/// Parsed textual type
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(try_from = "String")]
pub enum TypeDesc {
    Void,
    Int(u32),
    Array(Box<TypeDesc>, u32),
    Struct(Vec<TypeDesc>, bool),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid type '{text}': {reason}")]
pub struct TypeParseError {
    pub text: String,
    pub reason: &'static str,
}

impl TryFrom<String> for TypeDesc {
    type Error = TypeParseError;

    fn try_from(text: String) -> Result<Self, Self::Error> {
        text.parse()
    }
}

impl std::str::FromStr for TypeDesc {
    type Err = TypeParseError;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        let mut parser = TypeParser { text, rest: text };
        let ty = parser.parse()?;
        if !parser.rest.trim().is_empty() {
            return Err(parser.error("trailing characters"));
        }
        Ok(ty)
    }
}

struct TypeParser<'a> {
    text: &'a str,
    rest: &'a str,
}

impl<'a> TypeParser<'a> {
    fn error(&self, reason: &'static str) -> TypeParseError {
        TypeParseError { text: self.text.to_string(), reason }
    }

    fn eat(&mut self, token: &str) -> bool {
        self.rest = self.rest.trim_start();
        match self.rest.strip_prefix(token) {
            Some(rest) => {
                self.rest = rest;
                true
            }
            None => false,
        }
    }

    fn number(&mut self) -> Result<u32, TypeParseError> {
        self.rest = self.rest.trim_start();
        let end = self.rest.find(|c: char| !c.is_ascii_digit()).unwrap_or(self.rest.len());
        let (digits, rest) = self.rest.split_at(end);
        let value = digits.parse().map_err(|_| self.error("expected a number"))?;
        self.rest = rest;
        Ok(value)
    }

    fn parse(&mut self) -> Result<TypeDesc, TypeParseError> {
        if self.eat("void") {
            Ok(TypeDesc::Void)
        } else if self.eat("i") {
            Ok(TypeDesc::Int(self.number()?))
        } else if self.eat("[") {
            let length = self.number()?;
            if !self.eat("x") {
                return Err(self.error("expected 'x' in array type"));
            }
            let element = self.parse()?;
            if !self.eat("]") {
                return Err(self.error("expected ']'"));
            }
            Ok(TypeDesc::Array(Box::new(element), length))
        } else if self.eat("<{") {
            let fields = self.fields()?;
            if !self.eat(">") {
                return Err(self.error("expected '>'"));
            }
            Ok(TypeDesc::Struct(fields, true))
        } else if self.eat("{") {
            Ok(TypeDesc::Struct(self.fields()?, false))
        } else {
            Err(self.error("unknown type"))
        }
    }

    /// Struct fields after the opening brace, through the closing one
    fn fields(&mut self) -> Result<Vec<TypeDesc>, TypeParseError> {
        let mut fields = Vec::new();
        if self.eat("}") {
            return Ok(fields);
        }
        loop {
            fields.push(self.parse()?);
            if self.eat("}") {
                return Ok(fields);
            }
            if !self.eat(",") {
                return Err(self.error("expected ',' or '}'"));
            }
        }
    }
}
