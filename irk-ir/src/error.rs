//! IR construction error types

use irk_common::UnknownNativeEnum;
use std::fmt;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, IrError>;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum IrError {
    #[error("use of {handle} after it was released")]
    UseAfterFree { handle: String },

    #[error("invalid integer width {bits}")]
    InvalidWidth { bits: u32 },

    #[error("invalid array length {length}")]
    InvalidLength { length: u64 },

    #[error("type {ty} belongs to {found}, expected {expected}")]
    CrossContextType {
        ty: String,
        expected: String,
        found: String,
    },

    #[error("value {value} belongs to {found}, expected {expected}")]
    CrossContextValue {
        value: String,
        expected: String,
        found: String,
    },

    #[error("type mismatch: expected {expected}, found {found}")]
    TypeMismatch { expected: String, found: String },

    #[error("value {value} is not a constant")]
    NotConstant { value: String },

    #[error("a function named '{name}' already exists in this module")]
    DuplicateName { name: String },

    #[error("index {index} out of range for {count} parameters")]
    IndexOutOfRange { index: u32, count: u32 },

    #[error("value {value} is not a function parameter")]
    NotAParameter { value: String },

    #[error("alignment {align} is not a power of two")]
    InvalidAlignment { align: u32 },

    #[error("calling convention code {code} rejected by the {engine} engine")]
    UnsupportedConvention { code: u32, engine: String },

    #[error("function '{function}' has no personality function")]
    NoPersonalityFunction { function: String },

    #[error(transparent)]
    UnknownNativeEnum(#[from] UnknownNativeEnum),

    #[error("verification failed: {}", .reasons.join("; "))]
    Invalid { reasons: Vec<String> },
}

impl IrError {
    pub(crate) fn use_after_free(handle: impl fmt::Display) -> Self {
        IrError::UseAfterFree { handle: handle.to_string() }
    }

    pub(crate) fn type_mismatch(expected: impl Into<String>, found: impl Into<String>) -> Self {
        IrError::TypeMismatch { expected: expected.into(), found: found.into() }
    }
}
