//! irk IR builder - Context-Owned IR Construction
//!
//! This crate builds typed compiler IR inside explicitly owned contexts and
//! checks it before it is handed to a native engine.
//!
//! ## Architecture
//!
//! A [`HandleArena`] owns every context and everything allocated in one.
//! All other state is reached through short-lived component views that
//! borrow the arena:
//! - [`TypeRegistry`] (`arena.types()`) interns types per context
//! - [`ValueBuilder`] (`arena.values()`) builds constants and declares functions
//! - [`FunctionEditor`] (`arena.functions()`) edits blocks, parameters and attributes
//! - [`InstructionBuilder`] (`arena.instructions()`) appends instructions to blocks
//! - [`Verifier`] (`arena.verifier()`) checks functions and modules
//!
//! Handles are plain `Copy` identifiers tagged with their owning context.
//! Once a context is destroyed, every lookup through one of its handles
//! fails with [`IrError::UseAfterFree`].

pub mod arena;
pub mod attributes;
mod check;
pub mod config;
pub mod engine;
pub mod error;
pub mod function;
pub mod handles;
pub mod instructions;
pub mod printer;
pub mod summary;
pub mod types;
pub mod values;
pub mod verify;

#[cfg(test)]
mod tests;

pub use arena::HandleArena;
pub use attributes::{Attribute, AttributeKey};
pub use config::{ArenaConfig, ConfigError, MAX_INTEGER_WIDTH};
pub use engine::{NativeEngine, NativeHandle, NativeVerdict, ReferenceEngine};
pub use error::{IrError, Result};
pub use function::FunctionEditor;
pub use handles::{AnyHandle, BlockId, ContextId, FunctionId, TypeId, ValueId};
pub use instructions::{BinaryOp, InstructionBuilder, InstructionKind, IntPredicate};
pub use summary::{BlockSummary, FunctionSummary, ModuleSummary};
pub use types::{TypeKind, TypeRegistry};
pub use values::{ValueBuilder, ValueKind};
pub use verify::{VerificationResult, VerificationState, Verifier, VerifierAction};

pub use irk_common::{AttributeIndex, AttributeKind, CallConvention, UnknownNativeEnum};
