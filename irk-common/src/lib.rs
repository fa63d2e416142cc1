//! irk IR builder - Common Types and Utilities
//! 
//! This crate contains the diagnostic types shared by the verifier and the
//! driver, and the tables that translate between typed enums and the numeric
//! codes understood by the native engine.

pub mod error;
pub mod native;

pub use error::{Diagnostic, DiagnosticReport, Severity};
pub use native::{AttributeIndex, AttributeKind, AttributePlacement, CallConvention, UnknownNativeEnum};
