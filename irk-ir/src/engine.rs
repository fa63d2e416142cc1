//! Native engine seam
//!
//! Everything the IR layer needs from the optimizer/codegen library goes
//! through [`NativeEngine`]. The verification entry point keeps the native
//! convention, where `broken == true` means the function failed; only the
//! verifier reads a [`NativeVerdict`] and turns it into a
//! [`VerificationResult`](crate::VerificationResult).

use irk_common::{CallConvention, DiagnosticReport};
use log::{trace, warn};
use std::collections::HashSet;
use std::fmt;

use crate::arena::HandleArena;
use crate::check;
use crate::error::Result;
use crate::handles::{ContextId, FunctionId};

/// Opaque handle to a context owned by the native engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NativeHandle(pub u64);

impl fmt::Display for NativeHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:x}", self.0)
    }
}

/// Raw outcome of the native structural checker
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NativeVerdict {
    /// Inverted sense: `true` when the function is malformed
    pub broken: bool,
    /// One diagnostic per line
    pub message: String,
}

pub trait NativeEngine {
    fn name(&self) -> &str;

    fn create_context(&mut self) -> NativeHandle;

    fn dispose_context(&mut self, handle: NativeHandle);

    fn accepts_call_convention(&self, code: u32) -> bool;

    fn verify_function(&self, arena: &HandleArena, function: FunctionId) -> NativeVerdict;

    /// Serialize the module of `context`; the bytes are opaque to the caller
    fn write_module(&self, arena: &HandleArena, context: ContextId) -> Result<Vec<u8>>;
}

/// In-process engine that checks structure itself and emits textual IR
#[derive(Debug, Default)]
pub struct ReferenceEngine {
    next_handle: u64,
    live: HashSet<u64>,
}

impl ReferenceEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn live_handles(&self) -> usize {
        self.live.len()
    }
}

impl NativeEngine for ReferenceEngine {
    fn name(&self) -> &str {
        "reference"
    }

    fn create_context(&mut self) -> NativeHandle {
        self.next_handle += 1;
        self.live.insert(self.next_handle);
        NativeHandle(self.next_handle)
    }

    fn dispose_context(&mut self, handle: NativeHandle) {
        if !self.live.remove(&handle.0) {
            warn!("Native handle {handle} disposed twice");
        }
    }

    /// Any code inside the native range; codes without a table entry are
    /// kept verbatim and printed as `cc N`
    fn accepts_call_convention(&self, code: u32) -> bool {
        code <= CallConvention::NATIVE_MAX
    }

    fn verify_function(&self, arena: &HandleArena, function: FunctionId) -> NativeVerdict {
        let mut report = DiagnosticReport::new();
        check::check_function(arena, function, &mut report);

        for warning in report.warnings() {
            warn!("{}", warning.reason());
        }
        trace!("Reference engine checked {function}: {}", report.summary());

        NativeVerdict {
            broken: report.has_errors(),
            message: report.errors().map(|error| error.reason()).collect::<Vec<_>>().join("\n"),
        }
    }

    fn write_module(&self, arena: &HandleArena, context: ContextId) -> Result<Vec<u8>> {
        Ok(crate::printer::print_module(arena, context)?.into_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handles_are_unique_and_tracked() {
        let mut engine = ReferenceEngine::new();
        let a = engine.create_context();
        let b = engine.create_context();
        assert_ne!(a, b);
        assert_eq!(engine.live_handles(), 2);
        engine.dispose_context(a);
        assert_eq!(engine.live_handles(), 1);
    }

    #[test]
    fn test_call_convention_range() {
        let engine = ReferenceEngine::new();
        assert!(engine.accepts_call_convention(CallConvention::Fast.to_native()));
        assert!(engine.accepts_call_convention(100));
        assert!(!engine.accepts_call_convention(5000));
    }
}
