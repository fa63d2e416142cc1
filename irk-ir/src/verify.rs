//! Verifier
//!
//! Each function moves through `Unverified -> Verified | Invalid(reasons)`.
//! Building on a function sends it back to `Unverified`. The verifier never
//! changes the IR itself; it only records the outcome on the function.
//!
//! The native checker reports `broken == true` on failure. That sense is
//! flipped here and nowhere else: a [`VerificationResult::Verified`] always
//! means the structure is sound.

use log::{debug, error};

use crate::arena::HandleArena;
use crate::error::{IrError, Result};
use crate::handles::{ContextId, FunctionId};

/// What to do when verification fails
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerifierAction {
    /// Report failure as [`VerificationResult::Invalid`]
    ReturnStatus,
    /// Print the diagnostics to stderr and abort the process
    PrintAndAbort,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerificationResult {
    Verified,
    /// Always carries at least one reason
    Invalid(Vec<String>),
}

impl VerificationResult {
    pub fn is_valid(&self) -> bool {
        matches!(self, VerificationResult::Verified)
    }

    pub fn reasons(&self) -> &[String] {
        match self {
            VerificationResult::Verified => &[],
            VerificationResult::Invalid(reasons) => reasons,
        }
    }

    pub fn into_result(self) -> Result<()> {
        match self {
            VerificationResult::Verified => Ok(()),
            VerificationResult::Invalid(reasons) => Err(IrError::Invalid { reasons }),
        }
    }
}

/// Verification state recorded on every function
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum VerificationState {
    #[default]
    Unverified,
    Verified,
    Invalid(Vec<String>),
}

pub struct Verifier<'a> {
    arena: &'a mut HandleArena,
}

impl<'a> Verifier<'a> {
    pub(crate) fn new(arena: &'a mut HandleArena) -> Self {
        Self { arena }
    }

    /// Verify one function.
    ///
    /// # Aborts
    ///
    /// With [`VerifierAction::PrintAndAbort`], a function that fails
    /// verification aborts the whole process after its diagnostics are
    /// written to stderr. This call does not return in that case.
    pub fn verify(&mut self, function: FunctionId, action: VerifierAction) -> Result<VerificationResult> {
        let name = self.arena.function_name(function)?.to_string();
        let verdict = self.arena.engine().verify_function(self.arena, function);

        let result = if verdict.broken {
            let mut reasons: Vec<String> = verdict.message.lines().map(str::to_string).collect();
            if reasons.is_empty() {
                reasons.push(format!("@{name}: rejected by the {} engine", self.arena.engine().name()));
            }
            VerificationResult::Invalid(reasons)
        } else {
            VerificationResult::Verified
        };

        self.arena.function_mut(function)?.state = match &result {
            VerificationResult::Verified => VerificationState::Verified,
            VerificationResult::Invalid(reasons) => VerificationState::Invalid(reasons.clone()),
        };
        debug!("Verified @{name}: {}", if result.is_valid() { "ok" } else { "invalid" });

        if action == VerifierAction::PrintAndAbort {
            if let VerificationResult::Invalid(reasons) = &result {
                abort_with(&format!("function @{name}"), reasons);
            }
        }
        Ok(result)
    }

    /// Verify every function of the context's module, collecting all reasons.
    ///
    /// # Aborts
    ///
    /// Same contract as [`Verifier::verify`]: with
    /// [`VerifierAction::PrintAndAbort`] an invalid module aborts the process.
    pub fn verify_module(&mut self, context: ContextId, action: VerifierAction) -> Result<VerificationResult> {
        let module = self.arena.module_name(context)?.to_string();
        let mut reasons = Vec::new();
        for function in self.arena.functions_in(context)? {
            if let VerificationResult::Invalid(found) = self.verify(function, VerifierAction::ReturnStatus)? {
                reasons.extend(found);
            }
        }

        if reasons.is_empty() {
            return Ok(VerificationResult::Verified);
        }
        if action == VerifierAction::PrintAndAbort {
            abort_with(&format!("module '{module}'"), &reasons);
        }
        Ok(VerificationResult::Invalid(reasons))
    }

    pub fn state(&self, function: FunctionId) -> Result<VerificationState> {
        Ok(self.arena.function(function)?.state.clone())
    }
}

fn abort_with(subject: &str, reasons: &[String]) -> ! {
    error!("Verification of {subject} failed with {} error(s), aborting", reasons.len());
    eprintln!("error: verification of {subject} failed");
    for reason in reasons {
        eprintln!("  {reason}");
    }
    std::process::abort()
}
