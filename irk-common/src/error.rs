//! Diagnostics for the irk IR builder
//!
//! This module defines the diagnostic records produced while checking IR and
//! a report type that collects them in emission order.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Diagnostic severity levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Severity {
    Error,
    Warning,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Error => write!(f, "error"),
            Severity::Warning => write!(f, "warning"),
        }
    }
}

/// A diagnostic message attached to an IR location such as `@f/entry`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub message: String,
    pub location: String,
    pub notes: Vec<String>,
}

impl Diagnostic {
    pub fn error(message: impl Into<String>, location: impl Into<String>) -> Self {
        Self::with_severity(Severity::Error, message, location)
    }

    pub fn warning(message: impl Into<String>, location: impl Into<String>) -> Self {
        Self::with_severity(Severity::Warning, message, location)
    }

    fn with_severity(severity: Severity, message: impl Into<String>, location: impl Into<String>) -> Self {
        Self {
            severity,
            message: message.into(),
            location: location.into(),
            notes: Vec::new(),
        }
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.notes.push(note.into());
        self
    }

    /// Single-line rendering without the severity prefix
    pub fn reason(&self) -> String {
        if self.location.is_empty() {
            self.message.clone()
        } else {
            format!("{}: {}", self.location, self.message)
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.severity, self.reason())?;
        for note in &self.notes {
            write!(f, "\n  note: {}", note)?;
        }
        Ok(())
    }
}

/// Collects diagnostics and keeps running counts per severity
#[derive(Debug, Clone, Default)]
pub struct DiagnosticReport {
    diagnostics: Vec<Diagnostic>,
    error_count: usize,
    warning_count: usize,
}

impl DiagnosticReport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an already-built diagnostic
    pub fn push(&mut self, diagnostic: Diagnostic) -> &mut Diagnostic {
        match diagnostic.severity {
            Severity::Error => self.error_count += 1,
            Severity::Warning => self.warning_count += 1,
        }
        let index = self.diagnostics.len();
        self.diagnostics.push(diagnostic);
        &mut self.diagnostics[index]
    }

    /// Report an error diagnostic
    pub fn error(&mut self, message: impl Into<String>, location: impl Into<String>) -> &mut Diagnostic {
        self.push(Diagnostic::error(message, location))
    }

    /// Report a warning diagnostic
    pub fn warning(&mut self, message: impl Into<String>, location: impl Into<String>) -> &mut Diagnostic {
        self.push(Diagnostic::warning(message, location))
    }

    pub fn has_errors(&self) -> bool {
        self.error_count > 0
    }

    pub fn error_count(&self) -> usize {
        self.error_count
    }

    pub fn warning_count(&self) -> usize {
        self.warning_count
    }

    /// Iterate over error diagnostics only
    pub fn errors(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics.iter().filter(|d| d.severity == Severity::Error)
    }

    /// Iterate over warning diagnostics only
    pub fn warnings(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics.iter().filter(|d| d.severity == Severity::Warning)
    }

    /// Create a summary string
    pub fn summary(&self) -> String {
        match (self.error_count, self.warning_count) {
            (0, 0) => "No errors or warnings".to_string(),
            (0, w) => format!("{} warning{}", w, if w == 1 { "" } else { "s" }),
            (e, 0) => format!("{} error{}", e, if e == 1 { "" } else { "s" }),
            (e, w) => format!(
                "{} error{} and {} warning{}",
                e,
                if e == 1 { "" } else { "s" },
                w,
                if w == 1 { "" } else { "s" }
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_diagnostic_creation() {
        let diag = Diagnostic::error("missing terminator", "@f/entry");
        assert_eq!(diag.severity, Severity::Error);
        assert_eq!(diag.message, "missing terminator");
        assert_eq!(diag.reason(), "@f/entry: missing terminator");
        assert_eq!(diag.to_string(), "error: @f/entry: missing terminator");
    }

    #[test]
    fn test_reason_without_location() {
        let diag = Diagnostic::warning("unused", "");
        assert_eq!(diag.reason(), "unused");
    }

    #[test]
    fn test_report_counts() {
        let mut report = DiagnosticReport::new();
        assert!(!report.has_errors());

        report.error("bad operand", "@f");
        report.warning("unreachable block", "@f/dead");
        report.push(Diagnostic::error("stale operand", "@f/entry").with_note("defined in @f/exit"));

        assert!(report.has_errors());
        assert_eq!(report.error_count(), 2);
        assert_eq!(report.warning_count(), 1);
        assert_eq!(report.errors().count(), 2);
        assert_eq!(report.warnings().count(), 1);
    }

    #[test]
    fn test_diagnostic_with_notes() {
        let diag = Diagnostic::error("bad", "@f")
            .with_note("first")
            .with_note("second");

        assert_eq!(diag.notes, vec!["first".to_string(), "second".to_string()]);
        assert_eq!(diag.to_string(), "error: @f: bad\n  note: first\n  note: second");
    }

    #[test]
    fn test_summary() {
        let mut report = DiagnosticReport::new();
        assert_eq!(report.summary(), "No errors or warnings");

        report.error("Error 1", "@a");
        assert_eq!(report.summary(), "1 error");

        report.error("Error 2", "@b");
        assert_eq!(report.summary(), "2 errors");

        report.warning("Warning 1", "@c");
        assert_eq!(report.summary(), "2 errors and 1 warning");
    }
}
