//! Structured diagnostics (spec.md §3, §6, §7).
//!
//! Diagnostics are the user-visible quality gate: every validator rule and
//! every analyzer-detected semantic issue reports through this type rather
//! than failing the whole compilation, matching the "recoverable,
//! user-facing" tier of the error taxonomy in spec.md §7.

use std::fmt;

use crate::model::SourceRange;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    Error,
    Warning,
    Info,
    Hint,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Severity::Error => "error",
            Severity::Warning => "warning",
            Severity::Info => "info",
            Severity::Hint => "hint",
        };
        f.write_str(text)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DiagnosticSource {
    Compiler,
    Parser,
    Analyzer,
}

#[derive(Clone, Debug, PartialEq)]
pub struct RelatedInformation {
    pub file_path: Option<String>,
    pub source_range: SourceRange,
    pub message: String,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Diagnostic {
    pub file_path: Option<String>,
    pub source_range: SourceRange,
    pub source: DiagnosticSource,
    pub severity: Severity,
    pub message: String,
    pub related_information: Vec<RelatedInformation>,
}

impl Diagnostic {
    pub fn new(
        source_range: SourceRange,
        source: DiagnosticSource,
        severity: Severity,
        message: impl Into<String>,
    ) -> Self {
        Diagnostic {
            file_path: None,
            source_range,
            source,
            severity,
            message: message.into(),
            related_information: Vec::new(),
        }
    }

    pub fn error(source_range: SourceRange, message: impl Into<String>) -> Self {
        Self::new(source_range, DiagnosticSource::Analyzer, Severity::Error, message)
    }

    pub fn warning(source_range: SourceRange, message: impl Into<String>) -> Self {
        Self::new(source_range, DiagnosticSource::Analyzer, Severity::Warning, message)
    }

    pub fn with_file(mut self, file_path: impl Into<String>) -> Self {
        self.file_path = Some(file_path.into());
        self
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }

    /// Render as `file:line:col: severity: message`, the line format the
    /// external CLI streams to stderr (spec.md §6).
    pub fn to_cli_line(&self) -> String {
        let file = self.file_path.as_deref().unwrap_or("<unknown>");
        format!(
            "{file}:{}: {}: {}",
            self.source_range, self.severity, self.message
        )
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_cli_line())
    }
}

/// An accumulator used by both the analyzer and the validator so a single
/// pass can keep producing diagnostics after the first failure rather than
/// aborting (spec.md §7: "The compiler continues after a diagnostic").
#[derive(Debug, Default, Clone)]
pub struct DiagnosticBag {
    diagnostics: Vec<Diagnostic>,
}

impl DiagnosticBag {
    pub fn push(&mut self, diagnostic: Diagnostic) {
        self.diagnostics.push(diagnostic);
    }

    pub fn extend(&mut self, other: DiagnosticBag) {
        self.diagnostics.extend(other.diagnostics);
    }

    pub fn has_errors(&self) -> bool {
        self.diagnostics.iter().any(Diagnostic::is_error)
    }

    pub fn into_vec(self) -> Vec<Diagnostic> {
        self.diagnostics
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics.iter()
    }

    pub fn len(&self) -> usize {
        self.diagnostics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.diagnostics.is_empty()
    }
}
