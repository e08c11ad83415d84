use std::fmt::{Display, Formatter, Result as FmtResult};

use serde::{Deserialize, Serialize};

/// Where a declaration was found, as reported by the checker layer.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SourceLocation {
    pub file: String,
    pub line: u32,
    pub column: u32,
}

impl SourceLocation {
    pub fn new(file: impl Into<String>, line: u32, column: u32) -> Self {
        Self {
            file: file.into(),
            line,
            column,
        }
    }

    pub fn is_unknown(&self) -> bool {
        self.file.is_empty()
    }
}

impl Display for SourceLocation {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        if self.is_unknown() {
            f.write_str("<unknown>")
        } else {
            write!(f, "{}:{}:{}", self.file, self.line, self.column)
        }
    }
}

/// The category a reported problem belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DiagnosticKind {
    Structural,
    MissingBinding,
    DependencyCycle,
    IncompatibleScope,
    DuplicateBinding,
    MultibindingConflict,
    AssistedMismatch,
    ParentGraphUnavailable,
    Generation,
}

impl DiagnosticKind {
    pub fn to_str(&self) -> &'static str {
        match self {
            Self::Structural => "Structural",
            Self::MissingBinding => "MissingBinding",
            Self::DependencyCycle => "DependencyCycle",
            Self::IncompatibleScope => "IncompatibleScope",
            Self::DuplicateBinding => "DuplicateBinding",
            Self::MultibindingConflict => "MultibindingConflict",
            Self::AssistedMismatch => "AssistedMismatch",
            Self::ParentGraphUnavailable => "ParentGraphUnavailable",
            Self::Generation => "Generation",
        }
    }
}

impl Display for DiagnosticKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.to_str())
    }
}

/// Sink for user-facing problems. The final presentation belongs to the host
/// compiler; the core only hands over the location, the category and the
/// message including any binding trace.
#[cfg_attr(test, mockall::automock)]
pub trait DiagnosticReporter {
    fn report(&mut self, location: &SourceLocation, kind: DiagnosticKind, message: &str);
}

/// A diagnostic captured by [`CollectingReporter`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub location: SourceLocation,
    pub kind: DiagnosticKind,
    pub message: String,
}

impl Display for Diagnostic {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}: [{}] {}", self.location, self.kind, self.message)
    }
}

/// A [`DiagnosticReporter`] which keeps everything in memory.
#[derive(Debug, Default)]
pub struct CollectingReporter {
    diagnostics: Vec<Diagnostic>,
}

impl CollectingReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn of_kind(&self, kind: DiagnosticKind) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics
            .iter()
            .filter(move |diagnostic| diagnostic.kind == kind)
    }

    pub fn is_empty(&self) -> bool {
        self.diagnostics.is_empty()
    }
}

impl DiagnosticReporter for CollectingReporter {
    fn report(&mut self, location: &SourceLocation, kind: DiagnosticKind, message: &str) {
        self.diagnostics.push(Diagnostic {
            location: location.clone(),
            kind,
            message: message.to_string(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn source_location_display_succeeds() {
        assert_eq!(
            SourceLocation::new("AppGraph.kt", 3, 7).to_string(),
            "AppGraph.kt:3:7"
        );
        assert_eq!(SourceLocation::default().to_string(), "<unknown>");
    }

    #[test]
    fn collecting_reporter_report_succeeds() {
        let mut reporter = CollectingReporter::new();
        reporter.report(
            &SourceLocation::new("A.kt", 1, 1),
            DiagnosticKind::MissingBinding,
            "missing",
        );
        reporter.report(
            &SourceLocation::new("B.kt", 2, 1),
            DiagnosticKind::DependencyCycle,
            "cycle",
        );

        assert_eq!(reporter.diagnostics().len(), 2);
        assert_eq!(reporter.of_kind(DiagnosticKind::DependencyCycle).count(), 1);
        assert_eq!(
            reporter.diagnostics()[0].to_string(),
            "A.kt:1:1: [MissingBinding] missing"
        );
    }
}
