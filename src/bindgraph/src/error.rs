use std::fmt::{Display, Formatter, Result as FmtResult};

use snafu::prelude::*;

use crate::diagnostics::{DiagnosticKind, SourceLocation};
use crate::key::TypeKey;
use crate::types::ClassId;

/// Malformed declarations which the checker layer should have rejected. They
/// abort the processing of the affected graph immediately.
#[derive(Debug, Clone, PartialEq, Eq, Snafu)]
#[snafu(visibility(pub(crate)))]
#[non_exhaustive]
pub enum StructuralError {
    #[snafu(display("{declaration} has more than one qualifier: {qualifiers}"))]
    #[non_exhaustive]
    MultipleQualifiers {
        declaration: String,
        qualifiers: String,
        location: SourceLocation,
    },
    #[snafu(display("class {class} has more than one injected constructor"))]
    #[non_exhaustive]
    MultipleInjectConstructors {
        class: ClassId,
        location: SourceLocation,
    },
    #[snafu(display(
        "class {class} has an inject annotation on both the class and a constructor"
    ))]
    #[non_exhaustive]
    InjectOnClassAndConstructor {
        class: ClassId,
        location: SourceLocation,
    },
    #[snafu(display("class {class} cannot be injected because it is {reason}"))]
    #[non_exhaustive]
    IneligibleInjectClass {
        class: ClassId,
        reason: &'static str,
        location: SourceLocation,
    },
    #[snafu(display("provider {callable} must not declare type parameters"))]
    #[non_exhaustive]
    GenericProvider {
        callable: String,
        location: SourceLocation,
    },
    #[snafu(display("binds declaration {callable} must have exactly one parameter, found {arity}"))]
    #[non_exhaustive]
    InvalidBindsArity {
        callable: String,
        arity: usize,
        location: SourceLocation,
    },
    #[snafu(display("binds declaration {callable} binds {from} to {to}, which is not one of its supertypes"))]
    #[non_exhaustive]
    UnrelatedBindsTypes {
        callable: String,
        from: String,
        to: String,
        location: SourceLocation,
    },
    #[snafu(display("assisted factory {class} is invalid: {reason}"))]
    #[non_exhaustive]
    InvalidAssistedFactory {
        class: ClassId,
        reason: &'static str,
        location: SourceLocation,
    },
    #[snafu(display("{callable} declares a multibinding of {ty}, which is not a set or a map"))]
    #[non_exhaustive]
    InvalidMultibindingType {
        callable: String,
        ty: String,
        location: SourceLocation,
    },
}

impl StructuralError {
    pub fn location(&self) -> &SourceLocation {
        match self {
            Self::MultipleQualifiers { location, .. }
            | Self::MultipleInjectConstructors { location, .. }
            | Self::InjectOnClassAndConstructor { location, .. }
            | Self::IneligibleInjectClass { location, .. }
            | Self::GenericProvider { location, .. }
            | Self::InvalidBindsArity { location, .. }
            | Self::UnrelatedBindsTypes { location, .. }
            | Self::InvalidAssistedFactory { location, .. }
            | Self::InvalidMultibindingType { location, .. } => location,
        }
    }
}

/// Which way a scope rule was broken.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeViolation {
    /// An unscoped graph reaches a scoped binding.
    UnscopedGraph,
    /// A scoped graph reaches a binding of a scope it does not own.
    MismatchedScope,
}

impl Display for ScopeViolation {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            Self::UnscopedGraph => f.write_str("unscoped graph may not reference scoped bindings"),
            Self::MismatchedScope => {
                f.write_str("graph may not reference bindings of a scope it does not declare")
            }
        }
    }
}

/// Inconsistencies of a resolved graph. They are collected, all reported, and
/// the generation of that graph is abandoned.
#[derive(Debug, Clone, PartialEq, Eq, Snafu)]
#[snafu(visibility(pub(crate)))]
#[non_exhaustive]
pub enum GraphError {
    #[snafu(display("cannot find a binding for {key}{}\n{trace}", SimilarDisplayer::new(similar)))]
    #[non_exhaustive]
    MissingBinding {
        key: TypeKey,
        similar: Vec<String>,
        trace: String,
        location: SourceLocation,
    },
    #[snafu(display("found a dependency cycle in {graph}: {}\n{trace}", CycleDisplayer::new(cycle)))]
    #[non_exhaustive]
    DependencyCycle {
        graph: ClassId,
        cycle: Vec<TypeKey>,
        trace: String,
        location: SourceLocation,
    },
    #[snafu(display("{graph} ({graph_scopes}): {violation}: {scope} {key}\n{trace}"))]
    #[non_exhaustive]
    IncompatibleScope {
        graph: ClassId,
        graph_scopes: String,
        key: TypeKey,
        scope: String,
        violation: ScopeViolation,
        trace: String,
        location: SourceLocation,
    },
    #[snafu(display("{key} is bound multiple times:\n{}", ListDisplayer::new(declarations)))]
    #[non_exhaustive]
    DuplicateBinding {
        key: TypeKey,
        declarations: Vec<String>,
        location: SourceLocation,
    },
    #[snafu(display("multibinding {multibinding} has duplicate contributions for {identity}"))]
    #[non_exhaustive]
    DuplicateContribution {
        multibinding: TypeKey,
        identity: String,
        location: SourceLocation,
    },
    #[snafu(display("multibinding {key} has no contributions and is not declared to allow empty"))]
    #[non_exhaustive]
    EmptyMultibinding {
        key: TypeKey,
        location: SourceLocation,
    },
    #[snafu(display("multibinding {key} is declared as a {declared} but contributed as a {contributed}"))]
    #[non_exhaustive]
    ConflictingMultibinding {
        key: TypeKey,
        declared: &'static str,
        contributed: &'static str,
        location: SourceLocation,
    },
    #[snafu(display(
        "assisted parameters of factory {factory} do not match {target}{}",
        AssistedDiffDisplayer::new(missing, extra, duplicates)
    ))]
    #[non_exhaustive]
    AssistedParameterMismatch {
        factory: ClassId,
        target: ClassId,
        missing: Vec<String>,
        extra: Vec<String>,
        duplicates: Vec<String>,
        location: SourceLocation,
    },
    #[snafu(display("{key} uses assisted injection and can only be requested through its assisted factory\n{trace}"))]
    #[non_exhaustive]
    AssistedTargetRequested {
        key: TypeKey,
        trace: String,
        location: SourceLocation,
    },
}

impl GraphError {
    pub fn location(&self) -> &SourceLocation {
        match self {
            Self::MissingBinding { location, .. }
            | Self::DependencyCycle { location, .. }
            | Self::IncompatibleScope { location, .. }
            | Self::DuplicateBinding { location, .. }
            | Self::DuplicateContribution { location, .. }
            | Self::EmptyMultibinding { location, .. }
            | Self::ConflictingMultibinding { location, .. }
            | Self::AssistedParameterMismatch { location, .. }
            | Self::AssistedTargetRequested { location, .. } => location,
        }
    }

    pub fn kind(&self) -> DiagnosticKind {
        match self {
            Self::MissingBinding { .. } | Self::AssistedTargetRequested { .. } => {
                DiagnosticKind::MissingBinding
            }
            Self::DependencyCycle { .. } => DiagnosticKind::DependencyCycle,
            Self::IncompatibleScope { .. } => DiagnosticKind::IncompatibleScope,
            Self::DuplicateBinding { .. } => DiagnosticKind::DuplicateBinding,
            Self::DuplicateContribution { .. }
            | Self::EmptyMultibinding { .. }
            | Self::ConflictingMultibinding { .. } => DiagnosticKind::MultibindingConflict,
            Self::AssistedParameterMismatch { .. } => DiagnosticKind::AssistedMismatch,
        }
    }
}

/// Every error found while resolving one graph.
#[derive(Debug, Clone, PartialEq, Eq, Snafu)]
#[snafu(display("aggregated graph errors:\n{}", AggregatedDisplayer::new(errors)))]
pub struct GraphErrors {
    pub errors: Vec<GraphError>,
}

struct AggregatedDisplayer<'a> {
    errors: &'a [GraphError],
}

impl<'a> AggregatedDisplayer<'a> {
    fn new(errors: &'a [GraphError]) -> Self {
        Self { errors }
    }
}

impl Display for AggregatedDisplayer<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        for (i, error) in self.errors.iter().enumerate() {
            writeln!(f, "{:4}: {}", i + 1, error)?;
        }
        Ok(())
    }
}

struct SimilarDisplayer<'a> {
    similar: &'a [String],
}

impl<'a> SimilarDisplayer<'a> {
    fn new(similar: &'a [String]) -> Self {
        Self { similar }
    }
}

impl Display for SimilarDisplayer<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        if self.similar.is_empty() {
            return Ok(());
        }
        f.write_str("\nsimilar bindings:")?;
        for similar in self.similar {
            write!(f, "\n    - {similar}")?;
        }
        Ok(())
    }
}

struct CycleDisplayer<'a> {
    cycle: &'a [TypeKey],
}

impl<'a> CycleDisplayer<'a> {
    fn new(cycle: &'a [TypeKey]) -> Self {
        Self { cycle }
    }
}

impl Display for CycleDisplayer<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        for (i, key) in self.cycle.iter().enumerate() {
            if i > 0 {
                f.write_str(" --> ")?;
            }
            write!(f, "{key}")?;
        }
        Ok(())
    }
}

struct ListDisplayer<'a> {
    items: &'a [String],
}

impl<'a> ListDisplayer<'a> {
    fn new(items: &'a [String]) -> Self {
        Self { items }
    }
}

impl Display for ListDisplayer<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        for item in self.items {
            writeln!(f, "    - {item}")?;
        }
        Ok(())
    }
}

struct AssistedDiffDisplayer<'a> {
    missing: &'a [String],
    extra: &'a [String],
    duplicates: &'a [String],
}

impl<'a> AssistedDiffDisplayer<'a> {
    fn new(missing: &'a [String], extra: &'a [String], duplicates: &'a [String]) -> Self {
        Self {
            missing,
            extra,
            duplicates,
        }
    }
}

impl Display for AssistedDiffDisplayer<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        let sections = [
            ("missing from the factory", self.missing),
            ("not declared by the target", self.extra),
            ("declared more than once", self.duplicates),
        ];
        for (title, parameters) in sections {
            if !parameters.is_empty() {
                write!(f, "\n  {title}: {}", parameters.join(", "))?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::key;
    use crate::types::TypeRef;

    use super::*;

    #[test]
    fn graph_error_display_succeeds_when_similar_bindings_exist() {
        let err = GraphError::MissingBinding {
            key: key::of(TypeRef::class("kotlin.String")),
            similar: vec!["@bindgraph.runtime.Named(\"a\") kotlin.String".to_string()],
            trace: "kotlin.String is requested at\n    [test.AppGraph] AppGraph.value".to_string(),
            location: SourceLocation::default(),
        };

        let message = err.to_string();
        assert!(message.starts_with("cannot find a binding for kotlin.String\nsimilar bindings:"));
        assert!(message.ends_with("AppGraph.value"));
        assert_eq!(err.kind(), DiagnosticKind::MissingBinding);
    }

    #[test]
    fn graph_error_display_succeeds_when_assisted_parameters_differ() {
        let err = GraphError::AssistedParameterMismatch {
            factory: ClassId::new("test.Target.Factory"),
            target: ClassId::new("test.Target"),
            missing: vec!["y: kotlin.Int".to_string()],
            extra: Vec::new(),
            duplicates: Vec::new(),
            location: SourceLocation::default(),
        };

        assert_eq!(
            err.to_string(),
            "assisted parameters of factory test.Target.Factory do not match test.Target\n  missing from the factory: y: kotlin.Int"
        );
    }

    #[test]
    fn graph_errors_display_succeeds() {
        let errors = GraphErrors {
            errors: vec![GraphError::EmptyMultibinding {
                key: key::of(TypeRef::generic(
                    "kotlin.collections.Set",
                    [TypeRef::class("kotlin.String")],
                )),
                location: SourceLocation::default(),
            }],
        };

        assert_eq!(
            errors.to_string(),
            "aggregated graph errors:\n   1: multibinding kotlin.collections.Set<kotlin.String> has no contributions and is not declared to allow empty\n"
        );
    }
}
