use std::collections::BTreeSet;
use std::fmt::{Display, Formatter, Result as FmtResult};

use serde::{Deserialize, Serialize};

use crate::context::ResolutionContext;
use crate::decl::Annotation;

/// A scope annotation such as `@SingleIn(AppScope::class)`.
///
/// Two scope annotations are the same scope only if both the annotation class
/// and its arguments are equal.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ScopeAnnotation(Annotation);

impl ScopeAnnotation {
    pub fn new(annotation: Annotation) -> Self {
        Self(annotation)
    }

    pub fn annotation(&self) -> &Annotation {
        &self.0
    }

    /// Returns the first scope annotation among `annotations`.
    pub fn find(annotations: &[Annotation], context: &ResolutionContext) -> Option<Self> {
        annotations
            .iter()
            .find(|annotation| context.is_scope(&annotation.class_id))
            .cloned()
            .map(Self)
    }
}

impl Display for ScopeAnnotation {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        Display::fmt(&self.0, f)
    }
}

/// How long an instance produced by a binding lives.
///
/// A scoped instance is created at most once per graph instance that owns the
/// scope. An unscoped instance is created anew on every request.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum Lifetime {
    Scoped(ScopeAnnotation),
    #[default]
    Unscoped,
}

impl Lifetime {
    pub fn scoped(scope: ScopeAnnotation) -> Self {
        Self::Scoped(scope)
    }

    pub fn unscoped() -> Self {
        Self::Unscoped
    }

    pub fn scope(&self) -> Option<&ScopeAnnotation> {
        match self {
            Self::Scoped(scope) => Some(scope),
            Self::Unscoped => None,
        }
    }

    pub fn is_scoped(&self) -> bool {
        matches!(self, Self::Scoped(_))
    }
}

impl From<Option<ScopeAnnotation>> for Lifetime {
    fn from(scope: Option<ScopeAnnotation>) -> Self {
        scope.map_or(Self::Unscoped, Self::Scoped)
    }
}

impl Display for Lifetime {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            Self::Scoped(scope) => write!(f, "{scope}"),
            Self::Unscoped => write!(f, "Unscoped"),
        }
    }
}

/// The scopes a graph owns. An empty set is an unscoped graph.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct GraphScopes {
    scopes: BTreeSet<ScopeAnnotation>,
}

impl GraphScopes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_annotations(annotations: &[Annotation], context: &ResolutionContext) -> Self {
        annotations
            .iter()
            .filter(|annotation| context.is_scope(&annotation.class_id))
            .cloned()
            .map(ScopeAnnotation::new)
            .collect()
    }

    pub fn contains(&self, scope: &ScopeAnnotation) -> bool {
        self.scopes.contains(scope)
    }

    /// Returns true if a binding with `lifetime` may be owned by the graph.
    pub fn admits(&self, lifetime: &Lifetime) -> bool {
        lifetime.scope().map_or(true, |scope| self.contains(scope))
    }

    pub fn is_unscoped(&self) -> bool {
        self.scopes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ScopeAnnotation> {
        self.scopes.iter()
    }
}

impl FromIterator<ScopeAnnotation> for GraphScopes {
    fn from_iter<T: IntoIterator<Item = ScopeAnnotation>>(iter: T) -> Self {
        Self {
            scopes: iter.into_iter().collect(),
        }
    }
}

impl Display for GraphScopes {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        if self.scopes.is_empty() {
            return f.write_str("unscoped");
        }
        for (i, scope) in self.scopes.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{scope}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::decl::dsl::{annotation, class, single_in};
    use crate::decl::ClassIndex;
    use crate::options::{ids, Options};

    use super::*;

    #[test]
    fn graph_scopes_admits_succeeds() {
        let classes: ClassIndex = [class("test.Singleton")
            .annotation_class()
            .annotated(annotation(ids::SCOPE))
            .build()]
        .into_iter()
        .collect();
        let context = ResolutionContext::new(Options::default(), classes);

        let scopes = GraphScopes::from_annotations(
            &[single_in("test.AppScope"), annotation("kotlin.Deprecated")],
            &context,
        );
        assert!(!scopes.is_unscoped());
        assert!(scopes.admits(&Lifetime::unscoped()));
        assert!(scopes.admits(&Lifetime::scoped(ScopeAnnotation::new(single_in(
            "test.AppScope"
        )))));
        assert!(!scopes.admits(&Lifetime::scoped(ScopeAnnotation::new(single_in(
            "test.UserScope"
        )))));
        assert!(!scopes.admits(&Lifetime::scoped(ScopeAnnotation::new(annotation(
            "test.Singleton"
        )))));
    }

    #[test]
    fn graph_scopes_display_succeeds() {
        assert_eq!(GraphScopes::new().to_string(), "unscoped");
        let scopes: GraphScopes = [ScopeAnnotation::new(single_in("test.AppScope"))]
            .into_iter()
            .collect();
        assert_eq!(
            scopes.to_string(),
            "@bindgraph.runtime.SingleIn(test.AppScope::class)"
        );
    }
}
