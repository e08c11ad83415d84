//! Binding identities.
//!
//! A [`TypeKey`] is what every map in the graph is keyed by: a resolved type
//! plus at most one qualifier annotation. A [`ContextualTypeKey`] is the shape
//! in which an injection site asks for a key (directly, through a provider,
//! lazily, or both).

mod contextual;
mod pattern;

use std::cmp::Ordering;
use std::fmt::{Debug, Display, Formatter, Result as FmtResult};
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::context::ResolutionContext;
use crate::decl::{Annotation, Declaration};
use crate::diagnostics::SourceLocation;
use crate::error::{MultipleQualifiersSnafu, StructuralError};
use crate::options::ids;
use crate::types::{ClassId, Substitution, TypeRef};

pub use contextual::{ContextualTypeKey, Wrapping};
pub use pattern::{AnyQualifierPattern, ExactPattern, Pattern, SameClassPattern};

/// A qualifier annotation disambiguating bindings of the same type.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Qualifier(Annotation);

impl Qualifier {
    pub fn new(annotation: Annotation) -> Self {
        Self(annotation)
    }

    pub fn annotation(&self) -> &Annotation {
        &self.0
    }

    pub fn class_id(&self) -> &ClassId {
        &self.0.class_id
    }
}

impl Display for Qualifier {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        Display::fmt(&self.0, f)
    }
}

/// Canonical identity of "a type plus an optional qualifier".
///
/// Equality, hashing and ordering only look at the rendered form, which is
/// computed once on construction. Two keys derived from different declarations
/// of the same qualified type are therefore always equal.
#[derive(Clone, Serialize, Deserialize)]
#[serde(from = "TypeKeyRepr", into = "TypeKeyRepr")]
pub struct TypeKey {
    ty: TypeRef,
    qualifier: Option<Qualifier>,
    rendered: Arc<str>,
}

impl TypeKey {
    pub fn new(ty: TypeRef, qualifier: Option<Qualifier>) -> Self {
        let rendered = match &qualifier {
            Some(qualifier) => format!("{qualifier} {ty}"),
            None => ty.to_string(),
        };
        Self {
            ty,
            qualifier,
            rendered: rendered.into(),
        }
    }

    /// Derives the key of a declaration from its type and qualifier annotations.
    ///
    /// # Errors
    ///
    /// Fails with [`StructuralError::MultipleQualifiers`] if more than one of
    /// the annotations is a qualifier.
    pub fn from_declaration<D>(
        declaration: &D,
        context: &ResolutionContext,
    ) -> Result<Self, StructuralError>
    where
        D: Declaration + ?Sized,
    {
        Self::from_parts(
            declaration.declared_type().clone(),
            declaration.annotations(),
            declaration.location(),
            context,
        )
    }

    pub(crate) fn from_parts(
        ty: TypeRef,
        annotations: &[Annotation],
        location: &SourceLocation,
        context: &ResolutionContext,
    ) -> Result<Self, StructuralError> {
        let qualifier = qualifier_of(&ty, annotations, location, context)?;
        Ok(Self::new(ty, qualifier))
    }

    pub fn ty(&self) -> &TypeRef {
        &self.ty
    }

    pub fn qualifier(&self) -> Option<&Qualifier> {
        self.qualifier.as_ref()
    }

    pub fn class_id(&self) -> Option<&ClassId> {
        self.ty.class_id()
    }

    pub fn as_str(&self) -> &str {
        &self.rendered
    }

    pub fn with_type(&self, ty: TypeRef) -> Self {
        Self::new(ty, self.qualifier.clone())
    }

    pub fn with_qualifier(&self, qualifier: Option<Qualifier>) -> Self {
        Self::new(self.ty.clone(), qualifier)
    }

    pub fn substitute(&self, substitution: &Substitution) -> Self {
        self.with_type(self.ty.substitute(substitution))
    }

    /// Returns true if the key carries a qualifier of class `class`.
    pub fn is_qualified_by(&self, class: &ClassId) -> bool {
        self.qualifier
            .as_ref()
            .is_some_and(|qualifier| qualifier.class_id() == class)
    }
}

pub(crate) fn qualifier_of(
    ty: &TypeRef,
    annotations: &[Annotation],
    location: &SourceLocation,
    context: &ResolutionContext,
) -> Result<Option<Qualifier>, StructuralError> {
    let qualifiers: Vec<&Annotation> = annotations
        .iter()
        .filter(|annotation| context.is_qualifier(&annotation.class_id))
        .collect();
    match qualifiers.as_slice() {
        [] => Ok(None),
        [qualifier] => Ok(Some(Qualifier::new((*qualifier).clone()))),
        _ => MultipleQualifiersSnafu {
            declaration: format!("declaration of type {ty}"),
            qualifiers: qualifiers
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(", "),
            location: location.clone(),
        }
        .fail(),
    }
}

impl PartialEq for TypeKey {
    fn eq(&self, other: &Self) -> bool {
        self.rendered == other.rendered
    }
}

impl Eq for TypeKey {}

impl Hash for TypeKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.rendered.hash(state);
    }
}

impl PartialOrd for TypeKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for TypeKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.rendered.cmp(&other.rendered)
    }
}

impl Debug for TypeKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        Display::fmt(self, f)
    }
}

impl Display for TypeKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(&self.rendered)
    }
}

#[derive(Serialize, Deserialize)]
struct TypeKeyRepr {
    #[serde(rename = "type")]
    ty: TypeRef,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    qualifier: Option<Qualifier>,
}

impl From<TypeKeyRepr> for TypeKey {
    fn from(repr: TypeKeyRepr) -> Self {
        Self::new(repr.ty, repr.qualifier)
    }
}

impl From<TypeKey> for TypeKeyRepr {
    fn from(key: TypeKey) -> Self {
        Self {
            ty: key.ty,
            qualifier: key.qualifier,
        }
    }
}

pub fn of(ty: TypeRef) -> TypeKey {
    TypeKey::new(ty, None)
}

pub fn named(ty: TypeRef, name: &str) -> TypeKey {
    qualified(
        ty,
        Annotation::new(ids::NAMED).with_argument(format!("\"{name}\"")),
    )
}

pub fn qualified(ty: TypeRef, qualifier: Annotation) -> TypeKey {
    TypeKey::new(ty, Some(Qualifier::new(qualifier)))
}

#[cfg(test)]
mod tests {
    use std::collections::hash_map::DefaultHasher;

    use crate::decl::dsl::{annotation, class, named as named_annotation, param, ty};
    use crate::decl::ClassIndex;
    use crate::options::Options;

    use super::*;

    fn context() -> ResolutionContext {
        let classes: ClassIndex = [class("test.Remote")
            .annotation_class()
            .annotated(annotation(ids::QUALIFIER))
            .build()]
        .into_iter()
        .collect();
        ResolutionContext::new(Options::default(), classes)
    }

    fn hash_of(key: &TypeKey) -> u64 {
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        hasher.finish()
    }

    #[test]
    fn type_key_from_declaration_succeeds() {
        let context = context();
        let a = param("a", ty("test.Api"))
            .qualified_by(annotation("test.Remote"))
            .annotated(annotation("kotlin.Deprecated"))
            .build();
        let b = param("b", ty("test.Api"))
            .qualified_by(annotation("test.Remote"))
            .build();

        let a = TypeKey::from_declaration(&a, &context).unwrap();
        let b = TypeKey::from_declaration(&b, &context).unwrap();
        assert_eq!(a, b);
        assert_eq!(hash_of(&a), hash_of(&b));
        assert_eq!(a.to_string(), "@test.Remote test.Api");
    }

    #[test]
    fn type_key_from_declaration_succeeds_when_qualifier_is_builtin() {
        let context = context();
        let decl = param("s", ty("kotlin.String"))
            .qualified_by(named_annotation("first"))
            .build();

        let key = TypeKey::from_declaration(&decl, &context).unwrap();
        assert_eq!(key, named(ty("kotlin.String"), "first"));
        assert_ne!(key, of(ty("kotlin.String")));
    }

    #[test]
    fn type_key_from_declaration_fails_when_qualifiers_are_multiple() {
        let context = context();
        let decl = param("s", ty("kotlin.String"))
            .qualified_by(named_annotation("first"))
            .qualified_by(annotation("test.Remote"))
            .build();

        let res = TypeKey::from_declaration(&decl, &context);
        assert!(matches!(
            res,
            Err(StructuralError::MultipleQualifiers { .. })
        ));
    }

    #[test]
    fn type_key_serde_succeeds() {
        let key = named(ty("kotlin.String"), "first");
        let json = serde_json::to_string(&key).unwrap();
        let back: TypeKey = serde_json::from_str(&json).unwrap();
        assert_eq!(back, key);
        assert_eq!(back.as_str(), key.as_str());
    }
}
