use std::fmt::{Display, Formatter, Result as FmtResult};

use serde::{Deserialize, Serialize};

use crate::context::ResolutionContext;
use crate::decl::{Annotation, Declaration};
use crate::diagnostics::SourceLocation;
use crate::error::StructuralError;
use crate::key::TypeKey;
use crate::types::TypeRef;

/// The wrappers an injection site put around the requested type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Wrapping {
    #[default]
    None,
    Provider,
    Lazy,
    /// Provider and lazy combined, in either nesting order.
    LazyInProvider,
}

/// A [`TypeKey`] as requested by one injection site.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContextualTypeKey {
    key: TypeKey,
    #[serde(default)]
    wrapping: Wrapping,
    #[serde(default)]
    has_default: bool,
}

impl ContextualTypeKey {
    pub fn new(key: TypeKey) -> Self {
        Self {
            key,
            wrapping: Wrapping::None,
            has_default: false,
        }
    }

    pub fn with_wrapping(mut self, wrapping: Wrapping) -> Self {
        self.wrapping = wrapping;
        self
    }

    pub fn with_default(mut self, has_default: bool) -> Self {
        self.has_default = has_default;
        self
    }

    /// Derives the requested key of an injection site, unwrapping one level of
    /// provider and one level of lazy wrapper.
    pub fn from_declaration<D>(
        declaration: &D,
        context: &ResolutionContext,
    ) -> Result<Self, StructuralError>
    where
        D: Declaration + ?Sized,
    {
        Self::from_parts(
            declaration.declared_type(),
            declaration.annotations(),
            declaration.location(),
            declaration.has_default(),
            context,
        )
    }

    pub(crate) fn from_parts(
        ty: &TypeRef,
        annotations: &[Annotation],
        location: &SourceLocation,
        has_default: bool,
        context: &ResolutionContext,
    ) -> Result<Self, StructuralError> {
        let (inner, wrapping) = unwrap(ty, context);
        let key = TypeKey::from_parts(inner.clone(), annotations, location, context)?;
        Ok(Self {
            key,
            wrapping,
            has_default,
        })
    }

    pub fn key(&self) -> &TypeKey {
        &self.key
    }

    pub fn into_key(self) -> TypeKey {
        self.key
    }

    pub fn wrapping(&self) -> Wrapping {
        self.wrapping
    }

    pub fn has_default(&self) -> bool {
        self.has_default
    }

    pub fn is_wrapped_in_deferred(&self) -> bool {
        matches!(self.wrapping, Wrapping::Provider | Wrapping::LazyInProvider)
    }

    pub fn is_wrapped_in_lazy(&self) -> bool {
        matches!(self.wrapping, Wrapping::Lazy | Wrapping::LazyInProvider)
    }

    pub fn is_lazy_wrapped_in_deferred(&self) -> bool {
        self.wrapping == Wrapping::LazyInProvider
    }

    /// A deferrable request does not need its dependency to exist while the
    /// requester is being constructed.
    pub fn is_deferrable(&self) -> bool {
        self.wrapping != Wrapping::None
    }
}

fn unwrap<'t>(ty: &'t TypeRef, context: &ResolutionContext) -> (&'t TypeRef, Wrapping) {
    let options = context.options();
    let provided = options
        .provider_types
        .iter()
        .find_map(|provider| ty.unwrap_single(provider));
    if let Some(inner) = provided {
        return match options
            .lazy_types
            .iter()
            .find_map(|lazy| inner.unwrap_single(lazy))
        {
            Some(innermost) => (innermost, Wrapping::LazyInProvider),
            None => (inner, Wrapping::Provider),
        };
    }

    let lazy = options
        .lazy_types
        .iter()
        .find_map(|lazy| ty.unwrap_single(lazy));
    if let Some(inner) = lazy {
        return match options
            .provider_types
            .iter()
            .find_map(|provider| inner.unwrap_single(provider))
        {
            Some(innermost) => (innermost, Wrapping::LazyInProvider),
            None => (inner, Wrapping::Lazy),
        };
    }

    (ty, Wrapping::None)
}

impl From<TypeKey> for ContextualTypeKey {
    fn from(key: TypeKey) -> Self {
        Self::new(key)
    }
}

impl Display for ContextualTypeKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self.wrapping {
            Wrapping::None => write!(f, "{}", self.key),
            Wrapping::Provider => write!(f, "Provider<{}>", self.key),
            Wrapping::Lazy => write!(f, "Lazy<{}>", self.key),
            Wrapping::LazyInProvider => write!(f, "Provider<Lazy<{}>>", self.key),
        }
    }
}
