//! The declaration model handed over by the checker layer.
//!
//! Everything in here has already been filtered for basic shape (arity,
//! modifiers, visibility of annotations) by the front-end. The core only
//! re-checks what it needs for semantic graph consistency.

pub mod dsl;
mod index;

use std::fmt::{Display, Formatter, Result as FmtResult};

use serde::{Deserialize, Serialize};

use crate::diagnostics::SourceLocation;
use crate::types::{ClassId, TypeRef};

pub use index::ClassIndex;

/// An annotation use site together with its rendered arguments.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Annotation {
    pub class_id: ClassId,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub arguments: Vec<String>,
}

impl Annotation {
    pub fn new(class_id: impl Into<ClassId>) -> Self {
        Self {
            class_id: class_id.into(),
            arguments: Vec::new(),
        }
    }

    pub fn with_argument(mut self, argument: impl Into<String>) -> Self {
        self.arguments.push(argument.into());
        self
    }

    pub fn first_argument(&self) -> Option<&str> {
        self.arguments.first().map(String::as_str)
    }
}

impl Display for Annotation {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "@{}", self.class_id)?;
        if !self.arguments.is_empty() {
            write!(f, "({})", self.arguments.join(", "))?;
        }
        Ok(())
    }
}

/// Anything that has a declared type and annotations which together make up a
/// binding identity.
pub trait Declaration {
    fn declared_type(&self) -> &TypeRef;

    fn annotations(&self) -> &[Annotation];

    fn location(&self) -> &SourceLocation;

    fn has_default(&self) -> bool {
        false
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ClassKind {
    #[default]
    Class,
    Object,
    Interface,
    AnnotationClass,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Modality {
    #[default]
    Final,
    Open,
    Sealed,
    Abstract,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum Visibility {
    #[default]
    Public,
    Internal,
    Protected,
    Private,
}

impl Visibility {
    /// Generated factories live in the same module, so internal is enough.
    pub fn is_at_least_internal(self) -> bool {
        matches!(self, Self::Public | Self::Internal)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParamDecl {
    pub name: String,
    pub ty: TypeRef,
    pub annotations: Vec<Annotation>,
    pub has_default: bool,
    pub location: SourceLocation,
}

impl Declaration for ParamDecl {
    fn declared_type(&self) -> &TypeRef {
        &self.ty
    }

    fn annotations(&self) -> &[Annotation] {
        &self.annotations
    }

    fn location(&self) -> &SourceLocation {
        &self.location
    }

    fn has_default(&self) -> bool {
        self.has_default
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ConstructorDecl {
    pub is_primary: bool,
    pub annotations: Vec<Annotation>,
    pub parameters: Vec<ParamDecl>,
    pub location: SourceLocation,
}

/// An injected property or setter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberDecl {
    pub name: String,
    pub ty: TypeRef,
    pub annotations: Vec<Annotation>,
    pub location: SourceLocation,
}

impl Declaration for MemberDecl {
    fn declared_type(&self) -> &TypeRef {
        &self.ty
    }

    fn annotations(&self) -> &[Annotation] {
        &self.annotations
    }

    fn location(&self) -> &SourceLocation {
        &self.location
    }
}

/// The single abstract function of an assisted factory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionDecl {
    pub name: String,
    pub parameters: Vec<ParamDecl>,
    pub return_type: TypeRef,
    pub location: SourceLocation,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassDecl {
    pub id: ClassId,
    pub kind: ClassKind,
    pub modality: Modality,
    pub visibility: Visibility,
    pub is_local: bool,
    pub type_parameters: Vec<String>,
    pub supertypes: Vec<TypeRef>,
    pub annotations: Vec<Annotation>,
    pub constructors: Vec<ConstructorDecl>,
    pub injected_members: Vec<MemberDecl>,
    pub factory_function: Option<FunctionDecl>,
    pub location: SourceLocation,
}

impl ClassDecl {
    pub fn has_annotation(&self, class_id: &ClassId) -> bool {
        self.annotations
            .iter()
            .any(|annotation| &annotation.class_id == class_id)
    }

    pub fn primary_constructor(&self) -> Option<&ConstructorDecl> {
        self.constructors
            .iter()
            .find(|constructor| constructor.is_primary)
    }
}

/// Identity of a provider, binds or multibinds callable.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CallableId {
    pub owner: ClassId,
    pub name: String,
}

impl CallableId {
    pub fn new(owner: impl Into<ClassId>, name: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            name: name.into(),
        }
    }
}

impl Display for CallableId {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}.{}", self.owner.short_name(), self.name)
    }
}

/// How a provider or binds declaration contributes to a multibinding.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ContributionKind {
    IntoSet,
    ElementsIntoSet,
    IntoMap { key_type: TypeRef, key: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderDecl {
    pub callable: CallableId,
    pub owner_is_object: bool,
    pub return_type: TypeRef,
    pub annotations: Vec<Annotation>,
    pub type_parameters: Vec<String>,
    pub parameters: Vec<ParamDecl>,
    pub contribution: Option<ContributionKind>,
    /// 0 when declared directly on the graph or container, +1 per supertype hop.
    pub inheritance_depth: u32,
    pub location: SourceLocation,
}

impl Declaration for ProviderDecl {
    fn declared_type(&self) -> &TypeRef {
        &self.return_type
    }

    fn annotations(&self) -> &[Annotation] {
        &self.annotations
    }

    fn location(&self) -> &SourceLocation {
        &self.location
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BindsDecl {
    pub callable: CallableId,
    pub return_type: TypeRef,
    pub annotations: Vec<Annotation>,
    pub parameters: Vec<ParamDecl>,
    pub contribution: Option<ContributionKind>,
    pub inheritance_depth: u32,
    pub location: SourceLocation,
}

impl Declaration for BindsDecl {
    fn declared_type(&self) -> &TypeRef {
        &self.return_type
    }

    fn annotations(&self) -> &[Annotation] {
        &self.annotations
    }

    fn location(&self) -> &SourceLocation {
        &self.location
    }
}

/// Declares a possibly-empty multibinding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MultibindsDecl {
    pub callable: CallableId,
    pub ty: TypeRef,
    pub annotations: Vec<Annotation>,
    pub allow_empty: bool,
    pub location: SourceLocation,
}

impl Declaration for MultibindsDecl {
    fn declared_type(&self) -> &TypeRef {
        &self.ty
    }

    fn annotations(&self) -> &[Annotation] {
        &self.annotations
    }

    fn location(&self) -> &SourceLocation {
        &self.location
    }
}

/// A zero-argument member exposing a resolved dependency.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessorDecl {
    pub name: String,
    pub ty: TypeRef,
    pub annotations: Vec<Annotation>,
    pub location: SourceLocation,
}

impl Declaration for AccessorDecl {
    fn declared_type(&self) -> &TypeRef {
        &self.ty
    }

    fn annotations(&self) -> &[Annotation] {
        &self.annotations
    }

    fn location(&self) -> &SourceLocation {
        &self.location
    }
}

/// A single-parameter, `Unit`-returning member performing member injection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InjectorDecl {
    pub name: String,
    pub target: ParamDecl,
    pub location: SourceLocation,
}

/// A graph handed to the graph creator whose accessors become available.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncludedGraphDecl {
    pub parameter: ParamDecl,
    pub accessors: Vec<AccessorDecl>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct GraphCreatorDecl {
    pub bound_instances: Vec<ParamDecl>,
    pub included_graphs: Vec<IncludedGraphDecl>,
}

/// A user-declared dependency graph with its inherited members flattened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GraphDecl {
    pub id: ClassId,
    pub annotations: Vec<Annotation>,
    pub accessors: Vec<AccessorDecl>,
    pub injectors: Vec<InjectorDecl>,
    pub providers: Vec<ProviderDecl>,
    pub binds: Vec<BindsDecl>,
    pub multibinds: Vec<MultibindsDecl>,
    pub creator: Option<GraphCreatorDecl>,
    pub parent: Option<ClassId>,
    pub location: SourceLocation,
}

impl GraphDecl {
    pub fn graph_type(&self) -> TypeRef {
        TypeRef::class(self.id.clone())
    }
}
