//! The closed set of ways a [`TypeKey`] can be satisfied.
//!
//! Every binding is created once per key during expansion and never mutated
//! afterwards. Consumers match exhaustively on [`BindingKind`].

mod assisted;
mod constructor;
mod multibinding;
mod provided;

use std::fmt::{Display, Formatter, Result as FmtResult};

use serde::Serialize;

use crate::decl::CallableId;
use crate::diagnostics::SourceLocation;
use crate::key::{ContextualTypeKey, TypeKey};
use crate::scope::Lifetime;
use crate::types::ClassId;

pub use assisted::{
    assisted_factory_binding, assisted_parameters, AssistedDiff, AssistedParameter, AssistedShape,
};
pub use constructor::{
    analyze_class, constructor_binding, external_binding, members_injector_binding,
    AssistedFactoryClass, ClassShape, InjectableClass,
};
pub use multibinding::{
    element_key, multibinding_key, CollectionKind, Contribution, MultibindingShape,
};
pub use provided::{alias_binding, provided_binding};

pub(crate) use constructor::object_binding;
pub(crate) use multibinding::{Candidate, MultibindingCollector};

/// The declaration a binding or an injection site comes from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Provenance {
    pub declaration: String,
    pub location: SourceLocation,
}

impl Provenance {
    pub fn new(declaration: impl Into<String>, location: SourceLocation) -> Self {
        Self {
            declaration: declaration.into(),
            location,
        }
    }
}

impl Display for Provenance {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(&self.declaration)
    }
}

/// One requested dependency together with the site requesting it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dependency {
    pub request: ContextualTypeKey,
    pub site: Provenance,
}

impl Dependency {
    pub fn new(request: ContextualTypeKey, site: Provenance) -> Self {
        Self { request, site }
    }

    pub fn key(&self) -> &TypeKey {
        self.request.key()
    }
}

/// How a constructor-injected class is instantiated by generated code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case", tag = "kind", content = "identifier")]
pub enum FactoryRef {
    /// A factory generated in the current compilation unit.
    Local,
    /// A factory generated by an upstream module, recorded in its metadata.
    External(String),
}

/// Where a bound instance comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BoundSource {
    /// A parameter of the graph creator.
    CreatorParameter { name: String },
    /// An included graph instance passed to the graph creator.
    IncludedGraph { name: String },
    /// The graph instance itself.
    Graph,
}

/// The graph a delegated binding is read from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DependencySource {
    Included { parameter: String, accessor: String },
    Parent { graph: ClassId },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BindingKind {
    ConstructorInjected {
        class: ClassId,
        factory: FactoryRef,
        /// Only its assisted factory may request an assisted target.
        assisted: bool,
    },
    Provided {
        callable: CallableId,
        has_receiver: bool,
    },
    Alias {
        target: TypeKey,
    },
    Multibinding(MultibindingShape),
    Assisted(AssistedShape),
    MembersInjected {
        class: ClassId,
    },
    BoundInstance {
        source: BoundSource,
    },
    GraphDependency {
        source: DependencySource,
    },
    ObjectClass {
        class: ClassId,
    },
    Absent,
}

impl BindingKind {
    pub fn to_str(&self) -> &'static str {
        match self {
            Self::ConstructorInjected { .. } => "constructor-injected",
            Self::Provided { .. } => "provided",
            Self::Alias { .. } => "alias",
            Self::Multibinding(_) => "multibinding",
            Self::Assisted(_) => "assisted",
            Self::MembersInjected { .. } => "members-injected",
            Self::BoundInstance { .. } => "bound-instance",
            Self::GraphDependency { .. } => "graph-dependency",
            Self::ObjectClass { .. } => "object-class",
            Self::Absent => "absent",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Binding {
    key: TypeKey,
    kind: BindingKind,
    dependencies: Vec<Dependency>,
    lifetime: Lifetime,
    provenance: Provenance,
}

impl Binding {
    pub fn new(key: TypeKey, kind: BindingKind, provenance: Provenance) -> Self {
        Self {
            key,
            kind,
            dependencies: Vec::new(),
            lifetime: Lifetime::Unscoped,
            provenance,
        }
    }

    pub fn absent(key: TypeKey, provenance: Provenance) -> Self {
        Self::new(key, BindingKind::Absent, provenance)
    }

    pub fn with_dependencies(mut self, dependencies: Vec<Dependency>) -> Self {
        self.dependencies = dependencies;
        self
    }

    pub fn with_lifetime(mut self, lifetime: Lifetime) -> Self {
        self.lifetime = lifetime;
        self
    }

    pub fn key(&self) -> &TypeKey {
        &self.key
    }

    pub fn kind(&self) -> &BindingKind {
        &self.kind
    }

    pub fn dependencies(&self) -> &[Dependency] {
        &self.dependencies
    }

    pub fn lifetime(&self) -> &Lifetime {
        &self.lifetime
    }

    pub fn provenance(&self) -> &Provenance {
        &self.provenance
    }

    pub fn is_alias(&self) -> bool {
        matches!(self.kind, BindingKind::Alias { .. })
    }

    pub fn is_absent(&self) -> bool {
        matches!(self.kind, BindingKind::Absent)
    }

    pub fn is_bound_instance(&self) -> bool {
        matches!(self.kind, BindingKind::BoundInstance { .. })
    }

    pub fn is_assisted_target(&self) -> bool {
        matches!(
            self.kind,
            BindingKind::ConstructorInjected { assisted: true, .. }
        )
    }
}

impl Display for Binding {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{} ({}, {})", self.key, self.kind.to_str(), self.provenance)
    }
}
