//! A small builder DSL for declarations.
//!
//! ```rust
//! # use bindgraph::decl::dsl::*;
//! let mut app = graph("test.AppGraph")
//!     .accessor("value", ty("kotlin.CharSequence"))
//!     .build();
//!
//! provides("test.AppGraph", "provideString")
//!     .returns(ty("kotlin.String"))
//!     .set_on(&mut app);
//! provides("test.AppGraph", "provideCharSequence")
//!     .param(param("s", ty("kotlin.String")))
//!     .returns(ty("kotlin.CharSequence"))
//!     .set_on(&mut app);
//!
//! assert_eq!(app.providers.len(), 2);
//! ```

use crate::decl::{
    AccessorDecl, Annotation, BindsDecl, CallableId, ClassDecl, ClassKind, ConstructorDecl,
    ContributionKind, FunctionDecl, GraphCreatorDecl, GraphDecl, IncludedGraphDecl, InjectorDecl,
    MemberDecl, Modality, MultibindsDecl, ParamDecl, ProviderDecl, Visibility,
};
use crate::diagnostics::SourceLocation;
use crate::options::ids;
use crate::types::{ClassId, TypeRef};

pub fn ty(id: &str) -> TypeRef {
    TypeRef::class(id)
}

pub fn generic(id: &str, arguments: impl IntoIterator<Item = TypeRef>) -> TypeRef {
    TypeRef::generic(id, arguments)
}

pub fn annotation(id: &str) -> Annotation {
    Annotation::new(id)
}

pub fn inject() -> Annotation {
    Annotation::new(ids::INJECT)
}

pub fn assisted_inject() -> Annotation {
    Annotation::new(ids::ASSISTED_INJECT)
}

pub fn assisted_factory() -> Annotation {
    Annotation::new(ids::ASSISTED_FACTORY)
}

pub fn named(name: &str) -> Annotation {
    Annotation::new(ids::NAMED).with_argument(format!("\"{name}\""))
}

pub fn single_in(scope: &str) -> Annotation {
    Annotation::new(ids::SINGLE_IN).with_argument(format!("{scope}::class"))
}

pub fn param(name: &str, ty: TypeRef) -> ParamBuilder {
    ParamBuilder {
        decl: ParamDecl {
            name: name.to_string(),
            ty,
            annotations: Vec::new(),
            has_default: false,
            location: SourceLocation::default(),
        },
    }
}

pub struct ParamBuilder {
    decl: ParamDecl,
}

impl ParamBuilder {
    pub fn qualified_by(self, qualifier: Annotation) -> Self {
        self.annotated(qualifier)
    }

    pub fn annotated(mut self, annotation: Annotation) -> Self {
        self.decl.annotations.push(annotation);
        self
    }

    pub fn with_default(mut self) -> Self {
        self.decl.has_default = true;
        self
    }

    pub fn assisted(self) -> Self {
        self.annotated(Annotation::new(ids::ASSISTED))
    }

    pub fn assisted_as(self, identifier: &str) -> Self {
        self.annotated(Annotation::new(ids::ASSISTED).with_argument(format!("\"{identifier}\"")))
    }

    pub fn at(mut self, location: SourceLocation) -> Self {
        self.decl.location = location;
        self
    }

    pub fn build(self) -> ParamDecl {
        self.decl
    }
}

impl From<ParamBuilder> for ParamDecl {
    fn from(builder: ParamBuilder) -> Self {
        builder.build()
    }
}

pub fn class(id: &str) -> ClassBuilder {
    ClassBuilder {
        decl: ClassDecl {
            id: ClassId::new(id),
            kind: ClassKind::Class,
            modality: Modality::Final,
            visibility: Visibility::Public,
            is_local: false,
            type_parameters: Vec::new(),
            supertypes: Vec::new(),
            annotations: Vec::new(),
            constructors: Vec::new(),
            injected_members: Vec::new(),
            factory_function: None,
            location: SourceLocation::default(),
        },
    }
}

pub struct ClassBuilder {
    decl: ClassDecl,
}

impl ClassBuilder {
    pub fn object(mut self) -> Self {
        self.decl.kind = ClassKind::Object;
        self
    }

    pub fn interface(mut self) -> Self {
        self.decl.kind = ClassKind::Interface;
        self.decl.modality = Modality::Abstract;
        self
    }

    pub fn annotation_class(mut self) -> Self {
        self.decl.kind = ClassKind::AnnotationClass;
        self
    }

    pub fn modality(mut self, modality: Modality) -> Self {
        self.decl.modality = modality;
        self
    }

    pub fn visibility(mut self, visibility: Visibility) -> Self {
        self.decl.visibility = visibility;
        self
    }

    pub fn local(mut self) -> Self {
        self.decl.is_local = true;
        self
    }

    pub fn type_parameter(mut self, name: &str) -> Self {
        self.decl.type_parameters.push(name.to_string());
        self
    }

    pub fn supertype(mut self, ty: TypeRef) -> Self {
        self.decl.supertypes.push(ty);
        self
    }

    pub fn annotated(mut self, annotation: Annotation) -> Self {
        self.decl.annotations.push(annotation);
        self
    }

    pub fn constructor(mut self, constructor: ConstructorBuilder) -> Self {
        self.decl.constructors.push(constructor.build());
        self
    }

    pub fn member(mut self, name: &str, ty: TypeRef) -> Self {
        self.decl.injected_members.push(MemberDecl {
            name: name.to_string(),
            ty,
            annotations: Vec::new(),
            location: SourceLocation::default(),
        });
        self
    }

    pub fn factory_function(
        mut self,
        name: &str,
        parameters: impl IntoIterator<Item = ParamBuilder>,
        return_type: TypeRef,
    ) -> Self {
        self.decl.factory_function = Some(FunctionDecl {
            name: name.to_string(),
            parameters: parameters.into_iter().map(ParamBuilder::build).collect(),
            return_type,
            location: SourceLocation::default(),
        });
        self
    }

    pub fn at(mut self, location: SourceLocation) -> Self {
        self.decl.location = location;
        self
    }

    pub fn build(self) -> ClassDecl {
        self.decl
    }
}

pub fn constructor() -> ConstructorBuilder {
    ConstructorBuilder {
        decl: ConstructorDecl::default(),
    }
}

pub struct ConstructorBuilder {
    decl: ConstructorDecl,
}

impl ConstructorBuilder {
    pub fn primary(mut self) -> Self {
        self.decl.is_primary = true;
        self
    }

    pub fn annotated(mut self, annotation: Annotation) -> Self {
        self.decl.annotations.push(annotation);
        self
    }

    pub fn param(mut self, param: impl Into<ParamDecl>) -> Self {
        self.decl.parameters.push(param.into());
        self
    }

    pub fn build(self) -> ConstructorDecl {
        self.decl
    }
}

pub fn provides(owner: &str, name: &str) -> ProviderBuilder {
    ProviderBuilder {
        decl: ProviderDecl {
            callable: CallableId::new(owner, name),
            owner_is_object: false,
            return_type: TypeRef::class("kotlin.Unit"),
            annotations: Vec::new(),
            type_parameters: Vec::new(),
            parameters: Vec::new(),
            contribution: None,
            inheritance_depth: 0,
            location: SourceLocation::default(),
        },
    }
}

pub struct ProviderBuilder {
    decl: ProviderDecl,
}

impl ProviderBuilder {
    pub fn returns(mut self, ty: TypeRef) -> Self {
        self.decl.return_type = ty;
        self
    }

    pub fn param(mut self, param: impl Into<ParamDecl>) -> Self {
        self.decl.parameters.push(param.into());
        self
    }

    pub fn qualified_by(mut self, qualifier: Annotation) -> Self {
        self.decl.annotations.push(qualifier);
        self
    }

    pub fn within(mut self, scope: Annotation) -> Self {
        self.decl.annotations.push(scope);
        self
    }

    pub fn in_object(mut self) -> Self {
        self.decl.owner_is_object = true;
        self
    }

    pub fn type_parameter(mut self, name: &str) -> Self {
        self.decl.type_parameters.push(name.to_string());
        self
    }

    pub fn into_set(mut self) -> Self {
        self.decl.contribution = Some(ContributionKind::IntoSet);
        self
    }

    pub fn elements_into_set(mut self) -> Self {
        self.decl.contribution = Some(ContributionKind::ElementsIntoSet);
        self
    }

    pub fn into_map(mut self, key_type: TypeRef, key: &str) -> Self {
        self.decl.contribution = Some(ContributionKind::IntoMap {
            key_type,
            key: key.to_string(),
        });
        self
    }

    pub fn inherited(mut self, depth: u32) -> Self {
        self.decl.inheritance_depth = depth;
        self
    }

    pub fn at(mut self, location: SourceLocation) -> Self {
        self.decl.location = location;
        self
    }

    pub fn build(self) -> ProviderDecl {
        self.decl
    }

    pub fn set_on(self, graph: &mut GraphDecl) {
        graph.providers.push(self.build());
    }
}

pub fn binds(owner: &str, name: &str) -> BindsBuilder {
    BindsBuilder {
        decl: BindsDecl {
            callable: CallableId::new(owner, name),
            return_type: TypeRef::class("kotlin.Unit"),
            annotations: Vec::new(),
            parameters: Vec::new(),
            contribution: None,
            inheritance_depth: 0,
            location: SourceLocation::default(),
        },
    }
}

pub struct BindsBuilder {
    decl: BindsDecl,
}

impl BindsBuilder {
    pub fn returns(mut self, ty: TypeRef) -> Self {
        self.decl.return_type = ty;
        self
    }

    pub fn param(mut self, param: impl Into<ParamDecl>) -> Self {
        self.decl.parameters.push(param.into());
        self
    }

    pub fn qualified_by(mut self, qualifier: Annotation) -> Self {
        self.decl.annotations.push(qualifier);
        self
    }

    pub fn into_set(mut self) -> Self {
        self.decl.contribution = Some(ContributionKind::IntoSet);
        self
    }

    pub fn into_map(mut self, key_type: TypeRef, key: &str) -> Self {
        self.decl.contribution = Some(ContributionKind::IntoMap {
            key_type,
            key: key.to_string(),
        });
        self
    }

    pub fn inherited(mut self, depth: u32) -> Self {
        self.decl.inheritance_depth = depth;
        self
    }

    pub fn at(mut self, location: SourceLocation) -> Self {
        self.decl.location = location;
        self
    }

    pub fn build(self) -> BindsDecl {
        self.decl
    }

    pub fn set_on(self, graph: &mut GraphDecl) {
        graph.binds.push(self.build());
    }
}

pub fn multibinds(owner: &str, name: &str, ty: TypeRef) -> MultibindsBuilder {
    MultibindsBuilder {
        decl: MultibindsDecl {
            callable: CallableId::new(owner, name),
            ty,
            annotations: Vec::new(),
            allow_empty: false,
            location: SourceLocation::default(),
        },
    }
}

pub struct MultibindsBuilder {
    decl: MultibindsDecl,
}

impl MultibindsBuilder {
    pub fn allow_empty(mut self) -> Self {
        self.decl.allow_empty = true;
        self
    }

    pub fn qualified_by(mut self, qualifier: Annotation) -> Self {
        self.decl.annotations.push(qualifier);
        self
    }

    pub fn build(self) -> MultibindsDecl {
        self.decl
    }

    pub fn set_on(self, graph: &mut GraphDecl) {
        graph.multibinds.push(self.build());
    }
}

pub fn graph(id: &str) -> GraphBuilder {
    GraphBuilder {
        decl: GraphDecl {
            id: ClassId::new(id),
            annotations: Vec::new(),
            accessors: Vec::new(),
            injectors: Vec::new(),
            providers: Vec::new(),
            binds: Vec::new(),
            multibinds: Vec::new(),
            creator: None,
            parent: None,
            location: SourceLocation::default(),
        },
    }
}

pub struct GraphBuilder {
    decl: GraphDecl,
}

impl GraphBuilder {
    pub fn within(mut self, scope: Annotation) -> Self {
        self.decl.annotations.push(scope);
        self
    }

    pub fn accessor(self, name: &str, ty: TypeRef) -> Self {
        self.qualified_accessor(name, ty, None)
    }

    pub fn qualified_accessor(
        mut self,
        name: &str,
        ty: TypeRef,
        qualifier: Option<Annotation>,
    ) -> Self {
        self.decl.accessors.push(AccessorDecl {
            name: name.to_string(),
            ty,
            annotations: qualifier.into_iter().collect(),
            location: SourceLocation::default(),
        });
        self
    }

    pub fn injector(mut self, name: &str, target: TypeRef) -> Self {
        self.decl.injectors.push(InjectorDecl {
            name: name.to_string(),
            target: param("target", target).build(),
            location: SourceLocation::default(),
        });
        self
    }

    pub fn bound_instance(mut self, param: impl Into<ParamDecl>) -> Self {
        self.creator()
            .bound_instances
            .push(param.into());
        self
    }

    pub fn includes(
        mut self,
        param: impl Into<ParamDecl>,
        accessors: impl IntoIterator<Item = (&'static str, TypeRef)>,
    ) -> Self {
        let included = IncludedGraphDecl {
            parameter: param.into(),
            accessors: accessors
                .into_iter()
                .map(|(name, ty)| AccessorDecl {
                    name: name.to_string(),
                    ty,
                    annotations: Vec::new(),
                    location: SourceLocation::default(),
                })
                .collect(),
        };
        self.creator().included_graphs.push(included);
        self
    }

    pub fn extends(mut self, parent: &str) -> Self {
        self.decl.parent = Some(ClassId::new(parent));
        self
    }

    pub fn at(mut self, location: SourceLocation) -> Self {
        self.decl.location = location;
        self
    }

    pub fn build(self) -> GraphDecl {
        self.decl
    }

    fn creator(&mut self) -> &mut GraphCreatorDecl {
        self.decl.creator.get_or_insert_with(GraphCreatorDecl::default)
    }
}
