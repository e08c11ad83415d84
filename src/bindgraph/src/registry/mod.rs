//! Registration of the explicit declarations of one graph.
//!
//! Declarations are registered into a [`Configurer`], which resolves
//! overrides between same-signature callables and freezes multibindings once
//! every contribution is known. The result is an immutable [`ProviderMap`].

mod provider_map;

use std::collections::BTreeMap;

use snafu::prelude::*;
use tracing::{debug, trace};

use crate::binding::{
    element_key, multibinding_key, BoundSource, Candidate, CollectionKind, Contribution,
    MultibindingCollector,
};
use crate::context::ResolutionContext;
use crate::decl::{
    BindsDecl, ContributionKind, GraphDecl, IncludedGraphDecl, MultibindsDecl, ParamDecl,
    ProviderDecl,
};
use crate::error::{GraphError, InvalidMultibindingTypeSnafu, StructuralError};
use crate::key::{self, qualifier_of, TypeKey};

pub use provider_map::{Declared, IncludedAccessor, ProviderMap};

/// Collects the declarations of one graph.
pub struct Configurer<'a> {
    context: &'a ResolutionContext,
    candidates: BTreeMap<TypeKey, Vec<Declared>>,
    multibindings: MultibindingCollector<Declared>,
    providers: ProviderMap,
}

impl<'a> Configurer<'a> {
    pub fn new(context: &'a ResolutionContext) -> Self {
        Self {
            context,
            candidates: BTreeMap::new(),
            multibindings: MultibindingCollector::new(),
            providers: ProviderMap::new(),
        }
    }

    /// Registers every declaration of `graph`, including its creator
    /// parameters and the graph instance itself.
    pub fn configure(
        graph: &GraphDecl,
        context: &'a ResolutionContext,
    ) -> Result<Self, StructuralError> {
        let mut configurer = Self::new(context);
        configurer.register_bound_instance(
            key::of(graph.graph_type()),
            Declared::BoundInstance {
                param: ParamDecl {
                    name: "graph".to_string(),
                    ty: graph.graph_type(),
                    annotations: Vec::new(),
                    has_default: false,
                    location: graph.location.clone(),
                },
                source: BoundSource::Graph,
                location: graph.location.clone(),
            },
        );
        for decl in &graph.providers {
            configurer.register_provider(decl)?;
        }
        for decl in &graph.binds {
            configurer.register_binds(decl)?;
        }
        for decl in &graph.multibinds {
            configurer.register_multibinds(decl)?;
        }
        if let Some(creator) = &graph.creator {
            for param in &creator.bound_instances {
                let key = TypeKey::from_declaration(param, context)?;
                configurer.register_bound_instance(
                    key,
                    Declared::BoundInstance {
                        param: param.clone(),
                        source: BoundSource::CreatorParameter {
                            name: param.name.clone(),
                        },
                        location: param.location.clone(),
                    },
                );
            }
            for included in &creator.included_graphs {
                configurer.register_included(included)?;
            }
        }
        Ok(configurer)
    }

    pub fn register_provider(&mut self, decl: &ProviderDecl) -> Result<(), StructuralError> {
        match &decl.contribution {
            Some(kind) => {
                let qualifier =
                    qualifier_of(&decl.return_type, &decl.annotations, &decl.location, self.context)?;
                let multibinding = multibinding_key(
                    kind,
                    &decl.return_type,
                    qualifier,
                    &decl.callable,
                    &decl.location,
                    self.context.options(),
                )?;
                let element = element_key(
                    &multibinding,
                    decl.return_type.clone(),
                    &decl.callable,
                    self.context.options(),
                );
                let collection = collection_of(kind);
                let declared = Declared::Provider(decl.clone());
                self.contribute(multibinding, collection, element, kind.clone(), declared);
            }
            None => {
                let key = TypeKey::from_declaration(decl, self.context)?;
                self.register(key, Declared::Provider(decl.clone()));
            }
        }
        Ok(())
    }

    pub fn register_binds(&mut self, decl: &BindsDecl) -> Result<(), StructuralError> {
        match &decl.contribution {
            Some(kind) => {
                let qualifier =
                    qualifier_of(&decl.return_type, &decl.annotations, &decl.location, self.context)?;
                let multibinding = multibinding_key(
                    kind,
                    &decl.return_type,
                    qualifier,
                    &decl.callable,
                    &decl.location,
                    self.context.options(),
                )?;
                let element = element_key(
                    &multibinding,
                    decl.return_type.clone(),
                    &decl.callable,
                    self.context.options(),
                );
                let collection = collection_of(kind);
                let declared = Declared::Binds(decl.clone());
                self.contribute(multibinding, collection, element, kind.clone(), declared);
            }
            None => {
                let key = TypeKey::from_declaration(decl, self.context)?;
                self.register(key, Declared::Binds(decl.clone()));
            }
        }
        Ok(())
    }

    pub fn register_multibinds(&mut self, decl: &MultibindsDecl) -> Result<(), StructuralError> {
        let collection = CollectionKind::of(&decl.ty, self.context.options()).context(
            InvalidMultibindingTypeSnafu {
                callable: decl.callable.to_string(),
                ty: decl.ty.to_string(),
                location: decl.location.clone(),
            },
        )?;
        let key = TypeKey::from_declaration(decl, self.context)?;
        trace!(%key, allow_empty = decl.allow_empty, "declared multibinding");
        self.multibindings
            .declare(key, collection, decl.allow_empty, decl.location.clone());
        Ok(())
    }

    pub fn register_bound_instance(&mut self, key: TypeKey, declared: Declared) {
        self.register(key, declared);
    }

    /// Registers an included graph instance and exposes its accessors.
    pub fn register_included(&mut self, included: &IncludedGraphDecl) -> Result<(), StructuralError> {
        let graph = TypeKey::from_declaration(&included.parameter, self.context)?;
        self.register(
            graph.clone(),
            Declared::BoundInstance {
                param: included.parameter.clone(),
                source: BoundSource::IncludedGraph {
                    name: included.parameter.name.clone(),
                },
                location: included.parameter.location.clone(),
            },
        );
        for accessor in &included.accessors {
            let key = TypeKey::from_declaration(accessor, self.context)?;
            let registered = self.providers.insert_included(
                key.clone(),
                IncludedAccessor {
                    graph: graph.clone(),
                    parameter: included.parameter.name.clone(),
                    accessor: accessor.name.clone(),
                    location: accessor.location.clone(),
                },
            );
            if !registered {
                debug!(%key, accessor = %accessor.name, "ignored shadowed included accessor");
            }
        }
        Ok(())
    }

    fn register(&mut self, key: TypeKey, declared: Declared) {
        trace!(%key, declaration = %declared.signature(), "registered declaration");
        self.candidates.entry(key).or_default().push(declared);
    }

    fn contribute(
        &mut self,
        multibinding: TypeKey,
        collection: CollectionKind,
        element: TypeKey,
        kind: ContributionKind,
        declared: Declared,
    ) {
        trace!(%multibinding, %element, "registered contribution");
        let source = match &declared {
            Declared::Provider(decl) => decl.callable.clone(),
            Declared::Binds(decl) => decl.callable.clone(),
            Declared::BoundInstance { .. } => return,
        };
        let candidate = Candidate {
            signature: declared.signature(),
            depth: declared.inheritance_depth(),
            contribution: Contribution {
                element,
                kind,
                source,
            },
            location: declared.location().clone(),
            item: declared,
        };
        self.multibindings.contribute(multibinding, collection, candidate);
    }

    /// Resolves overrides and returns the frozen declarations.
    ///
    /// # Errors
    ///
    /// Returns every key bound by more than one winning declaration, and every
    /// key that is both bound explicitly and contributed to.
    pub fn finish(mut self) -> Result<ProviderMap, Vec<GraphError>> {
        let mut errors = Vec::new();

        for (key, candidates) in std::mem::take(&mut self.candidates) {
            let winners = resolve_overrides(candidates);
            if winners.len() > 1 {
                errors.push(GraphError::DuplicateBinding {
                    key: key.clone(),
                    declarations: winners.iter().map(Declared::describe).collect(),
                    location: winners[0].location().clone(),
                });
            }
            if let Some(winner) = winners.into_iter().next() {
                self.providers.insert(key, winner);
            }
        }

        for (key, frozen) in self.multibindings.freeze() {
            if let Some(declared) = self.providers.get(&key) {
                errors.push(GraphError::ConflictingMultibinding {
                    key: key.clone(),
                    declared: "provided binding",
                    contributed: frozen.shape.collection.describe(),
                    location: declared.location().clone(),
                });
                continue;
            }
            for (contribution, winner) in frozen.shape.contributions.iter().zip(frozen.winners) {
                self.providers.insert(contribution.element.clone(), winner);
            }
            debug!(
                %key,
                contributions = frozen.shape.contributions.len(),
                "froze multibinding"
            );
            self.providers
                .insert_multibinding(key, frozen.shape, frozen.location);
        }

        if errors.is_empty() {
            Ok(self.providers)
        } else {
            Err(errors)
        }
    }
}

/// Groups declarations by signature and keeps, per group, the declarations
/// closest to the graph. More than one survivor means a duplicate binding.
fn resolve_overrides(candidates: Vec<Declared>) -> Vec<Declared> {
    let mut groups: Vec<(String, Vec<Declared>)> = Vec::new();
    for candidate in candidates {
        let signature = candidate.signature();
        match groups.iter_mut().find(|(existing, _)| *existing == signature) {
            Some((_, group)) => group.push(candidate),
            None => groups.push((signature, vec![candidate])),
        }
    }

    let mut winners = Vec::new();
    for (_, group) in groups {
        let Some(depth) = group.iter().map(Declared::inheritance_depth).min() else {
            continue;
        };
        winners.extend(
            group
                .into_iter()
                .filter(|candidate| candidate.inheritance_depth() == depth),
        );
    }
    winners
}

fn collection_of(kind: &ContributionKind) -> CollectionKind {
    match kind {
        ContributionKind::IntoMap { .. } => CollectionKind::Map,
        ContributionKind::IntoSet | ContributionKind::ElementsIntoSet => CollectionKind::Set,
    }
}

#[cfg(test)]
mod tests {
    use crate::decl::dsl::{
        binds, graph, multibinds, named, param, provides, single_in, ty,
    };
    use crate::decl::ClassIndex;
    use crate::options::Options;
    use crate::types::TypeRef;

    use super::*;

    fn context() -> ResolutionContext {
        ResolutionContext::new(Options::default(), ClassIndex::new())
    }

    #[test]
    fn configurer_finish_succeeds() {
        let context = context();
        let mut app = graph("test.AppGraph")
            .bound_instance(param("name", ty("kotlin.String")).qualified_by(named("user")))
            .build();
        provides("test.AppGraph", "provideString")
            .returns(ty("kotlin.String"))
            .within(single_in("test.AppScope"))
            .set_on(&mut app);
        binds("test.AppGraph", "bindSequence")
            .param(param("s", ty("kotlin.String")))
            .returns(ty("kotlin.CharSequence"))
            .set_on(&mut app);

        let map = Configurer::configure(&app, &context)
            .unwrap()
            .finish()
            .unwrap();
        assert!(matches!(
            map.get(&key::of(ty("kotlin.String"))),
            Some(Declared::Provider(_))
        ));
        assert!(matches!(
            map.get(&key::of(ty("kotlin.CharSequence"))),
            Some(Declared::Binds(_))
        ));
        assert!(matches!(
            map.get(&key::named(ty("kotlin.String"), "user")),
            Some(Declared::BoundInstance { .. })
        ));
        assert!(matches!(
            map.get(&key::of(ty("test.AppGraph"))),
            Some(Declared::BoundInstance {
                source: BoundSource::Graph,
                ..
            })
        ));
    }

    #[test]
    fn configurer_finish_succeeds_when_provider_is_overridden() {
        let context = context();
        let mut app = graph("test.AppGraph").build();
        provides("test.BaseProviders", "provideString")
            .returns(ty("kotlin.String"))
            .inherited(2)
            .set_on(&mut app);
        provides("test.AppGraph", "provideString")
            .returns(ty("kotlin.String"))
            .set_on(&mut app);

        let map = Configurer::configure(&app, &context)
            .unwrap()
            .finish()
            .unwrap();
        let Some(Declared::Provider(winner)) = map.get(&key::of(ty("kotlin.String"))) else {
            panic!("kotlin.String should be provided");
        };
        assert_eq!(winner.callable.owner.as_str(), "test.AppGraph");
    }

    #[test]
    fn configurer_finish_fails_when_key_is_duplicated() {
        let context = context();
        let mut app = graph("test.AppGraph").build();
        provides("test.AppGraph", "provideString")
            .returns(ty("kotlin.String"))
            .set_on(&mut app);
        provides("test.AppGraph", "provideOtherString")
            .returns(ty("kotlin.String"))
            .set_on(&mut app);

        let errs = Configurer::configure(&app, &context)
            .unwrap()
            .finish()
            .unwrap_err();
        assert!(matches!(
            errs.first().unwrap(),
            GraphError::DuplicateBinding { declarations, .. } if declarations.len() == 2
        ));
    }

    #[test]
    fn configurer_finish_fails_when_same_signature_is_at_same_depth() {
        let context = context();
        let mut app = graph("test.AppGraph").build();
        provides("test.ProvidersA", "provideString")
            .returns(ty("kotlin.String"))
            .inherited(1)
            .set_on(&mut app);
        provides("test.ProvidersB", "provideString")
            .returns(ty("kotlin.String"))
            .inherited(1)
            .set_on(&mut app);

        let errs = Configurer::configure(&app, &context)
            .unwrap()
            .finish()
            .unwrap_err();
        assert!(matches!(
            errs.first().unwrap(),
            GraphError::DuplicateBinding { .. }
        ));
    }

    #[test]
    fn configurer_finish_succeeds_when_contributions_are_frozen() {
        let context = context();
        let mut app = graph("test.AppGraph").build();
        provides("test.AppGraph", "provideA")
            .returns(ty("kotlin.String"))
            .into_set()
            .set_on(&mut app);
        provides("test.AppGraph", "provideB")
            .returns(ty("kotlin.String"))
            .into_set()
            .set_on(&mut app);
        multibinds(
            "test.AppGraph",
            "ints",
            TypeRef::generic("kotlin.collections.Set", [ty("kotlin.Int")]),
        )
        .allow_empty()
        .set_on(&mut app);

        let map = Configurer::configure(&app, &context)
            .unwrap()
            .finish()
            .unwrap();
        let strings = key::of(TypeRef::generic("kotlin.collections.Set", [ty("kotlin.String")]));
        let (shape, _) = map.multibinding(&strings).unwrap();
        assert_eq!(shape.contributions.len(), 2);
        for contribution in &shape.contributions {
            assert!(matches!(
                map.get(&contribution.element),
                Some(Declared::Provider(_))
            ));
        }

        let ints = key::of(TypeRef::generic("kotlin.collections.Set", [ty("kotlin.Int")]));
        let (shape, _) = map.multibinding(&ints).unwrap();
        assert!(shape.contributions.is_empty());
        assert!(shape.allow_empty);
    }

    #[test]
    fn configurer_finish_fails_when_multibinding_is_also_provided() {
        let context = context();
        let set = TypeRef::generic("kotlin.collections.Set", [ty("kotlin.String")]);
        let mut app = graph("test.AppGraph").build();
        provides("test.AppGraph", "provideA")
            .returns(ty("kotlin.String"))
            .into_set()
            .set_on(&mut app);
        provides("test.AppGraph", "provideSet")
            .returns(set)
            .set_on(&mut app);

        let errs = Configurer::configure(&app, &context)
            .unwrap()
            .finish()
            .unwrap_err();
        assert!(matches!(
            errs.first().unwrap(),
            GraphError::ConflictingMultibinding {
                contributed: "set multibinding",
                ..
            }
        ));
    }

    #[test]
    fn configurer_register_multibinds_fails_when_type_is_not_a_collection() {
        let context = context();
        let mut configurer = Configurer::new(&context);
        let res = configurer.register_multibinds(
            &multibinds("test.AppGraph", "strings", ty("kotlin.String")).build(),
        );
        assert!(matches!(
            res,
            Err(StructuralError::InvalidMultibindingType { .. })
        ));
    }
}
