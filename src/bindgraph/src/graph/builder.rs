use std::sync::Arc;

use tracing::{debug, trace};

use crate::binding::{
    alias_binding, assisted_factory_binding, constructor_binding, external_binding,
    members_injector_binding, object_binding, provided_binding, Binding, BindingKind, ClassShape,
    Dependency, DependencySource, Provenance,
};
use crate::context::ResolutionContext;
use crate::decl::GraphDecl;
use crate::diagnostics::SourceLocation;
use crate::error::{GraphError, StructuralError};
use crate::graph::stack::{render_entries, BindingStack, Entry};
use crate::graph::{BindingGraph, Root, RootKind};
use crate::key::{self, AnyQualifierPattern, ContextualTypeKey, Pattern, SameClassPattern, TypeKey};
use crate::registry::{Declared, ProviderMap};
use crate::scope::GraphScopes;
use crate::types::{ClassId, TypeRef};

const MAX_SIMILAR: usize = 5;

/// The outcome of expanding a graph from its roots.
#[derive(Debug)]
pub struct Expansion {
    pub graph: BindingGraph,
    pub errors: Vec<GraphError>,
    /// Cycles already reported while expanding, each as a closed walk.
    pub cycles: Vec<Vec<TypeKey>>,
}

enum Resolved {
    Found(Binding),
    /// An optional request without a binding.
    Skipped,
    /// A binding declared by the ancestor graph with the given id.
    Inherited(Binding, ClassId),
    Missing(Binding, GraphError),
}

/// One binding whose dependencies are being walked.
struct Frame {
    dependencies: Vec<Dependency>,
    next: usize,
}

impl Frame {
    fn new(binding: &Binding) -> Self {
        Self {
            dependencies: binding.dependencies().to_vec(),
            next: 0,
        }
    }
}

/// Expands a graph from its accessors and injectors.
///
/// Bindings are created on demand for every required key and inserted once.
/// The walk is iterative, and its frame stack is mirrored by a
/// [`BindingStack`] which detects cycles as soon as a key is re-entered.
pub struct BindingGraphBuilder<'a> {
    context: &'a ResolutionContext,
    graph: BindingGraph,
    stack: BindingStack,
    errors: Vec<GraphError>,
    cycles: Vec<Vec<TypeKey>>,
}

impl<'a> BindingGraphBuilder<'a> {
    pub fn new(
        decl: &GraphDecl,
        providers: ProviderMap,
        parent: Option<Arc<BindingGraph>>,
        context: &'a ResolutionContext,
    ) -> Result<Self, StructuralError> {
        let mut roots = Vec::with_capacity(decl.accessors.len() + decl.injectors.len());
        for accessor in &decl.accessors {
            roots.push(Root {
                name: accessor.name.clone(),
                request: ContextualTypeKey::from_declaration(accessor, context)?,
                kind: RootKind::Accessor,
                location: accessor.location.clone(),
            });
        }
        for injector in &decl.injectors {
            let members_injector = TypeRef::generic(
                context.options().members_injector.clone(),
                [injector.target.ty.clone()],
            );
            roots.push(Root {
                name: injector.name.clone(),
                request: key::of(members_injector).into(),
                kind: RootKind::Injector,
                location: injector.location.clone(),
            });
        }

        let graph = BindingGraph::new(
            decl.id.clone(),
            GraphScopes::from_annotations(&decl.annotations, context),
            roots,
            parent,
            providers,
            decl.location.clone(),
        );
        Ok(Self {
            context,
            graph,
            stack: BindingStack::new(),
            errors: Vec::new(),
            cycles: Vec::new(),
        })
    }

    /// Expands every root in declaration order, accessors first.
    ///
    /// # Errors
    ///
    /// Returns the first malformed declaration met while creating bindings.
    /// Graph inconsistencies are collected into [`Expansion::errors`] instead.
    pub fn expand(mut self) -> Result<Expansion, StructuralError> {
        debug!(
            graph = %self.graph.id(),
            roots = self.graph.roots().len(),
            "expanding graph"
        );
        let roots = self.graph.roots().to_vec();
        for root in roots {
            let site = Provenance::new(
                format!("{}.{}", self.graph.id().short_name(), root.name),
                root.location.clone(),
            );
            self.expand_root(Entry::requested_at(root.request, site))?;
        }
        debug!(
            graph = %self.graph.id(),
            bindings = self.graph.len(),
            errors = self.errors.len(),
            "expanded graph"
        );
        Ok(Expansion {
            graph: self.graph,
            errors: self.errors,
            cycles: self.cycles,
        })
    }

    fn expand_root(&mut self, root: Entry) -> Result<(), StructuralError> {
        if self.graph.contains(root.key()) {
            return Ok(());
        }
        self.stack.push(root);
        let mut frames = Vec::new();
        if let Some(frame) = self.resolve_top()? {
            frames.push(frame);
        }

        while let Some(frame) = frames.last_mut() {
            let Some(dependency) = frame.dependencies.get(frame.next).cloned() else {
                frames.pop();
                self.stack.pop();
                continue;
            };
            frame.next += 1;

            if let Some(position) = self.stack.position_of(dependency.key()) {
                self.close_cycle(position, &dependency);
                continue;
            }
            if self.graph.contains(dependency.key()) {
                continue;
            }
            self.stack
                .push(Entry::injected_at(dependency.request, dependency.site));
            if let Some(frame) = self.resolve_top()? {
                frames.push(frame);
            }
        }
        Ok(())
    }

    /// Resolves the request on top of the stack and inserts its binding.
    /// Returns the frame walking the new binding, or pops the request again if
    /// there is nothing to walk.
    fn resolve_top(&mut self) -> Result<Option<Frame>, StructuralError> {
        let Some(entry) = self.stack.top() else {
            return Ok(None);
        };
        let request = entry.request.clone();
        match self.lookup(&request)? {
            Resolved::Found(binding) => {
                trace!(key = %binding.key(), kind = binding.kind().to_str(), "resolved binding");
                let frame = Frame::new(&binding);
                self.graph.insert(binding);
                Ok(Some(frame))
            }
            Resolved::Inherited(binding, owner) => {
                trace!(key = %binding.key(), %owner, "resolved inherited binding");
                let frame = Frame::new(&binding);
                self.graph.insert_inherited(binding, owner);
                Ok(Some(frame))
            }
            Resolved::Skipped => {
                trace!(key = %request.key(), "skipped optional request");
                self.stack.pop();
                Ok(None)
            }
            Resolved::Missing(absent, error) => {
                trace!(key = %request.key(), "missing binding");
                self.graph.insert(absent);
                self.errors.push(error);
                self.stack.pop();
                Ok(None)
            }
        }
    }

    /// Handles a request for a key which is already being resolved further
    /// down the stack.
    fn close_cycle(&mut self, position: usize, closing: &Dependency) {
        let slice = self.stack.slice(position);
        let deferred = slice
            .iter()
            .skip(1)
            .map(|entry| &entry.request)
            .chain(std::iter::once(&closing.request))
            .any(ContextualTypeKey::is_deferrable);
        if deferred {
            trace!(key = %closing.key(), "found a cycle broken by a deferred request");
            return;
        }

        let mut entries = slice.to_vec();
        entries.push(Entry::injected_at(
            closing.request.clone(),
            closing.site.clone(),
        ));
        let cycle: Vec<TypeKey> = entries.iter().map(|entry| entry.key().clone()).collect();
        debug!(graph = %self.graph.id(), length = cycle.len(), "found a dependency cycle");
        let error = GraphError::DependencyCycle {
            graph: self.graph.id().clone(),
            cycle: cycle.clone(),
            trace: render_entries(&entries),
            location: self.site_location(&closing.site.location),
        };
        self.errors.push(error);
        self.cycles.push(cycle);
    }

    fn lookup(&self, request: &ContextualTypeKey) -> Result<Resolved, StructuralError> {
        let key = request.key();
        let providers = self.graph.providers();

        if let Some(declared) = providers.get(key) {
            trace!(%key, "found a declaration");
            return self
                .declared_binding(self.graph.id(), key, declared)
                .map(Resolved::Found);
        }
        if key.qualifier().is_none() {
            if let Some(binding) = self.constructor_binding(key)? {
                return Ok(Resolved::Found(binding));
            }
        }
        if let Some(binding) = collected_binding(providers, key) {
            return Ok(Resolved::Found(binding));
        }
        if let Some(parent) = self.parent_providing(key) {
            let binding = Binding::new(
                key.clone(),
                BindingKind::GraphDependency {
                    source: DependencySource::Parent {
                        graph: parent.id().clone(),
                    },
                },
                Provenance::new(format!("parent graph {}", parent.id()), parent.location().clone()),
            );
            return Ok(Resolved::Found(binding));
        }
        if let Some(ancestor) = self.graph.declaring_ancestor(key) {
            trace!(%key, ancestor = %ancestor.id(), "found an inherited declaration");
            let providers = ancestor.providers();
            let binding = match providers.get(key) {
                Some(declared) => Some(self.declared_binding(ancestor.id(), key, declared)?),
                None => collected_binding(providers, key),
            };
            if let Some(binding) = binding {
                return Ok(Resolved::Inherited(binding, ancestor.id().clone()));
            }
        }

        if request.has_default() {
            return Ok(Resolved::Skipped);
        }
        let location = self
            .stack
            .top()
            .map(|entry| self.site_location(&entry.site.location))
            .unwrap_or_else(|| self.graph.location().clone());
        let error = GraphError::MissingBinding {
            key: key.clone(),
            similar: self.similar_keys(key),
            trace: self.stack.render_trace(),
            location: location.clone(),
        };
        let absent = Binding::absent(key.clone(), Provenance::new("missing binding", location));
        Ok(Resolved::Missing(absent, error))
    }

    /// Builds the binding of a declaration made on the graph `owner`.
    fn declared_binding(
        &self,
        owner: &ClassId,
        key: &TypeKey,
        declared: &Declared,
    ) -> Result<Binding, StructuralError> {
        match declared {
            Declared::Provider(decl) => provided_binding(decl, key.clone(), owner, self.context),
            Declared::Binds(decl) => alias_binding(decl, key.clone(), self.context),
            Declared::BoundInstance {
                source, location, ..
            } => Ok(Binding::new(
                key.clone(),
                BindingKind::BoundInstance {
                    source: source.clone(),
                },
                Provenance::new(declared.signature(), location.clone()),
            )),
        }
    }

    /// Looks for a binding implied by the class of an unqualified key.
    fn constructor_binding(&self, key: &TypeKey) -> Result<Option<Binding>, StructuralError> {
        let Some(class) = key.class_id() else {
            return Ok(None);
        };
        let options = self.context.options();
        if class == &options.members_injector {
            let target = match key.ty().arguments() {
                [target] => target.class_id(),
                _ => None,
            };
            return match target {
                Some(target) => members_injector_binding(target, key, self.context).map(Some),
                None => Ok(None),
            };
        }

        let shape = self.context.class_shape(class)?;
        match shape.as_deref() {
            Some(ClassShape::Object { class, location }) => {
                Ok(Some(object_binding(class, key, location)))
            }
            Some(ClassShape::Injectable(injectable)) => {
                let foreign_scope = injectable
                    .scope
                    .as_ref()
                    .is_some_and(|scope| !self.graph.scopes().contains(scope));
                if foreign_scope && self.parent_providing(key).is_some() {
                    trace!(%key, "delegated scoped class to an ancestor");
                    return Ok(None);
                }
                constructor_binding(injectable, key, self.context).map(Some)
            }
            Some(ClassShape::AssistedFactory(factory)) => {
                assisted_factory_binding(factory, key, self.context).map(Some)
            }
            None => Ok(self.context.metadata().get(key).map(external_binding)),
        }
    }

    fn parent_providing(&self, key: &TypeKey) -> Option<&Arc<BindingGraph>> {
        self.graph
            .parent()
            .filter(|parent| parent.provides(key))
    }

    /// Keys of the same type with another qualifier, or of the same class,
    /// that this graph knows about.
    fn similar_keys(&self, key: &TypeKey) -> Vec<String> {
        let any_qualifier = AnyQualifierPattern::new(key.ty().clone());
        let same_class = key.class_id().cloned().map(SameClassPattern::new);
        let element = &self.context.options().multibinding_element;

        let known = self.graph.providers().keys().chain(
            self.graph
                .bindings()
                .filter(|binding| !binding.is_absent())
                .map(Binding::key),
        );
        let mut similar: Vec<String> = known
            .filter(|candidate| *candidate != key && !candidate.is_qualified_by(element))
            .filter(|candidate| {
                any_qualifier.matches(candidate)
                    || same_class
                        .as_ref()
                        .is_some_and(|pattern| pattern.matches(candidate))
            })
            .map(ToString::to_string)
            .collect();
        similar.sort();
        similar.dedup();
        similar.truncate(MAX_SIMILAR);
        similar
    }

    fn site_location(&self, location: &SourceLocation) -> SourceLocation {
        if location.is_unknown() {
            self.graph.location().clone()
        } else {
            location.clone()
        }
    }
}

/// Builds the binding of a collected multibinding or an included graph
/// accessor registered in `providers`.
fn collected_binding(providers: &ProviderMap, key: &TypeKey) -> Option<Binding> {
    if let Some((shape, location)) = providers.multibinding(key) {
        let provenance = Provenance::new(
            format!("{} {key}", shape.collection.describe()),
            location.clone(),
        );
        return Some(shape.clone().into_binding(key.clone(), provenance));
    }
    let accessor = providers.included(key)?;
    let site = Provenance::new(
        format!("{}.{}", accessor.parameter, accessor.accessor),
        accessor.location.clone(),
    );
    let binding = Binding::new(
        key.clone(),
        BindingKind::GraphDependency {
            source: DependencySource::Included {
                parameter: accessor.parameter.clone(),
                accessor: accessor.accessor.clone(),
            },
        },
        site.clone(),
    )
    .with_dependencies(vec![Dependency::new(accessor.graph.clone().into(), site)]);
    Some(binding)
}
