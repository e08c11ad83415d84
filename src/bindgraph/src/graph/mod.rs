//! The resolved binding graph of one user-declared graph.

mod builder;
mod scc;
mod sort;
mod stack;
mod validate;

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::binding::Binding;
use crate::diagnostics::SourceLocation;
use crate::key::{ContextualTypeKey, TypeKey};
use crate::registry::ProviderMap;
use crate::scope::GraphScopes;
use crate::types::ClassId;

pub use builder::{BindingGraphBuilder, Expansion};
pub use sort::{sort, FieldPlan, FieldReason, SortResult};
pub use stack::{render_entries, BindingStack, Entry, Usage};
pub use validate::validate;

/// What a root of the graph does with its request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RootKind {
    Accessor,
    Injector,
}

/// An accessor or injector of the graph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Root {
    pub name: String,
    pub request: ContextualTypeKey,
    pub kind: RootKind,
    pub location: SourceLocation,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    pub binding: Binding,
    /// Discovery order, used as the stable tie breaker when sorting.
    pub seq: usize,
    /// The ancestor graph declaring the binding, when it is resolved here on
    /// behalf of that ancestor.
    pub inherited_from: Option<ClassId>,
}

/// A binding graph.
///
/// Keys are unique and iteration follows the rendered key order. A graph is
/// only handed out once it is closed: every dependency of every binding
/// either resolves to a node of this graph, or is an optional request
/// without one.
#[derive(Debug)]
pub struct BindingGraph {
    id: ClassId,
    scopes: GraphScopes,
    nodes: BTreeMap<TypeKey, Node>,
    roots: Vec<Root>,
    parent: Option<Arc<BindingGraph>>,
    providers: ProviderMap,
    location: SourceLocation,
}

impl BindingGraph {
    pub(crate) fn new(
        id: ClassId,
        scopes: GraphScopes,
        roots: Vec<Root>,
        parent: Option<Arc<BindingGraph>>,
        providers: ProviderMap,
        location: SourceLocation,
    ) -> Self {
        Self {
            id,
            scopes,
            nodes: BTreeMap::new(),
            roots,
            parent,
            providers,
            location,
        }
    }

    /// Inserts a node for `binding` unless its key is already present.
    /// Returns true if the node was inserted.
    pub(crate) fn insert(&mut self, binding: Binding) -> bool {
        self.insert_node(binding, None)
    }

    /// Inserts a binding declared by the ancestor `owner`.
    pub(crate) fn insert_inherited(&mut self, binding: Binding, owner: ClassId) -> bool {
        self.insert_node(binding, Some(owner))
    }

    fn insert_node(&mut self, binding: Binding, inherited_from: Option<ClassId>) -> bool {
        let seq = self.nodes.len();
        let key = binding.key().clone();
        if self.nodes.contains_key(&key) {
            return false;
        }
        self.nodes.insert(
            key,
            Node {
                binding,
                seq,
                inherited_from,
            },
        );
        true
    }

    pub fn id(&self) -> &ClassId {
        &self.id
    }

    pub fn scopes(&self) -> &GraphScopes {
        &self.scopes
    }

    pub fn roots(&self) -> &[Root] {
        &self.roots
    }

    pub fn parent(&self) -> Option<&Arc<BindingGraph>> {
        self.parent.as_ref()
    }

    pub fn providers(&self) -> &ProviderMap {
        &self.providers
    }

    pub fn location(&self) -> &SourceLocation {
        &self.location
    }

    pub fn binding_for(&self, key: &TypeKey) -> Option<&Binding> {
        self.nodes.get(key).map(|node| &node.binding)
    }

    pub fn node(&self, key: &TypeKey) -> Option<&Node> {
        self.nodes.get(key)
    }

    /// Looks `key` up in this graph, then in its ancestors.
    pub fn find(&self, key: &TypeKey) -> Option<&Binding> {
        self.binding_for(key)
            .or_else(|| self.parent.as_deref().and_then(|parent| parent.find(key)))
    }

    /// Returns true if this graph or one of its ancestors holds a resolved
    /// binding for `key`.
    ///
    /// A key an ancestor only declares is not provided: nothing has checked
    /// its dependencies yet.
    pub fn provides(&self, key: &TypeKey) -> bool {
        self.find(key).is_some_and(|binding| !binding.is_absent())
    }

    /// Iterates the ancestors of this graph, closest first.
    pub fn ancestors(&self) -> impl Iterator<Item = &BindingGraph> {
        std::iter::successors(self.parent.as_deref(), |graph| graph.parent.as_deref())
    }

    pub fn ancestor(&self, id: &ClassId) -> Option<&BindingGraph> {
        self.ancestors().find(|graph| graph.id() == id)
    }

    /// Returns the closest ancestor whose declarations can satisfy `key`.
    pub fn declaring_ancestor(&self, key: &TypeKey) -> Option<&BindingGraph> {
        self.ancestors()
            .find(|graph| graph.providers().provides(key))
    }

    /// Returns the ancestor `key` was resolved on behalf of, if any.
    pub fn inherited_from(&self, key: &TypeKey) -> Option<&ClassId> {
        self.nodes
            .get(key)
            .and_then(|node| node.inherited_from.as_ref())
    }

    /// The graph whose scopes a binding of this graph is checked against.
    pub fn owner_of(&self, key: &TypeKey) -> &BindingGraph {
        self.inherited_from(key)
            .and_then(|id| self.ancestor(id))
            .unwrap_or(self)
    }

    pub fn contains(&self, key: &TypeKey) -> bool {
        self.nodes.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Iterates every binding in rendered key order.
    pub fn bindings(&self) -> impl Iterator<Item = &Binding> {
        self.nodes.values().map(|node| &node.binding)
    }

    pub fn nodes(&self) -> impl Iterator<Item = (&TypeKey, &Node)> {
        self.nodes.iter()
    }

    pub fn keys(&self) -> impl Iterator<Item = &TypeKey> {
        self.nodes.keys()
    }

    pub fn sequence(&self, key: &TypeKey) -> Option<usize> {
        self.nodes.get(key).map(|node| node.seq)
    }

    /// Returns true if every dependency resolves to a node of this graph, or
    /// is an optional request without one.
    pub fn is_closed(&self) -> bool {
        self.bindings()
            .flat_map(|binding| binding.dependencies())
            .all(|dependency| {
                self.contains(dependency.key()) || dependency.request.has_default()
            })
    }
}
