//! The boundary between graph resolution and code generation.

use std::error::Error;
use std::sync::Arc;

use serde::Serialize;

use crate::binding::{Binding, BindingKind, FactoryRef, Provenance};
use crate::graph::{BindingGraph, FieldPlan, FieldReason, SortResult};
use crate::key::TypeKey;
use crate::scope::Lifetime;

pub type GenerationError = Box<dyn Error + Send + Sync>;

/// A validated and sorted graph, ready to be turned into code.
///
/// Every accessor is read-only: generators cannot change what was resolved.
#[derive(Debug, Clone)]
pub struct ResolvedGraph {
    graph: Arc<BindingGraph>,
    order: Vec<TypeKey>,
    plan: FieldPlan,
}

impl ResolvedGraph {
    pub fn new(graph: Arc<BindingGraph>, sorted: SortResult) -> Self {
        Self {
            graph,
            order: sorted.order,
            plan: sorted.plan,
        }
    }

    pub fn graph(&self) -> &BindingGraph {
        &self.graph
    }

    /// A handle to the graph, for graphs that extend it.
    pub fn shared_graph(&self) -> Arc<BindingGraph> {
        Arc::clone(&self.graph)
    }

    pub fn binding_for(&self, key: &TypeKey) -> Option<&Binding> {
        self.graph.binding_for(key)
    }

    /// Bindings in construction order.
    pub fn ordered_bindings(&self) -> impl Iterator<Item = &Binding> {
        self.order
            .iter()
            .filter_map(|key| self.graph.binding_for(key))
    }

    /// Bindings owning a field, in construction order.
    pub fn shared_field_bindings(&self) -> impl Iterator<Item = (&Binding, FieldReason)> {
        self.ordered_bindings().filter_map(|binding| {
            self.plan
                .fields
                .get(binding.key())
                .map(|reason| (binding, *reason))
        })
    }

    /// Bindings that need a delegate field because a cycle was broken at them.
    pub fn deferred_bindings(&self) -> impl Iterator<Item = &Binding> {
        self.ordered_bindings()
            .filter(|binding| self.plan.deferred.contains(binding.key()))
    }

    /// Bindings created at their single use site.
    pub fn inlined_bindings(&self) -> impl Iterator<Item = &Binding> {
        self.ordered_bindings()
            .filter(|binding| self.plan.inlined.contains(binding.key()))
    }

    pub fn plan(&self) -> &FieldPlan {
        &self.plan
    }

    /// Summarizes the graph for the optional graph reports.
    pub fn report(&self) -> GraphReport {
        GraphReport {
            graph: self.graph.id().to_string(),
            scopes: self.graph.scopes().iter().map(ToString::to_string).collect(),
            roots: self
                .graph
                .roots()
                .iter()
                .map(|root| format!("{}: {}", root.name, root.request))
                .collect(),
            bindings: self
                .ordered_bindings()
                .map(|binding| self.binding_report(binding))
                .collect(),
        }
    }

    fn binding_report(&self, binding: &Binding) -> BindingReport {
        let factory = match binding.kind() {
            BindingKind::ConstructorInjected { factory, .. } => Some(factory.clone()),
            _ => None,
        };
        let materialization = if let Some(reason) = self.plan.fields.get(binding.key()) {
            Materialization::Field(*reason)
        } else if self.plan.inlined.contains(binding.key()) {
            Materialization::Inlined
        } else {
            Materialization::Unused
        };
        BindingReport {
            key: binding.key().to_string(),
            kind: binding.kind().to_str(),
            scope: match binding.lifetime() {
                Lifetime::Scoped(scope) => Some(scope.to_string()),
                Lifetime::Unscoped => None,
            },
            dependencies: binding
                .dependencies()
                .iter()
                .map(|dependency| dependency.request.to_string())
                .collect(),
            provenance: binding.provenance().clone(),
            factory,
            materialization,
            deferred: self.plan.deferred.contains(binding.key()),
            inherited_from: self.graph.inherited_from(binding.key()).map(ToString::to_string),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct GraphReport {
    pub graph: String,
    pub scopes: Vec<String>,
    pub roots: Vec<String>,
    pub bindings: Vec<BindingReport>,
}

impl GraphReport {
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct BindingReport {
    pub key: String,
    pub kind: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    pub dependencies: Vec<String>,
    pub provenance: Provenance,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub factory: Option<FactoryRef>,
    pub materialization: Materialization,
    pub deferred: bool,
    /// The ancestor graph whose declaration this binding calls.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inherited_from: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Materialization {
    Field(FieldReason),
    Inlined,
    Unused,
}

/// Turns a resolved graph into code.
#[cfg_attr(test, mockall::automock)]
pub trait CodeGenerator {
    fn generate(&mut self, graph: &ResolvedGraph) -> Result<(), GenerationError>;
}
