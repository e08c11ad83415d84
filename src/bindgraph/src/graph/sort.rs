use std::cmp::Reverse;
use std::collections::{BTreeMap, BTreeSet, BinaryHeap, HashMap};

use serde::Serialize;
use tracing::debug;

use crate::binding::BindingKind;
use crate::graph::scc::strongly_connected;
use crate::graph::BindingGraph;
use crate::key::TypeKey;

/// Why a binding owns a field in the generated graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case", tag = "reason", content = "uses")]
pub enum FieldReason {
    Scoped,
    BoundInstance,
    MultipleUses(usize),
}

/// How each binding is materialized by generated code.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldPlan {
    /// Bindings that own exactly one field.
    pub fields: BTreeMap<TypeKey, FieldReason>,
    /// Bindings used exactly once, created at their use site.
    pub inlined: BTreeSet<TypeKey>,
    /// Bindings requested through a broken cycle. They need a delegate field
    /// that is initialized after construction.
    pub deferred: BTreeSet<TypeKey>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SortResult {
    /// Keys in construction order: every binding follows its hard
    /// dependencies.
    pub order: Vec<TypeKey>,
    pub plan: FieldPlan,
}

struct Edge {
    from: usize,
    to: usize,
    deferrable: bool,
}

/// Computes the construction order of a closed graph and decides which
/// bindings share a field.
///
/// Edges run from a dependency to its consumer. Cycles through deferrable
/// requests are broken by dropping those requests, whose targets are reported
/// as deferred. Ties are broken by discovery order.
pub fn sort(graph: &BindingGraph) -> SortResult {
    let keys: Vec<&TypeKey> = graph.keys().collect();
    let index: HashMap<&TypeKey, usize> =
        keys.iter().enumerate().map(|(i, key)| (*key, i)).collect();
    let seq: Vec<usize> = keys
        .iter()
        .map(|key| graph.sequence(key).unwrap_or(usize::MAX))
        .collect();

    let mut edges = Vec::new();
    for (consumer, binding) in graph.bindings().enumerate() {
        for dependency in binding.dependencies() {
            if let Some(&from) = index.get(dependency.key()) {
                edges.push(Edge {
                    from,
                    to: consumer,
                    deferrable: dependency.request.is_deferrable(),
                });
            }
        }
    }

    let mut successors = vec![Vec::new(); keys.len()];
    for edge in &edges {
        successors[edge.from].push(edge.to);
    }
    let mut component_of = vec![0; keys.len()];
    for (i, component) in strongly_connected(&successors).into_iter().enumerate() {
        for member in component {
            component_of[member] = i;
        }
    }

    let mut plan = FieldPlan::default();
    let mut in_degree = vec![0usize; keys.len()];
    let mut outgoing = vec![Vec::new(); keys.len()];
    for edge in &edges {
        let cyclic = component_of[edge.from] == component_of[edge.to];
        if cyclic && edge.deferrable {
            plan.deferred.insert(keys[edge.from].clone());
            continue;
        }
        in_degree[edge.to] += 1;
        outgoing[edge.from].push(edge.to);
    }

    let mut ready: BinaryHeap<Reverse<(usize, usize)>> = (0..keys.len())
        .filter(|&node| in_degree[node] == 0)
        .map(|node| Reverse((seq[node], node)))
        .collect();
    let mut placed = vec![false; keys.len()];
    let mut order = Vec::with_capacity(keys.len());
    while let Some(Reverse((_, node))) = ready.pop() {
        placed[node] = true;
        order.push(node);
        for &next in &outgoing[node] {
            in_degree[next] -= 1;
            if in_degree[next] == 0 {
                ready.push(Reverse((seq[next], next)));
            }
        }
    }
    // Only left over if a hard cycle survived validation.
    let mut leftover: Vec<usize> = (0..keys.len()).filter(|&node| !placed[node]).collect();
    leftover.sort_by_key(|&node| seq[node]);
    order.extend(leftover);

    let uses = count_uses(graph, &keys, &index, &edges, &order);
    for (node, key) in keys.iter().enumerate() {
        let Some(binding) = graph.binding_for(key) else {
            continue;
        };
        if binding.is_alias() || binding.is_absent() {
            continue;
        }
        let reason = if binding.lifetime().is_scoped() {
            Some(FieldReason::Scoped)
        } else if binding.is_bound_instance() {
            Some(FieldReason::BoundInstance)
        } else if uses[node] >= 2 {
            Some(FieldReason::MultipleUses(uses[node]))
        } else {
            None
        };
        match reason {
            Some(reason) => {
                plan.fields.insert((*key).clone(), reason);
            }
            None if uses[node] == 1 => {
                plan.inlined.insert((*key).clone());
            }
            None => {}
        }
    }

    debug!(
        graph = %graph.id(),
        bindings = order.len(),
        fields = plan.fields.len(),
        inlined = plan.inlined.len(),
        deferred = plan.deferred.len(),
        "sorted graph"
    );
    SortResult {
        order: order.into_iter().map(|node| keys[node].clone()).collect(),
        plan,
    }
}

/// Counts the uses of every binding. An alias is replaced by its target at
/// every use site, so its uses are forwarded to the target.
fn count_uses(
    graph: &BindingGraph,
    keys: &[&TypeKey],
    index: &HashMap<&TypeKey, usize>,
    edges: &[Edge],
    order: &[usize],
) -> Vec<usize> {
    let mut uses = vec![0usize; keys.len()];
    for edge in edges {
        uses[edge.from] += 1;
    }
    for root in graph.roots() {
        if let Some(&node) = index.get(root.request.key()) {
            uses[node] += 1;
        }
    }

    for &node in order.iter().rev() {
        let Some(binding) = graph.binding_for(keys[node]) else {
            continue;
        };
        let BindingKind::Alias { target } = binding.kind() else {
            continue;
        };
        let Some(&target) = index.get(target) else {
            continue;
        };
        if target != node {
            // The alias itself is one use of its target.
            uses[target] = (uses[target] + uses[node]).saturating_sub(1);
        }
    }
    uses
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use crate::context::ResolutionContext;
    use crate::decl::dsl::{
        binds, class, constructor, generic, graph, inject, param, provides, single_in, ty,
    };
    use crate::decl::{ClassDecl, ClassIndex, GraphDecl};
    use crate::graph::BindingGraphBuilder;
    use crate::key;
    use crate::options::{ids, Options};
    use crate::registry::Configurer;

    use super::*;

    fn resolve(decl: &GraphDecl, classes: impl IntoIterator<Item = ClassDecl>) -> BindingGraph {
        let context = ResolutionContext::new(
            Options::default(),
            classes.into_iter().collect::<ClassIndex>(),
        );
        let providers = Configurer::configure(decl, &context)
            .unwrap()
            .finish()
            .unwrap();
        let expansion = BindingGraphBuilder::new(decl, providers, None::<Arc<BindingGraph>>, &context)
            .unwrap()
            .expand()
            .unwrap();
        assert!(expansion.errors.is_empty(), "{:?}", expansion.errors);
        expansion.graph
    }

    #[test]
    fn sort_succeeds() {
        let mut app = graph("test.AppGraph")
            .accessor("value", ty("kotlin.CharSequence"))
            .build();
        provides("test.AppGraph", "provideString")
            .returns(ty("kotlin.String"))
            .in_object()
            .set_on(&mut app);
        provides("test.AppGraph", "provideSequence")
            .param(param("s", ty("kotlin.String")))
            .returns(ty("kotlin.CharSequence"))
            .in_object()
            .set_on(&mut app);

        let result = sort(&resolve(&app, []));
        assert_eq!(
            result.order,
            [key::of(ty("kotlin.String")), key::of(ty("kotlin.CharSequence"))]
        );
        assert!(result.plan.fields.is_empty());
        assert_eq!(result.plan.inlined.len(), 2);
    }

    #[test]
    fn sort_succeeds_when_binding_is_shared() {
        let mut app = graph("test.AppGraph")
            .accessor("a", ty("test.A"))
            .accessor("b", ty("test.B"))
            .build();
        provides("test.AppGraph", "provideA")
            .param(param("c", ty("test.C")))
            .returns(ty("test.A"))
            .in_object()
            .set_on(&mut app);
        provides("test.AppGraph", "provideB")
            .param(param("c", ty("test.C")))
            .returns(ty("test.B"))
            .in_object()
            .set_on(&mut app);
        provides("test.AppGraph", "provideC")
            .returns(ty("test.C"))
            .in_object()
            .set_on(&mut app);

        let result = sort(&resolve(&app, []));
        assert_eq!(result.order[0], key::of(ty("test.C")));
        assert_eq!(
            result.plan.fields.get(&key::of(ty("test.C"))),
            Some(&FieldReason::MultipleUses(2))
        );
        assert!(result.plan.inlined.contains(&key::of(ty("test.A"))));
    }

    #[test]
    fn sort_succeeds_when_alias_forwards_uses() {
        let mut app = graph("test.AppGraph")
            .accessor("first", ty("kotlin.CharSequence"))
            .accessor("second", ty("kotlin.CharSequence"))
            .build();
        provides("test.AppGraph", "provideString")
            .returns(ty("kotlin.String"))
            .in_object()
            .set_on(&mut app);
        binds("test.AppGraph", "bind")
            .param(param("s", ty("kotlin.String")))
            .returns(ty("kotlin.CharSequence"))
            .set_on(&mut app);

        let result = sort(&resolve(&app, []));
        assert_eq!(
            result.plan.fields.get(&key::of(ty("kotlin.String"))),
            Some(&FieldReason::MultipleUses(2))
        );
        assert!(!result.plan.fields.contains_key(&key::of(ty("kotlin.CharSequence"))));
        assert!(!result.plan.inlined.contains(&key::of(ty("kotlin.CharSequence"))));
    }

    #[test]
    fn sort_succeeds_when_binding_is_scoped() {
        let mut app = graph("test.AppGraph")
            .within(single_in("test.AppScope"))
            .accessor("value", ty("kotlin.String"))
            .build();
        provides("test.AppGraph", "provideString")
            .returns(ty("kotlin.String"))
            .within(single_in("test.AppScope"))
            .in_object()
            .set_on(&mut app);

        let result = sort(&resolve(&app, []));
        assert_eq!(
            result.plan.fields.get(&key::of(ty("kotlin.String"))),
            Some(&FieldReason::Scoped)
        );
    }

    #[test]
    fn sort_succeeds_when_cycle_is_deferred() {
        let classes = [
            class("test.A")
                .constructor(
                    constructor()
                        .primary()
                        .annotated(inject())
                        .param(param("b", ty("test.B"))),
                )
                .build(),
            class("test.B")
                .constructor(
                    constructor()
                        .primary()
                        .annotated(inject())
                        .param(param("a", generic(ids::PROVIDER, [ty("test.A")]))),
                )
                .build(),
        ];
        let app = graph("test.AppGraph").accessor("a", ty("test.A")).build();

        let result = sort(&resolve(&app, classes));
        assert_eq!(
            result.order,
            [key::of(ty("test.B")), key::of(ty("test.A"))]
        );
        assert!(result.plan.deferred.contains(&key::of(ty("test.A"))));
    }
}
