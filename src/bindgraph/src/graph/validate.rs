use std::collections::{HashMap, HashSet, VecDeque};

use tracing::debug;

use crate::binding::{Binding, BindingKind, Dependency, Provenance};
use crate::diagnostics::SourceLocation;
use crate::error::{GraphError, ScopeViolation};
use crate::graph::scc::strongly_connected;
use crate::graph::stack::{render_entries, Entry};
use crate::graph::{BindingGraph, Root};
use crate::key::TypeKey;

/// Checks a closed graph for the inconsistencies expansion cannot see.
///
/// `reported` holds the cycles already reported while expanding; components
/// overlapping them are not reported a second time.
pub fn validate(graph: &BindingGraph, reported: &[Vec<TypeKey>]) -> Vec<GraphError> {
    let edges = Edges::new(graph);
    let mut errors = Vec::new();
    check_cycles(graph, &edges, reported, &mut errors);
    check_scopes(graph, &edges, &mut errors);
    check_multibindings(graph, &mut errors);
    check_assisted(graph, &mut errors);
    debug!(graph = %graph.id(), errors = errors.len(), "validated graph");
    errors
}

/// The dependency edges of a graph, indexed by rendered key order.
struct Edges<'g> {
    keys: Vec<&'g TypeKey>,
    index: HashMap<&'g TypeKey, usize>,
    successors: Vec<Vec<(usize, &'g Dependency)>>,
}

impl<'g> Edges<'g> {
    fn new(graph: &'g BindingGraph) -> Self {
        let keys: Vec<&TypeKey> = graph.keys().collect();
        let index: HashMap<&TypeKey, usize> =
            keys.iter().enumerate().map(|(i, key)| (*key, i)).collect();
        let successors = graph
            .bindings()
            .map(|binding| {
                binding
                    .dependencies()
                    .iter()
                    .filter_map(|dependency| {
                        index
                            .get(dependency.key())
                            .map(|&target| (target, dependency))
                    })
                    .collect()
            })
            .collect();
        Self {
            keys,
            index,
            successors,
        }
    }

    fn hard(&self) -> Vec<Vec<usize>> {
        self.successors
            .iter()
            .map(|successors| {
                successors
                    .iter()
                    .filter(|(_, dependency)| !dependency.request.is_deferrable())
                    .map(|(target, _)| *target)
                    .collect()
            })
            .collect()
    }
}

fn check_cycles(
    graph: &BindingGraph,
    edges: &Edges<'_>,
    reported: &[Vec<TypeKey>],
    errors: &mut Vec<GraphError>,
) {
    let reported: HashSet<&TypeKey> = reported.iter().flatten().collect();
    let hard = edges.hard();

    for component in strongly_connected(&hard) {
        let [start, ..] = component[..] else {
            continue;
        };
        let cyclic = component.len() > 1 || hard[start].contains(&start);
        if !cyclic
            || component
                .iter()
                .any(|&member| reported.contains(edges.keys[member]))
        {
            continue;
        }

        let members: HashSet<usize> = component.iter().copied().collect();
        let walk = closed_walk(start, &members, edges);
        let mut cycle = vec![edges.keys[start].clone()];
        cycle.extend(walk.iter().map(|(target, _)| edges.keys[*target].clone()));
        let entries: Vec<Entry> = walk
            .iter()
            .map(|(_, dependency)| {
                Entry::injected_at(dependency.request.clone(), dependency.site.clone())
            })
            .collect();
        let location = walk
            .last()
            .map(|(_, dependency)| located(graph, &dependency.site.location))
            .unwrap_or_else(|| graph.location().clone());
        errors.push(GraphError::DependencyCycle {
            graph: graph.id().clone(),
            cycle,
            trace: render_entries(&entries),
            location,
        });
    }
}

/// Finds a shortest walk from `start` back to itself through hard edges
/// staying inside `members`.
fn closed_walk<'g>(
    start: usize,
    members: &HashSet<usize>,
    edges: &Edges<'g>,
) -> Vec<(usize, &'g Dependency)> {
    let mut previous: HashMap<usize, (usize, &'g Dependency)> = HashMap::new();
    let mut queue = VecDeque::from([start]);
    while let Some(node) = queue.pop_front() {
        for &(target, dependency) in &edges.successors[node] {
            if dependency.request.is_deferrable() || !members.contains(&target) {
                continue;
            }
            if target == start {
                let mut walk = vec![(start, dependency)];
                let mut current = node;
                while current != start {
                    let Some(&(from, dependency)) = previous.get(&current) else {
                        break;
                    };
                    walk.push((current, dependency));
                    current = from;
                }
                walk.reverse();
                return walk;
            }
            if !previous.contains_key(&target) {
                previous.insert(target, (node, dependency));
                queue.push_back(target);
            }
        }
    }
    Vec::new()
}

fn check_scopes(graph: &BindingGraph, edges: &Edges<'_>, errors: &mut Vec<GraphError>) {
    for binding in graph.bindings() {
        let lifetime = binding.lifetime();
        let Some(scope) = lifetime.scope() else {
            continue;
        };
        // Inherited declarations live in the scopes of the graph declaring them.
        let owner = graph.owner_of(binding.key());
        let scopes = owner.scopes();
        if scopes.admits(lifetime) {
            continue;
        }
        let violation = if scopes.is_unscoped() {
            ScopeViolation::UnscopedGraph
        } else {
            ScopeViolation::MismatchedScope
        };
        errors.push(GraphError::IncompatibleScope {
            graph: owner.id().clone(),
            graph_scopes: scopes.to_string(),
            key: binding.key().clone(),
            scope: scope.to_string(),
            violation,
            trace: render_entries(&path_to(graph, edges, binding.key())),
            location: located(graph, &binding.provenance().location),
        });
    }
}

/// Returns the shortest request chain from a root of the graph to `key`.
fn path_to(graph: &BindingGraph, edges: &Edges<'_>, key: &TypeKey) -> Vec<Entry> {
    let Some(&goal) = edges.index.get(key) else {
        return Vec::new();
    };
    let mut previous: HashMap<usize, Option<(usize, &Dependency)>> = HashMap::new();
    let mut queue = VecDeque::new();
    let mut root_of: HashMap<usize, &Root> = HashMap::new();
    for root in graph.roots() {
        if let Some(&node) = edges.index.get(root.request.key()) {
            if !previous.contains_key(&node) {
                previous.insert(node, None);
                root_of.insert(node, root);
                queue.push_back(node);
            }
        }
    }

    while let Some(node) = queue.pop_front() {
        if node == goal {
            break;
        }
        for &(target, dependency) in &edges.successors[node] {
            if !previous.contains_key(&target) {
                previous.insert(target, Some((node, dependency)));
                queue.push_back(target);
            }
        }
    }

    let mut entries = Vec::new();
    let mut current = goal;
    loop {
        match previous.get(&current) {
            Some(Some((from, dependency))) => {
                entries.push(Entry::injected_at(
                    dependency.request.clone(),
                    dependency.site.clone(),
                ));
                current = *from;
            }
            Some(None) => {
                if let Some(root) = root_of.get(&current) {
                    let site = Provenance::new(
                        format!("{}.{}", graph.id().short_name(), root.name),
                        root.location.clone(),
                    );
                    entries.push(Entry::requested_at(root.request.clone(), site));
                }
                break;
            }
            None => break,
        }
    }
    entries.reverse();
    entries
}

fn check_multibindings(graph: &BindingGraph, errors: &mut Vec<GraphError>) {
    for binding in graph.bindings() {
        let BindingKind::Multibinding(shape) = binding.kind() else {
            continue;
        };
        let location = located(graph, &binding.provenance().location);
        for identity in &shape.duplicates {
            errors.push(GraphError::DuplicateContribution {
                multibinding: binding.key().clone(),
                identity: identity.clone(),
                location: location.clone(),
            });
        }
        if shape.contributions.is_empty() && !shape.allow_empty {
            errors.push(GraphError::EmptyMultibinding {
                key: binding.key().clone(),
                location,
            });
        }
    }
}

fn check_assisted(graph: &BindingGraph, errors: &mut Vec<GraphError>) {
    let is_target = |key: &TypeKey| {
        graph
            .binding_for(key)
            .is_some_and(Binding::is_assisted_target)
    };

    for root in graph.roots() {
        if is_target(root.request.key()) {
            let site = Provenance::new(
                format!("{}.{}", graph.id().short_name(), root.name),
                root.location.clone(),
            );
            errors.push(GraphError::AssistedTargetRequested {
                key: root.request.key().clone(),
                trace: render_entries(&[Entry::requested_at(root.request.clone(), site)]),
                location: located(graph, &root.location),
            });
        }
    }

    for binding in graph.bindings() {
        if let BindingKind::Assisted(shape) = binding.kind() {
            let diff = shape.diff();
            if !diff.is_empty() {
                errors.push(GraphError::AssistedParameterMismatch {
                    factory: shape.factory.clone(),
                    target: shape.target_class.clone(),
                    missing: diff.missing,
                    extra: diff.extra,
                    duplicates: diff.duplicates,
                    location: located(graph, &binding.provenance().location),
                });
            }
            continue;
        }
        for dependency in binding.dependencies() {
            if is_target(dependency.key()) {
                let entry = Entry::injected_at(dependency.request.clone(), dependency.site.clone());
                errors.push(GraphError::AssistedTargetRequested {
                    key: dependency.key().clone(),
                    trace: render_entries(&[entry]),
                    location: located(graph, &dependency.site.location),
                });
            }
        }
    }
}

fn located(graph: &BindingGraph, location: &SourceLocation) -> SourceLocation {
    if location.is_unknown() {
        graph.location().clone()
    } else {
        location.clone()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use crate::context::ResolutionContext;
    use crate::decl::dsl::{
        assisted_factory, assisted_inject, class, constructor, graph, inject, multibinds, param,
        provides, single_in, ty,
    };
    use crate::decl::{ClassDecl, ClassIndex, GraphDecl};
    use crate::graph::{BindingGraphBuilder, Expansion};
    use crate::options::Options;
    use crate::registry::Configurer;
    use crate::types::{ClassId, TypeRef};

    use super::*;

    fn context(classes: impl IntoIterator<Item = ClassDecl>) -> ResolutionContext {
        ResolutionContext::new(Options::default(), classes.into_iter().collect::<ClassIndex>())
    }

    fn expand(decl: &GraphDecl, context: &ResolutionContext) -> Expansion {
        expand_within(decl, None, context)
    }

    fn expand_within(
        decl: &GraphDecl,
        parent: Option<Arc<BindingGraph>>,
        context: &ResolutionContext,
    ) -> Expansion {
        let providers = Configurer::configure(decl, context)
            .unwrap()
            .finish()
            .unwrap();
        BindingGraphBuilder::new(decl, providers, parent, context)
            .unwrap()
            .expand()
            .unwrap()
    }

    /// A parent graph declaring a string provider scoped to `scope`, and a
    /// child graph in `test.UserScope` requesting the string.
    fn inherited_string(parent_scope: Option<&str>, scope: &str) -> Expansion {
        let context = context([]);
        let mut parent_builder = graph("test.AppGraph");
        if let Some(parent_scope) = parent_scope {
            parent_builder = parent_builder.within(single_in(parent_scope));
        }
        let mut parent_decl = parent_builder.build();
        provides("test.AppGraph", "provideString")
            .returns(ty("kotlin.String"))
            .within(single_in(scope))
            .in_object()
            .set_on(&mut parent_decl);
        let parent = Arc::new(expand(&parent_decl, &context).graph);

        let child = graph("test.UserGraph")
            .within(single_in("test.UserScope"))
            .extends("test.AppGraph")
            .accessor("value", ty("kotlin.String"))
            .build();
        expand_within(&child, Some(parent), &context)
    }

    #[test]
    fn validate_succeeds() {
        let context = context([class("test.Repo")
            .annotated(inject())
            .annotated(single_in("test.AppScope"))
            .build()]);
        let app = graph("test.AppGraph")
            .within(single_in("test.AppScope"))
            .accessor("repo", ty("test.Repo"))
            .build();

        let expansion = expand(&app, &context);
        assert!(validate(&expansion.graph, &expansion.cycles).is_empty());
    }

    #[test]
    fn validate_fails_when_graph_is_unscoped() {
        let context = context([]);
        let mut app = graph("test.AppGraph")
            .accessor("value", ty("kotlin.CharSequence"))
            .build();
        provides("test.AppGraph", "provideString")
            .returns(ty("kotlin.String"))
            .within(single_in("test.AppScope"))
            .in_object()
            .set_on(&mut app);
        provides("test.AppGraph", "provideSequence")
            .param(param("s", ty("kotlin.String")))
            .returns(ty("kotlin.CharSequence"))
            .in_object()
            .set_on(&mut app);

        let expansion = expand(&app, &context);
        let errors = validate(&expansion.graph, &expansion.cycles);
        let [GraphError::IncompatibleScope {
            key,
            scope,
            violation,
            trace,
            ..
        }] = errors.as_slice()
        else {
            panic!("expected one scope error, found {errors:?}");
        };
        assert_eq!(key, &crate::key::of(ty("kotlin.String")));
        assert!(scope.contains("test.AppScope"));
        assert_eq!(*violation, ScopeViolation::UnscopedGraph);
        assert!(trace.contains("kotlin.CharSequence is requested at"));
        assert!(trace.contains("kotlin.String is injected at"));
    }

    #[test]
    fn validate_fails_when_scope_is_mismatched() {
        let context = context([class("test.Repo")
            .annotated(inject())
            .annotated(single_in("test.UserScope"))
            .build()]);
        let app = graph("test.AppGraph")
            .within(single_in("test.AppScope"))
            .accessor("repo", ty("test.Repo"))
            .build();

        let expansion = expand(&app, &context);
        let errors = validate(&expansion.graph, &expansion.cycles);
        assert!(matches!(
            errors.as_slice(),
            [GraphError::IncompatibleScope {
                violation: ScopeViolation::MismatchedScope,
                ..
            }]
        ));
    }

    #[test]
    fn validate_fails_when_multibinding_is_empty() {
        let context = context([]);
        let set = TypeRef::generic("kotlin.collections.Set", [ty("kotlin.String")]);
        let mut app = graph("test.AppGraph").accessor("names", set.clone()).build();
        multibinds("test.AppGraph", "names", set).set_on(&mut app);

        let expansion = expand(&app, &context);
        let errors = validate(&expansion.graph, &expansion.cycles);
        assert!(matches!(
            errors.as_slice(),
            [GraphError::EmptyMultibinding { .. }]
        ));
    }

    #[test]
    fn validate_fails_when_contribution_is_duplicated() {
        let context = context([]);
        let set = TypeRef::generic("kotlin.collections.Set", [ty("test.Logger")]);
        let mut app = graph("test.AppGraph").accessor("loggers", set.clone()).build();
        for _ in 0..2 {
            provides("test.AppGraph", "provideLogger")
                .returns(ty("test.Logger"))
                .into_set()
                .in_object()
                .set_on(&mut app);
        }

        let expansion = expand(&app, &context);
        assert!(expansion.errors.is_empty());
        let errors = validate(&expansion.graph, &expansion.cycles);
        let [GraphError::DuplicateContribution {
            multibinding,
            identity,
            ..
        }] = errors.as_slice()
        else {
            panic!("expected one duplicate contribution, found {errors:?}");
        };
        assert_eq!(multibinding, &crate::key::of(set));
        assert_eq!(identity, "provideLogger()");
    }

    #[test]
    fn validate_fails_when_inherited_binding_is_out_of_scope() {
        let expansion = inherited_string(None, "test.OtherScope");
        assert!(expansion.errors.is_empty());
        let errors = validate(&expansion.graph, &expansion.cycles);
        let [GraphError::IncompatibleScope {
            graph,
            key,
            scope,
            violation,
            ..
        }] = errors.as_slice()
        else {
            panic!("expected one scope error, found {errors:?}");
        };
        assert_eq!(graph, &ClassId::new("test.AppGraph"));
        assert_eq!(key, &crate::key::of(ty("kotlin.String")));
        assert!(scope.contains("test.OtherScope"));
        assert_eq!(*violation, ScopeViolation::UnscopedGraph);
    }

    #[test]
    fn validate_succeeds_when_inherited_binding_is_in_parent_scope() {
        let expansion = inherited_string(Some("test.AppScope"), "test.AppScope");
        assert!(expansion.errors.is_empty());
        assert_eq!(
            expansion
                .graph
                .inherited_from(&crate::key::of(ty("kotlin.String"))),
            Some(&ClassId::new("test.AppGraph"))
        );
        assert!(validate(&expansion.graph, &expansion.cycles).is_empty());
    }

    #[test]
    fn validate_fails_when_assisted_parameters_mismatch() {
        let context = context([
            class("test.Target")
                .constructor(
                    constructor()
                        .primary()
                        .annotated(assisted_inject())
                        .param(param("x", ty("kotlin.Int")).assisted())
                        .param(param("y", ty("kotlin.Int")).assisted()),
                )
                .build(),
            class("test.Target.Factory")
                .interface()
                .annotated(assisted_factory())
                .factory_function("create", [param("x", ty("kotlin.Int"))], ty("test.Target"))
                .build(),
        ]);
        let app = graph("test.AppGraph")
            .accessor("factory", ty("test.Target.Factory"))
            .build();

        let expansion = expand(&app, &context);
        assert!(expansion.errors.is_empty());
        let errors = validate(&expansion.graph, &expansion.cycles);
        let [GraphError::AssistedParameterMismatch { missing, extra, .. }] = errors.as_slice() else {
            panic!("expected one assisted mismatch, found {errors:?}");
        };
        assert_eq!(missing, &["y: kotlin.Int"]);
        assert!(extra.is_empty());
    }

    #[test]
    fn validate_fails_when_assisted_target_is_requested() {
        let context = context([class("test.Target")
            .constructor(
                constructor()
                    .primary()
                    .annotated(assisted_inject())
                    .param(param("x", ty("kotlin.Int")).assisted()),
            )
            .build()]);
        let app = graph("test.AppGraph")
            .accessor("target", ty("test.Target"))
            .build();

        let expansion = expand(&app, &context);
        let errors = validate(&expansion.graph, &expansion.cycles);
        assert!(matches!(
            errors.as_slice(),
            [GraphError::AssistedTargetRequested { .. }]
        ));
    }

    #[test]
    fn validate_succeeds_when_cycle_is_already_reported() {
        let context = context([]);
        let mut app = graph("test.AppGraph")
            .accessor("value", ty("kotlin.Int"))
            .build();
        provides("test.AppGraph", "provideInt")
            .param(param("value", ty("kotlin.Int")))
            .returns(ty("kotlin.Int"))
            .in_object()
            .set_on(&mut app);

        let expansion = expand(&app, &context);
        assert_eq!(expansion.errors.len(), 1);
        assert!(validate(&expansion.graph, &expansion.cycles).is_empty());
        let backstop = validate(&expansion.graph, &[]);
        assert!(matches!(
            backstop.as_slice(),
            [GraphError::DependencyCycle { cycle, .. }] if cycle.len() == 2
        ));
    }
}
