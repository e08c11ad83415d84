use petgraph::algo::tarjan_scc;
use petgraph::graph::{DiGraph, NodeIndex};

/// Returns the strongly connected components of a graph given as adjacency
/// lists, in reverse topological order of the condensation. Members of each
/// component are sorted.
pub(crate) fn strongly_connected(successors: &[Vec<usize>]) -> Vec<Vec<usize>> {
    let mut graph = DiGraph::<usize, ()>::with_capacity(successors.len(), 0);
    let nodes: Vec<NodeIndex> = (0..successors.len()).map(|i| graph.add_node(i)).collect();
    for (from, targets) in successors.iter().enumerate() {
        for &to in targets {
            graph.add_edge(nodes[from], nodes[to], ());
        }
    }

    tarjan_scc(&graph)
        .into_iter()
        .map(|component| {
            let mut members: Vec<usize> = component.into_iter().map(|idx| graph[idx]).collect();
            members.sort_unstable();
            members
        })
        .collect()
}
