use std::collections::{BTreeMap, BTreeSet};

/// Depth-first cycle search with a recursion stack. A neighbour found on the
/// stack closes a cycle, reported as the path from its first occurrence.
///
/// Nodes are visited in `Ord` order so results are stable across runs.
pub fn find_cycles<N: Ord + Clone>(edges: &BTreeMap<N, BTreeSet<N>>) -> Vec<Vec<N>> {
    let mut visited = BTreeSet::new();
    let mut on_stack = BTreeSet::new();
    let mut path = Vec::new();
    let mut cycles = Vec::new();

    for node in edges.keys() {
        if !visited.contains(node) {
            dfs(node, edges, &mut visited, &mut on_stack, &mut path, &mut cycles);
        }
    }

    cycles
}

fn dfs<N: Ord + Clone>(
    node: &N,
    edges: &BTreeMap<N, BTreeSet<N>>,
    visited: &mut BTreeSet<N>,
    on_stack: &mut BTreeSet<N>,
    path: &mut Vec<N>,
    cycles: &mut Vec<Vec<N>>,
) {
    visited.insert(node.clone());
    on_stack.insert(node.clone());
    path.push(node.clone());

    if let Some(neighbors) = edges.get(node) {
        for neighbor in neighbors {
            if !visited.contains(neighbor) {
                dfs(neighbor, edges, visited, on_stack, path, cycles);
            } else if on_stack.contains(neighbor) {
                if let Some(pos) = path.iter().position(|n| n == neighbor) {
                    cycles.push(path[pos..].to_vec());
                }
            }
        }
    }

    path.pop();
    on_stack.remove(node);
}
