//! Multi-source BFS distances from the root set.

use super::SnapshotGraph;

/// Distance of a node no root reaches.
pub const NO_DISTANCE: i32 = -5;

/// Base distance for nodes only reachable from system (non-user) roots.
pub const BASE_SYSTEM_DISTANCE: i32 = 100_000_000;

/// Compute the hop distance of every node.
///
/// Pass 1 seeds `user_roots` at distance 1; pass 2 seeds `all_roots` at
/// [`BASE_SYSTEM_DISTANCE`] and only fills nodes pass 1 left at
/// [`NO_DISTANCE`]. Weak edges are never followed. `edge_filter(from, edge)`
/// can veto further edges; it is only asked for edges whose target is still
/// unvisited.
///
/// ## Complexity
/// **O(|V| + |E|)**, one queue of `node_count` slots reused by both passes.
pub fn calculate_distances<F>(
    graph: &SnapshotGraph,
    user_roots: &[u32],
    all_roots: &[u32],
    mut edge_filter: F,
) -> Vec<i32>
where
    F: FnMut(u32, usize) -> bool,
{
    let mut distances = vec![NO_DISTANCE; graph.node_count];
    let mut queue: Vec<u32> = Vec::with_capacity(graph.node_count);

    for (base, roots) in [(1, user_roots), (BASE_SYSTEM_DISTANCE, all_roots)] {
        queue.clear();
        for &root in roots {
            let d = &mut distances[root as usize];
            if *d == NO_DISTANCE {
                *d = base;
                queue.push(root);
            }
        }
        bfs(graph, &mut queue, &mut distances, &mut edge_filter);
    }
    distances
}

fn bfs<F>(graph: &SnapshotGraph, queue: &mut Vec<u32>, distances: &mut [i32], edge_filter: &mut F)
where
    F: FnMut(u32, usize) -> bool,
{
    let weak = graph.layout.edge.weak;
    let mut head = 0;
    while head < queue.len() {
        let ordinal = queue[head];
        head += 1;
        let distance = distances[ordinal as usize] + 1;
        for edge_index in graph.edges_of(ordinal) {
            if graph.edge_type(edge_index) == weak {
                continue;
            }
            let child = graph.edge_target(edge_index);
            if distances[child as usize] != NO_DISTANCE {
                continue;
            }
            if !edge_filter(ordinal, edge_index) {
                continue;
            }
            distances[child as usize] = distance;
            queue.push(child);
        }
    }
    debug_assert!(queue.len() <= graph.node_count);
}
