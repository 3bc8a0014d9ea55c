//! Retained sizes and the dominator-tree child table.

use super::SnapshotGraph;
use super::postorder::Postorder;

/// Accumulate self sizes up the dominator tree.
///
/// Nodes are visited in ascending postorder, excluding the root; every node is
/// complete by the time it is added to its dominator, since a dominator always
/// has a higher postorder index than the nodes it dominates.
pub fn calculate_retained_sizes(
    graph: &SnapshotGraph,
    postorder: &Postorder,
    dominators: &[u32],
) -> Vec<f64> {
    let mut retained: Vec<f64> = (0..graph.node_count as u32)
        .map(|o| f64::from(graph.self_size(o)))
        .collect();
    for &ordinal in &postorder.index_to_ordinal[..postorder.root_index()] {
        let dominator = dominators[ordinal as usize] as usize;
        retained[dominator] += retained[ordinal as usize];
    }
    retained
}

/// CSR table of dominator-tree children.
///
/// The nodes immediately dominated by `o` are
/// `dominated_nodes[first_dominated_index[o]..first_dominated_index[o + 1]]`,
/// stored as ordinals.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DominatedIndex {
    pub first_dominated_index: Vec<u32>,
    pub dominated_nodes: Vec<u32>,
}

impl DominatedIndex {
    /// Children of `ordinal` in the dominator tree.
    #[inline]
    pub fn children(&self, ordinal: u32) -> &[u32] {
        let o = ordinal as usize;
        let begin = self.first_dominated_index[o] as usize;
        let end = self.first_dominated_index[o + 1] as usize;
        &self.dominated_nodes[begin..end]
    }
}

/// Counting sort of nodes by dominator.
///
/// The root is the only self-dominated node and is left out wherever it sits
/// in the buffer.
///
/// ## Complexity
/// **O(|V|)** time and space.
pub fn build_dominated_index(dominators: &[u32], root: u32) -> DominatedIndex {
    let node_count = dominators.len();
    let mut first = vec![0u32; node_count + 1];
    let mut dominated = vec![0u32; node_count.saturating_sub(1)];

    let non_root = move || (0..node_count as u32).filter(move |&o| o != root);

    for o in non_root() {
        first[dominators[o as usize] as usize] += 1;
    }
    // The first slot of every non-empty bucket holds its fill cursor.
    let mut first_unused = 0u32;
    for slot in first.iter_mut().take(node_count) {
        let count = *slot;
        *slot = first_unused;
        if count > 0 {
            dominated[first_unused as usize] = count;
        }
        first_unused += count;
    }
    first[node_count] = dominated.len() as u32;

    for o in non_root() {
        let bucket = first[dominators[o as usize] as usize] as usize;
        dominated[bucket] -= 1;
        let slot = bucket + dominated[bucket] as usize;
        dominated[slot] = o;
    }

    DominatedIndex {
        first_dominated_index: first,
        dominated_nodes: dominated,
    }
}
