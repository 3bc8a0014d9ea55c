//! Inverse edge (retainer) index built by counting sort.

use crate::schema::SnapshotLayout;
use crate::snapshot_error::SnapshotError;

/// CSR table of incoming edges.
///
/// The retainers of node `o` occupy slots
/// `first_retainer_index[o]..first_retainer_index[o + 1]`; each slot holds the
/// retaining node's ordinal and the raw offset of the retaining edge.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RetainerIndex {
    pub retaining_nodes: Vec<u32>,
    pub retaining_edges: Vec<u32>,
    pub first_retainer_index: Vec<u32>,
}

impl RetainerIndex {
    /// Slot range of `ordinal`'s retainers.
    #[inline]
    pub fn range(&self, ordinal: u32) -> std::ops::Range<usize> {
        let o = ordinal as usize;
        self.first_retainer_index[o] as usize..self.first_retainer_index[o + 1] as usize
    }

    /// Number of retainers of `ordinal`.
    #[inline]
    pub fn count(&self, ordinal: u32) -> usize {
        self.range(ordinal).len()
    }
}

/// Resolve an edge's `to_node` field to a node ordinal.
///
/// # Errors
/// A target that is not on a record boundary, or past the end of the node
/// buffer, means the snapshot is truncated or was written with another schema.
#[inline]
pub(crate) fn target_ordinal(
    to_node: u32,
    edge_index: usize,
    node_field_count: usize,
    node_count: usize,
) -> Result<u32, SnapshotError> {
    if to_node as usize % node_field_count != 0 {
        return Err(SnapshotError::MisalignedEdgeTarget {
            edge_index,
            to_node,
        });
    }
    let ordinal = to_node as usize / node_field_count;
    if ordinal >= node_count {
        return Err(SnapshotError::EdgeTargetOutOfRange {
            edge_index,
            to_node,
        });
    }
    Ok(ordinal as u32)
}

/// Build the retainer index from the edge buffer.
///
/// Pass 1 counts incoming edges per target; the counts become prefix sums and
/// pass 2 scatters `(source, edge)` pairs into their reserved buckets through a
/// per-bucket cursor stored in the bucket's first slot. Within a bucket the
/// retainers end up in reverse edge order.
///
/// ## Complexity
/// - Time: **O(|V| + |E|)**
/// - Space: **O(|V| + |E|)**
///
/// # Errors
/// [`SnapshotError::MisalignedEdgeTarget`] / [`SnapshotError::EdgeTargetOutOfRange`].
pub fn build_retainers(
    edges: &[u32],
    first_edge_index: &[u32],
    layout: &SnapshotLayout,
) -> Result<RetainerIndex, SnapshotError> {
    let nfc = layout.node.field_count;
    let efc = layout.edge.field_count;
    let to_offset = layout.edge.to_node_offset;
    let node_count = first_edge_index.len() - 1;
    let edge_count = edges.len() / efc;

    let mut first_retainer_index = vec![0u32; node_count + 1];
    let mut retaining_nodes = vec![0u32; edge_count];
    let mut retaining_edges = vec![0u32; edge_count];

    // 1) incoming degree per target
    for edge_index in (0..edges.len()).step_by(efc) {
        let to = target_ordinal(edges[edge_index + to_offset], edge_index, nfc, node_count)?;
        first_retainer_index[to as usize] += 1;
    }

    // 2) prefix sums; the first slot of each bucket holds its fill cursor
    let mut first_unused = 0u32;
    for slot in first_retainer_index.iter_mut().take(node_count) {
        let count = *slot;
        *slot = first_unused;
        if count > 0 {
            retaining_nodes[first_unused as usize] = count;
        }
        first_unused += count;
    }
    first_retainer_index[node_count] = edge_count as u32;

    // 3) scatter
    for src in 0..node_count {
        let begin = first_edge_index[src] as usize;
        let end = first_edge_index[src + 1] as usize;
        for edge_index in (begin..end).step_by(efc) {
            let to = target_ordinal(edges[edge_index + to_offset], edge_index, nfc, node_count)?;
            let bucket = first_retainer_index[to as usize] as usize;
            retaining_nodes[bucket] -= 1;
            let slot = bucket + retaining_nodes[bucket] as usize;
            retaining_nodes[slot] = src as u32;
            retaining_edges[slot] = edge_index as u32;
        }
    }

    Ok(RetainerIndex {
        retaining_nodes,
        retaining_edges,
        first_retainer_index,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::edge_index::build_first_edge_index;
    use crate::schema::SnapshotMeta;

    fn layout() -> SnapshotLayout {
        SnapshotLayout::from_meta(&SnapshotMeta::v8()).unwrap()
    }

    #[test]
    fn inverse_of_diamond() {
        // root(0) -> A(1), root -> B(2), A -> C(3), B -> C
        let nodes = [
            9, 0, 1, 0, 2, 0, //
            3, 0, 3, 10, 1, 0, //
            3, 0, 5, 10, 1, 0, //
            3, 0, 7, 5, 0, 0,
        ];
        let edges = [2, 0, 6, 2, 0, 12, 2, 0, 18, 2, 0, 18];
        let l = layout();
        let first = build_first_edge_index(&nodes, edges.len(), &l).unwrap();
        let r = build_retainers(&edges, &first, &l).unwrap();
        assert_eq!(r.first_retainer_index, vec![0, 0, 1, 2, 4]);
        assert_eq!(r.count(3), 2);
        let mut c: Vec<_> = r
            .range(3)
            .map(|s| (r.retaining_nodes[s], r.retaining_edges[s]))
            .collect();
        c.sort_unstable();
        assert_eq!(c, vec![(1, 6), (2, 9)]);
        assert_eq!(r.retaining_nodes[r.range(1).start], 0);
    }

    #[test]
    fn misaligned_target_is_fatal() {
        let nodes = [9, 0, 1, 0, 1, 0, 3, 0, 3, 0, 0, 0];
        let edges = [2, 0, 7];
        let l = layout();
        let first = build_first_edge_index(&nodes, edges.len(), &l).unwrap();
        assert_eq!(
            build_retainers(&edges, &first, &l).unwrap_err(),
            SnapshotError::MisalignedEdgeTarget {
                edge_index: 0,
                to_node: 7
            }
        );
    }

    #[test]
    fn target_past_end_is_fatal() {
        let nodes = [9, 0, 1, 0, 1, 0];
        let edges = [2, 0, 12];
        let l = layout();
        let first = build_first_edge_index(&nodes, edges.len(), &l).unwrap();
        assert!(matches!(
            build_retainers(&edges, &first, &l),
            Err(SnapshotError::EdgeTargetOutOfRange { .. })
        ));
    }
}
