//! Prefix-sum table of outgoing edge ranges.

use crate::schema::SnapshotLayout;
use crate::snapshot_error::SnapshotError;

/// Build `first_edge_index`, of length `node_count + 1`.
///
/// Entry `i` is the raw offset of node `i`'s first edge record in the edge
/// buffer; the edges of node `i` occupy `first[i]..first[i + 1]`.
///
/// ## Complexity
/// One pass over the node buffer.
///
/// # Errors
/// [`SnapshotError::EdgeCountMismatch`] when the per-node edge counts do not
/// add up to the edge buffer length.
pub fn build_first_edge_index(
    nodes: &[u32],
    edges_len: usize,
    layout: &SnapshotLayout,
) -> Result<Vec<u32>, SnapshotError> {
    let nfc = layout.node.field_count;
    let efc = layout.edge.field_count;
    let node_count = nodes.len() / nfc;
    let mut first = vec![0u32; node_count + 1];
    let mut edge_index = 0usize;
    for (ordinal, record) in nodes.chunks_exact(nfc).enumerate() {
        first[ordinal] = edge_index as u32;
        edge_index += record[layout.node.edge_count_offset] as usize * efc;
    }
    if edge_index != edges_len {
        return Err(SnapshotError::EdgeCountMismatch {
            declared: edge_index / efc,
            found: edges_len / efc,
        });
    }
    first[node_count] = edges_len as u32;
    Ok(first)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::SnapshotMeta;

    fn layout() -> SnapshotLayout {
        SnapshotLayout::from_meta(&SnapshotMeta::v8()).unwrap()
    }

    #[test]
    fn prefix_sums_follow_edge_counts() {
        // edge counts 2, 0, 1
        let nodes = [9, 0, 1, 0, 2, 0, 3, 0, 3, 0, 0, 0, 3, 0, 5, 0, 1, 0];
        let first = build_first_edge_index(&nodes, 9, &layout()).unwrap();
        assert_eq!(first, vec![0, 6, 6, 9]);
    }

    #[test]
    fn short_edge_buffer_is_fatal() {
        let nodes = [9, 0, 1, 0, 2, 0];
        let err = build_first_edge_index(&nodes, 3, &layout()).unwrap_err();
        assert_eq!(
            err,
            SnapshotError::EdgeCountMismatch {
                declared: 2,
                found: 1
            }
        );
    }
}
