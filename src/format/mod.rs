//! Format-specific behaviour behind the generic graph algorithms.
//!
//! Everything in [`crate::graph`] works on any snapshot layout. What a node's
//! class is, which nodes are roots, how names render and which nodes the page
//! owns depends on the producer of the snapshot; a [`SnapshotFormat`] supplies
//! those answers.
//!
//! - [`v8::V8Format`]: V8/Blink heap snapshots
//! - [`generic::GenericFormat`]: any graph in the stock layout, no heuristics

pub mod generic;
pub mod v8;

use std::borrow::Cow;

use crate::graph::SnapshotGraph;
use crate::records::{EdgeName, Statistics};

pub use generic::GenericFormat;
pub use v8::V8Format;

/// Hooks a snapshot format provides to [`crate::snapshot::HeapSnapshot`].
///
/// Methods without a default body are the format's obligations; the rest
/// default to "no heuristics".
pub trait SnapshotFormat: Send + Sync {
    /// Per-node flag bits, one entry per node, computed once after the edge
    /// and retainer indices exist.
    fn calculate_flags(&self, graph: &SnapshotGraph) -> Vec<u32>;

    /// Bit of the flag vector that marks page-owned nodes, or `None` when the
    /// page-ownership rule should not apply.
    fn user_objects_mask(&self) -> Option<u32>;

    /// Display name of a node.
    fn node_name<'g>(&self, graph: &'g SnapshotGraph, ordinal: u32) -> Cow<'g, str>;

    /// Name of the class a node is grouped under.
    fn class_name<'g>(&self, graph: &'g SnapshotGraph, ordinal: u32) -> Cow<'g, str>;

    /// Grouping key; two nodes share an aggregate iff their keys are equal.
    fn class_key(&self, graph: &SnapshotGraph, ordinal: u32) -> i64;

    /// Name of an edge.
    fn edge_name(&self, graph: &SnapshotGraph, edge_index: usize) -> EdgeName;

    /// Heap composition; `total_size` is the root's retained size.
    fn calculate_statistics(
        &self,
        graph: &SnapshotGraph,
        distances: &[i32],
        total_size: f64,
    ) -> Statistics;

    /// Whether a root child counts as a user root.
    fn is_user_root(&self, _graph: &SnapshotGraph, _ordinal: u32) -> bool {
        true
    }

    /// BFS seeds, in visiting order and without duplicates.
    fn roots(&self, graph: &SnapshotGraph, user_roots_only: bool) -> Vec<u32> {
        let mut seen = hashbrown::HashSet::new();
        graph
            .root_children()
            .filter(|&o| !user_roots_only || self.is_user_root(graph, o))
            .filter(|&o| seen.insert(o))
            .collect()
    }

    /// Whether distances may flow along `edge_index` out of `from`.
    fn distance_filter(&self, _graph: &SnapshotGraph, _from: u32, _edge_index: usize) -> bool {
        true
    }

    /// Edges listed by the containment (outgoing edges) provider.
    fn containment_edge_filter(&self, _graph: &SnapshotGraph, _edge_index: usize) -> bool {
        true
    }

    /// Edges listed by the retainers provider; `retainer` is the source node.
    fn retaining_edge_filter(
        &self,
        _graph: &SnapshotGraph,
        _retainer: u32,
        _edge_index: usize,
    ) -> bool {
        true
    }

    /// Whether the runtime may be queried about this object.
    fn can_be_queried(&self, _flags: &[u32], _ordinal: u32) -> bool {
        false
    }

    /// Whether the node belongs to a detached DOM tree.
    fn is_detached_dom_tree_node(&self, _flags: &[u32], _ordinal: u32) -> bool {
        false
    }
}

/// Category breakdown shared by the formats: system-distance nodes count as
/// system, then native, code and string nodes by type tag. `array_size`
/// returns the size charged to an array node, or `None` if it is not one.
pub(crate) fn tally_statistics<A>(
    graph: &SnapshotGraph,
    distances: &[i32],
    total_size: f64,
    mut array_size: A,
) -> Statistics
where
    A: FnMut(u32) -> Option<f64>,
{
    let node = &graph.layout.node;
    let mut native = 0.0;
    let mut code = 0.0;
    let mut strings = 0.0;
    let mut js_arrays = 0.0;
    let mut system = 0.0;
    for ordinal in 0..graph.node_count as u32 {
        let size = f64::from(graph.self_size(ordinal));
        if distances[ordinal as usize] >= crate::graph::distances::BASE_SYSTEM_DISTANCE {
            system += size;
            continue;
        }
        let t = graph.node_type(ordinal);
        if t == node.native {
            native += size;
        } else if t == node.code {
            code += size;
        } else if t == node.cons_string || t == node.sliced_string || t == node.string {
            strings += size;
        } else if let Some(s) = array_size(ordinal) {
            js_arrays += s;
        }
    }
    Statistics {
        total: total_size,
        v8heap: total_size - native,
        native,
        code,
        js_arrays,
        strings,
        system,
    }
}
