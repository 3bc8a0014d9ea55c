//! Format without producer-specific heuristics.
//!
//! Every child of the root is a user root, nothing is excluded by ownership,
//! and nodes are grouped by name. Useful for synthetic graphs and for
//! snapshots from engines other than V8 that reuse the layout.

use std::borrow::Cow;

use super::{SnapshotFormat, tally_statistics};
use crate::graph::SnapshotGraph;
use crate::records::{EdgeName, Statistics};

#[derive(Clone, Copy, Debug, Default)]
pub struct GenericFormat;

impl SnapshotFormat for GenericFormat {
    fn calculate_flags(&self, graph: &SnapshotGraph) -> Vec<u32> {
        vec![0; graph.node_count]
    }

    fn user_objects_mask(&self) -> Option<u32> {
        None
    }

    fn node_name<'g>(&self, graph: &'g SnapshotGraph, ordinal: u32) -> Cow<'g, str> {
        Cow::Borrowed(graph.raw_node_name(ordinal))
    }

    fn class_name<'g>(&self, graph: &'g SnapshotGraph, ordinal: u32) -> Cow<'g, str> {
        Cow::Borrowed(graph.raw_node_name(ordinal))
    }

    fn class_key(&self, graph: &SnapshotGraph, ordinal: u32) -> i64 {
        i64::from(graph.node_name_index(ordinal))
    }

    fn edge_name(&self, graph: &SnapshotGraph, edge_index: usize) -> EdgeName {
        let edge = &graph.layout.edge;
        let t = graph.edge_type(edge_index);
        let raw = graph.edge_name_or_index(edge_index);
        if t == edge.element || t == edge.hidden {
            EdgeName::Index(raw)
        } else {
            EdgeName::Name(graph.string(raw).to_owned())
        }
    }

    fn calculate_statistics(
        &self,
        graph: &SnapshotGraph,
        distances: &[i32],
        total_size: f64,
    ) -> Statistics {
        let array = graph.layout.node.array;
        tally_statistics(graph, distances, total_size, |o| {
            (graph.node_type(o) == array).then(|| f64::from(graph.self_size(o)))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::{EdgeType, NodeType, SnapshotBuilder};

    #[test]
    fn groups_by_name_and_roots_are_root_children() {
        let mut b = SnapshotBuilder::new();
        let root = b.add_node(NodeType::Synthetic, "", 1, 0);
        let a = b.add_node(NodeType::Object, "Foo", 3, 10);
        let c = b.add_node(NodeType::Code, "Foo", 5, 10);
        b.add_edge(root, EdgeType::Element, "0", a);
        b.add_edge(root, EdgeType::Property, "c", c);
        b.add_edge(root, EdgeType::Property, "again", a);
        let raw = b.build();
        let g = SnapshotGraph::from_parts(&raw.snapshot, raw.nodes, raw.edges, raw.strings).unwrap();
        let f = GenericFormat;
        assert_eq!(f.class_key(&g, a), f.class_key(&g, c));
        assert_eq!(f.roots(&g, true), vec![a, c]);
        assert_eq!(f.roots(&g, false), vec![a, c]);
        let names: Vec<_> = g.edges_of(root).map(|e| f.edge_name(&g, e)).collect();
        assert_eq!(names[0], EdgeName::Index(0));
        assert_eq!(names[1], EdgeName::Name("c".into()));
    }
}
