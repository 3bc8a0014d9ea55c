//! Programmatic construction of [`RawSnapshot`] buffers in the V8 layout.
//!
//! Useful for tests, fixtures and for producers that already hold an object
//! graph in memory. Nodes are addressed by ordinal while building; edges are
//! written in source order when [`SnapshotBuilder::build`] lays out the buffers.

use hashbrown::HashMap;

use crate::loader::RawSnapshot;
use crate::schema::{SnapshotHeader, SnapshotMeta};

/// V8 node type tags, in the order of [`SnapshotMeta::v8`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum NodeType {
    Hidden = 0,
    Array = 1,
    String = 2,
    Object = 3,
    Code = 4,
    Closure = 5,
    RegExp = 6,
    Number = 7,
    Native = 8,
    Synthetic = 9,
    ConsString = 10,
    SlicedString = 11,
}

/// V8 edge type tags, in the order of [`SnapshotMeta::v8`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum EdgeType {
    Context = 0,
    Element = 1,
    Property = 2,
    Internal = 3,
    Hidden = 4,
    Shortcut = 5,
    Weak = 6,
}

impl EdgeType {
    /// Element and hidden edges carry a numeric index instead of a string name.
    pub fn has_index_name(self) -> bool {
        matches!(self, EdgeType::Element | EdgeType::Hidden)
    }
}

#[derive(Clone, Debug)]
struct PendingNode {
    node_type: NodeType,
    name: u32,
    id: u32,
    self_size: u32,
    trace_node_id: u32,
    edges: Vec<(EdgeType, u32, u32)>,
}

/// Incremental builder for V8-layout snapshots.
#[derive(Clone, Debug, Default)]
pub struct SnapshotBuilder {
    strings: Vec<String>,
    string_index: HashMap<String, u32>,
    nodes: Vec<PendingNode>,
    root: u32,
    samples: Vec<u64>,
    trace_function_infos: Vec<u32>,
    trace_tree: serde_json::Value,
}

impl SnapshotBuilder {
    pub fn new() -> Self {
        let mut b = Self::default();
        b.intern("");
        b
    }

    /// Index of `s` in the string table, adding it if needed.
    pub fn intern(&mut self, s: &str) -> u32 {
        if let Some(&i) = self.string_index.get(s) {
            return i;
        }
        let i = self.strings.len() as u32;
        self.strings.push(s.to_owned());
        self.string_index.insert(s.to_owned(), i);
        i
    }

    /// Append a node and return its ordinal.
    pub fn add_node(&mut self, node_type: NodeType, name: &str, id: u32, self_size: u32) -> u32 {
        let name = self.intern(name);
        self.nodes.push(PendingNode {
            node_type,
            name,
            id,
            self_size,
            trace_node_id: 0,
            edges: Vec::new(),
        });
        (self.nodes.len() - 1) as u32
    }

    /// Add a named edge `from → to`. For index-named edge types the name is
    /// parsed as a number, falling back to 0.
    pub fn add_edge(&mut self, from: u32, edge_type: EdgeType, name: &str, to: u32) {
        let name_or_index = if edge_type.has_index_name() {
            name.parse().unwrap_or(0)
        } else {
            self.intern(name)
        };
        self.nodes[from as usize]
            .edges
            .push((edge_type, name_or_index, to));
    }

    /// Add an index-named edge (`element`/`hidden`) `from → to`.
    pub fn add_indexed_edge(&mut self, from: u32, edge_type: EdgeType, index: u32, to: u32) {
        self.nodes[from as usize].edges.push((edge_type, index, to));
    }

    /// Attach an allocation trace node to an object.
    pub fn set_trace_node_id(&mut self, ordinal: u32, trace_node_id: u32) {
        self.nodes[ordinal as usize].trace_node_id = trace_node_id;
    }

    /// Choose the root node; defaults to the first node added.
    pub fn set_root(&mut self, ordinal: u32) {
        self.root = ordinal;
    }

    /// Allocation-timeline samples as `(timestamp_us, last_assigned_id)` pairs.
    pub fn set_samples(&mut self, samples: &[(u64, u64)]) {
        self.samples = samples.iter().flat_map(|&(t, id)| [t, id]).collect();
    }

    /// Add a trace function info record and return its index.
    pub fn add_trace_function(
        &mut self,
        function_id: u32,
        name: &str,
        script_name: &str,
        script_id: u32,
        line: u32,
        column: u32,
    ) -> u32 {
        let name = self.intern(name);
        let script_name = self.intern(script_name);
        self.trace_function_infos
            .extend_from_slice(&[function_id, name, script_name, script_id, line, column]);
        (self.trace_function_infos.len() / 6 - 1) as u32
    }

    /// Install the nested trace tree (`[id, function_info_index, count, size, [children...]]`).
    pub fn set_trace_tree(&mut self, tree: serde_json::Value) {
        self.trace_tree = tree;
    }

    /// Lay out the flat buffers.
    pub fn build(self) -> RawSnapshot {
        const NODE_FIELDS: usize = 6;
        let edge_count: usize = self.nodes.iter().map(|n| n.edges.len()).sum();
        let mut nodes = Vec::with_capacity(self.nodes.len() * NODE_FIELDS);
        let mut edges = Vec::with_capacity(edge_count * 3);
        for n in &self.nodes {
            nodes.extend_from_slice(&[
                n.node_type as u32,
                n.name,
                n.id,
                n.self_size,
                n.edges.len() as u32,
                n.trace_node_id,
            ]);
            for &(t, name, to) in &n.edges {
                edges.extend_from_slice(&[t as u32, name, to * NODE_FIELDS as u32]);
            }
        }
        RawSnapshot {
            snapshot: SnapshotHeader {
                title: String::new(),
                meta: SnapshotMeta::v8(),
                node_count: self.nodes.len(),
                edge_count,
                trace_function_count: self.trace_function_infos.len() / 6,
                root_index: Some(self.root as usize * NODE_FIELDS),
            },
            nodes,
            edges,
            trace_function_infos: self.trace_function_infos,
            trace_tree: self.trace_tree,
            samples: self.samples,
            strings: self.strings,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lays_out_records_with_raw_offsets() {
        let mut b = SnapshotBuilder::new();
        let root = b.add_node(NodeType::Synthetic, "", 1, 0);
        let a = b.add_node(NodeType::Object, "A", 3, 10);
        b.add_edge(root, EdgeType::Shortcut, "a", a);
        b.add_indexed_edge(a, EdgeType::Element, 7, root);
        let raw = b.build();
        assert_eq!(raw.snapshot.node_count, 2);
        assert_eq!(raw.snapshot.edge_count, 2);
        assert_eq!(raw.nodes, vec![9, 0, 1, 0, 1, 0, 3, 1, 3, 10, 1, 0]);
        assert_eq!(raw.edges, vec![5, 2, 6, 1, 7, 0]);
        assert_eq!(raw.strings, vec!["", "A", "a"]);
    }

    #[test]
    fn strings_are_deduplicated() {
        let mut b = SnapshotBuilder::new();
        assert_eq!(b.intern("x"), b.intern("x"));
        assert_eq!(b.intern(""), 0);
    }
}
