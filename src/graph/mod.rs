//! Snapshot graph: flat buffers plus the derived edge and retainer indices.
//!
//! Nodes are addressed by *ordinal* (0-based record number); edges by their raw
//! offset into the edge buffer. No derived structure holds references to
//! records, only integer offsets, so every table here is a plain `Vec<u32>`.
//!
//! The algorithms of the build pipeline live in the submodules as free
//! functions over a [`SnapshotGraph`]:
//! - [`edge_index`]: outgoing edge ranges
//! - [`retainers`]: incoming edge ranges
//! - [`distances`]: two-pass BFS from the roots
//! - [`postorder`]: iterative DFS numbering with orphan repair
//! - [`dominators`]: Cooper–Harvey–Kennedy fixed point
//! - [`retained`]: retained sizes and the dominated-node table

pub mod distances;
pub mod dominators;
pub mod edge_index;
pub mod ownership;
pub mod postorder;
pub mod retained;
pub mod retainers;

use std::iter::StepBy;
use std::ops::Range;

use crate::schema::{SnapshotHeader, SnapshotLayout};
use crate::snapshot_error::SnapshotError;

pub use ownership::PageOwnership;
pub use retainers::RetainerIndex;

/// Immutable snapshot buffers with resolved layout and edge/retainer indices.
#[derive(Clone, Debug)]
pub struct SnapshotGraph {
    pub nodes: Vec<u32>,
    pub edges: Vec<u32>,
    pub strings: Vec<String>,
    pub layout: SnapshotLayout,
    pub node_count: usize,
    pub edge_count: usize,
    pub root_ordinal: u32,
    pub first_edge_index: Vec<u32>,
    pub retainers: RetainerIndex,
}

impl SnapshotGraph {
    /// Validate the buffers against the header and build the edge and retainer
    /// indices.
    ///
    /// # Errors
    /// Any corrupt-input variant of [`SnapshotError`]; all of them are fatal.
    pub fn from_parts(
        header: &SnapshotHeader,
        nodes: Vec<u32>,
        edges: Vec<u32>,
        strings: Vec<String>,
    ) -> Result<Self, SnapshotError> {
        let layout = SnapshotLayout::from_meta(&header.meta)?;
        let nfc = layout.node.field_count;
        let efc = layout.edge.field_count;
        if nodes.len() % nfc != 0 {
            return Err(SnapshotError::NodeBufferMisaligned {
                len: nodes.len(),
                field_count: nfc,
            });
        }
        if edges.len() % efc != 0 {
            return Err(SnapshotError::EdgeBufferMisaligned {
                len: edges.len(),
                field_count: efc,
            });
        }
        let node_count = nodes.len() / nfc;
        let edge_count = edges.len() / efc;
        if node_count == 0 {
            return Err(SnapshotError::EmptySnapshot);
        }
        if header.node_count != node_count {
            return Err(SnapshotError::NodeCountMismatch {
                declared: header.node_count,
                found: node_count,
            });
        }
        if header.edge_count != edge_count {
            return Err(SnapshotError::EdgeCountMismatch {
                declared: header.edge_count,
                found: edge_count,
            });
        }
        let root_index = header.root_index.unwrap_or(0);
        if root_index % nfc != 0 || root_index >= nodes.len() {
            return Err(SnapshotError::InvalidRootIndex(root_index));
        }

        let first_edge_index = edge_index::build_first_edge_index(&nodes, edges.len(), &layout)?;
        let retainers = retainers::build_retainers(&edges, &first_edge_index, &layout)?;

        Ok(Self {
            nodes,
            edges,
            strings,
            layout,
            node_count,
            edge_count,
            root_ordinal: (root_index / nfc) as u32,
            first_edge_index,
            retainers,
        })
    }

    // --- nodes -------------------------------------------------------------------

    #[inline]
    fn node_field(&self, ordinal: u32, offset: usize) -> u32 {
        self.nodes[ordinal as usize * self.layout.node.field_count + offset]
    }

    /// Raw offset of the node record; this is the position exposed to consumers.
    #[inline]
    pub fn node_index(&self, ordinal: u32) -> usize {
        ordinal as usize * self.layout.node.field_count
    }

    /// Ordinal for a raw node offset.
    ///
    /// # Errors
    /// [`SnapshotError::UnknownNodeIndex`] for misaligned or out-of-range offsets.
    pub fn ordinal_of(&self, node_index: usize) -> Result<u32, SnapshotError> {
        let nfc = self.layout.node.field_count;
        if node_index % nfc != 0 || node_index >= self.nodes.len() {
            return Err(SnapshotError::UnknownNodeIndex(node_index));
        }
        Ok((node_index / nfc) as u32)
    }

    #[inline]
    pub fn node_type(&self, ordinal: u32) -> u32 {
        self.node_field(ordinal, self.layout.node.type_offset)
    }

    pub fn node_type_name(&self, ordinal: u32) -> &str {
        self.layout
            .node
            .types
            .get(self.node_type(ordinal) as usize)
            .map_or("unknown", String::as_str)
    }

    #[inline]
    pub fn node_name_index(&self, ordinal: u32) -> u32 {
        self.node_field(ordinal, self.layout.node.name_offset)
    }

    /// The name straight from the string table.
    pub fn raw_node_name(&self, ordinal: u32) -> &str {
        self.string(self.node_name_index(ordinal))
    }

    #[inline]
    pub fn node_id(&self, ordinal: u32) -> u32 {
        self.node_field(ordinal, self.layout.node.id_offset)
    }

    #[inline]
    pub fn self_size(&self, ordinal: u32) -> u32 {
        self.node_field(ordinal, self.layout.node.self_size_offset)
    }

    /// Allocation trace node, or 0 when the schema has no trace field.
    #[inline]
    pub fn trace_node_id(&self, ordinal: u32) -> u32 {
        self.layout
            .node
            .trace_node_id_offset
            .map_or(0, |off| self.node_field(ordinal, off))
    }

    #[inline]
    pub fn is_root(&self, ordinal: u32) -> bool {
        ordinal == self.root_ordinal
    }

    /// String table lookup; unknown indexes read as the empty string.
    #[inline]
    pub fn string(&self, index: u32) -> &str {
        self.strings.get(index as usize).map_or("", String::as_str)
    }

    // --- edges -------------------------------------------------------------------

    /// Raw offsets of `ordinal`'s outgoing edges.
    #[inline]
    pub fn edges_of(&self, ordinal: u32) -> StepBy<Range<usize>> {
        let o = ordinal as usize;
        (self.first_edge_index[o] as usize..self.first_edge_index[o + 1] as usize)
            .step_by(self.layout.edge.field_count)
    }

    #[inline]
    pub fn edge_count_of(&self, ordinal: u32) -> usize {
        let o = ordinal as usize;
        (self.first_edge_index[o + 1] - self.first_edge_index[o]) as usize
            / self.layout.edge.field_count
    }

    #[inline]
    pub fn edge_type(&self, edge_index: usize) -> u32 {
        self.edges[edge_index + self.layout.edge.type_offset]
    }

    pub fn edge_type_name(&self, edge_index: usize) -> &str {
        self.layout
            .edge
            .types
            .get(self.edge_type(edge_index) as usize)
            .map_or("unknown", String::as_str)
    }

    #[inline]
    pub fn edge_name_or_index(&self, edge_index: usize) -> u32 {
        self.edges[edge_index + self.layout.edge.name_offset]
    }

    /// Target ordinal; alignment was validated when the retainers were built.
    #[inline]
    pub fn edge_target(&self, edge_index: usize) -> u32 {
        self.edges[edge_index + self.layout.edge.to_node_offset]
            / self.layout.node.field_count as u32
    }

    /// Weak or shortcut edge.
    #[inline]
    pub fn is_non_owning_edge(&self, edge_index: usize) -> bool {
        self.layout.edge.is_non_owning(self.edge_type(edge_index))
    }

    // --- retainers ----------------------------------------------------------------

    /// Retainer slots of `ordinal`; see [`RetainerIndex`].
    #[inline]
    pub fn retainer_slots(&self, ordinal: u32) -> Range<usize> {
        self.retainers.range(ordinal)
    }

    #[inline]
    pub fn retaining_node(&self, slot: usize) -> u32 {
        self.retainers.retaining_nodes[slot]
    }

    #[inline]
    pub fn retaining_edge(&self, slot: usize) -> usize {
        self.retainers.retaining_edges[slot] as usize
    }

    /// True when every retainer reaches `ordinal` through a weak or shortcut edge.
    pub fn has_only_weak_retainers(&self, ordinal: u32) -> bool {
        self.retainer_slots(ordinal)
            .all(|slot| self.is_non_owning_edge(self.retaining_edge(slot)))
    }

    /// Direct children of the root, in edge order.
    pub fn root_children(&self) -> impl Iterator<Item = u32> + '_ {
        self.edges_of(self.root_ordinal)
            .map(|e| self.edge_target(e))
    }
}
