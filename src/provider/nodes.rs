//! Paged view over a list of nodes.

use std::cmp::Ordering;

use super::comparator::{ComparatorConfig, SortField, compare_node_field};
use super::IterationOrder;
use crate::format::SnapshotFormat;
use crate::records::{ItemsRange, Node};
use crate::snapshot::HeapSnapshot;
use crate::snapshot_error::SnapshotError;

/// Nodes of one class, one diff side, or any other node list.
///
/// Items are node ordinals.
pub struct NodesProvider<'s, F: SnapshotFormat> {
    snapshot: &'s HeapSnapshot<F>,
    order: IterationOrder,
    comparator: Option<ComparatorConfig>,
}

impl<'s, F: SnapshotFormat> NodesProvider<'s, F> {
    pub fn new(snapshot: &'s HeapSnapshot<F>, ordinals: impl IntoIterator<Item = u32>) -> Self {
        Self {
            snapshot,
            order: IterationOrder::new(ordinals.into_iter().map(|o| o as usize).collect()),
            comparator: None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Sort by `comparator` from now on.
    ///
    /// # Errors
    /// [`SnapshotError::UnsupportedComparator`] for edge-name fields.
    pub fn sort_and_rewind(&mut self, comparator: ComparatorConfig) -> Result<(), SnapshotError> {
        if comparator.uses_edge_name() {
            return Err(SnapshotError::UnsupportedComparator(SortField::EdgeName.as_str()));
        }
        self.comparator = Some(comparator);
        self.order.rewind();
        Ok(())
    }

    fn compare(snapshot: &HeapSnapshot<F>, c: &ComparatorConfig, a: usize, b: usize) -> Ordering {
        let (oa, ob) = (a as u32, b as u32);
        compare_node_field(snapshot, c.field1, c.ascending1, oa, ob)
            .then_with(|| compare_node_field(snapshot, c.field2, c.ascending2, oa, ob))
            .then(a.cmp(&b))
    }

    /// Serialize the nodes at positions `[begin, end)` of the sorted order.
    ///
    /// # Errors
    /// [`SnapshotError::InvalidRange`] when `begin > end`.
    pub fn serialize_items_range(&mut self, begin: usize, end: usize) -> Result<ItemsRange<Node>, SnapshotError> {
        let snapshot = self.snapshot;
        let cmp = self
            .comparator
            .map(|c| move |a: &usize, b: &usize| Self::compare(snapshot, &c, *a, *b));
        let window = self.order.prepare(begin, end, cmp)?;
        let items = self.order.items()[window.range.clone()]
            .iter()
            .map(|&o| snapshot.serialize_node(o as u32))
            .collect();
        Ok(ItemsRange {
            start_position: window.range.start,
            end_position: window.range.end,
            total_length: self.order.len(),
            clamped: window.clamped,
            items,
        })
    }

    /// Position the node with `id` would take in the fully sorted order, or
    /// `None` if it is not listed.
    pub fn node_position(&self, id: u32) -> Option<usize> {
        let graph = self.snapshot.graph();
        let target = *self
            .order
            .items()
            .iter()
            .find(|&&o| graph.node_id(o as u32) == id)?;
        let Some(c) = &self.comparator else {
            return self.order.items().iter().position(|&o| o == target);
        };
        Some(
            self.order
                .items()
                .iter()
                .filter(|&&o| Self::compare(self.snapshot, c, o, target) == Ordering::Less)
                .count(),
        )
    }
}
