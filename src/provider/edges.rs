//! Paged view over a node's outgoing edges or its retainers.

use std::cmp::Ordering;

use super::comparator::{ComparatorConfig, EdgeComparatorKind, compare_edge_names, compare_node_field};
use super::IterationOrder;
use crate::format::SnapshotFormat;
use crate::records::{Edge, ItemsRange};
use crate::snapshot::HeapSnapshot;
use crate::snapshot_error::SnapshotError;

/// Which side of the edges a provider lists.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EdgesProviderKind {
    /// Outgoing edges; items are raw edge offsets, the shown node is the target.
    Containment,
    /// Incoming edges; items are retainer slots, the shown node is the retainer.
    Retaining,
}

pub struct EdgesProvider<'s, F: SnapshotFormat> {
    snapshot: &'s HeapSnapshot<F>,
    kind: EdgesProviderKind,
    order: IterationOrder,
    comparator: Option<ComparatorConfig>,
}

impl<'s, F: SnapshotFormat> EdgesProvider<'s, F> {
    /// Edges of `ordinal` that pass the format's filter for `kind`.
    pub fn new(snapshot: &'s HeapSnapshot<F>, kind: EdgesProviderKind, ordinal: u32) -> Self {
        let graph = snapshot.graph();
        let format = snapshot.format();
        let items: Vec<usize> = match kind {
            EdgesProviderKind::Containment => graph
                .edges_of(ordinal)
                .filter(|&e| format.containment_edge_filter(graph, e))
                .collect(),
            EdgesProviderKind::Retaining => graph
                .retainer_slots(ordinal)
                .filter(|&slot| {
                    format.retaining_edge_filter(graph, graph.retaining_node(slot), graph.retaining_edge(slot))
                })
                .collect(),
        };
        Self {
            snapshot,
            kind,
            order: IterationOrder::new(items),
            comparator: None,
        }
    }

    pub fn kind(&self) -> EdgesProviderKind {
        self.kind
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn sort_and_rewind(&mut self, comparator: ComparatorConfig) {
        self.comparator = Some(comparator);
        self.order.rewind();
    }

    /// `(raw edge offset, shown node)` of an item.
    fn resolve(snapshot: &HeapSnapshot<F>, kind: EdgesProviderKind, item: usize) -> (usize, u32) {
        let graph = snapshot.graph();
        match kind {
            EdgesProviderKind::Containment => (item, graph.edge_target(item)),
            EdgesProviderKind::Retaining => (graph.retaining_edge(item), graph.retaining_node(item)),
        }
    }

    fn compare(
        snapshot: &HeapSnapshot<F>,
        kind: EdgesProviderKind,
        c: &ComparatorConfig,
        a: usize,
        b: usize,
    ) -> Ordering {
        let (edge_a, node_a) = Self::resolve(snapshot, kind, a);
        let (edge_b, node_b) = Self::resolve(snapshot, kind, b);
        let graph = snapshot.graph();
        let format = snapshot.format();
        let names = |ascending| {
            compare_edge_names(
                &format.edge_name(graph, edge_a),
                &format.edge_name(graph, edge_b),
                ascending,
            )
        };
        let nodes = |field, ascending| compare_node_field(snapshot, field, ascending, node_a, node_b);
        let ord = match EdgeComparatorKind::from(c) {
            EdgeComparatorKind::EdgeAndNode => {
                names(c.ascending1).then_with(|| nodes(c.field2, c.ascending2))
            }
            EdgeComparatorKind::NodeAndEdge => {
                nodes(c.field1, c.ascending1).then_with(|| names(c.ascending2))
            }
            EdgeComparatorKind::NodeAndNode => {
                nodes(c.field1, c.ascending1).then_with(|| nodes(c.field2, c.ascending2))
            }
        };
        ord.then(a.cmp(&b))
    }

    /// Serialize the edges at positions `[begin, end)` of the sorted order.
    ///
    /// # Errors
    /// [`SnapshotError::InvalidRange`] when `begin > end`.
    pub fn serialize_items_range(&mut self, begin: usize, end: usize) -> Result<ItemsRange<Edge>, SnapshotError> {
        let snapshot = self.snapshot;
        let kind = self.kind;
        let cmp = self
            .comparator
            .map(|c| move |a: &usize, b: &usize| Self::compare(snapshot, kind, &c, *a, *b));
        let window = self.order.prepare(begin, end, cmp)?;
        let graph = snapshot.graph();
        let items = self.order.items()[window.range.clone()]
            .iter()
            .map(|&item| {
                let (edge_index, shown) = Self::resolve(snapshot, kind, item);
                Edge {
                    name: snapshot.format().edge_name(graph, edge_index),
                    node: snapshot.serialize_node(shown),
                    edge_type: graph.edge_type_name(edge_index).to_owned(),
                    edge_index,
                }
            })
            .collect();
        Ok(ItemsRange {
            start_position: window.range.start,
            end_position: window.range.end,
            total_length: self.order.len(),
            clamped: window.clamped,
            items,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::{EdgeType, NodeType, SnapshotBuilder};
    use crate::format::GenericFormat;
    use crate::progress::NoProgress;
    use crate::provider::SortField;
    use crate::records::EdgeName;

    fn snapshot() -> HeapSnapshot<GenericFormat> {
        let mut b = SnapshotBuilder::new();
        let root = b.add_node(NodeType::Synthetic, "", 1, 0);
        let obj = b.add_node(NodeType::Object, "Obj", 3, 10);
        let p = b.add_node(NodeType::Object, "Proto", 5, 20);
        let x = b.add_node(NodeType::Object, "X", 7, 30);
        let y = b.add_node(NodeType::Object, "Y", 9, 40);
        b.add_edge(root, EdgeType::Property, "obj", obj);
        b.add_edge(obj, EdgeType::Property, "__proto__", p);
        b.add_indexed_edge(obj, EdgeType::Element, 1, x);
        b.add_edge(obj, EdgeType::Property, "b", y);
        b.add_edge(obj, EdgeType::Property, "a", x);
        b.add_edge(y, EdgeType::Property, "back", x);
        HeapSnapshot::build(b.build(), GenericFormat, &NoProgress).unwrap()
    }

    #[test]
    fn containment_sorted_by_edge_name() {
        let s = snapshot();
        let mut p = EdgesProvider::new(&s, EdgesProviderKind::Containment, 1);
        assert_eq!(p.len(), 4);
        p.sort_and_rewind(ComparatorConfig::new(SortField::EdgeName, true, SortField::Id, true));
        let page = p.serialize_items_range(0, 4).unwrap();
        let names: Vec<_> = page.items.iter().map(|e| e.name.clone()).collect();
        assert_eq!(
            names,
            vec![
                EdgeName::Name("a".into()),
                EdgeName::Name("b".into()),
                EdgeName::Index(1),
                EdgeName::Name("__proto__".into()),
            ]
        );
        assert_eq!(page.items[0].node.name, "X");
        assert_eq!(page.items[0].edge_type, "property");
    }

    #[test]
    fn retainers_show_the_retaining_node() {
        let s = snapshot();
        let mut p = EdgesProvider::new(&s, EdgesProviderKind::Retaining, 3);
        p.sort_and_rewind(ComparatorConfig::new(SortField::SelfSize, false, SortField::EdgeName, true));
        let page = p.serialize_items_range(0, 3).unwrap();
        let shown: Vec<_> = page.items.iter().map(|e| (e.node.name.as_str(), e.name.to_string())).collect();
        assert_eq!(shown, vec![("Y", "back".into()), ("Obj", "a".into()), ("Obj", "1".into())]);
        assert!(!page.clamped);
    }
}
