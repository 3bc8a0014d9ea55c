//! Two-key sort orders for item providers.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::format::SnapshotFormat;
use crate::records::EdgeName;
use crate::snapshot::HeapSnapshot;

/// Field a provider can sort by. Node fields read the listed node (for edge
/// providers: the node shown next to the edge).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SortField {
    #[serde(rename = "id")]
    Id,
    #[serde(rename = "name")]
    Name,
    #[serde(rename = "distance")]
    Distance,
    #[serde(rename = "selfSize")]
    SelfSize,
    #[serde(rename = "retainedSize")]
    RetainedSize,
    /// Name of the edge itself; edge providers only.
    #[serde(rename = "!edgeName")]
    EdgeName,
}

impl SortField {
    pub fn as_str(self) -> &'static str {
        match self {
            SortField::Id => "id",
            SortField::Name => "name",
            SortField::Distance => "distance",
            SortField::SelfSize => "selfSize",
            SortField::RetainedSize => "retainedSize",
            SortField::EdgeName => "!edgeName",
        }
    }
}

/// Primary and secondary sort keys, each with its own direction. Remaining
/// ties break on the item's position in the underlying buffer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComparatorConfig {
    #[serde(rename = "fieldName1")]
    pub field1: SortField,
    pub ascending1: bool,
    #[serde(rename = "fieldName2")]
    pub field2: SortField,
    pub ascending2: bool,
}

impl ComparatorConfig {
    pub fn new(field1: SortField, ascending1: bool, field2: SortField, ascending2: bool) -> Self {
        Self {
            field1,
            ascending1,
            field2,
            ascending2,
        }
    }

    pub fn uses_edge_name(&self) -> bool {
        self.field1 == SortField::EdgeName || self.field2 == SortField::EdgeName
    }
}

/// How an edge comparator combines edge names with node fields.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EdgeComparatorKind {
    EdgeAndNode,
    NodeAndEdge,
    NodeAndNode,
}

impl From<&ComparatorConfig> for EdgeComparatorKind {
    fn from(c: &ComparatorConfig) -> Self {
        if c.field1 == SortField::EdgeName {
            EdgeComparatorKind::EdgeAndNode
        } else if c.field2 == SortField::EdgeName {
            EdgeComparatorKind::NodeAndEdge
        } else {
            EdgeComparatorKind::NodeAndNode
        }
    }
}

#[inline]
fn directed(ord: Ordering, ascending: bool) -> Ordering {
    if ascending { ord } else { ord.reverse() }
}

/// Compare two nodes on a node field.
///
/// `SortField::EdgeName` has no node value and compares equal.
pub fn compare_node_field<F: SnapshotFormat>(
    snapshot: &HeapSnapshot<F>,
    field: SortField,
    ascending: bool,
    a: u32,
    b: u32,
) -> Ordering {
    let graph = snapshot.graph();
    let ord = match field {
        SortField::Id => graph.node_id(a).cmp(&graph.node_id(b)),
        SortField::Name => {
            let format = snapshot.format();
            format.node_name(graph, a).cmp(&format.node_name(graph, b))
        }
        SortField::Distance => snapshot.distances()[a as usize].cmp(&snapshot.distances()[b as usize]),
        SortField::SelfSize => graph.self_size(a).cmp(&graph.self_size(b)),
        SortField::RetainedSize => {
            let r = snapshot.retained_sizes();
            r[a as usize].total_cmp(&r[b as usize])
        }
        SortField::EdgeName => Ordering::Equal,
    };
    directed(ord, ascending)
}

/// Compare edge names: `__proto__` always last regardless of direction,
/// string names before indexes, indexes numerically.
pub fn compare_edge_names(a: &EdgeName, b: &EdgeName, ascending: bool) -> Ordering {
    let is_proto = |n: &EdgeName| matches!(n, EdgeName::Name(s) if s == "__proto__");
    match (is_proto(a), is_proto(b)) {
        (true, true) => return Ordering::Equal,
        (true, false) => return Ordering::Greater,
        (false, true) => return Ordering::Less,
        (false, false) => {}
    }
    let ord = match (a, b) {
        (EdgeName::Name(x), EdgeName::Name(y)) => x.cmp(y),
        (EdgeName::Index(x), EdgeName::Index(y)) => x.cmp(y),
        (EdgeName::Name(_), EdgeName::Index(_)) => Ordering::Less,
        (EdgeName::Index(_), EdgeName::Name(_)) => Ordering::Greater,
    };
    directed(ord, ascending)
}
