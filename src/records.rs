//! Plain serializable output records handed to consumers.
//!
//! Field names serialize in camelCase, matching the JSON shape UI panels
//! already consume.

use serde::{Deserialize, Serialize};

/// Name of an edge: a string, or an index for element-like edges.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EdgeName {
    Index(u32),
    Name(String),
}

impl EdgeName {
    pub fn is_string(&self) -> bool {
        matches!(self, EdgeName::Name(_))
    }
}

impl std::fmt::Display for EdgeName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EdgeName::Index(i) => write!(f, "{i}"),
            EdgeName::Name(s) => f.write_str(s),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    pub id: u32,
    pub name: String,
    pub distance: i32,
    /// Raw offset of the node record in the node buffer.
    pub node_index: usize,
    pub retained_size: f64,
    pub self_size: u32,
    #[serde(rename = "type")]
    pub node_type: String,
    pub can_be_queried: bool,
    pub detached_dom_tree_node: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Edge {
    pub name: EdgeName,
    pub node: Node,
    #[serde(rename = "type")]
    pub edge_type: String,
    /// Raw offset of the edge record in the edge buffer.
    pub edge_index: usize,
}

/// Per-class summary.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Aggregate {
    pub count: u32,
    /// Minimum distance over the class members.
    pub distance: i32,
    /// Total self size.
    #[serde(rename = "self")]
    pub self_size: f64,
    /// Retained size of the class, each dominator subtree counted once.
    pub max_ret: f64,
    #[serde(rename = "type")]
    pub node_type: String,
    /// Set for classes whose identity is the node name.
    pub name: Option<String>,
    /// Raw node offsets of the members.
    pub idxs: Vec<usize>,
}

/// Per-class member lists sorted by id, the baseline side of a diff.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregateForDiff {
    pub indexes: Vec<usize>,
    pub ids: Vec<u32>,
    pub self_sizes: Vec<u32>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Diff {
    pub added_count: u32,
    pub removed_count: u32,
    pub added_size: u64,
    pub removed_size: u64,
    /// Raw node offsets in the *baseline* snapshot.
    pub deleted_indexes: Vec<usize>,
    /// Raw node offsets in the current snapshot.
    pub added_indexes: Vec<usize>,
    pub count_delta: i64,
    pub size_delta: i64,
}

/// One page of a provider's items.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemsRange<T> {
    pub start_position: usize,
    pub end_position: usize,
    pub total_length: usize,
    /// `true` when the requested end was past the last item and was clamped.
    pub clamped: bool,
    pub items: Vec<T>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StaticData {
    pub node_count: usize,
    pub root_node_index: usize,
    pub total_size: f64,
    #[serde(rename = "maxJSObjectId")]
    pub max_js_object_id: u32,
}

/// Heap composition by category.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Statistics {
    pub total: f64,
    pub v8heap: f64,
    pub native: f64,
    pub code: f64,
    pub js_arrays: f64,
    pub strings: f64,
    pub system: f64,
}

/// Allocation-timeline samples with the live size allocated in each interval.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Samples {
    /// Milliseconds.
    pub timestamps: Vec<f64>,
    pub last_assigned_ids: Vec<u64>,
    pub size_for_range: Vec<u64>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AllocationStackFrame {
    pub function_name: String,
    pub script_name: String,
    pub script_id: u32,
    pub line: u32,
    pub column: u32,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SerializedAllocationNode {
    pub id: u32,
    pub name: String,
    pub script_name: String,
    pub script_id: u32,
    pub line: u32,
    pub column: u32,
    pub count: u64,
    pub size: u64,
    pub live_count: u64,
    pub live_size: u64,
    pub has_children: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AllocationNodeCallers {
    pub nodes_with_single_caller: Vec<SerializedAllocationNode>,
    pub branching_callers: Vec<SerializedAllocationNode>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn edge_names_serialize_untagged() {
        let e = serde_json::to_string(&EdgeName::Index(3)).unwrap();
        assert_eq!(e, "3");
        let s = serde_json::to_string(&EdgeName::Name("x".into())).unwrap();
        assert_eq!(s, "\"x\"");
    }

    #[test]
    fn aggregate_uses_wire_names() {
        let a = Aggregate {
            count: 1,
            distance: 2,
            self_size: 3.0,
            max_ret: 4.0,
            node_type: "object".into(),
            name: Some("Foo".into()),
            idxs: vec![6],
        };
        let v = serde_json::to_value(&a).unwrap();
        assert_eq!(v["self"], 3.0);
        assert_eq!(v["maxRet"], 4.0);
        assert_eq!(v["type"], "object");
    }
}
