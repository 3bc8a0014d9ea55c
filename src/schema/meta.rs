//! Serde model of the snapshot `meta` block.
//!
//! The meta block names every field of a node or edge record, in buffer order,
//! and carries the enumeration of type tags for the `type` fields. Nothing in the
//! engine hard-codes an offset; [`super::layout::SnapshotLayout`] resolves them
//! from this description.

use serde::{Deserialize, Serialize};

/// Description of one record field's value domain.
///
/// For `type` fields this is the list of tag names; other fields carry a plain
/// descriptor such as `"string"` or `"number"`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldTypes {
    Enum(Vec<String>),
    Scalar(String),
}

impl FieldTypes {
    /// Tag names when this descriptor is an enumeration.
    pub fn as_enum(&self) -> Option<&[String]> {
        match self {
            FieldTypes::Enum(v) => Some(v),
            FieldTypes::Scalar(_) => None,
        }
    }
}

/// Field layout metadata for node, edge, trace and sample records.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotMeta {
    pub node_fields: Vec<String>,
    pub node_types: Vec<FieldTypes>,
    pub edge_fields: Vec<String>,
    pub edge_types: Vec<FieldTypes>,
    #[serde(default)]
    pub trace_function_info_fields: Vec<String>,
    #[serde(default)]
    pub trace_node_fields: Vec<String>,
    #[serde(default)]
    pub sample_fields: Vec<String>,
}

fn strings(names: &[&str]) -> Vec<String> {
    names.iter().map(|s| (*s).to_owned()).collect()
}

impl SnapshotMeta {
    /// The layout emitted by current V8 heap profilers.
    pub fn v8() -> Self {
        Self {
            node_fields: strings(&[
                "type",
                "name",
                "id",
                "self_size",
                "edge_count",
                "trace_node_id",
            ]),
            node_types: vec![
                FieldTypes::Enum(strings(&[
                    "hidden",
                    "array",
                    "string",
                    "object",
                    "code",
                    "closure",
                    "regexp",
                    "number",
                    "native",
                    "synthetic",
                    "concatenated string",
                    "sliced string",
                ])),
                FieldTypes::Scalar("string".into()),
                FieldTypes::Scalar("number".into()),
                FieldTypes::Scalar("number".into()),
                FieldTypes::Scalar("number".into()),
                FieldTypes::Scalar("number".into()),
            ],
            edge_fields: strings(&["type", "name_or_index", "to_node"]),
            edge_types: vec![
                FieldTypes::Enum(strings(&[
                    "context", "element", "property", "internal", "hidden", "shortcut", "weak",
                ])),
                FieldTypes::Scalar("string_or_number".into()),
                FieldTypes::Scalar("node".into()),
            ],
            trace_function_info_fields: strings(&[
                "function_id",
                "name",
                "script_name",
                "script_id",
                "line",
                "column",
            ]),
            trace_node_fields: strings(&["id", "function_info_index", "count", "size", "children"]),
            sample_fields: strings(&["timestamp_us", "last_assigned_id"]),
        }
    }
}

/// The `snapshot` header object of a serialized heap snapshot.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotHeader {
    #[serde(default)]
    pub title: String,
    pub meta: SnapshotMeta,
    #[serde(default)]
    pub node_count: usize,
    #[serde(default)]
    pub edge_count: usize,
    #[serde(default)]
    pub trace_function_count: usize,
    #[serde(default)]
    pub root_index: Option<usize>,
}
