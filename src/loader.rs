//! Ingestion of serialized `.heapsnapshot` documents.
//!
//! A [`RawSnapshot`] owns the flat buffers exactly as the profiler wrote them.
//! Structural validation (record widths, declared counts, edge targets) happens
//! when the buffers are turned into a [`crate::graph::SnapshotGraph`].

use std::io::Read;

use serde::{Deserialize, Serialize};

use crate::schema::SnapshotHeader;
use crate::snapshot_error::SnapshotError;

/// Fully materialized snapshot buffers.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RawSnapshot {
    pub snapshot: SnapshotHeader,
    pub nodes: Vec<u32>,
    pub edges: Vec<u32>,
    #[serde(default)]
    pub trace_function_infos: Vec<u32>,
    /// Nested `[id, function_info_index, count, size, [children...]]` arrays.
    #[serde(default)]
    pub trace_tree: serde_json::Value,
    #[serde(default)]
    pub samples: Vec<u64>,
    pub strings: Vec<String>,
}

impl RawSnapshot {
    /// Parse a snapshot from its JSON text.
    pub fn from_json_str(s: &str) -> Result<Self, SnapshotError> {
        Ok(serde_json::from_str(s)?)
    }

    /// Parse a snapshot from a reader, e.g. a buffered file.
    pub fn from_reader<R: Read>(reader: R) -> Result<Self, SnapshotError> {
        Ok(serde_json::from_reader(reader)?)
    }

    /// Serialize back to the JSON wire format.
    pub fn to_json_string(&self) -> Result<String, SnapshotError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Raw offset of the root node record.
    pub fn root_index(&self) -> usize {
        self.snapshot.root_index.unwrap_or(0)
    }
}
