//! SnapshotError: Unified error type for heap-snapshot public APIs
//!
//! Corrupt-input variants abort construction; the remaining variants are
//! query-time failures reported back to the caller.

use thiserror::Error;

/// Unified error type for heap-snapshot operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SnapshotError {
    /// The schema metadata does not name a field the engine requires.
    #[error("Schema error: {record} fields do not contain `{field}`")]
    MissingField {
        record: &'static str,
        field: &'static str,
    },
    /// The schema metadata does not carry an enumeration for a type field.
    #[error("Schema error: {0} type enumeration is missing")]
    MissingTypeEnum(&'static str),
    /// The node buffer length is not a multiple of the node record width.
    #[error("Corrupt snapshot: node buffer length {len} is not a multiple of {field_count}")]
    NodeBufferMisaligned { len: usize, field_count: usize },
    /// The edge buffer length is not a multiple of the edge record width.
    #[error("Corrupt snapshot: edge buffer length {len} is not a multiple of {field_count}")]
    EdgeBufferMisaligned { len: usize, field_count: usize },
    /// The header declared a different number of nodes than the buffer holds.
    #[error("Corrupt snapshot: header declares {declared} nodes, buffer holds {found}")]
    NodeCountMismatch { declared: usize, found: usize },
    /// Per-node edge counts do not add up to the edge buffer length.
    #[error("Corrupt snapshot: node edge counts cover {declared} edges, buffer holds {found}")]
    EdgeCountMismatch { declared: usize, found: usize },
    /// An edge points into the middle of a node record.
    #[error("Corrupt snapshot: edge {edge_index} targets misaligned node offset {to_node}")]
    MisalignedEdgeTarget { edge_index: usize, to_node: u32 },
    /// An edge points past the end of the node buffer.
    #[error("Corrupt snapshot: edge {edge_index} targets node offset {to_node} past the end")]
    EdgeTargetOutOfRange { edge_index: usize, to_node: u32 },
    /// The root index is misaligned or out of range.
    #[error("Corrupt snapshot: invalid root node index {0}")]
    InvalidRootIndex(usize),
    /// A snapshot must contain at least the root node.
    #[error("Corrupt snapshot: no nodes")]
    EmptySnapshot,
    /// The snapshot JSON could not be decoded.
    #[error("Snapshot JSON error: {0}")]
    Json(String),
    /// The allocation trace tree does not match `trace_node_fields`.
    #[error("Corrupt snapshot: malformed allocation trace tree ({0})")]
    MalformedTraceTree(String),
    /// A derived structure violates one of its invariants.
    #[error("Invariant violation: {0}")]
    InvariantViolation(String),
    /// A paging window with `begin > end`.
    #[error("Invalid range: start position {begin} > end position {end}")]
    InvalidRange { begin: usize, end: usize },
    /// No aggregate or diff entry for the requested class.
    #[error("Unknown class `{0}`")]
    UnknownClass(String),
    /// No diff has been calculated against this base snapshot.
    #[error("No diff calculated against base snapshot `{0}`")]
    UnknownBaseSnapshot(String),
    /// A node index that is misaligned or out of range.
    #[error("Unknown node index {0}")]
    UnknownNodeIndex(usize),
    /// The search query could not be compiled.
    #[error("Invalid search query: {0}")]
    InvalidSearchQuery(String),
    /// The comparator names a field the provider cannot sort by.
    #[error("Unsupported comparator field `{0}`")]
    UnsupportedComparator(&'static str),
    /// The allocation-site id is unknown or the snapshot has no allocation traces.
    #[error("Unknown allocation node {0}")]
    UnknownAllocationNode(u32),
}

impl From<serde_json::Error> for SnapshotError {
    fn from(e: serde_json::Error) -> Self {
        SnapshotError::Json(e.to_string())
    }
}
