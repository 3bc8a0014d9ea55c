#![cfg_attr(docsrs, feature(doc_cfg))]
//! # heap-snapshot
//!
//! heap-snapshot is the analysis engine behind a heap-snapshot viewer. It takes
//! the flat node and edge buffers a profiler writes, together with their
//! self-describing schema, and derives everything a memory panel needs:
//! retainers, distances from the roots, the dominator tree, retained sizes,
//! per-class aggregates, diffs against an earlier snapshot, name search and
//! allocation-site breakdowns.
//!
//! ## Features
//! - Schema-driven field offsets; no record layout is hard-coded
//! - Two-pass distances, orphan-repairing postorder and an iterative
//!   dominator fixed point
//! - Pluggable [`format::SnapshotFormat`] hooks for producer-specific rules
//!   ([`format::V8Format`], [`format::GenericFormat`])
//! - Memoized aggregates and diffs, paged sorting providers
//! - Invariant self-checks in debug builds and behind the `check-invariants`
//!   and `strict-invariants` features
//!
//! ## Usage
//! ```no_run
//! use heap_snapshot::prelude::*;
//!
//! # fn main() -> Result<(), SnapshotError> {
//! let text = std::fs::read_to_string("page.heapsnapshot").map_err(|e| SnapshotError::Json(e.to_string()))?;
//! let raw = RawSnapshot::from_json_str(&text)?;
//! let snapshot = HeapSnapshot::build(raw, V8Format::default(), &LogProgress)?;
//! let classes = snapshot.aggregates(true, &NodeFilter::all())?;
//! for (name, agg) in classes.iter() {
//!     println!("{name}: {} objects, {} bytes retained", agg.count, agg.max_ret);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Threading
//! A built [`HeapSnapshot`] is `Send + Sync`. Queries take `&self`; the memo
//! caches sit behind `parking_lot` mutexes and `once_cell` cells.

pub mod analysis;
pub mod builder;
pub mod debug_invariants;
pub mod format;
pub mod graph;
pub mod loader;
pub mod progress;
pub mod provider;
pub mod records;
pub mod schema;
pub mod snapshot;
pub mod snapshot_error;

pub use debug_invariants::DebugInvariants;
pub use snapshot::HeapSnapshot;
pub use snapshot_error::SnapshotError;

/// A convenient prelude to import the most-used traits & types:
pub mod prelude {
    pub use crate::analysis::{ClassAggregates, NodeFilter, SearchConfig};
    pub use crate::debug_invariants::DebugInvariants;
    pub use crate::format::{GenericFormat, SnapshotFormat, V8Format};
    pub use crate::loader::RawSnapshot;
    pub use crate::progress::{LogProgress, NoProgress, Progress};
    pub use crate::provider::{ComparatorConfig, EdgesProvider, NodesProvider, SortField};
    pub use crate::records::{Aggregate, Diff, Edge, EdgeName, ItemsRange, Node};
    pub use crate::snapshot::{AggregatesForDiff, HeapSnapshot};
    pub use crate::snapshot_error::SnapshotError;
}
