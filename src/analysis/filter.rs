//! Node filters accepted by aggregate, search and provider queries.
//!
//! A [`NodeFilter`] is what the consumer sends; its [`FilterKey`] is the
//! canonical form used to memoize results, and [`ResolvedFilter`] is the
//! predicate actually evaluated per node.

use hashbrown::HashSet;
use serde::{Deserialize, Serialize};

use crate::graph::SnapshotGraph;

/// Consumer-side node filter.
///
/// With `allocation_node_id` set, the id range is ignored. With neither an id
/// range nor an allocation node, every node passes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeFilter {
    #[serde(default)]
    pub min_node_id: Option<u32>,
    #[serde(default)]
    pub max_node_id: Option<u32>,
    #[serde(default)]
    pub allocation_node_id: Option<u32>,
}

impl NodeFilter {
    /// Accept every node.
    pub fn all() -> Self {
        Self::default()
    }

    /// Accept nodes with `min < id <= max`.
    pub fn id_range(min: u32, max: u32) -> Self {
        Self {
            min_node_id: Some(min),
            max_node_id: Some(max),
            allocation_node_id: None,
        }
    }

    /// Accept nodes allocated under a bottom-up allocation node.
    pub fn allocation_site(allocation_node_id: u32) -> Self {
        Self {
            min_node_id: None,
            max_node_id: None,
            allocation_node_id: Some(allocation_node_id),
        }
    }

    pub fn key(&self) -> FilterKey {
        if let Some(id) = self.allocation_node_id {
            return FilterKey::AllocationSite(id);
        }
        match (self.min_node_id, self.max_node_id) {
            (None, None) => FilterKey::AllObjects,
            (min, max) => FilterKey::NodeIdRange {
                min: min.unwrap_or(0),
                max: max.unwrap_or(u32::MAX),
            },
        }
    }
}

/// Canonical memoization key of a [`NodeFilter`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FilterKey {
    AllObjects,
    NodeIdRange { min: u32, max: u32 },
    AllocationSite(u32),
}

/// Predicate form of a filter, ready to evaluate against a graph.
#[derive(Clone, Debug)]
pub enum ResolvedFilter {
    All,
    IdRange { min: u32, max: u32 },
    TraceNodes(HashSet<u32>),
}

impl ResolvedFilter {
    /// Filter on the trace node ids of an allocation site.
    pub fn from_trace_ids(ids: impl IntoIterator<Item = u32>) -> Self {
        ResolvedFilter::TraceNodes(ids.into_iter().collect())
    }

    #[inline]
    pub fn matches(&self, graph: &SnapshotGraph, ordinal: u32) -> bool {
        match self {
            ResolvedFilter::All => true,
            ResolvedFilter::IdRange { min, max } => {
                let id = graph.node_id(ordinal);
                *min < id && id <= *max
            }
            ResolvedFilter::TraceNodes(ids) => ids.contains(&graph.trace_node_id(ordinal)),
        }
    }

    pub fn is_all(&self) -> bool {
        matches!(self, ResolvedFilter::All)
    }
}
