//! `HeapSnapshot`: the build pipeline and the query surface.
//!
//! [`HeapSnapshot::build`] runs every derivation stage to completion; after
//! that the snapshot is read-only except for its memo caches. Each cache is
//! owned by the instance, so dropping the snapshot drops everything derived
//! from it.
//!
//! Stages, in order:
//! 1. edge and retainer indices ([`crate::graph::SnapshotGraph::from_parts`])
//! 2. format flags
//! 3. distances
//! 4. postorder (with orphan repair)
//! 5. dominators
//! 6. retained sizes
//! 7. dominated-node index
//! 8. samples and allocation profile, when present

use std::sync::Arc;

use hashbrown::HashMap;
use once_cell::sync::OnceCell;
use parking_lot::Mutex;

use crate::analysis::aggregates::{self, ClassAggregates};
use crate::analysis::allocation::AllocationProfile;
use crate::analysis::diff;
use crate::analysis::filter::{FilterKey, NodeFilter, ResolvedFilter};
use crate::analysis::samples::build_samples;
use crate::analysis::search::{self, SearchConfig};
use crate::debug_invariants::DebugInvariants;
use crate::format::{SnapshotFormat, V8Format};
use crate::graph::distances::calculate_distances;
use crate::graph::dominators::build_dominators;
use crate::graph::postorder::{Postorder, ProblemReport, build_postorder};
use crate::graph::retained::{DominatedIndex, build_dominated_index, calculate_retained_sizes};
use crate::graph::{PageOwnership, SnapshotGraph};
use crate::loader::RawSnapshot;
use crate::progress::{NoProgress, Progress};
use crate::provider::{EdgesProvider, EdgesProviderKind, NodesProvider};
use crate::records::{
    AggregateForDiff, AllocationNodeCallers, AllocationStackFrame, Diff, Node, Samples,
    SerializedAllocationNode, StaticData, Statistics,
};
use crate::snapshot_error::SnapshotError;

/// Baseline aggregates of another snapshot, keyed by class name.
pub type AggregatesForDiff = HashMap<String, AggregateForDiff>;

/// Per-class diffs against one baseline, keyed by class name.
pub type SnapshotDiff = HashMap<String, Diff>;

struct AggregatesEntry {
    aggregates: Arc<ClassAggregates>,
    sorted: bool,
}

fn stage(progress: &dyn Progress, status: &str) {
    log::debug!("{status}");
    progress.update_status(status);
}

/// A fully processed heap snapshot.
pub struct HeapSnapshot<F: SnapshotFormat = V8Format> {
    graph: SnapshotGraph,
    format: F,
    flags: Vec<u32>,
    distances: Vec<i32>,
    postorder: Postorder,
    dominators: Vec<u32>,
    retained_sizes: Vec<f64>,
    dominated: DominatedIndex,
    diagnostics: Vec<ProblemReport>,
    samples: Option<Samples>,
    allocation_profile: Option<AllocationProfile>,
    statistics: OnceCell<Statistics>,
    aggregates: Mutex<HashMap<FilterKey, AggregatesEntry>>,
    aggregates_for_diff: OnceCell<Arc<AggregatesForDiff>>,
    snapshot_diffs: Mutex<HashMap<String, Arc<SnapshotDiff>>>,
}

static_assertions::assert_impl_all!(HeapSnapshot<V8Format>: Send, Sync);

impl<F: SnapshotFormat> HeapSnapshot<F> {
    /// Run the whole pipeline over `raw`.
    ///
    /// # Errors
    /// Any corrupt-input variant of [`SnapshotError`]. Graph-quality problems
    /// are not errors; see [`Self::diagnostics`].
    pub fn build(raw: RawSnapshot, format: F, progress: &dyn Progress) -> Result<Self, SnapshotError> {
        let RawSnapshot {
            snapshot: header,
            nodes,
            edges,
            trace_function_infos,
            trace_tree,
            samples: raw_samples,
            strings,
        } = raw;

        stage(progress, "Building edge indexes…");
        let graph = SnapshotGraph::from_parts(&header, nodes, edges, strings)?;

        stage(progress, "Calculating node flags…");
        let flags = format.calculate_flags(&graph);
        let ownership = match format.user_objects_mask() {
            Some(mask) => PageOwnership::from_flags(&flags, mask),
            None => PageOwnership::everything(),
        };

        stage(progress, "Calculating distances…");
        let user_roots = format.roots(&graph, true);
        let all_roots = format.roots(&graph, false);
        let distances = calculate_distances(&graph, &user_roots, &all_roots, |from, edge| {
            format.distance_filter(&graph, from, edge)
        });

        stage(progress, "Building postorder index…");
        let (postorder, diagnostics) = build_postorder(&graph, &ownership, |o| {
            format!("{} @{}", format.node_name(&graph, o), graph.node_id(o))
        });

        stage(progress, "Building dominator tree…");
        let dominators = build_dominators(&graph, &postorder, &ownership);

        stage(progress, "Calculating retained sizes…");
        let retained_sizes = calculate_retained_sizes(&graph, &postorder, &dominators);

        stage(progress, "Building dominated nodes…");
        let dominated = build_dominated_index(&dominators, graph.root_ordinal);

        stage(progress, "Calculating samples…");
        let samples = build_samples(&graph, &raw_samples, graph.layout.sample.as_ref());

        let allocation_profile = if header.trace_function_count > 0 {
            stage(progress, "Building allocation statistics…");
            Some(AllocationProfile::build(
                &graph,
                &header.meta,
                &trace_function_infos,
                &trace_tree,
            )?)
        } else {
            None
        };

        stage(progress, "Finished processing.");
        let snapshot = Self {
            graph,
            format,
            flags,
            distances,
            postorder,
            dominators,
            retained_sizes,
            dominated,
            diagnostics,
            samples,
            allocation_profile,
            statistics: OnceCell::new(),
            aggregates: Mutex::new(HashMap::new()),
            aggregates_for_diff: OnceCell::new(),
            snapshot_diffs: Mutex::new(HashMap::new()),
        };
        snapshot.debug_assert_invariants();
        Ok(snapshot)
    }

    /// [`Self::build`] without progress reporting.
    pub fn from_raw(raw: RawSnapshot, format: F) -> Result<Self, SnapshotError> {
        Self::build(raw, format, &NoProgress)
    }

    // --- derived data --------------------------------------------------------------

    pub fn graph(&self) -> &SnapshotGraph {
        &self.graph
    }

    pub fn format(&self) -> &F {
        &self.format
    }

    pub fn flags(&self) -> &[u32] {
        &self.flags
    }

    pub fn distances(&self) -> &[i32] {
        &self.distances
    }

    pub fn postorder(&self) -> &Postorder {
        &self.postorder
    }

    /// Immediate dominator of every node, as ordinals; the root maps to itself.
    pub fn dominators(&self) -> &[u32] {
        &self.dominators
    }

    pub fn retained_sizes(&self) -> &[f64] {
        &self.retained_sizes
    }

    pub fn dominated(&self) -> &DominatedIndex {
        &self.dominated
    }

    /// Page-ownership predicate in effect for this snapshot.
    pub fn ownership(&self) -> PageOwnership<'_> {
        match self.format.user_objects_mask() {
            Some(mask) => PageOwnership::from_flags(&self.flags, mask),
            None => PageOwnership::everything(),
        }
    }

    /// Graph-quality problems found while building, in the order they were logged.
    pub fn diagnostics(&self) -> &[ProblemReport] {
        &self.diagnostics
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count
    }

    /// Retained size of the root.
    pub fn total_size(&self) -> f64 {
        self.retained_sizes[self.graph.root_ordinal as usize]
    }

    /// Largest odd (JS object) id.
    pub fn max_js_object_id(&self) -> u32 {
        (0..self.graph.node_count as u32)
            .map(|o| self.graph.node_id(o))
            .filter(|id| id % 2 == 1)
            .max()
            .unwrap_or(0)
    }

    pub fn static_data(&self) -> StaticData {
        StaticData {
            node_count: self.graph.node_count,
            root_node_index: self.graph.node_index(self.graph.root_ordinal),
            total_size: self.total_size(),
            max_js_object_id: self.max_js_object_id(),
        }
    }

    pub fn statistics(&self) -> &Statistics {
        self.statistics.get_or_init(|| {
            self.format
                .calculate_statistics(&self.graph, &self.distances, self.total_size())
        })
    }

    pub fn samples(&self) -> Option<&Samples> {
        self.samples.as_ref()
    }

    // --- nodes ---------------------------------------------------------------------

    pub fn serialize_node(&self, ordinal: u32) -> Node {
        let g = &self.graph;
        Node {
            id: g.node_id(ordinal),
            name: self.format.node_name(g, ordinal).into_owned(),
            distance: self.distances[ordinal as usize],
            node_index: g.node_index(ordinal),
            retained_size: self.retained_sizes[ordinal as usize],
            self_size: g.self_size(ordinal),
            node_type: g.node_type_name(ordinal).to_owned(),
            can_be_queried: self.format.can_be_queried(&self.flags, ordinal),
            detached_dom_tree_node: self.format.is_detached_dom_tree_node(&self.flags, ordinal),
        }
    }

    fn ordinal_by_id(&self, id: u32) -> Option<u32> {
        (0..self.graph.node_count as u32).find(|&o| self.graph.node_id(o) == id)
    }

    pub fn node_by_id(&self, id: u32) -> Option<Node> {
        self.ordinal_by_id(id).map(|o| self.serialize_node(o))
    }

    pub fn node_class_name(&self, id: u32) -> Option<String> {
        self.ordinal_by_id(id)
            .map(|o| self.format.class_name(&self.graph, o).into_owned())
    }

    pub fn ids_of_objects_with_name(&self, name: &str) -> Vec<u32> {
        (0..self.graph.node_count as u32)
            .filter(|&o| self.format.node_name(&self.graph, o) == name)
            .map(|o| self.graph.node_id(o))
            .collect()
    }

    // --- filters, search and aggregates ------------------------------------------

    fn resolve_filter(&self, filter: &NodeFilter) -> Result<ResolvedFilter, SnapshotError> {
        Ok(match filter.key() {
            FilterKey::AllObjects => ResolvedFilter::All,
            FilterKey::NodeIdRange { min, max } => ResolvedFilter::IdRange { min, max },
            FilterKey::AllocationSite(id) => {
                let profile = self
                    .allocation_profile
                    .as_ref()
                    .ok_or(SnapshotError::UnknownAllocationNode(id))?;
                ResolvedFilter::from_trace_ids(profile.trace_ids(id)?)
            }
        })
    }

    /// Ids of nodes whose name matches `config`, restricted by `filter`.
    ///
    /// # Errors
    /// [`SnapshotError::InvalidSearchQuery`], or
    /// [`SnapshotError::UnknownAllocationNode`] for an unresolvable filter.
    pub fn search(&self, config: &SearchConfig, filter: &NodeFilter) -> Result<Vec<u32>, SnapshotError> {
        let resolved = self.resolve_filter(filter)?;
        search::search(&self.graph, config, &resolved)
    }

    /// Class aggregates under `filter`, memoized per filter. With
    /// `sorted_indexes` the member indexes are sorted by node id.
    ///
    /// # Errors
    /// [`SnapshotError::UnknownAllocationNode`] for an unresolvable filter.
    pub fn aggregates(&self, sorted_indexes: bool, filter: &NodeFilter) -> Result<Arc<ClassAggregates>, SnapshotError> {
        let key = filter.key();
        if let Some(hit) = self.cached_aggregates(key, sorted_indexes) {
            return Ok(hit);
        }
        let resolved = self.resolve_filter(filter)?;
        Ok(self.aggregates_for_key(key, &resolved, sorted_indexes))
    }

    /// Unsorted aggregates under `filter`.
    pub fn aggregates_with_filter(&self, filter: &NodeFilter) -> Result<Arc<ClassAggregates>, SnapshotError> {
        self.aggregates(false, filter)
    }

    fn cached_aggregates(&self, key: FilterKey, sorted: bool) -> Option<Arc<ClassAggregates>> {
        let cache = self.aggregates.lock();
        cache
            .get(&key)
            .filter(|entry| entry.sorted || !sorted)
            .map(|entry| Arc::clone(&entry.aggregates))
    }

    fn aggregates_for_key(&self, key: FilterKey, filter: &ResolvedFilter, sorted: bool) -> Arc<ClassAggregates> {
        let mut cache = self.aggregates.lock();
        if let Some(entry) = cache.get(&key) {
            if entry.sorted || !sorted {
                return Arc::clone(&entry.aggregates);
            }
        }
        let mut built = match cache.remove(&key) {
            Some(entry) => Arc::unwrap_or_clone(entry.aggregates),
            None => aggregates::build_aggregates(self, filter),
        };
        if sorted {
            aggregates::sort_indexes_by_id(self, &mut built);
        }
        let built = Arc::new(built);
        cache.insert(
            key,
            AggregatesEntry {
                aggregates: Arc::clone(&built),
                sorted,
            },
        );
        built
    }

    /// This snapshot's side of a later diff: per class, member indexes, ids
    /// and self sizes, sorted by id.
    pub fn aggregates_for_diff(&self) -> Arc<AggregatesForDiff> {
        Arc::clone(self.aggregates_for_diff.get_or_init(|| {
            let all = self.aggregates_for_key(FilterKey::AllObjects, &ResolvedFilter::All, true);
            Arc::new(diff::aggregates_for_diff(&self.graph, &all))
        }))
    }

    /// Diff this snapshot against a baseline, memoized per `base_snapshot_id`.
    pub fn calculate_snapshot_diff(&self, base_snapshot_id: &str, base: &AggregatesForDiff) -> Arc<SnapshotDiff> {
        if let Some(d) = self.snapshot_diffs.lock().get(base_snapshot_id) {
            return Arc::clone(d);
        }
        let current = self.aggregates_for_key(FilterKey::AllObjects, &ResolvedFilter::All, true);
        let computed = Arc::new(diff::calculate_snapshot_diff(&self.graph, base, &current));
        log::debug!(
            "diff against {base_snapshot_id}: {} classes changed",
            computed.len()
        );
        self.snapshot_diffs
            .lock()
            .entry(base_snapshot_id.to_owned())
            .or_insert(computed)
            .clone()
    }

    // --- providers -----------------------------------------------------------------

    /// Outgoing edges of the node at `node_index`.
    ///
    /// # Errors
    /// [`SnapshotError::UnknownNodeIndex`].
    pub fn create_edges_provider(&self, node_index: usize) -> Result<EdgesProvider<'_, F>, SnapshotError> {
        let ordinal = self.graph.ordinal_of(node_index)?;
        Ok(EdgesProvider::new(self, EdgesProviderKind::Containment, ordinal))
    }

    /// Retainers of the node at `node_index`.
    ///
    /// # Errors
    /// [`SnapshotError::UnknownNodeIndex`].
    pub fn create_retaining_edges_provider(&self, node_index: usize) -> Result<EdgesProvider<'_, F>, SnapshotError> {
        let ordinal = self.graph.ordinal_of(node_index)?;
        Ok(EdgesProvider::new(self, EdgesProviderKind::Retaining, ordinal))
    }

    /// Nodes of `class_name` added since the baseline diffed as `base_snapshot_id`.
    ///
    /// # Errors
    /// [`SnapshotError::UnknownBaseSnapshot`] if no diff was calculated against
    /// it, [`SnapshotError::UnknownClass`] if the class has no changes.
    pub fn create_added_nodes_provider(
        &self,
        base_snapshot_id: &str,
        class_name: &str,
    ) -> Result<NodesProvider<'_, F>, SnapshotError> {
        let diffs = self.snapshot_diffs.lock();
        let snapshot_diff = diffs
            .get(base_snapshot_id)
            .ok_or_else(|| SnapshotError::UnknownBaseSnapshot(base_snapshot_id.to_owned()))?;
        let class_diff = snapshot_diff
            .get(class_name)
            .ok_or_else(|| SnapshotError::UnknownClass(class_name.to_owned()))?;
        let nfc = self.graph.layout.node.field_count;
        let ordinals: Vec<u32> = class_diff
            .added_indexes
            .iter()
            .map(|&idx| (idx / nfc) as u32)
            .collect();
        Ok(NodesProvider::new(self, ordinals))
    }

    /// Nodes at `node_indexes`, typically a diff's deleted indexes on the
    /// baseline snapshot.
    ///
    /// # Errors
    /// [`SnapshotError::UnknownNodeIndex`] for any index that is not a node.
    pub fn create_deleted_nodes_provider(&self, node_indexes: &[usize]) -> Result<NodesProvider<'_, F>, SnapshotError> {
        let ordinals = node_indexes
            .iter()
            .map(|&idx| self.graph.ordinal_of(idx))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(NodesProvider::new(self, ordinals))
    }

    /// Members of `class_name` under `filter`.
    ///
    /// # Errors
    /// [`SnapshotError::UnknownClass`], or an unresolvable filter.
    pub fn create_nodes_provider_for_class(
        &self,
        class_name: &str,
        filter: &NodeFilter,
    ) -> Result<NodesProvider<'_, F>, SnapshotError> {
        let aggregates = self.aggregates_with_filter(filter)?;
        let aggregate = aggregates
            .get(class_name)
            .ok_or_else(|| SnapshotError::UnknownClass(class_name.to_owned()))?;
        let nfc = self.graph.layout.node.field_count;
        let ownership = self.ownership();
        let ordinals: Vec<u32> = aggregate
            .idxs
            .iter()
            .map(|&idx| (idx / nfc) as u32)
            .filter(|&o| ownership.owns(o))
            .collect();
        Ok(NodesProvider::new(self, ordinals))
    }

    // --- allocation profile ------------------------------------------------------

    pub fn allocation_profile(&self) -> Option<&AllocationProfile> {
        self.allocation_profile.as_ref()
    }

    /// Allocating functions, largest first; empty without allocation traces.
    pub fn allocation_traces_tops(&self) -> Vec<SerializedAllocationNode> {
        self.allocation_profile
            .as_ref()
            .map(AllocationProfile::serialize_trace_tops)
            .unwrap_or_default()
    }

    /// # Errors
    /// [`SnapshotError::UnknownAllocationNode`].
    pub fn allocation_node_callers(&self, node_id: u32) -> Result<AllocationNodeCallers, SnapshotError> {
        self.allocation_profile
            .as_ref()
            .ok_or(SnapshotError::UnknownAllocationNode(node_id))?
            .serialize_callers(node_id)
    }

    /// Allocation stack of the node at `node_index`, or `None` when the node
    /// carries no trace.
    ///
    /// # Errors
    /// [`SnapshotError::UnknownNodeIndex`].
    pub fn allocation_stack(&self, node_index: usize) -> Result<Option<Vec<AllocationStackFrame>>, SnapshotError> {
        let ordinal = self.graph.ordinal_of(node_index)?;
        let trace_node_id = self.graph.trace_node_id(ordinal);
        if trace_node_id == 0 {
            return Ok(None);
        }
        Ok(self
            .allocation_profile
            .as_ref()
            .map(|p| p.serialize_allocation_stack(trace_node_id)))
    }
}

impl<F: SnapshotFormat> DebugInvariants for HeapSnapshot<F> {
    fn debug_assert_invariants(&self) {
        crate::debug_invariants!(self.validate_invariants(), "HeapSnapshot invalid");
    }

    fn validate_invariants(&self) -> Result<(), SnapshotError> {
        let n = self.graph.node_count;
        let po = &self.postorder;
        if po.index_to_ordinal.len() != n || po.ordinal_to_index.len() != n {
            return Err(SnapshotError::InvariantViolation(format!(
                "postorder covers {} of {n} nodes",
                po.index_to_ordinal.len()
            )));
        }
        for (index, &ordinal) in po.index_to_ordinal.iter().enumerate() {
            if po.ordinal_to_index[ordinal as usize] as usize != index {
                return Err(SnapshotError::InvariantViolation(format!(
                    "postorder index {index} and node {ordinal} disagree"
                )));
            }
        }

        let root = self.graph.root_ordinal;
        if po.index_to_ordinal[n - 1] != root || self.dominators[root as usize] != root {
            return Err(SnapshotError::InvariantViolation(
                "root must be last in postorder and dominate itself".into(),
            ));
        }
        for ordinal in (0..n as u32).filter(|&o| o != root) {
            let dom = self.dominators[ordinal as usize];
            if po.ordinal_to_index[dom as usize] <= po.ordinal_to_index[ordinal as usize] {
                return Err(SnapshotError::InvariantViolation(format!(
                    "dominator {dom} of node {ordinal} is not above it in postorder"
                )));
            }
            let self_size = f64::from(self.graph.self_size(ordinal));
            if self.retained_sizes[ordinal as usize] < self_size {
                return Err(SnapshotError::InvariantViolation(format!(
                    "node {ordinal} retains less than its self size"
                )));
            }
        }
        Ok(())
    }
}
