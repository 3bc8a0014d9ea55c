//! Snapshot diffing by merge-join over id-sorted class members.

use hashbrown::HashMap;
use itertools::{EitherOrBoth, Itertools};

use super::aggregates::ClassAggregates;
use crate::graph::SnapshotGraph;
use crate::records::{AggregateForDiff, Diff};

/// Baseline form of the aggregates: per class, member indexes with their ids
/// and self sizes. `aggregates` must have its indexes sorted by id.
pub fn aggregates_for_diff(
    graph: &SnapshotGraph,
    aggregates: &ClassAggregates,
) -> HashMap<String, AggregateForDiff> {
    let nfc = graph.layout.node.field_count;
    aggregates
        .iter()
        .map(|(class_name, agg)| {
            let ordinals = agg.idxs.iter().map(|&idx| (idx / nfc) as u32);
            let entry = AggregateForDiff {
                indexes: agg.idxs.clone(),
                ids: ordinals.clone().map(|o| graph.node_id(o)).collect(),
                self_sizes: ordinals.map(|o| graph.self_size(o)).collect(),
            };
            (class_name.clone(), entry)
        })
        .collect()
}

/// Diff one class: ids only in `base` were removed, ids only in `current`
/// (raw node offsets into `graph`, sorted by id) were added.
///
/// Returns `None` when nothing was added or removed.
///
/// ## Complexity
/// **O(|base| + |current|)**.
pub fn diff_for_class(graph: &SnapshotGraph, base: &AggregateForDiff, current: &[usize]) -> Option<Diff> {
    let nfc = graph.layout.node.field_count;
    let base_side = base
        .ids
        .iter()
        .zip(&base.indexes)
        .zip(&base.self_sizes)
        .map(|((&id, &idx), &size)| (id, idx, size));
    let current_side = current.iter().map(|&idx| {
        let o = (idx / nfc) as u32;
        (graph.node_id(o), idx, graph.self_size(o))
    });

    let mut diff = Diff::default();
    for pair in base_side.merge_join_by(current_side, |a, b| a.0.cmp(&b.0)) {
        match pair {
            EitherOrBoth::Left((_, idx, size)) => {
                diff.deleted_indexes.push(idx);
                diff.removed_count += 1;
                diff.removed_size += u64::from(size);
            }
            EitherOrBoth::Right((_, idx, size)) => {
                diff.added_indexes.push(idx);
                diff.added_count += 1;
                diff.added_size += u64::from(size);
            }
            EitherOrBoth::Both(..) => {}
        }
    }
    if diff.added_count == 0 && diff.removed_count == 0 {
        return None;
    }
    diff.count_delta = i64::from(diff.added_count) - i64::from(diff.removed_count);
    diff.size_delta = diff.added_size as i64 - diff.removed_size as i64;
    Some(diff)
}

/// Diff every class of `current` against the baseline.
///
/// Classes of the baseline are diffed against their current members (or none);
/// classes that exist only now are diffed against an empty baseline. Classes
/// without changes are left out.
pub fn calculate_snapshot_diff(
    graph: &SnapshotGraph,
    base: &HashMap<String, AggregateForDiff>,
    current: &ClassAggregates,
) -> HashMap<String, Diff> {
    let mut out = HashMap::new();
    for (class_name, base_agg) in base {
        let idxs = current.get(class_name).map_or(&[][..], |a| a.idxs.as_slice());
        if let Some(diff) = diff_for_class(graph, base_agg, idxs) {
            out.insert(class_name.clone(), diff);
        }
    }
    let empty = AggregateForDiff::default();
    for (class_name, agg) in current {
        if base.contains_key(class_name) {
            continue;
        }
        if let Some(diff) = diff_for_class(graph, &empty, &agg.idxs) {
            out.insert(class_name.clone(), diff);
        }
    }
    out
}
