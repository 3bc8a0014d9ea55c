//! Per-class aggregates.
//!
//! One pass over the nodes groups them by class key; a second, stack-based
//! walk of the dominator tree credits each class with the retained size of
//! every dominator subtree whose topmost member belongs to that class.

use hashbrown::{HashMap, HashSet};

use super::filter::ResolvedFilter;
use crate::format::SnapshotFormat;
use crate::records::Aggregate;
use crate::snapshot::HeapSnapshot;

/// Aggregates keyed by class name.
pub type ClassAggregates = HashMap<String, Aggregate>;

/// Whether a node takes part in aggregation at all.
fn counts<F: SnapshotFormat>(snapshot: &HeapSnapshot<F>, filter: &ResolvedFilter, ordinal: u32) -> bool {
    let graph = snapshot.graph();
    snapshot.ownership().owns(ordinal)
        && filter.matches(graph, ordinal)
        && (graph.self_size(ordinal) != 0 || graph.node_type(ordinal) == graph.layout.node.native)
}

/// Group every counted node by class.
///
/// Member indexes come out in node order; call [`sort_indexes_by_id`] for
/// id order.
///
/// ## Complexity
/// **O(|V|)** time.
pub fn build_aggregates<F: SnapshotFormat>(
    snapshot: &HeapSnapshot<F>,
    filter: &ResolvedFilter,
) -> ClassAggregates {
    let graph = snapshot.graph();
    let format = snapshot.format();
    let distances = snapshot.distances();
    let node = &graph.layout.node;

    let mut by_key: HashMap<i64, Aggregate> = HashMap::new();
    // class keys in first-seen order, with the class name of the first member
    let mut order: Vec<(i64, String)> = Vec::new();

    for ordinal in 0..graph.node_count as u32 {
        if !counts(snapshot, filter, ordinal) {
            continue;
        }
        let self_size = f64::from(graph.self_size(ordinal));
        let distance = distances[ordinal as usize];
        let node_index = graph.node_index(ordinal);
        let key = format.class_key(graph, ordinal);
        match by_key.get_mut(&key) {
            Some(agg) => {
                agg.distance = agg.distance.min(distance);
                agg.count += 1;
                agg.self_size += self_size;
                agg.idxs.push(node_index);
            }
            None => {
                let t = graph.node_type(ordinal);
                let name_matters = t == node.object || t == node.native;
                by_key.insert(
                    key,
                    Aggregate {
                        count: 1,
                        distance,
                        self_size,
                        max_ret: 0.0,
                        node_type: graph.node_type_name(ordinal).to_owned(),
                        name: name_matters.then(|| format.node_name(graph, ordinal).into_owned()),
                        idxs: vec![node_index],
                    },
                );
                order.push((key, format.class_name(graph, ordinal).into_owned()));
            }
        }
    }

    calculate_classes_retained_size(snapshot, filter, &mut by_key);

    let mut by_name = ClassAggregates::with_capacity(order.len());
    for (key, class_name) in order {
        if let Some(agg) = by_key.remove(&key) {
            by_name.insert(class_name, agg);
        }
    }
    by_name
}

/// Credit `max_ret` without double counting nested members of one class.
///
/// While a class member is on the current dominator path, members of the same
/// class further down are already inside its retained size and are skipped.
fn calculate_classes_retained_size<F: SnapshotFormat>(
    snapshot: &HeapSnapshot<F>,
    filter: &ResolvedFilter,
    aggregates: &mut HashMap<i64, Aggregate>,
) {
    let graph = snapshot.graph();
    let format = snapshot.format();
    let retained = snapshot.retained_sizes();
    let dominated = snapshot.dominated();

    let mut list = vec![graph.root_ordinal];
    // list lengths at which a class leaves the current path
    let mut sizes: Vec<usize> = Vec::new();
    let mut classes: Vec<i64> = Vec::new();
    let mut seen: HashSet<i64> = HashSet::new();

    while let Some(ordinal) = list.pop() {
        let key = format.class_key(graph, ordinal);
        let children = dominated.children(ordinal);

        if !seen.contains(&key) && counts(snapshot, filter, ordinal) {
            if let Some(agg) = aggregates.get_mut(&key) {
                agg.max_ret += retained[ordinal as usize];
            }
            if !children.is_empty() {
                seen.insert(key);
                sizes.push(list.len());
                classes.push(key);
            }
        }
        list.extend_from_slice(children);

        while sizes.last() == Some(&list.len()) {
            sizes.pop();
            if let Some(key) = classes.pop() {
                seen.remove(&key);
            }
        }
    }
}

/// Sort every class's member indexes by node id.
pub fn sort_indexes_by_id<F: SnapshotFormat>(snapshot: &HeapSnapshot<F>, aggregates: &mut ClassAggregates) {
    let graph = snapshot.graph();
    let nfc = graph.layout.node.field_count;
    for agg in aggregates.values_mut() {
        agg.idxs
            .sort_unstable_by_key(|&idx| graph.node_id((idx / nfc) as u32));
    }
}
