//! Allocation-timeline samples.

use crate::graph::SnapshotGraph;
use crate::records::Samples;
use crate::schema::SampleLayout;

/// Bucket the live self size of JS objects by allocation interval.
///
/// Sample `i` covers the ids in `(last_assigned_ids[i - 1], last_assigned_ids[i]]`.
/// Only odd ids are JS objects; ids allocated after the last sample are
/// dropped. Returns `None` when there are no samples or no sample layout.
pub fn build_samples(graph: &SnapshotGraph, raw: &[u64], layout: Option<&SampleLayout>) -> Option<Samples> {
    if raw.is_empty() {
        return None;
    }
    let Some(layout) = layout else {
        log::warn!("snapshot carries samples but no sample_fields; samples ignored");
        return None;
    };
    let count = raw.len() / layout.field_count;
    let mut timestamps = Vec::with_capacity(count);
    let mut last_assigned_ids = Vec::with_capacity(count);
    for record in raw.chunks_exact(layout.field_count) {
        timestamps.push(record[layout.timestamp_offset] as f64 / 1000.0);
        last_assigned_ids.push(record[layout.last_assigned_id_offset]);
    }

    let mut size_for_range = vec![0u64; count];
    for ordinal in 0..graph.node_count as u32 {
        let id = u64::from(graph.node_id(ordinal));
        if id % 2 == 0 {
            continue;
        }
        let range = last_assigned_ids.partition_point(|&last| last < id);
        if let Some(slot) = size_for_range.get_mut(range) {
            *slot += u64::from(graph.self_size(ordinal));
        }
    }
    Some(Samples {
        timestamps,
        last_assigned_ids,
        size_for_range,
    })
}
