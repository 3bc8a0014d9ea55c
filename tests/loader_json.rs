mod util;
use util::*;

use heap_snapshot::prelude::*;

/// Seven node fields: the layout carries a `detachedness` column the engine
/// does not use.
const PAGE: &str = r#"{
    "snapshot": {
        "meta": {
            "node_fields": ["type","name","id","self_size","edge_count","trace_node_id","detachedness"],
            "node_types": [["hidden","array","string","object","code","closure","regexp",
                            "number","native","synthetic","concatenated string","sliced string"],
                           "string","number","number","number","number","number"],
            "edge_fields": ["type","name_or_index","to_node"],
            "edge_types": [["context","element","property","internal","hidden","shortcut","weak"],
                           "string_or_number","node"],
            "sample_fields": ["timestamp_us","last_assigned_id"]
        },
        "node_count": 4,
        "edge_count": 4,
        "trace_function_count": 0
    },
    "nodes": [9,0,1,0,3,0,0,
              9,1,3,0,0,0,0,
              3,2,5,50,1,0,0,
              3,4,7,20,0,0,0],
    "edges": [1,1,7, 5,5,14, 1,2,14, 2,3,21],
    "samples": [1000,4, 3500,8],
    "strings": ["", "(GC roots)", "Window", "foo", "Foo", "window"]
}"#;

#[test]
fn documents_load_and_build() {
    let raw = RawSnapshot::from_json_str(PAGE).unwrap();
    let s = HeapSnapshot::build(raw, V8Format::default(), &NoProgress).unwrap();
    assert!(s.diagnostics().is_empty());
    assert_eq!(s.node_count(), 4);
    assert_eq!(s.total_size(), 70.0);
    assert_eq!(s.node_by_id(5).unwrap().retained_size, 70.0);
    assert_eq!(s.node_by_id(7).unwrap().node_index, 21);

    let classes = s.aggregates(true, &NodeFilter::all()).unwrap();
    let mut names: Vec<_> = classes.keys().cloned().collect();
    names.sort();
    assert_eq!(names, vec!["Foo", "Window"]);
}

#[test]
fn samples_bucket_live_sizes() {
    let raw = RawSnapshot::from_json_str(PAGE).unwrap();
    let s = HeapSnapshot::from_raw(raw, V8Format::default()).unwrap();
    let samples = s.samples().unwrap();
    assert_eq!(samples.timestamps, vec![1.0, 3.5]);
    assert_eq!(samples.last_assigned_ids, vec![4, 8]);
    // ids 1 and 3 land in the first interval, 5 and 7 in the second
    assert_eq!(samples.size_for_range, vec![0, 70]);
}

#[test]
fn raw_snapshots_survive_serialization() {
    let (b, _) = diamond();
    let raw = b.build();
    let text = raw.to_json_string().unwrap();
    let back = RawSnapshot::from_json_str(&text).unwrap();
    assert_eq!(back, raw);
    let s = HeapSnapshot::from_raw(back, GenericFormat).unwrap();
    assert_eq!(s.total_size(), 25.0);
}

#[test]
fn corrupt_buffers_are_rejected() {
    let build = |raw: RawSnapshot| HeapSnapshot::from_raw(raw, GenericFormat).err();
    let (b, _) = diamond();
    let good = b.build();

    let mut raw = good.clone();
    raw.snapshot.node_count += 1;
    assert_eq!(
        build(raw),
        Some(SnapshotError::NodeCountMismatch { declared: 5, found: 4 })
    );

    let mut raw = good.clone();
    raw.nodes.pop();
    assert!(matches!(build(raw), Some(SnapshotError::NodeBufferMisaligned { .. })));

    let mut raw = good.clone();
    raw.edges[2] = 7;
    assert!(matches!(build(raw), Some(SnapshotError::MisalignedEdgeTarget { .. })));

    let mut raw = good.clone();
    raw.edges[2] = 600;
    assert!(matches!(build(raw), Some(SnapshotError::EdgeTargetOutOfRange { .. })));

    let mut raw = good.clone();
    raw.nodes[4] = 3;
    assert!(matches!(build(raw), Some(SnapshotError::EdgeCountMismatch { .. })));

    let mut raw = good.clone();
    raw.snapshot.root_index = Some(5);
    assert_eq!(build(raw), Some(SnapshotError::InvalidRootIndex(5)));

    let mut raw = good.clone();
    raw.snapshot.meta.node_fields[3] = "size".into();
    assert_eq!(
        build(raw),
        Some(SnapshotError::MissingField { record: "node", field: "self_size" })
    );

    let mut raw = good;
    raw.nodes.clear();
    raw.edges.clear();
    raw.snapshot.node_count = 0;
    raw.snapshot.edge_count = 0;
    assert_eq!(build(raw), Some(SnapshotError::EmptySnapshot));
}

#[test]
fn malformed_documents_are_json_errors() {
    assert!(matches!(
        RawSnapshot::from_json_str("{\"snapshot\": 3}"),
        Err(SnapshotError::Json(_))
    ));
}
