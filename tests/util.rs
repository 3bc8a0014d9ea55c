#![allow(dead_code)]
use heap_snapshot::builder::{EdgeType, NodeType, SnapshotBuilder};
use heap_snapshot::format::{GenericFormat, V8Format};
use heap_snapshot::HeapSnapshot;

/// Build with [`GenericFormat`] and no progress reporting.
pub fn generic(b: SnapshotBuilder) -> HeapSnapshot<GenericFormat> {
    HeapSnapshot::from_raw(b.build(), GenericFormat).unwrap()
}

/// Build with the V8 format, hidden data off.
pub fn v8(b: SnapshotBuilder) -> HeapSnapshot<V8Format> {
    HeapSnapshot::from_raw(b.build(), V8Format::new(false)).unwrap()
}

/// root -> {a, b}, a -> c, b -> c with self sizes 0, 10, 10, 5.
pub fn diamond() -> (SnapshotBuilder, [u32; 4]) {
    let mut b = SnapshotBuilder::new();
    let root = b.add_node(NodeType::Synthetic, "", 1, 0);
    let a = b.add_node(NodeType::Object, "A", 3, 10);
    let bb = b.add_node(NodeType::Object, "B", 5, 10);
    let c = b.add_node(NodeType::Object, "C", 7, 5);
    b.add_edge(root, EdgeType::Property, "a", a);
    b.add_edge(root, EdgeType::Property, "b", bb);
    b.add_edge(a, EdgeType::Property, "c", c);
    b.add_edge(bb, EdgeType::Property, "c", c);
    (b, [root, a, bb, c])
}

/// A V8-shaped heap: a `(GC roots)` sub-root, a `Window` the page owns through
/// a root shortcut, a page object `Foo` under it, and a tooling object that
/// also points at `Foo`.
///
/// Returns the builder and `[root, gc_roots, window, tool, foo]`.
pub fn v8_page() -> (SnapshotBuilder, [u32; 5]) {
    let mut b = SnapshotBuilder::new();
    let root = b.add_node(NodeType::Synthetic, "", 1, 0);
    let gc = b.add_node(NodeType::Synthetic, "(GC roots)", 3, 0);
    let win = b.add_node(NodeType::Object, "Window", 5, 50);
    let tool = b.add_node(NodeType::Object, "Tool", 7, 30);
    let foo = b.add_node(NodeType::Object, "Foo", 9, 20);
    b.add_edge(root, EdgeType::Element, "1", gc);
    b.add_edge(root, EdgeType::Shortcut, "window", win);
    b.add_edge(root, EdgeType::Element, "2", win);
    b.add_edge(root, EdgeType::Element, "3", tool);
    b.add_edge(gc, EdgeType::Element, "1", win);
    b.add_edge(win, EdgeType::Property, "foo", foo);
    b.add_edge(tool, EdgeType::Property, "foo", foo);
    (b, [root, gc, win, tool, foo])
}

/// Assert vec is a permutation of another vec (order-agnostic).
pub fn assert_permutation<T: Ord + Copy + std::fmt::Debug>(got: &[T], want: &[T]) {
    let mut a = got.to_vec();
    a.sort_unstable();
    let mut b = want.to_vec();
    b.sort_unstable();
    assert_eq!(a, b, "not a permutation\n got={:?}\nwant={:?}", got, want);
}
