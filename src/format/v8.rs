//! V8/Blink heap snapshots.
//!
//! Adds the heuristics a V8 heap needs on top of the generic algorithms:
//! `(GC roots)` based root discovery, page-ownership flags, rebuilt names of
//! concatenated strings, and the distance exceptions for descriptor arrays and
//! native contexts.

use std::borrow::Cow;

use hashbrown::HashMap;
use parking_lot::Mutex;

use super::{SnapshotFormat, tally_statistics};
use crate::graph::SnapshotGraph;
use crate::records::{EdgeName, Statistics};

/// Node flag bits produced by [`V8Format::calculate_flags`].
pub mod flags {
    /// Reachable from a user root over ordinary properties.
    pub const CAN_BE_QUERIED: u32 = 1;
    /// Member of a detached DOM tree.
    pub const DETACHED_DOM_TREE_NODE: u32 = 2;
    /// Owned by the inspected page rather than by tooling.
    pub const PAGE_OBJECT: u32 = 4;
    /// Scratch bit of the page-ownership walk.
    pub const VISITED_MARKER: u32 = 0x1_0000;
    pub const VISITED_MARKER_MASK: u32 = 0x0_ffff;
}

/// Longest rebuilt concatenated-string name, in characters.
pub const CONS_STRING_NAME_LIMIT: usize = 1024;

const GC_ROOTS: &str = "(GC roots)";
const DOCUMENT_DOM_TREES: &str = "(Document DOM trees)";
const DETACHED_DOM_TREES: &str = "(Detached DOM trees)";
const DETACHED_DOM_TREE_PREFIX: &str = "Detached DOM tree";

/// The V8 snapshot format.
#[derive(Debug, Default)]
pub struct V8Format {
    show_hidden_data: bool,
    cons_names: Mutex<HashMap<u32, String>>,
}

impl V8Format {
    /// With `show_hidden_data`, the page-ownership rule is off and hidden
    /// edges and nodes are listed by the edge providers.
    pub fn new(show_hidden_data: bool) -> Self {
        Self {
            show_hidden_data,
            cons_names: Mutex::new(HashMap::new()),
        }
    }

    pub fn show_hidden_data(&self) -> bool {
        self.show_hidden_data
    }

    fn is_synthetic(graph: &SnapshotGraph, ordinal: u32) -> bool {
        graph.node_type(ordinal) == graph.layout.node.synthetic
    }

    fn is_document_dom_trees_root(graph: &SnapshotGraph, ordinal: u32) -> bool {
        Self::is_synthetic(graph, ordinal) && graph.raw_node_name(ordinal) == DOCUMENT_DOM_TREES
    }

    fn child_named(&self, graph: &SnapshotGraph, ordinal: u32, name: &str) -> Option<u32> {
        graph
            .edges_of(ordinal)
            .map(|e| graph.edge_target(e))
            .find(|&child| self.node_name(graph, child) == name)
    }

    /// Edge visibility in the providers; `shown` is the node the edge lists.
    fn is_visible(&self, graph: &SnapshotGraph, edge_index: usize, shown: u32) -> bool {
        let edge = &graph.layout.edge;
        let t = graph.edge_type(edge_index);
        if t == edge.invisible {
            return false;
        }
        if self.show_hidden_data {
            return true;
        }
        t != edge.hidden && graph.node_type(shown) != graph.layout.node.hidden
    }

    /// Rebuild a concatenated string from its `first`/`second` parts without
    /// recursion, stopping once the limit is reached.
    ///
    /// Each cons node is expanded at most once, so self-referencing or cyclic
    /// parts cannot keep the walk alive.
    fn cons_string_name(graph: &SnapshotGraph, ordinal: u32) -> String {
        let node = &graph.layout.node;
        let internal = graph.layout.edge.internal;
        let mut stack = vec![ordinal];
        let mut expanded = hashbrown::HashSet::new();
        let mut name = String::new();
        let mut chars = 0;
        while chars < CONS_STRING_NAME_LIMIT {
            let Some(o) = stack.pop() else { break };
            if graph.node_type(o) != node.cons_string {
                let part = graph.raw_node_name(o);
                chars += part.chars().count();
                name.push_str(part);
                continue;
            }
            if !expanded.insert(o) {
                continue;
            }
            let mut first = None;
            let mut second = None;
            for e in graph.edges_of(o) {
                if first.is_some() && second.is_some() {
                    break;
                }
                if graph.edge_type(e) != internal {
                    continue;
                }
                match graph.string(graph.edge_name_or_index(e)) {
                    "first" => first = Some(graph.edge_target(e)),
                    "second" => second = Some(graph.edge_target(e)),
                    _ => {}
                }
            }
            stack.extend(second);
            stack.extend(first);
        }
        name
    }

    fn mark_detached_dom_tree_nodes(&self, graph: &SnapshotGraph, flags: &mut [u32]) {
        let Some(detached_root) = self.child_named(graph, graph.root_ordinal, DETACHED_DOM_TREES)
        else {
            return;
        };
        for e in graph.edges_of(detached_root) {
            let tree = graph.edge_target(e);
            if !self.class_name(graph, tree).starts_with(DETACHED_DOM_TREE_PREFIX) {
                continue;
            }
            for child in graph.edges_of(tree).map(|ce| graph.edge_target(ce)) {
                flags[child as usize] |= flags::DETACHED_DOM_TREE_NODE;
            }
        }
    }

    fn mark_queriable_heap_objects(&self, graph: &SnapshotGraph, flags: &mut [u32]) {
        let edge = &graph.layout.edge;
        let mut list: Vec<u32> = graph
            .root_children()
            .filter(|&o| !Self::is_synthetic(graph, o))
            .collect();
        while let Some(ordinal) = list.pop() {
            if flags[ordinal as usize] & flags::CAN_BE_QUERIED != 0 {
                continue;
            }
            flags[ordinal as usize] |= flags::CAN_BE_QUERIED;
            for e in graph.edges_of(ordinal) {
                let child = graph.edge_target(e);
                if flags[child as usize] & flags::CAN_BE_QUERIED != 0 {
                    continue;
                }
                let t = graph.edge_type(e);
                if t == edge.hidden || t == edge.invisible || t == edge.internal || t == edge.weak {
                    continue;
                }
                list.push(child);
            }
        }
    }

    fn mark_page_owned_nodes(graph: &SnapshotGraph, flags: &mut [u32]) {
        let edge = &graph.layout.edge;
        let marker_and_flag = flags::VISITED_MARKER | flags::PAGE_OBJECT;
        let mut to_visit: Vec<u32> = Vec::with_capacity(graph.node_count);

        for e in graph.edges_of(graph.root_ordinal) {
            let t = graph.edge_type(e);
            let target = graph.edge_target(e);
            if t == edge.element {
                if !Self::is_document_dom_trees_root(graph, target) {
                    continue;
                }
            } else if t != edge.shortcut {
                continue;
            }
            to_visit.push(target);
            flags[target as usize] |= flags::VISITED_MARKER;
        }

        while let Some(ordinal) = to_visit.pop() {
            let f = &mut flags[ordinal as usize];
            *f |= flags::PAGE_OBJECT;
            *f &= flags::VISITED_MARKER_MASK;
            for e in graph.edges_of(ordinal) {
                let child = graph.edge_target(e);
                if flags[child as usize] & marker_and_flag != 0 {
                    continue;
                }
                if graph.edge_type(e) == edge.weak {
                    continue;
                }
                to_visit.push(child);
                flags[child as usize] |= flags::VISITED_MARKER;
            }
        }
    }

    /// Self size of an `Array` plus its `elements` store when nothing else
    /// retains the store.
    fn array_size(graph: &SnapshotGraph, ordinal: u32) -> f64 {
        let mut size = f64::from(graph.self_size(ordinal));
        let internal = graph.layout.edge.internal;
        let elements = graph.edges_of(ordinal).find(|&e| {
            graph.edge_type(e) == internal && graph.string(graph.edge_name_or_index(e)) == "elements"
        });
        if let Some(e) = elements {
            let store = graph.edge_target(e);
            if graph.retainers.count(store) == 1 {
                size += f64::from(graph.self_size(store));
            }
        }
        size
    }
}

impl SnapshotFormat for V8Format {
    fn calculate_flags(&self, graph: &SnapshotGraph) -> Vec<u32> {
        let mut flags = vec![0u32; graph.node_count];
        self.mark_detached_dom_tree_nodes(graph, &mut flags);
        self.mark_queriable_heap_objects(graph, &mut flags);
        Self::mark_page_owned_nodes(graph, &mut flags);
        flags
    }

    fn user_objects_mask(&self) -> Option<u32> {
        (!self.show_hidden_data).then_some(flags::PAGE_OBJECT)
    }

    fn node_name<'g>(&self, graph: &'g SnapshotGraph, ordinal: u32) -> Cow<'g, str> {
        if graph.node_type(ordinal) != graph.layout.node.cons_string {
            return Cow::Borrowed(graph.raw_node_name(ordinal));
        }
        let mut cache = self.cons_names.lock();
        let name = cache
            .entry(ordinal)
            .or_insert_with(|| Self::cons_string_name(graph, ordinal));
        Cow::Owned(name.clone())
    }

    fn class_name<'g>(&self, graph: &'g SnapshotGraph, ordinal: u32) -> Cow<'g, str> {
        match graph.node_type_name(ordinal) {
            "hidden" => Cow::Borrowed("(system)"),
            "object" | "native" => self.node_name(graph, ordinal),
            "code" => Cow::Borrowed("(compiled code)"),
            other => Cow::Owned(format!("({other})")),
        }
    }

    fn class_key(&self, graph: &SnapshotGraph, ordinal: u32) -> i64 {
        let node = &graph.layout.node;
        let t = graph.node_type(ordinal);
        if t == node.object || t == node.native {
            i64::from(graph.node_name_index(ordinal))
        } else {
            -1 - i64::from(t)
        }
    }

    fn edge_name(&self, graph: &SnapshotGraph, edge_index: usize) -> EdgeName {
        let edge = &graph.layout.edge;
        let t = graph.edge_type(edge_index);
        let raw = graph.edge_name_or_index(edge_index);
        if t == edge.element || t == edge.hidden {
            return EdgeName::Index(raw);
        }
        let name = graph.string(raw);
        if t == edge.shortcut {
            if let Ok(i) = name.parse::<u32>() {
                return EdgeName::Index(i);
            }
        }
        EdgeName::Name(name.to_owned())
    }

    fn calculate_statistics(
        &self,
        graph: &SnapshotGraph,
        distances: &[i32],
        total_size: f64,
    ) -> Statistics {
        tally_statistics(graph, distances, total_size, |o| {
            (graph.raw_node_name(o) == "Array").then(|| Self::array_size(graph, o))
        })
    }

    fn is_user_root(&self, graph: &SnapshotGraph, ordinal: u32) -> bool {
        !Self::is_synthetic(graph, ordinal) || Self::is_document_dom_trees_root(graph, ordinal)
    }

    /// User roots: qualifying root children. All roots: the children of every
    /// `(GC roots)` sub-root, then the sub-root itself, then the root's own
    /// children. Without a `(GC roots)` node there are no roots.
    fn roots(&self, graph: &SnapshotGraph, user_roots_only: bool) -> Vec<u32> {
        let root = graph.root_ordinal;
        let Some(gc_roots) = self.child_named(graph, root, GC_ROOTS) else {
            return Vec::new();
        };
        let mut seen = hashbrown::HashSet::new();
        let mut out = Vec::new();
        let mut visit = |o: u32| {
            if seen.insert(o) {
                out.push(o);
            }
        };
        if user_roots_only {
            for child in graph.root_children() {
                if self.is_user_root(graph, child) {
                    visit(child);
                }
            }
        } else {
            for sub_root in graph.edges_of(gc_roots).map(|e| graph.edge_target(e)) {
                for child in graph.edges_of(sub_root).map(|e| graph.edge_target(e)) {
                    visit(child);
                }
                visit(sub_root);
            }
            for child in graph.root_children() {
                visit(child);
            }
        }
        out
    }

    /// Descriptor-array links and the sloppy function map of native contexts
    /// do not carry distance.
    fn distance_filter(&self, graph: &SnapshotGraph, from: u32, edge_index: usize) -> bool {
        let node = &graph.layout.node;
        let t = graph.node_type(from);
        if t == node.hidden {
            return graph.raw_node_name(from) != "system / NativeContext"
                || self.edge_name(graph, edge_index) != EdgeName::Name("sloppy_function_map".into());
        }
        if t == node.array {
            if graph.raw_node_name(from) != "(map descriptors)" {
                return true;
            }
            let index = match self.edge_name(graph, edge_index) {
                EdgeName::Index(i) => i,
                EdgeName::Name(s) => match s.parse::<u32>() {
                    Ok(i) => i,
                    Err(_) => return true,
                },
            };
            return index < 2 || index % 3 != 1;
        }
        true
    }

    fn containment_edge_filter(&self, graph: &SnapshotGraph, edge_index: usize) -> bool {
        self.is_visible(graph, edge_index, graph.edge_target(edge_index))
    }

    fn retaining_edge_filter(&self, graph: &SnapshotGraph, retainer: u32, edge_index: usize) -> bool {
        self.is_visible(graph, edge_index, retainer)
            && !graph.is_root(retainer)
            && graph.edge_type(edge_index) != graph.layout.edge.weak
    }

    fn can_be_queried(&self, flags: &[u32], ordinal: u32) -> bool {
        flags[ordinal as usize] & flags::CAN_BE_QUERIED != 0
    }

    fn is_detached_dom_tree_node(&self, flags: &[u32], ordinal: u32) -> bool {
        flags[ordinal as usize] & flags::DETACHED_DOM_TREE_NODE != 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::{EdgeType, NodeType, SnapshotBuilder};

    fn graph(b: SnapshotBuilder) -> SnapshotGraph {
        let raw = b.build();
        SnapshotGraph::from_parts(&raw.snapshot, raw.nodes, raw.edges, raw.strings).unwrap()
    }

    #[test]
    fn cons_strings_are_rebuilt() {
        let mut b = SnapshotBuilder::new();
        let root = b.add_node(NodeType::Synthetic, "", 1, 0);
        let cons = b.add_node(NodeType::ConsString, "(concatenated string)", 3, 20);
        let left = b.add_node(NodeType::String, "foo", 5, 16);
        let inner = b.add_node(NodeType::ConsString, "(concatenated string)", 7, 20);
        let mid = b.add_node(NodeType::String, "bar", 9, 16);
        let right = b.add_node(NodeType::String, "baz", 11, 16);
        b.add_edge(root, EdgeType::Element, "0", cons);
        b.add_edge(cons, EdgeType::Internal, "second", inner);
        b.add_edge(cons, EdgeType::Internal, "first", left);
        b.add_edge(inner, EdgeType::Internal, "first", mid);
        b.add_edge(inner, EdgeType::Internal, "second", right);
        let g = graph(b);
        let f = V8Format::new(false);
        assert_eq!(f.node_name(&g, cons), "foobarbaz");
        assert_eq!(f.node_name(&g, cons), "foobarbaz");
        assert_eq!(f.class_name(&g, cons), "(concatenated string)");
        assert_eq!(f.node_name(&g, left), "foo");
    }

    #[test]
    fn cyclic_cons_strings_terminate() {
        let mut b = SnapshotBuilder::new();
        let root = b.add_node(NodeType::Synthetic, "", 1, 0);
        let own = b.add_node(NodeType::ConsString, "(concatenated string)", 3, 20);
        let a = b.add_node(NodeType::ConsString, "(concatenated string)", 5, 20);
        let c = b.add_node(NodeType::ConsString, "(concatenated string)", 7, 20);
        let tail = b.add_node(NodeType::String, "end", 9, 16);
        b.add_edge(root, EdgeType::Element, "0", own);
        b.add_edge(root, EdgeType::Element, "1", a);
        b.add_edge(own, EdgeType::Internal, "first", own);
        b.add_edge(own, EdgeType::Internal, "second", own);
        b.add_edge(a, EdgeType::Internal, "first", c);
        b.add_edge(a, EdgeType::Internal, "second", tail);
        b.add_edge(c, EdgeType::Internal, "first", a);
        let raw = b.build();

        let g = SnapshotGraph::from_parts(
            &raw.snapshot,
            raw.nodes.clone(),
            raw.edges.clone(),
            raw.strings.clone(),
        )
        .unwrap();
        let f = V8Format::new(false);
        assert_eq!(f.node_name(&g, own), "");
        assert_eq!(f.node_name(&g, a), "end");

        let s = crate::HeapSnapshot::from_raw(raw, V8Format::new(false)).unwrap();
        assert_eq!(s.node_count(), 5);
    }

    #[test]
    fn shared_empty_cons_parts_are_expanded_once() {
        let mut b = SnapshotBuilder::new();
        let root = b.add_node(NodeType::Synthetic, "", 1, 0);
        let mut prev = b.add_node(NodeType::String, "", 3, 0);
        for i in 0..64u32 {
            let cons = b.add_node(NodeType::ConsString, "(concatenated string)", 5 + 2 * i, 20);
            b.add_edge(cons, EdgeType::Internal, "first", prev);
            b.add_edge(cons, EdgeType::Internal, "second", prev);
            prev = cons;
        }
        b.add_edge(root, EdgeType::Element, "0", prev);
        let g = graph(b);
        assert_eq!(V8Format::new(false).node_name(&g, prev), "");
    }

    #[test]
    fn class_keys_and_names() {
        let mut b = SnapshotBuilder::new();
        let root = b.add_node(NodeType::Synthetic, "", 1, 0);
        let obj = b.add_node(NodeType::Object, "Foo", 3, 10);
        let code = b.add_node(NodeType::Code, "f", 5, 10);
        let hidden = b.add_node(NodeType::Hidden, "system / Map", 7, 10);
        let g = graph(b);
        let f = V8Format::new(false);
        assert_eq!(f.class_name(&g, obj), "Foo");
        assert_eq!(f.class_name(&g, code), "(compiled code)");
        assert_eq!(f.class_name(&g, hidden), "(system)");
        assert_eq!(f.class_name(&g, root), "(synthetic)");
        assert_eq!(f.class_key(&g, obj), i64::from(g.node_name_index(obj)));
        assert_eq!(f.class_key(&g, code), -1 - NodeType::Code as i64);
    }

    #[test]
    fn numeric_shortcut_names_are_indexes() {
        let mut b = SnapshotBuilder::new();
        let root = b.add_node(NodeType::Synthetic, "", 1, 0);
        let a = b.add_node(NodeType::Object, "A", 3, 10);
        b.add_edge(root, EdgeType::Shortcut, "12", a);
        b.add_edge(root, EdgeType::Shortcut, "win", a);
        b.add_indexed_edge(root, EdgeType::Element, 4, a);
        let g = graph(b);
        let f = V8Format::new(false);
        let names: Vec<_> = g.edges_of(root).map(|e| f.edge_name(&g, e)).collect();
        assert_eq!(
            names,
            vec![EdgeName::Index(12), EdgeName::Name("win".into()), EdgeName::Index(4)]
        );
    }

    #[test]
    fn roots_need_gc_roots() {
        let mut b = SnapshotBuilder::new();
        let root = b.add_node(NodeType::Synthetic, "", 1, 0);
        let win = b.add_node(NodeType::Object, "Window", 3, 10);
        b.add_edge(root, EdgeType::Shortcut, "w", win);
        let g = graph(b);
        let f = V8Format::new(false);
        assert!(f.roots(&g, true).is_empty());
        assert!(f.roots(&g, false).is_empty());
    }

    #[test]
    fn roots_walk_gc_sub_roots_first() {
        let mut b = SnapshotBuilder::new();
        let root = b.add_node(NodeType::Synthetic, "", 1, 0);
        let win = b.add_node(NodeType::Object, "Window", 3, 10);
        let gc = b.add_node(NodeType::Synthetic, "(GC roots)", 5, 0);
        let handles = b.add_node(NodeType::Synthetic, "(Handle scope)", 7, 0);
        let h = b.add_node(NodeType::Object, "H", 9, 10);
        b.add_edge(root, EdgeType::Shortcut, "w", win);
        b.add_edge(root, EdgeType::Element, "1", gc);
        b.add_edge(gc, EdgeType::Element, "1", handles);
        b.add_edge(handles, EdgeType::Element, "1", h);
        b.add_edge(handles, EdgeType::Element, "2", win);
        let g = graph(b);
        let f = V8Format::new(false);
        assert_eq!(f.roots(&g, true), vec![win]);
        assert_eq!(f.roots(&g, false), vec![h, win, handles, gc]);
    }

    #[test]
    fn page_ownership_follows_shortcuts_but_not_weak_edges() {
        let mut b = SnapshotBuilder::new();
        let root = b.add_node(NodeType::Synthetic, "", 1, 0);
        let win = b.add_node(NodeType::Object, "Window", 3, 10);
        let a = b.add_node(NodeType::Object, "A", 5, 10);
        let w = b.add_node(NodeType::Object, "W", 7, 10);
        let tool = b.add_node(NodeType::Object, "Tool", 9, 10);
        b.add_edge(root, EdgeType::Shortcut, "w", win);
        b.add_edge(root, EdgeType::Element, "1", tool);
        b.add_edge(win, EdgeType::Property, "a", a);
        b.add_edge(win, EdgeType::Weak, "w", w);
        let g = graph(b);
        let f = V8Format::new(false);
        let fl = f.calculate_flags(&g);
        assert_ne!(fl[win as usize] & flags::PAGE_OBJECT, 0);
        assert_ne!(fl[a as usize] & flags::PAGE_OBJECT, 0);
        assert_eq!(fl[w as usize] & flags::PAGE_OBJECT, 0);
        assert_eq!(fl[tool as usize] & flags::PAGE_OBJECT, 0);
        assert!(fl.iter().all(|x| x & flags::VISITED_MARKER == 0));
        assert!(f.can_be_queried(&fl, a));
        assert!(!f.can_be_queried(&fl, w));
        assert_eq!(f.user_objects_mask(), Some(flags::PAGE_OBJECT));
        assert_eq!(V8Format::new(true).user_objects_mask(), None);
    }

    #[test]
    fn detached_dom_trees_are_flagged() {
        let mut b = SnapshotBuilder::new();
        let root = b.add_node(NodeType::Synthetic, "", 1, 0);
        let detached = b.add_node(NodeType::Synthetic, "(Detached DOM trees)", 3, 0);
        let tree = b.add_node(NodeType::Native, "Detached DOM tree / 3 entries", 5, 0);
        let div = b.add_node(NodeType::Native, "HTMLDivElement", 7, 40);
        b.add_edge(root, EdgeType::Element, "1", detached);
        b.add_edge(detached, EdgeType::Element, "1", tree);
        b.add_edge(tree, EdgeType::Element, "1", div);
        let g = graph(b);
        let f = V8Format::new(false);
        let fl = f.calculate_flags(&g);
        assert!(f.is_detached_dom_tree_node(&fl, div));
        assert!(!f.is_detached_dom_tree_node(&fl, tree));
    }

    #[test]
    fn descriptor_array_links_carry_no_distance() {
        let mut b = SnapshotBuilder::new();
        let root = b.add_node(NodeType::Synthetic, "", 1, 0);
        let desc = b.add_node(NodeType::Array, "(map descriptors)", 3, 10);
        let k = b.add_node(NodeType::String, "k", 5, 10);
        b.add_edge(root, EdgeType::Element, "1", desc);
        for i in 0..5 {
            b.add_indexed_edge(desc, EdgeType::Element, i, k);
        }
        let g = graph(b);
        let f = V8Format::new(false);
        let allowed: Vec<bool> = g.edges_of(desc).map(|e| f.distance_filter(&g, desc, e)).collect();
        assert_eq!(allowed, vec![true, true, true, true, false]);
    }

    #[test]
    fn hidden_edges_are_not_listed_unless_shown() {
        let mut b = SnapshotBuilder::new();
        let root = b.add_node(NodeType::Synthetic, "", 1, 0);
        let a = b.add_node(NodeType::Object, "A", 3, 10);
        let h = b.add_node(NodeType::Hidden, "system", 5, 10);
        b.add_edge(root, EdgeType::Element, "1", a);
        b.add_indexed_edge(a, EdgeType::Hidden, 0, h);
        b.add_edge(a, EdgeType::Property, "p", h);
        let g = graph(b);
        let hidden = V8Format::new(false);
        let shown = V8Format::new(true);
        let listed = |f: &V8Format| g.edges_of(a).filter(|&e| f.containment_edge_filter(&g, e)).count();
        assert_eq!(listed(&hidden), 0);
        assert_eq!(listed(&shown), 2);
        let root_edge = g.edges_of(root).next().unwrap();
        assert!(!hidden.retaining_edge_filter(&g, root, root_edge));
    }
}
