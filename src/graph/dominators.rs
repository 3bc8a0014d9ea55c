//! Immediate dominators (Cooper, Harvey & Kennedy, "A Simple, Fast Dominance
//! Algorithm", 2001), iterated over postorder indexes.

use super::postorder::Postorder;
use super::{PageOwnership, SnapshotGraph};

/// Compute the immediate dominator of every node, as node ordinals.
///
/// The root dominates itself. Retainers reached through weak or shortcut
/// edges are ignored, as are retainers the ownership rule disqualifies. A
/// node with no owning retainer at all is dominated by the root, and so is
/// any node the fixed point never reaches.
///
/// A sweep only revisits nodes with a retainer whose dominator changed in
/// the previous sweep. On acyclic heaps the result is the exact dominator
/// tree. On heaps with cycles a node can keep a stale dominator when only a
/// further ancestor moved; the result is still a tree rooted at the root
/// with every dominator above its node in postorder.
///
/// ## Complexity
/// Typically a handful of sweeps; each sweep is **O(|V| + |E|)** plus the
/// intersection walks.
pub fn build_dominators(
    graph: &SnapshotGraph,
    postorder: &Postorder,
    ownership: &PageOwnership<'_>,
) -> Vec<u32> {
    let node_count = postorder.len();
    let root_po = postorder.root_index();
    let root = graph.root_ordinal;
    let no_entry = node_count;
    let to_po = &postorder.ordinal_to_index;

    let mut dominators = vec![no_entry; node_count];
    dominators[root_po] = root_po;

    // Entries whose dominator must be recomputed because a retainer changed.
    let mut affected = vec![false; node_count];
    for edge_index in graph.edges_of(root) {
        if graph.is_non_owning_edge(edge_index) {
            continue;
        }
        affected[to_po[graph.edge_target(edge_index) as usize] as usize] = true;
    }

    let mut changed = true;
    while changed {
        changed = false;
        for po in (0..root_po).rev() {
            if !affected[po] {
                continue;
            }
            affected[po] = false;
            // Already at the root; cannot move any further.
            if dominators[po] == root_po {
                continue;
            }
            let ordinal = postorder.index_to_ordinal[po];
            let mut new_dominator = no_entry;
            let mut orphan = true;
            for slot in graph.retainer_slots(ordinal) {
                if graph.is_non_owning_edge(graph.retaining_edge(slot)) {
                    continue;
                }
                orphan = false;
                let retainer = graph.retaining_node(slot);
                if ownership.skips_edge(retainer, ordinal, root) {
                    continue;
                }
                let retainer_po = to_po[retainer as usize] as usize;
                if dominators[retainer_po] == no_entry {
                    continue;
                }
                new_dominator = if new_dominator == no_entry {
                    retainer_po
                } else {
                    intersect(&dominators, retainer_po, new_dominator, root_po)
                };
                if new_dominator == root_po {
                    break;
                }
            }
            if orphan {
                new_dominator = root_po;
            }
            if new_dominator != no_entry && dominators[po] != new_dominator {
                dominators[po] = new_dominator;
                changed = true;
                for edge_index in graph.edges_of(ordinal) {
                    affected[to_po[graph.edge_target(edge_index) as usize] as usize] = true;
                }
            }
        }
    }

    // A dominator always sits above its nodes in postorder; anything else
    // (including entries the fixed point never reached) hangs off the root.
    let mut tree = vec![root; node_count];
    for (po, &dom) in dominators.iter().enumerate() {
        let ordinal = postorder.index_to_ordinal[po];
        if dom != no_entry && dom > po {
            tree[ordinal as usize] = postorder.index_to_ordinal[dom];
        }
    }
    tree
}

/// Two-finger walk up the partial dominator tree until both fingers meet.
///
/// Each step must move to a strictly higher postorder index; a step that does
/// not is cut short at the root so the walk always terminates.
#[inline]
fn intersect(dominators: &[usize], mut a: usize, mut b: usize, root_po: usize) -> usize {
    let up = |x: usize| {
        let d = dominators[x];
        if d > x && d <= root_po { d } else { root_po }
    };
    while a != b {
        while a < b {
            a = up(a);
        }
        while b < a {
            b = up(b);
        }
    }
    a
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::{EdgeType, NodeType, SnapshotBuilder};
    use crate::graph::postorder::build_postorder;

    fn run(b: SnapshotBuilder) -> (SnapshotGraph, Vec<u32>) {
        let raw = b.build();
        let g = SnapshotGraph::from_parts(&raw.snapshot, raw.nodes, raw.edges, raw.strings).unwrap();
        let (po, _) = build_postorder(&g, &PageOwnership::everything(), |o| o.to_string());
        let dom = build_dominators(&g, &po, &PageOwnership::everything());
        (g, dom)
    }

    #[test]
    fn diamond_join_is_dominated_by_root() {
        let mut b = SnapshotBuilder::new();
        let root = b.add_node(NodeType::Synthetic, "", 1, 0);
        let a = b.add_node(NodeType::Object, "A", 3, 10);
        let bb = b.add_node(NodeType::Object, "B", 5, 10);
        let c = b.add_node(NodeType::Object, "C", 7, 5);
        b.add_edge(root, EdgeType::Element, "0", a);
        b.add_edge(root, EdgeType::Element, "1", bb);
        b.add_edge(a, EdgeType::Property, "c", c);
        b.add_edge(bb, EdgeType::Property, "c", c);
        let (_, dom) = run(b);
        assert_eq!(dom, vec![root, root, root, root]);
    }

    #[test]
    fn chain_and_back_edge() {
        // root -> a -> b -> c, c -> a
        let mut b = SnapshotBuilder::new();
        let root = b.add_node(NodeType::Synthetic, "", 1, 0);
        let a = b.add_node(NodeType::Object, "A", 3, 1);
        let bb = b.add_node(NodeType::Object, "B", 5, 1);
        let c = b.add_node(NodeType::Object, "C", 7, 1);
        b.add_edge(root, EdgeType::Element, "0", a);
        b.add_edge(a, EdgeType::Property, "b", bb);
        b.add_edge(bb, EdgeType::Property, "c", c);
        b.add_edge(c, EdgeType::Property, "a", a);
        let (_, dom) = run(b);
        assert_eq!(dom[a as usize], root);
        assert_eq!(dom[bb as usize], a);
        assert_eq!(dom[c as usize], bb);
    }

    #[test]
    fn weak_retainers_do_not_dominate() {
        let mut b = SnapshotBuilder::new();
        let root = b.add_node(NodeType::Synthetic, "", 1, 0);
        let a = b.add_node(NodeType::Object, "A", 3, 1);
        let x = b.add_node(NodeType::Object, "X", 5, 1);
        let y = b.add_node(NodeType::Object, "Y", 7, 1);
        b.add_edge(root, EdgeType::Element, "0", a);
        b.add_edge(root, EdgeType::Element, "1", x);
        b.add_edge(a, EdgeType::Property, "y", y);
        b.add_edge(x, EdgeType::Weak, "y", y);
        let (_, dom) = run(b);
        assert_eq!(dom[y as usize], a);
    }

    #[test]
    fn ownership_rule_ignores_tooling_retainers() {
        // root -> page, root -> tool, page -> obj, tool -> obj
        let mut b = SnapshotBuilder::new();
        let root = b.add_node(NodeType::Synthetic, "", 1, 0);
        let page = b.add_node(NodeType::Object, "Page", 3, 1);
        let tool = b.add_node(NodeType::Object, "Tool", 5, 1);
        let obj = b.add_node(NodeType::Object, "Obj", 7, 1);
        b.add_edge(root, EdgeType::Element, "0", page);
        b.add_edge(root, EdgeType::Element, "1", tool);
        b.add_edge(page, EdgeType::Property, "o", obj);
        b.add_edge(tool, EdgeType::Property, "o", obj);
        let raw = b.build();
        let g = SnapshotGraph::from_parts(&raw.snapshot, raw.nodes, raw.edges, raw.strings).unwrap();
        let flags = [0, 4, 0, 4];
        let own = PageOwnership::from_flags(&flags, 4);
        let (po, _) = build_postorder(&g, &own, |o| o.to_string());
        let dom = build_dominators(&g, &po, &own);
        assert_eq!(dom[obj as usize], page);
        let plain = build_dominators(&g, &po, &PageOwnership::everything());
        assert_eq!(plain[obj as usize], root);
    }
}
