//! Iterative DFS postorder numbering with orphan repair.
//!
//! The walk follows owning edges only (not weak, not shortcut) and honours the
//! page-ownership rule. Nodes left unnumbered after the root's subgraph is
//! exhausted are handled in two steps:
//!
//! 1. nodes whose retainers are all weak/shortcut become extra DFS roots that
//!    are explored *before* the root is numbered again;
//! 2. anything still unnumbered is force-assigned an index directly ahead of
//!    the root.
//!
//! Both steps emit a [`ProblemReport`]; neither aborts. Afterwards every node
//! has exactly one postorder index and the root has the highest one.

use std::fmt;

use super::{PageOwnership, SnapshotGraph};

/// Maximum number of entries kept by a [`ProblemReport`].
pub const PROBLEM_REPORT_LIMIT: usize = 100;

/// A non-fatal graph-quality warning with a capped list of offending nodes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProblemReport {
    pub title: String,
    pub entries: Vec<String>,
}

impl ProblemReport {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            entries: Vec::new(),
        }
    }

    /// Record one entry; silently dropped past [`PROBLEM_REPORT_LIMIT`].
    pub fn add(&mut self, entry: String) {
        if self.entries.len() < PROBLEM_REPORT_LIMIT {
            self.entries.push(entry);
        }
    }
}

impl fmt::Display for ProblemReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.title)?;
        for e in &self.entries {
            write!(f, "\n  {e}")?;
        }
        Ok(())
    }
}

/// Bijection between node ordinals and postorder indexes.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Postorder {
    pub index_to_ordinal: Vec<u32>,
    pub ordinal_to_index: Vec<u32>,
}

impl Postorder {
    pub fn len(&self) -> usize {
        self.index_to_ordinal.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index_to_ordinal.is_empty()
    }

    /// Postorder index of the root (always the last one).
    pub fn root_index(&self) -> usize {
        self.len() - 1
    }
}

/// Number every node in DFS postorder.
///
/// `describe(ordinal)` renders a node for the problem reports, conventionally
/// as `name @id`.
///
/// ## Complexity
/// **O(|V| + |E|)** time; explicit frame stack of at most `|V|` entries.
pub fn build_postorder<D>(
    graph: &SnapshotGraph,
    ownership: &PageOwnership<'_>,
    describe: D,
) -> (Postorder, Vec<ProblemReport>)
where
    D: Fn(u32) -> String,
{
    let node_count = graph.node_count;
    let root = graph.root_ordinal;
    let efc = graph.layout.edge.field_count;
    let first_edge = &graph.first_edge_index;

    let mut index_to_ordinal = vec![0u32; node_count];
    let mut ordinal_to_index = vec![0u32; node_count];
    let mut visited = vec![false; node_count];
    // (node ordinal, raw offset of the next edge to look at)
    let mut stack: Vec<(u32, usize)> = Vec::with_capacity(node_count);
    let mut post = 0usize;
    let mut reports = Vec::new();

    stack.push((root, first_edge[root as usize] as usize));
    visited[root as usize] = true;

    let mut iteration = 0;
    loop {
        iteration += 1;
        while let Some(top) = stack.last_mut() {
            let (node, edge_index) = *top;
            let edges_end = first_edge[node as usize + 1] as usize;
            if edge_index < edges_end {
                top.1 += efc;
                if graph.is_non_owning_edge(edge_index) {
                    continue;
                }
                let child = graph.edge_target(edge_index);
                if visited[child as usize] || ownership.skips_edge(node, child, root) {
                    continue;
                }
                stack.push((child, first_edge[child as usize] as usize));
                visited[child as usize] = true;
            } else {
                ordinal_to_index[node as usize] = post as u32;
                index_to_ordinal[post] = node;
                post += 1;
                stack.pop();
            }
        }

        if post == node_count || iteration > 1 {
            break;
        }

        let mut report = ProblemReport::new(format!(
            "Heap snapshot: {} nodes are unreachable from the root. Following nodes have only weak retainers:",
            node_count - post
        ));
        // Un-number the root and park it at the bottom of the stack with its
        // edges already consumed, so it is numbered after the orphans again.
        post -= 1;
        stack.push((root, first_edge[root as usize + 1] as usize));
        for ordinal in 0..node_count as u32 {
            if !visited[ordinal as usize] && graph.has_only_weak_retainers(ordinal) {
                stack.push((ordinal, first_edge[ordinal as usize] as usize));
                visited[ordinal as usize] = true;
                report.add(describe(ordinal));
            }
        }
        log::warn!("{report}");
        reports.push(report);
    }

    if post != node_count {
        let mut report = ProblemReport::new(format!(
            "Still found {} unreachable nodes in heap snapshot:",
            node_count - post
        ));
        post -= 1;
        for ordinal in 0..node_count as u32 {
            if visited[ordinal as usize] {
                continue;
            }
            report.add(describe(ordinal));
            ordinal_to_index[ordinal as usize] = post as u32;
            index_to_ordinal[post] = ordinal;
            post += 1;
        }
        ordinal_to_index[root as usize] = post as u32;
        index_to_ordinal[post] = root;
        post += 1;
        log::warn!("{report}");
        reports.push(report);
    }
    debug_assert_eq!(post, node_count);

    (
        Postorder {
            index_to_ordinal,
            ordinal_to_index,
        },
        reports,
    )
}
