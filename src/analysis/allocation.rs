//! Allocation profile: where live objects were allocated.
//!
//! The trace tree recorded by the profiler is top-down (caller above callee).
//! Consumers browse it bottom-up: first the functions that allocated, then
//! their callers. Bottom-up trees are built lazily, per function, the first
//! time a consumer expands it, and serialized nodes get ids from a counter
//! shared by the whole profile.
//!
//! All trees live in arenas; parents and callers are arena indexes.

use hashbrown::HashMap;
use parking_lot::Mutex;
use serde_json::Value;

use crate::graph::SnapshotGraph;
use crate::records::{AllocationNodeCallers, AllocationStackFrame, SerializedAllocationNode};
use crate::schema::SnapshotMeta;
use crate::snapshot_error::SnapshotError;

#[derive(Clone, Debug, Default)]
struct FunctionInfo {
    name: String,
    script_name: String,
    script_id: u32,
    line: u32,
    column: u32,
    total_count: u64,
    total_size: u64,
    total_live_count: u64,
    total_live_size: u64,
    /// Top-down nodes of this function that allocated anything.
    trace_tops: Vec<usize>,
}

#[derive(Clone, Debug)]
struct TopDownNode {
    id: u32,
    function: usize,
    count: u64,
    size: u64,
    live_count: u64,
    live_size: u64,
    parent: Option<usize>,
}

#[derive(Clone, Debug)]
struct BottomUpNode {
    function: usize,
    count: u64,
    size: u64,
    live_count: u64,
    live_size: u64,
    trace_top_ids: Vec<u32>,
    callers: Vec<usize>,
}

impl BottomUpNode {
    fn new(function: usize) -> Self {
        Self {
            function,
            count: 0,
            size: 0,
            live_count: 0,
            live_size: 0,
            trace_top_ids: Vec::new(),
            callers: Vec::new(),
        }
    }
}

/// Mutable side of the profile, touched by the consumer-facing queries.
#[derive(Debug)]
struct ProfileState {
    next_node_id: u32,
    bottom_up: Vec<BottomUpNode>,
    /// function index -> bottom-up root
    function_roots: HashMap<usize, usize>,
    /// serialized id -> bottom-up node
    id_to_node: HashMap<u32, usize>,
    /// serialized trace-top id -> function index, until first expanded
    collapsed_top: HashMap<u32, usize>,
    trace_tops: Option<Vec<SerializedAllocationNode>>,
}

/// Live-object statistics of one trace node.
#[derive(Clone, Copy, Debug, Default)]
struct LiveStats {
    count: u64,
    size: u64,
}

#[derive(Debug)]
pub struct AllocationProfile {
    functions: Vec<FunctionInfo>,
    top_down: Vec<TopDownNode>,
    id_to_top_down: HashMap<u32, usize>,
    state: Mutex<ProfileState>,
}

fn offset_of(fields: &[String], record: &'static str, field: &'static str) -> Result<usize, SnapshotError> {
    fields
        .iter()
        .position(|f| f == field)
        .ok_or(SnapshotError::MissingField { record, field })
}

fn number(value: Option<&Value>, what: &str) -> Result<u64, SnapshotError> {
    value
        .and_then(Value::as_u64)
        .ok_or_else(|| SnapshotError::MalformedTraceTree(format!("{what} is not a number")))
}

impl AllocationProfile {
    /// Parse function infos and the trace tree, attaching live-object counts
    /// from `graph`.
    ///
    /// # Errors
    /// [`SnapshotError::MissingField`] when the trace schema lacks a field,
    /// [`SnapshotError::MalformedTraceTree`] when the tree does not match it.
    pub fn build(
        graph: &SnapshotGraph,
        meta: &SnapshotMeta,
        trace_function_infos: &[u32],
        trace_tree: &Value,
    ) -> Result<Self, SnapshotError> {
        let functions = Self::build_function_infos(graph, meta, trace_function_infos)?;

        let mut live: HashMap<u32, LiveStats> = HashMap::new();
        for ordinal in 0..graph.node_count as u32 {
            let stats = live.entry(graph.trace_node_id(ordinal)).or_default();
            stats.count += 1;
            stats.size += u64::from(graph.self_size(ordinal));
        }

        let mut profile = Self {
            functions,
            top_down: Vec::new(),
            id_to_top_down: HashMap::new(),
            state: Mutex::new(ProfileState {
                next_node_id: 1,
                bottom_up: Vec::new(),
                function_roots: HashMap::new(),
                id_to_node: HashMap::new(),
                collapsed_top: HashMap::new(),
                trace_tops: None,
            }),
        };
        profile.build_top_down(meta, trace_tree, &live)?;
        Ok(profile)
    }

    fn build_function_infos(
        graph: &SnapshotGraph,
        meta: &SnapshotMeta,
        raw: &[u32],
    ) -> Result<Vec<FunctionInfo>, SnapshotError> {
        const RECORD: &str = "trace_function_info";
        let fields = &meta.trace_function_info_fields;
        let name = offset_of(fields, RECORD, "name")?;
        let script_name = offset_of(fields, RECORD, "script_name")?;
        let script_id = offset_of(fields, RECORD, "script_id")?;
        let line = offset_of(fields, RECORD, "line")?;
        let column = offset_of(fields, RECORD, "column")?;
        Ok(raw
            .chunks_exact(fields.len())
            .map(|r| FunctionInfo {
                name: graph.string(r[name]).to_owned(),
                script_name: graph.string(r[script_name]).to_owned(),
                script_id: r[script_id],
                line: r[line],
                column: r[column],
                ..FunctionInfo::default()
            })
            .collect())
    }

    /// Flatten the nested trace tree into the top-down arena, in preorder.
    fn build_top_down(
        &mut self,
        meta: &SnapshotMeta,
        tree: &Value,
        live: &HashMap<u32, LiveStats>,
    ) -> Result<(), SnapshotError> {
        const RECORD: &str = "trace_node";
        let fields = &meta.trace_node_fields;
        let id_off = offset_of(fields, RECORD, "id")?;
        let function_off = offset_of(fields, RECORD, "function_info_index")?;
        let count_off = offset_of(fields, RECORD, "count")?;
        let size_off = offset_of(fields, RECORD, "size")?;
        let children_off = offset_of(fields, RECORD, "children")?;
        let field_count = fields.len();

        let root = tree
            .as_array()
            .filter(|a| a.len() >= field_count)
            .ok_or_else(|| SnapshotError::MalformedTraceTree("missing root node".into()))?;

        // (sibling array, offset of the node in it, parent)
        let mut stack: Vec<(&[Value], usize, Option<usize>)> = vec![(root.as_slice(), 0, None)];
        while let Some((array, at, parent)) = stack.pop() {
            let record = array
                .get(at..at + field_count)
                .ok_or_else(|| SnapshotError::MalformedTraceTree("truncated node".into()))?;
            let id = number(record.get(id_off), "id")? as u32;
            let function = number(record.get(function_off), "function_info_index")? as usize;
            if function >= self.functions.len() {
                return Err(SnapshotError::MalformedTraceTree(format!(
                    "node {id} names unknown function {function}"
                )));
            }
            let stats = live.get(&id).copied().unwrap_or_default();
            let index = self.top_down.len();
            let node = TopDownNode {
                id,
                function,
                count: number(record.get(count_off), "count")?,
                size: number(record.get(size_off), "size")?,
                live_count: stats.count,
                live_size: stats.size,
                parent,
            };
            let info = &mut self.functions[function];
            if node.count != 0 {
                info.trace_tops.push(index);
                info.total_count += node.count;
                info.total_size += node.size;
                info.total_live_count += node.live_count;
                info.total_live_size += node.live_size;
            }
            self.id_to_top_down.insert(id, index);
            self.top_down.push(node);

            let children = record[children_off]
                .as_array()
                .ok_or_else(|| SnapshotError::MalformedTraceTree(format!("node {id} has no child list")))?;
            let child_offsets = (0..children.len()).step_by(field_count.max(1));
            for child_at in child_offsets.rev() {
                stack.push((children.as_slice(), child_at, Some(index)));
            }
        }
        Ok(())
    }

    fn serialize_node(
        &self,
        id: u32,
        function: usize,
        (count, size, live_count, live_size): (u64, u64, u64, u64),
        has_children: bool,
    ) -> SerializedAllocationNode {
        let info = &self.functions[function];
        SerializedAllocationNode {
            id,
            name: info.name.clone(),
            script_name: info.script_name.clone(),
            script_id: info.script_id,
            line: info.line,
            column: info.column,
            count,
            size,
            live_count,
            live_size,
            has_children,
        }
    }

    /// One entry per function that allocated anything, largest first.
    ///
    /// Computed once; the ids handed out stay valid for [`Self::serialize_callers`].
    pub fn serialize_trace_tops(&self) -> Vec<SerializedAllocationNode> {
        let mut state = self.state.lock();
        if let Some(tops) = &state.trace_tops {
            return tops.clone();
        }
        let mut tops = Vec::new();
        for (index, info) in self.functions.iter().enumerate() {
            if info.total_count == 0 {
                continue;
            }
            let id = state.next_node_id;
            state.next_node_id += 1;
            let totals = (
                info.total_count,
                info.total_size,
                info.total_live_count,
                info.total_live_size,
            );
            // function 0 is the synthetic root and has no callers
            tops.push(self.serialize_node(id, index, totals, index != 0));
            state.collapsed_top.insert(id, index);
        }
        tops.sort_by(|a, b| b.size.cmp(&a.size));
        state.trace_tops = Some(tops.clone());
        tops
    }

    /// Callers of a serialized node: the chain of single callers, then the
    /// callers where the chain branches.
    ///
    /// # Errors
    /// [`SnapshotError::UnknownAllocationNode`] for ids not handed out yet.
    pub fn serialize_callers(&self, node_id: u32) -> Result<AllocationNodeCallers, SnapshotError> {
        let mut state = self.state.lock();
        let mut node = self.ensure_bottom_up_node(&mut state, node_id)?;
        let mut nodes_with_single_caller = Vec::new();
        loop {
            let callers = &state.bottom_up[node].callers;
            if callers.len() != 1 {
                break;
            }
            node = callers[0];
            nodes_with_single_caller.push(self.serialize_caller(&mut state, node));
        }
        let callers = state.bottom_up[node].callers.clone();
        let branching_callers = callers
            .into_iter()
            .map(|c| self.serialize_caller(&mut state, c))
            .collect();
        Ok(AllocationNodeCallers {
            nodes_with_single_caller,
            branching_callers,
        })
    }

    /// Trace node ids allocated under a serialized bottom-up node.
    ///
    /// # Errors
    /// [`SnapshotError::UnknownAllocationNode`] for ids not handed out yet.
    pub fn trace_ids(&self, node_id: u32) -> Result<Vec<u32>, SnapshotError> {
        let mut state = self.state.lock();
        let node = self.ensure_bottom_up_node(&mut state, node_id)?;
        Ok(state.bottom_up[node].trace_top_ids.clone())
    }

    /// Call stack of a trace node, innermost frame first; empty for unknown ids.
    pub fn serialize_allocation_stack(&self, trace_node_id: u32) -> Vec<AllocationStackFrame> {
        let mut frames = Vec::new();
        let mut cursor = self.id_to_top_down.get(&trace_node_id).copied();
        while let Some(index) = cursor {
            let node = &self.top_down[index];
            let info = &self.functions[node.function];
            frames.push(AllocationStackFrame {
                function_name: info.name.clone(),
                script_name: info.script_name.clone(),
                script_id: info.script_id,
                line: info.line,
                column: info.column,
            });
            cursor = node.parent;
        }
        frames
    }

    fn serialize_caller(&self, state: &mut ProfileState, node: usize) -> SerializedAllocationNode {
        let id = state.next_node_id;
        state.next_node_id += 1;
        state.id_to_node.insert(id, node);
        let n = &state.bottom_up[node];
        self.serialize_node(
            id,
            n.function,
            (n.count, n.size, n.live_count, n.live_size),
            !n.callers.is_empty(),
        )
    }

    fn ensure_bottom_up_node(&self, state: &mut ProfileState, node_id: u32) -> Result<usize, SnapshotError> {
        if let Some(&node) = state.id_to_node.get(&node_id) {
            return Ok(node);
        }
        let function = state
            .collapsed_top
            .get(&node_id)
            .copied()
            .ok_or(SnapshotError::UnknownAllocationNode(node_id))?;
        let root = self
            .bottom_up_root(state, function)
            .ok_or(SnapshotError::UnknownAllocationNode(node_id))?;
        state.collapsed_top.remove(&node_id);
        state.id_to_node.insert(node_id, root);
        Ok(root)
    }

    /// Bottom-up tree of `function`, built on first use; `None` if the
    /// function never allocated.
    fn bottom_up_root(&self, state: &mut ProfileState, function: usize) -> Option<usize> {
        let info = &self.functions[function];
        if info.trace_tops.is_empty() {
            return None;
        }
        if let Some(&root) = state.function_roots.get(&function) {
            return Some(root);
        }
        let root = state.bottom_up.len();
        state.bottom_up.push(BottomUpNode::new(function));
        for &top in &info.trace_tops {
            let top_node = &self.top_down[top];
            let mut bottom_up = root;
            let mut cursor = Some(top);
            while let Some(index) = cursor {
                let n = &mut state.bottom_up[bottom_up];
                n.count += top_node.count;
                n.size += top_node.size;
                n.live_count += top_node.live_count;
                n.live_size += top_node.live_size;
                n.trace_top_ids.push(top_node.id);
                cursor = self.top_down[index].parent;
                if let Some(parent) = cursor {
                    bottom_up = Self::add_caller(state, bottom_up, self.top_down[parent].function);
                }
            }
        }
        state.function_roots.insert(function, root);
        Some(root)
    }

    fn add_caller(state: &mut ProfileState, node: usize, function: usize) -> usize {
        let existing = state.bottom_up[node]
            .callers
            .iter()
            .copied()
            .find(|&c| state.bottom_up[c].function == function);
        existing.unwrap_or_else(|| {
            let caller = state.bottom_up.len();
            state.bottom_up.push(BottomUpNode::new(function));
            state.bottom_up[node].callers.push(caller);
            caller
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::{NodeType, SnapshotBuilder};
    use serde_json::json;

    /// `(root)` -> main -> { alloc (2 objects), helper -> alloc (1 object) }
    fn profile() -> AllocationProfile {
        let mut b = SnapshotBuilder::new();
        b.add_node(NodeType::Synthetic, "", 1, 0);
        let x = b.add_node(NodeType::Object, "X", 3, 10);
        let y = b.add_node(NodeType::Object, "Y", 5, 20);
        let z = b.add_node(NodeType::Object, "Z", 7, 40);
        b.set_trace_node_id(x, 3);
        b.set_trace_node_id(y, 3);
        b.set_trace_node_id(z, 5);
        b.add_trace_function(0, "(root)", "", 0, 0, 0);
        b.add_trace_function(1, "main", "app.js", 7, 1, 1);
        b.add_trace_function(2, "alloc", "app.js", 7, 10, 2);
        b.add_trace_function(3, "helper", "lib.js", 8, 3, 4);
        b.set_trace_tree(json!([
            1, 0, 0, 0, [
                2, 1, 0, 0, [
                    3, 2, 2, 30, [],
                    4, 3, 0, 0, [
                        5, 2, 1, 40, []
                    ]
                ]
            ]
        ]));
        let raw = b.build();
        let meta = raw.snapshot.meta.clone();
        let g = SnapshotGraph::from_parts(&raw.snapshot, raw.nodes, raw.edges, raw.strings).unwrap();
        AllocationProfile::build(&g, &meta, &raw.trace_function_infos, &raw.trace_tree).unwrap()
    }

    #[test]
    fn trace_tops_aggregate_per_function() {
        let p = profile();
        let tops = p.serialize_trace_tops();
        assert_eq!(tops.len(), 1);
        let alloc = &tops[0];
        assert_eq!(alloc.name, "alloc");
        assert_eq!((alloc.count, alloc.size), (3, 70));
        assert_eq!((alloc.live_count, alloc.live_size), (3, 70));
        assert!(alloc.has_children);
        assert_eq!(p.serialize_trace_tops(), tops);
    }

    #[test]
    fn callers_branch_where_paths_diverge() {
        let p = profile();
        let alloc = p.serialize_trace_tops()[0].id;
        assert_eq!(p.trace_ids(alloc).unwrap(), vec![3, 5]);
        let callers = p.serialize_callers(alloc).unwrap();
        assert!(callers.nodes_with_single_caller.is_empty());
        let names: Vec<_> = callers.branching_callers.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["main", "helper"]);
        let helper = &callers.branching_callers[1];
        assert_eq!(p.trace_ids(helper.id).unwrap(), vec![5]);
        let up = p.serialize_callers(helper.id).unwrap();
        let chain: Vec<_> = up.nodes_with_single_caller.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(chain, vec!["main", "(root)"]);
        assert!(up.branching_callers.is_empty());
    }

    #[test]
    fn stacks_walk_to_the_root() {
        let p = profile();
        let frames: Vec<_> = p
            .serialize_allocation_stack(5)
            .into_iter()
            .map(|f| f.function_name)
            .collect();
        assert_eq!(frames, vec!["alloc", "helper", "main", "(root)"]);
        assert!(p.serialize_allocation_stack(99).is_empty());
    }

    #[test]
    fn unknown_ids_are_errors() {
        let p = profile();
        assert_eq!(p.trace_ids(42).unwrap_err(), SnapshotError::UnknownAllocationNode(42));
    }
}
