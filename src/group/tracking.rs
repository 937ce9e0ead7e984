//! Load-time scratch records.
//!
//! [`Tracking`] holds one [`ScratchRecord`] per discovered key while a table
//! loads. The record buffer is reserved once from the upper bound of distinct
//! keys (every key in the tree plus every descriptor) and never grows past it,
//! so record indices handed out during discovery stay valid for the whole load.
//! Expressions and dependency edges live in two separate buffers; each record
//! owns a contiguous span of each. A name index beside the records keeps
//! lookups constant time.

use serde_yaml::{Mapping, Value};
use std::collections::HashMap;
use std::ops::Range;

use crate::expr::Expression;

/// Depth-first traversal mark.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Mark {
    Unvisited,
    InProgress,
    Done,
    DoneMulti,
}

/// How far discovery got for a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Discovery {
    /// Declared, not loaded yet.
    Pending,
    /// Referenced and waiting in the work list.
    Queued,
    /// Expressions compiled.
    Loaded,
    /// Not in the tree; the key has no expression.
    Absent,
    /// Loading reported an error.
    Failed,
}

#[derive(Debug)]
pub(crate) struct ScratchRecord {
    pub(crate) name: String,
    pub(crate) required: bool,
    pub(crate) multi: bool,
    pub(crate) discovery: Discovery,
    pub(crate) mark: Mark,
    pub(crate) exprs: Range<usize>,
    pub(crate) edges: Range<usize>,
}

pub(crate) struct Tracking<'t> {
    node: &'t Mapping,
    records: Vec<ScratchRecord>,
    by_name: HashMap<String, usize>,
    limit: usize,
    pub(crate) exprs: Vec<Expression>,
    pub(crate) edges: Vec<usize>,
}

impl<'t> Tracking<'t> {
    /// Tracking for keys of `node`, with `declared` descriptors.
    pub(crate) fn new(node: &'t Mapping, declared: usize) -> Self {
        let limit = node.len() + declared;
        Self {
            node,
            records: Vec::with_capacity(limit),
            by_name: HashMap::with_capacity(limit),
            limit,
            exprs: Vec::with_capacity(limit),
            edges: Vec::with_capacity(limit.saturating_sub(1)),
        }
    }

    /// Value of key `name` in the tree.
    pub(crate) fn value(&self, name: &str) -> Option<&'t Value> {
        self.node.get(name)
    }

    pub(crate) fn len(&self) -> usize {
        self.records.len()
    }

    pub(crate) fn find(&self, name: &str) -> Option<usize> {
        self.by_name.get(name).copied()
    }

    /// Index of the record for `name`, allocating one if needed.
    pub(crate) fn obtain(&mut self, name: &str) -> usize {
        match self.find(name) {
            Some(idx) => idx,
            None => self.alloc(name),
        }
    }

    fn alloc(&mut self, name: &str) -> usize {
        debug_assert!(self.records.len() < self.limit, "scratch record capacity exceeded");
        self.records.push(ScratchRecord {
            name: name.to_string(),
            required: false,
            multi: false,
            discovery: Discovery::Pending,
            mark: Mark::Unvisited,
            exprs: 0..0,
            edges: 0..0,
        });
        let idx = self.records.len() - 1;
        self.by_name.insert(name.to_string(), idx);
        idx
    }

    pub(crate) fn record(&self, idx: usize) -> &ScratchRecord {
        &self.records[idx]
    }

    pub(crate) fn record_mut(&mut self, idx: usize) -> &mut ScratchRecord {
        &mut self.records[idx]
    }

    /// Target record indices of the edges of record `idx`.
    #[cfg(test)]
    pub(crate) fn edges_of(&self, idx: usize) -> &[usize] {
        &self.edges[self.records[idx].edges.clone()]
    }

    /// Append `exprs` and `edges` as the spans of record `idx`.
    pub(crate) fn commit(&mut self, idx: usize, exprs: Vec<Expression>, edges: Vec<usize>) {
        let expr_start = self.exprs.len();
        self.exprs.extend(exprs);
        let edge_start = self.edges.len();
        self.edges.extend(edges);

        let record = &mut self.records[idx];
        record.exprs = expr_start..self.exprs.len();
        record.edges = edge_start..self.edges.len();
    }

    /// Consume the tracking, yielding the records and expression buffer.
    pub(crate) fn into_parts(self) -> (Vec<ScratchRecord>, Vec<Expression>, Vec<usize>) {
        (self.records, self.exprs, self.edges)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mapping(yaml: &str) -> Mapping {
        serde_yaml::from_str(yaml).unwrap()
    }

    #[test]
    fn test_obtain_is_stable() {
        let node = mapping("a: 1\nb: 2\n");
        let mut tracking = Tracking::new(&node, 1);
        let a = tracking.obtain("a");
        let b = tracking.obtain("b");
        assert_eq!(tracking.obtain("a"), a);
        assert_ne!(a, b);
        assert_eq!(tracking.len(), 2);
        assert_eq!(tracking.record(b).name, "b");
        assert_eq!(tracking.find("b"), Some(b));
        assert_eq!(tracking.find("c"), None);
        assert!(tracking.value("a").is_some());
        assert!(tracking.value("c").is_none());
    }

    #[test]
    fn test_commit_spans() {
        let node = mapping("a: 1\nb: 2\nc: 3\n");
        let mut tracking = Tracking::new(&node, 0);
        let a = tracking.obtain("a");
        let b = tracking.obtain("b");
        let c = tracking.obtain("c");

        tracking.commit(b, vec![Expression::literal("2")], vec![c]);
        tracking.commit(a, vec![Expression::literal("1")], vec![b, c]);

        assert_eq!(tracking.edges_of(a), &[b, c]);
        assert_eq!(tracking.edges_of(b), &[c]);
        assert!(tracking.edges_of(c).is_empty());
        assert_eq!(tracking.record(a).exprs, 1..2);
    }
}
