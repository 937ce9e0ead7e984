//! Request-scoped state.
//!
//! [`RequestContext`] is the store a request hands to the evaluation engine. It
//! holds the request data capabilities read from (variables and the remote
//! address) and the per-request evaluation caches.
//!
//! Feature tables are shared read-only between requests, so every value cached
//! during an evaluation pass lives here, keyed by the table's [`TableId`], and
//! never in the table itself.

use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::feature::Feature;

static NEXT_TABLE_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique identity of a loaded feature table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TableId(u64);

impl TableId {
    pub(crate) fn next() -> Self {
        Self(NEXT_TABLE_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// Evaluation state of one key during one request pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EvalState {
    /// Not evaluated yet in this pass.
    #[default]
    Unvisited,
    /// Evaluation has started.
    InProgress,
    /// Single value computed and cached.
    Done,
    /// List produced, not cached.
    DoneMulti,
}

#[derive(Debug, Default)]
pub(crate) struct Slot {
    pub(crate) state: EvalState,
    pub(crate) value: Feature,
}

/// Per-request state consumed by capabilities and the evaluation engine.
#[derive(Debug, Default)]
pub struct RequestContext {
    vars: HashMap<String, Arc<str>>,
    remote_addr: Option<IpAddr>,
    passes: HashMap<TableId, Vec<Slot>>,
}

impl RequestContext {
    /// Create an empty context.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a request variable.
    pub fn set_var(&mut self, name: impl Into<String>, value: impl Into<Arc<str>>) {
        self.vars.insert(name.into(), value.into());
    }

    /// Remove a request variable.
    pub fn remove_var(&mut self, name: &str) -> Option<Arc<str>> {
        self.vars.remove(name)
    }

    /// Look up a request variable.
    #[must_use]
    pub fn var(&self, name: &str) -> Option<&Arc<str>> {
        self.vars.get(name)
    }

    /// Set the remote address of the request.
    pub fn set_remote_addr(&mut self, addr: IpAddr) {
        self.remote_addr = Some(addr);
    }

    /// The remote address of the request, if known.
    #[must_use]
    pub const fn remote_addr(&self) -> Option<IpAddr> {
        self.remote_addr
    }

    /// Drop every cached value so the next resolution starts a fresh pass.
    pub fn reset_evaluation(&mut self) {
        self.passes.clear();
    }

    /// Evaluation state of key `index` of `table` in the current pass.
    #[must_use]
    pub fn eval_state(&self, table: TableId, index: usize) -> EvalState {
        self.passes
            .get(&table)
            .and_then(|slots| slots.get(index))
            .map_or(EvalState::Unvisited, |slot| slot.state)
    }

    pub(crate) fn slot_mut(&mut self, table: TableId, len: usize, index: usize) -> &mut Slot {
        let slots = self.passes.entry(table).or_insert_with(|| {
            let mut slots = Vec::with_capacity(len);
            slots.resize_with(len, Slot::default);
            slots
        });
        &mut slots[index]
    }
}
