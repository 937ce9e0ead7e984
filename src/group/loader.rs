//! Graph builder.
//!
//! Loads the requested keys from a mapping node, compiling their expressions and
//! following `{this:key}` references to discover every key reachable from them.
//! A referenced key is queued on first reference and an edge is recorded from
//! the referencing key to the referenced key. Discovery runs off an explicit
//! work list, so the depth of a reference chain is bounded by memory rather
//! than by the call stack.
//!
//! Errors for independent keys are collected rather than returned on the first
//! failure.

use serde_yaml::Value;
use tracing::{debug, trace};

use super::Descriptor;
use super::tracking::{Discovery, Tracking};
use crate::capability::Registry;
use crate::core::{FeatureError, Result};
use crate::expr::{ExprParser, ReferenceSink};

pub(crate) struct Loader<'a> {
    parser: ExprParser<'a>,
    pub(crate) tracking: Tracking<'a>,
    pub(crate) errors: Vec<FeatureError>,
    queue: Vec<usize>,
}

impl<'a> Loader<'a> {
    pub(crate) fn new(registry: &'a Registry, tracking: Tracking<'a>) -> Self {
        Self {
            parser: ExprParser::new(registry),
            tracking,
            errors: Vec::new(),
            queue: Vec::new(),
        }
    }

    /// Allocate records for every descriptor, then load each in order along
    /// with everything it references.
    pub(crate) fn load_declared(&mut self, descriptors: &[Descriptor]) {
        let declared: Vec<usize> = descriptors
            .iter()
            .map(|d| {
                let idx = self.tracking.obtain(d.name());
                let record = self.tracking.record_mut(idx);
                record.required |= d.is_required();
                record.multi |= d.is_multi();
                idx
            })
            .collect();

        for idx in declared {
            if self.tracking.record(idx).discovery == Discovery::Pending {
                self.enqueue(idx);
                self.drain();
            }
        }
    }

    fn enqueue(&mut self, idx: usize) {
        self.tracking.record_mut(idx).discovery = Discovery::Queued;
        self.queue.push(idx);
    }

    /// Load queued keys until none are left.
    fn drain(&mut self) {
        while let Some(idx) = self.queue.pop() {
            self.load_key(idx);
        }
    }

    /// Load the key of record `idx` from the tree.
    fn load_key(&mut self, idx: usize) {
        let record = self.tracking.record(idx);
        let name = record.name.clone();
        let (required, multi) = (record.required, record.multi);

        let Some(value) = self.tracking.value(&name) else {
            if required {
                self.errors.push(FeatureError::MissingRequiredKey {
                    key: name,
                });
                self.tracking.record_mut(idx).discovery = Discovery::Failed;
            } else {
                debug!("Optional key '{}' is absent", name);
                self.tracking.record_mut(idx).discovery = Discovery::Absent;
            }
            return;
        };

        let parser = self.parser;
        let mut exprs = Vec::new();
        let mut edges = Vec::new();
        let result = elements(value, multi).and_then(|texts| {
            let mut sink = KeySink {
                loader: &mut *self,
                from: idx,
                edges: &mut edges,
            };
            for text in texts {
                exprs.push(parser.compile(&text, &mut sink)?);
            }
            Ok(())
        });

        edges.sort_unstable();
        edges.dedup();
        let discovery = match result {
            Ok(()) => {
                debug!("Loaded key '{}' ({} format(s), {} edge(s))", name, exprs.len(), edges.len());
                Discovery::Loaded
            }
            Err(error) => {
                self.errors.push(error.in_key(&name));
                Discovery::Failed
            }
        };
        self.tracking.commit(idx, exprs, edges);
        self.tracking.record_mut(idx).discovery = discovery;
    }
}

/// Format strings held by a key's value.
///
/// MULTI keys take a sequence; a scalar is a singleton list.
pub(crate) fn elements(value: &Value, multi: bool) -> Result<Vec<String>> {
    match value {
        Value::Sequence(items) if multi => items.iter().map(scalar_text).collect(),
        Value::Sequence(_) => Err(FeatureError::InvalidNode {
            expected: "scalar",
            found: node_kind(value),
        }),
        scalar => Ok(vec![scalar_text(scalar)?]),
    }
}

/// Text of a scalar node. Null is the empty string.
pub(crate) fn scalar_text(value: &Value) -> Result<String> {
    match value {
        Value::Null => Ok(String::new()),
        Value::Bool(b) => Ok(b.to_string()),
        Value::Number(n) => Ok(n.to_string()),
        Value::String(s) => Ok(s.clone()),
        other => Err(FeatureError::InvalidNode {
            expected: "scalar",
            found: node_kind(other),
        }),
    }
}

/// Human readable kind of a node.
#[must_use]
pub fn node_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Sequence(_) => "sequence",
        Value::Mapping(_) => "mapping",
        Value::Tagged(_) => "tagged value",
    }
}

/// Resolves `{this:key}` for the key being loaded.
struct KeySink<'l, 'a> {
    loader: &'l mut Loader<'a>,
    from: usize,
    edges: &'l mut Vec<usize>,
}

impl ReferenceSink for KeySink<'_, '_> {
    fn reference(&mut self, name: &str, _position: usize) -> Result<usize> {
        let tracking = &mut self.loader.tracking;
        let target = match tracking.find(name) {
            Some(target) => target,
            None if tracking.value(name).is_some() => tracking.obtain(name),
            None => {
                return Err(FeatureError::MissingReferencedKey {
                    key: tracking.record(self.from).name.clone(),
                    target: name.to_string(),
                });
            }
        };

        if tracking.record(target).discovery == Discovery::Pending {
            self.loader.enqueue(target);
        }

        trace!("Edge '{}' -> '{}'", self.loader.tracking.record(self.from).name, name);
        self.edges.push(target);
        Ok(target)
    }
}
