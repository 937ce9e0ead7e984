//! Persisted feature table.
//!
//! Loading turns a configuration node into a [`FeatureTable`]: one
//! [`KeyRecord`] per key, stored in evaluation order so every key comes after
//! all of its dependencies, and a single shared edge array that each record
//! indexes by span. After load the table is immutable and can be shared between
//! threads; per-request state lives in [`RequestContext`].
//!
//! [`RequestContext`]: crate::context::RequestContext

use serde_yaml::Value;
use std::fmt;
use std::ops::Range;
use tracing::{debug, warn};

use super::loader::{Loader, elements, node_kind};
use super::tracking::{Discovery, ScratchRecord, Tracking};
use super::{CrossReference, Descriptor, resolver};
use crate::capability::Registry;
use crate::context::TableId;
use crate::core::{FeatureError, LoadErrors};
use crate::expr::{ExprParser, Expression, NoCrossReference};
use crate::feature::ValueType;

/// Index of a key in a [`FeatureTable`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct KeyIndex(u16);

impl KeyIndex {
    /// Index as a `usize`.
    #[must_use]
    pub const fn get(self) -> usize {
        self.0 as usize
    }

    pub(crate) fn from_usize(index: usize) -> Self {
        debug_assert!(index <= usize::from(u16::MAX), "key index {index} out of range");
        Self(u16::try_from(index).unwrap_or(u16::MAX))
    }
}

impl From<u16> for KeyIndex {
    fn from(index: u16) -> Self {
        Self(index)
    }
}

impl fmt::Display for KeyIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Compiled value of a key.
#[derive(Debug, Clone)]
pub enum KeyExpr {
    /// No expression; the key resolves to nil.
    Nil,
    /// One expression.
    Single(Expression),
    /// One expression per list element.
    Multi(Vec<Expression>),
}

/// One key of a loaded table.
#[derive(Debug, Clone)]
pub struct KeyRecord {
    name: String,
    dependencies: Range<usize>,
    expr: KeyExpr,
    result_type: ValueType,
    reads_request: bool,
}

impl KeyRecord {
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub const fn expr(&self) -> &KeyExpr {
        &self.expr
    }

    /// Statically known type of the key's value.
    #[must_use]
    pub const fn result_type(&self) -> ValueType {
        self.result_type
    }

    /// Whether the value depends on request state, directly or through a
    /// dependency. A key that does not resolves the same on every request.
    #[must_use]
    pub const fn reads_request(&self) -> bool {
        self.reads_request
    }

    #[must_use]
    pub const fn is_multi(&self) -> bool {
        matches!(self.expr, KeyExpr::Multi(_))
    }
}

/// Immutable, index-addressed set of keys loaded from one configuration node.
#[derive(Debug)]
pub struct FeatureTable {
    pub(crate) id: TableId,
    pub(crate) keys: Vec<KeyRecord>,
    edges: Vec<KeyIndex>,
    pub(crate) this: CrossReference,
}

impl FeatureTable {
    /// Load `descriptors` from the mapping `tree`.
    ///
    /// Keys referenced through `{this:key}` are discovered and loaded as well.
    /// Per-key problems are collected and returned together; a dependency cycle
    /// or a dependency on a multi-valued key is returned on its own.
    pub fn load(
        registry: &Registry,
        tree: &Value,
        descriptors: &[Descriptor],
    ) -> Result<Self, LoadErrors> {
        let Value::Mapping(node) = tree else {
            return Err(FeatureError::InvalidNode {
                expected: "mapping",
                found: node_kind(tree),
            }
            .into());
        };

        let mut loader = Loader::new(registry, Tracking::new(node, descriptors.len()));
        loader.load_declared(descriptors);
        if !loader.errors.is_empty() {
            return Err(loader.errors.into());
        }

        let mut tracking = loader.tracking;
        let order = resolver::evaluation_order(&mut tracking)?;
        Ok(Self::from_tracking(tracking, &order)?)
    }

    /// Load `descriptors` positionally from a list (or a single scalar).
    ///
    /// Keys of a tuple are independent, so cross-references are rejected. A
    /// REQUIRED descriptor makes every earlier descriptor required as well.
    /// Elements past the last descriptor are ignored.
    pub fn load_as_tuple(
        registry: &Registry,
        tree: &Value,
        descriptors: &[Descriptor],
    ) -> Result<Self, LoadErrors> {
        let items: Vec<&Value> = match tree {
            Value::Mapping(_) => {
                return Err(FeatureError::InvalidNode {
                    expected: "scalar or sequence",
                    found: node_kind(tree),
                }
                .into());
            }
            Value::Sequence(items) => items.iter().collect(),
            scalar => vec![scalar],
        };
        check_key_count(descriptors.len())?;

        if items.len() > descriptors.len() {
            warn!(
                "Ignoring {} element(s) beyond the {} declared key(s)",
                items.len() - descriptors.len(),
                descriptors.len()
            );
        }

        let parser = ExprParser::new(registry);
        let last_required = descriptors.iter().rposition(Descriptor::is_required);
        let mut errors = LoadErrors::new();
        let mut keys = Vec::with_capacity(descriptors.len());

        for (position, descriptor) in descriptors.iter().enumerate() {
            let required = last_required.is_some_and(|last| position <= last);
            let expr = match items.get(position) {
                Some(value) => match compile_element(parser, value, descriptor.is_multi()) {
                    Ok(expr) => expr,
                    Err(error) => {
                        errors.push(error.in_key(descriptor.name()));
                        KeyExpr::Nil
                    }
                },
                None if required => {
                    errors.push(FeatureError::MissingRequiredKey {
                        key: descriptor.name().to_string(),
                    });
                    KeyExpr::Nil
                }
                None => KeyExpr::Nil,
            };
            let result_type = static_type(&expr, &keys);
            let reads_request = reads_request(&expr, &[], &keys);
            keys.push(KeyRecord {
                name: descriptor.name().to_string(),
                dependencies: 0..0,
                expr,
                result_type,
                reads_request,
            });
        }

        if !errors.is_empty() {
            return Err(errors);
        }
        let table = Self {
            id: TableId::next(),
            keys,
            edges: Vec::new(),
            this: CrossReference,
        };
        debug!("Loaded tuple of {} key(s)", table.len());
        Ok(table)
    }

    /// Build the table from resolved scratch records.
    ///
    /// `order` lists scratch indices dependencies first; key `i` of the table is
    /// scratch record `order[i]`.
    fn from_tracking(tracking: Tracking<'_>, order: &[usize]) -> Result<Self, FeatureError> {
        check_key_count(order.len())?;
        let (records, exprs, scratch_edges) = tracking.into_parts();

        let mut remap = vec![0; records.len()];
        for (index, &scratch) in order.iter().enumerate() {
            remap[scratch] = index;
        }

        let mut exprs: Vec<Option<Expression>> = exprs.into_iter().map(Some).collect();
        let mut keys: Vec<KeyRecord> = Vec::with_capacity(order.len());
        let mut edges = Vec::with_capacity(scratch_edges.len());

        for &scratch in order {
            let record = &records[scratch];
            let start = edges.len();
            edges.extend(
                scratch_edges[record.edges.clone()]
                    .iter()
                    .map(|&target| KeyIndex::from_usize(remap[target])),
            );

            let mut compiled: Vec<Expression> =
                record.exprs.clone().filter_map(|i| exprs[i].take()).collect();
            for expr in &mut compiled {
                expr.remap_cross_refs(&remap);
            }
            let expr = key_expr(record, compiled);
            let result_type = static_type(&expr, &keys);
            let reads_request = reads_request(&expr, &edges[start..], &keys);

            keys.push(KeyRecord {
                name: record.name.clone(),
                dependencies: start..edges.len(),
                expr,
                result_type,
                reads_request,
            });
        }

        let table = Self {
            id: TableId::next(),
            keys,
            edges,
            this: CrossReference,
        };
        debug!(
            "Loaded feature table with {} key(s) and {} edge(s)",
            table.len(),
            table.edges.len()
        );
        Ok(table)
    }

    /// Process-unique identity of this table.
    #[must_use]
    pub const fn id(&self) -> TableId {
        self.id
    }

    /// Index of key `name`.
    #[must_use]
    pub fn index_of(&self, name: &str) -> Option<KeyIndex> {
        self.keys.iter().position(|key| key.name == name).map(KeyIndex::from_usize)
    }

    /// Key at `index`.
    #[must_use]
    pub fn key(&self, index: KeyIndex) -> Option<&KeyRecord> {
        self.keys.get(index.get())
    }

    /// Number of keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Key names, in evaluation order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.keys.iter().map(KeyRecord::name)
    }

    /// Key indices, in evaluation order.
    pub fn order(&self) -> impl Iterator<Item = KeyIndex> {
        (0..self.keys.len()).map(KeyIndex::from_usize)
    }

    /// Keys that key `index` references directly.
    #[must_use]
    pub fn dependencies(&self, index: KeyIndex) -> &[KeyIndex] {
        match self.keys.get(index.get()) {
            Some(key) => &self.edges[key.dependencies.clone()],
            None => &[],
        }
    }

    /// Static type of key `index`.
    #[must_use]
    pub fn result_type(&self, index: KeyIndex) -> Option<ValueType> {
        self.key(index).map(KeyRecord::result_type)
    }
}

fn check_key_count(count: usize) -> Result<(), FeatureError> {
    if count > usize::from(u16::MAX) {
        return Err(FeatureError::TooManyKeys {
            count,
        });
    }
    Ok(())
}

fn key_expr(record: &ScratchRecord, mut compiled: Vec<Expression>) -> KeyExpr {
    if record.discovery == Discovery::Absent || compiled.is_empty() {
        return KeyExpr::Nil;
    }
    if record.multi {
        return KeyExpr::Multi(compiled);
    }
    compiled.pop().map_or(KeyExpr::Nil, KeyExpr::Single)
}

/// Type of `expr`, given the already built keys it may reference.
fn static_type(expr: &KeyExpr, keys: &[KeyRecord]) -> ValueType {
    match expr {
        KeyExpr::Nil => ValueType::Nil,
        KeyExpr::Multi(_) => ValueType::Tuple,
        KeyExpr::Single(expr) => expr.result_type(|xref| CrossReference.result_type(keys, xref)),
    }
}

/// Whether `expr` reads request state itself or through one of `dependencies`.
fn reads_request(expr: &KeyExpr, dependencies: &[KeyIndex], keys: &[KeyRecord]) -> bool {
    let direct = match expr {
        KeyExpr::Nil => false,
        KeyExpr::Single(expr) => expr.has_ctx_ref(),
        KeyExpr::Multi(exprs) => exprs.iter().any(Expression::has_ctx_ref),
    };
    direct || dependencies.iter().any(|dep| keys.get(dep.get()).is_some_and(KeyRecord::reads_request))
}

fn compile_element(
    parser: ExprParser<'_>,
    value: &Value,
    multi: bool,
) -> Result<KeyExpr, FeatureError> {
    let mut compiled = elements(value, multi)?
        .iter()
        .map(|text| parser.compile(text, &mut NoCrossReference))
        .collect::<Result<Vec<_>, _>>()?;
    if multi {
        return Ok(KeyExpr::Multi(compiled));
    }
    Ok(compiled.pop().map_or(KeyExpr::Nil, KeyExpr::Single))
}
