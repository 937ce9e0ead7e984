//! Compiled format expressions.
//!
//! A format string such as `"{var:host}:{int:port}"` compiles to an
//! [`Expression`]: an ordered list of [`Specifier`]s, each either literal text,
//! a reference to a registered capability, or a cross-reference to another key of
//! the same feature table (`{this:key}`).
//!
//! Compilation happens once at load time, in [`parser`].

pub mod parser;

pub use parser::{ExprParser, NoCrossReference, ReferenceSink};

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use crate::capability::{Capability, SpecData};
use crate::feature::ValueType;

/// Capability reference within an expression.
#[derive(Clone)]
pub struct CapabilitySpec {
    capability: Arc<dyn Capability>,
    arg: String,
    data: Option<SpecData>,
    position: usize,
}

impl CapabilitySpec {
    pub(crate) fn new(
        capability: Arc<dyn Capability>,
        arg: impl Into<String>,
        data: Option<SpecData>,
        position: usize,
    ) -> Self {
        Self {
            capability,
            arg: arg.into(),
            data,
            position,
        }
    }

    /// The referenced capability.
    #[must_use]
    pub fn capability(&self) -> &Arc<dyn Capability> {
        &self.capability
    }

    /// Argument text, verbatim from the format string.
    #[must_use]
    pub fn arg(&self) -> &str {
        &self.arg
    }

    /// Data attached by the capability's validation hook, if it has type `T`.
    #[must_use]
    pub fn data<T: Any>(&self) -> Option<&T> {
        self.data.as_deref().and_then(|data| (data as &dyn Any).downcast_ref::<T>())
    }

    /// Byte offset of the reference in the format string.
    #[must_use]
    pub const fn position(&self) -> usize {
        self.position
    }
}

impl fmt::Debug for CapabilitySpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CapabilitySpec")
            .field("capability", &self.capability.name())
            .field("arg", &self.arg)
            .field("has_data", &self.data.is_some())
            .field("position", &self.position)
            .finish()
    }
}

/// Reference to another key of the same feature table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrossRefSpec {
    name: String,
    index: usize,
    position: usize,
}

impl CrossRefSpec {
    pub(crate) fn new(name: impl Into<String>, index: usize, position: usize) -> Self {
        Self {
            name: name.into(),
            index,
            position,
        }
    }

    /// Referenced key name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Index of the referenced key.
    ///
    /// While a table is loading this is a scratch record index; once the table is
    /// built it is the key's index in the table.
    #[must_use]
    pub const fn index(&self) -> usize {
        self.index
    }

    /// Byte offset of the reference in the format string.
    #[must_use]
    pub const fn position(&self) -> usize {
        self.position
    }
}

/// One element of a compiled expression.
#[derive(Debug, Clone)]
pub enum Specifier {
    /// Literal text.
    Literal(Arc<str>),
    /// Registered capability.
    Capability(CapabilitySpec),
    /// Another key of the same table.
    CrossRef(CrossRefSpec),
}

/// A compiled format string.
#[derive(Debug, Clone)]
pub struct Expression {
    specs: Vec<Specifier>,
    literal: bool,
}

impl Expression {
    /// A pure-literal expression.
    pub fn literal(text: impl Into<Arc<str>>) -> Self {
        Self {
            specs: vec![Specifier::Literal(text.into())],
            literal: true,
        }
    }

    pub(crate) fn from_specs(specs: Vec<Specifier>) -> Self {
        if specs.is_empty() {
            return Self::literal("");
        }
        let literal = matches!(specs.as_slice(), [Specifier::Literal(_)]);
        Self {
            specs,
            literal,
        }
    }

    /// Whether this is exactly one literal run.
    #[must_use]
    pub const fn is_literal(&self) -> bool {
        self.literal
    }

    /// The text of a pure-literal expression.
    #[must_use]
    pub fn literal_text(&self) -> Option<&Arc<str>> {
        match (self.literal, self.specs.first()) {
            (true, Some(Specifier::Literal(text))) => Some(text),
            _ => None,
        }
    }

    /// The specifiers, in order.
    #[must_use]
    pub fn specs(&self) -> &[Specifier] {
        &self.specs
    }

    /// Cross-references in this expression.
    pub fn cross_refs(&self) -> impl Iterator<Item = &CrossRefSpec> {
        self.specs.iter().filter_map(|spec| match spec {
            Specifier::CrossRef(xref) => Some(xref),
            _ => None,
        })
    }

    /// Whether any specifier reads request state.
    #[must_use]
    pub fn has_ctx_ref(&self) -> bool {
        self.specs.iter().any(|spec| match spec {
            Specifier::Capability(cap) => cap.capability.has_ctx_ref(),
            _ => false,
        })
    }

    /// Rewrite cross-reference indices through `map` (old index → new index).
    pub(crate) fn remap_cross_refs(&mut self, map: &[usize]) {
        for spec in &mut self.specs {
            if let Specifier::CrossRef(xref) = spec {
                xref.index = map[xref.index];
            }
        }
    }

    /// Static result type; `key_type` gives the type of a cross-referenced key.
    pub fn result_type(&self, key_type: impl Fn(&CrossRefSpec) -> ValueType) -> ValueType {
        match self.specs.as_slice() {
            [Specifier::Capability(cap)] => cap.capability.result_type(),
            [Specifier::CrossRef(xref)] => key_type(xref),
            _ => ValueType::String,
        }
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for spec in &self.specs {
            match spec {
                Specifier::Literal(text) => {
                    f.write_str(&text.replace('{', "{{").replace('}', "}}"))?;
                }
                Specifier::Capability(cap) if cap.arg.is_empty() => {
                    write!(f, "{{{}}}", cap.capability.name())?;
                }
                Specifier::Capability(cap) => {
                    write!(f, "{{{}:{}}}", cap.capability.name(), cap.arg)?;
                }
                Specifier::CrossRef(xref) => {
                    write!(f, "{{{}:{}}}", crate::capability::CROSS_REFERENCE, xref.name)?;
                }
            }
        }
        Ok(())
    }
}
