//! Extraction capabilities.
//!
//! A [`Capability`] is a named, stateless producer of [`Feature`] values. Format
//! strings reference capabilities as `{name}` or `{name:argument}`; the
//! expression compiler looks the name up in a [`Registry`] and calls
//! [`Capability::validate`] with the argument text once, at load time. At
//! request time the engine calls [`Capability::extract`] (when the capability is
//! the whole expression) or [`Capability::format`] (when it is part of a larger
//! string).
//!
//! # Implementing a capability
//!
//! ```rust,no_run
//! use featgroup::capability::Capability;
//! use featgroup::context::RequestContext;
//! use featgroup::expr::CapabilitySpec;
//! use featgroup::feature::{Feature, ValueType};
//!
//! #[derive(Debug)]
//! struct Method;
//!
//! impl Capability for Method {
//!     fn name(&self) -> &str {
//!         "method"
//!     }
//!
//!     fn result_type(&self) -> ValueType {
//!         ValueType::String
//!     }
//!
//!     fn extract(&self, ctx: &RequestContext, _spec: &CapabilitySpec) -> Option<Feature> {
//!         ctx.var("method").map(|m| Feature::from(&**m))
//!     }
//! }
//! ```

pub mod builtin;
pub mod registry;

pub use builtin::register_builtins;
pub use registry::Registry;

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use crate::context::RequestContext;
use crate::expr::CapabilitySpec;
use crate::feature::{Feature, ValueType};

/// Name reserved for referencing another key of the same feature table.
pub const CROSS_REFERENCE: &str = "this";

/// Opaque per-use configuration attached to a specifier by [`Capability::validate`].
pub type SpecData = Arc<dyn Any + Send + Sync>;

/// A registered producer and renderer of feature values.
///
/// Implementations are shared between every configuration and every request, so
/// they hold no per-request state. `extract` and `format` run synchronously
/// inside a request and must not block.
pub trait Capability: fmt::Debug + Send + Sync {
    /// Name used in format strings.
    fn name(&self) -> &str;

    /// The kind of value [`Capability::extract`] produces.
    fn result_type(&self) -> ValueType;

    /// Whether extracted text is a view of request state rather than a copy.
    fn is_direct(&self) -> bool {
        false
    }

    /// Whether the capability reads mutable request state.
    fn has_ctx_ref(&self) -> bool {
        false
    }

    /// Check the reference argument at load time.
    ///
    /// Returned data is attached to the specifier and available to `extract`
    /// through [`CapabilitySpec::data`]. An `Err` message fails the load.
    fn validate(&self, _arg: &str) -> Result<Option<SpecData>, String> {
        Ok(None)
    }

    /// Produce the value for the current request.
    ///
    /// `None` means the data is not present on this request; the engine turns
    /// that into [`Feature::Nil`].
    fn extract(&self, ctx: &RequestContext, spec: &CapabilitySpec) -> Option<Feature>;

    /// Append the text form of the value to `out`.
    fn format(
        &self,
        out: &mut dyn fmt::Write,
        ctx: &RequestContext,
        spec: &CapabilitySpec,
    ) -> fmt::Result {
        match self.extract(ctx, spec) {
            Some(feature) => write!(out, "{feature}"),
            None => Ok(()),
        }
    }
}
