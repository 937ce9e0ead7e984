//! Fixture capabilities.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::capability::Capability;
use crate::context::RequestContext;
use crate::expr::CapabilitySpec;
use crate::feature::{Feature, FeatureText, ValueType};

/// Capability that counts its extractions.
///
/// Produces the argument text as a transient view, so tests can also check
/// that cached values are localized.
#[derive(Debug)]
pub struct Counting {
    name: &'static str,
    calls: Arc<AtomicUsize>,
}

impl Counting {
    /// A counting capability registered as `name`.
    #[must_use]
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Handle on the call counter, usable after the capability is registered.
    #[must_use]
    pub fn counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.calls)
    }
}

impl Capability for Counting {
    fn name(&self) -> &str {
        self.name
    }

    fn result_type(&self) -> ValueType {
        ValueType::String
    }

    fn is_direct(&self) -> bool {
        true
    }

    fn extract(&self, _ctx: &RequestContext, spec: &CapabilitySpec) -> Option<Feature> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Some(Feature::String(FeatureText::transient(Arc::from(spec.arg()))))
    }
}

/// Capability whose data is never present.
#[derive(Debug)]
pub struct Failing;

impl Capability for Failing {
    fn name(&self) -> &str {
        "absent"
    }

    fn result_type(&self) -> ValueType {
        ValueType::Integer
    }

    fn extract(&self, _ctx: &RequestContext, _spec: &CapabilitySpec) -> Option<Feature> {
        None
    }
}

/// Capability with a value that cannot be rendered into a larger string.
#[derive(Debug)]
pub struct Unrenderable;

impl Capability for Unrenderable {
    fn name(&self) -> &str {
        "unrenderable"
    }

    fn result_type(&self) -> ValueType {
        ValueType::String
    }

    fn extract(&self, _ctx: &RequestContext, _spec: &CapabilitySpec) -> Option<Feature> {
        Some(Feature::from("whole"))
    }

    fn format(
        &self,
        _out: &mut dyn fmt::Write,
        _ctx: &RequestContext,
        _spec: &CapabilitySpec,
    ) -> fmt::Result {
        Err(fmt::Error)
    }
}
