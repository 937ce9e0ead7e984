//! The `this` capability.
//!
//! Each feature table owns one [`CrossReference`], bound to that table: it
//! produces the value of another key of the same table. Values it hands out
//! are scoped views of the referenced key's cached value, which stays valid for
//! the rest of the request.

use super::{FeatureTable, KeyIndex, KeyRecord};
use crate::capability::CROSS_REFERENCE;
use crate::context::RequestContext;
use crate::core::Result;
use crate::expr::CrossRefSpec;
use crate::feature::{Feature, FeatureText, ValueType};

/// Cross-reference capability of one feature table.
#[derive(Debug, Default, Clone, Copy)]
pub struct CrossReference;

impl CrossReference {
    /// Name used in format strings.
    pub const NAME: &'static str = CROSS_REFERENCE;

    #[must_use]
    pub const fn name(&self) -> &'static str {
        Self::NAME
    }

    /// Static type of the referenced key, given the keys built so far.
    ///
    /// Keys are built in evaluation order, so a referenced key is always among
    /// `keys`.
    #[must_use]
    pub fn result_type(&self, keys: &[KeyRecord], xref: &CrossRefSpec) -> ValueType {
        keys.get(xref.index()).map_or(ValueType::Nil, KeyRecord::result_type)
    }

    /// Value of the referenced key, resolving it first if needed.
    pub(crate) fn extract(
        &self,
        table: &FeatureTable,
        ctx: &mut RequestContext,
        xref: &CrossRefSpec,
    ) -> Result<Feature> {
        let value = table.resolve(ctx, KeyIndex::from_usize(xref.index()))?;
        Ok(match value {
            Feature::String(text) => Feature::String(FeatureText::scoped(text.shared())),
            other => other,
        })
    }
}
