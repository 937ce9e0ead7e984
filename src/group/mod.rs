//! Feature groups.
//!
//! A [`FeatureTable`] is the set of keys a directive reads from its
//! configuration node, compiled once at load time and evaluated per request.
//! Keys may reference each other with `{this:key}`; loading discovers those
//! references, rejects cycles and computes an order in which every key comes
//! after its dependencies.
//!
//! # Loading
//!
//! - [`FeatureTable::load`] reads named keys from a mapping. Keys referenced by
//!   other keys are loaded as well, even when they were not declared.
//! - [`FeatureTable::load_as_tuple`] reads keys positionally from a list. Keys
//!   are independent and cross-references are rejected.
//!
//! # Evaluation
//!
//! ```rust,no_run
//! use featgroup::capability::{Registry, register_builtins};
//! use featgroup::context::RequestContext;
//! use featgroup::group::{Descriptor, FeatureTable};
//!
//! # fn main() -> anyhow::Result<()> {
//! let registry = Registry::new();
//! register_builtins(&registry)?;
//!
//! let tree = serde_yaml::from_str("url: \"http://{this:host}/\"\nhost: \"{var:host}\"")?;
//! let table = FeatureTable::load(&registry, &tree, &[Descriptor::new("url").required()])?;
//!
//! let mut ctx = RequestContext::new();
//! ctx.set_var("host", "example.com");
//! assert_eq!(table.resolve_name(&mut ctx, "url")?.to_string(), "http://example.com/");
//! # Ok(())
//! # }
//! ```

mod descriptor;
mod eval;
mod loader;
mod resolver;
mod table;
mod tracking;
mod xref;

pub use descriptor::{Descriptor, Flag};
pub use loader::node_kind;
pub use table::{FeatureTable, KeyExpr, KeyIndex, KeyRecord};
pub use xref::CrossReference;
