//! featgroup - dependency-ordered, memoized feature extraction
//!
//! A feature table is a set of named keys read from a configuration node. Each
//! key holds a format expression mixing literal text with references to
//! registered extraction capabilities (`{var:host}`, `{int:port}`) and to other
//! keys of the same table (`{this:host}`). At load time the table compiles
//! every expression, discovers which keys reference which, rejects cycles and
//! computes an evaluation order. At request time keys resolve lazily against a
//! [`context::RequestContext`], each at most once per pass.
//!
//! Loaded tables are immutable and shared read-only between concurrent
//! requests; every per-request cache lives in the request context.
//!
//! # Core Modules
//!
//! - [`capability`] - Capability trait, registry and builtin capabilities
//! - [`expr`] - Format expression compiler
//! - [`group`] - Feature table loading, dependency ordering and evaluation
//! - [`feature`] - Typed feature values
//! - [`context`] - Request state and per-request evaluation caches
//!
//! ## Supporting Modules
//!
//! - [`config`] - YAML document loading and node selection
//! - [`core`] - Error types and user-facing error rendering
//! - [`cli`] - The `featgroup` command-line interface
//!
//! # Example
//!
//! ```yaml
//! proxy:
//!   url: "http://{this:host}:{this:port}/"
//!   host: "{var:host}"
//!   port: "{int:port}"
//! ```
//!
//! ```bash
//! featgroup eval features.yaml --key proxy --var host=example.com --var port=8080
//! ```

pub mod capability;
pub mod cli;
pub mod config;
pub mod context;
pub mod core;
pub mod expr;
pub mod feature;
pub mod group;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
