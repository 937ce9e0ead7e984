//! Test utilities for featgroup
//!
//! Helpers shared by unit and integration tests: once-only logging setup,
//! registries preloaded with the builtin capabilities, YAML helpers and fixture
//! capabilities that record how often they run.
//!
//! # Example
//!
//! ```rust,no_run
//! use featgroup::group::{Descriptor, FeatureTable};
//! use featgroup::test_utils::{registry_with_builtins, yaml};
//!
//! let registry = registry_with_builtins();
//! let tree = yaml("greeting: hello");
//! let table = FeatureTable::load(&registry, &tree, &[Descriptor::new("greeting")]).unwrap();
//! assert_eq!(table.len(), 1);
//! ```

pub mod fixtures;

pub use fixtures::{Counting, Failing, Unrenderable};

use serde_yaml::Value;
use std::sync::Once;
use tracing::Level;
use tracing_subscriber::EnvFilter;

use crate::capability::{Registry, register_builtins};

/// Global flag to ensure logging is only initialized once in tests
static INIT_LOGGING: Once = Once::new();

/// Initialize logging for tests.
///
/// Only the first call has an effect. Uses `level` if given, otherwise
/// `RUST_LOG` if set; with neither, logging stays off.
///
/// ```bash
/// RUST_LOG=featgroup=trace cargo test
/// ```
pub fn init_test_logging(level: Option<Level>) {
    INIT_LOGGING.call_once(|| {
        let filter = if let Some(level) = level {
            EnvFilter::new(level.to_string())
        } else if std::env::var("RUST_LOG").is_ok() {
            EnvFilter::from_default_env()
        } else {
            return;
        };

        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .with_target(true)
            .with_thread_ids(false)
            .try_init();
    });
}

/// A fresh registry with the builtin capabilities.
///
/// # Panics
///
/// Panics if the builtins fail to register.
#[must_use]
pub fn registry_with_builtins() -> Registry {
    let registry = Registry::new();
    register_builtins(&registry).expect("builtins register into an empty registry");
    registry
}

/// Parse YAML test input.
///
/// # Panics
///
/// Panics on invalid YAML.
#[must_use]
pub fn yaml(text: &str) -> Value {
    serde_yaml::from_str(text).expect("test YAML parses")
}
