//! Configuration input.
//!
//! Feature tables load from YAML. A document usually holds several directive
//! nodes; [`select`] picks one of them by dotted path:
//!
//! ```yaml
//! upstream:
//!   proxy:
//!     url: "http://{this:host}:{this:port}/"
//!     host: "{var:host}"
//!     port: "{int:port}"
//! ```
//!
//! Here `select(&doc, "upstream.proxy")` yields the mapping with `url`, `host`
//! and `port`.
//!
//! # Modules
//!
//! - `parser` - YAML parsing with merge key support

pub mod parser;

pub use parser::{load_document, parse_document};

use serde_yaml::Value;

use crate::core::{FeatureError, Result};
use crate::group::Descriptor;

/// Node at dotted `path` below `root`. An empty path selects `root`.
pub fn select<'a>(root: &'a Value, path: &str) -> Result<&'a Value> {
    if path.is_empty() {
        return Ok(root);
    }
    path.split('.').try_fold(root, |node, segment| {
        let next = match node {
            Value::Sequence(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
            _ => node.get(segment),
        };
        next.ok_or_else(|| FeatureError::KeyPathNotFound {
            path: path.to_string(),
        })
    })
}

/// Names of the string keys of a mapping node, in document order.
#[must_use]
pub fn mapping_keys(node: &Value) -> Vec<String> {
    node.as_mapping()
        .map(|mapping| mapping.keys().filter_map(Value::as_str).map(str::to_string).collect())
        .unwrap_or_default()
}

/// Descriptors for every key of a mapping node, all optional.
#[must_use]
pub fn default_descriptors(node: &Value) -> Vec<Descriptor> {
    mapping_keys(node).into_iter().map(Descriptor::new).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc() -> Value {
        parse_document("upstream:\n  proxy:\n    url: u\n    host: h\n  list: [a, b]\n").unwrap()
    }

    #[test]
    fn test_select() {
        let doc = doc();
        let proxy = select(&doc, "upstream.proxy").unwrap();
        assert_eq!(mapping_keys(proxy), vec!["url", "host"]);
        assert_eq!(select(&doc, "upstream.list.1").unwrap().as_str(), Some("b"));
        assert!(std::ptr::eq(select(&doc, "").unwrap(), &doc));
    }

    #[test]
    fn test_select_missing() {
        let doc = doc();
        match select(&doc, "upstream.nope") {
            Err(FeatureError::KeyPathNotFound {
                path,
            }) => assert_eq!(path, "upstream.nope"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_default_descriptors() {
        let doc = doc();
        let descriptors = default_descriptors(select(&doc, "upstream.proxy").unwrap());
        assert_eq!(descriptors, vec![Descriptor::new("url"), Descriptor::new("host")]);
        assert!(default_descriptors(&Value::Null).is_empty());
    }
}
