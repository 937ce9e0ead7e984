//! Error handling for featgroup
//!
//! This module provides the error types returned while registering capabilities,
//! compiling expressions, loading feature tables and resolving keys, plus the
//! user-facing presentation used by the CLI.
//!
//! # Architecture
//!
//! - [`FeatureError`] - Enumerated error types for every failure mode
//! - [`LoadErrors`] - The collected list of problems from one load attempt
//! - [`ErrorContext`] - Wrapper that adds user-friendly details and suggestions
//!
//! # Load-time vs request-time
//!
//! Loading a table reports every independent problem it finds (a missing key, a
//! bad expression in another key) as one [`LoadErrors`] value. Structural
//! violations found while ordering the graph ([`FeatureError::DependencyCycle`],
//! [`FeatureError::MultiValuedDependency`]) abort the load on their own.
//!
//! Request-time resolution only fails for caller mistakes such as an
//! undeclared key name or an out-of-range index.
//!
//! # Examples
//!
//! ```rust,no_run
//! use featgroup::core::{FeatureError, user_friendly_error};
//!
//! let error = FeatureError::MissingRequiredKey {
//!     key: "upstream".to_string(),
//! };
//! let ctx = user_friendly_error(anyhow::Error::from(error));
//! ctx.display();
//! ```

use colored::Colorize;
use std::fmt;
use thiserror::Error;

/// Result type alias for featgroup operations.
pub type Result<T> = std::result::Result<T, FeatureError>;

/// The main error type for featgroup operations.
///
/// # Error Categories
///
/// ## Configuration
/// - [`MissingRequiredKey`] - A REQUIRED key is absent from the tree
/// - [`MissingReferencedKey`] - A cross-reference names a key that does not exist
/// - [`InvalidNode`] - A node has the wrong shape (mapping vs list vs scalar)
/// - [`KeyPathNotFound`] - A dotted root key path does not exist in the document
///
/// ## Expressions
/// - [`MalformedExpression`] - Format string syntax error
/// - [`UnknownCapability`] - Reference to an unregistered capability
/// - [`ValidationFailed`] - A capability rejected its argument
/// - [`CrossReferenceNotAllowed`] - Cross-reference used where keys are independent
///
/// ## Dependency graph
/// - [`DependencyCycle`] - Keys reference each other in a cycle
/// - [`MultiValuedDependency`] - A key references a multi-valued key
///
/// [`MissingRequiredKey`]: FeatureError::MissingRequiredKey
/// [`MissingReferencedKey`]: FeatureError::MissingReferencedKey
/// [`InvalidNode`]: FeatureError::InvalidNode
/// [`KeyPathNotFound`]: FeatureError::KeyPathNotFound
/// [`MalformedExpression`]: FeatureError::MalformedExpression
/// [`UnknownCapability`]: FeatureError::UnknownCapability
/// [`ValidationFailed`]: FeatureError::ValidationFailed
/// [`CrossReferenceNotAllowed`]: FeatureError::CrossReferenceNotAllowed
/// [`DependencyCycle`]: FeatureError::DependencyCycle
/// [`MultiValuedDependency`]: FeatureError::MultiValuedDependency
#[derive(Error, Debug)]
pub enum FeatureError {
    /// A key marked REQUIRED is not present in the configuration tree.
    #[error("Required key '{key}' is missing")]
    MissingRequiredKey {
        /// Name of the missing key
        key: String,
    },

    /// A cross-reference names a key that is neither declared nor present in the tree.
    #[error("Key '{key}' references '{target}', which is not defined")]
    MissingReferencedKey {
        /// Key holding the reference
        key: String,
        /// Referenced key name
        target: String,
    },

    /// Format string syntax error.
    #[error("Malformed expression at offset {position}: {message}")]
    MalformedExpression {
        /// Byte offset in the format string
        position: usize,
        /// What is wrong
        message: String,
    },

    /// The format string references a capability that is not registered.
    #[error("Unknown capability '{name}' at offset {position}")]
    UnknownCapability {
        /// Name used in the format string
        name: String,
        /// Byte offset of the reference
        position: usize,
        /// Closest registered name, if any
        suggestion: Option<String>,
    },

    /// A capability's validation hook rejected the reference argument.
    #[error("Capability '{capability}' rejected its argument at offset {position}: {message}")]
    ValidationFailed {
        /// Capability name
        capability: String,
        /// Byte offset of the reference
        position: usize,
        /// Capability specific message
        message: String,
    },

    /// A cross-reference appeared where keys are independent of each other.
    #[error("Cross reference to '{target}' at offset {position} is not allowed here")]
    CrossReferenceNotAllowed {
        /// Referenced key name
        target: String,
        /// Byte offset of the reference
        position: usize,
    },

    /// The key reference graph contains a cycle.
    #[error("Circular dependency detected: {chain}")]
    DependencyCycle {
        /// Cycle rendered as `a → b → a`
        chain: String,
        /// Distinct keys on the cycle, in traversal order
        keys: Vec<String>,
    },

    /// A key references a multi-valued key, which has no single value to substitute.
    #[error("Key '{key}' depends on multi-valued key '{dependency}'")]
    MultiValuedDependency {
        /// Referencing key
        key: String,
        /// Multi-valued key that was referenced
        dependency: String,
    },

    /// A capability with this name is already registered.
    #[error("Capability '{name}' is already registered")]
    DuplicateCapability {
        /// Capability name
        name: String,
    },

    /// The capability name is reserved for cross-references.
    #[error("Capability name '{name}' is reserved")]
    ReservedCapability {
        /// Capability name
        name: String,
    },

    /// A configuration node does not have the expected shape.
    #[error("Invalid node: expected {expected}, found {found}")]
    InvalidNode {
        /// Expected node kind
        expected: &'static str,
        /// Actual node kind
        found: &'static str,
    },

    /// More keys than a table can index.
    #[error("Too many keys for one feature table: {count}")]
    TooManyKeys {
        /// Number of discovered keys
        count: usize,
    },

    /// A key index outside the table.
    #[error("Feature index {index} is out of range for a table of {len} keys")]
    InvalidIndex {
        /// Requested index
        index: usize,
        /// Number of keys in the table
        len: usize,
    },

    /// A key name that was never declared in the table.
    #[error("Key '{name}' is not declared in this feature table")]
    UnknownKey {
        /// Requested name
        name: String,
        /// Closest declared name, if any
        suggestion: Option<String>,
    },

    /// A dotted key path did not resolve in the configuration document.
    #[error("Key path '{path}' not found in configuration")]
    KeyPathNotFound {
        /// The dotted path
        path: String,
    },

    /// A key descriptor string could not be parsed.
    #[error("Invalid key descriptor '{descriptor}': {reason}")]
    InvalidDescriptor {
        /// Descriptor text
        descriptor: String,
        /// What is wrong
        reason: String,
    },

    /// Error tagged with the key being loaded.
    #[error("In key '{key}': {source}")]
    InKey {
        /// Key name
        key: String,
        /// Underlying error
        #[source]
        source: Box<FeatureError>,
    },

    /// YAML parsing errors
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl FeatureError {
    /// Tag this error with the key it was found in.
    #[must_use]
    pub fn in_key(self, key: impl Into<String>) -> Self {
        Self::InKey {
            key: key.into(),
            source: Box::new(self),
        }
    }

    /// The innermost error, looking through [`FeatureError::InKey`] wrappers.
    #[must_use]
    pub fn root(&self) -> &Self {
        match self {
            Self::InKey {
                source,
                ..
            } => source.root(),
            other => other,
        }
    }

    /// The key this error was tagged with, if any.
    #[must_use]
    pub fn key(&self) -> Option<&str> {
        match self {
            Self::InKey {
                key,
                ..
            } => Some(key),
            Self::MissingRequiredKey {
                key,
            }
            | Self::MissingReferencedKey {
                key,
                ..
            }
            | Self::MultiValuedDependency {
                key,
                ..
            } => Some(key),
            _ => None,
        }
    }

    /// Whether this is a structural graph violation that aborts a load.
    #[must_use]
    pub fn is_structural(&self) -> bool {
        matches!(self.root(), Self::DependencyCycle { .. } | Self::MultiValuedDependency { .. })
    }
}

/// Every problem found by one load attempt.
///
/// Errors for independent keys are collected so a caller can report all of them at
/// once. A structural violation is returned as the only entry.
#[derive(Debug, Default)]
pub struct LoadErrors {
    errors: Vec<FeatureError>,
}

impl LoadErrors {
    /// Create an empty collection.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            errors: Vec::new(),
        }
    }

    /// Record an error.
    pub fn push(&mut self, error: FeatureError) {
        self.errors.push(error);
    }

    /// Whether no errors were recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// Number of recorded errors.
    #[must_use]
    pub fn len(&self) -> usize {
        self.errors.len()
    }

    /// Iterate over the recorded errors.
    pub fn iter(&self) -> std::slice::Iter<'_, FeatureError> {
        self.errors.iter()
    }

    /// Whether any recorded error (looking through key tags) matches `pred`.
    pub fn any(&self, pred: impl Fn(&FeatureError) -> bool) -> bool {
        self.errors.iter().any(|e| pred(e.root()))
    }
}

impl From<FeatureError> for LoadErrors {
    fn from(error: FeatureError) -> Self {
        Self {
            errors: vec![error],
        }
    }
}

impl From<Vec<FeatureError>> for LoadErrors {
    fn from(errors: Vec<FeatureError>) -> Self {
        Self {
            errors,
        }
    }
}

impl IntoIterator for LoadErrors {
    type Item = FeatureError;
    type IntoIter = std::vec::IntoIter<FeatureError>;

    fn into_iter(self) -> Self::IntoIter {
        self.errors.into_iter()
    }
}

impl fmt::Display for LoadErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.errors.as_slice() {
            [] => write!(f, "No errors"),
            [single] => write!(f, "{single}"),
            many => {
                write!(f, "{} errors while loading features:", many.len())?;
                for error in many {
                    write!(f, "\n  - {error}")?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for LoadErrors {}

/// Error wrapper with user-friendly details and suggestions for CLI display.
#[derive(Debug)]
pub struct ErrorContext {
    /// The error message
    pub message: String,
    /// Optional suggestion for resolving the error
    pub suggestion: Option<String>,
    /// Optional additional details about the error
    pub details: Option<String>,
}

impl ErrorContext {
    /// Create a new context with no details or suggestion.
    #[must_use]
    pub fn new(message: impl fmt::Display) -> Self {
        Self {
            message: message.to_string(),
            suggestion: None,
            details: None,
        }
    }

    /// Add a suggestion for resolving the error.
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    /// Add additional details explaining the error.
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    /// Display the error context to stderr with terminal colors
    ///
    /// - Error message: Red and bold
    /// - Details: Yellow
    /// - Suggestion: Green
    pub fn display(&self) {
        eprintln!("{}: {}", "error".red().bold(), self.message);

        if let Some(details) = &self.details {
            eprintln!("{}: {}", "details".yellow(), details);
        }

        if let Some(suggestion) = &self.suggestion {
            eprintln!("{}: {}", "suggestion".green(), suggestion);
        }
    }
}

impl fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)?;

        if let Some(details) = &self.details {
            write!(f, "\nDetails: {details}")?;
        }

        if let Some(suggestion) = &self.suggestion {
            write!(f, "\nSuggestion: {suggestion}")?;
        }

        Ok(())
    }
}

impl std::error::Error for ErrorContext {}

/// Convert any error to a user-friendly [`ErrorContext`] with actionable suggestions.
///
/// Recognizes [`FeatureError`], [`LoadErrors`] and [`std::io::Error`]; anything
/// else is shown with its full context chain.
#[must_use]
pub fn user_friendly_error(error: anyhow::Error) -> ErrorContext {
    if let Some(feature_error) = error.downcast_ref::<FeatureError>() {
        return create_error_context(feature_error);
    }

    if let Some(errors) = error.downcast_ref::<LoadErrors>() {
        return match errors.iter().as_slice() {
            [single] => create_error_context(single),
            many => ErrorContext::new(format!("Failed to load features ({} errors)", many.len()))
                .with_details(
                    many.iter().map(ToString::to_string).collect::<Vec<_>>().join("\n  "),
                ),
        };
    }

    if let Some(io_error) = error.downcast_ref::<std::io::Error>()
        && io_error.kind() == std::io::ErrorKind::NotFound
    {
        return ErrorContext::new(format!("{error:#}"))
            .with_suggestion("Check that the configuration file exists and the path is correct");
    }

    ErrorContext::new(format!("{error:#}"))
}

fn create_error_context(error: &FeatureError) -> ErrorContext {
    let ctx = ErrorContext::new(error);
    match error.root() {
        FeatureError::MissingRequiredKey {
            key,
        } => ctx.with_suggestion(format!("Add a '{key}' entry to the configuration")),
        FeatureError::UnknownCapability {
            suggestion: Some(name),
            ..
        }
        | FeatureError::UnknownKey {
            suggestion: Some(name),
            ..
        } => ctx.with_suggestion(format!("Did you mean '{name}'?")),
        FeatureError::MalformedExpression {
            ..
        } => ctx
            .with_details("References are written as {name} or {name:argument}")
            .with_suggestion("Use '{{' and '}}' for literal braces"),
        FeatureError::DependencyCycle {
            ..
        } => ctx
            .with_details("Keys may reference each other with {this:key}, but not in a cycle")
            .with_suggestion("Break the cycle by replacing one reference with its value"),
        FeatureError::MultiValuedDependency {
            dependency,
            ..
        } => ctx.with_details(format!(
            "'{dependency}' is a list of formats and has no single value to substitute"
        )),
        FeatureError::KeyPathNotFound {
            ..
        } => ctx.with_suggestion("Key paths are dot separated, e.g. 'meta.features'"),
        _ => ctx,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_in_key_wraps_and_root_unwraps() {
        let error = FeatureError::MalformedExpression {
            position: 3,
            message: "unterminated '{'".to_string(),
        }
        .in_key("host");

        assert_eq!(error.key(), Some("host"));
        assert!(matches!(error.root(), FeatureError::MalformedExpression { position: 3, .. }));
        assert!(error.to_string().contains("In key 'host'"));
        assert!(error.to_string().contains("offset 3"));
    }

    #[test]
    fn test_structural_classification() {
        let cycle = FeatureError::DependencyCycle {
            chain: "a → b → a".to_string(),
            keys: vec!["a".to_string(), "b".to_string()],
        };
        assert!(cycle.is_structural());
        assert!(
            !FeatureError::MissingRequiredKey {
                key: "a".to_string()
            }
            .is_structural()
        );
    }

    #[test]
    fn test_load_errors_display() {
        let mut errors = LoadErrors::new();
        assert!(errors.is_empty());
        errors.push(FeatureError::MissingRequiredKey {
            key: "a".to_string(),
        });
        assert_eq!(errors.to_string(), "Required key 'a' is missing");

        errors.push(FeatureError::MissingRequiredKey {
            key: "b".to_string(),
        });
        let text = errors.to_string();
        assert!(text.starts_with("2 errors"));
        assert!(text.contains("'b'"));
        assert!(errors.any(|e| matches!(e, FeatureError::MissingRequiredKey { key } if key == "b")));
    }

    #[test]
    fn test_user_friendly_suggestion() {
        let error = FeatureError::UnknownCapability {
            name: "vra".to_string(),
            position: 0,
            suggestion: Some("var".to_string()),
        };
        let ctx = user_friendly_error(anyhow::Error::from(error));
        assert_eq!(ctx.suggestion.as_deref(), Some("Did you mean 'var'?"));
        assert!(ctx.to_string().contains("Unknown capability 'vra'"));
    }

    #[test]
    fn test_user_friendly_load_errors() {
        let errors = LoadErrors::from(vec![
            FeatureError::MissingRequiredKey {
                key: "a".to_string(),
            },
            FeatureError::MissingRequiredKey {
                key: "b".to_string(),
            },
        ]);
        let ctx = user_friendly_error(anyhow::Error::from(errors));
        assert!(ctx.message.contains("2 errors"));
        assert!(ctx.details.unwrap().contains("'b'"));
    }
}
