//! Format string compiler.
//!
//! # Syntax
//!
//! - Plain text is literal.
//! - `{name}` or `{name:argument}` references a capability. The argument runs to
//!   the closing brace and is handed verbatim to the capability's validation hook.
//! - `{this:key}` references another key of the same feature table.
//! - `{{` and `}}` are literal braces.
//!
//! Error positions are byte offsets into the format string.

use tracing::trace;

use super::{CapabilitySpec, CrossRefSpec, Expression, Specifier};
use crate::capability::{CROSS_REFERENCE, Registry};
use crate::core::{FeatureError, Result};

/// Receives `{this:key}` references while an expression compiles.
pub trait ReferenceSink {
    /// Resolve a reference to `name` found at byte offset `position`.
    ///
    /// Returns the index to record in the cross-reference specifier.
    fn reference(&mut self, name: &str, position: usize) -> Result<usize>;
}

/// Sink for contexts where keys are independent of each other.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoCrossReference;

impl ReferenceSink for NoCrossReference {
    fn reference(&mut self, name: &str, position: usize) -> Result<usize> {
        Err(FeatureError::CrossReferenceNotAllowed {
            target: name.to_string(),
            position,
        })
    }
}

/// Compiles format strings against a capability registry.
#[derive(Debug, Clone, Copy)]
pub struct ExprParser<'r> {
    registry: &'r Registry,
}

impl<'r> ExprParser<'r> {
    /// Create a parser resolving names in `registry`.
    #[must_use]
    pub const fn new(registry: &'r Registry) -> Self {
        Self {
            registry,
        }
    }

    /// Compile `text` into an [`Expression`].
    ///
    /// Cross-references are handed to `sink`.
    pub fn compile(&self, text: &str, sink: &mut dyn ReferenceSink) -> Result<Expression> {
        let bytes = text.as_bytes();
        let mut specs = Vec::new();
        let mut literal = String::new();
        let mut pos = 0;

        while pos < bytes.len() {
            match bytes[pos] {
                b'{' if bytes.get(pos + 1) == Some(&b'{') => {
                    literal.push('{');
                    pos += 2;
                }
                b'}' if bytes.get(pos + 1) == Some(&b'}') => {
                    literal.push('}');
                    pos += 2;
                }
                b'}' => {
                    return Err(malformed(pos, "unmatched '}'"));
                }
                b'{' => {
                    let close = match text[pos + 1..].find(['{', '}']) {
                        Some(offset) if bytes[pos + 1 + offset] == b'}' => pos + 1 + offset,
                        Some(offset) => {
                            return Err(malformed(pos + 1 + offset, "nested '{' in reference"));
                        }
                        None => return Err(malformed(pos, "unterminated '{'")),
                    };
                    if !literal.is_empty() {
                        specs.push(Specifier::Literal(std::mem::take(&mut literal).into()));
                    }
                    specs.push(self.reference(&text[pos + 1..close], pos, sink)?);
                    pos = close + 1;
                }
                _ => {
                    let next = text[pos..].find(['{', '}']).map_or(bytes.len(), |n| pos + n);
                    literal.push_str(&text[pos..next]);
                    pos = next;
                }
            }
        }

        if !literal.is_empty() {
            specs.push(Specifier::Literal(literal.into()));
        }
        Ok(Expression::from_specs(specs))
    }

    fn reference(
        &self,
        body: &str,
        position: usize,
        sink: &mut dyn ReferenceSink,
    ) -> Result<Specifier> {
        let (name, arg) = body.split_once(':').unwrap_or((body, ""));
        if name.is_empty() {
            return Err(malformed(position, "empty capability name"));
        }

        if name == CROSS_REFERENCE {
            if arg.is_empty() {
                return Err(malformed(position, "cross reference requires a key name"));
            }
            let index = sink.reference(arg, position)?;
            trace!("Cross reference to '{}' at offset {}", arg, position);
            return Ok(Specifier::CrossRef(CrossRefSpec::new(arg, index, position)));
        }

        let capability =
            self.registry.find(name).ok_or_else(|| FeatureError::UnknownCapability {
                name: name.to_string(),
                position,
                suggestion: self.registry.suggest(name),
            })?;
        let data = capability.validate(arg).map_err(|message| FeatureError::ValidationFailed {
            capability: name.to_string(),
            position,
            message,
        })?;
        Ok(Specifier::Capability(CapabilitySpec::new(capability, arg, data, position)))
    }
}

fn malformed(position: usize, message: &str) -> FeatureError {
    FeatureError::MalformedExpression {
        position,
        message: message.to_string(),
    }
}
