//! Feature values.
//!
//! A [`Feature`] is the typed value produced by resolving a key: text, an
//! integer, a boolean, a network address, a list (for multi-valued keys) or
//! [`Feature::Nil`] when nothing was produced.
//!
//! # Text ownership
//!
//! Text carries an explicit [`Ownership`] tag. Capabilities that read request
//! state hand out views of that state instead of copies:
//!
//! - [`Ownership::Transient`] - valid only for the current evaluation step
//! - [`Ownership::Scoped`] - valid for the rest of the current request
//! - [`Ownership::Owned`] - an independent copy
//!
//! Anything that keeps a value past the step that produced it must call
//! [`Feature::localize`] first. The evaluation engine does this before caching a
//! value and before returning it to the caller.

use serde::ser::{Serialize, SerializeSeq, Serializer};
use std::fmt;
use std::net::IpAddr;
use std::sync::Arc;

/// The kind of value a capability or key produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ValueType {
    /// No value.
    Nil,
    /// Text.
    String,
    /// Signed integer.
    Integer,
    /// Boolean.
    Boolean,
    /// IPv4 or IPv6 address.
    IpAddr,
    /// Ordered list of values.
    Tuple,
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Nil => "nil",
            Self::String => "string",
            Self::Integer => "integer",
            Self::Boolean => "boolean",
            Self::IpAddr => "ip-addr",
            Self::Tuple => "tuple",
        };
        f.write_str(name)
    }
}

/// How long the text behind a [`FeatureText`] is valid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ownership {
    /// Borrowed for the current evaluation step only.
    Transient,
    /// Borrowed for the remainder of the current request.
    Scoped,
    /// Owned copy.
    Owned,
}

/// Text value with an ownership tag.
#[derive(Debug, Clone)]
pub struct FeatureText {
    text: Arc<str>,
    ownership: Ownership,
}

impl FeatureText {
    /// Owned text.
    pub fn owned(text: impl Into<Arc<str>>) -> Self {
        Self {
            text: text.into(),
            ownership: Ownership::Owned,
        }
    }

    /// View of request state that may change after this evaluation step.
    #[must_use]
    pub fn transient(text: Arc<str>) -> Self {
        Self {
            text,
            ownership: Ownership::Transient,
        }
    }

    /// View of data that stays valid for the rest of the request.
    #[must_use]
    pub fn scoped(text: Arc<str>) -> Self {
        Self {
            text,
            ownership: Ownership::Scoped,
        }
    }

    /// The text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// The ownership tag.
    #[must_use]
    pub const fn ownership(&self) -> Ownership {
        self.ownership
    }

    /// Whether this is a view rather than an owned copy.
    #[must_use]
    pub fn is_borrowed(&self) -> bool {
        self.ownership != Ownership::Owned
    }

    /// Copy borrowed text into owned storage.
    #[must_use]
    pub fn localize(self) -> Self {
        match self.ownership {
            Ownership::Owned => self,
            Ownership::Transient | Ownership::Scoped => Self::owned(Arc::<str>::from(&*self.text)),
        }
    }

    pub(crate) fn shared(&self) -> Arc<str> {
        Arc::clone(&self.text)
    }
}

impl PartialEq for FeatureText {
    fn eq(&self, other: &Self) -> bool {
        self.text == other.text
    }
}

impl Eq for FeatureText {}

/// A typed value produced by resolving a key.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Feature {
    /// Empty / unset.
    #[default]
    Nil,
    /// Text.
    String(FeatureText),
    /// Signed integer.
    Integer(i64),
    /// Boolean.
    Boolean(bool),
    /// Network address.
    IpAddr(IpAddr),
    /// One value per element of a multi-valued key.
    Tuple(Vec<Feature>),
}

impl Feature {
    /// The kind of this value.
    #[must_use]
    pub fn value_type(&self) -> ValueType {
        match self {
            Self::Nil => ValueType::Nil,
            Self::String(_) => ValueType::String,
            Self::Integer(_) => ValueType::Integer,
            Self::Boolean(_) => ValueType::Boolean,
            Self::IpAddr(_) => ValueType::IpAddr,
            Self::Tuple(_) => ValueType::Tuple,
        }
    }

    /// Whether this is [`Feature::Nil`].
    #[must_use]
    pub const fn is_nil(&self) -> bool {
        matches!(self, Self::Nil)
    }

    /// Text content, if this is a string.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(text) => Some(text.as_str()),
            _ => None,
        }
    }

    /// Integer content, if this is an integer.
    #[must_use]
    pub const fn as_integer(&self) -> Option<i64> {
        match self {
            Self::Integer(n) => Some(*n),
            _ => None,
        }
    }

    /// Boolean content, if this is a boolean.
    #[must_use]
    pub const fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    /// Address content, if this is an address.
    #[must_use]
    pub const fn as_ip(&self) -> Option<IpAddr> {
        match self {
            Self::IpAddr(addr) => Some(*addr),
            _ => None,
        }
    }

    /// Elements, if this is a tuple.
    #[must_use]
    pub fn as_tuple(&self) -> Option<&[Feature]> {
        match self {
            Self::Tuple(items) => Some(items),
            _ => None,
        }
    }

    /// Copy any borrowed text into owned storage, recursively.
    #[must_use]
    pub fn localize(self) -> Self {
        match self {
            Self::String(text) => Self::String(text.localize()),
            Self::Tuple(items) => Self::Tuple(items.into_iter().map(Self::localize).collect()),
            other => other,
        }
    }

    /// Whether no borrowed text remains in this value.
    #[must_use]
    pub fn is_localized(&self) -> bool {
        match self {
            Self::String(text) => !text.is_borrowed(),
            Self::Tuple(items) => items.iter().all(Self::is_localized),
            _ => true,
        }
    }
}

impl From<&str> for Feature {
    fn from(text: &str) -> Self {
        Self::String(FeatureText::owned(text))
    }
}

impl From<String> for Feature {
    fn from(text: String) -> Self {
        Self::String(FeatureText::owned(text))
    }
}

impl From<i64> for Feature {
    fn from(n: i64) -> Self {
        Self::Integer(n)
    }
}

impl From<bool> for Feature {
    fn from(b: bool) -> Self {
        Self::Boolean(b)
    }
}

impl From<IpAddr> for Feature {
    fn from(addr: IpAddr) -> Self {
        Self::IpAddr(addr)
    }
}

impl fmt::Display for Feature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Nil => Ok(()),
            Self::String(text) => f.write_str(text.as_str()),
            Self::Integer(n) => write!(f, "{n}"),
            Self::Boolean(b) => write!(f, "{b}"),
            Self::IpAddr(addr) => write!(f, "{addr}"),
            Self::Tuple(items) => {
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                Ok(())
            }
        }
    }
}

impl Serialize for Feature {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Nil => serializer.serialize_none(),
            Self::String(text) => serializer.serialize_str(text.as_str()),
            Self::Integer(n) => serializer.serialize_i64(*n),
            Self::Boolean(b) => serializer.serialize_bool(*b),
            Self::IpAddr(addr) => serializer.collect_str(addr),
            Self::Tuple(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_localize_copies_borrowed_text() {
        let backing: Arc<str> = Arc::from("example.com");
        let view = Feature::String(FeatureText::transient(Arc::clone(&backing)));
        assert!(!view.is_localized());

        let owned = view.localize();
        assert!(owned.is_localized());
        assert_eq!(owned.as_str(), Some("example.com"));
        if let Feature::String(text) = &owned {
            assert!(!Arc::ptr_eq(&text.shared(), &backing));
            assert_eq!(text.ownership(), Ownership::Owned);
        }
    }

    #[test]
    fn test_localize_recurses_into_tuples() {
        let tuple = Feature::Tuple(vec![
            Feature::String(FeatureText::scoped(Arc::from("a"))),
            Feature::Integer(3),
        ]);
        assert!(!tuple.is_localized());
        assert!(tuple.localize().is_localized());
    }

    #[test]
    fn test_display() {
        assert_eq!(Feature::Nil.to_string(), "");
        assert_eq!(Feature::from("x").to_string(), "x");
        assert_eq!(Feature::from(-7).to_string(), "-7");
        assert_eq!(Feature::from(true).to_string(), "true");
        let addr: IpAddr = "10.1.2.3".parse().unwrap();
        assert_eq!(Feature::from(addr).to_string(), "10.1.2.3");
        let tuple = Feature::Tuple(vec![Feature::from("a"), Feature::from(2)]);
        assert_eq!(tuple.to_string(), "a, 2");
    }

    #[test]
    fn test_serialize_json() {
        let tuple = Feature::Tuple(vec![Feature::from("a"), Feature::Nil, Feature::from(false)]);
        let json = serde_json::to_value(&tuple).unwrap();
        assert_eq!(json, serde_json::json!(["a", null, false]));
    }

    #[test]
    fn test_value_type() {
        assert_eq!(Feature::Nil.value_type(), ValueType::Nil);
        assert_eq!(Feature::from("a").value_type(), ValueType::String);
        assert_eq!(Feature::Tuple(vec![]).value_type(), ValueType::Tuple);
        assert_eq!(ValueType::IpAddr.to_string(), "ip-addr");
    }
}
