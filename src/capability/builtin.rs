//! Builtin capabilities.
//!
//! These read the request state held in [`RequestContext`] or the process
//! environment:
//!
//! | Name          | Result    | Argument                              |
//! |---------------|-----------|---------------------------------------|
//! | `var`         | string    | request variable name                 |
//! | `int`         | integer   | request variable name or literal      |
//! | `bool`        | boolean   | request variable name or literal      |
//! | `remote-addr` | ip-addr   | none                                  |
//! | `env`         | string    | environment variable name             |

use std::sync::Arc;
use tracing::trace;

use super::{Capability, Registry, SpecData};
use crate::context::RequestContext;
use crate::core::Result;
use crate::expr::CapabilitySpec;
use crate::feature::{Feature, FeatureText, ValueType};

/// Register every builtin capability in `registry`.
pub fn register_builtins(registry: &Registry) -> Result<()> {
    registry.register(Arc::new(Var))?;
    registry.register(Arc::new(Int))?;
    registry.register(Arc::new(Bool))?;
    registry.register(Arc::new(RemoteAddr))?;
    registry.register(Arc::new(Env))?;
    Ok(())
}

fn require_arg(arg: &str, what: &str) -> std::result::Result<(), String> {
    if arg.is_empty() {
        Err(format!("a {what} argument is required"))
    } else {
        Ok(())
    }
}

/// Source of a typed value: a constant fixed at load time or a request variable.
#[derive(Debug, Clone)]
enum Source<T> {
    Constant(T),
    Var(String),
}

impl<T: Copy> Source<T> {
    fn get(&self, ctx: &RequestContext, parse: impl Fn(&str) -> Option<T>) -> Option<T> {
        match self {
            Self::Constant(value) => Some(*value),
            Self::Var(name) => ctx.var(name).and_then(|text| parse(text.trim())),
        }
    }
}

fn parse_bool(text: &str) -> Option<bool> {
    match text.to_ascii_lowercase().as_str() {
        "true" | "yes" | "on" | "1" => Some(true),
        "false" | "no" | "off" | "0" => Some(false),
        _ => None,
    }
}

/// Text of a request variable, as a view of the request state.
#[derive(Debug)]
pub struct Var;

impl Capability for Var {
    fn name(&self) -> &str {
        "var"
    }

    fn result_type(&self) -> ValueType {
        ValueType::String
    }

    fn is_direct(&self) -> bool {
        true
    }

    fn has_ctx_ref(&self) -> bool {
        true
    }

    fn validate(&self, arg: &str) -> std::result::Result<Option<SpecData>, String> {
        require_arg(arg, "variable name")?;
        Ok(None)
    }

    fn extract(&self, ctx: &RequestContext, spec: &CapabilitySpec) -> Option<Feature> {
        let value = ctx.var(spec.arg())?;
        trace!("var '{}' -> '{}'", spec.arg(), value);
        Some(Feature::String(FeatureText::transient(Arc::clone(value))))
    }
}

/// Integer constant or request variable parsed as an integer.
#[derive(Debug)]
pub struct Int;

impl Capability for Int {
    fn name(&self) -> &str {
        "int"
    }

    fn result_type(&self) -> ValueType {
        ValueType::Integer
    }

    fn has_ctx_ref(&self) -> bool {
        true
    }

    fn validate(&self, arg: &str) -> std::result::Result<Option<SpecData>, String> {
        require_arg(arg, "variable name or integer")?;
        let source = match arg.parse::<i64>() {
            Ok(n) => Source::Constant(n),
            Err(_) if arg.starts_with(|c: char| c == '-' || c.is_ascii_digit()) => {
                return Err(format!("'{arg}' is not a valid integer"));
            }
            Err(_) => Source::Var(arg.to_string()),
        };
        Ok(Some(Arc::new(source)))
    }

    fn extract(&self, ctx: &RequestContext, spec: &CapabilitySpec) -> Option<Feature> {
        let source = spec.data::<Source<i64>>()?;
        source.get(ctx, |text| text.parse().ok()).map(Feature::Integer)
    }
}

/// Boolean constant or request variable parsed as a boolean.
#[derive(Debug)]
pub struct Bool;

impl Capability for Bool {
    fn name(&self) -> &str {
        "bool"
    }

    fn result_type(&self) -> ValueType {
        ValueType::Boolean
    }

    fn has_ctx_ref(&self) -> bool {
        true
    }

    fn validate(&self, arg: &str) -> std::result::Result<Option<SpecData>, String> {
        require_arg(arg, "variable name or boolean")?;
        let source = match arg {
            "true" => Source::Constant(true),
            "false" => Source::Constant(false),
            name => Source::Var(name.to_string()),
        };
        Ok(Some(Arc::new(source)))
    }

    fn extract(&self, ctx: &RequestContext, spec: &CapabilitySpec) -> Option<Feature> {
        let source = spec.data::<Source<bool>>()?;
        source.get(ctx, parse_bool).map(Feature::Boolean)
    }
}

/// Remote address of the request.
#[derive(Debug)]
pub struct RemoteAddr;

impl Capability for RemoteAddr {
    fn name(&self) -> &str {
        "remote-addr"
    }

    fn result_type(&self) -> ValueType {
        ValueType::IpAddr
    }

    fn has_ctx_ref(&self) -> bool {
        true
    }

    fn validate(&self, arg: &str) -> std::result::Result<Option<SpecData>, String> {
        if arg.is_empty() {
            Ok(None)
        } else {
            Err("takes no argument".to_string())
        }
    }

    fn extract(&self, ctx: &RequestContext, _spec: &CapabilitySpec) -> Option<Feature> {
        ctx.remote_addr().map(Feature::IpAddr)
    }
}

/// Process environment variable.
#[derive(Debug)]
pub struct Env;

impl Capability for Env {
    fn name(&self) -> &str {
        "env"
    }

    fn result_type(&self) -> ValueType {
        ValueType::String
    }

    fn validate(&self, arg: &str) -> std::result::Result<Option<SpecData>, String> {
        require_arg(arg, "environment variable name")?;
        Ok(None)
    }

    fn extract(&self, _ctx: &RequestContext, spec: &CapabilitySpec) -> Option<Feature> {
        std::env::var(spec.arg()).ok().map(Feature::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::{ExprParser, NoCrossReference, Specifier};
    use crate::feature::Ownership;

    fn registry() -> Registry {
        let registry = Registry::new();
        register_builtins(&registry).unwrap();
        registry
    }

    fn extract(registry: &Registry, text: &str, ctx: &RequestContext) -> Option<Feature> {
        let expr = ExprParser::new(registry).compile(text, &mut NoCrossReference).unwrap();
        match &expr.specs()[0] {
            Specifier::Capability(spec) => spec.capability().extract(ctx, spec),
            other => panic!("expected a capability, got {other:?}"),
        }
    }

    #[test]
    fn test_register_twice_fails() {
        let registry = registry();
        assert!(register_builtins(&registry).is_err());
        assert_eq!(registry.len(), 5);
    }

    #[test]
    fn test_var_is_transient_view() {
        let registry = registry();
        let mut ctx = RequestContext::new();
        ctx.set_var("host", "example.com");

        let value = extract(&registry, "{var:host}", &ctx).unwrap();
        match value {
            Feature::String(text) => {
                assert_eq!(text.as_str(), "example.com");
                assert_eq!(text.ownership(), Ownership::Transient);
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(extract(&registry, "{var:missing}", &ctx).is_none());
    }

    #[test]
    fn test_int_constant_and_var() {
        let registry = registry();
        let mut ctx = RequestContext::new();
        ctx.set_var("port", " 8080 ");
        ctx.set_var("junk", "eighty");

        assert_eq!(extract(&registry, "{int:-12}", &ctx), Some(Feature::Integer(-12)));
        assert_eq!(extract(&registry, "{int:port}", &ctx), Some(Feature::Integer(8080)));
        assert_eq!(extract(&registry, "{int:junk}", &ctx), None);
    }

    #[test]
    fn test_int_rejects_bad_literal() {
        let registry = registry();
        let err = ExprParser::new(&registry).compile("{int:12abc}", &mut NoCrossReference);
        assert!(err.is_err());
    }

    #[test]
    fn test_bool() {
        let registry = registry();
        let mut ctx = RequestContext::new();
        ctx.set_var("tls", "Yes");

        assert_eq!(extract(&registry, "{bool:true}", &ctx), Some(Feature::Boolean(true)));
        assert_eq!(extract(&registry, "{bool:tls}", &ctx), Some(Feature::Boolean(true)));
        assert_eq!(extract(&registry, "{bool:other}", &ctx), None);
    }

    #[test]
    fn test_remote_addr() {
        let registry = registry();
        let mut ctx = RequestContext::new();
        assert!(extract(&registry, "{remote-addr}", &ctx).is_none());

        ctx.set_remote_addr("192.168.1.7".parse().unwrap());
        assert_eq!(
            extract(&registry, "{remote-addr}", &ctx).and_then(|f| f.as_ip()),
            Some("192.168.1.7".parse().unwrap())
        );
        assert!(
            ExprParser::new(&registry).compile("{remote-addr:x}", &mut NoCrossReference).is_err()
        );
    }

    #[test]
    fn test_var_requires_argument() {
        let registry = registry();
        assert!(ExprParser::new(&registry).compile("{var}", &mut NoCrossReference).is_err());
        assert!(ExprParser::new(&registry).compile("{env}", &mut NoCrossReference).is_err());
    }
}
