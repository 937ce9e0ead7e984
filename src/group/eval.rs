//! Evaluation engine.
//!
//! Keys resolve lazily: a key is evaluated the first time it is asked for in a
//! request, either directly or through a `{this:key}` reference, and the value is
//! cached in the request context for the rest of the pass. Before a key's
//! expression runs, every dependency it still needs is evaluated by a depth
//! first walk over an explicit stack, so a `{this:key}` inside the expression
//! only ever reads a finished value.
//!
//! A capability that cannot produce or render its value leaves the key unset
//! ([`Feature::Nil`]); other keys of the request are unaffected.

use std::fmt::Write as _;
use std::sync::Arc;
use tracing::{debug, trace};

use super::{FeatureTable, KeyExpr, KeyIndex};
use crate::capability::registry::closest;
use crate::context::{EvalState, RequestContext};
use crate::core::{FeatureError, Result};
use crate::expr::{CapabilitySpec, Expression, Specifier};
use crate::feature::{Feature, FeatureText};

impl FeatureTable {
    /// Value of key `index` for the request `ctx`.
    ///
    /// Single-valued keys are computed once per pass and cached in `ctx`;
    /// multi-valued keys produce a [`Feature::Tuple`] each time. The returned
    /// value never borrows request state.
    pub fn resolve(&self, ctx: &mut RequestContext, index: KeyIndex) -> Result<Feature> {
        let slot = index.get();
        let key = self.keys.get(slot).ok_or(FeatureError::InvalidIndex {
            index: slot,
            len: self.keys.len(),
        })?;

        let state = ctx.eval_state(self.id, slot);
        debug_assert_ne!(state, EvalState::InProgress, "re-entrant evaluation of '{}'", key.name());
        match (key.expr(), state) {
            (KeyExpr::Nil, _) | (_, EvalState::InProgress) => Ok(Feature::Nil),
            (KeyExpr::Single(_), EvalState::Done) => {
                Ok(ctx.slot_mut(self.id, self.keys.len(), slot).value.clone())
            }
            _ => self.resolve_pass(ctx, index),
        }
    }

    /// Value of key `name`.
    ///
    /// An undeclared name is an error, never a silent nil.
    pub fn resolve_name(&self, ctx: &mut RequestContext, name: &str) -> Result<Feature> {
        let index = self.index_of(name).ok_or_else(|| FeatureError::UnknownKey {
            name: name.to_string(),
            suggestion: closest(name, self.names()),
        })?;
        self.resolve(ctx, index)
    }

    /// Every key with its value, in evaluation order.
    pub fn resolve_all(&self, ctx: &mut RequestContext) -> Result<Vec<(String, Feature)>> {
        self.order()
            .map(|index| {
                let value = self.resolve(ctx, index)?;
                Ok((self.keys[index.get()].name().to_string(), value))
            })
            .collect()
    }

    /// Evaluate key `index` after every dependency it still needs.
    ///
    /// Frames are `(key, next dependency)`. On failure every key left on the
    /// stack goes back to unvisited.
    fn resolve_pass(&self, ctx: &mut RequestContext, index: KeyIndex) -> Result<Feature> {
        let mut stack = vec![(index, 0_usize)];
        self.set_state(ctx, index, EvalState::InProgress);
        let mut value = Feature::Nil;

        while let Some((current, next)) = stack.last_mut() {
            let current = *current;
            if let Some(&dep) = self.dependencies(current).get(*next) {
                *next += 1;
                if self.needs_evaluation(ctx, dep) {
                    self.set_state(ctx, dep, EvalState::InProgress);
                    stack.push((dep, 0));
                }
                continue;
            }

            stack.pop();
            value = match self.evaluate_key(ctx, current) {
                Ok(value) => value,
                Err(error) => {
                    self.set_state(ctx, current, EvalState::Unvisited);
                    for &(pending, _) in &stack {
                        self.set_state(ctx, pending, EvalState::Unvisited);
                    }
                    return Err(error);
                }
            };
        }
        Ok(value)
    }

    fn needs_evaluation(&self, ctx: &RequestContext, index: KeyIndex) -> bool {
        !matches!(self.keys[index.get()].expr(), KeyExpr::Nil)
            && ctx.eval_state(self.id, index.get()) == EvalState::Unvisited
    }

    fn set_state(&self, ctx: &mut RequestContext, index: KeyIndex, state: EvalState) {
        ctx.slot_mut(self.id, self.keys.len(), index.get()).state = state;
    }

    /// Evaluate key `index`, whose dependencies are done, and record the
    /// outcome in `ctx`.
    fn evaluate_key(&self, ctx: &mut RequestContext, index: KeyIndex) -> Result<Feature> {
        let key = &self.keys[index.get()];
        match key.expr() {
            KeyExpr::Nil => Ok(Feature::Nil),
            KeyExpr::Single(expr) => {
                let value = self.evaluate(ctx, expr)?;
                trace!("Resolved '{}' = '{}'", key.name(), value);

                let cached = ctx.slot_mut(self.id, self.keys.len(), index.get());
                cached.state = EvalState::Done;
                cached.value = value.clone();
                Ok(value)
            }
            KeyExpr::Multi(exprs) => {
                let values = exprs
                    .iter()
                    .map(|expr| self.evaluate(ctx, expr))
                    .collect::<Result<Vec<_>>>()?;
                self.set_state(ctx, index, EvalState::DoneMulti);
                Ok(Feature::Tuple(values))
            }
        }
    }

    /// Value of one expression, localized.
    ///
    /// Only direct capabilities and cross-references hand out views; anything
    /// else already owns its text.
    fn evaluate(&self, ctx: &mut RequestContext, expr: &Expression) -> Result<Feature> {
        if let Some(text) = expr.literal_text() {
            return Ok(Feature::String(FeatureText::owned(Arc::clone(text))));
        }

        let value = match expr.specs() {
            [Specifier::Capability(spec)] => {
                let value = extract(ctx, spec);
                if spec.capability().is_direct() { value.localize() } else { value }
            }
            [Specifier::CrossRef(xref)] => self.this.extract(self, ctx, xref)?.localize(),
            specs => self.render(ctx, specs)?,
        };
        debug_assert!(value.is_localized(), "borrowed text from a capability that is not direct");
        Ok(value)
    }

    /// Composite expression rendered to text. A capability that fails to
    /// render leaves the whole key unset.
    fn render(&self, ctx: &mut RequestContext, specs: &[Specifier]) -> Result<Feature> {
        let mut out = String::new();
        for spec in specs {
            match spec {
                Specifier::Literal(text) => out.push_str(text),
                Specifier::Capability(cap) => {
                    if cap.capability().format(&mut out, ctx, cap).is_err() {
                        debug!(
                            "Capability '{}' failed to render '{}', key is unset",
                            cap.capability().name(),
                            cap.arg()
                        );
                        return Ok(Feature::Nil);
                    }
                }
                Specifier::CrossRef(xref) => {
                    let value = self.this.extract(self, ctx, xref)?;
                    let _ = write!(out, "{value}");
                }
            }
        }
        Ok(Feature::from(out))
    }
}

fn extract(ctx: &RequestContext, spec: &CapabilitySpec) -> Feature {
    spec.capability().extract(ctx, spec).unwrap_or_else(|| {
        debug!("Capability '{}' produced no value for '{}'", spec.capability().name(), spec.arg());
        Feature::Nil
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::Registry;
    use crate::feature::{Ownership, ValueType};
    use crate::group::Descriptor;
    use crate::test_utils::{
        Counting, Failing, Unrenderable, init_test_logging, registry_with_builtins, yaml,
    };
    use std::net::IpAddr;
    use std::sync::atomic::Ordering;

    fn load(registry: &Registry, text: &str, descriptors: &[Descriptor]) -> FeatureTable {
        init_test_logging(None);
        FeatureTable::load(registry, &yaml(text), descriptors).unwrap()
    }

    #[test]
    fn test_cross_reference_value() {
        let registry = registry_with_builtins();
        let table = load(&registry, "x: \"{this:y}-B\"\ny: A\n", &[Descriptor::new("x")]);
        let mut ctx = RequestContext::new();

        assert_eq!(table.resolve_name(&mut ctx, "x").unwrap(), Feature::from("A-B"));
        assert_eq!(table.resolve_name(&mut ctx, "y").unwrap(), Feature::from("A"));
    }

    #[test]
    fn test_literal_needs_no_context() {
        let registry = registry_with_builtins();
        let table = load(&registry, "a: plain\nb: ''\n", &[Descriptor::new("a"), Descriptor::new("b")]);
        let mut ctx = RequestContext::new();
        assert_eq!(table.resolve_name(&mut ctx, "a").unwrap().as_str(), Some("plain"));
        assert_eq!(table.resolve_name(&mut ctx, "b").unwrap().as_str(), Some(""));
    }

    #[test]
    fn test_memoized_per_pass() {
        let registry = registry_with_builtins();
        let counting = Counting::new("count");
        let calls = counting.counter();
        registry.register(Arc::new(counting)).unwrap();

        let table = load(
            &registry,
            "a: \"{count:v}\"\nb: \"{this:a}/{this:a}\"\nc: \"{this:a}{this:b}\"\n",
            &[Descriptor::new("c")],
        );
        let mut ctx = RequestContext::new();

        assert_eq!(table.resolve_name(&mut ctx, "c").unwrap().as_str(), Some("vv/v"));
        assert_eq!(table.resolve_name(&mut ctx, "b").unwrap().as_str(), Some("v/v"));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(ctx.eval_state(table.id(), table.index_of("a").unwrap().get()), EvalState::Done);

        ctx.reset_evaluation();
        table.resolve_name(&mut ctx, "c").unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_cached_values_are_localized() {
        let registry = registry_with_builtins();
        let table = load(&registry, "h: \"{var:host}\"\n", &[Descriptor::new("h")]);
        let mut ctx = RequestContext::new();
        ctx.set_var("host", "example.com");

        let value = table.resolve_name(&mut ctx, "h").unwrap();
        let Feature::String(text) = &value else { panic!("expected text, got {value:?}") };
        assert_eq!(text.ownership(), Ownership::Owned);

        // Later changes to request state do not leak into the cached value.
        ctx.set_var("host", "other.example");
        assert_eq!(table.resolve_name(&mut ctx, "h").unwrap().as_str(), Some("example.com"));
    }

    #[test]
    fn test_typed_values_match_result_type() {
        let registry = registry_with_builtins();
        let table = load(
            &registry,
            "port: \"{int:port}\"\nsecure: \"{bool:tls}\"\npeer: \"{remote-addr}\"\nalias: \"{this:port}\"\n",
            &[
                Descriptor::new("port"),
                Descriptor::new("secure"),
                Descriptor::new("peer"),
                Descriptor::new("alias"),
            ],
        );
        let mut ctx = RequestContext::new();
        ctx.set_var("port", "8443");
        ctx.set_var("tls", "yes");
        let addr: IpAddr = "192.0.2.7".parse().unwrap();
        ctx.set_remote_addr(addr);

        for (name, value) in table.resolve_all(&mut ctx).unwrap() {
            let index = table.index_of(&name).unwrap();
            assert_eq!(Some(value.value_type()), table.result_type(index), "{name}");
        }
        assert_eq!(table.resolve_name(&mut ctx, "alias").unwrap().as_integer(), Some(8443));
        assert_eq!(table.resolve_name(&mut ctx, "peer").unwrap().as_ip(), Some(addr));
    }

    #[test]
    fn test_missing_data_is_nil() {
        let registry = registry_with_builtins();
        registry.register(Arc::new(Failing)).unwrap();
        let table = load(
            &registry,
            "a: \"{absent}\"\nb: \"[{var:nope}]\"\nc: \"{this:a}\"\n",
            &[Descriptor::new("a"), Descriptor::new("b"), Descriptor::new("c")],
        );
        let mut ctx = RequestContext::new();

        assert!(table.resolve_name(&mut ctx, "a").unwrap().is_nil());
        assert_eq!(table.resolve_name(&mut ctx, "b").unwrap().as_str(), Some("[]"));
        assert!(table.resolve_name(&mut ctx, "c").unwrap().is_nil());
    }

    #[test]
    fn test_render_failure_leaves_key_unset() {
        let registry = registry_with_builtins();
        registry.register(Arc::new(Unrenderable)).unwrap();
        let table = load(
            &registry,
            "a: \"x-{unrenderable}\"\nb: ok\nc: \"<{this:a}>\"\nd: \"{unrenderable}\"\n",
            &[Descriptor::new("a"), Descriptor::new("b"), Descriptor::new("c"), Descriptor::new("d")],
        );
        let mut ctx = RequestContext::new();

        assert!(table.resolve_name(&mut ctx, "a").unwrap().is_nil());
        let all: Vec<(String, Feature)> = table.resolve_all(&mut ctx).unwrap();
        let value = |name: &str| all.iter().find(|(n, _)| n == name).map(|(_, v)| v.clone()).unwrap();
        assert!(value("a").is_nil());
        assert_eq!(value("b").as_str(), Some("ok"));
        assert_eq!(value("c").as_str(), Some("<>"));
        // Standing alone the capability extracts instead of rendering.
        assert_eq!(value("d").as_str(), Some("whole"));
    }

    #[test]
    fn test_long_reference_chain() {
        const KEYS: usize = 5_000;
        let mut text: String =
            (0..KEYS - 1).map(|i| format!("k{i}: \"{{this:k{}}}\"\n", i + 1)).collect();
        text.push_str(&format!("k{}: \"{{var:leaf}}\"\n", KEYS - 1));

        let registry = registry_with_builtins();
        let table = load(&registry, &text, &[Descriptor::new("k0").required()]);
        assert_eq!(table.len(), KEYS);
        assert_eq!(table.names().next(), Some(format!("k{}", KEYS - 1).as_str()));

        let mut ctx = RequestContext::new();
        ctx.set_var("leaf", "end");
        assert_eq!(table.resolve_name(&mut ctx, "k0").unwrap().as_str(), Some("end"));
        assert_eq!(table.resolve_name(&mut ctx, "k2500").unwrap().as_str(), Some("end"));
    }

    #[test]
    fn test_direct_capability_values_are_copied() {
        let registry = registry_with_builtins();
        registry.register(Arc::new(Counting::new("count"))).unwrap();
        let table = load(
            &registry,
            "a: \"{count:v}\"\nb: [\"{count:w}\"]\nc: \"{this:a}\"\n",
            &[Descriptor::new("a"), Descriptor::new("b").multi(), Descriptor::new("c")],
        );
        let mut ctx = RequestContext::new();

        for (name, value) in table.resolve_all(&mut ctx).unwrap() {
            assert!(value.is_localized(), "{name}");
        }
    }

    #[test]
    fn test_multi_key_is_tuple() {
        let registry = registry_with_builtins();
        let table = load(
            &registry,
            "hosts: [\"{var:a}\", literal, \"{int:3}\"]\n",
            &[Descriptor::new("hosts").multi()],
        );
        let mut ctx = RequestContext::new();
        ctx.set_var("a", "alpha");

        let value = table.resolve_name(&mut ctx, "hosts").unwrap();
        assert_eq!(value.value_type(), ValueType::Tuple);
        assert_eq!(
            value.as_tuple().unwrap(),
            &[Feature::from("alpha"), Feature::from("literal"), Feature::from(3_i64)]
        );
        assert!(value.is_localized());
        let index = table.index_of("hosts").unwrap().get();
        assert_eq!(ctx.eval_state(table.id(), index), EvalState::DoneMulti);
    }

    #[test]
    fn test_absent_optional_key_is_nil() {
        let registry = registry_with_builtins();
        let table = load(
            &registry,
            "a: \"<{this:b}>\"\n",
            &[Descriptor::new("b"), Descriptor::new("a")],
        );
        let mut ctx = RequestContext::new();
        assert!(table.resolve_name(&mut ctx, "b").unwrap().is_nil());
        assert_eq!(table.resolve_name(&mut ctx, "a").unwrap().as_str(), Some("<>"));
    }

    #[test]
    fn test_unknown_key_and_bad_index() {
        let registry = registry_with_builtins();
        let table = load(&registry, "host: h\n", &[Descriptor::new("host")]);
        let mut ctx = RequestContext::new();

        match table.resolve_name(&mut ctx, "hots").unwrap_err() {
            FeatureError::UnknownKey {
                name,
                suggestion,
            } => {
                assert_eq!(name, "hots");
                assert_eq!(suggestion.as_deref(), Some("host"));
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(matches!(
            table.resolve(&mut ctx, KeyIndex::from(7_u16)),
            Err(FeatureError::InvalidIndex { index: 7, len: 1 })
        ));
    }

    #[test]
    fn test_passes_are_independent_per_context() {
        let registry = registry_with_builtins();
        let table = load(&registry, "u: \"{var:user}\"\n", &[Descriptor::new("u")]);

        let mut first = RequestContext::new();
        first.set_var("user", "ann");
        let mut second = RequestContext::new();
        second.set_var("user", "bob");

        assert_eq!(table.resolve_name(&mut first, "u").unwrap().as_str(), Some("ann"));
        assert_eq!(table.resolve_name(&mut second, "u").unwrap().as_str(), Some("bob"));
    }

    #[test]
    fn test_concurrent_requests_share_table() {
        let registry = registry_with_builtins();
        let table = Arc::new(load(
            &registry,
            "id: \"{var:id}\"\nlabel: \"req-{this:id}\"\n",
            &[Descriptor::new("label")],
        ));

        let handles: Vec<_> = (0..8)
            .map(|n| {
                let table = Arc::clone(&table);
                std::thread::spawn(move || {
                    let mut ctx = RequestContext::new();
                    ctx.set_var("id", n.to_string());
                    table.resolve_name(&mut ctx, "label").unwrap().to_string()
                })
            })
            .collect();

        for (n, handle) in handles.into_iter().enumerate() {
            assert_eq!(handle.join().unwrap(), format!("req-{n}"));
        }
    }
}
