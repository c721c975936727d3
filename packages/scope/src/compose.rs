//! Building the per-instance scope from a schema node.

use crate::context::ContextRegistry;
use crate::layers::Layer;
use crate::scope::Scope;
use montage_expr::{Callable, Evaluator, ScopeResolver, Value};
use montage_schema::{SchemaNode, TranslationTable, ValueDescriptor};
use std::sync::{Arc, RwLock};
use tracing::{debug, instrument, warn};

/// Host-supplied surroundings for composition: the translation table and
/// the provide/inject registry. Passed explicitly, never reached for
/// globally.
#[derive(Clone)]
pub struct AmbientScope {
    pub translations: Arc<RwLock<TranslationTable>>,
    pub context: ContextRegistry,
}

impl AmbientScope {
    pub fn new(translations: TranslationTable, context: ContextRegistry) -> Self {
        Self {
            translations: Arc::new(RwLock::new(translations)),
            context,
        }
    }
}

impl Default for AmbientScope {
    fn default() -> Self {
        Self::new(TranslationTable::default(), ContextRegistry::new())
    }
}

/// Resolver with no bindings: props and state evaluate context-free.
struct EmptyResolver;

impl ScopeResolver for EmptyResolver {
    fn resolve(&self, _name: &str) -> Option<Value> {
        None
    }
}

/// Builds the layered scope for one schema node.
pub struct ScopeComposer {
    evaluator: Arc<Evaluator>,
}

impl ScopeComposer {
    pub fn new(evaluator: Arc<Evaluator>) -> Self {
        Self { evaluator }
    }

    pub fn evaluator(&self) -> &Arc<Evaluator> {
        &self.evaluator
    }

    /// Build the scope layers in strict order. Props and state are
    /// evaluated context-free; methods see the scope built so far. A
    /// fragment of the wrong shape contributes nothing; composition
    /// continues.
    pub fn compose(&self, schema: &SchemaNode, ambient: &AmbientScope) -> Scope {
        let scope = Scope::root(self.evaluator.clone());
        self.compose_into(&scope, schema, ambient);
        scope
    }

    /// Fill an existing root scope. Used when the caller has already run
    /// earlier phases (setup) against the same scope object.
    #[instrument(skip(self, scope, schema, ambient), fields(node = %schema.id, component = %schema.component))]
    pub fn compose_into(&self, scope: &Scope, schema: &SchemaNode, ambient: &AmbientScope) {
        let empty: Arc<dyn ScopeResolver> = Arc::new(EmptyResolver);

        // Layer 1: declared props. Slot descriptors are renderables, not
        // scope values; they stay out of the binding environment.
        for (name, descriptor) in &schema.props {
            if descriptor.is_slot() {
                continue;
            }
            let value = self.evaluator.evaluate(descriptor, &empty);
            scope.set(Layer::Props, name.clone(), value);
        }

        // Layer 2: declared state.
        for (name, descriptor) in &schema.state {
            let value = self.evaluator.evaluate(descriptor, &empty);
            scope.set(Layer::State, name.clone(), value);
        }

        // Translation function, reachable as `self.t(key)`.
        let translations = ambient.translations.clone();
        let translate = Callable::native("t", move |args| {
            let key = args.first().and_then(|v| v.as_str()).unwrap_or_default();
            let table = translations.read().unwrap();
            Ok(Value::String(table.translate(key)))
        });
        scope.set(Layer::Setup, "t", Value::Callable(translate));

        // Declared methods, evaluated against the scope built so far so
        // they close over state and props.
        for (name, descriptor) in &schema.methods {
            let value = self.evaluator.evaluate(descriptor, &scope.resolver());
            match value {
                Value::Callable(callable) => {
                    scope.set(Layer::Setup, name.clone(), Value::Callable(callable));
                }
                other => {
                    warn!(
                        method = %name,
                        got = ?other,
                        "method did not evaluate to a callable; skipped"
                    );
                }
            }
        }

        debug!("scope composed");
    }

    /// Evaluate a descriptor fragment that must be a mapping (e.g. a data
    /// block). Wrong shapes contribute nothing.
    pub fn eval_mapping(
        &self,
        context: &str,
        descriptor: &ValueDescriptor,
        scope: &Scope,
    ) -> std::collections::BTreeMap<String, Value> {
        match self.evaluator.evaluate(descriptor, &scope.resolver()) {
            Value::Object(map) => map,
            other => {
                warn!(context, got = ?other, "fragment is not a mapping; skipped");
                Default::default()
            }
        }
    }
}
