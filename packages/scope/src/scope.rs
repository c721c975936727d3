//! The layered scope object and its merge rules.

use crate::error::{ScopeError, ScopeResult};
use crate::layers::Layer;
use montage_expr::{Callable, Evaluator, ScopeResolver, Value};
use montage_schema::ValueDescriptor;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use tracing::{debug, warn};

struct ComputedDef {
    getter: ValueDescriptor,
    setter: Option<Callable>,
}

type WatchCallback = Arc<dyn Fn(&str, &Value) + Send + Sync>;

struct Watcher {
    /// `None` matches every write.
    path: Option<String>,
    callback: WatchCallback,
}

struct ScopeInner {
    layers: Mutex<BTreeMap<Layer, BTreeMap<String, Value>>>,
    computed: Mutex<BTreeMap<String, ComputedDef>>,
    watchers: Mutex<Vec<Watcher>>,
    /// Delegation base for block-local scopes; `None` on roots.
    parent: Option<Scope>,
    /// The designated runtime scope carrying object identity (method
    /// binding, hook registration). Exactly one per instance tree.
    root: bool,
    evaluator: Arc<Evaluator>,
}

/// A layered, mutable binding environment. Cheap to clone; clones share
/// the same underlying stores.
#[derive(Clone)]
pub struct Scope {
    inner: Arc<ScopeInner>,
}

/// One operand of [`Scope::merge_scope`].
pub enum MergeOperand {
    Scope(Scope),
    Bindings(BTreeMap<String, Value>),
}

impl From<Scope> for MergeOperand {
    fn from(scope: Scope) -> Self {
        MergeOperand::Scope(scope)
    }
}

impl From<BTreeMap<String, Value>> for MergeOperand {
    fn from(bindings: BTreeMap<String, Value>) -> Self {
        MergeOperand::Bindings(bindings)
    }
}

impl Scope {
    /// Create a root runtime scope.
    pub fn root(evaluator: Arc<Evaluator>) -> Self {
        Self {
            inner: Arc::new(ScopeInner {
                layers: Mutex::new(BTreeMap::new()),
                computed: Mutex::new(BTreeMap::new()),
                watchers: Mutex::new(Vec::new()),
                parent: None,
                root: true,
                evaluator,
            }),
        }
    }

    pub fn is_root(&self) -> bool {
        self.inner.root
    }

    pub fn evaluator(&self) -> &Arc<Evaluator> {
        &self.inner.evaluator
    }

    /// Two handles onto the same underlying scope?
    pub fn same(&self, other: &Scope) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// The resolver view handed to the expression evaluator.
    pub fn resolver(&self) -> Arc<dyn ScopeResolver> {
        Arc::new(self.clone())
    }

    /// Write one binding. This is the single mutation entry point: all
    /// contributors (lifecycle hooks, data-source writes, reconciler
    /// patches) go through here so dependent re-evaluation is triggered.
    pub fn set(&self, layer: Layer, key: impl Into<String>, value: Value) {
        let key = key.into();
        {
            let mut layers = self.inner.layers.lock().unwrap();
            layers.entry(layer).or_default().insert(key.clone(), value.clone());
        }
        self.notify(&key, &value);
    }

    /// Merge a whole map into one layer, notifying per key.
    pub fn merge(&self, layer: Layer, bindings: BTreeMap<String, Value>) {
        for (key, value) in bindings {
            self.set(layer, key, value);
        }
    }

    /// Read a binding from one specific layer (no delegation, no computed).
    pub fn get_layer(&self, layer: Layer, key: &str) -> Option<Value> {
        self.inner
            .layers
            .lock()
            .unwrap()
            .get(&layer)
            .and_then(|bindings| bindings.get(key))
            .cloned()
    }

    /// Full layered lookup, innermost layer first, then computed values,
    /// then the delegation base.
    pub fn get(&self, name: &str) -> Option<Value> {
        for layer in Layer::LOOKUP {
            if layer == Layer::Computed {
                // Explicitly cached computed values first, then getters.
                if let Some(value) = self.get_layer(Layer::Computed, name) {
                    return Some(value);
                }
                if let Some(value) = self.eval_computed(name) {
                    return Some(value);
                }
                continue;
            }
            if let Some(value) = self.get_layer(layer, name) {
                return Some(value);
            }
        }
        self.inner.parent.as_ref().and_then(|parent| parent.get(name))
    }

    fn eval_computed(&self, name: &str) -> Option<Value> {
        // Clone the getter out so evaluation can re-enter the scope.
        let getter = {
            let computed = self.inner.computed.lock().unwrap();
            computed.get(name).map(|def| def.getter.clone())
        }?;
        Some(self.inner.evaluator.evaluate(&getter, &self.resolver()))
    }

    /// Register a computed value: a derived getter and an optional setter.
    pub fn register_computed(
        &self,
        name: impl Into<String>,
        getter: ValueDescriptor,
        setter: Option<Callable>,
    ) {
        self.inner
            .computed
            .lock()
            .unwrap()
            .insert(name.into(), ComputedDef { getter, setter });
    }

    /// Write through a computed value's setter.
    pub fn set_computed(&self, name: &str, value: Value) -> ScopeResult<()> {
        let setter = {
            let computed = self.inner.computed.lock().unwrap();
            match computed.get(name) {
                Some(def) => def.setter.clone(),
                None => None,
            }
        };
        match setter {
            Some(setter) => {
                if let Err(err) = setter.call(&[value.clone()]) {
                    warn!(name, error = %err, "computed setter failed");
                }
                self.notify(name, &value);
                Ok(())
            }
            None => Err(ScopeError::NotSettable(name.to_string())),
        }
    }

    /// Watch a path. The callback fires whenever a key sharing the path's
    /// first segment is written through `set`/`merge`.
    pub fn watch<F>(&self, path: impl Into<String>, callback: F, immediate: bool)
    where
        F: Fn(&str, &Value) + Send + Sync + 'static,
    {
        let path = path.into();
        let callback: WatchCallback = Arc::new(callback);
        if immediate {
            let current = self.get(&path).unwrap_or(Value::Null);
            callback(&path, &current);
        }
        self.inner.watchers.lock().unwrap().push(Watcher {
            path: Some(path),
            callback,
        });
    }

    /// Watch every write on this scope (and, through delegation, writes on
    /// its block children). Bindings that re-render on scope change use this
    /// rather than enumerating the keys their expressions read.
    pub fn watch_any<F>(&self, callback: F)
    where
        F: Fn(&str, &Value) + Send + Sync + 'static,
    {
        self.inner.watchers.lock().unwrap().push(Watcher {
            path: None,
            callback: Arc::new(callback),
        });
    }

    fn notify(&self, key: &str, value: &Value) {
        let key_head = key.split('.').next().unwrap_or(key);
        let watchers: Vec<WatchCallback> = {
            let watchers = self.inner.watchers.lock().unwrap();
            watchers
                .iter()
                .filter(|w| match &w.path {
                    None => true,
                    Some(path) => path.split('.').next().unwrap_or(path) == key_head,
                })
                .map(|w| w.callback.clone())
                .collect()
        };
        for callback in watchers {
            callback(key, value);
        }
        // Writes on a block scope also wake watchers on the base: the base
        // owns the reactive graph.
        if let Some(parent) = &self.inner.parent {
            parent.notify(key, value);
        }
    }

    /// Combine scopes and block-local binding maps into a block scope.
    ///
    /// Right-biased: later operands' bindings shadow earlier ones. If any
    /// operand is a root runtime scope, that scope is the delegation base
    /// regardless of argument order, because it carries the object identity
    /// (method binding, hook registration) a plain data layer does not.
    pub fn merge_scope(operands: Vec<MergeOperand>) -> Scope {
        let mut base: Option<Scope> = None;
        for operand in &operands {
            if let MergeOperand::Scope(scope) = operand {
                if scope.is_root() {
                    base = Some(scope.clone());
                }
            }
        }
        if base.is_none() {
            base = operands.iter().find_map(|operand| match operand {
                MergeOperand::Scope(scope) => Some(scope.clone()),
                _ => None,
            });
        }

        let evaluator = base
            .as_ref()
            .map(|scope| scope.inner.evaluator.clone())
            .unwrap_or_else(|| Arc::new(Evaluator::new(Default::default())));

        let mut block = BTreeMap::new();
        for operand in operands {
            match operand {
                MergeOperand::Bindings(bindings) => {
                    block.extend(bindings);
                }
                MergeOperand::Scope(scope) => {
                    if let Some(base) = &base {
                        if scope.same(base) {
                            continue;
                        }
                    }
                    // Non-base scope operands contribute their block-local
                    // bindings only; their deeper layers belong to their own
                    // instance.
                    let layers = scope.inner.layers.lock().unwrap();
                    if let Some(bindings) = layers.get(&Layer::Block) {
                        block.extend(bindings.clone());
                    }
                }
            }
        }

        debug!(bindings = block.len(), "merged block scope");
        let child = Scope {
            inner: Arc::new(ScopeInner {
                layers: Mutex::new(BTreeMap::from([(Layer::Block, block)])),
                computed: Mutex::new(BTreeMap::new()),
                watchers: Mutex::new(Vec::new()),
                parent: base,
                root: false,
                evaluator,
            }),
        };
        child
    }
}

impl ScopeResolver for Scope {
    fn resolve(&self, name: &str) -> Option<Value> {
        self.get(name)
    }
}
