//! Runtime values produced by expression evaluation.

use crate::ast::Expr;
use crate::error::{ExprError, ExprResult};
use crate::eval::{Evaluator, ExprOptions, ScopeResolver};
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Runtime value.
#[derive(Clone)]
pub enum Value {
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    Array(Vec<Value>),
    Object(BTreeMap<String, Value>),
    Callable(Callable),
}

impl Value {
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::Number(n) => *n != 0.0,
            Value::String(s) => !s.is_empty(),
            Value::Array(a) => !a.is_empty(),
            Value::Object(o) => !o.is_empty(),
            Value::Callable(_) => true,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn render(&self) -> String {
        match self {
            Value::Null => String::new(),
            Value::Bool(b) => b.to_string(),
            Value::Number(n) => {
                if n.fract() == 0.0 && n.is_finite() {
                    format!("{}", *n as i64)
                } else {
                    n.to_string()
                }
            }
            Value::String(s) => s.clone(),
            Value::Array(_) | Value::Object(_) => {
                serde_json::to_string(&self.to_json()).unwrap_or_default()
            }
            Value::Callable(c) => format!("[callable {}]", c.name()),
        }
    }

    pub fn to_json(&self) -> JsonValue {
        match self {
            Value::Null => JsonValue::Null,
            Value::Bool(b) => JsonValue::Bool(*b),
            Value::Number(n) => serde_json::Number::from_f64(*n)
                .map(JsonValue::Number)
                .unwrap_or(JsonValue::Null),
            Value::String(s) => JsonValue::String(s.clone()),
            Value::Array(items) => JsonValue::Array(items.iter().map(|v| v.to_json()).collect()),
            Value::Object(map) => JsonValue::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), v.to_json()))
                    .collect(),
            ),
            // Callables have no serial form.
            Value::Callable(_) => JsonValue::Null,
        }
    }

    pub fn from_json(value: &JsonValue) -> Value {
        match value {
            JsonValue::Null => Value::Null,
            JsonValue::Bool(b) => Value::Bool(*b),
            JsonValue::Number(n) => Value::Number(n.as_f64().unwrap_or(0.0)),
            JsonValue::String(s) => Value::String(s.clone()),
            JsonValue::Array(items) => {
                Value::Array(items.iter().map(Value::from_json).collect())
            }
            JsonValue::Object(map) => Value::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), Value::from_json(v)))
                    .collect(),
            ),
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        match self {
            Value::Object(map) => map.get(key),
            _ => None,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => a == b,
            (Value::Callable(a), Value::Callable(b)) => a.same(b),
            _ => false,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "Null"),
            Value::Bool(b) => write!(f, "Bool({})", b),
            Value::Number(n) => write!(f, "Number({})", n),
            Value::String(s) => write!(f, "String({:?})", s),
            Value::Array(a) => f.debug_tuple("Array").field(a).finish(),
            Value::Object(o) => f.debug_tuple("Object").field(o).finish(),
            Value::Callable(c) => write!(f, "Callable({})", c.name()),
        }
    }
}

impl From<JsonValue> for Value {
    fn from(value: JsonValue) -> Self {
        Value::from_json(&value)
    }
}

enum CallableImpl {
    /// A compiled function descriptor, closed over the resolver it was
    /// composed against. Binding params happens per call.
    Compiled {
        params: Vec<String>,
        body: Arc<Expr>,
        resolver: Arc<dyn ScopeResolver>,
        options: ExprOptions,
    },
    /// A host-provided closure (translation fn, data-source reload, ...).
    Native(#[allow(clippy::type_complexity)] Arc<dyn Fn(&[Value]) -> ExprResult<Value> + Send + Sync>),
}

/// A callable value: either a compiled function descriptor or a native
/// host closure. Calling may fail; those failures propagate to the caller,
/// unlike ordinary expression evaluation.
#[derive(Clone)]
pub struct Callable {
    name: String,
    inner: Arc<CallableImpl>,
}

impl Callable {
    pub fn compiled(
        name: impl Into<String>,
        params: Vec<String>,
        body: Arc<Expr>,
        resolver: Arc<dyn ScopeResolver>,
        options: ExprOptions,
    ) -> Self {
        Self {
            name: name.into(),
            inner: Arc::new(CallableImpl::Compiled {
                params,
                body,
                resolver,
                options,
            }),
        }
    }

    pub fn native<F>(name: impl Into<String>, f: F) -> Self
    where
        F: Fn(&[Value]) -> ExprResult<Value> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            inner: Arc::new(CallableImpl::Native(Arc::new(f))),
        }
    }

    /// A callable that reports `error` on every call. Used for function
    /// descriptors whose body failed to compile, so invoking the handler
    /// surfaces the mistake instead of a silent no-op.
    pub fn failing(name: impl Into<String>, error: ExprError) -> Self {
        Self::native(name, move |_args| Err(error.clone()))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn same(&self, other: &Callable) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Invoke the callable. Errors are surfaced to the caller; this is the
    /// one place evaluation failures are not swallowed.
    pub fn call(&self, args: &[Value]) -> ExprResult<Value> {
        match &*self.inner {
            CallableImpl::Native(f) => f(args),
            CallableImpl::Compiled {
                params,
                body,
                resolver,
                options,
            } => {
                let bound: Arc<dyn ScopeResolver> = Arc::new(ParamResolver {
                    params: params
                        .iter()
                        .cloned()
                        .zip(args.iter().cloned().chain(std::iter::repeat(Value::Null)))
                        .collect(),
                    parent: resolver.clone(),
                });
                let evaluator = Evaluator::new(*options);
                evaluator.eval_compiled(body, &bound)
            }
        }
    }
}

/// Parameter bindings layered over the captured resolver for one call.
struct ParamResolver {
    params: Vec<(String, Value)>,
    parent: Arc<dyn ScopeResolver>,
}

impl ScopeResolver for ParamResolver {
    fn resolve(&self, name: &str) -> Option<Value> {
        self.params
            .iter()
            .rev()
            .find(|(param, _)| param == name)
            .map(|(_, value)| value.clone())
            .or_else(|| self.parent.resolve(name))
    }
}
