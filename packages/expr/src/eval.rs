//! Descriptor and expression evaluation against an explicit scope resolver.

use crate::ast::{BinaryOp, Expr, UnaryOp};
use crate::error::{ExprError, ExprResult};
use crate::parser::parse_expression;
use crate::value::{Callable, Value};
use montage_schema::{Directive, ValueDescriptor, RESERVED_PREFIX};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::{debug, warn};

/// Explicit scope lookup consulted by compiled expressions. Replaces any
/// ambient or `with`-style resolution: the evaluator only ever sees this.
pub trait ScopeResolver: Send + Sync {
    fn resolve(&self, name: &str) -> Option<Value>;
}

/// Constructor flags for the evaluator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExprOptions {
    /// When true, free identifiers resolve against the scope, i.e. `count`
    /// means `self.count`. When false only `self`-qualified references do.
    pub implicit_scope: bool,
}

impl Default for ExprOptions {
    fn default() -> Self {
        Self {
            implicit_scope: true,
        }
    }
}

/// Expression evaluator.
///
/// Compiling a body is cached per body text; binding to a scope is per call,
/// so the same descriptor evaluated against two scopes never shares state
/// beyond the parsed AST.
pub struct Evaluator {
    options: ExprOptions,
    cache: Mutex<HashMap<String, Arc<Expr>>>,
}

impl Evaluator {
    pub fn new(options: ExprOptions) -> Self {
        Self {
            options,
            cache: Mutex::new(HashMap::new()),
        }
    }

    pub fn options(&self) -> ExprOptions {
        self.options
    }

    /// Parse `body`, consulting the per-text compile cache.
    pub fn compile(&self, body: &str) -> ExprResult<Arc<Expr>> {
        if let Some(cached) = self.cache.lock().unwrap().get(body) {
            return Ok(cached.clone());
        }
        let compiled = Arc::new(parse_expression(body)?);
        self.cache
            .lock()
            .unwrap()
            .insert(body.to_string(), compiled.clone());
        Ok(compiled)
    }

    /// Evaluate a descriptor against a scope.
    ///
    /// Failures do not cross this boundary: compile or runtime errors are
    /// logged and resolve to [`Value::Null`]. Function descriptors become
    /// callables whose invocation errors surface to the caller instead.
    pub fn evaluate(&self, descriptor: &ValueDescriptor, scope: &Arc<dyn ScopeResolver>) -> Value {
        match descriptor {
            ValueDescriptor::Literal(json) => {
                let value = Value::from_json(json);
                match value {
                    Value::String(s) => Value::String(s.trim().to_string()),
                    other => other,
                }
            }

            ValueDescriptor::Directive(Directive::Expr { body }) => {
                match self.try_eval_body(body, scope) {
                    Ok(value) => value,
                    Err(err) => {
                        warn!(body, error = %err, "expression evaluation failed");
                        Value::Null
                    }
                }
            }

            ValueDescriptor::Directive(Directive::Func { params, body }) => {
                match self.compile(body) {
                    Ok(compiled) => Value::Callable(Callable::compiled(
                        body.clone(),
                        params.clone(),
                        compiled,
                        scope.clone(),
                        self.options,
                    )),
                    Err(err) => {
                        warn!(body, error = %err, "function compilation failed");
                        Value::Callable(Callable::failing(body.clone(), err))
                    }
                }
            }

            // Localized text becomes a call of the scope's translation
            // function with the key as argument.
            ValueDescriptor::Directive(Directive::I18n { key }) => {
                let call = Expr::Call {
                    callee: Box::new(Expr::Member {
                        object: Box::new(Expr::Ident("self".to_string())),
                        property: "t".to_string(),
                    }),
                    args: vec![Expr::Str(key.clone())],
                };
                match self.eval_expr(&call, scope) {
                    Ok(value) => value,
                    Err(err) => {
                        warn!(key, error = %err, "i18n evaluation failed");
                        Value::Null
                    }
                }
            }

            // Slot descriptors are renderables; they carry no scalar value
            // here. The reconciler evaluates their nodes itself.
            ValueDescriptor::Directive(Directive::Slot { .. }) => {
                debug!("slot descriptor reached scalar evaluation; yielding null");
                Value::Null
            }

            ValueDescriptor::List(items) => {
                Value::Array(items.iter().map(|item| self.evaluate(item, scope)).collect())
            }

            ValueDescriptor::Map(map) => Value::Object(
                map.iter()
                    .filter(|(key, _)| !key.starts_with(RESERVED_PREFIX))
                    .map(|(key, value)| (key.clone(), self.evaluate(value, scope)))
                    .collect(),
            ),
        }
    }

    /// Compile and evaluate an expression body, surfacing errors.
    pub fn try_eval_body(&self, body: &str, scope: &Arc<dyn ScopeResolver>) -> ExprResult<Value> {
        let compiled = self.compile(body)?;
        self.eval_compiled(&compiled, scope)
    }

    /// Evaluate an already-compiled expression.
    pub fn eval_compiled(&self, body: &Arc<Expr>, scope: &Arc<dyn ScopeResolver>) -> ExprResult<Value> {
        self.eval_expr(body, scope)
    }

    fn eval_expr(&self, expr: &Expr, scope: &Arc<dyn ScopeResolver>) -> ExprResult<Value> {
        match expr {
            Expr::Null => Ok(Value::Null),
            Expr::Bool(b) => Ok(Value::Bool(*b)),
            Expr::Number(n) => Ok(Value::Number(*n)),
            Expr::Str(s) => Ok(Value::String(s.clone())),

            Expr::Ident(name) => {
                if name == "self" {
                    // `self` only appears as a member-access base.
                    return Err(ExprError::NotAnObject {
                        property: String::new(),
                        on: "bare 'self'".to_string(),
                    });
                }
                if self.options.implicit_scope {
                    scope
                        .resolve(name)
                        .ok_or_else(|| ExprError::UnknownIdentifier(name.clone()))
                } else {
                    Err(ExprError::UnknownIdentifier(name.clone()))
                }
            }

            Expr::Member { object, property } => {
                // `self.x` reads straight through the resolver.
                if matches!(&**object, Expr::Ident(name) if name == "self") {
                    return scope
                        .resolve(property)
                        .ok_or_else(|| ExprError::UnknownIdentifier(property.clone()));
                }
                let value = self.eval_expr(object, scope)?;
                match value {
                    Value::Object(map) => map
                        .get(property)
                        .cloned()
                        .ok_or_else(|| ExprError::UnknownIdentifier(property.clone())),
                    Value::Array(items) if property == "length" => {
                        Ok(Value::Number(items.len() as f64))
                    }
                    Value::String(s) if property == "length" => {
                        Ok(Value::Number(s.chars().count() as f64))
                    }
                    other => Err(ExprError::NotAnObject {
                        property: property.clone(),
                        on: format!("{:?}", other),
                    }),
                }
            }

            Expr::Index { object, index } => {
                let value = self.eval_expr(object, scope)?;
                let index = self.eval_expr(index, scope)?;
                match (&value, &index) {
                    (Value::Array(items), Value::Number(n)) => {
                        Ok(items.get(*n as usize).cloned().unwrap_or(Value::Null))
                    }
                    (Value::Object(map), Value::String(key)) => {
                        Ok(map.get(key).cloned().unwrap_or(Value::Null))
                    }
                    _ => Err(ExprError::NotIndexable {
                        on: format!("{:?}[{:?}]", value, index),
                    }),
                }
            }

            Expr::Call { callee, args } => {
                let callee_value = self.eval_expr(callee, scope)?;
                let Value::Callable(callable) = callee_value else {
                    return Err(ExprError::NotCallable(format!("{:?}", callee_value)));
                };
                let mut evaluated = Vec::with_capacity(args.len());
                for arg in args {
                    evaluated.push(self.eval_expr(arg, scope)?);
                }
                callable.call(&evaluated)
            }

            Expr::Unary { op, operand } => {
                let value = self.eval_expr(operand, scope)?;
                match op {
                    UnaryOp::Not => Ok(Value::Bool(!value.is_truthy())),
                    UnaryOp::Negate => match value {
                        Value::Number(n) => Ok(Value::Number(-n)),
                        other => Err(ExprError::InvalidOperands {
                            operator: "-".to_string(),
                            details: format!("expected number, got {:?}", other),
                        }),
                    },
                }
            }

            Expr::Binary { left, op, right } => self.eval_binary(left, *op, right, scope),

            Expr::Ternary {
                condition,
                then_branch,
                else_branch,
            } => {
                if self.eval_expr(condition, scope)?.is_truthy() {
                    self.eval_expr(then_branch, scope)
                } else {
                    self.eval_expr(else_branch, scope)
                }
            }

            Expr::Array(items) => {
                let mut out = Vec::with_capacity(items.len());
                for item in items {
                    out.push(self.eval_expr(item, scope)?);
                }
                Ok(Value::Array(out))
            }

            Expr::Object(entries) => {
                let mut out = std::collections::BTreeMap::new();
                for (key, value) in entries {
                    out.insert(key.clone(), self.eval_expr(value, scope)?);
                }
                Ok(Value::Object(out))
            }
        }
    }

    fn eval_binary(
        &self,
        left: &Expr,
        op: BinaryOp,
        right: &Expr,
        scope: &Arc<dyn ScopeResolver>,
    ) -> ExprResult<Value> {
        // Short-circuit forms evaluate the right side lazily.
        match op {
            BinaryOp::And => {
                let left_val = self.eval_expr(left, scope)?;
                if !left_val.is_truthy() {
                    return Ok(Value::Bool(false));
                }
                return Ok(Value::Bool(self.eval_expr(right, scope)?.is_truthy()));
            }
            BinaryOp::Or => {
                let left_val = self.eval_expr(left, scope)?;
                if left_val.is_truthy() {
                    return Ok(Value::Bool(true));
                }
                return Ok(Value::Bool(self.eval_expr(right, scope)?.is_truthy()));
            }
            _ => {}
        }

        let left_val = self.eval_expr(left, scope)?;
        let right_val = self.eval_expr(right, scope)?;

        let invalid = |op: BinaryOp, l: &Value, r: &Value| ExprError::InvalidOperands {
            operator: op.symbol().to_string(),
            details: format!("{:?} {} {:?}", l, op.symbol(), r),
        };

        match op {
            BinaryOp::Add => match (&left_val, &right_val) {
                (Value::Number(a), Value::Number(b)) => Ok(Value::Number(a + b)),
                (Value::String(a), Value::String(b)) => Ok(Value::String(format!("{}{}", a, b))),
                (Value::String(a), b) => Ok(Value::String(format!("{}{}", a, b.render()))),
                (a, Value::String(b)) => Ok(Value::String(format!("{}{}", a.render(), b))),
                _ => Err(invalid(op, &left_val, &right_val)),
            },
            BinaryOp::Subtract => match (&left_val, &right_val) {
                (Value::Number(a), Value::Number(b)) => Ok(Value::Number(a - b)),
                _ => Err(invalid(op, &left_val, &right_val)),
            },
            BinaryOp::Multiply => match (&left_val, &right_val) {
                (Value::Number(a), Value::Number(b)) => Ok(Value::Number(a * b)),
                _ => Err(invalid(op, &left_val, &right_val)),
            },
            BinaryOp::Divide => match (&left_val, &right_val) {
                (Value::Number(a), Value::Number(b)) => {
                    if *b == 0.0 {
                        Err(ExprError::DivisionByZero)
                    } else {
                        Ok(Value::Number(a / b))
                    }
                }
                _ => Err(invalid(op, &left_val, &right_val)),
            },
            BinaryOp::Modulo => match (&left_val, &right_val) {
                (Value::Number(a), Value::Number(b)) => {
                    if *b == 0.0 {
                        Err(ExprError::DivisionByZero)
                    } else {
                        Ok(Value::Number(a % b))
                    }
                }
                _ => Err(invalid(op, &left_val, &right_val)),
            },
            BinaryOp::Equals => Ok(Value::Bool(left_val == right_val)),
            BinaryOp::NotEquals => Ok(Value::Bool(left_val != right_val)),
            BinaryOp::LessThan
            | BinaryOp::LessThanOrEqual
            | BinaryOp::GreaterThan
            | BinaryOp::GreaterThanOrEqual => {
                let ordering = match (&left_val, &right_val) {
                    (Value::Number(a), Value::Number(b)) => a.partial_cmp(b),
                    (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
                    _ => None,
                };
                let Some(ordering) = ordering else {
                    return Err(invalid(op, &left_val, &right_val));
                };
                let result = match op {
                    BinaryOp::LessThan => ordering.is_lt(),
                    BinaryOp::LessThanOrEqual => ordering.is_le(),
                    BinaryOp::GreaterThan => ordering.is_gt(),
                    _ => ordering.is_ge(),
                };
                Ok(Value::Bool(result))
            }
            BinaryOp::And | BinaryOp::Or => unreachable!("handled above"),
        }
    }
}
