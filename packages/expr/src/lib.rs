//! # Montage Expressions
//!
//! The expression language embedded in schema value descriptors: a small
//! JS-flavored expression grammar lexed with logos, parsed with a Pratt
//! parser, and evaluated against an explicit scope resolver.
//!
//! ## Containment contract
//!
//! Evaluation failures never cross the [`Evaluator::evaluate`] boundary: a
//! malformed expression logs and resolves to [`Value::Null`] so one bad
//! descriptor cannot halt a whole tree. The one exception is a [`Callable`]
//! invoked as an event handler, whose errors surface to the caller of
//! [`Callable::call`].

pub mod ast;
pub mod error;
pub mod eval;
pub mod parser;
pub mod token;
pub mod value;


pub use ast::{BinaryOp, Expr, UnaryOp};
pub use error::{ExprError, ExprResult};
pub use eval::{Evaluator, ExprOptions, ScopeResolver};
pub use parser::parse_expression;
pub use value::{Callable, Value};
