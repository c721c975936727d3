//! # Montage Scope
//!
//! The layered binding environment schema expressions are evaluated against.
//!
//! A scope is an ordered list of named layers, each a plain key-value store.
//! Lookup walks layers inner-to-outer (block bindings shadow data-source
//! results shadow setup values, and so on down to declared props); writes
//! target an explicit layer id and go through the single `set`/`merge`
//! entry points so watchers fire. Block-local scopes delegate to the root
//! scope they were merged from, preserving its identity for method binding.

pub mod compose;
pub mod context;
pub mod error;
pub mod layers;
pub mod scope;


pub use compose::{AmbientScope, ScopeComposer};
pub use context::ContextRegistry;
pub use error::{ScopeError, ScopeResult};
pub use layers::Layer;
pub use scope::{MergeOperand, Scope};
