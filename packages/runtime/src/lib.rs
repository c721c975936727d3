//! # Montage Runtime
//!
//! Turns authored schema nodes into live rendered output and keeps it
//! synchronized: the lifecycle dispatcher runs declared hooks in a fixed
//! order against the composed scope, and the node reconciler patches the
//! rendered tree per mutation event without full re-renders.
//!
//! Failures never cross a node boundary implicitly. A child's evaluation
//! or fetch failure renders as a missing marker or a null value; siblings
//! and the parent keep rendering.

pub mod error;
pub mod guards;
pub mod host;
pub mod lifecycle;
pub mod reconciler;
pub mod render;
pub mod renderer;

#[cfg(test)]
mod tests_reconciler;

pub use error::{RuntimeError, RuntimeResult};
pub use guards::{resolve_guard, GuardDecision, GuardOptions, GuardOutcome, ScopeGate};
pub use host::{HostAdapter, Patch, TokioHost};
pub use lifecycle::{LifecycleDispatcher, NodeInstance, RuntimeOptions};
pub use reconciler::{BoundNode, LoopInstance, NodeReconciler};
pub use render::{RenderComponent, RenderMode, RenderNode, RenderSlot};
pub use renderer::Renderer;
