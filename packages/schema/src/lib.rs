//! # Montage Schema
//!
//! Data model for the Montage UI runtime: schema nodes, value descriptors,
//! mutation events, and the interfaces the runtime consumes from its
//! collaborators (authoring session, component registry, translation table).
//!
//! The schema is owned by an external authoring session. The runtime holds
//! read references plus subscriptions; it never emits mutation events itself.

pub mod descriptor;
pub mod error;
pub mod events;
pub mod i18n;
pub mod node;
pub mod registry;
pub mod session;

#[cfg(test)]
mod tests_schema;

pub use descriptor::{Directive, ValueDescriptor, RESERVED_PREFIX};
pub use error::{SchemaError, SchemaResult};
pub use events::{MutationEvent, NodeObservers, Subscription};
pub use i18n::TranslationTable;
pub use node::{
    DataSourceDecl, LifecycleHooks, LoopArgs, NodeChildren, NodeId, SchemaNode, WatchDecl,
};
pub use registry::{ComponentRegistry, ComponentSpec};
pub use session::{AuthoringSession, ExportStage, MemoryNodeHandle, MemorySession, NodeHandle};
