//! The host view runtime boundary.

use futures::future::BoxFuture;
use montage_schema::NodeId;

/// What one mutation event changed in the rendered output. Handed to the
/// host so it can schedule the narrowest possible view update.
#[derive(Debug, Clone, PartialEq)]
pub enum Patch {
    Props { path: String },
    Children,
    SlotAdded { name: String },
    SlotRemoved { name: String },
    Visibility { visible: bool },
    LoopRebuilt { reused: usize, total: usize },
}

/// Supplied by the embedding view runtime: mount/update/unmount callbacks
/// plus the deferred-computation boundary the dispatcher parks async work
/// behind.
pub trait HostAdapter: Send + Sync {
    fn mount(&self, node_id: &NodeId);

    fn update(&self, node_id: &NodeId, patch: &Patch);

    fn unmount(&self, node_id: &NodeId);

    fn defer(&self, task: BoxFuture<'static, ()>);
}

/// Host for embeddings without a view layer of their own: view callbacks
/// are no-ops and deferred work goes onto the ambient tokio runtime.
pub struct TokioHost;

impl HostAdapter for TokioHost {
    fn mount(&self, _node_id: &NodeId) {}

    fn update(&self, _node_id: &NodeId, _patch: &Patch) {}

    fn unmount(&self, _node_id: &NodeId) {}

    fn defer(&self, task: BoxFuture<'static, ()>) {
        tokio::spawn(task);
    }
}
