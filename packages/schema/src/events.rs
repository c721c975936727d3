//! Per-node mutation events and the observer bus that delivers them.
//!
//! Events are emitted by the authoring session against a specific node;
//! the runtime only reacts. Multiple independent subscribers each get their
//! own delivery, in arrival order per node. Cross-node ordering is not
//! guaranteed.

use crate::descriptor::ValueDescriptor;
use crate::node::NodeChildren;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, Weak};

/// A single fine-grained schema mutation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum MutationEvent {
    /// A prop (or nested prop subtree) changed at `path`.
    PropChanged {
        path: String,
        old: Option<ValueDescriptor>,
        new: Option<ValueDescriptor>,
    },

    /// The default children were replaced wholesale.
    ChildrenReplaced { children: Option<NodeChildren> },

    /// The hidden flag flipped.
    VisibilityChanged { visible: bool },
}

type Observer = Arc<dyn Fn(&MutationEvent) + Send + Sync>;

struct ObserverSet {
    next_id: u64,
    observers: BTreeMap<u64, Observer>,
}

/// Typed event bus for one node. Subscribing returns a [`Subscription`]
/// handle; dropping the handle does not unsubscribe, `cancel` does.
#[derive(Clone)]
pub struct NodeObservers {
    inner: Arc<Mutex<ObserverSet>>,
}

impl NodeObservers {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(ObserverSet {
                next_id: 0,
                observers: BTreeMap::new(),
            })),
        }
    }

    pub fn subscribe<F>(&self, observer: F) -> Subscription
    where
        F: Fn(&MutationEvent) + Send + Sync + 'static,
    {
        let mut set = self.inner.lock().unwrap();
        let id = set.next_id;
        set.next_id += 1;
        set.observers.insert(id, Arc::new(observer));
        Subscription {
            id,
            inner: Arc::downgrade(&self.inner),
        }
    }

    /// Deliver an event to every live subscriber, in subscription order.
    pub fn emit(&self, event: &MutationEvent) {
        // Snapshot under the lock, call outside it, so an observer can
        // subscribe or cancel without deadlocking.
        let observers: Vec<Observer> = {
            let set = self.inner.lock().unwrap();
            set.observers.values().cloned().collect()
        };
        for observer in observers {
            observer(event);
        }
    }

    pub fn observer_count(&self) -> usize {
        self.inner.lock().unwrap().observers.len()
    }
}

impl Default for NodeObservers {
    fn default() -> Self {
        Self::new()
    }
}

/// Handle for one subscription. `cancel` removes the observer; it is a no-op
/// if the bus is already gone.
pub struct Subscription {
    id: u64,
    inner: Weak<Mutex<ObserverSet>>,
}

impl Subscription {
    pub fn cancel(&self) {
        if let Some(inner) = self.inner.upgrade() {
            inner.lock().unwrap().observers.remove(&self.id);
        }
    }
}
