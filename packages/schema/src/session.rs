//! Authoring-session interfaces.
//!
//! The authoring collaborator owns the schema and emits mutation events.
//! The runtime consumes it through [`AuthoringSession`] and [`NodeHandle`]
//! only. [`MemorySession`] is a complete in-memory implementation used for
//! embedding and tests.

use crate::descriptor::ValueDescriptor;
use crate::error::{SchemaError, SchemaResult};
use crate::events::{MutationEvent, NodeObservers, Subscription};
use crate::node::{NodeChildren, NodeId, SchemaNode};
use serde_json::Value as JsonValue;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::debug;

/// What an exported schema is for: `Save` keeps everything, `Render` strips
/// reserved-prefix bookkeeping keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportStage {
    Render,
    Save,
}

/// Live handle onto one authored node: a read reference plus subscriptions.
pub trait NodeHandle: Send + Sync {
    fn id(&self) -> NodeId;

    /// Snapshot of the current schema.
    fn schema(&self) -> SchemaNode;

    fn is_container(&self) -> bool;

    /// Resolve a dotted prop path against the current schema.
    fn get_prop(&self, path: &str) -> Option<ValueDescriptor>;

    fn export_schema(&self, stage: ExportStage) -> JsonValue;

    fn replace_child(&self, node: SchemaNode) -> SchemaResult<()>;

    fn set_prop_value(&self, path: &str, value: ValueDescriptor) -> SchemaResult<()>;

    fn set_visible(&self, visible: bool);

    fn set_children(&self, children: Option<NodeChildren>);

    fn on_prop_change(
        &self,
        f: Box<dyn Fn(&MutationEvent) + Send + Sync>,
    ) -> Subscription;

    fn on_visible_change(
        &self,
        f: Box<dyn Fn(&MutationEvent) + Send + Sync>,
    ) -> Subscription;

    fn on_children_change(
        &self,
        f: Box<dyn Fn(&MutationEvent) + Send + Sync>,
    ) -> Subscription;
}

/// Node lookup, the only entry point the runtime has into the session.
pub trait AuthoringSession: Send + Sync {
    fn get_node(&self, id: &NodeId) -> Option<Arc<dyn NodeHandle>>;
}

/// In-memory node handle backing [`MemorySession`].
pub struct MemoryNodeHandle {
    schema: Mutex<SchemaNode>,
    observers: NodeObservers,
}

impl MemoryNodeHandle {
    pub fn new(schema: SchemaNode) -> Self {
        Self {
            schema: Mutex::new(schema),
            observers: NodeObservers::new(),
        }
    }

    /// The raw bus, for collaborators that emit their own events in tests.
    pub fn observers(&self) -> &NodeObservers {
        &self.observers
    }
}

impl NodeHandle for MemoryNodeHandle {
    fn id(&self) -> NodeId {
        self.schema.lock().unwrap().id.clone()
    }

    fn schema(&self) -> SchemaNode {
        self.schema.lock().unwrap().clone()
    }

    fn is_container(&self) -> bool {
        self.schema.lock().unwrap().children.is_some()
    }

    fn get_prop(&self, path: &str) -> Option<ValueDescriptor> {
        self.schema.lock().unwrap().prop_at(path).cloned()
    }

    fn export_schema(&self, stage: ExportStage) -> JsonValue {
        let schema = self.schema.lock().unwrap();
        match stage {
            ExportStage::Save => serde_json::to_value(&*schema).unwrap_or(JsonValue::Null),
            ExportStage::Render => {
                let mut rendered = schema.clone();
                rendered.props = rendered
                    .props
                    .into_iter()
                    .filter(|(k, _)| !k.starts_with(crate::descriptor::RESERVED_PREFIX))
                    .map(|(k, v)| (k, v.strip_reserved()))
                    .collect();
                serde_json::to_value(&rendered).unwrap_or(JsonValue::Null)
            }
        }
    }

    fn replace_child(&self, node: SchemaNode) -> SchemaResult<()> {
        let mut schema = self.schema.lock().unwrap();
        match &mut schema.children {
            Some(NodeChildren::List(children)) => {
                match children.iter_mut().find(|c| c.id == node.id) {
                    Some(child) => *child = node,
                    None => children.push(node),
                }
            }
            Some(NodeChildren::Node(child)) if child.id == node.id => {
                **child = node;
            }
            _ => {
                schema.children = Some(NodeChildren::List(vec![node]));
            }
        }
        let children = schema.children.clone();
        drop(schema);
        self.observers
            .emit(&MutationEvent::ChildrenReplaced { children });
        Ok(())
    }

    fn set_prop_value(&self, path: &str, value: ValueDescriptor) -> SchemaResult<()> {
        // The loop directive lives beside the props but is edited through
        // the same path-addressed entry point.
        if path == "loop" {
            let old = {
                let mut schema = self.schema.lock().unwrap();
                let old = schema.loop_source.take();
                schema.loop_source = Some(value.clone());
                old
            };
            self.observers.emit(&MutationEvent::PropChanged {
                path: path.to_string(),
                old,
                new: Some(value),
            });
            return Ok(());
        }
        let (old, node_id) = {
            let mut schema = self.schema.lock().unwrap();
            let old = schema.prop_at(path).cloned();
            match path.split_once('.') {
                Some((head, rest)) => {
                    let prop = schema
                        .props
                        .entry(head.to_string())
                        .or_insert_with(|| ValueDescriptor::Map(Default::default()));
                    prop.set_at_path(rest, value.clone())
                        .map_err(|_| SchemaError::NotAMapping {
                            path: path.to_string(),
                        })?;
                }
                None => {
                    schema.props.insert(path.to_string(), value.clone());
                }
            }
            (old, schema.id.clone())
        };
        debug!(node = %node_id, path, "prop changed");
        self.observers.emit(&MutationEvent::PropChanged {
            path: path.to_string(),
            old,
            new: Some(value),
        });
        Ok(())
    }

    fn set_visible(&self, visible: bool) {
        {
            let mut schema = self.schema.lock().unwrap();
            schema.hidden = !visible;
        }
        self.observers
            .emit(&MutationEvent::VisibilityChanged { visible });
    }

    fn set_children(&self, children: Option<NodeChildren>) {
        {
            let mut schema = self.schema.lock().unwrap();
            schema.children = children.clone();
        }
        self.observers
            .emit(&MutationEvent::ChildrenReplaced { children });
    }

    fn on_prop_change(&self, f: Box<dyn Fn(&MutationEvent) + Send + Sync>) -> Subscription {
        self.observers.subscribe(move |event| {
            if matches!(event, MutationEvent::PropChanged { .. }) {
                f(event);
            }
        })
    }

    fn on_visible_change(&self, f: Box<dyn Fn(&MutationEvent) + Send + Sync>) -> Subscription {
        self.observers.subscribe(move |event| {
            if matches!(event, MutationEvent::VisibilityChanged { .. }) {
                f(event);
            }
        })
    }

    fn on_children_change(&self, f: Box<dyn Fn(&MutationEvent) + Send + Sync>) -> Subscription {
        self.observers.subscribe(move |event| {
            if matches!(event, MutationEvent::ChildrenReplaced { .. }) {
                f(event);
            }
        })
    }
}

/// In-memory authoring session: a flat id → handle map. Child nodes are
/// registered individually so reconcilers can subscribe per node.
#[derive(Default)]
pub struct MemorySession {
    nodes: Mutex<HashMap<NodeId, Arc<MemoryNodeHandle>>>,
}

impl MemorySession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `schema` and, recursively, every descendant node.
    pub fn insert(&self, schema: SchemaNode) -> Arc<MemoryNodeHandle> {
        if let Some(children) = &schema.children {
            for child in children.nodes() {
                self.insert(child.clone());
            }
        }
        let handle = Arc::new(MemoryNodeHandle::new(schema.clone()));
        self.nodes
            .lock()
            .unwrap()
            .insert(schema.id.clone(), handle.clone());
        handle
    }

    pub fn handle(&self, id: &NodeId) -> Option<Arc<MemoryNodeHandle>> {
        self.nodes.lock().unwrap().get(id).cloned()
    }
}

impl AuthoringSession for MemorySession {
    fn get_node(&self, id: &NodeId) -> Option<Arc<dyn NodeHandle>> {
        self.nodes
            .lock()
            .unwrap()
            .get(id)
            .cloned()
            .map(|h| h as Arc<dyn NodeHandle>)
    }
}
