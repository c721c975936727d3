//! Incremental reconciliation of one bound node.
//!
//! `bind` renders once and subscribes to the node's mutation events; each
//! event recomputes the minimum slice of the rendered output. Failures stay
//! inside the node: a bad descriptor renders as null or a missing marker and
//! never aborts siblings.

use crate::host::{HostAdapter, Patch};
use crate::render::{patch_prop, remove_prop, RenderNode, RenderSlot};
use crate::renderer::Renderer;
use montage_expr::{Callable, Value};
use montage_schema::{
    Directive, LoopArgs, MutationEvent, NodeChildren, NodeHandle, Subscription, ValueDescriptor,
};
use montage_scope::Scope;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tracing::{debug, warn};

/// One live loop iteration. The block scope survives rebuilds for reused
/// indices, so watchers and method bindings registered against it stay
/// valid.
pub struct LoopInstance {
    pub item: Value,
    pub scope: Scope,
    pub node: RenderNode,
}

enum Output {
    Single(RenderNode),
    Looped {
        args: LoopArgs,
        instances: Vec<LoopInstance>,
    },
}

pub struct NodeReconciler {
    renderer: Arc<Renderer>,
}

impl NodeReconciler {
    pub fn new(renderer: Arc<Renderer>) -> Self {
        Self { renderer }
    }

    pub fn renderer(&self) -> &Arc<Renderer> {
        &self.renderer
    }

    /// Render `handle`'s node once and keep the output synchronized with
    /// its mutation events until the returned binding is detached.
    pub fn bind(
        &self,
        handle: Arc<dyn NodeHandle>,
        scope: Scope,
        host: Arc<dyn HostAdapter>,
        updated: Option<Callable>,
    ) -> Arc<BoundNode> {
        let schema = handle.schema();
        let output = if schema.loop_source.is_some() {
            let args = schema.loop_args.clone().unwrap_or_default();
            let items = self.renderer.loop_items(&schema, &scope).unwrap_or_default();
            let instances = items
                .into_iter()
                .enumerate()
                .map(|(index, item)| {
                    let (block, node) =
                        self.renderer
                            .render_iteration(&schema, &scope, &args, item.clone(), index);
                    LoopInstance {
                        item,
                        scope: block,
                        node,
                    }
                })
                .collect();
            Output::Looped { args, instances }
        } else {
            Output::Single(self.renderer.render(&schema, &scope))
        };

        let bound = Arc::new(BoundNode {
            handle: handle.clone(),
            scope,
            renderer: self.renderer.clone(),
            host,
            updated,
            output: Mutex::new(output),
            event_visible: Mutex::new(!schema.hidden),
            subscriptions: Mutex::new(Vec::new()),
            detached: AtomicBool::new(false),
        });

        let subscriptions = vec![
            handle.on_prop_change(Box::new(observer(&bound))),
            handle.on_children_change(Box::new(observer(&bound))),
            handle.on_visible_change(Box::new(observer(&bound))),
        ];
        *bound.subscriptions.lock().unwrap() = subscriptions;

        // Scope writes (state mutations, data-source results) re-evaluate
        // the rendered expressions; schema mutations arrive as events above.
        let weak = Arc::downgrade(&bound);
        bound.scope.watch_any(move |_key, _value| {
            if let Some(bound) = weak.upgrade() {
                bound.refresh();
            }
        });

        debug!(node = %handle.id(), "node bound");
        bound
    }
}

fn observer(bound: &Arc<BoundNode>) -> impl Fn(&MutationEvent) + Send + Sync {
    let weak = Arc::downgrade(bound);
    move |event| {
        if let Some(bound) = weak.upgrade() {
            bound.apply(event);
        }
    }
}

/// A node whose rendered output is kept live.
pub struct BoundNode {
    handle: Arc<dyn NodeHandle>,
    scope: Scope,
    renderer: Arc<Renderer>,
    host: Arc<dyn HostAdapter>,
    updated: Option<Callable>,
    output: Mutex<Output>,
    /// The hidden-flag axis, updated by visibility events. Independent from
    /// the condition axis; either being false suppresses rendering.
    event_visible: Mutex<bool>,
    subscriptions: Mutex<Vec<Subscription>>,
    detached: AtomicBool,
}

impl BoundNode {
    pub fn scope(&self) -> &Scope {
        &self.scope
    }

    /// Snapshot of the rendered output; one entry per loop instance, a
    /// single entry otherwise.
    pub fn output(&self) -> Vec<RenderNode> {
        match &*self.output.lock().unwrap() {
            Output::Single(node) => vec![node.clone()],
            Output::Looped { instances, .. } => {
                instances.iter().map(|inst| inst.node.clone()).collect()
            }
        }
    }

    /// The block scopes of the current loop instances, in order.
    pub fn instance_scopes(&self) -> Vec<Scope> {
        match &*self.output.lock().unwrap() {
            Output::Single(_) => Vec::new(),
            Output::Looped { instances, .. } => {
                instances.iter().map(|inst| inst.scope.clone()).collect()
            }
        }
    }

    /// The hidden-flag axis as last reported by the authoring session.
    pub fn event_visible(&self) -> bool {
        *self.event_visible.lock().unwrap()
    }

    /// Cancel the mutation subscriptions and stop reacting to scope writes.
    /// The last output snapshot stays readable.
    pub fn detach(&self) {
        self.detached.store(true, Ordering::SeqCst);
        for subscription in self.subscriptions.lock().unwrap().drain(..) {
            subscription.cancel();
        }
    }

    pub fn apply(&self, event: &MutationEvent) {
        let patch = match event {
            MutationEvent::PropChanged { path, old, new } => self.apply_prop(path, old, new),
            MutationEvent::ChildrenReplaced { children } => self.apply_children(children.as_ref()),
            MutationEvent::VisibilityChanged { visible } => self.apply_visibility(*visible),
        };
        let Some(patch) = patch else { return };
        self.emit(&patch);
    }

    /// Re-evaluate scope-dependent output after a write through the scope.
    /// Structure driven by the schema (loops, slots, children) is rebuilt by
    /// its own mutation events, not here.
    fn refresh(&self) {
        if self.detached.load(Ordering::SeqCst) {
            return;
        }
        let schema = self.handle.schema();
        let event_visible = self.event_visible();
        let mut patches: Vec<Patch> = Vec::new();
        self.for_each_component(|component, scope| {
            for (name, descriptor) in &schema.props {
                if descriptor.is_slot() {
                    continue;
                }
                let next = scope.evaluator().evaluate(descriptor, &scope.resolver());
                let unchanged = match (component.props.get(name), &next) {
                    // Function descriptors compile to a fresh callable each
                    // pass; the underlying binding has not changed.
                    (Some(Value::Callable(_)), Value::Callable(_)) => true,
                    (Some(old), _) => old == &next,
                    (None, _) => false,
                };
                if unchanged {
                    continue;
                }
                component.props.insert(name.clone(), next);
                let patch = Patch::Props { path: name.clone() };
                if !patches.contains(&patch) {
                    patches.push(patch);
                }
            }
            let visible = event_visible && self.renderer.condition(&schema, scope);
            if component.visible != visible {
                component.visible = visible;
                let patch = Patch::Visibility { visible };
                if !patches.contains(&patch) {
                    patches.push(patch);
                }
            }
        });
        for patch in patches {
            self.emit(&patch);
        }
    }

    fn emit(&self, patch: &Patch) {
        if let Some(updated) = &self.updated {
            if let Err(err) = updated.call(&[]) {
                warn!(node = %self.handle.id(), error = %err, "updated hook failed");
            }
        }
        self.host.update(&self.handle.id(), patch);
    }

    fn apply_prop(
        &self,
        path: &str,
        old: &Option<ValueDescriptor>,
        new: &Option<ValueDescriptor>,
    ) -> Option<Patch> {
        if path == "loop" {
            return self.rebuild_loop();
        }

        // Slot transitions only happen at top-level prop names.
        if !path.contains('.') {
            let was_slot = old.as_ref().map_or(false, ValueDescriptor::is_slot);
            if let Some(ValueDescriptor::Directive(Directive::Slot { nodes, params })) = new {
                let slot = RenderSlot {
                    params: params.clone(),
                    nodes: nodes.clone(),
                };
                self.for_each_component(|component, _| {
                    component.slots.insert(path.to_string(), slot.clone());
                    component.props.remove(path);
                });
                return Some(Patch::SlotAdded {
                    name: path.to_string(),
                });
            }
            if was_slot {
                self.for_each_component(|component, _| {
                    component.slots.remove(path);
                });
                return Some(Patch::SlotRemoved {
                    name: path.to_string(),
                });
            }
        }

        // Re-evaluate only the descriptor subtree under the path, against
        // each instance's own scope, and patch it in place. A removed
        // descriptor removes the rendered entry.
        self.for_each_component(|component, scope| match new {
            Some(descriptor) => {
                let value = scope.evaluator().evaluate(descriptor, &scope.resolver());
                patch_prop(&mut component.props, path, value);
            }
            None => remove_prop(&mut component.props, path),
        });
        Some(Patch::Props {
            path: path.to_string(),
        })
    }

    fn apply_children(&self, children: Option<&NodeChildren>) -> Option<Patch> {
        let component_name = self.handle.schema().component;
        self.for_each_component(|component, scope| {
            let rendered = self.renderer.render_children(children, scope);
            component.children = self
                .renderer
                .finalize_children(&component_name, rendered);
        });
        Some(Patch::Children)
    }

    fn apply_visibility(&self, visible: bool) -> Option<Patch> {
        *self.event_visible.lock().unwrap() = visible;
        let schema = self.handle.schema();
        self.for_each_component(|component, scope| {
            component.visible = visible && self.renderer.condition(&schema, scope);
        });
        Some(Patch::Visibility { visible })
    }

    /// Re-evaluate the loop source and rebuild the instance set, keeping
    /// existing instances for the leading prefix of unchanged items.
    fn rebuild_loop(&self) -> Option<Patch> {
        let schema = self.handle.schema();
        let args = schema.loop_args.clone().unwrap_or_default();
        let items = self
            .renderer
            .loop_items(&schema, &self.scope)
            .unwrap_or_default();

        let mut output = self.output.lock().unwrap();
        let old = match std::mem::replace(
            &mut *output,
            Output::Looped {
                args: args.clone(),
                instances: Vec::new(),
            },
        ) {
            Output::Looped { instances, .. } => instances,
            Output::Single(_) => Vec::new(),
        };

        let reused = old
            .iter()
            .zip(&items)
            .take_while(|(instance, item)| instance.item == **item)
            .count();
        let mut instances: Vec<LoopInstance> = old.into_iter().take(reused).collect();
        for (index, item) in items.iter().enumerate().skip(reused) {
            let (block, node) =
                self.renderer
                    .render_iteration(&schema, &self.scope, &args, item.clone(), index);
            instances.push(LoopInstance {
                item: item.clone(),
                scope: block,
                node,
            });
        }

        let total = instances.len();
        debug!(node = %schema.id, reused, total, "loop rebuilt");
        *output = Output::Looped { args, instances };
        Some(Patch::LoopRebuilt { reused, total })
    }

    fn for_each_component<F>(&self, mut f: F)
    where
        F: FnMut(&mut crate::render::RenderComponent, &Scope),
    {
        let mut output = self.output.lock().unwrap();
        match &mut *output {
            Output::Single(node) => {
                if let RenderNode::Component(component) = node {
                    f(component, &self.scope);
                }
            }
            Output::Looped { instances, .. } => {
                for instance in instances {
                    if let RenderNode::Component(component) = &mut instance.node {
                        f(component, &instance.scope);
                    }
                }
            }
        }
    }
}
