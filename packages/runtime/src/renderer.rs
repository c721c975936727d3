//! Evaluating a schema node against a scope into a render tree.

use crate::render::{RenderComponent, RenderMode, RenderNode, RenderSlot};
use montage_expr::Value;
use montage_schema::{
    ComponentRegistry, Directive, LoopArgs, NodeChildren, SchemaNode, ValueDescriptor,
};
use montage_scope::Scope;
use std::collections::BTreeMap;
use tracing::warn;

pub struct Renderer {
    registry: ComponentRegistry,
    mode: RenderMode,
}

impl Renderer {
    pub fn new(registry: ComponentRegistry, mode: RenderMode) -> Self {
        Self { registry, mode }
    }

    pub fn mode(&self) -> RenderMode {
        self.mode
    }

    pub fn registry(&self) -> &ComponentRegistry {
        &self.registry
    }

    /// Render one node against `scope`.
    ///
    /// A `loop` directive on `schema` itself is not expanded here; iteration
    /// is driven by the caller so instances can be kept across rebuilds.
    pub fn render(&self, schema: &SchemaNode, scope: &Scope) -> RenderNode {
        let Some(spec) = self.registry.get(&schema.component) else {
            warn!(node = %schema.id, component = %schema.component, "component not registered");
            return RenderNode::Missing {
                component: schema.component.clone(),
            };
        };

        let resolver = scope.resolver();
        let evaluator = scope.evaluator();

        let mut props: BTreeMap<String, Value> = spec
            .default_props
            .iter()
            .map(|(name, json)| (name.clone(), Value::from_json(json)))
            .collect();
        let mut slots = BTreeMap::new();
        for (name, descriptor) in &schema.props {
            match descriptor {
                ValueDescriptor::Directive(Directive::Slot { nodes, params }) => {
                    slots.insert(
                        name.clone(),
                        RenderSlot {
                            params: params.clone(),
                            nodes: nodes.clone(),
                        },
                    );
                }
                other => {
                    props.insert(name.clone(), evaluator.evaluate(other, &resolver));
                }
            }
        }

        let children = self.finalize_children(
            &schema.component,
            self.render_children(schema.children.as_ref(), scope),
        );

        RenderNode::Component(RenderComponent {
            node_id: schema.id.clone(),
            component: schema.component.clone(),
            props,
            slots,
            children,
            visible: self.condition(schema, scope) && !schema.hidden,
            key: schema.id.to_string(),
        })
    }

    /// The condition axis: absent means true.
    pub fn condition(&self, schema: &SchemaNode, scope: &Scope) -> bool {
        match &schema.condition {
            None => true,
            Some(descriptor) => scope
                .evaluator()
                .evaluate(descriptor, &scope.resolver())
                .is_truthy(),
        }
    }

    pub fn render_children(
        &self,
        children: Option<&NodeChildren>,
        scope: &Scope,
    ) -> Vec<RenderNode> {
        match children {
            None => Vec::new(),
            Some(NodeChildren::Text(text)) => vec![RenderNode::Text(text.clone())],
            Some(NodeChildren::Node(node)) => self.render_entry(node, scope),
            Some(NodeChildren::List(nodes)) => nodes
                .iter()
                .flat_map(|node| self.render_entry(node, scope))
                .collect(),
        }
    }

    /// Editing mode marks empty containers so the authoring surface has a
    /// drop target.
    pub fn finalize_children(&self, component: &str, children: Vec<RenderNode>) -> Vec<RenderNode> {
        let is_container = self
            .registry
            .get(component)
            .map(|spec| spec.container)
            .unwrap_or(false);
        if is_container && children.is_empty() && self.mode == RenderMode::Editing {
            return vec![RenderNode::EmptyContainer];
        }
        children
    }

    /// Child entry point: expands the child's own loop directive.
    fn render_entry(&self, schema: &SchemaNode, scope: &Scope) -> Vec<RenderNode> {
        match self.loop_items(schema, scope) {
            None => vec![self.render(schema, scope)],
            Some(items) => {
                let args = schema.loop_args.clone().unwrap_or_default();
                items
                    .into_iter()
                    .enumerate()
                    .map(|(index, item)| self.render_iteration(schema, scope, &args, item, index).1)
                    .collect()
            }
        }
    }

    /// Evaluate the loop source to the iteration set. `None` means the node
    /// does not loop at all; a non-sequence source loops zero times.
    pub fn loop_items(&self, schema: &SchemaNode, scope: &Scope) -> Option<Vec<Value>> {
        let descriptor = schema.loop_source.as_ref()?;
        match scope.evaluator().evaluate(descriptor, &scope.resolver()) {
            Value::Array(items) => Some(items),
            Value::Null => Some(Vec::new()),
            other => {
                warn!(node = %schema.id, got = ?other, "loop source is not a sequence");
                Some(Vec::new())
            }
        }
    }

    /// Render one loop iteration under a fresh block-local scope binding
    /// the item and index names.
    pub fn render_iteration(
        &self,
        schema: &SchemaNode,
        scope: &Scope,
        args: &LoopArgs,
        item: Value,
        index: usize,
    ) -> (Scope, RenderNode) {
        let bindings: BTreeMap<String, Value> = [
            (args.item.clone(), item),
            (args.index.clone(), Value::Number(index as f64)),
        ]
        .into_iter()
        .collect();
        let block = Scope::merge_scope(vec![scope.clone().into(), bindings.into()]);
        let mut node = self.render(schema, &block);
        if let RenderNode::Component(component) = &mut node {
            component.key = format!("{}:{}", schema.id, index);
        }
        (block, node)
    }

    /// Invoke a named slot: bind its declared parameter names to `args` in
    /// a block-local scope and render the slot's nodes under it. Missing
    /// arguments bind to null.
    pub fn render_slot(&self, slot: &RenderSlot, scope: &Scope, args: &[Value]) -> Vec<RenderNode> {
        let bindings: BTreeMap<String, Value> = slot
            .params
            .iter()
            .cloned()
            .zip(args.iter().cloned().chain(std::iter::repeat(Value::Null)))
            .collect();
        let block = Scope::merge_scope(vec![scope.clone().into(), bindings.into()]);
        slot.nodes
            .iter()
            .flat_map(|node| self.render_entry(node, &block))
            .collect()
    }
}
