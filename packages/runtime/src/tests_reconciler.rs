use crate::host::{HostAdapter, Patch};
use crate::reconciler::NodeReconciler;
use crate::render::{RenderMode, RenderNode};
use crate::renderer::Renderer;
use futures::future::BoxFuture;
use montage_expr::{Callable, Evaluator, Value};
use montage_schema::{
    ComponentRegistry, ComponentSpec, MemoryNodeHandle, NodeChildren, NodeHandle, NodeId,
    SchemaNode, ValueDescriptor,
};
use montage_scope::{Layer, Scope};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

#[derive(Default)]
struct RecordingHost {
    patches: Mutex<Vec<Patch>>,
}

impl RecordingHost {
    fn patches(&self) -> Vec<Patch> {
        self.patches.lock().unwrap().clone()
    }
}

impl HostAdapter for RecordingHost {
    fn mount(&self, _node_id: &NodeId) {}

    fn update(&self, _node_id: &NodeId, patch: &Patch) {
        self.patches.lock().unwrap().push(patch.clone());
    }

    fn unmount(&self, _node_id: &NodeId) {}

    fn defer(&self, _task: BoxFuture<'static, ()>) {}
}

fn registry() -> ComponentRegistry {
    let mut registry = ComponentRegistry::new();
    registry.register(ComponentSpec::new("text"));
    registry.register(ComponentSpec::container("container"));
    registry
}

fn root_scope() -> Scope {
    Scope::root(Arc::new(Evaluator::new(Default::default())))
}

fn map(pairs: &[(&str, ValueDescriptor)]) -> ValueDescriptor {
    ValueDescriptor::Map(
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect::<BTreeMap<_, _>>(),
    )
}

struct Bound {
    bound: Arc<crate::reconciler::BoundNode>,
    host: Arc<RecordingHost>,
    handle: Arc<MemoryNodeHandle>,
}

fn bind(schema: SchemaNode, scope: Scope, mode: RenderMode) -> Bound {
    let handle = Arc::new(MemoryNodeHandle::new(schema));
    let host = Arc::new(RecordingHost::default());
    let reconciler = NodeReconciler::new(Arc::new(Renderer::new(registry(), mode)));
    let bound = reconciler.bind(handle.clone(), scope, host.clone(), None);
    Bound {
        bound,
        host,
        handle,
    }
}

fn component(node: &RenderNode) -> &crate::render::RenderComponent {
    node.as_component().expect("expected a component node")
}

#[test]
fn test_prop_change_patches_only_the_named_subtree() {
    let schema = SchemaNode::new("n1", "text").with_prop(
        "a",
        map(&[
            ("b", ValueDescriptor::literal(1)),
            ("c", ValueDescriptor::literal(2)),
        ]),
    );
    let bound = bind(schema, root_scope(), RenderMode::Live);

    bound
        .handle
        .set_prop_value("a.b", ValueDescriptor::literal(5))
        .unwrap();

    let output = bound.bound.output();
    let rendered = component(&output[0]);
    assert_eq!(rendered.prop_at("a.b"), Some(&Value::Number(5.0)));
    assert_eq!(rendered.prop_at("a.c"), Some(&Value::Number(2.0)));
    assert_eq!(
        bound.host.patches(),
        vec![Patch::Props {
            path: "a.b".to_string()
        }]
    );
}

#[test]
fn test_prop_expressions_reevaluate_against_current_scope() {
    let scope = root_scope();
    scope.set(Layer::State, "greeting", Value::String("hi".to_string()));
    scope.set(Layer::State, "farewell", Value::String("bye".to_string()));

    let schema = SchemaNode::new("n1", "text").with_prop("label", ValueDescriptor::expr("greeting"));
    let bound = bind(schema, scope, RenderMode::Live);
    assert_eq!(
        component(&bound.bound.output()[0]).prop_at("label"),
        Some(&Value::String("hi".to_string()))
    );

    bound
        .handle
        .set_prop_value("label", ValueDescriptor::expr("farewell"))
        .unwrap();
    assert_eq!(
        component(&bound.bound.output()[0]).prop_at("label"),
        Some(&Value::String("bye".to_string()))
    );
}

#[test]
fn test_unregistered_component_renders_explicit_marker() {
    let schema = SchemaNode::new("n1", "carousel");
    let bound = bind(schema, root_scope(), RenderMode::Live);
    assert_eq!(
        bound.bound.output(),
        vec![RenderNode::Missing {
            component: "carousel".to_string()
        }]
    );
}

#[test]
fn test_empty_container_placeholder_only_in_editing_mode() {
    let schema = SchemaNode::new("n1", "container");
    let editing = bind(schema.clone(), root_scope(), RenderMode::Editing);
    assert_eq!(
        component(&editing.bound.output()[0]).children,
        vec![RenderNode::EmptyContainer]
    );

    let live = bind(schema, root_scope(), RenderMode::Live);
    assert!(component(&live.bound.output()[0]).children.is_empty());
}

#[test]
fn test_slot_descriptor_added_and_removed() {
    let schema = SchemaNode::new("n1", "container");
    let bound = bind(schema, root_scope(), RenderMode::Live);

    let header = ValueDescriptor::slot(vec![SchemaNode::new("h1", "text")], vec!["ctx".to_string()]);
    bound.handle.set_prop_value("header", header).unwrap();
    {
        let output = bound.bound.output();
        let rendered = component(&output[0]);
        assert!(rendered.slots.contains_key("header"));
        assert_eq!(rendered.slots["header"].params, vec!["ctx".to_string()]);
    }

    bound
        .handle
        .set_prop_value("header", ValueDescriptor::literal(0))
        .unwrap();
    assert!(!component(&bound.bound.output()[0]).slots.contains_key("header"));

    assert_eq!(
        bound.host.patches(),
        vec![
            Patch::SlotAdded {
                name: "header".to_string()
            },
            Patch::SlotRemoved {
                name: "header".to_string()
            },
        ]
    );
}

#[test]
fn test_visibility_events_toggle_rendering() {
    let schema = SchemaNode::new("n1", "text");
    let bound = bind(schema, root_scope(), RenderMode::Live);
    assert!(component(&bound.bound.output()[0]).visible);

    bound.handle.set_visible(false);
    assert!(!component(&bound.bound.output()[0]).visible);
    assert!(!bound.bound.event_visible());

    bound.handle.set_visible(true);
    assert!(component(&bound.bound.output()[0]).visible);
}

#[test]
fn test_false_condition_suppresses_independently_of_hidden() {
    let scope = root_scope();
    scope.set(Layer::State, "flag", Value::Bool(false));
    let mut schema = SchemaNode::new("n1", "text");
    schema.condition = Some(ValueDescriptor::expr("flag"));

    let bound = bind(schema, scope, RenderMode::Live);
    assert!(!component(&bound.bound.output()[0]).visible);

    // The hidden axis turning back on does not override the condition.
    bound.handle.set_visible(true);
    assert!(!component(&bound.bound.output()[0]).visible);
}

#[test]
fn test_children_replacement_recomputes_default_slot() {
    let schema =
        SchemaNode::new("n1", "container").with_children(vec![SchemaNode::new("c1", "text")]);
    let bound = bind(schema, root_scope(), RenderMode::Live);
    assert_eq!(component(&bound.bound.output()[0]).children.len(), 1);

    bound.handle.set_children(Some(NodeChildren::List(vec![
        SchemaNode::new("c1", "text"),
        SchemaNode::new("c2", "text"),
    ])));

    let output = bound.bound.output();
    assert_eq!(component(&output[0]).children.len(), 2);
    assert_eq!(bound.host.patches(), vec![Patch::Children]);
}

#[test]
fn test_loop_produces_one_instance_per_item_with_bindings() {
    let scope = root_scope();
    scope.set(
        Layer::State,
        "items",
        Value::Array(vec![
            Value::String("aaa".to_string()),
            Value::String("bbb".to_string()),
            Value::String("ccc".to_string()),
        ]),
    );
    let schema = SchemaNode::new("list", "text")
        .with_prop("label", ValueDescriptor::expr("item"))
        .with_prop("idx", ValueDescriptor::expr("index"))
        .with_loop(ValueDescriptor::expr("items"), None);

    let bound = bind(schema, scope, RenderMode::Live);
    let output = bound.bound.output();
    assert_eq!(output.len(), 3);
    for (i, expected) in ["aaa", "bbb", "ccc"].iter().enumerate() {
        let rendered = component(&output[i]);
        assert_eq!(
            rendered.prop_at("label"),
            Some(&Value::String(expected.to_string()))
        );
        assert_eq!(rendered.prop_at("idx"), Some(&Value::Number(i as f64)));
        assert_eq!(rendered.key, format!("list:{}", i));
    }
}

#[test]
fn test_extending_loop_source_reuses_existing_instances() {
    let scope = root_scope();
    scope.set(
        Layer::State,
        "items",
        Value::Array(vec![
            Value::String("aaa".to_string()),
            Value::String("bbb".to_string()),
            Value::String("ccc".to_string()),
        ]),
    );
    let schema = SchemaNode::new("list", "text")
        .with_prop("label", ValueDescriptor::expr("item"))
        .with_loop(ValueDescriptor::expr("items"), None);
    let bound = bind(schema, scope.clone(), RenderMode::Live);

    let before = bound.bound.instance_scopes();
    assert_eq!(before.len(), 3);

    scope.set(
        Layer::State,
        "items",
        Value::Array(vec![
            Value::String("aaa".to_string()),
            Value::String("bbb".to_string()),
            Value::String("ccc".to_string()),
            Value::String("ddd".to_string()),
        ]),
    );
    bound
        .handle
        .set_prop_value("loop", ValueDescriptor::expr("items"))
        .unwrap();

    let after = bound.bound.instance_scopes();
    assert_eq!(after.len(), 4);
    for i in 0..3 {
        assert!(before[i].same(&after[i]), "instance {} was re-created", i);
    }
    assert_eq!(
        component(&bound.bound.output()[3]).prop_at("label"),
        Some(&Value::String("ddd".to_string()))
    );
    assert_eq!(
        bound.host.patches(),
        vec![Patch::LoopRebuilt {
            reused: 3,
            total: 4
        }]
    );
}

#[test]
fn test_updated_hook_runs_once_per_patch() {
    let updates = Arc::new(AtomicUsize::new(0));
    let updates_in = updates.clone();
    let updated = Callable::native("onUpdated", move |_args| {
        updates_in.fetch_add(1, Ordering::SeqCst);
        Ok(Value::Null)
    });

    let schema = SchemaNode::new("n1", "text").with_prop("label", ValueDescriptor::literal("x"));
    let handle = Arc::new(MemoryNodeHandle::new(schema));
    let host = Arc::new(RecordingHost::default());
    let reconciler = NodeReconciler::new(Arc::new(Renderer::new(registry(), RenderMode::Live)));
    let _bound = reconciler.bind(handle.clone(), root_scope(), host, Some(updated));

    handle
        .set_prop_value("label", ValueDescriptor::literal("y"))
        .unwrap();
    handle.set_visible(false);
    assert_eq!(updates.load(Ordering::SeqCst), 2);
}

#[test]
fn test_scope_writes_refresh_rendered_props() {
    let scope = root_scope();
    scope.set(Layer::State, "greeting", Value::String("hi".to_string()));

    let schema = SchemaNode::new("n1", "text").with_prop("label", ValueDescriptor::expr("greeting"));
    let bound = bind(schema, scope.clone(), RenderMode::Live);
    assert_eq!(
        component(&bound.bound.output()[0]).prop_at("label"),
        Some(&Value::String("hi".to_string()))
    );

    scope.set(Layer::State, "greeting", Value::String("bye".to_string()));
    assert_eq!(
        component(&bound.bound.output()[0]).prop_at("label"),
        Some(&Value::String("bye".to_string()))
    );
    assert_eq!(
        bound.host.patches(),
        vec![Patch::Props {
            path: "label".to_string()
        }]
    );

    // After detaching, scope writes no longer reach the output.
    bound.bound.detach();
    scope.set(Layer::State, "greeting", Value::String("later".to_string()));
    assert_eq!(
        component(&bound.bound.output()[0]).prop_at("label"),
        Some(&Value::String("bye".to_string()))
    );
}

#[test]
fn test_scope_writes_reevaluate_condition() {
    let scope = root_scope();
    scope.set(Layer::State, "flag", Value::Bool(true));
    let mut schema = SchemaNode::new("n1", "text");
    schema.condition = Some(ValueDescriptor::expr("flag"));

    let bound = bind(schema, scope.clone(), RenderMode::Live);
    assert!(component(&bound.bound.output()[0]).visible);

    scope.set(Layer::State, "flag", Value::Bool(false));
    assert!(!component(&bound.bound.output()[0]).visible);
    assert_eq!(
        bound.host.patches(),
        vec![Patch::Visibility { visible: false }]
    );
}

#[test]
fn test_withdrawn_prop_leaves_no_rendered_entry() {
    use montage_schema::MutationEvent;

    let schema = SchemaNode::new("n1", "text").with_prop("label", ValueDescriptor::literal("x"));
    let bound = bind(schema, root_scope(), RenderMode::Live);
    assert!(component(&bound.bound.output()[0])
        .prop_at("label")
        .is_some());

    bound.handle.observers().emit(&MutationEvent::PropChanged {
        path: "label".to_string(),
        old: Some(ValueDescriptor::literal("x")),
        new: None,
    });

    assert_eq!(component(&bound.bound.output()[0]).prop_at("label"), None);
    assert_eq!(
        bound.host.patches(),
        vec![Patch::Props {
            path: "label".to_string()
        }]
    );
}

#[test]
fn test_detached_binding_ignores_further_events() {
    let schema = SchemaNode::new("n1", "text").with_prop("label", ValueDescriptor::literal("x"));
    let bound = bind(schema, root_scope(), RenderMode::Live);

    bound.bound.detach();
    bound
        .handle
        .set_prop_value("label", ValueDescriptor::literal("y"))
        .unwrap();

    assert_eq!(
        component(&bound.bound.output()[0]).prop_at("label"),
        Some(&Value::String("x".to_string()))
    );
    assert!(bound.host.patches().is_empty());
}
