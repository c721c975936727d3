//! Round-trip and path-navigation tests for the schema data model.

use crate::descriptor::{Directive, ValueDescriptor, RESERVED_PREFIX};
use crate::node::{LoopArgs, NodeChildren, NodeId, SchemaNode};
use crate::session::{ExportStage, MemorySession, NodeHandle};
use serde_json::json;

#[test]
fn test_descriptor_untagged_parsing() {
    let parsed: ValueDescriptor = serde_json::from_value(json!({
        "type": "expr",
        "body": "self.count + 1"
    }))
    .unwrap();
    assert_eq!(parsed, ValueDescriptor::expr("self.count + 1"));

    let parsed: ValueDescriptor = serde_json::from_value(json!("plain text")).unwrap();
    assert_eq!(parsed, ValueDescriptor::literal("plain text"));

    let parsed: ValueDescriptor = serde_json::from_value(json!({
        "color": "red",
        "size": { "type": "expr", "body": "self.size" }
    }))
    .unwrap();
    match parsed {
        ValueDescriptor::Map(map) => {
            assert_eq!(map.len(), 2);
            assert!(matches!(
                map.get("size"),
                Some(ValueDescriptor::Directive(Directive::Expr { .. }))
            ));
        }
        other => panic!("expected map, got {:?}", other),
    }
}

#[test]
fn test_descriptor_function_parsing() {
    let parsed: ValueDescriptor = serde_json::from_value(json!({
        "type": "func",
        "params": ["event"],
        "body": "self.onClick(event)"
    }))
    .unwrap();
    match parsed {
        ValueDescriptor::Directive(Directive::Func { params, body }) => {
            assert_eq!(params, vec!["event"]);
            assert_eq!(body, "self.onClick(event)");
        }
        other => panic!("expected func, got {:?}", other),
    }
}

#[test]
fn test_schema_node_round_trip() {
    let node = SchemaNode::new("page-1", "page")
        .with_prop("title", ValueDescriptor::expr("self.title"))
        .with_state("title", ValueDescriptor::literal("Home"))
        .with_loop(
            ValueDescriptor::expr("self.items"),
            Some(LoopArgs {
                item: "row".to_string(),
                index: "i".to_string(),
            }),
        )
        .with_children(vec![SchemaNode::new("text-1", "text")]);

    let json = serde_json::to_value(&node).unwrap();
    assert_eq!(json["loop"]["type"], "expr");

    let back: SchemaNode = serde_json::from_value(json).unwrap();
    assert_eq!(back, node);
}

#[test]
fn test_prop_path_navigation() {
    let node = SchemaNode::new("n", "card").with_prop(
        "layout",
        ValueDescriptor::Map(
            [
                ("width".to_string(), ValueDescriptor::literal(320)),
                (
                    "margin".to_string(),
                    ValueDescriptor::Map(
                        [("top".to_string(), ValueDescriptor::literal(8))]
                            .into_iter()
                            .collect(),
                    ),
                ),
            ]
            .into_iter()
            .collect(),
        ),
    );

    assert_eq!(
        node.prop_at("layout.margin.top"),
        Some(&ValueDescriptor::literal(8))
    );
    assert_eq!(node.prop_at("layout.margin.left"), None);
    assert_eq!(node.prop_at("missing"), None);
}

#[test]
fn test_set_prop_value_emits_event_with_old_value() {
    use crate::events::MutationEvent;
    use std::sync::{Arc, Mutex};

    let session = MemorySession::new();
    let handle =
        session.insert(SchemaNode::new("n", "text").with_prop("text", "hello".into()));

    let seen: Arc<Mutex<Vec<MutationEvent>>> = Arc::new(Mutex::new(Vec::new()));
    let seen2 = seen.clone();
    let _sub = handle.on_prop_change(Box::new(move |event| {
        seen2.lock().unwrap().push(event.clone());
    }));

    handle
        .set_prop_value("text", ValueDescriptor::literal("world"))
        .unwrap();

    let events = seen.lock().unwrap();
    assert_eq!(events.len(), 1);
    match &events[0] {
        MutationEvent::PropChanged { path, old, new } => {
            assert_eq!(path, "text");
            assert_eq!(old.as_ref(), Some(&ValueDescriptor::literal("hello")));
            assert_eq!(new.as_ref(), Some(&ValueDescriptor::literal("world")));
        }
        other => panic!("unexpected event {:?}", other),
    }
}

#[test]
fn test_nested_prop_write_creates_intermediate_maps() {
    let session = MemorySession::new();
    let handle = session.insert(SchemaNode::new("n", "card"));

    handle
        .set_prop_value("a.b", ValueDescriptor::literal(1))
        .unwrap();

    assert_eq!(handle.get_prop("a.b"), Some(ValueDescriptor::literal(1)));
}

#[test]
fn test_export_render_strips_reserved_keys() {
    let session = MemorySession::new();
    let node = SchemaNode::new("n", "card")
        .with_prop("visible", ValueDescriptor::literal(true))
        .with_prop(
            format!("{}_origin", RESERVED_PREFIX),
            ValueDescriptor::literal("editor"),
        );
    let handle = session.insert(node);

    let rendered = handle.export_schema(ExportStage::Render);
    let props = rendered["props"].as_object().unwrap();
    assert!(props.contains_key("visible"));
    assert!(!props.keys().any(|k| k.starts_with(RESERVED_PREFIX)));

    let saved = handle.export_schema(ExportStage::Save);
    let props = saved["props"].as_object().unwrap();
    assert!(props.keys().any(|k| k.starts_with(RESERVED_PREFIX)));
}

#[test]
fn test_replace_child_updates_appends_and_seeds() {
    use crate::events::MutationEvent;
    use std::sync::{Arc, Mutex};

    let session = MemorySession::new();
    let handle = session.insert(
        SchemaNode::new("root", "page")
            .with_children(vec![SchemaNode::new("a", "text")]),
    );

    let seen: Arc<Mutex<usize>> = Arc::new(Mutex::new(0));
    let seen2 = seen.clone();
    let _sub = handle.on_children_change(Box::new(move |event| {
        if matches!(event, MutationEvent::ChildrenReplaced { .. }) {
            *seen2.lock().unwrap() += 1;
        }
    }));

    // Matching id swaps the child in place.
    handle
        .replace_child(SchemaNode::new("a", "button"))
        .unwrap();
    let schema = handle.schema();
    let children = schema.children.as_ref().unwrap().nodes();
    assert_eq!(children.len(), 1);
    assert_eq!(children[0].component, "button");

    // Unknown id appends.
    handle.replace_child(SchemaNode::new("b", "text")).unwrap();
    let schema = handle.schema();
    assert_eq!(schema.children.as_ref().unwrap().nodes().len(), 2);

    // A node with no structured children gets seeded with a fresh list.
    let leaf = session.insert(SchemaNode::new("leaf", "card"));
    leaf.replace_child(SchemaNode::new("c", "text")).unwrap();
    let schema = leaf.schema();
    let children = schema.children.as_ref().unwrap().nodes();
    assert_eq!(children.len(), 1);
    assert_eq!(children[0].id, NodeId::from("c"));

    assert_eq!(*seen.lock().unwrap(), 2);
}

#[test]
fn test_session_registers_descendants() {
    let session = MemorySession::new();
    session.insert(
        SchemaNode::new("root", "page")
            .with_children(vec![SchemaNode::new("child", "text")]),
    );

    assert!(session.handle(&NodeId::from("child")).is_some());
    assert!(session.handle(&NodeId::from("missing")).is_none());
}

#[test]
fn test_children_untagged_forms() {
    let text: NodeChildren = serde_json::from_value(json!("hello")).unwrap();
    assert!(matches!(text, NodeChildren::Text(_)));

    let list: NodeChildren =
        serde_json::from_value(json!([{ "id": "a", "component": "text" }])).unwrap();
    assert_eq!(list.nodes().len(), 1);
}
