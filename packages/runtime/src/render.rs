//! The rendered representation handed to the host view runtime.

use montage_expr::Value;
use montage_schema::{NodeId, SchemaNode};
use std::collections::BTreeMap;

/// How the runtime is being driven. Editing mode keeps authoring-time
/// affordances (the empty-container placeholder) that live rendering omits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderMode {
    Live,
    Editing,
}

/// One rendered unit.
///
/// `Missing` is an explicit marker for an unregistered component name, so
/// authoring-time feedback is visible instead of a silent omission.
#[derive(Debug, Clone, PartialEq)]
pub enum RenderNode {
    Component(RenderComponent),
    Text(String),
    Missing { component: String },
    EmptyContainer,
}

impl RenderNode {
    pub fn as_component(&self) -> Option<&RenderComponent> {
        match self {
            RenderNode::Component(component) => Some(component),
            _ => None,
        }
    }
}

/// A rendered component instance: concrete prop values, named slots, child
/// nodes, and the visibility bit the host gates rendering on.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderComponent {
    pub node_id: NodeId,
    pub component: String,
    pub props: BTreeMap<String, Value>,
    pub slots: BTreeMap<String, RenderSlot>,
    pub children: Vec<RenderNode>,
    pub visible: bool,
    /// Host-side reconciliation key; loop instances suffix the index.
    pub key: String,
}

impl RenderComponent {
    /// Read a rendered prop through a dotted path.
    pub fn prop_at(&self, path: &str) -> Option<&Value> {
        match path.split_once('.') {
            None => self.props.get(path),
            Some((head, rest)) => {
                let mut current = self.props.get(head)?;
                for segment in rest.split('.') {
                    current = current.get(segment)?;
                }
                Some(current)
            }
        }
    }
}

/// A named slot: a renderable parameterized over its declared argument
/// names. The nodes stay unevaluated until the slot is invoked with
/// arguments, which introduce a block-local scope.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderSlot {
    pub params: Vec<String>,
    pub nodes: Vec<SchemaNode>,
}

/// Write `value` into a rendered prop map at a dotted path, creating
/// intermediate objects as needed. Everything outside the path is left
/// untouched.
pub fn patch_prop(props: &mut BTreeMap<String, Value>, path: &str, value: Value) {
    match path.split_once('.') {
        None => {
            props.insert(path.to_string(), value);
        }
        Some((head, rest)) => {
            let slot = props
                .entry(head.to_string())
                .or_insert_with(|| Value::Object(BTreeMap::new()));
            patch_value(slot, rest, value);
        }
    }
}

fn patch_value(slot: &mut Value, path: &str, value: Value) {
    if !matches!(slot, Value::Object(_)) {
        *slot = Value::Object(BTreeMap::new());
    }
    if let Value::Object(map) = slot {
        match path.split_once('.') {
            None => {
                map.insert(path.to_string(), value);
            }
            Some((head, rest)) => {
                let next = map
                    .entry(head.to_string())
                    .or_insert_with(|| Value::Object(BTreeMap::new()));
                patch_value(next, rest, value);
            }
        }
    }
}

/// Remove the entry at a dotted path. Absent paths are a no-op; intermediate
/// non-object values stop the walk.
pub fn remove_prop(props: &mut BTreeMap<String, Value>, path: &str) {
    match path.split_once('.') {
        None => {
            props.remove(path);
        }
        Some((head, rest)) => {
            if let Some(slot) = props.get_mut(head) {
                remove_value(slot, rest);
            }
        }
    }
}

fn remove_value(slot: &mut Value, path: &str) {
    if let Value::Object(map) = slot {
        match path.split_once('.') {
            None => {
                map.remove(path);
            }
            Some((head, rest)) => {
                if let Some(next) = map.get_mut(head) {
                    remove_value(next, rest);
                }
            }
        }
    }
}
