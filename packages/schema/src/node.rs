//! Schema nodes: one serializable entity per renderable unit.

use crate::descriptor::ValueDescriptor;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Node identity, assigned by the authoring session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub String);

impl NodeId {
    pub fn new(id: impl Into<String>) -> Self {
        NodeId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for NodeId {
    fn from(s: &str) -> Self {
        NodeId(s.to_string())
    }
}

/// Child content: a single node, literal text, or a node list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NodeChildren {
    Text(String),
    Node(Box<SchemaNode>),
    List(Vec<SchemaNode>),
}

impl NodeChildren {
    /// Flatten to a node list; literal text yields no nodes.
    pub fn nodes(&self) -> Vec<&SchemaNode> {
        match self {
            NodeChildren::Text(_) => Vec::new(),
            NodeChildren::Node(node) => vec![node],
            NodeChildren::List(nodes) => nodes.iter().collect(),
        }
    }
}

/// Binding names introduced by a loop iteration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoopArgs {
    pub item: String,
    pub index: String,
}

impl Default for LoopArgs {
    fn default() -> Self {
        Self {
            item: "item".to_string(),
            index: "index".to_string(),
        }
    }
}

/// A watch declaration: re-run `handler` whenever `path` changes in scope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WatchDecl {
    pub path: String,
    pub handler: ValueDescriptor,
    #[serde(default)]
    pub immediate: bool,
}

/// Schema-declared lifecycle hooks, invoked by the runtime in a fixed order.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LifecycleHooks {
    pub setup: Option<ValueDescriptor>,
    pub computed: BTreeMap<String, ValueDescriptor>,
    pub watch: Vec<WatchDecl>,
    pub provide: BTreeMap<String, ValueDescriptor>,
    pub inject: Vec<String>,
    pub created: Option<ValueDescriptor>,
    pub mounted: Option<ValueDescriptor>,
    pub updated: Option<ValueDescriptor>,
    pub unmounted: Option<ValueDescriptor>,
}

/// A declared remote-data binding. Registered once when the owning node's
/// scope is built; loadable repeatedly thereafter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataSourceDecl {
    pub id: String,

    /// Request-handler type. Unknown types are a configuration error at call
    /// time, not at registration time.
    #[serde(default = "default_source_type", rename = "type")]
    pub source_type: String,

    /// Descriptor producing request options (target, method, params, headers).
    pub options: ValueDescriptor,

    /// Whether this source participates in bulk reload.
    #[serde(default)]
    pub is_init: Option<ValueDescriptor>,

    /// Whether this source runs in the strictly-ordered sequential chain.
    #[serde(default)]
    pub is_sync: Option<ValueDescriptor>,

    #[serde(default)]
    pub should_fetch: Option<ValueDescriptor>,

    #[serde(default)]
    pub will_fetch: Option<ValueDescriptor>,

    #[serde(default)]
    pub data_handler: Option<ValueDescriptor>,

    #[serde(default)]
    pub error_handler: Option<ValueDescriptor>,
}

fn default_source_type() -> String {
    "http".to_string()
}

/// One renderable unit: component reference, property descriptors, and the
/// structural directives (condition, loop, visibility).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemaNode {
    pub id: NodeId,

    /// Component-reference name, resolved through the component registry.
    pub component: String,

    #[serde(default)]
    pub props: BTreeMap<String, ValueDescriptor>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub children: Option<NodeChildren>,

    /// Boolean or expression; false suppresses rendering. Independent from
    /// `hidden`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<ValueDescriptor>,

    /// Expression yielding a sequence; each element renders one instance.
    #[serde(default, rename = "loop", skip_serializing_if = "Option::is_none")]
    pub loop_source: Option<ValueDescriptor>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub loop_args: Option<LoopArgs>,

    #[serde(default)]
    pub hidden: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style: Option<String>,

    /// Own declared state, evaluated context-free when the scope is built.
    #[serde(default)]
    pub state: BTreeMap<String, ValueDescriptor>,

    /// Declared methods; must evaluate to callables.
    #[serde(default)]
    pub methods: BTreeMap<String, ValueDescriptor>,

    #[serde(default)]
    pub hooks: LifecycleHooks,

    #[serde(default)]
    pub data_sources: Vec<DataSourceDecl>,
}

impl SchemaNode {
    pub fn new(id: impl Into<String>, component: impl Into<String>) -> Self {
        Self {
            id: NodeId::new(id),
            component: component.into(),
            props: BTreeMap::new(),
            children: None,
            condition: None,
            loop_source: None,
            loop_args: None,
            hidden: false,
            style: None,
            state: BTreeMap::new(),
            methods: BTreeMap::new(),
            hooks: LifecycleHooks::default(),
            data_sources: Vec::new(),
        }
    }

    pub fn with_prop(mut self, name: impl Into<String>, value: ValueDescriptor) -> Self {
        self.props.insert(name.into(), value);
        self
    }

    pub fn with_state(mut self, name: impl Into<String>, value: ValueDescriptor) -> Self {
        self.state.insert(name.into(), value);
        self
    }

    pub fn with_children(mut self, children: Vec<SchemaNode>) -> Self {
        self.children = Some(NodeChildren::List(children));
        self
    }

    pub fn with_loop(mut self, source: ValueDescriptor, args: Option<LoopArgs>) -> Self {
        self.loop_source = Some(source);
        self.loop_args = args;
        self
    }

    /// Resolve a dotted prop path. The first segment names the prop, the rest
    /// navigate mapping descriptors.
    pub fn prop_at(&self, path: &str) -> Option<&ValueDescriptor> {
        match path.split_once('.') {
            Some((head, rest)) => self.props.get(head)?.at_path(rest),
            None => self.props.get(path),
        }
    }
}
