//! Component registry: component-reference name → renderable metadata.
//! Consumed read-only by the reconciler.

use serde_json::Value as JsonValue;
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq)]
pub struct ComponentSpec {
    pub name: String,
    /// Containers may hold child nodes and get the empty-container
    /// placeholder in editing mode.
    pub container: bool,
    pub default_props: BTreeMap<String, JsonValue>,
}

impl ComponentSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            container: false,
            default_props: BTreeMap::new(),
        }
    }

    pub fn container(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            container: true,
            default_props: BTreeMap::new(),
        }
    }

    pub fn with_default(mut self, key: impl Into<String>, value: JsonValue) -> Self {
        self.default_props.insert(key.into(), value);
        self
    }
}

#[derive(Debug, Clone, Default)]
pub struct ComponentRegistry {
    components: BTreeMap<String, ComponentSpec>,
}

impl ComponentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, spec: ComponentSpec) {
        self.components.insert(spec.name.clone(), spec);
    }

    pub fn get(&self, name: &str) -> Option<&ComponentSpec> {
        self.components.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.components.contains_key(name)
    }
}
