//! Value descriptors: the discriminated union carried by every schema prop.
//!
//! A descriptor is either a plain JSON literal, a directive (expression,
//! function, slot, localized text), or a shape-preserving collection of
//! further descriptors. Exactly one variant is active; evaluation dispatch
//! is total over this union.

use crate::node::SchemaNode;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;

/// Keys starting with this prefix are runtime-internal bookkeeping and are
/// dropped when a mapping descriptor is evaluated or exported for render.
pub const RESERVED_PREFIX: &str = "__montage";

/// Tagged directive forms. The `type` tag discriminates on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Directive {
    /// A code body evaluated against the scope, producing a value.
    Expr { body: String },

    /// A code body defining a callable (used for methods and event handlers).
    Func {
        #[serde(default)]
        params: Vec<String>,
        body: String,
    },

    /// A nested node list plus declared parameter names: a renderable with
    /// arguments.
    Slot {
        #[serde(default)]
        nodes: Vec<SchemaNode>,
        #[serde(default)]
        params: Vec<String>,
    },

    /// A lookup key into the translation table.
    I18n { key: String },
}

/// A schema property value.
///
/// Untagged: directives are recognized by their `type` tag, arrays and
/// objects recurse element-wise, everything else is a literal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ValueDescriptor {
    Directive(Directive),
    List(Vec<ValueDescriptor>),
    Map(BTreeMap<String, ValueDescriptor>),
    Literal(JsonValue),
}

impl ValueDescriptor {
    pub fn expr(body: impl Into<String>) -> Self {
        ValueDescriptor::Directive(Directive::Expr { body: body.into() })
    }

    pub fn func(params: Vec<String>, body: impl Into<String>) -> Self {
        ValueDescriptor::Directive(Directive::Func {
            params,
            body: body.into(),
        })
    }

    pub fn slot(nodes: Vec<SchemaNode>, params: Vec<String>) -> Self {
        ValueDescriptor::Directive(Directive::Slot { nodes, params })
    }

    pub fn i18n(key: impl Into<String>) -> Self {
        ValueDescriptor::Directive(Directive::I18n { key: key.into() })
    }

    pub fn literal(value: impl Into<JsonValue>) -> Self {
        ValueDescriptor::Literal(value.into())
    }

    pub fn is_slot(&self) -> bool {
        matches!(self, ValueDescriptor::Directive(Directive::Slot { .. }))
    }

    /// Navigate a dotted path through `Map` descriptors.
    pub fn at_path(&self, path: &str) -> Option<&ValueDescriptor> {
        let mut current = self;
        for segment in path.split('.') {
            match current {
                ValueDescriptor::Map(map) => current = map.get(segment)?,
                _ => return None,
            }
        }
        Some(current)
    }

    /// Set a value at a dotted path, creating intermediate `Map` descriptors
    /// as needed. Fails if an intermediate segment exists but is not a map.
    pub fn set_at_path(&mut self, path: &str, value: ValueDescriptor) -> Result<(), String> {
        let mut segments = path.split('.').peekable();
        let mut current = self;
        while let Some(segment) = segments.next() {
            if segments.peek().is_none() {
                match current {
                    ValueDescriptor::Map(map) => {
                        map.insert(segment.to_string(), value);
                        return Ok(());
                    }
                    _ => return Err(format!("'{}' is not a mapping", segment)),
                }
            }
            match current {
                ValueDescriptor::Map(map) => {
                    current = map
                        .entry(segment.to_string())
                        .or_insert_with(|| ValueDescriptor::Map(BTreeMap::new()));
                }
                _ => return Err(format!("'{}' is not a mapping", segment)),
            }
        }
        Err("empty path".to_string())
    }

    /// Strip reserved-prefix keys from every mapping in the tree. Used when
    /// exporting a schema for render.
    pub fn strip_reserved(&self) -> ValueDescriptor {
        match self {
            ValueDescriptor::Map(map) => ValueDescriptor::Map(
                map.iter()
                    .filter(|(k, _)| !k.starts_with(RESERVED_PREFIX))
                    .map(|(k, v)| (k.clone(), v.strip_reserved()))
                    .collect(),
            ),
            ValueDescriptor::List(items) => {
                ValueDescriptor::List(items.iter().map(|v| v.strip_reserved()).collect())
            }
            other => other.clone(),
        }
    }
}

impl From<JsonValue> for ValueDescriptor {
    fn from(value: JsonValue) -> Self {
        ValueDescriptor::Literal(value)
    }
}

impl From<&str> for ValueDescriptor {
    fn from(value: &str) -> Self {
        ValueDescriptor::Literal(JsonValue::String(value.to_string()))
    }
}
