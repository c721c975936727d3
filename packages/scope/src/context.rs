//! Provide/inject registry.
//!
//! An explicit registry object passed by the host at composition time, so
//! independently-loaded parts of a page agree on injection-key identity
//! without any ambient global state.

use montage_expr::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

#[derive(Clone, Default)]
pub struct ContextRegistry {
    entries: Arc<Mutex<HashMap<String, Value>>>,
}

impl ContextRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn provide(&self, key: impl Into<String>, value: Value) {
        self.entries.lock().unwrap().insert(key.into(), value);
    }

    pub fn inject(&self, key: &str) -> Option<Value> {
        self.entries.lock().unwrap().get(key).cloned()
    }
}
