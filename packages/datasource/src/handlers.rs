//! Request-handler registry: data-source `type` -> dispatch callable.

use crate::error::{DataSourceError, LoadResult};
use futures::future::BoxFuture;
use montage_expr::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// A request handler takes the resolved, transformed request options and
/// produces the raw response value. Boxed future so handlers can be stored
/// behind one registry type.
pub type RequestHandler =
    Arc<dyn Fn(Value) -> BoxFuture<'static, LoadResult<Value>> + Send + Sync>;

#[derive(Clone, Default)]
pub struct HandlerRegistry {
    handlers: Arc<Mutex<HashMap<String, RequestHandler>>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, source_type: impl Into<String>, handler: RequestHandler) {
        self.handlers
            .lock()
            .unwrap()
            .insert(source_type.into(), handler);
    }

    /// Unknown types are a configuration error at the call site that needed
    /// the handler, not at registration time.
    pub fn get(&self, source_type: &str) -> LoadResult<RequestHandler> {
        self.handlers
            .lock()
            .unwrap()
            .get(source_type)
            .cloned()
            .ok_or_else(|| DataSourceError::UnknownType(source_type.to_string()))
    }
}
