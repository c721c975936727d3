//! Data-source orchestration: registration, gating, dispatch, ordering.

use crate::error::{DataSourceError, LoadResult};
use crate::handlers::HandlerRegistry;
use crate::status::DataSourceStatus;
use futures::future::join_all;
use montage_expr::Value;
use montage_schema::{DataSourceDecl, ValueDescriptor};
use montage_scope::{Layer, Scope};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use tracing::{debug, instrument, warn};

/// Per-call options for [`Orchestrator::load`].
#[derive(Debug, Clone, Copy)]
pub struct LoadOptions {
    /// Write the result into the owning scope under the source id.
    pub assign_to_scope: bool,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            assign_to_scope: true,
        }
    }
}

/// Manages the declared data sources of one scope.
///
/// Registered once when the scope is built; `load` may be invoked
/// repeatedly. The scope-visible `data`/`error`/`status` fields live in the
/// scope's data layer and are re-evaluated by any expression reading them.
pub struct Orchestrator {
    scope: Scope,
    handlers: HandlerRegistry,
    sources: Mutex<Vec<DataSourceDecl>>,
}

impl Orchestrator {
    pub fn new(scope: Scope, handlers: HandlerRegistry) -> Arc<Self> {
        Arc::new(Self {
            scope,
            handlers,
            sources: Mutex::new(Vec::new()),
        })
    }

    pub fn scope(&self) -> &Scope {
        &self.scope
    }

    /// Register a source and immediately merge its result accessors into
    /// the scope's data layer. Does not wait for any load.
    pub fn register(&self, decl: DataSourceDecl) {
        debug!(id = %decl.id, source_type = %decl.source_type, "registering data source");
        self.write_entry(&decl.id, Value::Null, Value::Null, DataSourceStatus::Init);
        self.sources.lock().unwrap().push(decl);
    }

    /// Replace a source's declaration in place, keeping its position in
    /// declaration order. Used when the schema's data block is live-edited.
    pub fn update_config(&self, decl: DataSourceDecl) {
        let mut sources = self.sources.lock().unwrap();
        match sources.iter_mut().find(|existing| existing.id == decl.id) {
            Some(existing) => *existing = decl,
            None => {
                drop(sources);
                self.register(decl);
            }
        }
    }

    /// Expose a `reload` callable in the scope's data layer so schema
    /// expressions can trigger a bulk reload. Requires an ambient tokio
    /// runtime at call time.
    ///
    /// The callable holds a weak reference; the scope does not keep its
    /// orchestrator alive.
    pub fn expose_reload(self: &Arc<Self>) {
        let this = Arc::downgrade(self);
        let reload = montage_expr::Callable::native("reloadDataSource", move |_args| {
            let Some(this) = this.upgrade() else {
                return Ok(Value::Null);
            };
            match tokio::runtime::Handle::try_current() {
                Ok(handle) => {
                    handle.spawn(async move {
                        this.reload_all(None).await;
                    });
                    Ok(Value::Null)
                }
                Err(_) => {
                    warn!("reload called outside a runtime; ignored");
                    Ok(Value::Null)
                }
            }
        });
        self.scope
            .set(Layer::Data, "reloadDataSource", Value::Callable(reload));
    }

    fn find(&self, id: &str) -> LoadResult<DataSourceDecl> {
        self.sources
            .lock()
            .unwrap()
            .iter()
            .find(|decl| decl.id == id)
            .cloned()
            .ok_or_else(|| DataSourceError::NotFound(id.to_string()))
    }

    fn entry(&self, id: &str) -> (Value, Value) {
        match self.scope.get_layer(Layer::Data, id) {
            Some(Value::Object(map)) => (
                map.get("data").cloned().unwrap_or(Value::Null),
                map.get("error").cloned().unwrap_or(Value::Null),
            ),
            _ => (Value::Null, Value::Null),
        }
    }

    fn write_entry(&self, id: &str, data: Value, error: Value, status: DataSourceStatus) {
        let entry: BTreeMap<String, Value> = [
            ("data".to_string(), data),
            ("error".to_string(), error),
            (
                "status".to_string(),
                Value::String(status.as_str().to_string()),
            ),
        ]
        .into_iter()
        .collect();
        self.scope.set(Layer::Data, id, Value::Object(entry));
    }

    fn set_status(&self, id: &str, status: DataSourceStatus) {
        let (data, error) = self.entry(id);
        self.write_entry(id, data, error, status);
    }

    fn eval_predicate(&self, descriptor: &Option<ValueDescriptor>, default: bool) -> bool {
        match descriptor {
            None => default,
            Some(descriptor) => self
                .scope
                .evaluator()
                .evaluate(descriptor, &self.scope.resolver())
                .is_truthy(),
        }
    }

    /// Evaluate a transform descriptor to a callable and apply it to
    /// `input`. `None` is the identity transform.
    fn apply_transform(
        &self,
        name: &str,
        descriptor: &Option<ValueDescriptor>,
        input: Value,
    ) -> LoadResult<Value> {
        let Some(descriptor) = descriptor else {
            return Ok(input);
        };
        let evaluated = self
            .scope
            .evaluator()
            .evaluate(descriptor, &self.scope.resolver());
        match evaluated {
            Value::Callable(callable) => callable
                .call(&[input])
                .map_err(|err| DataSourceError::Handler(format!("{}: {}", name, err))),
            Value::Null => Ok(input),
            other => Err(DataSourceError::Handler(format!(
                "{} is not callable: {:?}",
                name, other
            ))),
        }
    }

    /// Load one source.
    ///
    /// Overlapping calls are allowed and each runs independently; the last
    /// write to the shared result fields wins.
    #[instrument(skip(self, params, options), fields(source = id))]
    pub async fn load(
        &self,
        id: &str,
        params: Option<Value>,
        options: LoadOptions,
    ) -> LoadResult<Value> {
        let decl = self.find(id)?;
        self.set_status(id, DataSourceStatus::Loading);

        match self.run_load(&decl, params).await {
            Ok(data) => {
                if options.assign_to_scope {
                    self.write_entry(id, data.clone(), Value::Null, DataSourceStatus::Loaded);
                } else {
                    self.set_status(id, DataSourceStatus::Loaded);
                }
                Ok(data)
            }
            Err(err) => {
                let (data, _) = self.entry(id);
                self.write_entry(
                    id,
                    data,
                    Value::String(err.scope_message()),
                    DataSourceStatus::Error,
                );
                // Default error handler re-raises; a declared one observes
                // the failure but cannot suppress it for the caller.
                if let Err(handler_err) = self.apply_transform(
                    "errorHandler",
                    &decl.error_handler,
                    Value::String(err.scope_message()),
                ) {
                    warn!(source = id, error = %handler_err, "errorHandler failed");
                }
                Err(err)
            }
        }
    }

    async fn run_load(&self, decl: &DataSourceDecl, params: Option<Value>) -> LoadResult<Value> {
        // 1. Resolve request options against the scope, then fold in the
        //    caller's parameters: merged key-by-key when both sides are
        //    keyed mappings, replaced outright otherwise.
        let resolved = self
            .scope
            .evaluator()
            .evaluate(&decl.options, &self.scope.resolver());
        let Value::Object(mut options) = resolved else {
            return Err(DataSourceError::InvalidOptions(format!(
                "options for '{}' did not evaluate to a mapping",
                decl.id
            )));
        };
        if let Some(caller_params) = params {
            let merged = match (options.remove("params"), caller_params) {
                (Some(Value::Object(mut declared)), Value::Object(caller)) => {
                    declared.extend(caller);
                    Value::Object(declared)
                }
                (_, caller) => caller,
            };
            options.insert("params".to_string(), merged);
        }
        let options = Value::Object(options);

        // 2. Gate.
        if !self.eval_predicate(&decl.should_fetch, true) {
            return Err(DataSourceError::Gated(decl.id.clone()));
        }

        // 3. Transform.
        let options = self.apply_transform("willFetch", &decl.will_fetch, options)?;

        // 4. Dispatch through the registered handler for this type.
        let handler = self.handlers.get(&decl.source_type)?;
        let response = handler(options).await?;

        // 5. Extract. Default pulls the `data` field when present.
        match &decl.data_handler {
            Some(_) => self.apply_transform("dataHandler", &decl.data_handler, response),
            None => Ok(match response.get("data") {
                Some(data) => data.clone(),
                None => response,
            }),
        }
    }

    /// Reload a single source with default options.
    pub async fn reload(&self, id: &str) -> LoadResult<Value> {
        self.load(id, None, LoadOptions::default()).await
    }

    /// Bulk reload.
    ///
    /// Partitions the selected sources (those whose `isInit` predicate is
    /// true) into a sequential chain (`isSync`, strict declaration order,
    /// each awaited before the next starts) and a parallel batch (the
    /// rest, all started without waiting on each other). Completes when
    /// both finish. Per-source failures are isolated and observable only
    /// through each source's own `error`/`status` fields.
    #[instrument(skip(self, ids))]
    pub async fn reload_all(&self, ids: Option<&[&str]>) {
        let selected: Vec<DataSourceDecl> = {
            let sources = self.sources.lock().unwrap();
            sources
                .iter()
                .filter(|decl| match ids {
                    Some(ids) => ids.contains(&decl.id.as_str()),
                    None => true,
                })
                .filter(|decl| self.eval_predicate(&decl.is_init, true))
                .cloned()
                .collect()
        };

        let (sync_ids, async_ids): (Vec<String>, Vec<String>) = {
            let mut sync_ids = Vec::new();
            let mut async_ids = Vec::new();
            for decl in &selected {
                if self.eval_predicate(&decl.is_sync, false) {
                    sync_ids.push(decl.id.clone());
                } else {
                    async_ids.push(decl.id.clone());
                }
            }
            (sync_ids, async_ids)
        };

        debug!(
            sequential = sync_ids.len(),
            parallel = async_ids.len(),
            "bulk reload"
        );

        let sequential = async {
            for id in &sync_ids {
                if let Err(err) = self.load(id, None, LoadOptions::default()).await {
                    warn!(source = %id, error = %err, "sequential source failed");
                }
            }
        };
        let parallel = join_all(async_ids.iter().map(|id| async move {
            if let Err(err) = self.load(id, None, LoadOptions::default()).await {
                warn!(source = %id, error = %err, "parallel source failed");
            }
        }));

        futures::join!(sequential, parallel);
    }
}
