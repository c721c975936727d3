//! Lifecycle dispatch: building a live node instance in a fixed phase order.
//!
//! Phases: setup, props, state, injections, provisions, computed, watch,
//! data-source registration and initial reload, created, then bind and
//! mount. The scope is never observable mid-construction; `instantiate`
//! only returns once every phase has run, and the host embeds the call
//! inside its own suspension boundary.

use crate::error::{RuntimeError, RuntimeResult};
use crate::guards::GuardOptions;
use crate::host::HostAdapter;
use crate::reconciler::{BoundNode, NodeReconciler};
use crate::render::{RenderMode, RenderNode};
use crate::renderer::Renderer;
use montage_datasource::{HandlerRegistry, Orchestrator};
use montage_expr::{Callable, Evaluator, Value};
use montage_schema::{ComponentRegistry, NodeHandle, SchemaNode, ValueDescriptor};
use montage_scope::{AmbientScope, Layer, Scope, ScopeComposer};
use std::sync::Arc;
use tracing::{debug, instrument, warn};

#[derive(Debug, Clone, Copy)]
pub struct RuntimeOptions {
    pub mode: RenderMode,
    pub guards: GuardOptions,
}

impl Default for RuntimeOptions {
    fn default() -> Self {
        Self {
            mode: RenderMode::Live,
            guards: GuardOptions::default(),
        }
    }
}

pub struct LifecycleDispatcher {
    composer: ScopeComposer,
    ambient: AmbientScope,
    handlers: HandlerRegistry,
    reconciler: NodeReconciler,
    host: Arc<dyn HostAdapter>,
    options: RuntimeOptions,
}

impl LifecycleDispatcher {
    pub fn new(
        evaluator: Arc<Evaluator>,
        ambient: AmbientScope,
        handlers: HandlerRegistry,
        registry: ComponentRegistry,
        host: Arc<dyn HostAdapter>,
        options: RuntimeOptions,
    ) -> Self {
        let renderer = Arc::new(Renderer::new(registry, options.mode));
        Self {
            composer: ScopeComposer::new(evaluator),
            ambient,
            handlers,
            reconciler: NodeReconciler::new(renderer),
            host,
            options,
        }
    }

    pub fn ambient(&self) -> &AmbientScope {
        &self.ambient
    }

    pub fn guard_options(&self) -> GuardOptions {
        self.options.guards
    }

    /// Build a live instance for `handle`'s node.
    ///
    /// Suspends at the setup gap and at the initial data-source reload; the
    /// returned instance is fully initialized. Setup failures abort the
    /// instantiation; later hook failures degrade to a warning so one bad
    /// hook cannot take the node down.
    #[instrument(skip(self, handle), fields(node = %handle.id()))]
    pub async fn instantiate(&self, handle: Arc<dyn NodeHandle>) -> RuntimeResult<NodeInstance> {
        let schema = handle.schema();
        let scope = Scope::root(self.composer.evaluator().clone());

        self.run_setup(&schema, &scope)?;
        self.composer.compose_into(&scope, &schema, &self.ambient);

        for key in &schema.hooks.inject {
            match self.ambient.context.inject(key) {
                Some(value) => scope.set(Layer::Setup, key.clone(), value),
                None => warn!(key = %key, "nothing provided under injection key"),
            }
        }

        for (key, descriptor) in &schema.hooks.provide {
            let value = self.evaluate(descriptor, &scope);
            self.ambient.context.provide(key.clone(), value);
        }

        for (name, getter) in &schema.hooks.computed {
            scope.register_computed(name.clone(), getter.clone(), None);
        }

        for watch in &schema.hooks.watch {
            let Some(handler) = self.hook_callable("watch", &watch.handler, &scope) else {
                continue;
            };
            let watched_path = watch.path.clone();
            scope.watch(
                watch.path.clone(),
                move |path, value| {
                    if let Err(err) =
                        handler.call(&[value.clone(), Value::String(path.to_string())])
                    {
                        warn!(path = %watched_path, error = %err, "watch handler failed");
                    }
                },
                watch.immediate,
            );
        }

        let orchestrator = Orchestrator::new(scope.clone(), self.handlers.clone());
        for decl in &schema.data_sources {
            orchestrator.register(decl.clone());
        }
        orchestrator.expose_reload();
        if !schema.data_sources.is_empty() {
            orchestrator.reload_all(None).await;
        }

        self.run_hook("created", &schema.hooks.created, &scope);

        let updated = schema
            .hooks
            .updated
            .as_ref()
            .and_then(|descriptor| self.hook_callable("updated", descriptor, &scope));
        let bound = self
            .reconciler
            .bind(handle.clone(), scope.clone(), self.host.clone(), updated);

        self.host.mount(&handle.id());
        self.run_hook("mounted", &schema.hooks.mounted, &scope);
        debug!("node instantiated");

        let unmounted = schema
            .hooks
            .unmounted
            .as_ref()
            .and_then(|descriptor| self.hook_callable("unmounted", descriptor, &scope));
        Ok(NodeInstance {
            handle,
            scope,
            orchestrator,
            bound,
            host: self.host.clone(),
            unmounted,
        })
    }

    /// Run the setup hook and merge its result into the setup layer. The
    /// scope it sees is still bare; props and state come after.
    fn run_setup(&self, schema: &SchemaNode, scope: &Scope) -> RuntimeResult<()> {
        let Some(descriptor) = &schema.hooks.setup else {
            return Ok(());
        };
        let value = self.evaluate(descriptor, scope);
        let result = match value {
            Value::Callable(callable) => callable.call(&[]).map_err(|err| RuntimeError::Hook {
                hook: "setup".to_string(),
                message: err.to_string(),
            })?,
            other => other,
        };
        match result {
            Value::Object(bindings) => scope.merge(Layer::Setup, bindings),
            Value::Null => {}
            other => warn!(got = ?other, "setup result is not a mapping; ignored"),
        }
        Ok(())
    }

    /// Invoke an optional hook, degrading failures to a warning.
    fn run_hook(&self, name: &str, descriptor: &Option<ValueDescriptor>, scope: &Scope) {
        let Some(descriptor) = descriptor else { return };
        let Some(callable) = self.hook_callable(name, descriptor, scope) else {
            return;
        };
        if let Err(err) = callable.call(&[]) {
            warn!(hook = name, error = %err, "lifecycle hook failed");
        }
    }

    fn hook_callable(
        &self,
        name: &str,
        descriptor: &ValueDescriptor,
        scope: &Scope,
    ) -> Option<Callable> {
        match self.evaluate(descriptor, scope) {
            Value::Callable(callable) => Some(callable),
            Value::Null => None,
            other => {
                warn!(hook = name, got = ?other, "hook did not evaluate to a callable");
                None
            }
        }
    }

    fn evaluate(&self, descriptor: &ValueDescriptor, scope: &Scope) -> Value {
        self.composer
            .evaluator()
            .evaluate(descriptor, &scope.resolver())
    }
}

/// A fully-initialized live node: its scope, its data sources, and its
/// reconciler binding.
pub struct NodeInstance {
    handle: Arc<dyn NodeHandle>,
    scope: Scope,
    orchestrator: Arc<Orchestrator>,
    bound: Arc<BoundNode>,
    host: Arc<dyn HostAdapter>,
    unmounted: Option<Callable>,
}

impl NodeInstance {
    pub fn scope(&self) -> &Scope {
        &self.scope
    }

    pub fn orchestrator(&self) -> &Arc<Orchestrator> {
        &self.orchestrator
    }

    pub fn bound(&self) -> &Arc<BoundNode> {
        &self.bound
    }

    pub fn output(&self) -> Vec<RenderNode> {
        self.bound.output()
    }

    /// Run the unmount hook, cancel subscriptions, and notify the host.
    pub fn unmount(&self) {
        if let Some(hook) = &self.unmounted {
            if let Err(err) = hook.call(&[]) {
                warn!(node = %self.handle.id(), error = %err, "unmounted hook failed");
            }
        }
        self.bound.detach();
        self.host.unmount(&self.handle.id());
    }
}
