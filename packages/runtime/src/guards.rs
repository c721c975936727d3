//! Navigation guards.
//!
//! A guard may decide immediately or hand back a callback to run once the
//! destination view's scope exists. The dispatcher polls the gate on a
//! fixed interval up to a bounded timeout; an unready scope past the
//! deadline fails the navigation.

use crate::error::{RuntimeError, RuntimeResult};
use montage_scope::Scope;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, instrument};

/// What a guard decided.
#[derive(Debug, Clone, PartialEq)]
pub enum GuardDecision {
    Allow,
    Deny,
    Redirect(String),
}

/// What a guard returned. `WithScope` defers the decision until the
/// destination scope is ready; the callback may itself defer again.
pub enum GuardOutcome {
    Allow,
    Deny,
    Redirect(String),
    WithScope(Box<dyn FnOnce(&Scope) -> GuardOutcome + Send>),
}

#[derive(Debug, Clone, Copy)]
pub struct GuardOptions {
    pub timeout: Duration,
    pub poll_interval: Duration,
}

impl Default for GuardOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(5),
            poll_interval: Duration::from_millis(50),
        }
    }
}

/// Readiness gate for one destination view. The dispatcher opens it once
/// instantiation completes; guards poll it through [`resolve_guard`].
#[derive(Clone, Default)]
pub struct ScopeGate {
    slot: Arc<Mutex<Option<Scope>>>,
}

impl ScopeGate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn open(&self, scope: Scope) {
        *self.slot.lock().unwrap() = Some(scope);
    }

    pub fn get(&self) -> Option<Scope> {
        self.slot.lock().unwrap().clone()
    }
}

/// Drive a guard outcome to a decision, waiting on `gate` for scope-bound
/// callbacks. The timeout spans the whole resolution, not each callback.
#[instrument(skip(outcome, gate, options))]
pub async fn resolve_guard(
    outcome: GuardOutcome,
    gate: &ScopeGate,
    options: GuardOptions,
) -> RuntimeResult<GuardDecision> {
    let deadline = tokio::time::Instant::now() + options.timeout;
    let mut current = outcome;
    loop {
        match current {
            GuardOutcome::Allow => return Ok(GuardDecision::Allow),
            GuardOutcome::Deny => return Ok(GuardDecision::Deny),
            GuardOutcome::Redirect(target) => return Ok(GuardDecision::Redirect(target)),
            GuardOutcome::WithScope(callback) => {
                let scope = loop {
                    if let Some(scope) = gate.get() {
                        break scope;
                    }
                    if tokio::time::Instant::now() >= deadline {
                        return Err(RuntimeError::GuardTimeout(options.timeout.as_millis() as u64));
                    }
                    tokio::time::sleep(options.poll_interval).await;
                };
                debug!("scope ready, invoking guard callback");
                current = callback(&scope);
            }
        }
    }
}
