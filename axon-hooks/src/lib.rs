#![deny(missing_docs)]
//! Named lifecycle callback registry for axon.
//!
//! The [`CallbackRegistry`] collects [`Callback`]s under named slots per
//! [`HookPoint`]. At each point, callbacks fire in registration order, and
//! each callback's returned state is passed as the next callback's input —
//! a chain can accumulate edits. Callback errors are recorded and logged
//! but never abort the chain: the registry is informational.
//!
//! Re-registering a name replaces the callback in place, keeping its
//! position in the firing order.

use axon_core::{Callback, CallbackArgs, ExecutionContext, HookPoint, SharedState};
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

/// A callback failure observed during a [`CallbackRegistry::fire`] pass.
///
/// The runner records these as `callback`-type trace entries.
#[derive(Debug, Clone)]
pub struct CallbackFailure {
    /// The hook point that was firing.
    pub hook: HookPoint,
    /// The registered name of the failing callback.
    pub name: String,
    /// The error rendered as a message.
    pub message: String,
}

/// Result of firing a hook point.
#[derive(Debug)]
pub struct FireOutcome {
    /// The state after the last callback in the chain.
    pub state: SharedState,
    /// Failures observed along the chain, in firing order.
    pub failures: Vec<CallbackFailure>,
}

struct NamedCallback {
    name: String,
    callback: Arc<dyn Callback>,
}

/// Registry of named callbacks keyed by hook point.
///
/// Registration is serialized behind a write lock; firing takes a read
/// snapshot, so a slow callback never blocks registration on another hook.
///
/// Callbacks registered for [`HookPoint::AgentError`] observe handler
/// errors but cannot suppress them — the dispatcher ignores their returned
/// state when deciding the dispatch outcome.
#[derive(Default)]
pub struct CallbackRegistry {
    hooks: RwLock<HashMap<HookPoint, Vec<NamedCallback>>>,
}

impl CallbackRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `callback` under `name` at `point`.
    ///
    /// If the name is already registered at that point, the callback is
    /// replaced in place and keeps its firing position.
    pub fn register(&self, point: HookPoint, name: impl Into<String>, callback: Arc<dyn Callback>) {
        let name = name.into();
        let mut hooks = self.write();
        let slot = hooks.entry(point).or_default();
        match slot.iter_mut().find(|nc| nc.name == name) {
            Some(existing) => existing.callback = callback,
            None => slot.push(NamedCallback { name, callback }),
        }
    }

    /// Remove the callback registered under `name` at `point`.
    /// Returns whether anything was removed.
    pub fn unregister(&self, point: HookPoint, name: &str) -> bool {
        let mut hooks = self.write();
        match hooks.get_mut(&point) {
            Some(slot) => {
                let before = slot.len();
                slot.retain(|nc| nc.name != name);
                slot.len() != before
            }
            None => false,
        }
    }

    /// Names registered at `point`, in firing order.
    pub fn names(&self, point: HookPoint) -> Vec<String> {
        self.read()
            .get(&point)
            .map(|slot| slot.iter().map(|nc| nc.name.clone()).collect())
            .unwrap_or_default()
    }

    /// Absorb every registration from `other`. Names colliding at the same
    /// point are replaced by `other`'s callback; new names are appended.
    pub fn merge(&self, other: &CallbackRegistry) {
        let theirs = other.read();
        let mut mine = self.write();
        for (point, slot) in theirs.iter() {
            let target = mine.entry(*point).or_default();
            for nc in slot {
                match target.iter_mut().find(|t| t.name == nc.name) {
                    Some(existing) => existing.callback = Arc::clone(&nc.callback),
                    None => target.push(NamedCallback {
                        name: nc.name.clone(),
                        callback: Arc::clone(&nc.callback),
                    }),
                }
            }
        }
    }

    /// Fire all callbacks registered at `args.point`, in registration
    /// order, threading state from one callback to the next.
    ///
    /// A failing callback is logged, recorded in the outcome, and the chain
    /// continues with the state it would have passed on.
    pub async fn fire(&self, ctx: &ExecutionContext, args: CallbackArgs) -> FireOutcome {
        let chain: Vec<(String, Arc<dyn Callback>)> = self
            .read()
            .get(&args.point)
            .map(|slot| {
                slot.iter()
                    .map(|nc| (nc.name.clone(), Arc::clone(&nc.callback)))
                    .collect()
            })
            .unwrap_or_default();

        let point = args.point;
        let mut state = args.state.clone();
        let mut failures = Vec::new();

        for (name, callback) in chain {
            let mut step = args.clone();
            step.state = state.clone();
            match callback.invoke(ctx, step).await {
                Ok(next) => state = next,
                Err(e) => {
                    tracing::warn!(hook = ?point, callback = %name, error = %e, "callback failed");
                    failures.push(CallbackFailure {
                        hook: point,
                        name,
                        message: e.to_string(),
                    });
                }
            }
        }

        FireOutcome { state, failures }
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, HashMap<HookPoint, Vec<NamedCallback>>> {
        self.hooks.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<HookPoint, Vec<NamedCallback>>> {
        self.hooks.write().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axon_core::callback_fn;
    use serde_json::json;

    fn appending(tag: &'static str) -> Arc<dyn Callback> {
        Arc::new(callback_fn(move |_ctx, args| {
            Box::pin(async move {
                let mut order = args
                    .state
                    .get("order")
                    .and_then(|v| v.as_array().cloned())
                    .unwrap_or_default();
                order.push(json!(tag));
                args.state.set("order", json!(order));
                Ok(args.state)
            })
        }))
    }

    #[tokio::test]
    async fn empty_registry_passes_state_through() {
        let registry = CallbackRegistry::new();
        let state = SharedState::new();
        state.set("k", json!(1));
        let args = CallbackArgs::new(HookPoint::BeforeEventHandling, state);
        let outcome = registry.fire(&ExecutionContext::new(), args).await;
        assert_eq!(outcome.state.get("k"), Some(json!(1)));
        assert!(outcome.failures.is_empty());
    }

    #[tokio::test]
    async fn fires_in_registration_order_and_threads_state() {
        let registry = CallbackRegistry::new();
        registry.register(HookPoint::BeforeAgentRun, "first", appending("first"));
        registry.register(HookPoint::BeforeAgentRun, "second", appending("second"));
        registry.register(HookPoint::BeforeAgentRun, "third", appending("third"));

        let args = CallbackArgs::new(HookPoint::BeforeAgentRun, SharedState::new());
        let outcome = registry.fire(&ExecutionContext::new(), args).await;
        assert_eq!(
            outcome.state.get("order"),
            Some(json!(["first", "second", "third"]))
        );
    }

    #[tokio::test]
    async fn replacement_keeps_position() {
        let registry = CallbackRegistry::new();
        registry.register(HookPoint::BeforeAgentRun, "a", appending("a1"));
        registry.register(HookPoint::BeforeAgentRun, "b", appending("b"));
        registry.register(HookPoint::BeforeAgentRun, "a", appending("a2"));

        assert_eq!(registry.names(HookPoint::BeforeAgentRun), vec!["a", "b"]);

        let args = CallbackArgs::new(HookPoint::BeforeAgentRun, SharedState::new());
        let outcome = registry.fire(&ExecutionContext::new(), args).await;
        assert_eq!(outcome.state.get("order"), Some(json!(["a2", "b"])));
    }

    #[tokio::test]
    async fn error_is_recorded_and_chain_continues() {
        let registry = CallbackRegistry::new();
        registry.register(
            HookPoint::AfterAgentRun,
            "broken",
            Arc::new(callback_fn(|_ctx, _args| {
                Box::pin(async move { Err(axon_core::CallbackError::Failed("nope".into())) })
            })),
        );
        registry.register(HookPoint::AfterAgentRun, "after", appending("after"));

        let args = CallbackArgs::new(HookPoint::AfterAgentRun, SharedState::new());
        let outcome = registry.fire(&ExecutionContext::new(), args).await;
        assert_eq!(outcome.failures.len(), 1);
        assert_eq!(outcome.failures[0].name, "broken");
        assert_eq!(outcome.state.get("order"), Some(json!(["after"])));
    }

    #[tokio::test]
    async fn merge_replaces_on_collision_and_appends_otherwise() {
        let left = CallbackRegistry::new();
        left.register(HookPoint::BeforeAgentRun, "shared", appending("left"));
        left.register(HookPoint::BeforeAgentRun, "only_left", appending("ol"));

        let right = CallbackRegistry::new();
        right.register(HookPoint::BeforeAgentRun, "shared", appending("right"));
        right.register(HookPoint::BeforeAgentRun, "only_right", appending("or"));

        left.merge(&right);
        assert_eq!(
            left.names(HookPoint::BeforeAgentRun),
            vec!["shared", "only_left", "only_right"]
        );

        let args = CallbackArgs::new(HookPoint::BeforeAgentRun, SharedState::new());
        let outcome = left.fire(&ExecutionContext::new(), args).await;
        assert_eq!(
            outcome.state.get("order"),
            Some(json!(["right", "ol", "or"]))
        );
    }

    #[tokio::test]
    async fn unregister_then_reregister_behaves_like_fresh() {
        let registry = CallbackRegistry::new();
        registry.register(HookPoint::BeforeAgentRun, "a", appending("a"));
        assert!(registry.unregister(HookPoint::BeforeAgentRun, "a"));
        assert!(!registry.unregister(HookPoint::BeforeAgentRun, "a"));
        assert!(registry.names(HookPoint::BeforeAgentRun).is_empty());

        registry.register(HookPoint::BeforeAgentRun, "a", appending("a"));
        assert_eq!(registry.names(HookPoint::BeforeAgentRun), vec!["a"]);
    }
}
