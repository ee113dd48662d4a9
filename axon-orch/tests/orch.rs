//! Integration tests for the orchestration modes.

use axon_core::test_utils::{CountingHandler, EchoHandler, FailingHandler, SleepyHandler};
use axon_core::{AgentResult, Event, ExecutionContext, SharedState, handler_fn, keys};
use axon_orch::{
    AgentGroup, ErrorStrategy, GroupMode, KeyMergePolicy, OrchError, OrchestrationConfig,
    Orchestrator, StateMergePolicy,
};
use axon_trace::MemoryTraceLogger;
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

fn trail_handler(name: &'static str) -> Arc<dyn axon_core::AgentHandler> {
    Arc::new(handler_fn(move |_ctx, _event, state| {
        Box::pin(async move {
            let mut trail = state
                .get("trail")
                .and_then(|v| v.as_array().cloned())
                .unwrap_or_default();
            trail.push(json!(name));
            state.set("trail", json!(trail));
            Ok(AgentResult::success(state))
        })
    }))
}

fn inc_handler() -> Arc<dyn axon_core::AgentHandler> {
    Arc::new(handler_fn(|_ctx, _event, state| {
        Box::pin(async move {
            let counter = state.get("counter").and_then(|v| v.as_i64()).unwrap_or(0);
            state.set("counter", json!(counter + 1));
            Ok(AgentResult::success(state))
        })
    }))
}

// --- Registration ---

#[tokio::test]
async fn duplicate_registration_is_an_error() {
    let orch = Orchestrator::new(OrchestrationConfig::route());
    orch.register("echo", Arc::new(EchoHandler)).unwrap();
    assert!(matches!(
        orch.register("echo", Arc::new(EchoHandler)),
        Err(OrchError::DuplicateAgent(_))
    ));
}

#[tokio::test]
async fn unregister_then_reregister_is_fresh() {
    let orch = Orchestrator::new(OrchestrationConfig::route());
    orch.register("echo", Arc::new(EchoHandler)).unwrap();
    assert!(orch.unregister("echo"));
    assert!(!orch.unregister("echo"));
    orch.register("echo", Arc::new(EchoHandler)).unwrap();
    assert_eq!(orch.agent_names(), vec!["echo"]);
}

// --- Route mode ---

#[tokio::test]
async fn route_dispatches_to_named_handler() {
    let orch = Orchestrator::new(OrchestrationConfig::route());
    orch.register("echo", Arc::new(EchoHandler)).unwrap();

    let event = Event::builder()
        .payload("message", json!("hi"))
        .route_to("echo")
        .session("s1")
        .build();
    let result = orch.dispatch(&ExecutionContext::new(), &event).await.unwrap();
    assert_eq!(result.state.get("response"), Some(json!("hi")));
    assert!(result.is_success());
}

#[tokio::test]
async fn route_falls_back_to_default_handler() {
    let orch = Orchestrator::new(OrchestrationConfig::route());
    orch.register("default", Arc::new(EchoHandler)).unwrap();

    let event = Event::builder().payload("message", json!("fallback")).build();
    let result = orch.dispatch(&ExecutionContext::new(), &event).await.unwrap();
    assert_eq!(result.state.get("response"), Some(json!("fallback")));
}

#[tokio::test]
async fn route_without_target_or_default_is_no_route() {
    let orch = Orchestrator::new(OrchestrationConfig::route());
    orch.register("echo", Arc::new(EchoHandler)).unwrap();

    let event = Event::builder().build();
    assert!(matches!(
        orch.dispatch(&ExecutionContext::new(), &event).await,
        Err(OrchError::NoRoute)
    ));
}

#[tokio::test]
async fn route_propagates_handler_failure() {
    let orch = Orchestrator::new(OrchestrationConfig::route());
    orch.register("boom", Arc::new(FailingHandler::new("kaput")))
        .unwrap();

    let event = Event::builder().route_to("boom").build();
    let err = orch
        .dispatch(&ExecutionContext::new(), &event)
        .await
        .unwrap_err();
    assert!(matches!(err, OrchError::HandlerFailed { .. }));
}

// --- Collaborative mode ---

#[tokio::test]
async fn collaborative_merges_every_handler_output() {
    let orch = Orchestrator::new(
        OrchestrationConfig::collaborative().with_state_merge(StateMergePolicy::Merge),
    );
    let (a, b, c) = (
        Arc::new(CountingHandler::new("a")),
        Arc::new(CountingHandler::new("b")),
        Arc::new(CountingHandler::new("c")),
    );
    orch.register("a", a.clone()).unwrap();
    orch.register("b", b.clone()).unwrap();
    orch.register("c", c.clone()).unwrap();

    let event = Event::builder().session("vote").build();
    let result = orch.dispatch(&ExecutionContext::new(), &event).await.unwrap();
    for key in ["a", "b", "c"] {
        assert_eq!(result.state.get(key), Some(json!("ok")));
    }
    assert_eq!(a.calls() + b.calls() + c.calls(), 3);
}

#[tokio::test]
async fn collaborative_with_no_handlers_is_empty_success() {
    let orch = Orchestrator::new(OrchestrationConfig::collaborative());
    let event = Event::builder().build();
    let result = orch.dispatch(&ExecutionContext::new(), &event).await.unwrap();
    assert!(result.state.is_empty());
}

#[tokio::test]
async fn collaborative_fail_fast_surfaces_the_real_error() {
    let orch = Orchestrator::new(
        OrchestrationConfig::collaborative().with_error_strategy(ErrorStrategy::FailFast),
    );
    orch.register("slow", Arc::new(SleepyHandler::new(Duration::from_secs(5))))
        .unwrap();
    orch.register("boom", Arc::new(FailingHandler::new("root cause")))
        .unwrap();

    let event = Event::builder().build();
    let err = orch
        .dispatch(&ExecutionContext::new(), &event)
        .await
        .unwrap_err();
    match err {
        OrchError::HandlerFailed { agent, .. } => assert_eq!(agent, "boom"),
        other => panic!("expected HandlerFailed, got {other}"),
    }
}

#[tokio::test]
async fn collaborative_continue_on_error_respects_threshold() {
    let config = OrchestrationConfig::collaborative()
        .with_error_strategy(ErrorStrategy::ContinueOnError)
        .with_failure_threshold(0.5);
    let orch = Orchestrator::new(config);
    orch.register("ok", Arc::new(CountingHandler::new("ok"))).unwrap();
    orch.register("bad", Arc::new(FailingHandler::new("down"))).unwrap();

    // 1 of 2 failed, threshold 0.5: still a success.
    let event = Event::builder().build();
    let result = orch.dispatch(&ExecutionContext::new(), &event).await.unwrap();
    assert_eq!(result.state.get("ok"), Some(json!("ok")));

    // Add another failure: 2 of 3 failed, beyond the threshold.
    orch.register("bad2", Arc::new(FailingHandler::new("down")))
        .unwrap();
    let err = orch
        .dispatch(&ExecutionContext::new(), &event)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        OrchError::TooManyFailures { failed: 2, total: 3 }
    ));
}

#[tokio::test]
async fn collaborative_collect_all_records_per_agent_errors() {
    let orch = Orchestrator::new(
        OrchestrationConfig::collaborative().with_error_strategy(ErrorStrategy::CollectAll),
    );
    orch.register("ok", Arc::new(CountingHandler::new("ok"))).unwrap();
    orch.register("bad", Arc::new(FailingHandler::new("down"))).unwrap();

    let event = Event::builder().build();
    let result = orch.dispatch(&ExecutionContext::new(), &event).await.unwrap();
    assert_eq!(result.state.get("ok"), Some(json!("ok")));

    let errors = result.state.get(keys::PER_AGENT_ERRORS).unwrap();
    assert!(errors.get("bad").is_some());
    assert!(errors.get("ok").is_none());
}

#[tokio::test]
async fn collaborative_by_key_policy_merge() {
    let mut policies = HashMap::new();
    policies.insert("votes".to_string(), KeyMergePolicy::SumNumeric);
    let orch = Orchestrator::new(
        OrchestrationConfig::collaborative()
            .with_state_merge(StateMergePolicy::ByKeyPolicy(policies)),
    );
    for name in ["a", "b", "c"] {
        orch.register(
            name,
            Arc::new(handler_fn(|_ctx, _event, state| {
                Box::pin(async move {
                    state.set("votes", json!(1));
                    Ok(AgentResult::success(state))
                })
            })),
        )
        .unwrap();
    }

    let event = Event::builder().build();
    let result = orch.dispatch(&ExecutionContext::new(), &event).await.unwrap();
    assert_eq!(result.state.get("votes"), Some(json!(3)));
}

// --- Sequential mode ---

#[tokio::test]
async fn sequential_threads_state_in_order() {
    let order = vec!["h1".to_string(), "h2".to_string(), "h3".to_string()];
    let orch = Orchestrator::new(OrchestrationConfig::sequential(order));
    orch.register("h1", trail_handler("h1")).unwrap();
    orch.register("h2", trail_handler("h2")).unwrap();
    orch.register("h3", trail_handler("h3")).unwrap();

    let event = Event::builder().session("pipe").build();
    let result = orch.dispatch(&ExecutionContext::new(), &event).await.unwrap();
    assert_eq!(result.state.get("trail"), Some(json!(["h1", "h2", "h3"])));
}

#[tokio::test]
async fn sequential_aborts_on_first_error() {
    let order = vec!["h1".to_string(), "boom".to_string(), "h3".to_string()];
    let orch = Orchestrator::new(OrchestrationConfig::sequential(order));
    orch.register("h1", trail_handler("h1")).unwrap();
    orch.register("boom", Arc::new(FailingHandler::new("mid"))).unwrap();
    orch.register("h3", trail_handler("h3")).unwrap();

    let event = Event::builder().build();
    let err = orch
        .dispatch(&ExecutionContext::new(), &event)
        .await
        .unwrap_err();
    match err {
        OrchError::HandlerFailed { agent, .. } => assert_eq!(agent, "boom"),
        other => panic!("unexpected error {other}"),
    }
}

#[tokio::test]
async fn sequential_continue_on_error_skips_failed_step() {
    let order = vec!["h1".to_string(), "boom".to_string(), "h3".to_string()];
    let orch = Orchestrator::new(
        OrchestrationConfig::sequential(order).with_error_strategy(ErrorStrategy::ContinueOnError),
    );
    orch.register("h1", trail_handler("h1")).unwrap();
    orch.register("boom", Arc::new(FailingHandler::new("mid"))).unwrap();
    orch.register("h3", trail_handler("h3")).unwrap();

    let event = Event::builder().build();
    let result = orch.dispatch(&ExecutionContext::new(), &event).await.unwrap();
    assert_eq!(result.state.get("trail"), Some(json!(["h1", "h3"])));
}

#[tokio::test]
async fn sequential_unknown_agent_fails() {
    let orch = Orchestrator::new(OrchestrationConfig::sequential(vec!["ghost".to_string()]));
    let event = Event::builder().build();
    assert!(matches!(
        orch.dispatch(&ExecutionContext::new(), &event).await,
        Err(OrchError::UnknownAgent(_))
    ));
}

// --- Loop mode ---

#[tokio::test]
async fn loop_runs_until_predicate_stops_it() {
    let config = OrchestrationConfig::loop_over(vec!["inc".to_string()], 10)
        .with_stop_predicate(|state| {
            state.get("counter").and_then(|v| v.as_i64()).unwrap_or(0) >= 3
        });
    let orch = Orchestrator::new(config);
    orch.register("inc", inc_handler()).unwrap();

    let event = Event::builder().session("loop").build();
    let result = orch.dispatch(&ExecutionContext::new(), &event).await.unwrap();
    assert_eq!(result.state.get("counter"), Some(json!(3)));
    assert_eq!(result.state.get(keys::LOOP_ITERATIONS), Some(json!(3)));
}

#[tokio::test]
async fn loop_zero_iterations_never_runs_the_handler() {
    let config = OrchestrationConfig::loop_over(vec!["inc".to_string()], 0);
    let orch = Orchestrator::new(config);
    let counting = Arc::new(CountingHandler::new("inc"));
    orch.register("inc", counting.clone()).unwrap();

    let event = Event::builder().build();
    let result = orch.dispatch(&ExecutionContext::new(), &event).await.unwrap();
    assert_eq!(counting.calls(), 0);
    assert_eq!(result.state.get(keys::LOOP_ITERATIONS), Some(json!(0)));
}

#[tokio::test]
async fn loop_hits_iteration_cap_without_predicate() {
    let config = OrchestrationConfig::loop_over(vec!["inc".to_string()], 4);
    let orch = Orchestrator::new(config);
    orch.register("inc", inc_handler()).unwrap();

    let event = Event::builder().build();
    let result = orch.dispatch(&ExecutionContext::new(), &event).await.unwrap();
    assert_eq!(result.state.get("counter"), Some(json!(4)));
    assert_eq!(result.state.get(keys::LOOP_ITERATIONS), Some(json!(4)));
}

// --- Mixed mode ---

#[tokio::test]
async fn mixed_groups_run_sequentially() {
    let config = OrchestrationConfig::mixed(vec![
        AgentGroup {
            mode: GroupMode::Collaborative,
            agents: vec!["a".to_string(), "b".to_string()],
        },
        AgentGroup {
            mode: GroupMode::Sequential,
            agents: vec!["finish".to_string()],
        },
    ]);
    let orch = Orchestrator::new(config);
    orch.register("a", Arc::new(CountingHandler::new("a"))).unwrap();
    orch.register("b", Arc::new(CountingHandler::new("b"))).unwrap();
    orch.register(
        "finish",
        Arc::new(handler_fn(|_ctx, _event, state| {
            Box::pin(async move {
                // The second group sees the first group's merged output.
                let saw_both = state.get("a").is_some() && state.get("b").is_some();
                state.set("saw_both", json!(saw_both));
                Ok(AgentResult::success(state))
            })
        })),
    )
    .unwrap();

    let event = Event::builder().build();
    let result = orch.dispatch(&ExecutionContext::new(), &event).await.unwrap();
    assert_eq!(result.state.get("saw_both"), Some(json!(true)));
}

// --- Timeout and cancellation ---

#[tokio::test]
async fn dispatch_timeout_cancels_handlers() {
    let config = OrchestrationConfig::route().with_timeout(Duration::from_millis(50));
    let orch = Orchestrator::new(config);
    orch.register(
        "slow",
        Arc::new(SleepyHandler::new(Duration::from_secs(10))),
    )
    .unwrap();

    let event = Event::builder().route_to("slow").build();
    let started = std::time::Instant::now();
    let err = orch
        .dispatch(&ExecutionContext::new(), &event)
        .await
        .unwrap_err();
    assert!(matches!(err, OrchError::DispatchTimeout(50)));
    assert!(started.elapsed() < Duration::from_secs(2));
}

#[tokio::test]
async fn zero_timeout_means_no_timeout() {
    let config = OrchestrationConfig::route(); // timeout defaults to zero
    let orch = Orchestrator::new(config);
    orch.register(
        "slow",
        Arc::new(SleepyHandler::new(Duration::from_millis(50))),
    )
    .unwrap();

    let event = Event::builder().route_to("slow").build();
    assert!(orch.dispatch(&ExecutionContext::new(), &event).await.is_ok());
}

// --- Trace emission ---

#[tokio::test]
async fn dispatch_emits_agent_start_and_end_in_order() {
    use axon_core::{SessionId, TraceEntryType, TraceLogger};

    let trace = Arc::new(MemoryTraceLogger::new());
    let orch = Orchestrator::new(OrchestrationConfig::route()).with_trace(trace.clone());
    orch.register("echo", Arc::new(EchoHandler)).unwrap();

    let event = Event::builder()
        .payload("message", json!("hi"))
        .route_to("echo")
        .session("s1")
        .build();
    orch.dispatch(&ExecutionContext::new(), &event).await.unwrap();

    let entries = trace.traces(&SessionId::from("s1")).await.unwrap();
    let agent_entries: Vec<_> = entries
        .iter()
        .filter(|e| {
            matches!(
                e.entry_type,
                TraceEntryType::AgentStart | TraceEntryType::AgentEnd
            )
        })
        .collect();
    assert_eq!(agent_entries.len(), 2);
    assert_eq!(agent_entries[0].entry_type, TraceEntryType::AgentStart);
    assert_eq!(agent_entries[1].entry_type, TraceEntryType::AgentEnd);

    // BeforeAgentRun hook entry precedes agent_start.
    let before_idx = entries
        .iter()
        .position(|e| {
            e.entry_type == TraceEntryType::Callback
                && e.hook == Some(axon_core::HookPoint::BeforeAgentRun)
        })
        .unwrap();
    let start_idx = entries
        .iter()
        .position(|e| e.entry_type == TraceEntryType::AgentStart)
        .unwrap();
    assert!(before_idx < start_idx);
}

#[tokio::test]
async fn collaborative_collect_all_runs_every_handler() {
    use axon_core::{SessionId, TraceEntryType, TraceLogger};

    let trace = Arc::new(MemoryTraceLogger::new());
    let orch = Orchestrator::new(
        OrchestrationConfig::collaborative().with_error_strategy(ErrorStrategy::CollectAll),
    )
    .with_trace(trace.clone());
    for name in ["a", "b", "c"] {
        orch.register(name, Arc::new(CountingHandler::new(name))).unwrap();
    }

    let event = Event::builder().session("s2").build();
    orch.dispatch(&ExecutionContext::new(), &event).await.unwrap();

    let entries = trace.traces(&SessionId::from("s2")).await.unwrap();
    let starts = entries
        .iter()
        .filter(|e| e.entry_type == TraceEntryType::AgentStart)
        .count();
    assert_eq!(starts, 3);
}
