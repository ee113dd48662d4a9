//! Contract tests exercising the protocol traits through the test-utils
//! implementations.

use axon_core::test_utils::{EchoHandler, MemorySessionStore, ScriptedProvider};
use axon_core::{
    AgentHandler, Event, ExecutionContext, ModelProvider, Prompt, SessionId, SessionStore,
    SharedState, StreamChunk,
};
use serde_json::json;

#[tokio::test]
async fn session_store_round_trips_state() {
    let store = MemorySessionStore::new();
    let session = SessionId::from("s1");

    assert!(store.load(&session).await.unwrap().is_none());

    let state = SharedState::new();
    state.set("counter", json!(3));
    state.set_meta("session_id", "s1");
    store.save(&session, &state).await.unwrap();

    // The stored snapshot is independent of the live state.
    state.set("counter", json!(99));
    let loaded = store.load(&session).await.unwrap().unwrap();
    assert_eq!(loaded.get("counter"), Some(json!(3)));
    assert_eq!(loaded.get_meta("session_id").as_deref(), Some("s1"));

    let sessions = store.list().await.unwrap();
    assert_eq!(sessions, vec![session.clone()]);

    store.delete(&session).await.unwrap();
    assert!(store.load(&session).await.unwrap().is_none());
}

#[tokio::test]
async fn scripted_provider_calls_in_order_then_exhausts() {
    let provider = ScriptedProvider::new(vec!["first".into(), "second".into()]);
    let ctx = ExecutionContext::new();

    let a = provider.call(&ctx, Prompt::user("hi")).await.unwrap();
    let b = provider.call(&ctx, Prompt::user("hi")).await.unwrap();
    assert_eq!(a.content, "first");
    assert_eq!(b.content, "second");
    assert!(provider.call(&ctx, Prompt::user("hi")).await.is_err());
}

#[tokio::test]
async fn provider_stream_is_finite_and_ends_with_done() {
    let provider = ScriptedProvider::new(vec!["three word reply".into()]);
    let ctx = ExecutionContext::new();

    let mut rx = provider.stream(&ctx, Prompt::user("go")).await.unwrap();
    let mut tokens = Vec::new();
    let mut saw_done = false;
    while let Some(chunk) = rx.recv().await {
        match chunk {
            StreamChunk::Token(t) => tokens.push(t),
            StreamChunk::Done => {
                saw_done = true;
                // Done is terminal: the channel closes after it.
                assert!(rx.recv().await.is_none());
                break;
            }
            StreamChunk::Error(e) => panic!("unexpected stream error: {e}"),
        }
    }
    assert!(saw_done);
    assert_eq!(tokens, vec!["three", "word", "reply"]);
}

#[tokio::test]
async fn embeddings_return_one_vector_per_input() {
    let provider = ScriptedProvider::new(vec![]);
    let ctx = ExecutionContext::new();
    let vectors = provider
        .embeddings(&ctx, vec!["a".into(), "b".into()])
        .await
        .unwrap();
    assert_eq!(vectors.len(), 2);
}

#[tokio::test]
async fn handlers_do_not_mutate_the_event() {
    let ctx = ExecutionContext::new();
    let event = Event::builder()
        .payload("message", json!("hi"))
        .session("s1")
        .build();
    let before = event.payload().clone();

    EchoHandler
        .handle(&ctx, &event, SharedState::new())
        .await
        .unwrap();
    assert_eq!(event.payload(), &before);
}
