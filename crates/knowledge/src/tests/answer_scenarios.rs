//! Query-path scenarios: retrieval, caching and streaming.

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use ragline_core::AppError;
use ragline_llm::GenerationEvent;

use super::support::{content, done, harness, harness_with, Harness, ScriptedLlm};
use crate::store::MemoryStore;
use crate::types::Document;

const QUERY: &str = "How does the borrow checker work?";

fn corpus() -> Vec<Document> {
    vec![
        Document::new("borrow.md", "The borrow checker enforces that references never outlive their data."),
        Document::new("cargo.md", "Cargo builds crates, resolves dependencies and runs the test suite."),
        Document::new("traits.md", "Traits describe shared behaviour that many types can implement."),
        Document::new("async.md", "Async functions return futures that an executor polls to completion."),
        Document::new("macros.md", "Declarative macros match token patterns and expand into new code."),
    ]
}

async fn ingested(llm: ScriptedLlm) -> Harness {
    let h = harness(llm);
    let report = h.pipeline.ingest(corpus()).await.unwrap();
    assert_eq!(report.chunks_upserted, 5);
    h
}

async fn collect_events(events: ragline_llm::EventStream) -> Vec<GenerationEvent> {
    events.collect().await
}

#[tokio::test]
async fn test_top_k_three_of_five() {
    let h = ingested(ScriptedLlm::default()).await;

    let hits = h.pipeline.retrieve(QUERY, 3).await.unwrap();
    assert_eq!(hits.len(), 3);
    assert!(hits.windows(2).all(|pair| pair[0].score >= pair[1].score));
    assert_eq!(hits[0].source, "borrow.md");
    assert_eq!(hits[0].section, "1/1");
}

#[tokio::test]
async fn test_answer_carries_sources() {
    let h = ingested(ScriptedLlm::default()).await;

    let answer = h.pipeline.answer_with(QUERY, 2).await.unwrap();
    assert_eq!(answer.text, "answer #1");
    assert!(!answer.from_cache);
    assert_eq!(answer.sources.len(), 2);
    assert_eq!(answer.sources[0].source, "borrow.md");
    assert!(answer.sources[0].snippet.starts_with("The borrow checker"));
}

#[tokio::test(start_paused = true)]
async fn test_cache_ttl_scenario() {
    let h = harness_with(
        Arc::new(MemoryStore::new()),
        64,
        ScriptedLlm::default(),
        Duration::from_secs(5),
    );
    h.pipeline.ingest(corpus()).await.unwrap();

    // t = 0
    let first = h.pipeline.answer(QUERY).await.unwrap();
    assert!(!first.from_cache);
    assert_eq!(h.llm.complete_calls(), 1);
    let embeds = h.embedder.calls();

    // t = 2: served from cache, no backend calls
    tokio::time::advance(Duration::from_secs(2)).await;
    let second = h.pipeline.answer(QUERY).await.unwrap();
    assert!(second.from_cache);
    assert_eq!(second.text, first.text);
    assert_eq!(second.sources, first.sources);
    assert_eq!(h.llm.complete_calls(), 1);
    assert_eq!(h.embedder.calls(), embeds);

    // t = 6: expired, full pipeline again
    tokio::time::advance(Duration::from_secs(4)).await;
    let third = h.pipeline.answer(QUERY).await.unwrap();
    assert!(!third.from_cache);
    assert_eq!(third.text, "answer #2");
    assert_eq!(h.llm.complete_calls(), 2);
    assert_eq!(h.embedder.calls(), embeds + 1);
}

#[tokio::test]
async fn test_cache_key_is_normalized() {
    let h = ingested(ScriptedLlm::default()).await;

    h.pipeline.answer(QUERY).await.unwrap();
    let again = h
        .pipeline
        .answer("  how DOES the   borrow checker work? ")
        .await
        .unwrap();
    assert!(again.from_cache);
    assert_eq!(h.llm.complete_calls(), 1);

    // A different top_k is a different entry
    let other = h.pipeline.answer_with(QUERY, 1).await.unwrap();
    assert!(!other.from_cache);
    assert_eq!(h.llm.complete_calls(), 2);
}

#[tokio::test]
async fn test_no_hits_answer_is_not_cached() {
    let h = harness(ScriptedLlm::default());

    let answer = h.pipeline.answer("What is a monad?").await.unwrap();
    assert_eq!(
        answer.text,
        "I could not find information about \"What is a monad?\" in the available documents."
    );
    assert!(answer.sources.is_empty());
    assert_eq!(h.llm.complete_calls(), 0);
    assert!(h.pipeline.cache().is_empty());
}

#[tokio::test]
async fn test_blank_query_skips_embedding() {
    let h = ingested(ScriptedLlm::default()).await;
    let embeds = h.embedder.calls();

    assert!(h.pipeline.retrieve("   ", 5).await.unwrap().is_empty());
    let answer = h.pipeline.answer("   ").await.unwrap();
    assert!(answer.sources.is_empty());
    assert_eq!(h.embedder.calls(), embeds);
    assert_eq!(h.llm.complete_calls(), 0);
}

#[tokio::test]
async fn test_generation_failure_is_not_cached() {
    let h = ingested(ScriptedLlm {
        fail_complete: true,
        ..Default::default()
    })
    .await;

    match h.pipeline.answer(QUERY).await {
        Err(AppError::GenerationFailed { attempts, .. }) => assert_eq!(attempts, 2),
        other => panic!("expected GenerationFailed, got {:?}", other),
    }
    assert_eq!(h.llm.complete_calls(), 2);
    assert!(h.pipeline.cache().is_empty());
}

#[tokio::test]
async fn test_stream_reset_yields_error_then_done() {
    let h = ingested(ScriptedLlm::with_streams(vec![vec![
        content("The "),
        content("borrow "),
        content("checker"),
        Err(AppError::StreamTransport("connection reset by peer".to_string())),
    ]]))
    .await;

    let streaming = h.pipeline.answer_stream(QUERY).await;
    assert!(!streaming.from_cache);
    assert!(!streaming.sources.is_empty());

    let events = collect_events(streaming.events).await;
    assert_eq!(events.len(), 6);
    assert_eq!(events[0], GenerationEvent::Start);
    assert_eq!(events[1], GenerationEvent::ContentDelta("The ".to_string()));
    assert_eq!(events[2], GenerationEvent::ContentDelta("borrow ".to_string()));
    assert_eq!(events[3], GenerationEvent::ContentDelta("checker".to_string()));
    match &events[4] {
        GenerationEvent::ErrorDelta(message) => assert!(message.contains("connection reset")),
        other => panic!("expected ErrorDelta, got {:?}", other),
    }
    assert_eq!(events[5], GenerationEvent::Done);

    // Partial output is never cached
    assert!(h.pipeline.cache().is_empty());
}

#[tokio::test]
async fn test_completed_stream_is_cached() {
    let h = ingested(ScriptedLlm::with_streams(vec![vec![
        content("References "),
        content("are checked."),
        done(),
    ]]))
    .await;

    let events = collect_events(h.pipeline.answer_stream(QUERY).await.events).await;
    assert_eq!(events.last(), Some(&GenerationEvent::Done));
    assert!(!events
        .iter()
        .any(|event| matches!(event, GenerationEvent::ErrorDelta(_))));

    let replay = h.pipeline.answer_stream(QUERY).await;
    assert!(replay.from_cache);
    assert_eq!(
        collect_events(replay.events).await,
        vec![
            GenerationEvent::Start,
            GenerationEvent::ContentDelta("References are checked.".to_string()),
            GenerationEvent::Done,
        ]
    );
    assert_eq!(h.llm.stream_calls(), 1);

    // The blocking path shares the entry
    let answer = h.pipeline.answer(QUERY).await.unwrap();
    assert!(answer.from_cache);
    assert_eq!(answer.text, "References are checked.");
    assert_eq!(h.llm.complete_calls(), 0);
}

#[tokio::test]
async fn test_stream_without_done_reports_incomplete() {
    let h = ingested(ScriptedLlm::with_streams(vec![vec![content("Half an answer")]])).await;

    let events = collect_events(h.pipeline.answer_stream(QUERY).await.events).await;
    assert_eq!(
        events,
        vec![
            GenerationEvent::Start,
            GenerationEvent::ContentDelta("Half an answer".to_string()),
            GenerationEvent::ErrorDelta(ragline_llm::generator::INCOMPLETE_STREAM.to_string()),
            GenerationEvent::Done,
        ]
    );
    assert!(h.pipeline.cache().is_empty());
}

#[tokio::test]
async fn test_stream_with_no_hits_is_bracketed() {
    let h = harness(ScriptedLlm::default());

    let streaming = h.pipeline.answer_stream("anything at all").await;
    let events = collect_events(streaming.events).await;
    assert_eq!(events.first(), Some(&GenerationEvent::Start));
    assert_eq!(events.last(), Some(&GenerationEvent::Done));
    assert!(matches!(&events[1], GenerationEvent::ContentDelta(text) if text.contains("could not find")));
    assert_eq!(h.llm.stream_calls(), 0);
}
