//! Integration tests for the TwinEngine.
//!
//! These drive the engine through its public API only, with a scripted
//! classifier standing in for the HTTP backend.

use anyhow::Result;
use async_trait::async_trait;
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use twin_conversation::{Label, TextClassifier};
use twin_core::context::to_context;
use twin_core::{ContextMap, InteractionOutcome, TwinSystemConfig};
use twin_engine::{Components, TwinEngine};

// ============================================================================
// Scripted classifier
// ============================================================================

struct ScriptedClassifier {
    sentiment: &'static str,
    calls: AtomicUsize,
}

impl ScriptedClassifier {
    fn new(sentiment: &'static str) -> Self {
        Self {
            sentiment,
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl TextClassifier for ScriptedClassifier {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn health_check(&self) -> Result<()> {
        Ok(())
    }

    async fn sentiment(&self, _text: &str) -> Result<Label> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(Label {
            label: self.sentiment.to_string(),
            score: 0.95,
        })
    }

    async fn intent(&self, _text: &str, _candidates: &[&str]) -> Result<Label> {
        anyhow::bail!("intent model offline")
    }

    async fn emotion(&self, _text: &str) -> Result<Label> {
        Ok(Label {
            label: "sadness".to_string(),
            score: 0.1,
        })
    }

    async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
        Ok(vec![0.0; 4])
    }
}

fn engine_with(classifier: Arc<ScriptedClassifier>) -> TwinEngine {
    let config = TwinSystemConfig::default();
    let components = Components::from_config(&config).with_classifier(classifier);
    TwinEngine::with_components(config, components)
}

fn message(text: &str) -> ContextMap {
    to_context(json!({"type": "conversation", "message": text, "sender": "sam"}))
}

// ============================================================================
// Scenarios
// ============================================================================

#[tokio::test]
async fn test_classifier_sentiment_labels_the_interaction() {
    let classifier = Arc::new(ScriptedClassifier::new("negative"));
    let engine = engine_with(Arc::clone(&classifier));
    let id = engine
        .create_twin(&to_context(json!({"name": "Noor", "age": 41, "occupation": "manager"})))
        .await
        .unwrap();

    let response = engine
        .process_interaction(&id, &message("The quarterly report is published"))
        .await
        .unwrap();

    assert_eq!(classifier.calls.load(Ordering::SeqCst), 1);
    assert_eq!(response.response["metadata"]["sentiment"], "negative");

    let outcome = engine
        .with_twin(&id, |t| t.interaction_log().last().and_then(|r| r.outcome))
        .await
        .flatten();
    assert_eq!(outcome, Some(InteractionOutcome::Negative));
}

#[tokio::test]
async fn test_non_conversation_interactions_skip_the_classifier() {
    let classifier = Arc::new(ScriptedClassifier::new("positive"));
    let engine = engine_with(Arc::clone(&classifier));
    let id = engine.create_twin(&ContextMap::new()).await.unwrap();

    let response = engine
        .process_interaction(
            &id,
            &to_context(json!({"type": "health_query", "query_type": "current_status"})),
        )
        .await
        .unwrap();

    assert_eq!(classifier.calls.load(Ordering::SeqCst), 0);
    assert!(response.response["health_metrics"]["heart_rate"].is_number());
    assert!(response.response["status"].is_string());
}

#[tokio::test]
async fn test_twin_state_reflects_interactions() {
    let engine = TwinEngine::new(TwinSystemConfig::default());
    let id = engine
        .create_twin(&to_context(json!({"name": "Ilse", "interests": ["chess", "hiking"]})))
        .await
        .unwrap();

    for text in ["Hello!", "What do you think about chess?", "Thanks, that was great"] {
        engine.process_interaction(&id, &message(text)).await.unwrap();
    }

    let state = engine.get_twin_state(&id).await.unwrap();
    assert_eq!(state.twin_id, id);
    assert_eq!(state.conversation_history.len(), 3);
    assert_eq!(state.conversation_summary.total_messages, 3);
    assert!(!state.behavior_patterns.is_empty());
}

#[tokio::test]
async fn test_registry_listing_tracks_creates_and_deletes() {
    let engine = TwinEngine::new(TwinSystemConfig::default());
    let a = engine.create_twin(&ContextMap::new()).await.unwrap();
    let b = engine.create_twin(&ContextMap::new()).await.unwrap();
    assert_eq!(engine.list_twins().await.len(), 2);

    assert!(engine.delete_twin(&a).await);
    assert!(!engine.delete_twin(&a).await);
    assert_eq!(engine.list_twins().await, vec![b]);
}

#[tokio::test]
async fn test_start_twice_spawns_loops_once() {
    let engine = TwinEngine::new(TwinSystemConfig::default());
    engine.start().await;
    engine.start().await;
    assert_eq!(engine.get_system_status().await.background_tasks, 4);
    engine.shutdown().await;
    assert!(!engine.is_running());
}
