//! Optional ML classification backend.
//!
//! A [`TextClassifier`] is checked once when the engine starts. If the check
//! fails the engine never consults it; if it succeeds, each call may still
//! fail or come back unsure, in which case the rule-based labels are used.

use crate::classify::{classify_message_type, topic_for, AnalysisSource, MessageAnalysis};
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use twin_core::config::ClassifierConfig;
use twin_core::{ContextMap, Intent, Sentiment, TwinError};

/// Minimum confidence to accept a sentiment label.
pub const SENTIMENT_MIN_CONFIDENCE: f32 = 0.6;
/// An intent label must score above this.
pub const INTENT_MIN_CONFIDENCE: f32 = 0.5;
/// An emotion label must score above this, else the emotion is neutral.
pub const EMOTION_MIN_CONFIDENCE: f32 = 0.4;

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Label {
    pub label: String,
    pub score: f32,
}

#[async_trait]
pub trait TextClassifier: Send + Sync {
    fn name(&self) -> &str;

    /// Cheap availability check, run once at startup.
    async fn health_check(&self) -> Result<()>;

    async fn sentiment(&self, text: &str) -> Result<Label>;

    /// Zero-shot choice among `candidates`.
    async fn intent(&self, text: &str, candidates: &[&str]) -> Result<Label>;

    async fn emotion(&self, text: &str) -> Result<Label>;

    async fn embed(&self, text: &str) -> Result<Vec<f32>>;
}

/// Ask the classifier for sentiment, intent and emotion concurrently, and fall
/// back per label to the rule-based result on failure or low confidence.
pub async fn analyze_with(
    classifier: &dyn TextClassifier,
    message: &str,
    context: &ContextMap,
) -> MessageAnalysis {
    let rules = MessageAnalysis::rule_based(message, context);
    let candidates: Vec<&str> = Intent::ALL.iter().map(|i| i.as_str()).collect();

    let (sentiment, intent, emotion) = tokio::join!(
        classifier.sentiment(message),
        classifier.intent(message, &candidates),
        classifier.emotion(message),
    );

    let mut used_classifier = false;

    let sentiment = match sentiment {
        Ok(l) if l.score >= SENTIMENT_MIN_CONFIDENCE => {
            used_classifier = true;
            map_sentiment(&l.label)
        }
        Ok(l) => {
            tracing::debug!("Sentiment confidence {:.2} too low, using rules", l.score);
            rules.sentiment
        }
        Err(e) => {
            tracing::debug!("Sentiment classifier failed ({:#}), using rules", e);
            rules.sentiment
        }
    };

    let intent = match intent {
        Ok(l) if l.score > INTENT_MIN_CONFIDENCE => match Intent::from_label(&l.label) {
            Some(intent) => {
                used_classifier = true;
                intent
            }
            None => rules.intent,
        },
        Ok(l) => {
            tracing::debug!("Intent confidence {:.2} too low, using rules", l.score);
            rules.intent
        }
        Err(e) => {
            tracing::debug!("Intent classifier failed ({:#}), using rules", e);
            rules.intent
        }
    };

    let emotion = match emotion {
        Ok(l) if l.score > EMOTION_MIN_CONFIDENCE => l.label.to_lowercase(),
        Ok(_) => rules.emotion.clone(),
        Err(e) => {
            tracing::debug!("Emotion classifier failed ({:#})", e);
            rules.emotion.clone()
        }
    };

    let message_type = classify_message_type(message);
    MessageAnalysis {
        message_type,
        sentiment,
        intent,
        emotion,
        topic: topic_for(message, message_type).to_string(),
        source: if used_classifier {
            AnalysisSource::Classifier
        } else {
            AnalysisSource::RuleBased
        },
    }
}

/// Sentiment model labels onto [`Sentiment`]. Unknown labels read as neutral.
pub fn map_sentiment(label: &str) -> Sentiment {
    match label.to_lowercase().as_str() {
        "positive" | "label_2" => Sentiment::Positive,
        "negative" | "label_0" => Sentiment::Negative,
        _ => Sentiment::Neutral,
    }
}

// ============================================================================
// Hugging Face inference API
// ============================================================================

#[derive(Debug, Clone)]
pub struct HuggingFaceClassifier {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    sentiment_model: String,
    intent_model: String,
    emotion_model: String,
    embedding_model: String,
}

#[derive(Deserialize)]
struct ZeroShotResponse {
    labels: Vec<String>,
    scores: Vec<f32>,
}

impl HuggingFaceClassifier {
    pub fn new(config: &ClassifierConfig) -> Result<Self, TwinError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| TwinError::Classifier(e.to_string()))?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            sentiment_model: config.sentiment_model.clone(),
            intent_model: config.intent_model.clone(),
            emotion_model: config.emotion_model.clone(),
            embedding_model: config.embedding_model.clone(),
        })
    }

    async fn infer(&self, model: &str, payload: Value) -> Result<Value> {
        let url = format!("{}/models/{}", self.base_url, model);
        let mut request = self.client.post(&url).json(&payload);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }
        let response = request
            .send()
            .await
            .with_context(|| format!("Failed to reach inference API for {model}"))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Inference API error {} for {}: {}", status, model, body);
        }
        Ok(response.json().await?)
    }

    /// Text-classification responses come back either flat or nested one
    /// level (`[[{label, score}, ...]]`). Returns the best-scoring label.
    fn top_label(value: Value) -> Result<Label> {
        let flat = match value {
            Value::Array(outer) if outer.first().map_or(false, Value::is_array) => {
                outer.into_iter().next().unwrap_or(Value::Null)
            }
            other => other,
        };
        let labels: Vec<Label> =
            serde_json::from_value(flat).context("Unexpected classification payload")?;
        labels
            .into_iter()
            .max_by(|a, b| a.score.total_cmp(&b.score))
            .context("Empty classification result")
    }
}

#[async_trait]
impl TextClassifier for HuggingFaceClassifier {
    fn name(&self) -> &str {
        "huggingface"
    }

    async fn health_check(&self) -> Result<()> {
        self.sentiment("hello").await.map(|_| ())
    }

    async fn sentiment(&self, text: &str) -> Result<Label> {
        let value = self
            .infer(&self.sentiment_model, json!({ "inputs": text }))
            .await?;
        Self::top_label(value)
    }

    async fn intent(&self, text: &str, candidates: &[&str]) -> Result<Label> {
        let value = self
            .infer(
                &self.intent_model,
                json!({ "inputs": text, "parameters": { "candidate_labels": candidates } }),
            )
            .await?;
        let parsed: ZeroShotResponse =
            serde_json::from_value(value).context("Unexpected zero-shot payload")?;
        parsed
            .labels
            .into_iter()
            .zip(parsed.scores)
            .map(|(label, score)| Label { label, score })
            .max_by(|a, b| a.score.total_cmp(&b.score))
            .context("Empty zero-shot result")
    }

    async fn emotion(&self, text: &str) -> Result<Label> {
        let value = self
            .infer(&self.emotion_model, json!({ "inputs": text }))
            .await?;
        Self::top_label(value)
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let value = self
            .infer(&self.embedding_model, json!({ "inputs": text }))
            .await?;
        // Sentence models return a flat vector; token models nest one level.
        let flat = match value {
            Value::Array(outer) if outer.first().map_or(false, Value::is_array) => {
                outer.into_iter().next().unwrap_or(Value::Null)
            }
            other => other,
        };
        serde_json::from_value(flat).context("Unexpected embedding payload")
    }
}
