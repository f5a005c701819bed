//! Per-twin conversation state and the reply pipeline.
//!
//! Replying is split in two: [`ConversationEngine::analyze`] labels the
//! message (awaiting the optional classifier) and
//! [`ConversationEngine::respond`] does everything else synchronously. Callers
//! holding the twin behind a lock can analyze first and lock only for
//! `respond`, so a slow classifier never blocks other work on the twin.

use crate::classifier::{analyze_with, TextClassifier};
use crate::classify::MessageAnalysis;
use crate::respond::{contextual_fallback, personalize};
use crate::templates::{current_hour, default_templates, find_template, ResponseTemplate};
use chrono::{DateTime, Utc};
use rand::seq::SliceRandom;
use rand::Rng;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use twin_core::{
    push_bounded, ContextExt, ContextMap, ConversationContext, ConversationMessage, Intent,
    MessageType, PersonalityTraits, Sentiment,
};

/// Tracked conversations kept unless the caller sets another cap.
pub const DEFAULT_MAX_CONTEXTS: usize = 100;

/// Participant name the twin uses in conversation contexts.
pub const TWIN_PARTICIPANT: &str = "digital_twin";
/// Conversation energy when nothing better is known.
pub const DEFAULT_ENERGY: f32 = 0.7;
/// Confidence reported for fallback replies.
pub const FALLBACK_CONFIDENCE: f32 = 0.7;

#[derive(Debug, Clone, Serialize)]
pub struct ConversationReply {
    pub response: String,
    pub confidence: f32,
    pub message_type: MessageType,
    pub sentiment: Sentiment,
    pub intent: Intent,
    pub emotion: String,
    pub conversation_id: String,
    pub template_id: Option<String>,
    #[serde(skip)]
    pub message: ConversationMessage,
}

/// A message as kept in the engine's log.
#[derive(Debug, Clone, Serialize)]
pub struct LoggedMessage {
    pub conversation_id: String,
    #[serde(flatten)]
    pub message: ConversationMessage,
}

#[derive(Debug, Clone, Serialize)]
pub struct ConversationSummary {
    pub conversation_id: String,
    pub participants: Vec<String>,
    pub topic: String,
    pub mood: Sentiment,
    pub start_time: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
    pub message_count: u64,
    pub duration_minutes: i64,
    pub sentiment_distribution: BTreeMap<String, usize>,
    pub intent_distribution: BTreeMap<String, usize>,
}

/// Twin-wide conversation statistics.
#[derive(Debug, Clone, Serialize)]
pub struct ConversationOverview {
    pub total_messages: usize,
    pub active_conversations: usize,
    pub sentiment_distribution: BTreeMap<String, usize>,
    pub intent_distribution: BTreeMap<String, usize>,
    pub conversations: Vec<String>,
}

fn distributions<'a>(
    messages: impl Iterator<Item = &'a ConversationMessage>,
) -> (BTreeMap<String, usize>, BTreeMap<String, usize>) {
    let mut sentiments = BTreeMap::new();
    let mut intents = BTreeMap::new();
    for m in messages {
        *sentiments.entry(m.sentiment.as_str().to_string()).or_insert(0) += 1;
        *intents.entry(m.intent.as_str().to_string()).or_insert(0) += 1;
    }
    (sentiments, intents)
}

pub struct ConversationEngine {
    classifier: Option<Arc<dyn TextClassifier>>,
    templates: Vec<ResponseTemplate>,
    contexts: HashMap<String, ConversationContext>,
    history: Vec<LoggedMessage>,
    max_history: usize,
    max_contexts: usize,
    processed: u64,
}

impl std::fmt::Debug for ConversationEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConversationEngine")
            .field("classifier", &self.classifier.as_ref().map(|c| c.name().to_string()))
            .field("contexts", &self.contexts.len())
            .field("history", &self.history.len())
            .field("processed", &self.processed)
            .finish()
    }
}

impl ConversationEngine {
    pub fn new(classifier: Option<Arc<dyn TextClassifier>>, max_history: usize) -> Self {
        Self {
            classifier,
            templates: default_templates(),
            contexts: HashMap::new(),
            history: Vec::new(),
            max_history,
            max_contexts: DEFAULT_MAX_CONTEXTS,
            processed: 0,
        }
    }

    /// Cap on tracked conversations. Past it, starting a new conversation
    /// drops the one idle the longest.
    pub fn with_max_contexts(mut self, max_contexts: usize) -> Self {
        self.max_contexts = max_contexts.max(1);
        self
    }

    pub fn classifier(&self) -> Option<Arc<dyn TextClassifier>> {
        self.classifier.clone()
    }

    pub fn templates(&self) -> &[ResponseTemplate] {
        &self.templates
    }

    pub fn context(&self, conversation_id: &str) -> Option<&ConversationContext> {
        self.contexts.get(conversation_id)
    }

    pub fn history(&self) -> &[LoggedMessage] {
        &self.history
    }

    /// Label a message, consulting the classifier when one was configured.
    pub async fn analyze(&self, message: &str, context: &ContextMap) -> MessageAnalysis {
        analyze_message(self.classifier.as_deref(), message, context).await
    }

    /// Full pipeline for callers that own the engine outright.
    pub async fn generate_response(
        &mut self,
        message: &str,
        sender: &str,
        conversation_id: &str,
        context: &ContextMap,
        traits: &PersonalityTraits,
    ) -> ConversationReply {
        let analysis = self.analyze(message, context).await;
        let mut rng = rand::thread_rng();
        self.respond(
            message,
            sender,
            conversation_id,
            context,
            analysis,
            traits,
            current_hour(),
            &mut rng,
        )
    }

    /// Same pipeline with rule-based labels only.
    pub fn generate_response_rule_based(
        &mut self,
        message: &str,
        sender: &str,
        conversation_id: &str,
        context: &ContextMap,
        traits: &PersonalityTraits,
    ) -> ConversationReply {
        let analysis = MessageAnalysis::rule_based(message, context);
        let mut rng = rand::thread_rng();
        self.respond(
            message,
            sender,
            conversation_id,
            context,
            analysis,
            traits,
            current_hour(),
            &mut rng,
        )
    }

    /// Record the message, update its conversation, pick and style a reply.
    #[allow(clippy::too_many_arguments)]
    pub fn respond<R: Rng + ?Sized>(
        &mut self,
        content: &str,
        sender: &str,
        conversation_id: &str,
        context: &ContextMap,
        analysis: MessageAnalysis,
        traits: &PersonalityTraits,
        hour: u32,
        rng: &mut R,
    ) -> ConversationReply {
        self.processed += 1;
        let now = Utc::now();
        let message = ConversationMessage {
            message_id: format!("msg_{}_{}", self.processed, now.format("%Y%m%d_%H%M%S")),
            sender: sender.to_string(),
            content: content.to_string(),
            message_type: analysis.message_type,
            timestamp: now,
            context: context.clone(),
            sentiment: analysis.sentiment,
            intent: analysis.intent,
        };

        self.track(conversation_id, &message, &analysis.topic, context);

        let (response, confidence, template_id) = {
            let conv = self
                .contexts
                .get(conversation_id)
                .cloned()
                .unwrap_or_else(|| new_context(conversation_id, &message, &analysis.topic, context));
            match find_template(&self.templates, &conv, analysis.sentiment, traits, hour) {
                Some(t) => {
                    let pattern = t.response_patterns.choose(rng).copied().unwrap_or_default();
                    tracing::debug!("Using response template {}", t.template_id);
                    (pattern, t.confidence, Some(t.template_id.to_string()))
                }
                None => {
                    tracing::debug!("No template cleared the threshold, using fallback");
                    (contextual_fallback(&analysis, traits), FALLBACK_CONFIDENCE, None)
                }
            }
        };

        if let Some(conv) = self.contexts.get_mut(conversation_id) {
            conv.last_activity = Utc::now();
            conv.message_count += 1;
            if !conv.participants.iter().any(|p| p == TWIN_PARTICIPANT) {
                conv.participants.push(TWIN_PARTICIPANT.to_string());
            }
        }

        push_bounded(
            &mut self.history,
            LoggedMessage {
                conversation_id: conversation_id.to_string(),
                message: message.clone(),
            },
            self.max_history,
        );

        ConversationReply {
            response: personalize(response, traits),
            confidence,
            message_type: analysis.message_type,
            sentiment: analysis.sentiment,
            intent: analysis.intent,
            emotion: analysis.emotion,
            conversation_id: conversation_id.to_string(),
            template_id,
            message,
        }
    }

    /// Create the context on first sight, otherwise bump its counters. Mood
    /// follows any non-neutral sentiment; topic follows any specific topic.
    fn track(
        &mut self,
        conversation_id: &str,
        message: &ConversationMessage,
        topic: &str,
        context: &ContextMap,
    ) {
        match self.contexts.get_mut(conversation_id) {
            None => {
                if self.contexts.len() >= self.max_contexts {
                    self.evict_idlest();
                }
                let conv = new_context(conversation_id, message, topic, context);
                tracing::debug!("Started conversation {}", conversation_id);
                self.contexts.insert(conversation_id.to_string(), conv);
            }
            Some(conv) => {
                conv.last_activity = message.timestamp;
                conv.message_count += 1;
                if message.sentiment != Sentiment::Neutral {
                    conv.mood = message.sentiment;
                }
                if topic != "general" {
                    conv.topic = topic.to_string();
                }
                if let Some(energy) = twin_energy(context) {
                    conv.energy_level = energy;
                }
                if !conv.participants.iter().any(|p| p == &message.sender) {
                    conv.participants.push(message.sender.clone());
                }
            }
        }
    }

    fn evict_idlest(&mut self) {
        let idlest = self
            .contexts
            .values()
            .min_by_key(|c| c.last_activity)
            .map(|c| c.conversation_id.clone());
        if let Some(id) = idlest {
            self.contexts.remove(&id);
            tracing::debug!("Dropped idle conversation {}", id);
        }
    }

    pub fn conversation_summary(&self, conversation_id: &str) -> Option<ConversationSummary> {
        let conv = self.contexts.get(conversation_id)?;
        let (sentiment_distribution, intent_distribution) = distributions(
            self.history
                .iter()
                .filter(|m| m.conversation_id == conversation_id)
                .map(|m| &m.message),
        );
        Some(ConversationSummary {
            conversation_id: conv.conversation_id.clone(),
            participants: conv.participants.clone(),
            topic: conv.topic.clone(),
            mood: conv.mood,
            start_time: conv.start_time,
            last_activity: conv.last_activity,
            message_count: conv.message_count,
            duration_minutes: (conv.last_activity - conv.start_time).num_minutes(),
            sentiment_distribution,
            intent_distribution,
        })
    }

    pub fn overview(&self) -> ConversationOverview {
        let (sentiment_distribution, intent_distribution) =
            distributions(self.history.iter().map(|m| &m.message));
        let mut conversations: Vec<String> = self.contexts.keys().cloned().collect();
        conversations.sort();
        ConversationOverview {
            total_messages: self.history.len(),
            active_conversations: self.contexts.len(),
            sentiment_distribution,
            intent_distribution,
            conversations,
        }
    }
}

/// Classifier path when available, rules otherwise.
pub async fn analyze_message(
    classifier: Option<&dyn TextClassifier>,
    message: &str,
    context: &ContextMap,
) -> MessageAnalysis {
    match classifier {
        Some(c) => analyze_with(c, message, context).await,
        None => MessageAnalysis::rule_based(message, context),
    }
}

/// The twin's own energy, when the caller passed its state along.
fn twin_energy(context: &ContextMap) -> Option<f32> {
    context
        .map_field("twin_state")
        .and_then(|s| s.f32_field("energy_level"))
        .map(|e| e.clamp(0.0, 1.0))
}

fn new_context(
    conversation_id: &str,
    message: &ConversationMessage,
    topic: &str,
    context: &ContextMap,
) -> ConversationContext {
    ConversationContext {
        conversation_id: conversation_id.to_string(),
        participants: vec![message.sender.clone()],
        topic: topic.to_string(),
        mood: message.sentiment,
        energy_level: twin_energy(context).unwrap_or(DEFAULT_ENERGY),
        conversation_style: "casual".to_string(),
        start_time: message.timestamp,
        last_activity: message.timestamp,
        message_count: 1,
    }
}
