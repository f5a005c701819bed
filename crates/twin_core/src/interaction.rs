//! Interaction and learning logs that feed personality evolution.

use crate::context::ContextMap;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InteractionOutcome {
    Positive,
    Neutral,
    Negative,
}

/// Mood/activity/energy of the twin at the moment an interaction arrived.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MoodSnapshot {
    pub mood: String,
    pub activity: String,
    pub energy_level: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InteractionRecord {
    pub interaction_id: String,
    pub timestamp: DateTime<Utc>,
    pub interaction_type: String,
    pub data: ContextMap,
    pub twin_state: MoodSnapshot,
    /// Filled in after dispatch, when the handler can judge the exchange.
    pub outcome: Option<InteractionOutcome>,
}

impl InteractionRecord {
    pub fn is_positive(&self) -> bool {
        self.outcome == Some(InteractionOutcome::Positive)
    }
}

/// Something the twin picked up: an informative message, a finished study
/// session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LearningEvent {
    pub timestamp: DateTime<Utc>,
    pub topic: String,
    pub source: String,
}

impl LearningEvent {
    pub fn new(topic: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            topic: topic.into(),
            source: source.into(),
        }
    }
}
