use crate::event::{BehaviorEvent, BehaviorOutcome};
use chrono::{DateTime, Utc};
use serde::Serialize;
use twin_core::{BehaviorCategory, BehaviorPattern};

const RECENT_EVENTS: usize = 5;
const TOP_PATTERNS: usize = 3;

#[derive(Debug, Clone, Serialize)]
pub struct RecentActivity {
    #[serde(rename = "type")]
    pub event_type: BehaviorCategory,
    pub outcome: BehaviorOutcome,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BehaviorSummary {
    pub total_events: usize,
    pub pattern_count: usize,
    pub decision_count: usize,
    pub pattern_types: Vec<String>,
    pub average_confidence: f32,
    pub most_frequent_pattern: Option<String>,
    pub recent_activity: Vec<RecentActivity>,
    pub top_patterns: Vec<BehaviorPattern>,
}

impl BehaviorSummary {
    pub fn build(
        patterns: &[BehaviorPattern],
        history: &[BehaviorEvent],
        decision_count: usize,
    ) -> Self {
        let mut pattern_types: Vec<String> =
            patterns.iter().map(|p| p.pattern_type.clone()).collect();
        pattern_types.sort();
        pattern_types.dedup();

        let average_confidence = if patterns.is_empty() {
            0.0
        } else {
            patterns.iter().map(|p| p.confidence).sum::<f32>() / patterns.len() as f32
        };

        let mut by_frequency: Vec<&BehaviorPattern> = patterns.iter().collect();
        by_frequency.sort_by(|a, b| b.frequency.total_cmp(&a.frequency));

        Self {
            total_events: history.len(),
            pattern_count: patterns.len(),
            decision_count,
            pattern_types,
            average_confidence,
            most_frequent_pattern: by_frequency.first().map(|p| p.pattern_type.clone()),
            recent_activity: history
                .iter()
                .rev()
                .take(RECENT_EVENTS)
                .rev()
                .map(|e| RecentActivity {
                    event_type: e.event_type,
                    outcome: e.outcome,
                    timestamp: e.timestamp,
                })
                .collect(),
            top_patterns: by_frequency.into_iter().take(TOP_PATTERNS).cloned().collect(),
        }
    }
}
