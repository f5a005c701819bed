//! Pattern reinforcement, seeding and prediction.

use crate::event::BehaviorEvent;
use chrono::Utc;
use rand::Rng;
use serde::Serialize;
use serde_json::{json, Value};
use twin_core::context::to_context;
use twin_core::{BehaviorPattern, ContextExt, ContextMap, PersonalityTraits};

/// An event must score strictly above this to count as the same pattern.
pub const MATCH_THRESHOLD: f32 = 0.3;

const NUMERIC_TOLERANCE: f64 = 0.2;
const NUMERIC_CREDIT: f64 = 0.2;
const CATEGORICAL_CREDIT: f64 = 0.3;

/// Similarity of an event context to a pattern context. Only keys present
/// in both count: numbers within tolerance earn partial credit, equal
/// non-numeric values earn more.
pub fn context_similarity(event: &ContextMap, pattern: &ContextMap) -> f32 {
    let score: f64 = event
        .iter()
        .filter_map(|(key, a)| pattern.get(key).map(|b| (a, b)))
        .map(|(a, b)| match (a.as_f64(), b.as_f64()) {
            (Some(x), Some(y)) if (x - y).abs() < NUMERIC_TOLERANCE => NUMERIC_CREDIT,
            (Some(_), Some(_)) => 0.0,
            _ if a == b => CATEGORICAL_CREDIT,
            _ => 0.0,
        })
        .sum();
    score as f32
}

pub fn matches_pattern(event: &BehaviorEvent, pattern: &BehaviorPattern) -> bool {
    pattern.pattern_type == event.event_type.as_str()
        && context_similarity(&event.context, &pattern.context) > MATCH_THRESHOLD
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reconciliation {
    Reinforced(String),
    Created {
        pattern_id: String,
        evicted: Option<String>,
    },
}

/// Fold an event into the pattern set: reinforce the first matching pattern,
/// otherwise add a new low-confidence one. When the set exceeds `max_patterns`
/// the weakest older pattern (lowest confidence, then least recently
/// observed) is dropped; the pattern just added is never the one evicted.
pub fn reconcile(
    patterns: &mut Vec<BehaviorPattern>,
    event: &BehaviorEvent,
    max_patterns: usize,
    seq: u64,
) -> Reconciliation {
    if let Some(pattern) = patterns.iter_mut().find(|p| matches_pattern(event, p)) {
        pattern.frequency = (pattern.frequency + 0.1).min(1.0);
        pattern.confidence = (pattern.confidence + 0.05).min(1.0);
        pattern.last_observed = event.timestamp;
        return Reconciliation::Reinforced(pattern.pattern_id.clone());
    }

    let pattern_id = format!("pattern_{}_{}", seq, Utc::now().format("%Y%m%d_%H%M%S"));
    let mut pattern = BehaviorPattern::new(
        pattern_id.clone(),
        event.event_type.as_str(),
        format!("Observed {} pattern", event.event_type),
    );
    pattern.triggers = vec![event
        .context
        .str_field("trigger")
        .unwrap_or("unknown")
        .to_string()];
    pattern.responses = vec![event.outcome.as_str().to_string()];
    pattern.last_observed = event.timestamp;
    pattern.context = event.context.clone();
    patterns.push(pattern);

    let evicted = if patterns.len() > max_patterns.max(1) {
        evict_weakest(patterns)
    } else {
        None
    };
    Reconciliation::Created {
        pattern_id,
        evicted,
    }
}

fn evict_weakest(patterns: &mut Vec<BehaviorPattern>) -> Option<String> {
    let candidates = patterns.len().checked_sub(1)?;
    let idx = patterns[..candidates]
        .iter()
        .enumerate()
        .min_by(|(_, a), (_, b)| {
            a.confidence
                .total_cmp(&b.confidence)
                .then(a.last_observed.cmp(&b.last_observed))
        })
        .map(|(i, _)| i)?;
    let removed = patterns.remove(idx);
    tracing::debug!(pattern_id = %removed.pattern_id, "evicted behavior pattern");
    Some(removed.pattern_id)
}

// ============================================================================
// Seeding
// ============================================================================

#[allow(clippy::too_many_arguments)]
fn seeded(
    id: String,
    pattern_type: &str,
    description: String,
    frequency: f32,
    confidence: f32,
    triggers: &[&str],
    responses: &[&str],
    context: Value,
) -> BehaviorPattern {
    let mut p = BehaviorPattern::new(id, pattern_type, description);
    p.frequency = frequency;
    p.confidence = confidence;
    p.triggers = triggers.iter().map(|s| s.to_string()).collect();
    p.responses = responses.iter().map(|s| s.to_string()).collect();
    p.context = to_context(context);
    p
}

/// Starting patterns derived from personality and the first three interests.
/// A twin with nothing distinctive still gets one adaptive pattern.
pub fn seed_patterns<R: Rng + ?Sized>(
    traits: &PersonalityTraits,
    interests: &[String],
    rng: &mut R,
) -> Vec<BehaviorPattern> {
    let mut patterns = Vec::new();

    if traits.extraversion > 0.7 {
        patterns.push(seeded(
            "seed_social".into(),
            "social_interaction",
            "High engagement in social activities".into(),
            rng.gen_range(0.7..=0.9f32),
            rng.gen_range(0.8..=0.95f32),
            &["social_gathering", "friend_contact", "work_meeting"],
            &["initiate_conversation", "actively_participate", "organize_events"],
            json!({"setting": "social", "energy_level": "high"}),
        ));
    }

    if traits.conscientiousness > 0.7 {
        patterns.push(seeded(
            "seed_work".into(),
            "work_habits",
            "Systematic and organized work approach".into(),
            rng.gen_range(0.8..=0.95f32),
            rng.gen_range(0.8..=0.95f32),
            &["work_deadline", "project_start", "task_assignment"],
            &["plan_ahead", "create_schedule", "follow_procedures"],
            json!({"setting": "work", "stress_level": "low"}),
        ));
    }

    for interest in interests.iter().take(3) {
        let opportunity = format!("{interest}_opportunity");
        patterns.push(seeded(
            format!("seed_interest_{interest}"),
            "leisure_activity",
            format!("Engagement in {interest} activities"),
            rng.gen_range(0.5..=0.8f32),
            rng.gen_range(0.7..=0.9f32),
            &[opportunity.as_str(), "free_time", "mood_boost"],
            &["seek_opportunities", "dedicate_time", "share_experiences"],
            json!({"setting": "leisure", "interest": interest}),
        ));
    }

    if patterns.is_empty() {
        patterns.push(seeded(
            "seed_adaptive".into(),
            "adaptive_behavior",
            "General adaptive behavior pattern".into(),
            rng.gen_range(0.4..=0.6f32),
            rng.gen_range(0.6..=0.8f32),
            &["environmental_change", "new_situation", "stress"],
            &["observe", "adapt", "learn"],
            json!({"setting": "general", "adaptability": "moderate"}),
        ));
    }
    patterns
}

// ============================================================================
// Prediction
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BehaviorPrediction {
    pub situation: String,
    pub likely_response: String,
    pub confidence: f32,
    pub alternative_responses: Vec<String>,
}

/// Likely reaction to a named situation. Only `social_gathering`,
/// `work_challenge` and `new_experience` are known.
pub fn predict_behavior(traits: &PersonalityTraits, situation: &str) -> Option<BehaviorPrediction> {
    let (likely, confidence, alternatives): (&str, f32, [&str; 2]) = match situation {
        "social_gathering" if traits.extraversion > 0.7 => {
            ("actively_engage", 0.8, ["observe_first", "selective_interaction"])
        }
        "social_gathering" => (
            "observe_first",
            0.7,
            ["selective_interaction", "minimal_participation"],
        ),
        "work_challenge" if traits.conscientiousness > 0.7 => {
            ("systematic_approach", 0.8, ["research_first", "collaborate"])
        }
        "work_challenge" => ("adaptive_approach", 0.6, ["collaborate", "trial_and_error"]),
        "new_experience" if traits.openness > 0.7 => (
            "embrace_opportunity",
            0.8,
            ["cautious_exploration", "research_first"],
        ),
        "new_experience" => (
            "cautious_exploration",
            0.7,
            ["research_first", "avoid_if_possible"],
        ),
        _ => return None,
    };
    Some(BehaviorPrediction {
        situation: situation.to_string(),
        likely_response: likely.to_string(),
        confidence,
        alternative_responses: alternatives.iter().map(|s| s.to_string()).collect(),
    })
}
