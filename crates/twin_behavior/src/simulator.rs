use crate::decision::{make_decision, Decision};
use crate::event::{BehaviorEvent, BehaviorOutcome};
use crate::patterns::seed_patterns;
use chrono::Utc;
use rand::distributions::{Distribution, WeightedIndex};
use rand::seq::SliceRandom;
use rand::Rng;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use twin_core::config::OutcomeThresholds;
use twin_core::{
    BehaviorCategory, BehaviorPattern, ContextExt, ContextMap, PersonalityTraits, Trait, TwinError,
};

use BehaviorCategory::*;

// ============================================================================
// Category selection
// ============================================================================

/// Hour-of-day windows for behavior selection. These are wider than the
/// conversational day parts: the working day runs 10-17h.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeBucket {
    Morning,
    WorkHours,
    Evening,
    Night,
}

impl TimeBucket {
    pub fn from_hour(hour: u32) -> Self {
        match hour {
            6..=9 => TimeBucket::Morning,
            10..=17 => TimeBucket::WorkHours,
            18..=21 => TimeBucket::Evening,
            _ => TimeBucket::Night,
        }
    }

    /// Selection weights; each table sums to 1.
    pub fn weights(self) -> &'static [(BehaviorCategory, f32)] {
        match self {
            TimeBucket::Morning => &[(RoutineActivity, 0.7), (WorkActivity, 0.15), (HealthBehavior, 0.15)],
            TimeBucket::WorkHours => &[(WorkActivity, 0.6), (SocialInteraction, 0.12), (LearningActivity, 0.28)],
            TimeBucket::Evening => &[(LeisureActivity, 0.5), (SocialInteraction, 0.2), (HealthBehavior, 0.3)],
            TimeBucket::Night => &[(RoutineActivity, 0.6), (HealthBehavior, 0.12), (LeisureActivity, 0.28)],
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TimeBucket::Morning => "morning",
            TimeBucket::WorkHours => "work_hours",
            TimeBucket::Evening => "evening",
            TimeBucket::Night => "night",
        }
    }
}

pub fn select_category<R: Rng + ?Sized>(hour: u32, rng: &mut R) -> BehaviorCategory {
    let table = TimeBucket::from_hour(hour).weights();
    match WeightedIndex::new(table.iter().map(|(_, w)| *w)) {
        Ok(dist) => table[dist.sample(rng)].0,
        Err(_) => RoutineActivity,
    }
}

// ============================================================================
// Pipeline stages
// ============================================================================

fn choose<R: Rng + ?Sized>(options: &[&'static str], rng: &mut R) -> Value {
    Value::from(options.choose(rng).copied().unwrap_or("general"))
}

/// Attach category-specific detail to a copy of the caller's context.
pub fn enrich_context<R: Rng + ?Sized>(
    category: BehaviorCategory,
    base: &ContextMap,
    rng: &mut R,
) -> ContextMap {
    let mut ctx = base.clone();
    let details: Vec<(&str, Value)> = match category {
        SocialInteraction => vec![
            ("interaction_type", choose(&["conversation", "collaboration", "social_event"], rng)),
            ("participants", json!(rng.gen_range(2..=8))),
            ("setting", choose(&["work", "social", "casual", "formal"], rng)),
            ("topic", choose(&["work", "personal", "hobbies", "current_events"], rng)),
        ],
        WorkActivity => vec![
            ("task_type", choose(&["analysis", "creation", "collaboration", "planning"], rng)),
            ("complexity", choose(&["simple", "moderate", "complex"], rng)),
            ("deadline_pressure", json!(rng.gen_range(0.1..=0.9f64))),
            ("autonomy_level", json!(rng.gen_range(0.3..=1.0f64))),
        ],
        LeisureActivity => vec![
            ("activity_category", choose(&["entertainment", "hobbies", "sports", "relaxation"], rng)),
            ("social_component", json!(rng.gen_bool(0.5))),
            ("energy_level_required", json!(rng.gen_range(0.2..=0.8f64))),
            ("duration_preference", choose(&["short", "medium", "long"], rng)),
        ],
        HealthBehavior => vec![
            ("health_focus", choose(&["exercise", "nutrition", "mental_health", "prevention"], rng)),
            ("intensity", choose(&["light", "moderate", "intense"], rng)),
            ("consistency_level", json!(rng.gen_range(0.3..=1.0f64))),
        ],
        LearningActivity => vec![
            ("subject", choose(&["technology", "science", "language", "history", "art"], rng)),
            ("format", choose(&["reading", "course", "practice", "discussion"], rng)),
        ],
        RoutineActivity | CreativeActivity => Vec::new(),
    };
    for (key, value) in details {
        ctx.insert(key.to_string(), value);
    }
    ctx
}

/// Traits that matter for a category.
pub fn influence_traits(category: BehaviorCategory) -> &'static [Trait] {
    match category {
        SocialInteraction => &[Trait::Extraversion, Trait::Agreeableness, Trait::Empathy],
        WorkActivity => &[Trait::Conscientiousness, Trait::Confidence, Trait::Adaptability],
        LeisureActivity => &[Trait::Openness, Trait::Creativity, Trait::Extraversion],
        HealthBehavior => &[
            Trait::Conscientiousness,
            Trait::EmotionalStability,
            Trait::Adaptability,
        ],
        LearningActivity => &[Trait::Openness, Trait::Conscientiousness, Trait::Adaptability],
        RoutineActivity => &[Trait::Conscientiousness, Trait::EmotionalStability],
        CreativeActivity => &[Trait::Creativity, Trait::Openness, Trait::Confidence],
    }
}

pub fn personality_influence(
    category: BehaviorCategory,
    traits: &PersonalityTraits,
) -> BTreeMap<String, f32> {
    influence_traits(category)
        .iter()
        .map(|t| (t.as_str().to_string(), traits.get(*t).clamp(0.0, 1.0)))
        .collect()
}

/// Chance that the activity goes well.
pub fn success_probability(influence: &BTreeMap<String, f32>, ctx: &ContextMap) -> f32 {
    let avg = if influence.is_empty() {
        0.5
    } else {
        influence.values().sum::<f32>() / influence.len() as f32
    };
    let mut p = 0.6 + (avg - 0.5) * 0.3;
    if ctx.f32_field("stress_level").unwrap_or(0.5) > 0.7 {
        p -= 0.2;
    }
    if ctx.f32_field("energy_level").unwrap_or(0.5) < 0.3 {
        p -= 0.2;
    }
    if ctx.bool_field("supportive_environment").unwrap_or(false) {
        p += 0.1;
    }
    p
}

pub fn determine_outcome<R: Rng + ?Sized>(
    influence: &BTreeMap<String, f32>,
    ctx: &ContextMap,
    thresholds: &OutcomeThresholds,
    rng: &mut R,
) -> BehaviorOutcome {
    let p = success_probability(influence, ctx);
    BehaviorOutcome::classify(rng.gen::<f32>() < p, p, thresholds)
}

/// Energy drained by the activity, capped at 1.
pub fn energy_cost(category: BehaviorCategory, ctx: &ContextMap) -> f32 {
    let mut energy: f32 = match category {
        SocialInteraction => 0.3,
        WorkActivity => 0.4,
        LeisureActivity => 0.2,
        HealthBehavior => 0.5,
        LearningActivity => 0.4,
        RoutineActivity => 0.1,
        CreativeActivity => 0.3,
    };
    match ctx.str_field("intensity") {
        Some("high" | "intense") => energy *= 1.5,
        Some("low" | "light") => energy *= 0.7,
        _ => {}
    }
    let duration = ctx
        .str_field("duration")
        .or_else(|| ctx.str_field("duration_preference"));
    match duration {
        Some("long") => energy *= 1.3,
        Some("short") => energy *= 0.8,
        _ => {}
    }
    if ctx.f32_field("stress_level").unwrap_or(0.5) > 0.7 {
        energy *= 1.2;
    }
    if ctx.f32_field("energy_level").unwrap_or(0.5) < 0.3 {
        energy *= 1.3;
    }
    energy.min(1.0)
}

/// Run the full pipeline once. `seq` numbers the event within the twin's
/// history.
pub fn simulate_event<R: Rng + ?Sized>(
    traits: &PersonalityTraits,
    base: &ContextMap,
    hour: u32,
    thresholds: &OutcomeThresholds,
    seq: usize,
    rng: &mut R,
) -> BehaviorEvent {
    let category = select_category(hour, rng);
    let context = enrich_context(category, base, rng);
    let personality_influence = personality_influence(category, traits);
    let outcome = determine_outcome(&personality_influence, &context, thresholds, rng);
    let energy_consumed = energy_cost(category, &context);
    let now = Utc::now();

    BehaviorEvent {
        event_id: format!("event_{}_{}", seq, now.format("%Y%m%d_%H%M%S")),
        event_type: category,
        timestamp: now,
        context,
        personality_influence,
        outcome,
        duration: rng.gen_range(0.5..=4.0f32),
        energy_consumed,
    }
}

// ============================================================================
// BehaviorModel
// ============================================================================

/// Behavior engine seam used by the twin aggregate.
pub trait BehaviorModel: Send + Sync {
    fn simulate(
        &self,
        traits: &PersonalityTraits,
        context: &ContextMap,
        hour: u32,
        seq: usize,
    ) -> Result<BehaviorEvent, TwinError>;

    fn decide(
        &self,
        traits: &PersonalityTraits,
        context: &ContextMap,
        seq: usize,
    ) -> Result<Decision, TwinError>;

    /// Starting patterns for a new twin.
    fn seed_patterns(&self, traits: &PersonalityTraits, interests: &[String]) -> Vec<BehaviorPattern>;
}

#[derive(Debug, Clone, Default)]
pub struct BehaviorSimulator {
    pub outcome: OutcomeThresholds,
}

impl BehaviorSimulator {
    pub fn new(outcome: OutcomeThresholds) -> Self {
        Self { outcome }
    }
}

impl BehaviorModel for BehaviorSimulator {
    fn simulate(
        &self,
        traits: &PersonalityTraits,
        context: &ContextMap,
        hour: u32,
        seq: usize,
    ) -> Result<BehaviorEvent, TwinError> {
        if let Some(t) = traits.first_non_finite() {
            return Err(TwinError::invalid(t.as_str(), "trait is not finite"));
        }
        let event = simulate_event(
            traits,
            context,
            hour,
            &self.outcome,
            seq,
            &mut rand::thread_rng(),
        );
        if !event.energy_consumed.is_finite() {
            return Err(TwinError::NonFinite {
                field: "energy_consumed",
            });
        }
        tracing::info!(
            "Simulated behavior: {} with outcome: {}",
            event.event_type,
            event.outcome.as_str()
        );
        Ok(event)
    }

    fn decide(
        &self,
        traits: &PersonalityTraits,
        context: &ContextMap,
        seq: usize,
    ) -> Result<Decision, TwinError> {
        let decision = make_decision(traits, context, seq);
        if !decision.confidence.is_finite() {
            return Err(TwinError::NonFinite { field: "confidence" });
        }
        Ok(decision)
    }

    fn seed_patterns(&self, traits: &PersonalityTraits, interests: &[String]) -> Vec<BehaviorPattern> {
        let patterns = seed_patterns(traits, interests, &mut rand::thread_rng());
        tracing::debug!("Generated {} synthetic behavior patterns", patterns.len());
        patterns
    }
}
