//! Trait and metric generators.
//!
//! Bounded uniform sampling parameterized by coarse demographics. These are
//! plain value constructors: they never fail and touch nothing but the RNG
//! they are handed, so callers can seed them for reproducible output.

use crate::behavior::BehaviorPattern;
use crate::context::ContextMap;
use crate::health::{HealthMetrics, Metric};
use crate::personality::{PersonalityTraits, Trait};
use crate::profile::AgeGroup;
use rand::seq::SliceRandom;
use rand::Rng;
use serde_json::Value;

// ============================================================================
// Lookup tables
// ============================================================================

/// Occupations with a fixed trait signature. A listed trait replaces the
/// sampled value outright.
pub const OCCUPATION_TRAITS: &[(&str, &[(Trait, f32)])] = &[
    ("student", &[(Trait::Openness, 0.8), (Trait::Conscientiousness, 0.6)]),
    ("engineer", &[(Trait::Openness, 0.7), (Trait::Conscientiousness, 0.9)]),
    ("artist", &[(Trait::Openness, 0.9), (Trait::Creativity, 0.9)]),
    ("manager", &[(Trait::Extraversion, 0.8), (Trait::Confidence, 0.8)]),
];

pub const INTERESTS: &[&str] = &[
    "technology", "sports", "music", "reading", "travel", "cooking", "art", "gaming",
    "fitness", "photography", "writing", "dancing", "hiking", "swimming", "painting",
    "programming", "design", "science",
];

const OCCUPATION_SKILLS: &[(&str, &[&str])] = &[
    ("student", &["research", "writing", "critical_thinking", "time_management"]),
    ("engineer", &["programming", "problem_solving", "mathematics", "design"]),
    ("artist", &["creativity", "visual_design", "color_theory", "composition"]),
    ("manager", &["leadership", "communication", "planning", "decision_making"]),
];

const GENERIC_SKILLS: &[&str] = &["communication", "problem_solving"];
const ADDITIONAL_SKILLS: &[&str] = &["adaptability", "teamwork", "learning", "organization"];

pub const PATTERN_TYPES: &[&str] = &[
    "social_interaction",
    "work_habits",
    "leisure_activities",
    "health_behaviors",
    "learning_patterns",
    "emotional_responses",
];

const TRIGGER_CATEGORIES: &[(&str, &[&str])] = &[
    ("time_based", &["morning", "afternoon", "evening", "weekend"]),
    ("social_cues", &["friend_contact", "work_meeting", "family_gathering"]),
    ("environmental", &["weather_change", "noise_level", "crowded_space"]),
    ("emotional", &["stress", "happiness", "sadness", "excitement"]),
    ("task_completion", &["work_done", "goal_achieved", "deadline_met"]),
    ("health_status", &["low_energy", "good_health", "illness"]),
];

const PATTERN_RESPONSES: &[(&str, &[&str])] = &[
    ("social_interaction", &["initiate_conversation", "withdraw", "observe", "participate"]),
    ("work_habits", &["focus_intensely", "take_breaks", "collaborate", "work_independently"]),
    ("leisure_activities", &["exercise", "read", "socialize", "relax"]),
    ("health_behaviors", &["eat_healthy", "exercise", "meditate", "sleep_well"]),
    ("learning_patterns", &["research", "practice", "ask_questions", "experiment"]),
    ("emotional_responses", &["express_feelings", "suppress_emotions", "seek_support", "self_reflect"]),
];

/// Sampling range for each trait.
pub fn trait_range(t: Trait) -> (f32, f32) {
    match t {
        Trait::Neuroticism => (0.1, 0.7),
        Trait::EmotionalStability | Trait::Adaptability | Trait::Empathy => (0.4, 0.9),
        _ => (0.3, 0.9),
    }
}

/// Sampling range for each metric in a fresh baseline.
pub fn metric_range(m: Metric) -> (f32, f32) {
    match m {
        Metric::HeartRate => (60.0, 100.0),
        Metric::BloodPressureSystolic => (90.0, 140.0),
        Metric::BloodPressureDiastolic => (60.0, 90.0),
        Metric::Temperature => (97.0, 99.0),
        Metric::OxygenSaturation => (95.0, 100.0),
        Metric::RespiratoryRate => (12.0, 20.0),
        Metric::StressLevel => (0.1, 0.8),
        Metric::EnergyLevel => (0.4, 0.9),
        Metric::SleepQuality => (0.3, 0.9),
    }
}

pub fn occupation_adjustments(occupation: &str) -> &'static [(Trait, f32)] {
    OCCUPATION_TRAITS
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case(occupation))
        .map(|(_, adj)| *adj)
        .unwrap_or(&[])
}

/// Typical `(energy, stress)` levels for an age bucket.
pub fn age_health_factors(age_group: AgeGroup) -> (f32, f32) {
    match age_group {
        AgeGroup::Teen => (0.9, 0.4),
        AgeGroup::YoungAdult => (0.8, 0.5),
        AgeGroup::Adult => (0.7, 0.6),
        AgeGroup::Senior => (0.6, 0.3),
    }
}

// ============================================================================
// Generators
// ============================================================================

/// Sample every trait from its range, then pin the occupation's signature
/// traits. The age bucket does not shift trait ranges.
pub fn generate_personality_traits<R: Rng + ?Sized>(
    age_group: AgeGroup,
    occupation: &str,
    rng: &mut R,
) -> PersonalityTraits {
    tracing::trace!(age_group = age_group.as_str(), occupation, "sampling personality traits");
    let mut traits = PersonalityTraits::default();
    for t in Trait::ALL {
        let (lo, hi) = trait_range(t);
        traits.set(t, rng.gen_range(lo..hi));
    }
    for (t, value) in occupation_adjustments(occupation) {
        traits.set(*t, *value);
    }
    traits
}

/// Sample a biometric baseline. Women get a slightly higher resting heart
/// rate and seniors a higher systolic pressure; everything is clamped to the
/// physiological ranges afterwards.
pub fn generate_health_metrics<R: Rng + ?Sized>(
    age_group: AgeGroup,
    gender: &str,
    rng: &mut R,
) -> HealthMetrics {
    let mut metrics = HealthMetrics::default();
    for m in Metric::ALL {
        let (lo, hi) = metric_range(m);
        metrics.set(m, rng.gen_range(lo..hi));
    }
    metrics.blood_pressure_systolic = metrics.blood_pressure_systolic.round();
    metrics.blood_pressure_diastolic = metrics.blood_pressure_diastolic.round();

    if gender.eq_ignore_ascii_case("female") {
        let hr = metrics.heart_rate + rng.gen_range(2.0..8.0f32);
        metrics.set(Metric::HeartRate, hr);
    }
    if age_group == AgeGroup::Senior {
        let sys = metrics.blood_pressure_systolic + rng.gen_range(5.0..20.0f32);
        metrics.set(Metric::BloodPressureSystolic, sys.round());
    }
    metrics
}

/// Between three and eight distinct interests.
pub fn generate_interests<R: Rng + ?Sized>(rng: &mut R) -> Vec<String> {
    let n = rng.gen_range(3..=8);
    INTERESTS
        .choose_multiple(rng, n)
        .map(|s| s.to_string())
        .collect()
}

/// Occupation skills plus two general ones.
pub fn generate_skills<R: Rng + ?Sized>(occupation: &str, rng: &mut R) -> Vec<String> {
    let base = OCCUPATION_SKILLS
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case(occupation))
        .map(|(_, skills)| *skills)
        .unwrap_or(GENERIC_SKILLS);
    base.iter()
        .chain(ADDITIONAL_SKILLS.choose_multiple(rng, 2))
        .map(|s| s.to_string())
        .collect()
}

fn pick<'a, R: Rng + ?Sized>(options: &[&'a str], rng: &mut R) -> &'a str {
    options.choose(rng).copied().unwrap_or("general")
}

/// A random situational context for a seeded behavior pattern.
pub fn generate_behavior_context<R: Rng + ?Sized>(rng: &mut R) -> ContextMap {
    let mut ctx = ContextMap::new();
    ctx.insert(
        "environment".into(),
        pick(&["home", "work", "public", "social"], rng).into(),
    );
    ctx.insert(
        "time_of_day".into(),
        pick(&["morning", "afternoon", "evening", "night"], rng).into(),
    );
    ctx.insert(
        "social_setting".into(),
        pick(&["alone", "small_group", "large_group", "one_on_one"], rng).into(),
    );
    ctx.insert(
        "emotional_state".into(),
        pick(&["calm", "excited", "stressed", "happy", "sad"], rng).into(),
    );
    ctx.insert(
        "energy_level".into(),
        Value::from(rng.gen_range(0.3..0.9f64)),
    );
    ctx
}

/// A synthetic pattern descriptor with random type, triggers and responses.
pub fn generate_behavior_pattern<R: Rng + ?Sized>(
    pattern_id: impl Into<String>,
    rng: &mut R,
) -> BehaviorPattern {
    let pattern_type = pick(PATTERN_TYPES, rng);
    let triggers: &[&str] = TRIGGER_CATEGORIES
        .choose(rng)
        .map(|(_, t)| *t)
        .unwrap_or(&["general"]);
    let responses: &[&str] = PATTERN_RESPONSES
        .iter()
        .find(|(ty, _)| *ty == pattern_type)
        .map(|(_, r)| *r)
        .unwrap_or(&["adapt", "respond", "react"]);

    let mut pattern = BehaviorPattern::new(
        pattern_id,
        pattern_type,
        format!("Synthetic {pattern_type} pattern"),
    );
    pattern.frequency = rng.gen_range(0.1..1.0f32);
    pattern.confidence = rng.gen_range(0.6..0.95f32);
    pattern.triggers = triggers
        .choose_multiple(rng, triggers.len().min(3))
        .map(|s| s.to_string())
        .collect();
    pattern.responses = responses
        .choose_multiple(rng, responses.len().min(2))
        .map(|s| s.to_string())
        .collect();
    pattern.context = generate_behavior_context(rng);
    pattern
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_traits_within_sampling_ranges() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..200 {
            let traits = generate_personality_traits(AgeGroup::Adult, "unknown", &mut rng);
            for (t, v) in traits.iter() {
                let (lo, hi) = trait_range(t);
                assert!(v >= lo && v <= hi, "{t} = {v} outside [{lo}, {hi}]");
            }
        }
    }

    #[test]
    fn test_occupation_overrides() {
        let mut rng = StdRng::seed_from_u64(1);
        let engineer = generate_personality_traits(AgeGroup::YoungAdult, "engineer", &mut rng);
        assert!((engineer.conscientiousness - 0.9).abs() < 1e-6);
        assert!((engineer.openness - 0.7).abs() < 1e-6);

        let artist = generate_personality_traits(AgeGroup::Senior, "Artist", &mut rng);
        assert!((artist.creativity - 0.9).abs() < 1e-6);
    }

    #[test]
    fn test_health_metrics_in_range() {
        let mut rng = StdRng::seed_from_u64(3);
        for group in [AgeGroup::Teen, AgeGroup::YoungAdult, AgeGroup::Adult, AgeGroup::Senior] {
            for gender in ["female", "male", "unspecified"] {
                let m = generate_health_metrics(group, gender, &mut rng);
                assert!(m.within_ranges());
                assert!(m.heart_rate >= 60.0 && m.heart_rate <= 108.0);
                assert_eq!(m.blood_pressure_diastolic, m.blood_pressure_diastolic.round());
            }
        }
    }

    #[test]
    fn test_interests_distinct() {
        let mut rng = StdRng::seed_from_u64(11);
        let interests = generate_interests(&mut rng);
        assert!((3..=8).contains(&interests.len()));
        let mut dedup = interests.clone();
        dedup.sort();
        dedup.dedup();
        assert_eq!(dedup.len(), interests.len());
    }

    #[test]
    fn test_skills() {
        let mut rng = StdRng::seed_from_u64(5);
        let skills = generate_skills("manager", &mut rng);
        assert_eq!(skills.len(), 6);
        assert_eq!(skills[0], "leadership");
        let generic = generate_skills("pilot", &mut rng);
        assert_eq!(generic[0], "communication");
    }

    #[test]
    fn test_behavior_pattern_descriptor() {
        let mut rng = StdRng::seed_from_u64(9);
        let p = generate_behavior_pattern("behavior_1", &mut rng);
        assert!(PATTERN_TYPES.contains(&p.pattern_type.as_str()));
        assert!(!p.triggers.is_empty() && p.triggers.len() <= 3);
        assert_eq!(p.responses.len(), 2);
        assert!(p.confidence >= 0.6 && p.confidence < 0.95);
        assert!(p.context.contains_key("environment"));
    }

    #[test]
    fn test_age_health_factors() {
        assert_eq!(age_health_factors(AgeGroup::Teen), (0.9, 0.4));
        assert_eq!(age_health_factors(AgeGroup::Senior), (0.6, 0.3));
    }
}
