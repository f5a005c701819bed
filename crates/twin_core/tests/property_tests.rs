//! Property-based tests for twin_core.
//!
//! Clamping must hold for every mutation path, not just the hand-picked
//! values exercised by the unit tests.

use chrono::{Duration, Utc};
use proptest::prelude::*;
use rand::rngs::StdRng;
use rand::SeedableRng;
use twin_core::evolution::{evolve_traits, EvolutionParams};
use twin_core::generators::{generate_health_metrics, generate_personality_traits};
use twin_core::{
    AgeGroup, ContextMap, HealthMetrics, InteractionOutcome, InteractionRecord, LearningEvent,
    Metric, MoodSnapshot, PersonalityTraits, Trait,
};

// ============================================================================
// Strategies
// ============================================================================

/// Arbitrary trait vector, including out-of-range and non-finite values.
fn arb_raw_traits() -> impl Strategy<Value = PersonalityTraits> {
    proptest::collection::vec(prop_oneof![-2.0f32..3.0, Just(f32::NAN), Just(f32::INFINITY)], 10)
        .prop_map(|vals| {
            let mut t = PersonalityTraits::default();
            t.openness = vals[0];
            t.conscientiousness = vals[1];
            t.extraversion = vals[2];
            t.agreeableness = vals[3];
            t.neuroticism = vals[4];
            t.emotional_stability = vals[5];
            t.creativity = vals[6];
            t.adaptability = vals[7];
            t.confidence = vals[8];
            t.empathy = vals[9];
            t
        })
}

fn arb_outcome() -> impl Strategy<Value = Option<InteractionOutcome>> {
    prop_oneof![
        Just(None),
        Just(Some(InteractionOutcome::Positive)),
        Just(Some(InteractionOutcome::Neutral)),
        Just(Some(InteractionOutcome::Negative)),
    ]
}

fn record(outcome: Option<InteractionOutcome>) -> InteractionRecord {
    InteractionRecord {
        interaction_id: "i".into(),
        timestamp: Utc::now(),
        interaction_type: "conversation".into(),
        data: ContextMap::new(),
        twin_state: MoodSnapshot {
            mood: "neutral".into(),
            activity: "idle".into(),
            energy_level: 0.5,
        },
        outcome,
    }
}

fn arb_age_group() -> impl Strategy<Value = AgeGroup> {
    (0u32..100).prop_map(AgeGroup::from_age)
}

// ============================================================================
// Properties
// ============================================================================

proptest! {
    #[test]
    fn normalize_always_yields_unit_traits(mut traits in arb_raw_traits()) {
        traits.normalize();
        for (_, v) in traits.iter() {
            prop_assert!((0.0..=1.0).contains(&v));
        }
    }

    #[test]
    fn evolution_sequences_stay_clamped(
        start in arb_raw_traits(),
        outcomes in proptest::collection::vec(arb_outcome(), 0..20),
        learning in 0usize..5,
        days in proptest::collection::vec(0i64..30, 1..10),
        seed in any::<u64>(),
    ) {
        let params = EvolutionParams::default();
        let history: Vec<_> = outcomes.into_iter().map(record).collect();
        let learned: Vec<_> = (0..learning).map(|i| LearningEvent::new(format!("t{i}"), "test")).collect();
        let mut rng = StdRng::seed_from_u64(seed);

        let mut traits = start;
        for d in days {
            traits = evolve_traits(&params, &traits, &history, &learned, Duration::days(d), &mut rng);
            for t in Trait::ALL {
                let v = traits.get(t);
                prop_assert!((0.0..=1.0).contains(&v), "{} = {}", t, v);
            }
        }
    }

    #[test]
    fn empty_history_zero_elapsed_is_idempotent(start in arb_raw_traits(), seed in any::<u64>()) {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut expected = start;
        expected.normalize();
        let out = evolve_traits(&EvolutionParams::default(), &start, &[], &[], Duration::zero(), &mut rng);
        prop_assert_eq!(out, expected);
    }

    #[test]
    fn generated_traits_in_unit_range(group in arb_age_group(), occ in "[a-z]{0,10}", seed in any::<u64>()) {
        let mut rng = StdRng::seed_from_u64(seed);
        let traits = generate_personality_traits(group, &occ, &mut rng);
        for (_, v) in traits.iter() {
            prop_assert!((0.0..=1.0).contains(&v));
        }
    }

    #[test]
    fn generated_metrics_in_physiological_range(group in arb_age_group(), seed in any::<u64>()) {
        let mut rng = StdRng::seed_from_u64(seed);
        for gender in ["female", "male", "other"] {
            let m = generate_health_metrics(group, gender, &mut rng);
            prop_assert!(m.within_ranges());
        }
    }

    #[test]
    fn metric_set_clamps(value in prop_oneof![-1000.0f32..1000.0, Just(f32::NAN)]) {
        let mut m = HealthMetrics::default();
        for metric in Metric::ALL {
            m.set(metric, value);
            prop_assert!(metric.range().contains(m.get(metric)));
        }
    }
}
