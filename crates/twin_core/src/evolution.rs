//! Personality evolution.
//!
//! Traits drift in three ways:
//! - a mostly positive run of recent interactions builds confidence and stability
//! - any recent learning opens the twin up (openness, creativity)
//! - more than a week without an update applies a small symmetric jitter
//!
//! The core function is pure given its inputs and RNG; an empty history with
//! zero elapsed time returns the traits unchanged.

use crate::error::TwinError;
use crate::generators::generate_personality_traits;
use crate::interaction::{InteractionRecord, LearningEvent};
use crate::personality::{PersonalityTraits, Trait};
use crate::profile::TwinProfile;
use rand::seq::SliceRandom;
use rand::Rng;

/// Tunable constants for [`evolve_traits`].
#[derive(Debug, Clone)]
pub struct EvolutionParams {
    /// How many of the latest interactions are judged for positivity.
    pub interaction_window: usize,
    /// How many of the latest learning events count as "recent".
    pub learning_window: usize,
    pub confidence_step: f32,
    pub stability_step: f32,
    pub openness_step: f32,
    pub creativity_step: f32,
    /// Weekly drift kicks in after this many whole days.
    pub drift_after_days: i64,
    pub drift_magnitude: f32,
}

impl Default for EvolutionParams {
    fn default() -> Self {
        Self {
            interaction_window: 5,
            learning_window: 3,
            confidence_step: 0.03,
            stability_step: 0.02,
            openness_step: 0.02,
            creativity_step: 0.02,
            drift_after_days: 7,
            drift_magnitude: 0.01,
        }
    }
}

pub fn evolve_traits<R: Rng + ?Sized>(
    params: &EvolutionParams,
    traits: &PersonalityTraits,
    interactions: &[InteractionRecord],
    learning: &[LearningEvent],
    elapsed: chrono::Duration,
    rng: &mut R,
) -> PersonalityTraits {
    let mut next = *traits;
    next.normalize();

    let recent = &interactions[interactions.len().saturating_sub(params.interaction_window)..];
    if !recent.is_empty() {
        let positive = recent.iter().filter(|i| i.is_positive()).count();
        if positive * 2 > recent.len() {
            next.adjust(Trait::Confidence, params.confidence_step);
            next.adjust(Trait::EmotionalStability, params.stability_step);
        }
    }

    let recent_learning = &learning[learning.len().saturating_sub(params.learning_window)..];
    if !recent_learning.is_empty() {
        next.adjust(Trait::Openness, params.openness_step);
        next.adjust(Trait::Creativity, params.creativity_step);
    }

    if elapsed.num_days() > params.drift_after_days {
        let m = params.drift_magnitude;
        for t in Trait::ALL {
            next.adjust(t, rng.gen_range(-m..=m));
        }
    }

    next
}

/// Situational flags that colour the twin's mood.
#[derive(Debug, Clone, Default)]
pub struct MoodContext {
    pub social_interaction: bool,
    pub stressful: bool,
    pub new_experience: bool,
    /// Local hour of day, 0..24.
    pub hour: u32,
}

/// Pick a mood label from personality and situation.
pub fn determine_mood<R: Rng + ?Sized>(
    traits: &PersonalityTraits,
    ctx: &MoodContext,
    rng: &mut R,
) -> &'static str {
    let mut score: f32 = 0.5;
    if ctx.social_interaction {
        score += traits.extraversion * 0.3;
    }
    if ctx.stressful {
        score -= (1.0 - traits.emotional_stability) * 0.4;
    }
    if ctx.new_experience {
        score += traits.openness * 0.2;
    }
    match ctx.hour {
        6..=10 => score += 0.1,
        22..=23 | 0..=4 => score -= 0.1,
        _ => {}
    }

    let choices: &[&'static str] = if score > 0.7 {
        &["happy", "excited", "focused"]
    } else if score > 0.4 {
        &["calm", "relaxed", "focused"]
    } else if score > 0.2 {
        &["tired", "melancholy", "anxious"]
    } else {
        &["stressed", "irritated", "anxious"]
    };
    choices.choose(rng).copied().unwrap_or("neutral")
}

/// Generates and evolves a twin's personality.
pub trait PersonalityModel: Send + Sync {
    /// Seed traits for a new twin from its demographics.
    fn generate(&self, profile: &TwinProfile) -> Result<PersonalityTraits, TwinError>;

    fn evolve(
        &self,
        traits: &PersonalityTraits,
        interactions: &[InteractionRecord],
        learning: &[LearningEvent],
        elapsed: chrono::Duration,
    ) -> Result<PersonalityTraits, TwinError>;

    fn mood(&self, traits: &PersonalityTraits, ctx: &MoodContext) -> String;
}

/// Rule-based personality model backed by the thread RNG.
#[derive(Debug, Clone, Default)]
pub struct DefaultPersonalityModel {
    pub params: EvolutionParams,
}

impl DefaultPersonalityModel {
    pub fn new(params: EvolutionParams) -> Self {
        Self { params }
    }
}

fn ensure_finite(traits: PersonalityTraits) -> Result<PersonalityTraits, TwinError> {
    match traits.first_non_finite() {
        Some(_) => Err(TwinError::NonFinite { field: "personality" }),
        None => Ok(traits),
    }
}

impl PersonalityModel for DefaultPersonalityModel {
    fn generate(&self, profile: &TwinProfile) -> Result<PersonalityTraits, TwinError> {
        let mut rng = rand::thread_rng();
        ensure_finite(generate_personality_traits(
            profile.age_group(),
            &profile.occupation,
            &mut rng,
        ))
    }

    fn evolve(
        &self,
        traits: &PersonalityTraits,
        interactions: &[InteractionRecord],
        learning: &[LearningEvent],
        elapsed: chrono::Duration,
    ) -> Result<PersonalityTraits, TwinError> {
        let mut rng = rand::thread_rng();
        let next = evolve_traits(&self.params, traits, interactions, learning, elapsed, &mut rng);
        tracing::debug!(
            interactions = interactions.len(),
            learning = learning.len(),
            "evolved personality traits"
        );
        ensure_finite(next)
    }

    fn mood(&self, traits: &PersonalityTraits, ctx: &MoodContext) -> String {
        determine_mood(traits, ctx, &mut rand::thread_rng()).to_string()
    }
}
