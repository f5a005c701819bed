//! Personality-driven choice among situation-specific options.
//!
//! Scoring is deterministic: the same traits and context always pick the same
//! option. Ties go to the option listed first.

use chrono::Utc;
use serde::Serialize;
use twin_core::{ContextExt, ContextMap, PersonalityTraits};

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DecisionFactors {
    /// 1 - emotional_stability.
    pub risk_tolerance: f32,
    pub social_preference: f32,
    pub planning_preference: f32,
    pub adaptability: f32,
    pub confidence: f32,
}

impl DecisionFactors {
    pub fn from_traits(traits: &PersonalityTraits) -> Self {
        Self {
            risk_tolerance: 1.0 - traits.emotional_stability,
            social_preference: traits.extraversion,
            planning_preference: traits.conscientiousness,
            adaptability: traits.adaptability,
            confidence: traits.confidence,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Decision {
    pub decision_id: String,
    pub situation: String,
    pub options: Vec<String>,
    pub personality_factors: DecisionFactors,
    pub context_factors: ContextMap,
    pub chosen_option: String,
    pub confidence: f32,
    pub reasoning: String,
}

impl Decision {
    /// Whether the twin is sure enough to act without hedging.
    pub fn is_firm(&self, threshold: f32) -> bool {
        self.confidence >= threshold
    }
}

pub fn decision_options(situation: &str) -> &'static [&'static str] {
    match situation {
        "work_challenge" => &["tackle_immediately", "plan_approach", "seek_help", "delegate"],
        "social_conflict" => &["confront_directly", "mediate", "avoid", "seek_compromise"],
        "health_decision" => &[
            "immediate_action",
            "research_first",
            "consult_expert",
            "wait_and_observe",
        ],
        "creative_block" => &["push_through", "take_break", "change_approach", "seek_inspiration"],
        _ => &["option_1", "option_2", "option_3"],
    }
}

/// Keyword bonuses: bold options reward risk and confidence, planning options
/// reward conscientiousness, and so on. Options can collect several bonuses.
pub fn score_option(option: &str, f: &DecisionFactors) -> f32 {
    let mut score: f32 = 0.0;
    if option.contains("immediate") || option.contains("directly") {
        score += f.risk_tolerance * 0.3 + f.confidence * 0.2;
    }
    if option.contains("plan") || option.contains("approach") {
        score += f.planning_preference * 0.4;
    }
    if option.contains("help") || option.contains("consult") {
        score += f.social_preference * 0.3;
    }
    if option.contains("break") || option.contains("wait") {
        score += f.adaptability * 0.3;
    }
    score
}

fn select_option(options: &[&'static str], f: &DecisionFactors) -> &'static str {
    let mut best = options.first().copied().unwrap_or("option_1");
    let mut best_score = f32::NEG_INFINITY;
    for &option in options {
        let score = score_option(option, f);
        if score > best_score {
            best = option;
            best_score = score;
        }
    }
    best
}

pub fn decision_confidence(f: &DecisionFactors, ctx: &ContextMap) -> f32 {
    let mut confidence = 0.6 + (f.confidence - 0.5) * 0.3;
    let stress = ctx.f32_field("stress_level").unwrap_or(0.5);
    if stress < 0.3 {
        confidence += 0.1;
    } else if stress > 0.7 {
        confidence -= 0.2;
    }
    let energy = ctx.f32_field("energy_level").unwrap_or(0.5);
    if energy > 0.7 {
        confidence += 0.1;
    } else if energy < 0.3 {
        confidence -= 0.1;
    }
    confidence.clamp(0.1, 1.0)
}

fn reasoning(option: &str) -> String {
    let canned = match option {
        "tackle_immediately" => {
            "High confidence and energy levels suggest immediate action is appropriate."
        }
        "plan_approach" => {
            "Conscientious personality traits favor careful planning and systematic approaches."
        }
        "seek_help" => {
            "Social preferences and current context suggest collaboration would be beneficial."
        }
        "mediate" => {
            "High empathy and agreeableness indicate mediation skills and conflict resolution approach."
        }
        "take_break" => {
            "Current stress levels and adaptability suggest a brief pause would be beneficial."
        }
        "research_first" => {
            "Planning preferences and current energy levels suggest thorough research before action."
        }
        other => {
            return format!(
                "Chosen {other} based on personality factors and current context."
            )
        }
    };
    canned.to_string()
}

/// Choose among the options for `context["situation"]`.
pub fn make_decision(traits: &PersonalityTraits, context: &ContextMap, seq: usize) -> Decision {
    let situation = context.str_field("situation").unwrap_or("general");
    let options = decision_options(situation);
    let factors = DecisionFactors::from_traits(traits);
    let chosen = select_option(options, &factors);
    let confidence = decision_confidence(&factors, context);

    Decision {
        decision_id: format!("decision_{}_{}", seq, Utc::now().format("%Y%m%d_%H%M%S")),
        situation: situation.to_string(),
        options: options.iter().map(|s| s.to_string()).collect(),
        personality_factors: factors,
        context_factors: context.clone(),
        chosen_option: chosen.to_string(),
        confidence,
        reasoning: reasoning(chosen),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use twin_core::context::to_context;

    fn situation(name: &str) -> ContextMap {
        to_context(json!({ "situation": name }))
    }

    #[test]
    fn test_conscientious_twin_plans() {
        let mut traits = PersonalityTraits::default();
        traits.conscientiousness = 0.9;
        traits.extraversion = 0.3;
        let d = make_decision(&traits, &situation("work_challenge"), 1);
        assert_eq!(d.chosen_option, "plan_approach");
        assert_eq!(d.options.len(), 4);
        assert!(d.reasoning.starts_with("Conscientious"));
    }

    #[test]
    fn test_bold_twin_acts_immediately() {
        let mut traits = PersonalityTraits::default();
        traits.emotional_stability = 0.0;
        traits.confidence = 1.0;
        traits.conscientiousness = 0.2;
        let d = make_decision(&traits, &situation("health_decision"), 1);
        // risk 0.3 + confidence 0.2 = 0.5 beats wait_and_observe at 0.24
        assert_eq!(d.chosen_option, "immediate_action");
        assert_eq!(
            d.reasoning,
            "Chosen immediate_action based on personality factors and current context."
        );
    }

    #[test]
    fn test_unknown_situation_ties_to_first_option() {
        let d = make_decision(&PersonalityTraits::default(), &ContextMap::new(), 4);
        assert_eq!(d.situation, "general");
        assert_eq!(d.chosen_option, "option_1");
        assert!(d.decision_id.starts_with("decision_4_"));
    }

    #[test]
    fn test_deterministic() {
        let traits = PersonalityTraits::default();
        let ctx = situation("creative_block");
        let a = make_decision(&traits, &ctx, 1);
        let b = make_decision(&traits, &ctx, 1);
        assert_eq!(a.chosen_option, b.chosen_option);
        assert_eq!(a.confidence, b.confidence);
    }

    #[test]
    fn test_confidence_context_adjustments() {
        let f = DecisionFactors::from_traits(&PersonalityTraits::default());
        // confidence trait 0.7 -> 0.66
        let neutral = decision_confidence(&f, &ContextMap::new());
        assert!((neutral - 0.66).abs() < 1e-5);
        let good = decision_confidence(
            &f,
            &to_context(json!({"stress_level": 0.1, "energy_level": 0.9})),
        );
        assert!((good - 0.86).abs() < 1e-5);
        let bad = decision_confidence(
            &f,
            &to_context(json!({"stress_level": 0.9, "energy_level": 0.1})),
        );
        assert!((bad - 0.36).abs() < 1e-5);
        let d = make_decision(&PersonalityTraits::default(), &ContextMap::new(), 1);
        assert!(!d.is_firm(0.7));
        assert!(d.is_firm(0.6));
    }
}
