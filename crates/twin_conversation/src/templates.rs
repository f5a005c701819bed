//! The response template catalog and its scoring.

use chrono::Timelike;
use serde::Serialize;
use twin_core::{ConversationContext, DayPart, PersonalityTraits, Sentiment, Trait};

/// Templates at or below this score are never used.
pub const SELECTION_THRESHOLD: f32 = 0.5;
/// How far the conversation energy may sit from a template's target.
pub const ENERGY_TOLERANCE: f32 = 0.2;

const SCENARIO_WEIGHT: f32 = 0.4;
const PERSONALITY_WEIGHT: f32 = 0.3;
const CONTEXT_WEIGHT: f32 = 0.3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Scenario {
    MorningGreeting,
    WorkConversation,
    EmotionalSupport,
    SocialInteraction,
}

impl Scenario {
    /// Keyword/topic/sentiment match for this scenario.
    pub fn matches(self, context: &ConversationContext, sentiment: Sentiment) -> bool {
        match self {
            Scenario::MorningGreeting => context.topic == "greeting",
            Scenario::WorkConversation => context.topic == "work",
            Scenario::EmotionalSupport => sentiment.is_distressed(),
            Scenario::SocialInteraction => matches!(context.topic.as_str(), "social" | "personal"),
        }
    }
}

/// A single declared context requirement.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Requirement {
    TimeOfDay(DayPart),
    Topic(&'static str),
    Sentiment(Sentiment),
    EnergyLevel(f32),
}

impl Requirement {
    fn satisfied(&self, context: &ConversationContext, sentiment: Sentiment, hour: u32) -> bool {
        match self {
            Requirement::TimeOfDay(part) => DayPart::from_hour(hour) == *part,
            Requirement::Topic(topic) => context.topic == *topic,
            Requirement::Sentiment(expected) => sentiment == *expected,
            Requirement::EnergyLevel(target) => {
                (context.energy_level - target).abs() < ENERGY_TOLERANCE
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResponseTemplate {
    pub template_id: &'static str,
    pub scenario: Scenario,
    pub personality_traits: Vec<(Trait, f32)>,
    pub response_patterns: Vec<&'static str>,
    pub context_requirements: Vec<Requirement>,
    pub confidence: f32,
}

impl ResponseTemplate {
    /// Mean of `1 - |target - actual|` over the declared traits; 0.5 when
    /// none are declared.
    pub fn personality_match(&self, traits: &PersonalityTraits) -> f32 {
        if self.personality_traits.is_empty() {
            return 0.5;
        }
        let total: f32 = self
            .personality_traits
            .iter()
            .map(|(t, target)| 1.0 - (traits.get(*t) - target).abs())
            .sum();
        total / self.personality_traits.len() as f32
    }

    /// Fraction of declared requirements that hold; 0.5 when none are
    /// declared. Unmet requirements count against the template.
    pub fn context_match(
        &self,
        context: &ConversationContext,
        sentiment: Sentiment,
        hour: u32,
    ) -> f32 {
        if self.context_requirements.is_empty() {
            return 0.5;
        }
        let met = self
            .context_requirements
            .iter()
            .filter(|r| r.satisfied(context, sentiment, hour))
            .count();
        met as f32 / self.context_requirements.len() as f32
    }

    pub fn score(
        &self,
        context: &ConversationContext,
        sentiment: Sentiment,
        traits: &PersonalityTraits,
        hour: u32,
    ) -> f32 {
        let scenario = if self.scenario.matches(context, sentiment) {
            1.0
        } else {
            0.0
        };
        SCENARIO_WEIGHT * scenario
            + PERSONALITY_WEIGHT * self.personality_match(traits)
            + CONTEXT_WEIGHT * self.context_match(context, sentiment, hour)
    }
}

/// Highest-scoring template, if it clears [`SELECTION_THRESHOLD`]. Earlier
/// templates win ties.
pub fn find_template<'a>(
    templates: &'a [ResponseTemplate],
    context: &ConversationContext,
    sentiment: Sentiment,
    traits: &PersonalityTraits,
    hour: u32,
) -> Option<&'a ResponseTemplate> {
    let mut best: Option<(&ResponseTemplate, f32)> = None;
    for template in templates {
        let score = template.score(context, sentiment, traits, hour);
        tracing::trace!(template = template.template_id, score, "template scored");
        if best.map_or(true, |(_, s)| score > s) {
            best = Some((template, score));
        }
    }
    best.filter(|(_, s)| *s > SELECTION_THRESHOLD)
        .map(|(t, _)| t)
}

/// Hour used for time-of-day requirements.
pub fn current_hour() -> u32 {
    chrono::Local::now().hour()
}

pub fn default_templates() -> Vec<ResponseTemplate> {
    vec![
        ResponseTemplate {
            template_id: "greeting_morning",
            scenario: Scenario::MorningGreeting,
            personality_traits: vec![(Trait::Extraversion, 0.7), (Trait::Agreeableness, 0.8)],
            response_patterns: vec![
                "Good morning! How are you feeling today?",
                "Morning! Ready to start the day?",
                "Good morning! I hope you slept well.",
            ],
            context_requirements: vec![Requirement::TimeOfDay(DayPart::Morning)],
            confidence: 0.9,
        },
        ResponseTemplate {
            template_id: "work_discussion",
            scenario: Scenario::WorkConversation,
            personality_traits: vec![(Trait::Conscientiousness, 0.8), (Trait::Confidence, 0.7)],
            response_patterns: vec![
                "That sounds like an interesting project. What's your approach?",
                "I'd be happy to help brainstorm some solutions.",
                "Let's work through it together.",
            ],
            context_requirements: vec![Requirement::Topic("work"), Requirement::EnergyLevel(0.6)],
            confidence: 0.8,
        },
        ResponseTemplate {
            template_id: "emotional_support",
            scenario: Scenario::EmotionalSupport,
            personality_traits: vec![(Trait::Empathy, 0.8), (Trait::Agreeableness, 0.9)],
            response_patterns: vec![
                "I understand how you're feeling. That must be difficult.",
                "It's okay to feel that way. Would you like to talk about it?",
                "I'm here to listen. What's on your mind?",
            ],
            context_requirements: vec![
                Requirement::Sentiment(Sentiment::Negative),
                Requirement::EnergyLevel(0.4),
            ],
            confidence: 0.8,
        },
        ResponseTemplate {
            template_id: "social_engagement",
            scenario: Scenario::SocialInteraction,
            personality_traits: vec![(Trait::Extraversion, 0.8), (Trait::Openness, 0.7)],
            response_patterns: vec![
                "That's fascinating! Tell me more about it.",
                "I love hearing about new experiences. What happened next?",
                "That sounds like fun! I'd love to join in sometime.",
            ],
            context_requirements: vec![
                Requirement::Topic("personal"),
                Requirement::Sentiment(Sentiment::Positive),
            ],
            confidence: 0.7,
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn context(topic: &str, energy: f32) -> ConversationContext {
        ConversationContext {
            conversation_id: "c1".into(),
            participants: vec!["user".into()],
            topic: topic.into(),
            mood: Sentiment::Neutral,
            energy_level: energy,
            conversation_style: "casual".into(),
            start_time: Utc::now(),
            last_activity: Utc::now(),
            message_count: 1,
        }
    }

    #[test]
    fn test_mismatched_template_is_never_selected() {
        let crafted = ResponseTemplate {
            template_id: "crafted",
            scenario: Scenario::WorkConversation,
            personality_traits: vec![(Trait::Extraversion, 1.0)],
            response_patterns: vec!["never"],
            context_requirements: vec![Requirement::Topic("work")],
            confidence: 1.0,
        };
        let mut traits = PersonalityTraits::default();
        traits.extraversion = 0.0;
        let ctx = context("general", 0.7);
        let score = crafted.score(&ctx, Sentiment::Neutral, &traits, 10);
        assert!(score.abs() < 1e-6);
        let catalog = [crafted];
        assert!(find_template(&catalog, &ctx, Sentiment::Neutral, &traits, 10).is_none());
    }

    #[test]
    fn test_unmet_requirements_count() {
        let t = &default_templates()[1];
        // topic matches, energy 0.9 is too far from 0.6
        assert!((t.context_match(&context("work", 0.9), Sentiment::Neutral, 12) - 0.5).abs() < 1e-6);
        assert!((t.context_match(&context("work", 0.65), Sentiment::Neutral, 12) - 1.0).abs() < 1e-6);
        assert_eq!(t.context_match(&context("general", 0.9), Sentiment::Neutral, 12), 0.0);
    }

    #[test]
    fn test_personality_similarity() {
        let t = &default_templates()[2];
        let mut traits = PersonalityTraits::default();
        traits.empathy = 0.8;
        traits.agreeableness = 0.9;
        assert!((t.personality_match(&traits) - 1.0).abs() < 1e-6);
        traits.empathy = 0.3;
        assert!((t.personality_match(&traits) - 0.75).abs() < 1e-6);
    }

    #[test]
    fn test_distress_selects_support() {
        let mut traits = PersonalityTraits::default();
        traits.empathy = 0.8;
        traits.agreeableness = 0.9;
        let templates = default_templates();
        let chosen = find_template(&templates, &context("general", 0.45), Sentiment::Negative, &traits, 15)
            .map(|t| t.template_id);
        assert_eq!(chosen, Some("emotional_support"));
    }

    #[test]
    fn test_morning_greeting_window() {
        let mut traits = PersonalityTraits::default();
        traits.extraversion = 0.7;
        traits.agreeableness = 0.8;
        let templates = default_templates();
        let ctx = context("greeting", 0.7);
        let morning = find_template(&templates, &ctx, Sentiment::Neutral, &traits, 8);
        assert_eq!(morning.map(|t| t.template_id), Some("greeting_morning"));
        // 0.4 + 0.3 + 0 = 0.7 still clears the threshold at night
        let night = templates[0].score(&ctx, Sentiment::Neutral, &traits, 23);
        assert!((night - 0.7).abs() < 1e-6);
    }
}
