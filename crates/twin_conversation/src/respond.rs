//! Fallback replies and personality styling of the chosen reply.

use crate::classify::MessageAnalysis;
use twin_core::{Intent, MessageType, PersonalityTraits, Sentiment};

const HIGH_TRAIT: f32 = 0.7;

/// Reply used when no template clears the selection threshold.
pub fn contextual_fallback(analysis: &MessageAnalysis, traits: &PersonalityTraits) -> &'static str {
    match (analysis.message_type, analysis.sentiment, analysis.intent) {
        (MessageType::Question, _, _) => {
            "That's an interesting question. Let me think about that..."
        }
        (MessageType::Greeting, _, _) => {
            "Hello! It's great to hear from you. How are you doing today?"
        }
        (_, s, _) if s.is_distressed() => {
            "I understand you might be going through something difficult. I'm here to listen."
        }
        (_, Sentiment::Positive | Sentiment::Excited, _) => {
            "That's wonderful! I love hearing positive news. Tell me more about it!"
        }
        (_, _, Intent::RequestAction) => {
            "I'd be happy to help you with that. What specifically would you like me to do?"
        }
        (_, _, Intent::SeekHelp) => "Of course, I'm here to support you. What do you need help with?",
        _ if traits.empathy > HIGH_TRAIT => {
            "I'm really interested in what you're sharing. Could you tell me more?"
        }
        _ if traits.extraversion > HIGH_TRAIT => {
            "That sounds fascinating! I'd love to dive deeper into this topic with you."
        }
        _ => "I appreciate you sharing that with me. What's on your mind?",
    }
}

/// Style a reply after the twin's dominant traits: extraverts exclaim,
/// empaths acknowledge first, conscientious twins break things into steps.
pub fn personalize(response: &str, traits: &PersonalityTraits) -> String {
    let mut styled = response.to_string();

    if traits.extraversion > HIGH_TRAIT && !response.contains('!') {
        styled = styled.replace('.', "!");
    }

    if traits.empathy > HIGH_TRAIT
        && !response.contains("I understand")
        && !response.contains("I'm here")
    {
        styled = format!("I understand. {styled}");
    }

    if traits.conscientiousness > HIGH_TRAIT
        && response.contains("Let's")
        && !response.contains("step")
    {
        styled = styled.replacen("Let's", "Let's break this down into steps, then", 1);
    }

    styled
}
