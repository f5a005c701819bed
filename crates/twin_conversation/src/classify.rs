//! Keyword classification of inbound messages.
//!
//! Every function here is a pure scan over the lowercased text, so the same
//! message and context always get the same labels. Keywords match on word
//! boundaries ("hi" does not fire inside "this"); topic keywords only need a
//! word start so that "meetings" still counts as work.

use serde::Serialize;
use twin_core::{ContextExt, ContextMap, Intent, MessageType, Sentiment};

const GREETING: &[&str] = &[
    "hello",
    "hi",
    "hey",
    "greetings",
    "good morning",
    "good afternoon",
    "good evening",
];
const QUESTION_WORDS: &[&str] = &["what", "how", "why", "when", "where", "who"];
const COMMAND: &[&str] = &["please", "can you", "could you", "help me", "show me"];
const FAREWELL: &[&str] = &["goodbye", "bye", "see you", "take care", "farewell"];
const COMPLIMENT: &[&str] = &[
    "great",
    "awesome",
    "amazing",
    "wonderful",
    "excellent",
    "good job",
];

const POSITIVE: &[&str] = &[
    "happy",
    "excited",
    "great",
    "awesome",
    "wonderful",
    "love",
    "enjoy",
    "good",
    "nice",
];
const NEGATIVE: &[&str] = &[
    "sad",
    "angry",
    "frustrated",
    "worried",
    "anxious",
    "bad",
    "terrible",
    "hate",
    "disappointed",
];
const EXCITED: &[&str] = &["wow", "amazing", "incredible", "fantastic", "brilliant", "outstanding"];
const ANXIOUS: &[&str] = &["nervous", "scared", "afraid", "worried", "concerned", "stressed"];

const PERSONALITY_TERMS: &[&str] = &[
    "personality",
    "your traits",
    "kind of person",
    "introvert",
    "extrovert",
];
const HEALTH_TERMS: &[&str] = &[
    "health",
    "heart rate",
    "blood pressure",
    "sleep",
    "stress",
    "energy",
    "fitness",
];
const COMPLIMENT_INTENT: &[&str] = &["good job", "well done", "great work", "thank you", "thanks"];
const EMOTION_INTENT: &[&str] = &["i feel", "i'm feeling", "i'm so", "i am so"];
const HELP_INTENT: &[&str] = &["help", "support", "advice", "guidance"];
const PLAN_INTENT: &[&str] = &["plan", "schedule", "tomorrow", "next week"];
const SOCIAL_INTENT: &[&str] = &["let's", "we should", "together", "join"];
const INFO_INTENT: &[&str] = &[
    "i think",
    "i believe",
    "in my opinion",
    "i know",
    "is",
    "are",
    "was",
    "were",
    "will",
    "going to",
];

const TOPICS: &[(&str, &[&str])] = &[
    ("work", &["work", "project", "meeting", "deadline", "task", "job", "office"]),
    ("health", &["health", "exercise", "diet", "sleep", "stress", "fitness"]),
    ("social", &["friend", "family", "party", "event", "social"]),
    ("personal", &["hobby", "hobbies", "interest", "passion", "goal", "dream"]),
];

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// Find `term` in `text` where it starts a word, and, when `whole` is set,
/// also ends one.
fn contains_term(text: &str, term: &str, whole: bool) -> bool {
    text.match_indices(term).any(|(start, _)| {
        let before_ok = text[..start].chars().next_back().map_or(true, |c| !is_word_char(c));
        let after_ok = !whole
            || text[start + term.len()..]
                .chars()
                .next()
                .map_or(true, |c| !is_word_char(c));
        before_ok && after_ok
    })
}

fn any_word(text: &str, terms: &[&str]) -> bool {
    terms.iter().any(|t| contains_term(text, t, true))
}

fn any_prefix(text: &str, terms: &[&str]) -> bool {
    terms.iter().any(|t| contains_term(text, t, false))
}

fn is_question(lower: &str) -> bool {
    lower.contains('?') || any_word(lower, QUESTION_WORDS)
}

pub fn classify_message_type(message: &str) -> MessageType {
    let lower = message.trim().to_lowercase();
    if any_word(&lower, GREETING) {
        MessageType::Greeting
    } else if is_question(&lower) {
        MessageType::Question
    } else if any_word(&lower, COMMAND) {
        MessageType::Command
    } else if any_word(&lower, FAREWELL) {
        MessageType::Farewell
    } else if any_word(&lower, COMPLIMENT) {
        MessageType::Compliment
    } else {
        MessageType::Text
    }
}

/// First family wins, in the order positive, negative, excited, anxious. A
/// message mixing upbeat and worried words therefore reads as positive.
pub fn analyze_sentiment(message: &str, context: &ContextMap) -> Sentiment {
    let lower = message.to_lowercase();
    if any_word(&lower, POSITIVE) {
        Sentiment::Positive
    } else if any_word(&lower, NEGATIVE) {
        Sentiment::Negative
    } else if any_word(&lower, EXCITED) {
        Sentiment::Excited
    } else if any_word(&lower, ANXIOUS) {
        Sentiment::Anxious
    } else if context.str_field("mood") == Some("stressed") && any_prefix(&lower, &["work"]) {
        Sentiment::Anxious
    } else {
        Sentiment::Neutral
    }
}

pub fn detect_intent(message: &str) -> Intent {
    let lower = message.to_lowercase();
    let question = is_question(&lower);
    if any_word(&lower, GREETING) {
        Intent::Greet
    } else if any_word(&lower, FAREWELL) {
        Intent::EndConversation
    } else if any_prefix(&lower, PERSONALITY_TERMS) {
        Intent::PersonalityDiscussion
    } else if question && any_prefix(&lower, HEALTH_TERMS) {
        Intent::HealthInquiry
    } else if question {
        Intent::AskQuestion
    } else if any_word(&lower, COMMAND) {
        Intent::RequestAction
    } else if any_word(&lower, COMPLIMENT_INTENT) {
        Intent::GiveCompliment
    } else if any_word(&lower, EMOTION_INTENT) {
        Intent::ExpressEmotion
    } else if any_word(&lower, HELP_INTENT) {
        Intent::SeekHelp
    } else if any_word(&lower, PLAN_INTENT) {
        Intent::MakePlan
    } else if any_word(&lower, SOCIAL_INTENT) {
        Intent::Socialize
    } else if any_word(&lower, INFO_INTENT) {
        Intent::ProvideInformation
    } else {
        Intent::Socialize
    }
}

/// One of `work`, `health`, `social`, `personal`, or `general`.
pub fn extract_topic(message: &str) -> &'static str {
    let lower = message.to_lowercase();
    TOPICS
        .iter()
        .find(|(_, terms)| any_prefix(&lower, terms))
        .map_or("general", |(topic, _)| *topic)
}

/// Where the labels of a [`MessageAnalysis`] came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisSource {
    RuleBased,
    Classifier,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MessageAnalysis {
    pub message_type: MessageType,
    pub sentiment: Sentiment,
    pub intent: Intent,
    pub emotion: String,
    pub topic: String,
    pub source: AnalysisSource,
}

impl MessageAnalysis {
    pub fn rule_based(message: &str, context: &ContextMap) -> Self {
        let message_type = classify_message_type(message);
        Self {
            message_type,
            sentiment: analyze_sentiment(message, context),
            intent: detect_intent(message),
            emotion: "neutral".to_string(),
            topic: topic_for(message, message_type).to_string(),
            source: AnalysisSource::RuleBased,
        }
    }
}

/// Greetings with no other subject get their own topic so greeting
/// templates can find them.
pub(crate) fn topic_for(message: &str, message_type: MessageType) -> &'static str {
    match extract_topic(message) {
        "general" if message_type == MessageType::Greeting => "greeting",
        topic => topic,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use twin_core::context::to_context;

    #[test]
    fn test_word_boundaries() {
        assert!(contains_term("hi there", "hi", true));
        assert!(!contains_term("this is it", "hi", true));
        assert!(contains_term("weekly meetings", "meeting", false));
        assert!(!contains_term("weekly meetings", "meeting", true));
        assert!(contains_term("let's go", "let's", true));
    }

    #[test]
    fn test_message_types() {
        assert_eq!(classify_message_type("Hello there"), MessageType::Greeting);
        assert_eq!(classify_message_type("What time is it?"), MessageType::Question);
        assert_eq!(classify_message_type("Please send the file"), MessageType::Command);
        assert_eq!(classify_message_type("Ok, bye for now"), MessageType::Farewell);
        assert_eq!(classify_message_type("That was excellent"), MessageType::Compliment);
        assert_eq!(classify_message_type("This is fine"), MessageType::Text);
    }

    #[test]
    fn test_sentiment_families() {
        let ctx = ContextMap::new();
        assert_eq!(analyze_sentiment("I'm nervous about it", &ctx), Sentiment::Anxious);
        assert_eq!(analyze_sentiment("I'm worried about it", &ctx), Sentiment::Negative);
        assert_eq!(analyze_sentiment("That was a bad day", &ctx), Sentiment::Negative);
        assert_eq!(analyze_sentiment("Wow, look at that", &ctx), Sentiment::Excited);
        assert_eq!(analyze_sentiment("I love this song", &ctx), Sentiment::Positive);
        assert_eq!(analyze_sentiment("The sky is blue", &ctx), Sentiment::Neutral);
    }

    #[test]
    fn test_upbeat_words_win_over_distress() {
        let ctx = ContextMap::new();
        assert_eq!(
            analyze_sentiment("Great news, but I'm worried", &ctx),
            Sentiment::Positive
        );
        assert_eq!(
            analyze_sentiment("Nice try, though I'm scared", &ctx),
            Sentiment::Positive
        );
        assert_eq!(analyze_sentiment("Sad and nervous", &ctx), Sentiment::Negative);
        assert_eq!(analyze_sentiment("Wow, I'm nervous", &ctx), Sentiment::Excited);
    }

    #[test]
    fn test_stressed_mood_at_work_reads_anxious() {
        let ctx = to_context(json!({"mood": "stressed"}));
        assert_eq!(analyze_sentiment("More work today", &ctx), Sentiment::Anxious);
        assert_eq!(
            analyze_sentiment("More work today", &ContextMap::new()),
            Sentiment::Neutral
        );
    }

    #[test]
    fn test_intents() {
        assert_eq!(detect_intent("hey"), Intent::Greet);
        assert_eq!(detect_intent("Goodbye!"), Intent::EndConversation);
        assert_eq!(detect_intent("How is your blood pressure?"), Intent::HealthInquiry);
        assert_eq!(detect_intent("Why is the sky blue?"), Intent::AskQuestion);
        assert_eq!(detect_intent("Tell me about your personality"), Intent::PersonalityDiscussion);
        assert_eq!(detect_intent("Could you open it"), Intent::RequestAction);
        assert_eq!(detect_intent("Thanks a lot"), Intent::GiveCompliment);
        assert_eq!(detect_intent("I feel tired"), Intent::ExpressEmotion);
        assert_eq!(detect_intent("I need some advice"), Intent::SeekHelp);
        assert_eq!(detect_intent("Lunch tomorrow"), Intent::MakePlan);
        assert_eq!(detect_intent("Let's go out"), Intent::Socialize);
        assert_eq!(detect_intent("I think so"), Intent::ProvideInformation);
        assert_eq!(detect_intent("Mmm"), Intent::Socialize);
    }

    #[test]
    fn test_topics() {
        assert_eq!(extract_topic("The project deadlines are tight"), "work");
        assert_eq!(extract_topic("I try to exercise daily"), "health");
        assert_eq!(extract_topic("Dinner with family"), "social");
        assert_eq!(extract_topic("My new hobby is pottery"), "personal");
        assert_eq!(extract_topic("Nothing much"), "general");
        assert_eq!(topic_for("Hi!", MessageType::Greeting), "greeting");
        assert_eq!(topic_for("Hi, work is busy", MessageType::Greeting), "work");
    }

    #[test]
    fn test_rule_based_is_deterministic() {
        let ctx = to_context(json!({"mood": "calm"}));
        let msg = "Hey, could you help me plan the project meeting?";
        let a = MessageAnalysis::rule_based(msg, &ctx);
        for _ in 0..10 {
            assert_eq!(MessageAnalysis::rule_based(msg, &ctx), a);
        }
        assert_eq!(a.source, AnalysisSource::RuleBased);
        assert_eq!(a.emotion, "neutral");
    }
}
