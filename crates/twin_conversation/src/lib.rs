//! # Twin Conversation
//!
//! Turns an inbound message into a reply in the twin's voice:
//! - `classify`: keyword labelling of message type, sentiment, intent and topic
//! - `classifier`: the optional ML backend behind [`TextClassifier`]
//! - `templates`: the response catalog and its scenario/personality/context scoring
//! - `respond`: fallback replies and personality styling
//! - `engine`: per-conversation state and the pipeline tying it together

pub mod classifier;
pub mod classify;
pub mod engine;
pub mod respond;
pub mod templates;

pub use classifier::{analyze_with, HuggingFaceClassifier, Label, TextClassifier};
pub use classify::{
    analyze_sentiment, classify_message_type, detect_intent, extract_topic, AnalysisSource,
    MessageAnalysis,
};
pub use engine::{
    analyze_message, ConversationEngine, ConversationOverview, ConversationReply,
    ConversationSummary, LoggedMessage,
};
pub use templates::{ResponseTemplate, Scenario};
