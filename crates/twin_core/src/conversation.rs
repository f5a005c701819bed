//! Conversation records shared between the conversation engine and the twin.

use crate::context::ContextMap;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

macro_rules! labelled_enum {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $label:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(rename_all = "snake_case")]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(self) -> &'static str {
                match self {
                    $($name::$variant => $label),+
                }
            }

            pub fn from_label(label: &str) -> Option<Self> {
                let label = label.trim().to_ascii_lowercase();
                Self::ALL.iter().copied().find(|v| v.as_str() == label)
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

labelled_enum!(
    /// Surface form of an inbound message.
    MessageType {
        Text => "text",
        Question => "question",
        Command => "command",
        Greeting => "greeting",
        Farewell => "farewell",
        Compliment => "compliment",
    }
);

labelled_enum!(
    Sentiment {
        Positive => "positive",
        Negative => "negative",
        Neutral => "neutral",
        Excited => "excited",
        Anxious => "anxious",
    }
);

labelled_enum!(
    Intent {
        Greet => "greet",
        AskQuestion => "ask_question",
        ProvideInformation => "provide_information",
        RequestAction => "request_action",
        ExpressEmotion => "express_emotion",
        Socialize => "socialize",
        SeekHelp => "seek_help",
        GiveCompliment => "give_compliment",
        MakePlan => "make_plan",
        EndConversation => "end_conversation",
        HealthInquiry => "health_inquiry",
        PersonalityDiscussion => "personality_discussion",
    }
);

impl Sentiment {
    pub fn is_distressed(self) -> bool {
        matches!(self, Sentiment::Negative | Sentiment::Anxious)
    }
}

/// One inbound message. Immutable once created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationMessage {
    pub message_id: String,
    pub sender: String,
    pub content: String,
    pub message_type: MessageType,
    pub timestamp: DateTime<Utc>,
    pub context: ContextMap,
    pub sentiment: Sentiment,
    pub intent: Intent,
}

/// Per-conversation state, created on the first message of a conversation id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationContext {
    pub conversation_id: String,
    pub participants: Vec<String>,
    pub topic: String,
    pub mood: Sentiment,
    pub energy_level: f32,
    pub conversation_style: String,
    pub start_time: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
    pub message_count: u64,
}
