//! # Twin Core
//!
//! Shared state model for digital twins: the profile, the ten-trait
//! personality vector, biometric metrics, behavior patterns and the
//! conversation/interaction records that every engine reads and writes.
//!
//! Also hosts the pieces that are pure value construction:
//! - `generators`: bounded random sampling of traits and metrics from demographics
//! - `evolution`: personality drift driven by interaction and learning history
//! - `config`: the TOML + environment configuration for the whole system

pub mod behavior;
pub mod config;
pub mod context;
pub mod conversation;
pub mod daypart;
pub mod error;
pub mod evolution;
pub mod generators;
pub mod health;
pub mod interaction;
pub mod personality;
pub mod profile;

pub use behavior::{BehaviorCategory, BehaviorPattern};
pub use config::TwinSystemConfig;
pub use context::{ContextExt, ContextMap};
pub use conversation::{
    ConversationContext, ConversationMessage, Intent, MessageType, Sentiment,
};
pub use daypart::DayPart;
pub use error::TwinError;
pub use evolution::{DefaultPersonalityModel, PersonalityModel};
pub use health::{BiometricReading, HealthMetrics, Metric};
pub use interaction::{InteractionOutcome, InteractionRecord, LearningEvent, MoodSnapshot};
pub use personality::{PersonalityTraits, Trait};
pub use profile::{AgeGroup, TwinProfile};

/// Append to a log, dropping the oldest entries once `cap` is exceeded.
pub fn push_bounded<T>(log: &mut Vec<T>, item: T, cap: usize) {
    log.push(item);
    if log.len() > cap {
        let excess = log.len() - cap;
        log.drain(..excess);
    }
}

/// Guard against NaN and Infinity before clamping.
#[inline]
pub(crate) fn sanitize_f32(v: f32, fallback: f32) -> f32 {
    if v.is_finite() {
        v
    } else {
        tracing::warn!("NaN/Inf detected in twin state, resetting to fallback {}", fallback);
        fallback
    }
}
