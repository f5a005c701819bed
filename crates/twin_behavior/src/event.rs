use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use twin_core::config::OutcomeThresholds;
use twin_core::{BehaviorCategory, ContextMap};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BehaviorOutcome {
    ExcellentSuccess,
    GoodSuccess,
    ModerateSuccess,
    MinorFailure,
    SignificantFailure,
}

impl BehaviorOutcome {
    /// Label a Bernoulli draw. The tier depends only on how likely success
    /// was, not on the draw itself.
    pub fn classify(success: bool, probability: f32, t: &OutcomeThresholds) -> Self {
        match (success, probability) {
            (true, p) if p > t.excellent => BehaviorOutcome::ExcellentSuccess,
            (true, p) if p > t.good => BehaviorOutcome::GoodSuccess,
            (true, _) => BehaviorOutcome::ModerateSuccess,
            (false, p) if p < t.significant_failure => BehaviorOutcome::SignificantFailure,
            (false, _) => BehaviorOutcome::MinorFailure,
        }
    }

    pub fn is_success(self) -> bool {
        matches!(
            self,
            BehaviorOutcome::ExcellentSuccess
                | BehaviorOutcome::GoodSuccess
                | BehaviorOutcome::ModerateSuccess
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            BehaviorOutcome::ExcellentSuccess => "excellent_success",
            BehaviorOutcome::GoodSuccess => "good_success",
            BehaviorOutcome::ModerateSuccess => "moderate_success",
            BehaviorOutcome::MinorFailure => "minor_failure",
            BehaviorOutcome::SignificantFailure => "significant_failure",
        }
    }
}

/// One simulated activity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BehaviorEvent {
    pub event_id: String,
    pub event_type: BehaviorCategory,
    pub timestamp: DateTime<Utc>,
    pub context: ContextMap,
    /// Trait name -> value for the traits that drove this category.
    pub personality_influence: BTreeMap<String, f32>,
    pub outcome: BehaviorOutcome,
    /// Hours.
    pub duration: f32,
    pub energy_consumed: f32,
}
