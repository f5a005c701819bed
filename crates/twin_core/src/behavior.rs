//! Behavior categories and reinforced behavior patterns.

use crate::context::ContextMap;
use crate::sanitize_f32;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BehaviorCategory {
    RoutineActivity,
    WorkActivity,
    SocialInteraction,
    LeisureActivity,
    HealthBehavior,
    LearningActivity,
    CreativeActivity,
}

impl BehaviorCategory {
    pub const ALL: [BehaviorCategory; 7] = [
        BehaviorCategory::RoutineActivity,
        BehaviorCategory::WorkActivity,
        BehaviorCategory::SocialInteraction,
        BehaviorCategory::LeisureActivity,
        BehaviorCategory::HealthBehavior,
        BehaviorCategory::LearningActivity,
        BehaviorCategory::CreativeActivity,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            BehaviorCategory::RoutineActivity => "routine_activity",
            BehaviorCategory::WorkActivity => "work_activity",
            BehaviorCategory::SocialInteraction => "social_interaction",
            BehaviorCategory::LeisureActivity => "leisure_activity",
            BehaviorCategory::HealthBehavior => "health_behavior",
            BehaviorCategory::LearningActivity => "learning_activity",
            BehaviorCategory::CreativeActivity => "creative_activity",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.as_str() == name)
    }
}

impl std::fmt::Display for BehaviorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A recurring behavioral tendency, reinforced each time a similar event is
/// observed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BehaviorPattern {
    pub pattern_id: String,
    /// Category tag. Usually a [`BehaviorCategory`] name, but seeded patterns
    /// may carry broader tags such as `work_habits`.
    pub pattern_type: String,
    pub description: String,
    pub frequency: f32,
    pub triggers: Vec<String>,
    pub responses: Vec<String>,
    pub confidence: f32,
    pub last_observed: DateTime<Utc>,
    pub context: ContextMap,
}

impl BehaviorPattern {
    pub fn new(
        pattern_id: impl Into<String>,
        pattern_type: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            pattern_id: pattern_id.into(),
            pattern_type: pattern_type.into(),
            description: description.into(),
            frequency: 0.1,
            triggers: Vec::new(),
            responses: Vec::new(),
            confidence: 0.3,
            last_observed: Utc::now(),
            context: ContextMap::new(),
        }
    }

    pub fn normalize(&mut self) {
        self.frequency = sanitize_f32(self.frequency, 0.1).clamp(0.0, 1.0);
        self.confidence = sanitize_f32(self.confidence, 0.3).clamp(0.0, 1.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_names() {
        for c in BehaviorCategory::ALL {
            assert_eq!(BehaviorCategory::from_name(c.as_str()), Some(c));
        }
        assert_eq!(BehaviorCategory::WorkActivity.to_string(), "work_activity");
    }

    #[test]
    fn test_new_pattern_is_low_confidence() {
        let p = BehaviorPattern::new("p1", "work_activity", "desc");
        assert!((p.frequency - 0.1).abs() < 1e-6);
        assert!((p.confidence - 0.3).abs() < 1e-6);
    }

    #[test]
    fn test_normalize() {
        let mut p = BehaviorPattern::new("p1", "x", "y");
        p.frequency = 1.5;
        p.confidence = f32::NAN;
        p.normalize();
        assert_eq!(p.frequency, 1.0);
        assert!((p.confidence - 0.3).abs() < 1e-6);
    }
}
