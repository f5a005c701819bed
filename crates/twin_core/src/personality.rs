//! Personality trait vector.
//!
//! Ten bounded scalars in [0, 1]. Every mutation path goes through
//! [`PersonalityTraits::set`] or [`PersonalityTraits::normalize`], so an
//! out-of-range or non-finite value can never be stored.

use crate::context::ContextMap;
use crate::error::TwinError;
use crate::sanitize_f32;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Trait {
    Openness,
    Conscientiousness,
    Extraversion,
    Agreeableness,
    Neuroticism,
    EmotionalStability,
    Creativity,
    Adaptability,
    Confidence,
    Empathy,
}

impl Trait {
    pub const ALL: [Trait; 10] = [
        Trait::Openness,
        Trait::Conscientiousness,
        Trait::Extraversion,
        Trait::Agreeableness,
        Trait::Neuroticism,
        Trait::EmotionalStability,
        Trait::Creativity,
        Trait::Adaptability,
        Trait::Confidence,
        Trait::Empathy,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Trait::Openness => "openness",
            Trait::Conscientiousness => "conscientiousness",
            Trait::Extraversion => "extraversion",
            Trait::Agreeableness => "agreeableness",
            Trait::Neuroticism => "neuroticism",
            Trait::EmotionalStability => "emotional_stability",
            Trait::Creativity => "creativity",
            Trait::Adaptability => "adaptability",
            Trait::Confidence => "confidence",
            Trait::Empathy => "empathy",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.as_str() == name)
    }
}

impl std::fmt::Display for Trait {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PersonalityTraits {
    pub openness: f32,
    pub conscientiousness: f32,
    pub extraversion: f32,
    pub agreeableness: f32,
    pub neuroticism: f32,
    pub emotional_stability: f32,
    pub creativity: f32,
    pub adaptability: f32,
    pub confidence: f32,
    pub empathy: f32,
}

impl Default for PersonalityTraits {
    fn default() -> Self {
        Self {
            openness: 0.6,
            conscientiousness: 0.7,
            extraversion: 0.5,
            agreeableness: 0.8,
            neuroticism: 0.3,
            emotional_stability: 0.7,
            creativity: 0.6,
            adaptability: 0.8,
            confidence: 0.7,
            empathy: 0.8,
        }
    }
}

impl PersonalityTraits {
    /// Every trait set to the same value (clamped).
    pub fn uniform(value: f32) -> Self {
        let mut traits = Self::default();
        for t in Trait::ALL {
            traits.set(t, value);
        }
        traits
    }

    pub fn get(&self, t: Trait) -> f32 {
        match t {
            Trait::Openness => self.openness,
            Trait::Conscientiousness => self.conscientiousness,
            Trait::Extraversion => self.extraversion,
            Trait::Agreeableness => self.agreeableness,
            Trait::Neuroticism => self.neuroticism,
            Trait::EmotionalStability => self.emotional_stability,
            Trait::Creativity => self.creativity,
            Trait::Adaptability => self.adaptability,
            Trait::Confidence => self.confidence,
            Trait::Empathy => self.empathy,
        }
    }

    fn slot(&mut self, t: Trait) -> &mut f32 {
        match t {
            Trait::Openness => &mut self.openness,
            Trait::Conscientiousness => &mut self.conscientiousness,
            Trait::Extraversion => &mut self.extraversion,
            Trait::Agreeableness => &mut self.agreeableness,
            Trait::Neuroticism => &mut self.neuroticism,
            Trait::EmotionalStability => &mut self.emotional_stability,
            Trait::Creativity => &mut self.creativity,
            Trait::Adaptability => &mut self.adaptability,
            Trait::Confidence => &mut self.confidence,
            Trait::Empathy => &mut self.empathy,
        }
    }

    /// Store a trait value, clamped into [0, 1].
    pub fn set(&mut self, t: Trait, value: f32) {
        *self.slot(t) = sanitize_f32(value, 0.5).clamp(0.0, 1.0);
    }

    /// Nudge a trait by `delta`, clamped into [0, 1].
    pub fn adjust(&mut self, t: Trait, delta: f32) {
        let current = self.get(t);
        self.set(t, current + delta);
    }

    pub fn iter(&self) -> impl Iterator<Item = (Trait, f32)> + '_ {
        Trait::ALL.into_iter().map(move |t| (t, self.get(t)))
    }

    /// Clamp all traits to valid ranges, replacing NaN/Inf with 0.5.
    pub fn normalize(&mut self) {
        for t in Trait::ALL {
            let v = self.get(t);
            self.set(t, v);
        }
    }

    /// First trait holding a non-finite value, if any.
    pub fn first_non_finite(&self) -> Option<Trait> {
        self.iter().find(|(_, v)| !v.is_finite()).map(|(t, _)| t)
    }

    /// The `n` strongest traits, highest first.
    pub fn dominant(&self, n: usize) -> Vec<(Trait, f32)> {
        let mut all: Vec<_> = self.iter().collect();
        all.sort_by(|a, b| b.1.total_cmp(&a.1));
        all.truncate(n);
        all
    }

    /// Mean of a subset of traits; 0.5 for an empty subset.
    pub fn average_of(&self, traits: &[Trait]) -> f32 {
        if traits.is_empty() {
            return 0.5;
        }
        traits.iter().map(|t| self.get(*t)).sum::<f32>() / traits.len() as f32
    }

    // ========================================================================
    // Map boundary
    // ========================================================================

    pub fn to_map(&self) -> ContextMap {
        self.iter()
            .map(|(t, v)| (t.as_str().to_string(), Value::from(v as f64)))
            .collect()
    }

    /// Apply a partial trait map. Unknown keys are ignored; a known key with a
    /// non-numeric value rejects the whole map without touching `self`.
    pub fn apply_map(&mut self, map: &ContextMap) -> Result<(), TwinError> {
        let mut next = *self;
        for (key, value) in map {
            let Some(t) = Trait::from_name(key) else {
                continue;
            };
            let v = value
                .as_f64()
                .ok_or_else(|| TwinError::invalid(key, "trait value must be a number"))?;
            next.set(t, v as f32);
        }
        *self = next;
        Ok(())
    }

    pub fn from_map(map: &ContextMap) -> Result<Self, TwinError> {
        let mut traits = Self::default();
        traits.apply_map(map)?;
        Ok(traits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::to_context;
    use serde_json::json;

    #[test]
    fn test_default_traits_in_range() {
        let traits = PersonalityTraits::default();
        for (_, v) in traits.iter() {
            assert!((0.0..=1.0).contains(&v));
        }
        assert_eq!(traits.agreeableness, 0.8);
    }

    #[test]
    fn test_set_clamps() {
        let mut traits = PersonalityTraits::default();
        traits.set(Trait::Openness, 1.7);
        traits.set(Trait::Neuroticism, -0.4);
        assert_eq!(traits.openness, 1.0);
        assert_eq!(traits.neuroticism, 0.0);
    }

    #[test]
    fn test_normalize_nan() {
        let mut traits = PersonalityTraits::default();
        traits.creativity = f32::NAN;
        traits.empathy = 3.0;
        assert_eq!(traits.first_non_finite(), Some(Trait::Creativity));
        traits.normalize();
        assert_eq!(traits.creativity, 0.5);
        assert_eq!(traits.empathy, 1.0);
        assert!(traits.first_non_finite().is_none());
    }

    #[test]
    fn test_trait_names_round_trip() {
        for t in Trait::ALL {
            assert_eq!(Trait::from_name(t.as_str()), Some(t));
        }
        assert_eq!(Trait::from_name("charisma"), None);
    }

    #[test]
    fn test_apply_map_partial() {
        let mut traits = PersonalityTraits::default();
        let map = to_context(json!({"openness": 0.95, "charisma": 0.1, "empathy": 1.4}));
        traits.apply_map(&map).unwrap();
        assert!((traits.openness - 0.95).abs() < 1e-6);
        assert_eq!(traits.empathy, 1.0);
        assert_eq!(traits.conscientiousness, 0.7);
    }

    #[test]
    fn test_apply_map_rejects_non_numeric_atomically() {
        let mut traits = PersonalityTraits::default();
        let map = to_context(json!({"openness": 0.1, "empathy": "very"}));
        assert!(traits.apply_map(&map).is_err());
        assert_eq!(traits, PersonalityTraits::default());
    }

    #[test]
    fn test_dominant_sorted() {
        let traits = PersonalityTraits::default();
        let top = traits.dominant(3);
        assert_eq!(top.len(), 3);
        assert!(top[0].1 >= top[1].1 && top[1].1 >= top[2].1);
    }

    #[test]
    fn test_average_of() {
        let traits = PersonalityTraits::uniform(0.4);
        assert!((traits.average_of(&[Trait::Openness, Trait::Empathy]) - 0.4).abs() < 1e-6);
        assert_eq!(traits.average_of(&[]), 0.5);
    }
}
