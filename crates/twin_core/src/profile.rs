//! Twin profile and demographic bucketing.

use crate::context::{ContextExt, ContextMap};
use crate::error::TwinError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Coarse age bucket that drives the generators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgeGroup {
    Teen,
    YoungAdult,
    Adult,
    Senior,
}

impl AgeGroup {
    pub fn from_age(age: u32) -> Self {
        match age {
            0..=19 => AgeGroup::Teen,
            20..=29 => AgeGroup::YoungAdult,
            30..=49 => AgeGroup::Adult,
            _ => AgeGroup::Senior,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            AgeGroup::Teen => "teen",
            AgeGroup::YoungAdult => "young_adult",
            AgeGroup::Adult => "adult",
            AgeGroup::Senior => "senior",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TwinProfile {
    pub name: String,
    pub description: String,
    pub age: u32,
    pub gender: String,
    pub occupation: String,
    pub interests: Vec<String>,
    pub skills: Vec<String>,
    pub location: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Default for TwinProfile {
    fn default() -> Self {
        let now = Utc::now();
        Self {
            name: "Unnamed Twin".to_string(),
            description: String::new(),
            age: 25,
            gender: "unspecified".to_string(),
            occupation: "student".to_string(),
            interests: Vec::new(),
            skills: Vec::new(),
            location: "unknown".to_string(),
            created_at: now,
            updated_at: now,
        }
    }
}

impl TwinProfile {
    pub fn age_group(&self) -> AgeGroup {
        AgeGroup::from_age(self.age)
    }

    /// Build a profile from a creation config. Demographic keys may sit at the
    /// top level or inside a nested `profile` map.
    pub fn from_config(config: &ContextMap) -> Result<Self, TwinError> {
        let mut profile = Self::default();
        profile.apply_updates(config)?;
        if let Some(nested) = config.map_field("profile") {
            profile.apply_updates(nested)?;
        }
        let now = Utc::now();
        profile.created_at = now;
        profile.updated_at = now;
        Ok(profile)
    }

    /// Apply recognised fields from an update map. Unrecognised keys are
    /// skipped; a recognised key with the wrong type rejects the whole map.
    pub fn apply_updates(&mut self, updates: &ContextMap) -> Result<(), TwinError> {
        let mut next = self.clone();
        for (key, value) in updates {
            match key.as_str() {
                "name" => next.name = string_value(key, value)?,
                "description" => next.description = string_value(key, value)?,
                "gender" => next.gender = string_value(key, value)?,
                "occupation" => next.occupation = string_value(key, value)?,
                "location" => next.location = string_value(key, value)?,
                "age" => {
                    next.age = value
                        .as_u64()
                        .and_then(|v| u32::try_from(v).ok())
                        .ok_or_else(|| TwinError::invalid(key, "age must be a non-negative integer"))?;
                }
                "interests" => next.interests = string_list(key, value)?,
                "skills" => next.skills = string_list(key, value)?,
                _ => {}
            }
        }
        next.updated_at = Utc::now();
        *self = next;
        Ok(())
    }
}

fn string_value(key: &str, value: &Value) -> Result<String, TwinError> {
    value
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| TwinError::invalid(key, "expected a string"))
}

fn string_list(key: &str, value: &Value) -> Result<Vec<String>, TwinError> {
    let items = value
        .as_array()
        .ok_or_else(|| TwinError::invalid(key, "expected a list of strings"))?;
    items.iter().map(|v| string_value(key, v)).collect()
}
