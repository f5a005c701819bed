//! Cached synthetic datasets.
//!
//! The manager holds three generated datasets (personality profiles, health
//! baselines, behavior patterns) that the engine regenerates periodically,
//! optionally mirroring them to JSON files. Lookups match records by
//! criteria with a small numeric tolerance.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rand::seq::SliceRandom;
use rand::Rng;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::path::Path;
use twin_core::config::SyntheticDataConfig;
use twin_core::generators::{
    age_health_factors, generate_behavior_pattern, generate_health_metrics, generate_interests,
    generate_personality_traits, generate_skills, OCCUPATION_TRAITS,
};
use twin_core::{AgeGroup, BehaviorPattern, ContextMap, HealthMetrics, PersonalityTraits};

/// Numeric criteria match when within this distance.
pub const NUMERIC_TOLERANCE: f64 = 0.1;

const GENDERS: &[&str] = &["male", "female", "other"];
const MIN_AGE: u32 = 18;
const MAX_AGE: u32 = 65;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DatasetKind {
    PersonalityProfiles,
    HealthBaselines,
    BehaviorPatterns,
}

impl DatasetKind {
    pub const ALL: [DatasetKind; 3] = [
        DatasetKind::PersonalityProfiles,
        DatasetKind::HealthBaselines,
        DatasetKind::BehaviorPatterns,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            DatasetKind::PersonalityProfiles => "personality_profiles",
            DatasetKind::HealthBaselines => "health_baselines",
            DatasetKind::BehaviorPatterns => "behavior_patterns",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.as_str() == name)
    }

    pub fn file_name(self) -> String {
        format!("{}.json", self.as_str())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PersonalityProfileRecord {
    pub profile_id: String,
    pub age: u32,
    pub age_group: AgeGroup,
    pub occupation: String,
    pub personality_traits: PersonalityTraits,
    pub interests: Vec<String>,
    pub skills: Vec<String>,
    pub created_at: DateTime<Utc>,
}

/// Typical energy and stress for an age bucket.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct HealthFactors {
    pub energy_level: f32,
    pub stress_level: f32,
}

impl From<AgeGroup> for HealthFactors {
    fn from(group: AgeGroup) -> Self {
        let (energy_level, stress_level) = age_health_factors(group);
        Self {
            energy_level,
            stress_level,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthBaselineRecord {
    pub baseline_id: String,
    pub age: u32,
    pub age_group: AgeGroup,
    pub gender: String,
    pub health_metrics: HealthMetrics,
    pub health_factors: HealthFactors,
    pub created_at: DateTime<Utc>,
}

/// One-off synthetic bundle generated for a specific twin.
#[derive(Debug, Clone, Serialize)]
pub struct SyntheticTwinData {
    pub twin_id: String,
    pub personality: PersonalityProfileRecord,
    pub health: HealthMetrics,
    pub behavior: BehaviorPattern,
    pub generated_at: DateTime<Utc>,
    pub data_quality: f32,
}

#[derive(Debug, Clone, Serialize)]
pub struct SyntheticStatus {
    pub personality_profiles: usize,
    pub health_baselines: usize,
    pub behavior_patterns: usize,
    pub generations: u64,
    pub last_generated: Option<DateTime<Utc>>,
}

#[derive(Debug, Default)]
pub struct SyntheticDataManager {
    config: SyntheticDataConfig,
    personality_profiles: Vec<PersonalityProfileRecord>,
    health_baselines: Vec<HealthBaselineRecord>,
    behavior_patterns: Vec<BehaviorPattern>,
    per_twin: HashMap<String, SyntheticTwinData>,
    generations: u64,
    last_generated: Option<DateTime<Utc>>,
}

impl SyntheticDataManager {
    pub fn new(config: SyntheticDataConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    pub fn personality_profiles(&self) -> &[PersonalityProfileRecord] {
        &self.personality_profiles
    }

    pub fn health_baselines(&self) -> &[HealthBaselineRecord] {
        &self.health_baselines
    }

    pub fn behavior_patterns(&self) -> &[BehaviorPattern] {
        &self.behavior_patterns
    }

    pub fn status(&self) -> SyntheticStatus {
        SyntheticStatus {
            personality_profiles: self.personality_profiles.len(),
            health_baselines: self.health_baselines.len(),
            behavior_patterns: self.behavior_patterns.len(),
            generations: self.generations,
            last_generated: self.last_generated,
        }
    }

    /// Replace every cached dataset with a fresh one.
    pub fn regenerate<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        let now = Utc::now();
        self.personality_profiles = (1..=self.config.personality_profiles)
            .map(|i| personality_record(format!("personality_{i}"), now, rng))
            .collect();
        self.health_baselines = (1..=self.config.health_baselines)
            .map(|i| health_record(format!("health_{i}"), now, rng))
            .collect();
        self.behavior_patterns = (1..=self.config.behavior_patterns)
            .map(|i| generate_behavior_pattern(format!("behavior_{i}"), rng))
            .collect();
        self.generations += 1;
        self.last_generated = Some(now);
    }

    /// Regenerate the datasets and mirror them to `data_dir` when one is
    /// configured. Safe to call repeatedly.
    pub async fn generate_new_data(&mut self) -> Result<()> {
        {
            let mut rng = rand::thread_rng();
            self.regenerate(&mut rng);
        }
        if let Some(dir) = self.config.data_dir.clone() {
            self.write_datasets(&dir).await?;
        }
        tracing::info!(
            "Generated new synthetic data: {} profiles, {} baselines, {} patterns",
            self.personality_profiles.len(),
            self.health_baselines.len(),
            self.behavior_patterns.len()
        );
        Ok(())
    }

    async fn write_datasets(&self, dir: &Path) -> Result<()> {
        tokio::fs::create_dir_all(dir)
            .await
            .with_context(|| format!("Failed to create data dir: {}", dir.display()))?;
        for kind in DatasetKind::ALL {
            let bytes = match kind {
                DatasetKind::PersonalityProfiles => {
                    serde_json::to_vec_pretty(&self.personality_profiles)
                }
                DatasetKind::HealthBaselines => serde_json::to_vec_pretty(&self.health_baselines),
                DatasetKind::BehaviorPatterns => serde_json::to_vec_pretty(&self.behavior_patterns),
            }
            .with_context(|| format!("Failed to serialize {}", kind.as_str()))?;
            let path = dir.join(kind.file_name());
            tokio::fs::write(&path, bytes)
                .await
                .with_context(|| format!("Failed to write {}", path.display()))?;
        }
        Ok(())
    }

    fn dataset_values(&self, kind: DatasetKind) -> Vec<Value> {
        let values = match kind {
            DatasetKind::PersonalityProfiles => serde_json::to_value(&self.personality_profiles),
            DatasetKind::HealthBaselines => serde_json::to_value(&self.health_baselines),
            DatasetKind::BehaviorPatterns => serde_json::to_value(&self.behavior_patterns),
        };
        match values {
            Ok(Value::Array(items)) => items,
            Ok(_) => Vec::new(),
            Err(e) => {
                tracing::warn!("Failed to serialize {}: {}", kind.as_str(), e);
                Vec::new()
            }
        }
    }

    /// First record of dataset `kind` satisfying every criterion, if any.
    pub fn get_synthetic_profile(&self, kind: &str, criteria: &ContextMap) -> Option<Value> {
        let kind = DatasetKind::from_name(kind)?;
        self.dataset_values(kind).into_iter().find(|record| {
            record
                .as_object()
                .is_some_and(|fields| matches_criteria(fields, criteria))
        })
    }

    /// A personality, health and behavior bundle for one twin, cached by id.
    pub fn generate_synthetic_data(&mut self, twin_id: &str) -> SyntheticTwinData {
        let mut rng = rand::thread_rng();
        self.generate_synthetic_data_with(twin_id, &mut rng)
    }

    pub fn generate_synthetic_data_with<R: Rng + ?Sized>(
        &mut self,
        twin_id: &str,
        rng: &mut R,
    ) -> SyntheticTwinData {
        let now = Utc::now();
        let data = SyntheticTwinData {
            twin_id: twin_id.to_string(),
            personality: personality_record(format!("personality_{twin_id}"), now, rng),
            health: generate_health_metrics(AgeGroup::Adult, "unspecified", rng),
            behavior: generate_behavior_pattern(format!("behavior_{twin_id}"), rng),
            generated_at: now,
            data_quality: rng.gen_range(0.8..0.98f32),
        };
        self.per_twin.insert(twin_id.to_string(), data.clone());
        tracing::info!("Generated synthetic data for twin {}", twin_id);
        data
    }

    pub fn twin_data(&self, twin_id: &str) -> Option<&SyntheticTwinData> {
        self.per_twin.get(twin_id)
    }

    /// Drop the cached bundle of a deleted twin.
    pub fn forget_twin(&mut self, twin_id: &str) -> Option<SyntheticTwinData> {
        self.per_twin.remove(twin_id)
    }
}

fn personality_record<R: Rng + ?Sized>(
    profile_id: String,
    created_at: DateTime<Utc>,
    rng: &mut R,
) -> PersonalityProfileRecord {
    let age = rng.gen_range(MIN_AGE..=MAX_AGE);
    let age_group = AgeGroup::from_age(age);
    let occupation = OCCUPATION_TRAITS
        .choose(rng)
        .map(|(name, _)| *name)
        .unwrap_or("student");
    PersonalityProfileRecord {
        profile_id,
        age,
        age_group,
        occupation: occupation.to_string(),
        personality_traits: generate_personality_traits(age_group, occupation, rng),
        interests: generate_interests(rng),
        skills: generate_skills(occupation, rng),
        created_at,
    }
}

fn health_record<R: Rng + ?Sized>(
    baseline_id: String,
    created_at: DateTime<Utc>,
    rng: &mut R,
) -> HealthBaselineRecord {
    let age = rng.gen_range(MIN_AGE..=MAX_AGE);
    let age_group = AgeGroup::from_age(age);
    let gender = GENDERS.choose(rng).copied().unwrap_or("other");
    HealthBaselineRecord {
        baseline_id,
        age,
        age_group,
        gender: gender.to_string(),
        health_metrics: generate_health_metrics(age_group, gender, rng),
        health_factors: HealthFactors::from(age_group),
        created_at,
    }
}

/// Every criterion key must be present. Numbers match within
/// [`NUMERIC_TOLERANCE`], anything else must be equal.
pub fn matches_criteria(record: &ContextMap, criteria: &ContextMap) -> bool {
    criteria.iter().all(|(key, expected)| {
        let Some(actual) = record.get(key) else {
            return false;
        };
        match (expected.as_f64(), actual.as_f64()) {
            (Some(want), Some(have)) => (want - have).abs() <= NUMERIC_TOLERANCE,
            (Some(_), None) => false,
            _ => actual == expected,
        }
    })
}
