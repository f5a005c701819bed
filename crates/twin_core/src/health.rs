//! Biometric state of a twin.

use crate::context::ContextMap;
use crate::error::TwinError;
use crate::sanitize_f32;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Inclusive bounds a metric may take.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MetricRange {
    pub min: f32,
    pub max: f32,
}

impl MetricRange {
    pub const fn new(min: f32, max: f32) -> Self {
        Self { min, max }
    }

    pub fn clamp(&self, v: f32) -> f32 {
        v.clamp(self.min, self.max)
    }

    pub fn contains(&self, v: f32) -> bool {
        v >= self.min && v <= self.max
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    HeartRate,
    BloodPressureSystolic,
    BloodPressureDiastolic,
    Temperature,
    OxygenSaturation,
    RespiratoryRate,
    StressLevel,
    EnergyLevel,
    SleepQuality,
}

impl Metric {
    pub const ALL: [Metric; 9] = [
        Metric::HeartRate,
        Metric::BloodPressureSystolic,
        Metric::BloodPressureDiastolic,
        Metric::Temperature,
        Metric::OxygenSaturation,
        Metric::RespiratoryRate,
        Metric::StressLevel,
        Metric::EnergyLevel,
        Metric::SleepQuality,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Metric::HeartRate => "heart_rate",
            Metric::BloodPressureSystolic => "blood_pressure_systolic",
            Metric::BloodPressureDiastolic => "blood_pressure_diastolic",
            Metric::Temperature => "temperature",
            Metric::OxygenSaturation => "oxygen_saturation",
            Metric::RespiratoryRate => "respiratory_rate",
            Metric::StressLevel => "stress_level",
            Metric::EnergyLevel => "energy_level",
            Metric::SleepQuality => "sleep_quality",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|m| m.as_str() == name)
    }

    /// Physiologically plausible bounds (°F for temperature, % for SpO2).
    pub fn range(self) -> MetricRange {
        match self {
            Metric::HeartRate => MetricRange::new(30.0, 220.0),
            Metric::BloodPressureSystolic => MetricRange::new(70.0, 200.0),
            Metric::BloodPressureDiastolic => MetricRange::new(40.0, 130.0),
            Metric::Temperature => MetricRange::new(94.0, 106.0),
            Metric::OxygenSaturation => MetricRange::new(70.0, 100.0),
            Metric::RespiratoryRate => MetricRange::new(6.0, 40.0),
            Metric::StressLevel | Metric::EnergyLevel | Metric::SleepQuality => {
                MetricRange::new(0.0, 1.0)
            }
        }
    }

    /// Whether a rising value is good news.
    pub fn higher_is_better(self) -> bool {
        matches!(
            self,
            Metric::EnergyLevel | Metric::SleepQuality | Metric::OxygenSaturation
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HealthMetrics {
    pub heart_rate: f32,
    pub blood_pressure_systolic: f32,
    pub blood_pressure_diastolic: f32,
    pub temperature: f32,
    pub oxygen_saturation: f32,
    pub respiratory_rate: f32,
    pub stress_level: f32,
    pub energy_level: f32,
    pub sleep_quality: f32,
}

impl Default for HealthMetrics {
    fn default() -> Self {
        Self {
            heart_rate: 72.0,
            blood_pressure_systolic: 120.0,
            blood_pressure_diastolic: 80.0,
            temperature: 98.6,
            oxygen_saturation: 98.0,
            respiratory_rate: 16.0,
            stress_level: 0.3,
            energy_level: 0.8,
            sleep_quality: 0.7,
        }
    }
}

impl HealthMetrics {
    pub fn get(&self, m: Metric) -> f32 {
        match m {
            Metric::HeartRate => self.heart_rate,
            Metric::BloodPressureSystolic => self.blood_pressure_systolic,
            Metric::BloodPressureDiastolic => self.blood_pressure_diastolic,
            Metric::Temperature => self.temperature,
            Metric::OxygenSaturation => self.oxygen_saturation,
            Metric::RespiratoryRate => self.respiratory_rate,
            Metric::StressLevel => self.stress_level,
            Metric::EnergyLevel => self.energy_level,
            Metric::SleepQuality => self.sleep_quality,
        }
    }

    /// Store a metric, clamped to its physiological range.
    pub fn set(&mut self, m: Metric, value: f32) {
        let fallback = Self::default().get(m);
        let v = m.range().clamp(sanitize_f32(value, fallback));
        match m {
            Metric::HeartRate => self.heart_rate = v,
            Metric::BloodPressureSystolic => self.blood_pressure_systolic = v,
            Metric::BloodPressureDiastolic => self.blood_pressure_diastolic = v,
            Metric::Temperature => self.temperature = v,
            Metric::OxygenSaturation => self.oxygen_saturation = v,
            Metric::RespiratoryRate => self.respiratory_rate = v,
            Metric::StressLevel => self.stress_level = v,
            Metric::EnergyLevel => self.energy_level = v,
            Metric::SleepQuality => self.sleep_quality = v,
        }
    }

    /// Clamp every metric to its range, replacing NaN/Inf with resting defaults.
    pub fn normalize(&mut self) {
        for m in Metric::ALL {
            let v = self.get(m);
            self.set(m, v);
        }
    }

    pub fn first_non_finite(&self) -> Option<Metric> {
        Metric::ALL.into_iter().find(|m| !self.get(*m).is_finite())
    }

    pub fn within_ranges(&self) -> bool {
        Metric::ALL
            .into_iter()
            .all(|m| m.range().contains(self.get(m)))
    }

    pub fn to_map(&self) -> ContextMap {
        Metric::ALL
            .into_iter()
            .map(|m| (m.as_str().to_string(), Value::from(self.get(m) as f64)))
            .collect()
    }

    /// Apply a partial metric map. Unknown keys are ignored; a known key with
    /// a non-numeric value rejects the whole map.
    pub fn apply_map(&mut self, map: &ContextMap) -> Result<(), TwinError> {
        let mut next = *self;
        for (key, value) in map {
            let Some(m) = Metric::from_name(key) else {
                continue;
            };
            let v = value
                .as_f64()
                .ok_or_else(|| TwinError::invalid(key, "metric value must be a number"))?;
            next.set(m, v as f32);
        }
        *self = next;
        Ok(())
    }
}

/// One timestamped snapshot of vital signs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BiometricReading {
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub metrics: HealthMetrics,
}

impl BiometricReading {
    pub fn now(metrics: HealthMetrics) -> Self {
        Self {
            timestamp: Utc::now(),
            metrics,
        }
    }
}
