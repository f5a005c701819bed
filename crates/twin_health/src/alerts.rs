//! Threshold-based health alerts.
//!
//! Alerts are append-only: once emitted they are never retracted, only
//! filtered by age when reported.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use twin_core::config::AlertThresholds;
use twin_core::{BiometricReading, ContextMap};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    LowHeartRate,
    HighHeartRate,
    HighBloodPressure,
    LowOxygenSaturation,
    HighTemperature,
    HighStress,
}

impl AlertKind {
    pub fn as_str(self) -> &'static str {
        match self {
            AlertKind::LowHeartRate => "low_heart_rate",
            AlertKind::HighHeartRate => "high_heart_rate",
            AlertKind::HighBloodPressure => "high_blood_pressure",
            AlertKind::LowOxygenSaturation => "low_oxygen_saturation",
            AlertKind::HighTemperature => "high_temperature",
            AlertKind::HighStress => "high_stress",
        }
    }

    pub fn severity(self) -> Severity {
        match self {
            AlertKind::HighBloodPressure | AlertKind::LowOxygenSaturation => Severity::High,
            _ => Severity::Moderate,
        }
    }

    pub fn recommendations(self) -> &'static [&'static str] {
        match self {
            AlertKind::LowHeartRate => &["Consider light exercise", "Check for underlying conditions"],
            AlertKind::HighHeartRate => &["Rest and relax", "Consider stress management techniques"],
            AlertKind::HighBloodPressure => &[
                "Monitor regularly",
                "Consider lifestyle changes",
                "Consult healthcare provider",
            ],
            AlertKind::LowOxygenSaturation => &[
                "Take slow, deep breaths",
                "Consult healthcare provider if it persists",
            ],
            AlertKind::HighTemperature => &["Stay hydrated", "Rest and monitor temperature"],
            AlertKind::HighStress => &[
                "Practice relaxation techniques",
                "Take breaks",
                "Consider stress management",
            ],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Moderate,
    High,
}

impl Severity {
    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Moderate => "moderate",
            Severity::High => "high",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthAlert {
    pub alert_id: String,
    pub alert_type: AlertKind,
    pub severity: Severity,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    pub metrics: ContextMap,
    pub recommendations: Vec<String>,
}

impl HealthAlert {
    fn new(
        kind: AlertKind,
        seq: usize,
        message: String,
        reading: &BiometricReading,
        metrics: &[(&str, f32)],
    ) -> Self {
        Self {
            alert_id: format!("alert_{seq}"),
            alert_type: kind,
            severity: kind.severity(),
            message,
            timestamp: reading.timestamp,
            metrics: metrics
                .iter()
                .map(|(k, v)| (k.to_string(), Value::from(*v as f64)))
                .collect(),
            recommendations: kind.recommendations().iter().map(|s| s.to_string()).collect(),
        }
    }

    pub fn is_recent(&self, window: Duration, now: DateTime<Utc>) -> bool {
        self.timestamp > now - window
    }
}

/// Alerts raised within the last `hours`, oldest first.
pub fn recent_alerts(alerts: &[HealthAlert], hours: i64, now: DateTime<Utc>) -> Vec<&HealthAlert> {
    let window = Duration::hours(hours);
    alerts.iter().filter(|a| a.is_recent(window, now)).collect()
}

/// Compare a reading against the thresholds. `issued` is the number of
/// alerts already raised for this twin; new ids continue from there.
pub fn check_alerts(
    reading: &BiometricReading,
    thresholds: &AlertThresholds,
    issued: usize,
) -> Vec<HealthAlert> {
    let m = &reading.metrics;
    let mut raised: Vec<(AlertKind, String, Vec<(&str, f32)>)> = Vec::new();

    if m.heart_rate < thresholds.heart_rate_low {
        raised.push((
            AlertKind::LowHeartRate,
            format!("Low heart rate detected: {:.0} bpm", m.heart_rate),
            vec![("heart_rate", m.heart_rate)],
        ));
    } else if m.heart_rate > thresholds.heart_rate_high {
        raised.push((
            AlertKind::HighHeartRate,
            format!("Elevated heart rate detected: {:.0} bpm", m.heart_rate),
            vec![("heart_rate", m.heart_rate)],
        ));
    }

    if m.blood_pressure_systolic > thresholds.systolic_high
        || m.blood_pressure_diastolic > thresholds.diastolic_high
    {
        raised.push((
            AlertKind::HighBloodPressure,
            format!(
                "High blood pressure detected: {:.0}/{:.0}",
                m.blood_pressure_systolic, m.blood_pressure_diastolic
            ),
            vec![
                ("systolic", m.blood_pressure_systolic),
                ("diastolic", m.blood_pressure_diastolic),
            ],
        ));
    }

    if m.oxygen_saturation < thresholds.oxygen_low {
        raised.push((
            AlertKind::LowOxygenSaturation,
            format!("Low oxygen saturation detected: {:.1}%", m.oxygen_saturation),
            vec![("oxygen_saturation", m.oxygen_saturation)],
        ));
    }

    if m.temperature > thresholds.temperature_high {
        raised.push((
            AlertKind::HighTemperature,
            format!("Elevated temperature detected: {:.1}°F", m.temperature),
            vec![("temperature", m.temperature)],
        ));
    }

    if m.stress_level > thresholds.stress_high {
        raised.push((
            AlertKind::HighStress,
            format!("High stress level detected: {:.2}", m.stress_level),
            vec![("stress_level", m.stress_level)],
        ));
    }

    raised
        .into_iter()
        .enumerate()
        .map(|(i, (kind, message, metrics))| {
            HealthAlert::new(kind, issued + i + 1, message, reading, &metrics)
        })
        .collect()
}
