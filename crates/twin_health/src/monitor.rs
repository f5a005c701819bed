use crate::alerts::{check_alerts, recent_alerts, HealthAlert};
use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use twin_core::config::AlertThresholds;
use twin_core::generators::generate_health_metrics;
use twin_core::{
    BiometricReading, DayPart, HealthMetrics, Metric, PersonalityTraits, TwinError, TwinProfile,
};

// ============================================================================
// Labels
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityLevel {
    Low,
    #[default]
    Moderate,
    High,
}

impl ActivityLevel {
    pub fn from_label(label: &str) -> Self {
        match label {
            "low" | "light" => ActivityLevel::Low,
            "high" | "intense" => ActivityLevel::High,
            _ => ActivityLevel::Moderate,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ActivityLevel::Low => "low",
            ActivityLevel::Moderate => "moderate",
            ActivityLevel::High => "high",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
    Healthy,
    HighStress,
    LowEnergy,
    ElevatedHeartRate,
}

impl HealthStatus {
    /// First matching condition wins: stress, then energy, then heart rate.
    pub fn of(metrics: &HealthMetrics) -> Self {
        if metrics.stress_level > 0.8 {
            HealthStatus::HighStress
        } else if metrics.energy_level < 0.3 {
            HealthStatus::LowEnergy
        } else if metrics.heart_rate > 100.0 {
            HealthStatus::ElevatedHeartRate
        } else {
            HealthStatus::Healthy
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            HealthStatus::Healthy => "healthy",
            HealthStatus::HighStress => "high_stress",
            HealthStatus::LowEnergy => "low_energy",
            HealthStatus::ElevatedHeartRate => "elevated_heart_rate",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthSummary {
    pub status: HealthStatus,
    pub latest_reading: Option<BiometricReading>,
    /// Alerts raised in the last 24 hours.
    pub alerts_count: usize,
    pub trends_count: usize,
}

impl HealthSummary {
    pub fn build(
        metrics: &HealthMetrics,
        history: &[BiometricReading],
        alerts: &[HealthAlert],
        trends_count: usize,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            status: HealthStatus::of(metrics),
            latest_reading: history.last().cloned(),
            alerts_count: recent_alerts(alerts, 24, now).len(),
            trends_count,
        }
    }
}

// ============================================================================
// Derived metrics
// ============================================================================

/// Stress from cardiovascular load plus rush-hour pressure.
pub fn calculate_stress<R: Rng + ?Sized>(
    heart_rate: f32,
    systolic: f32,
    diastolic: f32,
    daypart: DayPart,
    rng: &mut R,
) -> f32 {
    let mut score: f32 = 0.0;
    if heart_rate > 90.0 {
        score += 0.3;
    } else if heart_rate > 80.0 {
        score += 0.2;
    }
    if systolic > 130.0 || diastolic > 85.0 {
        score += 0.3;
    } else if systolic > 120.0 || diastolic > 80.0 {
        score += 0.1;
    }
    if matches!(daypart, DayPart::Morning | DayPart::Evening) {
        score += 0.1;
    }
    (score + rng.gen_range(-0.1..=0.1f32)).clamp(0.0, 1.0)
}

pub fn calculate_energy<R: Rng + ?Sized>(
    heart_rate: f32,
    oxygen: f32,
    daypart: DayPart,
    activity: ActivityLevel,
    rng: &mut R,
) -> f32 {
    let mut score: f32 = 0.8;
    if oxygen < 96.0 {
        score -= 0.2;
    } else if oxygen > 99.0 {
        score += 0.1;
    }
    if (60.0..=80.0).contains(&heart_rate) {
        score += 0.1;
    } else if heart_rate > 100.0 {
        score -= 0.2;
    }
    score += match daypart {
        DayPart::Morning => 0.1,
        DayPart::Afternoon => 0.05,
        DayPart::Evening => -0.1,
        DayPart::Night => -0.3,
    };
    score += match activity {
        ActivityLevel::High => -0.2,
        ActivityLevel::Low => 0.1,
        ActivityLevel::Moderate => 0.0,
    };
    (score + rng.gen_range(-0.1..=0.1f32)).clamp(0.1, 1.0)
}

pub fn calculate_sleep_quality<R: Rng + ?Sized>(
    daypart: DayPart,
    stress: f32,
    energy: f32,
    rng: &mut R,
) -> f32 {
    let mut score: f32 = 0.7;
    if stress > 0.7 {
        score -= 0.3;
    } else if stress < 0.3 {
        score += 0.2;
    }
    if energy < 0.4 {
        score += 0.2;
    } else if energy > 0.8 {
        score -= 0.1;
    }
    match daypart {
        DayPart::Night => score += 0.1,
        DayPart::Morning => score -= 0.2,
        _ => {}
    }
    (score + rng.gen_range(-0.1..=0.1f32)).clamp(0.1, 1.0)
}

// ============================================================================
// Generators
// ============================================================================

/// One synthetic reading for the given demographics and situation.
pub fn generate_reading<R: Rng + ?Sized>(
    age: u32,
    gender: &str,
    activity: ActivityLevel,
    daypart: DayPart,
    rng: &mut R,
) -> BiometricReading {
    let mut heart_rate = 72.0f32;
    let mut systolic = 120.0f32;
    let diastolic = 80.0f32;
    let mut temperature = 98.6f32;
    let mut oxygen = 98.0f32;
    let respiratory = 16.0f32;

    if age < 25 {
        heart_rate += rng.gen_range(-5.0..=5.0f32);
        systolic += rng.gen_range(-10.0..=10.0f32);
    } else if age > 50 {
        heart_rate += rng.gen_range(-3.0..=3.0f32);
        systolic += rng.gen_range(5.0..=20.0f32);
    }

    if gender.eq_ignore_ascii_case("female") {
        heart_rate += rng.gen_range(2.0..=8.0f32);
        systolic += rng.gen_range(-5.0..=5.0f32);
    }

    match activity {
        ActivityLevel::High => {
            heart_rate += rng.gen_range(10.0..=30.0f32);
            systolic += rng.gen_range(10.0..=25.0f32);
            temperature += rng.gen_range(0.5..=1.5f32);
        }
        ActivityLevel::Low => {
            heart_rate += rng.gen_range(-5.0..=5.0f32);
            temperature += rng.gen_range(-0.5..=0.5f32);
        }
        ActivityLevel::Moderate => {}
    }

    match daypart {
        DayPart::Morning => {
            heart_rate += rng.gen_range(-3.0..=3.0f32);
            oxygen += rng.gen_range(0.5..=1.0f32);
        }
        DayPart::Night => {
            heart_rate += rng.gen_range(-5.0..=2.0f32);
            temperature += rng.gen_range(-0.5..=0.2f32);
        }
        _ => {}
    }

    let heart_rate = (heart_rate + rng.gen_range(-5.0..=5.0f32)).clamp(50.0, 120.0);
    let systolic = (systolic + rng.gen_range(-8.0..=8.0f32)).clamp(90.0, 160.0);
    let diastolic = (diastolic + rng.gen_range(-5.0..=5.0f32)).clamp(60.0, 100.0);
    let temperature = (temperature + rng.gen_range(-0.3..=0.3f32)).clamp(97.0, 100.0);
    let oxygen = (oxygen + rng.gen_range(-1.0..=1.0f32)).clamp(95.0, 100.0);
    let respiratory = (respiratory + rng.gen_range(-2.0..=2.0f32)).clamp(12.0, 20.0);

    let stress_level = calculate_stress(heart_rate, systolic, diastolic, daypart, rng);
    let energy_level = calculate_energy(heart_rate, oxygen, daypart, activity, rng);
    let sleep_quality = calculate_sleep_quality(daypart, stress_level, energy_level, rng);

    BiometricReading::now(HealthMetrics {
        heart_rate,
        blood_pressure_systolic: systolic,
        blood_pressure_diastolic: diastolic,
        temperature,
        oxygen_saturation: oxygen,
        respiratory_rate: respiratory,
        stress_level,
        energy_level,
        sleep_quality,
    })
}

/// Resting baseline banded by age: younger twins run a lower heart rate
/// and more energy.
pub fn generate_baseline<R: Rng + ?Sized>(age: u32, rng: &mut R) -> HealthMetrics {
    let (heart_rate, energy_level) = if age < 25 {
        (rng.gen_range(65.0..=85.0f32), rng.gen_range(0.7..=0.95f32))
    } else if age < 50 {
        (rng.gen_range(70.0..=90.0f32), rng.gen_range(0.6..=0.85f32))
    } else {
        (rng.gen_range(75.0..=95.0f32), rng.gen_range(0.5..=0.75f32))
    };
    let mut metrics = HealthMetrics {
        heart_rate,
        blood_pressure_systolic: rng.gen_range(100..=140) as f32,
        blood_pressure_diastolic: rng.gen_range(60..=90) as f32,
        temperature: rng.gen_range(97.5..=99.2f32),
        oxygen_saturation: rng.gen_range(96.0..=99.5f32),
        respiratory_rate: rng.gen_range(12.0..=20.0f32),
        stress_level: rng.gen_range(0.1..=0.6f32),
        energy_level,
        sleep_quality: rng.gen_range(0.5..=0.9f32),
    };
    metrics.normalize();
    metrics
}

/// Periodic drift of the live metrics. More than a day since the last
/// update produces daily-scale variation, otherwise hourly-scale.
/// Anxious personalities carry extra stress either way.
pub fn synthetic_update<R: Rng + ?Sized>(
    current: &HealthMetrics,
    traits: &PersonalityTraits,
    elapsed: chrono::Duration,
    rng: &mut R,
) -> HealthMetrics {
    let variation: f32 = rng.gen_range(-0.1..=0.1f32);
    let mut stress_modifier: f32 = 0.0;
    if traits.neuroticism > 0.7 {
        stress_modifier += 0.1;
    }
    if traits.emotional_stability < 0.3 {
        stress_modifier += 0.1;
    }

    let mut next = *current;
    if elapsed.num_days() > 1 {
        next.heart_rate = (72.0 + rng.gen_range(-5.0..=5.0f32) + variation * 10.0).clamp(50.0, 120.0);
        next.stress_level = (0.3 + stress_modifier + variation).clamp(0.0, 1.0);
        next.energy_level = (0.8 + variation).clamp(0.0, 1.0);
        next.sleep_quality = (0.7 + variation).clamp(0.0, 1.0);
    } else {
        next.heart_rate = (72.0 + rng.gen_range(-3.0..=3.0f32)).clamp(50.0, 120.0);
        next.stress_level =
            (0.3 + stress_modifier + rng.gen_range(-0.05..=0.05f32)).clamp(0.0, 1.0);
        next.energy_level = (0.8 + rng.gen_range(-0.1..=0.1f32)).clamp(0.0, 1.0);
    }
    next.normalize();
    next
}

// ============================================================================
// HealthModel
// ============================================================================

/// Health engine seam used by the twin aggregate.
pub trait HealthModel: Send + Sync {
    /// Initial metrics for a new twin.
    fn baseline(&self, profile: &TwinProfile) -> Result<HealthMetrics, TwinError>;

    fn update(
        &self,
        current: &HealthMetrics,
        traits: &PersonalityTraits,
        elapsed: chrono::Duration,
    ) -> Result<HealthMetrics, TwinError>;

    fn reading(
        &self,
        profile: &TwinProfile,
        activity: ActivityLevel,
        daypart: DayPart,
    ) -> Result<BiometricReading, TwinError>;

    /// `issued` is the number of alerts this twin has already received.
    fn check_alerts(&self, reading: &BiometricReading, issued: usize) -> Vec<HealthAlert>;
}

#[derive(Debug, Clone, Default)]
pub struct HealthMonitor {
    pub thresholds: AlertThresholds,
}

impl HealthMonitor {
    pub fn new(thresholds: AlertThresholds) -> Self {
        Self { thresholds }
    }
}

fn ensure_finite(metrics: HealthMetrics) -> Result<HealthMetrics, TwinError> {
    match metrics.first_non_finite() {
        Some(_) => Err(TwinError::NonFinite { field: "health" }),
        None => Ok(metrics),
    }
}

impl HealthModel for HealthMonitor {
    fn baseline(&self, profile: &TwinProfile) -> Result<HealthMetrics, TwinError> {
        let mut rng = rand::thread_rng();
        ensure_finite(generate_health_metrics(
            profile.age_group(),
            &profile.gender,
            &mut rng,
        ))
    }

    fn update(
        &self,
        current: &HealthMetrics,
        traits: &PersonalityTraits,
        elapsed: chrono::Duration,
    ) -> Result<HealthMetrics, TwinError> {
        let next = synthetic_update(current, traits, elapsed, &mut rand::thread_rng());
        tracing::debug!(
            days = elapsed.num_days(),
            heart_rate = next.heart_rate,
            stress = next.stress_level,
            "synthetic health update"
        );
        ensure_finite(next)
    }

    fn reading(
        &self,
        profile: &TwinProfile,
        activity: ActivityLevel,
        daypart: DayPart,
    ) -> Result<BiometricReading, TwinError> {
        let reading = generate_reading(
            profile.age,
            &profile.gender,
            activity,
            daypart,
            &mut rand::thread_rng(),
        );
        if let Some(m) = reading.metrics.first_non_finite() {
            return Err(TwinError::invalid(m.as_str(), "non-finite reading"));
        }
        Ok(reading)
    }

    fn check_alerts(&self, reading: &BiometricReading, issued: usize) -> Vec<HealthAlert> {
        let alerts = check_alerts(reading, &self.thresholds, issued);
        if !alerts.is_empty() {
            tracing::info!("Generated {} health alerts", alerts.len());
        }
        alerts
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    /// Metrics that a synthetic update is allowed to touch.
    const DRIFTING_METRICS: [Metric; 4] = [
        Metric::HeartRate,
        Metric::StressLevel,
        Metric::EnergyLevel,
        Metric::SleepQuality,
    ];

    fn rng() -> StdRng {
        StdRng::seed_from_u64(7)
    }

    #[test]
    fn test_status_priority() {
        let mut m = HealthMetrics::default();
        assert_eq!(HealthStatus::of(&m), HealthStatus::Healthy);
        m.heart_rate = 110.0;
        assert_eq!(HealthStatus::of(&m), HealthStatus::ElevatedHeartRate);
        m.energy_level = 0.2;
        assert_eq!(HealthStatus::of(&m), HealthStatus::LowEnergy);
        m.stress_level = 0.9;
        assert_eq!(HealthStatus::of(&m).as_str(), "high_stress");
    }

    #[test]
    fn test_stress_rules() {
        let mut r = rng();
        // 0.3 + 0.3 + 0.1 +- 0.1
        let s = calculate_stress(95.0, 135.0, 80.0, DayPart::Morning, &mut r);
        assert!((0.59..=0.81).contains(&s), "{s}");
        let s = calculate_stress(70.0, 110.0, 70.0, DayPart::Afternoon, &mut r);
        assert!((0.0..=0.11).contains(&s), "{s}");
    }

    #[test]
    fn test_energy_floor() {
        let mut r = rng();
        for _ in 0..50 {
            let e = calculate_energy(110.0, 95.0, DayPart::Night, ActivityLevel::High, &mut r);
            assert!((0.1..=1.0).contains(&e));
        }
    }

    #[test]
    fn test_reading_respects_clamps() {
        let mut r = rng();
        for age in [15, 35, 70] {
            for activity in [ActivityLevel::Low, ActivityLevel::Moderate, ActivityLevel::High] {
                let m = generate_reading(age, "female", activity, DayPart::Morning, &mut r).metrics;
                assert!((50.0..=120.0).contains(&m.heart_rate));
                assert!((90.0..=160.0).contains(&m.blood_pressure_systolic));
                assert!((60.0..=100.0).contains(&m.blood_pressure_diastolic));
                assert!((97.0..=100.0).contains(&m.temperature));
                assert!((95.0..=100.0).contains(&m.oxygen_saturation));
                assert!((12.0..=20.0).contains(&m.respiratory_rate));
                assert!(m.within_ranges());
            }
        }
    }

    #[test]
    fn test_baseline_bands() {
        let mut r = rng();
        for _ in 0..20 {
            let young = generate_baseline(20, &mut r);
            assert!((65.0..=85.0).contains(&young.heart_rate));
            assert!(young.energy_level >= 0.7);
            let old = generate_baseline(65, &mut r);
            assert!((75.0..=95.0).contains(&old.heart_rate));
            assert!(old.energy_level <= 0.75);
        }
    }

    #[test]
    fn test_hourly_update_keeps_sleep_and_vitals() {
        let mut current = HealthMetrics::default();
        current.sleep_quality = 0.42;
        current.temperature = 99.1;
        let traits = PersonalityTraits::default();
        let next = synthetic_update(&current, &traits, Duration::hours(1), &mut rng());
        assert_eq!(next.sleep_quality, 0.42);
        assert_eq!(next.temperature, 99.1);
        assert!((69.0..=75.0).contains(&next.heart_rate));
        assert!((0.24..=0.36).contains(&next.stress_level));
    }

    #[test]
    fn test_daily_update_touches_sleep() {
        let current = HealthMetrics {
            sleep_quality: 0.1,
            ..HealthMetrics::default()
        };
        let next = synthetic_update(
            &current,
            &PersonalityTraits::default(),
            Duration::days(3),
            &mut rng(),
        );
        assert!((0.59..=0.81).contains(&next.sleep_quality));
    }

    #[test]
    fn test_anxious_personality_biases_stress() {
        let mut traits = PersonalityTraits::default();
        traits.neuroticism = 0.9;
        traits.emotional_stability = 0.1;
        let next = synthetic_update(
            &HealthMetrics::default(),
            &traits,
            Duration::zero(),
            &mut rng(),
        );
        // 0.3 + 0.2 +- 0.05
        assert!((0.44..=0.56).contains(&next.stress_level));
    }

    #[test]
    fn test_only_drifting_metrics_change_hourly() {
        let current = HealthMetrics::default();
        let next = synthetic_update(
            &current,
            &PersonalityTraits::default(),
            Duration::minutes(5),
            &mut rng(),
        );
        for m in Metric::ALL {
            if !DRIFTING_METRICS.contains(&m) {
                assert_eq!(current.get(m), next.get(m), "{}", m.as_str());
            }
        }
    }

    #[test]
    fn test_monitor_baseline_and_alert_logging() {
        let monitor = HealthMonitor::default();
        let profile = TwinProfile::default();
        let metrics = monitor.baseline(&profile).unwrap();
        assert!(metrics.within_ranges());

        let reading = BiometricReading::now(HealthMetrics {
            heart_rate: 45.0,
            ..HealthMetrics::default()
        });
        assert_eq!(monitor.check_alerts(&reading, 0).len(), 1);
    }

    #[test]
    fn test_summary_counts_recent_alerts() {
        let monitor = HealthMonitor::default();
        let reading = BiometricReading::now(HealthMetrics {
            stress_level: 0.95,
            ..HealthMetrics::default()
        });
        let alerts = monitor.check_alerts(&reading, 0);
        let summary = HealthSummary::build(
            &reading.metrics,
            std::slice::from_ref(&reading),
            &alerts,
            3,
            Utc::now(),
        );
        assert_eq!(summary.status, HealthStatus::HighStress);
        assert_eq!(summary.alerts_count, 1);
        assert_eq!(summary.trends_count, 3);
        assert!(summary.latest_reading.is_some());
    }

    #[test]
    fn test_activity_labels() {
        assert_eq!(ActivityLevel::from_label("intense"), ActivityLevel::High);
        assert_eq!(ActivityLevel::from_label("light"), ActivityLevel::Low);
        assert_eq!(ActivityLevel::from_label("whatever"), ActivityLevel::Moderate);
    }
}
