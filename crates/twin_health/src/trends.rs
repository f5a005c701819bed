//! Short-window trend analysis over biometric history.

use serde::{Deserialize, Serialize};
use twin_core::{BiometricReading, Metric};

/// Readings considered per trend.
pub const TREND_WINDOW: usize = 5;
/// Fewer readings than this and no trend is reported.
pub const MIN_READINGS: usize = 3;
const STABLE_RATE: f32 = 0.01;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrendDirection {
    Improving,
    Stable,
    Declining,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthTrend {
    pub metric_name: Metric,
    pub trend_direction: TrendDirection,
    pub change_rate: f32,
    pub confidence: f32,
    pub time_period: String,
    pub factors: Vec<String>,
}

/// Judge a series of values for one metric. Whether rising is good depends
/// on the metric: more energy is improving, a rising heart rate is not.
pub fn analyze_trend(values: &[f32], metric: Metric) -> Option<HealthTrend> {
    if values.len() < MIN_READINGS {
        return None;
    }
    let (first, last) = (values[0], values[values.len() - 1]);
    let n = values.len() as f32;
    let change_rate = (last - first) / n;

    let trend_direction = if change_rate.abs() < STABLE_RATE {
        TrendDirection::Stable
    } else if (change_rate > 0.0) == metric.higher_is_better() {
        TrendDirection::Improving
    } else {
        TrendDirection::Declining
    };

    let mean = values.iter().sum::<f32>() / n;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f32>() / n;
    let confidence = (1.0 - variance / 100.0).clamp(0.1, 1.0);

    Some(HealthTrend {
        metric_name: metric,
        trend_direction,
        change_rate,
        confidence,
        time_period: "recent".to_string(),
        factors: vec![
            "biometric_variation".to_string(),
            "lifestyle_changes".to_string(),
        ],
    })
}

/// Trends for every metric over the last [`TREND_WINDOW`] readings.
pub fn analyze_trends(history: &[BiometricReading]) -> Vec<HealthTrend> {
    let window = &history[history.len().saturating_sub(TREND_WINDOW)..];
    Metric::ALL
        .into_iter()
        .filter_map(|metric| {
            let values: Vec<f32> = window.iter().map(|r| r.metrics.get(metric)).collect();
            analyze_trend(&values, metric)
        })
        .collect()
}
