//! # Twin Health
//!
//! Synthetic physiology for digital twins:
//!
//! - `monitor`: one-shot biometric readings, derived stress/energy/sleep,
//!   age-banded baselines and the periodic drift update
//! - `alerts`: threshold checks that turn a reading into zero or more alerts
//! - `trends`: direction and confidence of recent metric movement

pub mod alerts;
pub mod monitor;
pub mod trends;

pub use alerts::{check_alerts, recent_alerts, AlertKind, HealthAlert, Severity};
pub use monitor::{ActivityLevel, HealthModel, HealthMonitor, HealthStatus, HealthSummary};
pub use trends::{analyze_trend, analyze_trends, HealthTrend, TrendDirection};

#[cfg(test)]
mod tests {
    #[test]
    fn test_package_is_described() {
        assert!(env!("CARGO_PKG_DESCRIPTION").contains("digital twins"));
    }
}
