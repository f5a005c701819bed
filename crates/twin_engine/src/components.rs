//! The engines every twin shares.

use std::sync::Arc;
use twin_behavior::{BehaviorModel, BehaviorSimulator};
use twin_conversation::{HuggingFaceClassifier, TextClassifier};
use twin_core::evolution::EvolutionParams;
use twin_core::{DefaultPersonalityModel, PersonalityModel, TwinSystemConfig};
use twin_health::{HealthModel, HealthMonitor};

/// Engine handles injected into each twin. A missing engine disables the
/// matching periodic update and interaction handler for every twin.
#[derive(Clone, Default)]
pub struct Components {
    pub personality: Option<Arc<dyn PersonalityModel>>,
    pub health: Option<Arc<dyn HealthModel>>,
    pub behavior: Option<Arc<dyn BehaviorModel>>,
    /// Set only when the classifier passed its startup health check.
    pub classifier: Option<Arc<dyn TextClassifier>>,
}

impl std::fmt::Debug for Components {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Components")
            .field("personality", &self.personality.is_some())
            .field("health", &self.health.is_some())
            .field("behavior", &self.behavior.is_some())
            .field(
                "classifier",
                &self.classifier.as_ref().map(|c| c.name().to_string()),
            )
            .finish()
    }
}

impl Components {
    /// Rule-based engines configured from thresholds, no classifier.
    pub fn from_config(config: &TwinSystemConfig) -> Self {
        Self {
            personality: Some(Arc::new(DefaultPersonalityModel::new(
                EvolutionParams::default(),
            ))),
            health: Some(Arc::new(HealthMonitor::new(
                config.thresholds.alerts.clone(),
            ))),
            behavior: Some(Arc::new(BehaviorSimulator::new(
                config.thresholds.outcome.clone(),
            ))),
            classifier: None,
        }
    }

    /// Like [`Components::from_config`], plus the HTTP classifier when one is
    /// configured and reachable. The check runs once; a failed check leaves
    /// conversation on the rule-based path for the life of the process.
    pub async fn initialize(config: &TwinSystemConfig) -> Self {
        let mut components = Self::from_config(config);
        let Some(classifier_config) = &config.classifier else {
            return components;
        };

        let classifier = match HuggingFaceClassifier::new(classifier_config) {
            Ok(c) => c,
            Err(e) => {
                tracing::warn!("Classifier disabled: {}", e);
                return components;
            }
        };
        match classifier.health_check().await {
            Ok(()) => {
                tracing::info!("Text classifier '{}' available", classifier.name());
                components.classifier = Some(Arc::new(classifier));
            }
            Err(e) => {
                tracing::warn!(
                    "Text classifier '{}' unavailable, using rule-based analysis: {}",
                    classifier.name(),
                    e
                );
            }
        }
        components
    }

    pub fn with_classifier(mut self, classifier: Arc<dyn TextClassifier>) -> Self {
        self.classifier = Some(classifier);
        self
    }

    /// Which engines are wired in, by name.
    pub fn initialized(&self) -> Vec<(&'static str, bool)> {
        vec![
            ("personality_model", self.personality.is_some()),
            ("health_monitor", self.health.is_some()),
            ("behavior_simulator", self.behavior.is_some()),
            ("conversation_engine", true),
            ("text_classifier", self.classifier.is_some()),
        ]
    }
}
