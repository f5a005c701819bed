use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

// ============================================================================
// Top-level config
// ============================================================================

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TwinSystemConfig {
    pub scheduler: SchedulerConfig,
    pub retention: RetentionConfig,
    pub thresholds: ThresholdConfig,
    pub classifier: Option<ClassifierConfig>,
    pub synthetic: SyntheticDataConfig,
    pub logging: LoggingConfig,
}

impl TwinSystemConfig {
    /// Load config from a TOML file, falling back to defaults for missing fields.
    /// After loading, env var overrides are applied.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;
        let mut config: TwinSystemConfig =
            toml::from_str(&content).with_context(|| "Failed to parse TOML config")?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Try to load from path; if the file is missing or invalid, return
    /// defaults with env overrides.
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Self {
        match Self::load(path) {
            Ok(cfg) => cfg,
            Err(e) => {
                tracing::info!("Config file not found or invalid ({}), using defaults", e);
                let mut cfg = Self::default();
                cfg.apply_env_overrides();
                cfg
            }
        }
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("HEALTH_UPDATE_INTERVAL") {
            if let Ok(n) = v.parse() {
                self.scheduler.health_update_interval_secs = n;
            }
        }
        if let Ok(v) = std::env::var("PERSONALITY_UPDATE_INTERVAL") {
            if let Ok(n) = v.parse() {
                self.scheduler.personality_update_interval_secs = n;
            }
        }
        if let Ok(v) = std::env::var("LOG_LEVEL") {
            self.logging.level = v.to_lowercase();
        }
        if let Ok(v) = std::env::var("SYNTHETIC_DATA_PATH") {
            self.synthetic.data_dir = Some(PathBuf::from(v));
        }
        // Classifier env overrides
        if let Ok(key) = std::env::var("HUGGINGFACE_API_KEY") {
            self.classifier.get_or_insert_with(ClassifierConfig::default).api_key = Some(key);
        }
        if let Ok(url) = std::env::var("CLASSIFIER_BASE_URL") {
            self.classifier.get_or_insert_with(ClassifierConfig::default).base_url = url;
        }
    }
}

// ============================================================================
// Sub-configs
// ============================================================================

/// Background loop cadence.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    pub health_update_interval_secs: u64,
    pub personality_update_interval_secs: u64,
    pub behavior_update_interval_secs: u64,
    pub data_regeneration_interval_secs: u64,
    /// Sleep after a failed loop iteration before the next attempt.
    pub error_backoff_secs: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            health_update_interval_secs: 60,
            personality_update_interval_secs: 300,
            behavior_update_interval_secs: 30,
            data_regeneration_interval_secs: 300,
            error_backoff_secs: 10,
        }
    }
}

impl SchedulerConfig {
    pub fn health_interval(&self) -> Duration {
        Duration::from_secs(self.health_update_interval_secs.max(1))
    }

    pub fn personality_interval(&self) -> Duration {
        Duration::from_secs(self.personality_update_interval_secs.max(1))
    }

    pub fn behavior_interval(&self) -> Duration {
        Duration::from_secs(self.behavior_update_interval_secs.max(1))
    }

    pub fn data_interval(&self) -> Duration {
        Duration::from_secs(self.data_regeneration_interval_secs.max(1))
    }

    pub fn backoff(&self) -> Duration {
        Duration::from_secs(self.error_backoff_secs)
    }
}

/// Upper bounds on per-twin logs. Oldest entries are dropped first.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RetentionConfig {
    pub max_conversation_history: usize,
    /// Tracked conversation contexts; the one idle longest goes first.
    pub max_conversations: usize,
    pub max_interaction_log: usize,
    pub max_behavior_patterns: usize,
    pub max_health_history: usize,
    pub max_learning_history: usize,
    pub max_behavior_history: usize,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            max_conversation_history: 500,
            max_conversations: 100,
            max_interaction_log: 1000,
            max_behavior_patterns: 200,
            // one day of readings at the default 5 minute cadence
            max_health_history: 288,
            max_learning_history: 200,
            max_behavior_history: 200,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ThresholdConfig {
    /// Minimum decision confidence treated as a firm choice.
    pub decision_making_threshold: f32,
    pub outcome: OutcomeThresholds,
    pub alerts: AlertThresholds,
}

impl Default for ThresholdConfig {
    fn default() -> Self {
        Self {
            decision_making_threshold: 0.7,
            outcome: OutcomeThresholds::default(),
            alerts: AlertThresholds::default(),
        }
    }
}

/// Success-probability cut points for behavior outcomes.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OutcomeThresholds {
    pub excellent: f32,
    pub good: f32,
    pub significant_failure: f32,
}

impl Default for OutcomeThresholds {
    fn default() -> Self {
        Self {
            excellent: 0.8,
            good: 0.6,
            significant_failure: 0.3,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AlertThresholds {
    pub heart_rate_low: f32,
    pub heart_rate_high: f32,
    pub systolic_high: f32,
    pub diastolic_high: f32,
    pub oxygen_low: f32,
    pub temperature_high: f32,
    pub stress_high: f32,
}

impl Default for AlertThresholds {
    fn default() -> Self {
        Self {
            heart_rate_low: 50.0,
            heart_rate_high: 100.0,
            systolic_high: 140.0,
            diastolic_high: 90.0,
            oxygen_low: 95.0,
            temperature_high: 99.5,
            stress_high: 0.8,
        }
    }
}

/// Remote text-classification backend (Hugging Face inference API shape).
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    pub sentiment_model: String,
    pub intent_model: String,
    pub emotion_model: String,
    pub embedding_model: String,
    pub timeout_secs: u64,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api-inference.huggingface.co".to_string(),
            api_key: None,
            sentiment_model: "cardiffnlp/twitter-roberta-base-sentiment-latest".to_string(),
            intent_model: "facebook/bart-large-mnli".to_string(),
            emotion_model: "j-hartmann/emotion-english-distilroberta-base".to_string(),
            embedding_model: "sentence-transformers/all-MiniLM-L6-v2".to_string(),
            timeout_secs: 10,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SyntheticDataConfig {
    /// When set, regenerated datasets are also written here as JSON.
    pub data_dir: Option<PathBuf>,
    pub personality_profiles: usize,
    pub health_baselines: usize,
    pub behavior_patterns: usize,
}

impl Default for SyntheticDataConfig {
    fn default() -> Self {
        Self {
            data_dir: None,
            personality_profiles: 100,
            health_baselines: 100,
            behavior_patterns: 50,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub json: bool,
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
            file: None,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
