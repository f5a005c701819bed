//! The digital twin aggregate.
//!
//! A twin owns its profile, personality, health and behavior state plus the
//! logs that feed evolution. Every mutation is computed on a copy and
//! committed only when the engine call succeeds, so a failed update leaves
//! the previous state in place. Periodic self-updates never propagate
//! errors: they log and report whether anything was committed.

use crate::components::Components;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Arc;
use twin_behavior::{
    predict_behavior, reconcile, BehaviorEvent, BehaviorModel, BehaviorSummary, Reconciliation,
};
use twin_conversation::templates::current_hour;
use twin_conversation::{
    ConversationEngine, ConversationOverview, ConversationReply, MessageAnalysis, TextClassifier,
};
use twin_core::config::{RetentionConfig, TwinSystemConfig};
use twin_core::context::to_context;
use twin_core::evolution::MoodContext;
use twin_core::{
    push_bounded, BehaviorCategory, BehaviorPattern, BiometricReading, ContextExt, ContextMap,
    DayPart, HealthMetrics, Intent, InteractionOutcome, InteractionRecord, LearningEvent,
    MoodSnapshot, PersonalityTraits, Sentiment, TwinError, TwinProfile,
};
use twin_health::{
    analyze_trends, recent_alerts, ActivityLevel, HealthAlert, HealthModel, HealthStatus,
    HealthSummary,
};
use uuid::Uuid;

pub const INITIAL_MOOD: &str = "neutral";
pub const INITIAL_ACTIVITY: &str = "idle";
pub const INITIAL_ENERGY: f32 = 0.8;

/// Conversation entries reported by [`DigitalTwin::state`].
const RECENT_CONVERSATIONS: usize = 10;
/// Share of a simulated activity's energy cost charged to the twin.
const BEHAVIOR_ENERGY_SCALE: f32 = 0.1;
const DEFAULT_ALERT_WINDOW_HOURS: i64 = 24;

// ============================================================================
// Interaction types
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InteractionKind {
    Conversation,
    HealthQuery,
    BehaviorRequest,
    VisualUpdate,
}

impl InteractionKind {
    pub fn from_label(label: &str) -> Option<Self> {
        match label {
            "conversation" => Some(InteractionKind::Conversation),
            "health_query" => Some(InteractionKind::HealthQuery),
            "behavior_request" => Some(InteractionKind::BehaviorRequest),
            "visual_update" => Some(InteractionKind::VisualUpdate),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            InteractionKind::Conversation => "conversation",
            InteractionKind::HealthQuery => "health_query",
            InteractionKind::BehaviorRequest => "behavior_request",
            InteractionKind::VisualUpdate => "visual_update",
        }
    }
}

/// Mood, activity and energy changes requested by a handler.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StateDeltas {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mood_change: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub activity_change: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub energy_change: Option<f32>,
}

impl StateDeltas {
    pub fn is_empty(&self) -> bool {
        self.mood_change.is_none() && self.activity_change.is_none() && self.energy_change.is_none()
    }
}

struct HandlerOutput {
    payload: Value,
    deltas: StateDeltas,
    outcome: Option<InteractionOutcome>,
    learning: Option<LearningEvent>,
}

impl HandlerOutput {
    fn payload(payload: Value) -> Self {
        Self {
            payload,
            deltas: StateDeltas::default(),
            outcome: None,
            learning: None,
        }
    }

    fn message(message: &str) -> Self {
        Self::payload(json!({ "message": message }))
    }
}

/// Fields of a conversation request, with the twin's state folded into the
/// context under `twin_state`.
#[derive(Debug, Clone)]
pub struct ConversationRequest {
    pub message: String,
    pub sender: String,
    pub context: ContextMap,
}

#[derive(Debug, Clone, Serialize)]
pub struct TwinStateStamp {
    pub mood: String,
    pub activity: String,
    pub energy: f32,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct InteractionResponse {
    pub interaction_id: String,
    pub response: Value,
    pub twin_state: TwinStateStamp,
}

#[derive(Debug, Clone, Serialize)]
pub struct ConversationEntry {
    pub timestamp: DateTime<Utc>,
    pub user_message: String,
    pub twin_response: String,
    pub context: ContextMap,
    pub conversation_id: String,
    pub metadata: ConversationReply,
}

// ============================================================================
// Views
// ============================================================================

/// Vital signs as reported outward, blood pressure as `systolic/diastolic`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HealthView {
    pub heart_rate: f32,
    pub blood_pressure: String,
    pub temperature: f32,
    pub oxygen_saturation: f32,
    pub stress_level: f32,
    pub energy_level: f32,
}

impl From<&HealthMetrics> for HealthView {
    fn from(m: &HealthMetrics) -> Self {
        Self {
            heart_rate: m.heart_rate,
            blood_pressure: format!(
                "{:.0}/{:.0}",
                m.blood_pressure_systolic, m.blood_pressure_diastolic
            ),
            temperature: m.temperature,
            oxygen_saturation: m.oxygen_saturation,
            stress_level: m.stress_level,
            energy_level: m.energy_level,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CurrentState {
    pub mood: String,
    pub activity: String,
    pub energy: f32,
    pub is_active: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct Timestamps {
    pub created_at: DateTime<Utc>,
    pub last_interaction: DateTime<Utc>,
    pub last_health_update: DateTime<Utc>,
    pub last_personality_update: DateTime<Utc>,
    pub last_behavior_update: DateTime<Utc>,
}

impl Timestamps {
    fn at(now: DateTime<Utc>) -> Self {
        Self {
            created_at: now,
            last_interaction: now,
            last_health_update: now,
            last_personality_update: now,
            last_behavior_update: now,
        }
    }

    fn latest(&self) -> DateTime<Utc> {
        [
            self.last_interaction,
            self.last_health_update,
            self.last_personality_update,
            self.last_behavior_update,
        ]
        .into_iter()
        .max()
        .unwrap_or(self.created_at)
    }
}

/// Full outward record of a twin.
#[derive(Debug, Clone, Serialize)]
pub struct TwinRecord {
    pub twin_id: String,
    pub profile: TwinProfile,
    pub personality_traits: PersonalityTraits,
    pub health_metrics: HealthView,
    pub current_state: CurrentState,
    pub timestamps: Timestamps,
}

#[derive(Debug, Clone, Serialize)]
pub struct PersonalityState {
    pub traits: PersonalityTraits,
    pub current_mood: String,
    pub last_update: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct VisualState {
    pub profile: ContextMap,
    pub current_activity: String,
    pub mood: String,
    pub energy_level: f32,
}

/// Live state snapshot for dashboards.
#[derive(Debug, Clone, Serialize)]
pub struct TwinState {
    pub twin_id: String,
    pub last_update: DateTime<Utc>,
    pub health_status: HealthStatus,
    pub personality_state: PersonalityState,
    pub behavior_patterns: Vec<String>,
    pub conversation_history: Vec<ConversationEntry>,
    pub conversation_summary: ConversationOverview,
    pub visual_state: VisualState,
}

// ============================================================================
// DigitalTwin
// ============================================================================

pub struct DigitalTwin {
    twin_id: String,
    profile: TwinProfile,
    personality: PersonalityTraits,
    health: HealthMetrics,
    behavior_patterns: Vec<BehaviorPattern>,
    visual_profile: ContextMap,

    current_mood: String,
    current_activity: String,
    energy_level: f32,
    is_active: bool,

    conversation: ConversationEngine,
    conversation_history: Vec<ConversationEntry>,
    interaction_log: Vec<InteractionRecord>,
    learning_history: Vec<LearningEvent>,
    health_history: Vec<BiometricReading>,
    /// Append-only.
    health_alerts: Vec<HealthAlert>,
    behavior_history: Vec<BehaviorEvent>,

    events_simulated: usize,
    decisions_made: usize,
    patterns_created: u64,

    components: Components,
    retention: RetentionConfig,
    decision_threshold: f32,
    timestamps: Timestamps,
}

impl std::fmt::Debug for DigitalTwin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DigitalTwin")
            .field("twin_id", &self.twin_id)
            .field("name", &self.profile.name)
            .field("mood", &self.current_mood)
            .field("activity", &self.current_activity)
            .field("energy_level", &self.energy_level)
            .field("patterns", &self.behavior_patterns.len())
            .field("interactions", &self.interaction_log.len())
            .field("is_active", &self.is_active)
            .finish()
    }
}

impl DigitalTwin {
    /// Build a twin from a creation config and seed its synthetic state:
    /// personality from demographics, then the health baseline, then behavior
    /// patterns from the seeded traits and interests. Explicit
    /// `personality_profile`, `health_profile` and `visual_profile` maps in
    /// the config are applied over the seeded values.
    pub fn new(
        twin_id: impl Into<String>,
        config: &ContextMap,
        components: Components,
        system: &TwinSystemConfig,
    ) -> Result<Self, TwinError> {
        let profile = TwinProfile::from_config(config)?;
        let retention = system.retention.clone();
        let conversation = ConversationEngine::new(
            components.classifier.clone(),
            retention.max_conversation_history,
        )
        .with_max_contexts(retention.max_conversations);

        let mut twin = Self {
            twin_id: twin_id.into(),
            profile,
            personality: PersonalityTraits::default(),
            health: HealthMetrics::default(),
            behavior_patterns: Vec::new(),
            visual_profile: ContextMap::new(),
            current_mood: INITIAL_MOOD.to_string(),
            current_activity: INITIAL_ACTIVITY.to_string(),
            energy_level: INITIAL_ENERGY,
            is_active: true,
            conversation,
            conversation_history: Vec::new(),
            interaction_log: Vec::new(),
            learning_history: Vec::new(),
            health_history: Vec::new(),
            health_alerts: Vec::new(),
            behavior_history: Vec::new(),
            events_simulated: 0,
            decisions_made: 0,
            patterns_created: 0,
            components,
            retention,
            decision_threshold: system.thresholds.decision_making_threshold,
            timestamps: Timestamps::at(Utc::now()),
        };

        twin.seed_synthetic_state();

        if let Some(traits) = section(config, "personality_profile")? {
            twin.personality.apply_map(traits)?;
        }
        if let Some(metrics) = section(config, "health_profile")? {
            twin.health.apply_map(metrics)?;
        }
        if let Some(visual) = section(config, "visual_profile")? {
            twin.visual_profile = visual.clone();
        }

        tracing::info!("Created digital twin: {} ({})", twin.twin_id, twin.profile.name);
        Ok(twin)
    }

    fn seed_synthetic_state(&mut self) {
        if let Some(model) = &self.components.personality {
            match model.generate(&self.profile) {
                Ok(traits) => self.personality = traits,
                Err(e) => tracing::warn!(
                    twin_id = %self.twin_id,
                    "Failed to seed personality, keeping defaults: {}",
                    e
                ),
            }
        }

        if let Some(monitor) = &self.components.health {
            match monitor.baseline(&self.profile) {
                Ok(metrics) => {
                    self.health = metrics;
                    push_bounded(
                        &mut self.health_history,
                        BiometricReading::now(metrics),
                        self.retention.max_health_history,
                    );
                }
                Err(e) => tracing::warn!(
                    twin_id = %self.twin_id,
                    "Failed to seed health baseline, keeping defaults: {}",
                    e
                ),
            }
        }

        if let Some(simulator) = &self.components.behavior {
            let mut patterns = simulator.seed_patterns(&self.personality, &self.profile.interests);
            patterns.truncate(self.retention.max_behavior_patterns.max(1));
            self.behavior_patterns = patterns;
        }

        tracing::debug!(
            twin_id = %self.twin_id,
            patterns = self.behavior_patterns.len(),
            "Initialized synthetic twin state"
        );
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    pub fn twin_id(&self) -> &str {
        &self.twin_id
    }

    pub fn profile(&self) -> &TwinProfile {
        &self.profile
    }

    pub fn personality(&self) -> &PersonalityTraits {
        &self.personality
    }

    pub fn health(&self) -> &HealthMetrics {
        &self.health
    }

    pub fn behavior_patterns(&self) -> &[BehaviorPattern] {
        &self.behavior_patterns
    }

    pub fn visual_profile(&self) -> &ContextMap {
        &self.visual_profile
    }

    pub fn current_mood(&self) -> &str {
        &self.current_mood
    }

    pub fn current_activity(&self) -> &str {
        &self.current_activity
    }

    pub fn energy_level(&self) -> f32 {
        self.energy_level
    }

    pub fn is_active(&self) -> bool {
        self.is_active
    }

    pub fn conversation(&self) -> &ConversationEngine {
        &self.conversation
    }

    pub fn conversation_history(&self) -> &[ConversationEntry] {
        &self.conversation_history
    }

    pub fn interaction_log(&self) -> &[InteractionRecord] {
        &self.interaction_log
    }

    pub fn learning_history(&self) -> &[LearningEvent] {
        &self.learning_history
    }

    pub fn health_history(&self) -> &[BiometricReading] {
        &self.health_history
    }

    pub fn health_alerts(&self) -> &[HealthAlert] {
        &self.health_alerts
    }

    pub fn behavior_history(&self) -> &[BehaviorEvent] {
        &self.behavior_history
    }

    pub fn timestamps(&self) -> &Timestamps {
        &self.timestamps
    }

    pub fn classifier(&self) -> Option<Arc<dyn TextClassifier>> {
        self.conversation.classifier()
    }

    fn mood_snapshot(&self) -> MoodSnapshot {
        MoodSnapshot {
            mood: self.current_mood.clone(),
            activity: self.current_activity.clone(),
            energy_level: self.energy_level,
        }
    }

    // ========================================================================
    // Explicit updates
    // ========================================================================

    /// Apply `profile`, `personality`, `health` and `visual` sections. All
    /// sections are validated before any is committed.
    pub fn update(&mut self, updates: &ContextMap) -> Result<(), TwinError> {
        let now = Utc::now();

        let profile_updates = section(updates, "profile")?;
        let mut profile = self.profile.clone();
        if let Some(fields) = profile_updates {
            profile.apply_updates(fields)?;
            profile.updated_at = now;
        }

        let personality_updates = section(updates, "personality")?;
        let mut personality = self.personality;
        if let Some(traits) = personality_updates {
            personality.apply_map(traits)?;
        }

        let health_updates = section(updates, "health")?;
        let mut health = self.health;
        if let Some(metrics) = health_updates {
            health.apply_map(metrics)?;
        }

        let mut visual = self.visual_profile.clone();
        if let Some(fields) = section(updates, "visual")? {
            merge(&mut visual, fields);
        }

        self.profile = profile;
        self.personality = personality;
        self.health = health;
        self.visual_profile = visual;
        if personality_updates.is_some() {
            self.timestamps.last_personality_update = now;
        }
        if health_updates.is_some() {
            self.timestamps.last_health_update = now;
        }
        tracing::info!("Updated digital twin: {}", self.twin_id);
        Ok(())
    }

    // ========================================================================
    // Interactions
    // ========================================================================

    /// The conversation part of an interaction, if it is one. Callers that
    /// hold the twin behind a lock analyze this outside the lock and hand the
    /// result to [`DigitalTwin::apply_interaction`].
    pub fn conversation_request(&self, data: &ContextMap) -> Option<ConversationRequest> {
        match data.str_field("type").and_then(InteractionKind::from_label) {
            Some(InteractionKind::Conversation) => Some(self.build_conversation_request(data)),
            _ => None,
        }
    }

    fn build_conversation_request(&self, data: &ContextMap) -> ConversationRequest {
        let mut context = data.map_field("context").cloned().unwrap_or_default();
        context.insert(
            "twin_state".into(),
            json!({
                "mood": self.current_mood,
                "activity": self.current_activity,
                "energy_level": self.energy_level,
            }),
        );
        ConversationRequest {
            message: data.str_field("message").unwrap_or_default().to_string(),
            sender: data.str_field("sender").unwrap_or("user").to_string(),
            context,
        }
    }

    /// Analyze (awaiting the classifier if any) and apply in one go.
    pub async fn process_interaction(&mut self, data: &ContextMap) -> InteractionResponse {
        let analysis = match self.conversation_request(data) {
            Some(request) => Some(self.conversation.analyze(&request.message, &request.context).await),
            None => None,
        };
        self.apply_interaction(data, analysis)
    }

    /// Log the interaction, dispatch it on its `type`, apply the handler's
    /// state deltas and label the logged record. Conversations without a
    /// precomputed analysis fall back to the rule-based labels. Unknown types
    /// get a descriptive payload rather than an error.
    pub fn apply_interaction(
        &mut self,
        data: &ContextMap,
        analysis: Option<MessageAnalysis>,
    ) -> InteractionResponse {
        let now = Utc::now();
        let interaction_id = Uuid::new_v4().to_string();
        let interaction_type = data.str_field("type").unwrap_or("unknown").to_string();

        let record = InteractionRecord {
            interaction_id: interaction_id.clone(),
            timestamp: now,
            interaction_type: interaction_type.clone(),
            data: data.clone(),
            twin_state: self.mood_snapshot(),
            outcome: None,
        };
        let max_interaction_log = self.retention.max_interaction_log;
        push_bounded(&mut self.interaction_log, record, max_interaction_log);

        let output = match InteractionKind::from_label(&interaction_type) {
            Some(InteractionKind::Conversation) => {
                let request = self.build_conversation_request(data);
                let analysis = analysis.unwrap_or_else(|| {
                    MessageAnalysis::rule_based(&request.message, &request.context)
                });
                self.handle_conversation(request, analysis)
            }
            Some(InteractionKind::HealthQuery) => self.handle_health_query(data),
            Some(InteractionKind::BehaviorRequest) => self.handle_behavior_request(data),
            Some(InteractionKind::VisualUpdate) => self.handle_visual_update(data),
            None => HandlerOutput::payload(json!({
                "message": "Unknown interaction type",
                "type": interaction_type,
            })),
        };

        let HandlerOutput {
            mut payload,
            deltas,
            outcome,
            learning,
        } = output;

        if let Some(record) = self
            .interaction_log
            .last_mut()
            .filter(|r| r.interaction_id == interaction_id)
        {
            record.outcome = outcome;
        }
        if let Some(event) = learning {
            push_bounded(
                &mut self.learning_history,
                event,
                self.retention.max_learning_history,
            );
        }
        self.apply_deltas(&deltas);
        if !deltas.is_empty() {
            if let (Value::Object(map), Value::Object(fields)) = (&mut payload, json!(deltas)) {
                map.extend(fields);
            }
        }
        self.timestamps.last_interaction = now;

        InteractionResponse {
            interaction_id,
            response: payload,
            twin_state: TwinStateStamp {
                mood: self.current_mood.clone(),
                activity: self.current_activity.clone(),
                energy: self.energy_level,
                timestamp: now,
            },
        }
    }

    fn apply_deltas(&mut self, deltas: &StateDeltas) {
        if let Some(mood) = &deltas.mood_change {
            self.current_mood = mood.clone();
        }
        if let Some(activity) = &deltas.activity_change {
            self.current_activity = activity.clone();
        }
        if let Some(change) = deltas.energy_change.filter(|c| c.is_finite()) {
            self.energy_level = (self.energy_level + change).clamp(0.0, 1.0);
        }
    }

    fn handle_conversation(
        &mut self,
        request: ConversationRequest,
        analysis: MessageAnalysis,
    ) -> HandlerOutput {
        let conversation_id = format!("twin_{}_{}", self.twin_id, request.sender);
        let topic = analysis.topic.clone();
        let reply = self.conversation.respond(
            &request.message,
            &request.sender,
            &conversation_id,
            &request.context,
            analysis,
            &self.personality,
            current_hour(),
            &mut rand::thread_rng(),
        );

        let outcome = match reply.sentiment {
            s if s.is_distressed() => InteractionOutcome::Negative,
            Sentiment::Positive | Sentiment::Excited => InteractionOutcome::Positive,
            _ => InteractionOutcome::Neutral,
        };
        let learning = (reply.intent == Intent::ProvideInformation)
            .then(|| LearningEvent::new(topic, "conversation"));

        let mood_change = self.components.personality.as_ref().map(|model| {
            model.mood(
                &self.personality,
                &MoodContext {
                    social_interaction: true,
                    stressful: reply.sentiment.is_distressed(),
                    new_experience: reply.intent == Intent::ProvideInformation,
                    hour: current_hour(),
                },
            )
        });

        let payload = json!({
            "response": reply.response,
            "type": "conversation",
            "conversation_id": conversation_id,
            "metadata": reply,
        });
        push_bounded(
            &mut self.conversation_history,
            ConversationEntry {
                timestamp: Utc::now(),
                user_message: request.message,
                twin_response: reply.response.clone(),
                context: request.context,
                conversation_id,
                metadata: reply,
            },
            self.retention.max_conversation_history,
        );

        HandlerOutput {
            payload,
            deltas: StateDeltas {
                mood_change,
                activity_change: Some("conversation".to_string()),
                energy_change: None,
            },
            outcome: Some(outcome),
            learning,
        }
    }

    fn handle_health_query(&mut self, data: &ContextMap) -> HandlerOutput {
        let Some(monitor) = self.components.health.clone() else {
            return HandlerOutput::message("Health monitor not available");
        };
        let now = Utc::now();

        match data.str_field("query_type").unwrap_or("current_status") {
            "current_status" => HandlerOutput::payload(json!({
                "health_metrics": HealthView::from(&self.health),
                "status": HealthStatus::of(&self.health),
                "timestamp": self.timestamps.last_health_update,
            })),
            "trends" => HandlerOutput::payload(json!({
                "trends": analyze_trends(&self.health_history),
                "readings": self.health_history.len(),
            })),
            "alerts" => {
                let hours = data
                    .get("hours")
                    .and_then(Value::as_i64)
                    .unwrap_or(DEFAULT_ALERT_WINDOW_HOURS);
                HandlerOutput::payload(json!({
                    "alerts": recent_alerts(&self.health_alerts, hours, now),
                    "hours": hours,
                }))
            }
            "summary" => {
                let trends = analyze_trends(&self.health_history);
                HandlerOutput::payload(json!(HealthSummary::build(
                    &self.health,
                    &self.health_history,
                    &self.health_alerts,
                    trends.len(),
                    now,
                )))
            }
            "reading" => {
                let activity =
                    ActivityLevel::from_label(data.str_field("activity_level").unwrap_or("moderate"));
                match monitor.reading(&self.profile, activity, DayPart::now()) {
                    Ok(reading) => {
                        let alerts = self.record_reading(monitor.as_ref(), reading.clone());
                        HandlerOutput::payload(json!({ "reading": reading, "alerts": alerts }))
                    }
                    Err(e) => {
                        tracing::warn!(twin_id = %self.twin_id, "Biometric reading failed: {}", e);
                        HandlerOutput::message("Biometric reading failed")
                    }
                }
            }
            other => HandlerOutput::payload(json!({
                "message": "Unknown health query type",
                "query_type": other,
            })),
        }
    }

    fn handle_behavior_request(&mut self, data: &ContextMap) -> HandlerOutput {
        let Some(simulator) = self.components.behavior.clone() else {
            return HandlerOutput::message("Behavior simulator not available");
        };

        match data.str_field("behavior_type").unwrap_or("current_patterns") {
            "current_patterns" => {
                let patterns: Vec<Value> = self
                    .behavior_patterns
                    .iter()
                    .map(|p| {
                        json!({
                            "type": p.pattern_type,
                            "description": p.description,
                            "frequency": p.frequency,
                            "confidence": p.confidence,
                        })
                    })
                    .collect();
                HandlerOutput::payload(json!({ "behavior_patterns": patterns }))
            }
            "simulate" => {
                let mut context = self.behavior_context();
                if let Some(extra) = data.map_field("context") {
                    merge(&mut context, extra);
                }
                match self.run_simulation(simulator.as_ref(), &context) {
                    Ok((event, reconciliation)) => {
                        let learning = (event.event_type == BehaviorCategory::LearningActivity
                            && event.outcome.is_success())
                        .then(|| {
                            LearningEvent::new(
                                event.context.str_field("subject").unwrap_or("learning_activity"),
                                "behavior",
                            )
                        });
                        let pattern_id = match &reconciliation {
                            Reconciliation::Reinforced(id) => id.clone(),
                            Reconciliation::Created { pattern_id, .. } => pattern_id.clone(),
                        };
                        HandlerOutput {
                            deltas: StateDeltas {
                                mood_change: None,
                                activity_change: Some(event.event_type.as_str().to_string()),
                                energy_change: Some(-event.energy_consumed * BEHAVIOR_ENERGY_SCALE),
                            },
                            payload: json!({
                                "simulated_behavior": event,
                                "pattern_id": pattern_id,
                            }),
                            outcome: None,
                            learning,
                        }
                    }
                    Err(e) => {
                        tracing::warn!(twin_id = %self.twin_id, "Behavior simulation failed: {}", e);
                        HandlerOutput::message("Behavior simulation failed")
                    }
                }
            }
            "decide" => {
                let mut context = data.map_field("context").cloned().unwrap_or_default();
                if let Some(situation) = data.str_field("situation") {
                    context.insert("situation".into(), situation.into());
                }
                context
                    .entry("energy_level")
                    .or_insert_with(|| json!(self.energy_level));
                context
                    .entry("stress_level")
                    .or_insert_with(|| json!(self.health.stress_level));
                match simulator.decide(&self.personality, &context, self.decisions_made + 1) {
                    Ok(decision) => {
                        self.decisions_made += 1;
                        let firm = decision.is_firm(self.decision_threshold);
                        HandlerOutput::payload(json!({ "decision": decision, "firm": firm }))
                    }
                    Err(e) => {
                        tracing::warn!(twin_id = %self.twin_id, "Decision failed: {}", e);
                        HandlerOutput::message("Decision making failed")
                    }
                }
            }
            "predict" => {
                let situation = data.str_field("situation").unwrap_or_default();
                match predict_behavior(&self.personality, situation) {
                    Some(prediction) => HandlerOutput::payload(json!({ "prediction": prediction })),
                    None => HandlerOutput::payload(json!({
                        "message": "Unknown situation",
                        "situation": situation,
                    })),
                }
            }
            "summary" => HandlerOutput::payload(json!(BehaviorSummary::build(
                &self.behavior_patterns,
                &self.behavior_history,
                self.decisions_made,
            ))),
            other => HandlerOutput::payload(json!({
                "message": "Unknown behavior request type",
                "behavior_type": other,
            })),
        }
    }

    fn handle_visual_update(&mut self, data: &ContextMap) -> HandlerOutput {
        match data.str_field("update_type").unwrap_or("current_state") {
            "current_state" => HandlerOutput::payload(json!({
                "visual_state": self.visual_profile,
                "current_activity": self.current_activity,
                "mood_visualization": self.current_mood,
            })),
            "update" => {
                if let Some(fields) = data.map_field("visual_data") {
                    merge(&mut self.visual_profile, fields);
                }
                HandlerOutput::payload(json!({
                    "message": "Visual profile updated",
                    "new_state": self.visual_profile,
                }))
            }
            other => HandlerOutput::payload(json!({
                "message": "Unknown visual update type",
                "update_type": other,
            })),
        }
    }

    // ========================================================================
    // Periodic self-updates
    // ========================================================================

    /// Drift the live metrics, record the reading and check it for alerts.
    pub fn update_health_metrics(&mut self) -> bool {
        let Some(monitor) = self.components.health.clone() else {
            return false;
        };
        let now = Utc::now();
        let elapsed = now - self.timestamps.last_health_update;
        match monitor.update(&self.health, &self.personality, elapsed) {
            Ok(next) => {
                self.health = next;
                self.timestamps.last_health_update = now;
                self.record_reading(
                    monitor.as_ref(),
                    BiometricReading {
                        timestamp: now,
                        metrics: next,
                    },
                );
                true
            }
            Err(e) => {
                tracing::warn!(twin_id = %self.twin_id, "Failed to update health metrics: {}", e);
                false
            }
        }
    }

    pub fn evolve_personality(&mut self) -> bool {
        let Some(model) = self.components.personality.clone() else {
            return false;
        };
        let now = Utc::now();
        let elapsed = now - self.timestamps.last_personality_update;
        match model.evolve(
            &self.personality,
            &self.interaction_log,
            &self.learning_history,
            elapsed,
        ) {
            Ok(next) => {
                self.personality = next;
                self.timestamps.last_personality_update = now;
                true
            }
            Err(e) => {
                tracing::warn!(twin_id = %self.twin_id, "Failed to evolve personality: {}", e);
                false
            }
        }
    }

    /// Simulate one activity from the twin's current state and fold it into
    /// the pattern set.
    pub fn simulate_behavior(&mut self) -> bool {
        let Some(simulator) = self.components.behavior.clone() else {
            return false;
        };
        let context = self.behavior_context();
        match self.run_simulation(simulator.as_ref(), &context) {
            Ok((event, _)) => {
                self.current_activity = event.event_type.as_str().to_string();
                true
            }
            Err(e) => {
                tracing::warn!(twin_id = %self.twin_id, "Failed to simulate behavior: {}", e);
                false
            }
        }
    }

    fn behavior_context(&self) -> ContextMap {
        to_context(json!({
            "mood": self.current_mood,
            "activity": self.current_activity,
            "energy_level": self.energy_level,
            "stress_level": self.health.stress_level,
        }))
    }

    fn run_simulation(
        &mut self,
        simulator: &dyn BehaviorModel,
        context: &ContextMap,
    ) -> Result<(BehaviorEvent, Reconciliation), TwinError> {
        let event = simulator.simulate(
            &self.personality,
            context,
            current_hour(),
            self.events_simulated + 1,
        )?;

        let mut patterns = self.behavior_patterns.clone();
        let reconciliation = reconcile(
            &mut patterns,
            &event,
            self.retention.max_behavior_patterns,
            self.patterns_created + 1,
        );

        self.behavior_patterns = patterns;
        if matches!(reconciliation, Reconciliation::Created { .. }) {
            self.patterns_created += 1;
        }
        self.events_simulated += 1;
        self.timestamps.last_behavior_update = event.timestamp;
        push_bounded(
            &mut self.behavior_history,
            event.clone(),
            self.retention.max_behavior_history,
        );
        Ok((event, reconciliation))
    }

    fn record_reading(
        &mut self,
        monitor: &dyn HealthModel,
        reading: BiometricReading,
    ) -> Vec<HealthAlert> {
        let alerts = monitor.check_alerts(&reading, self.health_alerts.len());
        push_bounded(
            &mut self.health_history,
            reading,
            self.retention.max_health_history,
        );
        self.health_alerts.extend(alerts.iter().cloned());
        alerts
    }

    // ========================================================================
    // Views
    // ========================================================================

    pub fn record(&self) -> TwinRecord {
        TwinRecord {
            twin_id: self.twin_id.clone(),
            profile: self.profile.clone(),
            personality_traits: self.personality,
            health_metrics: HealthView::from(&self.health),
            current_state: CurrentState {
                mood: self.current_mood.clone(),
                activity: self.current_activity.clone(),
                energy: self.energy_level,
                is_active: self.is_active,
            },
            timestamps: self.timestamps.clone(),
        }
    }

    pub fn state(&self) -> TwinState {
        let recent_start = self
            .conversation_history
            .len()
            .saturating_sub(RECENT_CONVERSATIONS);
        TwinState {
            twin_id: self.twin_id.clone(),
            last_update: self.timestamps.latest(),
            health_status: HealthStatus::of(&self.health),
            personality_state: PersonalityState {
                traits: self.personality,
                current_mood: self.current_mood.clone(),
                last_update: self.timestamps.last_personality_update,
            },
            behavior_patterns: self
                .behavior_patterns
                .iter()
                .map(|p| p.pattern_type.clone())
                .collect(),
            conversation_history: self.conversation_history[recent_start..].to_vec(),
            conversation_summary: self.conversation.overview(),
            visual_state: VisualState {
                profile: self.visual_profile.clone(),
                current_activity: self.current_activity.clone(),
                mood: self.current_mood.clone(),
                energy_level: self.energy_level,
            },
        }
    }

    pub fn shutdown(&mut self) {
        self.is_active = false;
        tracing::info!("Shutdown digital twin: {}", self.twin_id);
    }
}

/// A nested object under `key`; present but not an object is an error.
fn section<'a>(map: &'a ContextMap, key: &str) -> Result<Option<&'a ContextMap>, TwinError> {
    match map.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Object(inner)) => Ok(Some(inner)),
        Some(_) => Err(TwinError::invalid(key, "expected an object")),
    }
}

fn merge(target: &mut ContextMap, fields: &ContextMap) {
    for (k, v) in fields {
        target.insert(k.clone(), v.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use twin_behavior::Decision;
    use twin_core::Trait;

    fn config() -> TwinSystemConfig {
        TwinSystemConfig::default()
    }

    fn twin_with(components: Components, creation: Value) -> DigitalTwin {
        DigitalTwin::new("twin_1_test", &to_context(creation), components, &config()).unwrap()
    }

    fn twin() -> DigitalTwin {
        twin_with(
            Components::from_config(&config()),
            json!({"name": "Ada", "age": 35, "occupation": "engineer", "interests": ["music"]}),
        )
    }

    fn interact(twin: &mut DigitalTwin, data: Value) -> InteractionResponse {
        twin.apply_interaction(&to_context(data), None)
    }

    struct BrokenPersonality;

    impl twin_core::PersonalityModel for BrokenPersonality {
        fn generate(&self, _: &TwinProfile) -> Result<PersonalityTraits, TwinError> {
            Err(TwinError::invalid("personality", "generator offline"))
        }

        fn evolve(
            &self,
            _: &PersonalityTraits,
            _: &[InteractionRecord],
            _: &[LearningEvent],
            _: chrono::Duration,
        ) -> Result<PersonalityTraits, TwinError> {
            Err(TwinError::NonFinite { field: "personality" })
        }

        fn mood(&self, _: &PersonalityTraits, _: &MoodContext) -> String {
            "calm".to_string()
        }
    }

    struct BrokenBehavior;

    impl BehaviorModel for BrokenBehavior {
        fn simulate(
            &self,
            _: &PersonalityTraits,
            _: &ContextMap,
            _: u32,
            _: usize,
        ) -> Result<BehaviorEvent, TwinError> {
            Err(TwinError::NonFinite { field: "energy_consumed" })
        }

        fn decide(&self, _: &PersonalityTraits, _: &ContextMap, _: usize) -> Result<Decision, TwinError> {
            Err(TwinError::NonFinite { field: "confidence" })
        }

        fn seed_patterns(&self, _: &PersonalityTraits, _: &[String]) -> Vec<BehaviorPattern> {
            Vec::new()
        }
    }

    #[test]
    fn test_new_twin_seeds_from_demographics() {
        let twin = twin();
        assert_eq!(twin.profile().name, "Ada");
        // engineer signature traits replace the sampled values
        assert_eq!(twin.personality().conscientiousness, 0.9);
        assert_eq!(twin.personality().openness, 0.7);
        assert!(twin
            .behavior_patterns()
            .iter()
            .any(|p| p.pattern_type == "work_habits"));
        assert!(twin
            .behavior_patterns()
            .iter()
            .any(|p| p.pattern_id == "seed_interest_music"));
        assert_eq!(twin.health_history().len(), 1);
        assert_eq!(twin.current_mood(), INITIAL_MOOD);
        assert_eq!(twin.current_activity(), INITIAL_ACTIVITY);
        assert_eq!(twin.energy_level(), INITIAL_ENERGY);
        assert!(twin.is_active());
    }

    #[test]
    fn test_explicit_profiles_override_seeded_values() {
        let twin = twin_with(
            Components::from_config(&config()),
            json!({
                "name": "Bo",
                "personality_profile": {"openness": 0.11, "charm": 0.9},
                "health_profile": {"heart_rate": 64.0},
                "visual_profile": {"avatar": "fox"},
            }),
        );
        assert!((twin.personality().openness - 0.11).abs() < 1e-6);
        assert_eq!(twin.health().heart_rate, 64.0);
        assert_eq!(twin.visual_profile().str_field("avatar"), Some("fox"));
    }

    #[test]
    fn test_failed_seeding_keeps_defaults() {
        let components = Components {
            personality: Some(Arc::new(BrokenPersonality)),
            ..Components::default()
        };
        let twin = twin_with(components, json!({"name": "Cy"}));
        assert_eq!(*twin.personality(), PersonalityTraits::default());
        assert!(twin.behavior_patterns().is_empty());
    }

    #[test]
    fn test_update_is_all_or_nothing() {
        let mut twin = twin();
        let before = *twin.personality();
        let result = twin.update(&to_context(json!({
            "profile": {"description": "changed"},
            "personality": {"openness": "very"},
        })));
        assert!(result.is_err());
        assert_eq!(twin.profile().description, "");
        assert_eq!(*twin.personality(), before);
    }

    #[test]
    fn test_update_clamps_traits() {
        let mut twin = twin();
        twin.update(&to_context(json!({
            "profile": {"description": "x"},
            "personality": {"openness": 3.0, "neuroticism": -1.0},
            "visual": {"color": "teal"},
        })))
        .unwrap();
        assert_eq!(twin.profile().description, "x");
        assert_eq!(twin.personality().openness, 1.0);
        assert_eq!(twin.personality().neuroticism, 0.0);
        assert_eq!(twin.visual_profile().str_field("color"), Some("teal"));
    }

    #[test]
    fn test_unknown_interaction_type() {
        let mut twin = twin();
        let response = interact(&mut twin, json!({"type": "dance"}));
        assert_eq!(
            response.response,
            json!({"message": "Unknown interaction type", "type": "dance"})
        );
        assert_eq!(twin.interaction_log().len(), 1);
        assert_eq!(twin.interaction_log()[0].interaction_type, "dance");
        assert!(twin.interaction_log()[0].outcome.is_none());
    }

    #[test]
    fn test_conversation_interaction() {
        let mut twin = twin();
        let response = interact(
            &mut twin,
            json!({"type": "conversation", "message": "I love this weather", "sender": "sam"}),
        );
        let expected_id = format!("twin_{}_sam", twin.twin_id());
        assert_eq!(response.response["type"], "conversation");
        assert_eq!(response.response["conversation_id"], expected_id.as_str());
        assert!(response.response["response"].as_str().is_some_and(|r| !r.is_empty()));
        assert_eq!(response.response["activity_change"], "conversation");
        assert_eq!(twin.current_activity(), "conversation");

        assert_eq!(twin.conversation_history().len(), 1);
        let entry = &twin.conversation_history()[0];
        assert_eq!(entry.user_message, "I love this weather");
        assert!(entry.context.map_field("twin_state").is_some());
        assert_eq!(
            twin.interaction_log()[0].outcome,
            Some(InteractionOutcome::Positive)
        );
        assert_eq!(twin.conversation().context(&expected_id).map(|c| c.message_count), Some(2));
    }

    #[test]
    fn test_informative_message_is_learning() {
        let mut twin = twin();
        interact(
            &mut twin,
            json!({"type": "conversation", "message": "The meeting was moved to Friday"}),
        );
        assert_eq!(twin.learning_history().len(), 1);
        assert_eq!(twin.learning_history()[0].topic, "work");
        assert_eq!(
            twin.interaction_log()[0].outcome,
            Some(InteractionOutcome::Neutral)
        );
    }

    #[test]
    fn test_positive_run_builds_confidence() {
        let mut twin = twin();
        twin.update(&to_context(json!({"personality": {"confidence": 0.5}})))
            .unwrap();
        for _ in 0..3 {
            interact(
                &mut twin,
                json!({"type": "conversation", "message": "I love this weather"}),
            );
        }
        assert!(twin.evolve_personality());
        assert!(twin.personality().get(Trait::Confidence) > 0.5);
    }

    #[test]
    fn test_health_queries() {
        let mut twin = twin();
        twin.update(&to_context(json!({"health": {
            "blood_pressure_systolic": 118.0,
            "blood_pressure_diastolic": 76.0,
        }})))
        .unwrap();

        let status = interact(&mut twin, json!({"type": "health_query"}));
        assert_eq!(status.response["health_metrics"]["blood_pressure"], "118/76");

        let alerts = interact(
            &mut twin,
            json!({"type": "health_query", "query_type": "alerts", "hours": 6}),
        );
        assert_eq!(alerts.response["hours"], 6);
        assert!(alerts.response["alerts"].is_array());

        let trends = interact(&mut twin, json!({"type": "health_query", "query_type": "trends"}));
        assert_eq!(trends.response["readings"], 1);

        let unknown = interact(&mut twin, json!({"type": "health_query", "query_type": "x"}));
        assert_eq!(unknown.response["message"], "Unknown health query type");
    }

    #[test]
    fn test_reading_is_recorded() {
        let mut twin = twin();
        let response = interact(
            &mut twin,
            json!({"type": "health_query", "query_type": "reading", "activity_level": "high"}),
        );
        assert!(response.response["reading"]["heart_rate"].is_number());
        assert_eq!(twin.health_history().len(), 2);
    }

    #[test]
    fn test_behavior_requests() {
        let mut twin = twin();
        let patterns = interact(&mut twin, json!({"type": "behavior_request"}));
        assert_eq!(
            patterns.response["behavior_patterns"].as_array().map(Vec::len),
            Some(twin.behavior_patterns().len())
        );

        let before = twin.energy_level();
        let simulated = interact(
            &mut twin,
            json!({"type": "behavior_request", "behavior_type": "simulate"}),
        );
        assert!(simulated.response["simulated_behavior"]["event_id"].is_string());
        assert_eq!(twin.behavior_history().len(), 1);
        assert!(twin.energy_level() <= before);
        assert_ne!(twin.current_activity(), INITIAL_ACTIVITY);

        let decided = interact(
            &mut twin,
            json!({"type": "behavior_request", "behavior_type": "decide", "situation": "work_challenge"}),
        );
        assert_eq!(decided.response["decision"]["situation"], "work_challenge");

        let unknown = interact(
            &mut twin,
            json!({"type": "behavior_request", "behavior_type": "predict", "situation": "moon_landing"}),
        );
        assert_eq!(unknown.response["message"], "Unknown situation");

        let summary = interact(
            &mut twin,
            json!({"type": "behavior_request", "behavior_type": "summary"}),
        );
        assert_eq!(summary.response["total_events"], 1);
        assert_eq!(summary.response["decision_count"], 1);
    }

    #[test]
    fn test_visual_update() {
        let mut twin = twin();
        let updated = interact(
            &mut twin,
            json!({"type": "visual_update", "update_type": "update", "visual_data": {"hair": "red"}}),
        );
        assert_eq!(updated.response["message"], "Visual profile updated");
        let current = interact(&mut twin, json!({"type": "visual_update"}));
        assert_eq!(current.response["visual_state"]["hair"], "red");
        assert_eq!(current.response["mood_visualization"], INITIAL_MOOD);
    }

    #[test]
    fn test_failed_simulation_keeps_patterns() {
        let components = Components {
            behavior: Some(Arc::new(BrokenBehavior)),
            ..Components::from_config(&config())
        };
        let mut twin = twin_with(components, json!({"name": "Di"}));
        twin.behavior_patterns.push(BehaviorPattern::new("p1", "work_activity", "desk"));
        assert!(!twin.simulate_behavior());
        assert_eq!(twin.behavior_patterns().len(), 1);
        assert!(twin.behavior_history().is_empty());
        assert_eq!(twin.current_activity(), INITIAL_ACTIVITY);
    }

    #[test]
    fn test_failed_evolution_keeps_traits() {
        let components = Components {
            personality: Some(Arc::new(BrokenPersonality)),
            ..Components::from_config(&config())
        };
        let mut twin = twin_with(components, json!({"name": "Ed"}));
        let before = *twin.personality();
        assert!(!twin.evolve_personality());
        assert_eq!(*twin.personality(), before);
    }

    #[test]
    fn test_missing_engines_are_skipped() {
        let mut twin = twin_with(Components::default(), json!({"name": "Fi"}));
        assert!(!twin.update_health_metrics());
        assert!(!twin.evolve_personality());
        assert!(!twin.simulate_behavior());
        let response = interact(&mut twin, json!({"type": "health_query"}));
        assert_eq!(response.response["message"], "Health monitor not available");
    }

    #[test]
    fn test_health_update_records_history() {
        let mut twin = twin();
        assert!(twin.update_health_metrics());
        assert_eq!(twin.health_history().len(), 2);
        assert!(twin.health().within_ranges());
    }

    #[test]
    fn test_logs_are_bounded() {
        let mut system = config();
        system.retention.max_interaction_log = 3;
        system.retention.max_conversation_history = 2;
        let mut twin = DigitalTwin::new(
            "twin_bounded",
            &to_context(json!({"name": "Gus"})),
            Components::from_config(&system),
            &system,
        )
        .unwrap();
        for i in 0..5 {
            interact(
                &mut twin,
                json!({"type": "conversation", "message": format!("note {i}")}),
            );
        }
        assert_eq!(twin.interaction_log().len(), 3);
        assert_eq!(twin.conversation_history().len(), 2);
        assert_eq!(twin.conversation_history()[1].user_message, "note 4");
    }

    #[test]
    fn test_state_view() {
        let mut twin = twin();
        for _ in 0..12 {
            interact(&mut twin, json!({"type": "conversation", "message": "hello"}));
        }
        let state = twin.state();
        assert_eq!(state.conversation_history.len(), RECENT_CONVERSATIONS);
        assert_eq!(state.behavior_patterns.len(), twin.behavior_patterns().len());
        assert_eq!(state.conversation_summary.active_conversations, 1);

        twin.shutdown();
        assert!(!twin.record().current_state.is_active);
    }
}
