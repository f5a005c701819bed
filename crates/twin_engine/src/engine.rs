//! The twin registry and its background loops.
//!
//! `TwinEngine` is an explicit handle: the process entry point builds it,
//! starts the loops, hands it to whatever serves requests and shuts it down
//! on exit. Four loops run independently (health, personality, behavior and
//! synthetic data regeneration), each iterating every active twin once per
//! tick. One twin failing to update is logged and skipped; the rest of the
//! tick proceeds.

use crate::components::Components;
use crate::scheduler::spawn_loop;
use crate::synthetic::{SyntheticDataManager, SyntheticStatus, SyntheticTwinData};
use crate::twin::{DigitalTwin, InteractionResponse, TwinRecord, TwinState};
use chrono::Utc;
use serde::Serialize;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{watch, Mutex, RwLock};
use tokio::task::JoinHandle;
use twin_conversation::analyze_message;
use twin_core::{ContextMap, TwinError, TwinSystemConfig};

type Registry = Arc<RwLock<HashMap<String, DigitalTwin>>>;

#[derive(Debug, Clone, Serialize)]
pub struct SystemStatus {
    pub status: &'static str,
    pub active_twins: usize,
    pub twin_ids: Vec<String>,
    pub background_tasks: usize,
    pub components_initialized: BTreeMap<&'static str, bool>,
    pub synthetic_data: SyntheticStatus,
}

pub struct TwinEngine {
    config: TwinSystemConfig,
    components: Components,
    twins: Registry,
    synthetic: Arc<RwLock<SyntheticDataManager>>,
    twin_counter: AtomicU64,
    running: AtomicBool,
    shutdown_tx: watch::Sender<bool>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl std::fmt::Debug for TwinEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TwinEngine")
            .field("components", &self.components)
            .field("running", &self.running.load(Ordering::SeqCst))
            .finish()
    }
}

impl TwinEngine {
    /// Engine with rule-based components only.
    pub fn new(config: TwinSystemConfig) -> Self {
        let components = Components::from_config(&config);
        Self::with_components(config, components)
    }

    /// Engine whose components include the configured classifier, checked once
    /// here.
    pub async fn initialize(config: TwinSystemConfig) -> Self {
        let components = Components::initialize(&config).await;
        Self::with_components(config, components)
    }

    pub fn with_components(config: TwinSystemConfig, components: Components) -> Self {
        let (shutdown_tx, _) = watch::channel(false);
        let synthetic = SyntheticDataManager::new(config.synthetic.clone());
        Self {
            config,
            components,
            twins: Arc::new(RwLock::new(HashMap::new())),
            synthetic: Arc::new(RwLock::new(synthetic)),
            twin_counter: AtomicU64::new(0),
            running: AtomicBool::new(false),
            shutdown_tx,
            tasks: Mutex::new(Vec::new()),
        }
    }

    pub fn config(&self) -> &TwinSystemConfig {
        &self.config
    }

    pub fn components(&self) -> &Components {
        &self.components
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    // ========================================================================
    // Registry
    // ========================================================================

    /// Create and register a twin. Ids are `twin_{n}_{timestamp}` with `n`
    /// strictly increasing for the life of the engine.
    pub async fn create_twin(&self, twin_config: &ContextMap) -> Result<String, TwinError> {
        let n = self.twin_counter.fetch_add(1, Ordering::SeqCst) + 1;
        let twin_id = format!("twin_{}_{}", n, Utc::now().format("%Y%m%d_%H%M%S"));
        let twin = DigitalTwin::new(
            twin_id.clone(),
            twin_config,
            self.components.clone(),
            &self.config,
        )
        .map_err(|e| {
            tracing::error!("Failed to create digital twin: {}", e);
            e
        })?;
        self.twins.write().await.insert(twin_id.clone(), twin);
        tracing::info!("Registered digital twin: {}", twin_id);
        Ok(twin_id)
    }

    pub(crate) async fn insert_twin(&self, twin: DigitalTwin) {
        self.twins
            .write()
            .await
            .insert(twin.twin_id().to_string(), twin);
    }

    pub async fn get_twin(&self, twin_id: &str) -> Option<TwinRecord> {
        self.twins.read().await.get(twin_id).map(DigitalTwin::record)
    }

    /// Run `f` against a twin under the registry read lock.
    pub async fn with_twin<T>(&self, twin_id: &str, f: impl FnOnce(&DigitalTwin) -> T) -> Option<T> {
        self.twins.read().await.get(twin_id).map(f)
    }

    pub async fn update_twin(&self, twin_id: &str, updates: &ContextMap) -> bool {
        let mut twins = self.twins.write().await;
        let Some(twin) = twins.get_mut(twin_id) else {
            return false;
        };
        match twin.update(updates) {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(twin_id, "Rejected twin update: {}", e);
                false
            }
        }
    }

    pub async fn delete_twin(&self, twin_id: &str) -> bool {
        let removed = self.twins.write().await.remove(twin_id);
        match removed {
            Some(mut twin) => {
                twin.shutdown();
                self.synthetic.write().await.forget_twin(twin_id);
                tracing::info!("Deleted digital twin: {}", twin_id);
                true
            }
            None => false,
        }
    }

    pub async fn list_twins(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.twins.read().await.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Dispatch an interaction. Conversation messages are analyzed before the
    /// twin is locked for writing, so a slow classifier holds no lock.
    pub async fn process_interaction(
        &self,
        twin_id: &str,
        data: &ContextMap,
    ) -> Option<InteractionResponse> {
        let (classifier, request) = {
            let twins = self.twins.read().await;
            let twin = twins.get(twin_id)?;
            (twin.classifier(), twin.conversation_request(data))
        };

        let analysis = match request {
            Some(request) => {
                Some(analyze_message(classifier.as_deref(), &request.message, &request.context).await)
            }
            None => None,
        };

        let mut twins = self.twins.write().await;
        let twin = twins.get_mut(twin_id)?;
        Some(twin.apply_interaction(data, analysis))
    }

    pub async fn get_twin_state(&self, twin_id: &str) -> Option<TwinState> {
        self.twins.read().await.get(twin_id).map(DigitalTwin::state)
    }

    pub async fn get_system_status(&self) -> SystemStatus {
        let twin_ids = self.list_twins().await;
        let synthetic_data = self.synthetic.read().await.status();
        SystemStatus {
            status: if self.is_running() { "running" } else { "stopped" },
            active_twins: twin_ids.len(),
            twin_ids,
            background_tasks: self.tasks.lock().await.len(),
            components_initialized: self.components.initialized().into_iter().collect(),
            synthetic_data,
        }
    }

    // ========================================================================
    // Synthetic data
    // ========================================================================

    pub async fn generate_new_data(&self) -> anyhow::Result<()> {
        self.synthetic.write().await.generate_new_data().await
    }

    pub async fn get_synthetic_profile(&self, kind: &str, criteria: &ContextMap) -> Option<Value> {
        self.synthetic.read().await.get_synthetic_profile(kind, criteria)
    }

    /// `None` for an unknown twin.
    pub async fn generate_synthetic_data(&self, twin_id: &str) -> Option<SyntheticTwinData> {
        if !self.twins.read().await.contains_key(twin_id) {
            return None;
        }
        Some(self.synthetic.write().await.generate_synthetic_data(twin_id))
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Spawn the four background loops. Calling it again while running is a
    /// no-op.
    pub async fn start(&self) {
        if self.running.swap(true, Ordering::SeqCst) {
            tracing::warn!("Twin engine already running");
            return;
        }
        self.shutdown_tx.send_replace(false);

        let scheduler = &self.config.scheduler;
        let backoff = scheduler.backoff();
        let mut tasks = self.tasks.lock().await;

        let twins = Arc::clone(&self.twins);
        tasks.push(spawn_loop(
            "health",
            scheduler.health_interval(),
            backoff,
            self.shutdown_tx.subscribe(),
            move || update_all(Arc::clone(&twins), DigitalTwin::update_health_metrics),
        ));

        let twins = Arc::clone(&self.twins);
        tasks.push(spawn_loop(
            "personality",
            scheduler.personality_interval(),
            backoff,
            self.shutdown_tx.subscribe(),
            move || update_all(Arc::clone(&twins), DigitalTwin::evolve_personality),
        ));

        let twins = Arc::clone(&self.twins);
        tasks.push(spawn_loop(
            "behavior",
            scheduler.behavior_interval(),
            backoff,
            self.shutdown_tx.subscribe(),
            move || update_all(Arc::clone(&twins), DigitalTwin::simulate_behavior),
        ));

        let synthetic = Arc::clone(&self.synthetic);
        tasks.push(spawn_loop(
            "synthetic data",
            scheduler.data_interval(),
            backoff,
            self.shutdown_tx.subscribe(),
            move || {
                let synthetic = Arc::clone(&synthetic);
                async move {
                    let mut manager = synthetic.write().await;
                    manager.generate_new_data().await?;
                    Ok(manager.status().personality_profiles)
                }
            },
        ));

        tracing::info!("Twin engine started with {} background loops", tasks.len());
    }

    /// Stop the loops, wait for them to finish their current tick and mark
    /// every twin inactive.
    pub async fn shutdown(&self) {
        self.running.store(false, Ordering::SeqCst);
        self.shutdown_tx.send_replace(true);

        let tasks: Vec<JoinHandle<()>> = self.tasks.lock().await.drain(..).collect();
        for task in tasks {
            if let Err(e) = task.await {
                tracing::warn!("Background loop ended abnormally: {}", e);
            }
        }

        for twin in self.twins.write().await.values_mut() {
            twin.shutdown();
        }
        tracing::info!("Twin engine shutdown complete");
    }
}

/// One tick: apply `update` to every active twin and count the successes.
async fn update_all(twins: Registry, update: fn(&mut DigitalTwin) -> bool) -> anyhow::Result<usize> {
    let mut twins = twins.write().await;
    let mut updated = 0;
    for twin in twins.values_mut().filter(|t| t.is_active()) {
        if update(twin) {
            updated += 1;
        }
    }
    Ok(updated)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;
    use twin_behavior::{BehaviorEvent, BehaviorModel, BehaviorSimulator, Decision};
    use twin_core::context::to_context;
    use twin_core::{BehaviorPattern, PersonalityTraits};

    fn engine() -> TwinEngine {
        TwinEngine::new(TwinSystemConfig::default())
    }

    /// Counts simulate calls, optionally failing every one of them.
    struct CountingBehavior {
        calls: Arc<AtomicUsize>,
        fail: bool,
        inner: BehaviorSimulator,
    }

    impl CountingBehavior {
        fn components(calls: &Arc<AtomicUsize>, fail: bool) -> Components {
            Components {
                behavior: Some(Arc::new(CountingBehavior {
                    calls: Arc::clone(calls),
                    fail,
                    inner: BehaviorSimulator::default(),
                })),
                ..Components::from_config(&TwinSystemConfig::default())
            }
        }
    }

    impl BehaviorModel for CountingBehavior {
        fn simulate(
            &self,
            traits: &PersonalityTraits,
            context: &ContextMap,
            hour: u32,
            seq: usize,
        ) -> Result<BehaviorEvent, TwinError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(TwinError::invalid("behavior", "simulated failure"));
            }
            self.inner.simulate(traits, context, hour, seq)
        }

        fn decide(
            &self,
            traits: &PersonalityTraits,
            context: &ContextMap,
            seq: usize,
        ) -> Result<Decision, TwinError> {
            self.inner.decide(traits, context, seq)
        }

        fn seed_patterns(&self, traits: &PersonalityTraits, interests: &[String]) -> Vec<BehaviorPattern> {
            self.inner.seed_patterns(traits, interests)
        }
    }

    async fn register(engine: &TwinEngine, id: &str, components: Components) {
        let twin = DigitalTwin::new(
            id,
            &to_context(json!({"name": id})),
            components,
            engine.config(),
        )
        .unwrap();
        engine.insert_twin(twin).await;
    }

    #[tokio::test]
    async fn test_twin_lifecycle() {
        let engine = engine();
        let id = engine
            .create_twin(&to_context(json!({"name": "T1", "twin_type": "human"})))
            .await
            .unwrap();
        assert!(id.starts_with("twin_1_"));
        assert_eq!(engine.get_twin(&id).await.unwrap().profile.name, "T1");

        let updated = engine
            .update_twin(&id, &to_context(json!({"profile": {"description": "x"}})))
            .await;
        assert!(updated);
        assert_eq!(engine.get_twin(&id).await.unwrap().profile.description, "x");

        assert!(engine.delete_twin(&id).await);
        assert!(engine.get_twin(&id).await.is_none());
    }

    #[tokio::test]
    async fn test_unknown_twin_is_not_an_error() {
        let engine = engine();
        let data = to_context(json!({"type": "conversation", "message": "hi"}));
        assert!(engine.get_twin("nope").await.is_none());
        assert!(!engine.update_twin("nope", &ContextMap::new()).await);
        assert!(!engine.delete_twin("nope").await);
        assert!(engine.process_interaction("nope", &data).await.is_none());
        assert!(engine.get_twin_state("nope").await.is_none());
        assert!(engine.generate_synthetic_data("nope").await.is_none());
    }

    #[tokio::test]
    async fn test_ids_are_unique_and_increasing() {
        let engine = engine();
        let a = engine.create_twin(&ContextMap::new()).await.unwrap();
        engine.delete_twin(&a).await;
        let b = engine.create_twin(&ContextMap::new()).await.unwrap();
        assert!(a.starts_with("twin_1_"));
        assert!(b.starts_with("twin_2_"));
    }

    #[tokio::test]
    async fn test_invalid_update_is_rejected() {
        let engine = engine();
        let id = engine.create_twin(&ContextMap::new()).await.unwrap();
        let bad = to_context(json!({"profile": {"age": "old"}}));
        assert!(!engine.update_twin(&id, &bad).await);
        assert_eq!(engine.get_twin(&id).await.unwrap().profile.age, 25);
    }

    #[tokio::test]
    async fn test_process_conversation() {
        let engine = engine();
        let id = engine.create_twin(&to_context(json!({"name": "Ari"}))).await.unwrap();
        let response = engine
            .process_interaction(
                &id,
                &to_context(json!({"type": "conversation", "message": "Hello there", "sender": "kim"})),
            )
            .await
            .unwrap();
        assert_eq!(response.response["type"], "conversation");
        assert_eq!(response.twin_state.activity, "conversation");

        let state = engine.get_twin_state(&id).await.unwrap();
        assert_eq!(state.conversation_history.len(), 1);
        assert_eq!(state.conversation_history[0].conversation_id, format!("twin_{id}_kim"));
    }

    #[tokio::test]
    async fn test_system_status() {
        let engine = engine();
        engine.create_twin(&ContextMap::new()).await.unwrap();
        let status = engine.get_system_status().await;
        assert_eq!(status.status, "stopped");
        assert_eq!(status.active_twins, 1);
        assert_eq!(status.background_tasks, 0);
        assert_eq!(status.components_initialized.get("health_monitor"), Some(&true));
        assert_eq!(status.components_initialized.get("text_classifier"), Some(&false));

        engine.start().await;
        let status = engine.get_system_status().await;
        assert_eq!(status.status, "running");
        assert_eq!(status.background_tasks, 4);

        engine.shutdown().await;
        let status = engine.get_system_status().await;
        assert_eq!(status.status, "stopped");
        assert_eq!(status.background_tasks, 0);
        assert!(engine
            .with_twin(&status.twin_ids[0], |t| !t.is_active())
            .await
            .unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn test_behavior_loop_survives_failing_twin() {
        let engine = engine();
        let healthy_calls = Arc::new(AtomicUsize::new(0));
        let failing_calls = Arc::new(AtomicUsize::new(0));
        register(&engine, "twin_ok_a", CountingBehavior::components(&healthy_calls, false)).await;
        register(&engine, "twin_bad", CountingBehavior::components(&failing_calls, true)).await;
        register(&engine, "twin_ok_b", CountingBehavior::components(&healthy_calls, false)).await;

        engine.start().await;

        // first tick fires immediately
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(healthy_calls.load(Ordering::SeqCst), 2);
        assert_eq!(failing_calls.load(Ordering::SeqCst), 1);

        // and the loop keeps going at the 30 s cadence
        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(healthy_calls.load(Ordering::SeqCst), 4);
        assert_eq!(failing_calls.load(Ordering::SeqCst), 2);

        let ok = engine
            .with_twin("twin_ok_a", |t| t.behavior_history().len())
            .await;
        assert_eq!(ok, Some(2));
        let bad = engine
            .with_twin("twin_bad", |t| t.behavior_history().len())
            .await;
        assert_eq!(bad, Some(0));

        engine.shutdown().await;
    }

    #[tokio::test]
    async fn test_synthetic_data_for_known_twin() {
        let engine = engine();
        let id = engine.create_twin(&ContextMap::new()).await.unwrap();
        let data = engine.generate_synthetic_data(&id).await.unwrap();
        assert_eq!(data.twin_id, id);

        engine.generate_new_data().await.unwrap();
        let any = engine
            .get_synthetic_profile("behavior_patterns", &ContextMap::new())
            .await;
        assert_eq!(any.unwrap()["pattern_id"], "behavior_1");
    }

    #[tokio::test]
    async fn test_delete_twin_drops_its_synthetic_data() {
        let engine = engine();
        let id = engine.create_twin(&ContextMap::new()).await.unwrap();
        engine.generate_synthetic_data(&id).await.unwrap();
        assert!(engine.synthetic.read().await.twin_data(&id).is_some());

        assert!(engine.delete_twin(&id).await);
        assert!(engine.synthetic.read().await.twin_data(&id).is_none());
    }
}
