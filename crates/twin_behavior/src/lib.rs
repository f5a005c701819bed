//! # Twin Behavior
//!
//! Everything a twin *does* between conversations.
//!
//! A simulation call runs a fixed pipeline: pick a behavior category from the
//! hour of day, enrich the context, weigh the relevant traits, roll an outcome,
//! cost the energy, then fold the event into the twin's reinforced patterns.
//! Decision making is a separate, deterministic scorer over situation-specific
//! options.

pub mod decision;
pub mod event;
pub mod patterns;
pub mod simulator;
pub mod summary;

pub use decision::{make_decision, Decision, DecisionFactors};
pub use event::{BehaviorEvent, BehaviorOutcome};
pub use patterns::{
    context_similarity, predict_behavior, reconcile, seed_patterns, BehaviorPrediction,
    Reconciliation,
};
pub use simulator::{BehaviorModel, BehaviorSimulator, TimeBucket};
pub use summary::BehaviorSummary;
