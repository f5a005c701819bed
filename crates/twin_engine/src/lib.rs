//! # Twin Engine
//!
//! The digital twin aggregate and the runtime around it.
//!
//! ## Architecture
//!
//! - `twin`: one twin's state, its interaction dispatch and the three
//!   periodic updates (health drift, personality evolution, behavior)
//! - `engine`: the registry of twins plus the background loops that drive
//!   those periodic updates
//! - `synthetic`: the generated dataset used for seeding and lookups
//! - `components`: the engines shared by every twin
//! - `scheduler`: the interval loop with shutdown and error backoff
//!
//! ## Time Scales
//!
//! - Behavior: every 30 s
//! - Health: every minute
//! - Personality and synthetic data: every five minutes

pub mod components;
pub mod engine;
pub mod scheduler;
pub mod synthetic;
pub mod twin;

pub use components::Components;
pub use engine::{SystemStatus, TwinEngine};
pub use synthetic::{DatasetKind, SyntheticDataManager, SyntheticStatus, SyntheticTwinData};
pub use twin::{
    ConversationEntry, DigitalTwin, InteractionKind, InteractionResponse, StateDeltas,
    TwinRecord, TwinState,
};
