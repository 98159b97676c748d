//! `probe_core` — the deterministic simulation core.
//!
//! No IO, no clock, no network. All randomness flows through the crate's own
//! seeded generator; two runs with the same seed and the same action stream
//! are byte-identical at every tick.

pub mod action;
pub mod arena;
pub mod comm;
pub mod config;
pub mod engine;
pub mod error;
pub mod events;
pub mod galaxy;
pub mod metrics;
pub mod personality;
pub mod probe;
pub mod replicate;
pub mod rng;
pub mod scenario;
pub mod society;
pub mod travel;
mod types;

pub use action::Action;
pub use arena::Arena;
pub use config::SimConfig;
pub use engine::{Core, Snapshot, SystemCache};
pub use error::{ActionResult, ErrorKind, SimError};
pub use events::{Civilization, EventLog, EventType, SimEvent};
pub use metrics::{compute_metrics, MetricsRecorder, MetricsSnapshot};
pub use rng::SimRng;
pub use scenario::{InjectedEvent, InjectionQueue, ScheduledEvent};
pub use society::{Society, StructureType};
pub use travel::{lorentz_factor, ScanHit};
pub use types::*;
