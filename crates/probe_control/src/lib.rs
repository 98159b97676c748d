//! Action sources for driving probes without an external agent.
//!
//! The headless loop asks a source for one action per probe per tick. The
//! fallback decision — repair if damaged, otherwise wait — is also what the
//! deadline wrapper substitutes when a slow source blows its budget.

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use probe_core::{Action, Probe, Resource, SimConfig, Uid};

pub trait ActionSource {
    fn decide(&mut self, probe: &Probe, config: &SimConfig, tick: u64) -> Action;
}

/// The fallback agent decision: repair if damaged (and able), else wait.
pub struct FallbackPilot;

/// Repair is only worth proposing when the action can actually run.
fn can_repair(probe: &Probe, config: &SimConfig) -> bool {
    probe.hull_integrity < 1.0
        && probe.resources[Resource::Iron.index()] >= config.repair_iron_kg
        && probe.energy_joules >= config.repair_energy_j
}

impl ActionSource for FallbackPilot {
    fn decide(&mut self, probe: &Probe, config: &SimConfig, _tick: u64) -> Action {
        if can_repair(probe, config) {
            Action::Repair
        } else {
            Action::Wait
        }
    }
}

/// Replays a scripted tick → (probe → action) table, e.g. from a recorded
/// session. Unlisted probes wait.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct ScriptedSource {
    pub script: BTreeMap<u64, BTreeMap<Uid, Action>>,
}

impl ActionSource for ScriptedSource {
    fn decide(&mut self, probe: &Probe, _config: &SimConfig, tick: u64) -> Action {
        self.script
            .get(&tick)
            .and_then(|per_probe| per_probe.get(&probe.id))
            .cloned()
            .unwrap_or(Action::Wait)
    }
}

/// Bounds an inner source by a per-decision deadline; expiry falls back to
/// the fallback agent decision.
pub struct DeadlineSource<S> {
    inner: S,
    budget: Duration,
}

impl<S: ActionSource> DeadlineSource<S> {
    pub fn new(inner: S, budget: Duration) -> Self {
        Self { inner, budget }
    }
}

impl<S: ActionSource> ActionSource for DeadlineSource<S> {
    fn decide(&mut self, probe: &Probe, config: &SimConfig, tick: u64) -> Action {
        let started = Instant::now();
        let action = self.inner.decide(probe, config, tick);
        if started.elapsed() > self.budget {
            return FallbackPilot.decide(probe, config, tick);
        }
        action
    }
}

/// One action per live probe, in UID order.
pub fn decide_all<'a>(
    source: &mut impl ActionSource,
    probes: impl Iterator<Item = &'a Probe>,
    config: &SimConfig,
    tick: u64,
) -> BTreeMap<Uid, Action> {
    probes
        .map(|probe| (probe.id, source.decide(probe, config, tick)))
        .collect()
}
