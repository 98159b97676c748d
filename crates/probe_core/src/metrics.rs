//! Population metrics sampled from the universe.
//!
//! A single compute function takes the current state; the recorder keeps a
//! time series at a configured interval. No state mutation.

use serde::{Deserialize, Serialize};

use crate::events::{EventLog, EventType};
use crate::types::{LineageEntry, ProbeStatus, TechDomain, Universe};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub tick: u64,
    /// Probes ever spawned: the founder plus every lineage entry.
    pub probes_spawned: u32,
    pub avg_tech: f64,
    pub avg_trust: f32,
    pub systems_explored: u32,
    pub total_discoveries: u32,
    pub total_hazards_survived: u32,
}

pub fn compute_metrics(
    universe: &Universe,
    events: &EventLog,
    lineage: &[LineageEntry],
    systems_explored: u32,
) -> MetricsSnapshot {
    let mut tech_total = 0.0;
    let mut active = 0u32;
    let mut trust_total = 0.0_f32;
    let mut trust_count = 0u32;

    for probe in universe.probes.values() {
        if probe.status == ProbeStatus::Destroyed {
            continue;
        }
        let probe_avg: f64 = probe
            .tech_levels
            .iter()
            .map(|&t| f64::from(t))
            .sum::<f64>()
            / TechDomain::COUNT as f64;
        tech_total += probe_avg;
        active += 1;

        for rel in &probe.relationships {
            trust_total += rel.trust;
            trust_count += 1;
        }
    }

    let total_discoveries = events
        .events
        .iter()
        .filter(|e| e.event_type == EventType::Discovery)
        .count() as u32;
    let total_hazards_survived = events
        .events
        .iter()
        .filter(|e| e.event_type == EventType::Hazard)
        .count() as u32;

    MetricsSnapshot {
        tick: universe.tick,
        probes_spawned: 1 + lineage.len() as u32,
        avg_tech: if active > 0 {
            tech_total / f64::from(active)
        } else {
            0.0
        },
        avg_trust: if trust_count > 0 {
            trust_total / trust_count as f32
        } else {
            0.0
        },
        systems_explored,
        total_discoveries,
        total_hazards_survived,
    }
}

/// Interval sampler driven by the tick scheduler.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricsRecorder {
    pub samples: Vec<MetricsSnapshot>,
}

impl MetricsRecorder {
    pub fn record(&mut self, snapshot: MetricsSnapshot) {
        self.samples.push(snapshot);
    }

    pub fn latest(&self) -> Option<&MetricsSnapshot> {
        self.samples.last()
    }
}
